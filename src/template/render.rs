//! Variable-context rendering with Tera
//!
//! Every string (and string key) containing template syntax is rendered
//! against a flat context. The context always provides `now`, the current UTC
//! time in RFC 3339 form. Strings without `{{`, `{%` or `{#` are left alone,
//! so rendering already-rendered output changes nothing.

use chrono::{DateTime, SecondsFormat, Utc};
use log::debug;
use serde_yaml::{Mapping, Value};
use tera::{Context, Tera};

use crate::document::{key_to_string, ConfigDocument};
use crate::error::{Error, Result};
use crate::path::{join_index, join_key};

/// Top-level document key holding the rendering variables.
pub const VAR_KEY: &str = "var";

/// Name of the always-available timestamp variable.
pub const NOW_VARIABLE: &str = "now";

/// Whether `text` contains Tera syntax.
pub fn has_template_syntax(text: &str) -> bool {
    text.contains("{{") || text.contains("{%") || text.contains("{#")
}

/// Renders value trees against one variable context.
pub struct Renderer {
    tera: Tera,
    context: Context,
}

impl Renderer {
    /// Build a renderer from a variables mapping, stamping `now`.
    pub fn new(variables: &Mapping, now: DateTime<Utc>) -> Result<Self> {
        let mut context =
            Context::from_serialize(variables).map_err(|e| Error::TemplateRender {
                path: VAR_KEY.to_string(),
                message: format_tera_error(&e),
            })?;
        context.insert(NOW_VARIABLE, &now.to_rfc3339_opts(SecondsFormat::Secs, true));
        Ok(Self {
            tera: Tera::default(),
            context,
        })
    }

    /// Render every string leaf of `value`. `path` names `value` in errors.
    pub fn render_value(&mut self, value: &Value, path: &str) -> Result<Value> {
        match value {
            Value::String(text) => Ok(Value::String(self.render_text(text, path)?)),
            Value::Mapping(map) => {
                let mut rendered = Mapping::with_capacity(map.len());
                for (key, child) in map {
                    let child_path = join_key(path, &key_to_string(key));
                    let new_key = match key {
                        Value::String(text) => Value::String(self.render_text(text, &child_path)?),
                        other => other.clone(),
                    };
                    if rendered.contains_key(&new_key) {
                        return Err(Error::TemplateRender {
                            path: child_path,
                            message: format!(
                                "key renders to '{}', which already exists in the same mapping",
                                key_to_string(&new_key)
                            ),
                        });
                    }
                    let new_child = self.render_value(child, &child_path)?;
                    rendered.insert(new_key, new_child);
                }
                Ok(Value::Mapping(rendered))
            }
            Value::Sequence(seq) => {
                let mut rendered = Vec::with_capacity(seq.len());
                for (idx, child) in seq.iter().enumerate() {
                    rendered.push(self.render_value(child, &join_index(path, idx))?);
                }
                Ok(Value::Sequence(rendered))
            }
            other => Ok(other.clone()),
        }
    }

    fn render_text(&mut self, text: &str, path: &str) -> Result<String> {
        if !has_template_syntax(text) {
            return Ok(text.to_string());
        }
        debug!("Rendering template at '{}'", path);
        self.tera
            .render_str(text, &self.context)
            .map_err(|e| Error::TemplateRender {
                path: path.to_string(),
                message: format_tera_error(&e),
            })
    }
}

/// Render `value` against `variables` with the current time.
pub fn render_tree(value: &Value, variables: &Mapping) -> Result<Value> {
    Renderer::new(variables, Utc::now())?.render_value(value, "")
}

/// Render the document against its own `var` mapping, then drop `var`.
pub fn render(document: &mut ConfigDocument) -> Result<()> {
    render_at(document, Utc::now())
}

/// [`render`] with a fixed timestamp.
pub fn render_at(document: &mut ConfigDocument, now: DateTime<Utc>) -> Result<()> {
    let variables = match document.get(VAR_KEY) {
        None | Some(Value::Null) => Mapping::new(),
        Some(Value::Mapping(map)) => map.clone(),
        Some(_) => {
            return Err(Error::TemplateRender {
                path: VAR_KEY.to_string(),
                message: "variables must be a mapping".to_string(),
            })
        }
    };
    let mut renderer = Renderer::new(&variables, now)?;
    let rendered = renderer.render_value(document.as_value(), "")?;
    *document.value_mut() = rendered;
    document.remove(VAR_KEY);
    Ok(())
}

/// Flatten a Tera error chain into one message.
fn format_tera_error(error: &tera::Error) -> String {
    use std::error::Error as _;

    let mut messages = vec![error.to_string()];
    let mut current = error.source();
    while let Some(err) = current {
        messages.push(err.to_string());
        current = err.source();
    }
    messages
        .into_iter()
        .map(|msg| {
            msg.replace("Failed to render '__tera_one_off'", "")
                .replace("Failed to parse '__tera_one_off'", "syntax error")
                .replace("'__tera_one_off'", "template")
                .trim()
                .to_string()
        })
        .filter(|msg| !msg.is_empty())
        .collect::<Vec<_>>()
        .join(": ")
}
