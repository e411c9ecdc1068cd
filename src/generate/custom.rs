//! Custom artifacts declared by `file_<id>` keys

use log::debug;
use serde_yaml::Value;

use super::previous_path;
use crate::artifact::{ArtifactDescriptor, ArtifactType, Subtype};
use crate::document::ConfigDocument;
use crate::error::{Error, Result};
use crate::format::DataFormat;
use crate::validate::FILE_KEY_PREFIX;

/// One descriptor per `file_<id>` key, plus stale ones for ids the previous
/// run recorded that are no longer declared.
pub fn generate(
    document: &ConfigDocument,
    previous: Option<&ConfigDocument>,
) -> Result<Vec<ArtifactDescriptor>> {
    let mut out = Vec::new();
    let mut ids = Vec::new();

    for key in document.keys_with_prefix(FILE_KEY_PREFIX) {
        let id = key[FILE_KEY_PREFIX.len()..].to_string();
        let Some(spec) = document.get(&key).and_then(Value::as_mapping) else {
            continue;
        };
        let field = |name: &str| spec.get(name).and_then(Value::as_str);

        let label = field("name").unwrap_or(&id).to_string();
        let path = field("path").unwrap_or_default().to_string();
        let path_before = previous_path(previous, ArtifactType::Custom, &id)
            .or_else(|| Some(path.clone()).filter(|p| !p.is_empty()));
        let executable = spec
            .get("executable")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let descriptor = ArtifactDescriptor::new(ArtifactType::Custom, Subtype::new(&id, label))
            .with_path_before(path_before)
            .with_executable(executable);

        let descriptor = match field("status").unwrap_or("active") {
            "inactive" => descriptor.with_path(path).inactive(),
            "delete" => descriptor,
            _ => {
                let content = render_content(spec.get("content"), field("format"), &key)?;
                descriptor.with_content(content).with_path(path)
            }
        };
        debug!("Generated custom artifact '{}'", id);
        ids.push(id);
        out.push(descriptor);
    }

    out.extend(super::stale_from_manifest(
        previous,
        ArtifactType::Custom,
        &ids,
    ));
    Ok(out)
}

fn render_content(content: Option<&Value>, format: Option<&str>, key: &str) -> Result<String> {
    let content = content.unwrap_or(&Value::Null);
    let format = match format.unwrap_or("text") {
        "text" => {
            return match content {
                Value::String(text) => Ok(text.clone()),
                Value::Null => Ok(String::new()),
                _ => Err(Error::Serialization {
                    message: format!("Content of '{}' must be text", key),
                }),
            };
        }
        other => DataFormat::from_extension(other).ok_or_else(|| Error::UnsupportedFormat {
            source_name: key.to_string(),
            extension: other.to_string(),
        })?,
    };
    match content {
        Value::String(text) => Ok(text.clone()),
        structured => format.serialize(structured),
    }
}
