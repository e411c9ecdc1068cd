//! Custom YAML tags
//!
//! Fragments may contain tagged scalars such as
//!
//! ```yaml
//! license: !ext "https://example.com/licenses.yaml $.mit"
//! ```
//!
//! `serde_yaml` keeps such nodes as [`Value::Tagged`]. After a fragment is
//! parsed, [`resolve_tags`] walks the tree and hands every tagged node to the
//! [`TagResolver`] registered for its tag. The only built-in resolver is
//! [`ExternalResolver`], which replaces the node with (a filtered part of) a
//! fetched structured resource.
//!
//! `serde_yaml` values carry no source positions, so [`TagLocator`] recovers
//! the line and column of the n-th occurrence of a tag by scanning the source
//! text. Tagged nodes are visited in document order, which keeps the two in
//! step.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde_yaml::Value;
use url::Url;

use crate::cache::{CacheStore, EXTENSION_CACHE_TYPE};
use crate::document::{lookup, scalar_to_string};
use crate::error::{Error, Location, Result};
use crate::fetch::Fetcher;
use crate::format::DataFormat;
use crate::path::{parse_path, PathSegment};

/// Tag that includes an external resource.
pub const EXTERNAL_TAG: &str = "!ext";

/// Resolves the value of one custom tag into a replacement value.
pub trait TagResolver {
    /// The tag handled, including the leading `!`.
    fn tag(&self) -> &str;

    /// Produce the value that replaces a node tagged with [`Self::tag`].
    ///
    /// `tag_value` is the trimmed, non-empty scalar following the tag.
    fn resolve(&mut self, tag_value: &str, location: &Location) -> Result<Value>;
}

/// Replace every tagged node in `value` using `resolvers`.
///
/// # Errors
///
/// - `Error::EmptyTag` when a tag has no value
/// - `Error::DataRead` when no resolver is registered for a tag
/// - Any error returned by a resolver
pub fn resolve_tags<'r>(
    value: &mut Value,
    resolvers: &mut [&mut (dyn TagResolver + 'r)],
    locator: &mut TagLocator,
) -> Result<()> {
    match value {
        Value::Tagged(tagged) => {
            let Some(idx) = resolvers.iter().position(|r| tagged.tag == r.tag()) else {
                return Err(Error::DataRead {
                    source_name: locator.source().display().to_string(),
                    message: format!("unsupported tag {}", tagged.tag),
                });
            };
            let tag = resolvers[idx].tag().to_string();
            let location = locator.locate(&tag);
            let tag_value = match &tagged.value {
                Value::String(s) => s.trim().to_string(),
                other => scalar_to_string(other).unwrap_or_default(),
            };
            if tag_value.is_empty() {
                return Err(Error::EmptyTag { tag, location });
            }
            let resolved = resolvers[idx].resolve(&tag_value, &location)?;
            *value = resolved;
        }
        Value::Mapping(map) => {
            for (_, child) in map.iter_mut() {
                resolve_tags(child, resolvers, locator)?;
            }
        }
        Value::Sequence(seq) => {
            for child in seq.iter_mut() {
                resolve_tags(child, resolvers, locator)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Finds the source position of tag occurrences, in document order.
#[derive(Debug)]
pub struct TagLocator {
    source: PathBuf,
    text: String,
    positions: HashMap<String, Vec<(usize, usize)>>,
    seen: HashMap<String, usize>,
}

impl TagLocator {
    pub fn new(source: impl Into<PathBuf>, text: &str) -> Self {
        Self {
            source: source.into(),
            text: text.to_string(),
            positions: HashMap::new(),
            seen: HashMap::new(),
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Location of the next not-yet-located occurrence of `tag`. Falls back to
    /// a file-only location when the text holds fewer occurrences than asked
    /// for.
    pub fn locate(&mut self, tag: &str) -> Location {
        let text = &self.text;
        let positions = self
            .positions
            .entry(tag.to_string())
            .or_insert_with(|| scan_positions(text, tag));
        let count = self.seen.entry(tag.to_string()).or_insert(0);
        let location = match positions.get(*count) {
            Some(&(line, column)) => Location::new(&self.source, line, column),
            None => Location::file_only(&self.source),
        };
        *count += 1;
        location
    }
}

fn scan_positions(text: &str, tag: &str) -> Vec<(usize, usize)> {
    let mut positions = Vec::new();
    for (line_idx, line) in text.lines().enumerate() {
        let code = &line[..comment_start(line).unwrap_or(line.len())];
        for (byte_idx, _) in code.match_indices(tag) {
            let before = code[..byte_idx].chars().next_back();
            let after = code[byte_idx + tag.len()..].chars().next();
            let starts_token = before.map_or(true, |c| c.is_whitespace() || "[{,:-?".contains(c));
            let ends_token = after.map_or(true, |c| c.is_whitespace() || ",]}".contains(c));
            if starts_token && ends_token {
                let column = code[..byte_idx].chars().count() + 1;
                positions.push((line_idx + 1, column));
            }
        }
    }
    positions
}

/// Byte offset of a `#` that starts a comment, if any.
fn comment_start(line: &str) -> Option<usize> {
    let mut previous: Option<char> = None;
    for (idx, ch) in line.char_indices() {
        if ch == '#' && previous.map_or(true, char::is_whitespace) {
            return Some(idx);
        }
        previous = Some(ch);
    }
    None
}

/// Select part of `data` with a filter expression.
///
/// The expression is a path with an optional leading `$`. Without wildcards
/// the single matched value is returned; with wildcards a sequence of every
/// match.
///
/// # Errors
///
/// Returns `Error::TagFilter` when nothing matches.
pub fn apply_filter(data: &Value, expression: &str, source_name: &str) -> Result<Value> {
    let trimmed = expression.trim();
    let path = trimmed.strip_prefix('$').unwrap_or(trimmed);
    let segments = parse_path(path);
    let no_match = || Error::TagFilter {
        expression: expression.to_string(),
        source_name: source_name.to_string(),
    };

    if !segments.contains(&PathSegment::Wildcard) {
        return lookup(data, &segments).cloned().ok_or_else(no_match);
    }
    let mut matches = Vec::new();
    collect_matches(data, &segments, &mut matches);
    if matches.is_empty() {
        return Err(no_match());
    }
    Ok(Value::Sequence(matches))
}

fn collect_matches(value: &Value, segments: &[PathSegment], out: &mut Vec<Value>) {
    let Some((first, rest)) = segments.split_first() else {
        out.push(value.clone());
        return;
    };
    match first {
        PathSegment::Key(key) => {
            if let Some(child) = value.as_mapping().and_then(|m| m.get(key.as_str())) {
                collect_matches(child, rest, out);
            }
        }
        PathSegment::Index(idx) => {
            if let Some(child) = value.as_sequence().and_then(|s| s.get(*idx)) {
                collect_matches(child, rest, out);
            }
        }
        PathSegment::Wildcard => match value {
            Value::Mapping(map) => {
                for child in map.values() {
                    collect_matches(child, rest, out);
                }
            }
            Value::Sequence(seq) => {
                for child in seq {
                    collect_matches(child, rest, out);
                }
            }
            _ => {}
        },
    }
}

/// Resolves `!ext "<url> [<filter>]"` by fetching and parsing the resource.
///
/// Results are cached under the full tag value, filter included. A resource
/// that includes itself, directly or through other resources, is an error.
pub struct ExternalResolver<'a> {
    fetcher: &'a dyn Fetcher,
    cache: &'a mut CacheStore,
    /// URLs currently being loaded, outermost first
    loading: Vec<String>,
}

impl<'a> ExternalResolver<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, cache: &'a mut CacheStore) -> Self {
        Self {
            fetcher,
            cache,
            loading: Vec::new(),
        }
    }

    fn load(&mut self, url: &str, location: &Location) -> Result<Value> {
        if self.loading.iter().any(|loading| loading == url) {
            let mut chain = self.loading.clone();
            chain.push(url.to_string());
            return Err(Error::UnreachableTag {
                tag: EXTERNAL_TAG.to_string(),
                url: url.to_string(),
                location: location.clone(),
                cause: Box::new(Error::DataRead {
                    source_name: url.to_string(),
                    message: format!("circular include: {}", chain.join(" -> ")),
                }),
            });
        }

        self.loading.push(url.to_string());
        let result = self.load_resource(url, location);
        self.loading.pop();
        result
    }

    fn load_resource(&mut self, url: &str, location: &Location) -> Result<Value> {
        let unreachable = |cause: Error| Error::UnreachableTag {
            tag: EXTERNAL_TAG.to_string(),
            url: url.to_string(),
            location: location.clone(),
            cause: Box::new(cause),
        };

        let parsed = Url::parse(url).map_err(|e| unreachable(Error::UrlParse(e)))?;
        let extension = Path::new(parsed.path())
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_string();
        let format =
            DataFormat::from_extension(&extension).ok_or_else(|| Error::UnsupportedFormat {
                source_name: url.to_string(),
                extension: extension.clone(),
            })?;

        let text = self.fetcher.fetch(url).map_err(unreachable)?;
        let mut data = format.parse(&text, url)?;

        if format == DataFormat::Yaml {
            let mut locator = TagLocator::new(url, &text);
            let mut own: [&mut (dyn TagResolver + 'a); 1] = [&mut *self];
            resolve_tags(&mut data, &mut own, &mut locator)?;
        }
        Ok(data)
    }
}

impl TagResolver for ExternalResolver<'_> {
    fn tag(&self) -> &str {
        EXTERNAL_TAG
    }

    fn resolve(&mut self, tag_value: &str, location: &Location) -> Result<Value> {
        if let Some(hit) = self.cache.get(EXTENSION_CACHE_TYPE, tag_value) {
            debug!("Using cached value for {} {}", EXTERNAL_TAG, tag_value);
            return Ok(hit.clone());
        }

        let (url, filter) = match tag_value.split_once(' ') {
            Some((url, filter)) => (url, Some(filter.trim()).filter(|f| !f.is_empty())),
            None => (tag_value, None),
        };
        info!("Resolving {} {} ({})", EXTERNAL_TAG, url, location);
        let data = self.load(url, location)?;
        let value = match filter {
            Some(expression) => apply_filter(&data, expression, url)?,
            None => data,
        };

        self.cache
            .set(EXTENSION_CACHE_TYPE, tag_value, value.clone());
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::MapFetcher;

    fn retention() -> HashMap<String, f64> {
        HashMap::from([(EXTENSION_CACHE_TYPE.to_string(), 24.0)])
    }

    fn resolve_text(text: &str, fetcher: &MapFetcher, cache: &mut CacheStore) -> Result<Value> {
        let mut value: Value = serde_yaml::from_str(text).unwrap();
        let mut resolver = ExternalResolver::new(fetcher, cache);
        let mut locator = TagLocator::new("main.yaml", text);
        let mut resolvers: [&mut dyn TagResolver; 1] = [&mut resolver];
        resolve_tags(&mut value, &mut resolvers, &mut locator)?;
        Ok(value)
    }

    #[test]
    fn test_resolves_whole_resource() {
        let fetcher = MapFetcher::new().with("https://example.com/data.json", "{\"k\": [1, 2]}");
        let mut cache = CacheStore::in_memory(retention());
        let value = resolve_text("data: !ext https://example.com/data.json\n", &fetcher, &mut cache)
            .unwrap();
        let expected: Value = serde_yaml::from_str("data: {k: [1, 2]}").unwrap();
        assert_eq!(value, expected);
        assert!(cache
            .get(EXTENSION_CACHE_TYPE, "https://example.com/data.json")
            .is_some());
    }

    #[test]
    fn test_filter_selects_value_and_caches_full_tag() {
        let fetcher = MapFetcher::new().with(
            "https://example.com/licenses.yaml",
            "mit:\n  name: MIT License\napache:\n  name: Apache 2.0\n",
        );
        let mut cache = CacheStore::in_memory(retention());
        let text = "license: !ext https://example.com/licenses.yaml $.mit.name\n";
        let value = resolve_text(text, &fetcher, &mut cache).unwrap();
        assert_eq!(value["license"], Value::String("MIT License".into()));
        assert!(cache
            .get(
                EXTENSION_CACHE_TYPE,
                "https://example.com/licenses.yaml $.mit.name"
            )
            .is_some());
    }

    #[test]
    fn test_cache_hit_skips_fetch() {
        let fetcher = MapFetcher::new();
        let mut cache = CacheStore::in_memory(retention());
        cache.set(
            EXTENSION_CACHE_TYPE,
            "https://example.com/gone.yaml",
            Value::String("cached".into()),
        );
        let value =
            resolve_text("x: !ext https://example.com/gone.yaml\n", &fetcher, &mut cache).unwrap();
        assert_eq!(value["x"], Value::String("cached".into()));
    }

    #[test]
    fn test_nested_tags_in_fetched_yaml() {
        let fetcher = MapFetcher::new()
            .with(
                "https://example.com/outer.yaml",
                "inner: !ext https://example.com/inner.json\n",
            )
            .with("https://example.com/inner.json", "{\"deep\": true}");
        let mut cache = CacheStore::in_memory(retention());
        let value =
            resolve_text("x: !ext https://example.com/outer.yaml\n", &fetcher, &mut cache).unwrap();
        assert_eq!(value["x"]["inner"]["deep"], Value::Bool(true));
    }

    #[test]
    fn test_circular_include_is_an_error() {
        let fetcher = MapFetcher::new()
            .with("https://example.com/loop.yaml", "x: !ext https://example.com/loop.yaml\n")
            .with("https://example.com/a.yaml", "b: !ext https://example.com/b.yaml\n")
            .with("https://example.com/b.yaml", "a: !ext https://example.com/a.yaml\n");
        let mut cache = CacheStore::in_memory(retention());

        let err = resolve_text("data: !ext https://example.com/loop.yaml\n", &fetcher, &mut cache)
            .unwrap_err();
        assert!(matches!(err, Error::UnreachableTag { .. }));

        let err = resolve_text("data: !ext https://example.com/a.yaml\n", &fetcher, &mut cache)
            .unwrap_err();
        match err {
            Error::UnreachableTag { cause, .. } => assert!(cause.to_string().contains(
                "https://example.com/a.yaml -> https://example.com/b.yaml -> https://example.com/a.yaml"
            )),
            other => panic!("expected UnreachableTag, got {:?}", other),
        }
        assert!(cache.is_empty());
    }

    #[test]
    fn test_empty_tag_reports_location() {
        let fetcher = MapFetcher::new();
        let mut cache = CacheStore::in_memory(retention());
        let text = "a: 1\nb:\n  c: !ext \"\"\n";
        let err = resolve_text(text, &fetcher, &mut cache).unwrap_err();
        match err {
            Error::EmptyTag { location, .. } => {
                assert_eq!(location.file, PathBuf::from("main.yaml"));
                assert_eq!(location.line, 3);
                assert_eq!(location.column, 6);
            }
            other => panic!("expected EmptyTag, got {:?}", other),
        }
    }

    #[test]
    fn test_unreachable_resource_keeps_cause() {
        let fetcher = MapFetcher::new();
        let mut cache = CacheStore::in_memory(retention());
        let text = "x: !ext https://example.com/missing.yaml\n";
        let err = resolve_text(text, &fetcher, &mut cache).unwrap_err();
        assert!(matches!(err, Error::UnreachableTag { .. }));
        assert_eq!(err.location().unwrap().line, 1);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_malformed_url_is_unreachable() {
        let fetcher = MapFetcher::new();
        let mut cache = CacheStore::in_memory(retention());
        let err = resolve_text("x: !ext not-a-url.yaml\n", &fetcher, &mut cache).unwrap_err();
        assert!(matches!(err, Error::UnreachableTag { .. }));
    }

    #[test]
    fn test_unsupported_extension() {
        let fetcher = MapFetcher::new().with("https://example.com/readme.md", "# hi");
        let mut cache = CacheStore::in_memory(retention());
        let err =
            resolve_text("x: !ext https://example.com/readme.md\n", &fetcher, &mut cache).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_apply_filter_wildcard_and_missing() {
        let data: Value = serde_yaml::from_str("items:\n  - name: a\n  - name: b\n").unwrap();
        let names = apply_filter(&data, "$.items[*].name", "src").unwrap();
        let expected: Value = serde_yaml::from_str("[a, b]").unwrap();
        assert_eq!(names, expected);

        let single = apply_filter(&data, "items[1].name", "src").unwrap();
        assert_eq!(single, Value::String("b".into()));

        let err = apply_filter(&data, "$.nothing", "src").unwrap_err();
        assert!(matches!(err, Error::TagFilter { .. }));
    }

    #[test]
    fn test_locator_skips_comments_and_counts_occurrences() {
        let text = "# !ext in a comment\na: !ext one\nb: [x, !ext two]\n";
        let mut locator = TagLocator::new("f.yaml", text);
        assert_eq!(locator.locate(EXTERNAL_TAG), Location::new("f.yaml", 2, 4));
        assert_eq!(locator.locate(EXTERNAL_TAG), Location::new("f.yaml", 3, 8));
        assert_eq!(locator.locate(EXTERNAL_TAG).line, 0);
    }
}
