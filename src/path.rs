//! Key path expressions for navigating configuration documents
//!
//! Paths like `servers[0].host` or `project["special.key"]` are parsed into a
//! sequence of [`PathSegment`]s. The same grammar is used by self-reference
//! markers, tag filter expressions and merge policy lookups.

use glob::Pattern;

use crate::error::{Error, Result};

/// Represents a segment in a path expression for navigating nested structures
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathSegment {
    /// A named key for accessing mapping members
    Key(String),
    /// A numeric index for accessing sequence elements
    Index(usize),
    /// Every member of a mapping or sequence (`*` or `[*]`)
    Wildcard,
}

/// Parse a path string into segments
///
/// Supports:
/// - Dot notation: `foo.bar.baz`
/// - Bracket notation: `foo["bar"]` or `foo['bar']`
/// - Array indices: `foo[0]` or `items[1].name`
/// - Escaped characters: `foo\.bar` (literal dot)
/// - Wildcards: `items[*].name` or `servers.*.port`
///
/// # Examples
///
/// ```
/// use repo_control::path::{parse_path, PathSegment};
///
/// let segments = parse_path("servers[0].host");
/// assert_eq!(segments.len(), 3);
/// assert_eq!(segments[1], PathSegment::Index(0));
/// ```
pub fn parse_path(path: &str) -> Vec<PathSegment> {
    if path.trim().is_empty() || path == "/" {
        return Vec::new();
    }

    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars().peekable();
    let mut escaped = false;

    while let Some(ch) = chars.next() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }

        match ch {
            '\\' => {
                escaped = true;
            }
            '.' => {
                push_key(&mut segments, &mut current);
            }
            '[' => {
                push_key(&mut segments, &mut current);

                let first_char = chars.peek().copied();

                if let Some(quote_char) = first_char.filter(|c| *c == '"' || *c == '\'') {
                    chars.next();
                    let mut key = String::new();
                    let mut bracket_escaped = false;

                    while let Some(ch) = chars.next() {
                        if bracket_escaped {
                            key.push(ch);
                            bracket_escaped = false;
                        } else if ch == '\\' {
                            bracket_escaped = true;
                        } else if ch == quote_char {
                            if chars.peek() == Some(&']') {
                                chars.next();
                                break;
                            }
                            key.push(ch);
                        } else {
                            key.push(ch);
                        }
                    }

                    segments.push(PathSegment::Key(key));
                } else {
                    let mut bracket_content = String::new();
                    while let Some(&next_ch) = chars.peek() {
                        chars.next();
                        if next_ch == ']' {
                            break;
                        }
                        bracket_content.push(next_ch);
                    }

                    let trimmed = bracket_content.trim();
                    if trimmed == "*" {
                        segments.push(PathSegment::Wildcard);
                    } else if let Ok(idx) = trimmed.parse::<usize>() {
                        segments.push(PathSegment::Index(idx));
                    } else if !trimmed.is_empty() {
                        segments.push(PathSegment::Key(trimmed.to_string()));
                    }
                }
            }
            _ => current.push(ch),
        }
    }

    push_key(&mut segments, &mut current);
    segments
}

fn push_key(segments: &mut Vec<PathSegment>, current: &mut String) {
    if current.is_empty() {
        return;
    }
    if current == "*" {
        segments.push(PathSegment::Wildcard);
    } else {
        segments.push(PathSegment::Key(current.clone()));
    }
    current.clear();
}

/// Render segments back into a dotted path, e.g. `a.b[0]`.
///
/// Keys containing dots or brackets are quoted so the result parses back to
/// the same segments.
pub fn format_path(segments: &[PathSegment]) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            PathSegment::Key(key) if key.contains(['.', '[', ']']) => {
                out.push_str(&format!("[\"{}\"]", key));
            }
            PathSegment::Key(key) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(key);
            }
            PathSegment::Index(idx) => out.push_str(&format!("[{}]", idx)),
            PathSegment::Wildcard => out.push_str("[*]"),
        }
    }
    out
}

/// Append a key to a dotted path.
pub fn join_key(parent: &str, key: &str) -> String {
    let single = format_path(&[PathSegment::Key(key.to_string())]);
    if parent.is_empty() || single.starts_with('[') {
        format!("{}{}", parent, single)
    } else {
        format!("{}.{}", parent, single)
    }
}

/// Append an index to a dotted path.
pub fn join_index(parent: &str, idx: usize) -> String {
    format!("{}[{}]", parent, idx)
}

/// JSON-path style rendering used in validation errors (`$.a.b[0]`).
pub fn json_path(path: &str) -> String {
    if path.is_empty() {
        "$".to_string()
    } else if path.starts_with('[') {
        format!("${}", path)
    } else {
        format!("$.{}", path)
    }
}

/// Match a path against a glob pattern
pub fn glob_match(pattern: &str, path: &str) -> Result<bool> {
    let pattern = Pattern::new(pattern).map_err(Error::Glob)?;
    Ok(pattern.matches(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_path_simple_dot_notation() {
        let segments = parse_path("foo.bar.baz");
        assert_eq!(
            segments,
            vec![
                PathSegment::Key("foo".to_string()),
                PathSegment::Key("bar".to_string()),
                PathSegment::Key("baz".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_path_mixed() {
        let segments = parse_path("servers[0].host");
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0], PathSegment::Key("servers".to_string()));
        assert_eq!(segments[1], PathSegment::Index(0));
        assert_eq!(segments[2], PathSegment::Key("host".to_string()));
    }

    #[test]
    fn test_parse_path_quoted_key() {
        let segments = parse_path(r#"config["special.key"]"#);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1], PathSegment::Key("special.key".to_string()));
    }

    #[test]
    fn test_parse_path_empty() {
        assert!(parse_path("").is_empty());
        assert!(parse_path("/").is_empty());
    }

    #[test]
    fn test_parse_path_escaped_dot() {
        let segments = parse_path(r"foo\.bar.baz");
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0], PathSegment::Key("foo.bar".to_string()));
    }

    #[test]
    fn test_parse_path_wildcards() {
        assert_eq!(
            parse_path("items[*].name"),
            vec![
                PathSegment::Key("items".to_string()),
                PathSegment::Wildcard,
                PathSegment::Key("name".to_string()),
            ]
        );
        assert_eq!(parse_path("a.*")[1], PathSegment::Wildcard);
    }

    #[test]
    fn test_format_path_round_trips_special_keys() {
        let path = r#"a["b.c"][2].d"#;
        let segments = parse_path(path);
        assert_eq!(format_path(&segments), path);
        assert_eq!(parse_path(&format_path(&segments)), segments);
    }

    #[test]
    fn test_join_helpers() {
        assert_eq!(join_key("", "a"), "a");
        assert_eq!(join_key("a", "b"), "a.b");
        assert_eq!(join_key("a", "x.y"), r#"a["x.y"]"#);
        assert_eq!(join_index("a.b", 3), "a.b[3]");
    }

    #[test]
    fn test_json_path() {
        assert_eq!(json_path(""), "$");
        assert_eq!(json_path("file_a.path"), "$.file_a.path");
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("*.yaml", "bug.yaml").unwrap());
        assert!(!glob_match("*.yaml", "bug.md").unwrap());
    }
}
