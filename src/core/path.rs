//! JSONPath evaluation and the structural rewrites applied to presentation
//! definitions before their constraints are evaluated.
//!
//! Queries are evaluated with [serde_json_path], which implements
//! [RFC 9535](https://www.rfc-editor.org/rfc/rfc9535). Definitions found in the
//! wild frequently use Goessner-style dotted names that RFC 9535 rejects
//! (`$.@context`, `$.credentialSubject.first-name`), so [rewrite_special_paths]
//! brings every constraint path into bracket notation first.

use serde_json::Value;
use serde_json_path::JsonPath;

/// A value selected by a JSONPath query, together with its location.
#[derive(Debug, Clone, PartialEq)]
pub struct PathMatch<'a> {
    /// Normalized path of the node, e.g. `$['credentialSubject']['id']`.
    pub location: String,
    /// Reference tokens of the node location, in JSON Pointer form.
    pub pointer: Vec<String>,
    pub value: &'a Value,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("malformed JSONPath expression `{expression}`: {reason}")]
    Malformed { expression: String, reason: String },
}

/// Parse a JSONPath expression.
pub fn parse(expression: &str) -> Result<JsonPath, PathError> {
    JsonPath::parse(expression).map_err(|e| PathError::Malformed {
        expression: expression.to_owned(),
        reason: e.to_string(),
    })
}

/// Evaluate `expression` against `document`.
///
/// Returns every matching node in document order. A path that selects
/// nothing yields an empty vector; only a malformed expression is an error.
pub fn resolve<'a>(document: &'a Value, expression: &str) -> Result<Vec<PathMatch<'a>>, PathError> {
    let path = parse(expression)?;

    Ok(path
        .query_located(document)
        .iter()
        .map(|node| PathMatch {
            location: node.location().to_string(),
            pointer: pointer_tokens(&node.location().to_json_pointer()),
            value: node.node(),
        })
        .collect())
}

/// Split a JSON Pointer into its unescaped reference tokens.
fn pointer_tokens(pointer: &str) -> Vec<String> {
    if pointer.is_empty() {
        return Vec::new();
    }

    pointer
        .trim_start_matches('/')
        .split('/')
        .map(|token| token.replace("~1", "/").replace("~0", "~"))
        .collect()
}

/// Rename every object key `from` to `to`, at any depth.
///
/// Presentation definitions escape JSON Schema keywords that collide with
/// the host document (`_const`, `_enum`); this restores them. When an object
/// already holds `to`, the renamed value replaces it.
pub fn rename_key_recursively(document: &mut Value, from: &str, to: &str) {
    match document {
        Value::Object(map) => {
            if let Some(value) = map.remove(from) {
                map.insert(to.to_owned(), value);
            }
            for value in map.values_mut() {
                rename_key_recursively(value, from, to);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                rename_key_recursively(item, from, to);
            }
        }
        _ => {}
    }
}

/// Rewrite every string of every `path` array in `document` into its
/// canonical form, see [canonical_path].
pub fn rewrite_special_paths(document: &mut Value) {
    match document {
        Value::Object(map) => {
            for (key, value) in map.iter_mut() {
                match value {
                    Value::Array(paths) if key == "path" => {
                        for path in paths.iter_mut() {
                            if let Value::String(expression) = path {
                                *expression = canonical_path(expression);
                            } else {
                                rewrite_special_paths(path);
                            }
                        }
                    }
                    _ => rewrite_special_paths(value),
                }
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                rewrite_special_paths(item);
            }
        }
        _ => {}
    }
}

/// Rewrite dotted member names that are not valid RFC 9535 shorthands into
/// bracket notation.
///
/// `$.@context` becomes `$['@context']` and `$..first-name` becomes
/// `$..['first-name']`. Bracketed segments, filters with nested brackets
/// included, are copied untouched.
pub fn canonical_path(expression: &str) -> String {
    let chars: Vec<char> = expression.chars().collect();
    let mut out = String::with_capacity(expression.len() + 8);
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '[' => {
                let mut quote: Option<char> = None;
                let mut depth = 0;
                while i < chars.len() {
                    let c = chars[i];
                    out.push(c);
                    i += 1;
                    match quote {
                        Some(_) if c == '\\' => {
                            if let Some(escaped) = chars.get(i) {
                                out.push(*escaped);
                                i += 1;
                            }
                        }
                        Some(q) if c == q => quote = None,
                        Some(_) => {}
                        None if c == '\'' || c == '"' => quote = Some(c),
                        None if c == '[' => depth += 1,
                        None if c == ']' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        None => {}
                    }
                }
            }
            '.' => {
                let descendant = chars.get(i + 1) == Some(&'.');
                i += if descendant { 2 } else { 1 };

                let start = i;
                while i < chars.len() && chars[i] != '.' && chars[i] != '[' {
                    i += 1;
                }
                let name: String = chars[start..i].iter().collect();

                if name.is_empty() || name == "*" || is_member_name_shorthand(&name) {
                    out.push_str(if descendant { ".." } else { "." });
                    out.push_str(&name);
                } else {
                    if descendant {
                        out.push_str("..");
                    }
                    out.push_str("['");
                    out.push_str(&name.replace('\\', "\\\\").replace('\'', "\\'"));
                    out.push_str("']");
                }
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

fn is_member_name_shorthand(name: &str) -> bool {
    let is_first = |c: char| c.is_ascii_alphabetic() || c == '_' || !c.is_ascii();

    let mut chars = name.chars();
    match chars.next() {
        Some(first) if is_first(first) => chars.all(|c| is_first(c) || c.is_ascii_digit()),
        _ => false,
    }
}
