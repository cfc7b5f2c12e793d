//! YAML frontmatter extraction from Markdown content files.
//!
//! Every content file starts with a YAML block delimited by `---` lines:
//!
//! ```markdown
//! ---
//! title: Hello World
//! date: 2024-01-03
//! tags: [rust, cms]
//! ---
//!
//! The body starts here.
//! ```
//!
//! Unlike general-purpose Markdown tooling, the indexer requires the block: a
//! file without one is not content, so every failure mode is an error the
//! scanner records against the file.

use serde_yaml::{Mapping, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrontmatterError {
    #[error("missing frontmatter (file must start with a '---' line)")]
    Missing,
    #[error("frontmatter is not terminated by a closing '---' line")]
    Unterminated,
    #[error("invalid frontmatter YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("frontmatter must be a mapping of keys to values")]
    NotAMapping,
}

/// Parsed frontmatter plus the body that follows it.
#[derive(Debug, Clone)]
pub struct Frontmatter<'a> {
    fields: Mapping,
    body: &'a str,
}

impl<'a> Frontmatter<'a> {
    /// Raw YAML value for a key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// String value for a key. Numbers and booleans are not coerced.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_str()
    }

    /// Scalar value for a key rendered as a string (`title: 2024` → `"2024"`).
    pub fn get_scalar(&self, key: &str) -> Option<String> {
        self.get(key).and_then(scalar_to_string)
    }

    /// A scalar or a list of scalars, as strings.
    ///
    /// `tags: rust` and `tags: [rust]` both yield `["rust"]`. Missing keys and
    /// nested structures yield an empty list.
    pub fn get_string_list(&self, key: &str) -> Vec<String> {
        match self.get(key) {
            Some(Value::Sequence(seq)) => seq.iter().filter_map(scalar_to_string).collect(),
            Some(value) => scalar_to_string(value).into_iter().collect(),
            None => Vec::new(),
        }
    }

    /// All top-level keys with string names, in document order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().filter_map(|(k, v)| k.as_str().map(|k| (k, v)))
    }

    /// Everything after the closing delimiter.
    pub fn body(&self) -> &'a str {
        self.body
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn is_delimiter(line: &str) -> bool {
    line.trim_end() == "---"
}

/// Split `content` into frontmatter and body.
///
/// Accepts `\n` and `\r\n` line endings and a leading byte-order mark. An
/// empty block (`---\n---`) parses as an empty mapping.
pub fn extract(content: &str) -> Result<Frontmatter<'_>, FrontmatterError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut lines = content.split_inclusive('\n');
    let first = lines.next().ok_or(FrontmatterError::Missing)?;
    if !is_delimiter(first) {
        return Err(FrontmatterError::Missing);
    }

    let yaml_start = first.len();
    let mut offset = yaml_start;
    for line in lines {
        if is_delimiter(line) {
            let yaml = &content[yaml_start..offset];
            let body = &content[offset + line.len()..];
            let fields = parse_mapping(yaml)?;
            return Ok(Frontmatter { fields, body });
        }
        offset += line.len();
    }
    Err(FrontmatterError::Unterminated)
}

fn parse_mapping(yaml: &str) -> Result<Mapping, FrontmatterError> {
    if yaml.trim().is_empty() {
        return Ok(Mapping::new());
    }
    match serde_yaml::from_str::<Value>(yaml)? {
        Value::Mapping(map) => Ok(map),
        Value::Null => Ok(Mapping::new()),
        _ => Err(FrontmatterError::NotAMapping),
    }
}
