//! YAML frontmatter: locating the `---` block, parsing it into a JSON value
//! tree and rewriting it in place.

use serde_json::{Map, Value};

use crate::error::AppError;

/// A `---` delimited block at the very top of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrontmatterSplit<'a> {
    /// YAML between the delimiters, including its trailing newline.
    pub yaml: &'a str,
    /// Byte offset of the first byte after the closing delimiter line.
    pub body_offset: usize,
    /// Line index of the closing delimiter.
    pub end_line: usize,
}

pub fn split(text: &str) -> Option<FrontmatterSplit<'_>> {
    let mut lines = text.split_inclusive('\n');
    let first = lines.next()?;
    if first.trim_end() != "---" || !first.ends_with('\n') {
        return None;
    }
    let yaml_start = first.len();
    let mut offset = yaml_start;
    for (i, line) in lines.enumerate() {
        if line.trim_end() == "---" {
            return Some(FrontmatterSplit {
                yaml: text.get(yaml_start..offset)?,
                body_offset: offset + line.len(),
                end_line: i + 1,
            });
        }
        offset += line.len();
    }
    None
}

/// Parse frontmatter YAML. An empty block parses as an empty mapping.
pub fn parse(yaml: &str) -> Result<Value, AppError> {
    if yaml.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    let value: Value = serde_yaml::from_str(yaml)?;
    Ok(match value {
        Value::Null => Value::Object(Map::new()),
        other => other,
    })
}

fn serialize(value: &Value) -> Result<String, AppError> {
    match value {
        Value::Object(map) if map.is_empty() => Ok(String::new()),
        other => Ok(serde_yaml::to_string(other)?),
    }
}

/// Parse the document's frontmatter, let `edit` mutate it, and return the
/// document with the block re-serialized. Documents without frontmatter gain one.
pub fn process<F>(text: &str, edit: F) -> Result<String, AppError>
where
    F: FnOnce(&mut Value) -> Result<(), AppError>,
{
    let (mut value, body) = match split(text) {
        Some(fm) => (parse(fm.yaml)?, text.get(fm.body_offset..).unwrap_or_default()),
        None => (Value::Object(Map::new()), text),
    };
    edit(&mut value)?;
    let yaml = serialize(&value)?;
    Ok(format!("---\n{yaml}---\n{body}"))
}
