//! Lookups over structural caches: heading ranges, block and unique-id
//! owners, the block under a line, and comma-delimited frontmatter paths.

use std::borrow::Borrow;

use serde::Serialize;
use serde_json::Value;

use crate::error::AppError;
use crate::metadata::{CachedMetadata, ListItemCache, Pos, SectionCache, SectionKind};

// ── Headings ────────────────────────────────────────────────────

/// Lines owned by a heading, both 0-based.
///
/// `first_line` is the line right after the heading itself; `last_line` is
/// the line right after the last section before the next heading of any level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HeadingRange {
    pub first_line: usize,
    pub last_line: usize,
}

pub fn resolve_heading_range(
    cache: &CachedMetadata,
    heading_text: &str,
) -> Result<HeadingRange, AppError> {
    let heading = cache
        .headings
        .iter()
        .find(|h| h.heading == heading_text)
        .ok_or_else(|| AppError::not_found(format!("Heading \"{heading_text}\"")))?;
    if cache.sections.is_empty() {
        return Err(AppError::internal("document cache has no sections"));
    }

    let index = cache
        .sections
        .iter()
        .position(|s| {
            s.kind == SectionKind::Heading && s.position.start.line == heading.position.start.line
        })
        .ok_or_else(|| {
            AppError::internal(format!(
                "heading \"{heading_text}\" has no matching section in the cache"
            ))
        })?;
    let section = cache
        .sections
        .get(index)
        .ok_or_else(|| AppError::internal("section index out of range"))?;

    let rest = cache.sections.get(index + 1..).unwrap_or_default();
    let next_heading = rest
        .iter()
        .position(|s| s.kind == SectionKind::Heading)
        .unwrap_or(rest.len());
    let last = next_heading
        .checked_sub(1)
        .and_then(|i| rest.get(i))
        .unwrap_or(section);

    Ok(HeadingRange {
        first_line: section.position.end.line + 1,
        last_line: last.position.end.line + 1,
    })
}

// ── Owners ──────────────────────────────────────────────────────

/// First document (in the given order) whose block map contains `block_id`.
pub fn resolve_block_owner<P, M>(
    documents: impl IntoIterator<Item = (P, M)>,
    block_id: &str,
) -> Result<P, AppError>
where
    M: Borrow<CachedMetadata>,
{
    documents
        .into_iter()
        .find(|(_, meta)| meta.borrow().blocks.contains_key(block_id))
        .map(|(path, _)| path)
        .ok_or_else(|| AppError::not_found(format!("Document with block id \"{block_id}\"")))
}

/// First document whose `id_field` equals `uid` or is a list containing it.
pub fn resolve_uid_owner<P, M>(
    documents: impl IntoIterator<Item = (P, M)>,
    id_field: &str,
    uid: &str,
) -> Result<P, AppError>
where
    M: Borrow<CachedMetadata>,
{
    documents
        .into_iter()
        .find(|(_, meta)| match meta.borrow().frontmatter_entry(id_field) {
            Some(Value::Array(ids)) => ids.iter().any(|v| value_matches(v, uid)),
            Some(v) => value_matches(v, uid),
            None => false,
        })
        .map(|(path, _)| path)
        .ok_or_else(|| AppError::not_found(format!("Document with {id_field} \"{uid}\"")))
}

fn value_matches(value: &Value, text: &str) -> bool {
    match value {
        Value::String(s) => s == text,
        Value::Number(n) => n.to_string() == text,
        _ => false,
    }
}

// ── Block under a line ──────────────────────────────────────────

/// The block a cursor on `line` belongs to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlockTarget<'a> {
    Section(&'a SectionCache),
    ListItem(&'a ListItemCache),
}

impl BlockTarget<'_> {
    pub fn id(&self) -> Option<&str> {
        match self {
            BlockTarget::Section(s) => s.id.as_deref(),
            BlockTarget::ListItem(i) => i.id.as_deref(),
        }
    }

    pub fn position(&self) -> Pos {
        match self {
            BlockTarget::Section(s) => s.position,
            BlockTarget::ListItem(i) => i.position,
        }
    }

    /// Section kind, `None` for list items.
    pub fn kind(&self) -> Option<SectionKind> {
        match self {
            BlockTarget::Section(s) => Some(s.kind),
            BlockTarget::ListItem(_) => None,
        }
    }
}

/// Last section starting at or before `line`; for lists, narrowed to the
/// innermost list item spanning the line.
pub fn resolve_block_at_line(cache: &CachedMetadata, line: usize) -> Option<BlockTarget<'_>> {
    let section = cache
        .sections
        .iter()
        .take_while(|s| s.position.start.line <= line)
        .last()?;
    if section.kind == SectionKind::List {
        let item = cache
            .list_items
            .iter()
            .filter(|i| i.position.contains_line(line))
            .max_by_key(|i| i.position.start.offset);
        if let Some(item) = item {
            return Some(BlockTarget::ListItem(item));
        }
    }
    Some(BlockTarget::Section(section))
}

// ── Frontmatter paths ───────────────────────────────────────────

/// Key of a resolved frontmatter item within its parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FrontmatterKey {
    Index(usize),
    Name(String),
}

/// Read-only reference into a frontmatter tree.
#[derive(Debug, Clone, PartialEq)]
pub struct FrontmatterRef<'a> {
    pub item: &'a Value,
    pub parent: &'a Value,
    pub key: FrontmatterKey,
}

/// Assignable location in a frontmatter tree: the parent plus the key to set.
#[derive(Debug)]
pub struct FrontmatterSlot<'a> {
    parent: &'a mut Value,
    key: FrontmatterKey,
}

impl FrontmatterSlot<'_> {
    pub fn key(&self) -> &FrontmatterKey {
        &self.key
    }

    /// Assign through the parent; a list index equal to its length appends.
    pub fn assign(self, value: Value) {
        match (self.parent, self.key) {
            (Value::Array(items), FrontmatterKey::Index(i)) => {
                if let Some(slot) = items.get_mut(i) {
                    *slot = value;
                } else if i == items.len() {
                    items.push(value);
                }
            }
            (Value::Object(map), FrontmatterKey::Name(name)) => {
                map.insert(name, value);
            }
            _ => {}
        }
    }
}

/// List index named by `segment`: a parsed integer, else the position of an
/// element equal to the segment.
fn list_index(items: &[Value], segment: &str) -> Option<usize> {
    segment
        .parse::<usize>()
        .ok()
        .or_else(|| items.iter().position(|e| e.as_str() == Some(segment)))
}

fn step<'a>(node: &'a Value, segment: &str) -> Option<(&'a Value, FrontmatterKey)> {
    match node {
        Value::Array(items) => {
            let index = list_index(items, segment)?;
            Some((items.get(index)?, FrontmatterKey::Index(index)))
        }
        Value::Object(map) => Some((map.get(segment)?, FrontmatterKey::Name(segment.to_string()))),
        _ => None,
    }
}

fn step_mut<'a>(node: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    match node {
        Value::Array(items) => {
            let index = list_index(items, segment)?;
            items.get_mut(index)
        }
        Value::Object(map) => map.get_mut(segment),
        _ => None,
    }
}

/// Walk `path` (comma separated) from `root`. Any missing node, including the
/// last one, yields `None`.
pub fn resolve_frontmatter_path<'a>(root: &'a Value, path: &str) -> Option<FrontmatterRef<'a>> {
    let mut parent = root;
    let mut current = root;
    let mut key = FrontmatterKey::Name(String::new());
    for segment in path.split(',') {
        let (next, next_key) = step(current, segment)?;
        parent = current;
        current = next;
        key = next_key;
    }
    Some(FrontmatterRef {
        item: current,
        parent,
        key,
    })
}

/// Like [`resolve_frontmatter_path`] but for assignment: every intermediate
/// node must exist, while the final key may be new.
pub fn resolve_frontmatter_slot<'a>(root: &'a mut Value, path: &str) -> Option<FrontmatterSlot<'a>> {
    let segments: Vec<&str> = path.split(',').collect();
    let (last, init) = segments.split_last()?;
    let mut current = root;
    for segment in init {
        current = step_mut(current, segment)?;
    }
    let key = match &*current {
        Value::Array(items) => {
            let index = list_index(items, last)?;
            if index > items.len() {
                return None;
            }
            FrontmatterKey::Index(index)
        }
        Value::Object(_) => FrontmatterKey::Name((*last).to_string()),
        _ => return None,
    };
    Some(FrontmatterSlot {
        parent: current,
        key,
    })
}
