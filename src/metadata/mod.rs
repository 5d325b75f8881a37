//! Structural cache of a markdown document: sections, headings, blocks,
//! list items and parsed frontmatter, all positioned by 0-based line.

pub mod frontmatter;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loc {
    pub line: usize,
    pub col: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pos {
    pub start: Loc,
    pub end: Loc,
}

impl Pos {
    pub fn contains_line(&self, line: usize) -> bool {
        self.start.line <= line && line <= self.end.line
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SectionKind {
    Yaml,
    Heading,
    Paragraph,
    List,
    Code,
    Blockquote,
    Table,
    ThematicBreak,
    Html,
    FootnoteDefinition,
    Comment,
}

impl SectionKind {
    /// Sections whose block id must go on its own line after the block.
    pub fn wants_detached_id(self) -> bool {
        matches!(
            self,
            SectionKind::Blockquote
                | SectionKind::Code
                | SectionKind::Table
                | SectionKind::Heading
                | SectionKind::Comment
                | SectionKind::FootnoteDefinition
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionCache {
    #[serde(rename = "type")]
    pub kind: SectionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub position: Pos,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingCache {
    pub heading: String,
    pub level: u8,
    pub position: Pos,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockCache {
    pub id: String,
    pub position: Pos,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItemCache {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Start line of the parent item, or the negated start line of the list for top-level items.
    pub parent: i64,
    pub position: Pos,
}

/// Everything the indexer knows about one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CachedMetadata {
    pub sections: Vec<SectionCache>,
    pub headings: Vec<HeadingCache>,
    pub blocks: IndexMap<String, BlockCache>,
    pub list_items: Vec<ListItemCache>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frontmatter: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frontmatter_position: Option<Pos>,
}

impl CachedMetadata {
    /// Frontmatter entry for `key`, exactly as written.
    pub fn frontmatter_entry(&self, key: &str) -> Option<&Value> {
        self.frontmatter
            .as_ref()
            .and_then(|fm| fm.get(key))
            .filter(|v| !v.is_null())
    }

    /// Whether the parsed frontmatter is missing or has no keys.
    pub fn frontmatter_is_empty(&self) -> bool {
        match &self.frontmatter {
            None | Some(Value::Null) => true,
            Some(Value::Object(map)) => map.is_empty(),
            Some(_) => false,
        }
    }
}
