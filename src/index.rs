//! Markdown indexer producing [`CachedMetadata`] for a document.
//!
//! Block structure comes from `pulldown-cmark`; frontmatter is split off first
//! so that its `---` fences are never mistaken for thematic breaks.

use std::sync::LazyLock;

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use regex::Regex;

use crate::metadata::frontmatter;
use crate::metadata::{
    BlockCache, CachedMetadata, HeadingCache, ListItemCache, Loc, Pos, SectionCache, SectionKind,
};

/// `^block-id` at the end of the last line of a paragraph or list item.
#[allow(clippy::unwrap_used)]
static BLOCK_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)\^([A-Za-z0-9-]+)\s*$").unwrap());

/// Byte offset → line/column lookup.
struct LineTable<'a> {
    text: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineTable<'a> {
    fn new(text: &'a str) -> Self {
        let mut starts = vec![0];
        starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { text, starts }
    }

    fn loc(&self, offset: usize) -> Loc {
        let line = self.starts.partition_point(|&s| s <= offset).saturating_sub(1);
        let line_start = self.starts.get(line).copied().unwrap_or(0);
        Loc {
            line,
            col: offset - line_start,
            offset,
        }
    }

    /// Position of `start..end`, with trailing whitespace excluded from the end.
    fn pos(&self, start: usize, end: usize) -> Pos {
        let bytes = self.text.as_bytes();
        let mut end = end.min(bytes.len());
        while end > start && bytes.get(end - 1).is_some_and(u8::is_ascii_whitespace) {
            end -= 1;
        }
        Pos {
            start: self.loc(start),
            end: self.loc(end),
        }
    }

    fn slice(&self, pos: &Pos) -> &'a str {
        self.text.get(pos.start.offset..pos.end.offset).unwrap_or_default()
    }
}

fn section_kind(tag: &Tag<'_>) -> Option<SectionKind> {
    Some(match tag {
        Tag::Heading { .. } => SectionKind::Heading,
        Tag::Paragraph => SectionKind::Paragraph,
        Tag::List(_) => SectionKind::List,
        Tag::CodeBlock(_) => SectionKind::Code,
        Tag::BlockQuote(_) => SectionKind::Blockquote,
        Tag::Table(_) => SectionKind::Table,
        Tag::HtmlBlock => SectionKind::Html,
        Tag::FootnoteDefinition(_) => SectionKind::FootnoteDefinition,
        _ => return None,
    })
}

fn trailing_block_id(text: &str) -> Option<String> {
    let last = text.lines().last()?;
    BLOCK_ID
        .captures(last)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

struct OpenItem {
    start: usize,
    own_end: Option<usize>,
    parent: i64,
}

/// Build the structural cache of a markdown document.
pub fn index_markdown(text: &str) -> CachedMetadata {
    let lines = LineTable::new(text);
    let mut meta = CachedMetadata::default();

    let body_offset = match frontmatter::split(text) {
        Some(fm) => {
            let position = lines.pos(0, fm.body_offset);
            meta.sections.push(SectionCache {
                kind: SectionKind::Yaml,
                id: None,
                position,
            });
            meta.frontmatter_position = Some(position);
            match frontmatter::parse(fm.yaml) {
                Ok(value) => meta.frontmatter = Some(value),
                Err(e) => tracing::debug!(error = %e, "ignoring unparsable frontmatter"),
            }
            fm.body_offset
        }
        None => 0,
    };
    let body = text.get(body_offset..).unwrap_or_default();

    let options = Options::ENABLE_TABLES | Options::ENABLE_FOOTNOTES;
    let mut depth = 0usize;
    let mut heading: Option<(u8, Pos, String)> = None;
    let mut items: Vec<OpenItem> = Vec::new();
    let mut list_starts: Vec<usize> = Vec::new();

    for (event, range) in Parser::new_ext(body, options).into_offset_iter() {
        let start = range.start + body_offset;
        let end = range.end + body_offset;
        match event {
            Event::Start(tag) => {
                if depth == 0 {
                    if let Some(kind) = section_kind(&tag) {
                        meta.sections.push(SectionCache {
                            kind,
                            id: None,
                            position: lines.pos(start, end),
                        });
                    }
                }
                match tag {
                    // Headings nested in quotes or list items are not outline entries.
                    Tag::Heading { level, .. } if depth == 0 => {
                        heading = Some((level as u8, lines.pos(start, end), String::new()));
                    }
                    Tag::List(_) => {
                        if let Some(item) = items.last_mut() {
                            item.own_end.get_or_insert(start);
                        }
                        list_starts.push(start);
                    }
                    Tag::Item => {
                        let parent = match items.last() {
                            Some(p) => i64::try_from(lines.loc(p.start).line).unwrap_or(i64::MAX),
                            None => {
                                let list_line = list_starts.last().map_or(0, |&s| lines.loc(s).line);
                                -i64::try_from(list_line).unwrap_or(i64::MAX)
                            }
                        };
                        items.push(OpenItem {
                            start,
                            own_end: None,
                            parent,
                        });
                    }
                    _ => {}
                }
                depth += 1;
            }
            Event::End(tag_end) => {
                depth = depth.saturating_sub(1);
                match tag_end {
                    TagEnd::Heading(_) => {
                        if let Some((level, position, text)) = heading.take() {
                            meta.headings.push(HeadingCache {
                                heading: text.trim().to_string(),
                                level,
                                position,
                            });
                        }
                    }
                    TagEnd::List(_) => {
                        list_starts.pop();
                    }
                    TagEnd::Item => {
                        if let Some(item) = items.pop() {
                            let position = lines.pos(item.start, item.own_end.unwrap_or(end));
                            let id = trailing_block_id(lines.slice(&position));
                            if let Some(id) = &id {
                                meta.blocks.insert(
                                    id.clone(),
                                    BlockCache {
                                        id: id.clone(),
                                        position,
                                    },
                                );
                            }
                            meta.list_items.push(ListItemCache {
                                id,
                                parent: item.parent,
                                position,
                            });
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(t) | Event::Code(t) => {
                if let Some((_, _, text)) = heading.as_mut() {
                    text.push_str(&t);
                }
            }
            Event::Rule if depth == 0 => {
                meta.sections.push(SectionCache {
                    kind: SectionKind::ThematicBreak,
                    id: None,
                    position: lines.pos(start, end),
                });
            }
            _ => {}
        }
    }

    meta.list_items.sort_by_key(|item| item.position.start.offset);
    mark_comments(&lines, &mut meta);
    attach_paragraph_ids(&lines, &mut meta);
    meta
}

/// A top-level paragraph wrapped in `%%` is a comment block.
fn mark_comments(lines: &LineTable<'_>, meta: &mut CachedMetadata) {
    for section in &mut meta.sections {
        if section.kind != SectionKind::Paragraph {
            continue;
        }
        let text = lines.slice(&section.position).trim();
        if text.len() >= 4 && text.starts_with("%%") && text.ends_with("%%") {
            section.kind = SectionKind::Comment;
        }
    }
}

/// Record `^id` markers that close a top-level paragraph. A paragraph made of
/// nothing but the marker names the section right before it.
fn attach_paragraph_ids(lines: &LineTable<'_>, meta: &mut CachedMetadata) {
    for i in 0..meta.sections.len() {
        let Some(section) = meta.sections.get(i) else { continue };
        if section.kind != SectionKind::Paragraph {
            continue;
        }
        let text = lines.slice(&section.position);
        let Some(id) = trailing_block_id(text) else { continue };

        let standalone = text.trim() == format!("^{id}");
        let owner = if standalone && i > 0 { i - 1 } else { i };
        let start = meta.sections.get(owner).map_or(section.position.start, |s| s.position.start);
        let position = Pos {
            start,
            end: section.position.end,
        };
        if let Some(target) = meta.sections.get_mut(owner) {
            target.id = Some(id.clone());
        }
        meta.blocks.insert(id.clone(), BlockCache { id, position });
    }
}
