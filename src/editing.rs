//! Text transforms behind the write handler and block links.

use std::sync::LazyLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use regex::Regex;

use crate::error::AppError;
use crate::host::Vault;
use crate::metadata::CachedMetadata;
use crate::paths;
use crate::resolver::{resolve_block_at_line, HeadingRange};

#[allow(clippy::unwrap_used)]
static BASE64: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9a-zA-Z+/]{4})*(([0-9a-zA-Z+/]{2}==)|([0-9a-zA-Z+/]{3}=))?$").unwrap()
});

/// Bytes of a base64 payload, `None` for anything that should be written as text.
pub fn decode_base64_payload(data: &str) -> Option<Vec<u8>> {
    if data.is_empty() || !BASE64.is_match(data) {
        return None;
    }
    STANDARD.decode(data).ok()
}

fn splice(text: &str, at: usize, inserted: &[&str]) -> String {
    let mut lines: Vec<&str> = text.split('\n').collect();
    let at = at.min(lines.len());
    lines.splice(at..at, inserted.iter().copied());
    lines.join("\n")
}

fn line_index(line: i64) -> usize {
    usize::try_from(line.max(0)).unwrap_or(usize::MAX)
}

/// Add `data` to the end of a heading's section, before `line`, or at the end
/// of the document.
pub fn append(text: &str, data: &str, heading: Option<HeadingRange>, line: Option<i64>) -> String {
    if let Some(range) = heading {
        let inserted: Vec<&str> = data.split('\n').collect();
        return splice(text, range.last_line, &inserted);
    }
    match line.filter(|&l| l != 0) {
        Some(line) => splice(text, line_index(line), &[data]),
        None => format!("{text}\n{data}"),
    }
}

/// Add `data` at the start of a heading's section, at 1-based `line`, right
/// after the frontmatter block, or at the very top.
pub fn prepend(
    text: &str,
    data: &str,
    heading: Option<HeadingRange>,
    line: Option<i64>,
    frontmatter_end: Option<usize>,
) -> String {
    if let Some(range) = heading {
        let inserted: Vec<&str> = data.split('\n').collect();
        return splice(text, range.first_line, &inserted);
    }
    let at = match (line.filter(|&l| l != 0), frontmatter_end) {
        (Some(line), _) => line_index(line - 1),
        (None, Some(end)) => end + 1,
        (None, None) => 0,
    };
    splice(text, at, &[data])
}

/// First free `<dir>/<name> N.md` next to `path`, N in 1..100. Falls back to
/// `path` itself when all are taken, and the caller overwrites it.
pub async fn alternative_file_path(vault: &dyn Vault, path: &str) -> String {
    let dir = paths::parent_dir(path);
    let base = paths::strip_md(paths::file_name(path));
    for n in 1..100 {
        let candidate = if dir.is_empty() {
            format!("{base} {n}.md")
        } else {
            format!("{dir}/{base} {n}.md")
        };
        if vault.entry_kind(&candidate).await.is_none() {
            return candidate;
        }
    }
    path.to_string()
}

/// Id of the block under `line`, plus the rewritten document when one had to
/// be minted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockLink {
    pub id: String,
    pub text: Option<String>,
}

/// Id of the block a cursor on `line` sits in, adding `^id` to the document if
/// the block has none.
pub fn ensure_block_id(cache: &CachedMetadata, text: &str, line: usize) -> Result<BlockLink, AppError> {
    let block = resolve_block_at_line(cache, line)
        .ok_or_else(|| AppError::not_found(format!("Block at line {line}")))?;
    if let Some(id) = block.id() {
        return Ok(BlockLink {
            id: id.to_string(),
            text: None,
        });
    }

    let id: String = uuid::Uuid::new_v4().simple().to_string().chars().take(6).collect();
    let spacer = if block.kind().is_some_and(|k| k.wants_detached_id()) {
        "\n\n"
    } else {
        " "
    };
    let at = block.position().end.offset;
    let (head, tail) = (
        text.get(..at).ok_or_else(|| AppError::internal("block end is outside the document"))?,
        text.get(at..).unwrap_or_default(),
    );
    Ok(BlockLink {
        text: Some(format!("{head}{spacer}^{id}{tail}")),
        id,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::host::memory::MemoryHost;
    use crate::index::index_markdown;

    #[test]
    fn append_without_anchor_adds_line() {
        assert_eq!(append("line1", "line2", None, None), "line1\nline2");
        assert_eq!(append("line1", "line2", None, Some(0)), "line1\nline2");
    }

    #[test]
    fn append_at_line_and_heading() {
        assert_eq!(append("a\nb\nc", "X", None, Some(1)), "a\nX\nb\nc");
        assert_eq!(append("a\nb", "X", None, Some(99)), "a\nb\nX");
        let range = HeadingRange { first_line: 1, last_line: 2 };
        assert_eq!(append("# H\nbody\n# Next", "x\ny", Some(range), None), "# H\nbody\nx\ny\n# Next");
    }

    #[test]
    fn prepend_defaults_to_top_or_after_frontmatter() {
        assert_eq!(prepend("body", "first", None, None, None), "first\nbody");
        assert_eq!(
            prepend("---\na: 1\n---\nbody", "first", None, None, Some(2)),
            "---\na: 1\n---\nfirst\nbody"
        );
        assert_eq!(prepend("a\nb", "X", None, Some(2), None), "a\nX\nb");
        let range = HeadingRange { first_line: 1, last_line: 2 };
        assert_eq!(prepend("# H\nbody", "x", Some(range), None, None), "# H\nx\nbody");
    }

    #[test]
    fn base64_payloads_are_detected() {
        assert_eq!(decode_base64_payload("aGk="), Some(b"hi".to_vec()));
        assert!(decode_base64_payload("plain text").is_none());
        assert!(decode_base64_payload("").is_none());
    }

    #[tokio::test]
    async fn alternative_path_skips_taken_names() {
        let memory = MemoryHost::new("v");
        memory.seed("dir/Note.md", "").await.unwrap();
        memory.seed("dir/Note 1.md", "").await.unwrap();
        assert_eq!(alternative_file_path(memory.vault.as_ref(), "dir/Note.md").await, "dir/Note 2.md");
        assert_eq!(alternative_file_path(memory.vault.as_ref(), "Top.md").await, "Top 1.md");
    }

    #[test]
    fn block_ids_are_reused_or_minted() {
        let text = "para one ^keep\n\n> quote\n\n- item\n";
        let meta = index_markdown(text);
        let kept = ensure_block_id(&meta, text, 0).unwrap();
        assert_eq!(kept, BlockLink { id: "keep".into(), text: None });

        let quote = ensure_block_id(&meta, text, 2).unwrap();
        assert_eq!(quote.id.len(), 6);
        let rewritten = quote.text.unwrap();
        assert!(rewritten.starts_with(&format!("para one ^keep\n\n> quote\n\n^{}\n", quote.id)));

        let item = ensure_block_id(&meta, text, 4).unwrap();
        assert!(item.text.unwrap().contains(&format!("- item ^{}", item.id)));
    }
}
