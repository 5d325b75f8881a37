#![allow(clippy::needless_pass_by_value)]

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::error::AppError;
use crate::host::EntryKind;
use crate::identity;
use crate::metadata::frontmatter;
use crate::registry::params::FrontmatterParams;
use crate::registry::{CommandOutput, CommandResult};
use crate::resolver::{resolve_frontmatter_path, resolve_frontmatter_slot};
use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrontmatterReport {
    pub path: String,
    pub key: String,
    pub value: Value,
    /// True when the value was stored, false when it was copied.
    pub written: bool,
}

/// Text placed on the clipboard for a frontmatter value.
fn clipboard_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub async fn frontmatter(state: Arc<AppState>, p: FrontmatterParams) -> Result<CommandOutput, AppError> {
    let path = p
        .filepath
        .clone()
        .filter(|f| !f.is_empty())
        .or_else(|| state.host.workspace.active_file())
        .ok_or_else(|| AppError::invalid("frontmatter needs a filepath or an active file"))?;
    if state.host.vault.entry_kind(&path).await != Some(EntryKind::File) {
        return Err(AppError::not_found(format!("File \"{path}\"")));
    }
    let cache = identity::cache_of(&state, &path).await?;
    let key = p.frontmatterkey.as_str();

    match p.data.as_deref().filter(|d| !d.is_empty()) {
        Some(data) => {
            let value = serde_json::from_str(data).unwrap_or_else(|_| Value::String(data.to_string()));
            let text = state.host.vault.read(&path).await?;
            let stored = value.clone();
            let updated = frontmatter::process(&text, |root| {
                let slot = resolve_frontmatter_slot(root, key)
                    .ok_or_else(|| AppError::not_found(format!("Frontmatter key \"{key}\"")))?;
                slot.assign(stored);
                Ok(())
            })?;
            state.host.vault.modify(&path, &updated).await?;
            tracing::info!(path, key, "frontmatter updated");
            Ok(CommandOutput::new(
                format!("Set {key} in \"{path}\""),
                CommandResult::Frontmatter(FrontmatterReport {
                    path,
                    key: key.to_string(),
                    value,
                    written: true,
                }),
            ))
        }
        None => {
            let root = cache
                .frontmatter
                .as_ref()
                .ok_or_else(|| AppError::not_found(format!("Frontmatter of \"{path}\"")))?;
            let found = resolve_frontmatter_path(root, key)
                .ok_or_else(|| AppError::not_found(format!("Frontmatter key \"{key}\"")))?;
            let value = found.item.clone();
            state.host.clipboard.write_text(&clipboard_text(&value)).await?;
            Ok(CommandOutput::new(
                format!("Copied {key} from \"{path}\""),
                CommandResult::Frontmatter(FrontmatterReport {
                    path,
                    key: key.to_string(),
                    value,
                    written: false,
                }),
            ))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::host::memory::MemoryHost;
    use crate::host::MetadataCache;
    use crate::registry::handlers::testing::state_for;
    use serde_json::json;

    const DOC: &str = "---\ntitle: Old\ntags:\n  - a\n  - b\nmeta:\n  n: 1\n---\nbody\n";

    fn params(key: &str, data: Option<&str>) -> FrontmatterParams {
        FrontmatterParams {
            filepath: Some("d.md".into()),
            frontmatterkey: key.to_string(),
            data: data.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn reads_copy_to_clipboard() {
        let memory = MemoryHost::new("v");
        memory.seed("d.md", DOC).await.unwrap();
        let (state, _dir) = state_for(&memory);

        frontmatter(Arc::clone(&state), params("tags,1", None)).await.unwrap();
        assert_eq!(memory.clipboard.contents().as_deref(), Some("b"));
        frontmatter(Arc::clone(&state), params("meta", None)).await.unwrap();
        assert_eq!(memory.clipboard.contents().as_deref(), Some("{\"n\":1}"));

        let err = frontmatter(Arc::clone(&state), params("meta,z", None)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn writes_parse_json_or_keep_text() {
        let memory = MemoryHost::new("v");
        memory.seed("d.md", DOC).await.unwrap();
        let (state, _dir) = state_for(&memory);

        frontmatter(Arc::clone(&state), params("meta,n", Some("[1, 2]"))).await.unwrap();
        frontmatter(Arc::clone(&state), params("title", Some("New title"))).await.unwrap();
        frontmatter(Arc::clone(&state), params("tags,2", Some("\"c\""))).await.unwrap();

        let cache = memory.index.file_cache("d.md").unwrap();
        let root = cache.frontmatter.as_ref().unwrap();
        assert_eq!(root["meta"]["n"], json!([1, 2]));
        assert_eq!(root["title"], "New title");
        assert_eq!(root["tags"], json!(["a", "b", "c"]));
        assert!(memory.vault.read("d.md").await.unwrap().ends_with("---\nbody\n"));
    }

    #[tokio::test]
    async fn unresolved_write_path_is_not_found() {
        let memory = MemoryHost::new("v");
        memory.seed("d.md", DOC).await.unwrap();
        let (state, _dir) = state_for(&memory);
        let err = frontmatter(Arc::clone(&state), params("missing,deep", Some("1")))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(memory.vault.read("d.md").await.unwrap(), DOC);
    }

    #[tokio::test]
    async fn needs_a_document() {
        let memory = MemoryHost::new("v");
        let (state, _dir) = state_for(&memory);
        let mut p = params("x", None);
        p.filepath = None;
        let err = frontmatter(Arc::clone(&state), p).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = frontmatter(Arc::clone(&state), params("x", None)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
