#![allow(clippy::needless_pass_by_value)]

use crate::editing;
use crate::error::{AppError, ErrorKind};
use crate::host::Cursor;
use crate::identity;
use crate::navigation;
use crate::paths;
use crate::state::AppState;

/// Document a handler acts on: `filepath`, else the document carrying `uid`,
/// else the active file. A `uid` that names no document is NotFound.
pub async fn resolve_target(
    state: &AppState,
    filepath: Option<&str>,
    uid: Option<&str>,
) -> Result<(Option<String>, Option<String>), AppError> {
    let uid = uid.filter(|u| !u.is_empty());
    if let Some(path) = filepath.filter(|p| !p.is_empty()) {
        return Ok((Some(path.to_string()), uid.map(str::to_string)));
    }
    if let Some(uid) = uid {
        let path = identity::resolve_uid(state, uid).await?;
        tracing::debug!(uid, path, "resolved document by id");
        return Ok((Some(path), None));
    }
    Ok((state.host.workspace.active_file(), None))
}

/// Like [`resolve_target`], but a `uid` that names no document falls back to
/// the active file and is handed back so it can be written.
pub async fn resolve_write_target(
    state: &AppState,
    filepath: Option<&str>,
    uid: Option<&str>,
) -> Result<(Option<String>, Option<String>), AppError> {
    match resolve_target(state, filepath, uid).await {
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(uid, "id names no document, using the active file");
            Ok((state.host.workspace.active_file(), uid.map(str::to_string)))
        }
        other => other,
    }
}

/// Create a document, along with any missing parent folder. Base64 payloads
/// are stored as binary.
pub async fn create_document(state: &AppState, path: &str, data: &str) -> Result<(), AppError> {
    let vault = &state.host.vault;
    let parent = paths::parent_dir(path);
    if !parent.is_empty() && vault.entry_kind(parent).await.is_none() {
        vault.create_folder(parent).await?;
    }
    match editing::decode_base64_payload(data) {
        Some(bytes) => {
            tracing::info!(path, bytes = bytes.len(), "creating binary file");
            vault.create_binary(path, &bytes).await
        }
        None => {
            tracing::info!(path, "creating document");
            vault.create(path, data).await
        }
    }
}

/// Put the cursor on `line` of the active editor, focused.
pub fn place_cursor(state: &AppState, line: usize) -> Result<(), AppError> {
    let editor = navigation::active_editor(state)?;
    editor.focus();
    editor.set_cursor(Cursor { line, ch: 0 });
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::host::memory::MemoryHost;
    use crate::host::{EntryKind, OpenRequest, PaneTarget, Workspace};
    use crate::registry::handlers::testing::state_for;

    #[tokio::test]
    async fn target_prefers_path_then_uid_then_active() {
        let memory = MemoryHost::new("v");
        memory.seed("owned.md", "---\nid: u1\n---\n").await.unwrap();
        memory.seed("active.md", "").await.unwrap();
        let (state, _dir) = state_for(&memory);
        memory
            .workspace
            .open(OpenRequest {
                link: Some("active.md".into()),
                pane: PaneTarget::Current,
                view: None,
            })
            .await
            .unwrap();

        let (path, uid) = resolve_target(&state, Some("x.md"), Some("u1")).await.unwrap();
        assert_eq!((path.as_deref(), uid.as_deref()), (Some("x.md"), Some("u1")));
        let (path, uid) = resolve_target(&state, None, Some("u1")).await.unwrap();
        assert_eq!((path.as_deref(), uid), (Some("owned.md"), None));
        let (path, uid) = resolve_target(&state, None, None).await.unwrap();
        assert_eq!((path.as_deref(), uid), (Some("active.md"), None));

        let err = resolve_target(&state, Some(""), Some("fresh")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let (path, uid) = resolve_write_target(&state, Some(""), Some("fresh")).await.unwrap();
        assert_eq!((path.as_deref(), uid.as_deref()), (Some("active.md"), Some("fresh")));
        let (path, uid) = resolve_write_target(&state, None, Some("u1")).await.unwrap();
        assert_eq!((path.as_deref(), uid), (Some("owned.md"), None));
    }

    #[tokio::test]
    async fn creation_adds_parent_folder() {
        let memory = MemoryHost::new("v");
        let (state, _dir) = state_for(&memory);
        create_document(&state, "deep/new.md", "some text").await.unwrap();
        assert_eq!(memory.vault.entry_kind("deep").await, Some(EntryKind::Folder));
        assert_eq!(memory.vault.read("deep/new.md").await.unwrap(), "some text");

        create_document(&state, "blob.bin", "aGk=").await.unwrap();
        assert_eq!(memory.vault.read("blob.bin").await.unwrap(), "hi");
        assert!(memory.vault.markdown_files().await.contains(&"deep/new.md".to_string()));
    }
}
