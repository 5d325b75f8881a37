//! Shared validation helpers for URI handlers.
//!
//! Centralizes required-parameter checks so all handlers produce consistent
//! error messages.

use crate::error::AppError;
use crate::host::EntryKind;
use crate::state::AppState;

/// A parameter that must be present and non-empty.
pub fn require<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, AppError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::invalid(format!("missing required parameter \"{name}\""))),
    }
}

/// `path` must name an existing file, not a folder.
pub async fn require_file(state: &AppState, path: &str) -> Result<(), AppError> {
    match state.host.vault.entry_kind(path).await {
        Some(EntryKind::File) => Ok(()),
        Some(EntryKind::Folder) => Err(AppError::invalid(format!("\"{path}\" is a folder"))),
        None => Err(AppError::not_found(format!("File \"{path}\""))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::host::memory::MemoryHost;
    use crate::settings::UriSettings;

    #[test]
    fn require_rejects_missing_and_empty() {
        assert_eq!(require(Some("x"), "data").unwrap(), "x");
        let err = require(Some(""), "data").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(err.to_string().contains("\"data\""));
        assert!(require(None, "block").is_err());
    }

    #[tokio::test]
    async fn files_folders_and_gaps() {
        let memory = MemoryHost::new("v");
        memory.seed("a.md", "").await.unwrap();
        memory.vault.create_folder("dir").await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(memory.host(), UriSettings::default(), dir.path().to_path_buf());
        require_file(&state, "a.md").await.unwrap();
        assert_eq!(require_file(&state, "dir").await.unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert_eq!(require_file(&state, "b.md").await.unwrap_err().kind(), ErrorKind::NotFound);
    }
}
