//! Vault backed by a directory on disk.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use super::{EntryKind, Vault};
use crate::error::AppError;
use crate::host::memory::MarkdownIndex;
use crate::paths;

pub struct FsVault {
    root: PathBuf,
    name: String,
    index: Arc<MarkdownIndex>,
}

impl FsVault {
    /// Open the directory at `root` and index every markdown document in it.
    pub async fn open(root: impl Into<PathBuf>, index: Arc<MarkdownIndex>) -> Result<Self, AppError> {
        let root = root.into();
        if !tokio::fs::metadata(&root).await?.is_dir() {
            return Err(AppError::invalid(format!("{} is not a directory", root.display())));
        }
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let vault = Self { root, name, index };
        for path in vault.markdown_files().await {
            let text = tokio::fs::read_to_string(vault.resolve(&path)?).await?;
            vault.index.update(&path, &text);
        }
        tracing::info!(root = %vault.root.display(), "vault opened");
        Ok(vault)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a vault path onto the filesystem, refusing anything that escapes the root.
    fn resolve(&self, path: &str) -> Result<PathBuf, AppError> {
        let rel = Path::new(path);
        if rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(AppError::PermissionDenied {
                message: format!("\"{path}\" is outside the vault"),
            });
        }
        Ok(self.root.join(rel))
    }

    async fn ensure_absent(&self, full: &Path, path: &str) -> Result<(), AppError> {
        if tokio::fs::try_exists(full).await? {
            return Err(AppError::invalid(format!("\"{path}\" already exists")));
        }
        Ok(())
    }
}

#[async_trait]
impl Vault for FsVault {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn id(&self) -> Option<String> {
        None
    }

    async fn entry_kind(&self, path: &str) -> Option<EntryKind> {
        let meta = tokio::fs::metadata(self.resolve(path).ok()?).await.ok()?;
        Some(if meta.is_dir() { EntryKind::Folder } else { EntryKind::File })
    }

    async fn markdown_files(&self) -> Vec<String> {
        let mut found = Vec::new();
        let mut pending = vec![PathBuf::new()];
        while let Some(rel) = pending.pop() {
            let Ok(mut dir) = tokio::fs::read_dir(self.root.join(&rel)).await else {
                continue;
            };
            while let Ok(Some(entry)) = dir.next_entry().await {
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.starts_with('.') {
                    continue;
                }
                let child = rel.join(&name);
                match entry.file_type().await {
                    Ok(t) if t.is_dir() => pending.push(child),
                    Ok(_) => {
                        let vault_path = child.to_string_lossy().replace('\\', "/");
                        if paths::is_markdown(&vault_path) {
                            found.push(vault_path);
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, path = %child.display(), "skipping entry"),
                }
            }
        }
        found.sort();
        found
    }

    async fn read(&self, path: &str) -> Result<String, AppError> {
        let full = self.resolve(path)?;
        tokio::fs::read_to_string(&full).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AppError::not_found(format!("File \"{path}\"")),
            _ => e.into(),
        })
    }

    async fn modify(&self, path: &str, text: &str) -> Result<(), AppError> {
        let full = self.resolve(path)?;
        if !tokio::fs::try_exists(&full).await? {
            return Err(AppError::not_found(format!("File \"{path}\"")));
        }
        tokio::fs::write(&full, text).await?;
        self.index.update(path, text);
        Ok(())
    }

    async fn create(&self, path: &str, text: &str) -> Result<(), AppError> {
        let full = self.resolve(path)?;
        self.ensure_absent(&full, path).await?;
        tokio::fs::write(&full, text).await?;
        self.index.update(path, text);
        Ok(())
    }

    async fn create_binary(&self, path: &str, data: &[u8]) -> Result<(), AppError> {
        let full = self.resolve(path)?;
        self.ensure_absent(&full, path).await?;
        tokio::fs::write(&full, data).await?;
        Ok(())
    }

    async fn create_folder(&self, path: &str) -> Result<(), AppError> {
        tokio::fs::create_dir_all(self.resolve(path)?).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::host::MetadataCache;

    #[tokio::test]
    async fn open_indexes_existing_documents() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/a.md"), "# A\n").unwrap();
        std::fs::write(dir.path().join("b.md"), "b\n").unwrap();
        std::fs::write(dir.path().join("c.txt"), "c\n").unwrap();

        let index = Arc::new(MarkdownIndex::new());
        let vault = FsVault::open(dir.path(), Arc::clone(&index)).await.unwrap();
        assert_eq!(vault.markdown_files().await, vec!["b.md", "sub/a.md"]);
        assert_eq!(index.file_cache("sub/a.md").unwrap().headings[0].heading, "A");
    }

    #[tokio::test]
    async fn writes_reach_disk_and_index() {
        let dir = tempfile::tempdir().unwrap();
        let index = Arc::new(MarkdownIndex::new());
        let vault = FsVault::open(dir.path(), Arc::clone(&index)).await.unwrap();

        vault.create_folder("notes").await.unwrap();
        vault.create("notes/n.md", "first\n").await.unwrap();
        assert!(vault.create("notes/n.md", "again").await.is_err());
        vault.modify("notes/n.md", "## Second\n").await.unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("notes/n.md")).unwrap(),
            "## Second\n"
        );
        assert_eq!(index.file_cache("notes/n.md").unwrap().headings.len(), 1);
        assert_eq!(vault.entry_kind("notes").await, Some(EntryKind::Folder));
    }

    #[tokio::test]
    async fn paths_cannot_escape_root() {
        let dir = tempfile::tempdir().unwrap();
        let vault = FsVault::open(dir.path(), Arc::new(MarkdownIndex::new())).await.unwrap();
        let err = vault.read("../secret.md").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::PermissionDenied);
        assert_eq!(vault.read("missing.md").await.unwrap_err().kind(), crate::error::ErrorKind::NotFound);
    }
}
