//! Collaborators owned by the host application.
//!
//! The dispatcher only talks to the host through these traits. `memory` and
//! `fs` provide reference implementations used by the CLI and the tests.

pub mod fs;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::AppError;
use crate::metadata::CachedMetadata;

// ── Document store ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntryKind {
    File,
    Folder,
}

/// Vault-relative document storage. Paths use `/` separators.
#[async_trait]
pub trait Vault: Send + Sync {
    fn name(&self) -> String;
    fn id(&self) -> Option<String>;
    async fn entry_kind(&self, path: &str) -> Option<EntryKind>;
    /// Markdown documents in the host's enumeration order.
    async fn markdown_files(&self) -> Vec<String>;
    async fn read(&self, path: &str) -> Result<String, AppError>;
    async fn modify(&self, path: &str, text: &str) -> Result<(), AppError>;
    async fn create(&self, path: &str, text: &str) -> Result<(), AppError>;
    async fn create_binary(&self, path: &str, data: &[u8]) -> Result<(), AppError>;
    async fn create_folder(&self, path: &str) -> Result<(), AppError>;
}

/// Per-document structural caches, filled asynchronously by an indexer.
pub trait MetadataCache: Send + Sync {
    fn file_cache(&self, path: &str) -> Option<Arc<CachedMetadata>>;
    /// Receives the path of every document whose cache changed.
    fn subscribe(&self) -> broadcast::Receiver<String>;
}

// ── Workspace ───────────────────────────────────────────────────

/// Where an opened document lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PaneTarget {
    Current,
    NewTab,
    Split,
    Window,
    Popover,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ViewMode {
    Source,
    Live,
    Preview,
}

impl ViewMode {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match raw {
            "source" => Ok(ViewMode::Source),
            "live" => Ok(ViewMode::Live),
            "preview" => Ok(ViewMode::Preview),
            other => Err(AppError::invalid(format!("unknown viewmode \"{other}\""))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenRequest {
    /// Link text, optionally with a `#heading` or `#^block` fragment. `None`
    /// opens an empty pane.
    pub link: Option<String>,
    pub pane: PaneTarget,
    pub view: Option<ViewMode>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Cursor {
    pub line: usize,
    pub ch: usize,
}

/// Text editor of the active markdown view.
pub trait Editor: Send + Sync {
    fn line_count(&self) -> usize;
    fn line(&self, n: usize) -> Option<String>;
    fn cursor(&self) -> Cursor;
    fn set_cursor(&self, cursor: Cursor);
    fn focus(&self);
    fn offset_to_pos(&self, offset: usize) -> Cursor;
    fn scroll_into_view(&self, cursor: Cursor);
    fn value(&self) -> String;
    fn set_value(&self, text: &str);
}

#[async_trait]
pub trait Workspace: Send + Sync {
    async fn open(&self, request: OpenRequest) -> Result<(), AppError>;
    fn active_file(&self) -> Option<String>;
    /// Editor of the active markdown view, if any.
    fn editor(&self) -> Option<Arc<dyn Editor>>;
    async fn set_view_mode(&self, mode: ViewMode) -> Result<(), AppError>;
}

// ── Application registries ──────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppCommand {
    pub id: String,
    pub name: String,
}

#[async_trait]
pub trait CommandRegistry: Send + Sync {
    fn list(&self) -> Vec<AppCommand>;
    async fn execute_by_id(&self, id: &str) -> Result<(), AppError>;
    /// Press the primary button of the dialog a command left open.
    async fn confirm(&self) -> Result<(), AppError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PluginSource {
    Community,
    Builtin,
}

#[async_trait]
pub trait PluginRegistry: Send + Sync {
    /// Where `id` is installed; community plugins shadow built-in ones.
    fn source(&self, id: &str) -> Option<PluginSource>;
    async fn set_enabled(&self, id: &str, source: PluginSource, enabled: bool) -> Result<(), AppError>;
}

// ── Side channels ───────────────────────────────────────────────

pub trait EventBus: Send + Sync {
    fn publish(&self, name: &str, payload: &Value);
}

#[async_trait]
pub trait Clipboard: Send + Sync {
    async fn write_text(&self, text: &str) -> Result<(), AppError>;
}

pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, source: &str) -> Result<(), AppError>;
}

// ── Bundle ──────────────────────────────────────────────────────

/// Every collaborator the dispatcher needs.
#[derive(Clone)]
pub struct Host {
    pub vault: Arc<dyn Vault>,
    pub metadata: Arc<dyn MetadataCache>,
    pub workspace: Arc<dyn Workspace>,
    pub commands: Arc<dyn CommandRegistry>,
    pub plugins: Arc<dyn PluginRegistry>,
    pub events: Arc<dyn EventBus>,
    pub clipboard: Arc<dyn Clipboard>,
    pub notifier: Arc<dyn Notifier>,
    pub evaluator: Arc<dyn Evaluator>,
}

impl Host {
    /// Cached metadata for every markdown document, in vault order.
    pub async fn markdown_caches(&self) -> Vec<(String, Arc<CachedMetadata>)> {
        self.vault
            .markdown_files()
            .await
            .into_iter()
            .filter_map(|path| {
                let cache = self.metadata.file_cache(&path)?;
                Some((path, cache))
            })
            .collect()
    }
}
