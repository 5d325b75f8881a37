//! In-process host: an in-memory vault, an indexer that feeds the metadata
//! cache, and recording stand-ins for the UI collaborators.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::broadcast;

use super::{
    AppCommand, Clipboard, CommandRegistry, Cursor, Editor, EntryKind, EventBus, Evaluator, Host,
    MetadataCache, Notifier, OpenRequest, PluginRegistry, PluginSource, ViewMode, Vault, Workspace,
};
use crate::error::AppError;
use crate::index::index_markdown;
use crate::metadata::CachedMetadata;
use crate::paths;

// ── Indexer ─────────────────────────────────────────────────────

/// Metadata cache kept current by re-indexing documents on every write.
///
/// While deferred, writes are queued and only indexed on [`flush`], which
/// lets callers observe the window where a document exists without a cache.
///
/// [`flush`]: MarkdownIndex::flush
pub struct MarkdownIndex {
    caches: RwLock<HashMap<String, Arc<CachedMetadata>>>,
    pending: Mutex<Vec<(String, String)>>,
    deferred: AtomicBool,
    tx: broadcast::Sender<String>,
}

impl Default for MarkdownIndex {
    fn default() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self {
            caches: RwLock::new(HashMap::new()),
            pending: Mutex::new(Vec::new()),
            deferred: AtomicBool::new(false),
            tx,
        }
    }
}

impl MarkdownIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_deferred(&self, deferred: bool) {
        self.deferred.store(deferred, Ordering::SeqCst);
    }

    /// Index `text` as the new content of `path`. Non-markdown paths are ignored.
    pub fn update(&self, path: &str, text: &str) {
        if !paths::is_markdown(path) {
            return;
        }
        if self.deferred.load(Ordering::SeqCst) {
            self.pending.lock().push((path.to_string(), text.to_string()));
            return;
        }
        self.index_now(path, text);
    }

    /// Index every queued write.
    pub fn flush(&self) {
        let queued = std::mem::take(&mut *self.pending.lock());
        for (path, text) in queued {
            self.index_now(&path, &text);
        }
    }

    fn index_now(&self, path: &str, text: &str) {
        let meta = Arc::new(index_markdown(text));
        self.caches.write().insert(path.to_string(), meta);
        tracing::trace!(path, "indexed");
        // No subscribers is fine.
        let _ = self.tx.send(path.to_string());
    }
}

impl MetadataCache for MarkdownIndex {
    fn file_cache(&self, path: &str) -> Option<Arc<CachedMetadata>> {
        self.caches.read().get(path).cloned()
    }

    fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }
}

// ── Vault ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredEntry {
    Text(String),
    Binary(Vec<u8>),
    Folder,
}

pub struct MemoryVault {
    name: String,
    id: Option<String>,
    entries: RwLock<IndexMap<String, StoredEntry>>,
    index: Arc<MarkdownIndex>,
}

impl MemoryVault {
    pub fn new(name: impl Into<String>, index: Arc<MarkdownIndex>) -> Self {
        Self {
            name: name.into(),
            id: None,
            entries: RwLock::new(IndexMap::new()),
            index,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn entry(&self, path: &str) -> Option<StoredEntry> {
        self.entries.read().get(path).cloned()
    }

    fn ensure_absent(&self, path: &str) -> Result<(), AppError> {
        if self.entries.read().contains_key(path) {
            return Err(AppError::invalid(format!("\"{path}\" already exists")));
        }
        Ok(())
    }
}

#[async_trait]
impl Vault for MemoryVault {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn id(&self) -> Option<String> {
        self.id.clone()
    }

    async fn entry_kind(&self, path: &str) -> Option<EntryKind> {
        match self.entries.read().get(path)? {
            StoredEntry::Folder => Some(EntryKind::Folder),
            _ => Some(EntryKind::File),
        }
    }

    async fn markdown_files(&self) -> Vec<String> {
        self.entries
            .read()
            .iter()
            .filter(|(path, entry)| matches!(entry, StoredEntry::Text(_)) && paths::is_markdown(path))
            .map(|(path, _)| path.clone())
            .collect()
    }

    async fn read(&self, path: &str) -> Result<String, AppError> {
        match self.entries.read().get(path) {
            Some(StoredEntry::Text(text)) => Ok(text.clone()),
            Some(StoredEntry::Binary(bytes)) => Ok(String::from_utf8_lossy(bytes).into_owned()),
            Some(StoredEntry::Folder) => Err(AppError::invalid(format!("\"{path}\" is a folder"))),
            None => Err(AppError::not_found(format!("File \"{path}\""))),
        }
    }

    async fn modify(&self, path: &str, text: &str) -> Result<(), AppError> {
        {
            let mut entries = self.entries.write();
            match entries.get_mut(path) {
                Some(entry @ (StoredEntry::Text(_) | StoredEntry::Binary(_))) => {
                    *entry = StoredEntry::Text(text.to_string());
                }
                Some(StoredEntry::Folder) => {
                    return Err(AppError::invalid(format!("\"{path}\" is a folder")))
                }
                None => return Err(AppError::not_found(format!("File \"{path}\""))),
            }
        }
        self.index.update(path, text);
        Ok(())
    }

    async fn create(&self, path: &str, text: &str) -> Result<(), AppError> {
        self.ensure_absent(path)?;
        self.entries
            .write()
            .insert(path.to_string(), StoredEntry::Text(text.to_string()));
        self.index.update(path, text);
        Ok(())
    }

    async fn create_binary(&self, path: &str, data: &[u8]) -> Result<(), AppError> {
        self.ensure_absent(path)?;
        self.entries
            .write()
            .insert(path.to_string(), StoredEntry::Binary(data.to_vec()));
        Ok(())
    }

    async fn create_folder(&self, path: &str) -> Result<(), AppError> {
        let mut entries = self.entries.write();
        match entries.get(path) {
            Some(StoredEntry::Folder) => Ok(()),
            Some(_) => Err(AppError::invalid(format!("\"{path}\" is a file"))),
            None => {
                entries.insert(path.to_string(), StoredEntry::Folder);
                Ok(())
            }
        }
    }
}

// ── Editor and workspace ────────────────────────────────────────

/// Line buffer standing in for a text editor.
pub struct BufferEditor {
    lines: Mutex<Vec<String>>,
    cursor: Mutex<Cursor>,
    focused: AtomicBool,
    scrolled_to: Mutex<Option<Cursor>>,
}

impl BufferEditor {
    pub fn new(text: &str) -> Self {
        Self {
            lines: Mutex::new(text.split('\n').map(str::to_string).collect()),
            cursor: Mutex::new(Cursor::default()),
            focused: AtomicBool::new(false),
            scrolled_to: Mutex::new(None),
        }
    }

    pub fn is_focused(&self) -> bool {
        self.focused.load(Ordering::SeqCst)
    }

    pub fn scrolled_to(&self) -> Option<Cursor> {
        *self.scrolled_to.lock()
    }
}

impl Editor for BufferEditor {
    fn line_count(&self) -> usize {
        self.lines.lock().len()
    }

    fn line(&self, n: usize) -> Option<String> {
        self.lines.lock().get(n).cloned()
    }

    fn cursor(&self) -> Cursor {
        *self.cursor.lock()
    }

    fn set_cursor(&self, cursor: Cursor) {
        *self.cursor.lock() = cursor;
    }

    fn focus(&self) {
        self.focused.store(true, Ordering::SeqCst);
    }

    fn offset_to_pos(&self, offset: usize) -> Cursor {
        let lines = self.lines.lock();
        let mut remaining = offset;
        for (line, text) in lines.iter().enumerate() {
            if remaining <= text.len() {
                return Cursor { line, ch: remaining };
            }
            remaining -= text.len() + 1;
        }
        let last = lines.len().saturating_sub(1);
        Cursor {
            line: last,
            ch: lines.last().map_or(0, String::len),
        }
    }

    fn scroll_into_view(&self, cursor: Cursor) {
        *self.scrolled_to.lock() = Some(cursor);
    }

    fn value(&self) -> String {
        self.lines.lock().join("\n")
    }

    fn set_value(&self, text: &str) {
        *self.lines.lock() = text.split('\n').map(str::to_string).collect();
    }
}

/// Workspace that records every request and loads opened documents into a
/// [`BufferEditor`].
pub struct RecordingWorkspace {
    vault: Arc<dyn Vault>,
    opened: Mutex<Vec<OpenRequest>>,
    view_modes: Mutex<Vec<ViewMode>>,
    active: Mutex<Option<(String, Arc<BufferEditor>)>>,
}

impl RecordingWorkspace {
    pub fn new(vault: Arc<dyn Vault>) -> Self {
        Self {
            vault,
            opened: Mutex::new(Vec::new()),
            view_modes: Mutex::new(Vec::new()),
            active: Mutex::new(None),
        }
    }

    pub fn opened(&self) -> Vec<OpenRequest> {
        self.opened.lock().clone()
    }

    pub fn view_modes(&self) -> Vec<ViewMode> {
        self.view_modes.lock().clone()
    }

    pub fn active_editor(&self) -> Option<Arc<BufferEditor>> {
        self.active.lock().as_ref().map(|(_, editor)| Arc::clone(editor))
    }
}

#[async_trait]
impl Workspace for RecordingWorkspace {
    async fn open(&self, request: OpenRequest) -> Result<(), AppError> {
        tracing::debug!(?request, "open");
        if let Some(link) = &request.link {
            let path = link.split('#').next().unwrap_or_default().to_string();
            let text = match self.vault.entry_kind(&path).await {
                Some(EntryKind::File) => self.vault.read(&path).await?,
                _ => String::new(),
            };
            *self.active.lock() = Some((path, Arc::new(BufferEditor::new(&text))));
        }
        if let Some(mode) = request.view {
            self.view_modes.lock().push(mode);
        }
        self.opened.lock().push(request);
        Ok(())
    }

    fn active_file(&self) -> Option<String> {
        self.active.lock().as_ref().map(|(path, _)| path.clone())
    }

    fn editor(&self) -> Option<Arc<dyn Editor>> {
        self.active_editor().map(|editor| editor as Arc<dyn Editor>)
    }

    async fn set_view_mode(&self, mode: ViewMode) -> Result<(), AppError> {
        self.view_modes.lock().push(mode);
        Ok(())
    }
}

// ── Registries ──────────────────────────────────────────────────

#[derive(Default)]
pub struct StaticCommands {
    commands: Vec<AppCommand>,
    executed: Mutex<Vec<String>>,
    confirmations: AtomicUsize,
}

impl StaticCommands {
    pub fn new(commands: impl IntoIterator<Item = (&'static str, &'static str)>) -> Self {
        Self {
            commands: commands
                .into_iter()
                .map(|(id, name)| AppCommand {
                    id: id.to_string(),
                    name: name.to_string(),
                })
                .collect(),
            ..Self::default()
        }
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().clone()
    }

    pub fn confirmations(&self) -> usize {
        self.confirmations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandRegistry for StaticCommands {
    fn list(&self) -> Vec<AppCommand> {
        self.commands.clone()
    }

    async fn execute_by_id(&self, id: &str) -> Result<(), AppError> {
        if !self.commands.iter().any(|c| c.id == id) {
            return Err(AppError::not_found(format!("Command \"{id}\"")));
        }
        self.executed.lock().push(id.to_string());
        Ok(())
    }

    async fn confirm(&self) -> Result<(), AppError> {
        self.confirmations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Installed plugins with their enabled flag.
#[derive(Default)]
pub struct StaticPlugins {
    community: Mutex<IndexMap<String, bool>>,
    builtin: Mutex<IndexMap<String, bool>>,
}

impl StaticPlugins {
    pub fn with_community(self, id: &str, enabled: bool) -> Self {
        self.community.lock().insert(id.to_string(), enabled);
        self
    }

    pub fn with_builtin(self, id: &str, enabled: bool) -> Self {
        self.builtin.lock().insert(id.to_string(), enabled);
        self
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.community.lock().get(id).copied().unwrap_or(false)
            || self.builtin.lock().get(id).copied().unwrap_or(false)
    }
}

#[async_trait]
impl PluginRegistry for StaticPlugins {
    fn source(&self, id: &str) -> Option<PluginSource> {
        if self.community.lock().contains_key(id) {
            Some(PluginSource::Community)
        } else if self.builtin.lock().contains_key(id) {
            Some(PluginSource::Builtin)
        } else {
            None
        }
    }

    async fn set_enabled(&self, id: &str, source: PluginSource, enabled: bool) -> Result<(), AppError> {
        let table = match source {
            PluginSource::Community => &self.community,
            PluginSource::Builtin => &self.builtin,
        };
        match table.lock().get_mut(id) {
            Some(flag) => {
                *flag = enabled;
                Ok(())
            }
            None => Err(AppError::not_found(format!("Plugin \"{id}\""))),
        }
    }
}

// ── Side channels ───────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingEvents {
    published: Mutex<Vec<(String, Value)>>,
}

impl RecordingEvents {
    pub fn published(&self) -> Vec<(String, Value)> {
        self.published.lock().clone()
    }

    pub fn named(&self, name: &str) -> Vec<Value> {
        self.published
            .lock()
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, payload)| payload.clone())
            .collect()
    }
}

impl EventBus for RecordingEvents {
    fn publish(&self, name: &str, payload: &Value) {
        tracing::debug!(event = name, "publish");
        self.published.lock().push((name.to_string(), payload.clone()));
    }
}

#[derive(Default)]
pub struct MemoryClipboard {
    text: Mutex<Option<String>>,
}

impl MemoryClipboard {
    pub fn contents(&self) -> Option<String> {
        self.text.lock().clone()
    }
}

#[async_trait]
impl Clipboard for MemoryClipboard {
    async fn write_text(&self, text: &str) -> Result<(), AppError> {
        *self.text.lock() = Some(text.to_string());
        Ok(())
    }
}

/// Collects notices and mirrors them to the log.
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str) {
        tracing::info!(notice = message);
        self.messages.lock().push(message.to_string());
    }
}

/// Accepts scripts without running them.
#[derive(Default)]
pub struct RecordingEvaluator {
    sources: Mutex<Vec<String>>,
}

impl RecordingEvaluator {
    pub fn sources(&self) -> Vec<String> {
        self.sources.lock().clone()
    }
}

#[async_trait]
impl Evaluator for RecordingEvaluator {
    async fn evaluate(&self, source: &str) -> Result<(), AppError> {
        tracing::info!(len = source.len(), "evaluate");
        self.sources.lock().push(source.to_string());
        Ok(())
    }
}

// ── Assembly ────────────────────────────────────────────────────

/// Concrete handles to every in-process collaborator.
pub struct MemoryHost {
    pub index: Arc<MarkdownIndex>,
    pub vault: Arc<dyn Vault>,
    pub workspace: Arc<RecordingWorkspace>,
    pub commands: Arc<StaticCommands>,
    pub plugins: Arc<StaticPlugins>,
    pub events: Arc<RecordingEvents>,
    pub clipboard: Arc<MemoryClipboard>,
    pub notifier: Arc<RecordingNotifier>,
    pub evaluator: Arc<RecordingEvaluator>,
}

impl MemoryHost {
    /// Host backed by a fresh [`MemoryVault`].
    pub fn new(vault_name: &str) -> Self {
        let index = Arc::new(MarkdownIndex::new());
        let vault: Arc<dyn Vault> = Arc::new(MemoryVault::new(vault_name, Arc::clone(&index)));
        Self::with_vault(vault, index)
    }

    /// Host around an existing vault that reports its writes to `index`.
    pub fn with_vault(vault: Arc<dyn Vault>, index: Arc<MarkdownIndex>) -> Self {
        Self {
            workspace: Arc::new(RecordingWorkspace::new(Arc::clone(&vault))),
            index,
            vault,
            commands: Arc::new(StaticCommands::default()),
            plugins: Arc::new(StaticPlugins::default()),
            events: Arc::new(RecordingEvents::default()),
            clipboard: Arc::new(MemoryClipboard::default()),
            notifier: Arc::new(RecordingNotifier::default()),
            evaluator: Arc::new(RecordingEvaluator::default()),
        }
    }

    pub fn with_commands(mut self, commands: StaticCommands) -> Self {
        self.commands = Arc::new(commands);
        self
    }

    pub fn with_plugins(mut self, plugins: StaticPlugins) -> Self {
        self.plugins = Arc::new(plugins);
        self
    }

    pub fn host(&self) -> Host {
        Host {
            vault: Arc::clone(&self.vault),
            metadata: Arc::clone(&self.index) as Arc<dyn MetadataCache>,
            workspace: Arc::clone(&self.workspace) as Arc<dyn Workspace>,
            commands: Arc::clone(&self.commands) as Arc<dyn CommandRegistry>,
            plugins: Arc::clone(&self.plugins) as Arc<dyn PluginRegistry>,
            events: Arc::clone(&self.events) as Arc<dyn EventBus>,
            clipboard: Arc::clone(&self.clipboard) as Arc<dyn Clipboard>,
            notifier: Arc::clone(&self.notifier) as Arc<dyn Notifier>,
            evaluator: Arc::clone(&self.evaluator) as Arc<dyn Evaluator>,
        }
    }

    /// Create a document. The index updates synchronously unless deferred.
    pub async fn seed(&self, path: &str, text: &str) -> Result<(), AppError> {
        self.vault.create(path, text).await
    }
}
