//! Unique document ids stored in frontmatter, and URIs that refer to them.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use crate::editing;
use crate::error::AppError;
use crate::host::{EntryKind, Host};
use crate::metadata::CachedMetadata;
use crate::paths;
use crate::resolver::resolve_uid_owner;
use crate::state::AppState;
use crate::uri::{encode_uri, VaultInfo};

/// An empty `---`/`---` block at the start of a document.
#[allow(clippy::unwrap_used)]
static EMPTY_FRONTMATTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-{3}\s*\n*\r*-{3}").unwrap());

/// Cache of `path`, waiting for the indexer if it has not produced one yet.
///
/// `wait` bounds the wait; zero waits until the cache arrives or `cancel` fires.
pub async fn wait_for_cache(
    host: &Host,
    path: &str,
    wait: Duration,
    cancel: &CancellationToken,
) -> Result<Arc<CachedMetadata>, AppError> {
    // Subscribe before the first lookup so an update in between is not missed.
    let mut updates = host.metadata.subscribe();
    if let Some(cache) = host.metadata.file_cache(path) {
        return Ok(cache);
    }
    tracing::debug!(path, "waiting for metadata cache");

    let deadline = (!wait.is_zero()).then(|| tokio::time::Instant::now() + wait);
    loop {
        let expired = async {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            () = cancel.cancelled() => {
                return Err(AppError::internal(format!("cancelled while waiting for the cache of \"{path}\"")));
            }
            () = expired => {
                return Err(AppError::internal(format!(
                    "no cache for \"{path}\" after {}ms",
                    wait.as_millis()
                )));
            }
            update = updates.recv() => match update {
                Ok(changed) if changed != path => continue,
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => {
                    return Err(AppError::internal("metadata cache stopped publishing updates"));
                }
            },
        }
        if let Some(cache) = host.metadata.file_cache(path) {
            return Ok(cache);
        }
    }
}

/// Cache of `path`, waiting up to the configured index wait.
pub(crate) async fn cache_of(state: &AppState, path: &str) -> Result<Arc<CachedMetadata>, AppError> {
    let wait = Duration::from_millis(state.settings().index_wait_ms);
    wait_for_cache(&state.host, path, wait, &state.shutdown).await
}

fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => items.first().and_then(id_text),
        _ => None,
    }
}

/// Put `<id_field>: <uid>` into the frontmatter of `text`.
///
/// A document without frontmatter gains a block. Otherwise the first line
/// starting with the key is replaced, or the key goes right below the opening
/// delimiter.
pub fn insert_uid(text: &str, has_frontmatter: bool, id_field: &str, uid: &str) -> String {
    let key = format!("{id_field}:");
    let entry = format!("{key} {uid}");
    let mut lines: Vec<&str> = text.split('\n').collect();

    if !has_frontmatter && !EMPTY_FRONTMATTER.is_match(text) {
        let mut out = vec!["---", entry.as_str(), "---"];
        out.extend(lines);
        return out.join("\n");
    }
    match lines.iter().position(|line| line.starts_with(&key)) {
        Some(i) => {
            if let Some(line) = lines.get_mut(i) {
                *line = entry.as_str();
            }
        }
        None => lines.insert(1.min(lines.len()), entry.as_str()),
    }
    lines.join("\n")
}

/// Write `uid` into the frontmatter of `path` and return it.
pub async fn write_uid_to_file(state: &AppState, path: &str, uid: &str) -> Result<String, AppError> {
    let has_frontmatter = state
        .host
        .metadata
        .file_cache(path)
        .is_some_and(|cache| !cache.frontmatter_is_empty());
    let text = state.host.vault.read(path).await?;
    let id_field = state.settings().id_field;
    let updated = insert_uid(&text, has_frontmatter, &id_field, uid);
    state.host.vault.modify(path, &updated).await?;
    tracing::info!(path, uid, "wrote document id");
    Ok(uid.to_string())
}

/// Id of `path`, writing `supplied` (or a fresh UUID) when it has none.
pub async fn write_uid_if_none(state: &AppState, path: &str, supplied: Option<&str>) -> Result<String, AppError> {
    let cache = cache_of(state, path).await?;
    if let Some(existing) = cache.frontmatter_entry(&state.settings().id_field).and_then(id_text) {
        return Ok(existing);
    }
    let uid = supplied.map_or_else(new_uid, str::to_string);
    write_uid_to_file(state, path, &uid).await
}

/// Id of `path` (the first one if the field holds a list), generating one if missing.
pub async fn get_uid_from_file(state: &AppState, path: &str) -> Result<String, AppError> {
    write_uid_if_none(state, path, None).await
}

pub fn new_uid() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Path of the markdown document carrying `uid`.
pub async fn resolve_uid(state: &AppState, uid: &str) -> Result<String, AppError> {
    let documents = state.host.markdown_caches().await;
    resolve_uid_owner(documents, &state.settings().id_field, uid)
}

// ── Link generation ─────────────────────────────────────────────

/// Build a URI for `params`. With `use_uid`, a markdown `filepath` is replaced
/// by the document's id (kept alongside when `add_filepath_when_using_uid`).
pub async fn generate_uri(state: &AppState, mut params: IndexMap<String, Value>) -> Result<String, AppError> {
    let settings = state.settings();
    let filepath = params.get("filepath").and_then(Value::as_str).map(str::to_string);
    if let Some(path) = filepath {
        let is_document = paths::is_markdown(&path)
            && state.host.vault.entry_kind(&path).await == Some(EntryKind::File);
        if settings.use_uid && is_document {
            if !settings.add_filepath_when_using_uid {
                params.shift_remove("filepath");
            }
            let uid = get_uid_from_file(state, &path).await?;
            params.insert("uid".to_string(), Value::String(uid));
        }
    }
    let vault = VaultInfo {
        name: state.host.vault.name(),
        id: state.host.vault.id(),
    };
    Ok(encode_uri(&params, &settings, &vault))
}

/// Generate a URI, put it on the clipboard and tell the user.
pub async fn copy_uri(state: &AppState, params: IndexMap<String, Value>) -> Result<String, AppError> {
    let uri = generate_uri(state, params).await?;
    state.host.clipboard.write_text(&uri).await?;
    state.host.notifier.notify("URI copied to your clipboard");
    Ok(uri)
}

/// Copy a URI for the block under `line` of `path`, minting a block id first
/// when the block has none.
pub async fn copy_block_uri(state: &AppState, path: &str, line: usize) -> Result<String, AppError> {
    let cache = cache_of(state, path).await?;
    let text = state.host.vault.read(path).await?;
    let link = editing::ensure_block_id(&cache, &text, line)?;
    if let Some(updated) = &link.text {
        state.host.vault.modify(path, updated).await?;
        tracing::info!(path, id = link.id, "added block id");
    }
    let mut params = IndexMap::new();
    params.insert("filepath".to_string(), Value::String(path.to_string()));
    params.insert("block".to_string(), Value::String(link.id));
    copy_uri(state, params).await
}
