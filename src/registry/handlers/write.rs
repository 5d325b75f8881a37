#![allow(clippy::needless_pass_by_value)]

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;

use super::common;
use crate::editing;
use crate::error::AppError;
use crate::events;
use crate::host::EntryKind;
use crate::identity;
use crate::navigation;
use crate::paths;
use crate::registry::params::{WriteMode, WriteParams};
use crate::registry::validation;
use crate::registry::{CommandOutput, CommandResult};
use crate::resolver::resolve_heading_range;
use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteReport {
    pub path: String,
    pub created: bool,
    /// False when the document already existed and no mode was given.
    pub written: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

async fn splice(
    state: &AppState,
    path: &str,
    mode: WriteMode,
    data: &str,
    p: &WriteParams,
) -> Result<String, AppError> {
    let text = state.host.vault.read(path).await?;
    let needs_cache = p.heading.is_some() || mode == WriteMode::Prepend;
    let cache = if needs_cache {
        Some(identity::cache_of(state, path).await?)
    } else {
        None
    };
    let heading = match (&p.heading, &cache) {
        (Some(heading), Some(cache)) => Some(resolve_heading_range(cache, heading)?),
        _ => None,
    };
    Ok(match mode {
        WriteMode::Prepend => {
            let frontmatter_end = cache
                .as_ref()
                .and_then(|c| c.frontmatter_position)
                .map(|pos| pos.end.line);
            editing::prepend(&text, data, heading, p.cursor.line, frontmatter_end)
        }
        _ => editing::append(&text, data, heading, p.cursor.line),
    })
}

pub async fn write(state: Arc<AppState>, p: WriteParams) -> Result<CommandOutput, AppError> {
    let data = validation::require(p.data.as_deref(), "data")?;
    let (target, uid) = common::resolve_write_target(&state, p.filepath.as_deref(), p.uid.as_deref()).await?;
    let path = target.ok_or_else(|| AppError::invalid("write needs a filepath, a uid or an active file"))?;

    let vault = &state.host.vault;
    let existing = vault.entry_kind(&path).await;
    if existing == Some(EntryKind::Folder) {
        return Err(AppError::invalid(format!("\"{path}\" is a folder")));
    }
    let exists = existing.is_some();

    let (path, created) = match p.mode {
        Some(WriteMode::New) => {
            let path = if exists {
                editing::alternative_file_path(vault.as_ref(), &path).await
            } else {
                path
            };
            if vault.entry_kind(&path).await.is_some() {
                tracing::warn!(path, "no free alternative name, overwriting");
                vault.modify(&path, data).await?;
                (path, false)
            } else {
                common::create_document(&state, &path, data).await?;
                (path, true)
            }
        }
        Some(WriteMode::Overwrite) => {
            if exists {
                vault.modify(&path, data).await?;
            } else {
                common::create_document(&state, &path, data).await?;
            }
            (path, !exists)
        }
        Some(mode @ (WriteMode::Append | WriteMode::Prepend)) => {
            if !exists {
                return Err(AppError::not_found(format!("File \"{path}\"")));
            }
            let updated = splice(&state, &path, mode, data, &p).await?;
            vault.modify(&path, &updated).await?;
            (path, false)
        }
        None if exists => {
            tracing::debug!(path, "document exists and no mode given, leaving it untouched");
            let report = WriteReport {
                path,
                created: false,
                written: false,
                uid: None,
            };
            return Ok(CommandOutput::new(
                format!("\"{}\" already exists", report.path),
                CommandResult::Write(report),
            ));
        }
        None => {
            common::create_document(&state, &path, data).await?;
            (path, true)
        }
    };

    tracing::info!(path, created, mode = ?p.mode, "document written");
    state
        .host
        .events
        .publish(events::DOCUMENT_WRITTEN, &json!({ "path": path }));
    navigation::open_written(&state, &path, &p.cursor).await?;

    // Created binaries are never indexed, so they cannot carry an id.
    let binary = created && editing::decode_base64_payload(data).is_some();
    let uid = if p.writeUid && paths::is_markdown(&path) && !binary {
        Some(identity::write_uid_if_none(&state, &path, uid.as_deref()).await?)
    } else {
        None
    };

    let message = if created {
        format!("Created \"{path}\"")
    } else {
        format!("Wrote \"{path}\"")
    };
    Ok(CommandOutput::new(
        message,
        CommandResult::Write(WriteReport {
            path,
            created,
            written: true,
            uid,
        }),
    ))
}
