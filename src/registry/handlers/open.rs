#![allow(clippy::needless_pass_by_value)]

use std::sync::Arc;

use super::common;
use crate::error::AppError;
use crate::identity;
use crate::navigation;
use crate::registry::params::OpenParams;
use crate::registry::{CommandOutput, CommandResult};
use crate::state::AppState;

fn require_path(path: Option<&String>, what: &str) -> Result<String, AppError> {
    path.cloned()
        .ok_or_else(|| AppError::invalid(format!("opening a {what} needs a filepath or uid")))
}

fn active_path(state: &AppState) -> Result<String, AppError> {
    state
        .host
        .workspace
        .active_file()
        .ok_or_else(|| AppError::internal("no active file after opening"))
}

/// Open a document, optionally at a heading, a block or a cursor position.
/// Without a target the cursor options apply to the active document.
pub async fn open(state: Arc<AppState>, p: OpenParams) -> Result<CommandOutput, AppError> {
    let (target, uid) = if p.filepath.is_some() || p.uid.is_some() {
        common::resolve_target(&state, p.filepath.as_deref(), p.uid.as_deref()).await?
    } else {
        (None, None)
    };
    let cursor = &p.cursor;
    let new_pane = state.settings().open_file_without_write_in_new_pane;
    let view = cursor.view()?;

    let opened = if let Some(heading) = &p.heading {
        let path = require_path(target.as_ref(), "heading")?;
        let pane = navigation::resolve_pane(&state, cursor.openmode.as_deref(), new_pane)?;
        navigation::open_link(&state, Some(format!("{path}#{heading}")), pane, view).await?;
        let cache = identity::cache_of(&state, &active_path(&state)?).await?;
        let found = cache
            .headings
            .iter()
            .find(|h| h.heading == *heading)
            .ok_or_else(|| AppError::not_found(format!("Heading \"{heading}\"")))?;
        common::place_cursor(&state, found.position.start.line + 1)?;
        Some(path)
    } else if let Some(block) = &p.block {
        let path = require_path(target.as_ref(), "block")?;
        let pane = navigation::resolve_pane(&state, cursor.openmode.as_deref(), new_pane)?;
        navigation::open_link(&state, Some(format!("{path}#^{block}")), pane, view).await?;
        let cache = identity::cache_of(&state, &active_path(&state)?).await?;
        let found = cache
            .blocks
            .get(block)
            .ok_or_else(|| AppError::not_found(format!("Block \"{block}\"")))?;
        common::place_cursor(&state, found.position.start.line)?;
        Some(path)
    } else if let Some(path) = target {
        let pane = navigation::resolve_pane(&state, cursor.openmode.as_deref(), new_pane)?;
        navigation::open_link(&state, Some(path.clone()), pane, view).await?;
        if cursor.has_position() {
            navigation::set_cursor_in_line(&state, cursor).await?;
        }
        Some(path)
    } else {
        None
    };

    if let Some(mode) = p.mode {
        navigation::set_cursor_for_mode(&state, mode, cursor).await?;
    }
    if p.writeUid {
        let path = active_path(&state)?;
        identity::write_uid_if_none(&state, &path, uid.as_deref()).await?;
    }

    let message = match &opened {
        Some(path) => format!("Opened \"{path}\""),
        None => "Nothing to open".to_string(),
    };
    Ok(CommandOutput::new(message, CommandResult::Open(opened)))
}
