//! Opening documents and placing the cursor in the active editor.

use std::sync::Arc;

use crate::editing;
use crate::error::AppError;
use crate::host::{Cursor, EntryKind, Editor, OpenRequest, PaneTarget, ViewMode};
use crate::registry::params::{CursorParams, OpenFileParams, WriteMode};
use crate::settle::{settle, VIEW_SETTLE};
use crate::state::AppState;

/// Plugin that provides popover panes.
pub const HOVER_EDITOR_PLUGIN: &str = "obsidian-hover-editor";

/// Pane for an `openmode` value. Without one, `new_pane` picks between a new
/// tab and the current pane.
pub fn resolve_pane(state: &AppState, openmode: Option<&str>, new_pane: bool) -> Result<PaneTarget, AppError> {
    match openmode {
        None => Ok(if new_pane { PaneTarget::NewTab } else { PaneTarget::Current }),
        Some("true" | "tab") => Ok(PaneTarget::NewTab),
        Some("false") => Ok(PaneTarget::Current),
        Some("split") => Ok(PaneTarget::Split),
        Some("window") => Ok(PaneTarget::Window),
        Some("popover") => {
            if state.host.plugins.source(HOVER_EDITOR_PLUGIN).is_none() {
                return Err(AppError::internal(format!(
                    "openmode=popover needs the {HOVER_EDITOR_PLUGIN} plugin"
                )));
            }
            Ok(PaneTarget::Popover)
        }
        Some("silent") => Err(AppError::invalid("openmode=silent does not open a pane")),
        Some(other) => Err(AppError::invalid(format!("unknown openmode \"{other}\""))),
    }
}

pub async fn open_link(
    state: &AppState,
    link: Option<String>,
    pane: PaneTarget,
    view: Option<ViewMode>,
) -> Result<(), AppError> {
    tracing::debug!(?link, ?pane, ?view, "opening");
    state.host.workspace.open(OpenRequest { link, pane, view }).await
}

pub fn active_editor(state: &AppState) -> Result<Arc<dyn Editor>, AppError> {
    state
        .host
        .workspace
        .editor()
        .ok_or_else(|| AppError::internal("no active markdown editor"))
}

async fn reapply_preview(state: &AppState, cursor: &CursorParams) -> Result<(), AppError> {
    settle(VIEW_SETTLE).await;
    if cursor.view()? == Some(ViewMode::Preview) {
        state.host.workspace.set_view_mode(ViewMode::Preview).await?;
    }
    Ok(())
}

fn clamp_index(one_based: i64, len: usize) -> usize {
    let wanted = usize::try_from(one_based.saturating_sub(1).max(0)).unwrap_or(usize::MAX);
    wanted.min(len.saturating_sub(1))
}

/// Place the cursor from `line`/`column`/`offset` in the active editor.
pub async fn set_cursor_in_line(state: &AppState, cursor: &CursorParams) -> Result<Cursor, AppError> {
    state.host.workspace.set_view_mode(ViewMode::Source).await?;
    let editor = active_editor(state)?;

    let position = if let Some(offset) = cursor.offset {
        editor.offset_to_pos(usize::try_from(offset.max(0)).unwrap_or(usize::MAX))
    } else {
        let line = match cursor.line {
            Some(line) => clamp_index(line, editor.line_count()),
            None => editor.cursor().line,
        };
        let len = editor.line(line).map_or(0, |text| text.chars().count());
        Cursor {
            line,
            ch: clamp_index(cursor.column.unwrap_or(1), len),
        }
    };
    editor.focus();
    editor.set_cursor(position);
    editor.scroll_into_view(position);
    reapply_preview(state, cursor).await?;
    Ok(position)
}

/// Move the cursor to the end (append) or start (prepend) of the active document.
pub async fn set_cursor_for_mode(state: &AppState, mode: WriteMode, cursor: &CursorParams) -> Result<(), AppError> {
    state.host.workspace.set_view_mode(ViewMode::Source).await?;
    let editor = active_editor(state)?;
    match mode {
        WriteMode::Append => {
            let line = editor.line_count().saturating_sub(1);
            let ch = editor.line(line).map_or(0, |text| text.chars().count());
            editor.set_cursor(Cursor { line, ch });
        }
        WriteMode::Prepend => editor.set_cursor(Cursor::default()),
        WriteMode::New | WriteMode::Overwrite => {}
    }
    reapply_preview(state, cursor).await
}

/// Show a freshly written document, unless writes stay in the background.
/// Returns whether anything was opened.
pub async fn open_written(state: &AppState, path: &str, cursor: &CursorParams) -> Result<bool, AppError> {
    let settings = state.settings();
    if cursor.is_silent() || !settings.open_file_on_write {
        return Ok(false);
    }
    let pane = resolve_pane(state, cursor.openmode.as_deref(), settings.open_file_on_write_in_new_pane)?;
    open_link(state, Some(path.to_string()), pane, cursor.view()?).await?;
    if cursor.has_position() {
        set_cursor_in_line(state, cursor).await?;
    }
    Ok(true)
}

/// Open the document named by the open-file params of `command` and `eval`,
/// preparing the editor for `mode`. Returns the path that was opened.
pub async fn open_for_params(state: &AppState, params: &OpenFileParams) -> Result<Option<String>, AppError> {
    let cursor = &params.cursor;
    if cursor.is_silent() {
        return Ok(None);
    }
    let new_pane = state.settings().open_file_without_write_in_new_pane;
    let pane = resolve_pane(state, cursor.openmode.as_deref(), new_pane)?;

    let Some(filepath) = params.filepath.clone() else {
        if cursor.openmode.is_some() || cursor.viewmode.is_some() {
            open_link(state, None, pane, cursor.view()?).await?;
        }
        return Ok(None);
    };

    if let Some(mode) = params.mode {
        let path = if mode == WriteMode::New
            && state.host.vault.entry_kind(&filepath).await == Some(EntryKind::File)
        {
            editing::alternative_file_path(state.host.vault.as_ref(), &filepath).await
        } else {
            filepath
        };
        open_link(state, Some(path.clone()), pane, Some(ViewMode::Source)).await?;
        let editor = active_editor(state)?;
        match mode {
            WriteMode::Append => {
                editor.set_value(&format!("{}\n", editor.value()));
                let line = editor.line_count().saturating_sub(1);
                editor.set_cursor(Cursor { line, ch: 0 });
            }
            WriteMode::Prepend => {
                editor.set_value(&format!("\n{}", editor.value()));
                editor.set_cursor(Cursor::default());
            }
            WriteMode::Overwrite => editor.set_value(""),
            WriteMode::New => {}
        }
        return Ok(Some(path));
    }

    if cursor.has_position() {
        open_link(state, Some(filepath.clone()), pane, Some(ViewMode::Source)).await?;
        set_cursor_in_line(state, cursor).await?;
    } else {
        open_link(state, Some(filepath.clone()), pane, cursor.view()?).await?;
    }
    Ok(Some(filepath))
}
