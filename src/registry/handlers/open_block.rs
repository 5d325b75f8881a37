#![allow(clippy::needless_pass_by_value)]

use std::sync::Arc;

use super::common;
use crate::error::AppError;
use crate::identity;
use crate::navigation;
use crate::registry::params::OpenBlockParams;
use crate::registry::validation;
use crate::registry::{CommandOutput, CommandResult};
use crate::resolver::resolve_block_owner;
use crate::state::AppState;

/// Open the document that owns a block id, with the cursor on the block.
pub async fn open_block(state: Arc<AppState>, p: OpenBlockParams) -> Result<CommandOutput, AppError> {
    let block = validation::require(p.block.as_deref(), "block")?;
    let owner = resolve_block_owner(state.host.markdown_caches().await, block)?;
    tracing::debug!(block, owner, "block owner resolved");

    let new_pane = state.settings().open_file_without_write_in_new_pane;
    let pane = navigation::resolve_pane(&state, p.openMode.as_deref(), new_pane)?;
    navigation::open_link(&state, Some(format!("{owner}#^{block}")), pane, None).await?;

    let cache = identity::cache_of(&state, &owner).await?;
    let position = cache
        .blocks
        .get(block)
        .map(|b| b.position)
        .ok_or_else(|| AppError::not_found(format!("Block \"{block}\"")))?;
    common::place_cursor(&state, position.start.line)?;

    Ok(CommandOutput::new(
        format!("Opened block ^{block} in \"{owner}\""),
        CommandResult::OpenBlock(owner),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::host::memory::MemoryHost;
    use crate::host::{Editor, PaneTarget};
    use crate::registry::handlers::testing::state_for;

    #[tokio::test]
    async fn opens_owner_at_block() {
        let memory = MemoryHost::new("v");
        memory.seed("a.md", "nothing here").await.unwrap();
        memory.seed("dir/b.md", "intro\n\n- item ^blk\n").await.unwrap();
        let (state, _dir) = state_for(&memory);

        let p = OpenBlockParams {
            block: Some("blk".into()),
            openMode: Some("split".into()),
            filepath: Some("a.md".into()),
        };
        let out = open_block(Arc::clone(&state), p).await.unwrap();
        assert!(matches!(out.result, CommandResult::OpenBlock(ref owner) if owner == "dir/b.md"));
        let request = &memory.workspace.opened()[0];
        assert_eq!(request.link.as_deref(), Some("dir/b.md#^blk"));
        assert_eq!(request.pane, PaneTarget::Split);
        assert_eq!(memory.workspace.active_editor().unwrap().cursor().line, 2);
    }

    #[tokio::test]
    async fn missing_or_unknown_block() {
        let memory = MemoryHost::new("v");
        let (state, _dir) = state_for(&memory);
        let err = open_block(Arc::clone(&state), OpenBlockParams::default()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let p = OpenBlockParams {
            block: Some("nope".into()),
            ..OpenBlockParams::default()
        };
        let err = open_block(Arc::clone(&state), p).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
