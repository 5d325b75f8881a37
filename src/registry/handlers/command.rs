#![allow(clippy::needless_pass_by_value)]

use std::sync::Arc;

use crate::error::AppError;
use crate::navigation;
use crate::registry::params::CommandParams;
use crate::registry::{CommandOutput, CommandResult};
use crate::settle::{settle, CONFIRM_SETTLE};
use crate::state::AppState;

/// Open the requested document, then run an application command by id or by
/// display name.
pub async fn command(state: Arc<AppState>, p: CommandParams) -> Result<CommandOutput, AppError> {
    navigation::open_for_params(&state, &p.open).await?;

    let commands = &state.host.commands;
    let id = match (&p.commandid, &p.commandname) {
        (Some(id), _) => id.clone(),
        (None, Some(name)) => commands
            .list()
            .into_iter()
            .find(|c| c.name == *name)
            .map(|c| c.id)
            .ok_or_else(|| AppError::not_found(format!("Command named \"{name}\"")))?,
        (None, None) => {
            return Ok(CommandOutput::new("No command given", CommandResult::Command(None)));
        }
    };

    tracing::info!(id, "executing command");
    commands.execute_by_id(&id).await?;
    if p.confirm {
        settle(CONFIRM_SETTLE).await;
        commands.confirm().await?;
    }
    Ok(CommandOutput::new(
        format!("Executed {id}"),
        CommandResult::Command(Some(id)),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::host::memory::{MemoryHost, StaticCommands};
    use crate::registry::handlers::testing::state_for;
    use crate::registry::params::OpenFileParams;

    fn host() -> MemoryHost {
        MemoryHost::new("v").with_commands(StaticCommands::new([
            ("editor:toggle-bold", "Toggle bold"),
            ("app:reload", "Reload app without saving"),
        ]))
    }

    #[tokio::test]
    async fn runs_by_id_or_name() {
        let memory = host();
        let (state, _dir) = state_for(&memory);
        let by_id = CommandParams {
            commandid: Some("app:reload".into()),
            ..CommandParams::default()
        };
        command(Arc::clone(&state), by_id).await.unwrap();
        let by_name = CommandParams {
            commandname: Some("Toggle bold".into()),
            ..CommandParams::default()
        };
        let out = command(Arc::clone(&state), by_name).await.unwrap();
        assert_eq!(out.message, "Executed editor:toggle-bold");
        assert_eq!(memory.commands.executed(), vec!["app:reload", "editor:toggle-bold"]);
        assert_eq!(memory.commands.confirmations(), 0);
    }

    #[tokio::test]
    async fn unknown_commands_are_not_found() {
        let memory = host();
        let (state, _dir) = state_for(&memory);
        for p in [
            CommandParams {
                commandid: Some("missing:id".into()),
                ..CommandParams::default()
            },
            CommandParams {
                commandname: Some("Missing".into()),
                ..CommandParams::default()
            },
        ] {
            let err = command(Arc::clone(&state), p).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotFound);
        }
    }

    #[tokio::test]
    async fn opens_file_first_and_confirms() {
        let memory = host();
        memory.seed("a.md", "text").await.unwrap();
        let (state, _dir) = state_for(&memory);
        let p = CommandParams {
            open: OpenFileParams {
                filepath: Some("a.md".into()),
                ..OpenFileParams::default()
            },
            commandid: Some("app:reload".into()),
            confirm: true,
            ..CommandParams::default()
        };
        command(Arc::clone(&state), p).await.unwrap();
        assert_eq!(memory.workspace.opened()[0].link.as_deref(), Some("a.md"));
        assert_eq!(memory.commands.confirmations(), 1);
    }
}
