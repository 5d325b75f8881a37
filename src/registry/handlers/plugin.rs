#![allow(clippy::needless_pass_by_value)]

use std::sync::Arc;

use serde::Serialize;

use crate::error::AppError;
use crate::registry::params::PluginParams;
use crate::registry::{CommandOutput, CommandResult};
use crate::state::AppState;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PluginReport {
    pub enabled: Vec<String>,
    pub disabled: Vec<String>,
    /// Ids that matched no installed plugin.
    pub skipped: Vec<String>,
}

async fn toggle(state: &AppState, ids: Vec<&str>, enabled: bool, report: &mut PluginReport) -> Result<(), AppError> {
    let plugins = &state.host.plugins;
    for id in ids {
        let Some(source) = plugins.source(id) else {
            tracing::warn!(id, "no such plugin, skipping");
            report.skipped.push(id.to_string());
            continue;
        };
        plugins.set_enabled(id, source, enabled).await?;
        tracing::info!(id, ?source, enabled, "plugin toggled");
        let verb = if enabled { "Enabled" } else { "Disabled" };
        state.host.notifier.notify(&format!("{verb} {id}"));
        if enabled {
            report.enabled.push(id.to_string());
        } else {
            report.disabled.push(id.to_string());
        }
    }
    Ok(())
}

/// Enable, then disable, the listed plugins.
pub async fn plugin(state: Arc<AppState>, p: PluginParams) -> Result<CommandOutput, AppError> {
    let mut report = PluginReport::default();
    toggle(&state, p.enable_ids(), true, &mut report).await?;
    toggle(&state, p.disable_ids(), false, &mut report).await?;
    Ok(CommandOutput::new(
        format!(
            "{} enabled, {} disabled",
            report.enabled.len(),
            report.disabled.len()
        ),
        CommandResult::Plugin(report),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::host::memory::{MemoryHost, StaticPlugins};
    use crate::registry::handlers::testing::state_for;

    #[tokio::test]
    async fn toggles_community_and_builtin() {
        let memory = MemoryHost::new("v").with_plugins(
            StaticPlugins::default()
                .with_community("dataview", false)
                .with_builtin("daily-notes", true),
        );
        let (state, _dir) = state_for(&memory);
        let p = PluginParams {
            enablePlugins: Some("dataview,ghost".into()),
            disablePlugins: Some("daily-notes".into()),
        };
        let out = plugin(Arc::clone(&state), p).await.unwrap();
        let report = match out.result {
            CommandResult::Plugin(report) => Some(report),
            _ => None,
        }
        .unwrap();
        assert_eq!(report.enabled, vec!["dataview"]);
        assert_eq!(report.disabled, vec!["daily-notes"]);
        assert_eq!(report.skipped, vec!["ghost"]);
        assert!(memory.plugins.is_enabled("dataview"));
        assert!(!memory.plugins.is_enabled("daily-notes"));
        assert_eq!(memory.notifier.messages(), vec!["Enabled dataview", "Disabled daily-notes"]);
    }
}
