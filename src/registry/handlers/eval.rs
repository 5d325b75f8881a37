#![allow(clippy::needless_pass_by_value)]

use std::sync::Arc;

use crate::error::AppError;
use crate::navigation;
use crate::registry::params::EvalParams;
use crate::registry::{CommandOutput, CommandResult};
use crate::state::AppState;

pub async fn eval(state: Arc<AppState>, p: EvalParams) -> Result<CommandOutput, AppError> {
    if !state.settings().allow_eval {
        return Err(AppError::PermissionDenied {
            message: "eval is disabled; enable allow_eval in the settings".to_string(),
        });
    }
    navigation::open_for_params(&state, &p.open).await?;
    tracing::info!(bytes = p.eval.len(), "evaluating source");
    state.host.evaluator.evaluate(&p.eval).await?;
    Ok(CommandOutput::new("Evaluated", CommandResult::Eval))
}
