use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::error::AppError;
use crate::state::AppState;
use crate::uri::{self, RawParams};

use super::{CommandOutput, CommandResult, UriCommand};

/// Execute one parameter object against the application state.
/// This is the single place where a failure is logged and shown to the user.
pub async fn execute(state: &Arc<AppState>, params: RawParams) -> Result<CommandOutput, AppError> {
    let result = dispatch_params(Arc::clone(state), params).await;
    if let Err(e) = &result {
        report(state, e);
    }
    result
}

/// Parse a URI and execute its parameters.
pub async fn execute_uri(state: &Arc<AppState>, uri: &str) -> Result<CommandOutput, AppError> {
    let params = match uri::parse_uri(uri, &state.settings()) {
        Ok(params) => params,
        Err(e) => {
            report(state, &e);
            return Err(e);
        }
    };
    execute(state, params).await
}

fn report(state: &AppState, e: &AppError) {
    tracing::error!(error = %e, "dispatch failed");
    state.host.notifier.notify(&e.to_string());
}

/// Route a parameter object by its `type`: built-ins first, then the first
/// enabled foreign handler. Boxed so `multi` can recurse through it.
pub(crate) fn dispatch_params(
    state: Arc<AppState>,
    params: RawParams,
) -> BoxFuture<'static, Result<CommandOutput, AppError>> {
    Box::pin(async move {
        let kind = params
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        if UriCommand::is_builtin(&kind) {
            tracing::debug!(kind, "built-in dispatch");
            let command = UriCommand::from_params(&kind, &Value::Object(params))?;
            return command.dispatch(state).await;
        }

        if let Some(handler) = state.foreign.find_enabled(&kind) {
            tracing::debug!(kind, "foreign dispatch");
            let outcome = handler.invoke(&params).await;
            if !outcome.ok {
                tracing::warn!(kind, err = ?outcome.err, "foreign handler reported failure");
            }
            return Ok(CommandOutput::new(
                format!("Dispatched {kind} to foreign handler"),
                CommandResult::Foreign(outcome),
            ));
        }

        Err(AppError::not_found(format!(
            "Handler for type \"{kind}\" ({})",
            Value::Object(params)
        )))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::host::memory::MemoryHost;
    use crate::registry::foreign::tests::EchoHandler;
    use crate::registry::handlers::testing::state_for;
    use serde_json::json;

    fn params(value: Value) -> RawParams {
        match value {
            Value::Object(map) => Some(map),
            _ => None,
        }
        .unwrap()
    }

    #[tokio::test]
    async fn unknown_type_names_type_and_params() {
        let memory = MemoryHost::new("v");
        let (state, _dir) = state_for(&memory);
        let err = execute(&state, params(json!({ "type": "nope", "x": "1" }))).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let message = err.to_string();
        assert!(message.contains("\"nope\""));
        assert!(message.contains("\"x\":\"1\""));
        assert_eq!(memory.notifier.messages(), vec![message]);
    }

    #[tokio::test]
    async fn enabled_foreign_handler_receives_raw_params() {
        let memory = MemoryHost::new("v");
        let (state, _dir) = state_for(&memory);
        let handler = Arc::new(EchoHandler::new("echo"));
        state.register_foreign(Arc::clone(&handler) as Arc<dyn crate::registry::foreign::ForeignHandler>).unwrap();

        let err = execute(&state, params(json!({ "type": "echo" }))).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        state.set_foreign_enabled("echo", true).unwrap();
        let out = execute(&state, params(json!({ "type": "echo", "a": "b" }))).await.unwrap();
        assert!(matches!(out.result, CommandResult::Foreign(ref o) if o.ok));
        assert_eq!(handler.calls.lock()[0]["a"], "b");
    }

    #[tokio::test]
    async fn foreign_failure_is_not_a_dispatch_failure() {
        let memory = MemoryHost::new("v");
        let (state, _dir) = state_for(&memory);
        state
            .register_foreign(Arc::new(EchoHandler::new("flaky").failing("boom")))
            .unwrap();
        state.set_foreign_enabled("flaky", true).unwrap();
        let out = execute(&state, params(json!({ "type": "flaky" }))).await.unwrap();
        let outcome = match out.result {
            CommandResult::Foreign(outcome) => Some(outcome),
            _ => None,
        }
        .unwrap();
        assert!(!outcome.ok);
        assert_eq!(outcome.err.as_deref(), Some("boom"));
        assert!(memory.notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn multi_stops_at_first_failure_and_reports_once() {
        let memory = MemoryHost::new("v");
        let (state, _dir) = state_for(&memory);
        let batch = json!([
            { "type": "event", "eventName": "a" },
            { "type": "write", "filepath": "x.md" },
            { "type": "event", "eventName": "c" }
        ]);
        let err = execute(&state, params(json!({ "type": "multi", "comamnds": batch.to_string() })))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(memory.events.named("a").len(), 1);
        assert!(memory.events.named("c").is_empty());
        assert_eq!(memory.notifier.messages().len(), 1);
    }

    #[tokio::test]
    async fn uri_is_parsed_then_dispatched() {
        let memory = MemoryHost::new("v");
        let (state, _dir) = state_for(&memory);
        let out = execute_uri(&state, "obsidian://uri-link?type=event&eventName=ping")
            .await
            .unwrap();
        assert!(matches!(out.result, CommandResult::Event(ref name) if name == "ping"));

        let err = execute_uri(&state, "other://uri-link?type=event").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(memory.notifier.messages().len(), 1);
    }
}
