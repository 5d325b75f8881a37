#![allow(clippy::needless_pass_by_value)]

use std::sync::Arc;

use percent_encoding::percent_decode_str;
use serde_json::Value;

use crate::error::AppError;
use crate::registry::execute;
use crate::registry::params::{EventParams, MultiParams};
use crate::registry::validation;
use crate::registry::{CommandOutput, CommandResult};
use crate::state::AppState;
use crate::uri::RawParams;

/// Parameter objects of a `multi` payload: a percent-encoded JSON array, or
/// the array itself.
fn parse_batch(payload: Option<Value>) -> Result<Vec<RawParams>, AppError> {
    let value = match payload {
        None | Some(Value::Null) => {
            return Err(AppError::invalid("missing required parameter \"comamnds\""));
        }
        Some(Value::String(encoded)) => {
            let decoded = percent_decode_str(&encoded)
                .decode_utf8()
                .map_err(|e| AppError::invalid(format!("comamnds is not UTF-8: {e}")))?;
            serde_json::from_str(&decoded)
                .map_err(|e| AppError::invalid(format!("comamnds is not JSON: {e}")))?
        }
        Some(other) => other,
    };
    let Value::Array(items) = value else {
        return Err(AppError::invalid("comamnds must be a JSON array"));
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::Object(params) => Ok(params),
            other => Err(AppError::invalid(format!(
                "comamnds entries must be objects, got {other}"
            ))),
        })
        .collect()
}

/// Run each parameter object in order through the dispatcher. The first
/// failure stops the batch; earlier effects stay.
pub async fn multi(state: Arc<AppState>, p: MultiParams) -> Result<CommandOutput, AppError> {
    let batch = parse_batch(p.comamnds)?;
    let total = batch.len();
    for (index, params) in batch.into_iter().enumerate() {
        tracing::debug!(index, total, "multi step");
        execute::dispatch_params(Arc::clone(&state), params).await?;
    }
    Ok(CommandOutput::new(
        format!("Ran {total} dispatches"),
        CommandResult::Multi(total),
    ))
}

/// Publish the parameters under `eventName`.
pub async fn event(state: Arc<AppState>, p: EventParams) -> Result<CommandOutput, AppError> {
    let name = validation::require(p.eventName.as_deref(), "eventName")?.to_string();
    let mut payload = p.extra;
    payload.insert("eventName".to_string(), Value::String(name.clone()));
    tracing::debug!(name, "publishing event");
    state.host.events.publish(&name, &Value::Object(payload));
    Ok(CommandOutput::new(
        format!("Published {name}"),
        CommandResult::Event(name),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::host::memory::MemoryHost;
    use crate::registry::handlers::testing::state_for;
    use serde_json::json;

    #[test]
    fn batch_accepts_encoded_text_or_array() {
        let encoded = "%5B%7B%22type%22%3A%22event%22%7D%5D";
        assert_eq!(parse_batch(Some(json!(encoded))).unwrap().len(), 1);
        assert_eq!(parse_batch(Some(json!([{ "type": "a" }, { "type": "b" }]))).unwrap().len(), 2);

        for bad in [None, Some(json!("{\"type\":\"x\"}")), Some(json!("not json")), Some(json!([1]))] {
            let err = parse_batch(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        }
    }

    #[tokio::test]
    async fn event_forwards_every_parameter() {
        let memory = MemoryHost::new("v");
        let (state, _dir) = state_for(&memory);
        let p: EventParams =
            serde_json::from_value(json!({ "type": "event", "eventName": "sync", "k": "v" })).unwrap();
        event(Arc::clone(&state), p).await.unwrap();
        let published = memory.events.named("sync");
        assert_eq!(published, vec![json!({ "type": "event", "k": "v", "eventName": "sync" })]);

        let err = event(Arc::clone(&state), EventParams::default()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn multi_runs_in_order() {
        let memory = MemoryHost::new("v");
        let (state, _dir) = state_for(&memory);
        let p = MultiParams {
            comamnds: Some(json!([
                { "type": "event", "eventName": "first" },
                { "type": "event", "eventName": "second" }
            ])),
        };
        let out = multi(Arc::clone(&state), p).await.unwrap();
        assert!(matches!(out.result, CommandResult::Multi(2)));
        let names: Vec<String> = memory.events.published().into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["first", "second"]);
    }
}
