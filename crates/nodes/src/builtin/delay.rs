//! Delay node: waits a clamped amount of simulated time.

use std::time::Duration;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::kind::{DelayConfig, HANDLE_OUTPUT};
use crate::{NodeError, NodeOutcome};

/// Configured delay in milliseconds, clamped to `[0, max_ms]`.
///
/// Negative and non-finite durations wait zero.
pub fn effective_millis(config: &DelayConfig, max_ms: u64) -> u64 {
    let requested = config.duration * config.unit.millis_per_unit();
    if !requested.is_finite() || requested <= 0.0 {
        return 0;
    }
    (requested.round() as u64).min(max_ms)
}

/// Wait, then pass the input through on `output`.
///
/// Returns [`NodeError::Cancelled`] as soon as `cancel` fires.
pub async fn run(
    config: &DelayConfig,
    input: Value,
    max_ms: u64,
    cancel: &CancellationToken,
) -> Result<NodeOutcome, NodeError> {
    let wait_ms = effective_millis(config, max_ms);
    let requested_ms = config.duration * config.unit.millis_per_unit();

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_millis(wait_ms)) => {}
        _ = cancel.cancelled() => return Err(NodeError::Cancelled),
    }

    Ok(NodeOutcome::fired(
        json!({
            "delayed": true,
            "delay_ms": wait_ms,
            "requested_ms": requested_ms,
            "data": input,
        }),
        HANDLE_OUTPUT,
    ))
}
