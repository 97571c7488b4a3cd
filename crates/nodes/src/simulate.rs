//! `SimulatedExecutor` — the default executor used for run previews.

use std::sync::Mutex;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::builtin::{action, condition, delay, transform, trigger};
use crate::{ExecutionContext, NodeError, NodeExecutor, NodeKind, NodeOutcome};

/// Tuning knobs for the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Probability that an `http-request` node succeeds.
    pub http_success_rate: f64,
    /// Probability that a `send-email` / `send-sms` node succeeds.
    pub messaging_success_rate: f64,
    /// Upper bound for a `delay` node's wait, whatever it is configured to.
    pub max_delay_ms: u64,
    /// Fixed RNG seed for reproducible previews.
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            http_success_rate: 0.9,
            messaging_success_rate: 0.95,
            max_delay_ms: 5_000,
            seed: None,
        }
    }
}

/// Executes every node kind with simulated effects.
pub struct SimulatedExecutor {
    config: SimulationConfig,
    rng: Mutex<StdRng>,
}

impl SimulatedExecutor {
    pub fn new(config: SimulationConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            rng: Mutex::new(rng),
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Run `f` with the shared RNG.
    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> Result<T, NodeError> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| NodeError::Unexpected("simulation RNG lock poisoned".into()))?;
        Ok(f(&mut rng))
    }
}

impl Default for SimulatedExecutor {
    fn default() -> Self {
        Self::new(SimulationConfig::default())
    }
}

#[async_trait]
impl NodeExecutor for SimulatedExecutor {
    async fn execute(
        &self,
        kind: &NodeKind,
        input: Value,
        ctx: &ExecutionContext,
    ) -> Result<NodeOutcome, NodeError> {
        debug!(node_id = %ctx.node_id, node_type = %kind.node_type(), "simulating node");

        let outcome = match kind {
            NodeKind::ManualTrigger(cfg) => trigger::manual(cfg),
            NodeKind::WebhookTrigger(cfg) => trigger::webhook(cfg),
            NodeKind::HttpRequest(cfg) => self.with_rng(|rng| {
                action::http_request(cfg, &input, self.config.http_success_rate, rng)
            })?,
            NodeKind::SendEmail(cfg) => self.with_rng(|rng| {
                action::send_email(cfg, self.config.messaging_success_rate, rng)
            })?,
            NodeKind::SendSms(cfg) => self.with_rng(|rng| {
                action::send_sms(cfg, self.config.messaging_success_rate, rng)
            })?,
            NodeKind::Delay(cfg) => {
                delay::run(cfg, input, self.config.max_delay_ms, &ctx.cancel).await?
            }
            NodeKind::Condition(cfg) => condition::run(cfg, &input),
            NodeKind::Transform(cfg) => transform::run(cfg, &input),
        };

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::{HttpRequestConfig, SendEmailConfig};
    use serde_json::json;

    fn seeded(http: f64, messaging: f64) -> SimulatedExecutor {
        SimulatedExecutor::new(SimulationConfig {
            http_success_rate: http,
            messaging_success_rate: messaging,
            seed: Some(42),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn dispatches_each_kind() {
        let exec = seeded(1.0, 0.0);
        let ctx = ExecutionContext::new("n1");

        let out = exec
            .execute(&NodeKind::manual_trigger(), json!({}), &ctx)
            .await
            .unwrap();
        assert!(out.fires("output"));

        let out = exec
            .execute(&NodeKind::HttpRequest(HttpRequestConfig::default()), json!({}), &ctx)
            .await
            .unwrap();
        assert!(out.fires("success"));

        let out = exec
            .execute(&NodeKind::SendEmail(SendEmailConfig::default()), json!({}), &ctx)
            .await
            .unwrap();
        assert!(out.fires("error"));
    }

    #[tokio::test]
    async fn same_seed_gives_same_outcomes() {
        let kind = NodeKind::HttpRequest(HttpRequestConfig::default());
        let ctx = ExecutionContext::new("http");
        let mut runs = Vec::new();

        for _ in 0..2 {
            let exec = seeded(0.5, 0.5);
            let mut fired = Vec::new();
            for _ in 0..16 {
                let out = exec.execute(&kind, json!({}), &ctx).await.unwrap();
                fired.push(out.success);
            }
            runs.push(fired);
        }

        assert_eq!(runs[0], runs[1]);
    }
}
