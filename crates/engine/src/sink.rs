//! Execution-state sink: where the controller publishes what happens.
//!
//! The controller only ever writes through [`ExecutionSink`]; the UI-facing
//! store (here [`InMemorySink`]) owns the [`RunState`] and decides how it is
//! observed.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::broadcast;

use crate::state::{LogEntry, NodeRunRecord, NodeStatus, RunState, RunStatus};

/// Receives every state transition of a run.
pub trait ExecutionSink: Send + Sync {
    /// Forget the previous run and mark `node_ids` pending.
    fn reset(&self, node_ids: &[String]);
    fn set_status(&self, status: RunStatus);
    fn set_current_node(&self, node_id: Option<&str>);
    fn set_node_status(&self, node_id: &str, status: NodeStatus);
    /// Replace the record of `node_id`; a recorded output also lands in the data map.
    fn record_node(&self, node_id: &str, record: NodeRunRecord);
    fn append_log(&self, entry: LogEntry);
    /// Pacing between steps, read before every step.
    fn execution_speed(&self) -> Duration;
}

const LOG_CHANNEL_CAPACITY: usize = 256;

/// Default sink: keeps the run state in memory and fans log entries out to
/// subscribers.
pub struct InMemorySink {
    state: Mutex<RunState>,
    logs_tx: broadcast::Sender<LogEntry>,
}

impl InMemorySink {
    pub fn new(execution_speed: Duration) -> Self {
        let (logs_tx, _) = broadcast::channel(LOG_CHANNEL_CAPACITY);
        let state = RunState {
            execution_speed_ms: u64::try_from(execution_speed.as_millis()).unwrap_or(u64::MAX),
            ..Default::default()
        };
        Self {
            state: Mutex::new(state),
            logs_tx,
        }
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> RunState {
        self.lock().clone()
    }

    pub fn status(&self) -> RunStatus {
        self.lock().status
    }

    pub fn node_status(&self, node_id: &str) -> NodeStatus {
        self.lock().node_status(node_id)
    }

    pub fn set_execution_speed(&self, speed: Duration) {
        self.lock().execution_speed_ms = u64::try_from(speed.as_millis()).unwrap_or(u64::MAX);
    }

    /// Live feed of log entries appended from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.logs_tx.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        // State stays consistent per call, so a poisoned lock is still usable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for InMemorySink {
    fn default() -> Self {
        Self::new(Duration::from_millis(1_000))
    }
}

impl ExecutionSink for InMemorySink {
    fn reset(&self, node_ids: &[String]) {
        let mut state = self.lock();
        state.current_node_id = None;
        state.data.clear();
        state.logs.clear();
        state.nodes = node_ids
            .iter()
            .map(|id| (id.clone(), NodeRunRecord::with_status(NodeStatus::Pending)))
            .collect();
    }

    fn set_status(&self, status: RunStatus) {
        self.lock().status = status;
    }

    fn set_current_node(&self, node_id: Option<&str>) {
        self.lock().current_node_id = node_id.map(str::to_owned);
    }

    fn set_node_status(&self, node_id: &str, status: NodeStatus) {
        self.lock()
            .nodes
            .entry(node_id.to_owned())
            .or_default()
            .status = status;
    }

    fn record_node(&self, node_id: &str, record: NodeRunRecord) {
        let mut state = self.lock();
        if let Some(output) = &record.output {
            state.data.insert(node_id.to_owned(), output.clone());
        }
        state.nodes.insert(node_id.to_owned(), record);
    }

    fn append_log(&self, entry: LogEntry) {
        self.lock().logs.push(entry.clone());
        // No subscribers is fine.
        let _ = self.logs_tx.send(entry);
    }

    fn execution_speed(&self) -> Duration {
        Duration::from_millis(self.lock().execution_speed_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reset_marks_every_node_pending_and_clears_history() {
        let sink = InMemorySink::default();
        sink.append_log(LogEntry::new("a", "A", NodeStatus::Success, "done"));
        sink.record_node(
            "a",
            NodeRunRecord {
                output: Some(json!({ "v": 1 })),
                ..NodeRunRecord::with_status(NodeStatus::Success)
            },
        );

        sink.reset(&["a".into(), "b".into()]);
        let state = sink.snapshot();
        assert!(state.logs.is_empty());
        assert!(state.data.is_empty());
        assert_eq!(state.node_status("a"), NodeStatus::Pending);
        assert_eq!(state.node_status("b"), NodeStatus::Pending);
    }

    #[test]
    fn recorded_output_lands_in_data_map() {
        let sink = InMemorySink::default();
        sink.record_node(
            "n",
            NodeRunRecord {
                output: Some(json!({ "ok": true })),
                ..NodeRunRecord::with_status(NodeStatus::Success)
            },
        );
        assert_eq!(sink.snapshot().data["n"], json!({ "ok": true }));
    }

    #[tokio::test]
    async fn subscribers_see_appended_logs() {
        let sink = InMemorySink::default();
        let mut rx = sink.subscribe();
        sink.append_log(LogEntry::new("a", "A", NodeStatus::Running, "go"));
        assert_eq!(rx.recv().await.unwrap().node_id, "a");
    }

    #[test]
    fn execution_speed_is_adjustable() {
        let sink = InMemorySink::new(Duration::from_millis(250));
        assert_eq!(sink.execution_speed(), Duration::from_millis(250));
        sink.set_execution_speed(Duration::ZERO);
        assert_eq!(sink.execution_speed(), Duration::ZERO);
    }
}
