//! Run controller — drives an execution order through time.
//!
//! `RunController` is the stateful orchestrator of a preview run:
//! 1. Snapshots the graph and computes the topological order.
//! 2. Walks the order one node at a time, invoking the `NodeExecutor`.
//! 3. Propagates outputs along edges and skips branches that did not fire.
//! 4. Publishes every transition to the `ExecutionSink`.
//! 5. Honours pause / resume / step / stop between nodes.
//!
//! Share it behind an `Arc`: `start()` runs the loop to completion while
//! `pause()`, `resume()`, `step()` and `stop()` are called from elsewhere.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use nodes::{ExecutionContext, NodeError, NodeExecutor, NodeOutcome};

use crate::config::ControllerConfig;
use crate::dag::topological_order;
use crate::models::{GraphSnapshot, SharedGraph};
use crate::propagation::{collect_input, inactive_branch};
use crate::sink::ExecutionSink;
use crate::state::{LogEntry, NodeRunRecord, NodeStatus, RunStatus};
use crate::EngineError;

// ---------------------------------------------------------------------------
// Per-run state
// ---------------------------------------------------------------------------

/// Private state of one run; replaced on every start and dropped on stop.
struct RunSession {
    run_id: Uuid,
    snapshot: GraphSnapshot,
    order: Vec<String>,
    /// Index of the next node in `order`.
    index: usize,
    skipped: HashSet<String>,
    outputs: HashMap<String, Value>,
}

/// What a single advance of the order did.
enum Advance {
    /// A node was executed or skipped; `remaining` are still to go.
    Executed { remaining: usize },
    /// The order was already fully consumed.
    Exhausted,
    /// A node failed and `stop_on_error` is set.
    Halted,
    /// The run was stopped underneath us.
    Detached,
}

/// Marks the run loop active for as long as it lives.
struct LoopGuard<'a>(&'a watch::Sender<bool>);

impl<'a> LoopGuard<'a> {
    fn acquire(flag: &'a watch::Sender<bool>) -> Option<Self> {
        let mut acquired = false;
        flag.send_if_modified(|active| {
            if *active {
                return false;
            }
            *active = true;
            acquired = true;
            true
        });
        acquired.then_some(Self(flag))
    }
}

impl Drop for LoopGuard<'_> {
    fn drop(&mut self) {
        self.0.send_replace(false);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// RunController
// ---------------------------------------------------------------------------

/// Drives one run at a time over a shared graph.
pub struct RunController {
    graph: SharedGraph,
    executor: Arc<dyn NodeExecutor>,
    sink: Arc<dyn ExecutionSink>,
    config: ControllerConfig,
    status: Mutex<RunStatus>,
    session: tokio::sync::Mutex<Option<RunSession>>,
    /// Token of the current run; cancelled by `stop()`.
    cancel: Mutex<CancellationToken>,
    /// `true` while a pause is armed.
    paused: watch::Sender<bool>,
    /// `true` while `start()` is driving the loop.
    looping: watch::Sender<bool>,
}

impl RunController {
    pub fn new(
        graph: SharedGraph,
        executor: Arc<dyn NodeExecutor>,
        sink: Arc<dyn ExecutionSink>,
        config: ControllerConfig,
    ) -> Self {
        let (paused, _) = watch::channel(false);
        let (looping, _) = watch::channel(false);
        Self {
            graph,
            executor,
            sink,
            config,
            status: Mutex::new(RunStatus::Idle),
            session: tokio::sync::Mutex::new(None),
            cancel: Mutex::new(CancellationToken::new()),
            paused,
            looping,
        }
    }

    pub fn status(&self) -> RunStatus {
        *lock(&self.status)
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    /// Start a fresh run and drive it until it completes, halts or is stopped.
    ///
    /// # Errors
    /// [`EngineError::AlreadyRunning`] if another `start()` is still driving.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<(), EngineError> {
        let _guard = LoopGuard::acquire(&self.looping).ok_or(EngineError::AlreadyRunning)?;

        let token = self.prepare_run().await;
        self.set_status(RunStatus::Running);
        self.drive(&token).await;
        Ok(())
    }

    /// Execute exactly one node of the order.
    ///
    /// While idle, the first call prepares a fresh run exactly like `start()`.
    /// Returns whether further steps remain.
    ///
    /// # Errors
    /// [`EngineError::AlreadyRunning`] if the loop is running unpaused.
    #[instrument(skip(self))]
    pub async fn step(&self) -> Result<bool, EngineError> {
        let token = match self.status() {
            RunStatus::Running => return Err(EngineError::AlreadyRunning),
            RunStatus::Completed | RunStatus::Error => return Ok(false),
            RunStatus::Idle => self.prepare_run().await,
            RunStatus::Paused => self.current_token(),
        };

        match self.advance(&token).await {
            Advance::Executed { remaining: 0 } | Advance::Exhausted => {
                self.finish(&token, RunStatus::Completed);
                self.release_parked_loop().await;
                Ok(false)
            }
            Advance::Executed { .. } => {
                let mut status = lock(&self.status);
                if token.is_cancelled() {
                    return Ok(false);
                }
                *status = RunStatus::Paused;
                self.sink.set_status(RunStatus::Paused);
                Ok(true)
            }
            Advance::Halted => {
                self.finish(&token, RunStatus::Error);
                self.release_parked_loop().await;
                Ok(false)
            }
            Advance::Detached => Ok(false),
        }
    }

    /// Arm the pause barrier.  The node currently executing finishes; the
    /// next one waits until `resume()` or `stop()`.
    ///
    /// Returns `false` if not running or a pause is already armed.
    pub fn pause(&self) -> bool {
        let mut status = lock(&self.status);
        if *status != RunStatus::Running || *self.paused.borrow() {
            return false;
        }
        self.paused.send_replace(true);
        *status = RunStatus::Paused;
        self.sink.set_status(RunStatus::Paused);
        info!("run paused");
        true
    }

    /// Release the pause barrier.  Returns `false` if no pause was armed.
    pub fn resume(&self) -> bool {
        let mut status = lock(&self.status);
        if !*self.paused.borrow() {
            return false;
        }
        self.paused.send_replace(false);
        if *status == RunStatus::Paused {
            *status = RunStatus::Running;
            self.sink.set_status(RunStatus::Running);
        }
        info!("run resumed");
        true
    }

    /// Abort the run from any state and return to `idle`.
    ///
    /// Pending waits are released at once; a node already executing is
    /// allowed to finish but nothing is scheduled after it.
    #[instrument(skip(self))]
    pub async fn stop(&self) {
        lock(&self.cancel).cancel();
        self.paused.send_replace(false);

        let mut looping = self.looping.subscribe();
        // Err means the sender is gone, which cannot outlive `self`.
        let _ = looping.wait_for(|active| !*active).await;

        let discarded = self.session.lock().await.take();
        if let Some(session) = discarded {
            info!(run_id = %session.run_id, executed = session.index, "run stopped");
        }

        *lock(&self.status) = RunStatus::Idle;
        self.sink.set_status(RunStatus::Idle);
        self.sink.set_current_node(None);
    }

    // -----------------------------------------------------------------------
    // Internal: run lifecycle
    // -----------------------------------------------------------------------

    /// Snapshot the graph, compute the order and reset the published state.
    async fn prepare_run(&self) -> CancellationToken {
        let token = CancellationToken::new();
        {
            let mut current = lock(&self.cancel);
            current.cancel();
            *current = token.clone();
        }
        self.paused.send_replace(false);

        let snapshot = self.graph.read().await.snapshot();
        let schedule = topological_order(snapshot.nodes(), snapshot.edges());
        let run_id = Uuid::new_v4();

        let all_ids: Vec<String> = snapshot.nodes().iter().map(|n| n.id.clone()).collect();
        self.sink.reset(&all_ids);
        self.sink.set_current_node(None);

        for id in &schedule.unscheduled {
            let name = snapshot.node(id).map_or(id.as_str(), |n| n.display_name());
            self.sink.set_node_status(id, NodeStatus::Skipped);
            self.sink.append_log(LogEntry::new(
                id.as_str(),
                name,
                NodeStatus::Skipped,
                "Skipped: node is part of a cycle and cannot be scheduled",
            ));
        }

        info!(
            %run_id,
            scheduled = schedule.order.len(),
            unscheduled = schedule.unscheduled.len(),
            "run prepared"
        );

        let skipped = schedule.unscheduled.iter().cloned().collect();
        *self.session.lock().await = Some(RunSession {
            run_id,
            snapshot,
            order: schedule.order,
            index: 0,
            skipped,
            outputs: HashMap::new(),
        });

        token
    }

    async fn drive(&self, token: &CancellationToken) {
        loop {
            if token.is_cancelled() {
                return;
            }
            self.pause_barrier(token).await;
            if token.is_cancelled() || self.status().is_terminal() {
                return;
            }

            match self.advance(token).await {
                Advance::Executed { remaining: 0 } | Advance::Exhausted => {
                    self.finish(token, RunStatus::Completed);
                    return;
                }
                Advance::Executed { .. } => {}
                Advance::Halted => {
                    self.finish(token, RunStatus::Error);
                    return;
                }
                Advance::Detached => return,
            }

            let pace = self.sink.execution_speed();
            if !pace.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(pace) => {}
                    _ = token.cancelled() => return,
                }
            }
        }
    }

    /// Suspend while a pause is armed; released by `resume()` or `stop()`.
    async fn pause_barrier(&self, token: &CancellationToken) {
        let mut paused = self.paused.subscribe();
        if !*paused.borrow_and_update() {
            return;
        }
        debug!("waiting at pause barrier");
        tokio::select! {
            _ = paused.wait_for(|p| !*p) => {}
            _ = token.cancelled() => {}
        }
    }

    /// Publish a terminal status unless the run was stopped meanwhile.
    fn finish(&self, token: &CancellationToken, status: RunStatus) {
        let mut current = lock(&self.status);
        if token.is_cancelled() {
            return;
        }
        *current = status;
        self.sink.set_status(status);
        self.sink.set_current_node(None);
        match status {
            RunStatus::Error => warn!("run halted on node failure"),
            _ => info!(%status, "run finished"),
        }
    }

    /// After `step()` ended the run, wake a `start()` loop parked at the
    /// pause barrier and wait for it to return.
    async fn release_parked_loop(&self) {
        self.paused.send_replace(false);
        let mut looping = self.looping.subscribe();
        let _ = looping.wait_for(|active| !*active).await;
    }

    fn current_token(&self) -> CancellationToken {
        lock(&self.cancel).clone()
    }

    fn set_status(&self, status: RunStatus) {
        *lock(&self.status) = status;
        self.sink.set_status(status);
    }

    // -----------------------------------------------------------------------
    // Internal: one node
    // -----------------------------------------------------------------------

    async fn advance(&self, token: &CancellationToken) -> Advance {
        let mut guard = self.session.lock().await;
        let Some(session) = guard.as_mut() else {
            return Advance::Detached;
        };
        if token.is_cancelled() {
            return Advance::Detached;
        }
        let Some(node_id) = session.order.get(session.index).cloned() else {
            return Advance::Exhausted;
        };
        session.index += 1;
        let remaining = session.order.len() - session.index;
        self.sink.set_current_node(Some(&node_id));

        if session.skipped.contains(&node_id) {
            let name = session
                .snapshot
                .node(&node_id)
                .map_or(node_id.as_str(), |n| n.display_name());
            debug!(%node_id, "skipping node on inactive branch");
            self.sink.set_node_status(&node_id, NodeStatus::Skipped);
            self.sink.append_log(LogEntry::new(
                node_id.as_str(),
                name,
                NodeStatus::Skipped,
                "Skipped: branch not taken",
            ));
            return Advance::Executed { remaining };
        }

        match self.execute_node(session, &node_id, token).await {
            None => Advance::Detached,
            Some(NodeStatus::Error) if self.config.stop_on_error => Advance::Halted,
            Some(_) => Advance::Executed { remaining },
        }
    }

    /// Run one node and record it.  `None` means the run was stopped while
    /// the node was waiting.
    async fn execute_node(
        &self,
        session: &mut RunSession,
        node_id: &str,
        token: &CancellationToken,
    ) -> Option<NodeStatus> {
        let input = collect_input(&session.snapshot, node_id, &session.outputs);
        let node = session.snapshot.node(node_id).cloned();
        let name = node
            .as_ref()
            .map_or_else(|| node_id.to_owned(), |n| n.display_name().to_owned());

        let started_at = Utc::now();
        let clock = Instant::now();
        self.sink.record_node(
            node_id,
            NodeRunRecord {
                status: NodeStatus::Running,
                started_at: Some(started_at),
                input: Some(input.clone()),
                ..Default::default()
            },
        );

        let result = match &node {
            None => Ok(NodeOutcome::not_found()),
            Some(node) => {
                let ctx = ExecutionContext {
                    run_id: session.run_id,
                    node_id: node_id.to_owned(),
                    node_name: name.clone(),
                    cancel: token.clone(),
                };
                self.executor.execute(&node.kind, input.clone(), &ctx).await
            }
        };

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(NodeError::Cancelled) => {
                debug!(%node_id, "node cancelled by stop");
                self.sink
                    .record_node(node_id, NodeRunRecord::with_status(NodeStatus::Pending));
                return None;
            }
            Err(err) => {
                error!(%node_id, error = %err, "executor failed unexpectedly");
                let handle = node.as_ref().and_then(|n| n.node_type().error_handle());
                NodeOutcome::failed(None, err.to_string(), handle)
            }
        };

        let duration_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);
        let status = if outcome.success {
            NodeStatus::Success
        } else {
            NodeStatus::Error
        };

        if let Some(output) = &outcome.output {
            session.outputs.insert(node_id.to_owned(), output.clone());
        }
        self.sink.record_node(
            node_id,
            NodeRunRecord {
                status,
                started_at: Some(started_at),
                finished_at: Some(Utc::now()),
                duration_ms: Some(duration_ms),
                input: Some(input.clone()),
                output: outcome.output.clone(),
                error: outcome.error.clone(),
            },
        );

        let message = match &outcome.error {
            None => format!("Completed via '{}'", outcome.active_handles.join("', '")),
            Some(err) => format!("Failed: {err}"),
        };
        self.sink.append_log(LogEntry {
            input: Some(input),
            output: outcome.output.clone(),
            error: outcome.error.clone(),
            duration_ms: Some(duration_ms),
            ..LogEntry::new(node_id, name, status, message)
        });
        debug!(%node_id, %status, duration_ms, handles = ?outcome.active_handles, "node finished");

        for skipped in inactive_branch(&session.snapshot, node_id, &outcome.active_handles) {
            if session.skipped.insert(skipped.clone()) {
                self.sink.set_node_status(&skipped, NodeStatus::Skipped);
            }
        }

        Some(status)
    }
}
