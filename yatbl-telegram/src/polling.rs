//! Long-polling update source.
//!
//! One loop per started generation. Every cycle holds the cursor lock for the duration of its
//! `getUpdates` call and the dispatch of the returned batch, so two fetches never overlap, even
//! while an old loop is finishing its last cycle after `change_interval`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use handler_chain::HandlerChain;
use serde_json::{json, Map, Value};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use yatbl_core::{response_or_failure, ApiErrorHandler, ApiResponse, Update};

/// Lifecycle state of a [`PollingSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollingState {
    Stopped,
    Polling,
}

/// Polling parameters: `getUpdates` extras, the starting cursor and the retry policy.
#[derive(Clone)]
pub struct PollingOptions {
    /// Long-poll timeout in seconds.
    pub timeout: Option<u32>,
    /// Maximum updates per batch (1-100).
    pub limit: Option<u32>,
    /// Initial cursor.
    pub offset: i64,
    pub retry: Arc<dyn RetryPolicy>,
}

impl Default for PollingOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            limit: None,
            offset: 0,
            retry: Arc::new(FixedInterval),
        }
    }
}

/// Result of one fetch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The batch of this many updates went to the dispatcher.
    Dispatched(usize),
    Empty,
    Failed,
}

/// Decides how long to wait after a failed cycle.
pub trait RetryPolicy: Send + Sync {
    /// `consecutive_failures` starts at 1.
    fn delay_after_failure(&self, consecutive_failures: u32, interval: Duration) -> Duration;
}

/// Waits the configured interval, no backoff.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedInterval;

impl RetryPolicy for FixedInterval {
    fn delay_after_failure(&self, _consecutive_failures: u32, interval: Duration) -> Duration {
        interval
    }
}

struct PollingInner {
    chain: HandlerChain,
    on_api_error: ApiErrorHandler,
    timeout: Option<u32>,
    limit: Option<u32>,
    retry: Arc<dyn RetryPolicy>,
    /// Next expected update id. Held for a whole cycle.
    cursor: Mutex<i64>,
    /// Generation of the loop allowed to run; 0 means stopped.
    active: AtomicU64,
    generations: AtomicU64,
    wake: Notify,
}

/// Polls `getUpdates` and feeds each batch to the handler chain. Cheap to clone; clones share
/// the cursor and state.
#[derive(Clone)]
pub struct PollingSource {
    inner: Arc<PollingInner>,
}

impl PollingSource {
    pub fn new(
        chain: HandlerChain,
        on_api_error: ApiErrorHandler,
        options: PollingOptions,
    ) -> Self {
        Self {
            inner: Arc::new(PollingInner {
                chain,
                on_api_error,
                timeout: options.timeout,
                limit: options.limit,
                retry: options.retry,
                cursor: Mutex::new(options.offset),
                active: AtomicU64::new(0),
                generations: AtomicU64::new(0),
                wake: Notify::new(),
            }),
        }
    }

    pub fn state(&self) -> PollingState {
        if self.inner.active.load(Ordering::SeqCst) == 0 {
            PollingState::Stopped
        } else {
            PollingState::Polling
        }
    }

    /// Current cursor. Waits for an in-flight cycle to finish.
    pub async fn cursor(&self) -> i64 {
        *self.inner.cursor.lock().await
    }

    /// Deletes any webhook, then polls until [`stop`](Self::stop) is called. A zero `interval`
    /// polls back to back with one cooperative yield between cycles.
    pub async fn start(&self, interval: Duration) {
        let generation = self.activate();
        self.run_generation(generation, interval).await;
    }

    /// Runs [`start`](Self::start) on a new task. The loop counts as started when this returns,
    /// so a [`stop`](Self::stop) issued right after it is honored.
    pub fn spawn(&self, interval: Duration) -> JoinHandle<()> {
        let generation = self.activate();
        let source = self.clone();
        tokio::spawn(async move { source.run_generation(generation, interval).await })
    }

    /// Stops the loop after its in-flight cycle; a pending sleep is cut short.
    pub fn stop(&self) {
        self.inner.active.store(0, Ordering::SeqCst);
        self.inner.wake.notify_waiters();
    }

    /// Restarts polling at `interval`. Handlers, shorthands and the cursor are kept.
    pub fn change_interval(&self, interval: Duration) -> JoinHandle<()> {
        self.stop();
        self.spawn(interval)
    }

    /// Runs exactly one fetch cycle.
    pub async fn poll_once(&self) -> CycleOutcome {
        let mut cursor = self.inner.cursor.lock().await;
        self.cycle(&mut cursor).await
    }

    /// Allocates a new generation and makes it the active one.
    fn activate(&self) -> u64 {
        let generation = self.inner.generations.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.active.store(generation, Ordering::SeqCst);
        generation
    }

    #[instrument(skip(self), fields(interval_ms = interval.as_millis() as u64))]
    async fn run_generation(&self, generation: u64, interval: Duration) {
        if !self.is_current(generation) {
            debug!(generation, "Polling stopped before it started");
            return;
        }

        let response = response_or_failure(
            self.inner
                .chain
                .api()
                .call("deleteWebhook", json!({}))
                .await,
        );
        if !response.ok {
            (self.inner.on_api_error)(&response);
        }

        info!(generation, "step: polling started");
        self.run(generation, interval).await;
        info!(generation, "step: polling stopped");
    }

    fn is_current(&self, generation: u64) -> bool {
        self.inner.active.load(Ordering::SeqCst) == generation
    }

    async fn run(&self, generation: u64, interval: Duration) {
        let mut consecutive_failures = 0u32;

        while self.is_current(generation) {
            let outcome = {
                let mut cursor = self.inner.cursor.lock().await;
                if !self.is_current(generation) {
                    break;
                }
                self.cycle(&mut cursor).await
            };

            let delay = if outcome == CycleOutcome::Failed {
                consecutive_failures += 1;
                self.inner
                    .retry
                    .delay_after_failure(consecutive_failures, interval)
            } else {
                consecutive_failures = 0;
                interval
            };

            let woken = self.inner.wake.notified();
            if !self.is_current(generation) {
                break;
            }
            if delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = woken => {}
                }
            }
        }
    }

    async fn cycle(&self, cursor: &mut i64) -> CycleOutcome {
        let mut payload = Map::new();
        payload.insert("offset".to_string(), json!(*cursor));
        if let Some(timeout) = self.inner.timeout {
            payload.insert("timeout".to_string(), json!(timeout));
        }
        if let Some(limit) = self.inner.limit {
            payload.insert("limit".to_string(), json!(limit));
        }

        let response = response_or_failure(
            self.inner
                .chain
                .api()
                .call("getUpdates", Value::Object(payload))
                .await,
        );
        if !response.ok {
            (self.inner.on_api_error)(&response);
            return CycleOutcome::Failed;
        }

        let raw = match response.result {
            Some(Value::Array(raw)) => raw,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                let failure = ApiResponse::failure(format!(
                    "getUpdates returned a non-array result: {}",
                    other
                ));
                (self.inner.on_api_error)(&failure);
                return CycleOutcome::Failed;
            }
        };

        if raw.is_empty() {
            return CycleOutcome::Empty;
        }
        let Some(max_id) = raw
            .iter()
            .filter_map(|update| update.get("update_id").and_then(Value::as_i64))
            .max()
        else {
            let failure = ApiResponse::failure(format!(
                "getUpdates returned {} updates without update_id",
                raw.len()
            ));
            (self.inner.on_api_error)(&failure);
            return CycleOutcome::Failed;
        };
        *cursor = max_id.saturating_add(1);

        let updates: Vec<Update> = raw
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<Update>(value) {
                Ok(update) => Some(update),
                Err(e) => {
                    warn!(error = %e, "Skipping undecodable update");
                    None
                }
            })
            .collect();

        let count = updates.len();
        debug!(count, next_offset = *cursor, "step: batch received");
        self.inner.chain.dispatch(updates).await;
        CycleOutcome::Dispatched(count)
    }
}
