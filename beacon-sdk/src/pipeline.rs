//! The pipeline instance.
//!
//! A [`Pipeline`] owns its queue, configuration and retry state. Producers
//! hold clones of the handle; nothing is process-global.
//!
//! Every critical section is a short synchronous lock on the pipeline
//! state. The only suspension points are the transport call and tokio
//! timers. A `flushing` flag inside the state makes flush exclusive: a
//! trigger that arrives while a delivery is in flight is a no-op.

use std::sync::Arc;
use std::time::Duration;

use beacon_types::{current_timestamp_ms, Batch, Event, PipelineStats};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::Instant;

use crate::bus::{EventBus, Subscription};
use crate::draft::EventDraft;
use crate::marks::{span_event, Marks, SpanGuard, DEFAULT_SPAN_EVENT_TYPE};
use crate::queue::{BatchQueue, DEFAULT_MAX_QUEUE};
use crate::retry::Backoff;
use crate::sampling;
use crate::sanitize::Sanitizer;
use crate::settings::PipelineConfig;
use crate::transport::{HttpTransport, Transport};

/// Queue depth that triggers an immediate flush.
pub const DEFAULT_MAX_BATCH: usize = 50;

/// Delay before a timer-triggered flush.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// Ceiling on the retry delay, before jitter.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Why a flush did not send anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another delivery is in flight; it or the next trigger picks up the
    /// queue.
    InFlight,
    /// Nothing queued.
    Empty,
    /// No endpoint configured. The queue is left untouched.
    NoEndpoint,
    /// Called outside a tokio runtime.
    NoRuntime,
}

/// Result of a flush attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The collector accepted the batch.
    Delivered { events: usize },
    /// Delivery failed; the events are back at the front of the queue and
    /// a retry is scheduled.
    Requeued { events: usize, retry_in: Duration },
    Skipped(SkipReason),
}

impl FlushOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, FlushOutcome::Delivered { .. })
    }
}

/// Handle to a telemetry pipeline.
///
/// Cheap to clone; all clones share one queue.
///
/// # Example
///
/// ```rust,no_run
/// use beacon_sdk::{EventDraft, Pipeline, PipelineConfig};
///
/// #[tokio::main]
/// async fn main() {
///     let pipeline = Pipeline::builder()
///         .config(PipelineConfig::with_endpoint("https://collector.example/ingest"))
///         .build();
///
///     pipeline.emit(EventDraft::new("feedback.submit").data("rating", 4));
///     pipeline.emit("editor.open");
///
///     pipeline.flush().await;
///     println!("{:?}", pipeline.stats());
/// }
/// ```
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<State>,
    bus: Arc<EventBus>,
    transport: Arc<dyn Transport>,
    sanitizer: Sanitizer,
    max_batch: usize,
    backoff: Backoff,
    default_role: Option<String>,
    default_anonymous_id: Option<String>,
    marks: Marks,
}

struct State {
    config: PipelineConfig,
    queue: BatchQueue,
    failures: u32,
    flushing: bool,
    timer: Option<Timer>,
    generation: u64,
    last_timestamp_ms: u64,
    delivered: u64,
    sampled_out: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    Interval,
    Backoff,
}

/// A pending flush timer. Only the timer whose generation matches the
/// state's current one may flush.
struct Timer {
    generation: u64,
    kind: TimerKind,
    due: Instant,
    abort: AbortHandle,
}

impl Timer {
    fn cancel(self) {
        self.abort.abort();
    }
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Submit an event. Never fails and never blocks on I/O.
    ///
    /// The pipeline stamps the timestamp and schema version, sanitizes the
    /// detail data, broadcasts the event to local listeners, then applies
    /// the sampling gate before queueing. A disabled pipeline returns
    /// immediately.
    pub fn emit(&self, draft: impl Into<EventDraft>) {
        let mut draft = draft.into();

        let (sample_rate, timestamp_ms) = {
            let mut state = self.inner.state.lock();
            if !state.config.enabled {
                return;
            }
            let now = current_timestamp_ms().max(state.last_timestamp_ms);
            state.last_timestamp_ms = now;
            (state.config.sample_rate, now)
        };

        if draft.role.is_none() {
            draft.role = self.inner.default_role.clone();
        }
        if draft.anonymous_id.is_none() {
            draft.anonymous_id = self.inner.default_anonymous_id.clone();
        }
        let event = draft.finish(timestamp_ms, &self.inner.sanitizer);

        self.inner.bus.publish(&event);

        if !sampling::admit(sample_rate) {
            self.inner.state.lock().sampled_out += 1;
            tracing::trace!(event_type = %event.event_type, "event sampled out");
            return;
        }

        self.inner.enqueue(event);
    }

    /// Start a named timing mark.
    pub fn mark(&self, name: &str) {
        self.inner.marks.start(name);
    }

    /// Close a mark and emit a timing event (type `perf` unless given).
    ///
    /// Returns the measured duration, or `None` if no such mark was open.
    pub fn mark_end(&self, name: &str, event_type: Option<&str>) -> Option<Duration> {
        let elapsed = self.inner.marks.finish(name)?;
        let event_type = event_type.unwrap_or(DEFAULT_SPAN_EVENT_TYPE);
        self.emit(span_event(name, event_type, elapsed));
        Some(elapsed)
    }

    /// Time a scope; a `perf` event is emitted when the guard drops.
    pub fn span(&self, name: impl Into<String>) -> SpanGuard {
        self.span_as(name, DEFAULT_SPAN_EVENT_TYPE)
    }

    /// [`Pipeline::span`] with a custom event type.
    pub fn span_as(&self, name: impl Into<String>, event_type: impl Into<String>) -> SpanGuard {
        SpanGuard {
            pipeline: self.clone(),
            name: name.into(),
            event_type: event_type.into(),
            started: Instant::now(),
            armed: true,
        }
    }

    /// Observe every emitted event, sampled or not.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.inner.bus.subscribe(listener)
    }

    /// Set the collector endpoint. An empty string unsets it.
    pub fn configure(&self, endpoint: impl Into<String>) {
        let mut state = self.inner.state.lock();
        let config = PipelineConfig {
            endpoint: Some(endpoint.into()),
            ..state.config.clone()
        };
        self.inner.apply_config(&mut state, config);
    }

    /// Replace the whole configuration.
    pub fn reconfigure(&self, config: PipelineConfig) {
        let mut state = self.inner.state.lock();
        self.inner.apply_config(&mut state, config);
    }

    pub fn config(&self) -> PipelineConfig {
        self.inner.state.lock().config.clone()
    }

    /// Send everything queued now, unless a delivery is already in flight.
    ///
    /// The batch is snapshotted before this returns its first poll, and
    /// delivery runs in its own task: dropping the returned future does not
    /// cancel it.
    pub async fn flush(&self) -> FlushOutcome {
        let started = match Handle::try_current() {
            Ok(rt) => {
                let prepared = self.inner.start_flush(&mut self.inner.state.lock());
                prepared.map(|delivery| (delivery.len(), delivery.spawn(&rt)))
            }
            Err(_) => Err(SkipReason::NoRuntime),
        };

        match started {
            Err(reason) => {
                tracing::trace!(?reason, "flush skipped");
                FlushOutcome::Skipped(reason)
            }
            Ok((events, delivery)) => match delivery.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!(error = %e, "telemetry delivery task failed");
                    FlushOutcome::Requeued {
                        events,
                        retry_in: self.inner.pending_retry(),
                    }
                }
            },
        }
    }

    /// Last-resort synchronous send of whatever is queued.
    ///
    /// Cancels pending timers and hands the queue to the transport's beacon
    /// path, with no retry. Returns the number of events handed over. With
    /// no endpoint configured the queue is left in place and 0 is returned.
    pub fn teardown(&self) -> usize {
        let (endpoint, batch) = {
            let mut state = self.inner.state.lock();
            if let Some(timer) = state.timer.take() {
                timer.cancel();
            }
            let Some(endpoint) = state.config.endpoint.clone() else {
                return 0;
            };
            if state.queue.is_empty() {
                return 0;
            }
            (endpoint, state.queue.drain_all())
        };

        let events = batch.len();
        tracing::debug!(events, "sending teardown beacon");
        self.inner.transport.beacon(&endpoint, &batch);
        events
    }

    /// Guard that calls [`Pipeline::teardown`] when dropped.
    pub fn teardown_guard(&self) -> TeardownGuard {
        TeardownGuard {
            pipeline: self.clone(),
        }
    }

    /// Current counters.
    pub fn stats(&self) -> PipelineStats {
        let state = self.inner.state.lock();
        PipelineStats {
            queued: state.queue.len(),
            retry_count: state.failures,
            dropped: state.queue.dropped(),
            delivered: state.delivered,
            sampled_out: state.sampled_out,
        }
    }

    /// Copy of the queued events, oldest first.
    pub fn queued_events(&self) -> Vec<Event> {
        self.inner.state.lock().queue.iter().cloned().collect()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stats", &self.stats())
            .field("listeners", &self.inner.bus.len())
            .finish()
    }
}

impl Inner {
    fn enqueue(self: &Arc<Self>, event: Event) {
        let mut state = self.state.lock();

        let dropped = state.queue.push(event);
        if dropped > 0 {
            tracing::trace!(dropped, "telemetry queue full, dropped oldest events");
        }

        // A pending retry owns the next attempt; the size trigger waits.
        let backing_off = matches!(&state.timer, Some(t) if t.kind == TimerKind::Backoff);
        if state.queue.len() >= self.max_batch && !backing_off {
            let Ok(rt) = Handle::try_current() else {
                return;
            };
            let prepared = self.start_flush(&mut state);
            drop(state);
            match prepared {
                Ok(delivery) => {
                    delivery.spawn(&rt);
                }
                Err(reason) => tracing::trace!(?reason, "size-triggered flush skipped"),
            }
        } else if state.timer.is_none() {
            self.arm_timer(&mut state, self.backoff.base, TimerKind::Interval);
        }
    }

    fn apply_config(self: &Arc<Self>, state: &mut State, config: PipelineConfig) {
        state.config = config.normalized();
        tracing::debug!(
            endpoint = ?state.config.endpoint,
            enabled = state.config.enabled,
            sample_rate = state.config.sample_rate,
            "telemetry configured"
        );

        // Events queued while no endpoint was set would otherwise wait for
        // the next emission.
        if state.config.endpoint.is_some() && !state.queue.is_empty() && state.timer.is_none() {
            self.arm_timer(state, self.backoff.base, TimerKind::Interval);
        }
    }

    /// Snapshot the queue into a delivery. The caller spawns it once the
    /// state lock is released: a delivery dropped by a shutting-down runtime
    /// settles through that lock.
    fn start_flush(self: &Arc<Self>, state: &mut State) -> Result<Delivery, SkipReason> {
        if state.flushing {
            return Err(SkipReason::InFlight);
        }
        let Some(endpoint) = state.config.endpoint.clone() else {
            return Err(SkipReason::NoEndpoint);
        };
        if state.queue.is_empty() {
            return Err(SkipReason::Empty);
        }

        if let Some(timer) = state.timer.take() {
            timer.cancel();
        }
        let batch = state.queue.drain_all();
        let events = batch.len();
        state.flushing = true;
        tracing::debug!(events, %endpoint, "flushing telemetry batch");

        Ok(Delivery {
            inner: self.clone(),
            endpoint,
            batch: Some(batch),
        })
    }

    fn settle_success(self: &Arc<Self>, events: usize) -> FlushOutcome {
        let mut state = self.state.lock();
        state.flushing = false;
        state.failures = 0;
        state.delivered += events as u64;

        if !state.queue.is_empty() && state.timer.is_none() {
            self.arm_timer(&mut state, self.backoff.base, TimerKind::Interval);
        }

        tracing::debug!(events, "telemetry batch delivered");
        FlushOutcome::Delivered { events }
    }

    fn settle_failure(self: &Arc<Self>, batch: Batch) -> FlushOutcome {
        let events = batch.len();
        let mut state = self.state.lock();
        state.flushing = false;

        let dropped = state.queue.requeue_front(batch.into_events());
        if dropped > 0 {
            tracing::trace!(dropped, "dropped oldest events while requeueing");
        }

        state.failures = self.backoff.next_failures(state.failures);
        let retry_in = self.backoff.delay(state.failures);
        if let Some(timer) = state.timer.take() {
            timer.cancel();
        }
        self.arm_timer(&mut state, retry_in, TimerKind::Backoff);

        tracing::debug!(
            events,
            failures = state.failures,
            retry_in_ms = retry_in.as_millis() as u64,
            "telemetry batch requeued"
        );
        FlushOutcome::Requeued { events, retry_in }
    }

    fn arm_timer(self: &Arc<Self>, state: &mut State, delay: Duration, kind: TimerKind) {
        let Ok(rt) = Handle::try_current() else {
            return;
        };

        state.generation += 1;
        let generation = state.generation;
        let weak = Arc::downgrade(self);
        let task = rt.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.on_timer(generation);
            }
        });

        state.timer = Some(Timer {
            generation,
            kind,
            due: Instant::now() + delay,
            abort: task.abort_handle(),
        });
    }

    fn on_timer(self: &Arc<Self>, generation: u64) {
        let mut state = self.state.lock();
        let kind = match &state.timer {
            Some(timer) if timer.generation == generation => timer.kind,
            _ => return,
        };
        // Taken, not cancelled: this task is the timer.
        state.timer = None;

        let Ok(rt) = Handle::try_current() else {
            return;
        };
        let prepared = self.start_flush(&mut state);
        drop(state);
        match prepared {
            Ok(delivery) => {
                delivery.spawn(&rt);
            }
            Err(reason) => tracing::trace!(?reason, ?kind, "timer flush skipped"),
        }
    }

    fn pending_retry(&self) -> Duration {
        self.state
            .lock()
            .timer
            .as_ref()
            .map(|t| t.due.saturating_duration_since(Instant::now()))
            .unwrap_or_default()
    }
}

/// One in-flight batch.
///
/// If the delivery task is dropped before settling (runtime shutdown,
/// panic in a transport), the batch goes back to the queue as a failure.
struct Delivery {
    inner: Arc<Inner>,
    endpoint: String,
    batch: Option<Batch>,
}

impl Delivery {
    fn len(&self) -> usize {
        self.batch.as_ref().map_or(0, Batch::len)
    }

    /// Must not be called with the state lock held.
    fn spawn(self, rt: &Handle) -> JoinHandle<FlushOutcome> {
        rt.spawn(self.run())
    }

    async fn run(mut self) -> FlushOutcome {
        let result = match &self.batch {
            Some(batch) => self.inner.transport.send(&self.endpoint, batch).await,
            None => return FlushOutcome::Skipped(SkipReason::Empty),
        };

        let Some(batch) = self.batch.take() else {
            return FlushOutcome::Skipped(SkipReason::Empty);
        };
        match result {
            Ok(()) => self.inner.settle_success(batch.len()),
            Err(e) => {
                tracing::warn!(error = %e, events = batch.len(), "telemetry delivery failed");
                self.inner.settle_failure(batch)
            }
        }
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        if let Some(batch) = self.batch.take() {
            tracing::warn!(events = batch.len(), "telemetry delivery abandoned");
            self.inner.settle_failure(batch);
        }
    }
}

/// Calls [`Pipeline::teardown`] when dropped.
///
/// Hold one for the life of `main` so queued events get a last chance on
/// the way out.
#[must_use = "teardown runs when this guard is dropped"]
#[derive(Debug)]
pub struct TeardownGuard {
    pipeline: Pipeline,
}

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        self.pipeline.teardown();
    }
}

/// Builder for configuring a [`Pipeline`].
pub struct PipelineBuilder {
    config: PipelineConfig,
    transport: Option<Arc<dyn Transport>>,
    max_queue: usize,
    max_batch: usize,
    backoff: Backoff,
    sanitizer: Sanitizer,
    default_role: Option<String>,
    default_anonymous_id: Option<String>,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            transport: None,
            max_queue: DEFAULT_MAX_QUEUE,
            max_batch: DEFAULT_MAX_BATCH,
            backoff: Backoff {
                base: DEFAULT_FLUSH_INTERVAL,
                max_delay: DEFAULT_MAX_BACKOFF,
                ..Backoff::default()
            },
            sanitizer: Sanitizer::default(),
            default_role: None,
            default_anonymous_id: None,
        }
    }

    /// Initial configuration (default: enabled, full sampling, no endpoint).
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Delivery backend (default: [`HttpTransport`]).
    pub fn transport(mut self, transport: impl Transport) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Queue capacity before drop-oldest kicks in (default: 1000).
    pub fn max_queue(mut self, max_queue: usize) -> Self {
        self.max_queue = max_queue;
        self
    }

    /// Queue depth that triggers an immediate flush (default: 50).
    pub fn max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch.max(1);
        self
    }

    /// Delay before a timer flush, and the backoff base (default: 5s).
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.backoff.base = interval;
        self
    }

    /// Ceiling on the retry delay before jitter (default: 60s).
    pub fn max_backoff(mut self, max_backoff: Duration) -> Self {
        self.backoff.max_delay = max_backoff;
        self
    }

    /// Cap on the consecutive failure count (default: 6).
    pub fn max_failures(mut self, max_failures: u32) -> Self {
        self.backoff.max_failures = max_failures;
        self
    }

    /// Extra random delay as a fraction of the backoff (default: 0.2).
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.backoff.jitter = if jitter.is_nan() {
            0.0
        } else {
            jitter.clamp(0.0, 1.0)
        };
        self
    }

    pub fn sanitizer(mut self, sanitizer: Sanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    /// Role attached to events that do not set one.
    pub fn default_role(mut self, role: impl Into<String>) -> Self {
        self.default_role = Some(role.into());
        self
    }

    /// Anonymous id attached to events that do not set one.
    pub fn default_anonymous_id(mut self, id: impl Into<String>) -> Self {
        self.default_anonymous_id = Some(id.into());
        self
    }

    pub fn build(self) -> Pipeline {
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(HttpTransport::default()));

        Pipeline {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    config: self.config.normalized(),
                    queue: BatchQueue::new(self.max_queue),
                    failures: 0,
                    flushing: false,
                    timer: None,
                    generation: 0,
                    last_timestamp_ms: 0,
                    delivered: 0,
                    sampled_out: 0,
                }),
                bus: Arc::new(EventBus::new()),
                transport,
                sanitizer: self.sanitizer,
                max_batch: self.max_batch,
                backoff: self.backoff,
                default_role: self.default_role,
                default_anonymous_id: self.default_anonymous_id,
                marks: Marks::default(),
            }),
        }
    }
}
