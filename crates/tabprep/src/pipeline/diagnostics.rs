//! Diagnostics emitted by pipeline stages.
//!
//! Stages report through a [`Diagnostics`] log owned by the run. Every
//! event is appended to the run's ordered log and forwarded to the
//! configured [`DiagnosticsSink`], which alone decides whether it reaches
//! `tracing`. Sinks never fail and never block the run.
//!
//! Events of a stage opened with [`Diagnostics::begin_stage`] are held
//! back until the stage commits. A stage that falls back discards them.

use super::stage::PipelineStage;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Severity of a diagnostic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    /// The stage fell back to its input table.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        })
    }
}

/// One entry of the diagnostic log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticEvent {
    pub severity: Severity,
    pub stage: PipelineStage,
    pub message: String,
}

impl DiagnosticEvent {
    pub fn new(severity: Severity, stage: PipelineStage, message: impl Into<String>) -> Self {
        Self {
            severity,
            stage,
            message: message.into(),
        }
    }
}

impl fmt::Display for DiagnosticEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.stage, self.message)
    }
}

/// Receiver of diagnostic events.
///
/// Shared by concurrent runs, so implementations must accept appends from
/// several threads. `log` must not panic.
pub trait DiagnosticsSink: Send + Sync {
    fn log(&self, event: &DiagnosticEvent);
}

/// Sink that drops every event. The run's own log is still kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl DiagnosticsSink for NullSink {
    fn log(&self, _event: &DiagnosticEvent) {}
}

/// Sink that forwards events to `tracing`, at the level matching their
/// severity.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn log(&self, event: &DiagnosticEvent) {
        match event.severity {
            Severity::Info => tracing::info!(stage = %event.stage, "{}", event.message),
            Severity::Warning => tracing::warn!(stage = %event.stage, "{}", event.message),
            Severity::Error => tracing::error!(stage = %event.stage, "{}", event.message),
        }
    }
}

/// Wrapper that implements [`DiagnosticsSink`] using a closure.
pub struct ClosureSink<F>
where
    F: Fn(&DiagnosticEvent) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureSink<F>
where
    F: Fn(&DiagnosticEvent) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> DiagnosticsSink for ClosureSink<F>
where
    F: Fn(&DiagnosticEvent) + Send + Sync,
{
    fn log(&self, event: &DiagnosticEvent) {
        (self.callback)(event);
    }
}

/// An event collected by a [`SharedDiagnosticLog`], tagged with its run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedEvent {
    pub run_id: u64,
    pub event: DiagnosticEvent,
}

/// Append-only log shared between concurrent runs.
///
/// Hand each run its own handle from [`for_run`](Self::for_run). Events of
/// a single run stay in emission order; events of different runs
/// interleave.
#[derive(Debug, Clone, Default)]
pub struct SharedDiagnosticLog {
    events: Arc<Mutex<Vec<TaggedEvent>>>,
}

impl SharedDiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that appends to this log under `run_id`.
    pub fn for_run(&self, run_id: u64) -> RunLogSink {
        RunLogSink {
            run_id,
            events: Arc::clone(&self.events),
        }
    }

    /// Copy of every event collected so far.
    pub fn snapshot(&self) -> Vec<TaggedEvent> {
        self.events.lock().clone()
    }

    /// Events of one run, in emission order.
    pub fn events_for(&self, run_id: u64) -> Vec<DiagnosticEvent> {
        self.events
            .lock()
            .iter()
            .filter(|tagged| tagged.run_id == run_id)
            .map(|tagged| tagged.event.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

/// Handle appending one run's events to a [`SharedDiagnosticLog`].
#[derive(Debug, Clone)]
pub struct RunLogSink {
    run_id: u64,
    events: Arc<Mutex<Vec<TaggedEvent>>>,
}

impl DiagnosticsSink for RunLogSink {
    fn log(&self, event: &DiagnosticEvent) {
        self.events.lock().push(TaggedEvent {
            run_id: self.run_id,
            event: event.clone(),
        });
    }
}

/// The diagnostic log of a single run.
///
/// Stages receive `&mut Diagnostics` and report through
/// [`info`](Self::info), [`warn`](Self::warn) and [`error`](Self::error).
pub struct Diagnostics {
    stage: PipelineStage,
    events: Vec<DiagnosticEvent>,
    /// Events of the open stage, `None` when no stage is open.
    pending: Option<Vec<DiagnosticEvent>>,
    sink: Arc<dyn DiagnosticsSink>,
}

impl Diagnostics {
    pub fn new(sink: Arc<dyn DiagnosticsSink>) -> Self {
        Self {
            stage: PipelineStage::Cleaning,
            events: Vec::new(),
            pending: None,
            sink,
        }
    }

    /// A log that only keeps events in memory.
    pub fn detached() -> Self {
        Self::new(Arc::new(NullSink))
    }

    /// Stage attributed to subsequent events.
    pub fn set_stage(&mut self, stage: PipelineStage) {
        self.stage = stage;
    }

    /// Attribute subsequent events to `stage` and hold them back until
    /// [`commit_stage`](Self::commit_stage) or
    /// [`discard_stage`](Self::discard_stage).
    pub fn begin_stage(&mut self, stage: PipelineStage) {
        self.commit_stage();
        self.stage = stage;
        self.pending = Some(Vec::new());
    }

    /// Record the held back events of the open stage.
    pub fn commit_stage(&mut self) {
        for event in self.pending.take().unwrap_or_default() {
            self.record(event);
        }
    }

    /// Drop the held back events of the open stage. Returns how many were
    /// dropped.
    pub fn discard_stage(&mut self) -> usize {
        let dropped = self.pending.take().map_or(0, |events| events.len());
        if dropped > 0 {
            tracing::debug!(stage = %self.stage, "Discarded {} events of a failed stage", dropped);
        }
        dropped
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(Severity::Info, message.into());
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.push(Severity::Warning, message.into());
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Severity::Error, message.into());
    }

    fn push(&mut self, severity: Severity, message: String) {
        let event = DiagnosticEvent::new(severity, self.stage, message);
        match &mut self.pending {
            Some(pending) => pending.push(event),
            None => self.record(event),
        }
    }

    fn record(&mut self, event: DiagnosticEvent) {
        self.sink.log(&event);
        self.events.push(event);
    }

    /// Recorded events, without those held back by an open stage.
    pub fn events(&self) -> &[DiagnosticEvent] {
        &self.events
    }

    /// Events emitted by one stage.
    pub fn for_stage(&self, stage: PipelineStage) -> impl Iterator<Item = &DiagnosticEvent> {
        self.events.iter().filter(move |event| event.stage == stage)
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.events
            .iter()
            .filter(|event| event.severity == severity)
            .count()
    }

    /// Recorded events. Events of a stage still open are committed first.
    pub fn into_events(mut self) -> Vec<DiagnosticEvent> {
        self.commit_stage();
        self.events
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("stage", &self.stage)
            .field("events", &self.events)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

static_assertions::assert_impl_all!(SharedDiagnosticLog: Send, Sync);
static_assertions::assert_impl_all!(RunLogSink: Send, Sync);
static_assertions::assert_impl_all!(Diagnostics: Send);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_events_keep_order_and_stage() {
        let mut diagnostics = Diagnostics::detached();
        diagnostics.info("first");
        diagnostics.set_stage(PipelineStage::Outliers);
        diagnostics.warn("second");
        diagnostics.error("third");

        let events = diagnostics.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].stage, PipelineStage::Cleaning);
        assert_eq!(events[1].severity, Severity::Warning);
        assert_eq!(events[2].message, "third");
        assert_eq!(diagnostics.for_stage(PipelineStage::Outliers).count(), 2);
        assert_eq!(diagnostics.count(Severity::Error), 1);
    }

    #[test]
    fn test_closure_sink_receives_every_event() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let sink = Arc::new(ClosureSink::new(move |_event: &DiagnosticEvent| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        }));

        let mut diagnostics = Diagnostics::new(sink);
        diagnostics.info("a");
        diagnostics.warn("b");

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_stage_events_held_until_commit() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let sink = Arc::new(ClosureSink::new(move |_event: &DiagnosticEvent| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        }));
        let mut diagnostics = Diagnostics::new(sink);

        diagnostics.begin_stage(PipelineStage::Outliers);
        diagnostics.warn("found");
        assert!(diagnostics.events().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        diagnostics.commit_stage();
        assert_eq!(diagnostics.events().len(), 1);
        assert_eq!(diagnostics.events()[0].stage, PipelineStage::Outliers);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_discarded_stage_leaves_no_trace() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let sink = Arc::new(ClosureSink::new(move |_event: &DiagnosticEvent| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        }));
        let mut diagnostics = Diagnostics::new(sink);

        diagnostics.begin_stage(PipelineStage::TypeCoercion);
        diagnostics.info("Converted column 'a' to numeric.");
        diagnostics.info("Converted column 'b' to numeric.");
        assert_eq!(diagnostics.discard_stage(), 2);
        diagnostics.error("Type Coercion failed, keeping its input");

        assert_eq!(diagnostics.events().len(), 1);
        assert_eq!(diagnostics.events()[0].severity, Severity::Error);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_events_reach_tracing_once() {
        use tracing_subscriber::layer::{Context, SubscriberExt};

        struct CountingLayer(Arc<AtomicUsize>);

        impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for CountingLayer {
            fn on_event(&self, _event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let traced = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(CountingLayer(traced.clone()));
        tracing::subscriber::with_default(subscriber, || {
            let mut diagnostics = Diagnostics::new(Arc::new(TracingSink));
            diagnostics.info("a");
            diagnostics.warn("b");

            let mut detached = Diagnostics::detached();
            detached.info("c");
        });

        assert_eq!(traced.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_shared_log_concurrent_runs() {
        let shared = SharedDiagnosticLog::new();

        let handles: Vec<_> = (0..4u64)
            .map(|run_id| {
                let sink = Arc::new(shared.for_run(run_id));
                std::thread::spawn(move || {
                    let mut diagnostics = Diagnostics::new(sink);
                    for i in 0..25 {
                        diagnostics.info(format!("event {i}"));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("Thread should not panic");
        }

        assert_eq!(shared.len(), 100);
        let run_two = shared.events_for(2);
        assert_eq!(run_two.len(), 25);
        let messages: Vec<_> = run_two.iter().map(|e| e.message.clone()).collect();
        let expected: Vec<_> = (0..25).map(|i| format!("event {i}")).collect();
        assert_eq!(messages, expected);
    }

    #[test]
    fn test_event_display() {
        let event = DiagnosticEvent::new(
            Severity::Info,
            PipelineStage::Duplicates,
            "Removed 1 duplicate rows.",
        );
        assert_eq!(
            event.to_string(),
            "[info] duplicates: Removed 1 duplicate rows."
        );
    }
}
