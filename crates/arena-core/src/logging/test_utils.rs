//! Thread-local log capture for tests.
//!
//! ```ignore
//! let (logs, _guard) = capture_logs();
//! client.request(ping).await;
//! assert!(logs.has_event(Level::WARN, "unknown cid"));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::level_filters::LevelFilter;
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

/// One recorded event.
#[derive(Clone, Debug)]
pub struct CapturedEvent {
    /// Level it was emitted at.
    pub level: Level,
    /// Emitting module path.
    pub target: String,
    /// Rendered `message` field.
    pub message: String,
    /// Every other field, rendered with `Display` for `%` and strings,
    /// `Debug` otherwise.
    pub fields: BTreeMap<String, String>,
}

impl CapturedEvent {
    /// Rendered value of field `name`.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Handle to the events recorded by [`capture_logs`].
#[derive(Clone, Default)]
pub struct CapturedLogs {
    inner: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl CapturedLogs {
    fn matching(&self, keep: impl Fn(&CapturedEvent) -> bool) -> Vec<CapturedEvent> {
        self.inner.lock().iter().filter(|e| keep(e)).cloned().collect()
    }

    /// Everything recorded so far, oldest first.
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.inner.lock().clone()
    }

    /// Whether some event's message contains `needle`.
    pub fn has_message(&self, needle: &str) -> bool {
        !self.matching(|e| e.message.contains(needle)).is_empty()
    }

    /// Whether some event at `level` has a message containing `needle`.
    pub fn has_event(&self, level: Level, needle: &str) -> bool {
        !self
            .matching(|e| e.level == level && e.message.contains(needle))
            .is_empty()
    }

    /// How many events were emitted at `level`.
    pub fn count_at_level(&self, level: Level) -> usize {
        self.matching(|e| e.level == level).len()
    }

    /// Events emitted from modules under `prefix`.
    pub fn events_for_target(&self, prefix: &str) -> Vec<CapturedEvent> {
        self.matching(|e| e.target.starts_with(prefix))
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

#[derive(Default)]
struct Recorder {
    message: String,
    fields: BTreeMap<String, String>,
}

impl Recorder {
    fn put(&mut self, field: &Field, rendered: String) {
        if field.name() == "message" {
            self.message = rendered;
        } else {
            let _ = self.fields.insert(field.name().to_owned(), rendered);
        }
    }
}

impl Visit for Recorder {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value.to_owned());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, format!("{value:?}"));
    }
}

struct CaptureLayer(CapturedLogs);

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut recorder = Recorder::default();
        event.record(&mut recorder);
        let meta = event.metadata();
        self.0.inner.lock().push(CapturedEvent {
            level: *meta.level(),
            target: meta.target().to_owned(),
            message: recorder.message,
            fields: recorder.fields,
        });
    }
}

/// Record every event on the current thread until the guard drops.
///
/// Spawned tasks are only seen on a current-thread runtime, which is what
/// `#[tokio::test]` gives by default.
pub fn capture_logs() -> (CapturedLogs, DefaultGuard) {
    let logs = CapturedLogs::default();
    let guard = tracing_subscriber::registry()
        .with(CaptureLayer(logs.clone()))
        .with(LevelFilter::TRACE)
        .set_default();
    (logs, guard)
}
