//! Tracing layer that copies formatted events into a [`LogSink`].
//!
//! Lets a consumer without access to stdout (the admin endpoint, a remote
//! console) see what the agent has been doing.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use fleetconf_core::LogSink;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Layer writing one line per event to a sink.
#[derive(Debug, Clone)]
pub struct SinkLayer<K> {
    sink: K,
    max_level: Level,
}

impl<K: LogSink + 'static> SinkLayer<K> {
    /// Forward `INFO` and more severe events to `sink`.
    pub fn new(sink: K) -> Self {
        Self {
            sink,
            max_level: Level::INFO,
        }
    }

    /// Forward events up to and including `level` in verbosity.
    pub fn with_max_level(mut self, level: Level) -> Self {
        self.max_level = level;
        self
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: BTreeMap<&'static str, String>,
}

impl FieldVisitor {
    fn record(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = Some(value);
        } else {
            self.fields.insert(field.name(), value);
        }
    }
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.record(field, format!("{value:?}"));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.record(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.record(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.record(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.record(field, value.to_string());
    }
}

impl<S, K> Layer<S> for SinkLayer<K>
where
    S: Subscriber,
    K: LogSink + 'static,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if *meta.level() > self.max_level {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut line = format!("{} {}:", meta.level(), meta.target());
        if let Some(message) = visitor.message {
            let _ = write!(line, " {message}");
        }
        for (name, value) in &visitor.fields {
            let _ = write!(line, " {name}={value}");
        }
        self.sink.append(&line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetconf_core::BoundedLogQueue;
    use std::sync::Arc;
    use tracing_subscriber::layer::SubscriberExt;

    fn capture(queue: &Arc<BoundedLogQueue>, level: Level, f: impl FnOnce()) {
        let subscriber = tracing_subscriber::registry()
            .with(SinkLayer::new(queue.clone()).with_max_level(level));
        tracing::subscriber::with_default(subscriber, f);
    }

    #[test]
    fn test_formats_message_and_fields() {
        let queue = Arc::new(BoundedLogQueue::new(8));
        capture(&queue, Level::INFO, || {
            tracing::warn!(target: "fleetconf", tier = "global", bytes = 12u64, "tier fetch failed");
        });

        assert_eq!(
            queue.drain(8),
            vec!["WARN fleetconf: tier fetch failed bytes=12 tier=global".to_string()]
        );
    }

    #[test]
    fn test_filters_by_level() {
        let queue = Arc::new(BoundedLogQueue::new(8));
        capture(&queue, Level::INFO, || {
            tracing::debug!("noise");
            tracing::info!("kept");
            tracing::error!("also kept");
        });

        let lines = queue.drain(8);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("kept"));
        assert!(lines[1].starts_with("ERROR"));
    }

    #[test]
    fn test_full_queue_counts_drops() {
        let queue = Arc::new(BoundedLogQueue::new(1));
        capture(&queue, Level::INFO, || {
            tracing::info!("first");
            tracing::info!("second");
        });

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.dropped(), 1);
    }
}
