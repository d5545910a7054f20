//! One JSON object per event for the JSONL log file.
//!
//! The fields the spool logs on every delivery (`message_id`, `transport`,
//! `attempts`, `error`) are lifted to the top level so `jq` filters stay
//! short; anything else lands under `fields`.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::io::Write;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

/// One line of the JSONL file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LogEntry {
    pub ts: String,
    pub level: &'static str,
    pub service: String,
    pub pid: u32,
    pub target: String,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
    /// Enclosing spans, outermost first.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub spans: Vec<&'static str>,
}

impl LogEntry {
    fn record(&mut self, field: &Field, value: Value) {
        match (field.name(), value) {
            ("message", Value::String(s)) => self.msg = s,
            ("message_id", Value::String(s)) => self.message_id = Some(s),
            ("transport", Value::String(s)) => self.transport = Some(s),
            ("error", Value::String(s)) => self.error = Some(s),
            ("attempts", Value::Number(n)) if n.is_u64() => self.attempts = n.as_u64(),
            (name, value) => {
                self.fields.insert(name.to_string(), value);
            }
        }
    }
}

impl Visit for LogEntry {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record(field, Value::String(format!("{value:?}")));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.record(field, Value::String(value.to_string()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.record(field, value.into());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.record(field, value.into());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        let value = serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(value.to_string()));
        self.record(field, value);
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.record(field, Value::String(value.to_string()));
    }
}

/// Layer writing [`LogEntry`] lines through `make_writer`.
pub struct JsonLayer<W> {
    service: String,
    pid: u32,
    make_writer: W,
}

impl<W> JsonLayer<W> {
    pub fn new(service: String, make_writer: W) -> Self {
        Self {
            service,
            pid: std::process::id(),
            make_writer,
        }
    }
}

impl<S, W> Layer<S> for JsonLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'writer> MakeWriter<'writer> + 'static,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut entry = LogEntry {
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            level: metadata.level().as_str(),
            service: self.service.clone(),
            pid: self.pid,
            target: metadata.target().to_string(),
            spans: ctx
                .event_scope(event)
                .map(|scope| scope.from_root().map(|span| span.name()).collect())
                .unwrap_or_default(),
            ..Default::default()
        };
        event.record(&mut entry);

        // One write per line keeps concurrent writers from interleaving.
        if let Ok(mut line) = serde_json::to_vec(&entry) {
            line.push(b'\n');
            let _ = self.make_writer.make_writer().write_all(&line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::{CentralLogWriter, WriterFactory};
    use tracing_subscriber::layer::SubscriberExt;

    fn capture(emit: impl FnOnce()) -> Vec<Value> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let writer = CentralLogWriter::new(&path).unwrap();
        let layer = JsonLayer::new("mailspool".to_string(), WriterFactory::new(writer));
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, emit);

        std::fs::read_to_string(&path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn spool_fields_are_top_level() {
        let lines = capture(|| {
            tracing::warn!(
                message_id = "m-1",
                transport = "relay",
                attempts = 3u64,
                permanent = false,
                error = "connection reset",
                "Delivery failed"
            );
        });

        let line = &lines[0];
        assert_eq!(line["level"], "WARN");
        assert_eq!(line["service"], "mailspool");
        assert_eq!(line["msg"], "Delivery failed");
        assert_eq!(line["message_id"], "m-1");
        assert_eq!(line["transport"], "relay");
        assert_eq!(line["attempts"], 3);
        assert_eq!(line["error"], "connection reset");
        assert_eq!(line["fields"]["permanent"], false);
    }

    #[test]
    fn optional_keys_are_omitted() {
        let lines = capture(|| tracing::info!("Flush finished"));

        let line = lines[0].as_object().unwrap();
        assert!(!line.contains_key("message_id"));
        assert!(!line.contains_key("fields"));
        assert!(!line.contains_key("spans"));
    }

    #[test]
    fn records_enclosing_spans() {
        let lines = capture(|| {
            let outer = tracing::info_span!("flush");
            let _outer = outer.enter();
            let inner = tracing::info_span!("deliver");
            let _inner = inner.enter();
            tracing::debug!(sent = 2u64, "Message delivered");
        });

        assert_eq!(lines[0]["spans"], serde_json::json!(["flush", "deliver"]));
        assert_eq!(lines[0]["fields"]["sent"], 2);
    }
}
