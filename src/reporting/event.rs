//! Error events in the tracker's store format.
//!
//! # Layout
//! ```text
//! ErrorEvent
//!   ├── exception.values[0]  (type, value, mechanism, stacktrace.frames)
//!   ├── breadcrumbs.values   (oldest first)
//!   ├── tags                 (route, error_type, ...)
//!   └── contexts.trace       (trace_id, span_id)
//! ```

use std::backtrace::Backtrace;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
}

/// Ordered trail entry describing what happened before an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Breadcrumb {
    pub timestamp: DateTime<Utc>,
    pub category: String,
    pub message: String,
    pub level: EventLevel,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
}

impl Breadcrumb {
    pub fn new(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            category: category.into(),
            message: message.into(),
            level: EventLevel::Info,
            data: BTreeMap::new(),
        }
    }

    pub fn level(mut self, level: EventLevel) -> Self {
        self.level = level;
        self
    }

    pub fn data(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.data.insert(key.into(), value.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lineno: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colno: Option<u32>,
    pub in_app: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Stacktrace {
    /// Oldest call first, as the tracker expects.
    pub frames: Vec<Frame>,
}

impl Stacktrace {
    /// Capture the current thread's stack regardless of `RUST_BACKTRACE`.
    pub fn capture() -> Self {
        Self::parse(&Backtrace::force_capture().to_string())
    }

    /// Parse the `std::backtrace::Backtrace` display format.
    pub fn parse(text: &str) -> Self {
        let mut frames: Vec<Frame> = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if let Some(location) = line.strip_prefix("at ") {
                if let Some(frame) = frames.last_mut() {
                    let (filename, lineno, colno) = split_location(location);
                    frame.filename = Some(filename);
                    frame.lineno = lineno;
                    frame.colno = colno;
                }
                continue;
            }
            let Some((index, function)) = line.split_once(": ") else {
                continue;
            };
            if index.is_empty() || !index.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            frames.push(Frame {
                in_app: function.starts_with(concat!(env!("CARGO_CRATE_NAME"), "::")),
                function: Some(function.to_string()),
                filename: None,
                lineno: None,
                colno: None,
            });
        }
        frames.reverse();
        Self { frames }
    }
}

/// `path:line:col` → parts; falls back to the whole string as the path.
fn split_location(location: &str) -> (String, Option<u32>, Option<u32>) {
    let mut parts = location.rsplitn(3, ':');
    let last = parts.next();
    let middle = parts.next();
    let rest = parts.next();
    match (rest, middle, last) {
        (Some(path), Some(line), Some(col)) => match (line.parse(), col.parse()) {
            (Ok(line), Ok(col)) => (path.to_string(), Some(line), Some(col)),
            _ => (location.to_string(), None, None),
        },
        _ => (location.to_string(), None, None),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mechanism {
    #[serde(rename = "type")]
    pub kind: String,
    pub handled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Exception {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
    pub mechanism: Mechanism,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stacktrace: Option<Stacktrace>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Values<T> {
    pub values: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceContext {
    pub trace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Contexts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<TraceContext>,
}

/// One report for the error tracker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorEvent {
    #[serde(serialize_with = "simple_uuid")]
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub level: EventLevel,
    pub platform: &'static str,
    pub logger: String,
    pub message: String,
    pub exception: Values<Exception>,
    pub tags: BTreeMap<String, String>,
    pub breadcrumbs: Values<Breadcrumb>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    pub contexts: Contexts,
}

fn simple_uuid<S: serde::Serializer>(id: &Uuid, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&id.simple())
}

impl ErrorEvent {
    /// A single-exception event. `handled` is false for faults nobody caught.
    pub fn exception(kind: impl Into<String>, value: impl Into<String>, handled: bool) -> Self {
        let value = value.into();
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            level: if handled { EventLevel::Error } else { EventLevel::Fatal },
            platform: "native",
            logger: env!("CARGO_CRATE_NAME").to_string(),
            message: value.clone(),
            exception: Values {
                values: vec![Exception {
                    kind: kind.into(),
                    value,
                    mechanism: Mechanism {
                        kind: if handled { "generic" } else { "panic" }.to_string(),
                        handled,
                    },
                    stacktrace: None,
                }],
            },
            tags: BTreeMap::new(),
            breadcrumbs: Values { values: Vec::new() },
            environment: None,
            release: None,
            server_name: None,
            contexts: Contexts::default(),
        }
    }

    pub fn with_stacktrace(mut self, stacktrace: Stacktrace) -> Self {
        if let Some(exception) = self.exception.values.first_mut() {
            exception.stacktrace = Some(stacktrace);
        }
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_breadcrumbs(mut self, breadcrumbs: impl IntoIterator<Item = Breadcrumb>) -> Self {
        self.breadcrumbs.values.extend(breadcrumbs);
        self
    }

    pub fn with_trace(mut self, trace_id: Option<String>, span_id: Option<String>) -> Self {
        self.contexts.trace = trace_id.map(|trace_id| TraceContext { trace_id, span_id });
        self
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Type of the primary exception.
    pub fn kind(&self) -> Option<&str> {
        self.exception.values.first().map(|e| e.kind.as_str())
    }
}
