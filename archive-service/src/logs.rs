use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::{Arc, RwLock};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::field::{Field, Visit};
use tracing::{Event as TraceEvent, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// One captured tracing event.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: SystemTime,
    pub level: String,
    pub target: String,
    pub message: String,
}

/// Ring buffer of the last `capacity` log entries, fanned out live over a
/// broadcast channel to any attached SSE client.
#[derive(Clone)]
pub struct LogState {
    buffer: Arc<RwLock<VecDeque<LogEntry>>>,
    capacity: usize,
    tx: broadcast::Sender<LogEntry>,
}

impl LogState {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
            tx: broadcast::channel(1000).0,
        }
    }

    fn push(&self, entry: LogEntry) {
        let mut buf = self.buffer.write().expect("log buffer poisoned");
        if buf.len() == self.capacity {
            buf.pop_front();
        }
        buf.push_back(entry.clone());
        let _ = self.tx.send(entry);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.tx.subscribe()
    }

    pub fn dump(&self) -> Vec<LogEntry> {
        self.buffer.read().expect("log buffer poisoned").iter().cloned().collect()
    }
}

/// `tracing_subscriber::Layer` that feeds every event into a [`LogState`].
pub struct LogLayer {
    state: LogState,
}

impl LogLayer {
    pub fn new(state: LogState) -> Self {
        Self { state }
    }
}

struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            if !self.message.is_empty() {
                self.message.push(' ');
            }
            self.message.push_str(&format!("{}={:?}", field.name(), value));
        }
    }
}

impl<S: Subscriber> Layer<S> for LogLayer {
    fn on_event(&self, event: &TraceEvent<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor { message: String::new() };
        event.record(&mut visitor);

        self.state.push(LogEntry {
            timestamp: SystemTime::now(),
            level: event.metadata().level().to_string(),
            target: event.metadata().target().to_string(),
            message: visitor.message,
        });
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LogQuery {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
}

fn matches(entry: &LogEntry, query: &LogQuery) -> bool {
    if let Some(level) = &query.level {
        if !entry.level.eq_ignore_ascii_case(level) {
            return false;
        }
    }
    if let Some(search) = &query.search {
        if !entry.message.contains(search.as_str()) && !entry.target.contains(search.as_str()) {
            return false;
        }
    }
    true
}

/// `GET /logs/sse`: replays the buffer then streams new entries live.
pub async fn log_sse(
    State(state): State<LogState>,
    Query(query): Query<LogQuery>,
) -> Sse<impl futures::Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.subscribe();
    let history = state.dump();

    let stream = async_stream::stream! {
        for entry in history {
            if matches(&entry, &query) {
                if let Ok(json) = serde_json::to_string(&entry) {
                    yield Ok(Event::default().data(json));
                }
            }
        }
        while let Ok(entry) = rx.recv().await {
            if matches(&entry, &query) {
                if let Ok(json) = serde_json::to_string(&entry) {
                    yield Ok(Event::default().data(json));
                }
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// `GET /logs/dump`: the buffer's full current contents as JSON.
pub async fn log_dump(State(state): State<LogState>, Query(query): Query<LogQuery>) -> impl IntoResponse {
    let entries: Vec<LogEntry> = state.dump().into_iter().filter(|e| matches(e, &query)).collect();
    Json(entries)
}
