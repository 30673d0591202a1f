// src/progress.rs
//! Progress events streamed to API callers while a run is in flight.
//!
//! The sink wraps an unbounded channel: emitting never waits on the
//! consumer, and a dropped consumer simply turns emits into no-ops.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::error::ScoutError;
use crate::search::CandidateProject;

/// One streamed event. Each variant serializes to the flat object the UI
/// expects, e.g. `{"status": .., "progress": ..}` or `{"project": .., "source_progress": ..}`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ProgressEvent {
    Status {
        status: String,
        progress: String,
    },
    Project {
        project: CandidateProject,
        source_progress: String,
    },
    ProjectUpdate {
        project_update: CandidateProject,
        analysis_progress: String,
    },
    Complete {
        status: String,
        result: Value,
    },
    Error {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        kind: Option<&'static str>,
    },
}

impl ProgressEvent {
    pub fn status(status: impl Into<String>, progress: impl Into<String>) -> Self {
        ProgressEvent::Status {
            status: status.into(),
            progress: progress.into(),
        }
    }

    pub fn error(err: &ScoutError) -> Self {
        ProgressEvent::Error {
            error: err.to_string(),
            kind: Some(err.kind().code()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Complete { .. } | ProgressEvent::Error { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    tx: Option<UnboundedSender<ProgressEvent>>,
}

impl ProgressSink {
    pub fn channel() -> (Self, UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that drops everything.
    pub fn discard() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(event).is_err() {
                tracing::debug!("progress consumer gone, event dropped");
            }
        }
    }

    pub fn status(&self, status: impl Into<String>, progress: impl Into<String>) {
        self.emit(ProgressEvent::status(status, progress));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn events_serialize_flat() {
        let v = serde_json::to_value(ProgressEvent::status("Searching", "Strategy 1/4")).unwrap();
        assert_eq!(v, json!({"status": "Searching", "progress": "Strategy 1/4"}));

        let v = serde_json::to_value(ProgressEvent::Error { error: "bad".into(), kind: None }).unwrap();
        assert_eq!(v, json!({"error": "bad"}));

        let err = ScoutError::InsufficientInput("too short".into());
        let v = serde_json::to_value(ProgressEvent::error(&err)).unwrap();
        assert_eq!(v, json!({"error": "too short", "kind": "insufficient_input"}));
    }

    #[test]
    fn only_results_and_errors_are_terminal() {
        assert!(!ProgressEvent::status("a", "b").is_terminal());
        assert!(ProgressEvent::Complete { status: "Complete".into(), result: json!({}) }.is_terminal());
        assert!(ProgressEvent::error(&ScoutError::Internal("x".into())).is_terminal());
    }

    #[tokio::test]
    async fn emit_after_consumer_drop_is_silent() {
        let (sink, mut rx) = ProgressSink::channel();
        sink.status("one", "x");
        assert!(matches!(rx.recv().await, Some(ProgressEvent::Status { .. })));
        drop(rx);
        sink.status("two", "y");
        ProgressSink::discard().status("three", "z");
    }
}
