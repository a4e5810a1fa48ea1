//! Progress events and the per-request sink that carries them
//!
//! The sink wraps the sending half of an unbounded channel; the HTTP layer
//! owns the receiving half and frames each event as a server-sent event.
//! Sends never block the pipeline and never fail it: once the receiver is
//! gone every further event is dropped.

use crate::pipeline::IngestSummary;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

/// Pipeline phase reported in `progress` events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Downloading,
    Validating,
    Extracting,
    Parsing,
    UploadingImages,
    UpdatingProduct,
}

/// Phase-specific numbers attached to a `progress` event
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// One message on the progress stream
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProgressEvent {
    Progress {
        phase: Phase,
        message: String,
        #[serde(flatten)]
        detail: ProgressDetail,
    },
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<&'static str>,
    },
    Complete {
        message: String,
        data: Box<IngestSummary>,
    },
}

impl ProgressEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProgressEvent::Progress { .. })
    }
}

/// Create a connected sink and receiver.
pub fn progress_channel() -> (ProgressStream, mpsc::UnboundedReceiver<ProgressEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ProgressStream::new(tx), rx)
}

/// Write side of one request's progress stream
#[derive(Debug)]
pub struct ProgressStream {
    tx: std::sync::Mutex<Option<mpsc::UnboundedSender<ProgressEvent>>>,
    disconnected_logged: AtomicBool,
}

impl ProgressStream {
    pub fn new(tx: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self {
            tx: std::sync::Mutex::new(Some(tx)),
            disconnected_logged: AtomicBool::new(false),
        }
    }

    fn emit(&self, event: ProgressEvent) {
        let Ok(guard) = self.tx.lock() else {
            return;
        };
        let Some(tx) = guard.as_ref() else {
            self.note_dropped("stream already closed");
            return;
        };
        if tx.send(event).is_err() {
            self.note_dropped("client disconnected");
        }
    }

    fn note_dropped(&self, reason: &str) {
        if !self.disconnected_logged.swap(true, Ordering::Relaxed) {
            tracing::debug!(reason, "Dropping progress events");
        }
    }

    pub fn send_progress(&self, phase: Phase, message: impl Into<String>, detail: ProgressDetail) {
        self.emit(ProgressEvent::Progress {
            phase,
            message: message.into(),
            detail,
        });
    }

    pub fn send_error(&self, message: impl Into<String>, code: Option<&'static str>) {
        self.emit(ProgressEvent::Error {
            message: message.into(),
            code,
        });
    }

    pub fn send_complete(&self, message: impl Into<String>, data: IngestSummary) {
        self.emit(ProgressEvent::Complete {
            message: message.into(),
            data: Box::new(data),
        });
    }

    /// Drop the sender so the reader sees end-of-stream. Idempotent.
    pub fn close(&self) {
        if let Ok(mut guard) = self.tx.lock() {
            guard.take();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.lock().map(|g| g.is_none()).unwrap_or(true)
    }
}

impl Drop for ProgressStream {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_progress_event_shape() {
        let event = ProgressEvent::Progress {
            phase: Phase::UploadingImages,
            message: "Uploaded 3 of 10 images".to_string(),
            detail: ProgressDetail {
                current: Some(3),
                total: Some(10),
                percentage: Some(30),
                failed: None,
                filename: Some("0_2.png".to_string()),
            },
        };

        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "progress",
                "phase": "uploading-images",
                "message": "Uploaded 3 of 10 images",
                "current": 3,
                "total": 10,
                "percentage": 30,
                "filename": "0_2.png"
            })
        );
    }

    #[test]
    fn test_error_event_shape() {
        let event = ProgressEvent::Error {
            message: "Archive is empty".to_string(),
            code: Some("INVALID_ARCHIVE"),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({ "type": "error", "message": "Archive is empty", "code": "INVALID_ARCHIVE" })
        );
    }

    #[tokio::test]
    async fn test_events_arrive_in_order_then_end() {
        let (stream, mut rx) = progress_channel();

        stream.send_progress(Phase::Validating, "Validating archive", ProgressDetail::default());
        stream.send_progress(Phase::Extracting, "Extracting archive", ProgressDetail::default());
        stream.send_error("boom", None);
        stream.close();

        let mut phases = Vec::new();
        while let Some(event) = rx.recv().await {
            phases.push(event);
        }
        assert_eq!(phases.len(), 3);
        assert!(matches!(phases[0], ProgressEvent::Progress { phase: Phase::Validating, .. }));
        assert!(matches!(phases[1], ProgressEvent::Progress { phase: Phase::Extracting, .. }));
        assert!(phases[2].is_terminal());
    }

    #[test]
    fn test_send_after_disconnect_is_swallowed() {
        let (stream, rx) = progress_channel();
        drop(rx);

        stream.send_progress(Phase::Parsing, "Parsing", ProgressDetail::default());
        stream.send_error("still fine", None);
        stream.close();
        assert!(stream.is_closed());
    }

    #[test]
    fn test_send_after_close_is_swallowed() {
        let (stream, mut rx) = progress_channel();
        stream.close();
        stream.close();
        stream.send_error("late", None);

        assert!(rx.try_recv().is_err());
    }
}
