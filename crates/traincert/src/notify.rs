//! Outbound notifications (email and similar).
//!
//! Fire-and-forget: the engine never waits on delivery and never fails an
//! operation because a notification could not be sent.

use std::sync::Mutex;

use serde::Serialize;

use crate::error::Result;
use crate::ids::{CertificateId, ExamId};

/// Something a learner or operator may want to hear about.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    ExamSubmitted {
        learner_id: String,
        exam_id: ExamId,
        passed: bool,
        score_pct: u32,
    },
    CertificateIssued {
        learner_id: String,
        certificate_id: CertificateId,
        verification_url: String,
    },
    CertificateRevoked {
        certificate_id: CertificateId,
        reason: String,
    },
}

/// Delivery channel.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification) -> Result<()>;
}

/// Writes notifications to the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &Notification) -> Result<()> {
        log::info!("notify: {}", serde_json::to_string(notification)?);
        Ok(())
    }
}

/// Keeps notifications in memory.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, notification: &Notification) -> Result<()> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(notification.clone());
        }
        Ok(())
    }
}

/// Send and swallow failures.
pub fn dispatch(notifier: &dyn Notifier, notification: Notification) {
    if let Err(e) = notifier.notify(&notification) {
        log::warn!("notification dropped: {e}");
    }
}
