use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::domain::{ApplicationId, PostingId, UserId};

/// What a notification is about. Content rendering happens downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ApplicationReceived,
    ApplicationAccepted,
    ApplicationRejected,
    ApplicationWaitlisted,
    WaitlistPromoted,
    WaitlistCandidateReady,
    InviteReceived,
    InviteAccepted,
    InviteExhausted,
}

impl NotificationKind {
    pub const fn template(self) -> &'static str {
        match self {
            NotificationKind::ApplicationReceived => "application_received",
            NotificationKind::ApplicationAccepted => "application_accepted",
            NotificationKind::ApplicationRejected => "application_rejected",
            NotificationKind::ApplicationWaitlisted => "application_waitlisted",
            NotificationKind::WaitlistPromoted => "waitlist_promoted",
            NotificationKind::WaitlistCandidateReady => "waitlist_candidate_ready",
            NotificationKind::InviteReceived => "invite_received",
            NotificationKind::InviteAccepted => "invite_accepted",
            NotificationKind::InviteExhausted => "invite_exhausted",
        }
    }
}

/// Outbound notification record produced by a state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: UserId,
    pub kind: NotificationKind,
    pub posting_id: PostingId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_id: Option<ApplicationId>,
}

/// Notifications collected while a unit of work runs; delivered after commit.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Outbox {
    records: Vec<Notification>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        recipient: &UserId,
        kind: NotificationKind,
        posting_id: &PostingId,
        application_id: Option<&ApplicationId>,
    ) {
        self.records.push(Notification {
            recipient: recipient.clone(),
            kind,
            posting_id: posting_id.clone(),
            application_id: application_id.cloned(),
        });
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<Notification> {
        self.records
    }
}

/// Delivery hook (push, e-mail, in-app feed...).
pub trait NotificationSink: Send + Sync {
    fn emit(&self, notification: &Notification) -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Counts from one dispatch pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Best-effort delivery: failures are logged and dropped, never retried.
pub fn dispatch<N>(sink: &N, notifications: &[Notification]) -> DispatchReport
where
    N: NotificationSink + ?Sized,
{
    let mut report = DispatchReport::default();
    for notification in notifications {
        match sink.emit(notification) {
            Ok(()) => {
                debug!(
                    recipient = %notification.recipient,
                    template = notification.kind.template(),
                    posting = %notification.posting_id,
                    "notification emitted"
                );
                report.delivered += 1;
            }
            Err(err) => {
                warn!(
                    recipient = %notification.recipient,
                    template = notification.kind.template(),
                    posting = %notification.posting_id,
                    error = %err,
                    "notification dropped"
                );
                report.failed += 1;
            }
        }
    }
    report
}
