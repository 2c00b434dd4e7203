//! Application lifecycle for open-mode postings.
//!
//! ```text
//! pending ──accept──▶ accepted ──withdraw──▶ withdrawn
//!    │ └──waitlist──▶ waitlisted ──accept / withdraw / reject
//!    └──reject──▶ rejected
//! ```
//!
//! These functions are the only code that writes `Application::status`. They run inside the
//! posting's unit of work and record notifications into the caller's outbox.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tracing::info;

use super::domain::{
    Application, ApplicationId, ApplicationStatus, Decision, PostingMode, PostingStatus, UserId,
};
use super::error::FulfillmentError;
use super::ledger;
use super::notifications::{NotificationKind, Outbox};
use super::repository::PostingRecord;
use super::waitlist::{self, PromotionOutcome};

static APPLICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Result of a withdrawal, including what happened to the freed slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Withdrawal {
    pub application: Application,
    pub promotion: Option<PromotionOutcome>,
}

/// Record a new `pending` application.
pub fn submit(
    record: &mut PostingRecord,
    applicant: &UserId,
    message: String,
    now: DateTime<Utc>,
    outbox: &mut Outbox,
) -> Result<Application, FulfillmentError> {
    let posting = &record.posting;
    if &posting.creator_id == applicant {
        return Err(FulfillmentError::Forbidden(
            "owners cannot apply to their own posting".to_string(),
        ));
    }
    if record.application_for(applicant).is_some() {
        return Err(FulfillmentError::Duplicate);
    }
    if posting.status != PostingStatus::Open {
        return Err(FulfillmentError::Closed(posting.status));
    }
    if posting.mode != PostingMode::Open {
        return Err(FulfillmentError::Validation(
            "posting fills through friend-ask invitations only".to_string(),
        ));
    }

    // Submission order must never run backwards within a posting.
    let created_at = record
        .applications
        .iter()
        .map(|application| application.created_at)
        .max()
        .map_or(now, |latest| latest.max(now));
    let sequence = APPLICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);

    let application = Application {
        id: ApplicationId(format!("app-{sequence:06}")),
        posting_id: record.posting.id.clone(),
        applicant_id: applicant.clone(),
        status: ApplicationStatus::Pending,
        message,
        created_at,
        sequence,
        updated_at: created_at,
    };

    outbox.push(
        &record.posting.creator_id,
        NotificationKind::ApplicationReceived,
        &record.posting.id,
        Some(&application.id),
    );
    info!(
        posting = %record.posting.id,
        application = %application.id,
        applicant = %applicant,
        "application submitted"
    );

    record.applications.push(application.clone());
    Ok(application)
}

/// Owner verdict on a pending or waitlisted application.
pub fn decide(
    record: &mut PostingRecord,
    application_id: &ApplicationId,
    requester: &UserId,
    decision: Decision,
    now: DateTime<Utc>,
    outbox: &mut Outbox,
) -> Result<Application, FulfillmentError> {
    if &record.posting.creator_id != requester {
        return Err(FulfillmentError::Forbidden(
            "only the posting owner can decide applications".to_string(),
        ));
    }

    let kind = match decision {
        Decision::Accept => NotificationKind::ApplicationAccepted,
        Decision::Reject => NotificationKind::ApplicationRejected,
        Decision::Waitlist => NotificationKind::ApplicationWaitlisted,
    };
    apply_decision(record, application_id, decision, kind, now, outbox)
}

/// Shared transition logic; the waitlist promoter re-enters here so capacity is re-checked.
pub(crate) fn apply_decision(
    record: &mut PostingRecord,
    application_id: &ApplicationId,
    decision: Decision,
    kind: NotificationKind,
    now: DateTime<Utc>,
    outbox: &mut Outbox,
) -> Result<Application, FulfillmentError> {
    let current = record
        .application(application_id)
        .ok_or_else(|| FulfillmentError::NotFound(format!("application {application_id}")))?
        .status;

    let target = match decision {
        Decision::Accept => ApplicationStatus::Accepted,
        Decision::Reject => ApplicationStatus::Rejected,
        Decision::Waitlist => ApplicationStatus::Waitlisted,
    };

    let allowed = match decision {
        Decision::Accept | Decision::Reject => matches!(
            current,
            ApplicationStatus::Pending | ApplicationStatus::Waitlisted
        ),
        Decision::Waitlist => current == ApplicationStatus::Pending,
    };
    if !allowed {
        return Err(FulfillmentError::InvalidTransition {
            from: current,
            to: target,
        });
    }

    match decision {
        Decision::Accept | Decision::Waitlist if record.posting.status.is_retired() => {
            return Err(FulfillmentError::Closed(record.posting.status));
        }
        Decision::Accept if !ledger::has_capacity(record) => {
            return Err(FulfillmentError::CapacityExceeded);
        }
        // The waitlist only queues overflow for a full posting.
        Decision::Waitlist if ledger::has_capacity(record) => {
            return Err(FulfillmentError::Conflict(
                "posting still has free slots; accept the application instead".to_string(),
            ));
        }
        _ => {}
    }

    let posting_id = record.posting.id.clone();
    let application = record
        .application_mut(application_id)
        .ok_or_else(|| FulfillmentError::NotFound(format!("application {application_id}")))?;
    application.status = target;
    application.updated_at = now;
    let application = application.clone();

    outbox.push(
        &application.applicant_id,
        kind,
        &posting_id,
        Some(&application.id),
    );
    info!(
        posting = %posting_id,
        application = %application.id,
        from = current.label(),
        to = target.label(),
        "application transitioned"
    );

    if decision == Decision::Accept {
        ledger::reconcile_posting_status(record);
    }

    Ok(application)
}

/// Applicant leaves an accepted or waitlisted spot. A freed slot is always offered forward.
pub fn withdraw(
    record: &mut PostingRecord,
    application_id: &ApplicationId,
    requester: &UserId,
    now: DateTime<Utc>,
    outbox: &mut Outbox,
) -> Result<Withdrawal, FulfillmentError> {
    let existing = record
        .application(application_id)
        .ok_or_else(|| FulfillmentError::NotFound(format!("application {application_id}")))?;
    if &existing.applicant_id != requester {
        return Err(FulfillmentError::Forbidden(
            "only the applicant can withdraw an application".to_string(),
        ));
    }
    let previous = existing.status;
    if !matches!(
        previous,
        ApplicationStatus::Accepted | ApplicationStatus::Waitlisted
    ) {
        return Err(FulfillmentError::InvalidTransition {
            from: previous,
            to: ApplicationStatus::Withdrawn,
        });
    }

    let application = record
        .application_mut(application_id)
        .ok_or_else(|| FulfillmentError::NotFound(format!("application {application_id}")))?;
    application.status = ApplicationStatus::Withdrawn;
    application.updated_at = now;
    let application = application.clone();

    info!(
        posting = %record.posting.id,
        application = %application.id,
        from = previous.label(),
        "application withdrawn"
    );

    let promotion = if previous == ApplicationStatus::Accepted {
        ledger::reconcile_posting_status(record);
        Some(waitlist::on_slot_freed(record, now, outbox)?)
    } else {
        None
    };

    Ok(Withdrawal {
        application,
        promotion,
    })
}
