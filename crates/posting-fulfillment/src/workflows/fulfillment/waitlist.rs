use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::applications;
use super::domain::{Application, ApplicationId, ApplicationStatus, Decision};
use super::error::FulfillmentError;
use super::ledger;
use super::notifications::{NotificationKind, Outbox};
use super::repository::PostingRecord;

/// What the promoter did with a freed slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromotionOutcome {
    /// Nobody is waiting.
    NoCandidate,
    /// Auto-accept moved the head of the waitlist into the team.
    Promoted(ApplicationId),
    /// The owner was told a waitlisted candidate can be accepted.
    OwnerNotified(ApplicationId),
    /// The slot was consumed before the promoter got to it.
    CapacityTaken,
    /// Closed or expired postings do not promote.
    Retired,
}

/// Head of the waitlist: earliest submission, then insertion order. Scores play no part.
pub fn next_in_line(record: &PostingRecord) -> Option<&Application> {
    record
        .applications
        .iter()
        .filter(|application| application.status == ApplicationStatus::Waitlisted)
        .min_by_key(|application| (application.created_at, application.sequence))
}

/// Offer a freed slot to the waitlist.
pub fn on_slot_freed(
    record: &mut PostingRecord,
    now: DateTime<Utc>,
    outbox: &mut Outbox,
) -> Result<PromotionOutcome, FulfillmentError> {
    if record.posting.status.is_retired() {
        return Ok(PromotionOutcome::Retired);
    }

    ledger::reconcile_posting_status(record);

    let Some(candidate) = next_in_line(record).map(|application| application.id.clone()) else {
        debug!(posting = %record.posting.id, "slot freed with empty waitlist");
        return Ok(PromotionOutcome::NoCandidate);
    };

    if record.posting.auto_accept {
        return match applications::apply_decision(
            record,
            &candidate,
            Decision::Accept,
            NotificationKind::WaitlistPromoted,
            now,
            outbox,
        ) {
            Ok(promoted) => {
                info!(
                    posting = %record.posting.id,
                    application = %promoted.id,
                    "waitlisted application promoted"
                );
                Ok(PromotionOutcome::Promoted(promoted.id))
            }
            Err(FulfillmentError::CapacityExceeded) => Ok(PromotionOutcome::CapacityTaken),
            Err(other) => Err(other),
        };
    }

    if !ledger::has_capacity(record) {
        return Ok(PromotionOutcome::CapacityTaken);
    }

    outbox.push(
        &record.posting.creator_id,
        NotificationKind::WaitlistCandidateReady,
        &record.posting.id,
        Some(&candidate),
    );
    info!(
        posting = %record.posting.id,
        application = %candidate,
        "owner notified of waitlisted candidate"
    );
    Ok(PromotionOutcome::OwnerNotified(candidate))
}
