//! Capacity bookkeeping for a single posting.
//!
//! The ledger is the only place that derives `open`/`filled` from the accepted set. It never
//! touches retired (`closed`/`expired`) postings.

use tracing::info;

use super::domain::{ApplicationStatus, FriendAskStatus, PostingStatus};
use super::repository::PostingRecord;

/// Accepted applications plus participants who accepted a friend-ask.
pub fn accepted_count(record: &PostingRecord) -> u32 {
    let applications = record
        .applications
        .iter()
        .filter(|application| application.status == ApplicationStatus::Accepted)
        .count();
    let invitees = record
        .friend_asks
        .iter()
        .filter(|ask| ask.status == FriendAskStatus::Accepted && ask.accepted_by.is_some())
        .count();

    u32::try_from(applications + invitees).unwrap_or(u32::MAX)
}

pub fn has_capacity(record: &PostingRecord) -> bool {
    accepted_count(record) < record.posting.team_size_max
}

pub fn free_slots(record: &PostingRecord) -> u32 {
    record
        .posting
        .team_size_max
        .saturating_sub(accepted_count(record))
}

/// A status flip performed by [`reconcile_posting_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub from: PostingStatus,
    pub to: PostingStatus,
}

/// Recompute `open`/`filled` from the accepted count.
pub fn reconcile_posting_status(record: &mut PostingRecord) -> Option<StatusChange> {
    let accepted = accepted_count(record);
    let posting = &mut record.posting;

    let next = match posting.status {
        PostingStatus::Open if accepted >= posting.team_size_max => PostingStatus::Filled,
        PostingStatus::Filled if accepted < posting.team_size_max => PostingStatus::Open,
        _ => return None,
    };

    let change = StatusChange {
        from: posting.status,
        to: next,
    };
    posting.status = next;
    info!(
        posting = %posting.id,
        from = change.from.label(),
        to = change.to.label(),
        accepted,
        capacity = posting.team_size_max,
        "posting status reconciled"
    );
    Some(change)
}
