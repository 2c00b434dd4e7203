//! Friend-ask invitation chains.
//!
//! Sequential sets ask one invitee at a time in the owner's order, moving to the next on a
//! decline or timeout. Parallel sets ask everyone at once. The first accept ends the set.
//! Ordering is fixed at creation and never re-ranked.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use super::domain::{
    FriendAsk, FriendAskId, FriendAskStatus, InviteAction, InviteMode, InviteeResponse,
    InviteeState, PostingMode, PostingStatus, UserId,
};
use super::error::FulfillmentError;
use super::ledger;
use super::notifications::{NotificationKind, Outbox};
use super::repository::PostingRecord;

static FRIEND_ASK_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Open a new invite set on a friend-ask posting.
pub fn create(
    record: &mut PostingRecord,
    requester: &UserId,
    ordered_friend_list: Vec<UserId>,
    invite_mode: InviteMode,
    now: DateTime<Utc>,
    outbox: &mut Outbox,
) -> Result<FriendAsk, FulfillmentError> {
    let posting = &record.posting;
    if &posting.creator_id != requester {
        return Err(FulfillmentError::Forbidden(
            "only the posting owner can send friend-asks".to_string(),
        ));
    }
    if posting.mode != PostingMode::FriendAsk {
        return Err(FulfillmentError::Validation(
            "posting admits candidates through open applications".to_string(),
        ));
    }
    if posting.status != PostingStatus::Open {
        return Err(FulfillmentError::Closed(posting.status));
    }
    if let Some(active) = record.active_friend_ask() {
        return Err(FulfillmentError::Conflict(format!(
            "friend-ask {} is already {} for this posting",
            active.id,
            active.status.label()
        )));
    }
    validate_list(&ordered_friend_list, &posting.creator_id)?;

    let invitees = ordered_friend_list
        .iter()
        .enumerate()
        .map(|(position, user_id)| {
            let asked_now = invite_mode == InviteMode::Parallel || position == 0;
            InviteeState {
                user_id: user_id.clone(),
                response: if asked_now {
                    InviteeResponse::Awaiting
                } else {
                    InviteeResponse::Queued
                },
                asked_at: asked_now.then_some(now),
                responded_at: None,
            }
        })
        .collect();

    let sequence = FRIEND_ASK_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let ask = FriendAsk {
        id: FriendAskId(format!("ask-{sequence:06}")),
        posting_id: posting.id.clone(),
        creator_id: requester.clone(),
        ordered_friend_list,
        current_request_index: 0,
        invite_mode,
        status: FriendAskStatus::Pending,
        invitees,
        accepted_by: None,
        created_at: now,
    };

    for invitee in ask.awaiting() {
        outbox.push(
            invitee,
            NotificationKind::InviteReceived,
            &ask.posting_id,
            None,
        );
    }
    info!(
        posting = %ask.posting_id,
        friend_ask = %ask.id,
        mode = ?ask.invite_mode,
        invitees = ask.ordered_friend_list.len(),
        "friend-ask created"
    );

    record.friend_asks.push(ask.clone());
    Ok(ask)
}

fn validate_list(list: &[UserId], owner: &UserId) -> Result<(), FulfillmentError> {
    if list.is_empty() {
        return Err(FulfillmentError::Validation(
            "ordered_friend_list must name at least one friend".to_string(),
        ));
    }
    if list.iter().any(|user_id| user_id == owner) {
        return Err(FulfillmentError::Validation(
            "owners cannot invite themselves".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    if let Some(repeat) = list.iter().find(|user_id| !seen.insert(*user_id)) {
        return Err(FulfillmentError::Validation(format!(
            "{repeat} appears more than once in ordered_friend_list"
        )));
    }
    Ok(())
}

/// An invitee answers the pending set on this posting.
pub fn respond(
    record: &mut PostingRecord,
    responder: &UserId,
    action: InviteAction,
    now: DateTime<Utc>,
    outbox: &mut Outbox,
) -> Result<FriendAsk, FulfillmentError> {
    if record.posting.status.is_retired() {
        return Err(FulfillmentError::Closed(record.posting.status));
    }
    let pending = record
        .friend_asks
        .iter()
        .find(|ask| ask.status == FriendAskStatus::Pending);
    let eligible = match pending {
        Some(ask) => ask.is_awaiting(responder),
        // A finished set still answers former invitees with FORBIDDEN rather than NOT_FOUND.
        None if record
            .friend_asks
            .iter()
            .any(|ask| ask.ordered_friend_list.contains(responder)) =>
        {
            false
        }
        None => {
            return Err(FulfillmentError::NotFound(format!(
                "pending friend-ask for posting {}",
                record.posting.id
            )))
        }
    };
    if !eligible {
        return Err(FulfillmentError::Forbidden(format!(
            "{responder} is not awaiting a response on this friend-ask"
        )));
    }

    if action == InviteAction::Accept && !ledger::has_capacity(record) {
        return Err(FulfillmentError::CapacityExceeded);
    }

    let owner = record.posting.creator_id.clone();
    let posting_id = record.posting.id.clone();
    let ask = record
        .pending_friend_ask_mut()
        .ok_or_else(|| FulfillmentError::NotFound(format!("pending friend-ask for {posting_id}")))?;

    match action {
        InviteAction::Accept => {
            for invitee in ask.invitees.iter_mut() {
                if &invitee.user_id == responder {
                    invitee.response = InviteeResponse::Accepted;
                    invitee.responded_at = Some(now);
                } else if matches!(
                    invitee.response,
                    InviteeResponse::Awaiting | InviteeResponse::Queued
                ) {
                    invitee.response = InviteeResponse::Superseded;
                }
            }
            ask.status = FriendAskStatus::Accepted;
            ask.accepted_by = Some(responder.clone());
            outbox.push(&owner, NotificationKind::InviteAccepted, &posting_id, None);
            info!(
                posting = %posting_id,
                friend_ask = %ask.id,
                invitee = %responder,
                "friend-ask accepted"
            );
        }
        InviteAction::Decline => {
            mark(ask, responder, InviteeResponse::Declined, now);
            info!(
                posting = %posting_id,
                friend_ask = %ask.id,
                invitee = %responder,
                "friend-ask declined"
            );
            advance(ask, &owner, now, outbox);
        }
    }

    let ask = ask.clone();
    if action == InviteAction::Accept {
        ledger::reconcile_posting_status(record);
    }
    Ok(ask)
}

/// Treat invitees who sat on a pending set longer than `window` as having declined.
pub fn expire_stale(
    record: &mut PostingRecord,
    window: Duration,
    now: DateTime<Utc>,
    outbox: &mut Outbox,
) -> Result<Vec<UserId>, FulfillmentError> {
    if record.posting.status.is_retired() {
        return Err(FulfillmentError::Closed(record.posting.status));
    }
    let owner = record.posting.creator_id.clone();
    let Some(ask) = record.pending_friend_ask_mut() else {
        return Ok(Vec::new());
    };

    let stale: Vec<UserId> = ask
        .invitees
        .iter()
        .filter(|invitee| invitee.response == InviteeResponse::Awaiting)
        .filter(|invitee| {
            invitee
                .asked_at
                .map_or(false, |asked_at| asked_at + window <= now)
        })
        .map(|invitee| invitee.user_id.clone())
        .collect();

    if stale.is_empty() {
        return Ok(stale);
    }

    for user_id in &stale {
        mark(ask, user_id, InviteeResponse::TimedOut, now);
    }
    info!(
        posting = %ask.posting_id,
        friend_ask = %ask.id,
        timed_out = stale.len(),
        "friend-ask invitees timed out"
    );
    advance(ask, &owner, now, outbox);
    Ok(stale)
}

fn mark(ask: &mut FriendAsk, user_id: &UserId, response: InviteeResponse, now: DateTime<Utc>) {
    if let Some(invitee) = ask
        .invitees
        .iter_mut()
        .find(|invitee| &invitee.user_id == user_id)
    {
        invitee.response = response;
        invitee.responded_at = Some(now);
    }
}

/// Move the set forward after declines or timeouts; exhausts it when nobody is left.
fn advance(ask: &mut FriendAsk, owner: &UserId, now: DateTime<Utc>, outbox: &mut Outbox) {
    match ask.invite_mode {
        InviteMode::Sequential => {
            let current_still_awaiting = ask
                .invitees
                .get(ask.current_request_index)
                .map_or(false, |invitee| invitee.response == InviteeResponse::Awaiting);
            if current_still_awaiting {
                return;
            }

            ask.current_request_index += 1;
            match ask.invitees.get_mut(ask.current_request_index) {
                Some(next) => {
                    next.response = InviteeResponse::Awaiting;
                    next.asked_at = Some(now);
                    outbox.push(
                        &next.user_id,
                        NotificationKind::InviteReceived,
                        &ask.posting_id,
                        None,
                    );
                }
                None => exhaust(ask, owner, outbox),
            }
        }
        InviteMode::Parallel => {
            if ask.awaiting().next().is_none() {
                exhaust(ask, owner, outbox);
            }
        }
    }
}

fn exhaust(ask: &mut FriendAsk, owner: &UserId, outbox: &mut Outbox) {
    ask.status = FriendAskStatus::Exhausted;
    outbox.push(owner, NotificationKind::InviteExhausted, &ask.posting_id, None);
    info!(
        posting = %ask.posting_id,
        friend_ask = %ask.id,
        "friend-ask exhausted without an accept"
    );
}
