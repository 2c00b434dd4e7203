use chrono::Duration;

use super::common::*;
use crate::workflows::fulfillment::domain::{
    FriendAskId, FriendAskStatus, InviteAction, InviteMode, InviteeResponse, NewFriendAsk,
    PostingId, PostingMode, PostingStatus, Retirement, UserId,
};
use crate::workflows::fulfillment::error::FulfillmentError;
use crate::workflows::fulfillment::{invites, ledger};
use crate::workflows::fulfillment::notifications::{NotificationKind, Outbox};
use crate::workflows::fulfillment::repository::PostingRecord;

fn ask(posting_id: &PostingId, friends: &[&str], invite_mode: InviteMode) -> NewFriendAsk {
    NewFriendAsk {
        posting_id: posting_id.clone(),
        ordered_friend_list: friends.iter().map(|name| user(name)).collect(),
        invite_mode,
    }
}

fn response_of(record: &PostingRecord, name: &str) -> InviteeResponse {
    record
        .friend_asks
        .last()
        .and_then(|ask| ask.invitees.iter().find(|invitee| invitee.user_id == user(name)))
        .map(|invitee| invitee.response)
        .expect("invitee present")
}

#[test]
fn sequential_set_walks_the_list_and_exhausts_once() {
    let (coordinator, _, sink, _) = build_coordinator();
    let posting = friend_posting(&coordinator, 2);

    let created = coordinator
        .invite_created(&owner(), ask(&posting.id, &["ana", "ben", "cai"], InviteMode::Sequential))
        .expect("create");
    assert_eq!(created.value.current_request_index, 0);
    assert_eq!(created.notifications.len(), 1);
    assert_eq!(sink.count(&user("ana"), NotificationKind::InviteReceived), 1);
    assert_eq!(sink.count(&user("ben"), NotificationKind::InviteReceived), 0);

    let after_ana = coordinator
        .invite_responded(&posting.id, &user("ana"), InviteAction::Decline)
        .expect("ana declines");
    assert_eq!(after_ana.value.current_request_index, 1);
    assert_eq!(sink.count(&user("ben"), NotificationKind::InviteReceived), 1);

    match coordinator.invite_responded(&posting.id, &user("cai"), InviteAction::Accept) {
        Err(FulfillmentError::Forbidden(_)) => {}
        other => panic!("expected forbidden for queued invitee, got {other:?}"),
    }

    coordinator
        .invite_responded(&posting.id, &user("ben"), InviteAction::Decline)
        .expect("ben declines");
    let last = coordinator
        .invite_responded(&posting.id, &user("cai"), InviteAction::Decline)
        .expect("cai declines");

    assert_eq!(last.value.status, FriendAskStatus::Exhausted);
    assert_eq!(sink.count(&owner(), NotificationKind::InviteExhausted), 1);
    assert_eq!(status_of(&coordinator, &posting.id), PostingStatus::Open);

    match coordinator.invite_responded(&posting.id, &user("cai"), InviteAction::Decline) {
        Err(FulfillmentError::Forbidden(_)) => {}
        other => panic!("expected forbidden after exhaustion, got {other:?}"),
    }
    assert_eq!(sink.count(&owner(), NotificationKind::InviteExhausted), 1);
}

#[test]
fn first_accept_short_circuits_remaining_invitees() {
    let (coordinator, _, sink, _) = build_coordinator();
    let posting = friend_posting(&coordinator, 1);
    coordinator
        .invite_created(&owner(), ask(&posting.id, &["ana", "ben"], InviteMode::Sequential))
        .expect("create");

    let accepted = coordinator
        .invite_responded(&posting.id, &user("ana"), InviteAction::Accept)
        .expect("ana accepts");

    assert_eq!(accepted.value.status, FriendAskStatus::Accepted);
    assert_eq!(accepted.value.accepted_by, Some(user("ana")));
    assert_eq!(sink.count(&owner(), NotificationKind::InviteAccepted), 1);
    assert_eq!(status_of(&coordinator, &posting.id), PostingStatus::Filled);

    let record = coordinator.posting(&posting.id).expect("posting");
    assert_eq!(response_of(&record, "ben"), InviteeResponse::Superseded);
    assert_eq!(sink.count(&user("ben"), NotificationKind::InviteReceived), 0);

    match coordinator.invite_responded(&posting.id, &user("ben"), InviteAction::Accept) {
        Err(FulfillmentError::Forbidden(_)) => {}
        other => panic!("expected forbidden, got {other:?}"),
    }
}

#[test]
fn accepted_set_blocks_a_new_set() {
    let (coordinator, _, _, _) = build_coordinator();
    let posting = friend_posting(&coordinator, 3);
    coordinator
        .invite_created(&owner(), ask(&posting.id, &["ana"], InviteMode::Sequential))
        .expect("create");
    coordinator
        .invite_responded(&posting.id, &user("ana"), InviteAction::Accept)
        .expect("accept");
    assert_eq!(status_of(&coordinator, &posting.id), PostingStatus::Open);

    match coordinator.invite_created(&owner(), ask(&posting.id, &["ben"], InviteMode::Parallel)) {
        Err(FulfillmentError::Conflict(_)) => {}
        other => panic!("expected conflict, got {other:?}"),
    }
    let record = coordinator.posting(&posting.id).expect("posting");
    assert_eq!(ledger::accepted_count(&record), 1);
    assert_eq!(ledger::free_slots(&record), 2);
    assert_eq!(record.view().active_invite.map(|invite| invite.status), Some("accepted"));
}

#[test]
fn pending_set_blocks_a_new_set_but_exhausted_does_not() {
    let (coordinator, _, _, _) = build_coordinator();
    let posting = friend_posting(&coordinator, 2);
    coordinator
        .invite_created(&owner(), ask(&posting.id, &["ana"], InviteMode::Sequential))
        .expect("create");

    assert!(matches!(
        coordinator.invite_created(&owner(), ask(&posting.id, &["ben"], InviteMode::Sequential)),
        Err(FulfillmentError::Conflict(_))
    ));

    coordinator
        .invite_responded(&posting.id, &user("ana"), InviteAction::Decline)
        .expect("decline");
    let second = coordinator
        .invite_created(&owner(), ask(&posting.id, &["ben"], InviteMode::Sequential))
        .expect("new set after exhaustion");
    assert_eq!(second.value.status, FriendAskStatus::Pending);
}

#[test]
fn parallel_set_asks_everyone_and_exhausts_after_last_decline() {
    let (coordinator, _, sink, _) = build_coordinator();
    let posting = friend_posting(&coordinator, 2);

    let created = coordinator
        .invite_created(&owner(), ask(&posting.id, &["ana", "ben", "cai"], InviteMode::Parallel))
        .expect("create");
    assert_eq!(created.notifications.len(), 3);
    assert_eq!(created.value.awaiting().count(), 3);

    for name in ["cai", "ana"] {
        let handled = coordinator
            .invite_responded(&posting.id, &user(name), InviteAction::Decline)
            .expect("decline");
        assert_eq!(handled.value.status, FriendAskStatus::Pending);
    }
    let last = coordinator
        .invite_responded(&posting.id, &user("ben"), InviteAction::Decline)
        .expect("decline");

    assert_eq!(last.value.status, FriendAskStatus::Exhausted);
    assert_eq!(sink.count(&owner(), NotificationKind::InviteExhausted), 1);
}

#[test]
fn parallel_accept_supersedes_others() {
    let (coordinator, _, _, _) = build_coordinator();
    let posting = friend_posting(&coordinator, 2);
    coordinator
        .invite_created(&owner(), ask(&posting.id, &["ana", "ben"], InviteMode::Parallel))
        .expect("create");

    coordinator
        .invite_responded(&posting.id, &user("ben"), InviteAction::Accept)
        .expect("ben accepts");

    let record = coordinator.posting(&posting.id).expect("posting");
    assert_eq!(response_of(&record, "ana"), InviteeResponse::Superseded);
    assert_eq!(response_of(&record, "ben"), InviteeResponse::Accepted);
    assert!(matches!(
        coordinator.invite_responded(&posting.id, &user("ana"), InviteAction::Accept),
        Err(FulfillmentError::Forbidden(_))
    ));
}

#[test]
fn create_validates_the_request() {
    let (coordinator, _, _, _) = build_coordinator();
    let posting = friend_posting(&coordinator, 2);
    let open = open_posting(&coordinator, 2, false);

    let invalid = [
        ask(&posting.id, &[], InviteMode::Sequential),
        ask(&posting.id, &["ana", "ben", "ana"], InviteMode::Sequential),
        ask(&posting.id, &["owner-olive"], InviteMode::Parallel),
        ask(&open.id, &["ana"], InviteMode::Sequential),
    ];
    for request in invalid {
        match coordinator.invite_created(&owner(), request) {
            Err(FulfillmentError::Validation(_)) => {}
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    assert!(matches!(
        coordinator.invite_created(&user("ana"), ask(&posting.id, &["ben"], InviteMode::Sequential)),
        Err(FulfillmentError::Forbidden(_))
    ));
    assert!(coordinator
        .posting(&posting.id)
        .expect("posting")
        .friend_asks
        .is_empty());
}

#[test]
fn respond_without_any_set_is_not_found() {
    let (coordinator, _, _, _) = build_coordinator();
    let posting = friend_posting(&coordinator, 2);

    match coordinator.invite_responded(&posting.id, &user("ana"), InviteAction::Accept) {
        Err(FulfillmentError::NotFound(_)) => {}
        other => panic!("expected not found, got {other:?}"),
    }
}

#[test]
fn accept_without_capacity_is_refused() {
    let (coordinator, _, _, _) = build_coordinator();
    let posting = friend_posting(&coordinator, 1);
    let mut record = coordinator.posting(&posting.id).expect("posting");
    let mut outbox = Outbox::new();

    invites::create(
        &mut record,
        &owner(),
        vec![user("ana")],
        InviteMode::Sequential,
        start(),
        &mut outbox,
    )
    .expect("create");
    // An earlier set already filled the only seat.
    let mut earlier = record.friend_asks[0].clone();
    earlier.id = FriendAskId::from("ask-earlier");
    earlier.status = FriendAskStatus::Accepted;
    earlier.accepted_by = Some(UserId::from("zed"));
    record.friend_asks.insert(0, earlier);

    match invites::respond(&mut record, &user("ana"), InviteAction::Accept, start(), &mut outbox) {
        Err(FulfillmentError::CapacityExceeded) => {}
        other => panic!("expected capacity exceeded, got {other:?}"),
    }
    assert_eq!(response_of(&record, "ana"), InviteeResponse::Awaiting);
}

#[test]
fn sequential_invitee_times_out_after_window() {
    let (coordinator, _, sink, clock) = build_coordinator();
    let posting = friend_posting(&coordinator, 2);
    coordinator
        .invite_created(&owner(), ask(&posting.id, &["ana", "ben"], InviteMode::Sequential))
        .expect("create");

    clock.advance(Duration::hours(47));
    let early = coordinator
        .invite_expired(&posting.id, &owner())
        .expect("sweep");
    assert!(early.value.is_empty());

    clock.advance(Duration::hours(1));
    let swept = coordinator
        .invite_expired(&posting.id, &owner())
        .expect("sweep");
    assert_eq!(swept.value, vec![user("ana")]);
    assert_eq!(sink.count(&user("ben"), NotificationKind::InviteReceived), 1);

    let record = coordinator.posting(&posting.id).expect("posting");
    assert_eq!(response_of(&record, "ana"), InviteeResponse::TimedOut);
    assert_eq!(response_of(&record, "ben"), InviteeResponse::Awaiting);

    clock.advance(Duration::hours(48));
    coordinator
        .invite_expired(&posting.id, &owner())
        .expect("sweep");
    let record = coordinator.posting(&posting.id).expect("posting");
    assert_eq!(record.friend_asks[0].status, FriendAskStatus::Exhausted);
    assert_eq!(sink.count(&owner(), NotificationKind::InviteExhausted), 1);
}

#[test]
fn parallel_timeout_exhausts_the_set() {
    let (coordinator, _, sink, clock) = build_coordinator();
    let posting = friend_posting(&coordinator, 2);
    coordinator
        .invite_created(&owner(), ask(&posting.id, &["ana", "ben"], InviteMode::Parallel))
        .expect("create");

    clock.advance(Duration::hours(48));
    let swept = coordinator
        .invite_expired(&posting.id, &owner())
        .expect("sweep");

    assert_eq!(swept.value.len(), 2);
    assert_eq!(sink.count(&owner(), NotificationKind::InviteExhausted), 1);
}

#[test]
fn retired_posting_freezes_a_pending_set() {
    let (coordinator, _, sink, clock) = build_coordinator();
    let posting = friend_posting(&coordinator, 2);
    coordinator
        .invite_created(&owner(), ask(&posting.id, &["ana", "ben"], InviteMode::Sequential))
        .expect("create");
    coordinator
        .posting_retired(&posting.id, &owner(), Retirement::Closed)
        .expect("close");

    match coordinator.invite_responded(&posting.id, &user("ana"), InviteAction::Decline) {
        Err(FulfillmentError::Closed(PostingStatus::Closed)) => {}
        other => panic!("expected closed, got {other:?}"),
    }
    match coordinator.invite_responded(&posting.id, &user("ana"), InviteAction::Accept) {
        Err(FulfillmentError::Closed(PostingStatus::Closed)) => {}
        other => panic!("expected closed, got {other:?}"),
    }

    clock.advance(Duration::hours(49));
    match coordinator.invite_expired(&posting.id, &owner()) {
        Err(FulfillmentError::Closed(PostingStatus::Closed)) => {}
        other => panic!("expected closed, got {other:?}"),
    }

    assert_eq!(sink.count(&user("ben"), NotificationKind::InviteReceived), 0);
    assert_eq!(sink.count(&owner(), NotificationKind::InviteExhausted), 0);
    let record = coordinator.posting(&posting.id).expect("posting");
    assert_eq!(response_of(&record, "ana"), InviteeResponse::Awaiting);
    assert_eq!(record.friend_asks[0].current_request_index, 0);
    assert!(record.view().active_invite.is_none());
}

#[test]
fn only_owner_may_sweep() {
    let (coordinator, _, _, _) = build_coordinator();
    let posting = friend_posting(&coordinator, 2);

    assert!(matches!(
        coordinator.invite_expired(&posting.id, &user("ana")),
        Err(FulfillmentError::Forbidden(_))
    ));
    assert_eq!(
        coordinator.posting(&posting.id).expect("posting").posting.mode,
        PostingMode::FriendAsk
    );
}
