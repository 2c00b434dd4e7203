use std::sync::{Arc, Mutex};

use axum::http::StatusCode;
use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::config::FulfillmentConfig;
use crate::workflows::fulfillment::clock::ManualClock;
use crate::workflows::fulfillment::domain::{
    ApplicationId, NewPosting, Posting, PostingId, PostingMode, PostingStatus, UserId,
};
use crate::workflows::fulfillment::error::FulfillmentError;
use crate::workflows::fulfillment::memory::InMemoryFulfillmentStore;
use crate::workflows::fulfillment::notifications::{
    Notification, NotificationKind, NotificationSink, NotifyError,
};
use crate::workflows::fulfillment::repository::{
    FulfillmentStore, PostingRecord, RepositoryError,
};
use crate::workflows::fulfillment::{fulfillment_router, FulfillmentCoordinator};

pub(super) type TestCoordinator = FulfillmentCoordinator<InMemoryFulfillmentStore, MemorySink>;

pub(super) fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 6, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn owner() -> UserId {
    UserId::from("owner-olive")
}

pub(super) fn user(name: &str) -> UserId {
    UserId::from(name)
}

pub(super) fn build_coordinator() -> (
    TestCoordinator,
    Arc<InMemoryFulfillmentStore>,
    Arc<MemorySink>,
    Arc<ManualClock>,
) {
    build_coordinator_with(FulfillmentConfig::default())
}

pub(super) fn build_coordinator_with(
    config: FulfillmentConfig,
) -> (
    TestCoordinator,
    Arc<InMemoryFulfillmentStore>,
    Arc<MemorySink>,
    Arc<ManualClock>,
) {
    let store = Arc::new(InMemoryFulfillmentStore::default());
    let sink = Arc::new(MemorySink::default());
    let clock = Arc::new(ManualClock::starting_at(start()));
    let coordinator =
        FulfillmentCoordinator::with_clock(store.clone(), sink.clone(), clock.clone(), config);
    (coordinator, store, sink, clock)
}

pub(super) fn new_posting(max: u32, mode: PostingMode, auto_accept: bool) -> NewPosting {
    NewPosting {
        title: "Community garden app".to_string(),
        team_size_min: 1,
        team_size_max: max,
        mode,
        auto_accept,
    }
}

pub(super) fn open_posting(coordinator: &TestCoordinator, max: u32, auto_accept: bool) -> Posting {
    coordinator
        .posting_created(&owner(), new_posting(max, PostingMode::Open, auto_accept))
        .expect("posting created")
}

pub(super) fn friend_posting(coordinator: &TestCoordinator, max: u32) -> Posting {
    coordinator
        .posting_created(&owner(), new_posting(max, PostingMode::FriendAsk, false))
        .expect("posting created")
}

pub(super) fn apply(
    coordinator: &TestCoordinator,
    posting_id: &PostingId,
    applicant: &str,
) -> ApplicationId {
    coordinator
        .application_submitted(posting_id, &user(applicant), format!("{applicant} here"))
        .expect("application submitted")
        .value
        .id
}

pub(super) fn status_of(coordinator: &TestCoordinator, posting_id: &PostingId) -> PostingStatus {
    coordinator
        .posting(posting_id)
        .expect("posting present")
        .posting
        .status
}

/// Sink that remembers every delivery.
#[derive(Default, Clone)]
pub(super) struct MemorySink {
    events: Arc<Mutex<Vec<Notification>>>,
}

impl MemorySink {
    pub(super) fn events(&self) -> Vec<Notification> {
        self.events.lock().expect("sink mutex poisoned").clone()
    }

    pub(super) fn count(&self, recipient: &UserId, kind: NotificationKind) -> usize {
        self.events()
            .iter()
            .filter(|event| &event.recipient == recipient && event.kind == kind)
            .count()
    }
}

impl NotificationSink for MemorySink {
    fn emit(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.events
            .lock()
            .expect("sink mutex poisoned")
            .push(notification.clone());
        Ok(())
    }
}

/// Sink whose transport is always down.
#[derive(Default, Clone)]
pub(super) struct BrokenSink;

impl NotificationSink for BrokenSink {
    fn emit(&self, _notification: &Notification) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("push gateway offline".to_string()))
    }
}

/// Store that cannot be reached.
pub(super) struct UnavailableStore;

impl FulfillmentStore for UnavailableStore {
    fn insert_posting(&self, _record: PostingRecord) -> Result<PostingRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &PostingId) -> Result<Option<PostingRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn locate_application(
        &self,
        _id: &ApplicationId,
    ) -> Result<Option<PostingId>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn transact<T, F>(&self, _id: &PostingId, _work: F) -> Result<T, FulfillmentError>
    where
        F: FnOnce(&mut PostingRecord) -> Result<T, FulfillmentError>,
    {
        Err(RepositoryError::Unavailable("database offline".to_string()).into())
    }
}

pub(super) fn router_with(coordinator: TestCoordinator) -> axum::Router {
    fulfillment_router(Arc::new(coordinator))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn assert_status(response: &Response, expected: StatusCode) {
    assert_eq!(response.status(), expected);
}
