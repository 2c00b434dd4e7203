use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use super::applications::{self, Withdrawal};
use super::clock::{Clock, SystemClock};
use super::domain::{
    Application, ApplicationId, Decision, FriendAsk, InviteAction, NewFriendAsk, NewPosting,
    Posting, PostingId, PostingStatus, Retirement, UserId,
};
use super::error::FulfillmentError;
use super::invites;
use super::ledger;
use super::notifications::{dispatch, DispatchReport, Notification, NotificationSink, Outbox};
use super::repository::{FulfillmentStore, PostingRecord};
use crate::config::FulfillmentConfig;
use crate::workflows::scoring::ScoreCombiner;

static POSTING_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Result of an event plus the notifications it produced.
#[derive(Debug, Clone)]
pub struct Handled<T> {
    pub value: T,
    pub notifications: Vec<Notification>,
    pub dispatch: DispatchReport,
}

/// Single entry point per inbound event. Owns no state beyond its collaborators.
pub struct FulfillmentCoordinator<S, N> {
    store: Arc<S>,
    sink: Arc<N>,
    clock: Arc<dyn Clock>,
    config: FulfillmentConfig,
    scorer: ScoreCombiner,
}

impl<S, N> FulfillmentCoordinator<S, N>
where
    S: FulfillmentStore + 'static,
    N: NotificationSink + 'static,
{
    pub fn new(store: Arc<S>, sink: Arc<N>, config: FulfillmentConfig) -> Self {
        Self::with_clock(store, sink, Arc::new(SystemClock), config)
    }

    pub fn with_clock(
        store: Arc<S>,
        sink: Arc<N>,
        clock: Arc<dyn Clock>,
        config: FulfillmentConfig,
    ) -> Self {
        Self {
            store,
            sink,
            clock,
            scorer: ScoreCombiner::new(config.score_policy),
            config,
        }
    }

    pub fn scorer(&self) -> &ScoreCombiner {
        &self.scorer
    }

    pub fn config(&self) -> &FulfillmentConfig {
        &self.config
    }

    /// Register a new posting. It starts `open` with nobody accepted.
    pub fn posting_created(
        &self,
        requester: &UserId,
        new_posting: NewPosting,
    ) -> Result<Posting, FulfillmentError> {
        let NewPosting {
            title,
            team_size_min,
            team_size_max,
            mode,
            auto_accept,
        } = new_posting;

        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(FulfillmentError::Validation(
                "title must not be empty".to_string(),
            ));
        }
        if team_size_min == 0 || team_size_max == 0 {
            return Err(FulfillmentError::Validation(
                "team sizes must be at least 1".to_string(),
            ));
        }
        if team_size_min > team_size_max {
            return Err(FulfillmentError::Validation(format!(
                "team_size_min {team_size_min} exceeds team_size_max {team_size_max}"
            )));
        }

        let sequence = POSTING_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let posting = Posting {
            id: PostingId(format!("post-{sequence:06}")),
            creator_id: requester.clone(),
            title,
            team_size_min,
            team_size_max,
            status: PostingStatus::Open,
            mode,
            auto_accept,
            created_at: self.clock.now(),
        };

        let stored = self.store.insert_posting(PostingRecord::new(posting))?;
        info!(
            posting = %stored.posting.id,
            owner = %requester,
            mode = stored.posting.mode.label(),
            capacity = stored.posting.team_size_max,
            "posting created"
        );
        Ok(stored.posting)
    }

    pub fn application_submitted(
        &self,
        posting_id: &PostingId,
        applicant: &UserId,
        message: String,
    ) -> Result<Handled<Application>, FulfillmentError> {
        self.run(posting_id, "application_submitted", false, |record, now, outbox| {
            applications::submit(record, applicant, message, now, outbox)
        })
    }

    pub fn application_decided(
        &self,
        application_id: &ApplicationId,
        requester: &UserId,
        decision: Decision,
    ) -> Result<Handled<Application>, FulfillmentError> {
        let posting_id = self.locate(application_id)?;
        self.run(&posting_id, "application_decided", true, |record, now, outbox| {
            applications::decide(record, application_id, requester, decision, now, outbox)
        })
    }

    pub fn application_withdrawn(
        &self,
        application_id: &ApplicationId,
        requester: &UserId,
    ) -> Result<Handled<Withdrawal>, FulfillmentError> {
        let posting_id = self.locate(application_id)?;
        self.run(&posting_id, "application_withdrawn", true, |record, now, outbox| {
            applications::withdraw(record, application_id, requester, now, outbox)
        })
    }

    pub fn invite_created(
        &self,
        requester: &UserId,
        new_ask: NewFriendAsk,
    ) -> Result<Handled<FriendAsk>, FulfillmentError> {
        let NewFriendAsk {
            posting_id,
            ordered_friend_list,
            invite_mode,
        } = new_ask;
        self.run(&posting_id, "invite_created", false, |record, now, outbox| {
            invites::create(record, requester, ordered_friend_list, invite_mode, now, outbox)
        })
    }

    pub fn invite_responded(
        &self,
        posting_id: &PostingId,
        responder: &UserId,
        action: InviteAction,
    ) -> Result<Handled<FriendAsk>, FulfillmentError> {
        self.run(posting_id, "invite_responded", true, |record, now, outbox| {
            invites::respond(record, responder, action, now, outbox)
        })
    }

    /// Sweep invitees who let the response window lapse.
    pub fn invite_expired(
        &self,
        posting_id: &PostingId,
        requester: &UserId,
    ) -> Result<Handled<Vec<UserId>>, FulfillmentError> {
        let window = self.config.invite_window();
        self.run(posting_id, "invite_expired", false, |record, now, outbox| {
            require_owner(record, requester)?;
            invites::expire_stale(record, window, now, outbox)
        })
    }

    /// Owner takes the posting off the market.
    pub fn posting_retired(
        &self,
        posting_id: &PostingId,
        requester: &UserId,
        retirement: Retirement,
    ) -> Result<Handled<Posting>, FulfillmentError> {
        self.run(posting_id, "posting_retired", false, |record, _now, _outbox| {
            require_owner(record, requester)?;
            if record.posting.status.is_retired() {
                return Err(FulfillmentError::Closed(record.posting.status));
            }
            record.posting.status = retirement.into();
            Ok(record.posting.clone())
        })
    }

    pub fn posting(&self, posting_id: &PostingId) -> Result<PostingRecord, FulfillmentError> {
        self.store
            .fetch(posting_id)?
            .ok_or_else(|| FulfillmentError::NotFound(format!("posting {posting_id}")))
    }

    pub fn application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Application, FulfillmentError> {
        let posting_id = self.locate(application_id)?;
        self.posting(&posting_id)?
            .application(application_id)
            .cloned()
            .ok_or_else(|| FulfillmentError::NotFound(format!("application {application_id}")))
    }

    fn locate(&self, application_id: &ApplicationId) -> Result<PostingId, FulfillmentError> {
        self.store
            .locate_application(application_id)?
            .ok_or_else(|| FulfillmentError::NotFound(format!("application {application_id}")))
    }

    /// One unit of work: run the operation under the posting's lock, reconcile when capacity
    /// may have moved, commit, then deliver the outbox.
    fn run<T, F>(
        &self,
        posting_id: &PostingId,
        event: &'static str,
        reconcile: bool,
        work: F,
    ) -> Result<Handled<T>, FulfillmentError>
    where
        F: FnOnce(&mut PostingRecord, DateTime<Utc>, &mut Outbox) -> Result<T, FulfillmentError>,
    {
        let now = self.clock.now();
        let mut outbox = Outbox::new();

        let value = self.store.transact(posting_id, |record| {
            let value = work(record, now, &mut outbox)?;
            if reconcile {
                ledger::reconcile_posting_status(record);
            }
            Ok(value)
        })?;

        let notifications = outbox.into_records();
        let report = dispatch(self.sink.as_ref(), &notifications);
        info!(
            posting = %posting_id,
            event,
            notifications = notifications.len(),
            failed = report.failed,
            "fulfillment event handled"
        );

        Ok(Handled {
            value,
            notifications,
            dispatch: report,
        })
    }
}

fn require_owner(record: &PostingRecord, requester: &UserId) -> Result<(), FulfillmentError> {
    if &record.posting.creator_id == requester {
        Ok(())
    } else {
        Err(FulfillmentError::Forbidden(
            "only the posting owner can manage this posting".to_string(),
        ))
    }
}
