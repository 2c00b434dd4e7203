use serde::{Deserialize, Serialize};

use super::domain::{
    Application, ApplicationId, ApplicationStatus, FriendAsk, FriendAskStatus, Posting,
    PostingId, UserId,
};
use super::error::FulfillmentError;
use super::ledger;

/// Everything that shares one posting's atomicity boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostingRecord {
    pub posting: Posting,
    pub applications: Vec<Application>,
    pub friend_asks: Vec<FriendAsk>,
}

impl PostingRecord {
    pub fn new(posting: Posting) -> Self {
        Self {
            posting,
            applications: Vec::new(),
            friend_asks: Vec::new(),
        }
    }

    pub fn application(&self, id: &ApplicationId) -> Option<&Application> {
        self.applications.iter().find(|application| &application.id == id)
    }

    pub(crate) fn application_mut(&mut self, id: &ApplicationId) -> Option<&mut Application> {
        self.applications
            .iter_mut()
            .find(|application| &application.id == id)
    }

    pub fn application_for(&self, applicant: &UserId) -> Option<&Application> {
        self.applications
            .iter()
            .find(|application| &application.applicant_id == applicant)
    }

    /// The invite set currently blocking a new one, if any.
    pub fn active_friend_ask(&self) -> Option<&FriendAsk> {
        self.friend_asks.iter().find(|ask| ask.status.is_active())
    }

    pub(crate) fn pending_friend_ask_mut(&mut self) -> Option<&mut FriendAsk> {
        self.friend_asks
            .iter_mut()
            .find(|ask| ask.status == FriendAskStatus::Pending)
    }

    pub fn count_with_status(&self, status: ApplicationStatus) -> usize {
        self.applications
            .iter()
            .filter(|application| application.status == status)
            .count()
    }

    pub fn view(&self) -> PostingView {
        // A pending set on a retired posting is frozen, not live.
        let retired = self.posting.status.is_retired();
        let active_invite = self
            .active_friend_ask()
            .filter(|ask| !(retired && ask.status == FriendAskStatus::Pending))
            .map(|ask| InviteSummary {
                friend_ask_id: ask.id.0.clone(),
                status: ask.status.label(),
                awaiting: ask.awaiting().cloned().collect(),
                accepted_by: ask.accepted_by.clone(),
            });

        PostingView {
            posting_id: self.posting.id.clone(),
            creator_id: self.posting.creator_id.clone(),
            title: self.posting.title.clone(),
            status: self.posting.status.label(),
            mode: self.posting.mode.label(),
            auto_accept: self.posting.auto_accept,
            team_size_min: self.posting.team_size_min,
            team_size_max: self.posting.team_size_max,
            accepted: ledger::accepted_count(self),
            waitlisted: self.count_with_status(ApplicationStatus::Waitlisted),
            pending: self.count_with_status(ApplicationStatus::Pending),
            active_invite,
        }
    }
}

/// Storage abstraction providing one serialized unit of work per posting.
pub trait FulfillmentStore: Send + Sync {
    fn insert_posting(&self, record: PostingRecord) -> Result<PostingRecord, RepositoryError>;
    fn fetch(&self, id: &PostingId) -> Result<Option<PostingRecord>, RepositoryError>;
    /// Resolve which posting owns an application.
    fn locate_application(&self, id: &ApplicationId)
        -> Result<Option<PostingId>, RepositoryError>;

    /// Run `work` against the posting with every other unit of work on the same posting
    /// excluded. Changes are committed only when `work` returns `Ok`.
    fn transact<T, F>(&self, id: &PostingId, work: F) -> Result<T, FulfillmentError>
    where
        F: FnOnce(&mut PostingRecord) -> Result<T, FulfillmentError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Summary of the open invite set on a posting.
#[derive(Debug, Clone, Serialize)]
pub struct InviteSummary {
    pub friend_ask_id: String,
    pub status: &'static str,
    pub awaiting: Vec<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_by: Option<UserId>,
}

/// Sanitized representation of a posting's fulfillment state.
#[derive(Debug, Clone, Serialize)]
pub struct PostingView {
    pub posting_id: PostingId,
    pub creator_id: UserId,
    pub title: String,
    pub status: &'static str,
    pub mode: &'static str,
    pub auto_accept: bool,
    pub team_size_min: u32,
    pub team_size_max: u32,
    pub accepted: u32,
    pub waitlisted: usize,
    pub pending: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_invite: Option<InviteSummary>,
}

/// Sanitized representation of an application's exposed status.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationView {
    pub application_id: ApplicationId,
    pub posting_id: PostingId,
    pub applicant_id: UserId,
    pub status: &'static str,
    pub submitted_at: String,
}

impl From<&Application> for ApplicationView {
    fn from(application: &Application) -> Self {
        Self {
            application_id: application.id.clone(),
            posting_id: application.posting_id.clone(),
            applicant_id: application.applicant_id.clone(),
            status: application.status.label(),
            submitted_at: application.created_at.to_rfc3339(),
        }
    }
}
