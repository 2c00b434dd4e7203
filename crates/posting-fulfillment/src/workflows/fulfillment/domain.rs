use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Identifier of a platform user (owner, applicant, or invitee).
    UserId
);
string_id!(
    /// Identifier of a posting.
    PostingId
);
string_id!(
    /// Identifier wrapper for submitted applications.
    ApplicationId
);
string_id!(FriendAskId);

/// Availability of a posting. Only `Open` and `Filled` are ever derived from capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostingStatus {
    Open,
    Filled,
    Closed,
    Expired,
}

impl PostingStatus {
    pub const fn label(self) -> &'static str {
        match self {
            PostingStatus::Open => "open",
            PostingStatus::Filled => "filled",
            PostingStatus::Closed => "closed",
            PostingStatus::Expired => "expired",
        }
    }

    pub const fn is_retired(self) -> bool {
        matches!(self, PostingStatus::Closed | PostingStatus::Expired)
    }
}

/// Which admission track a posting runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostingMode {
    Open,
    FriendAsk,
}

impl PostingMode {
    pub const fn label(self) -> &'static str {
        match self {
            PostingMode::Open => "open",
            PostingMode::FriendAsk => "friend_ask",
        }
    }
}

/// Capacity-bounded project ask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub id: PostingId,
    pub creator_id: UserId,
    pub title: String,
    pub team_size_min: u32,
    pub team_size_max: u32,
    pub status: PostingStatus,
    pub mode: PostingMode,
    pub auto_accept: bool,
    pub created_at: DateTime<Utc>,
}

/// Owner-supplied fields for a new posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPosting {
    pub title: String,
    pub team_size_min: u32,
    pub team_size_max: u32,
    pub mode: PostingMode,
    #[serde(default)]
    pub auto_accept: bool,
}

/// Terminal states an owner can move a posting into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Retirement {
    Closed,
    Expired,
}

impl From<Retirement> for PostingStatus {
    fn from(value: Retirement) -> Self {
        match value {
            Retirement::Closed => PostingStatus::Closed,
            Retirement::Expired => PostingStatus::Expired,
        }
    }
}

/// Lifecycle of one candidate's request to join an open-mode posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
    Waitlisted,
    Withdrawn,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Waitlisted => "waitlisted",
            ApplicationStatus::Withdrawn => "withdrawn",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, ApplicationStatus::Rejected | ApplicationStatus::Withdrawn)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub posting_id: PostingId,
    pub applicant_id: UserId,
    pub status: ApplicationStatus,
    pub message: String,
    pub created_at: DateTime<Utc>,
    /// Insertion order; breaks ties between identical timestamps.
    pub sequence: u64,
    pub updated_at: DateTime<Utc>,
}

/// Owner verdict on a pending or waitlisted application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Accept,
    Reject,
    Waitlist,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteMode {
    Sequential,
    Parallel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FriendAskStatus {
    Pending,
    Accepted,
    Exhausted,
}

impl FriendAskStatus {
    pub const fn label(self) -> &'static str {
        match self {
            FriendAskStatus::Pending => "pending",
            FriendAskStatus::Accepted => "accepted",
            FriendAskStatus::Exhausted => "exhausted",
        }
    }

    /// Active invite sets block a second one on the same posting. An accepted set stays
    /// active for good, so a friend-ask posting admits at most one invited participant
    /// whatever its `team_size_max`.
    pub const fn is_active(self) -> bool {
        matches!(self, FriendAskStatus::Pending | FriendAskStatus::Accepted)
    }
}

/// Where a single invitee stands within an invite set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteeResponse {
    /// Listed but not yet asked (sequential mode only).
    Queued,
    Awaiting,
    Accepted,
    Declined,
    TimedOut,
    /// Someone else accepted first.
    Superseded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteeState {
    pub user_id: UserId,
    pub response: InviteeResponse,
    pub asked_at: Option<DateTime<Utc>>,
    pub responded_at: Option<DateTime<Utc>>,
}

/// Owner-curated invitation workflow for a friend-ask posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendAsk {
    pub id: FriendAskId,
    pub posting_id: PostingId,
    pub creator_id: UserId,
    pub ordered_friend_list: Vec<UserId>,
    pub current_request_index: usize,
    pub invite_mode: InviteMode,
    pub status: FriendAskStatus,
    pub invitees: Vec<InviteeState>,
    pub accepted_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl FriendAsk {
    /// Invitees currently allowed to respond.
    pub fn awaiting(&self) -> impl Iterator<Item = &UserId> {
        self.invitees
            .iter()
            .filter(|invitee| invitee.response == InviteeResponse::Awaiting)
            .map(|invitee| &invitee.user_id)
    }

    pub fn is_awaiting(&self, user_id: &UserId) -> bool {
        self.status == FriendAskStatus::Pending && self.awaiting().any(|id| id == user_id)
    }
}

/// Owner-supplied fields for a new invite set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFriendAsk {
    pub posting_id: PostingId,
    pub ordered_friend_list: Vec<UserId>,
    pub invite_mode: InviteMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteAction {
    Accept,
    Decline,
}
