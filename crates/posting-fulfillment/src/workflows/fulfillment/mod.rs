//! Posting fulfillment: who holds the limited slots on a posting, in what order, and how
//! freed capacity reaches waiting candidates.
//!
//! Open-mode postings admit through applications, a capacity ledger, and a FIFO waitlist.
//! Friend-ask postings fill through an owner-ranked invitation chain. Every mutation runs
//! inside the store's per-posting unit of work and reports notifications through an outbox
//! that is delivered only after commit.

pub mod applications;
pub mod clock;
pub mod coordinator;
pub mod domain;
pub mod error;
pub mod invites;
pub mod ledger;
pub mod memory;
pub mod notifications;
pub mod repository;
pub mod router;
pub mod waitlist;

#[cfg(test)]
mod tests;

pub use applications::Withdrawal;
pub use clock::{Clock, ManualClock, SystemClock};
pub use coordinator::{FulfillmentCoordinator, Handled};
pub use domain::{
    Application, ApplicationId, ApplicationStatus, Decision, FriendAsk, FriendAskId,
    FriendAskStatus, InviteAction, InviteMode, InviteeResponse, InviteeState, NewFriendAsk,
    NewPosting, Posting, PostingId, PostingMode, PostingStatus, Retirement, UserId,
};
pub use error::FulfillmentError;
pub use memory::InMemoryFulfillmentStore;
pub use notifications::{
    DispatchReport, Notification, NotificationKind, NotificationSink, NotifyError, Outbox,
};
pub use repository::{
    ApplicationView, FulfillmentStore, InviteSummary, PostingRecord, PostingView,
    RepositoryError,
};
pub use router::fulfillment_router;
pub use waitlist::PromotionOutcome;
