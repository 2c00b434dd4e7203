use chrono::{Duration, Utc};
use clap::Args;
use posting_fulfillment::config::FulfillmentConfig;
use posting_fulfillment::error::AppError;
use posting_fulfillment::workflows::fulfillment::{
    Decision, FulfillmentCoordinator, InMemoryFulfillmentStore, InviteAction, InviteMode,
    ManualClock, NewFriendAsk, NewPosting, Notification, NotificationSink, NotifyError,
    PostingId, PostingMode, PromotionOutcome, UserId,
};
use posting_fulfillment::workflows::scoring::{
    ScoreBreakdown, ScoredCandidate, UnknownScorePolicy,
};
use std::sync::{Arc, Mutex};

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Team size for the open-admission posting.
    #[arg(long, default_value_t = 2)]
    pub(crate) capacity: u32,
    /// Leave waitlist promotion to the owner instead of promoting automatically.
    #[arg(long)]
    pub(crate) manual_promotion: bool,
    /// Rescale known sub-scores instead of counting unknown ones as zero.
    #[arg(long)]
    pub(crate) renormalize: bool,
    /// Skip the friend-ask portion of the demo.
    #[arg(long)]
    pub(crate) skip_friend_ask: bool,
}

/// Keeps every delivery so the demo can print the outbox after each step.
#[derive(Default)]
struct TranscriptSink {
    delivered: Mutex<Vec<Notification>>,
}

impl TranscriptSink {
    fn drain(&self) -> Vec<Notification> {
        match self.delivered.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl NotificationSink for TranscriptSink {
    fn emit(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.delivered
            .lock()
            .map_err(|_| NotifyError::Transport("transcript poisoned".to_string()))?
            .push(notification.clone());
        Ok(())
    }
}

type DemoCoordinator = FulfillmentCoordinator<InMemoryFulfillmentStore, TranscriptSink>;

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        capacity,
        manual_promotion,
        renormalize,
        skip_friend_ask,
    } = args;

    let config = FulfillmentConfig {
        score_policy: if renormalize {
            UnknownScorePolicy::Renormalize
        } else {
            UnknownScorePolicy::TreatAsZero
        },
        ..FulfillmentConfig::default()
    };
    let sink = Arc::new(TranscriptSink::default());
    let clock = Arc::new(ManualClock::starting_at(Utc::now()));
    let coordinator = FulfillmentCoordinator::with_clock(
        Arc::new(InMemoryFulfillmentStore::default()),
        sink.clone(),
        clock.clone(),
        config,
    );
    let owner = UserId::from("owner-demo");

    println!("Posting fulfillment demo");
    run_open_admission(&coordinator, &sink, &owner, capacity.max(1), !manual_promotion)?;

    if skip_friend_ask {
        return Ok(());
    }

    println!("\nFriend-ask chain");
    let posting = coordinator.posting_created(
        &owner,
        NewPosting {
            title: "Trail run buddy".to_string(),
            team_size_min: 1,
            team_size_max: 1,
            mode: PostingMode::FriendAsk,
            auto_accept: false,
        },
    )?;
    let friends = ["jun", "amara", "theo"].map(UserId::from).to_vec();
    let ask = coordinator.invite_created(
        &owner,
        NewFriendAsk {
            posting_id: posting.id.clone(),
            ordered_friend_list: friends,
            invite_mode: InviteMode::Sequential,
        },
    )?;
    println!("- Friend-ask {} sent in order jun -> amara -> theo", ask.value.id);
    print_outbox(&sink);

    coordinator.invite_responded(&posting.id, &UserId::from("jun"), InviteAction::Decline)?;
    println!("- jun declined");
    print_outbox(&sink);

    clock.advance(coordinator.config().invite_window() + Duration::minutes(1));
    let swept = coordinator.invite_expired(&posting.id, &owner)?;
    let names: Vec<&str> = swept.value.iter().map(UserId::as_str).collect();
    println!("- Response window lapsed for: {}", names.join(", "));
    print_outbox(&sink);

    let accepted =
        coordinator.invite_responded(&posting.id, &UserId::from("theo"), InviteAction::Accept)?;
    println!(
        "- theo accepted; friend-ask is now {}",
        accepted.value.status.label()
    );
    print_outbox(&sink);
    print_posting(&coordinator, &posting.id)?;

    Ok(())
}

fn run_open_admission(
    coordinator: &DemoCoordinator,
    sink: &TranscriptSink,
    owner: &UserId,
    capacity: u32,
    auto_accept: bool,
) -> Result<(), AppError> {
    let posting = coordinator.posting_created(
        owner,
        NewPosting {
            title: "Hackathon team: accessible transit map".to_string(),
            team_size_min: 1,
            team_size_max: capacity,
            mode: PostingMode::Open,
            auto_accept,
        },
    )?;
    println!(
        "- Posting {} opened for {} (auto-accept {})",
        posting.id, capacity, auto_accept
    );

    let applicants: Vec<UserId> = (0..=capacity)
        .map(|n| UserId(format!("applicant-{:02}", n + 1)))
        .collect();

    let ranked = coordinator.scorer().rank(
        applicants
            .iter()
            .enumerate()
            .map(|(position, user_id)| ScoredCandidate {
                user_id: user_id.clone(),
                breakdown: demo_breakdown(position),
            })
            .collect(),
    );
    println!(
        "  Ranked candidates ({} policy):",
        coordinator.scorer().policy().label()
    );
    for candidate in &ranked {
        println!("    - {} -> {:.3}", candidate.user_id, candidate.score);
    }

    let mut application_ids = Vec::new();
    for candidate in &ranked {
        let handled = coordinator.application_submitted(
            &posting.id,
            &candidate.user_id,
            "Happy to help".to_string(),
        )?;
        application_ids.push(handled.value.id);
    }
    print_outbox(sink);

    let (accepted, overflow) = application_ids.split_at(application_ids.len() - 1);
    for id in accepted {
        coordinator.application_decided(id, owner, Decision::Accept)?;
    }
    for id in overflow {
        coordinator.application_decided(id, owner, Decision::Waitlist)?;
    }
    println!("- Accepted {} and waitlisted {}", accepted.len(), overflow.len());
    print_outbox(sink);
    print_posting(coordinator, &posting.id)?;

    let leaving = coordinator.application(&accepted[0])?;
    let withdrawal = coordinator.application_withdrawn(&leaving.id, &leaving.applicant_id)?;
    println!("- {} withdrew", leaving.applicant_id);
    match withdrawal.value.promotion {
        Some(PromotionOutcome::Promoted(id)) => println!("  Waitlist promoted {id}"),
        Some(PromotionOutcome::OwnerNotified(id)) => {
            println!("  Owner asked to review waitlisted {id}")
        }
        Some(other) => println!("  Freed slot outcome: {other:?}"),
        None => println!("  No slot freed"),
    }
    print_outbox(sink);
    print_posting(coordinator, &posting.id)
}

fn demo_breakdown(position: usize) -> ScoreBreakdown {
    let step = position as f64 * 0.1;
    ScoreBreakdown {
        semantic: Some((0.9 - step).max(0.0)),
        availability: Some(0.7),
        skill_level: (position % 2 == 0).then_some(0.8),
        location: Some((0.5 + step).min(1.0)),
    }
}

fn print_outbox(sink: &TranscriptSink) {
    let delivered = sink.drain();
    if delivered.is_empty() {
        println!("  Notifications: none");
        return;
    }
    println!("  Notifications:");
    for notification in delivered {
        match &notification.application_id {
            Some(application_id) => println!(
                "    - {} -> {} ({})",
                notification.kind.template(),
                notification.recipient,
                application_id
            ),
            None => println!(
                "    - {} -> {}",
                notification.kind.template(),
                notification.recipient
            ),
        }
    }
}

fn print_posting(coordinator: &DemoCoordinator, posting_id: &PostingId) -> Result<(), AppError> {
    let view = coordinator.posting(posting_id)?.view();
    match serde_json::to_string_pretty(&view) {
        Ok(json) => println!("  Posting snapshot:\n{json}"),
        Err(err) => println!("  Posting snapshot unavailable: {err}"),
    }
    Ok(())
}
