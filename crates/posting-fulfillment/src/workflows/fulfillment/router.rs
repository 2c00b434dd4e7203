use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::coordinator::FulfillmentCoordinator;
use super::domain::{
    ApplicationId, Decision, InviteAction, InviteMode, NewFriendAsk, NewPosting, PostingId,
    Retirement, UserId,
};
use super::error::FulfillmentError;
use super::notifications::NotificationSink;
use super::repository::{ApplicationView, FulfillmentStore};
use super::waitlist::PromotionOutcome;
use crate::workflows::scoring::ScoredCandidate;

/// Header carrying the caller identity established by the upstream session layer.
pub const CALLER_HEADER: &str = "x-user-id";

/// Router builder exposing the posting, application, and friend-ask endpoints.
pub fn fulfillment_router<S, N>(coordinator: Arc<FulfillmentCoordinator<S, N>>) -> Router
where
    S: FulfillmentStore + 'static,
    N: NotificationSink + 'static,
{
    Router::new()
        .route("/postings", post(create_posting_handler::<S, N>))
        .route("/postings/:posting_id", get(posting_handler::<S, N>))
        .route(
            "/postings/:posting_id/retire",
            post(retire_posting_handler::<S, N>),
        )
        .route("/applications", post(submit_handler::<S, N>))
        .route(
            "/applications/:application_id",
            get(application_handler::<S, N>).patch(update_application_handler::<S, N>),
        )
        .route("/friend-ask", post(create_friend_ask_handler::<S, N>))
        .route(
            "/sequential-invite/respond",
            post(respond_invite_handler::<S, N>),
        )
        .route(
            "/sequential-invite/expire",
            post(expire_invite_handler::<S, N>),
        )
        .route("/scores/rank", post(rank_handler::<S, N>))
        .with_state(coordinator)
}

type SharedCoordinator<S, N> = State<Arc<FulfillmentCoordinator<S, N>>>;

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitApplicationRequest {
    pub(crate) posting_id: PostingId,
    #[serde(default)]
    pub(crate) message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpdateApplicationRequest {
    pub(crate) status: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateFriendAskRequest {
    pub(crate) posting_id: PostingId,
    #[serde(default)]
    pub(crate) ordered_friend_list: Vec<UserId>,
    #[serde(default = "default_invite_mode")]
    pub(crate) invite_mode: InviteMode,
}

fn default_invite_mode() -> InviteMode {
    InviteMode::Sequential
}

#[derive(Debug, Deserialize)]
pub(crate) struct RespondInviteRequest {
    #[serde(rename = "postingId")]
    pub(crate) posting_id: PostingId,
    pub(crate) action: InviteAction,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExpireInviteRequest {
    #[serde(rename = "postingId")]
    pub(crate) posting_id: PostingId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RetirePostingRequest {
    #[serde(default = "default_retirement")]
    pub(crate) status: Retirement,
}

fn default_retirement() -> Retirement {
    Retirement::Closed
}

#[derive(Debug, Deserialize)]
pub(crate) struct RankRequest {
    pub(crate) candidates: Vec<ScoredCandidate>,
}

/// HTTP status for each failure category.
pub fn status_for(error: &FulfillmentError) -> StatusCode {
    match error {
        FulfillmentError::Validation(_) => StatusCode::BAD_REQUEST,
        FulfillmentError::Forbidden(_) => StatusCode::FORBIDDEN,
        FulfillmentError::NotFound(_) => StatusCode::NOT_FOUND,
        FulfillmentError::Duplicate
        | FulfillmentError::Conflict(_)
        | FulfillmentError::CapacityExceeded
        | FulfillmentError::Closed(_)
        | FulfillmentError::InvalidTransition { .. } => StatusCode::CONFLICT,
        FulfillmentError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: FulfillmentError) -> Response {
    let payload = json!({
        "error": error.to_string(),
        "code": error.code(),
    });
    (status_for(&error), Json(payload)).into_response()
}

fn bad_request(message: String) -> Response {
    error_response(FulfillmentError::Validation(message))
}

fn authenticate(headers: &HeaderMap) -> Result<UserId, Response> {
    headers
        .get(CALLER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(UserId::from)
        .ok_or_else(|| {
            let payload = json!({
                "error": "authentication required",
                "code": "UNAUTHENTICATED",
            });
            (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
        })
}

macro_rules! caller_or_return {
    ($headers:expr) => {
        match authenticate(&$headers) {
            Ok(caller) => caller,
            Err(response) => return response,
        }
    };
}

macro_rules! body_or_return {
    ($payload:expr) => {
        match $payload {
            Ok(Json(body)) => body,
            Err(rejection) => return bad_request(rejection.body_text()),
        }
    };
}

pub(crate) async fn create_posting_handler<S, N>(
    State(coordinator): SharedCoordinator<S, N>,
    headers: HeaderMap,
    payload: Result<Json<NewPosting>, JsonRejection>,
) -> Response
where
    S: FulfillmentStore + 'static,
    N: NotificationSink + 'static,
{
    let caller = caller_or_return!(headers);
    let new_posting = body_or_return!(payload);

    match coordinator.posting_created(&caller, new_posting) {
        Ok(posting) => match coordinator.posting(&posting.id) {
            Ok(record) => (StatusCode::CREATED, Json(record.view())).into_response(),
            Err(error) => error_response(error),
        },
        Err(error) => error_response(error),
    }
}

pub(crate) async fn posting_handler<S, N>(
    State(coordinator): SharedCoordinator<S, N>,
    headers: HeaderMap,
    Path(posting_id): Path<String>,
) -> Response
where
    S: FulfillmentStore + 'static,
    N: NotificationSink + 'static,
{
    let _caller = caller_or_return!(headers);

    match coordinator.posting(&PostingId(posting_id)) {
        Ok(record) => (StatusCode::OK, Json(record.view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn retire_posting_handler<S, N>(
    State(coordinator): SharedCoordinator<S, N>,
    headers: HeaderMap,
    Path(posting_id): Path<String>,
    payload: Result<Json<RetirePostingRequest>, JsonRejection>,
) -> Response
where
    S: FulfillmentStore + 'static,
    N: NotificationSink + 'static,
{
    let caller = caller_or_return!(headers);
    let request = body_or_return!(payload);
    let posting_id = PostingId(posting_id);

    match coordinator.posting_retired(&posting_id, &caller, request.status) {
        Ok(_) => match coordinator.posting(&posting_id) {
            Ok(record) => (StatusCode::OK, Json(record.view())).into_response(),
            Err(error) => error_response(error),
        },
        Err(error) => error_response(error),
    }
}

pub(crate) async fn submit_handler<S, N>(
    State(coordinator): SharedCoordinator<S, N>,
    headers: HeaderMap,
    payload: Result<Json<SubmitApplicationRequest>, JsonRejection>,
) -> Response
where
    S: FulfillmentStore + 'static,
    N: NotificationSink + 'static,
{
    let caller = caller_or_return!(headers);
    let request = body_or_return!(payload);

    match coordinator.application_submitted(&request.posting_id, &caller, request.message) {
        Ok(handled) => {
            let view = ApplicationView::from(&handled.value);
            (StatusCode::CREATED, Json(view)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn application_handler<S, N>(
    State(coordinator): SharedCoordinator<S, N>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
) -> Response
where
    S: FulfillmentStore + 'static,
    N: NotificationSink + 'static,
{
    let caller = caller_or_return!(headers);
    let id = ApplicationId(application_id);

    let application = match coordinator.application(&id) {
        Ok(application) => application,
        Err(error) => return error_response(error),
    };
    let owner = match coordinator.posting(&application.posting_id) {
        Ok(record) => record.posting.creator_id,
        Err(error) => return error_response(error),
    };
    if caller != application.applicant_id && caller != owner {
        return error_response(FulfillmentError::Forbidden(
            "only the applicant or posting owner can view this application".to_string(),
        ));
    }

    (StatusCode::OK, Json(ApplicationView::from(&application))).into_response()
}

pub(crate) async fn update_application_handler<S, N>(
    State(coordinator): SharedCoordinator<S, N>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
    payload: Result<Json<UpdateApplicationRequest>, JsonRejection>,
) -> Response
where
    S: FulfillmentStore + 'static,
    N: NotificationSink + 'static,
{
    let caller = caller_or_return!(headers);
    let request = body_or_return!(payload);
    let id = ApplicationId(application_id);

    let decision = match request.status.trim().to_ascii_lowercase().as_str() {
        "accepted" => Decision::Accept,
        "rejected" => Decision::Reject,
        "waitlisted" => Decision::Waitlist,
        "withdrawn" => {
            return match coordinator.application_withdrawn(&id, &caller) {
                Ok(handled) => {
                    let view = ApplicationView::from(&handled.value.application);
                    let promoted = match &handled.value.promotion {
                        Some(PromotionOutcome::Promoted(promoted)) => Some(promoted.clone()),
                        _ => None,
                    };
                    let payload = json!({
                        "application": view,
                        "promoted_application_id": promoted,
                        "notifications": handled.notifications.len(),
                    });
                    (StatusCode::OK, Json(payload)).into_response()
                }
                Err(error) => error_response(error),
            };
        }
        other => {
            return bad_request(format!(
                "status must be accepted, rejected, waitlisted, or withdrawn (got '{other}')"
            ))
        }
    };

    match coordinator.application_decided(&id, &caller, decision) {
        Ok(handled) => {
            let payload = json!({
                "application": ApplicationView::from(&handled.value),
                "notifications": handled.notifications.len(),
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn create_friend_ask_handler<S, N>(
    State(coordinator): SharedCoordinator<S, N>,
    headers: HeaderMap,
    payload: Result<Json<CreateFriendAskRequest>, JsonRejection>,
) -> Response
where
    S: FulfillmentStore + 'static,
    N: NotificationSink + 'static,
{
    let caller = caller_or_return!(headers);
    let request = body_or_return!(payload);

    let new_ask = NewFriendAsk {
        posting_id: request.posting_id,
        ordered_friend_list: request.ordered_friend_list,
        invite_mode: request.invite_mode,
    };
    match coordinator.invite_created(&caller, new_ask) {
        Ok(handled) => (StatusCode::CREATED, Json(handled.value)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn respond_invite_handler<S, N>(
    State(coordinator): SharedCoordinator<S, N>,
    headers: HeaderMap,
    payload: Result<Json<RespondInviteRequest>, JsonRejection>,
) -> Response
where
    S: FulfillmentStore + 'static,
    N: NotificationSink + 'static,
{
    let caller = caller_or_return!(headers);
    let request = body_or_return!(payload);

    match coordinator.invite_responded(&request.posting_id, &caller, request.action) {
        Ok(handled) => (StatusCode::OK, Json(handled.value)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn expire_invite_handler<S, N>(
    State(coordinator): SharedCoordinator<S, N>,
    headers: HeaderMap,
    payload: Result<Json<ExpireInviteRequest>, JsonRejection>,
) -> Response
where
    S: FulfillmentStore + 'static,
    N: NotificationSink + 'static,
{
    let caller = caller_or_return!(headers);
    let request = body_or_return!(payload);

    match coordinator.invite_expired(&request.posting_id, &caller) {
        Ok(handled) => {
            let payload = json!({ "timed_out": handled.value });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn rank_handler<S, N>(
    State(coordinator): SharedCoordinator<S, N>,
    headers: HeaderMap,
    payload: Result<Json<RankRequest>, JsonRejection>,
) -> Response
where
    S: FulfillmentStore + 'static,
    N: NotificationSink + 'static,
{
    let _caller = caller_or_return!(headers);
    let request = body_or_return!(payload);

    let scorer = coordinator.scorer();
    let payload = json!({
        "policy": scorer.policy().label(),
        "ranked": scorer.rank(request.candidates),
    });
    (StatusCode::OK, Json(payload)).into_response()
}
