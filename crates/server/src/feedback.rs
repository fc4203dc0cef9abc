//! `POST /feedback`: authenticated feedback ingestion.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use tally_core::config::IngestConfig;
use tally_core::{Account, FeedbackSubmission};
use tally_db::{AccountRepository, FeedbackRepository, RepositoryError};
use tracing::{error, info, warn};

use crate::app::ErrorBody;

pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Clone)]
pub struct IngestState {
    pub accounts: Arc<dyn AccountRepository>,
    pub feedback: Arc<dyn FeedbackRepository>,
    pub limits: IngestConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FeedbackAccepted {
    pub message: &'static str,
}

type Rejection = (StatusCode, Json<ErrorBody>);

fn reject(status: StatusCode, message: impl Into<String>) -> Rejection {
    (status, Json(ErrorBody::new(message)))
}

fn internal(workspace: &str, stage: &'static str, error: RepositoryError) -> Rejection {
    error!(
        event_name = "server.feedback.store_failed",
        workspace = %workspace,
        stage,
        error = %error,
        "feedback storage failed"
    );
    reject(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

pub async fn submit_feedback(
    State(state): State<IngestState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<FeedbackAccepted>), Rejection> {
    let (account, workspace) = authorize(&state, &headers).await?;

    let submission = serde_json::from_slice::<FeedbackSubmission>(&body).map_err(|error| {
        warn!(
            event_name = "server.feedback.invalid_body",
            workspace = %workspace,
            error = %error,
            "feedback body rejected"
        );
        reject(StatusCode::BAD_REQUEST, "Invalid request body")
    })?;
    let submission = submission.normalize().map_err(|error| {
        warn!(
            event_name = "server.feedback.invalid_field",
            workspace = %workspace,
            error = %error,
            "feedback field rejected"
        );
        reject(StatusCode::BAD_REQUEST, error.to_string())
    })?;

    if account.has_reached_quota(state.limits.monthly_feedback_limit) {
        warn!(
            event_name = "server.feedback.quota_reached",
            workspace = %workspace,
            feedback_count = account.feedback_count,
            "monthly feedback limit reached"
        );
        return Err(reject(StatusCode::TOO_MANY_REQUESTS, "Monthly feedback limit reached"));
    }

    let usage = state
        .feedback
        .prompt_usage(&workspace, &submission.origin, &submission.category, &submission.prompt)
        .await
        .map_err(|error| internal(&workspace, "prompt_usage", error))?;
    if !usage.exists && usage.registered >= state.limits.prompt_count_limit {
        warn!(
            event_name = "server.feedback.prompt_limit_reached",
            workspace = %workspace,
            registered = usage.registered,
            "prompt limit reached"
        );
        return Err(reject(StatusCode::BAD_REQUEST, "Prompt limit reached"));
    }

    let record = submission.into_record(workspace.clone(), Utc::now());
    state
        .feedback
        .insert(&account.account_id, &record)
        .await
        .map_err(|error| internal(&workspace, "insert", error))?;

    info!(
        event_name = "server.feedback.accepted",
        workspace = %workspace,
        origin = %record.origin,
        category = %record.category,
        has_comment = record.has_comment(),
        "feedback stored"
    );
    Ok((StatusCode::CREATED, Json(FeedbackAccepted { message: "Feedback submitted successfully" })))
}

/// Resolves the API key to a live account with a linked workspace.
async fn authorize(state: &IngestState, headers: &HeaderMap) -> Result<(Account, String), Rejection> {
    let api_key = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            warn!(event_name = "server.feedback.unauthorized", reason = "missing_key", "api key missing");
            reject(StatusCode::UNAUTHORIZED, "Unauthorized")
        })?;

    let account = state.accounts.find_by_api_key(api_key).await.map_err(|error| {
        internal("unknown", "find_account", error)
    })?;
    let Some((account, workspace)) = account.and_then(|account| {
        let workspace = account.slack_workspace.clone()?;
        Some((account, workspace))
    }) else {
        warn!(event_name = "server.feedback.unauthorized", reason = "unknown_key", "api key rejected");
        return Err(reject(StatusCode::UNAUTHORIZED, "Unauthorized"));
    };

    if account.is_expired(Utc::now()) {
        warn!(
            event_name = "server.feedback.account_expired",
            workspace = %workspace,
            account_id = %account.account_id,
            "account expired"
        );
        return Err(reject(StatusCode::PAYMENT_REQUIRED, "Account expired"));
    }

    Ok((account, workspace))
}
