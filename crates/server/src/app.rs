use axum::{routing::post, Router};
use serde::Serialize;
use tally_db::DbPool;

use crate::feedback::{submit_feedback, IngestState};
use crate::health;
use crate::interactions::{handle_event, handle_interaction, InteractionState};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }
}

/// All HTTP routes served by `tally-server`.
pub fn router(db_pool: DbPool, ingest: IngestState, interactions: InteractionState) -> Router {
    Router::new()
        .route("/feedback", post(submit_feedback))
        .with_state(ingest)
        .merge(
            Router::new()
                .route("/slack/interactions", post(handle_interaction))
                .route("/slack/events", post(handle_event))
                .with_state(interactions),
        )
        .merge(health::router(db_pool))
}
