//! HTTP host for the bot: the `/api/messages` endpoint the platform posts
//! activities to, plus a health check.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::activity::Activity;
use crate::dispatcher::{ActivityDispatcher, TurnOutcome, TurnResponse};
use crate::error::Error;
use crate::invoke::InvokeOutcome;
use crate::side_effect::SideEffectRunner;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<ActivityDispatcher>,
    pub side_effects: Arc<dyn SideEffectRunner>,
}

/// Build the Axum router with the bot routes.
pub fn bot_routes(dispatcher: Arc<ActivityDispatcher>, side_effects: Arc<dyn SideEffectRunner>) -> Router {
    let state = AppState {
        dispatcher,
        side_effects,
    };

    Router::new()
        .route("/api/messages", post(messages))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "card-bot"
    }))
}

// ── Activities ──────────────────────────────────────────────────────────

async fn messages(State(state): State<AppState>, Json(activity): Json<Activity>) -> Response {
    match state.dispatcher.dispatch(&activity).await {
        Ok(turn) => {
            run_side_effects(&state, &turn);
            turn_response(turn.outcome)
        }
        Err(e) => error_response(&e),
    }
}

/// Side effects run detached; the turn never waits on them.
fn run_side_effects(state: &AppState, turn: &TurnResponse) {
    for effect in turn.side_effects.iter().cloned() {
        let runner = Arc::clone(&state.side_effects);
        tokio::spawn(async move {
            runner.run(&effect).await;
        });
    }
}

fn turn_response(outcome: TurnOutcome) -> Response {
    match outcome {
        TurnOutcome::Completed { .. } | TurnOutcome::Submitted(_) | TurnOutcome::Ignored => {
            StatusCode::OK.into_response()
        }
        TurnOutcome::CardInvoke(outcome @ InvokeOutcome::Updated { .. }) => (
            StatusCode::OK,
            Json(json!({ "statusCode": outcome.status_code() })),
        )
            .into_response(),
        TurnOutcome::CardInvoke(InvokeOutcome::Unhandled { .. }) => {
            StatusCode::ACCEPTED.into_response()
        }
        TurnOutcome::ExtensionResult(result) => (StatusCode::OK, Json(result)).into_response(),
    }
}

fn error_response(e: &Error) -> Response {
    let status = match e {
        Error::NotImplemented { .. } => StatusCode::NOT_IMPLEMENTED,
        Error::InvalidActivity(_) => StatusCode::BAD_REQUEST,
        Error::Search(_) | Error::Channel(_) => StatusCode::BAD_GATEWAY,
        Error::Template(_) | Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!(error = %e, status = %status, "Turn failed");
    } else {
        warn!(error = %e, status = %status, "Turn rejected");
    }
    (status, Json(json!({ "error": e.to_string() }))).into_response()
}
