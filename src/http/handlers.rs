use axum::{
    extract::State,
    http::StatusCode,
    routing::{any, get},
    Json, Router,
};

use crate::http::server::AppState;
use crate::lifecycle::shutdown::RequestOutcome;
use crate::model::{users, User};

pub const ROOT_BODY: &str = "Server is up and running....";

/// Public routes. State is attached by the server.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", any(root))
        .route("/get-users", get(get_users))
        .route("/shutdown", any(shutdown))
}

pub async fn root() -> &'static str {
    ROOT_BODY
}

pub async fn get_users() -> Json<Vec<User>> {
    Json(users())
}

/// Ask the coordinator to shut down. Returns immediately; the drain runs on
/// the sequencer.
pub async fn shutdown(State(state): State<AppState>) -> (StatusCode, &'static str) {
    match state.coordinator.request_shutdown("http") {
        RequestOutcome::Accepted => (StatusCode::ACCEPTED, "Shutdown initiated"),
        RequestOutcome::AlreadyInProgress => (StatusCode::CONFLICT, "Shutdown already in progress"),
    }
}
