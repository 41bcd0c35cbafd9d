//! The attempt lifecycle endpoints: start or resume, draft saves,
//! submission and the countdown. All state transitions go through
//! `AttemptLifecycle`; handlers only translate between HTTP and it.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::exam::lifecycle::{StartedAttempt, SubmittedAttempt};
use crate::extractors::JsonBody;
use crate::response::{created, ok, AppError};
use crate::state::AppState;

/// Routes mounted under /api/lessons.
pub fn lesson_router() -> Router<AppState> {
    Router::new().route(
        "/:lesson_id/attempts",
        post(start_attempt).get(super::results::list_attempts),
    )
}

/// Routes mounted under /api/attempts.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:attempt_id/draft", put(save_draft))
        .route("/:attempt_id/submit", post(submit_attempt))
        .route("/:attempt_id/remaining-time", get(remaining_time))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartAttemptResponse {
    test_result_id: String,
    attempt_number: u32,
    max_attempts: u32,
    remaining_attempts: u32,
    resumed: bool,
    remaining_time_secs: i64,
}

impl From<StartedAttempt> for StartAttemptResponse {
    fn from(value: StartedAttempt) -> Self {
        Self {
            test_result_id: value.test_result_id,
            attempt_number: value.attempt_number,
            max_attempts: value.max_attempts,
            remaining_attempts: value.remaining_attempts,
            resumed: value.resumed,
            remaining_time_secs: value.remaining_time_secs,
        }
    }
}

async fn start_attempt(
    auth: AuthUser,
    Path(lesson_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let started = state
        .lifecycle()
        .start_attempt(&auth.user_id, &lesson_id)
        .await?;
    let resumed = started.resumed;
    let body = StartAttemptResponse::from(started);
    if resumed {
        Ok(ok(body).into_response())
    } else {
        Ok(created(body).into_response())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DraftRequest {
    /// question id -> selected answer ids
    #[serde(default)]
    answers: BTreeMap<String, Vec<String>>,
}

async fn save_draft(
    auth: AuthUser,
    Path(attempt_id): Path<String>,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<DraftRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .lifecycle()
        .save_draft(&auth.user_id, &attempt_id, &req.answers)
        .await?;
    Ok(ok(serde_json::json!({ "saved": true })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitRequest {
    /// Replaces the saved draft when present.
    answers: Option<BTreeMap<String, Vec<String>>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    passed: bool,
    correct_count: u32,
    total_questions: u32,
    score_percentage: f64,
    remaining_attempts: u32,
}

impl From<SubmittedAttempt> for SubmitResponse {
    fn from(value: SubmittedAttempt) -> Self {
        Self {
            passed: value.outcome.passed,
            correct_count: value.outcome.correct_count,
            total_questions: value.outcome.total_questions,
            score_percentage: value.score_percentage,
            remaining_attempts: value.remaining_attempts,
        }
    }
}

async fn submit_attempt(
    auth: AuthUser,
    Path(attempt_id): Path<String>,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<SubmitRequest>,
) -> Result<impl IntoResponse, AppError> {
    let submitted = state
        .lifecycle()
        .submit_attempt(&auth.user_id, &attempt_id, req.answers.as_ref())
        .await?;
    Ok(ok(SubmitResponse::from(submitted)))
}

async fn remaining_time(
    auth: AuthUser,
    Path(attempt_id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let remaining = state
        .lifecycle()
        .remaining_time(&auth.user_id, &attempt_id)?;
    Ok(ok(serde_json::json!({
        "remainingTimeSecs": remaining.remaining_secs,
        "submitted": remaining.submitted,
    })))
}
