//! Read-only views of a user's attempts. A graded attempt exposes its
//! enriched answers, including the correct ids; drafts only echo what the
//! user selected so far.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::AuthUser;
use crate::response::{ok, AppError};
use crate::state::AppState;
use crate::store::operations::lessons::ComponentBody;
use crate::store::operations::test_results::{ResultStatus, TestResult};

/// Routes mounted under /api/attempts.
pub fn router() -> Router<AppState> {
    Router::new().route("/:attempt_id", get(get_attempt))
}

async fn get_attempt(
    auth: AuthUser,
    Path(attempt_id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let result = state.lifecycle().get_attempt(&auth.user_id, &attempt_id)?;
    Ok(ok(result))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AttemptSummary {
    id: String,
    attempt_number: u32,
    mark: u32,
    status: ResultStatus,
    submitted: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TestResult> for AttemptSummary {
    fn from(value: TestResult) -> Self {
        Self {
            id: value.id,
            attempt_number: value.attempt_number,
            mark: value.mark,
            status: value.status,
            submitted: value.submitted,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

pub(crate) async fn list_attempts(
    auth: AuthUser,
    Path(lesson_id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let component = state
        .store()
        .find_test_component(&lesson_id)?
        .ok_or_else(|| {
            AppError::not_found("COMPONENT_NOT_FOUND", "Lesson not found or has no test component")
        })?;
    debug_assert!(matches!(component.body, ComponentBody::Test { .. }));

    let attempts: Vec<AttemptSummary> = state
        .store()
        .list_attempts(&auth.user_id, &component.id)?
        .into_iter()
        .map(AttemptSummary::from)
        .collect();
    Ok(ok(attempts))
}
