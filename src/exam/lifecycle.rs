//! Attempt lifecycle: start or resume, draft saves, submission and expiry
//! finalization. All mutations of one (user, component) pair serialize on
//! a keyed async lock, so the check-then-act sequences here cannot
//! interleave; the sled transaction's submitted guard is the backstop.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::GradingConfig;
use crate::exam::grading::{self, GradeOutcome};
use crate::exam::progress;
use crate::store::operations::lessons::{Component, ComponentBody, Lesson};
use crate::store::operations::test_results::{AnswerEntry, ResultStatus, TestResult};
use crate::store::operations::tests::{Question, Test};
use crate::store::{Store, StoreError};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("lesson not found or has no test component")]
    ComponentNotFound,
    #[error("maximum of {max_attempts} attempts reached")]
    MaxAttemptsReached { max_attempts: u32 },
    #[error("attempt has already been submitted")]
    AlreadySubmitted,
    #[error("test attempt not found: {0}")]
    ResultNotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of starting (or resuming) an attempt.
#[derive(Debug, Clone)]
pub struct StartedAttempt {
    pub test_result_id: String,
    pub attempt_number: u32,
    pub max_attempts: u32,
    pub remaining_attempts: u32,
    pub resumed: bool,
    pub remaining_time_secs: i64,
}

#[derive(Debug, Clone)]
pub struct SubmittedAttempt {
    pub outcome: GradeOutcome,
    pub score_percentage: f64,
    pub remaining_attempts: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct RemainingTime {
    pub remaining_secs: i64,
    pub submitted: bool,
}

pub struct AttemptLifecycle {
    store: Arc<Store>,
    grading: GradingConfig,
    attempt_locks: StdMutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl AttemptLifecycle {
    pub fn new(store: Arc<Store>, grading: GradingConfig) -> Self {
        Self {
            store,
            grading,
            attempt_locks: StdMutex::new(HashMap::new()),
        }
    }

    /// Start a new attempt at the lesson's test, or resume the user's
    /// ongoing one. A stale unsubmitted attempt whose window has passed is
    /// finalized here first, then counted like any other used attempt.
    pub async fn start_attempt(
        &self,
        user_id: &str,
        lesson_id: &str,
    ) -> Result<StartedAttempt, LifecycleError> {
        let (lesson, component, test) = self.load_test_surface(lesson_id)?;
        let lock = self.lock_for(user_id, &component.id);
        let _guard = lock.lock().await;
        let now = Utc::now();

        if let Some(existing) = self.store.find_unsubmitted_attempt(user_id, &component.id)? {
            let remaining = remaining_seconds(&existing, &test, now);
            if remaining > 0 {
                info!(
                    test_result_id = %existing.id,
                    attempt_number = existing.attempt_number,
                    "Resuming ongoing attempt"
                );
                return Ok(StartedAttempt {
                    test_result_id: existing.id.clone(),
                    attempt_number: existing.attempt_number,
                    max_attempts: test.max_attempts,
                    remaining_attempts: test.max_attempts.saturating_sub(existing.attempt_number),
                    resumed: true,
                    remaining_time_secs: remaining,
                });
            }
            // The expiry worker has not settled this one yet.
            warn!(test_result_id = %existing.id, "Finalizing stale expired attempt");
            let answers = existing.user_answers.clone();
            self.finalize_locked(existing, &lesson, &test, answers, now)?;
        }

        let used = self.store.count_attempts(user_id, &component.id)?;
        if used >= test.max_attempts {
            return Err(LifecycleError::MaxAttemptsReached {
                max_attempts: test.max_attempts,
            });
        }

        let attempt_number = used + 1;
        let result = TestResult {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            component_id: component.id.clone(),
            attempt_number,
            user_answers: BTreeMap::new(),
            mark: 0,
            status: ResultStatus::Failed,
            submitted: false,
            created_at: now,
            updated_at: now,
        };
        let window = Duration::minutes(i64::from(test.duration_minutes))
            + Duration::minutes(i64::from(self.grading.expiry_grace_minutes));
        self.store.create_attempt(&result, now + window)?;
        info!(
            test_result_id = %result.id,
            attempt_number,
            "Started test attempt"
        );

        Ok(StartedAttempt {
            test_result_id: result.id,
            attempt_number,
            max_attempts: test.max_attempts,
            remaining_attempts: test.max_attempts - attempt_number,
            resumed: false,
            remaining_time_secs: i64::from(test.duration_minutes) * 60,
        })
    }

    /// Replace the attempt's draft answers. Every question gets an entry,
    /// selections for unknown question ids are dropped.
    pub async fn save_draft(
        &self,
        user_id: &str,
        result_id: &str,
        selections: &BTreeMap<String, Vec<String>>,
    ) -> Result<(), LifecycleError> {
        let result = self.owned_result(user_id, result_id)?;
        let (_, test) = self.load_result_surface(&result)?;

        let lock = self.lock_for(user_id, &result.component_id);
        let _guard = lock.lock().await;

        let result = self.owned_result(user_id, result_id)?;
        if result.submitted {
            return Err(LifecycleError::AlreadySubmitted);
        }

        let answers = draft_answer_map(&test.questions, selections);
        match self.store.save_draft_answers(result_id, &answers, Utc::now()) {
            Ok(()) => Ok(()),
            Err(StoreError::Conflict { .. }) => Err(LifecycleError::AlreadySubmitted),
            Err(StoreError::NotFound { .. }) => {
                Err(LifecycleError::ResultNotFound(result_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Submit the attempt for grading. `selections` replaces the saved
    /// draft when present; a bodyless submit grades whatever was drafted.
    pub async fn submit_attempt(
        &self,
        user_id: &str,
        result_id: &str,
        selections: Option<&BTreeMap<String, Vec<String>>>,
    ) -> Result<SubmittedAttempt, LifecycleError> {
        let result = self.owned_result(user_id, result_id)?;
        let (lesson, test) = self.load_result_surface(&result)?;

        let lock = self.lock_for(user_id, &result.component_id);
        let _guard = lock.lock().await;

        let result = self.owned_result(user_id, result_id)?;
        if result.submitted {
            return Err(LifecycleError::AlreadySubmitted);
        }

        let answers = match selections {
            Some(selections) => draft_answer_map(&test.questions, selections),
            None => result.user_answers.clone(),
        };
        let attempt_number = result.attempt_number;
        let outcome = self.finalize_locked(result, &lesson, &test, answers, Utc::now())?;
        let score_percentage =
            grading::score_percentage(outcome.correct_count, outcome.total_questions);
        info!(
            test_result_id = %result_id,
            passed = outcome.passed,
            correct = outcome.correct_count,
            total = outcome.total_questions,
            "Submitted test attempt"
        );

        Ok(SubmittedAttempt {
            outcome,
            score_percentage,
            remaining_attempts: test.max_attempts.saturating_sub(attempt_number),
        })
    }

    /// Settle an attempt whose window has elapsed. Grades the saved draft
    /// as-is. Returns `Ok(None)` when the attempt is gone or was submitted
    /// in the meantime, so redelivery is harmless.
    pub async fn finalize_expired(
        &self,
        result_id: &str,
    ) -> Result<Option<GradeOutcome>, LifecycleError> {
        let Some(result) = self.store.get_test_result(result_id)? else {
            return Ok(None);
        };
        if result.submitted {
            return Ok(None);
        }
        let (lesson, test) = self.load_result_surface(&result)?;

        let lock = self.lock_for(&result.user_id, &result.component_id);
        let _guard = lock.lock().await;

        let Some(result) = self.store.get_test_result(result_id)? else {
            return Ok(None);
        };
        if result.submitted {
            return Ok(None);
        }

        let answers = result.user_answers.clone();
        match self.finalize_locked(result, &lesson, &test, answers, Utc::now()) {
            Ok(outcome) => Ok(Some(outcome)),
            Err(LifecycleError::AlreadySubmitted) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Seconds left in the attempt's window, clamped at zero.
    pub fn remaining_time(
        &self,
        user_id: &str,
        result_id: &str,
    ) -> Result<RemainingTime, LifecycleError> {
        let result = self.owned_result(user_id, result_id)?;
        let (_, test) = self.load_result_surface(&result)?;
        let remaining = remaining_seconds(&result, &test, Utc::now());
        Ok(RemainingTime {
            remaining_secs: remaining.max(0),
            submitted: result.submitted,
        })
    }

    /// The attempt, restricted to its owner. Foreign ids read as missing.
    pub fn get_attempt(&self, user_id: &str, result_id: &str) -> Result<TestResult, LifecycleError> {
        self.owned_result(user_id, result_id)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    fn owned_result(&self, user_id: &str, result_id: &str) -> Result<TestResult, LifecycleError> {
        let result = self
            .store
            .get_test_result(result_id)?
            .ok_or_else(|| LifecycleError::ResultNotFound(result_id.to_string()))?;
        if result.user_id != user_id {
            return Err(LifecycleError::ResultNotFound(result_id.to_string()));
        }
        Ok(result)
    }

    fn load_test_surface(
        &self,
        lesson_id: &str,
    ) -> Result<(Lesson, Component, Test), LifecycleError> {
        let lesson = self
            .store
            .get_lesson(lesson_id)?
            .ok_or(LifecycleError::ComponentNotFound)?;
        let component = self
            .store
            .find_test_component(lesson_id)?
            .ok_or(LifecycleError::ComponentNotFound)?;
        let test = self.test_for_component(&component)?;
        Ok((lesson, component, test))
    }

    fn load_result_surface(&self, result: &TestResult) -> Result<(Lesson, Test), LifecycleError> {
        let component = self
            .store
            .get_component(&result.component_id)?
            .ok_or(LifecycleError::ComponentNotFound)?;
        let lesson = self
            .store
            .get_lesson(&component.lesson_id)?
            .ok_or(LifecycleError::ComponentNotFound)?;
        let test = self.test_for_component(&component)?;
        Ok((lesson, test))
    }

    fn test_for_component(&self, component: &Component) -> Result<Test, LifecycleError> {
        let ComponentBody::Test { test_id } = &component.body else {
            return Err(LifecycleError::ComponentNotFound);
        };
        self.store
            .get_test(test_id)?
            .ok_or_else(|| {
                LifecycleError::Store(StoreError::NotFound {
                    entity: "test".to_string(),
                    key: test_id.clone(),
                })
            })
    }

    fn finalize_locked(
        &self,
        result: TestResult,
        lesson: &Lesson,
        test: &Test,
        answers: BTreeMap<String, AnswerEntry>,
        now: DateTime<Utc>,
    ) -> Result<GradeOutcome, LifecycleError> {
        let (final_answers, outcome) =
            grading::grade(&test.questions, &answers, self.grading.pass_percentage);
        let plan =
            progress::build_finalize_plan(&self.store, &result, lesson, final_answers, outcome, now)?;
        match self.store.finalize_attempt(&plan) {
            Ok(()) => Ok(outcome),
            Err(StoreError::Conflict { .. }) => Err(LifecycleError::AlreadySubmitted),
            Err(e) => Err(e.into()),
        }
    }

    fn lock_for(&self, user_id: &str, component_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let key = format!("{user_id}:{component_id}");
        let mut locks = self
            .attempt_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks
            .entry(key)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

/// One draft entry per question of the test, including unanswered ones.
pub fn draft_answer_map(
    questions: &[Question],
    selections: &BTreeMap<String, Vec<String>>,
) -> BTreeMap<String, AnswerEntry> {
    questions
        .iter()
        .map(|question| {
            let selected_answer_ids = selections.get(&question.id).cloned().unwrap_or_default();
            (
                question.id.clone(),
                AnswerEntry::Draft {
                    question_id: question.id.clone(),
                    selected_answer_ids,
                    is_draft: true,
                },
            )
        })
        .collect()
}

fn remaining_seconds(result: &TestResult, test: &Test, now: DateTime<Utc>) -> i64 {
    i64::from(test.duration_minutes) * 60 - (now - result.created_at).num_seconds()
}
