use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::transaction::ConflictableTransactionError;
use sled::Transactional;

use crate::store::keys;
use crate::store::operations::user_progress::{
    EnrolmentStatus, LessonStatus, UserCourse, UserLesson, UserWord,
};
use crate::store::{Store, StoreError};

/// One attempt at a lesson's test. Created unsubmitted, mutated by draft
/// saves and exactly one finalization, immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub id: String,
    pub user_id: String,
    pub component_id: String,
    pub attempt_number: u32,
    pub user_answers: BTreeMap<String, AnswerEntry>,
    pub mark: u32,
    pub status: ResultStatus,
    pub submitted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Passed,
    Failed,
}

/// Per-question answer record. Two persisted shapes, distinguished by
/// their fields: drafts before grading, enriched entries after. Result
/// display reads this back, so the layout must stay stable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum AnswerEntry {
    Graded {
        question_id: String,
        selected_answer_ids: Vec<String>,
        correct_answer_ids: Vec<String>,
        is_correct: bool,
    },
    Draft {
        question_id: String,
        selected_answer_ids: Vec<String>,
        is_draft: bool,
    },
}

impl AnswerEntry {
    pub fn selected_answer_ids(&self) -> &[String] {
        match self {
            AnswerEntry::Graded {
                selected_answer_ids,
                ..
            }
            | AnswerEntry::Draft {
                selected_answer_ids,
                ..
            } => selected_answer_ids,
        }
    }
}

/// Everything the finalize transaction needs, gathered up front under the
/// per-(user, component) lifecycle lock. Scans stay outside the sled
/// transaction; the conditional read-modify-write steps run inside it.
#[derive(Debug, Clone)]
pub struct FinalizePlan {
    pub result_id: String,
    pub user_id: String,
    pub lesson_id: String,
    pub course_id: String,
    pub final_answers: BTreeMap<String, AnswerEntry>,
    pub mark: u32,
    pub passed: bool,
    /// Highest mark among this user's earlier attempts at the component.
    pub best_prior_mark: u32,
    /// Word components of the lesson, ordered by index_in_lesson.
    pub word_component_ids: Vec<String>,
    /// All lesson ids of the course, for the completion ratio.
    pub course_lesson_ids: Vec<String>,
    pub now: DateTime<Utc>,
}

impl Store {
    /// Insert a fresh attempt together with its attempt-index entry and its
    /// expiry-queue entry, atomically.
    pub fn create_attempt(
        &self,
        result: &TestResult,
        fire_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let key = keys::test_result_key(&result.id);
        let index_key = keys::attempt_index_key(
            &result.user_id,
            &result.component_id,
            result.attempt_number,
        );
        let queue_key = keys::expiry_queue_key(fire_at.timestamp_millis(), &result.id);
        let result_bytes = Self::serialize(result)?;
        let result_id_bytes = result.id.as_bytes().to_vec();

        let key_bytes = key.as_bytes().to_vec();
        let index_key_bytes = index_key.as_bytes().to_vec();
        let queue_key_bytes = queue_key.as_bytes().to_vec();
        (
            &self.test_results,
            &self.attempts_by_user_component,
            &self.attempt_expiry_queue,
        )
            .transaction(move |(tx_results, tx_index, tx_queue)| {
                tx_results.insert(key_bytes.as_slice(), result_bytes.as_slice())?;
                tx_index.insert(index_key_bytes.as_slice(), result_id_bytes.as_slice())?;
                tx_queue.insert(queue_key_bytes.as_slice(), &[] as &[u8])?;
                Ok(())
            })
            .map_err(|e: sled::transaction::TransactionError<()>| match e {
                sled::transaction::TransactionError::Abort(()) => {
                    StoreError::Sled(sled::Error::Unsupported("transaction aborted".into()))
                }
                sled::transaction::TransactionError::Storage(se) => StoreError::Sled(se),
            })?;
        Ok(())
    }

    pub fn get_test_result(&self, result_id: &str) -> Result<Option<TestResult>, StoreError> {
        let key = keys::test_result_key(result_id);
        match self.test_results.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    /// Overwrite the answers map of an unsubmitted attempt. Mark, status
    /// and the submitted flag are untouched by draft saves.
    pub fn save_draft_answers(
        &self,
        result_id: &str,
        answers: &BTreeMap<String, AnswerEntry>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut result =
            self.get_test_result(result_id)?
                .ok_or_else(|| StoreError::NotFound {
                    entity: "test_result".to_string(),
                    key: result_id.to_string(),
                })?;
        if result.submitted {
            return Err(StoreError::Conflict {
                entity: "test_result".to_string(),
                key: result_id.to_string(),
            });
        }
        result.user_answers = answers.clone();
        result.updated_at = now;

        let key = keys::test_result_key(result_id);
        self.test_results
            .insert(key.as_bytes(), Self::serialize(&result)?)?;
        Ok(())
    }

    /// Number of attempts this user has used for the component.
    pub fn count_attempts(&self, user_id: &str, component_id: &str) -> Result<u32, StoreError> {
        let prefix = keys::attempt_index_prefix(user_id, component_id);
        let mut count = 0u32;
        for item in self.attempts_by_user_component.scan_prefix(prefix.as_bytes()) {
            let _ = item?;
            count += 1;
        }
        Ok(count)
    }

    pub fn list_attempts(
        &self,
        user_id: &str,
        component_id: &str,
    ) -> Result<Vec<TestResult>, StoreError> {
        let prefix = keys::attempt_index_prefix(user_id, component_id);
        let mut results = Vec::new();
        for item in self.attempts_by_user_component.scan_prefix(prefix.as_bytes()) {
            let (_, v) = item?;
            let result_id = String::from_utf8(v.to_vec()).unwrap_or_default();
            if let Some(result) = self.get_test_result(&result_id)? {
                results.push(result);
            }
        }
        Ok(results)
    }

    /// The lifecycle invariant allows at most one of these; the latest is
    /// returned if the invariant was ever violated externally.
    pub fn find_unsubmitted_attempt(
        &self,
        user_id: &str,
        component_id: &str,
    ) -> Result<Option<TestResult>, StoreError> {
        let attempts = self.list_attempts(user_id, component_id)?;
        Ok(attempts.into_iter().filter(|r| !r.submitted).next_back())
    }

    pub fn best_mark(&self, user_id: &str, component_id: &str) -> Result<u32, StoreError> {
        let attempts = self.list_attempts(user_id, component_id)?;
        Ok(attempts.iter().map(|r| r.mark).max().unwrap_or(0))
    }

    /// Grade an attempt and propagate progress in one atomic transaction.
    ///
    /// Writes the enriched result, then (on a pass) the UserLesson row,
    /// missing UserWord rows and the UserCourse progress. Re-checks the
    /// submitted flag inside the transaction; a concurrent finalize makes
    /// this return `StoreError::Conflict` with nothing written.
    pub fn finalize_attempt(&self, plan: &FinalizePlan) -> Result<(), StoreError> {
        let result_key = keys::test_result_key(&plan.result_id);
        let user_lesson_key = keys::user_lesson_key(&plan.user_id, &plan.lesson_id);
        let user_course_key = keys::user_course_key(&plan.user_id, &plan.course_id);

        (
            &self.test_results,
            &self.user_lessons,
            &self.user_words,
            &self.user_courses,
        )
            .transaction(|(tx_results, tx_lessons, tx_words, tx_courses)| {
                let raw = tx_results
                    .get(result_key.as_bytes())?
                    .ok_or_else(|| {
                        ConflictableTransactionError::Abort(StoreError::NotFound {
                            entity: "test_result".to_string(),
                            key: plan.result_id.clone(),
                        })
                    })?;
                let mut result: TestResult = tx_deserialize(&raw)?;
                if result.submitted {
                    return Err(ConflictableTransactionError::Abort(StoreError::Conflict {
                        entity: "test_result".to_string(),
                        key: plan.result_id.clone(),
                    }));
                }

                result.user_answers = plan.final_answers.clone();
                result.mark = plan.mark;
                result.status = if plan.passed {
                    ResultStatus::Passed
                } else {
                    ResultStatus::Failed
                };
                result.submitted = true;
                result.updated_at = plan.now;
                tx_results.insert(result_key.as_bytes(), tx_serialize(&result)?)?;

                if !plan.passed {
                    return Ok(());
                }

                // Lesson progress: find-or-init, grade never regresses.
                let mut user_lesson = match tx_lessons.get(user_lesson_key.as_bytes())? {
                    Some(raw) => tx_deserialize::<UserLesson>(&raw)?,
                    None => UserLesson {
                        user_id: plan.user_id.clone(),
                        lesson_id: plan.lesson_id.clone(),
                        status: LessonStatus::Incomplete,
                        grade: 0,
                        completed_at: None,
                        created_at: plan.now,
                        updated_at: plan.now,
                    },
                };
                user_lesson.status = LessonStatus::Completed;
                if user_lesson.completed_at.is_none() {
                    user_lesson.completed_at = Some(plan.now);
                }
                let best_mark = plan.best_prior_mark.max(plan.mark);
                user_lesson.grade = user_lesson.grade.max(best_mark);
                user_lesson.updated_at = plan.now;
                tx_lessons.insert(user_lesson_key.as_bytes(), tx_serialize(&user_lesson)?)?;

                // Vocabulary learned: insert only the missing rows.
                for component_id in &plan.word_component_ids {
                    let word_key = keys::user_word_key(&plan.user_id, component_id);
                    if tx_words.get(word_key.as_bytes())?.is_none() {
                        let user_word = UserWord {
                            user_id: plan.user_id.clone(),
                            component_id: component_id.clone(),
                            created_at: plan.now,
                        };
                        tx_words.insert(word_key.as_bytes(), tx_serialize(&user_word)?)?;
                    }
                }

                // Course progress: missing enrolment or an empty course is
                // skipped, not an error.
                if let Some(raw) = tx_courses.get(user_course_key.as_bytes())? {
                    let total_lessons = plan.course_lesson_ids.len();
                    if total_lessons > 0 {
                        let mut user_course: UserCourse = tx_deserialize(&raw)?;
                        let mut completed_lessons = 0usize;
                        for lesson_id in &plan.course_lesson_ids {
                            let key = keys::user_lesson_key(&plan.user_id, lesson_id);
                            if let Some(raw) = tx_lessons.get(key.as_bytes())? {
                                let row: UserLesson = tx_deserialize(&raw)?;
                                if row.status == LessonStatus::Completed {
                                    completed_lessons += 1;
                                }
                            }
                        }
                        let progress = ((completed_lessons as f64 / total_lessons as f64)
                            * 100.0)
                            .round() as u32;
                        user_course.progress = progress;
                        user_course.enrolment_status = if progress >= 100 {
                            EnrolmentStatus::Completed
                        } else {
                            EnrolmentStatus::InProgress
                        };
                        tx_courses
                            .insert(user_course_key.as_bytes(), tx_serialize(&user_course)?)?;
                    }
                }

                Ok(())
            })
            .map_err(
                |error: sled::transaction::TransactionError<StoreError>| match error {
                    sled::transaction::TransactionError::Abort(store_error) => store_error,
                    sled::transaction::TransactionError::Storage(storage_error) => {
                        StoreError::Sled(storage_error)
                    }
                },
            )?;

        Ok(())
    }
}

fn tx_serialize<T: Serialize>(
    value: &T,
) -> Result<Vec<u8>, ConflictableTransactionError<StoreError>> {
    serde_json::to_vec(value)
        .map_err(|e| ConflictableTransactionError::Abort(StoreError::Serialization(e)))
}

fn tx_deserialize<T: serde::de::DeserializeOwned>(
    bytes: &[u8],
) -> Result<T, ConflictableTransactionError<StoreError>> {
    serde_json::from_slice(bytes)
        .map_err(|e| ConflictableTransactionError::Abort(StoreError::Serialization(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_entry_shapes_are_distinguishable() {
        let draft = serde_json::json!({
            "questionId": "q1",
            "selectedAnswerIds": ["a1"],
            "isDraft": true,
        });
        let graded = serde_json::json!({
            "questionId": "q1",
            "selectedAnswerIds": ["a1"],
            "correctAnswerIds": ["a1", "a2"],
            "isCorrect": false,
        });

        let parsed_draft: AnswerEntry = serde_json::from_value(draft).unwrap();
        assert!(matches!(parsed_draft, AnswerEntry::Draft { .. }));

        let parsed_graded: AnswerEntry = serde_json::from_value(graded).unwrap();
        assert!(matches!(parsed_graded, AnswerEntry::Graded { .. }));
        assert_eq!(parsed_graded.selected_answer_ids(), ["a1"]);
    }

    #[test]
    fn graded_entry_serializes_with_stable_field_names() {
        let entry = AnswerEntry::Graded {
            question_id: "q1".into(),
            selected_answer_ids: vec!["a1".into()],
            correct_answer_ids: vec!["a2".into()],
            is_correct: false,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["questionId"], "q1");
        assert_eq!(json["correctAnswerIds"][0], "a2");
        assert_eq!(json["isCorrect"], false);
        assert!(json.get("isDraft").is_none());
    }
}
