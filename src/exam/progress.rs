//! Gathers the inputs the finalize transaction needs but cannot scan for
//! itself. Runs under the lifecycle's per-(user, component) lock, so the
//! scans and the transaction see a consistent attempt history.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::exam::grading::GradeOutcome;
use crate::store::operations::lessons::Lesson;
use crate::store::operations::test_results::{AnswerEntry, FinalizePlan, TestResult};
use crate::store::{Store, StoreError};

/// Assemble the finalize plan for one attempt.
///
/// Failed attempts skip the progress scans entirely; the transaction only
/// writes the graded result for them. The mark stored on results and
/// lesson rows is the correct-answer count, not a percentage.
pub fn build_finalize_plan(
    store: &Store,
    result: &TestResult,
    lesson: &Lesson,
    final_answers: BTreeMap<String, AnswerEntry>,
    outcome: GradeOutcome,
    now: DateTime<Utc>,
) -> Result<FinalizePlan, StoreError> {
    let (best_prior_mark, word_component_ids, course_lesson_ids) = if outcome.passed {
        let best_prior_mark = store.best_mark(&result.user_id, &result.component_id)?;
        let word_component_ids = store
            .list_word_components_for_lesson(&lesson.id)?
            .into_iter()
            .map(|component| component.id)
            .collect();
        let course_lesson_ids = store.list_lesson_ids_for_course(&lesson.course_id)?;
        (best_prior_mark, word_component_ids, course_lesson_ids)
    } else {
        (0, Vec::new(), Vec::new())
    };

    Ok(FinalizePlan {
        result_id: result.id.clone(),
        user_id: result.user_id.clone(),
        lesson_id: lesson.id.clone(),
        course_id: lesson.course_id.clone(),
        final_answers,
        mark: outcome.correct_count,
        passed: outcome.passed,
        best_prior_mark,
        word_component_ids,
        course_lesson_ids,
        now,
    })
}
