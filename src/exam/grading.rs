//! Grading engine: a pure function of the attempt's saved answers and the
//! test's answer key. No hidden state, so re-running it on the same inputs
//! yields the same outcome; the lifecycle's submitted guard is what makes
//! it execute once per attempt.

use std::collections::{BTreeMap, HashSet};

use crate::store::operations::test_results::AnswerEntry;
use crate::store::operations::tests::Question;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradeOutcome {
    pub passed: bool,
    pub correct_count: u32,
    pub total_questions: u32,
}

/// Score an answer map against the test's questions.
///
/// Questions are processed in id order. A question counts as correct iff
/// the selected answer set equals the correct answer set exactly; extra or
/// missing selections score zero for that question. Unanswered questions
/// grade against an empty selection. The percentage is recomputed from the
/// counts every time, rounded to two decimals, and 0 when the test has no
/// questions.
pub fn grade(
    questions: &[Question],
    saved_answers: &BTreeMap<String, AnswerEntry>,
    pass_percentage: f64,
) -> (BTreeMap<String, AnswerEntry>, GradeOutcome) {
    let mut ordered: Vec<&Question> = questions.iter().collect();
    ordered.sort_by(|a, b| a.id.cmp(&b.id));

    let mut final_answers = BTreeMap::new();
    let mut correct_count = 0u32;

    for question in &ordered {
        let selected_answer_ids: Vec<String> = saved_answers
            .get(&question.id)
            .map(|entry| entry.selected_answer_ids().to_vec())
            .unwrap_or_default();
        let correct_answer_ids = question.correct_answer_ids();

        let selected_set: HashSet<&str> =
            selected_answer_ids.iter().map(|s| s.as_str()).collect();
        let correct_set: HashSet<&str> =
            correct_answer_ids.iter().map(|s| s.as_str()).collect();
        let is_correct = selected_set == correct_set;
        if is_correct {
            correct_count += 1;
        }

        final_answers.insert(
            question.id.clone(),
            AnswerEntry::Graded {
                question_id: question.id.clone(),
                selected_answer_ids,
                correct_answer_ids,
                is_correct,
            },
        );
    }

    let total_questions = ordered.len() as u32;
    let passed = score_percentage(correct_count, total_questions) >= pass_percentage;

    (
        final_answers,
        GradeOutcome {
            passed,
            correct_count,
            total_questions,
        },
    )
}

pub fn score_percentage(correct_count: u32, total_questions: u32) -> f64 {
    if total_questions == 0 {
        return 0.0;
    }
    let raw = f64::from(correct_count) / f64::from(total_questions) * 100.0;
    (raw * 100.0).round() / 100.0
}
