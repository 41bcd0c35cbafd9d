use chrono::Utc;

use elearn_backend::store::operations::courses::Course;
use elearn_backend::store::operations::lessons::{Component, ComponentBody, Lesson};
use elearn_backend::store::operations::tests::{Answer, Question, QuestionType, Test};
use elearn_backend::store::operations::user_progress::{EnrolmentStatus, UserCourse};
use elearn_backend::store::Store;

pub const COURSE_ID: &str = "course-1";
pub const LESSON_ID: &str = "lesson-1";
pub const TEST_COMPONENT_ID: &str = "component-test";
pub const WORD_COMPONENT_ID: &str = "component-word";
pub const TEST_ID: &str = "test-1";

/// One course with a single lesson containing a word component and a
/// two-question test: q1 has a1 correct, q2 has b1 and b2 correct. Two
/// attempts allowed, ten minute window.
pub fn seed_course(store: &Store) {
    store
        .put_course(&Course {
            id: COURSE_ID.into(),
            name: "Beginner English".into(),
            description: "First steps".into(),
            created_at: Utc::now(),
        })
        .expect("seed course");
    store
        .put_lesson(&Lesson {
            id: LESSON_ID.into(),
            course_id: COURSE_ID.into(),
            title: "Lesson one".into(),
            position: 0,
            created_at: Utc::now(),
        })
        .expect("seed lesson");
    store
        .put_component(&Component {
            id: WORD_COMPONENT_ID.into(),
            lesson_id: LESSON_ID.into(),
            index_in_lesson: 0,
            body: ComponentBody::Word {
                word_id: "word-1".into(),
            },
        })
        .expect("seed word component");
    store
        .put_component(&Component {
            id: TEST_COMPONENT_ID.into(),
            lesson_id: LESSON_ID.into(),
            index_in_lesson: 1,
            body: ComponentBody::Test {
                test_id: TEST_ID.into(),
            },
        })
        .expect("seed test component");
    store
        .put_test(&Test {
            id: TEST_ID.into(),
            name: "Lesson one test".into(),
            description: "Covers the first lesson".into(),
            duration_minutes: 10,
            max_attempts: 2,
            questions: vec![
                Question {
                    id: "q1".into(),
                    content: "Pick the right word".into(),
                    question_type: QuestionType::SingleChoice,
                    answers: vec![
                        Answer {
                            id: "a1".into(),
                            content: "right".into(),
                            correct: true,
                        },
                        Answer {
                            id: "a2".into(),
                            content: "wrong".into(),
                            correct: false,
                        },
                    ],
                },
                Question {
                    id: "q2".into(),
                    content: "Pick all that apply".into(),
                    question_type: QuestionType::MultipleChoice,
                    answers: vec![
                        Answer {
                            id: "b1".into(),
                            content: "first right".into(),
                            correct: true,
                        },
                        Answer {
                            id: "b2".into(),
                            content: "second right".into(),
                            correct: true,
                        },
                        Answer {
                            id: "b3".into(),
                            content: "wrong".into(),
                            correct: false,
                        },
                    ],
                },
            ],
            created_at: Utc::now(),
        })
        .expect("seed test");
}

pub fn enrol(store: &Store, user_id: &str) {
    store
        .put_user_course(&UserCourse {
            user_id: user_id.into(),
            course_id: COURSE_ID.into(),
            enrolment_status: EnrolmentStatus::Approved,
            progress: 0,
            start_date: Some(Utc::now()),
            end_date: None,
        })
        .expect("seed enrolment");
}
