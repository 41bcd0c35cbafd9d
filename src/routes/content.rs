//! Read-only lesson content for test takers. Tests are delivered without
//! their correct flags; the answer key never leaves the server before
//! grading.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::Router;
use serde::Serialize;

use crate::auth::AuthUser;
use crate::response::{ok, AppError};
use crate::state::AppState;
use crate::store::operations::lessons::ComponentBody;
use crate::store::operations::tests::{Question, QuestionType, Test};

pub fn router() -> Router<AppState> {
    Router::new().route("/:lesson_id", get(get_lesson))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LessonView {
    id: String,
    course_id: String,
    title: String,
    position: u32,
    components: Vec<ComponentView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ComponentView {
    id: String,
    index_in_lesson: u32,
    #[serde(flatten)]
    body: ComponentBodyView,
}

#[derive(Debug, Serialize)]
#[serde(tag = "componentType", rename_all = "lowercase", rename_all_fields = "camelCase")]
enum ComponentBodyView {
    Word { word_id: String },
    Test { test: TestView },
    Paragraph { content: String },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TestView {
    id: String,
    name: String,
    description: String,
    duration_minutes: u32,
    max_attempts: u32,
    questions: Vec<QuestionView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QuestionView {
    id: String,
    content: String,
    question_type: QuestionType,
    answers: Vec<AnswerView>,
}

/// No `correct` flag here.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnswerView {
    id: String,
    content: String,
}

impl TestView {
    fn from_test(test: Test) -> Self {
        Self {
            id: test.id,
            name: test.name,
            description: test.description,
            duration_minutes: test.duration_minutes,
            max_attempts: test.max_attempts,
            questions: test.questions.into_iter().map(QuestionView::from_question).collect(),
        }
    }
}

impl QuestionView {
    fn from_question(question: Question) -> Self {
        Self {
            id: question.id,
            content: question.content,
            question_type: question.question_type,
            answers: question
                .answers
                .into_iter()
                .map(|a| AnswerView {
                    id: a.id,
                    content: a.content,
                })
                .collect(),
        }
    }
}

async fn get_lesson(
    _auth: AuthUser,
    Path(lesson_id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let lesson = state
        .store()
        .get_lesson(&lesson_id)?
        .ok_or_else(|| AppError::not_found("NOT_FOUND", "Lesson not found"))?;

    let mut components = Vec::new();
    for component in state.store().list_components_for_lesson(&lesson_id)? {
        let body = match component.body {
            ComponentBody::Word { word_id } => ComponentBodyView::Word { word_id },
            ComponentBody::Paragraph { content } => ComponentBodyView::Paragraph { content },
            ComponentBody::Test { test_id } => {
                let test = state.store().get_test(&test_id)?.ok_or_else(|| {
                    AppError::internal(&format!("test {test_id} referenced but missing"))
                })?;
                ComponentBodyView::Test {
                    test: TestView::from_test(test),
                }
            }
        };
        components.push(ComponentView {
            id: component.id,
            index_in_lesson: component.index_in_lesson,
            body,
        });
    }

    Ok(ok(LessonView {
        id: lesson.id,
        course_id: lesson.course_id,
        title: lesson.title,
        position: lesson.position,
        components,
    }))
}
