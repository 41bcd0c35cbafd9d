mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::app::spawn_test_app;
use common::auth::{auth_header, token_for};
use common::fixtures::{enrol, seed_course, LESSON_ID, WORD_COMPONENT_ID};
use common::http::{assert_json_error, assert_status_ok_json, request, response_json};

const USER: &str = "user-1";

#[tokio::test]
async fn it_requires_authentication() {
    let app = spawn_test_app().await;
    seed_course(app.state.store());

    let resp = request(
        &app.app,
        Method::POST,
        &format!("/api/lessons/{LESSON_ID}/attempts"),
        None,
        &[],
    )
    .await;
    let (status, _, body) = response_json(resp).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_json_error(&body, "AUTH_UNAUTHORIZED");
}

#[tokio::test]
async fn it_starts_and_resumes_an_attempt() {
    let app = spawn_test_app().await;
    seed_course(app.state.store());
    enrol(app.state.store(), USER);
    let token = token_for(&app, USER);
    let headers = [("authorization", auth_header(&token))];

    let resp = request(
        &app.app,
        Method::POST,
        &format!("/api/lessons/{LESSON_ID}/attempts"),
        None,
        &headers,
    )
    .await;
    let (status, _, body) = response_json(resp).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["attemptNumber"], 1);
    assert_eq!(body["data"]["maxAttempts"], 2);
    assert_eq!(body["data"]["remainingAttempts"], 1);
    assert_eq!(body["data"]["resumed"], false);
    assert_eq!(body["data"]["remainingTimeSecs"], 600);
    let attempt_id = body["data"]["testResultId"].as_str().unwrap().to_string();

    // Starting again resumes the same attempt.
    let resp = request(
        &app.app,
        Method::POST,
        &format!("/api/lessons/{LESSON_ID}/attempts"),
        None,
        &headers,
    )
    .await;
    let (status, _, body) = response_json(resp).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["resumed"], true);
    assert_eq!(body["data"]["testResultId"], attempt_id.as_str());
}

#[tokio::test]
async fn it_starting_an_unknown_lesson_is_404() {
    let app = spawn_test_app().await;
    seed_course(app.state.store());
    let token = token_for(&app, USER);

    let resp = request(
        &app.app,
        Method::POST,
        "/api/lessons/unknown/attempts",
        None,
        &[("authorization", auth_header(&token))],
    )
    .await;
    let (status, _, body) = response_json(resp).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_json_error(&body, "COMPONENT_NOT_FOUND");
}

#[tokio::test]
async fn it_runs_the_full_pass_flow() {
    let app = spawn_test_app().await;
    seed_course(app.state.store());
    enrol(app.state.store(), USER);
    let token = token_for(&app, USER);
    let headers = [("authorization", auth_header(&token))];

    let resp = request(
        &app.app,
        Method::POST,
        &format!("/api/lessons/{LESSON_ID}/attempts"),
        None,
        &headers,
    )
    .await;
    let (_, _, body) = response_json(resp).await;
    let attempt_id = body["data"]["testResultId"].as_str().unwrap().to_string();

    // Draft one answer first.
    let resp = request(
        &app.app,
        Method::PUT,
        &format!("/api/attempts/{attempt_id}/draft"),
        Some(json!({ "answers": { "q1": ["a1"] } })),
        &headers,
    )
    .await;
    let (status, _, body) = response_json(resp).await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["saved"], true);

    // The countdown is still running.
    let resp = request(
        &app.app,
        Method::GET,
        &format!("/api/attempts/{attempt_id}/remaining-time"),
        None,
        &headers,
    )
    .await;
    let (status, _, body) = response_json(resp).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["submitted"], false);
    let remaining = body["data"]["remainingTimeSecs"].as_i64().unwrap();
    assert!(remaining > 0 && remaining <= 600);

    // Submit with the full answer set.
    let resp = request(
        &app.app,
        Method::POST,
        &format!("/api/attempts/{attempt_id}/submit"),
        Some(json!({ "answers": { "q1": ["a1"], "q2": ["b1", "b2"] } })),
        &headers,
    )
    .await;
    let (status, _, body) = response_json(resp).await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["passed"], true);
    assert_eq!(body["data"]["correctCount"], 2);
    assert_eq!(body["data"]["totalQuestions"], 2);
    assert_eq!(body["data"]["scorePercentage"], 100.0);
    assert_eq!(body["data"]["remainingAttempts"], 1);

    // The graded result now exposes the correct answer ids.
    let resp = request(
        &app.app,
        Method::GET,
        &format!("/api/attempts/{attempt_id}"),
        None,
        &headers,
    )
    .await;
    let (status, _, body) = response_json(resp).await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["submitted"], true);
    assert_eq!(body["data"]["status"], "passed");
    assert_eq!(body["data"]["mark"], 2);
    assert_eq!(body["data"]["userAnswers"]["q2"]["isCorrect"], true);
    assert_eq!(
        body["data"]["userAnswers"]["q2"]["correctAnswerIds"],
        json!(["b1", "b2"])
    );

    // Progress side effects are visible through the store.
    let user_lesson = app
        .state
        .store()
        .get_user_lesson(USER, LESSON_ID)
        .unwrap()
        .unwrap();
    assert_eq!(user_lesson.grade, 2);
    assert!(app
        .state
        .store()
        .has_user_word(USER, WORD_COMPONENT_ID)
        .unwrap());
    let user_course = app
        .state
        .store()
        .get_user_course(USER, common::fixtures::COURSE_ID)
        .unwrap()
        .unwrap();
    assert_eq!(user_course.progress, 100);
}

#[tokio::test]
async fn it_rejects_a_second_submit() {
    let app = spawn_test_app().await;
    seed_course(app.state.store());
    enrol(app.state.store(), USER);
    let token = token_for(&app, USER);
    let headers = [("authorization", auth_header(&token))];

    let resp = request(
        &app.app,
        Method::POST,
        &format!("/api/lessons/{LESSON_ID}/attempts"),
        None,
        &headers,
    )
    .await;
    let (_, _, body) = response_json(resp).await;
    let attempt_id = body["data"]["testResultId"].as_str().unwrap().to_string();

    let submit = json!({ "answers": { "q1": ["a1"] } });
    let resp = request(
        &app.app,
        Method::POST,
        &format!("/api/attempts/{attempt_id}/submit"),
        Some(submit.clone()),
        &headers,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = request(
        &app.app,
        Method::POST,
        &format!("/api/attempts/{attempt_id}/submit"),
        Some(submit),
        &headers,
    )
    .await;
    let (status, _, body) = response_json(resp).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_json_error(&body, "ALREADY_SUBMITTED");

    // Draft saves are also rejected after grading.
    let resp = request(
        &app.app,
        Method::PUT,
        &format!("/api/attempts/{attempt_id}/draft"),
        Some(json!({ "answers": {} })),
        &headers,
    )
    .await;
    let (status, _, body) = response_json(resp).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_json_error(&body, "ALREADY_SUBMITTED");
}

#[tokio::test]
async fn it_enforces_the_attempt_limit() {
    let app = spawn_test_app().await;
    seed_course(app.state.store());
    enrol(app.state.store(), USER);
    let token = token_for(&app, USER);
    let headers = [("authorization", auth_header(&token))];

    for _ in 0..2 {
        let resp = request(
            &app.app,
            Method::POST,
            &format!("/api/lessons/{LESSON_ID}/attempts"),
            None,
            &headers,
        )
        .await;
        let (_, _, body) = response_json(resp).await;
        let attempt_id = body["data"]["testResultId"].as_str().unwrap().to_string();
        let resp = request(
            &app.app,
            Method::POST,
            &format!("/api/attempts/{attempt_id}/submit"),
            Some(json!({ "answers": {} })),
            &headers,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let resp = request(
        &app.app,
        Method::POST,
        &format!("/api/lessons/{LESSON_ID}/attempts"),
        None,
        &headers,
    )
    .await;
    let (status, _, body) = response_json(resp).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_json_error(&body, "MAX_ATTEMPTS_REACHED");
}

#[tokio::test]
async fn it_hides_other_users_attempts() {
    let app = spawn_test_app().await;
    seed_course(app.state.store());
    enrol(app.state.store(), USER);
    let token = token_for(&app, USER);

    let resp = request(
        &app.app,
        Method::POST,
        &format!("/api/lessons/{LESSON_ID}/attempts"),
        None,
        &[("authorization", auth_header(&token))],
    )
    .await;
    let (_, _, body) = response_json(resp).await;
    let attempt_id = body["data"]["testResultId"].as_str().unwrap().to_string();

    let other_token = token_for(&app, "someone-else");
    let resp = request(
        &app.app,
        Method::GET,
        &format!("/api/attempts/{attempt_id}"),
        None,
        &[("authorization", auth_header(&other_token))],
    )
    .await;
    let (status, _, body) = response_json(resp).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_json_error(&body, "NOT_FOUND");
}

#[tokio::test]
async fn it_lists_the_users_attempt_history() {
    let app = spawn_test_app().await;
    seed_course(app.state.store());
    enrol(app.state.store(), USER);
    let token = token_for(&app, USER);
    let headers = [("authorization", auth_header(&token))];

    let resp = request(
        &app.app,
        Method::POST,
        &format!("/api/lessons/{LESSON_ID}/attempts"),
        None,
        &headers,
    )
    .await;
    let (_, _, body) = response_json(resp).await;
    let attempt_id = body["data"]["testResultId"].as_str().unwrap().to_string();
    let resp = request(
        &app.app,
        Method::POST,
        &format!("/api/attempts/{attempt_id}/submit"),
        Some(json!({ "answers": { "q1": ["a1"] } })),
        &headers,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = request(
        &app.app,
        Method::GET,
        &format!("/api/lessons/{LESSON_ID}/attempts"),
        None,
        &headers,
    )
    .await;
    let (status, _, body) = response_json(resp).await;
    assert_status_ok_json(status, &body);
    let attempts = body["data"].as_array().unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0]["id"], attempt_id.as_str());
    assert_eq!(attempts[0]["attemptNumber"], 1);
    assert_eq!(attempts[0]["submitted"], true);
    assert_eq!(attempts[0]["status"], "failed");
}

#[tokio::test]
async fn it_delivers_lessons_without_the_answer_key() {
    let app = spawn_test_app().await;
    seed_course(app.state.store());
    let token = token_for(&app, USER);

    let resp = request(
        &app.app,
        Method::GET,
        &format!("/api/lessons/{LESSON_ID}"),
        None,
        &[("authorization", auth_header(&token))],
    )
    .await;
    let (status, _, body) = response_json(resp).await;
    assert_status_ok_json(status, &body);

    let components = body["data"]["components"].as_array().unwrap();
    assert_eq!(components.len(), 2);
    assert_eq!(components[0]["componentType"], "word");

    let test = &components[1]["test"];
    assert_eq!(test["maxAttempts"], 2);
    let questions = test["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 2);
    for question in questions {
        for answer in question["answers"].as_array().unwrap() {
            assert!(answer.get("correct").is_none(), "answer key leaked: {answer}");
        }
    }
}
