// tests/api_tests.rs

use std::sync::Arc;

use quizhub::{config::Config, routes, state::AppState, store::SqliteQuizStore};
use serde_json::{Value, json};

/// Helper function to spawn the app on a random port for testing.
/// Every call gets its own in-memory database.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
async fn spawn_app() -> String {
    let store = SqliteQuizStore::open_in_memory()
        .await
        .expect("Failed to open in-memory store");

    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        submit_grace_seconds: 30,
        port: 0,
        rust_log: "error".to_string(),
        cors_origins: vec!["http://localhost:3000".to_string()],
    };

    let app = routes::create_router(AppState {
        store: Arc::new(store),
        config,
    });

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

/// Registers a user and returns (token, user id).
async fn register(client: &reqwest::Client, address: &str, email: &str) -> (String, String) {
    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&json!({ "email": email, "password": "password123" }))
        .send()
        .await
        .expect("Register failed");
    assert_eq!(response.status().as_u16(), 201);

    let body: Value = response.json().await.unwrap();
    (
        body["token"].as_str().expect("Token not found").to_string(),
        body["user"]["id"].as_str().expect("User id not found").to_string(),
    )
}

fn quiz_body(title: &str, status: &str) -> Value {
    json!({
        "title": title,
        "description": "Geography basics",
        "time_limit": 10,
        "status": status,
        "questions": [
            {
                "question_text": "Capital of France?",
                "option1": "Berlin", "option2": "Paris", "option3": "Rome", "option4": "Madrid",
                "correct_option": 2
            },
            {
                "question_text": "Largest ocean?",
                "option1": "Atlantic", "option2": "Indian", "option3": "Arctic", "option4": "Pacific",
                "correct_option": 4
            }
        ]
    })
}

async fn create_quiz(client: &reqwest::Client, address: &str, token: &str, body: &Value) -> String {
    let response = client
        .post(format!("{}/api/quizzes", address))
        .bearer_auth(token)
        .json(body)
        .send()
        .await
        .expect("Create quiz failed");
    assert_eq!(response.status().as_u16(), 201);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["quiz"]["question_count"], 2);
    body["quiz"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_check_404() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Route not found");
}

#[tokio::test]
async fn health_check_ok() {
    let address = spawn_app().await;
    let response = reqwest::get(format!("{}/api/health", address)).await.unwrap();

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn register_fails_validation() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    for payload in [
        json!({ "email": "not-an-email", "password": "password123" }),
        json!({ "email": "short@example.com", "password": "123" }),
        json!({ "password": "password123" }),
    ] {
        let response = client
            .post(format!("{}/api/auth/register", address))
            .json(&payload)
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 400, "payload: {}", payload);
    }
}

#[tokio::test]
async fn register_duplicate_email_is_400() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    register(&client, &address, "dup@example.com").await;

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&json!({ "email": "dup@example.com", "password": "password123" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "User already exists");
}

#[tokio::test]
async fn login_checks_credentials() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    register(&client, &address, "login@example.com").await;

    let ok = client
        .post(format!("{}/api/auth/login", address))
        .json(&json!({ "email": "login@example.com", "password": "password123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(ok.status().as_u16(), 200);
    let body: Value = ok.json().await.unwrap();
    assert!(body["token"].as_str().is_some());

    let bad = client
        .post(format!("{}/api/auth/login", address))
        .json(&json!({ "email": "login@example.com", "password": "wrong-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad.status().as_u16(), 401);
}

#[tokio::test]
async fn protected_routes_require_token() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/quizzes", address))
        .json(&quiz_body("No auth", "draft"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);

    let response = client
        .get(format!("{}/api/attempts/my-attempts", address))
        .bearer_auth("garbage")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn invalid_quiz_is_rejected() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (token, _) = register(&client, &address, "author@example.com").await;

    let mut body = quiz_body("Broken", "draft");
    body["questions"][1]["correct_option"] = json!(5);

    let response = client
        .post(format!("{}/api/quizzes", address))
        .bearer_auth(&token)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let mine: Vec<Value> = client
        .get(format!("{}/api/quizzes/my-quizzes", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(mine.is_empty());
}

#[tokio::test]
async fn non_owner_cannot_modify_quiz() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (author, _) = register(&client, &address, "owner@example.com").await;
    let (stranger, _) = register(&client, &address, "stranger@example.com").await;
    let quiz_id = create_quiz(&client, &address, &author, &quiz_body("Owned", "draft")).await;

    let update = client
        .put(format!("{}/api/quizzes/{}", address, quiz_id))
        .bearer_auth(&stranger)
        .json(&quiz_body("Hijacked", "published"))
        .send()
        .await
        .unwrap();
    assert_eq!(update.status().as_u16(), 403);

    let delete = client
        .delete(format!("{}/api/quizzes/{}", address, quiz_id))
        .bearer_auth(&stranger)
        .send()
        .await
        .unwrap();
    assert_eq!(delete.status().as_u16(), 403);

    let full = client
        .get(format!("{}/api/quizzes/{}/full", address, quiz_id))
        .bearer_auth(&stranger)
        .send()
        .await
        .unwrap();
    assert_eq!(full.status().as_u16(), 403);

    let quiz: Value = client
        .get(format!("{}/api/quizzes/{}/full", address, quiz_id))
        .bearer_auth(&author)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(quiz["title"], "Owned");
    assert_eq!(quiz["questions"][0]["correct_option"], 2);
}

#[tokio::test]
async fn delete_removes_quiz_and_attempts() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (author, _) = register(&client, &address, "a@example.com").await;
    let (taker, _) = register(&client, &address, "b@example.com").await;
    let quiz_id = create_quiz(&client, &address, &author, &quiz_body("Temp", "published")).await;

    let submit = client
        .post(format!("{}/api/quizzes/{}/submit", address, quiz_id))
        .bearer_auth(&taker)
        .json(&json!({ "answers": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(submit.status().as_u16(), 200);

    let delete = client
        .delete(format!("{}/api/quizzes/{}", address, quiz_id))
        .bearer_auth(&author)
        .send()
        .await
        .unwrap();
    assert_eq!(delete.status().as_u16(), 200);

    let get = client
        .get(format!("{}/api/quizzes/{}", address, quiz_id))
        .send()
        .await
        .unwrap();
    assert_eq!(get.status().as_u16(), 404);

    let attempts: Vec<Value> = client
        .get(format!("{}/api/attempts/my-attempts", address))
        .bearer_auth(&taker)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(attempts.is_empty());
}

#[tokio::test]
async fn timed_attempt_flow() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (author, _) = register(&client, &address, "timer@example.com").await;
    let (taker, _) = register(&client, &address, "runner@example.com").await;
    let quiz_id = create_quiz(&client, &address, &author, &quiz_body("Timed", "published")).await;

    let started: Value = client
        .post(format!("{}/api/quizzes/{}/start", address, quiz_id))
        .bearer_auth(&taker)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let attempt_token = started["attempt_token"].as_str().unwrap();
    assert!(started["quiz"]["questions"][0].get("correct_option").is_none());
    let first_question = started["quiz"]["questions"][0]["id"].clone();

    // A token issued to someone else is refused and nothing is recorded.
    let stolen = client
        .post(format!("{}/api/quizzes/{}/submit", address, quiz_id))
        .bearer_auth(&author)
        .json(&json!({ "answers": [], "attempt_token": attempt_token }))
        .send()
        .await
        .unwrap();
    assert_eq!(stolen.status().as_u16(), 400);

    let result: Value = client
        .post(format!("{}/api/quizzes/{}/submit", address, quiz_id))
        .bearer_auth(&taker)
        .json(&json!({
            "answers": [{ "question_id": first_question, "selected_option": 2 }],
            "attempt_token": attempt_token
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(result["score"], 1);
    assert_eq!(result["total"], 2);
}

/// Register A, create and publish, register B, B lists, takes, submits, histories differ.
#[tokio::test]
async fn end_to_end_quiz_lifecycle() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // 1. A registers and creates a draft quiz with 2 questions
    let (token_a, _) = register(&client, &address, "alice@example.com").await;
    let quiz_id = create_quiz(&client, &address, &token_a, &quiz_body("World quiz", "draft")).await;

    // Drafts are not listed publicly
    let published: Vec<Value> = reqwest::get(format!("{}/api/quizzes/published", address))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(published.is_empty());

    // 2. A publishes it
    let update = client
        .put(format!("{}/api/quizzes/{}", address, quiz_id))
        .bearer_auth(&token_a)
        .json(&quiz_body("World quiz", "published"))
        .send()
        .await
        .unwrap();
    assert_eq!(update.status().as_u16(), 200);

    // 3. B registers and sees the quiz in the published list
    let (token_b, _) = register(&client, &address, "bob@example.com").await;
    let published: Vec<Value> = reqwest::get(format!("{}/api/quizzes/published", address))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0]["id"], quiz_id.as_str());
    assert_eq!(published[0]["question_count"], 2);
    assert_eq!(published[0]["author_email"], "alice@example.com");

    // 4. B fetches the quiz (no answers exposed) and submits one right, one wrong
    let quiz: Value = reqwest::get(format!("{}/api/quizzes/{}", address, quiz_id))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let questions = quiz["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 2);
    assert!(questions.iter().all(|q| q.get("correct_option").is_none()));

    let submit = client
        .post(format!("{}/api/quizzes/{}/submit", address, quiz_id))
        .bearer_auth(&token_b)
        .json(&json!({
            "answers": [
                { "question_id": questions[0]["id"], "selected_option": 2 },
                { "question_id": questions[1]["id"], "selected_option": 1 }
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(submit.status().as_u16(), 200);
    let result: Value = submit.json().await.unwrap();
    assert_eq!(result["score"], 1);
    assert_eq!(result["total"], 2);

    // 5. A's history is empty, B's has one 1/2 attempt
    let history_a: Vec<Value> = client
        .get(format!("{}/api/attempts/my-attempts", address))
        .bearer_auth(&token_a)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(history_a.is_empty());

    let history_b: Vec<Value> = client
        .get(format!("{}/api/attempts/my-attempts", address))
        .bearer_auth(&token_b)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history_b.len(), 1);
    assert_eq!(history_b[0]["score"], 1);
    assert_eq!(history_b[0]["total_questions"], 2);
    assert_eq!(history_b[0]["quiz_title"], "World quiz");
}
