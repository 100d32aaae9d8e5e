//! External providers (chat model, video meetings) against mock HTTP servers.

mod common;

use common::{future_date, start_with, test_config};
use serde_json::{Value, json};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{"message": {"role": "assistant", "content": content}}]
    }))
}

async fn chat(server: &common::TestServer, message: &str) -> Value {
    server
        .client
        .post(server.url("/patient/chat"))
        .json(&json!({
            "message": message,
            "history": [
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": "hello"},
            ],
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn chat_is_offline_without_api_key() {
    let server = start_with(test_config(), |_| {}).await;
    let reply = chat(&server, "I have a headache").await;
    assert_eq!(reply["response"], "AI Service is offline.");
    assert_eq!(reply["recommend_action"], "none");
    assert!(reply.get("department").is_none());
    server.shutdown().await;
}

#[tokio::test]
async fn urgent_symptoms_recommend_booking() {
    let llm = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_string_contains("triage assistant"))
        .respond_with(completion(
            "```json\n{\"danger_level\": \"High\", \"department\": \"Cardiology\", \"advice\": \"Go now\"}\n```",
        ))
        .expect(1)
        .mount(&llm)
        .await;

    let mut cfg = test_config();
    cfg.ai.api_key = Some("test-key".into());
    cfg.ai.base_url = llm.uri();
    let server = start_with(cfg, |_| {}).await;

    let reply = chat(&server, "crushing chest pain").await;
    assert_eq!(reply["recommend_action"], "book_appointment");
    assert_eq!(reply["department"], "Cardiology");
    assert!(reply["response"].as_str().unwrap().contains("ALERT"));
    server.shutdown().await;
}

#[tokio::test]
async fn mild_symptoms_get_a_chat_reply() {
    let llm = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("triage assistant"))
        .respond_with(completion(
            "{\"danger_level\": \"Low\", \"department\": \"General\", \"advice\": \"Rest\"}",
        ))
        .mount(&llm)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("healthcare chatbot"))
        .respond_with(completion("Drink water. You can book an appointment if it persists."))
        .mount(&llm)
        .await;

    let mut cfg = test_config();
    cfg.ai.api_key = Some("test-key".into());
    cfg.ai.base_url = llm.uri();
    let server = start_with(cfg, |_| {}).await;

    let reply = chat(&server, "mild headache").await;
    assert_eq!(reply["response"], "Drink water. You can book an appointment if it persists.");
    assert_eq!(reply["recommend_action"], "book_appointment");
    server.shutdown().await;
}

#[tokio::test]
async fn provider_errors_degrade_to_canned_reply() {
    let llm = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&llm)
        .await;

    let mut cfg = test_config();
    cfg.ai.api_key = Some("test-key".into());
    cfg.ai.base_url = llm.uri();
    let server = start_with(cfg, |_| {}).await;

    let reply = chat(&server, "sore throat").await;
    assert!(reply["response"].as_str().unwrap().starts_with("I'm having trouble"));
    server.shutdown().await;
}

#[tokio::test]
async fn online_booking_uses_the_video_provider() {
    let zoom = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(query_param("grant_type", "account_credentials"))
        .and(query_param("account_id", "acct"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "zoom-token"})))
        .expect(1)
        .mount(&zoom)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/users/me/meetings"))
        .and(header("authorization", "Bearer zoom-token"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"join_url": "https://zoom.example/j/42"})),
        )
        .expect(1)
        .mount(&zoom)
        .await;

    let mut cfg = test_config();
    cfg.video.account_id = Some("acct".into());
    cfg.video.client_id = Some("client".into());
    cfg.video.client_secret = Some("secret".into());
    cfg.video.api_base_url = zoom.uri();
    cfg.video.oauth_url = format!("{}/oauth/token", zoom.uri());
    let server = start_with(cfg, |_| {}).await;

    let (patient_id, token) = server.patient("video@example.com").await;
    let doctor_id = server.doctor_id("Neurology").await;
    let body: Value = server
        .book(&token, patient_id, doctor_id, &future_date(), "16:00", "online")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["zoom_link"], "https://zoom.example/j/42");
    server.shutdown().await;
}

#[tokio::test]
async fn failing_video_provider_falls_back_to_placeholder() {
    let zoom = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&zoom)
        .await;

    let mut cfg = test_config();
    cfg.video.account_id = Some("acct".into());
    cfg.video.client_id = Some("client".into());
    cfg.video.client_secret = Some("secret".into());
    cfg.video.api_base_url = zoom.uri();
    cfg.video.oauth_url = format!("{}/oauth/token", zoom.uri());
    let server = start_with(cfg, |_| {}).await;

    let (patient_id, token) = server.patient("video-fallback@example.com").await;
    let doctor_id = server.doctor_id("Neurology").await;
    let resp = server
        .book(&token, patient_id, doctor_id, &future_date(), "16:30", "online")
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert!(body["zoom_link"].as_str().unwrap().starts_with("https://zoom.us/j/"));
    server.shutdown().await;
}
