use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use screen_pilot::brain::{ChatModel, Conversation, Model};
use screen_pilot::hands::SessionProvider;
use screen_pilot::hands::hosted::HostedProvider;
use screen_pilot::{PixelPoint, Viewport};

#[tokio::test]
async fn chat_model_posts_the_conversation_and_returns_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer secret"))
        .and(body_partial_json(json!({
            "model": "test-model",
            "messages": [
                { "role": "system", "content": "sys" },
                { "role": "user", "content": [
                    { "type": "text", "text": "Task: x" },
                    { "type": "image_url", "image_url": { "url": "https://img/1.png" } }
                ]}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "{\"action\":\"wait\"}" } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut model = ChatModel::new(format!("{}/v1/", server.uri()), "secret", "test-model").unwrap();
    let mut conversation = Conversation::new("sys");
    conversation.push_observation("Task: x", "https://img/1.png");

    let reply = model.decide(&conversation).await.unwrap();
    assert_eq!(reply, r#"{"action":"wait"}"#);
}

#[tokio::test]
async fn chat_model_surfaces_api_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": { "message": "rate limited" }
        })))
        .mount(&server)
        .await;

    let mut model = ChatModel::new(format!("{}/v1", server.uri()), "k", "m").unwrap();
    let err = model
        .decide(&Conversation::new("sys"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("rate limited"), "{err}");
}

#[tokio::test]
async fn hosted_session_lifecycle() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/computers"))
        .and(body_partial_json(json!({ "kind": "browser" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "c-42" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/computers/c-42/execute"))
        .and(body_partial_json(json!({ "action": { "type": "screenshot" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "result": { "screenshot_url": "https://cdn.test/s.png" },
            "page_context": { "viewport_width": 1280, "viewport_height": 800 }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/computers/c-42/execute"))
        .and(body_partial_json(json!({ "action": { "type": "click", "x": 640, "y": 200 } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "success" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/computers/c-42"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let provider = HostedProvider::new(server.uri(), "k").unwrap();
    let mut session = provider.create().await.unwrap();
    assert_eq!(session.id(), "c-42");

    let shot = session.screenshot().await.unwrap();
    assert_eq!(shot.image_url, "https://cdn.test/s.png");
    assert_eq!(
        shot.viewport,
        Viewport {
            width: 1280,
            height: 800
        }
    );

    session.click(PixelPoint { x: 640, y: 200 }).await.unwrap();
    session.close().await.unwrap();
}

#[tokio::test]
async fn hosted_navigation_failure_is_a_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/computers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "computer_id": "c-1" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/computers/c-1/execute"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "error",
            "error_message": "net::ERR_NAME_NOT_RESOLVED"
        })))
        .mount(&server)
        .await;

    let provider = HostedProvider::new(server.uri(), "k").unwrap();
    let mut session = provider.create().await.unwrap();
    let err = session.navigate("https://nowhere.invalid").await.unwrap_err();
    assert!(err.is_rejection());
    assert!(err.to_string().contains("ERR_NAME_NOT_RESOLVED"));
}

#[tokio::test]
async fn hosted_screenshot_without_payload_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/computers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "c-2" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/computers/c-2/execute"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "success" })))
        .mount(&server)
        .await;

    let provider = HostedProvider::new(server.uri(), "k").unwrap();
    let mut session = provider.create().await.unwrap();
    let err = session.screenshot().await.unwrap_err();
    assert!(!err.is_rejection());
    assert!(err.to_string().contains("screenshot_url"));
}

#[tokio::test]
async fn refused_creation_reports_the_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/computers"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let provider = HostedProvider::new(server.uri(), "k").unwrap();
    let err = match provider.create().await {
        Ok(_) => panic!("creation should fail"),
        Err(e) => e,
    };
    assert!(err.to_string().contains("401"));
    assert!(err.to_string().contains("bad key"));
}
