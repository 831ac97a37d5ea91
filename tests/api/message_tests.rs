//! Message REST API Tests

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;
use uuid::Uuid;

use chat_relay::presentation::websocket::ServerEvent;

use crate::common::{body_json, next_event, TestApp};

#[tokio::test]
async fn test_history_requires_token() {
    let app = TestApp::new().await;
    let conversation = app.instance.store.add_conversation();

    let response = app
        .get(&format!("/api/messages/{}", conversation.id))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_rest_send_reaches_joined_sessions() {
    let app = TestApp::new().await;
    let author = app.instance.store.add_user("author");
    let listener = app.instance.store.add_user("listener");
    let conversation = app.instance.store.add_conversation();
    let (_, mut rx) = app.instance.join(&listener, conversation.id).await;
    let token = app.instance.token_for(&author);

    let response = app
        .send_json_auth(
            "POST",
            &format!("/api/messages/{}", conversation.id),
            &json!({ "text": "over http" }),
            &token,
        )
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"]["content"]["text"], "over http");
    assert_eq!(body["message"]["content"]["type"], "text");
    assert_eq!(body["message"]["sender"]["username"], "author");

    match next_event(&mut rx).await {
        ServerEvent::NewMessage { data } => {
            assert_eq!(data.id.to_string(), body["message"]["id"].as_str().unwrap());
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_send_to_missing_conversation_is_not_found() {
    let app = TestApp::new().await;
    let author = app.instance.store.add_user("author");
    let token = app.instance.token_for(&author);

    let response = app
        .send_json_auth(
            "POST",
            &format!("/api/messages/{}", Uuid::new_v4()),
            &json!({ "text": "lost" }),
            &token,
        )
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_history_and_mark_read() {
    let app = TestApp::new().await;
    let author = app.instance.store.add_user("author");
    let reader = app.instance.store.add_user("reader");
    let conversation = app.instance.store.add_conversation();
    let author_token = app.instance.token_for(&author);
    let reader_token = app.instance.token_for(&reader);

    for text in ["first", "second"] {
        let response = app
            .send_json_auth(
                "POST",
                &format!("/api/messages/{}", conversation.id),
                &json!({ "text": text }),
                &author_token,
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }

    let response = app
        .get_auth(
            &format!("/api/messages/{}?page=1&limit=10", conversation.id),
            &reader_token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let texts: Vec<_> = body["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["content"]["text"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(texts, vec!["first", "second"]);

    let uri = format!("/api/messages/{}/read", conversation.id);
    let first = body_json(
        app.send_json_auth("PATCH", &uri, &json!({}), &reader_token)
            .await,
    )
    .await;
    let second = body_json(
        app.send_json_auth("PATCH", &uri, &json!({}), &reader_token)
            .await,
    )
    .await;

    assert_eq!(first["marked"], 2);
    assert_eq!(second["marked"], 0);
}

#[tokio::test]
async fn test_history_limit_out_of_range_rejected() {
    let app = TestApp::new().await;
    let reader = app.instance.store.add_user("reader");
    let conversation = app.instance.store.add_conversation();
    let token = app.instance.token_for(&reader);

    let response = app
        .get_auth(
            &format!("/api/messages/{}?limit=500", conversation.id),
            &token,
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
