mod common;

use std::time::Duration;

use common::TestServer;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn connect(server: &TestServer, token: &str, topics: &str) -> Socket {
    let url = server.ws_url(&format!("/api/realtime?token={token}&topics={topics}"));
    let (mut socket, _) = connect_async(url.as_str()).await.expect("ws connect");
    let hello = next_json(&mut socket).await.expect("connected frame");
    assert_eq!(hello["event"], "connected");
    assert!(hello["sessionId"].is_string());
    socket
}

/// Next text frame as JSON, or `None` if nothing arrives in time.
async fn next_json(socket: &mut Socket) -> Option<Value> {
    loop {
        let message = timeout(Duration::from_millis(500), socket.next())
            .await
            .ok()??
            .expect("ws frame");
        if let Message::Text(text) = message {
            return Some(serde_json::from_str(&text).expect("json frame"));
        }
    }
}

async fn schedule_operation(server: &TestServer, token: &str, patient: &str) -> Value {
    let res = server
        .client
        .post(server.url("/api/operations"))
        .bearer_auth(token)
        .json(&json!({
            "patient": patient,
            "otNumber": "OT-1",
            "surgeryType": "Appendectomy",
            "surgeons": ["Dr. House"],
            "scheduledDate": "2024-05-01T09:00:00Z"
        }))
        .send()
        .await
        .expect("create operation");
    assert_eq!(res.status(), 201);
    let body: Value = res.json().await.expect("operation body");
    body["data"].clone()
}

#[tokio::test]
async fn subscribers_receive_populated_operation_events() {
    let server = TestServer::start().await;
    let admin = server.admin_token().await;
    let surg = server.department_id(&admin, "SURG").await;
    let patient = server.create_patient(&admin, &surg, false).await;
    let patient_id = patient["id"].as_str().unwrap().to_string();

    let mut operations = connect(&server, &admin, "operation").await;
    let mut medications = connect(&server, &admin, "medication").await;

    let created = schedule_operation(&server, &admin, &patient_id).await;

    let event = next_json(&mut operations).await.expect("operation event");
    assert_eq!(event["event"], "operation-created");
    assert_eq!(event["data"]["id"], created["id"]);
    assert_eq!(event["data"]["patient"]["tokenNumber"], "SURG-001");
    assert!(event["timestamp"].is_string());

    // Filtered out for the medication-only session.
    assert!(next_json(&mut medications).await.is_none());

    server.stop().await;
}

#[tokio::test]
async fn late_sessions_do_not_replay_history() {
    let server = TestServer::start().await;
    let admin = server.admin_token().await;
    let card = server.department_id(&admin, "CARD").await;
    let patient = server.create_patient(&admin, &card, false).await;
    schedule_operation(&server, &admin, patient["id"].as_str().unwrap()).await;

    let mut late = connect(&server, &admin, "all").await;
    assert!(next_json(&mut late).await.is_none());

    server.stop().await;
}

#[tokio::test]
async fn emergency_alerts_reach_every_session() {
    let server = TestServer::start().await;
    let admin = server.admin_token().await;

    let mut sender = connect(&server, &admin, "patient").await;
    let mut listener = connect(&server, &admin, "medication").await;

    sender
        .send(Message::Text(
            json!({"event": "emergency-alert", "data": {"room": "ER-2"}})
                .to_string()
                .into(),
        ))
        .await
        .expect("send alert");

    let alert = next_json(&mut listener).await.expect("alert frame");
    assert_eq!(alert["event"], "emergency-alert");
    assert_eq!(alert["data"]["room"], "ER-2");

    server.stop().await;
}

#[tokio::test]
async fn realtime_requires_a_token() {
    let server = TestServer::start().await;
    let url = server.ws_url("/api/realtime");
    assert!(connect_async(url.as_str()).await.is_err());

    let admin = server.admin_token().await;
    let url = server.ws_url(&format!("/api/realtime?token={admin}&topics=bogus"));
    assert!(connect_async(url.as_str()).await.is_err());

    server.stop().await;
}
