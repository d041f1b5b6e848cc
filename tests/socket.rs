//! End-to-end WebSocket tests.
//!
//! Boots the real router on an ephemeral port and drives it with real
//! WebSocket clients: token-gated upgrades, presence announcements, the
//! access-denied join path, and the optimistic/confirmed move protocol as
//! clients actually observe it.

mod common;

use std::time::Duration;

use common::test_app;
use flowboard::backend::auth::sessions::create_token;
use flowboard::backend::routes::create_router;
use flowboard::backend::server::AppState;
use flowboard::shared::event::SocketUser;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_server(state: AppState) -> std::net::SocketAddr {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn token_for(user: &SocketUser) -> String {
    create_token(
        user.user_id,
        format!("{}@example.com", user.username),
        user.username.clone(),
    )
    .unwrap()
}

async fn connect(addr: std::net::SocketAddr, user: &SocketUser) -> WsClient {
    let url = format!("ws://{}/ws?token={}", addr, token_for(user));
    let (client, _) = connect_async(url).await.unwrap();
    client
}

async fn send(client: &mut WsClient, frame: serde_json::Value) {
    client
        .send(Message::Text(frame.to_string().into()))
        .await
        .unwrap();
}

/// Read frames until one arrives whose `type` matches, or time out.
async fn recv_event(client: &mut WsClient, event_type: &str) -> serde_json::Value {
    let deadline = Duration::from_secs(2);
    loop {
        let message = timeout(deadline, client.next())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {}", event_type))
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = message {
            let event: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
            if event["type"] == event_type {
                return event;
            }
        }
    }
}

#[tokio::test]
async fn upgrade_without_token_is_rejected() {
    let app = test_app().await;
    let addr = spawn_server(app.state.clone()).await;

    let err = connect_async(format!("ws://{}/ws", addr)).await.unwrap_err();
    match err {
        tokio_tungstenite::tungstenite::Error::Http(response) => {
            assert_eq!(response.status(), 401);
        }
        other => panic!("expected HTTP rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn upgrade_with_garbage_token_is_rejected() {
    let app = test_app().await;
    let addr = spawn_server(app.state.clone()).await;

    let err = connect_async(format!("ws://{}/ws?token=not.a.jwt", addr))
        .await
        .unwrap_err();
    match err {
        tokio_tungstenite::tungstenite::Error::Http(response) => {
            assert_eq!(response.status(), 401);
        }
        other => panic!("expected HTTP rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn join_announces_member_and_rejects_outsider() {
    let mut app = test_app().await;
    let bob = app.add_member("bob").await;
    let mallory = SocketUser {
        user_id: uuid::Uuid::new_v4(),
        username: "mallory".to_string(),
    };
    let addr = spawn_server(app.state.clone()).await;

    let mut alice_ws = connect(addr, &app.owner).await;
    send(
        &mut alice_ws,
        serde_json::json!({"type": "join:board", "data": {"boardId": app.board.id}}),
    )
    .await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    // A member's join is announced to the pre-existing member.
    let mut bob_ws = connect(addr, &bob).await;
    send(
        &mut bob_ws,
        serde_json::json!({"type": "join:board", "data": {"boardId": app.board.id}}),
    )
    .await;
    let joined = recv_event(&mut alice_ws, "user:joined").await;
    assert_eq!(joined["data"]["username"], "bob");

    // A non-member gets only an error and never enters the room.
    let mut mallory_ws = connect(addr, &mallory).await;
    send(
        &mut mallory_ws,
        serde_json::json!({"type": "join:board", "data": {"boardId": app.board.id}}),
    )
    .await;
    let error = recv_event(&mut mallory_ws, "error").await;
    assert_eq!(error["data"]["message"], "Access denied to this board");
    assert_eq!(app.state.rooms.member_count(app.board.id).await, 2);
}

#[tokio::test]
async fn move_protocol_as_observed_by_clients() {
    let mut app = test_app().await;
    let bob = app.add_member("bob").await;
    let task = app.seed_task("Carry me", 0).await;
    let addr = spawn_server(app.state.clone()).await;

    let mut alice_ws = connect(addr, &app.owner).await;
    let mut bob_ws = connect(addr, &bob).await;
    for ws in [&mut alice_ws, &mut bob_ws] {
        send(
            ws,
            serde_json::json!({"type": "join:board", "data": {"boardId": app.board.id}}),
        )
        .await;
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    send(
        &mut alice_ws,
        serde_json::json!({
            "type": "task:move",
            "data": {
                "taskId": task.id,
                "fromColumnId": app.board.columns[0].id,
                "toColumnId": app.board.columns[1].id,
                "position": 0,
                "boardId": app.board.id,
            }
        }),
    )
    .await;

    // Bob sees the optimistic frame first (no task body), then the
    // confirmation carrying the authoritative task.
    let optimistic = recv_event(&mut bob_ws, "task:moved").await;
    assert!(optimistic["data"].get("task").is_none());
    assert_eq!(optimistic["data"]["taskId"], task.id.to_string());
    let confirmed = recv_event(&mut bob_ws, "task:moved").await;
    assert!(confirmed["data"]["task"].is_object());
    assert_eq!(
        confirmed["data"]["task"]["columnId"],
        app.board.columns[1].id.to_string()
    );

    // The initiator receives the confirmation (its reconcile signal).
    let alice_confirmed = recv_event(&mut alice_ws, "task:moved").await;
    assert!(alice_confirmed["data"]["task"].is_object());
}

#[tokio::test]
async fn disconnect_is_an_implicit_leave() {
    let mut app = test_app().await;
    let bob = app.add_member("bob").await;
    let addr = spawn_server(app.state.clone()).await;

    let mut alice_ws = connect(addr, &app.owner).await;
    let mut bob_ws = connect(addr, &bob).await;
    for ws in [&mut alice_ws, &mut bob_ws] {
        send(
            ws,
            serde_json::json!({"type": "join:board", "data": {"boardId": app.board.id}}),
        )
        .await;
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    drop(bob_ws);

    let left = recv_event(&mut alice_ws, "user:left").await;
    assert_eq!(left["data"]["username"], "bob");
    assert_eq!(app.state.rooms.member_count(app.board.id).await, 1);
}

#[tokio::test]
async fn typing_indicator_fans_out_to_others_only() {
    let mut app = test_app().await;
    let bob = app.add_member("bob").await;
    let task = app.seed_task("Being discussed", 0).await;
    let addr = spawn_server(app.state.clone()).await;

    let mut alice_ws = connect(addr, &app.owner).await;
    let mut bob_ws = connect(addr, &bob).await;
    for ws in [&mut alice_ws, &mut bob_ws] {
        send(
            ws,
            serde_json::json!({"type": "join:board", "data": {"boardId": app.board.id}}),
        )
        .await;
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    send(
        &mut alice_ws,
        serde_json::json!({"type": "user:start_typing", "data": {"taskId": task.id}}),
    )
    .await;

    let typing = recv_event(&mut bob_ws, "user:typing").await;
    assert_eq!(typing["data"]["username"], "alice");
    assert_eq!(typing["data"]["taskId"], task.id.to_string());

    // The typer hears nothing back; verify by provoking a later event and
    // checking it arrives before any typing echo.
    send(
        &mut alice_ws,
        serde_json::json!({"type": "leave:board", "data": {"boardId": app.board.id}}),
    )
    .await;
    let left = recv_event(&mut bob_ws, "user:left").await;
    assert_eq!(left["data"]["username"], "alice");
}
