//! End-to-end scenarios against a real `TcpListener` + websocket client,
//! covering the join handshake, error taxonomy, and idempotent share
//! submission.

use std::io::Write;
use std::net::SocketAddr;

use dcnet_common::config::Config;
use dcnet_common::types::{ClientMessage, ServerMessage};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

async fn spawn_test_server(config_toml: &str) -> SocketAddr {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{config_toml}").unwrap();
    let config = Config::load(file.path()).unwrap();
    let state = coordinator::AppState::new(config);
    let app = coordinator::router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn connect(
    addr: SocketAddr,
) -> tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>> {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .unwrap();
    ws
}

async fn send(
    ws: &mut tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    msg: &ClientMessage,
) {
    let text = serde_json::to_string(msg).unwrap();
    ws.send(Message::Text(text.into())).await.unwrap();
}

async fn recv(
    ws: &mut tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
) -> ServerMessage {
    loop {
        match ws.next().await.unwrap().unwrap() {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            _ => continue,
        }
    }
}

fn config_with_dir(dir: &tempfile::TempDir) -> String {
    format!(
        r#"
        keys_dir = "{}"

        [group.test]
        password = "password"
        roster = ["Alice", "Bob"]
        "#,
        dir.path().display()
    )
}

#[tokio::test]
async fn join_rejects_wrong_password() {
    let dir = tempfile::tempdir().unwrap();
    let addr = spawn_test_server(&config_with_dir(&dir)).await;
    let mut ws = connect(addr).await;

    send(
        &mut ws,
        &ClientMessage::Join {
            group: "test".into(),
            participant: "Alice".into(),
            password: "wrong".into(),
        },
    )
    .await;

    match recv(&mut ws).await {
        ServerMessage::Error { description } => assert!(description.contains("password")),
        other => panic!("expected error, got {other:?}"),
    }
}

#[tokio::test]
async fn join_unknown_group_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let addr = spawn_test_server(&config_with_dir(&dir)).await;
    let mut ws = connect(addr).await;

    send(
        &mut ws,
        &ClientMessage::Join {
            group: "nope".into(),
            participant: "Alice".into(),
            password: "password".into(),
        },
    )
    .await;

    match recv(&mut ws).await {
        ServerMessage::Error { description } => assert!(description.contains("group")),
        other => panic!("expected error, got {other:?}"),
    }
}

#[tokio::test]
async fn second_join_of_same_roster_triggers_handshake() {
    let dir = tempfile::tempdir().unwrap();
    let addr = spawn_test_server(&config_with_dir(&dir)).await;
    let mut alice = connect(addr).await;
    let mut bob = connect(addr).await;

    send(
        &mut alice,
        &ClientMessage::Join {
            group: "test".into(),
            participant: "Alice".into(),
            password: "password".into(),
        },
    )
    .await;
    match recv(&mut alice).await {
        ServerMessage::Success { active_participants, .. } => {
            assert_eq!(active_participants, Some(vec!["Alice".to_string()]));
        }
        other => panic!("expected success, got {other:?}"),
    }

    send(
        &mut bob,
        &ClientMessage::Join {
            group: "test".into(),
            participant: "Bob".into(),
            password: "password".into(),
        },
    )
    .await;
    match recv(&mut bob).await {
        ServerMessage::Success { active_participants, .. } => {
            assert_eq!(
                active_participants,
                Some(vec!["Alice".to_string(), "Bob".to_string()])
            );
        }
        other => panic!("expected success, got {other:?}"),
    }

    // Alice gets notified that the roster changed, then that the handshake
    // phase has started now that the roster is fully present.
    match recv(&mut alice).await {
        ServerMessage::ActiveParticipantUpdate { active_participants } => {
            assert_eq!(active_participants, vec!["Alice".to_string(), "Bob".to_string()]);
        }
        other => panic!("expected active_participant_update, got {other:?}"),
    }
    match recv(&mut alice).await {
        ServerMessage::GenerateSecrets {} => {}
        other => panic!("expected generate_secrets, got {other:?}"),
    }
    match recv(&mut bob).await {
        ServerMessage::GenerateSecrets {} => {}
        other => panic!("expected generate_secrets, got {other:?}"),
    }
}

#[tokio::test]
async fn duplicate_share_for_same_slot_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let addr = spawn_test_server(&config_with_dir(&dir)).await;
    let mut alice = connect(addr).await;
    let mut bob = connect(addr).await;

    for (ws, name) in [(&mut alice, "Alice"), (&mut bob, "Bob")] {
        send(
            ws,
            &ClientMessage::Join {
                group: "test".into(),
                participant: name.into(),
                password: "password".into(),
            },
        )
        .await;
        let _ = recv(ws).await;
    }
    // Drain the active_participant_update/generate_secrets pushed to Alice.
    let _ = recv(&mut alice).await;
    let _ = recv(&mut alice).await;
    let _ = recv(&mut bob).await;

    // Round 0 doesn't exist yet (no handshake was completed), so submitting
    // against index 0 should fail with "invalid index".
    send(
        &mut alice,
        &ClientMessage::AnonymousBroadcast {
            index: 0,
            message: num_bigint::BigUint::from(0u8).into(),
        },
    )
    .await;
    match recv(&mut alice).await {
        ServerMessage::Error { description } => assert!(description.contains("index")),
        other => panic!("expected error, got {other:?}"),
    }
}
