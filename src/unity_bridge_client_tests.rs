use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::server_config::BridgeConfig;
use crate::unity_bridge_client::*;

const GREETING: &[u8] = b"WELCOME UNITY-MCP 1 FRAMING=1\n";

fn test_config(port: u16, retries: u32) -> BridgeConfig {
    BridgeConfig {
        host: "127.0.0.1".to_string(),
        port,
        retries,
        retry_delay: Duration::from_millis(10),
        timeout: Duration::from_secs(5),
    }
}

/// Fake editor that answers each connection with the next reply in `replies`
///
/// Returns the listening port and a handle yielding every request it received.
async fn spawn_fake_editor(greeting: &'static [u8], replies: Vec<Value>) -> (u16, JoinHandle<Vec<Value>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = tokio::spawn(async move {
        let mut received = Vec::new();
        for reply in replies {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(greeting).await.unwrap();
            if !greeting.windows(9).any(|w| w == b"FRAMING=1") {
                continue;
            }
            let request = read_frame(&mut socket).await.unwrap();
            received.push(serde_json::from_slice(&request).unwrap());
            write_frame(&mut socket, reply.to_string().as_bytes()).await.unwrap();
        }
        received
    });
    (port, handle)
}

#[tokio::test]
async fn test_command_round_trip() {
    let (port, editor) = spawn_fake_editor(
        GREETING,
        vec![json!({"status": "success", "result": {"success": true, "message": "Opened"}})],
    )
    .await;
    let client = UnityBridgeClient::new(test_config(port, 0));

    let reply = client
        .send_command("manage_prefabs", json!({"action": "save_open_stage"}), None)
        .await
        .unwrap();
    assert_eq!(reply, json!({"success": true, "message": "Opened"}));

    let received = editor.await.unwrap();
    assert_eq!(
        received,
        vec![json!({"type": "manage_prefabs", "params": {"action": "save_open_stage"}})]
    );
}

#[tokio::test]
async fn test_reloading_reply_is_retried() {
    let (port, editor) = spawn_fake_editor(
        GREETING,
        vec![
            json!({"status": "success", "result": {"state": "reloading"}}),
            json!({"status": "success", "result": {"success": true}}),
        ],
    )
    .await;
    let client = UnityBridgeClient::new(test_config(port, 2));

    let reply = client.send_command_with_retry("manage_prefabs", json!({}), None).await.unwrap();
    assert_eq!(reply, json!({"success": true}));
    assert_eq!(editor.await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_instance_is_sent_with_command() {
    let (port, editor) = spawn_fake_editor(GREETING, vec![json!({"status": "success", "result": {"success": true}})]).await;
    let client = UnityBridgeClient::new(test_config(port, 0));
    client
        .send_command("manage_prefabs", json!({"action": "close_stage"}), Some("MyGame@abc123"))
        .await
        .unwrap();
    assert_eq!(
        editor.await.unwrap(),
        vec![json!({
            "type": "manage_prefabs",
            "params": {"action": "close_stage"},
            "unity_instance": "MyGame@abc123"
        })]
    );
}

#[tokio::test]
async fn test_error_status_becomes_failure_value() {
    let (port, _editor) = spawn_fake_editor(
        GREETING,
        vec![json!({"status": "error", "error": "Unknown command"})],
    )
    .await;
    let client = UnityBridgeClient::new(test_config(port, 0));
    let reply = client.send_command_with_retry("bogus", json!({}), None).await.unwrap();
    assert_eq!(reply, json!({"success": false, "message": "Unknown command"}));
}

#[tokio::test]
async fn test_missing_framing_handshake_is_rejected() {
    let (port, _editor) = spawn_fake_editor(b"HELLO\n", vec![json!({})]).await;
    let client = UnityBridgeClient::new(test_config(port, 3));
    let err = client.send_command_with_retry("manage_prefabs", json!({}), None).await.unwrap_err();
    assert!(matches!(err, BridgeError::Framing(_)));
}

#[tokio::test]
async fn test_connection_refused_after_retries() {
    // Bind then drop to get a port nobody listens on
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let client = UnityBridgeClient::new(test_config(port, 1));
    let err = client.send_command_with_retry("manage_prefabs", json!({}), None).await.unwrap_err();
    assert!(matches!(err, BridgeError::Connect { .. }));
}

#[tokio::test]
async fn test_frame_round_trip_through_buffer() {
    let mut buffer = Vec::<u8>::new();
    write_frame(&mut buffer, b"{\"a\":1}").await.unwrap();
    assert_eq!(&buffer[..8], &7u64.to_be_bytes());
    let mut reader: &[u8] = &buffer;
    assert_eq!(read_frame(&mut reader).await.unwrap(), b"{\"a\":1}");
    assert!(matches!(write_frame(&mut Vec::<u8>::new(), b"").await, Err(BridgeError::Framing(_))));
}
