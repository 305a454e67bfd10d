use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};

use crate::server_config::BridgeConfig;
use crate::{debug_log, warn_log};

/// Largest frame accepted from or sent to the editor
pub const MAX_FRAME_BYTES: u64 = 64 * 1024 * 1024;

/// Longest greeting line the editor may send
const MAX_HANDSHAKE_BYTES: u64 = 256;

/// Errors that can occur while talking to the Unity Editor bridge
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Failed to connect to Unity at {address}: {source}")]
    Connect {
        address: String,
        source: std::io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Timeout error: {0}")]
    Timeout(String),
    #[error("Framing error: {0}")]
    Framing(String),
    #[error("Invalid JSON from Unity: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl BridgeError {
    /// Whether another attempt on a fresh connection may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BridgeError::Connect { .. } | BridgeError::Io(_) | BridgeError::Timeout(_)
        )
    }
}

/// Sends a named command with parameters to a Unity Editor and returns its reply
///
/// `instance` names the editor the command is meant for when several are running.
#[async_trait]
pub trait CommandTransport: Send + Sync {
    async fn send_command(
        &self,
        command: &str,
        params: Value,
        instance: Option<&str>,
    ) -> Result<Value, BridgeError>;
}

/// Client for the editor's framed JSON command bridge
///
/// Every attempt opens a new TCP connection, waits for the editor's greeting,
/// sends one frame and reads one frame back.
#[derive(Debug, Clone)]
pub struct UnityBridgeClient {
    config: BridgeConfig,
}

/// Outcome of one round trip
#[derive(Debug, PartialEq)]
enum Reply {
    Done(Value),
    /// The editor is reloading its domain and could not run the command
    Reloading(Value),
}

impl UnityBridgeClient {
    pub fn new(config: BridgeConfig) -> Self {
        Self { config }
    }

    /// Address of the editor bridge, `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    /// Sends a command, retrying connection failures and editor reloads
    pub async fn send_command_with_retry(
        &self,
        command: &str,
        params: Value,
        instance: Option<&str>,
    ) -> Result<Value, BridgeError> {
        let payload = serde_json::to_vec(&command_payload(command, params, instance))?;
        let mut attempt: u32 = 0;
        loop {
            match timeout(self.config.timeout, self.send_once(&payload)).await {
                Ok(Ok(Reply::Done(value))) => return Ok(value),
                Ok(Ok(Reply::Reloading(value))) => {
                    if attempt >= self.config.retries {
                        return Ok(value);
                    }
                    warn_log!("Unity is reloading, retrying '{}' (attempt {})", command, attempt + 1);
                }
                Ok(Err(e)) => {
                    if !e.is_retryable() || attempt >= self.config.retries {
                        return Err(e);
                    }
                    warn_log!("Unity bridge command '{}' failed: {}, retrying (attempt {})", command, e, attempt + 1);
                }
                Err(_) => {
                    let e = BridgeError::Timeout(format!(
                        "no reply to '{}' within {:?}",
                        command, self.config.timeout
                    ));
                    if attempt >= self.config.retries {
                        return Err(e);
                    }
                    warn_log!("{}, retrying (attempt {})", e, attempt + 1);
                }
            }
            attempt += 1;
            sleep(self.config.retry_delay).await;
        }
    }

    async fn send_once(&self, payload: &[u8]) -> Result<Reply, BridgeError> {
        let address = self.address();
        let stream = TcpStream::connect(&address)
            .await
            .map_err(|source| BridgeError::Connect {
                address: address.clone(),
                source,
            })?;
        let mut stream = BufReader::new(stream);

        let mut greeting = String::new();
        (&mut stream).take(MAX_HANDSHAKE_BYTES).read_line(&mut greeting).await?;
        if !greeting.contains("FRAMING=1") {
            return Err(BridgeError::Framing(format!(
                "unexpected handshake from Unity: '{}'",
                greeting.trim()
            )));
        }
        debug_log!("Connected to Unity bridge at {}: {}", address, greeting.trim());

        write_frame(stream.get_mut(), payload).await?;
        let reply = read_frame(&mut stream).await?;
        interpret_reply(serde_json::from_slice(&reply)?)
    }
}

#[async_trait]
impl CommandTransport for UnityBridgeClient {
    async fn send_command(
        &self,
        command: &str,
        params: Value,
        instance: Option<&str>,
    ) -> Result<Value, BridgeError> {
        self.send_command_with_retry(command, params, instance).await
    }
}

/// Request body sent in one frame: `{type, params}` plus `unity_instance` when targeted
fn command_payload(command: &str, params: Value, instance: Option<&str>) -> Value {
    let mut payload = json!({ "type": command, "params": params });
    if let Some(instance) = instance.filter(|i| !i.is_empty()) {
        payload["unity_instance"] = Value::String(instance.to_string());
    }
    payload
}

/// Writes one frame: an 8 byte big-endian length followed by the payload
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, payload: &[u8]) -> Result<(), BridgeError> {
    let length = payload.len() as u64;
    if length == 0 || length > MAX_FRAME_BYTES {
        return Err(BridgeError::Framing(format!("invalid frame length {}", length)));
    }
    writer.write_all(&length.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one frame written by [`write_frame`]
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, BridgeError> {
    let mut header = [0u8; 8];
    reader.read_exact(&mut header).await?;
    let length = u64::from_be_bytes(header);
    if length == 0 || length > MAX_FRAME_BYTES {
        return Err(BridgeError::Framing(format!("invalid frame length {}", length)));
    }
    let mut buffer = vec![0u8; length as usize];
    reader.read_exact(&mut buffer).await?;
    Ok(buffer)
}

/// Unwraps the editor's `{status, result}` reply
///
/// An error status becomes a `{success: false, message}` value rather than a
/// transport error, so the caller can hand it back unchanged.
fn interpret_reply(value: Value) -> Result<Reply, BridgeError> {
    let Some(status) = value.get("status").and_then(Value::as_str) else {
        return Ok(Reply::Done(value));
    };
    if status.eq_ignore_ascii_case("error") {
        let message = value
            .get("error")
            .or_else(|| value.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("Unknown Unity error");
        return Ok(Reply::Done(json!({ "success": false, "message": message })));
    }

    let result = value.get("result").cloned().unwrap_or(Value::Null);
    if result.get("state").and_then(Value::as_str) == Some("reloading") {
        return Ok(Reply::Reloading(result));
    }
    Ok(Reply::Done(result))
}
