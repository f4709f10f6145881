//! JSON-RPC transport adapter.
//!
//! Requests and responses are single JSON objects terminated by `\n` on a
//! persistent TCP connection. Reads are deliberately simple: one receive of up
//! to [`READ_BUFFER_SIZE`] bytes is decoded as exactly one JSON value. Partial
//! reads and several frames arriving in one receive are not handled.

use std::net::SocketAddr;

use serde::de::IgnoredAny;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::block::Block;
use crate::outcome::{Failure, Outcome};
use crate::session::Session;

/// Upper bound of a single receive.
pub const READ_BUFFER_SIZE: usize = 20_000;

// ============================================================================
// Connection
// ============================================================================

/// A byte stream to the node under test.
#[async_trait::async_trait]
pub trait Connection: Send {
    /// Human-readable address of the remote end.
    fn peer(&self) -> String;

    /// Write the whole frame.
    async fn send(&mut self, frame: &[u8]) -> std::io::Result<()>;

    /// Perform one receive of at most `max` bytes.
    ///
    /// An empty buffer means the peer closed the connection.
    async fn receive(&mut self, max: usize) -> std::io::Result<Vec<u8>>;

    /// Shut the connection down.
    async fn close(&mut self) -> std::io::Result<()>;
}

/// [`Connection`] over a tokio TCP stream.
#[derive(Debug)]
pub struct TcpConnection {
    stream: TcpStream,
    peer: SocketAddr,
}

impl TcpConnection {
    /// Connect to `addr`.
    pub async fn connect(addr: &str) -> std::io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let peer = stream.peer_addr()?;
        Ok(Self { stream, peer })
    }
}

#[async_trait::async_trait]
impl Connection for TcpConnection {
    fn peer(&self) -> String {
        self.peer.to_string()
    }

    async fn send(&mut self, frame: &[u8]) -> std::io::Result<()> {
        self.stream.write_all(frame).await?;
        self.stream.flush().await
    }

    async fn receive(&mut self, max: usize) -> std::io::Result<Vec<u8>> {
        let mut buf = vec![0u8; max];
        let n = self.stream.read(&mut buf).await?;
        buf.truncate(n);
        Ok(buf)
    }

    async fn close(&mut self) -> std::io::Result<()> {
        self.stream.shutdown().await
    }
}

// ============================================================================
// Requests and responses
// ============================================================================

/// Serialize a JSON-RPC 2.0 request, drawing its id from the session counter.
pub fn build_request(session: &mut Session, method: &str, params: Value) -> String {
    let id = session.next_request_id();
    json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": id,
    })
    .to_string()
}

/// Send one newline-terminated frame on the active connection.
pub async fn write(session: &mut Session, frame: &str) -> Outcome<String> {
    let connection = session.connection_mut()?;
    let peer = connection.peer();

    let mut bytes = frame.trim().as_bytes().to_vec();
    bytes.push(b'\n');

    connection
        .send(&bytes)
        .await
        .map_err(|e| Failure::Connectivity(format!("couldn't send request to {peer}: {e}")))?;

    tracing::debug!(%peer, len = bytes.len(), "rpc.write");
    Ok(format!("sent request to {peer}"))
}

/// Receive and decode one JSON value from the active connection.
pub async fn read(session: &mut Session) -> Outcome<Value> {
    let connection = session.connection_mut()?;
    let peer = connection.peer();

    let raw = connection
        .receive(READ_BUFFER_SIZE)
        .await
        .map_err(|e| Failure::Connectivity(format!("couldn't read from {peer}: {e}")))?;

    if raw.is_empty() {
        return Err(Failure::Connectivity(format!(
            "connection closed by peer {peer}"
        )));
    }

    tracing::debug!(%peer, len = raw.len(), "rpc.read");
    serde_json::from_slice(&raw).map_err(|e| {
        Failure::Protocol(format!(
            "couldn't parse response as JSON. Trace: {e}. Raw was: {}",
            String::from_utf8_lossy(&raw)
        ))
    })
}

/// Succeed iff the response has a `result` accepted by `predicate`.
pub fn check_result<F>(response: &Value, predicate: F) -> Outcome<String>
where
    F: FnOnce(&Value) -> bool,
{
    match response.get("result") {
        Some(result) if predicate(result) => Ok(format!(
            "raw request was successful and the result was positive (result was: {result})"
        )),
        Some(result) => Err(Failure::Predicate(format!(
            "raw request was successfully executed but the result was negative (result was: {result})"
        ))),
        None => Err(Failure::Protocol(format!(
            "raw request failed. Error was: {}",
            response.get("error").unwrap_or(&Value::Null)
        ))),
    }
}

/// Succeed iff the response `result` is literally `true`.
pub fn success(response: &Value) -> Outcome<String> {
    check_result(response, |result| result == &Value::Bool(true))
}

// ============================================================================
// Message classification
// ============================================================================

/// Shape check for block announcements: `params.result.block_header`.
#[derive(Deserialize)]
#[allow(dead_code)]
struct Announcement {
    params: AnnouncementParams,
}

#[derive(Deserialize)]
#[allow(dead_code)]
struct AnnouncementParams {
    result: AnnouncedBlock,
}

#[derive(Deserialize)]
#[allow(dead_code)]
struct AnnouncedBlock {
    block_header: IgnoredAny,
}

/// The closed set of frames the node may push to the harness.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// A block announcement that decoded cleanly.
    Block(Block),
    /// Shaped like a block announcement but missing block fields.
    MalformedBlock {
        /// The whole frame.
        raw: Value,
        /// Why the block could not be decoded.
        reason: String,
    },
    /// Any other push notification (carries `params` but no block).
    Notification(Value),
    /// Anything else: responses, subscription acknowledgements, errors.
    Response(Value),
}

impl Message {
    /// Classify a decoded frame.
    pub fn classify(raw: Value) -> Self {
        if Announcement::deserialize(&raw).is_ok() {
            let result = raw
                .pointer("/params/result")
                .cloned()
                .unwrap_or(Value::Null);
            return match serde_json::from_value::<Block>(result) {
                Ok(block) => Self::Block(block),
                Err(e) => Self::MalformedBlock {
                    raw,
                    reason: e.to_string(),
                },
            };
        }

        if raw.get("params").is_some() && raw.get("id").is_none() {
            Self::Notification(raw)
        } else {
            Self::Response(raw)
        }
    }

    /// Whether this frame is a block announcement, well-formed or not.
    pub fn is_block(&self) -> bool {
        matches!(self, Self::Block(_) | Self::MalformedBlock { .. })
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Block(block) => write!(f, "block for checkpoint {}", block.checkpoint()),
            Self::MalformedBlock { raw, .. } | Self::Notification(raw) | Self::Response(raw) => {
                write!(f, "{raw}")
            }
        }
    }
}
