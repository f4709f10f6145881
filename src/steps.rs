//! Ready-made steps for talking to a node.
//!
//! Each constructor returns a [`Step`] whose name matches the constructor, so
//! run reports read like the suite definition.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpStream;

use crate::block::{Block, BlockFilter};
use crate::outcome::{Failure, Outcome, OutcomeExt};
use crate::session::Session;
use crate::step::Step;
use crate::transport::{self, TcpConnection};

fn frame_text(input: &Value) -> String {
    match input {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ============================================================================
// Liveness and connections
// ============================================================================

/// Succeeds if a TCP connection to the address can be established.
#[derive(Debug, Clone)]
pub struct PortIsUp {
    addr: String,
}

/// Check that something listens on `addr`.
pub fn port_is_up(addr: impl Into<String>) -> PortIsUp {
    PortIsUp { addr: addr.into() }
}

#[async_trait::async_trait]
impl Step for PortIsUp {
    fn name(&self) -> String {
        "port_is_up".into()
    }

    async fn execute(&self, _session: &mut Session, _input: Value) -> Outcome<Value> {
        match TcpStream::connect(&self.addr).await {
            Ok(_) => Ok(Value::String(format!("server at {} is up", self.addr))),
            Err(e) => {
                tracing::debug!(addr = %self.addr, error = %e, "port.refused");
                Err(Failure::Connectivity(format!(
                    "server at {} is NOT up",
                    self.addr
                )))
            }
        }
    }
}

/// Opens the session connection.
#[derive(Debug, Clone)]
pub struct TcpConnect {
    addr: String,
}

/// Open a TCP connection to `addr` and make it the session connection.
pub fn tcp_connect(addr: impl Into<String>) -> TcpConnect {
    TcpConnect { addr: addr.into() }
}

#[async_trait::async_trait]
impl Step for TcpConnect {
    fn name(&self) -> String {
        "tcp_connect".into()
    }

    async fn execute(&self, session: &mut Session, _input: Value) -> Outcome<Value> {
        let connection = TcpConnection::connect(&self.addr).await.map_err(|e| {
            Failure::Connectivity(format!(
                "failed to open TCP connection to {}: {e}",
                self.addr
            ))
        })?;
        session.connect(Box::new(connection));
        Ok(Value::String(format!(
            "successful TCP connection to {}",
            self.addr
        )))
    }
}

/// Closes the session connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpDisconnect;

/// Close the session connection.
pub fn tcp_disconnect() -> TcpDisconnect {
    TcpDisconnect
}

#[async_trait::async_trait]
impl Step for TcpDisconnect {
    fn name(&self) -> String {
        "tcp_disconnect".into()
    }

    async fn execute(&self, session: &mut Session, _input: Value) -> Outcome<Value> {
        let mut connection = session
            .disconnect()
            .ok_or_else(|| Failure::Connectivity("there is no active connection".into()))?;
        let peer = connection.peer();
        connection.close().await.map_err(|e| {
            Failure::Connectivity(format!("couldn't close connection to {peer}: {e}"))
        })?;
        Ok(Value::String(format!(
            "connection to {peer} was closed orderly"
        )))
    }
}

// ============================================================================
// Local collaborators
// ============================================================================

/// Sleeps for a fixed duration.
#[derive(Debug, Clone, Copy)]
pub struct Wait {
    duration: Duration,
}

/// Sleep for `duration`.
pub fn wait(duration: Duration) -> Wait {
    Wait { duration }
}

#[async_trait::async_trait]
impl Step for Wait {
    fn name(&self) -> String {
        "wait".into()
    }

    async fn execute(&self, _session: &mut Session, _input: Value) -> Outcome<Value> {
        tracing::info!(duration_ms = self.duration.as_millis() as u64, "wait.start");
        tokio::time::sleep(self.duration).await;
        Ok(Value::String(format!(
            "the {} seconds wait was totally worth it",
            self.duration.as_secs_f64()
        )))
    }
}

/// Reads the first line of a file, typically a pre-built request.
#[derive(Debug, Clone)]
pub struct ReadFile {
    path: PathBuf,
}

/// Read the first line of the file at `path`.
pub fn read_file(path: impl Into<PathBuf>) -> ReadFile {
    ReadFile { path: path.into() }
}

#[async_trait::async_trait]
impl Step for ReadFile {
    fn name(&self) -> String {
        "read_file".into()
    }

    async fn execute(&self, _session: &mut Session, _input: Value) -> Outcome<Value> {
        let unreadable = || {
            Failure::Io(format!(
                "file at '{}' couldn't be open",
                self.path.display()
            ))
        };

        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            tracing::debug!(path = %self.path.display(), error = %e, "file.unreadable");
            unreadable()
        })?;

        content
            .lines()
            .next()
            .map(|line| Value::String(line.to_string()))
            .ok_or_else(unreadable)
    }
}

/// Parses a string payload as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParse;

/// Parse the string payload as JSON.
pub fn json_parse() -> JsonParse {
    JsonParse
}

#[async_trait::async_trait]
impl Step for JsonParse {
    fn name(&self) -> String {
        "json_parse".into()
    }

    async fn execute(&self, _session: &mut Session, input: Value) -> Outcome<Value> {
        match input {
            Value::String(text) => serde_json::from_str(&text).map_err(|e| {
                Failure::Protocol(format!("couldn't parse input string as JSON. Trace: {e}"))
            }),
            other => Err(Failure::Protocol(format!(
                "couldn't parse input string as JSON: input is not a string ({other})"
            ))),
        }
    }
}

/// Checks the OS process list for a process name.
#[derive(Debug, Clone)]
pub struct ProcessIsRunning {
    process: String,
}

/// Succeed if `ps -Af` lists a process matching `process`.
pub fn process_is_running(process: impl Into<String>) -> ProcessIsRunning {
    ProcessIsRunning {
        process: process.into(),
    }
}

#[async_trait::async_trait]
impl Step for ProcessIsRunning {
    fn name(&self) -> String {
        "process_is_running".into()
    }

    async fn execute(&self, _session: &mut Session, _input: Value) -> Outcome<Value> {
        let output = tokio::process::Command::new("ps")
            .arg("-Af")
            .output()
            .await
            .map_err(|e| Failure::Io(format!("couldn't list processes: {e}")))?;

        let listing = String::from_utf8_lossy(&output.stdout);
        let count = listing.matches(self.process.as_str()).count();
        tracing::debug!(process = %self.process, count, "process.matches");

        if count > 0 {
            Ok(Value::String(format!(
                "process '{}' is running",
                self.process
            )))
        } else {
            Err(Failure::Predicate(format!(
                "process '{}' is not running",
                self.process
            )))
        }
    }
}

// ============================================================================
// JSON-RPC
// ============================================================================

/// Builds a request frame; outputs the serialized request.
#[derive(Debug, Clone)]
pub struct JsonRpcRequest {
    method: String,
    params: Value,
}

/// Build a `method(params)` request with the next session id.
pub fn jsonrpc_request(method: impl Into<String>, params: Value) -> JsonRpcRequest {
    JsonRpcRequest {
        method: method.into(),
        params,
    }
}

#[async_trait::async_trait]
impl Step for JsonRpcRequest {
    fn name(&self) -> String {
        "jsonrpc_request".into()
    }

    async fn execute(&self, session: &mut Session, _input: Value) -> Outcome<Value> {
        Ok(Value::String(transport::build_request(
            session,
            &self.method,
            self.params.clone(),
        )))
    }
}

/// Writes the payload as one frame on the session connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRpcWrite;

/// Send the payload (a string, or JSON serialized compactly).
pub fn jsonrpc_write() -> JsonRpcWrite {
    JsonRpcWrite
}

#[async_trait::async_trait]
impl Step for JsonRpcWrite {
    fn name(&self) -> String {
        "jsonrpc_write".into()
    }

    async fn execute(&self, session: &mut Session, input: Value) -> Outcome<Value> {
        transport::write(session, &frame_text(&input))
            .await
            .map(Value::String)
    }
}

/// Reads one response from the session connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRpcRead;

/// Read one JSON value from the connection.
pub fn jsonrpc_read() -> JsonRpcRead {
    JsonRpcRead
}

#[async_trait::async_trait]
impl Step for JsonRpcRead {
    fn name(&self) -> String {
        "jsonrpc_read".into()
    }

    async fn execute(&self, session: &mut Session, _input: Value) -> Outcome<Value> {
        transport::read(session).await.inspect_debug()
    }
}

/// Checks the `result` of a response payload.
pub struct CheckResult<F> {
    name: &'static str,
    predicate: F,
}

impl<F> std::fmt::Debug for CheckResult<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckResult").field("name", &self.name).finish()
    }
}

/// Succeed if the response has a `result` accepted by `predicate`.
pub fn jsonrpc_check_result<F>(predicate: F) -> CheckResult<F>
where
    F: Fn(&Value) -> bool + Send + Sync,
{
    CheckResult {
        name: "jsonrpc_check_result",
        predicate,
    }
}

/// Succeed if the response `result` is `true`.
pub fn jsonrpc_success() -> CheckResult<fn(&Value) -> bool> {
    CheckResult {
        name: "jsonrpc_success",
        predicate: |result| result == &Value::Bool(true),
    }
}

#[async_trait::async_trait]
impl<F> Step for CheckResult<F>
where
    F: Fn(&Value) -> bool + Send + Sync,
{
    fn name(&self) -> String {
        self.name.into()
    }

    async fn execute(&self, _session: &mut Session, input: Value) -> Outcome<Value> {
        transport::check_result(&input, &self.predicate).map(Value::String)
    }
}

// ============================================================================
// Run context
// ============================================================================

/// Stores the payload in the session and passes it through.
#[derive(Debug, Clone)]
pub struct IntoContext {
    key: Arc<str>,
}

/// Stash the payload under `key`.
pub fn into_context(key: impl Into<Arc<str>>) -> IntoContext {
    IntoContext { key: key.into() }
}

#[async_trait::async_trait]
impl Step for IntoContext {
    fn name(&self) -> String {
        "into_context".into()
    }

    async fn execute(&self, session: &mut Session, input: Value) -> Outcome<Value> {
        session.stash(self.key.clone(), input.clone());
        Ok(input)
    }
}

/// Outputs a value previously stored in the session.
#[derive(Debug, Clone)]
pub struct FromContext {
    key: Arc<str>,
}

/// Output the value stashed under `key`.
pub fn from_context(key: impl Into<Arc<str>>) -> FromContext {
    FromContext { key: key.into() }
}

#[async_trait::async_trait]
impl Step for FromContext {
    fn name(&self) -> String {
        "from_context".into()
    }

    async fn execute(&self, session: &mut Session, _input: Value) -> Outcome<Value> {
        session.stashed(&self.key).cloned()
    }
}

// ============================================================================
// Block predicates as steps
// ============================================================================

/// Evaluates a block filter on a block payload.
#[derive(Debug, Clone)]
pub struct Check<F> {
    filter: F,
    request_key: Option<Arc<str>>,
}

/// Check the block payload against `filter` with a `null` context.
pub fn check<F: BlockFilter>(filter: F) -> Check<F> {
    Check {
        filter,
        request_key: None,
    }
}

/// Check the block payload against `filter`, using the value stashed under
/// `request_key` as context.
pub fn check_with<F: BlockFilter>(filter: F, request_key: impl Into<Arc<str>>) -> Check<F> {
    Check {
        filter,
        request_key: Some(request_key.into()),
    }
}

#[async_trait::async_trait]
impl<F: BlockFilter> Step for Check<F> {
    fn name(&self) -> String {
        self.filter.name().into()
    }

    async fn execute(&self, session: &mut Session, input: Value) -> Outcome<Value> {
        let block = Block::from_value(input)?;
        let context = match &self.request_key {
            Some(key) => session.stashed(key)?.clone(),
            None => Value::Null,
        };
        self.filter.check(&block, &context)?;
        block.to_value()
    }
}
