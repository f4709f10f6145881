//! Common test doubles and fixtures.
//!
//! This module contains:
//! - `ScriptedConnection`: In-memory `Connection` fed from a frame queue
//! - Block and request fixtures shaped like the node's notifications
//! - Stub steps: `Emit`, `Echo`, `Fail`, `Flaky`

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::{Block, BlockFilter, Connection, Failure, Outcome, Session, Step};

// ============================================================================
// Scripted Connection
// ============================================================================

/// What the scripted peer will send and what it has received.
#[derive(Debug, Default)]
pub struct Script {
    /// Frames returned by successive receives, front first.
    pub incoming: VecDeque<Vec<u8>>,
    /// Frames written by the harness, as text.
    pub sent: Vec<String>,
    /// Whether `close` was called.
    pub closed: bool,
}

/// In-memory connection. An exhausted script reads as a closed peer.
pub struct ScriptedConnection {
    peer: String,
    script: Arc<Mutex<Script>>,
}

impl ScriptedConnection {
    pub fn new(frames: Vec<Value>) -> (Self, Arc<Mutex<Script>>) {
        Self::with_peer("scripted-node:21338", frames)
    }

    pub fn with_peer(peer: &str, frames: Vec<Value>) -> (Self, Arc<Mutex<Script>>) {
        let script = Arc::new(Mutex::new(Script {
            incoming: frames
                .into_iter()
                .map(|frame| frame.to_string().into_bytes())
                .collect(),
            ..Script::default()
        }));
        (
            Self {
                peer: peer.to_string(),
                script: script.clone(),
            },
            script,
        )
    }
}

#[async_trait::async_trait]
impl Connection for ScriptedConnection {
    fn peer(&self) -> String {
        self.peer.clone()
    }

    async fn send(&mut self, frame: &[u8]) -> std::io::Result<()> {
        self.script
            .lock()
            .sent
            .push(String::from_utf8_lossy(frame).into_owned());
        Ok(())
    }

    async fn receive(&mut self, max: usize) -> std::io::Result<Vec<u8>> {
        let mut frame = self.script.lock().incoming.pop_front().unwrap_or_default();
        frame.truncate(max);
        Ok(frame)
    }

    async fn close(&mut self) -> std::io::Result<()> {
        self.script.lock().closed = true;
        Ok(())
    }
}

/// A session already connected to a scripted peer.
pub fn scripted_session(frames: Vec<Value>) -> (Session, Arc<Mutex<Script>>) {
    let (connection, script) = ScriptedConnection::new(frames);
    let mut session = Session::new();
    session.connect(Box::new(connection));
    (session, script)
}

// ============================================================================
// Fixtures
// ============================================================================

/// A data request output with the given replication factor.
pub fn dro(witnesses: u64) -> Value {
    json!({
        "data_request": {"retrieve": [{"kind": "HTTP-GET", "url": "https://example.com/btc"}]},
        "value": 1000,
        "witnesses": witnesses,
        "backup_witnesses": 1,
        "commit_fee": 0,
        "reveal_fee": 0,
        "tally_fee": 0,
        "time_lock": 0
    })
}

/// The JSON-RPC submission of a data request, as read from a request file.
pub fn submission(dro: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "inventory",
        "params": {"dro": dro, "fee": 0},
        "id": "1"
    })
}

/// A data request transaction carrying `dro`.
pub fn dr_txn(dro: Value) -> Value {
    json!({"body": {"inputs": [], "outputs": [], "dr_output": dro}, "signatures": []})
}

/// `n` opaque transactions of any kind.
pub fn txns(n: usize) -> Vec<Value> {
    (0..n).map(|i| json!({"body": {"index": i}})).collect()
}

/// Block payload (`params.result`) with the given transaction lists.
pub fn block_value(
    checkpoint: u64,
    data_requests: Vec<Value>,
    commits: Vec<Value>,
    reveals: Vec<Value>,
    tallies: Vec<Value>,
) -> Value {
    json!({
        "block_header": {
            "beacon": {"checkpoint": checkpoint, "hash_prev_block": {"SHA256": [0, 1, 2]}},
            "merkle_roots": {},
            "proof": {}
        },
        "block_sig": {},
        "txns": {
            "mint": {},
            "value_transfer_txns": [],
            "data_request_txns": data_requests,
            "commit_txns": commits,
            "reveal_txns": reveals,
            "tally_txns": tallies
        }
    })
}

/// Decoded block with the given transaction lists.
pub fn block(
    checkpoint: u64,
    data_requests: Vec<Value>,
    commits: Vec<Value>,
    reveals: Vec<Value>,
    tallies: Vec<Value>,
) -> Block {
    Block::from_value(block_value(
        checkpoint,
        data_requests,
        commits,
        reveals,
        tallies,
    ))
    .expect("fixture is a block")
}

/// A block notification frame wrapping `block`.
pub fn block_frame(block: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "witnet_subscription",
        "params": {"subscription": 1, "result": block}
    })
}

/// An empty block notification for `checkpoint`.
pub fn empty_block_frame(checkpoint: u64) -> Value {
    block_frame(block_value(checkpoint, vec![], vec![], vec![], vec![]))
}

// ============================================================================
// Stub Steps
// ============================================================================

/// Counts its invocations.
#[derive(Clone, Default)]
pub struct Calls(Arc<AtomicUsize>);

impl Calls {
    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outputs a fixed value.
pub struct Emit {
    pub name: &'static str,
    pub value: Value,
    pub calls: Calls,
}

impl Emit {
    pub fn new(name: &'static str, value: Value) -> Self {
        Self {
            name,
            value,
            calls: Calls::default(),
        }
    }
}

#[async_trait::async_trait]
impl Step for Emit {
    fn name(&self) -> String {
        self.name.into()
    }

    async fn execute(&self, _session: &mut Session, _input: Value) -> Outcome<Value> {
        self.calls.hit();
        Ok(self.value.clone())
    }
}

/// Outputs its input, recording every input seen.
#[derive(Default)]
pub struct Echo {
    pub seen: Arc<Mutex<Vec<Value>>>,
}

#[async_trait::async_trait]
impl Step for Echo {
    fn name(&self) -> String {
        "echo".into()
    }

    async fn execute(&self, _session: &mut Session, input: Value) -> Outcome<Value> {
        self.seen.lock().push(input.clone());
        Ok(input)
    }
}

/// Always fails.
pub struct Fail {
    pub calls: Calls,
}

impl Fail {
    pub fn new() -> Self {
        Self {
            calls: Calls::default(),
        }
    }
}

#[async_trait::async_trait]
impl Step for Fail {
    fn name(&self) -> String {
        "fail".into()
    }

    async fn execute(&self, _session: &mut Session, _input: Value) -> Outcome<Value> {
        self.calls.hit();
        Err(Failure::Predicate("boom".into()))
    }
}

/// Fails a fixed number of times, then echoes its input.
pub struct Flaky {
    failures_left: AtomicUsize,
    pub calls: Calls,
    pub seen: Arc<Mutex<Vec<Value>>>,
}

impl Flaky {
    pub fn new(failures: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(failures),
            calls: Calls::default(),
            seen: Arc::default(),
        }
    }
}

#[async_trait::async_trait]
impl Step for Flaky {
    fn name(&self) -> String {
        "flaky".into()
    }

    async fn execute(&self, _session: &mut Session, input: Value) -> Outcome<Value> {
        self.calls.hit();
        self.seen.lock().push(input.clone());

        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(Failure::Connectivity(format!("not yet ({left} to go)")));
        }
        Ok(input)
    }
}

// ============================================================================
// Stub Filters
// ============================================================================

/// Accepts blocks from `min` on; counts evaluations.
pub struct CheckpointAtLeast {
    pub min: u64,
    pub calls: Calls,
}

impl CheckpointAtLeast {
    pub fn new(min: u64) -> Self {
        Self {
            min,
            calls: Calls::default(),
        }
    }
}

impl BlockFilter for CheckpointAtLeast {
    fn name(&self) -> &'static str {
        "checkpoint_at_least"
    }

    fn check<'b>(&self, block: &'b Block, _context: &Value) -> Outcome<&'b Block> {
        self.calls.hit();
        if block.checkpoint() >= self.min {
            Ok(block)
        } else {
            Err(Failure::Predicate(format!(
                "checkpoint {} is before {}",
                block.checkpoint(),
                self.min
            )))
        }
    }
}
