//! Run context shared by the steps of one run.
//!
//! A [`Session`] owns everything a step may need from an earlier step: the
//! JSON-RPC request-id counter, the active connection and a keyed stash. The
//! runner owns the session and lends it mutably to each step in turn, so no
//! locking is involved.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::outcome::{Failure, Outcome};
use crate::transport::Connection;

/// Get the current Unix timestamp in milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Unique identifier for a run, attached to its log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Create a new random run ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Mutable state for one run.
///
/// Holds at most one connection. Installing a new connection while another is
/// open replaces and drops the old one.
pub struct Session {
    id: RunId,
    last_id: u64,
    connection: Option<Box<dyn Connection>>,
    stash: HashMap<Arc<str>, Value>,
}

impl Session {
    /// Create a fresh session with the request counter at zero.
    pub fn new() -> Self {
        Self {
            id: RunId::new(),
            last_id: 0,
            connection: None,
            stash: HashMap::new(),
        }
    }

    /// The run identifier.
    pub fn id(&self) -> RunId {
        self.id
    }

    /// The id the next constructed request will carry.
    pub fn last_id(&self) -> u64 {
        self.last_id
    }

    /// Take the current request id and advance the counter by one.
    pub fn next_request_id(&mut self) -> u64 {
        let id = self.last_id;
        self.last_id += 1;
        id
    }

    /// Install the active connection.
    pub fn connect(&mut self, connection: Box<dyn Connection>) {
        if let Some(previous) = self.connection.replace(connection) {
            tracing::warn!(
                run = %self.id,
                peer = %previous.peer(),
                "session.connection_replaced"
            );
        }
    }

    /// Remove and return the active connection, if any.
    pub fn disconnect(&mut self) -> Option<Box<dyn Connection>> {
        self.connection.take()
    }

    /// Whether a connection is installed.
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Borrow the active connection.
    pub fn connection_mut(&mut self) -> Outcome<&mut (dyn Connection + 'static)> {
        self.connection
            .as_deref_mut()
            .ok_or_else(|| Failure::Connectivity("there is no active connection".into()))
    }

    /// Store a value under `key`, replacing any previous one.
    pub fn stash(&mut self, key: impl Into<Arc<str>>, value: Value) -> Option<Value> {
        self.stash.insert(key.into(), value)
    }

    /// Read the value stored under `key`.
    ///
    /// A missing slot and a stored `null` are both reported as absent.
    pub fn stashed(&self, key: &str) -> Outcome<&Value> {
        match self.stash.get(key) {
            Some(value) if !value.is_null() => Ok(value),
            _ => Err(Failure::Predicate(format!("no key '{key}' in context"))),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("last_id", &self.last_id)
            .field("connected", &self.connection.is_some())
            .field("stash", &self.stash)
            .finish()
    }
}
