//! Data-request lifecycle predicates.
//!
//! A data request goes through inclusion, commitment, reveal and tally. Each
//! stage has a [`BlockFilter`] that takes the announced block and the tracked
//! request as context.
//!
//! Commit and reveal quorums count every transaction of the category in the
//! block, whichever data request it targets.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::block::{Block, BlockFilter, TxnKind};
use crate::outcome::{Failure, Outcome};

/// Why a context value does not describe a trackable data request.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// The context is a string that does not parse as JSON.
    #[error("request is not valid JSON: {0}")]
    InvalidJson(String),

    /// Neither `params.dro` nor `dro` is present.
    #[error("request has no 'dro'")]
    MissingDro,

    /// The descriptor lacks an integer replication factor.
    #[error("request 'dro' has no integer 'witnesses'")]
    MissingWitnesses,
}

/// The tracked data request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataRequest {
    /// Data request output; compared structurally with included requests.
    pub dro: Value,
}

impl DataRequest {
    /// Extract the descriptor from a context value.
    ///
    /// Accepts the bare descriptor (`{"dro": ..}`), the JSON-RPC request that
    /// submitted it (`{"params": {"dro": ..}}`), or either one serialized as a
    /// string.
    pub fn from_context(context: &Value) -> Result<Self, RequestError> {
        if let Value::String(raw) = context {
            let parsed: Value = serde_json::from_str(raw)
                .map_err(|e| RequestError::InvalidJson(e.to_string()))?;
            return Self::from_context(&parsed);
        }

        context
            .pointer("/params/dro")
            .or_else(|| context.get("dro"))
            .map(|dro| Self { dro: dro.clone() })
            .ok_or(RequestError::MissingDro)
    }

    /// Replication factor: minimum number of commits and reveals.
    pub fn witnesses(&self) -> Result<u64, RequestError> {
        self.dro
            .get("witnesses")
            .and_then(Value::as_u64)
            .ok_or(RequestError::MissingWitnesses)
    }
}

fn structural(detail: &str, block: &Block, request: &Value) -> Failure {
    let block = serde_json::to_string(block).unwrap_or_else(|_| format!("{block:?}"));
    Failure::Structure(format!(
        "unknown error ({detail}).\n\tBlock was {block}\n\tRequest was {request}"
    ))
}

fn transactions<'b>(block: &'b Block, kind: TxnKind, request: &Value) -> Outcome<&'b [Value]> {
    block
        .transactions(kind)
        .map_err(|f| structural(f.message(), block, request))
}

fn tracked_request(block: &Block, context: &Value) -> Outcome<DataRequest> {
    DataRequest::from_context(context).map_err(|e| structural(&e.to_string(), block, context))
}

fn quorum<'b>(
    block: &'b Block,
    context: &Value,
    kind: TxnKind,
    noun: &str,
) -> Outcome<&'b Block> {
    let txns = transactions(block, kind, context)?;
    if txns.is_empty() {
        return Err(Failure::Predicate(format!("there are no {noun} inside")));
    }

    let witnesses = tracked_request(block, context)?
        .witnesses()
        .map_err(|e| structural(&e.to_string(), block, context))?;

    let count = txns.len() as u64;
    if count >= witnesses {
        Ok(block)
    } else {
        Err(Failure::Predicate(format!(
            "there are not enough {noun} ({count} < {witnesses})"
        )))
    }
}

/// Accepts blocks containing at least one data request, whichever it is.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainsAnyDataRequest;

impl BlockFilter for ContainsAnyDataRequest {
    fn name(&self) -> &'static str {
        "block_contains_any_dr"
    }

    fn check<'b>(&self, block: &'b Block, context: &Value) -> Outcome<&'b Block> {
        if transactions(block, TxnKind::DataRequest, context)?.is_empty() {
            Err(Failure::Predicate("there are no data requests inside".into()))
        } else {
            Ok(block)
        }
    }
}

/// Accepts blocks including the tracked data request.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainsDataRequest;

impl BlockFilter for ContainsDataRequest {
    fn name(&self) -> &'static str {
        "block_contains_dr"
    }

    fn check<'b>(&self, block: &'b Block, context: &Value) -> Outcome<&'b Block> {
        let drs = transactions(block, TxnKind::DataRequest, context)?;
        if drs.is_empty() {
            return Err(Failure::Predicate("there are no data requests inside".into()));
        }

        let request = tracked_request(block, context)?;
        let included = drs
            .iter()
            .any(|dr| dr.pointer("/body/dr_output") == Some(&request.dro));

        if included {
            Ok(block)
        } else {
            Err(Failure::Predicate("the data request was not included".into()))
        }
    }
}

/// Accepts blocks with at least `witnesses` commit transactions.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommitQuorum;

impl BlockFilter for CommitQuorum {
    fn name(&self) -> &'static str {
        "block_contains_commitments_for_dr"
    }

    fn check<'b>(&self, block: &'b Block, context: &Value) -> Outcome<&'b Block> {
        quorum(block, context, TxnKind::Commit, "commitments")
    }
}

/// Accepts blocks with at least `witnesses` reveal transactions.
#[derive(Debug, Clone, Copy, Default)]
pub struct RevealQuorum;

impl BlockFilter for RevealQuorum {
    fn name(&self) -> &'static str {
        "block_contains_reveals_for_dr"
    }

    fn check<'b>(&self, block: &'b Block, context: &Value) -> Outcome<&'b Block> {
        quorum(block, context, TxnKind::Reveal, "reveals")
    }
}

/// Accepts blocks with exactly one tally transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct TallyPresent;

impl BlockFilter for TallyPresent {
    fn name(&self) -> &'static str {
        "block_contains_tally_for_dr"
    }

    fn check<'b>(&self, block: &'b Block, context: &Value) -> Outcome<&'b Block> {
        match transactions(block, TxnKind::Tally, context)?.len() {
            0 => Err(Failure::Predicate("there are no tallies inside".into())),
            1 => Ok(block),
            n => Err(Failure::Predicate(format!(
                "there are too many tallies for the specific data request ({n})"
            ))),
        }
    }
}
