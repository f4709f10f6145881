//! Blocks announced by the node and the block-waiting state machine.
//!
//! [`wait_for_block`] reads the notification stream until a block satisfies a
//! [`BlockFilter`]. Frames that are not block announcements are skipped for
//! free; blocks rejected by the filter consume one unit of the retry budget.
//!
//! ```text
//! AWAITING_MESSAGE -> CLASSIFY -> MATCHED            (filter accepted)
//!                              -> AWAITING_MESSAGE   (not a block)
//!                              -> AWAITING_MESSAGE   (rejected, budget left)
//!                              -> EXHAUSTED          (rejected, budget spent)
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::outcome::{Failure, Outcome};
use crate::session::Session;
use crate::step::Step;
use crate::transport::{self, Message};

// ============================================================================
// Block
// ============================================================================

/// Transaction categories carried in a block's `txns` object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxnKind {
    /// `data_request_txns`
    DataRequest,
    /// `commit_txns`
    Commit,
    /// `reveal_txns`
    Reveal,
    /// `tally_txns`
    Tally,
}

impl TxnKind {
    /// Key of this category inside `txns`.
    pub fn key(self) -> &'static str {
        match self {
            Self::DataRequest => "data_request_txns",
            Self::Commit => "commit_txns",
            Self::Reveal => "reveal_txns",
            Self::Tally => "tally_txns",
        }
    }
}

/// Consensus round a block belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beacon {
    /// Checkpoint (block height in epochs).
    pub checkpoint: u64,
    /// Fields the harness does not inspect.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Header of an announced block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Round identifier.
    pub beacon: Beacon,
    /// Fields the harness does not inspect.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A block as carried in `params.result` of a block notification.
///
/// Rebuilt from every notification; the harness never caches blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Block header.
    pub block_header: BlockHeader,
    /// Transactions keyed by category.
    #[serde(default)]
    pub txns: Map<String, Value>,
    /// Fields the harness does not inspect.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Block {
    /// Decode a block from a step payload.
    pub fn from_value(value: Value) -> Outcome<Self> {
        serde_json::from_value(value)
            .map_err(|e| Failure::Structure(format!("payload is not a block: {e}")))
    }

    /// Encode the block as a step payload.
    pub fn to_value(&self) -> Outcome<Value> {
        serde_json::to_value(self)
            .map_err(|e| Failure::Structure(format!("couldn't encode block: {e}")))
    }

    /// Checkpoint of the block.
    pub fn checkpoint(&self) -> u64 {
        self.block_header.beacon.checkpoint
    }

    /// Transactions of one category.
    ///
    /// A missing category, or one that is not an array, is a structural
    /// failure rather than an empty list.
    pub fn transactions(&self, kind: TxnKind) -> Outcome<&[Value]> {
        self.txns
            .get(kind.key())
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .ok_or_else(|| {
                Failure::Structure(format!(
                    "block for checkpoint {} has no '{}' list",
                    self.checkpoint(),
                    kind.key()
                ))
            })
    }
}

// ============================================================================
// Filters
// ============================================================================

/// A predicate over a block and a caller-supplied context value.
pub trait BlockFilter: Send + Sync {
    /// Name shown in step names and logs.
    fn name(&self) -> &'static str;

    /// Accept the block or explain why it does not match (yet).
    fn check<'b>(&self, block: &'b Block, context: &Value) -> Outcome<&'b Block>;
}

impl<F: BlockFilter + ?Sized> BlockFilter for Box<F> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn check<'b>(&self, block: &'b Block, context: &Value) -> Outcome<&'b Block> {
        (**self).check(block, context)
    }
}

/// Accepts every block.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyBlock;

impl BlockFilter for AnyBlock {
    fn name(&self) -> &'static str {
        "any_block"
    }

    fn check<'b>(&self, block: &'b Block, _context: &Value) -> Outcome<&'b Block> {
        Ok(block)
    }
}

// ============================================================================
// Waiting
// ============================================================================

/// Configuration of one wait for a block.
#[derive(Debug, Clone, Default)]
pub struct WaitConfig<F> {
    /// Blocks that may be rejected after the first one before giving up.
    pub max_retries: u32,
    /// Predicate a block must satisfy.
    pub filter: F,
}

impl<F: BlockFilter> WaitConfig<F> {
    /// Create a wait configuration.
    pub fn new(max_retries: u32, filter: F) -> Self {
        Self {
            max_retries,
            filter,
        }
    }
}

/// Read notifications until a block passes `config.filter`.
///
/// Non-block frames are ignored and cost nothing. With `max_retries = n`, up
/// to `n + 1` blocks are evaluated. A frame shaped like a block announcement
/// that does not decode as a block ends the wait immediately.
pub async fn wait_for_block<F: BlockFilter>(
    session: &mut Session,
    config: &WaitConfig<F>,
    context: &Value,
) -> Outcome<Block> {
    let filter = config.filter.name();
    let mut retries_left = config.max_retries;

    loop {
        let block = match Message::classify(transport::read(session).await?) {
            Message::Block(block) => block,
            Message::MalformedBlock { raw, reason } => {
                return Err(Failure::Structure(format!(
                    "received a malformed block announcement ({reason}): {raw}"
                )));
            }
            other => {
                tracing::debug!(%filter, message = %other, "block.ignored");
                continue;
            }
        };

        let reason = match config.filter.check(&block, context) {
            Ok(_) => {
                tracing::info!(%filter, checkpoint = block.checkpoint(), "block.matched");
                return Ok(block);
            }
            Err(reason) => reason,
        };

        if retries_left == 0 {
            return Err(Failure::Exhausted(format!(
                "couldn't find a block passing the filter after {} retries (last reason: {reason})",
                config.max_retries
            )));
        }

        retries_left -= 1;
        tracing::info!(
            %filter,
            checkpoint = block.checkpoint(),
            %reason,
            retries_left,
            "block.rejected"
        );
    }
}

/// Step form of [`wait_for_block`].
///
/// The step input is the filter's context value (typically the data request
/// being tracked); the output is the matched block.
#[derive(Debug, Clone)]
pub struct WaitForBlock<F> {
    config: WaitConfig<F>,
}

impl<F: BlockFilter> WaitForBlock<F> {
    /// Create the step.
    pub fn new(config: WaitConfig<F>) -> Self {
        Self { config }
    }

    /// Get the wait configuration.
    pub fn config(&self) -> &WaitConfig<F> {
        &self.config
    }
}

/// Wait for the next block passing `filter`, rejecting at most `max_retries`.
pub fn wait_for_next_block<F: BlockFilter>(max_retries: u32, filter: F) -> WaitForBlock<F> {
    WaitForBlock::new(WaitConfig::new(max_retries, filter))
}

#[async_trait::async_trait]
impl<F: BlockFilter> Step for WaitForBlock<F> {
    fn name(&self) -> String {
        format!("wait_for_next_block({})", self.config.filter.name())
    }

    async fn execute(&self, session: &mut Session, input: Value) -> Outcome<Value> {
        wait_for_block(session, &self.config, &input)
            .await?
            .to_value()
    }
}
