//! CLI definition for witnet-tester.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Integration tests against a running Witnet node.
#[derive(Parser, Debug)]
#[command(name = "witnet-tester")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Suite to run.
    #[arg(long, value_enum, default_value_t = Suite::Lifecycle)]
    pub suite: Suite,

    /// Path to a TOML harness configuration.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// JSON-RPC server address.
    #[arg(long)]
    pub jsonrpc_addr: Option<String>,

    /// Peer-to-peer listener address.
    #[arg(long)]
    pub p2p_addr: Option<String>,

    /// Node process name that must be running.
    #[arg(long)]
    pub node_process: Option<String>,

    /// File with the data request submission (one JSON line).
    #[arg(long)]
    pub request_file: Option<PathBuf>,

    /// Blocks that may be rejected per lifecycle stage.
    #[arg(long)]
    pub block_retries: Option<u32>,

    /// Write the step records as JSON to this path.
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Print the steps of the suite and exit.
    #[arg(long)]
    pub list: bool,

    /// Log level when RUST_LOG is not set.
    #[arg(long)]
    pub log_level: Option<String>,
}

/// Available suites.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Suite {
    /// Ports open and block subscription accepted.
    Liveness,
    /// Submit a data request and follow it to its tally.
    Lifecycle,
}
