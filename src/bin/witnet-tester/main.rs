//! witnet-tester CLI entry point.

mod cli;

use std::process::ExitCode;

use clap::Parser;
use cli::{Cli, Suite};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use witnet_tester::scenario::{data_request_lifecycle, liveness};
use witnet_tester::{HarnessConfig, Run, Session, StepList};

#[tokio::main(flavor = "current_thread")]
async fn main() -> color_eyre::Result<ExitCode> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => HarnessConfig::from_file(path)?,
        None => HarnessConfig::default(),
    };
    if let Some(addr) = &cli.jsonrpc_addr {
        config.jsonrpc_addr = addr.clone();
    }
    if let Some(addr) = &cli.p2p_addr {
        config.p2p_addr = addr.clone();
    }
    if let Some(process) = &cli.node_process {
        config.node_process = Some(process.clone());
    }
    if let Some(path) = &cli.request_file {
        config.request_file = path.clone();
    }
    if let Some(retries) = cli.block_retries {
        config.block_retries = retries;
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    // The run report owns stdout.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    info!("witnet-tester v{}", env!("CARGO_PKG_VERSION"));
    info!(
        suite = ?cli.suite,
        jsonrpc = %config.jsonrpc_addr,
        p2p = %config.p2p_addr,
        "harness.config"
    );

    match cli.suite {
        Suite::Liveness => execute(liveness(&config), &cli).await,
        Suite::Lifecycle => execute(data_request_lifecycle(&config), &cli).await,
    }
}

async fn execute<S: StepList>(steps: S, cli: &Cli) -> color_eyre::Result<ExitCode> {
    let run = Run::new(steps, Session::new());

    if cli.list {
        for (index, name) in run.step_names().iter().enumerate() {
            println!("{index:>3}  {name}");
        }
        return Ok(ExitCode::SUCCESS);
    }

    let result = run.start().await;

    if let Some(path) = &cli.report {
        let json = serde_json::to_string_pretty(result.state())?;
        tokio::fs::write(path, &json).await?;
        info!("Wrote run report to {}", path.display());
    }

    Ok(result.exit_code())
}
