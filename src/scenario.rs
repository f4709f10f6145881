//! Canonical suites run by the `witnet-tester` binary.

use std::time::Duration;

use serde_json::{json, Value};

use crate::block::wait_for_next_block;
use crate::config::HarnessConfig;
use crate::hlist::StepList;
use crate::lifecycle::{CommitQuorum, ContainsDataRequest, RevealQuorum, TallyPresent};
use crate::step::{Poll, Step};
use crate::steps::{
    from_context, into_context, json_parse, jsonrpc_check_result, jsonrpc_read, jsonrpc_request,
    jsonrpc_success, jsonrpc_write, port_is_up, process_is_running, read_file, tcp_connect,
    tcp_disconnect, wait, PortIsUp,
};
use crate::suite;

/// Stash slot holding the submitted data request.
pub const REQUEST_KEY: &str = "request";

/// Whether a subscription acknowledgement carries a positive id.
///
/// Ids may arrive as integers or as numeric strings.
pub fn positive_subscription_id(result: &Value) -> bool {
    result
        .as_u64()
        .or_else(|| result.as_str().and_then(|s| s.parse().ok()))
        .is_some_and(|id| id > 0)
}

fn port_ready(addr: &str, config: &HarnessConfig) -> Poll<PortIsUp> {
    Poll::new(port_is_up(addr), config.startup)
}

fn process_check(config: &HarnessConfig) -> Box<dyn Step> {
    match &config.node_process {
        Some(process) => Box::new(process_is_running(process.as_str())),
        None => Box::new(wait(Duration::ZERO)),
    }
}

/// Ports open, JSON-RPC reachable, block subscription accepted.
pub fn liveness(config: &HarnessConfig) -> impl StepList {
    suite![
        port_ready(&config.p2p_addr, config),
        port_ready(&config.jsonrpc_addr, config),
        process_check(config),
        tcp_connect(config.jsonrpc_addr.as_str()),
        jsonrpc_request("witnet_subscribe", json!(["newBlocks"])),
        jsonrpc_write(),
        jsonrpc_read(),
        jsonrpc_check_result(positive_subscription_id),
        tcp_disconnect(),
    ]
}

/// Submit the configured data request and follow it until its tally.
pub fn data_request_lifecycle(config: &HarnessConfig) -> impl StepList {
    let retries = config.block_retries;

    suite![
        port_ready(&config.p2p_addr, config),
        port_ready(&config.jsonrpc_addr, config),
        process_check(config),
        tcp_connect(config.jsonrpc_addr.as_str()),
        jsonrpc_request("witnet_subscribe", json!(["newBlocks"])),
        jsonrpc_write(),
        jsonrpc_read(),
        jsonrpc_check_result(positive_subscription_id),
        read_file(config.request_file.clone()),
        json_parse(),
        into_context(REQUEST_KEY),
        jsonrpc_write(),
        jsonrpc_read(),
        jsonrpc_success(),
        from_context(REQUEST_KEY),
        wait_for_next_block(retries, ContainsDataRequest),
        from_context(REQUEST_KEY),
        wait_for_next_block(retries, CommitQuorum),
        from_context(REQUEST_KEY),
        wait_for_next_block(retries, RevealQuorum),
        from_context(REQUEST_KEY),
        wait_for_next_block(retries, TallyPresent),
        tcp_disconnect(),
    ]
}
