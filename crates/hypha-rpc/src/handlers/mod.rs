// crates/hypha-rpc/src/handlers/mod.rs
//
// Handler modules for all RPC endpoints.
// Each module defines request/response types and handler functions
// for a specific API group.

use hypha_core::HyphaError;

pub mod admin;
pub mod nodes;
pub mod oracle;
pub mod reports;
pub mod rewards;

/// Render an engine error for the JSON-RPC envelope as `kind: message`.
pub(crate) fn rpc_error(err: HyphaError) -> String {
    format!("{}: {}", err.kind(), err)
}
