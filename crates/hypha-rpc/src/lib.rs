// crates/hypha-rpc/src/lib.rs
//
// hypha-rpc: JSON-RPC server and handlers for the Hypha CDN incentive engine.
//
// A single tonic service accepts JSON-encoded `{method, params}` envelopes
// over HTTP and dispatches them to the handler modules. All handlers share
// one `EngineHandle`, the single writer over the engine state.

pub mod handle;
pub mod handlers;
pub mod middleware;
pub mod server;

// Re-export the main server types for ergonomic access.
pub use handle::{system_clock, unix_now, Clock, EngineHandle};
pub use server::{HyphaRpcServer, JsonRpcRequest, JsonRpcResponse, RpcConfig};
