// crates/hypha-core/src/lib.rs
//
// hypha-core: Core types, fixed-point math, and signing primitives for the
// Hypha CDN incentive engine.
//
// This is the leaf crate that all other crates in the workspace depend on.
// It defines identifiers, the protocol-wide error type, basis-point helpers,
// oracle signing helpers, and the event stream produced for observers.

pub mod bps;
pub mod crypto;
pub mod error;
pub mod events;
pub mod identity;

// Re-export key types for ergonomic access from downstream crates.
// Usage: `use hypha_core::NodeId;`

pub use bps::{apply_bps, mul_div, ratio_bps, BPS_DENOMINATOR, MAX_QUALITY_SCORE};
pub use error::HyphaError;
pub use events::EngineEvent;
pub use identity::{Address, NodeId, ReportId};

/// Amount of the staked asset, in its smallest indivisible unit.
pub type Amount = u64;

/// Unix timestamp in seconds.
pub type Timestamp = u64;
