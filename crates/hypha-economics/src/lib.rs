// crates/hypha-economics/src/lib.rs
//
// hypha-economics: node registry, quality-weighted epoch rewards, report/vote
// slashing, and treasury accounting for the Hypha CDN incentive engine.
//
// All monetary values are integer amounts of the staked asset's smallest
// unit; all percentages are basis points. No floating point is used.
//
// Write flow is one-directional: the distributor and the arbiter mutate
// node records only through the registry. The `Engine` facade owns every
// component and is the single writer.

pub mod config;
pub mod engine;
pub mod oracle;
pub mod registry;
pub mod rewards;
pub mod slashing;
pub mod treasury;

// Re-export key types for ergonomic access from downstream crates.
pub use config::{AdminAction, EconomicsConfig, RewardWeights};
pub use engine::{Engine, EpochStatus};
pub use oracle::{MetricsReport, OracleGate, SignedMetricsReport};
pub use registry::{MetricsUpdate, Node, NodeRegistry, NodeStatus};
pub use rewards::{EpochSummary, RewardDistributor};
pub use slashing::{Offense, ReportStatus, Resolution, SlashReport, SlashSchedule, SlashingArbiter};
pub use treasury::Treasury;
