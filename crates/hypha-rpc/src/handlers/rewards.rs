// crates/hypha-rpc/src/handlers/rewards.rs
//
// Reward handlers: DistributeRewards, EstimateRewards, FundPool, EpochStatus.
// Distribution and funding are permissionless.

use serde::{Deserialize, Serialize};

use hypha_core::{Amount, NodeId, Timestamp};
use hypha_economics::{EpochStatus, EpochSummary};

use super::rpc_error;
use crate::handle::EngineHandle;

/// Request carrying no parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmptyRequest {}

/// Handle a DistributeRewards request.
pub async fn handle_distribute(
    handle: &EngineHandle,
    _request: EmptyRequest,
    now: Timestamp,
) -> Result<EpochSummary, String> {
    handle
        .mutate(|engine| engine.distribute_rewards(now))
        .await
        .map_err(rpc_error)
}

/// Request for a node's expected share of the next epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimateRewardsRequest {
    pub node: NodeId,
}

/// Estimated next-epoch reward. Zero for ineligible nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimateRewardsResponse {
    pub node: NodeId,
    pub estimate: Amount,
}

/// Handle an EstimateRewards request.
pub async fn handle_estimate(
    handle: &EngineHandle,
    request: EstimateRewardsRequest,
) -> Result<EstimateRewardsResponse, String> {
    let estimate = handle.read(|engine| engine.estimate_rewards(request.node)).await;
    Ok(EstimateRewardsResponse {
        node: request.node,
        estimate,
    })
}

/// Request to add funds to the rewards pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundPoolRequest {
    pub amount: Amount,
}

/// New pool balance after funding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundPoolResponse {
    pub balance: Amount,
}

/// Handle a FundPool request.
pub async fn handle_fund_pool(
    handle: &EngineHandle,
    request: FundPoolRequest,
) -> Result<FundPoolResponse, String> {
    let balance = handle
        .mutate(|engine| engine.fund_rewards_pool(request.amount))
        .await
        .map_err(rpc_error)?;
    Ok(FundPoolResponse { balance })
}

/// Handle an EpochStatus request.
pub async fn handle_epoch_status(
    handle: &EngineHandle,
    _request: EmptyRequest,
) -> Result<EpochStatus, String> {
    Ok(handle.read(|engine| engine.epoch_status()).await)
}
