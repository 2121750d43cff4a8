// crates/hypha-rpc/src/handlers/nodes.rs
//
// Node lifecycle handlers: RegisterNode, ClaimRewards, InitiateExit,
// CompleteExit, GetNode, ListNodes, BestNodes.

use serde::{Deserialize, Serialize};

use hypha_core::{Address, Amount, NodeId, Timestamp};
use hypha_economics::registry::DEFAULT_ROUTING_LIMIT;
use hypha_economics::{Node, NodeStatus};

use super::rpc_error;
use crate::handle::EngineHandle;

// ---------------------------------------------------------------------------
// RegisterNode
// ---------------------------------------------------------------------------

/// Request to register the caller's CDN node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterNodeRequest {
    /// Operator address; becomes the node's controlling account.
    pub operator: Address,
    /// Network endpoint descriptor (e.g. IPFS peer id).
    pub peer_id: String,
    /// Declared serving region.
    pub region: String,
    /// Collateral to stake.
    pub stake: Amount,
}

/// Response from node registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterNodeResponse {
    pub node: NodeId,
}

/// Handle a RegisterNode request.
pub async fn handle_register_node(
    handle: &EngineHandle,
    request: RegisterNodeRequest,
    now: Timestamp,
) -> Result<RegisterNodeResponse, String> {
    let node = handle
        .mutate(|engine| {
            engine.register_node(
                &request.operator,
                &request.peer_id,
                &request.region,
                request.stake,
                now,
            )
        })
        .await
        .map_err(rpc_error)?;
    Ok(RegisterNodeResponse { node })
}

// ---------------------------------------------------------------------------
// ClaimRewards / InitiateExit / CompleteExit
// ---------------------------------------------------------------------------

/// Request carrying only the calling operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorRequest {
    pub operator: Address,
}

/// Response from a reward claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimRewardsResponse {
    pub amount: Amount,
}

/// Handle a ClaimRewards request.
pub async fn handle_claim_rewards(
    handle: &EngineHandle,
    request: OperatorRequest,
) -> Result<ClaimRewardsResponse, String> {
    let amount = handle
        .mutate(|engine| engine.claim_rewards(&request.operator))
        .await
        .map_err(rpc_error)?;
    Ok(ClaimRewardsResponse { amount })
}

/// Response from starting an exit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiateExitResponse {
    /// Earliest time `node/complete_exit` succeeds.
    pub unlocks_at: Timestamp,
}

/// Handle an InitiateExit request.
pub async fn handle_initiate_exit(
    handle: &EngineHandle,
    request: OperatorRequest,
    now: Timestamp,
) -> Result<InitiateExitResponse, String> {
    let unlocks_at = handle
        .mutate(|engine| engine.initiate_exit(&request.operator, now))
        .await
        .map_err(rpc_error)?;
    Ok(InitiateExitResponse { unlocks_at })
}

/// Response from finishing an exit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteExitResponse {
    pub stake_returned: Amount,
    pub rewards_returned: Amount,
}

/// Handle a CompleteExit request.
pub async fn handle_complete_exit(
    handle: &EngineHandle,
    request: OperatorRequest,
    now: Timestamp,
) -> Result<CompleteExitResponse, String> {
    let (stake_returned, rewards_returned) = handle
        .mutate(|engine| engine.complete_exit(&request.operator, now))
        .await
        .map_err(rpc_error)?;
    Ok(CompleteExitResponse {
        stake_returned,
        rewards_returned,
    })
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Look up a node by id or by operator. Exactly one must be given.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetNodeRequest {
    pub node: Option<NodeId>,
    pub operator: Option<Address>,
}

/// Handle a GetNode request.
pub async fn handle_get_node(handle: &EngineHandle, request: GetNodeRequest) -> Result<Node, String> {
    handle
        .read(|engine| match (request.node, &request.operator) {
            (Some(id), None) => engine.node(id).cloned().map_err(rpc_error),
            (None, Some(operator)) => engine.node_by_operator(operator).cloned().map_err(rpc_error),
            _ => Err("Provide exactly one of 'node' or 'operator'".to_string()),
        })
        .await
}

/// Filter for the node list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListNodesRequest {
    /// Only nodes in this status.
    pub status: Option<NodeStatus>,
}

/// A list of node records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodesResponse {
    pub nodes: Vec<Node>,
}

/// Handle a ListNodes request.
pub async fn handle_list_nodes(
    handle: &EngineHandle,
    request: ListNodesRequest,
) -> Result<NodesResponse, String> {
    let nodes = handle
        .read(|engine| {
            engine
                .registry()
                .nodes()
                .iter()
                .filter(|n| request.status.map_or(true, |s| n.status == s))
                .cloned()
                .collect()
        })
        .await;
    Ok(NodesResponse { nodes })
}

/// Request for routing candidates in a region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BestNodesRequest {
    /// Region name, or "global" for all regions.
    pub region: String,
    /// Maximum number of nodes (default 5).
    pub limit: Option<usize>,
}

/// Handle a BestNodes request.
pub async fn handle_best_nodes(
    handle: &EngineHandle,
    request: BestNodesRequest,
) -> Result<NodesResponse, String> {
    let limit = request.limit.unwrap_or(DEFAULT_ROUTING_LIMIT);
    let nodes = handle
        .read(|engine| {
            engine
                .registry()
                .best_nodes_for_region(&request.region, limit)
                .into_iter()
                .cloned()
                .collect()
        })
        .await;
    Ok(NodesResponse { nodes })
}
