// crates/hypha-rpc/src/handlers/oracle.rs
//
// Oracle ingestion handler: SubmitMetrics.
// The request body is the signed report exactly as the oracle produced it.

use serde::{Deserialize, Serialize};

use hypha_core::{NodeId, Timestamp};
use hypha_economics::SignedMetricsReport;

use super::rpc_error;
use crate::handle::EngineHandle;

/// Response from a metrics push.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitMetricsResponse {
    pub node: NodeId,
    /// Sequence number now recorded as consumed.
    pub accepted_sequence: u64,
    pub quality_score: u64,
    pub bytes_served: u64,
}

/// Handle a SubmitMetrics request.
pub async fn handle_submit_metrics(
    handle: &EngineHandle,
    request: SignedMetricsReport,
    now: Timestamp,
) -> Result<SubmitMetricsResponse, String> {
    let node = request.report.node;
    let accepted_sequence = request.report.sequence;
    handle
        .mutate(|engine| {
            engine.ingest_metrics(&request, now)?;
            let updated = engine.node(node)?;
            Ok(SubmitMetricsResponse {
                node,
                accepted_sequence,
                quality_score: updated.quality_score,
                bytes_served: updated.bytes_served,
            })
        })
        .await
        .map_err(rpc_error)
}
