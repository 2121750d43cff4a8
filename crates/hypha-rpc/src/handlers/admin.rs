// crates/hypha-rpc/src/handlers/admin.rs
//
// Admin handlers: GetConfig, UpdateConfig, CheckInvariants.

use serde::{Deserialize, Serialize};

use hypha_core::Address;
use hypha_economics::{AdminAction, EconomicsConfig};

use super::rewards::EmptyRequest;
use super::rpc_error;
use crate::handle::EngineHandle;

/// Current administrative surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetConfigResponse {
    pub config: EconomicsConfig,
    pub admin: Address,
    pub reviewers: Vec<Address>,
    /// Hex-encoded ed25519 key of the metrics oracle.
    pub oracle_public_key: String,
    pub oracle_last_sequence: Option<u64>,
}

/// Handle a GetConfig request.
pub async fn handle_get_config(
    handle: &EngineHandle,
    _request: EmptyRequest,
) -> Result<GetConfigResponse, String> {
    Ok(handle
        .read(|engine| GetConfigResponse {
            config: engine.config().clone(),
            admin: engine.admin().clone(),
            reviewers: engine.arbiter().reviewers().iter().cloned().collect(),
            oracle_public_key: engine.oracle().public_key_hex(),
            oracle_last_sequence: engine.oracle().last_sequence(),
        })
        .await)
}

/// Request to apply an administrative change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfigRequest {
    /// Must be the configured administrator.
    pub caller: Address,
    pub action: AdminAction,
}

/// Handle an UpdateConfig request. Returns the resulting configuration.
pub async fn handle_update_config(
    handle: &EngineHandle,
    request: UpdateConfigRequest,
) -> Result<EconomicsConfig, String> {
    handle
        .mutate(|engine| {
            engine.apply_admin(&request.caller, &request.action)?;
            Ok(engine.config().clone())
        })
        .await
        .map_err(rpc_error)
}

/// Outcome of the accounting audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckInvariantsResponse {
    pub ok: bool,
    pub violation: Option<String>,
}

/// Handle a CheckInvariants request.
pub async fn handle_check_invariants(
    handle: &EngineHandle,
    _request: EmptyRequest,
) -> Result<CheckInvariantsResponse, String> {
    let outcome = handle.read(|engine| engine.check_invariants()).await;
    if let Err(e) = &outcome {
        tracing::error!(error = %e, "Engine invariant violated");
    }
    Ok(CheckInvariantsResponse {
        ok: outcome.is_ok(),
        violation: outcome.err().map(|e| e.to_string()),
    })
}
