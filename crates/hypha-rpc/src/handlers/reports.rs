// crates/hypha-rpc/src/handlers/reports.rs
//
// Slashing handlers: SubmitReport, Vote, CheckExpired, ClaimPayout,
// GetReport, ListReports.

use serde::{Deserialize, Serialize};

use hypha_core::{Address, Amount, NodeId, ReportId, Timestamp};
use hypha_economics::{Offense, ReportStatus, Resolution, SlashReport};

use super::rpc_error;
use crate::handle::EngineHandle;

// ---------------------------------------------------------------------------
// SubmitReport
// ---------------------------------------------------------------------------

/// Request to accuse a node of misbehavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitReportRequest {
    pub reporter: Address,
    pub accused: NodeId,
    pub offense: Offense,
    /// Opaque evidence pointer, e.g. a content hash.
    pub evidence: String,
    /// Stake posted by the reporter.
    pub stake: Amount,
}

/// Response from report submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitReportResponse {
    pub report: ReportId,
    /// Slash that executes if the report is confirmed.
    pub slash_amount: Amount,
    /// Time after which the report can only be expired.
    pub deadline: Timestamp,
}

/// Handle a SubmitReport request.
pub async fn handle_submit_report(
    handle: &EngineHandle,
    request: SubmitReportRequest,
    now: Timestamp,
) -> Result<SubmitReportResponse, String> {
    handle
        .mutate(|engine| {
            let id = engine.submit_report(
                &request.reporter,
                request.accused,
                request.offense,
                &request.evidence,
                request.stake,
                now,
            )?;
            let report = engine.report(id)?;
            Ok(SubmitReportResponse {
                report: id,
                slash_amount: report.slash_amount,
                deadline: report.deadline(engine.config().review_period_secs),
            })
        })
        .await
        .map_err(rpc_error)
}

// ---------------------------------------------------------------------------
// Vote
// ---------------------------------------------------------------------------

/// A reviewer's vote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRequest {
    pub reviewer: Address,
    pub report: ReportId,
    /// `true` to confirm the accusation, `false` to reject it.
    pub confirm: bool,
}

/// Tallies after the vote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteResponse {
    pub status: ReportStatus,
    pub confirms: u32,
    pub rejects: u32,
    pub resolution: Option<Resolution>,
}

/// Handle a Vote request.
pub async fn handle_vote(
    handle: &EngineHandle,
    request: VoteRequest,
    now: Timestamp,
) -> Result<VoteResponse, String> {
    handle
        .mutate(|engine| {
            let status =
                engine.vote_on_report(&request.reviewer, request.report, request.confirm, now)?;
            let report = engine.report(request.report)?;
            Ok(VoteResponse {
                status,
                confirms: report.confirms,
                rejects: report.rejects,
                resolution: report.resolution,
            })
        })
        .await
        .map_err(rpc_error)
}

// ---------------------------------------------------------------------------
// CheckExpired / ClaimPayout
// ---------------------------------------------------------------------------

/// Request naming a single report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRequest {
    pub report: ReportId,
}

/// Handle a CheckExpired request. Anyone may call this.
pub async fn handle_check_expired(
    handle: &EngineHandle,
    request: ReportRequest,
    now: Timestamp,
) -> Result<Resolution, String> {
    handle
        .mutate(|engine| engine.check_expired_report(request.report, now))
        .await
        .map_err(rpc_error)
}

/// Request from a reporter to withdraw its balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimPayoutRequest {
    pub reporter: Address,
}

/// Amount paid out to the reporter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimPayoutResponse {
    pub amount: Amount,
}

/// Handle a ClaimPayout request.
pub async fn handle_claim_payout(
    handle: &EngineHandle,
    request: ClaimPayoutRequest,
) -> Result<ClaimPayoutResponse, String> {
    let amount = handle
        .mutate(|engine| engine.claim_reporter_payout(&request.reporter))
        .await
        .map_err(rpc_error)?;
    Ok(ClaimPayoutResponse { amount })
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Handle a GetReport request.
pub async fn handle_get_report(
    handle: &EngineHandle,
    request: ReportRequest,
) -> Result<SlashReport, String> {
    handle
        .read(|engine| engine.report(request.report).cloned())
        .await
        .map_err(rpc_error)
}

/// Filter for the report list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListReportsRequest {
    /// Only Pending and UnderReview reports.
    #[serde(default)]
    pub open_only: bool,
}

/// A list of reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListReportsResponse {
    pub reports: Vec<SlashReport>,
}

/// Handle a ListReports request.
pub async fn handle_list_reports(
    handle: &EngineHandle,
    request: ListReportsRequest,
) -> Result<ListReportsResponse, String> {
    let reports = handle
        .read(|engine| {
            engine
                .arbiter()
                .reports()
                .iter()
                .filter(|r| !request.open_only || r.is_open())
                .cloned()
                .collect()
        })
        .await;
    Ok(ListReportsResponse { reports })
}
