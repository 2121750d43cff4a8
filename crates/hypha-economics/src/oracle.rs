// crates/hypha-economics/src/oracle.rs
//
// Authenticated ingestion of oracle telemetry.
//
// The metrics oracle signs the canonical JSON encoding of each
// `MetricsReport`. The gate accepts a report only if:
//   1. the signature verifies against the configured oracle key,
//   2. `observed_at` is neither in the future nor older than the staleness window,
//   3. `sequence` is strictly greater than the last accepted sequence.
// The sequence is committed separately, after the registry has accepted the
// update, so a report rejected downstream can be corrected and resent.

use serde::{Deserialize, Serialize};

use hypha_core::crypto::{parse_public_key_hex, verify_payload, Keypair};
use hypha_core::{HyphaError, NodeId, Timestamp};

use crate::registry::MetricsUpdate;

/// Telemetry for one node, as produced by the oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub node: NodeId,
    pub quality_score: u64,
    pub bytes_served_delta: u64,
    pub successful_requests_delta: u64,
    pub failed_requests_delta: u64,
    /// Strictly increasing across all reports from the oracle.
    pub sequence: u64,
    /// When the oracle took the measurement.
    pub observed_at: Timestamp,
}

impl MetricsReport {
    /// The exact bytes the oracle signs.
    pub fn signing_payload(&self) -> Result<Vec<u8>, HyphaError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Sign this report with the oracle's key.
    pub fn sign(self, keypair: &Keypair) -> Result<SignedMetricsReport, HyphaError> {
        let signature = keypair.sign_payload(&self.signing_payload()?);
        Ok(SignedMetricsReport {
            report: self,
            signature,
        })
    }

    /// Deltas in the form the registry consumes.
    pub fn update(&self) -> MetricsUpdate {
        MetricsUpdate {
            quality_score: self.quality_score,
            bytes_served_delta: self.bytes_served_delta,
            successful_requests_delta: self.successful_requests_delta,
            failed_requests_delta: self.failed_requests_delta,
        }
    }
}

/// A metrics report plus the oracle's hex-encoded ed25519 signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedMetricsReport {
    pub report: MetricsReport,
    pub signature: String,
}

/// Authentication, staleness and replay checks for oracle pushes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleGate {
    public_key: [u8; 32],
    last_sequence: Option<u64>,
}

impl OracleGate {
    /// Create a gate trusting the given raw public key.
    pub fn new(public_key: [u8; 32]) -> Self {
        Self {
            public_key,
            last_sequence: None,
        }
    }

    /// Create a gate from a hex-encoded public key.
    pub fn from_hex(public_key_hex: &str) -> Result<Self, HyphaError> {
        Ok(Self::new(parse_public_key_hex(public_key_hex)?))
    }

    /// Replace the trusted key. The replay counter carries over.
    pub fn rotate_key(&mut self, public_key_hex: &str) -> Result<(), HyphaError> {
        self.public_key = parse_public_key_hex(public_key_hex)?;
        tracing::info!(key = %self.public_key_hex(), "Oracle key rotated");
        Ok(())
    }

    /// Hex-encoded trusted key.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key)
    }

    /// Last sequence number accepted, if any.
    pub fn last_sequence(&self) -> Option<u64> {
        self.last_sequence
    }

    /// Check a signed report without changing any state.
    pub fn verify(
        &self,
        signed: &SignedMetricsReport,
        max_staleness_secs: u64,
        now: Timestamp,
    ) -> Result<(), HyphaError> {
        let report = &signed.report;
        verify_payload(&self.public_key, &report.signing_payload()?, &signed.signature)?;

        if report.observed_at > now {
            return Err(HyphaError::Timing(format!(
                "Oracle report is dated {}s in the future",
                report.observed_at - now
            )));
        }
        if now - report.observed_at > max_staleness_secs {
            return Err(HyphaError::Timing(format!(
                "Oracle report is {}s old (limit {}s)",
                now - report.observed_at,
                max_staleness_secs
            )));
        }
        if let Some(last) = self.last_sequence {
            if report.sequence <= last {
                return Err(HyphaError::InvalidState(format!(
                    "Replayed oracle report: sequence {} <= last accepted {}",
                    report.sequence, last
                )));
            }
        }
        Ok(())
    }

    /// Record a sequence as consumed.
    pub fn commit(&mut self, sequence: u64) {
        self.last_sequence = Some(sequence);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(sequence: u64, observed_at: Timestamp) -> MetricsReport {
        MetricsReport {
            node: NodeId(0),
            quality_score: 9_000,
            bytes_served_delta: 1_024,
            successful_requests_delta: 10,
            failed_requests_delta: 1,
            sequence,
            observed_at,
        }
    }

    #[test]
    fn test_valid_report_passes() {
        let oracle = Keypair::generate();
        let gate = OracleGate::from_hex(&oracle.public_key_hex()).unwrap();
        let signed = report(1, 1_000).sign(&oracle).unwrap();
        assert!(gate.verify(&signed, 3_600, 1_000).is_ok());
    }

    #[test]
    fn test_tampered_report_is_unauthorized() {
        let oracle = Keypair::generate();
        let gate = OracleGate::new(oracle.public_key_bytes());
        let mut signed = report(1, 1_000).sign(&oracle).unwrap();
        signed.report.quality_score = 10_000;
        assert!(matches!(
            gate.verify(&signed, 3_600, 1_000),
            Err(HyphaError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_stale_and_future_reports_rejected() {
        let oracle = Keypair::generate();
        let gate = OracleGate::new(oracle.public_key_bytes());

        let stale = report(1, 1_000).sign(&oracle).unwrap();
        assert!(matches!(gate.verify(&stale, 60, 1_061), Err(HyphaError::Timing(_))));
        assert!(gate.verify(&stale, 60, 1_060).is_ok());

        let future = report(2, 2_000).sign(&oracle).unwrap();
        assert!(matches!(gate.verify(&future, 60, 1_999), Err(HyphaError::Timing(_))));
    }

    #[test]
    fn test_replay_rejected_after_commit() {
        let oracle = Keypair::generate();
        let mut gate = OracleGate::new(oracle.public_key_bytes());
        let first = report(5, 100).sign(&oracle).unwrap();

        gate.verify(&first, 3_600, 100).unwrap();
        // Verification alone does not consume the sequence.
        gate.verify(&first, 3_600, 100).unwrap();
        gate.commit(first.report.sequence);

        assert!(gate.verify(&first, 3_600, 100).is_err());
        let older = report(4, 100).sign(&oracle).unwrap();
        assert!(gate.verify(&older, 3_600, 100).is_err());
        let newer = report(6, 100).sign(&oracle).unwrap();
        assert!(gate.verify(&newer, 3_600, 100).is_ok());
    }

    #[test]
    fn test_rotated_key_rejects_old_oracle() {
        let old = Keypair::generate();
        let new = Keypair::generate();
        let mut gate = OracleGate::new(old.public_key_bytes());
        gate.rotate_key(&new.public_key_hex()).unwrap();

        let signed = report(1, 10).sign(&old).unwrap();
        assert!(gate.verify(&signed, 3_600, 10).is_err());
        assert!(gate.rotate_key("not-hex").is_err());
        assert_eq!(gate.public_key_hex(), new.public_key_hex());
    }
}
