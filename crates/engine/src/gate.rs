//! C7: Approval gate — suspends a phase boundary until an external
//! Approve/Reject, a timeout, or cancellation. Decision delivery uses a
//! single-capacity oneshot channel per request, matching the "coroutines /
//! event loops" design note's one-shot future for approval waits.

use crate::config::GateConfig;
use crate::types::{DebateId, GateError, GateRequestId, Phase, SessionId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::SystemTime;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateStatus {
    Pending,
    Approved,
    Rejected,
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct GateDecision {
    pub status: GateStatus,
    pub reviewer: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct GateRequest {
    pub id: GateRequestId,
    pub debate_id: DebateId,
    pub session_id: SessionId,
    pub phase: Phase,
    pub summary: String,
    pub artifacts: HashMap<String, String>,
    pub requested_at: SystemTime,
    pub status: GateStatus,
}

struct PendingEntry {
    request: GateRequest,
    sender: Option<oneshot::Sender<GateDecision>>,
}

/// Approval gate. Internal mutex guards the request map; decision delivery
/// writes to a capacity-1 channel under the lock, then the entry is removed.
pub struct ApprovalGate {
    config: GateConfig,
    pending: Mutex<HashMap<GateRequestId, PendingEntry>>,
}

impl ApprovalGate {
    pub fn new(config: GateConfig) -> Self {
        Self {
            config,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Returns an auto-approved decision immediately when the gate is
    /// disabled or the phase is not a configured gate point. Otherwise
    /// registers a pending request and suspends until decided, timed out, or
    /// cancelled.
    pub async fn check_gate(
        &self,
        debate_id: DebateId,
        session_id: SessionId,
        phase: Phase,
        summary: impl Into<String>,
        artifacts: HashMap<String, String>,
        cancel: &CancellationToken,
    ) -> Result<GateDecision, GateError> {
        if !self.config.is_gate_point(phase) {
            return Ok(GateDecision {
                status: GateStatus::Approved,
                reviewer: None,
                reason: "auto-approved: not a gate point".to_string(),
            });
        }

        let id = GateRequestId::new();
        let (tx, rx) = oneshot::channel();
        let request = GateRequest {
            id,
            debate_id,
            session_id,
            phase,
            summary: summary.into(),
            artifacts,
            requested_at: crate::types::now(),
            status: GateStatus::Pending,
        };
        self.pending.lock().insert(
            id,
            PendingEntry {
                request,
                sender: Some(tx),
            },
        );
        info!(gate_request = %id, ?phase, "gate request created");

        tokio::select! {
            biased;
            decision = rx => {
                decision.map_err(|_| GateError::Cancelled(id.to_string()))
            }
            _ = tokio::time::sleep(self.config.timeout) => {
                if let Some(entry) = self.pending.lock().get_mut(&id) {
                    entry.request.status = GateStatus::TimedOut;
                    entry.sender = None;
                }
                Ok(GateDecision {
                    status: GateStatus::TimedOut,
                    reviewer: None,
                    reason: format!("gate request {id} timed out"),
                })
            }
            _ = cancel.cancelled() => {
                if let Some(entry) = self.pending.lock().get_mut(&id) {
                    entry.sender = None;
                }
                Err(GateError::Cancelled(id.to_string()))
            }
        }
    }

    pub fn approve(
        &self,
        id: GateRequestId,
        reviewer: impl Into<String>,
        reason: impl Into<String>,
    ) -> Result<(), GateError> {
        self.resolve(id, GateStatus::Approved, reviewer.into(), reason.into())
    }

    pub fn reject(
        &self,
        id: GateRequestId,
        reviewer: impl Into<String>,
        reason: impl Into<String>,
    ) -> Result<(), GateError> {
        self.resolve(id, GateStatus::Rejected, reviewer.into(), reason.into())
    }

    fn resolve(
        &self,
        id: GateRequestId,
        status: GateStatus,
        reviewer: String,
        reason: String,
    ) -> Result<(), GateError> {
        let mut pending = self.pending.lock();
        let entry = pending
            .get_mut(&id)
            .ok_or_else(|| GateError::NotFound(id.to_string()))?;

        if entry.request.status != GateStatus::Pending {
            return Err(GateError::NotPending(id.to_string()));
        }

        let sender = entry
            .sender
            .take()
            .ok_or_else(|| GateError::NotPending(id.to_string()))?;
        entry.request.status = status.clone();

        let _ = sender.send(GateDecision {
            status,
            reviewer: Some(reviewer),
            reason,
        });
        Ok(())
    }

    pub fn pending_requests(&self, debate_id: DebateId) -> Vec<GateRequest> {
        self.pending
            .lock()
            .values()
            .filter(|e| e.request.debate_id == debate_id && e.request.status == GateStatus::Pending)
            .map(|e| e.request.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn gate(timeout: Duration, points: Vec<Phase>) -> ApprovalGate {
        ApprovalGate::new(GateConfig {
            enabled: true,
            gate_points: points,
            timeout,
            notification_channels: Vec::new(),
        })
    }

    #[tokio::test]
    async fn disabled_gate_point_auto_approves() {
        let g = gate(Duration::from_secs(1), vec![]);
        let decision = g
            .check_gate(
                DebateId::new(),
                SessionId::new(),
                Phase::Proposal,
                "s",
                HashMap::new(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(decision.status, GateStatus::Approved);
    }

    #[tokio::test]
    async fn gate_times_out_without_error() {
        let g = gate(Duration::from_millis(50), vec![Phase::Proposal]);
        let decision = g
            .check_gate(
                DebateId::new(),
                SessionId::new(),
                Phase::Proposal,
                "s",
                HashMap::new(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(decision.status, GateStatus::TimedOut);
        assert!(decision.reason.contains("timed out"));
    }

    #[tokio::test]
    async fn second_approve_after_decision_fails_not_pending() {
        let g = std::sync::Arc::new(gate(Duration::from_secs(5), vec![Phase::Critique]));
        let g2 = g.clone();

        let handle = tokio::spawn(async move {
            g2.check_gate(
                DebateId::new(),
                SessionId::new(),
                Phase::Critique,
                "s",
                HashMap::new(),
                &CancellationToken::new(),
            )
            .await
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        let id = {
            let map = g.pending.lock();
            *map.keys().next().expect("one pending request")
        };

        g.approve(id, "admin", "looks good").unwrap();
        let decision = handle.await.unwrap().unwrap();
        assert_eq!(decision.status, GateStatus::Approved);

        let err = g.approve(id, "admin", "again").unwrap_err();
        assert!(matches!(err, GateError::NotPending(_)));
    }
}
