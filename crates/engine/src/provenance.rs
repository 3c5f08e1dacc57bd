//! C8: Provenance tracker — append-only, sortable audit log keyed by
//! session. All mutations and reads go through a single mutex; the store is
//! safe under concurrent record/query per the teacher's journal module.

use crate::types::{AgentId, Phase, ProvenanceError, SessionId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, SystemTime};

/// The category of a recorded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    DebateStarted,
    DebateCompleted,
    PhaseStarted,
    PhaseCompleted,
    PromptSent,
    ResponseReceived,
    ToolCalled,
    ErrorOccurred,
    ReflectionGenerated,
    VoteCast,
}

/// One append-only audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub session_id: SessionId,
    pub timestamp: SystemTime,
    pub event_type: EventType,
    pub agent_id: Option<AgentId>,
    pub phase: Option<Phase>,
    pub round: Option<u32>,
    pub data: HashMap<String, String>,
}

/// A caller-constructed entry before it has been assigned an id/timestamp
/// and had its session id enforced by the tracker.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub event_type: EventType,
    pub agent_id: Option<AgentId>,
    pub phase: Option<Phase>,
    pub round: Option<u32>,
    pub data: HashMap<String, String>,
    /// Caller-supplied timestamp; `record` only defaults to `now()` when unset.
    pub timestamp: Option<SystemTime>,
}

impl NewEntry {
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            agent_id: None,
            phase: None,
            round: None,
            data: HashMap::new(),
            timestamp: None,
        }
    }

    pub fn with_agent(mut self, agent_id: AgentId) -> Self {
        self.agent_id = Some(agent_id);
        self
    }

    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Overrides the timestamp `record` would otherwise assign, for
    /// out-of-order ingestion and backfill.
    pub fn with_timestamp(mut self, timestamp: SystemTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Aggregate view over a session's entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSummary {
    pub prompts_sent: usize,
    pub responses_received: usize,
    pub tool_calls: usize,
    pub votes_cast: usize,
    pub reflections_generated: usize,
    pub errors_occurred: usize,
    pub models_used: Vec<String>,
    pub providers_used: Vec<String>,
    pub phases_executed: Vec<String>,
    pub duration: Duration,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionDocument {
    pub entries: Vec<AuditEntry>,
    pub summary: SessionSummary,
}

struct TrackerState {
    sessions: HashMap<SessionId, Vec<AuditEntry>>,
    next_id: u64,
}

/// Append-only provenance store, one vector of entries per session.
pub struct ProvenanceTracker {
    state: Mutex<TrackerState>,
}

impl ProvenanceTracker {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TrackerState {
                sessions: HashMap::new(),
                next_id: 1,
            }),
        }
    }

    /// Appends an entry, overwriting its session id with the caller-provided
    /// one and assigning an auto-id/timestamp if absent.
    pub fn record(&self, session_id: SessionId, entry: NewEntry) -> AuditEntry {
        let mut state = self.state.lock();
        let id = format!("audit-{}", state.next_id);
        state.next_id += 1;

        let recorded = AuditEntry {
            id,
            session_id,
            timestamp: entry.timestamp.unwrap_or_else(crate::types::now),
            event_type: entry.event_type,
            agent_id: entry.agent_id,
            phase: entry.phase,
            round: entry.round,
            data: entry.data,
        };

        state
            .sessions
            .entry(session_id)
            .or_default()
            .push(recorded.clone());
        recorded
    }

    /// A stable snapshot sorted ascending by timestamp; missing sessions
    /// return an empty list.
    pub fn entries(&self, session_id: SessionId) -> Vec<AuditEntry> {
        let state = self.state.lock();
        let mut entries = state.sessions.get(&session_id).cloned().unwrap_or_default();
        entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        entries
    }

    pub fn entries_by_type(&self, session_id: SessionId, event_type: EventType) -> Vec<AuditEntry> {
        self.entries(session_id)
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }

    pub fn entries_by_agent(&self, session_id: SessionId, agent_id: AgentId) -> Vec<AuditEntry> {
        self.entries(session_id)
            .into_iter()
            .filter(|e| e.agent_id == Some(agent_id))
            .collect()
    }

    pub fn summary(&self, session_id: SessionId) -> SessionSummary {
        let entries = self.entries(session_id);
        if entries.is_empty() {
            return SessionSummary::default();
        }

        let mut summary = SessionSummary::default();
        let mut models: std::collections::BTreeSet<String> = std::collections::BTreeSet::new();
        let mut providers: std::collections::BTreeSet<String> = std::collections::BTreeSet::new();
        let mut phases: std::collections::BTreeSet<String> = std::collections::BTreeSet::new();

        for e in &entries {
            match e.event_type {
                EventType::PromptSent => summary.prompts_sent += 1,
                EventType::ResponseReceived => summary.responses_received += 1,
                EventType::ToolCalled => summary.tool_calls += 1,
                EventType::VoteCast => summary.votes_cast += 1,
                EventType::ReflectionGenerated => summary.reflections_generated += 1,
                EventType::ErrorOccurred => summary.errors_occurred += 1,
                EventType::PhaseStarted => {
                    if let Some(phase) = e.phase {
                        phases.insert(phase.as_str().to_string());
                    }
                }
                _ => {}
            }
            if let Some(model) = e.data.get("model").filter(|m| !m.is_empty()) {
                models.insert(model.clone());
            }
            if let Some(provider) = e.data.get("provider").filter(|p| !p.is_empty()) {
                providers.insert(provider.clone());
            }
        }

        let start = entries.first().map(|e| e.timestamp).unwrap();
        let end = entries.last().map(|e| e.timestamp).unwrap();

        summary.models_used = models.into_iter().collect();
        summary.providers_used = providers.into_iter().collect();
        summary.phases_executed = phases.into_iter().collect();
        summary.duration = end.duration_since(start).unwrap_or_default();
        summary
    }

    pub fn marshal_session_json(&self, session_id: SessionId) -> Result<String, ProvenanceError> {
        let state = self.state.lock();
        if !state.sessions.contains_key(&session_id) {
            return Err(ProvenanceError::SessionNotFound(session_id.to_string()));
        }
        drop(state);

        let document = SessionDocument {
            entries: self.entries(session_id),
            summary: self.summary(session_id),
        };
        serde_json::to_string(&document)
            .map_err(|e| ProvenanceError::SessionNotFound(format!("serialize failed: {e}")))
    }

    pub fn clear(&self, session_id: SessionId) {
        self.state.lock().sessions.remove(&session_id);
    }

    pub fn session_ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.state.lock().sessions.keys().copied().collect();
        ids.sort();
        ids
    }
}

impl Default for ProvenanceTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_overwrites_session_id_and_assigns_auto_id() {
        let tracker = ProvenanceTracker::new();
        let session = SessionId::new();
        let entry = tracker.record(session, NewEntry::new(EventType::DebateStarted));
        assert_eq!(entry.session_id, session);
        assert!(entry.id.starts_with("audit-"));
    }

    #[test]
    fn entries_are_sorted_ascending_and_idempotent() {
        let tracker = ProvenanceTracker::new();
        let session = SessionId::new();
        tracker.record(session, NewEntry::new(EventType::DebateStarted));
        tracker.record(session, NewEntry::new(EventType::PhaseStarted));

        let first = tracker.entries(session);
        let second = tracker.entries(session);
        assert_eq!(first.len(), second.len());
        for pair in first.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[test]
    fn clear_removes_session_and_is_noop_on_unknown() {
        let tracker = ProvenanceTracker::new();
        let session = SessionId::new();
        tracker.record(session, NewEntry::new(EventType::DebateStarted));
        tracker.clear(session);
        assert!(tracker.entries(session).is_empty());
        tracker.clear(SessionId::new());
    }

    #[test]
    fn record_preserves_caller_supplied_timestamp() {
        let tracker = ProvenanceTracker::new();
        let session = SessionId::new();
        let backfilled = crate::types::now() - Duration::from_secs(3600);
        let entry = tracker.record(
            session,
            NewEntry::new(EventType::DebateStarted).with_timestamp(backfilled),
        );
        assert_eq!(entry.timestamp, backfilled);
    }

    #[test]
    fn marshal_unknown_session_fails() {
        let tracker = ProvenanceTracker::new();
        assert!(tracker.marshal_session_json(SessionId::new()).is_err());
    }

    #[test]
    fn summary_counts_match_recorded_events() {
        let tracker = ProvenanceTracker::new();
        let session = SessionId::new();
        tracker.record(
            session,
            NewEntry::new(EventType::PromptSent).with_data("model", "gpt-4").with_data("provider", "openai"),
        );
        tracker.record(
            session,
            NewEntry::new(EventType::PromptSent).with_data("model", "claude-3").with_data("provider", "anthropic"),
        );
        tracker.record(session, NewEntry::new(EventType::ResponseReceived));
        tracker.record(session, NewEntry::new(EventType::ToolCalled));
        tracker.record(session, NewEntry::new(EventType::VoteCast));
        tracker.record(session, NewEntry::new(EventType::ReflectionGenerated));
        tracker.record(session, NewEntry::new(EventType::ErrorOccurred));
        tracker.record(session, NewEntry::new(EventType::PhaseStarted).with_phase(Phase::Proposal));

        let summary = tracker.summary(session);
        assert_eq!(summary.prompts_sent, 2);
        assert_eq!(summary.responses_received, 1);
        assert_eq!(summary.tool_calls, 1);
        assert_eq!(summary.votes_cast, 1);
        assert_eq!(summary.reflections_generated, 1);
        assert_eq!(summary.errors_occurred, 1);
        assert_eq!(summary.models_used, vec!["claude-3".to_string(), "gpt-4".to_string()]);
        assert_eq!(summary.providers_used, vec!["anthropic".to_string(), "openai".to_string()]);
        assert_eq!(summary.phases_executed, vec!["proposal".to_string()]);
    }
}
