//! C3: Message bus — bounded per-agent queues with delivery timeout and
//! cancellation, plus broadcast aggregation into a single delivery report.

use crate::registry::AgentRegistry;
use crate::topology::Topology;
use crate::types::{AgentId, CommunicationError, Message};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Outcome of a broadcast: who received it and how many deliveries failed.
#[derive(Debug, Clone, Default)]
pub struct BroadcastReport {
    pub delivered: Vec<AgentId>,
    pub failed: usize,
}

/// Bounded, in-process message bus. One `mpsc` channel per registered agent;
/// broadcasts fan out sequentially against the topology's routing targets,
/// sorted by descending agent score so higher-scored agents are favored when
/// a queue is near capacity.
pub struct MessageBus {
    queues: DashMap<AgentId, mpsc::Sender<Message>>,
    capacity: usize,
    broadcast_count: AtomicU64,
}

impl MessageBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            queues: DashMap::new(),
            capacity,
            broadcast_count: AtomicU64::new(0),
        }
    }

    pub fn register_agent(&self, id: AgentId) -> mpsc::Receiver<Message> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.queues.insert(id, tx);
        rx
    }

    pub fn unregister_agent(&self, id: AgentId) {
        self.queues.remove(&id);
    }

    pub fn broadcast_count(&self) -> u64 {
        self.broadcast_count.load(Ordering::Relaxed)
    }

    /// Deliver to a single recipient, respecting `message_timeout` and
    /// cancellation.
    pub async fn send_direct(
        &self,
        to: AgentId,
        message: Message,
        timeout: std::time::Duration,
        cancel: &CancellationToken,
    ) -> Result<(), CommunicationError> {
        let sender = self
            .queues
            .get(&to)
            .map(|e| e.value().clone())
            .ok_or(CommunicationError::QueueFull { agent_id: to })?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CommunicationError::ShuttingDown),
            result = tokio::time::timeout(timeout, sender.send(message)) => {
                match result {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(_)) => Err(CommunicationError::QueueFull { agent_id: to }),
                    Err(_) => Err(CommunicationError::Timeout { agent_id: to }),
                }
            }
        }
    }

    /// Route a message to every target the topology permits from `message.from`,
    /// ordered by descending registry score. Failures are aggregated into a
    /// single report rather than aborting the broadcast.
    pub async fn broadcast(
        &self,
        topology: &Topology,
        registry: &AgentRegistry,
        message: Message,
        timeout: std::time::Duration,
        cancel: &CancellationToken,
    ) -> Result<BroadcastReport, CommunicationError> {
        let mut targets = topology
            .targets(message.from)
            .map_err(|_| CommunicationError::DeliveryFailures(1))?;

        targets.sort_by(|a, b| {
            let score_of = |id: &AgentId| registry.get(*id).map(|a| a.score).unwrap_or(0.0);
            score_of(b)
                .partial_cmp(&score_of(a))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        self.broadcast_count.fetch_add(1, Ordering::Relaxed);

        let mut report = BroadcastReport::default();
        for target in targets {
            match self
                .send_direct(target, message.clone(), timeout, cancel)
                .await
            {
                Ok(()) => report.delivered.push(target),
                Err(CommunicationError::ShuttingDown) => return Err(CommunicationError::ShuttingDown),
                Err(e) => {
                    warn!(agent_id = %target, error = %e, "broadcast delivery failed");
                    report.failed += 1;
                }
            }
        }

        debug!(
            delivered = report.delivered.len(),
            failed = report.failed,
            "broadcast complete"
        );
        Ok(report)
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new(1000)
    }
}
