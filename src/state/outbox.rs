use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::services::outcome::PlayerSettlement;

/// One player's settlement, queued for the persistence worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementJob {
    /// Room the match was played in, for logs.
    pub room_id: String,
    pub settlement: PlayerSettlement,
}

/// Bounded hand-off between finished matches and the settlement worker.
///
/// Dispatch never waits: when the queue is full or the worker is gone the job
/// is dropped and logged.
#[derive(Debug, Clone)]
pub struct SettlementOutbox {
    tx: mpsc::Sender<SettlementJob>,
}

impl SettlementOutbox {
    /// Create the outbox and the receiver the worker drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<SettlementJob>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queue `job`, returning whether it was accepted.
    pub fn dispatch(&self, job: SettlementJob) -> bool {
        match self.tx.try_send(job) {
            Ok(()) => {
                debug!("settlement queued");
                true
            }
            Err(TrySendError::Full(job)) => {
                warn!(
                    room_id = %job.room_id,
                    player = %job.settlement.name,
                    "settlement queue full; dropping settlement"
                );
                false
            }
            Err(TrySendError::Closed(job)) => {
                warn!(
                    room_id = %job.room_id,
                    player = %job.settlement.name,
                    "settlement worker stopped; dropping settlement"
                );
                false
            }
        }
    }
}
