//! Single-flight coordination for content generation.
//!
//! At most one generation runs per node id at a time. The first caller to
//! find the slot vacant becomes the leader and runs the flight; everyone
//! arriving while it is active awaits the same broadcast outcome.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::watch;

use crate::content::AugmentedContent;
use crate::error::{AugmentError, Result};

/// Terminal outcome of a flight, broadcast to every waiter.
#[derive(Debug, Clone)]
pub enum FlightOutcome {
    Generated(AugmentedContent),
    Failed(String),
}

pub type OutcomeReceiver = watch::Receiver<Option<FlightOutcome>>;

/// What [`FlightMap::join`] handed the caller.
#[derive(Debug)]
pub enum FlightRole {
    /// The caller claimed the slot and must run the generation, finishing
    /// it through [`FlightMap::complete`].
    Leader(FlightTicket),
    /// Another flight is active for this node; await its outcome.
    Follower(OutcomeReceiver),
}

/// Proof of leadership for one flight. Held by the generation task.
#[derive(Debug)]
pub struct FlightTicket {
    key: String,
    sender: watch::Sender<Option<FlightOutcome>>,
}

impl FlightTicket {
    /// The leader's own seat on the broadcast.
    pub fn subscribe(&self) -> OutcomeReceiver {
        self.sender.subscribe()
    }
}

/// In-flight generations keyed by node id.
#[derive(Debug, Default)]
pub struct FlightMap {
    inflight: DashMap<String, OutcomeReceiver>,
}

impl FlightMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim or join the flight for `key`. The entry operation locks the
    /// map shard, so two racing callers cannot both become leader.
    pub fn join(&self, key: &str) -> FlightRole {
        match self.inflight.entry(key.to_string()) {
            Entry::Occupied(entry) => FlightRole::Follower(entry.get().clone()),
            Entry::Vacant(entry) => {
                let (sender, receiver) = watch::channel(None);
                entry.insert(receiver);
                FlightRole::Leader(FlightTicket {
                    key: key.to_string(),
                    sender,
                })
            }
        }
    }

    /// Publish the outcome. The slot is freed before the broadcast so a
    /// caller arriving afterwards re-checks the persisted cache instead of
    /// attaching to a finished flight.
    pub fn complete(&self, ticket: FlightTicket, outcome: FlightOutcome) {
        self.inflight.remove(&ticket.key);
        let _ = ticket.sender.send(Some(outcome));
    }

    /// Number of generations currently in flight.
    pub fn len(&self) -> usize {
        self.inflight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inflight.is_empty()
    }
}

/// Await a flight's broadcast outcome.
pub async fn wait_for_outcome(mut receiver: OutcomeReceiver) -> Result<FlightOutcome> {
    let value = receiver
        .wait_for(|outcome| outcome.is_some())
        .await
        .map_err(|_| AugmentError::Interrupted)?;
    match value.as_ref() {
        Some(outcome) => Ok(outcome.clone()),
        None => Err(AugmentError::Interrupted),
    }
}
