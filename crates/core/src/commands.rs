//! Entry point for move intents from control surfaces and advisors.

use serde::Serialize;
use tracing::{info, warn};

use crate::{
    advisory::Assignment,
    models::{LocationId, TrainId},
    registry::YardStore,
};

/// What happened to a move request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MoveOutcome {
    /// The train is now moving towards the target.
    Accepted,
    /// No train with that key; nothing changed.
    UnknownTrain,
    /// No location with that key; nothing changed.
    UnknownLocation,
    /// Refused because another move is in progress and moves are exclusive.
    Busy,
}

impl MoveOutcome {
    /// Whether the request changed the simulation.
    pub fn is_accepted(self) -> bool {
        self == MoveOutcome::Accepted
    }
}

/// Turns move intents into store transitions.
#[derive(Clone)]
pub struct CommandInterface {
    store: YardStore,
    exclusive: bool,
}

impl CommandInterface {
    /// Create a command interface over `store`. With `exclusive` set,
    /// operator moves are refused while any train is moving.
    pub fn new(store: YardStore, exclusive: bool) -> Self {
        Self { store, exclusive }
    }

    /// Ask `train` to move to `target`.
    pub fn move_train(&self, train: &TrainId, target: &LocationId) -> MoveOutcome {
        self.issue(train, target, self.exclusive)
    }

    /// Issue one move per assignment, in order. Entries are independent; an
    /// ignored entry does not stop the rest of the batch. Batches are never
    /// refused as busy, since they exist to move several trains at once.
    pub fn apply_assignments(&self, batch: &[Assignment]) -> Vec<MoveOutcome> {
        let outcomes: Vec<_> = batch
            .iter()
            .map(|assignment| self.issue(&assignment.train_id, &assignment.target_node, false))
            .collect();
        info!(
            total = batch.len(),
            accepted = outcomes.iter().filter(|outcome| outcome.is_accepted()).count(),
            "Assignments applied"
        );
        outcomes
    }

    fn issue(&self, train: &TrainId, target: &LocationId, gated: bool) -> MoveOutcome {
        let outcome = if !self.store.contains(train) {
            MoveOutcome::UnknownTrain
        } else if !self.store.topology().contains(target) {
            MoveOutcome::UnknownLocation
        } else if gated && self.store.is_animating() {
            MoveOutcome::Busy
        } else if self.store.begin_move(train, target).is_some() {
            MoveOutcome::Accepted
        } else {
            MoveOutcome::UnknownTrain
        };

        if !outcome.is_accepted() {
            warn!(train = %train, target = %target, ?outcome, "Move request ignored");
        }
        outcome
    }
}
