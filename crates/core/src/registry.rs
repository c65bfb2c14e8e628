//! Authoritative train state store.
//!
//! Each transition replaces one train record under a write lock, so readers
//! always observe a fully-formed record. Callers address trains by key only
//! and receive owned copies; nothing hands out references into the store.

use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::{
    models::{parse_hex_color, LocationId, Point, TrainId, TrainStatus},
    topology::{RosterEntry, Topology, TopologyError},
};

/// Identifier of a single `begin_move` call for a train.
pub type JourneyId = u64;

/// Movement part of a train record. The target and interpolated position
/// exist only in the `Moving` variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Motion {
    /// Parked at its current location.
    Idle,
    /// Parked and held for maintenance.
    Maintenance,
    /// Travelling towards `target`.
    Moving {
        /// Destination of the journey.
        target: LocationId,
        /// Last interpolated coordinate.
        position: Point,
        /// Journey number assigned by `begin_move`.
        journey: JourneyId,
    },
}

/// Full record for one train.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainRecord {
    /// Unique key.
    pub id: TrainId,
    /// Display colour, `#rrggbb`.
    pub color: String,
    /// Location the train occupies, or departed from while moving.
    pub current: LocationId,
    /// Movement state.
    pub motion: Motion,
}

impl TrainRecord {
    /// Status derived from the motion state.
    pub fn status(&self) -> TrainStatus {
        match self.motion {
            Motion::Idle => TrainStatus::Idle,
            Motion::Maintenance => TrainStatus::UnderMaintenance,
            Motion::Moving { .. } => TrainStatus::Moving,
        }
    }

    /// Destination while moving.
    pub fn target(&self) -> Option<&LocationId> {
        match &self.motion {
            Motion::Moving { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Interpolated coordinate while moving.
    pub fn position(&self) -> Option<Point> {
        match self.motion {
            Motion::Moving { position, .. } => Some(position),
            _ => None,
        }
    }

    /// Journey number while moving.
    pub fn journey(&self) -> Option<JourneyId> {
        match self.motion {
            Motion::Moving { journey, .. } => Some(journey),
            _ => None,
        }
    }

    fn view(&self, topology: &Topology) -> TrainView {
        TrainView {
            id: self.id.clone(),
            current: self.current.clone(),
            target: self.target().cloned(),
            status: self.status(),
            position: self.position(),
            rendered: self
                .position()
                .or_else(|| topology.point(&self.current))
                .unwrap_or_default(),
            color: self.color.clone(),
        }
    }
}

/// Read-only view of a train, as consumed by renderers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainView {
    /// Unique key.
    pub id: TrainId,
    /// Current location key.
    pub current: LocationId,
    /// Destination while moving.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<LocationId>,
    /// Movement status.
    pub status: TrainStatus,
    /// Interpolated coordinate while moving.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Point>,
    /// Where to draw the train: the interpolated coordinate, or the current
    /// location's coordinate when parked.
    pub rendered: Point,
    /// Display colour.
    pub color: String,
}

/// Consistent copy of the whole store at one version.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YardSnapshot {
    /// Store version the snapshot was taken at.
    pub version: u64,
    /// Whether any train was moving.
    pub is_animating: bool,
    /// Every train, in roster order.
    pub trains: Vec<TrainView>,
}

impl YardSnapshot {
    /// Find a train by key.
    pub fn train(&self, id: &TrainId) -> Option<&TrainView> {
        self.trains.iter().find(|train| &train.id == id)
    }

    /// Trains currently in the given status.
    pub fn count(&self, status: TrainStatus) -> usize {
        self.trains
            .iter()
            .filter(|train| train.status == status)
            .count()
    }
}

/// Thread-safe, versioned store of train records.
#[derive(Clone)]
pub struct YardStore {
    topology: Arc<Topology>,
    inner: Arc<RwLock<Inner>>,
    changes: Arc<watch::Sender<u64>>,
}

struct Inner {
    trains: Vec<TrainRecord>,
    index: HashMap<TrainId, usize>,
    version: u64,
    animating: bool,
    next_journey: JourneyId,
}

impl Inner {
    fn recompute_animating(&mut self) {
        self.animating = self
            .trains
            .iter()
            .any(|train| matches!(train.motion, Motion::Moving { .. }));
    }
}

impl YardStore {
    /// Build a store from the starting roster.
    pub fn new(topology: Arc<Topology>, roster: &[RosterEntry]) -> Result<Self, TopologyError> {
        let mut trains = Vec::with_capacity(roster.len());
        let mut index = HashMap::with_capacity(roster.len());
        for entry in roster {
            if !topology.contains(&entry.location) {
                return Err(TopologyError::UnknownTrainLocation {
                    train: entry.id.clone(),
                    location: entry.location.clone(),
                });
            }
            if parse_hex_color(&entry.color).is_none() {
                return Err(TopologyError::InvalidTrainColor {
                    train: entry.id.clone(),
                    color: entry.color.clone(),
                });
            }
            if index.insert(entry.id.clone(), trains.len()).is_some() {
                return Err(TopologyError::DuplicateTrain(entry.id.clone()));
            }
            trains.push(TrainRecord {
                id: entry.id.clone(),
                color: entry.color.clone(),
                current: entry.location.clone(),
                motion: if entry.under_maintenance {
                    Motion::Maintenance
                } else {
                    Motion::Idle
                },
            });
        }

        let (changes, _) = watch::channel(0);
        Ok(Self {
            topology,
            inner: Arc::new(RwLock::new(Inner {
                trains,
                index,
                version: 0,
                animating: false,
                next_journey: 1,
            })),
            changes: Arc::new(changes),
        })
    }

    /// Topology the store validates locations against.
    pub fn topology(&self) -> &Arc<Topology> {
        &self.topology
    }

    /// Receive the store version after every transition.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Current store version.
    pub fn version(&self) -> u64 {
        self.inner.read().version
    }

    /// Whether any train is moving.
    pub fn is_animating(&self) -> bool {
        self.inner.read().animating
    }

    /// Whether `id` names a train in the roster.
    pub fn contains(&self, id: &TrainId) -> bool {
        self.inner.read().index.contains_key(id)
    }

    /// Copy of one train record.
    pub fn train(&self, id: &TrainId) -> Option<TrainRecord> {
        let inner = self.inner.read();
        inner.index.get(id).map(|&slot| inner.trains[slot].clone())
    }

    /// Copies of every train record, in roster order.
    pub fn trains(&self) -> Vec<TrainRecord> {
        self.inner.read().trains.clone()
    }

    /// Consistent view of every train.
    pub fn snapshot(&self) -> YardSnapshot {
        let inner = self.inner.read();
        YardSnapshot {
            version: inner.version,
            is_animating: inner.animating,
            trains: inner
                .trains
                .iter()
                .map(|train| train.view(&self.topology))
                .collect(),
        }
    }

    /// Mark a train as moving towards `target`.
    ///
    /// No-op for an unknown train or target. Issuing this for a train that is
    /// already moving replaces its target and restarts the journey from its
    /// recorded current location. Returns the new journey number.
    pub fn begin_move(&self, id: &TrainId, target: &LocationId) -> Option<JourneyId> {
        if !self.topology.contains(target) {
            return None;
        }
        let journey = self.apply(id, |inner, train| {
            let origin = self.topology.point(&train.current)?;
            let journey = inner.next_journey;
            inner.next_journey += 1;
            let mut record = train.clone();
            record.motion = Motion::Moving {
                target: target.clone(),
                position: origin,
                journey,
            };
            Some((record, journey))
        })?;
        info!(train = %id, target = %target, journey, "Move started");
        Some(journey)
    }

    /// Record the interpolated position of a moving train. No-op otherwise.
    pub fn update_position(&self, id: &TrainId, position: Point) -> bool {
        self.reposition(id, None, position)
    }

    /// Like [`update_position`](Self::update_position), but only while the
    /// train is still on `journey`.
    pub fn update_journey_position(&self, id: &TrainId, journey: JourneyId, position: Point) -> bool {
        self.reposition(id, Some(journey), position)
    }

    /// Finalise a move: the train arrives at its target and becomes idle.
    /// No-op for unknown or non-moving trains.
    pub fn complete_move(&self, id: &TrainId) -> bool {
        self.finish(id, None)
    }

    /// Like [`complete_move`](Self::complete_move), but only while the train
    /// is still on `journey`.
    pub fn complete_journey(&self, id: &TrainId, journey: JourneyId) -> bool {
        self.finish(id, Some(journey))
    }

    /// Put a parked train under maintenance or release it. Moving trains are
    /// left untouched.
    pub fn set_maintenance(&self, id: &TrainId, under_maintenance: bool) -> bool {
        self.apply(id, |_, train| {
            let motion = match (&train.motion, under_maintenance) {
                (Motion::Moving { .. }, _) => return None,
                (_, true) => Motion::Maintenance,
                (_, false) => Motion::Idle,
            };
            let mut record = train.clone();
            record.motion = motion;
            Some((record, ()))
        })
        .is_some()
    }

    fn reposition(&self, id: &TrainId, expected: Option<JourneyId>, position: Point) -> bool {
        self.apply(id, |_, train| match &train.motion {
            Motion::Moving { target, journey, .. }
                if expected.map_or(true, |expected| expected == *journey) =>
            {
                let mut record = train.clone();
                record.motion = Motion::Moving {
                    target: target.clone(),
                    position,
                    journey: *journey,
                };
                Some((record, ()))
            }
            _ => None,
        })
        .is_some()
    }

    fn finish(&self, id: &TrainId, expected: Option<JourneyId>) -> bool {
        let arrived = self.apply(id, |_, train| match &train.motion {
            Motion::Moving { target, journey, .. }
                if expected.map_or(true, |expected| expected == *journey) =>
            {
                let record = TrainRecord {
                    id: train.id.clone(),
                    color: train.color.clone(),
                    current: target.clone(),
                    motion: Motion::Idle,
                };
                Some((record, target.clone()))
            }
            _ => None,
        });
        match arrived {
            Some(location) => {
                info!(train = %id, location = %location, "Move completed");
                true
            }
            None => false,
        }
    }

    /// Run `transition` against the current record; when it yields a new
    /// record, swap it in, refresh the moving flag and publish a new version.
    fn apply<T>(
        &self,
        id: &TrainId,
        transition: impl FnOnce(&mut Inner, &TrainRecord) -> Option<(TrainRecord, T)>,
    ) -> Option<T> {
        let (version, output) = {
            let mut inner = self.inner.write();
            let slot = *inner.index.get(id)?;
            let current = inner.trains[slot].clone();
            let (record, output) = transition(&mut inner, &current)?;
            inner.trains[slot] = record;
            inner.recompute_animating();
            inner.version += 1;
            (inner.version, output)
        };
        debug!(train = %id, version, "Store updated");
        self.changes.send_replace(version);
        Some(output)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::topology::tests::small_yard;

    fn roster() -> Vec<RosterEntry> {
        vec![
            RosterEntry {
                id: "T1".into(),
                location: "A".into(),
                color: "#3b82f6".to_string(),
                under_maintenance: false,
            },
            RosterEntry {
                id: "T2".into(),
                location: "C".into(),
                color: "#ef4444".to_string(),
                under_maintenance: false,
            },
            RosterEntry {
                id: "T3".into(),
                location: "B".into(),
                color: "#f59e0b".to_string(),
                under_maintenance: true,
            },
        ]
    }

    pub(crate) fn store() -> YardStore {
        YardStore::new(Arc::new(small_yard()), &roster()).expect("roster is valid")
    }

    fn assert_consistent(snapshot: &YardSnapshot) {
        for train in &snapshot.trains {
            let moving = train.status == TrainStatus::Moving;
            assert_eq!(moving, train.target.is_some(), "{train:?}");
            assert_eq!(moving, train.position.is_some(), "{train:?}");
        }
    }

    #[test]
    fn begin_move_sets_target_and_flag() {
        let store = store();
        let journey = store.begin_move(&"T1".into(), &"B".into());
        assert!(journey.is_some());

        let snapshot = store.snapshot();
        assert_consistent(&snapshot);
        assert!(snapshot.is_animating);
        let train = snapshot.train(&"T1".into()).unwrap();
        assert_eq!(train.status, TrainStatus::Moving);
        assert_eq!(train.target, Some("B".into()));
        assert_eq!(train.position, Some(Point::new(0.0, 0.0)));
    }

    #[test]
    fn unknown_ids_are_ignored() {
        let store = store();
        let before = store.snapshot();
        assert_eq!(store.begin_move(&"T9".into(), &"B".into()), None);
        assert_eq!(store.begin_move(&"T1".into(), &"nowhere".into()), None);
        assert!(!store.update_position(&"T9".into(), Point::new(1.0, 1.0)));
        assert!(!store.complete_move(&"T9".into()));
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn position_updates_only_apply_to_moving_trains() {
        let store = store();
        assert!(!store.update_position(&"T1".into(), Point::new(3.0, 0.0)));
        assert!(store.train(&"T1".into()).unwrap().position().is_none());

        store.begin_move(&"T1".into(), &"B".into());
        assert!(store.update_position(&"T1".into(), Point::new(3.0, 0.0)));
        assert_eq!(
            store.train(&"T1".into()).unwrap().position(),
            Some(Point::new(3.0, 0.0))
        );
    }

    #[test]
    fn complete_move_arrives_and_clears_motion() {
        let store = store();
        store.begin_move(&"T1".into(), &"B".into());
        store.update_position(&"T1".into(), Point::new(5.0, 0.0));
        assert!(store.complete_move(&"T1".into()));

        let train = store.train(&"T1".into()).unwrap();
        assert_eq!(train.current, "B".into());
        assert_eq!(train.status(), TrainStatus::Idle);
        assert!(train.target().is_none());
        assert!(train.position().is_none());
        assert!(!store.is_animating());
        assert!(!store.complete_move(&"T1".into()));
    }

    #[test]
    fn moving_flag_clears_with_last_arrival() {
        let store = store();
        store.begin_move(&"T1".into(), &"B".into());
        store.begin_move(&"T2".into(), &"A".into());
        store.complete_move(&"T1".into());
        assert!(store.is_animating());
        store.complete_move(&"T2".into());
        assert!(!store.is_animating());
        assert_consistent(&store.snapshot());
    }

    #[test]
    fn stale_journey_cannot_finish_retargeted_train() {
        let store = store();
        let first = store.begin_move(&"T1".into(), &"B".into()).unwrap();
        let second = store.begin_move(&"T1".into(), &"C".into()).unwrap();
        assert_ne!(first, second);

        assert!(!store.update_journey_position(&"T1".into(), first, Point::new(9.0, 0.0)));
        assert!(!store.complete_journey(&"T1".into(), first));
        let train = store.train(&"T1".into()).unwrap();
        assert_eq!(train.target(), Some(&"C".into()));
        assert_eq!(train.position(), Some(Point::new(0.0, 0.0)));

        assert!(store.complete_journey(&"T1".into(), second));
        assert_eq!(store.train(&"T1".into()).unwrap().current, "C".into());
    }

    #[test]
    fn maintenance_is_orthogonal_to_movement() {
        let store = store();
        assert_eq!(
            store.train(&"T3".into()).unwrap().status(),
            TrainStatus::UnderMaintenance
        );
        assert!(store.set_maintenance(&"T3".into(), false));
        assert_eq!(store.train(&"T3".into()).unwrap().status(), TrainStatus::Idle);

        store.begin_move(&"T1".into(), &"B".into());
        assert!(!store.set_maintenance(&"T1".into(), true));
        assert_eq!(store.train(&"T1".into()).unwrap().status(), TrainStatus::Moving);
    }

    #[test]
    fn every_transition_bumps_the_version() {
        let store = store();
        let mut changes = store.subscribe();
        store.begin_move(&"T1".into(), &"B".into());
        assert!(changes.has_changed().unwrap());
        assert_eq!(*changes.borrow_and_update(), 1);
        store.update_position(&"T1".into(), Point::new(1.0, 0.0));
        store.complete_move(&"T1".into());
        assert_eq!(store.version(), 3);
        assert_eq!(*changes.borrow_and_update(), 3);
    }

    #[test]
    fn roster_validation() {
        let topology = Arc::new(small_yard());
        let mut entries = roster();
        entries.push(entries[0].clone());
        assert_eq!(
            YardStore::new(topology.clone(), &entries).err(),
            Some(TopologyError::DuplicateTrain("T1".into()))
        );

        let mut entries = roster();
        entries[1].location = "Z".into();
        assert!(matches!(
            YardStore::new(topology.clone(), &entries).err(),
            Some(TopologyError::UnknownTrainLocation { .. })
        ));

        let mut entries = roster();
        entries[2].color = "#1é234".to_string();
        assert_eq!(
            YardStore::new(topology, &entries).err(),
            Some(TopologyError::InvalidTrainColor {
                train: "T3".into(),
                color: "#1é234".to_string(),
            })
        );
    }

    #[test]
    fn snapshot_serialises_for_renderers() -> serde_json::Result<()> {
        let store = store();
        store.begin_move(&"T1".into(), &"B".into());
        let json = serde_json::to_value(store.snapshot())?;
        assert_eq!(json["isAnimating"], serde_json::json!(true));
        assert_eq!(json["trains"][0]["target"], serde_json::json!("B"));
        assert!(json["trains"][1].get("target").is_none());
        assert_eq!(json["trains"][2]["status"], serde_json::json!("under-maintenance"));
        Ok(())
    }
}
