//! Static yard topology: locations, connections, and the routing hub.

mod layout;

use std::collections::HashMap;

use thiserror::Error;

use crate::models::{LocationCategory, LocationId, Point, TrainId};

pub use layout::{ConnectionSpec, LocationSpec, RosterEntry, YardLayout};

/// Reasons a yard layout is rejected.
#[derive(Debug, Error, PartialEq)]
pub enum TopologyError {
    /// Two locations share the same key.
    #[error("duplicate location '{0}'")]
    DuplicateLocation(LocationId),
    /// A connection references a location that was never declared.
    #[error("connection {from} -> {to} references unknown location '{missing}'")]
    UnknownConnectionEndpoint {
        /// Declared start of the connection.
        from: LocationId,
        /// Declared end of the connection.
        to: LocationId,
        /// The endpoint that is not a known location.
        missing: LocationId,
    },
    /// The configured hub is not a known location.
    #[error("hub '{0}' is not a known location")]
    UnknownHub(LocationId),
    /// The configured hub exists but is not junction-like.
    #[error("hub '{hub}' has category {category:?}; expected junction or shunting-neck")]
    InvalidHubCategory {
        /// Configured hub key.
        hub: LocationId,
        /// Category the hub was declared with.
        category: LocationCategory,
    },
    /// Two trains share the same key.
    #[error("duplicate train '{0}'")]
    DuplicateTrain(TrainId),
    /// A train's display colour is not `#rrggbb`.
    #[error("train '{train}' has invalid colour '{color}'; expected #rrggbb")]
    InvalidTrainColor {
        /// Offending train.
        train: TrainId,
        /// Colour as declared.
        color: String,
    },
    /// A train is parked at a location that was never declared.
    #[error("train '{train}' is parked at unknown location '{location}'")]
    UnknownTrainLocation {
        /// Offending train.
        train: TrainId,
        /// Location it claims to occupy.
        location: LocationId,
    },
}

/// A named point of the yard.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    /// Unique key.
    pub id: LocationId,
    /// Position on the yard plane.
    pub point: Point,
    /// Display label.
    pub label: String,
    /// Functional category.
    pub category: LocationCategory,
}

/// A registered track between two locations.
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    /// Declared start.
    pub from: LocationId,
    /// Declared end.
    pub to: LocationId,
    /// Waypoints from `from` to `to`.
    pub waypoints: Vec<Point>,
}

#[derive(Debug, Clone, Copy)]
struct Link {
    connection: usize,
    reversed: bool,
}

/// Immutable yard graph. Connections are undirected for lookup purposes.
#[derive(Debug, Clone)]
pub struct Topology {
    hub: LocationId,
    locations: Vec<Location>,
    index: HashMap<LocationId, usize>,
    connections: Vec<Connection>,
    links: HashMap<(LocationId, LocationId), Link>,
}

impl Topology {
    /// Build and validate a topology.
    ///
    /// When the same pair is connected more than once (in either direction)
    /// the first registered connection wins.
    pub fn new(
        hub: LocationId,
        locations: Vec<Location>,
        connections: Vec<Connection>,
    ) -> Result<Self, TopologyError> {
        let mut index = HashMap::with_capacity(locations.len());
        for (position, location) in locations.iter().enumerate() {
            if index.insert(location.id.clone(), position).is_some() {
                return Err(TopologyError::DuplicateLocation(location.id.clone()));
            }
        }

        let hub_category = index
            .get(&hub)
            .map(|&position| locations[position].category)
            .ok_or_else(|| TopologyError::UnknownHub(hub.clone()))?;
        if !hub_category.can_be_hub() {
            return Err(TopologyError::InvalidHubCategory {
                hub,
                category: hub_category,
            });
        }

        let mut links = HashMap::with_capacity(connections.len() * 2);
        for (position, connection) in connections.iter().enumerate() {
            for endpoint in [&connection.from, &connection.to] {
                if !index.contains_key(endpoint) {
                    return Err(TopologyError::UnknownConnectionEndpoint {
                        from: connection.from.clone(),
                        to: connection.to.clone(),
                        missing: endpoint.clone(),
                    });
                }
            }
            links
                .entry((connection.from.clone(), connection.to.clone()))
                .or_insert(Link {
                    connection: position,
                    reversed: false,
                });
            links
                .entry((connection.to.clone(), connection.from.clone()))
                .or_insert(Link {
                    connection: position,
                    reversed: true,
                });
        }

        Ok(Self {
            hub,
            locations,
            index,
            connections,
            links,
        })
    }

    /// The designated routing hub.
    pub fn hub(&self) -> &LocationId {
        &self.hub
    }

    /// Look up a location by key.
    pub fn location(&self, id: &LocationId) -> Option<&Location> {
        self.index.get(id).map(|&position| &self.locations[position])
    }

    /// Whether `id` names a known location.
    pub fn contains(&self, id: &LocationId) -> bool {
        self.index.contains_key(id)
    }

    /// Coordinate of a location.
    pub fn point(&self, id: &LocationId) -> Option<Point> {
        self.location(id).map(|location| location.point)
    }

    /// Category of a location.
    pub fn category(&self, id: &LocationId) -> Option<LocationCategory> {
        self.location(id).map(|location| location.category)
    }

    /// All locations in declaration order.
    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    /// All connections in declaration order, including shadowed duplicates.
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Whether a direct connection exists between `a` and `b` in either direction.
    pub fn is_connected(&self, a: &LocationId, b: &LocationId) -> bool {
        self.links.contains_key(&(a.clone(), b.clone()))
    }

    /// Waypoints of the direct connection between `from` and `to`, oriented
    /// so the sequence starts at `from`.
    pub fn waypoints(&self, from: &LocationId, to: &LocationId) -> Option<Vec<Point>> {
        let link = self.links.get(&(from.clone(), to.clone()))?;
        let mut waypoints = self.connections[link.connection].waypoints.clone();
        if link.reversed {
            waypoints.reverse();
        }
        Some(waypoints)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn location(id: &str, x: f64, y: f64, category: LocationCategory) -> Location {
        Location {
            id: id.into(),
            point: Point::new(x, y),
            label: id.to_uppercase(),
            category,
        }
    }

    pub(crate) fn connection(from: &str, to: &str, points: &[(f64, f64)]) -> Connection {
        Connection {
            from: from.into(),
            to: to.into(),
            waypoints: points.iter().map(|&(x, y)| Point::new(x, y)).collect(),
        }
    }

    /// A: (0,0), B: (10,0), H: hub at (0,10), C: (10,10), D isolated.
    pub(crate) fn small_yard() -> Topology {
        Topology::new(
            "H".into(),
            vec![
                location("A", 0.0, 0.0, LocationCategory::StorageSiding),
                location("B", 10.0, 0.0, LocationCategory::InspectionLine),
                location("H", 0.0, 10.0, LocationCategory::Junction),
                location("C", 10.0, 10.0, LocationCategory::MaintenanceBay),
                location("D", 50.0, 50.0, LocationCategory::TestTrack),
            ],
            vec![
                connection("A", "B", &[(0.0, 0.0), (10.0, 0.0)]),
                connection("A", "H", &[(0.0, 0.0), (0.0, 5.0), (0.0, 10.0)]),
                connection("C", "H", &[(10.0, 10.0), (5.0, 10.0), (0.0, 10.0)]),
            ],
        )
        .expect("small yard is valid")
    }

    #[test]
    fn reverse_lookup_flips_waypoints() {
        let yard = small_yard();
        let forward = yard.waypoints(&"A".into(), &"H".into()).unwrap();
        let backward = yard.waypoints(&"H".into(), &"A".into()).unwrap();
        assert_eq!(forward.first(), Some(&Point::new(0.0, 0.0)));
        assert_eq!(backward.first(), Some(&Point::new(0.0, 10.0)));
        assert!(yard.is_connected(&"B".into(), &"A".into()));
        assert!(!yard.is_connected(&"B".into(), &"C".into()));
    }

    #[test]
    fn first_registered_connection_wins() {
        let yard = Topology::new(
            "H".into(),
            vec![
                location("A", 0.0, 0.0, LocationCategory::StorageSiding),
                location("H", 5.0, 0.0, LocationCategory::ShuntingNeck),
            ],
            vec![
                connection("A", "H", &[(0.0, 0.0), (5.0, 0.0)]),
                connection("H", "A", &[(5.0, 0.0), (2.0, 3.0), (0.0, 0.0)]),
            ],
        )
        .unwrap();
        assert_eq!(
            yard.waypoints(&"H".into(), &"A".into()),
            Some(vec![Point::new(5.0, 0.0), Point::new(0.0, 0.0)])
        );
        assert_eq!(yard.connections().len(), 2);
    }

    #[test]
    fn rejects_unknown_connection_endpoint() {
        let err = Topology::new(
            "H".into(),
            vec![location("H", 0.0, 0.0, LocationCategory::Junction)],
            vec![connection("H", "nowhere", &[(0.0, 0.0), (1.0, 1.0)])],
        )
        .unwrap_err();
        assert_eq!(
            err,
            TopologyError::UnknownConnectionEndpoint {
                from: "H".into(),
                to: "nowhere".into(),
                missing: "nowhere".into(),
            }
        );
    }

    #[test]
    fn rejects_bad_hubs_and_duplicates() {
        let missing = Topology::new(
            "H".into(),
            vec![location("A", 0.0, 0.0, LocationCategory::Junction)],
            Vec::new(),
        );
        assert_eq!(missing.unwrap_err(), TopologyError::UnknownHub("H".into()));

        let siding = Topology::new(
            "A".into(),
            vec![location("A", 0.0, 0.0, LocationCategory::StorageSiding)],
            Vec::new(),
        );
        assert!(matches!(
            siding.unwrap_err(),
            TopologyError::InvalidHubCategory { .. }
        ));

        let duplicate = Topology::new(
            "A".into(),
            vec![
                location("A", 0.0, 0.0, LocationCategory::Junction),
                location("A", 1.0, 0.0, LocationCategory::Junction),
            ],
            Vec::new(),
        );
        assert_eq!(
            duplicate.unwrap_err(),
            TopologyError::DuplicateLocation("A".into())
        );
    }
}
