use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::{Connection, Location, Topology, TopologyError};
use crate::models::{LocationCategory, LocationId, Point, TrainId};

const BUILTIN_LAYOUT: &str = include_str!("default_yard.json");

/// On-disk description of a yard: topology plus the starting roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YardLayout {
    /// Key of the location used as the routing fallback.
    pub hub: LocationId,
    /// Every location of the yard.
    pub locations: Vec<LocationSpec>,
    /// Registered tracks between locations.
    #[serde(default)]
    pub connections: Vec<ConnectionSpec>,
    /// Trains present when the simulation starts.
    #[serde(default)]
    pub trains: Vec<RosterEntry>,
}

/// Serialized location entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationSpec {
    /// Unique key.
    pub id: LocationId,
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
    /// Display label; defaults to the key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Functional category.
    pub category: LocationCategory,
}

/// Serialized connection entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSpec {
    /// Declared start.
    pub from: LocationId,
    /// Declared end.
    pub to: LocationId,
    /// Waypoints from `from` to `to`.
    pub path: Vec<Point>,
}

/// Serialized roster entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterEntry {
    /// Unique key.
    pub id: TrainId,
    /// Location the train is parked at.
    pub location: LocationId,
    /// Display colour, `#rrggbb`.
    pub color: String,
    /// Whether the train starts out under maintenance.
    #[serde(default)]
    pub under_maintenance: bool,
}

impl YardLayout {
    /// The yard bundled with the crate.
    pub fn builtin() -> Result<Self> {
        serde_json::from_str(BUILTIN_LAYOUT).context("failed to parse built-in yard layout")
    }

    /// Load a layout from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read layout {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse layout {}", path.display()))
    }

    /// Load from `path` when given, otherwise fall back to the built-in yard.
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Self::builtin(),
        }
    }

    /// Validate the layout into a [`Topology`]. The roster is validated
    /// separately when the state store is built.
    pub fn topology(&self) -> Result<Topology, TopologyError> {
        let locations = self
            .locations
            .iter()
            .map(|spec| Location {
                id: spec.id.clone(),
                point: Point::new(spec.x, spec.y),
                label: spec
                    .label
                    .clone()
                    .filter(|label| !label.trim().is_empty())
                    .unwrap_or_else(|| spec.id.to_string()),
                category: spec.category,
            })
            .collect();
        let connections = self
            .connections
            .iter()
            .map(|spec| Connection {
                from: spec.from.clone(),
                to: spec.to.clone(),
                waypoints: spec.path.clone(),
            })
            .collect();
        Topology::new(self.hub.clone(), locations, connections)
    }
}
