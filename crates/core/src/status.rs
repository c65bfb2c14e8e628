//! Yard status board data.
//!
//! Weather, signalling and power figures are illustrative placeholders; only
//! the track and occupancy counts are derived from the running simulation.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::{
    models::{LocationCategory, TrainStatus},
    registry::YardSnapshot,
    topology::Topology,
};

/// Descriptive record for a status display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YardStatus {
    /// When the board was assembled.
    pub timestamp: DateTime<Utc>,
    /// Whether the yard accepts traffic.
    pub operational: bool,
    /// Local conditions.
    pub weather: Weather,
    /// Track, signal and power figures.
    pub infrastructure: Infrastructure,
    /// Parking occupancy.
    pub capacity: Capacity,
    /// Open notices, newest last.
    pub alerts: Vec<Alert>,
}

/// Local conditions.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Weather {
    /// Short description, e.g. `clear`.
    pub condition: String,
    /// Degrees Celsius.
    pub temperature: i32,
    /// Relative humidity in percent.
    pub humidity: u32,
    /// Kilometres per hour.
    pub wind_speed: u32,
}

/// Fixed equipment figures.
#[derive(Debug, Clone, Serialize)]
pub struct Infrastructure {
    /// One track per connection.
    pub tracks: TrackCounts,
    /// Signal heads.
    pub signals: SignalCounts,
    /// Traction supply.
    pub power: PowerStatus,
}

/// Track counts.
#[derive(Debug, Clone, Serialize)]
pub struct TrackCounts {
    /// All tracks.
    pub total: usize,
    /// Tracks open to traffic.
    pub operational: usize,
    /// Tracks closed for works.
    pub maintenance: usize,
}

/// Signal counts.
#[derive(Debug, Clone, Serialize)]
pub struct SignalCounts {
    /// All signals.
    pub total: usize,
    /// Signals working normally.
    pub operational: usize,
    /// Signals reporting a fault.
    pub faults: usize,
}

/// Traction supply.
#[derive(Debug, Clone, Serialize)]
pub struct PowerStatus {
    /// Supply state, e.g. `normal`.
    pub status: String,
    /// Line voltage in volts.
    pub voltage: u32,
    /// Load in percent of rated supply.
    pub consumption: f64,
}

/// Parking occupancy.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capacity {
    /// Locations a train can be parked at.
    pub total_spots: usize,
    /// Spots holding a parked train.
    pub occupied: usize,
    /// Spots still free.
    pub available: usize,
    /// Percentage of spots in use, one decimal.
    pub utilization: f64,
}

/// A notice on the board.
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    /// Stable key.
    pub id: String,
    /// Alert family, serialised as `type`.
    #[serde(rename = "type")]
    pub kind: String,
    /// `low`, `medium` or `high`.
    pub severity: String,
    /// Human-readable text.
    pub message: String,
    /// When the alert was raised.
    pub timestamp: DateTime<Utc>,
}

impl YardStatus {
    /// Assemble the board for `snapshot` at time `now`.
    pub fn collect(topology: &Topology, snapshot: &YardSnapshot, now: DateTime<Utc>) -> Self {
        let parking = |category: LocationCategory| {
            matches!(
                category,
                LocationCategory::StorageSiding
                    | LocationCategory::InspectionLine
                    | LocationCategory::MaintenanceBay
                    | LocationCategory::WashingPlant
                    | LocationCategory::DeepCleaningBay
                    | LocationCategory::WheelLathe
            )
        };
        let total_spots = topology
            .locations()
            .iter()
            .filter(|location| parking(location.category))
            .count();
        let occupied = snapshot
            .trains
            .iter()
            .filter(|train| train.status != TrainStatus::Moving)
            .filter(|train| topology.category(&train.current).is_some_and(parking))
            .count()
            .min(total_spots);
        let utilization = if total_spots == 0 {
            0.0
        } else {
            (occupied as f64 * 1000.0 / total_spots as f64).round() / 10.0
        };

        let maintenance = snapshot.count(TrainStatus::UnderMaintenance);
        let tracks = topology.connections().len();
        let mut alerts = Vec::new();
        if maintenance > 0 {
            alerts.push(Alert {
                id: "ALERT_001".to_string(),
                kind: "maintenance".to_string(),
                severity: "low".to_string(),
                message: format!("{maintenance} train(s) held for maintenance"),
                timestamp: now - Duration::hours(1),
            });
        }

        Self {
            timestamp: now,
            operational: true,
            weather: Weather {
                condition: "clear".to_string(),
                temperature: 28,
                humidity: 65,
                wind_speed: 12,
            },
            infrastructure: Infrastructure {
                tracks: TrackCounts {
                    total: tracks,
                    operational: tracks,
                    maintenance: 0,
                },
                signals: SignalCounts {
                    total: 18,
                    operational: 18,
                    faults: 0,
                },
                power: PowerStatus {
                    status: "normal".to_string(),
                    voltage: 750,
                    consumption: 85.2,
                },
            },
            capacity: Capacity {
                total_spots,
                occupied,
                available: total_spots - occupied,
                utilization,
            },
            alerts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::tests::store;

    #[test]
    fn capacity_reflects_parked_trains() {
        let store = store();
        let now = Utc::now();
        let status = YardStatus::collect(store.topology(), &store.snapshot(), now);

        // A, B, C can hold trains; all three roster trains are parked there.
        assert_eq!(status.capacity.total_spots, 3);
        assert_eq!(status.capacity.occupied, 3);
        assert_eq!(status.capacity.available, 0);
        assert_eq!(status.capacity.utilization, 100.0);
        assert_eq!(status.infrastructure.tracks.total, 3);
        assert_eq!(status.alerts.len(), 1);

        store.begin_move(&"T1".into(), &"B".into());
        let status = YardStatus::collect(store.topology(), &store.snapshot(), now);
        assert_eq!(status.capacity.occupied, 2);
        assert_eq!(status.capacity.utilization, 66.7);
    }

    #[test]
    fn serialises_with_display_field_names() -> serde_json::Result<()> {
        let store = store();
        let status = YardStatus::collect(store.topology(), &store.snapshot(), Utc::now());
        let json = serde_json::to_value(&status)?;
        assert!(json["capacity"].get("totalSpots").is_some());
        assert!(json["weather"].get("windSpeed").is_some());
        assert_eq!(json["alerts"][0]["type"], serde_json::json!("maintenance"));
        Ok(())
    }
}
