//! Shared domain models.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Point on the yard plane, in layout units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate (grows downwards, as in the layout files).
    pub y: f64,
}

impl Point {
    /// Construct a point from its coordinates.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Linear interpolation towards `other`; `t = 0` is `self`, `t = 1` is `other`.
    pub fn lerp(self, other: Point, t: f64) -> Point {
        Point {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    /// Euclidean distance between two points.
    pub fn distance(self, other: Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

macro_rules! string_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw key.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the raw key.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_key!(
    /// Unique key of a location in the yard topology.
    LocationId
);
string_key!(
    /// Unique key of a train in the roster.
    TrainId
);

/// Functional category of a yard location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[allow(missing_docs)]
pub enum LocationCategory {
    MaintenanceBay,
    InspectionLine,
    StorageSiding,
    Junction,
    EntryPoint,
    WashingPlant,
    DeepCleaningBay,
    WheelLathe,
    ShuntingNeck,
    EmergencyRerail,
    TestTrack,
}

impl LocationCategory {
    /// Every category, in display order.
    pub const ALL: [LocationCategory; 11] = [
        LocationCategory::MaintenanceBay,
        LocationCategory::InspectionLine,
        LocationCategory::StorageSiding,
        LocationCategory::Junction,
        LocationCategory::EntryPoint,
        LocationCategory::WashingPlant,
        LocationCategory::DeepCleaningBay,
        LocationCategory::WheelLathe,
        LocationCategory::ShuntingNeck,
        LocationCategory::EmergencyRerail,
        LocationCategory::TestTrack,
    ];

    /// Marker colour used by renderers, as `#rrggbb`.
    pub fn color(self) -> &'static str {
        match self {
            LocationCategory::MaintenanceBay => "#8b5cf6",
            LocationCategory::InspectionLine => "#06b6d4",
            LocationCategory::StorageSiding => "#6b7280",
            LocationCategory::Junction => "#f97316",
            LocationCategory::EntryPoint => "#22c55e",
            LocationCategory::WashingPlant => "#38bdf8",
            LocationCategory::DeepCleaningBay => "#0ea5e9",
            LocationCategory::WheelLathe => "#a16207",
            LocationCategory::ShuntingNeck => "#718096",
            LocationCategory::EmergencyRerail => "#e53e3e",
            LocationCategory::TestTrack => "#facc15",
        }
    }

    /// Human-readable name of the category.
    pub fn label(self) -> &'static str {
        match self {
            LocationCategory::MaintenanceBay => "Maintenance bay",
            LocationCategory::InspectionLine => "Inspection line",
            LocationCategory::StorageSiding => "Storage siding",
            LocationCategory::Junction => "Junction",
            LocationCategory::EntryPoint => "Entry point",
            LocationCategory::WashingPlant => "Washing plant",
            LocationCategory::DeepCleaningBay => "Deep-cleaning bay",
            LocationCategory::WheelLathe => "Wheel lathe",
            LocationCategory::ShuntingNeck => "Shunting neck",
            LocationCategory::EmergencyRerail => "Emergency rerail",
            LocationCategory::TestTrack => "Test track",
        }
    }

    /// Whether a location of this category may act as the routing hub.
    pub fn can_be_hub(self) -> bool {
        matches!(
            self,
            LocationCategory::Junction | LocationCategory::ShuntingNeck
        )
    }
}

/// Movement status of a train.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[allow(missing_docs)]
pub enum TrainStatus {
    Idle,
    Moving,
    UnderMaintenance,
}

impl TrainStatus {
    /// Badge colour used by renderers, as `#rrggbb`.
    pub fn color(self) -> &'static str {
        match self {
            TrainStatus::Idle => "#22c55e",
            TrainStatus::Moving => "#3b82f6",
            TrainStatus::UnderMaintenance => "#eab308",
        }
    }

    /// Short lowercase name of the status.
    pub fn label(self) -> &'static str {
        match self {
            TrainStatus::Idle => "idle",
            TrainStatus::Moving => "moving",
            TrainStatus::UnderMaintenance => "maintenance",
        }
    }
}

/// Decode a `#rrggbb` colour into its red, green and blue channels.
pub fn parse_hex_color(value: &str) -> Option<[u8; 3]> {
    let hex = value.strip_prefix('#')?;
    if hex.len() != 6 || !hex.bytes().all(|byte| byte.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |at: usize| u8::from_str_radix(hex.get(at..at + 2)?, 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}
