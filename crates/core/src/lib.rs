#![warn(clippy::all, missing_docs)]

//! Core simulation for the yardsim rail yard.
//!
//! This crate hosts the yard topology, the two-hop path resolver, the
//! versioned train state store, the per-train movement scheduler, and the
//! command interface used by the terminal UI and advisory sources.

pub mod advisory;
pub mod commands;
pub mod config;
pub mod models;
pub mod registry;
pub mod routing;
pub mod scheduler;
pub mod simulation;
pub mod status;
pub mod topology;

pub use advisory::{Advisor, AdvisoryRequest, AdvisoryResponse, Assignment};
pub use commands::{CommandInterface, MoveOutcome};
pub use config::AppConfig;
pub use models::{parse_hex_color, LocationCategory, LocationId, Point, TrainId, TrainStatus};
pub use registry::{TrainView, YardSnapshot, YardStore};
pub use routing::{interpolate_along_path, PathResolver};
pub use scheduler::{MotionSettings, MovementScheduler};
pub use simulation::YardSimulation;
pub use status::YardStatus;
pub use topology::{Topology, TopologyError, YardLayout};
