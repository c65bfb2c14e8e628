//! Advisory assignment sources.
//!
//! An advisor looks at the roster and proposes which train should go where.
//! Its output is consumed but never validated here; the command interface
//! drops entries that reference unknown keys.

use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    config::AdvisorConfig,
    models::{LocationCategory, LocationId, TrainId, TrainStatus},
    registry::YardSnapshot,
    topology::Topology,
};

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const REASONS: [&str; 6] = [
    "Scheduled maintenance required",
    "Optimal resource utilization",
    "Balancing yard capacity",
    "Preparing for next service",
    "Routine inspection due",
    "Emergency response positioning",
];

/// A suggested move. Only `train_id` and `target_node` drive the
/// simulation; the remaining fields are informational.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    /// Train to move.
    pub train_id: TrainId,
    /// Where to move it.
    pub target_node: LocationId,
    /// Advisor priority, 1 is most urgent.
    #[serde(default)]
    pub priority: u32,
    /// Advisor's estimate of the move, in seconds.
    #[serde(default, alias = "estimatedDuration")]
    pub estimated_time: u32,
    /// Free-form justification.
    #[serde(default)]
    pub reason: String,
}

/// Train summary sent to an advisor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisoryTrain {
    /// Train key.
    pub id: TrainId,
    /// Location the train occupies.
    pub current_node: LocationId,
    /// Movement status.
    pub status: TrainStatus,
}

/// Optional limits passed to an advisor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisoryConstraints {
    /// Upper bound on proposed moves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_movements: Option<usize>,
    /// Trains to consider first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub priority_trains: Vec<TrainId>,
}

/// Request body for an advisor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryRequest {
    /// Every train of the roster.
    pub trains: Vec<AdvisoryTrain>,
    /// Optional limits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<AdvisoryConstraints>,
}

impl AdvisoryRequest {
    /// Summarise a snapshot for an advisor.
    pub fn from_snapshot(snapshot: &YardSnapshot) -> Self {
        Self {
            trains: snapshot
                .trains
                .iter()
                .map(|train| AdvisoryTrain {
                    id: train.id.clone(),
                    current_node: train.current.clone(),
                    status: train.status,
                })
                .collect(),
            constraints: None,
        }
    }

    /// Attach constraints to the request.
    pub fn with_constraints(mut self, constraints: AdvisoryConstraints) -> Self {
        self.constraints = Some(constraints);
        self
    }
}

/// Information about how a batch was produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisoryMetadata {
    /// Seconds the advisor spent.
    #[serde(default)]
    pub optimization_time: f64,
    /// Algorithm name.
    #[serde(default)]
    pub algorithm: String,
    /// Confidence in `[0, 1]`.
    #[serde(default)]
    pub confidence: f64,
}

/// A batch of suggested moves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryResponse {
    /// Whether the advisor produced a usable batch.
    #[serde(default)]
    pub success: bool,
    /// Suggested moves, in the order they should be applied.
    #[serde(default)]
    pub assignments: Vec<Assignment>,
    /// How the batch was produced.
    #[serde(default)]
    pub metadata: AdvisoryMetadata,
}

/// Remote advisor reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpAdvisor {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpAdvisor {
    /// Create a client posting requests to `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("failed to build advisory HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Endpoint requests are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST the request and decode the advisor's batch.
    pub async fn propose(&self, request: &AdvisoryRequest) -> Result<AdvisoryResponse> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .with_context(|| format!("failed to reach advisor at {}", self.endpoint))?
            .error_for_status()
            .with_context(|| format!("advisor at {} returned an error", self.endpoint))?;
        let batch: AdvisoryResponse = response
            .json()
            .await
            .context("failed to decode advisor response")?;
        if !batch.success {
            warn!(endpoint = %self.endpoint, "Advisor reported an unsuccessful run");
        }
        Ok(batch)
    }
}

/// Local advisor that rotates idle trains through service locations.
#[derive(Debug)]
pub struct RosterAdvisor {
    candidates: Vec<LocationId>,
    max_assignments: usize,
    cursor: AtomicUsize,
}

impl RosterAdvisor {
    /// Build an advisor proposing moves to `candidates`.
    pub fn new(candidates: Vec<LocationId>, max_assignments: usize) -> Self {
        Self {
            candidates,
            max_assignments,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Use every maintenance bay, inspection line, and storage siding of
    /// `topology` as candidates.
    pub fn for_topology(topology: &Topology, max_assignments: usize) -> Self {
        let candidates = topology
            .locations()
            .iter()
            .filter(|location| {
                matches!(
                    location.category,
                    LocationCategory::MaintenanceBay
                        | LocationCategory::InspectionLine
                        | LocationCategory::StorageSiding
                )
            })
            .map(|location| location.id.clone())
            .collect();
        Self::new(candidates, max_assignments)
    }

    /// Propose moves for up to `max_assignments` idle trains.
    pub fn propose(&self, request: &AdvisoryRequest) -> AdvisoryResponse {
        let limit = request
            .constraints
            .as_ref()
            .and_then(|constraints| constraints.max_movements)
            .map_or(self.max_assignments, |max| max.min(self.max_assignments));
        let prioritised = request
            .constraints
            .as_ref()
            .map(|constraints| constraints.priority_trains.as_slice())
            .unwrap_or_default();

        let mut idle: Vec<&AdvisoryTrain> = request
            .trains
            .iter()
            .filter(|train| train.status == TrainStatus::Idle)
            .collect();
        idle.sort_by_key(|train| !prioritised.contains(&train.id));

        let mut assignments = Vec::new();
        for train in idle.into_iter().take(limit) {
            let Some(target) = self.next_target(&train.current_node) else {
                break;
            };
            let index = assignments.len();
            assignments.push(Assignment {
                train_id: train.id.clone(),
                target_node: target,
                priority: (index % 5) as u32 + 1,
                estimated_time: 60 + 30 * index as u32,
                reason: REASONS[(self.cursor.load(Ordering::Relaxed) + index) % REASONS.len()]
                    .to_string(),
            });
        }

        AdvisoryResponse {
            success: true,
            assignments,
            metadata: AdvisoryMetadata {
                optimization_time: 0.0,
                algorithm: "Round-robin rotation".to_string(),
                confidence: 0.5,
            },
        }
    }

    fn next_target(&self, current: &LocationId) -> Option<LocationId> {
        let len = self.candidates.len();
        if len == 0 {
            return None;
        }
        for _ in 0..len {
            let slot = self.cursor.fetch_add(1, Ordering::Relaxed) % len;
            if &self.candidates[slot] != current {
                return Some(self.candidates[slot].clone());
            }
        }
        None
    }
}

/// Advisor selected by configuration.
#[derive(Debug)]
pub enum Advisor {
    /// Remote optimizer.
    Http(HttpAdvisor),
    /// Built-in rotation.
    Roster(RosterAdvisor),
}

impl Advisor {
    /// Use the HTTP endpoint when configured, otherwise the local rotation.
    pub fn from_config(config: &AdvisorConfig, topology: &Topology) -> Result<Self> {
        match config.endpoint.as_deref().map(str::trim) {
            Some(endpoint) if !endpoint.is_empty() => {
                info!(endpoint, "Using remote advisor");
                Ok(Advisor::Http(HttpAdvisor::new(endpoint)?))
            }
            _ => Ok(Advisor::Roster(RosterAdvisor::for_topology(
                topology,
                config.max_assignments,
            ))),
        }
    }

    /// Short description for status lines.
    pub fn describe(&self) -> String {
        match self {
            Advisor::Http(advisor) => format!("remote advisor at {}", advisor.endpoint()),
            Advisor::Roster(_) => "built-in rotation".to_string(),
        }
    }

    /// Ask for a batch of assignments.
    pub async fn propose(&self, request: &AdvisoryRequest) -> Result<AdvisoryResponse> {
        match self {
            Advisor::Http(advisor) => advisor.propose(request).await,
            Advisor::Roster(advisor) => Ok(advisor.propose(request)),
        }
    }
}
