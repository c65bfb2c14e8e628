//! Wiring of topology, store, scheduler and commands into one handle.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing::info;

use crate::{
    commands::CommandInterface,
    config::AppConfig,
    registry::{YardSnapshot, YardStore},
    routing::PathResolver,
    scheduler::{MotionSettings, MovementScheduler},
    topology::{Topology, YardLayout},
};

/// A running rail yard simulation.
pub struct YardSimulation {
    topology: Arc<Topology>,
    store: YardStore,
    scheduler: MovementScheduler,
    commands: CommandInterface,
    driver: Option<JoinHandle<()>>,
}

impl YardSimulation {
    /// Build a simulation from a layout. Nothing moves until [`start`](Self::start).
    pub fn new(layout: &YardLayout, motion: MotionSettings, exclusive: bool) -> Result<Self> {
        let topology = Arc::new(layout.topology().context("invalid yard topology")?);
        let store =
            YardStore::new(topology.clone(), &layout.trains).context("invalid train roster")?;
        let scheduler = MovementScheduler::new(
            store.clone(),
            PathResolver::new(topology.clone()),
            motion,
        );
        let commands = CommandInterface::new(store.clone(), exclusive);
        info!(
            locations = topology.locations().len(),
            connections = topology.connections().len(),
            trains = layout.trains.len(),
            hub = %topology.hub(),
            "Yard loaded"
        );
        Ok(Self {
            topology,
            store,
            scheduler,
            commands,
            driver: None,
        })
    }

    /// Build a simulation from configuration, loading the configured layout.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let layout = YardLayout::load_or_builtin(config.layout_path.as_deref())?;
        Self::new(&layout, config.motion_settings(), config.commands.exclusive)
    }

    /// Spawn the scheduler loop. Must be called from within a Tokio runtime.
    pub fn start(&mut self) {
        if self.driver.is_none() {
            self.driver = Some(tokio::spawn(self.scheduler.clone().run()));
        }
    }

    /// Stop the scheduler loop and every animation. In-flight positions stay
    /// as last written.
    pub fn stop(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
        self.scheduler.shutdown();
    }

    /// Static yard description.
    pub fn topology(&self) -> &Arc<Topology> {
        &self.topology
    }

    /// Train state store.
    pub fn store(&self) -> &YardStore {
        &self.store
    }

    /// Movement scheduler.
    pub fn scheduler(&self) -> &MovementScheduler {
        &self.scheduler
    }

    /// Entry point for move commands.
    pub fn commands(&self) -> &CommandInterface {
        &self.commands
    }

    /// Current state of every train.
    pub fn snapshot(&self) -> YardSnapshot {
        self.store.snapshot()
    }
}

impl Drop for YardSimulation {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{advisory::RosterAdvisor, advisory::AdvisoryRequest, models::TrainStatus};

    fn settings() -> MotionSettings {
        MotionSettings {
            duration: Duration::from_secs(3),
            sample_interval: Duration::from_millis(50),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn builtin_yard_moves_through_the_hub() -> Result<()> {
        let mut simulation = YardSimulation::new(&YardLayout::builtin()?, settings(), false)?;
        simulation.start();

        let outcome = simulation
            .commands()
            .move_train(&"TRAIN_001".into(), &"inspection_2".into());
        assert!(outcome.is_accepted());

        tokio::time::sleep(Duration::from_millis(1000)).await;
        let snapshot = simulation.snapshot();
        assert!(snapshot.is_animating);
        let train = snapshot.train(&"TRAIN_001".into()).unwrap();
        assert_eq!(train.status, TrainStatus::Moving);
        assert_eq!(train.rendered, train.position.unwrap());

        tokio::time::sleep(Duration::from_millis(2200)).await;
        let snapshot = simulation.snapshot();
        assert!(!snapshot.is_animating);
        let train = snapshot.train(&"TRAIN_001".into()).unwrap();
        assert_eq!(train.current, "inspection_2".into());
        assert_eq!(train.rendered, simulation.topology().point(&train.current).unwrap());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn advisory_batch_drives_every_train_to_rest() -> Result<()> {
        let mut simulation = YardSimulation::new(&YardLayout::builtin()?, settings(), false)?;
        simulation.start();

        let advisor = RosterAdvisor::for_topology(simulation.topology(), 3);
        let batch = advisor.propose(&AdvisoryRequest::from_snapshot(&simulation.snapshot()));
        assert_eq!(batch.assignments.len(), 3);
        let outcomes = simulation.commands().apply_assignments(&batch.assignments);
        assert!(outcomes.iter().all(|outcome| outcome.is_accepted()));

        tokio::time::sleep(Duration::from_millis(3500)).await;
        let snapshot = simulation.snapshot();
        assert!(!snapshot.is_animating);
        for assignment in &batch.assignments {
            let train = snapshot.train(&assignment.train_id).unwrap();
            assert_eq!(train.status, TrainStatus::Idle);
            assert_eq!(train.current, assignment.target_node);
        }
        assert_eq!(
            snapshot.train(&"TRAIN_004".into()).unwrap().status,
            TrainStatus::UnderMaintenance
        );
        simulation.stop();
        assert_eq!(simulation.scheduler().active(), 0);
        Ok(())
    }
}
