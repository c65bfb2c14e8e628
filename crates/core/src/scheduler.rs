//! Per-train movement animation.
//!
//! The scheduler watches the store for trains in the moving state that have
//! no animation yet, resolves their route, and spawns one sampling task per
//! train. Each task interpolates the position over a fixed duration and
//! finalises the move when progress reaches one.

use std::{collections::HashMap, sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::{
    task::AbortHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{debug, warn};

use crate::{
    models::{Point, TrainId},
    registry::{JourneyId, Motion, YardStore},
    routing::{interpolate_along_path, PathResolver},
};

/// Time every journey takes, regardless of its length.
pub const DEFAULT_MOVE_DURATION: Duration = Duration::from_secs(3);
/// Default delay between two position samples.
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(16);

/// Timing shared by all animations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionSettings {
    /// Wall-clock time from departure to arrival.
    pub duration: Duration,
    /// Delay between two position samples.
    pub sample_interval: Duration,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            duration: DEFAULT_MOVE_DURATION,
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
        }
    }
}

/// Fraction of `duration` covered after `elapsed`, capped at one.
pub fn progress(elapsed: Duration, duration: Duration) -> f64 {
    if duration.is_zero() {
        return 1.0;
    }
    (elapsed.as_secs_f64() / duration.as_secs_f64()).min(1.0)
}

/// Ownership slot of one train's journey.
enum Animation {
    Running {
        journey: JourneyId,
        handle: AbortHandle,
    },
    /// Stopped by [`MovementScheduler::cancel`]; the journey is not restarted.
    Cancelled { journey: JourneyId },
}

impl Animation {
    fn journey(&self) -> JourneyId {
        match self {
            Animation::Running { journey, .. } | Animation::Cancelled { journey } => *journey,
        }
    }

    fn is_running(&self, journey: JourneyId) -> bool {
        matches!(self, Animation::Running { journey: running, .. } if *running == journey)
    }

    fn abort(&self) {
        if let Animation::Running { handle, .. } = self {
            handle.abort();
        }
    }
}

/// Owns at most one running animation per train.
#[derive(Clone)]
pub struct MovementScheduler {
    store: YardStore,
    resolver: PathResolver,
    settings: MotionSettings,
    animations: Arc<Mutex<HashMap<TrainId, Animation>>>,
}

impl MovementScheduler {
    /// Create a scheduler driving trains of `store` along routes of `resolver`.
    pub fn new(store: YardStore, resolver: PathResolver, settings: MotionSettings) -> Self {
        Self {
            store,
            resolver,
            settings,
            animations: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Timing in use.
    pub fn settings(&self) -> MotionSettings {
        self.settings
    }

    /// Number of animations currently running.
    pub fn active(&self) -> usize {
        self.animations
            .lock()
            .values()
            .filter(|animation| matches!(animation, Animation::Running { .. }))
            .count()
    }

    /// Whether `id` currently has a running animation.
    pub fn is_animating(&self, id: &TrainId) -> bool {
        self.animations
            .lock()
            .get(id)
            .is_some_and(|animation| matches!(animation, Animation::Running { .. }))
    }

    /// React to store changes until the task is aborted.
    pub async fn run(self) {
        let mut changes = self.store.subscribe();
        loop {
            self.reconcile();
            if changes.changed().await.is_err() {
                break;
            }
        }
        self.shutdown();
    }

    /// One scheduling pass. Must be called from within a Tokio runtime.
    ///
    /// Cancels animations whose train is no longer on the animated journey,
    /// then starts animations for moving trains without one. A journey
    /// stopped with [`cancel`](Self::cancel) stays parked until the train
    /// starts a new one. Trains whose
    /// route is unreachable or degenerate are finalised on the spot. Returns
    /// the number of animations started.
    pub fn reconcile(&self) -> usize {
        let mut animations = self.animations.lock();
        let trains = self.store.trains();

        animations.retain(|id, animation| {
            let current = trains
                .iter()
                .find(|train| &train.id == id)
                .and_then(|train| train.journey());
            let keep = current == Some(animation.journey());
            if !keep {
                debug!(train = %id, journey = animation.journey(), "Animation cancelled");
                animation.abort();
            }
            keep
        });

        let mut started = 0;
        for train in &trains {
            let Motion::Moving {
                target, journey, ..
            } = &train.motion
            else {
                continue;
            };
            if animations.contains_key(&train.id) {
                continue;
            }

            let path = self.resolver.resolve(&train.current, target);
            if path.len() < 2 {
                warn!(
                    train = %train.id,
                    from = %train.current,
                    to = %target,
                    "No route; completing move without animation"
                );
                self.store.complete_journey(&train.id, *journey);
                continue;
            }

            debug!(train = %train.id, to = %target, journey, waypoints = path.len(), "Animation started");
            let task = tokio::spawn(self.clone().animate(train.id.clone(), *journey, path));
            animations.insert(
                train.id.clone(),
                Animation::Running {
                    journey: *journey,
                    handle: task.abort_handle(),
                },
            );
            started += 1;
        }
        started
    }

    /// Stop the animation of `id`, leaving the last written position in place.
    ///
    /// The train keeps its moving state and is not animated again until a
    /// new move is started for it.
    pub fn cancel(&self, id: &TrainId) -> bool {
        let mut animations = self.animations.lock();
        let Some(slot) = animations.get_mut(id) else {
            return false;
        };
        let Animation::Running { journey, handle } = &mut *slot else {
            return false;
        };
        handle.abort();
        let journey = *journey;
        debug!(train = %id, journey, "Animation cancelled on request");
        *slot = Animation::Cancelled { journey };
        true
    }

    /// Stop every animation.
    pub fn shutdown(&self) {
        for (id, animation) in self.animations.lock().drain() {
            debug!(train = %id, "Animation stopped on shutdown");
            animation.abort();
        }
    }

    async fn animate(self, id: TrainId, journey: JourneyId, path: Vec<Point>) {
        let start = Instant::now();
        let mut ticker = time::interval(self.settings.sample_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let progress = progress(start.elapsed(), self.settings.duration);
            let Some(position) = interpolate_along_path(&path, progress) else {
                break;
            };
            if !self.store.update_journey_position(&id, journey, position) {
                // Superseded or reset from outside.
                self.release(&id, journey);
                return;
            }
            if progress >= 1.0 {
                break;
            }
        }

        // Finalise under the lock so reconcile cannot restart the journey.
        let mut animations = self.animations.lock();
        if animations
            .get(&id)
            .is_some_and(|animation| animation.is_running(journey))
        {
            animations.remove(&id);
            self.store.complete_journey(&id, journey);
        }
    }

    fn release(&self, id: &TrainId, journey: JourneyId) {
        let mut animations = self.animations.lock();
        if animations
            .get(id)
            .is_some_and(|animation| animation.is_running(journey))
        {
            animations.remove(id);
        }
    }
}
