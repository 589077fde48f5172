use std::rc::Rc;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use super::engine::{Engine, EngineFactory};
use super::options::PlaybackSnapshot;
use super::surface::SurfaceProvider;

pub(crate) const CREATE_RETRY_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CreateOutcome {
    Bound,
    Pending,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingCreate {
    due: Instant,
}

enum Slot {
    Unbound { retry: Option<PendingCreate> },
    Bound { engine: Box<dyn Engine> },
}

/// Owns the single live engine and its surface binding.
///
/// A scheduled creation is a token stored in the `Unbound` state; every
/// transition replaces the slot, which drops the token with it.
pub(crate) struct EngineLifecycle {
    factory: Box<dyn EngineFactory>,
    surfaces: Rc<dyn SurfaceProvider>,
    slot: Slot,
    generation: u64,
    last_error: Option<String>,
}

impl EngineLifecycle {
    pub(crate) fn new(factory: Box<dyn EngineFactory>, surfaces: Rc<dyn SurfaceProvider>) -> Self {
        Self {
            factory,
            surfaces,
            slot: Slot::Unbound { retry: None },
            generation: 0,
            last_error: None,
        }
    }

    pub(crate) fn create(&mut self, snapshot: &PlaybackSnapshot, now: Instant) -> CreateOutcome {
        if self.is_bound() {
            debug!("engine already bound; ignoring create");
            return CreateOutcome::Bound;
        }

        let Some(surface) = self.surfaces.attach_point() else {
            debug!(
                "render surface not attachable yet; retrying in {}ms",
                CREATE_RETRY_INTERVAL.as_millis()
            );
            self.schedule_create(now);
            return CreateOutcome::Pending;
        };

        self.slot = Slot::Unbound { retry: None };
        match self.factory.construct(snapshot, &surface) {
            Ok(mut engine) => {
                engine.on(
                    "ready",
                    Box::new(|_| {
                        info!("engine ready");
                    }),
                );
                engine.on(
                    "error",
                    Box::new(|args| {
                        error!("engine error: {}", describe_error(args));
                    }),
                );
                self.generation += 1;
                self.last_error = None;
                self.slot = Slot::Bound { engine };
                info!(
                    "engine created on surface {} (generation {})",
                    surface.label, self.generation
                );
                CreateOutcome::Bound
            }
            Err(err) => {
                error!("engine construction failed: {err:#}");
                self.last_error = Some(format!("{err:#}"));
                CreateOutcome::Failed
            }
        }
    }

    /// Arms a creation attempt one retry interval from `now`. Ignored while bound.
    pub(crate) fn schedule_create(&mut self, now: Instant) {
        match &mut self.slot {
            Slot::Unbound { retry } => {
                *retry = Some(PendingCreate {
                    due: now + CREATE_RETRY_INTERVAL,
                });
            }
            Slot::Bound { .. } => warn!("create scheduled while an engine is bound; ignored"),
        }
    }

    pub(crate) fn retry_due(&self, now: Instant) -> bool {
        matches!(
            self.slot,
            Slot::Unbound { retry: Some(PendingCreate { due }) } if due <= now
        )
    }

    pub(crate) fn has_pending_retry(&self) -> bool {
        matches!(self.slot, Slot::Unbound { retry: Some(_) })
    }

    /// Tears down a bound engine and cancels any scheduled creation.
    /// Returns whether an engine was destroyed.
    pub(crate) fn destroy(&mut self) -> bool {
        match std::mem::replace(&mut self.slot, Slot::Unbound { retry: None }) {
            Slot::Bound { engine } => {
                engine.destroy();
                info!("engine destroyed (generation {})", self.generation);
                true
            }
            Slot::Unbound { retry: Some(_) } => {
                debug!("cancelled pending engine creation");
                false
            }
            Slot::Unbound { retry: None } => false,
        }
    }

    pub(crate) fn is_bound(&self) -> bool {
        matches!(self.slot, Slot::Bound { .. })
    }

    pub(crate) fn engine(&self) -> Option<&dyn Engine> {
        match &self.slot {
            Slot::Bound { engine } => Some(engine.as_ref()),
            Slot::Unbound { .. } => None,
        }
    }

    pub(crate) fn engine_mut(&mut self) -> Option<&mut dyn Engine> {
        match &mut self.slot {
            Slot::Bound { engine } => Some(engine.as_mut()),
            Slot::Unbound { .. } => None,
        }
    }

    /// Number of engines created so far; changes on every successful bind.
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

impl Drop for EngineLifecycle {
    fn drop(&mut self) {
        self.destroy();
    }
}

pub(crate) fn describe_error(args: &[serde_json::Value]) -> String {
    match args.first() {
        Some(serde_json::Value::String(detail)) => detail.clone(),
        Some(other) => other.to_string(),
        None => "unknown error".to_string(),
    }
}
