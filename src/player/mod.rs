mod engine;
mod events;
mod lifecycle;
#[cfg(unix)]
mod mpv;
mod options;
mod propagate;
mod surface;

#[cfg(test)]
pub(crate) mod testing;
#[cfg(test)]
mod tests;

use std::rc::Rc;
use std::time::Instant;

use log::{debug, info, warn};

pub(crate) use engine::{Engine, EngineFactory};
pub(crate) use events::{EventKind, PlayerEvent, SubscriptionId};
pub(crate) use lifecycle::CreateOutcome;
#[cfg(unix)]
pub(crate) use mpv::MpvFactory;
pub(crate) use options::{Dynamic, PlaybackSnapshot, PlayerOptions, StaticOptions};
pub(crate) use surface::{Surface, SurfaceProvider, SurfaceSlot};

use self::events::EventBridge;
use self::lifecycle::EngineLifecycle;
use self::propagate::{apply, diff};

/// Drives one engine from a set of possibly dynamic options.
///
/// The owner calls [`Player::mount`] once, then [`Player::sync`] whenever the
/// options may have changed and [`Player::poll`] on every loop tick. Dropping
/// the player or calling [`Player::unmount`] leaves no engine, timer or
/// listener behind.
pub(crate) struct Player {
    options: PlayerOptions,
    lifecycle: EngineLifecycle,
    bridge: EventBridge,
    last: PlaybackSnapshot,
}

impl Player {
    pub(crate) fn new(
        options: PlayerOptions,
        factory: Box<dyn EngineFactory>,
        surfaces: Rc<dyn SurfaceProvider>,
    ) -> Self {
        let last = options.resolve();
        Self {
            options,
            lifecycle: EngineLifecycle::new(factory, surfaces),
            bridge: EventBridge::default(),
            last,
        }
    }

    pub(crate) fn mount(&mut self, now: Instant) -> CreateOutcome {
        self.last = self.options.resolve();
        self.lifecycle.create(&self.last, now)
    }

    pub(crate) fn unmount(&mut self) {
        self.bridge.clear(self.lifecycle.engine_mut());
        self.lifecycle.destroy();
        debug!("player unmounted");
    }

    /// Re-resolves the options and pushes whatever changed to the engine.
    pub(crate) fn sync(&mut self, now: Instant) {
        let next = self.options.resolve();
        let changes = diff(&self.last.fields, &next.fields);
        self.last = next;
        if changes.is_empty() {
            return;
        }

        let Some(engine) = self.lifecycle.engine_mut() else {
            debug!("no live engine; dropping option changes {changes:?}");
            return;
        };
        apply(&changes.live, engine);

        if changes.reinit {
            info!("autoplay/loop changed; recreating engine");
            self.bridge.clear(self.lifecycle.engine_mut());
            self.lifecycle.destroy();
            self.lifecycle.schedule_create(now);
        }
    }

    /// Delivers pending engine events and runs a creation attempt that has
    /// come due. Returns the outcome when an attempt ran.
    pub(crate) fn poll(&mut self, now: Instant) -> Option<CreateOutcome> {
        if let Some(engine) = self.lifecycle.engine_mut() {
            engine.pump();
        }

        if !self.lifecycle.retry_due(now) {
            return None;
        }
        self.last = self.options.resolve();
        Some(self.lifecycle.create(&self.last, now))
    }

    pub(crate) fn on<F>(&mut self, kind: EventKind, callback: F) -> Option<SubscriptionId>
    where
        F: FnMut(&PlayerEvent) + 'static,
    {
        self.bridge
            .subscribe(self.lifecycle.engine_mut(), kind, callback)
    }

    pub(crate) fn off(&mut self, id: SubscriptionId) -> bool {
        self.bridge.unsubscribe(self.lifecycle.engine_mut(), id)
    }

    pub(crate) fn play(&mut self) {
        self.with_engine("play", |engine| engine.play());
    }

    pub(crate) fn pause(&mut self) {
        self.with_engine("pause", |engine| engine.pause());
    }

    pub(crate) fn toggle(&mut self) {
        self.with_engine("toggle", |engine| engine.toggle());
    }

    pub(crate) fn seek(&mut self, time: f64) {
        if !time.is_finite() {
            warn!("ignoring seek to non-finite time {time}");
            return;
        }
        self.with_engine("seek", |engine| engine.seek(time.max(0.0)));
    }

    pub(crate) fn set_volume(&mut self, volume: f64) {
        if volume.is_nan() {
            warn!("ignoring NaN volume");
            return;
        }
        let volume = volume.clamp(0.0, 1.0);
        self.with_engine("set_volume", |engine| engine.set_volume(volume));
    }

    pub(crate) fn set_playback_rate(&mut self, rate: f64) {
        if !rate.is_finite() || rate <= 0.0 {
            warn!("ignoring invalid playback rate {rate}");
            return;
        }
        self.with_engine("set_playback_rate", |engine| engine.set_playback_rate(rate));
    }

    pub(crate) fn set_muted(&mut self, muted: bool) {
        self.with_engine("set_muted", |engine| engine.set_muted(muted));
    }

    pub(crate) fn is_playing(&self) -> bool {
        self.lifecycle.engine().is_some_and(|engine| engine.playing())
    }

    pub(crate) fn duration(&self) -> f64 {
        self.lifecycle.engine().map_or(0.0, |engine| engine.duration())
    }

    pub(crate) fn current_time(&self) -> f64 {
        self.lifecycle
            .engine()
            .map_or(0.0, |engine| engine.current_time())
    }

    pub(crate) fn current_volume(&self) -> f64 {
        self.lifecycle.engine().map_or(0.0, |engine| engine.volume())
    }

    pub(crate) fn is_muted(&self) -> bool {
        self.lifecycle.engine().is_some_and(|engine| engine.muted())
    }

    pub(crate) fn is_bound(&self) -> bool {
        self.lifecycle.is_bound()
    }

    pub(crate) fn has_pending_create(&self) -> bool {
        self.lifecycle.has_pending_retry()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.lifecycle.generation()
    }

    pub(crate) fn last_error(&self) -> Option<&str> {
        self.lifecycle.last_error()
    }

    fn with_engine(&mut self, action: &str, f: impl FnOnce(&mut dyn Engine)) {
        match self.lifecycle.engine_mut() {
            Some(engine) => f(engine),
            None => debug!("{action} ignored: no live engine"),
        }
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.unmount();
    }
}
