use anyhow::Result;
use serde_json::Value;

use super::options::PlaybackSnapshot;
use super::surface::Surface;

pub(crate) type ListenerId = u64;

/// Receives the raw arguments of one native engine event.
pub(crate) type NativeListener = Box<dyn FnMut(&[Value])>;

/// Capability surface of an imperative playback engine.
///
/// Everything above this trait (lifecycle, option propagation, event bridge)
/// only talks to engines through it. Teardown consumes the box, so a destroyed
/// engine cannot be reached again.
pub(crate) trait Engine {
    fn play(&mut self);
    fn pause(&mut self);
    fn toggle(&mut self);
    fn seek(&mut self, time: f64);
    fn set_volume(&mut self, volume: f64);
    fn set_muted(&mut self, muted: bool);
    fn set_playback_rate(&mut self, rate: f64);
    fn set_poster(&mut self, poster: &str);
    fn switch_url(&mut self, url: &str);

    fn url(&self) -> Option<&str>;
    fn playing(&self) -> bool;
    fn duration(&self) -> f64;
    fn current_time(&self) -> f64;
    fn volume(&self) -> f64;
    fn muted(&self) -> bool;

    fn on(&mut self, event: &str, listener: NativeListener) -> ListenerId;
    fn off(&mut self, id: ListenerId);

    /// Delivers queued native events to listeners on the calling thread.
    fn pump(&mut self) {}

    fn destroy(self: Box<Self>);
}

pub(crate) trait EngineFactory {
    fn construct(&self, snapshot: &PlaybackSnapshot, surface: &Surface)
    -> Result<Box<dyn Engine>>;
}
