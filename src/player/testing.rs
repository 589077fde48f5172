//! Scriptable in-process engine for exercising the player without mpv.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use anyhow::{Result, anyhow};
use serde_json::{Value, json};

use super::engine::{Engine, EngineFactory, ListenerId, NativeListener};
use super::options::PlaybackSnapshot;
use super::surface::Surface;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Play,
    Pause,
    Toggle,
    Seek(f64),
    Volume(f64),
    Muted(bool),
    Rate(f64),
    Poster(String),
    SwitchUrl(String),
    On(String),
    Off(ListenerId),
    Destroy,
}

#[derive(Debug, Clone)]
pub(crate) struct Instance {
    pub(crate) snapshot: PlaybackSnapshot,
    pub(crate) surface: Surface,
    pub(crate) calls: Vec<Call>,
    pub(crate) destroyed: bool,
}

impl Instance {
    /// Calls other than listener registration.
    pub(crate) fn control_calls(&self) -> Vec<Call> {
        self.calls
            .iter()
            .filter(|call| !matches!(call, Call::On(_) | Call::Off(_)))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Default)]
struct Shared {
    instances: Vec<Instance>,
    fail_next: Option<String>,
    pending: VecDeque<(String, Vec<Value>)>,
    position: f64,
    duration: f64,
}

/// Builds [`FakeEngine`]s and keeps a record of every one it built.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeFactory {
    shared: Rc<RefCell<Shared>>,
}

impl FakeFactory {
    pub(crate) fn boxed(&self) -> Box<dyn EngineFactory> {
        Box::new(self.clone())
    }

    pub(crate) fn instances(&self) -> Vec<Instance> {
        self.shared.borrow().instances.clone()
    }

    pub(crate) fn instance(&self, idx: usize) -> Instance {
        self.shared.borrow().instances[idx].clone()
    }

    pub(crate) fn live_count(&self) -> usize {
        self.shared
            .borrow()
            .instances
            .iter()
            .filter(|instance| !instance.destroyed)
            .count()
    }

    pub(crate) fn fail_next(&self, reason: &str) {
        self.shared.borrow_mut().fail_next = Some(reason.to_string());
    }

    /// Queues a native event for the live engine's next `pump`.
    pub(crate) fn emit(&self, event: &str, args: Vec<Value>) {
        self.shared
            .borrow_mut()
            .pending
            .push_back((event.to_string(), args));
    }

    /// Moves the playhead and queues the matching `timeupdate`.
    pub(crate) fn advance_to(&self, position: f64, duration: f64) {
        {
            let mut shared = self.shared.borrow_mut();
            shared.position = position;
            shared.duration = duration;
        }
        self.emit("timeupdate", vec![json!(position)]);
    }
}

impl EngineFactory for FakeFactory {
    fn construct(&self, snapshot: &PlaybackSnapshot, surface: &Surface) -> Result<Box<dyn Engine>> {
        let mut shared = self.shared.borrow_mut();
        if let Some(reason) = shared.fail_next.take() {
            return Err(anyhow!(reason));
        }
        shared.instances.push(Instance {
            snapshot: snapshot.clone(),
            surface: surface.clone(),
            calls: Vec::new(),
            destroyed: false,
        });
        let fields = &snapshot.fields;
        Ok(Box::new(FakeEngine {
            index: shared.instances.len() - 1,
            shared: Rc::clone(&self.shared),
            url: fields.url.clone(),
            playing: fields.autoplay.unwrap_or(false),
            volume: fields.volume.unwrap_or(1.0),
            muted: fields.muted.unwrap_or(false),
            listeners: Vec::new(),
            next_listener: 0,
        }))
    }
}

pub(crate) struct FakeEngine {
    index: usize,
    shared: Rc<RefCell<Shared>>,
    url: Option<String>,
    playing: bool,
    volume: f64,
    muted: bool,
    listeners: Vec<(ListenerId, String, NativeListener)>,
    next_listener: ListenerId,
}

impl FakeEngine {
    fn record(&self, call: Call) {
        let mut shared = self.shared.borrow_mut();
        let instance = &mut shared.instances[self.index];
        assert!(!instance.destroyed, "call on destroyed engine: {call:?}");
        instance.calls.push(call);
    }
}

impl Engine for FakeEngine {
    fn play(&mut self) {
        self.record(Call::Play);
        self.playing = true;
    }

    fn pause(&mut self) {
        self.record(Call::Pause);
        self.playing = false;
    }

    fn toggle(&mut self) {
        self.record(Call::Toggle);
        self.playing = !self.playing;
    }

    fn seek(&mut self, time: f64) {
        self.record(Call::Seek(time));
        self.shared.borrow_mut().position = time;
    }

    fn set_volume(&mut self, volume: f64) {
        self.record(Call::Volume(volume));
        self.volume = volume;
    }

    fn set_muted(&mut self, muted: bool) {
        self.record(Call::Muted(muted));
        self.muted = muted;
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.record(Call::Rate(rate));
    }

    fn set_poster(&mut self, poster: &str) {
        self.record(Call::Poster(poster.to_string()));
    }

    fn switch_url(&mut self, url: &str) {
        self.record(Call::SwitchUrl(url.to_string()));
        self.url = Some(url.to_string());
    }

    fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    fn playing(&self) -> bool {
        self.playing
    }

    fn duration(&self) -> f64 {
        self.shared.borrow().duration
    }

    fn current_time(&self) -> f64 {
        self.shared.borrow().position
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    fn muted(&self) -> bool {
        self.muted
    }

    fn on(&mut self, event: &str, listener: NativeListener) -> ListenerId {
        self.record(Call::On(event.to_string()));
        self.next_listener += 1;
        self.listeners
            .push((self.next_listener, event.to_string(), listener));
        self.next_listener
    }

    fn off(&mut self, id: ListenerId) {
        self.record(Call::Off(id));
        self.listeners.retain(|(listener_id, _, _)| *listener_id != id);
    }

    fn pump(&mut self) {
        let pending: Vec<_> = self.shared.borrow_mut().pending.drain(..).collect();
        for (event, args) in pending {
            for (_, name, listener) in self.listeners.iter_mut() {
                if *name == event {
                    listener(&args);
                }
            }
        }
    }

    fn destroy(mut self: Box<Self>) {
        for (_, name, listener) in self.listeners.iter_mut() {
            if name == "destroy" {
                listener(&[]);
            }
        }
        self.record(Call::Destroy);
        self.shared.borrow_mut().instances[self.index].destroyed = true;
    }
}
