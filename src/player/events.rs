use log::{debug, warn};
use serde_json::Value;

use super::engine::{Engine, ListenerId};
use super::lifecycle::describe_error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum EventKind {
    Ready,
    Play,
    Pause,
    Ended,
    Waiting,
    Playing,
    LoadedData,
    LoadedMetadata,
    TimeUpdate,
    Progress,
    Seeking,
    Seeked,
    Error,
    ControlShow,
    ControlHide,
    Fullscreen,
    FullscreenWeb,
    VolumeChange,
    RateChange,
    Resize,
    Destroy,
    Switch,
}

impl EventKind {
    #[cfg(test)]
    pub(crate) const ALL: [EventKind; 22] = [
        Self::Ready,
        Self::Play,
        Self::Pause,
        Self::Ended,
        Self::Waiting,
        Self::Playing,
        Self::LoadedData,
        Self::LoadedMetadata,
        Self::TimeUpdate,
        Self::Progress,
        Self::Seeking,
        Self::Seeked,
        Self::Error,
        Self::ControlShow,
        Self::ControlHide,
        Self::Fullscreen,
        Self::FullscreenWeb,
        Self::VolumeChange,
        Self::RateChange,
        Self::Resize,
        Self::Destroy,
        Self::Switch,
    ];

    /// Event name on the engine's native surface.
    pub(crate) fn native_name(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Ended => "ended",
            Self::Waiting => "waiting",
            Self::Playing => "playing",
            Self::LoadedData => "loadeddata",
            Self::LoadedMetadata => "loadedmetadata",
            Self::TimeUpdate => "timeupdate",
            Self::Progress => "progress",
            Self::Seeking => "seeking",
            Self::Seeked => "seeked",
            Self::Error => "error",
            Self::ControlShow => "controlshow",
            Self::ControlHide => "controlhide",
            Self::Fullscreen => "fullscreen",
            Self::FullscreenWeb => "fullscreenweb",
            Self::VolumeChange => "volumechange",
            Self::RateChange => "ratechange",
            Self::Resize => "resize",
            Self::Destroy => "destroy",
            Self::Switch => "switch",
        }
    }

    #[cfg(test)]
    pub(crate) fn from_native(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.native_name() == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PlayerEvent {
    Ready,
    Play,
    Pause,
    Ended,
    Waiting,
    Playing,
    LoadedData,
    LoadedMetadata,
    TimeUpdate(f64),
    Progress(f64),
    Seeking(f64),
    Seeked(f64),
    Error(String),
    ControlShow,
    ControlHide,
    Fullscreen(bool),
    FullscreenWeb(bool),
    VolumeChange { volume: f64, muted: bool },
    RateChange(f64),
    Resize,
    Destroy,
    Switch(String),
}

impl PlayerEvent {
    /// Types the raw arguments of a native event. `None` when the payload
    /// does not have the shape the event promises.
    pub(crate) fn decode(kind: EventKind, args: &[Value]) -> Option<Self> {
        let number = |idx: usize| args.get(idx).and_then(Value::as_f64);
        let flag = |idx: usize| args.get(idx).and_then(Value::as_bool);

        let event = match kind {
            EventKind::Ready => Self::Ready,
            EventKind::Play => Self::Play,
            EventKind::Pause => Self::Pause,
            EventKind::Ended => Self::Ended,
            EventKind::Waiting => Self::Waiting,
            EventKind::Playing => Self::Playing,
            EventKind::LoadedData => Self::LoadedData,
            EventKind::LoadedMetadata => Self::LoadedMetadata,
            EventKind::TimeUpdate => Self::TimeUpdate(number(0)?),
            EventKind::Progress => Self::Progress(number(0)?),
            EventKind::Seeking => Self::Seeking(number(0)?),
            EventKind::Seeked => Self::Seeked(number(0)?),
            EventKind::Error => Self::Error(describe_error(args)),
            EventKind::ControlShow => Self::ControlShow,
            EventKind::ControlHide => Self::ControlHide,
            EventKind::Fullscreen => Self::Fullscreen(flag(0)?),
            EventKind::FullscreenWeb => Self::FullscreenWeb(flag(0)?),
            EventKind::VolumeChange => Self::VolumeChange {
                volume: number(0)?,
                muted: flag(1)?,
            },
            EventKind::RateChange => Self::RateChange(number(0)?),
            EventKind::Resize => Self::Resize,
            EventKind::Destroy => Self::Destroy,
            EventKind::Switch => Self::Switch(args.first()?.as_str()?.to_string()),
        };
        Some(event)
    }

    pub(crate) fn kind(&self) -> EventKind {
        match self {
            Self::Ready => EventKind::Ready,
            Self::Play => EventKind::Play,
            Self::Pause => EventKind::Pause,
            Self::Ended => EventKind::Ended,
            Self::Waiting => EventKind::Waiting,
            Self::Playing => EventKind::Playing,
            Self::LoadedData => EventKind::LoadedData,
            Self::LoadedMetadata => EventKind::LoadedMetadata,
            Self::TimeUpdate(_) => EventKind::TimeUpdate,
            Self::Progress(_) => EventKind::Progress,
            Self::Seeking(_) => EventKind::Seeking,
            Self::Seeked(_) => EventKind::Seeked,
            Self::Error(_) => EventKind::Error,
            Self::ControlShow => EventKind::ControlShow,
            Self::ControlHide => EventKind::ControlHide,
            Self::Fullscreen(_) => EventKind::Fullscreen,
            Self::FullscreenWeb(_) => EventKind::FullscreenWeb,
            Self::VolumeChange { .. } => EventKind::VolumeChange,
            Self::RateChange(_) => EventKind::RateChange,
            Self::Resize => EventKind::Resize,
            Self::Destroy => EventKind::Destroy,
            Self::Switch(_) => EventKind::Switch,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SubscriptionId(u64);

#[derive(Debug)]
struct Subscription {
    id: SubscriptionId,
    kind: EventKind,
    listener: ListenerId,
}

/// Typed subscriptions on top of the engine's native `on`/`off`.
///
/// Subscriptions live on the engine they were issued against; the bridge
/// only remembers them so they can be removed. Nothing is buffered.
#[derive(Debug, Default)]
pub(crate) struct EventBridge {
    subscriptions: Vec<Subscription>,
    next_id: u64,
}

impl EventBridge {
    pub(crate) fn subscribe<F>(
        &mut self,
        engine: Option<&mut dyn Engine>,
        kind: EventKind,
        mut callback: F,
    ) -> Option<SubscriptionId>
    where
        F: FnMut(&PlayerEvent) + 'static,
    {
        let Some(engine) = engine else {
            debug!("no live engine; {} subscription not attached", kind.native_name());
            return None;
        };

        let listener = engine.on(
            kind.native_name(),
            Box::new(move |args| match PlayerEvent::decode(kind, args) {
                Some(event) => callback(&event),
                None => warn!(
                    "dropping {} event with unexpected payload: {:?}",
                    kind.native_name(),
                    args
                ),
            }),
        );
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.subscriptions.push(Subscription { id, kind, listener });
        Some(id)
    }

    pub(crate) fn unsubscribe(&mut self, engine: Option<&mut dyn Engine>, id: SubscriptionId) -> bool {
        let Some(idx) = self.subscriptions.iter().position(|sub| sub.id == id) else {
            return false;
        };
        let sub = self.subscriptions.remove(idx);
        if let Some(engine) = engine {
            engine.off(sub.listener);
        }
        debug!("removed {} subscription", sub.kind.native_name());
        true
    }

    /// Removes every subscription, detaching from `engine` when it is still live.
    pub(crate) fn clear(&mut self, mut engine: Option<&mut dyn Engine>) {
        for sub in self.subscriptions.drain(..) {
            if let Some(engine) = engine.as_deref_mut() {
                engine.off(sub.listener);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn native_names_round_trip_for_every_kind() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_native(kind.native_name()), Some(kind));
        }
        assert_eq!(EventKind::from_native("fullscreenchange"), None);
    }

    #[test]
    fn decode_reads_volume_and_mute_pair() {
        let event = PlayerEvent::decode(EventKind::VolumeChange, &[json!(0.5), json!(true)]);
        assert_eq!(
            event,
            Some(PlayerEvent::VolumeChange {
                volume: 0.5,
                muted: true
            })
        );
    }

    #[test]
    fn decode_rejects_missing_time_payload() {
        assert_eq!(PlayerEvent::decode(EventKind::TimeUpdate, &[]), None);
        assert_eq!(
            PlayerEvent::decode(EventKind::TimeUpdate, &[json!("soon")]),
            None
        );
    }

    #[test]
    fn decode_error_accepts_objects_and_strings() {
        assert_eq!(
            PlayerEvent::decode(EventKind::Error, &[json!("network")]),
            Some(PlayerEvent::Error("network".to_string()))
        );
        let event = PlayerEvent::decode(EventKind::Error, &[json!({"code": 4})]);
        assert_eq!(event, Some(PlayerEvent::Error("{\"code\":4}".to_string())));
    }
}
