use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// A playback input that is either fixed, a shared cell the caller mutates,
/// or a producer evaluated on every resolve.
pub(crate) enum Dynamic<T> {
    Constant(T),
    Shared(Rc<RefCell<T>>),
    Producer(Rc<dyn Fn() -> T>),
}

impl<T: Clone> Dynamic<T> {
    pub(crate) fn producer(f: impl Fn() -> T + 'static) -> Self {
        Self::Producer(Rc::new(f))
    }

    pub(crate) fn resolve(&self) -> T {
        match self {
            Self::Constant(value) => value.clone(),
            Self::Shared(cell) => cell.borrow().clone(),
            Self::Producer(f) => f(),
        }
    }
}

impl<T> From<T> for Dynamic<T> {
    fn from(value: T) -> Self {
        Self::Constant(value)
    }
}

impl<T> Clone for Dynamic<T>
where
    T: Clone,
{
    fn clone(&self) -> Self {
        match self {
            Self::Constant(value) => Self::Constant(value.clone()),
            Self::Shared(cell) => Self::Shared(Rc::clone(cell)),
            Self::Producer(f) => Self::Producer(Rc::clone(f)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Dynamic<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            Self::Shared(cell) => f.debug_tuple("Shared").field(&cell.borrow()).finish(),
            Self::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

/// Configuration handed to the engine unchanged at construction time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct StaticOptions {
    pub(crate) title: Option<String>,
    pub(crate) extra: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct PlayerOptions {
    pub(crate) url: Option<Dynamic<String>>,
    pub(crate) volume: Option<Dynamic<f64>>,
    pub(crate) muted: Option<Dynamic<bool>>,
    pub(crate) playback_rate: Option<Dynamic<f64>>,
    pub(crate) poster: Option<Dynamic<String>>,
    pub(crate) autoplay: Option<Dynamic<bool>>,
    pub(crate) loop_playback: Option<Dynamic<bool>>,
    pub(crate) settings: StaticOptions,
}

impl PlayerOptions {
    pub(crate) fn url(mut self, value: impl Into<Dynamic<String>>) -> Self {
        self.url = Some(value.into());
        self
    }

    pub(crate) fn volume(mut self, value: impl Into<Dynamic<f64>>) -> Self {
        self.volume = Some(value.into());
        self
    }

    pub(crate) fn muted(mut self, value: impl Into<Dynamic<bool>>) -> Self {
        self.muted = Some(value.into());
        self
    }

    pub(crate) fn playback_rate(mut self, value: impl Into<Dynamic<f64>>) -> Self {
        self.playback_rate = Some(value.into());
        self
    }

    pub(crate) fn poster(mut self, value: impl Into<Dynamic<String>>) -> Self {
        self.poster = Some(value.into());
        self
    }

    pub(crate) fn autoplay(mut self, value: impl Into<Dynamic<bool>>) -> Self {
        self.autoplay = Some(value.into());
        self
    }

    pub(crate) fn loop_playback(mut self, value: impl Into<Dynamic<bool>>) -> Self {
        self.loop_playback = Some(value.into());
        self
    }

    pub(crate) fn settings(mut self, settings: StaticOptions) -> Self {
        self.settings = settings;
        self
    }

    /// Evaluates every dynamic field now. Unset fields stay `None`.
    pub(crate) fn resolve(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            fields: DynamicFields {
                url: resolve_field(&self.url),
                volume: resolve_field(&self.volume).map(|v| v.clamp(0.0, 1.0)),
                muted: resolve_field(&self.muted),
                playback_rate: resolve_field(&self.playback_rate)
                    .filter(|rate| rate.is_finite() && *rate > 0.0),
                poster: resolve_field(&self.poster),
                autoplay: resolve_field(&self.autoplay),
                loop_playback: resolve_field(&self.loop_playback),
            },
            settings: self.settings.clone(),
        }
    }
}

fn resolve_field<T: Clone>(field: &Option<Dynamic<T>>) -> Option<T> {
    field.as_ref().map(Dynamic::resolve)
}

/// The dynamic subset of a snapshot, compared field by field on every sync.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct DynamicFields {
    pub(crate) url: Option<String>,
    pub(crate) volume: Option<f64>,
    pub(crate) muted: Option<bool>,
    pub(crate) playback_rate: Option<f64>,
    pub(crate) poster: Option<String>,
    pub(crate) autoplay: Option<bool>,
    pub(crate) loop_playback: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct PlaybackSnapshot {
    pub(crate) fields: DynamicFields,
    pub(crate) settings: StaticOptions,
}
