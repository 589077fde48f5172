use log::debug;

use super::engine::Engine;
use super::options::DynamicFields;

/// A change that a running engine can take without being recreated.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LiveChange {
    Url(String),
    Volume(f64),
    Muted(bool),
    PlaybackRate(f64),
    Poster(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ChangeSet {
    pub(crate) live: Vec<LiveChange>,
    pub(crate) reinit: bool,
}

impl ChangeSet {
    pub(crate) fn is_empty(&self) -> bool {
        self.live.is_empty() && !self.reinit
    }
}

/// Classifies what moved between two resolutions of the dynamic fields.
///
/// Live fields only count when the new value is set; clearing one leaves the
/// engine as it is. `autoplay` and `loop` count in both directions.
pub(crate) fn diff(previous: &DynamicFields, next: &DynamicFields) -> ChangeSet {
    let mut live = Vec::new();

    if let Some(url) = &next.url
        && next.url != previous.url
    {
        live.push(LiveChange::Url(url.clone()));
    }
    if let Some(volume) = next.volume
        && next.volume != previous.volume
    {
        live.push(LiveChange::Volume(volume));
    }
    if let Some(muted) = next.muted
        && next.muted != previous.muted
    {
        live.push(LiveChange::Muted(muted));
    }
    if let Some(rate) = next.playback_rate
        && next.playback_rate != previous.playback_rate
    {
        live.push(LiveChange::PlaybackRate(rate));
    }
    if let Some(poster) = &next.poster
        && next.poster != previous.poster
    {
        live.push(LiveChange::Poster(poster.clone()));
    }

    ChangeSet {
        live,
        reinit: next.autoplay != previous.autoplay || next.loop_playback != previous.loop_playback,
    }
}

pub(crate) fn apply(changes: &[LiveChange], engine: &mut dyn Engine) {
    for change in changes {
        match change {
            LiveChange::Url(url) => {
                if engine.url() == Some(url.as_str()) {
                    continue;
                }
                engine.switch_url(url);
                debug!("switched source to {url}");
            }
            LiveChange::Volume(volume) => engine.set_volume(*volume),
            LiveChange::Muted(muted) => engine.set_muted(*muted),
            LiveChange::PlaybackRate(rate) => engine.set_playback_rate(*rate),
            LiveChange::Poster(poster) => engine.set_poster(poster),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> DynamicFields {
        DynamicFields {
            url: Some("https://cdn/ep1.m3u8".to_string()),
            volume: Some(0.5),
            muted: Some(false),
            playback_rate: Some(1.0),
            poster: None,
            autoplay: Some(true),
            loop_playback: Some(false),
        }
    }

    #[test]
    fn diff_of_identical_fields_is_empty() {
        assert!(diff(&fields(), &fields()).is_empty());
    }

    #[test]
    fn diff_reports_only_changed_live_fields_in_order() {
        let mut next = fields();
        next.volume = Some(0.8);
        next.url = Some("https://cdn/ep2.m3u8".to_string());
        let changes = diff(&fields(), &next);
        assert_eq!(
            changes.live,
            vec![
                LiveChange::Url("https://cdn/ep2.m3u8".to_string()),
                LiveChange::Volume(0.8),
            ]
        );
        assert!(!changes.reinit);
    }

    #[test]
    fn diff_ignores_live_field_that_became_unset() {
        let mut next = fields();
        next.volume = None;
        assert!(diff(&fields(), &next).is_empty());
    }

    #[test]
    fn diff_flags_reinit_for_loop_and_autoplay() {
        let mut next = fields();
        next.loop_playback = Some(true);
        assert!(diff(&fields(), &next).reinit);

        let mut next = fields();
        next.autoplay = None;
        assert!(diff(&fields(), &next).reinit);
    }
}
