use std::rc::Rc;

use log::debug;
use serde::{Deserialize, Serialize};

use super::{Clock, PersistencePort, persist, restore, system_clock};

pub(crate) const STORE_NAME: &str = "playHistory";
pub(crate) const HISTORY_LIMIT: usize = 50;
pub(crate) const PROGRESS_LIMIT: usize = 200;
/// Checkpoints at or before this many seconds are not worth resuming.
pub(crate) const PROGRESS_FLOOR_SECS: f64 = 30.0;
/// Checkpoints at or past this share of the duration count as finished.
pub(crate) const PROGRESS_CEILING_RATIO: f64 = 0.9;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PlayHistoryEntry {
    pub(crate) vod_id: String,
    pub(crate) source: String,
    pub(crate) title: String,
    pub(crate) pic: String,
    pub(crate) episode: String,
    pub(crate) timestamp: i64,
    pub(crate) sort_order: SortOrder,
    pub(crate) skip_start: f64,
    pub(crate) skip_end: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) current_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) duration: Option<f64>,
}

/// A history write; the store stamps the time.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct HistoryRecord {
    pub(crate) vod_id: String,
    pub(crate) source: String,
    pub(crate) title: String,
    pub(crate) pic: String,
    pub(crate) episode: String,
    pub(crate) sort_order: SortOrder,
    pub(crate) skip_start: f64,
    pub(crate) skip_end: f64,
    pub(crate) current_time: Option<f64>,
    pub(crate) duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EpisodeProgress {
    pub(crate) vod_id: String,
    pub(crate) source: String,
    pub(crate) episode: String,
    pub(crate) current_time: f64,
    pub(crate) duration: f64,
    pub(crate) timestamp: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ProgressUpdate {
    pub(crate) vod_id: String,
    pub(crate) source: String,
    pub(crate) episode: String,
    pub(crate) current_time: f64,
    pub(crate) duration: f64,
}

impl ProgressUpdate {
    /// Only checkpoints past the opening stretch and short of the end are kept.
    pub(crate) fn is_admissible(&self) -> bool {
        self.current_time > PROGRESS_FLOOR_SECS
            && self.current_time < self.duration * PROGRESS_CEILING_RATIO
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PlayHistoryState {
    play_history: Vec<PlayHistoryEntry>,
    episode_progress: Vec<EpisodeProgress>,
    auto_play_next: bool,
    default_sort_order: SortOrder,
}

impl Default for PlayHistoryState {
    fn default() -> Self {
        Self {
            play_history: Vec::new(),
            episode_progress: Vec::new(),
            auto_play_next: true,
            default_sort_order: SortOrder::Asc,
        }
    }
}

fn valid_key(parts: &[&str]) -> bool {
    parts.iter().all(|part| !part.trim().is_empty())
}

/// Watch history and per-episode resume checkpoints, most recent first.
///
/// Every mutation is written through the persistence port. Nothing here
/// returns an error: bad input is ignored and save failures are logged.
pub(crate) struct PlayHistoryStore {
    port: Rc<dyn PersistencePort>,
    clock: Clock,
    state: PlayHistoryState,
}

impl PlayHistoryStore {
    pub(crate) fn open(port: Rc<dyn PersistencePort>) -> Self {
        Self::with_clock(port, system_clock())
    }

    pub(crate) fn with_clock(port: Rc<dyn PersistencePort>, clock: Clock) -> Self {
        let state = restore(port.as_ref(), STORE_NAME);
        Self { port, clock, state }
    }

    fn save(&self) {
        persist(self.port.as_ref(), STORE_NAME, &self.state);
    }

    pub(crate) fn record_history(&mut self, record: HistoryRecord) {
        if !valid_key(&[record.vod_id.as_str(), record.source.as_str()]) {
            debug!("ignoring history entry with blank key");
            return;
        }
        let entry = PlayHistoryEntry {
            vod_id: record.vod_id,
            source: record.source,
            title: record.title,
            pic: record.pic,
            episode: record.episode,
            timestamp: (self.clock)(),
            sort_order: record.sort_order,
            skip_start: record.skip_start,
            skip_end: record.skip_end,
            current_time: record.current_time,
            duration: record.duration,
        };

        self.state
            .play_history
            .retain(|item| !(item.vod_id == entry.vod_id && item.source == entry.source));
        self.state.play_history.insert(0, entry);
        self.state.play_history.truncate(HISTORY_LIMIT);
        self.save();
    }

    pub(crate) fn get_history(&self, vod_id: &str, source: &str) -> Option<&PlayHistoryEntry> {
        self.state
            .play_history
            .iter()
            .find(|item| item.vod_id == vod_id && item.source == source)
    }

    pub(crate) fn history(&self) -> &[PlayHistoryEntry] {
        &self.state.play_history
    }

    fn history_mut(&mut self, vod_id: &str, source: &str) -> Option<&mut PlayHistoryEntry> {
        self.state
            .play_history
            .iter_mut()
            .find(|item| item.vod_id == vod_id && item.source == source)
    }

    pub(crate) fn update_sort_order(&mut self, vod_id: &str, source: &str, order: SortOrder) {
        let Some(item) = self.history_mut(vod_id, source) else {
            return;
        };
        item.sort_order = order;
        self.save();
    }

    pub(crate) fn update_skip_settings(
        &mut self,
        vod_id: &str,
        source: &str,
        skip_start: f64,
        skip_end: f64,
    ) {
        let valid = |secs: f64| secs.is_finite() && secs >= 0.0;
        if !valid(skip_start) || !valid(skip_end) {
            debug!("ignoring skip offsets {skip_start}/{skip_end}");
            return;
        }
        let Some(item) = self.history_mut(vod_id, source) else {
            return;
        };
        item.skip_start = skip_start;
        item.skip_end = skip_end;
        self.save();
    }

    /// Refreshes the resume fields of a history entry without reordering it.
    pub(crate) fn update_history_position(
        &mut self,
        vod_id: &str,
        source: &str,
        current_time: f64,
        duration: f64,
    ) {
        if !current_time.is_finite() || !duration.is_finite() {
            return;
        }
        let Some(item) = self.history_mut(vod_id, source) else {
            return;
        };
        item.current_time = Some(current_time);
        item.duration = Some(duration);
        self.save();
    }

    /// Stores a resume checkpoint if it passes the admission window.
    /// Returns whether it was stored.
    pub(crate) fn record_progress(&mut self, update: ProgressUpdate) -> bool {
        if !valid_key(&[
            update.vod_id.as_str(),
            update.source.as_str(),
            update.episode.as_str(),
        ]) {
            debug!("ignoring progress with blank key");
            return false;
        }
        if !update.is_admissible() {
            debug!(
                "progress {:.1}/{:.1} outside admission window",
                update.current_time, update.duration
            );
            return false;
        }

        let checkpoint = EpisodeProgress {
            vod_id: update.vod_id,
            source: update.source,
            episode: update.episode,
            current_time: update.current_time,
            duration: update.duration,
            timestamp: (self.clock)(),
        };
        self.state.episode_progress.retain(|item| {
            !(item.vod_id == checkpoint.vod_id
                && item.source == checkpoint.source
                && item.episode == checkpoint.episode)
        });
        self.state.episode_progress.insert(0, checkpoint);
        self.state.episode_progress.truncate(PROGRESS_LIMIT);
        self.save();
        true
    }

    pub(crate) fn get_progress(
        &self,
        vod_id: &str,
        source: &str,
        episode: &str,
    ) -> Option<&EpisodeProgress> {
        self.state.episode_progress.iter().find(|item| {
            item.vod_id == vod_id && item.source == source && item.episode == episode
        })
    }

    pub(crate) fn progress_entries(&self) -> &[EpisodeProgress] {
        &self.state.episode_progress
    }

    /// Drops the checkpoint of a finished episode.
    pub(crate) fn clear_progress(&mut self, vod_id: &str, source: &str, episode: &str) -> bool {
        let before = self.state.episode_progress.len();
        self.state.episode_progress.retain(|item| {
            !(item.vod_id == vod_id && item.source == source && item.episode == episode)
        });
        let removed = self.state.episode_progress.len() != before;
        if removed {
            self.save();
        }
        removed
    }

    /// Deletes a history entry together with every checkpoint of that show.
    pub(crate) fn remove_history(&mut self, vod_id: &str, source: &str) -> bool {
        let before = (
            self.state.play_history.len(),
            self.state.episode_progress.len(),
        );
        self.state
            .play_history
            .retain(|item| !(item.vod_id == vod_id && item.source == source));
        self.state
            .episode_progress
            .retain(|item| !(item.vod_id == vod_id && item.source == source));
        let after = (
            self.state.play_history.len(),
            self.state.episode_progress.len(),
        );
        if before == after {
            return false;
        }
        self.save();
        true
    }

    pub(crate) fn clear_all(&mut self) {
        self.state.play_history.clear();
        self.state.episode_progress.clear();
        self.save();
    }

    /// Up to `limit` of the most recently touched entries, newest timestamp first.
    pub(crate) fn recent_history(&self, limit: usize) -> Vec<PlayHistoryEntry> {
        let mut recent: Vec<_> = self
            .state
            .play_history
            .iter()
            .take(limit)
            .cloned()
            .collect();
        recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        recent
    }

    pub(crate) fn auto_play_next(&self) -> bool {
        self.state.auto_play_next
    }

    pub(crate) fn set_auto_play_next(&mut self, enabled: bool) {
        self.state.auto_play_next = enabled;
        self.save();
    }

    pub(crate) fn default_sort_order(&self) -> SortOrder {
        self.state.default_sort_order
    }

    pub(crate) fn set_default_sort_order(&mut self, order: SortOrder) {
        self.state.default_sort_order = order;
        self.save();
    }
}
