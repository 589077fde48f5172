use std::sync::mpsc::{self, Receiver, Sender};

use log::{debug, info, warn};

use crate::player::{EventKind, Player, PlayerEvent, SubscriptionId};
use crate::store::{HistoryRecord, PROGRESS_CEILING_RATIO, PlayHistoryStore, ProgressUpdate};

/// Seconds of playback between two stored checkpoints.
pub(crate) const SAVE_INTERVAL_SECS: f64 = 5.0;

const WATCHED_EVENTS: [EventKind; 5] = [
    EventKind::LoadedMetadata,
    EventKind::TimeUpdate,
    EventKind::Ended,
    EventKind::Error,
    EventKind::Destroy,
];

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct WatchTarget {
    pub(crate) vod_id: String,
    pub(crate) source: String,
    pub(crate) episode: String,
    pub(crate) title: String,
    pub(crate) pic: String,
}

/// Ties one playing episode to the history store.
///
/// The session subscribes to the player's events, turns time updates into
/// resume checkpoints and clears the checkpoint once the episode counts as
/// watched. Each engine generation gets its own subscriptions; after a
/// recreation the session seeks the new engine back to where the old one was.
pub(crate) struct WatchSession {
    target: WatchTarget,
    skip_end: f64,
    seek_on_load: Option<f64>,
    position: f64,
    duration: f64,
    last_saved: Option<f64>,
    finished: bool,
    closed: bool,
    generation: u64,
    subscriptions: Vec<SubscriptionId>,
    events_tx: Sender<PlayerEvent>,
    events_rx: Receiver<PlayerEvent>,
    last_error: Option<String>,
}

impl WatchSession {
    /// Records the episode in history and picks up its resume point.
    pub(crate) fn begin(store: &mut PlayHistoryStore, target: WatchTarget) -> Self {
        let (sort_order, skip_start, skip_end) =
            match store.get_history(&target.vod_id, &target.source) {
                Some(existing) => (existing.sort_order, existing.skip_start, existing.skip_end),
                None => (store.default_sort_order(), 0.0, 0.0),
            };
        let checkpoint = store
            .get_progress(&target.vod_id, &target.source, &target.episode)
            .map(|progress| (progress.current_time, progress.duration));

        store.record_history(HistoryRecord {
            vod_id: target.vod_id.clone(),
            source: target.source.clone(),
            title: target.title.clone(),
            pic: target.pic.clone(),
            episode: target.episode.clone(),
            sort_order,
            skip_start,
            skip_end,
            current_time: checkpoint.map(|(time, _)| time),
            duration: checkpoint.map(|(_, duration)| duration),
        });

        let seek_on_load = match checkpoint {
            Some((time, _)) => {
                info!("resuming {} episode {} at {time:.1}s", target.vod_id, target.episode);
                Some(time)
            }
            None if skip_start > 0.0 => Some(skip_start),
            None => None,
        };

        let (events_tx, events_rx) = mpsc::channel();
        Self {
            target,
            skip_end,
            seek_on_load,
            position: 0.0,
            duration: 0.0,
            last_saved: None,
            finished: false,
            closed: false,
            generation: 0,
            subscriptions: Vec::new(),
            events_tx,
            events_rx,
            last_error: None,
        }
    }

    /// Subscribes to the player's current engine if it has not seen it yet.
    pub(crate) fn attach(&mut self, player: &mut Player) {
        if !player.is_bound() || player.generation() == self.generation {
            return;
        }
        let rebound = self.generation != 0;
        self.generation = player.generation();
        self.subscriptions.clear();

        for kind in WATCHED_EVENTS {
            let tx = self.events_tx.clone();
            let subscription = player.on(kind, move |event| {
                let _ = tx.send(event.clone());
            });
            if let Some(id) = subscription {
                self.subscriptions.push(id);
            }
        }

        if rebound && self.position > 0.0 && !self.finished {
            debug!("engine recreated; will resume at {:.1}s", self.position);
            self.seek_on_load = Some(self.position);
        }
    }

    /// Handles every event delivered since the last call.
    pub(crate) fn drain(&mut self, player: &mut Player, store: &mut PlayHistoryStore) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle(event, player, store);
        }
    }

    fn handle(&mut self, event: PlayerEvent, player: &mut Player, store: &mut PlayHistoryStore) {
        match event {
            PlayerEvent::LoadedMetadata => {
                if let Some(time) = self.seek_on_load.take() {
                    player.seek(time);
                }
            }
            PlayerEvent::TimeUpdate(time) => {
                self.position = time;
                let duration = player.duration();
                if duration > 0.0 {
                    self.duration = duration;
                }
                self.checkpoint(store);
            }
            PlayerEvent::Ended => self.finish(store),
            PlayerEvent::Error(message) => {
                warn!("playback error: {message}");
                self.last_error = Some(message);
            }
            PlayerEvent::Destroy => {
                info!("engine shut down on its own");
                self.closed = true;
            }
            other => debug!("unhandled watch event {:?}", other.kind()),
        }
    }

    fn checkpoint(&mut self, store: &mut PlayHistoryStore) {
        if self.finished || self.duration <= 0.0 {
            return;
        }
        let credits_at = self.duration - self.skip_end;
        if self.position >= self.duration * PROGRESS_CEILING_RATIO
            || (self.skip_end > 0.0 && self.position >= credits_at)
        {
            self.finish(store);
            return;
        }

        let due = self
            .last_saved
            .is_none_or(|saved| (self.position - saved).abs() >= SAVE_INTERVAL_SECS);
        if !due {
            return;
        }
        self.last_saved = Some(self.position);
        store.record_progress(ProgressUpdate {
            vod_id: self.target.vod_id.clone(),
            source: self.target.source.clone(),
            episode: self.target.episode.clone(),
            current_time: self.position,
            duration: self.duration,
        });
        store.update_history_position(
            &self.target.vod_id,
            &self.target.source,
            self.position,
            self.duration,
        );
    }

    fn finish(&mut self, store: &mut PlayHistoryStore) {
        if self.finished {
            return;
        }
        self.finished = true;
        info!(
            "{} episode {} watched; clearing resume point",
            self.target.vod_id, self.target.episode
        );
        store.clear_progress(&self.target.vod_id, &self.target.source, &self.target.episode);
    }

    /// Removes this session's subscriptions from the live engine.
    pub(crate) fn detach(&mut self, player: &mut Player) {
        for id in self.subscriptions.drain(..) {
            player.off(id);
        }
    }

    pub(crate) fn target(&self) -> &WatchTarget {
        &self.target
    }

    pub(crate) fn position(&self) -> f64 {
        self.position
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished
    }

    /// The engine went away without being asked to, e.g. its window was closed.
    pub(crate) fn engine_closed(&self) -> bool {
        self.closed
    }

    /// The latest engine error not yet shown to the user.
    pub(crate) fn take_error(&mut self) -> Option<String> {
        self.last_error.take()
    }
}
