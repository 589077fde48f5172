mod actions;
mod render;
mod session;

use std::collections::BTreeMap;
use std::io;
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyEventKind};
use log::info;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use crate::player::{
    CreateOutcome, EngineFactory, Player, PlayerOptions, StaticOptions, Surface, SurfaceSlot,
};
use crate::store::PlayHistoryStore;

use super::format::format_clock;
use super::watch::{WatchSession, WatchTarget};

pub(crate) use self::actions::{Controls, KeyOutcome, handle_key};
use self::actions::{status_error, status_info};
use self::render::{PlayView, draw_play};
use self::session::TuiSession;

const TICK: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub(crate) struct PlayRequest {
    pub(crate) target: WatchTarget,
    pub(crate) url: String,
    pub(crate) autoplay: bool,
    pub(crate) volume: f64,
    pub(crate) rate: f64,
    pub(crate) muted: bool,
    pub(crate) looping: bool,
    pub(crate) window_id: Option<i64>,
}

impl PlayRequest {
    pub(crate) fn options(&self, controls: &Controls) -> PlayerOptions {
        let mut options = PlayerOptions::default()
            .url(self.url.clone())
            .autoplay(self.autoplay)
            .settings(StaticOptions {
                title: Some(self.target.title.clone()),
                extra: BTreeMap::new(),
            });
        if !self.target.pic.is_empty() {
            options = options.poster(self.target.pic.clone());
        }
        controls.bind(options)
    }
}

/// Runs the interactive playback screen until the user quits or the engine
/// closes. Returns a one-line summary for the shell.
pub(crate) fn run_play(
    store: &mut PlayHistoryStore,
    factory: Box<dyn EngineFactory>,
    request: PlayRequest,
) -> Result<String> {
    let controls = Controls::new(request.volume, request.muted, request.rate, request.looping);
    let surface = SurfaceSlot::default();
    let mut player = Player::new(
        request.options(&controls),
        factory,
        Rc::new(surface.clone()),
    );
    let mut watch = WatchSession::begin(store, request.target.clone());

    // The engine may not open before the terminal is ours; mount now and
    // let the pending creation run once the surface is attached.
    player.mount(Instant::now());

    let mut session = TuiSession::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))
        .context("failed to initialize terminal backend")?;
    terminal.clear()?;
    surface.attach(Surface {
        label: request.target.title.clone(),
        window_id: request.window_id,
    });

    let mut status = status_info("Starting player...");
    loop {
        let now = Instant::now();
        match player.poll(now) {
            Some(CreateOutcome::Bound) => status = status_info("Playing."),
            Some(CreateOutcome::Failed) => {
                let reason = player.last_error().unwrap_or("unknown error").to_string();
                status = status_error(&format!("Player failed to start: {reason}"));
            }
            Some(CreateOutcome::Pending) | None => {}
        }
        watch.attach(&mut player);
        watch.drain(&mut player, store);
        if watch.engine_closed() {
            break;
        }
        if let Some(err) = watch.take_error() {
            status = status_error(&format!("Playback error: {err}"));
        }

        let position = if player.is_bound() {
            player.current_time()
        } else {
            watch.position()
        };
        let view = PlayView {
            target: watch.target(),
            controls: &controls,
            bound: player.is_bound(),
            pending: player.has_pending_create(),
            playing: player.is_playing(),
            engine_audio: player
                .is_bound()
                .then(|| (player.current_volume(), player.is_muted())),
            position,
            duration: player.duration(),
            finished: watch.is_finished(),
            generation: player.generation(),
            status: &status,
        };
        terminal.draw(|frame| draw_play(frame, &view))?;

        if !event::poll(TICK)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match handle_key(key.code, &controls, &mut player) {
            KeyOutcome::Quit => break,
            KeyOutcome::Status(msg) => status = msg,
            KeyOutcome::Ignored => continue,
        }
        player.sync(Instant::now());
    }

    let stopped_at = watch.position();
    let finished = watch.is_finished();
    watch.detach(&mut player);
    player.unmount();
    surface.detach();
    terminal.show_cursor()?;
    session.leave()?;

    let target = watch.target();
    info!("playback of {} episode {} ended", target.vod_id, target.episode);
    Ok(if finished {
        format!("Finished {} episode {}.", target.title, target.episode)
    } else {
        format!(
            "Stopped {} episode {} at {}.",
            target.title,
            target.episode,
            format_clock(stopped_at)
        )
    })
}
