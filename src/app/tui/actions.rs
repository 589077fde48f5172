use std::cell::RefCell;
use std::rc::Rc;

use crossterm::event::KeyCode;

use crate::player::{Dynamic, Player, PlayerOptions};

pub(crate) const SEEK_STEP_SECS: f64 = 10.0;
pub(crate) const VOLUME_STEP: f64 = 0.05;
pub(crate) const RATE_STEP: f64 = 0.25;
const RATE_RANGE: (f64, f64) = (0.25, 4.0);

/// Option cells the playback screen edits. The player reads them on every
/// `sync`, so changing a cell is how a key press reaches the engine.
#[derive(Debug, Clone)]
pub(crate) struct Controls {
    volume: Rc<RefCell<f64>>,
    muted: Rc<RefCell<bool>>,
    rate: Rc<RefCell<f64>>,
    looping: Rc<RefCell<bool>>,
}

impl Controls {
    pub(crate) fn new(volume: f64, muted: bool, rate: f64, looping: bool) -> Self {
        Self {
            volume: Rc::new(RefCell::new(volume)),
            muted: Rc::new(RefCell::new(muted)),
            rate: Rc::new(RefCell::new(rate)),
            looping: Rc::new(RefCell::new(looping)),
        }
    }

    /// The rate cell may hold whatever was asked for on the command line;
    /// the engine only ever sees a rate inside `RATE_RANGE`.
    pub(crate) fn bind(&self, options: PlayerOptions) -> PlayerOptions {
        let rate = Rc::clone(&self.rate);
        options
            .volume(Dynamic::Shared(Rc::clone(&self.volume)))
            .muted(Dynamic::Shared(Rc::clone(&self.muted)))
            .playback_rate(Dynamic::producer(move || clamp_rate(*rate.borrow())))
            .loop_playback(Dynamic::Shared(Rc::clone(&self.looping)))
    }

    pub(crate) fn volume(&self) -> f64 {
        *self.volume.borrow()
    }

    pub(crate) fn muted(&self) -> bool {
        *self.muted.borrow()
    }

    pub(crate) fn rate(&self) -> f64 {
        clamp_rate(*self.rate.borrow())
    }

    pub(crate) fn looping(&self) -> bool {
        *self.looping.borrow()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum KeyOutcome {
    Quit,
    Status(String),
    Ignored,
}

/// Applies one key press. Transport keys act on the player directly; option
/// keys only edit the cells and take effect on the caller's next `sync`.
pub(crate) fn handle_key(code: KeyCode, controls: &Controls, player: &mut Player) -> KeyOutcome {
    match code {
        KeyCode::Char('q') | KeyCode::Esc => KeyOutcome::Quit,
        KeyCode::Char(' ') => {
            player.toggle();
            let state = if player.is_playing() { "Playing." } else { "Paused." };
            KeyOutcome::Status(status_info(state))
        }
        KeyCode::Char('p') => {
            player.pause();
            KeyOutcome::Status(status_info("Paused."))
        }
        KeyCode::Enter => {
            player.play();
            KeyOutcome::Status(status_info("Playing."))
        }
        KeyCode::Left | KeyCode::Right => {
            let step = if code == KeyCode::Left {
                -SEEK_STEP_SECS
            } else {
                SEEK_STEP_SECS
            };
            let target = (player.current_time() + step).max(0.0);
            player.seek(target);
            KeyOutcome::Status(status_info(&format!("Seek to {target:.0}s")))
        }
        KeyCode::Up | KeyCode::Down => {
            let step = if code == KeyCode::Up {
                VOLUME_STEP
            } else {
                -VOLUME_STEP
            };
            let volume = {
                let mut cell = controls.volume.borrow_mut();
                *cell = round_step(*cell + step).clamp(0.0, 1.0);
                *cell
            };
            KeyOutcome::Status(status_info(&format!("Volume {:.0}%", volume * 100.0)))
        }
        KeyCode::Char('m') => {
            let muted = {
                let mut cell = controls.muted.borrow_mut();
                *cell = !*cell;
                *cell
            };
            KeyOutcome::Status(status_info(if muted { "Muted." } else { "Unmuted." }))
        }
        KeyCode::Char('[') | KeyCode::Char(']') => {
            let step = if code == KeyCode::Char('[') {
                -RATE_STEP
            } else {
                RATE_STEP
            };
            let rate = {
                let mut cell = controls.rate.borrow_mut();
                *cell = clamp_rate(round_step(clamp_rate(*cell) + step));
                *cell
            };
            KeyOutcome::Status(status_info(&format!("Speed {rate:.2}x")))
        }
        KeyCode::Char('l') => {
            let looping = {
                let mut cell = controls.looping.borrow_mut();
                *cell = !*cell;
                *cell
            };
            let msg = if looping {
                "Loop on. Restarting player..."
            } else {
                "Loop off. Restarting player..."
            };
            KeyOutcome::Status(status_info(msg))
        }
        _ => KeyOutcome::Ignored,
    }
}

fn clamp_rate(rate: f64) -> f64 {
    rate.clamp(RATE_RANGE.0, RATE_RANGE.1)
}

fn round_step(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub(super) fn status_info(msg: &str) -> String {
    format!("INFO: {msg}")
}

pub(super) fn status_error(msg: &str) -> String {
    format!("ERROR: {msg}")
}
