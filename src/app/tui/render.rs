use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Gauge, Paragraph};

use super::super::format::{build_progress_gauge, format_clock, truncate};
use super::super::watch::WatchTarget;
use super::actions::Controls;

pub(super) struct PlayView<'a> {
    pub(super) target: &'a WatchTarget,
    pub(super) controls: &'a Controls,
    pub(super) bound: bool,
    pub(super) pending: bool,
    pub(super) playing: bool,
    /// Volume and mute as the engine reports them, when one is live.
    pub(super) engine_audio: Option<(f64, bool)>,
    pub(super) position: f64,
    pub(super) duration: f64,
    pub(super) finished: bool,
    pub(super) generation: u64,
    pub(super) status: &'a str,
}

pub(super) fn draw_play(frame: &mut Frame, view: &PlayView<'_>) {
    let bg = Block::default().style(Style::default().bg(Color::Black));
    frame.render_widget(bg, frame.area());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(7),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            "VODWATCH",
            Style::default()
                .fg(Color::Rgb(110, 170, 255))
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled("   ", Style::default()),
        Span::styled(
            truncate(&view.target.title, 48),
            Style::default().fg(Color::Rgb(230, 230, 230)),
        ),
        Span::styled("   ", Style::default()),
        Span::styled(
            format!("episode {}", view.target.episode),
            Style::default().fg(Color::Rgb(185, 195, 210)),
        ),
        Span::styled("   ", Style::default()),
        Span::styled(engine_state_label(view), Style::default().fg(Color::Yellow)),
    ]))
    .alignment(Alignment::Center)
    .block(panel_block("Now Playing"));
    frame.render_widget(header, chunks[0]);

    let controls = view.controls;
    let (volume, muted) = view
        .engine_audio
        .unwrap_or((controls.volume(), controls.muted()));
    let details = format!(
        "Show\n{}  ({})\n\nVolume {:.0}%{}   Speed {:.2}x   Loop {}\n\nEngine generation {}{}",
        truncate(&view.target.vod_id, 28),
        truncate(&view.target.source, 20),
        volume * 100.0,
        if muted { " (muted)" } else { "" },
        controls.rate(),
        if controls.looping() { "on" } else { "off" },
        view.generation,
        if view.finished {
            "\n\nEpisode watched; resume point cleared."
        } else {
            ""
        },
    );
    let details = Paragraph::new(details)
        .style(Style::default().fg(Color::Rgb(230, 230, 230)))
        .block(panel_block("Details"))
        .alignment(Alignment::Left);
    frame.render_widget(details, chunks[1]);

    match build_progress_gauge(view.position, view.duration) {
        Some((ratio, label)) => {
            let progress = Gauge::default()
                .block(panel_block("Progress"))
                .gauge_style(
                    Style::default()
                        .fg(Color::Rgb(130, 190, 255))
                        .bg(Color::Black)
                        .add_modifier(Modifier::BOLD),
                )
                .label(label)
                .ratio(ratio);
            frame.render_widget(progress, chunks[2]);
        }
        None => {
            let idle = Paragraph::new(format_clock(view.position))
                .alignment(Alignment::Center)
                .block(panel_block("Progress"));
            frame.render_widget(idle, chunks[2]);
        }
    }

    let help = Paragraph::new(Line::from(vec![Span::styled(
        "space toggle  Enter play  p pause  ←/→ seek  ↑/↓ volume  m mute  [/] speed  l loop  q quit",
        Style::default().fg(Color::Rgb(185, 195, 210)),
    )]))
    .alignment(Alignment::Center)
    .block(panel_block("Controls"));
    frame.render_widget(help, chunks[3]);

    let status_widget = Paragraph::new(view.status.to_string())
        .style(status_style(view.status))
        .block(panel_block("Status"));
    frame.render_widget(status_widget, chunks[4]);
}

fn engine_state_label(view: &PlayView<'_>) -> &'static str {
    match (view.bound, view.pending, view.playing) {
        (true, _, true) => "PLAYING",
        (true, _, false) => "PAUSED",
        (false, true, _) => "STARTING",
        (false, false, _) => "STOPPED",
    }
}

fn panel_block(title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Rgb(125, 135, 150)))
        .title(title)
}

fn status_style(status: &str) -> Style {
    if status.starts_with("ERROR:") {
        Style::default()
            .fg(Color::Rgb(255, 145, 120))
            .add_modifier(Modifier::BOLD)
    } else if status.starts_with("INFO:") {
        Style::default().fg(Color::Rgb(205, 165, 255))
    } else {
        Style::default().fg(Color::Rgb(230, 235, 242))
    }
}
