mod format;
mod tui;
mod watch;


use std::rc::Rc;

use anyhow::{Result, bail};
use log::{debug, warn};

use crate::cli::{Cli, Command, PlayArgs, SearchCommand, SortArg};
use crate::db::Database;
use crate::paths::database_file_path;
use crate::store::{
    HISTORY_STORE, PersistencePort, PlayHistoryStore, SearchHistoryStore, SortOrder,
};

use self::format::{format_clock, format_timestamp, resume_text, truncate};
use self::tui::{PlayRequest, run_play};
use self::watch::WatchTarget;

const DEFAULT_HISTORY_LIMIT: usize = 10;

pub fn run(cli: Cli) -> Result<()> {
    let db = Rc::new(open_db()?);
    let port: Rc<dyn PersistencePort> = db.clone();

    match cli.command {
        Some(Command::Play(args)) => run_play_command(port, args)?,
        Some(Command::History {
            limit,
            progress: false,
        }) => run_history(&db, port, limit),
        Some(Command::History {
            limit,
            progress: true,
        }) => run_progress(port, limit),
        None => run_history(&db, port, DEFAULT_HISTORY_LIMIT),
        Some(Command::Resume {
            vod_id,
            source,
            episode,
        }) => run_resume(port, &vod_id, &source, &episode),
        Some(Command::Forget { vod_id, source }) => run_forget(port, &vod_id, &source),
        Some(Command::Clear) => {
            PlayHistoryStore::open(port).clear_all();
            println!("Cleared all history and resume points.");
        }
        Some(Command::Skip {
            vod_id,
            source,
            start,
            end,
        }) => run_skip(port, &vod_id, &source, start, end),
        Some(Command::Order {
            vod_id,
            source,
            order,
        }) => run_order(port, &vod_id, &source, order),
        Some(Command::Search(command)) => run_search(port, command),
        Some(Command::Prefs {
            auto_play_next,
            sort,
        }) => run_prefs(port, auto_play_next, sort),
    }

    Ok(())
}

fn run_play_command(port: Rc<dyn PersistencePort>, args: PlayArgs) -> Result<()> {
    let request = play_request(args)?;
    let mut store = PlayHistoryStore::open(port);
    let message = run_play(&mut store, engine_factory()?, request)?;
    println!("{message}");
    Ok(())
}

pub(crate) fn play_request(args: PlayArgs) -> Result<PlayRequest> {
    let volume = args.volume.unwrap_or(1.0);
    if !volume.is_finite() {
        bail!("volume must be a number between 0 and 1");
    }
    let rate = args.rate.unwrap_or(1.0);
    if !rate.is_finite() || rate <= 0.0 {
        bail!("rate must be a positive number");
    }
    if args.url.trim().is_empty() {
        bail!("stream URL must not be empty");
    }

    let title = args
        .title
        .filter(|title| !title.trim().is_empty())
        .unwrap_or_else(|| args.vod_id.clone());
    Ok(PlayRequest {
        target: WatchTarget {
            vod_id: args.vod_id,
            source: args.source,
            episode: args.episode,
            title,
            pic: args.pic,
        },
        url: args.url,
        autoplay: !args.no_autoplay,
        volume: volume.clamp(0.0, 1.0),
        rate,
        muted: args.muted,
        looping: args.looping,
        window_id: args.wid,
    })
}

#[cfg(unix)]
fn engine_factory() -> Result<Box<dyn crate::player::EngineFactory>> {
    use crate::paths::{resolve_mpv_bin, socket_dir};
    use crate::player::MpvFactory;

    Ok(Box::new(MpvFactory::new(resolve_mpv_bin(), socket_dir())))
}

#[cfg(not(unix))]
fn engine_factory() -> Result<Box<dyn crate::player::EngineFactory>> {
    bail!("playback needs mpv IPC over unix sockets, which this platform does not provide")
}

fn run_history(db: &Database, port: Rc<dyn PersistencePort>, limit: usize) {
    let store = PlayHistoryStore::open(port);
    let items = store.recent_history(limit);
    if items.is_empty() {
        println!("No history yet. Run `vodwatch play` first.");
        return;
    }

    println!(
        "Showing {} of {} shows.",
        items.len(),
        store.history().len()
    );
    println!(
        "{:<16} {:<12} {:<32} {:<8} {:<18} {:<17}",
        "VOD ID", "SOURCE", "TITLE", "EP", "RESUME", "WATCHED"
    );
    for item in items {
        println!(
            "{:<16} {:<12} {:<32} {:<8} {:<18} {:<17}",
            truncate(&item.vod_id, 16),
            truncate(&item.source, 12),
            truncate(&item.title, 32),
            truncate(&item.episode, 8),
            resume_text(item.current_time, item.duration),
            format_timestamp(item.timestamp)
        );
    }
    match db.updated_at(HISTORY_STORE) {
        Ok(Some(stamp)) => debug!("history last saved at {stamp}"),
        Ok(None) => {}
        Err(err) => warn!("failed to read history save time: {err:#}"),
    }
}

fn run_progress(port: Rc<dyn PersistencePort>, limit: usize) {
    let store = PlayHistoryStore::open(port);
    let entries = store.progress_entries();
    if entries.is_empty() {
        println!("No resume points stored.");
        return;
    }

    println!(
        "{:<16} {:<12} {:<8} {:<18} {:<17}",
        "VOD ID", "SOURCE", "EP", "RESUME", "SAVED"
    );
    for entry in entries.iter().take(limit) {
        println!(
            "{:<16} {:<12} {:<8} {:<18} {:<17}",
            truncate(&entry.vod_id, 16),
            truncate(&entry.source, 12),
            truncate(&entry.episode, 8),
            resume_text(Some(entry.current_time), Some(entry.duration)),
            format_timestamp(entry.timestamp)
        );
    }
}

fn run_resume(port: Rc<dyn PersistencePort>, vod_id: &str, source: &str, episode: &str) {
    let store = PlayHistoryStore::open(port);
    match store.get_progress(vod_id, source, episode) {
        Some(progress) => println!(
            "Resume {vod_id} episode {episode} at {} (saved {})",
            resume_text(Some(progress.current_time), Some(progress.duration)),
            format_timestamp(progress.timestamp)
        ),
        None => println!("No resume point for {vod_id} episode {episode}."),
    }
}

fn run_forget(port: Rc<dyn PersistencePort>, vod_id: &str, source: &str) {
    let mut store = PlayHistoryStore::open(port);
    if store.remove_history(vod_id, source) {
        println!("Forgot {vod_id} ({source}) and its resume points.");
    } else {
        println!("Nothing stored for {vod_id} ({source}).");
    }
}

fn run_skip(port: Rc<dyn PersistencePort>, vod_id: &str, source: &str, start: f64, end: f64) {
    let mut store = PlayHistoryStore::open(port);
    if store.get_history(vod_id, source).is_none() {
        println!("Nothing stored for {vod_id} ({source}).");
        return;
    }
    store.update_skip_settings(vod_id, source, start, end);
    match store.get_history(vod_id, source) {
        Some(entry) if entry.skip_start == start && entry.skip_end == end => println!(
            "Skipping {} of intro and {} of credits for {vod_id}.",
            format_clock(start),
            format_clock(end)
        ),
        _ => println!("Skip offsets must be non-negative seconds."),
    }
}

fn run_order(port: Rc<dyn PersistencePort>, vod_id: &str, source: &str, order: SortArg) {
    let mut store = PlayHistoryStore::open(port);
    if store.get_history(vod_id, source).is_none() {
        println!("Nothing stored for {vod_id} ({source}).");
        return;
    }
    let order = SortOrder::from(order);
    store.update_sort_order(vod_id, source, order);
    println!("Episode order for {vod_id}: {}", sort_label(order));
}

fn sort_label(order: SortOrder) -> &'static str {
    match order {
        SortOrder::Asc => "asc",
        SortOrder::Desc => "desc",
    }
}

fn run_search(port: Rc<dyn PersistencePort>, command: SearchCommand) {
    let mut store = SearchHistoryStore::open(port);
    match command {
        SearchCommand::Add { term } => {
            if store.add(&term) {
                println!("Saved search: {term}");
            } else {
                println!("Ignoring blank search term.");
            }
        }
        SearchCommand::List => {
            if store.terms().is_empty() {
                println!("No recent searches.");
            }
            for item in store.terms() {
                println!("{:<40} {}", truncate(&item.term, 40), format_timestamp(item.timestamp));
            }
        }
        SearchCommand::Remove { term } => {
            if store.remove(&term) {
                println!("Removed search: {term}");
            } else {
                println!("No saved search matches: {term}");
            }
        }
        SearchCommand::Clear => {
            store.clear();
            println!("Cleared recent searches.");
        }
    }
}

fn run_prefs(port: Rc<dyn PersistencePort>, auto_play_next: Option<bool>, sort: Option<SortArg>) {
    let mut store = PlayHistoryStore::open(port);
    if let Some(enabled) = auto_play_next {
        store.set_auto_play_next(enabled);
    }
    if let Some(sort) = sort {
        store.set_default_sort_order(SortOrder::from(sort));
    }
    println!("auto-play-next: {}", store.auto_play_next());
    println!("default sort:   {}", sort_label(store.default_sort_order()));
}

fn open_db() -> Result<Database> {
    let db_path = database_file_path()?;
    let db = Database::open(&db_path)?;
    db.migrate()?;
    Ok(db)
}
