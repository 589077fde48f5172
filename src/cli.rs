use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::store::SortOrder;

#[derive(Debug, Parser)]
#[command(
    name = "vodwatch",
    version,
    about = "Play episodes through mpv and keep watch history with resume points"
)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Play a stream and track progress
    Play(PlayArgs),
    /// Show recently watched shows
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// List stored resume points instead of shows
        #[arg(long)]
        progress: bool,
    },
    /// Show the stored resume point of an episode
    Resume {
        vod_id: String,
        source: String,
        episode: String,
    },
    /// Delete a show from history together with its resume points
    Forget { vod_id: String, source: String },
    /// Delete all history and resume points
    Clear,
    /// Set intro/credits skip offsets (seconds) for a show
    Skip {
        vod_id: String,
        source: String,
        #[arg(long, default_value_t = 0.0)]
        start: f64,
        #[arg(long, default_value_t = 0.0)]
        end: f64,
    },
    /// Set the episode list order for a show
    Order {
        vod_id: String,
        source: String,
        #[arg(value_enum)]
        order: SortArg,
    },
    /// Manage recent search terms
    #[command(subcommand)]
    Search(SearchCommand),
    /// Show or change preferences
    Prefs {
        #[arg(long)]
        auto_play_next: Option<bool>,
        #[arg(long, value_enum)]
        sort: Option<SortArg>,
    },
}

#[derive(Debug, Args)]
pub struct PlayArgs {
    pub url: String,
    #[arg(long)]
    pub vod_id: String,
    #[arg(long)]
    pub source: String,
    #[arg(long)]
    pub episode: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long, default_value = "")]
    pub pic: String,
    /// Initial volume in [0, 1]
    #[arg(long)]
    pub volume: Option<f64>,
    #[arg(long)]
    pub rate: Option<f64>,
    #[arg(long)]
    pub muted: bool,
    #[arg(long = "loop")]
    pub looping: bool,
    #[arg(long)]
    pub no_autoplay: bool,
    /// Embed into an existing X11 window
    #[arg(long)]
    pub wid: Option<i64>,
}

#[derive(Debug, Subcommand)]
pub enum SearchCommand {
    Add { term: String },
    List,
    Remove { term: String },
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortArg {
    Asc,
    Desc,
}

impl From<SortArg> for SortOrder {
    fn from(value: SortArg) -> Self {
        match value {
            SortArg::Asc => SortOrder::Asc,
            SortArg::Desc => SortOrder::Desc,
        }
    }
}
