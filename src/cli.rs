//! # Command-Line Interface Module
//!
//! This module defines the command-line interface for mediaspinner using Clap derive
//! macros.
//!
//! ## Commands
//!
//! - `play`: Play the rotation on a local player (VLC or MPD)
//! - `serve`: Serve the rotation to a web browser
//! - `pick`: Print a few selections without playing anything
//! - `list`: Show collections and their policy
//! - `completion`: Generate shell completions
//!
//! ## Examples
//!
//! ```bash
//! mediaspinner --config rotation.json --base-dir /srv/media play
//! mediaspinner -c rotation.json -b /srv/media serve --bind 0.0.0.0:8080
//! mediaspinner -c rotation.json pick -n 20 --verbose
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::player::DEFAULT_VLC_PORT;
use crate::server::DEFAULT_BIND;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

/// Local player backends
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum PlayerKind {
    /// Start a VLC process and drive it over its HTTP interface
    Vlc,
    /// Drive a running MPD through mpc
    Mpd,
}

/// Main application arguments structure.
///
/// Options shared by all commands (policy file, media directory, history size)
/// are global so they may appear before or after the subcommand.
#[derive(Parser, Debug)]
#[command(name = "mediaspinner")]
#[command(about = "Mediaspinner: weighted, repeat-avoiding media rotation")]
#[command(version)]
pub struct Args {
    /// Selection policy file (JSON)
    ///
    /// Defaults to config.json in the platform configuration directory,
    /// e.g. ~/.config/mediaspinner/config.json on Linux.
    #[arg(short, long, global = true, env = "MEDIASPINNER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Media base directory; each subdirectory is a collection
    #[arg(short, long, global = true, default_value = ".", env = "MEDIASPINNER_BASE_DIR")]
    pub base_dir: PathBuf,

    /// Keep a fixed number of past picks instead of sizing the history
    /// to the largest configured backoff
    #[arg(long, global = true)]
    pub history_size: Option<usize>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Enumeration of all available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play the rotation on a local media player
    ///
    /// Selects an item, plays it to completion, and repeats until interrupted.
    Play {
        /// Player backend
        #[arg(long, value_enum, default_value_t = PlayerKind::Vlc)]
        player: PlayerKind,

        /// Port for VLC's HTTP interface (localhost only)
        #[arg(long, default_value_t = DEFAULT_VLC_PORT)]
        vlc_port: u16,

        /// VLC executable
        #[arg(long, default_value = "vlc")]
        vlc_binary: String,

        /// Stop after this many items
        #[arg(long)]
        count: Option<usize>,
    },

    /// Serve the rotation to a web browser
    ///
    /// Open the printed address in a browser and press Start.
    Serve {
        /// Address to listen on
        #[arg(long, default_value = DEFAULT_BIND)]
        bind: SocketAddr,
    },

    /// Print selections without playing them
    Pick {
        /// Number of items to select
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,

        /// Show collection, attempts and fallback for each pick
        #[arg(short, long)]
        verbose: bool,
    },

    /// List collections with file counts and their policy
    List,

    /// Generate shell completions
    ///
    /// Usage: mediaspinner completion bash > /etc/bash_completion.d/mediaspinner
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },
}
