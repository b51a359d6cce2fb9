//! # Mediaspinner
//!
//! Plays a weighted rotation of media files on a local player or in a browser,
//! keeping recently played files and collections from coming back too soon.
//!
//! ## Usage
//!
//! ```bash
//! # Play on VLC, collections are the subdirectories of /srv/media
//! mediaspinner -c rotation.json -b /srv/media play
//!
//! # Play through MPD (base dir must be MPD's music directory)
//! mediaspinner -c rotation.json -b ~/Music play --player mpd
//!
//! # Serve to a browser
//! mediaspinner -c rotation.json -b /srv/media serve --bind 0.0.0.0:8080
//!
//! # Dry run
//! mediaspinner -c rotation.json -b /srv/media pick -n 20 --verbose
//! ```

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use log::{debug, info};
use mediaspinner::collections::CollectionIndex;
use mediaspinner::config::{self, PolicyConfig};
use mediaspinner::mpd_client::MpdPlayer;
use mediaspinner::player::{self, Player, VlcOptions, VlcPlayer};
use mediaspinner::selector::{HistoryCapacity, MediaSelector, SharedSelector};
use mediaspinner::{cli, completion, server};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Loads the policy named on the command line, or the default one.
fn load_policy(args: &cli::Args) -> Result<PolicyConfig> {
    let path = match &args.config {
        Some(path) => path.clone(),
        None => config::default_config_path()?,
    };
    debug!("Loading policy from {}", path.display());
    PolicyConfig::load(&path)
}

/// Builds the selector from the policy file and the media directory.
///
/// All configuration problems surface here, before anything is played.
fn build_selector(args: &cli::Args) -> Result<MediaSelector> {
    let policy = load_policy(args)?;
    let index = CollectionIndex::from_dir(&args.base_dir)?;
    info!(
        "Found {} collections with {} files in {}",
        index.len(),
        index.total_items(),
        args.base_dir.display()
    );

    let capacity = args
        .history_size
        .map_or(HistoryCapacity::Dynamic, HistoryCapacity::Fixed);

    let selector = MediaSelector::new(index, policy, capacity).context("Invalid selection policy")?;
    debug!("History capacity: {}", selector.history_capacity());
    Ok(selector)
}

/// Main entry point for mediaspinner.
///
/// # Logging
///
/// Logs at `info` by default; override with `RUST_LOG`:
/// - `RUST_LOG=debug mediaspinner pick` - Show every rejected draw
/// - `RUST_LOG=mediaspinner::server=debug mediaspinner serve` - Module-specific logging
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = cli::Args::parse();

    match &args.command {
        cli::Command::Play { player, vlc_port, vlc_binary, count } => {
            let mut selector = build_selector(&args)?;

            // Ctrl-C only raises the flag; the loop then returns and dropping the
            // backend terminates VLC.
            let stop = Arc::new(AtomicBool::new(false));
            let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
            let interrupted = Arc::clone(&stop);
            runtime.spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Interrupted, stopping playback");
                    interrupted.store(true, Ordering::Relaxed);
                }
            });

            let mut backend: Box<dyn Player> = match player {
                cli::PlayerKind::Vlc => {
                    let options = VlcOptions {
                        binary: vlc_binary.clone(),
                        port: *vlc_port,
                        ..VlcOptions::default()
                    };
                    Box::new(VlcPlayer::spawn(&args.base_dir, &options)?)
                }
                cli::PlayerKind::Mpd => Box::new(MpdPlayer::connect()?),
            };

            let played = player::run_playback_loop(&mut selector, &mut backend, *count, &stop)?;
            info!("Played {played} items");
        }
        cli::Command::Serve { bind } => {
            let selector = SharedSelector::new(build_selector(&args)?);
            let app = server::router(selector, &args.base_dir)?;

            let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
            runtime.block_on(server::serve(*bind, app))?;
        }
        cli::Command::Pick { count, verbose } => {
            let mut selector = build_selector(&args)?;
            for _ in 0..*count {
                let selection = selector.select_next_detailed();
                if *verbose {
                    println!(
                        "{}\t{}\tattempts={}{}",
                        selection.item.collection,
                        selection.item.path,
                        selection.attempts,
                        if selection.fallback { "\tfallback" } else { "" }
                    );
                } else {
                    println!("{}", selection.item.path);
                }
            }
        }
        cli::Command::List => {
            let policy = load_policy(&args)?;
            let index = CollectionIndex::from_dir(&args.base_dir)?;

            println!("same_item_backoff: {}", policy.same_item_backoff());
            for (name, members) in index.iter() {
                match policy.collections.get(name) {
                    Some(rules) => println!(
                        "{name}\t{} files\tweight={}\tbackoff={}",
                        members.len(),
                        rules.weight(),
                        rules.backoff()
                    ),
                    None => println!("{name}\t{} files\t(not in policy)", members.len()),
                }
            }
            for name in policy.collections.keys().filter(|n| !index.contains(n)) {
                println!("{name}\tmissing from {}", args.base_dir.display());
            }
        }
        cli::Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            completion::generate_completions(
                completion::shell_to_completion_shell(*shell),
                &mut cmd,
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}
