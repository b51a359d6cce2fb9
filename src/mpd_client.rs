//! # MPD Client Module
//!
//! Plays selected items through Music Player Daemon (MPD) using the `mpc`
//! command-line client.
//!
//! ## Design Decision: mpc vs Direct Protocol
//!
//! This implementation uses the `mpc` command-line tool instead of speaking the MPD
//! protocol directly:
//! - Simplicity: No need to implement MPD protocol parsing
//! - Reliability: mpc is well-tested and handles edge cases
//! - Compatibility: Works with any MPD version that mpc supports
//! - Error Handling: mpc provides clear error messages
//!
//! ## Paths
//!
//! MPD only plays files from its own music directory and expects paths relative
//! to it. Run mediaspinner with `--base-dir` pointing at that directory so item
//! paths (`<collection>/<file>`) are valid MPD URIs, and make sure MPD's database
//! is up to date (`mpc update`).
//!
//! ## Playing One Item
//!
//! ```text
//! mpc clear → mpc add <collection>/<file> → mpc play → poll `mpc status` until stopped
//! ```

use anyhow::{Context, Result};
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::sleep;
use log::{info, debug};
use crate::collections::MediaItem;
use crate::player::{Player, PlayerState, POLL_INTERVAL};

/// Runs `mpc` with `args` and returns its standard output.
///
/// # Errors
///
/// Returns an error if mpc cannot be executed or exits unsuccessfully; the
/// error carries mpc's stderr.
fn run_mpc(args: &[&str]) -> Result<String> {
    let output = Command::new("mpc")
        .args(args)
        .output()
        .context("Failed to execute mpc command. Please install mpc (MPD client)")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("mpc {} failed: {}", args.join(" "), stderr.trim());
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Verifies MPD and mpc availability.
///
/// Tests connection to MPD by running `mpc version`. This ensures both
/// that mpc is installed and that MPD is running and accessible.
///
/// # Errors
///
/// Returns an error if:
/// - mpc command is not found
/// - MPD is not running
/// - Connection to MPD fails
pub fn get_client() -> Result<()> {
    run_mpc(&["version"])
        .context("Failed to connect to MPD. Make sure MPD is running on localhost:6600")?;
    Ok(())
}

/// MPD status information parsed from `mpc status` output
#[derive(Debug, Clone, PartialEq)]
pub struct MpdStatus {
    /// Current song file path (MPD relative), None if nothing playing
    pub current_song: Option<String>,
    /// Elapsed time in seconds
    pub elapsed: f64,
    /// Total song duration in seconds, None for streams or unknown
    pub duration: Option<f64>,
    pub state: PlayerState,
}

/// Get current MPD status by parsing `mpc status -f %file%` output
pub fn get_mpd_status() -> Result<MpdStatus> {
    debug!("Getting MPD status");
    let status_text = run_mpc(&["status", "-f", "%file%"]).context("Failed to get MPD status")?;
    Ok(parse_status(&status_text))
}

/// Parses `mpc status -f %file%` output.
///
/// # Example Output Parsing
///
/// ```text
/// artist/album/song.mp3
/// [playing] #5/20   1:23/3:45 (37%)
/// volume: 80%   repeat: on    random: off   single: off   consume: off
/// ```
///
/// Extracts: song="artist/album/song.mp3", elapsed=83.0, duration=225.0, state=Playing.
/// When MPD is stopped, mpc prints only the options line and the state is `Stopped`.
pub fn parse_status(status_text: &str) -> MpdStatus {
    let lines: Vec<&str> = status_text.lines().collect();

    let mut elapsed = 0.0;
    let mut duration = None;
    let mut state = PlayerState::Stopped;
    let mut current_song = None;

    // Parse status line (format: [playing] #1/50   0:32/3:45 (13%))
    for (i, line) in lines.iter().enumerate() {
        let line = line.trim();
        let player_state = if line.starts_with("[playing]") {
            PlayerState::Playing
        } else if line.starts_with("[paused]") {
            PlayerState::Paused
        } else {
            continue;
        };
        state = player_state;

        if i > 0 && !lines[i - 1].trim().is_empty() {
            current_song = Some(lines[i - 1].trim().to_string());
        }

        // Extract time information
        let time_part = line
            .split_whitespace()
            .find(|s| s.contains(':') && s.contains('/'));
        if let Some(time_part) = time_part {
            if let Some((elapsed_str, duration_str)) = time_part.split_once('/') {
                if let Ok(elapsed_secs) = parse_time(elapsed_str) {
                    elapsed = elapsed_secs;
                }
                duration = parse_time(duration_str).ok();
            }
        }
    }

    MpdStatus {
        current_song,
        elapsed,
        duration,
        state,
    }
}

/// Parse time string in MM:SS format to seconds
///
/// # Examples
///
/// ```rust,ignore
/// assert_eq!(parse_time("0:30").unwrap(), 30.0);
/// assert_eq!(parse_time("1:23").unwrap(), 83.0);
/// ```
fn parse_time(time_str: &str) -> Result<f64> {
    let parts: Vec<&str> = time_str.split(':').collect();
    match parts.len() {
        2 => {
            let minutes: f64 = parts[0].parse()?;
            let seconds: f64 = parts[1].parse()?;
            Ok(minutes * 60.0 + seconds)
        }
        _ => anyhow::bail!("Invalid time format: {}", time_str),
    }
}

/// Plays items on a running MPD, one at a time.
#[derive(Debug)]
pub struct MpdPlayer;

impl MpdPlayer {
    /// Checks that MPD is reachable before playback starts.
    pub fn connect() -> Result<Self> {
        get_client().context("Cannot start playback: MPD connection failed")?;
        info!("Connected to MPD");
        Ok(Self)
    }
}

impl Player for MpdPlayer {
    fn play(&mut self, item: &MediaItem, stop: &AtomicBool) -> Result<()> {
        run_mpc(&["clear"]).context("Failed to clear MPD queue")?;
        run_mpc(&["add", item.path.as_str()]).with_context(|| {
            format!(
                "MPD could not add '{}'. Is it inside MPD's music directory?",
                item.path
            )
        })?;
        run_mpc(&["play"]).context("Failed to start playback")?;

        sleep(POLL_INTERVAL);
        loop {
            if stop.load(Ordering::Relaxed) {
                debug!("Stopping MPD playback of {}", item.path);
                run_mpc(&["stop"]).context("Failed to stop MPD")?;
                break;
            }
            let status = get_mpd_status()?;
            if status.state == PlayerState::Stopped {
                break;
            }
            debug!(
                "MPD {:?} {} {:.0}s/{}",
                status.state,
                status.current_song.as_deref().unwrap_or("-"),
                status.elapsed,
                status.duration.map_or_else(|| "?".to_string(), |d| format!("{d:.0}s"))
            );
            sleep(POLL_INTERVAL);
        }

        Ok(())
    }
}
