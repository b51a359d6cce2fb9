//! # Local Player Module
//!
//! Plays selected items one after another on a media player running on this
//! machine. The selector is only reached through [`run_playback_loop`]; the
//! players themselves know nothing about collections or backoff rules.
//!
//! ## Backends
//!
//! - [`VlcPlayer`]: starts its own VLC process with the HTTP interface enabled on
//!   localhost and drives it through `/requests/status.json`.
//! - [`MpdPlayer`](crate::mpd_client::MpdPlayer): drives an already running MPD
//!   through the `mpc` command-line client.
//!
//! ## Playback Flow
//!
//! ```text
//! select_next() → player.play(item) → poll until stopped → select_next() → ...
//! ```
//!
//! The loop and the players watch a shared stop flag. Setting it (the binary does
//! so on Ctrl-C) stops the current item and ends the loop, so the player is
//! dropped and a VLC process owned by it is terminated.

use crate::collections::MediaItem;
use crate::selector::MediaSelector;
use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::{debug, info, warn};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::sleep;
use std::time::Duration;
use ureq::Agent;

/// Interval between status polls while an item is playing.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default port for VLC's HTTP interface.
pub const DEFAULT_VLC_PORT: u16 = 9090;

/// Playback state reported by a player backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerState {
    Playing,
    Paused,
    Stopped,
    Unknown(String),
}

impl PlayerState {
    pub fn from_name(name: &str) -> Self {
        match name {
            "playing" | "play" => Self::Playing,
            "paused" | "pause" => Self::Paused,
            "stopped" | "stop" => Self::Stopped,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// A media player that can play one item to completion.
pub trait Player {
    /// Plays `item` and returns once playback has stopped.
    ///
    /// Stops playback and returns early once `stop` is set.
    fn play(&mut self, item: &MediaItem, stop: &AtomicBool) -> Result<()>;
}

impl<P: Player + ?Sized> Player for Box<P> {
    fn play(&mut self, item: &MediaItem, stop: &AtomicBool) -> Result<()> {
        (**self).play(item, stop)
    }
}

/// Repeatedly selects an item and plays it.
///
/// Runs until `limit` items have been played, or forever when `limit` is `None`,
/// and ends early once `stop` is set. Returns the number of items started.
///
/// # Errors
///
/// Stops at the first playback error; the selector itself never fails.
pub fn run_playback_loop<R, P>(
    selector: &mut MediaSelector<R>,
    player: &mut P,
    limit: Option<usize>,
    stop: &AtomicBool,
) -> Result<usize>
where
    R: Rng,
    P: Player + ?Sized,
{
    let mut played = 0;

    while limit.map_or(true, |max| played < max) {
        if stop.load(Ordering::Relaxed) {
            info!("Stop requested after {played} items");
            break;
        }

        let selection = selector.select_next_detailed();
        info!(
            "Playing {} (collection '{}', {} attempt(s){})",
            selection.item.path,
            selection.item.collection,
            selection.attempts,
            if selection.fallback { ", fallback" } else { "" }
        );

        player
            .play(&selection.item, stop)
            .with_context(|| format!("Failed to play {}", selection.item.path))?;
        played += 1;
    }

    Ok(played)
}

/// Settings for the VLC backend.
#[derive(Debug, Clone)]
pub struct VlcOptions {
    /// Executable to start
    pub binary: String,
    /// Port for the HTTP interface, bound to localhost
    pub port: u16,
    /// How long to wait for the HTTP interface to come up
    pub startup_timeout: Duration,
}

impl Default for VlcOptions {
    fn default() -> Self {
        Self {
            binary: "vlc".to_string(),
            port: DEFAULT_VLC_PORT,
            startup_timeout: Duration::from_secs(10),
        }
    }
}

/// Subset of VLC's `status.json` response.
#[derive(Debug, Deserialize)]
struct VlcStatusRaw {
    state: String,
}

/// A VLC process owned by this program and controlled over HTTP.
///
/// The process is terminated when the player is dropped.
pub struct VlcPlayer {
    process: Child,
    agent: Agent,
    status_url: String,
    authorization: String,
    base_dir: PathBuf,
}

impl VlcPlayer {
    /// Starts VLC and waits until its HTTP interface answers.
    ///
    /// Items are enqueued as absolute paths under `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_dir` does not exist, VLC cannot be started, or
    /// its HTTP interface does not respond within the startup timeout.
    pub fn spawn(base_dir: &Path, options: &VlcOptions) -> Result<Self> {
        let base_dir = base_dir
            .canonicalize()
            .with_context(|| format!("Media base directory {} not found", base_dir.display()))?;
        let password = random_password();

        info!("Starting {} with HTTP interface on localhost:{}", options.binary, options.port);
        let process = Command::new(&options.binary)
            .args(["--extraintf", "http", "--http-host", "localhost", "--http-port"])
            .arg(options.port.to_string())
            .arg("--http-password")
            .arg(&password)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to start {}. Is VLC installed?", options.binary))?;

        let mut player = Self {
            process,
            agent: Agent::config_builder()
                .timeout_global(Some(Duration::from_secs(5)))
                .build()
                .into(),
            status_url: format!("http://localhost:{}/requests/status.json", options.port),
            authorization: basic_auth_header("", &password),
            base_dir,
        };

        player.wait_until_ready(options.startup_timeout)?;
        Ok(player)
    }

    fn wait_until_ready(&mut self, timeout: Duration) -> Result<()> {
        let retry_delay = Duration::from_millis(250);
        let mut waited = Duration::ZERO;

        loop {
            if let Some(exit) = self.process.try_wait()? {
                bail!("VLC exited during startup ({exit})");
            }
            match self.status() {
                Ok(_) => {
                    debug!("VLC HTTP interface ready after {waited:?}");
                    return Ok(());
                }
                Err(e) if waited >= timeout => {
                    return Err(e).context("VLC HTTP interface did not become ready");
                }
                Err(_) => {
                    sleep(retry_delay);
                    waited += retry_delay;
                }
            }
        }
    }

    /// Current playback state.
    pub fn status(&self) -> Result<PlayerState> {
        self.request(&[])
    }

    fn command(&self, command: &str, args: &[(&str, &str)]) -> Result<PlayerState> {
        let mut query = vec![("command", command)];
        query.extend_from_slice(args);
        self.request(&query)
            .with_context(|| format!("VLC command '{command}' failed"))
    }

    fn request(&self, query: &[(&str, &str)]) -> Result<PlayerState> {
        let mut request = self
            .agent
            .get(&self.status_url)
            .header("Authorization", &self.authorization);
        for (key, value) in query {
            request = request.query(*key, *value);
        }

        let mut response = request.call().context("HTTP request to VLC failed")?;
        let body = response
            .body_mut()
            .read_to_string()
            .context("Failed to read VLC status body")?;
        parse_vlc_status(&body)
    }
}

impl Player for VlcPlayer {
    fn play(&mut self, item: &MediaItem, stop: &AtomicBool) -> Result<()> {
        let file = self.base_dir.join(&item.path);
        let input = file.to_string_lossy().into_owned();

        self.command("pl_empty", &[])?;
        self.command("in_enqueue", &[("input", input.as_str())])?;
        self.command("pl_play", &[])?;

        sleep(POLL_INTERVAL);
        loop {
            if let Some(exit) = self.process.try_wait()? {
                bail!("VLC exited during playback ({exit})");
            }
            if stop.load(Ordering::Relaxed) {
                debug!("Stopping VLC playback of {}", item.path);
                self.command("pl_stop", &[])?;
                break;
            }
            match self.status()? {
                PlayerState::Stopped => break,
                PlayerState::Unknown(state) => debug!("Unexpected VLC state '{state}'"),
                _ => {}
            }
            sleep(POLL_INTERVAL);
        }

        Ok(())
    }
}

impl Drop for VlcPlayer {
    fn drop(&mut self) {
        debug!("Terminating VLC process {}", self.process.id());
        if let Err(e) = self.process.kill() {
            warn!("Failed to terminate VLC: {e}");
        }
        let _ = self.process.wait();
    }
}

fn random_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(22)
        .map(char::from)
        .collect()
}

/// `Authorization` header value for HTTP Basic auth.
fn basic_auth_header(user: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{user}:{password}")))
}

fn parse_vlc_status(body: &str) -> Result<PlayerState> {
    let raw: VlcStatusRaw = serde_json::from_str(body).context("Malformed VLC status response")?;
    Ok(PlayerState::from_name(&raw.state))
}
