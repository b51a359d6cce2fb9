//! Weighted, repeat-avoiding media rotation.
//!
//! Core modules:
//! - [`collections`] - Collection index built from a media directory
//! - [`config`] - Selection policy (weights, backoffs)
//! - [`selector`] - The selection algorithm and its history
//!
//! Delivery:
//! - [`player`] - Local playback loop and the VLC backend
//! - [`mpd_client`] - MPD backend driven through `mpc`
//! - [`server`] - HTTP endpoints for browser playback
//!
//! Supporting modules:
//! - [`cli`] - Command-line interface definitions with clap integration
//! - [`completion`] - Shell completion generation
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use mediaspinner::collections::CollectionIndex;
//! use mediaspinner::config::PolicyConfig;
//! use mediaspinner::selector::{HistoryCapacity, MediaSelector};
//! use std::path::Path;
//!
//! let index = CollectionIndex::from_dir(Path::new("/srv/media"))?;
//! let policy = PolicyConfig::load(Path::new("/srv/media/rotation.json"))?;
//! let mut selector = MediaSelector::new(index, policy, HistoryCapacity::Dynamic)?;
//!
//! for _ in 0..5 {
//!     println!("{}", selector.select_next().path);
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Selection
//!
//! Each pick draws a collection with probability proportional to its weight and a
//! file uniformly within it. A candidate is redrawn (up to ten times) when its
//! file was among the last `same_item_backoff` picks, or when its collection has a
//! `backoff` and appeared among that many recent picks. If no draw passes, the
//! last one is used so playback never stalls.
//!
//! ## Error Handling
//!
//! Policy problems (no collections, unknown or empty collections, bad weights) are
//! reported as [`config::ConfigError`] when the selector is built. Everything else
//! returns `anyhow::Result` with context.

pub mod cli;
pub mod collections;
pub mod completion;
pub mod config;
pub mod mpd_client;
pub mod player;
pub mod selector;
pub mod server;
