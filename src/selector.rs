//! Weighted, repeat-avoiding media selection.
//!
//! Each call draws a collection by weight, then a file uniformly from that
//! collection, and rejects the candidate if it breaks one of the backoff rules:
//!
//! - its path appears among the `same_item_backoff` newest picks, or
//! - its collection has `backoff > 0` and appears among that many newest picks.
//!
//! After [`MAX_SELECT_ATTEMPTS`] rejected draws the last candidate is used anyway,
//! so playback always makes progress even when the rules cannot be satisfied.

use crate::collections::{CollectionIndex, MediaItem};
use crate::config::{ConfigError, PolicyConfig};
use log::{debug, warn};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

/// Draws per call before falling back to the last candidate.
pub const MAX_SELECT_ATTEMPTS: usize = 10;

/// History size used by the fixed-capacity policy when none is given.
pub const DEFAULT_FIXED_HISTORY: usize = 10;

/// Upper bound on history entries allocated up front.
const HISTORY_PREALLOC: usize = 64;

/// How many past picks the selector remembers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryCapacity {
    /// Exactly as many entries as the largest configured backoff needs
    #[default]
    Dynamic,
    /// A constant size; backoffs larger than this only look back this far
    Fixed(usize),
}

impl HistoryCapacity {
    pub fn resolve(self, policy: &PolicyConfig) -> usize {
        match self {
            Self::Dynamic => policy.max_backoff(),
            Self::Fixed(size) => size,
        }
    }
}

/// Outcome of one selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub item: MediaItem,
    /// Number of draws made, between 1 and [`MAX_SELECT_ATTEMPTS`]
    pub attempts: usize,
    /// True when every draw was rejected and the last one was used anyway
    pub fallback: bool,
}

/// A configured collection ready for drawing.
#[derive(Debug)]
struct Slot {
    name: String,
    backoff: usize,
    /// Never empty
    members: Vec<String>,
}

/// The selection core. Owns its history and random source.
#[derive(Debug)]
pub struct MediaSelector<R = StdRng> {
    index: CollectionIndex,
    policy: PolicyConfig,
    slots: Vec<Slot>,
    weights: WeightedIndex<f64>,
    history: VecDeque<MediaItem>,
    capacity: usize,
    rng: R,
}

impl MediaSelector<StdRng> {
    /// Creates a selector seeded from the operating system.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the policy cannot be satisfied by the index:
    /// no collections, a collection missing from the index or without files, or a
    /// negative or non-finite weight. A weight of 0 counts as the default of 1.
    pub fn new(
        index: CollectionIndex,
        policy: PolicyConfig,
        capacity: HistoryCapacity,
    ) -> Result<Self, ConfigError> {
        Self::with_rng(index, policy, capacity, StdRng::from_entropy())
    }
}

impl<R: Rng> MediaSelector<R> {
    /// Creates a selector drawing from `rng`.
    pub fn with_rng(
        index: CollectionIndex,
        policy: PolicyConfig,
        capacity: HistoryCapacity,
        rng: R,
    ) -> Result<Self, ConfigError> {
        if policy.collections.is_empty() {
            return Err(ConfigError::NoCollections);
        }

        let mut slots = Vec::with_capacity(policy.collections.len());
        let mut weights = Vec::with_capacity(policy.collections.len());

        for (name, rules) in &policy.collections {
            let members = index
                .members(name)
                .ok_or_else(|| ConfigError::UnknownCollection(name.clone()))?;
            if members.is_empty() {
                return Err(ConfigError::EmptyCollection(name.clone()));
            }

            let weight = rules.weight();
            if !weight.is_finite() || weight <= 0.0 {
                return Err(ConfigError::InvalidWeight {
                    name: name.clone(),
                    weight,
                });
            }

            slots.push(Slot {
                name: name.clone(),
                backoff: rules.backoff(),
                members: members.to_vec(),
            });
            weights.push(weight);
        }

        for name in index.names().filter(|n| !policy.collections.contains_key(*n)) {
            debug!("Collection '{name}' has no policy entry and will never be selected");
        }

        // Every weight was checked positive and finite above.
        let weights = WeightedIndex::new(&weights).map_err(|_| ConfigError::NoCollections)?;

        let capacity = capacity.resolve(&policy);
        if capacity < policy.max_backoff() {
            warn!(
                "History holds {capacity} entries but the policy needs {}; \
                 larger backoffs are only partially enforced",
                policy.max_backoff()
            );
        }

        Ok(Self {
            index,
            policy,
            slots,
            weights,
            history: VecDeque::with_capacity(capacity.min(HISTORY_PREALLOC) + 1),
            capacity,
            rng,
        })
    }

    /// Picks the next item and records it in the history.
    pub fn select_next(&mut self) -> MediaItem {
        self.select_next_detailed().item
    }

    /// Like [`select_next`](Self::select_next) but also reports how the item was chosen.
    pub fn select_next_detailed(&mut self) -> Selection {
        let mut attempts = 0;
        let mut accepted = false;
        let mut candidate = self.draw();

        loop {
            attempts += 1;
            if let Some(reason) = self.rejection(&candidate) {
                debug!("Attempt {attempts}: rejected {} ({reason})", candidate.path);
            } else {
                accepted = true;
                break;
            }
            if attempts == MAX_SELECT_ATTEMPTS {
                break;
            }
            candidate = self.draw();
        }

        if !accepted {
            warn!(
                "No candidate satisfied the backoff rules after {attempts} attempts; using {}",
                candidate.path
            );
        }

        self.history.push_front(candidate.clone());
        self.history.truncate(self.capacity);

        Selection {
            item: candidate,
            attempts,
            fallback: !accepted,
        }
    }

    fn draw(&mut self) -> MediaItem {
        let slot = &self.slots[self.weights.sample(&mut self.rng)];
        let path = &slot.members[self.rng.gen_range(0..slot.members.len())];

        MediaItem::new(slot.name.clone(), path.clone())
    }

    fn rejection(&self, candidate: &MediaItem) -> Option<&'static str> {
        let same_item_backoff = self.policy.same_item_backoff();
        if same_item_backoff > 0
            && self
                .history
                .iter()
                .take(same_item_backoff)
                .any(|h| h.path == candidate.path)
        {
            return Some("same item played recently");
        }

        let collection_backoff = self
            .slots
            .iter()
            .find(|s| s.name == candidate.collection)
            .map_or(0, |s| s.backoff);
        if collection_backoff > 0
            && self
                .history
                .iter()
                .take(collection_backoff)
                .any(|h| h.collection == candidate.collection)
        {
            return Some("collection played recently");
        }

        None
    }

    /// Past picks, newest first.
    pub fn history(&self) -> impl ExactSizeIterator<Item = &MediaItem> {
        self.history.iter()
    }

    pub fn history_capacity(&self) -> usize {
        self.capacity
    }

    pub fn index(&self) -> &CollectionIndex {
        &self.index
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }
}

/// A selector shared between threads.
///
/// Every selection runs entirely under the lock, so concurrent callers see a
/// consistent history and the backoff rules hold across them.
#[derive(Debug)]
pub struct SharedSelector<R = StdRng> {
    inner: Arc<Mutex<MediaSelector<R>>>,
}

impl<R> Clone for SharedSelector<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Rng> SharedSelector<R> {
    pub fn new(selector: MediaSelector<R>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(selector)),
        }
    }

    pub fn select_next(&self) -> MediaItem {
        self.select_next_detailed().item
    }

    pub fn select_next_detailed(&self) -> Selection {
        // A panic mid-selection cannot leave the history half-updated.
        let mut selector = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        selector.select_next_detailed()
    }

    pub fn history_len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .history
            .len()
    }
}
