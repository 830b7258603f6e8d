//! Populate-once in-memory cache of parsed plays, and the pipeline that
//! fills it: cache, then the on-disk store, then the caller's feed source.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::store::FeedStore;
use super::{GameId, PlayMap, TimingDialect, parse_feed};
use crate::error::AppError;

/// Supplies raw feed bytes for a game, typically over the network. Any
/// failure reads as absence.
pub trait FeedSource {
    fn fetch(&self, game: &GameId) -> Option<Vec<u8>>;
}

/// Parsed plays per (game, dialect). Shared, read-mostly; each entry is
/// written at most once per process lifetime.
#[derive(Default)]
pub struct PlayCache {
    inner: Mutex<HashMap<(String, TimingDialect), Arc<PlayMap>>>,
}

impl PlayCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, eid: &str, dialect: TimingDialect) -> Option<Arc<PlayMap>> {
        self.inner
            .lock()
            .get(&(eid.to_string(), dialect))
            .cloned()
    }

    /// Insert-if-absent; a concurrent winner's entry is returned instead.
    fn insert(&self, eid: &str, dialect: TimingDialect, plays: PlayMap) -> Arc<PlayMap> {
        let mut guard = self.inner.lock();
        guard
            .entry((eid.to_string(), dialect))
            .or_insert_with(|| Arc::new(plays))
            .clone()
    }
}

/// Load the plays for a game: cache, store, then `source`, in that order.
///
/// Only a finished game is served from the in-memory cache or written to the
/// store; an in-progress game goes back to the source so new plays show up.
pub fn load_plays(
    cache: &PlayCache,
    store: &FeedStore,
    source: &dyn FeedSource,
    game: &GameId,
    dialect: TimingDialect,
    game_over: bool,
) -> Result<Arc<PlayMap>, AppError> {
    if game_over {
        if let Some(hit) = cache.get(&game.eid, dialect) {
            return Ok(hit);
        }
    }

    let raw = store
        .load(&game.eid)
        .or_else(|| source.fetch(game))
        .ok_or(AppError::NoTimingData)?;
    let plays = parse_feed(&raw, dialect)?;

    if !game_over {
        // The feed is still growing; don't freeze it into the cache.
        return Ok(Arc::new(plays));
    }

    if !store.contains(&game.eid) {
        if let Err(err) = store.save(&game.eid, &raw) {
            log::warn!(
                target: "playclip::feed::cache",
                "could not store feed for game {}: {}",
                game.eid,
                err
            );
        }
    }

    Ok(cache.insert(&game.eid, dialect, plays))
}
