use common::Song;
use tracing::debug;

use crate::normalize::identity_key;
use crate::store::{DurationRange, SongStore, StoreError};

pub const DEFAULT_DURATION_TOLERANCE_MS: u32 = 2_000;
pub const DEFAULT_TIGHT_DURATION_TOLERANCE_MS: u32 = 1_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatchTolerances {
    /// Widest accepted distance between an incoming and a stored duration.
    pub duration_ms: u32,
    /// Candidates this close win over the rest of the wide band.
    pub tight_duration_ms: u32,
}

impl Default for MatchTolerances {
    fn default() -> Self {
        Self {
            duration_ms: DEFAULT_DURATION_TOLERANCE_MS,
            tight_duration_ms: DEFAULT_TIGHT_DURATION_TOLERANCE_MS,
        }
    }
}

/// Finds the catalogued song an artist/title/duration triple refers to.
///
/// A blank key never matches and never touches the store. Without a usable
/// duration the first song sharing the identity wins, even when several do.
pub fn find_match<S: SongStore + ?Sized>(
    store: &S,
    tolerances: MatchTolerances,
    artist: &str,
    title: &str,
    duration_ms: Option<u32>,
) -> Result<Option<Song>, StoreError> {
    let key = identity_key(artist, title);
    if key.is_empty() {
        return Ok(None);
    }

    let duration_ms = duration_ms.filter(|value| *value > 0);
    let range = duration_ms.map(|value| DurationRange::around(value, tolerances.duration_ms));
    let candidates = store.query_by_identity(&key, range)?;
    debug!("{} candidate(s) for {:?}", candidates.len(), key);

    let Some(duration_ms) = duration_ms else {
        return Ok(candidates.into_iter().next());
    };

    let tight = DurationRange::around(duration_ms, tolerances.tight_duration_ms);
    let mut fallback = None;
    for song in candidates {
        if tight.contains(song.duration_ms) {
            return Ok(Some(song));
        }
        if fallback.is_none() && range.is_some_and(|wide| wide.contains(song.duration_ms)) {
            fallback = Some(song);
        }
    }
    Ok(fallback)
}
