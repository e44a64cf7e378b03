use common::{IncomingTrack, Song, SongDraft};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::matcher::{find_match, MatchTolerances};
use crate::merge::{merge, non_blank, union_into, valid_rating};
use crate::normalize::{identity_key, normalize_text};
use crate::store::{SongStore, StoreError};

/// Match-or-create entry point shared by every importer.
pub struct Catalog<S> {
    store: S,
    tolerances: MatchTolerances,
    // Held across match and write so two upserts of one song cannot both create it.
    upsert_lock: Mutex<()>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UpsertOutcome {
    pub song: Song,
    pub created: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub created: usize,
    pub merged: usize,
    pub failed: usize,
}

impl ImportReport {
    pub fn total(&self) -> usize {
        self.created + self.merged + self.failed
    }
}

impl<S: SongStore> Catalog<S> {
    pub fn new(store: S) -> Self {
        Self::with_tolerances(store, MatchTolerances::default())
    }

    pub fn with_tolerances(store: S, tolerances: MatchTolerances) -> Self {
        Self {
            store,
            tolerances,
            upsert_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn tolerances(&self) -> MatchTolerances {
        self.tolerances
    }

    pub fn find_match(
        &self,
        artist: &str,
        title: &str,
        duration_ms: Option<u32>,
    ) -> Result<Option<Song>, CatalogError> {
        Ok(find_match(&self.store, self.tolerances, artist, title, duration_ms)?)
    }

    pub fn upsert(&self, track: IncomingTrack) -> Result<Song, CatalogError> {
        Ok(self.upsert_with_outcome(track)?.song)
    }

    pub fn upsert_with_outcome(&self, track: IncomingTrack) -> Result<UpsertOutcome, CatalogError> {
        validate(&track)?;
        let IncomingTrack {
            artist,
            title,
            duration_ms,
            mut fields,
            source,
        } = track;
        let duration_ms = duration_ms
            .filter(|value| *value > 0)
            .or(fields.duration_ms.filter(|value| *value > 0));
        fields.duration_ms = duration_ms;

        let _guard = self.upsert_lock.lock();
        match find_match(&self.store, self.tolerances, &artist, &title, duration_ms)? {
            Some(existing) => {
                let mut draft = merge(&existing, &fields, source);
                draft.normalized_identity = identity_key(&draft.artist, &draft.title);
                let song = self.store.update_song_by_id(&existing.id, draft)?;
                debug!(
                    "Merged {:?} into song {} ({} sources)",
                    song.normalized_identity,
                    song.id,
                    song.sources.len()
                );
                Ok(UpsertOutcome {
                    song,
                    created: false,
                })
            }
            None => {
                let mut draft = SongDraft {
                    normalized_identity: identity_key(&artist, &title),
                    title,
                    artist,
                    album: non_blank(fields.album.as_deref()).unwrap_or_default(),
                    duration_ms,
                    bpm: fields.bpm,
                    year: fields.year,
                    key: non_blank(fields.key.as_deref()),
                    rating: fields.rating.filter(|value| valid_rating(*value)),
                    sources: vec![source],
                    ..SongDraft::default()
                };
                union_into(&mut draft.genres, &fields.genres);
                union_into(&mut draft.grouping, &fields.grouping);
                let song = self.store.insert_song(draft)?;
                debug!("Created song {} for {:?}", song.id, song.normalized_identity);
                Ok(UpsertOutcome {
                    song,
                    created: true,
                })
            }
        }
    }

    /// Upserts every track independently; a failing track is logged and
    /// counted, never aborting the rest.
    pub fn import_batch<I>(&self, tracks: I) -> ImportReport
    where
        I: IntoIterator<Item = IncomingTrack>,
    {
        let mut report = ImportReport::default();
        for track in tracks {
            let label = format!("{} - {}", track.artist, track.title);
            match self.upsert_with_outcome(track) {
                Ok(outcome) if outcome.created => report.created += 1,
                Ok(_) => report.merged += 1,
                Err(err) => {
                    warn!("Skipping {:?}: {}", label, err);
                    report.failed += 1;
                }
            }
        }
        info!(
            "Imported {} track(s): {} created, {} merged, {} failed",
            report.total(),
            report.created,
            report.merged,
            report.failed
        );
        report
    }
}

fn validate(track: &IncomingTrack) -> Result<(), CatalogError> {
    if track.title.trim().is_empty() {
        return Err(CatalogError::InvalidInput("track has no title".to_string()));
    }
    if normalize_text(&track.artist).is_empty() && normalize_text(&track.title).is_empty() {
        return Err(CatalogError::InvalidInput(format!(
            "artist {:?} and title {:?} normalize to nothing",
            track.artist, track.title
        )));
    }
    Ok(())
}

#[derive(Debug)]
pub enum CatalogError {
    InvalidInput(String),
    NotFound(String),
    StoreUnavailable(StoreError),
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::InvalidInput(reason) => write!(f, "invalid input: {}", reason),
            CatalogError::NotFound(id) => write!(f, "song {} disappeared before update", id),
            CatalogError::StoreUnavailable(err) => write!(f, "store unavailable: {}", err),
        }
    }
}

impl std::error::Error for CatalogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CatalogError::StoreUnavailable(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for CatalogError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => CatalogError::NotFound(id),
            other => CatalogError::StoreUnavailable(other),
        }
    }
}
