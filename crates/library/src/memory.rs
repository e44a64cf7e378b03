use common::{now_secs, Song, SongDraft};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::index::CatalogStats;
use crate::store::{DurationRange, SongStore, StoreError};

/// Non-persistent [`SongStore`] keeping songs in insertion order.
#[derive(Default)]
pub struct MemoryStore {
    songs: RwLock<Vec<Song>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn songs(&self) -> Vec<Song> {
        self.songs.read().clone()
    }

    pub fn len(&self) -> usize {
        self.songs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.read().is_empty()
    }

    #[cfg(test)]
    pub(crate) fn remove(&self, song_id: &str) -> Option<Song> {
        let mut songs = self.songs.write();
        let position = songs.iter().position(|song| song.id == song_id)?;
        Some(songs.remove(position))
    }

    pub fn stats(&self) -> CatalogStats {
        let mut stats = CatalogStats::default();
        for song in self.songs.read().iter() {
            stats.tally(song);
        }
        stats
    }
}

impl SongStore for MemoryStore {
    fn query_by_identity(
        &self,
        key: &str,
        duration_range: Option<DurationRange>,
    ) -> Result<Vec<Song>, StoreError> {
        let songs = self.songs.read();
        Ok(songs
            .iter()
            .filter(|song| song.normalized_identity == key)
            .filter(|song| match &duration_range {
                Some(range) => range.contains(song.duration_ms),
                None => true,
            })
            .cloned()
            .collect())
    }

    fn update_song_by_id(&self, song_id: &str, draft: SongDraft) -> Result<Song, StoreError> {
        let mut songs = self.songs.write();
        let slot = songs
            .iter_mut()
            .find(|song| song.id == song_id)
            .ok_or_else(|| StoreError::NotFound(song_id.to_string()))?;
        let updated = draft.into_song(slot.id.clone(), slot.created_at, now_secs());
        *slot = updated.clone();
        Ok(updated)
    }

    fn insert_song(&self, draft: SongDraft) -> Result<Song, StoreError> {
        let now = now_secs();
        let song = draft.into_song(Uuid::new_v4().to_string(), now, now);
        self.songs.write().push(song.clone());
        Ok(song)
    }
}
