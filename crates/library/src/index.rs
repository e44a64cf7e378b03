use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use common::{now_secs, Song, SongDraft, SourceType};
use redb::{Database, ReadableTable, TableDefinition, TableError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::normalize::normalize_text;
use crate::store::{DurationRange, SongStore, StoreError};

const INDEX_VERSION: u32 = 2;
const KEY_SEP: char = '\x1f';

const META_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("meta");
const SONGS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("songs");
const SONGS_BY_IDENTITY_TABLE: TableDefinition<&str, &[u8]> =
    TableDefinition::new("songs_by_identity");

const META_VERSION_KEY: &str = "version";

/// Song catalog persisted in a redb file.
///
/// Songs are stored whole (sources embedded) under their id; a second table
/// keyed by `identity \x1f id` serves identity lookups as a range scan.
#[derive(Clone)]
pub struct SongIndex {
    db: Arc<Database>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogStats {
    pub songs: usize,
    pub sources: usize,
    pub streaming_sources: usize,
    pub by_source_type: BTreeMap<SourceType, usize>,
}

impl CatalogStats {
    pub fn tally(&mut self, song: &Song) {
        self.songs += 1;
        self.sources += song.sources.len();
        for source in &song.sources {
            if source.is_streaming() {
                self.streaming_sources += 1;
            }
            *self.by_source_type.entry(source.source_type).or_default() += 1;
        }
    }
}

impl SongIndex {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let db = open_or_create_db(path)?;
        let index = Self { db: Arc::new(db) };
        match read_version(&index.db)? {
            Some(version) if version == INDEX_VERSION => {
                info!("Loaded song index from {:?}", path);
            }
            Some(version) => return Err(StoreError::VersionMismatch(version)),
            None => {
                info!("Creating song index at {:?}", path);
                index.init_tables()?;
            }
        }
        Ok(index)
    }

    fn init_tables(&self) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut meta_table = write_txn.open_table(META_TABLE)?;
            let _ = write_txn.open_table(SONGS_TABLE)?;
            let _ = write_txn.open_table(SONGS_BY_IDENTITY_TABLE)?;
            let version_bytes = encode_value(&INDEX_VERSION)?;
            meta_table.insert(META_VERSION_KEY, version_bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_song(&self, song_id: &str) -> Result<Option<Song>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let song_table = read_txn.open_table(SONGS_TABLE)?;
        let song = match song_table.get(song_id)? {
            Some(value) => Some(decode_value(value.value())?),
            None => None,
        };
        Ok(song)
    }

    /// Songs ordered by identity, optionally filtered by a search term
    /// reduced the same way identities are.
    pub fn list_songs(
        &self,
        search: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<Song>, usize), StoreError> {
        let search = search
            .map(normalize_text)
            .filter(|value| !value.is_empty());

        let read_txn = self.db.begin_read()?;
        let identity_table = read_txn.open_table(SONGS_BY_IDENTITY_TABLE)?;
        let song_table = read_txn.open_table(SONGS_TABLE)?;

        let mut total = 0usize;
        let mut items = Vec::new();

        for entry in identity_table.iter()? {
            let entry = entry?;
            let (identity, song_id) = split_key_last(entry.0.value())?;
            if let Some(search) = &search {
                if !identity.contains(search.as_str()) {
                    continue;
                }
            }

            total += 1;
            if total <= offset {
                continue;
            }
            if items.len() >= limit {
                continue;
            }

            if let Some(value) = song_table.get(song_id)? {
                let song: Song = decode_value(value.value())?;
                items.push(song);
            }
        }

        Ok((items, total))
    }

    pub fn stats(&self) -> Result<CatalogStats, StoreError> {
        let read_txn = self.db.begin_read()?;
        let song_table = match read_txn.open_table(SONGS_TABLE) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(CatalogStats::default()),
            Err(err) => return Err(err.into()),
        };
        let mut stats = CatalogStats::default();
        for entry in song_table.iter()? {
            let entry = entry?;
            let song: Song = decode_value(entry.1.value())?;
            stats.tally(&song);
        }
        Ok(stats)
    }
}

impl SongStore for SongIndex {
    fn query_by_identity(
        &self,
        key: &str,
        duration_range: Option<DurationRange>,
    ) -> Result<Vec<Song>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let identity_table = read_txn.open_table(SONGS_BY_IDENTITY_TABLE)?;
        let song_table = read_txn.open_table(SONGS_TABLE)?;

        let prefix = prefix_key(key);
        let mut end = prefix.clone();
        end.push('\u{10ffff}');
        let mut songs = Vec::new();

        for entry in identity_table.range(prefix.as_str()..end.as_str())? {
            let entry = entry?;
            let (_, song_id) = split_key_last(entry.0.value())?;
            let Some(value) = song_table.get(song_id)? else {
                continue;
            };
            let song: Song = decode_value(value.value())?;
            if let Some(range) = &duration_range {
                if !range.contains(song.duration_ms) {
                    continue;
                }
            }
            songs.push(song);
        }

        Ok(songs)
    }

    fn update_song_by_id(&self, song_id: &str, draft: SongDraft) -> Result<Song, StoreError> {
        let write_txn = self.db.begin_write()?;
        let song = {
            let mut song_table = write_txn.open_table(SONGS_TABLE)?;
            let mut identity_table = write_txn.open_table(SONGS_BY_IDENTITY_TABLE)?;

            let existing: Song = match song_table.get(song_id)? {
                Some(value) => decode_value(value.value())?,
                None => return Err(StoreError::NotFound(song_id.to_string())),
            };

            let song = draft.into_song(existing.id.clone(), existing.created_at, now_secs());
            if existing.normalized_identity != song.normalized_identity {
                debug!(
                    "Reindexing song {} from {:?} to {:?}",
                    song.id, existing.normalized_identity, song.normalized_identity
                );
                let old_key = identity_key(&existing.normalized_identity, &existing.id);
                identity_table.remove(old_key.as_str())?;
                let new_key = identity_key(&song.normalized_identity, &song.id);
                identity_table.insert(new_key.as_str(), song.id.as_bytes())?;
            }

            let song_bytes = encode_value(&song)?;
            song_table.insert(song.id.as_str(), song_bytes.as_slice())?;
            song
        };
        write_txn.commit()?;
        Ok(song)
    }

    fn insert_song(&self, draft: SongDraft) -> Result<Song, StoreError> {
        let now = now_secs();
        let song = draft.into_song(Uuid::new_v4().to_string(), now, now);

        let write_txn = self.db.begin_write()?;
        {
            let mut song_table = write_txn.open_table(SONGS_TABLE)?;
            let mut identity_table = write_txn.open_table(SONGS_BY_IDENTITY_TABLE)?;

            let song_bytes = encode_value(&song)?;
            song_table.insert(song.id.as_str(), song_bytes.as_slice())?;
            let key = identity_key(&song.normalized_identity, &song.id);
            identity_table.insert(key.as_str(), song.id.as_bytes())?;
        }
        write_txn.commit()?;
        Ok(song)
    }
}

fn open_or_create_db(path: &Path) -> Result<Database, StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    if path.exists() {
        Ok(Database::open(path)?)
    } else {
        Ok(Database::create(path)?)
    }
}

fn read_version(db: &Database) -> Result<Option<u32>, StoreError> {
    let read_txn = db.begin_read()?;
    let table = match read_txn.open_table(META_TABLE) {
        Ok(table) => table,
        Err(TableError::TableDoesNotExist(_)) => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let version = match table.get(META_VERSION_KEY)? {
        Some(value) => Some(decode_value(value.value())?),
        None => None,
    };
    Ok(version)
}

fn encode_value<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    Ok(bincode::serialize(value)?)
}

fn decode_value<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, StoreError> {
    Ok(bincode::deserialize(bytes)?)
}

fn identity_key(identity: &str, song_id: &str) -> String {
    let mut out = prefix_key(identity);
    out.push_str(song_id);
    out
}

fn prefix_key(prefix: &str) -> String {
    let mut out = String::new();
    out.push_str(prefix);
    out.push(KEY_SEP);
    out
}

fn split_key_last(value: &str) -> Result<(&str, &str), StoreError> {
    let idx = value
        .rfind(KEY_SEP)
        .ok_or_else(|| StoreError::KeyParse(value.to_string()))?;
    let next = idx + KEY_SEP.len_utf8();
    Ok((&value[..idx], &value[next..]))
}

#[cfg(test)]
mod tests {
    use common::{Source, SourceType, SongDraft};
    use tempfile::tempdir;

    use super::{split_key_last, SongIndex};
    use crate::store::{DurationRange, SongStore, StoreError};

    fn draft(identity: &str, duration_ms: Option<u32>) -> SongDraft {
        SongDraft {
            title: identity.to_string(),
            artist: "artist".to_string(),
            duration_ms,
            normalized_identity: identity.to_string(),
            sources: vec![
                Source::new(SourceType::LocalFile).with_path(format!("/m/{identity}.mp3"))
            ],
            ..SongDraft::default()
        }
    }

    #[test]
    fn splits_identity_keys() {
        assert_eq!(split_key_last("a b\x1fid-1").unwrap(), ("a b", "id-1"));
        assert!(split_key_last("no-separator").is_err());
    }

    #[test]
    fn insert_then_query_by_identity() {
        let dir = tempdir().unwrap();
        let index = SongIndex::open(&dir.path().join("songs.redb")).unwrap();

        let song = index.insert_song(draft("daft punk one more time", Some(320_000))).unwrap();
        index.insert_song(draft("daft punk one more time extended", Some(320_000))).unwrap();
        assert!(!song.id.is_empty());
        assert!(song.created_at > 0);

        let found = index.query_by_identity("daft punk one more time", None).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, song.id);
        assert_eq!(index.get_song(&song.id).unwrap(), Some(song));
    }

    #[test]
    fn duration_range_excludes_unknown_durations() {
        let dir = tempdir().unwrap();
        let index = SongIndex::open(&dir.path().join("songs.redb")).unwrap();
        index.insert_song(draft("x y", None)).unwrap();
        let timed = index.insert_song(draft("x y", Some(200_000))).unwrap();

        assert_eq!(index.query_by_identity("x y", None).unwrap().len(), 2);
        let range = DurationRange::around(201_000, 2_000);
        let found = index.query_by_identity("x y", Some(range)).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, timed.id);
    }

    #[test]
    fn update_reindexes_changed_identity() {
        let dir = tempdir().unwrap();
        let index = SongIndex::open(&dir.path().join("songs.redb")).unwrap();
        let song = index.insert_song(draft("old name", Some(100_000))).unwrap();

        let mut changed = song.to_draft();
        changed.normalized_identity = "new name".to_string();
        let updated = index.update_song_by_id(&song.id, changed).unwrap();

        assert_eq!(updated.id, song.id);
        assert_eq!(updated.created_at, song.created_at);
        assert!(index.query_by_identity("old name", None).unwrap().is_empty());
        assert_eq!(index.query_by_identity("new name", None).unwrap().len(), 1);
    }

    #[test]
    fn update_of_missing_song_is_not_found() {
        let dir = tempdir().unwrap();
        let index = SongIndex::open(&dir.path().join("songs.redb")).unwrap();
        let err = index.update_song_by_id("missing", draft("a b", None)).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(id) if id == "missing"));
    }

    #[test]
    fn reopen_keeps_songs_and_counts_stats() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("songs.redb");
        {
            let index = SongIndex::open(&path).unwrap();
            index.insert_song(draft("a b", Some(1_000))).unwrap();
            index.insert_song(draft("c d", Some(2_000))).unwrap();
        }
        let index = SongIndex::open(&path).unwrap();
        let stats = index.stats().unwrap();
        assert_eq!(stats.songs, 2);
        assert_eq!(stats.sources, 2);
        assert_eq!(stats.streaming_sources, 0);
        assert_eq!(stats.by_source_type.get(&SourceType::LocalFile), Some(&2));

        let (songs, total) = index.list_songs(Some("C D"), 10, 0).unwrap();
        assert_eq!(total, 1);
        assert_eq!(songs[0].normalized_identity, "c d");
    }
}
