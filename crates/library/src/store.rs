use common::{Song, SongDraft};

/// Inclusive window of acceptable durations, in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DurationRange {
    pub min_ms: u32,
    pub max_ms: u32,
}

impl DurationRange {
    pub fn around(duration_ms: u32, tolerance_ms: u32) -> Self {
        Self {
            min_ms: duration_ms.saturating_sub(tolerance_ms),
            max_ms: duration_ms.saturating_add(tolerance_ms),
        }
    }

    /// Unknown durations never fall inside a range.
    pub fn contains(&self, duration_ms: Option<u32>) -> bool {
        match duration_ms {
            Some(value) if value > 0 => value >= self.min_ms && value <= self.max_ms,
            _ => false,
        }
    }
}

/// Document store the catalog persists songs into.
pub trait SongStore {
    /// Songs whose stored identity equals `key`, in store order. With a range,
    /// only songs with a known duration inside it are returned.
    fn query_by_identity(
        &self,
        key: &str,
        duration_range: Option<DurationRange>,
    ) -> Result<Vec<Song>, StoreError>;

    /// Replaces the song stored under `id`, keeping its id and creation time.
    fn update_song_by_id(&self, id: &str, draft: SongDraft) -> Result<Song, StoreError>;

    /// Stores a new song, assigning its id and timestamps.
    fn insert_song(&self, draft: SongDraft) -> Result<Song, StoreError>;
}

impl<S: SongStore + ?Sized> SongStore for &S {
    fn query_by_identity(
        &self,
        key: &str,
        duration_range: Option<DurationRange>,
    ) -> Result<Vec<Song>, StoreError> {
        (**self).query_by_identity(key, duration_range)
    }

    fn update_song_by_id(&self, id: &str, draft: SongDraft) -> Result<Song, StoreError> {
        (**self).update_song_by_id(id, draft)
    }

    fn insert_song(&self, draft: SongDraft) -> Result<Song, StoreError> {
        (**self).insert_song(draft)
    }
}

#[derive(Debug)]
pub enum StoreError {
    NotFound(String),
    Io(std::io::Error),
    Redb(redb::Error),
    Bincode(Box<bincode::ErrorKind>),
    KeyParse(String),
    VersionMismatch(u32),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound(id) => write!(f, "song not found: {}", id),
            StoreError::Io(err) => write!(f, "io error: {}", err),
            StoreError::Redb(err) => write!(f, "db error: {}", err),
            StoreError::Bincode(err) => write!(f, "bincode error: {}", err),
            StoreError::KeyParse(value) => write!(f, "key parse error: {}", value),
            StoreError::VersionMismatch(version) => {
                write!(f, "index version mismatch: {}", version)
            }
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err)
    }
}

impl From<redb::Error> for StoreError {
    fn from(err: redb::Error) -> Self {
        StoreError::Redb(err)
    }
}

impl From<redb::DatabaseError> for StoreError {
    fn from(err: redb::DatabaseError) -> Self {
        StoreError::Redb(err.into())
    }
}

impl From<redb::TableError> for StoreError {
    fn from(err: redb::TableError) -> Self {
        StoreError::Redb(err.into())
    }
}

impl From<redb::TransactionError> for StoreError {
    fn from(err: redb::TransactionError) -> Self {
        StoreError::Redb(err.into())
    }
}

impl From<redb::StorageError> for StoreError {
    fn from(err: redb::StorageError) -> Self {
        StoreError::Redb(err.into())
    }
}

impl From<redb::CommitError> for StoreError {
    fn from(err: redb::CommitError) -> Self {
        StoreError::Redb(err.into())
    }
}

impl From<Box<bincode::ErrorKind>> for StoreError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        StoreError::Bincode(err)
    }
}

#[cfg(test)]
mod tests {
    use super::DurationRange;

    #[test]
    fn range_is_inclusive() {
        let range = DurationRange::around(320_000, 2_000);
        assert!(range.contains(Some(318_000)));
        assert!(range.contains(Some(322_000)));
        assert!(!range.contains(Some(322_001)));
        assert!(!range.contains(None));
        assert!(!range.contains(Some(0)));
    }

    #[test]
    fn range_saturates_near_zero() {
        let range = DurationRange::around(500, 2_000);
        assert_eq!(range.min_ms, 0);
        assert!(range.contains(Some(1)));
    }
}
