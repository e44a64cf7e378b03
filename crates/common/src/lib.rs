use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// A catalogued piece of music, deduplicated across every library it was
/// imported from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration_ms: Option<u32>,
    pub genres: Vec<String>,
    pub grouping: Vec<String>,
    pub bpm: Option<f32>,
    pub year: Option<i32>,
    pub key: Option<String>,
    pub rating: Option<f32>,
    pub normalized_identity: String,
    pub sources: Vec<Source>,
    pub created_at: u64,
    pub updated_at: u64,
}

/// Everything a store needs to write a song; id and timestamps are assigned
/// by the store.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SongDraft {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration_ms: Option<u32>,
    pub genres: Vec<String>,
    pub grouping: Vec<String>,
    pub bpm: Option<f32>,
    pub year: Option<i32>,
    pub key: Option<String>,
    pub rating: Option<f32>,
    pub normalized_identity: String,
    pub sources: Vec<Source>,
}

impl Song {
    pub fn to_draft(&self) -> SongDraft {
        SongDraft {
            title: self.title.clone(),
            artist: self.artist.clone(),
            album: self.album.clone(),
            duration_ms: self.duration_ms,
            genres: self.genres.clone(),
            grouping: self.grouping.clone(),
            bpm: self.bpm,
            year: self.year,
            key: self.key.clone(),
            rating: self.rating,
            normalized_identity: self.normalized_identity.clone(),
            sources: self.sources.clone(),
        }
    }
}

impl SongDraft {
    pub fn into_song(self, id: String, created_at: u64, updated_at: u64) -> Song {
        Song {
            id,
            title: self.title,
            artist: self.artist,
            album: self.album,
            duration_ms: self.duration_ms,
            genres: self.genres,
            grouping: self.grouping,
            bpm: self.bpm,
            year: self.year,
            key: self.key,
            rating: self.rating,
            normalized_identity: self.normalized_identity,
            sources: self.sources,
            created_at,
            updated_at,
        }
    }
}

/// Partial song-level data carried by an import. Absent values never erase
/// what the catalog already knows.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SongFields {
    pub album: Option<String>,
    pub duration_ms: Option<u32>,
    pub genres: Vec<String>,
    pub grouping: Vec<String>,
    pub bpm: Option<f32>,
    pub year: Option<i32>,
    pub key: Option<String>,
    pub rating: Option<f32>,
}

/// One track as handed over by an importer.
#[derive(Clone, Debug, PartialEq)]
pub struct IncomingTrack {
    pub artist: String,
    pub title: String,
    pub duration_ms: Option<u32>,
    pub fields: SongFields,
    pub source: Source,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceType {
    AppleMusic,
    Rekordbox,
    DjPro,
    LocalFile,
}

impl SourceType {
    pub const ALL: [SourceType; 4] = [
        SourceType::AppleMusic,
        SourceType::Rekordbox,
        SourceType::DjPro,
        SourceType::LocalFile,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::AppleMusic => "apple-music",
            SourceType::Rekordbox => "rekordbox",
            SourceType::DjPro => "dj-pro",
            SourceType::LocalFile => "local-file",
        }
    }

    /// Metadata entry holding the library's own id for a track, if the
    /// library has one.
    pub fn metadata_id_field(&self) -> Option<&'static str> {
        match self {
            SourceType::AppleMusic => Some("persistent_id"),
            SourceType::Rekordbox | SourceType::DjPro => Some("track_id"),
            SourceType::LocalFile => None,
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownSourceType(pub String);

impl fmt::Display for UnknownSourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown source type: {}", self.0)
    }
}

impl std::error::Error for UnknownSourceType {}

impl FromStr for SourceType {
    type Err = UnknownSourceType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        match normalized.as_str() {
            "apple-music" | "applemusic" | "itunes" => Ok(SourceType::AppleMusic),
            "rekordbox" => Ok(SourceType::Rekordbox),
            "dj-pro" | "djay" | "djay-pro" => Ok(SourceType::DjPro),
            "local-file" | "local" => Ok(SourceType::LocalFile),
            _ => Err(UnknownSourceType(s.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MetadataValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl MetadataValue {
    fn as_identity(&self) -> Option<String> {
        match self {
            MetadataValue::Text(value) => {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            MetadataValue::Integer(value) => Some(value.to_string()),
            MetadataValue::Float(_) | MetadataValue::Bool(_) => None,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Integer(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

/// A concrete file or stream of a song inside one external library.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub source_type: SourceType,
    pub file_path: Option<String>,
    pub file_size: Option<u64>,
    pub bit_rate: Option<u32>,
    pub file_type: Option<String>,
    pub metadata: BTreeMap<String, MetadataValue>,
    pub last_imported: u64,
}

impl Source {
    pub fn new(source_type: SourceType) -> Self {
        Self {
            source_type,
            file_path: None,
            file_size: None,
            bit_rate: None,
            file_type: None,
            metadata: BTreeMap::new(),
            last_imported: now_secs(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// The library's own id when present, else the file path.
    pub fn identity_key(&self) -> Option<String> {
        let from_metadata = self
            .source_type
            .metadata_id_field()
            .into_iter()
            .chain(std::iter::once("id"))
            .filter_map(|field| self.metadata.get(field))
            .find_map(MetadataValue::as_identity);
        from_metadata.or_else(|| {
            self.file_path
                .as_deref()
                .map(str::trim)
                .filter(|path| !path.is_empty())
                .map(str::to_string)
        })
    }

    pub fn same_slot(&self, other: &Source) -> bool {
        self.source_type == other.source_type && self.identity_key() == other.identity_key()
    }

    pub fn is_streaming(&self) -> bool {
        self.file_path.is_none()
    }
}

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::{MetadataValue, Source, SourceType};

    #[test]
    fn source_type_round_trips_through_text() {
        for source_type in SourceType::ALL {
            let parsed: SourceType = source_type.to_string().parse().unwrap();
            assert_eq!(parsed, source_type);
        }
        assert_eq!("dJay Pro".parse::<SourceType>().unwrap(), SourceType::DjPro);
        assert!("winamp".parse::<SourceType>().is_err());
    }

    #[test]
    fn identity_prefers_library_id_over_path() {
        let source = Source::new(SourceType::AppleMusic)
            .with_path("/music/a.m4a")
            .with_metadata("persistent_id", "ABC123");
        assert_eq!(source.identity_key().as_deref(), Some("ABC123"));

        let rekordbox = Source::new(SourceType::Rekordbox)
            .with_path("/music/a.mp3")
            .with_metadata("track_id", 42i64);
        assert_eq!(rekordbox.identity_key().as_deref(), Some("42"));
    }

    #[test]
    fn identity_falls_back_to_path() {
        let source = Source::new(SourceType::LocalFile).with_path("/music/a.flac");
        assert_eq!(source.identity_key().as_deref(), Some("/music/a.flac"));

        let blank_id = Source::new(SourceType::AppleMusic)
            .with_path("/music/b.m4a")
            .with_metadata("persistent_id", "  ");
        assert_eq!(blank_id.identity_key().as_deref(), Some("/music/b.m4a"));
    }

    #[test]
    fn streaming_source_without_id_has_no_identity() {
        let source = Source::new(SourceType::AppleMusic).with_metadata("streaming", true);
        assert!(source.is_streaming());
        assert_eq!(source.identity_key(), None);
        assert!(source.same_slot(&Source::new(SourceType::AppleMusic)));
        assert!(!source.same_slot(&Source::new(SourceType::DjPro)));
        assert_eq!(
            source.metadata.get("streaming"),
            Some(&MetadataValue::Bool(true))
        );
    }
}
