use std::fs;
use std::path::{Path, PathBuf};

use common::{now_secs, IncomingTrack, SongFields, Source, SourceType};
use metadata::{read_tags, TagInfo};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Reads every audio file under `root` into an incoming local-file track.
pub fn scan_local_tracks(root: &Path, extensions: &[String]) -> Vec<IncomingTrack> {
    let files = audio_files(root, extensions);
    info!("Found {} audio files under {:?}", files.len(), root);

    let mut tracks = Vec::with_capacity(files.len());
    for file in files {
        let tag = match read_tags(&file) {
            Ok(tag) => tag,
            Err(err) => {
                warn!("Failed to read tags for {:?}: {}", file, err);
                TagInfo::default()
            }
        };
        let file_size = match fs::metadata(&file) {
            Ok(meta) => Some(meta.len()),
            Err(err) => {
                warn!("Failed to stat {:?}: {}", file, err);
                None
            }
        };
        tracks.push(track_from_tags(&file, tag, file_size));
    }
    tracks
}

fn track_from_tags(path: &Path, tag: TagInfo, file_size: Option<u64>) -> IncomingTrack {
    let title = tag.title.unwrap_or_else(|| file_stem(path));
    let artist = tag.artist.or(tag.album_artist).unwrap_or_default();

    let source = Source {
        source_type: SourceType::LocalFile,
        file_path: Some(path.to_string_lossy().to_string()),
        file_size,
        bit_rate: tag.bitrate,
        file_type: extension(path),
        metadata: Default::default(),
        last_imported: now_secs(),
    };

    IncomingTrack {
        artist,
        title,
        duration_ms: tag.duration_ms,
        fields: SongFields {
            album: tag.album,
            duration_ms: tag.duration_ms,
            genres: tag.genres,
            grouping: tag.grouping,
            bpm: tag.bpm,
            year: tag.year,
            key: tag.key,
            rating: None,
        },
        source,
    }
}

fn audio_files(root: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if is_audio(path, extensions) {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    files
}

fn is_audio(path: &Path, extensions: &[String]) -> bool {
    match extension(path) {
        Some(ext) => extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(&ext)),
        None => false,
    }
}

fn extension(path: &Path) -> Option<String> {
    Some(path.extension()?.to_string_lossy().to_ascii_lowercase())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Unknown Track".to_string())
}
