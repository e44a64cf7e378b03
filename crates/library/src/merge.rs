use std::collections::HashSet;

use common::{Song, SongDraft, SongFields, Source};

/// Folds an import into an existing song.
///
/// Known values are only ever replaced by present ones, set-valued fields
/// only grow, and the first known duration is kept for good. The returned
/// draft keeps the existing identity; recomputing it is the caller's job.
pub fn merge(existing: &Song, incoming: &SongFields, source: Source) -> SongDraft {
    let mut draft = existing.to_draft();

    union_into(&mut draft.genres, &incoming.genres);
    union_into(&mut draft.grouping, &incoming.grouping);

    if let Some(bpm) = incoming.bpm {
        draft.bpm = Some(bpm);
    }
    if let Some(year) = incoming.year {
        draft.year = Some(year);
    }
    if let Some(rating) = incoming.rating.filter(|value| valid_rating(*value)) {
        draft.rating = Some(rating);
    }
    if let Some(key) = non_blank(incoming.key.as_deref()) {
        draft.key = Some(key);
    }
    if let Some(album) = non_blank(incoming.album.as_deref()) {
        draft.album = album;
    }

    let has_duration = draft.duration_ms.is_some_and(|value| value > 0);
    if !has_duration {
        if let Some(duration_ms) = incoming.duration_ms.filter(|value| *value > 0) {
            draft.duration_ms = Some(duration_ms);
        }
    }

    attach_source(&mut draft.sources, source);
    draft
}

/// Replaces the source occupying the same slot, else appends.
pub fn attach_source(sources: &mut Vec<Source>, source: Source) {
    match sources.iter_mut().find(|existing| existing.same_slot(&source)) {
        Some(slot) => *slot = source,
        None => sources.push(source),
    }
}

pub fn union_into(target: &mut Vec<String>, incoming: &[String]) {
    if incoming.is_empty() {
        return;
    }
    let mut seen: HashSet<String> = target.iter().cloned().collect();
    for value in incoming {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_string()) {
            target.push(trimmed.to_string());
        }
    }
}

pub fn valid_rating(value: f32) -> bool {
    value.is_finite() && (0.0..=5.0).contains(&value)
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    let trimmed = value?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use common::{Song, SongDraft, SongFields, Source, SourceType};

    use super::{merge, union_into};

    fn existing() -> Song {
        SongDraft {
            title: "We Run".to_string(),
            artist: "Bailey Ibbs".to_string(),
            album: "Singles".to_string(),
            duration_ms: Some(371_000),
            genres: vec!["House".to_string(), "Garage".to_string()],
            bpm: Some(128.0),
            year: Some(2021),
            normalized_identity: "bailey ibbs we run".to_string(),
            sources: vec![Source::new(SourceType::AppleMusic).with_metadata("persistent_id", "P1")],
            ..SongDraft::default()
        }
        .into_song("song-1".to_string(), 1, 1)
    }

    #[test]
    fn genres_only_grow() {
        let song = existing();
        let incoming = SongFields {
            genres: vec!["Garage".to_string(), "UKG".to_string(), " ".to_string()],
            ..SongFields::default()
        };
        let merged = merge(&song, &incoming, Source::new(SourceType::DjPro));
        assert_eq!(merged.genres, vec!["House", "Garage", "UKG"]);
        assert!(song.genres.iter().all(|genre| merged.genres.contains(genre)));

        let empty = merge(&song, &SongFields::default(), Source::new(SourceType::DjPro));
        assert_eq!(empty.genres, song.genres);
    }

    #[test]
    fn grouping_only_grows() {
        let mut song = existing();
        song.grouping = vec!["Peak".to_string()];
        let incoming = SongFields {
            grouping: vec!["Warmup".to_string(), "Peak".to_string()],
            ..SongFields::default()
        };
        let merged = merge(&song, &incoming, Source::new(SourceType::Rekordbox));
        assert_eq!(merged.grouping, vec!["Peak", "Warmup"]);

        let empty = merge(&song, &SongFields::default(), Source::new(SourceType::Rekordbox));
        assert_eq!(empty.grouping, vec!["Peak"]);
    }

    #[test]
    fn absent_scalars_do_not_erase() {
        let song = existing();
        let merged = merge(&song, &SongFields::default(), Source::new(SourceType::DjPro));
        assert_eq!(merged.bpm, Some(128.0));
        assert_eq!(merged.year, Some(2021));
        assert_eq!(merged.album, "Singles");
    }

    #[test]
    fn present_scalars_overwrite() {
        let song = existing();
        let incoming = SongFields {
            bpm: Some(130.0),
            year: Some(2022),
            rating: Some(4.5),
            key: Some("Am".to_string()),
            album: Some("We Run EP".to_string()),
            ..SongFields::default()
        };
        let merged = merge(&song, &incoming, Source::new(SourceType::DjPro));
        assert_eq!(merged.bpm, Some(130.0));
        assert_eq!(merged.year, Some(2022));
        assert_eq!(merged.rating, Some(4.5));
        assert_eq!(merged.key.as_deref(), Some("Am"));
        assert_eq!(merged.album, "We Run EP");
    }

    #[test]
    fn blank_key_and_album_are_ignored() {
        let mut song = existing();
        song.key = Some("Am".to_string());
        let incoming = SongFields {
            key: Some(String::new()),
            album: Some("  ".to_string()),
            rating: Some(7.0),
            ..SongFields::default()
        };
        let merged = merge(&song, &incoming, Source::new(SourceType::Rekordbox));
        assert_eq!(merged.key.as_deref(), Some("Am"));
        assert_eq!(merged.album, "Singles");
        assert_eq!(merged.rating, None);
    }

    #[test]
    fn known_duration_is_locked() {
        let song = existing();
        for incoming in [Some(1), Some(372_000), Some(0), None] {
            let fields = SongFields {
                duration_ms: incoming,
                ..SongFields::default()
            };
            let merged = merge(&song, &fields, Source::new(SourceType::DjPro));
            assert_eq!(merged.duration_ms, Some(371_000));
        }
    }

    #[test]
    fn missing_duration_is_filled() {
        let mut song = existing();
        song.duration_ms = Some(0);
        let fields = SongFields {
            duration_ms: Some(370_500),
            ..SongFields::default()
        };
        let merged = merge(&song, &fields, Source::new(SourceType::DjPro));
        assert_eq!(merged.duration_ms, Some(370_500));
    }

    #[test]
    fn same_source_is_replaced_in_place() {
        let song = existing();
        let mut reimport = Source::new(SourceType::AppleMusic).with_metadata("persistent_id", "P1");
        reimport.bit_rate = Some(256);
        let merged = merge(&song, &SongFields::default(), reimport);
        assert_eq!(merged.sources.len(), 1);
        assert_eq!(merged.sources[0].bit_rate, Some(256));
    }

    #[test]
    fn new_source_is_appended() {
        let song = existing();
        let other_id = Source::new(SourceType::AppleMusic).with_metadata("persistent_id", "P2");
        let merged = merge(&song, &SongFields::default(), other_id);
        assert_eq!(merged.sources.len(), 2);

        let same_id_other_type =
            Source::new(SourceType::Rekordbox).with_metadata("persistent_id", "P1");
        let merged = merge(&song, &SongFields::default(), same_id_other_type);
        assert_eq!(merged.sources.len(), 2);
        assert_eq!(merged.sources[0].source_type, SourceType::AppleMusic);
    }

    #[test]
    fn union_skips_duplicates() {
        let mut target = vec!["a".to_string()];
        union_into(&mut target, &["a".to_string(), "b".to_string(), "b".to_string()]);
        assert_eq!(target, vec!["a", "b"]);
    }
}
