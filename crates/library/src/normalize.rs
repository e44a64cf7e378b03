use unicode_normalization::UnicodeNormalization;

const ORIGINAL_MIX: &str = "original mix";

/// Matching key for an artist/title pair.
///
/// Empty when either side is blank. Songs are keyed by [`identity_key`],
/// which covers the artist-less case.
pub fn normalize(artist: &str, title: &str) -> String {
    if artist.trim().is_empty() || title.trim().is_empty() {
        return String::new();
    }
    let mut joined = String::with_capacity(artist.len() + title.len() + 1);
    joined.push_str(artist);
    joined.push(' ');
    joined.push_str(title);
    normalize_text(&joined)
}

/// Key a song is stored and looked up under.
///
/// Falls back to the title alone when the artist carries nothing, so
/// artist-less tracks still match each other on re-import.
pub fn identity_key(artist: &str, title: &str) -> String {
    if normalize_text(artist).is_empty() {
        normalize_text(title)
    } else {
        normalize(artist, title)
    }
}

/// Same reduction as [`normalize`] applied to a single string.
pub fn normalize_text(value: &str) -> String {
    // Composed first: decomposed accents would otherwise be dropped as marks.
    let lower = value.nfc().collect::<String>().to_lowercase();
    let stripped = lower.replace(ORIGINAL_MIX, "");

    let mut out = String::with_capacity(stripped.len());
    let mut pending_space = false;
    for ch in stripped.chars() {
        if ch.is_whitespace() {
            pending_space = !out.is_empty();
        } else if ch.is_alphanumeric() {
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            out.push(ch);
        }
    }
    out
}
