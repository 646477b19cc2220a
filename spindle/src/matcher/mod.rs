//! Track match-key normalization and filename matching.
//!
//! A track's identity for download detection is a normalized key derived from
//! its artists and title: lowercase, NFKD-decomposed, everything except
//! `[a-z0-9_]` and whitespace stripped, runs of whitespace collapsed to single
//! hyphens. Filenames on disk (extension removed) go through the same
//! normalization, and a track counts as downloaded when ANY normalized
//! filename contains the track's key as a substring.
//!
//! Substring containment is deliberately permissive: downloaders decorate
//! names with quality tags and numeric prefixes ("01 - ... (320kbps)"), and
//! containment tolerates all of that. The cost is that an unrelated file
//! whose name happens to contain the key is a false positive, and a track
//! whose key is a substring of another track's key matches the other's file.

use unicode_normalization::UnicodeNormalization;

/// Normalize an arbitrary string into match-key form.
///
/// Idempotent: normalizing a normalized string returns it unchanged.
pub fn normalize(input: &str) -> String {
    let mut scrubbed = String::with_capacity(input.len());
    for c in input.to_lowercase().nfkd() {
        if c.is_ascii_alphanumeric() || c == '_' {
            scrubbed.push(c);
        } else if c.is_whitespace() || c == '-' {
            // Hyphens come back as separators so normalized output re-normalizes
            // to itself.
            scrubbed.push(' ');
        }
        // Everything else (punctuation, combining marks, symbols) is dropped.
    }

    scrubbed.split_whitespace().collect::<Vec<_>>().join("-")
}

/// Derive the match key for a track from its artists and title.
pub fn track_key(artists: &str, name: &str) -> String {
    normalize(&format!("{artists} {name}"))
}

/// Normalize on-disk filenames (extension stripped) into match-key form.
pub fn file_keys<S: AsRef<str>>(filenames: &[S]) -> Vec<String> {
    filenames
        .iter()
        .map(|name| normalize(strip_extension(name.as_ref())))
        .collect()
}

/// Whether a track with `key` is present among normalized filename keys.
pub fn is_downloaded(key: &str, file_keys: &[String]) -> bool {
    !key.is_empty() && file_keys.iter().any(|file_key| file_key.contains(key))
}

fn strip_extension(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => filename,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_basic() {
        assert_eq!(normalize("Karma Police"), "karma-police");
        assert_eq!(normalize("  Karma   Police  "), "karma-police");
    }

    #[test]
    fn test_normalize_strips_punctuation() {
        assert_eq!(normalize("Don't Stop Me Now!"), "dont-stop-me-now");
        assert_eq!(normalize("(feat. MF DOOM)"), "feat-mf-doom");
    }

    #[test]
    fn test_normalize_decomposes_accents() {
        assert_eq!(normalize("Beyoncé"), "beyonce");
        assert_eq!(normalize("Björk — Jóga"), "bjork-joga");
    }

    #[test]
    fn test_normalize_idempotent() {
        let inputs = ["Karma Police", "Beyoncé – Halo", "AC/DC", "  spaced   out "];
        for input in inputs {
            let once = normalize(input);
            let twice = normalize(&once);
            assert_eq!(once, twice, "normalization not idempotent for {input:?}");
        }
    }

    #[test]
    fn test_track_key_joins_artists_and_name() {
        assert_eq!(
            track_key("Radiohead", "Karma Police"),
            "radiohead-karma-police"
        );
    }

    #[test]
    fn test_file_keys_strip_extension() {
        let keys = file_keys(&["Radiohead - Karma Police (320kbps).mp3"]);
        assert_eq!(keys, vec!["radiohead-karma-police-320kbps".to_string()]);
    }

    #[test]
    fn test_is_downloaded_substring_containment() {
        let keys = file_keys(&["radiohead-karma-police-320kbps.mp3"]);
        assert!(is_downloaded("radiohead-karma-police", &keys));
        assert!(!is_downloaded("radiohead-no-surprises", &keys));
    }

    #[test]
    fn test_is_downloaded_tolerates_numeric_prefix() {
        let keys = file_keys(&["01 - Radiohead - Karma Police.flac"]);
        assert!(is_downloaded("radiohead-karma-police", &keys));
    }

    #[test]
    fn test_is_downloaded_known_false_positive() {
        // Documented tradeoff: a key that is a substring of another key
        // matches the other track's file.
        let keys = file_keys(&["the-cure-close-to-me-remix.mp3"]);
        assert!(is_downloaded("the-cure-close-to-me", &keys));
    }

    #[test]
    fn test_empty_key_never_matches() {
        let keys = file_keys(&["anything.mp3"]);
        assert!(!is_downloaded("", &keys));
    }
}
