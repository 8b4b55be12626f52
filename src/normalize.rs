//! Location alias normalisation.
//!
//! UTF-8 validate → Unicode NFD decomposition → drop Mark-Nonspacing
//! characters → NFC recomposition → lowercase. Two strings that differ only
//! by case or diacritics normalise to the same alias key.

use crate::errors::AppError;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Normalise a user-supplied location string into its alias key.
///
/// `input` must already be valid UTF-8 (it is, as `&str`) — the
/// `InvalidInput` path exists for callers that decode from raw bytes before
/// reaching this function.
pub fn normalize(input: &str) -> String {
    let decomposed: String = input.nfd().filter(|c| !is_combining_mark(*c)).collect();
    decomposed.nfc().collect::<String>().to_lowercase()
}

/// Normalise raw bytes, failing with `InvalidInput` if they are not valid UTF-8.
pub fn normalize_bytes(input: &[u8]) -> Result<String, AppError> {
    let s = std::str::from_utf8(input)
        .map_err(|_| AppError::InvalidInput("location input is not valid UTF-8".to_string()))?;
    Ok(normalize(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercases() {
        assert_eq!(normalize("Wroclaw"), "wroclaw");
    }

    #[test]
    fn test_strips_diacritics() {
        assert_eq!(normalize("Wrocław"), "wroclaw");
    }

    #[test]
    fn test_case_and_diacritics_converge() {
        assert_eq!(normalize("WROCLAW"), normalize("Wrocław"));
    }

    #[test]
    fn test_handles_multiple_combining_marks() {
        // e + combining acute + combining grave should still fold to "e"
        let s = "e\u{0301}\u{0300}";
        assert_eq!(normalize(s), "e");
    }

    #[test]
    fn test_preserves_non_latin_without_marks() {
        assert_eq!(normalize("東京"), "東京");
    }

    #[test]
    fn test_normalize_bytes_valid_utf8() {
        assert_eq!(normalize_bytes("Zürich".as_bytes()).unwrap(), "zurich");
    }

    #[test]
    fn test_normalize_bytes_invalid_utf8() {
        let invalid = vec![0xff, 0xfe, 0xfd];
        let err = normalize_bytes(&invalid).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }
}
