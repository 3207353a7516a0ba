//! Fuzzy name matching.
//!
//! Names scraped from upstream pages rarely match the query exactly: word
//! order differs ("IGNATOVA, Ruja"), middle names appear, punctuation and
//! casing vary. Matching compares token-sorted, lowercased names with a
//! normalised Levenshtein similarity on a 0–100 scale.

/// Similarity a match must reach unless a module overrides it.
pub const DEFAULT_THRESHOLD: u8 = 85;

/// Score the similarity of two names in the range `0.0..=100.0`.
///
/// Case-insensitive and insensitive to token order. Two empty names score
/// 100.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = token_sort_key(a);
    let b = token_sort_key(b);
    strsim::normalized_levenshtein(&a, &b) * 100.0
}

/// Whether `remote_name` is close enough to `local_name` to be the same person.
///
/// # Examples
///
/// ```
/// use crimescrape_search::matching::is_match;
///
/// assert!(is_match("John Doe", "DOE John", 85));
/// assert!(!is_match("John Doe", "Jane Smith", 85));
/// ```
pub fn is_match(local_name: &str, remote_name: &str, threshold: u8) -> bool {
    similarity(local_name, remote_name) >= f64::from(threshold)
}

fn token_sort_key(name: &str) -> String {
    let lowered = name.to_lowercase();
    let mut tokens: Vec<&str> = lowered
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_names_match_at_full_threshold() {
        assert!(is_match("John Doe", "John Doe", 100));
    }

    #[test]
    fn different_people_do_not_match() {
        assert!(!is_match("John Doe", "Jane Smith", DEFAULT_THRESHOLD));
    }

    #[test]
    fn case_is_ignored() {
        assert!(is_match("RUJA IGNATOVA", "Ruja Ignatova", 100));
    }

    #[test]
    fn token_order_is_ignored() {
        assert!(is_match("Ruja Ignatova", "IGNATOVA, Ruja", 100));
    }

    #[test]
    fn small_spelling_variation_matches_default_threshold() {
        assert!(is_match("Jon Doe", "John Doe", DEFAULT_THRESHOLD));
    }

    #[test]
    fn threshold_override_tightens_matching() {
        assert!(is_match("Jon Doe", "John Doe", 80));
        assert!(!is_match("Jon Doe", "John Doe", 95));
    }

    #[test]
    fn zero_threshold_matches_anything() {
        assert!(is_match("a", "zzzz", 0));
    }

    #[test]
    fn similarity_bounds() {
        assert!((similarity("", "") - 100.0).abs() < f64::EPSILON);
        assert!((similarity("abc", "abc") - 100.0).abs() < f64::EPSILON);
        assert!(similarity("abc", "xyz") < 1.0);
    }

    #[test]
    fn extra_whitespace_is_ignored() {
        assert!(is_match("  John   Doe ", "John Doe", 100));
    }
}
