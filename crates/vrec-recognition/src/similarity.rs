//! Fuzzy string similarity.

/// Scores how well `needle` appears in `haystack`, 0 (unrelated) to 100
/// (contained verbatim).
pub trait SimilarityScorer: Send + Sync {
    fn score(&self, needle: &str, haystack: &str) -> u8;
}

/// Best match of the shorter string against every equal-length window of
/// the longer one, using normalised Levenshtein similarity. Case-sensitive.
#[derive(Debug, Clone, Copy, Default)]
pub struct PartialRatio;

impl SimilarityScorer for PartialRatio {
    fn score(&self, needle: &str, haystack: &str) -> u8 {
        let a: Vec<char> = needle.chars().collect();
        let b: Vec<char> = haystack.chars().collect();
        let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };

        if short.is_empty() {
            return if long.is_empty() { 100 } else { 0 };
        }

        let width = short.len();
        let short: String = short.into_iter().collect();
        let mut best = 0.0f64;
        for start in 0..=(long.len() - width) {
            let window: String = long[start..start + width].iter().collect();
            let similarity = strsim::normalized_levenshtein(&short, &window);
            if similarity > best {
                best = similarity;
                if best >= 1.0 {
                    break;
                }
            }
        }

        (best * 100.0).round() as u8
    }
}
