//! Ratio-based string similarity for "did you mean" suggestions.
//!
//! Ratio = 2*M / T where M is the total length of the longest matching
//! blocks (found recursively) and T the combined length of both strings.

/// Suggestion threshold: below this no suggestion is offered.
pub const SUGGESTION_THRESHOLD: f64 = 0.6;

pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let matches = matching_len(&a, &b);
    2.0 * matches as f64 / total as f64
}

fn matching_len(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let (ai, bi, len) = longest_match(a, b);
    if len == 0 {
        return 0;
    }
    len + matching_len(&a[..ai], &b[..bi]) + matching_len(&a[ai + len..], &b[bi + len..])
}

fn longest_match(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut lengths = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        let mut prev = 0;
        for (j, cb) in b.iter().enumerate() {
            let current = lengths[j + 1];
            if ca == cb {
                let len = prev + 1;
                lengths[j + 1] = len;
                if len > best.2 {
                    best = (i + 1 - len, j + 1 - len, len);
                }
            } else {
                lengths[j + 1] = 0;
            }
            prev = current;
        }
    }
    best
}

/// The most similar candidate at or above the threshold, if any.
pub fn best_match<'a, I>(actual: &str, candidates: I, threshold: f64) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(&str, f64)> = None;
    for candidate in candidates {
        let score = ratio(actual, candidate);
        if best.map(|(_, s)| score > s).unwrap_or(true) {
            best = Some((candidate, score));
        }
    }
    best.filter(|(_, score)| *score >= threshold).map(|(c, _)| c)
}
