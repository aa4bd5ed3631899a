//! Change scoring and the similarity guard metrics.
//!
//! [`change_score`] quantifies how much a text changed between two pipeline
//! stages on a 0–100 scale. It is computed over words, so pure whitespace or
//! paragraph reflow scores 0 while genuine lexical edits are captured.
//!
//! [`jaccard_similarity`] and [`length_ratio`] back the terminology
//! corrector's guard against runaway rewrites from smaller models.

use crate::text::words;

// ---------------------------------------------------------------------------
// Change score
// ---------------------------------------------------------------------------

/// Normalised 0–100 measure of how much `after` differs from `before`.
///
/// * `change_score(x, x) == 0` for any `x`.
/// * `change_score("", x) == 100` for non-empty `x` (and vice versa).
/// * Whitespace-only changes score 0.
///
/// The metric is the word-level edit distance divided by the longer word
/// count, rounded to the nearest integer percent.
///
/// ```
/// use dictation_pipeline::text::change_score;
///
/// assert_eq!(change_score("heart rate 80", "heart rate 80"), 0);
/// assert_eq!(change_score("", "anything"), 100);
/// ```
pub fn change_score(before: &str, after: &str) -> u8 {
    let a = words(before);
    let b = words(after);

    if a.is_empty() && b.is_empty() {
        return 0;
    }
    if a.is_empty() || b.is_empty() {
        return 100;
    }

    let distance = edit_distance(&a, &b);
    let longest = a.len().max(b.len());
    let score = (distance as f64 / longest as f64 * 100.0).round() as u64;
    score.min(100) as u8
}

/// Word-level Levenshtein distance, two-row formulation.
fn edit_distance(a: &[&str], b: &[&str]) -> usize {
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr: Vec<usize> = vec![0; b.len() + 1];

    for (i, wa) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, wb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(wa != wb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

// ---------------------------------------------------------------------------
// Similarity guard metrics
// ---------------------------------------------------------------------------

/// Jaccard similarity of the lowercased word sets of two texts, in [0, 1].
///
/// Word edges are stripped of punctuation so "well." and "well" count as the
/// same word. Two empty texts are identical (1.0); one empty side shares
/// nothing (0.0).
pub fn jaccard_similarity(a: &str, b: &str) -> f32 {
    let set_a = word_set(a);
    let set_b = word_set(b);

    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }

    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f32 / union as f32
}

fn word_set(text: &str) -> std::collections::HashSet<String> {
    text.split_whitespace()
        .map(|word| {
            word.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|word| !word.is_empty())
        .collect()
}

/// Character-length ratio `output / input` over whitespace-trimmed lengths.
///
/// Returns 1.0 when both are empty and `f32::INFINITY` when only the input
/// is — both outside any sane guard window, which is what the guard wants.
pub fn length_ratio(input: &str, output: &str) -> f32 {
    let input_len = input.trim().chars().count();
    let output_len = output.trim().chars().count();
    if input_len == 0 {
        return if output_len == 0 { 1.0 } else { f32::INFINITY };
    }
    output_len as f32 / input_len as f32
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // --- change_score ---

    #[test]
    fn identical_texts_score_zero() {
        assert_eq!(change_score("the patient is stable", "the patient is stable"), 0);
    }

    #[test]
    fn empty_versus_text_scores_maximum() {
        assert_eq!(change_score("", "some new text"), 100);
        assert_eq!(change_score("some old text", ""), 100);
    }

    #[test]
    fn both_empty_score_zero() {
        assert_eq!(change_score("", ""), 0);
    }

    #[test]
    fn whitespace_reflow_scores_zero() {
        let before = "one two three four";
        let after = "one  two\nthree\n\nfour";
        assert_eq!(change_score(before, after), 0);
    }

    #[test]
    fn single_word_change_in_four_scores_twenty_five() {
        assert_eq!(change_score("a b c d", "a b c x"), 25);
    }

    #[test]
    fn complete_rewrite_scores_one_hundred() {
        assert_eq!(change_score("alpha beta", "gamma delta"), 100);
    }

    #[test]
    fn score_never_exceeds_one_hundred() {
        // Longer output than input: distance ≤ max(len) keeps this ≤ 100.
        assert!(change_score("a", "x y z w v") <= 100);
    }

    // --- jaccard_similarity ---

    #[test]
    fn identical_word_sets_have_similarity_one() {
        assert!((jaccard_similarity("heart rate", "heart rate") - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn jaccard_ignores_case_and_edge_punctuation() {
        assert!((jaccard_similarity("Well. Done", "well done") - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn disjoint_sets_have_similarity_zero() {
        assert!(jaccard_similarity("alpha beta", "gamma delta") < f32::EPSILON);
    }

    #[test]
    fn half_overlap_is_one_third() {
        // {a, b} vs {b, c}: intersection 1, union 3.
        let sim = jaccard_similarity("a b", "b c");
        assert!((sim - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn empty_sides() {
        assert!((jaccard_similarity("", "") - 1.0).abs() < f32::EPSILON);
        assert!(jaccard_similarity("", "text") < f32::EPSILON);
    }

    // --- length_ratio ---

    #[test]
    fn equal_lengths_ratio_one() {
        assert!((length_ratio("abcd", "wxyz") - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn doubled_output_ratio_two() {
        assert!((length_ratio("abcd", "abcdabcd") - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn empty_input_with_output_is_infinite() {
        assert!(length_ratio("", "text").is_infinite());
    }
}
