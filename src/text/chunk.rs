//! Sentence-boundary splitting and provider-limit chunking.
//!
//! LLM providers impose an input budget (characters for cloud endpoints,
//! tokens for local ones). [`chunk_sentences`] packs whole sentences into
//! chunks that stay under the budget — a chunk never ends mid-sentence,
//! never inside a numeric date like `12.05.2024`, and never directly after a
//! recognised abbreviation's trailing period.
//!
//! [`join_chunks`] is the inverse used after per-chunk correction: chunks are
//! rejoined with a paragraph break and redundant whitespace is collapsed.

use crate::text::collapse_whitespace;

/// Dotted tokens whose trailing period does not end a sentence.
const ABBREVIATIONS: &[&str] = &[
    "dr", "mr", "mrs", "ms", "prof", "st", "jr", "sr", "vs", "etc", "approx",
    "no", "fig", "cf", "al", "e.g", "i.e", "resp", "dept", "vol",
];

// ---------------------------------------------------------------------------
// Sentence splitting
// ---------------------------------------------------------------------------

/// Split `text` into sentences, keeping terminal punctuation attached.
///
/// A sentence boundary is a run of `.`, `!` or `?` followed by whitespace or
/// end of input, except when the period belongs to an abbreviation, an
/// initial (single letter), or a number-internal position (`3.5`,
/// `12.05.2024` never contain whitespace, so they are untouched by
/// construction). Line breaks inside a sentence are preserved verbatim.
pub fn split_sentences(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut sentences = Vec::new();
    let mut start = 0usize;

    let mut i = 0usize;
    while i < chars.len() {
        let c = chars[i];
        if c == '.' || c == '!' || c == '?' {
            // Absorb a punctuation run ("..." or "?!").
            let mut end = i;
            while end + 1 < chars.len() && matches!(chars[end + 1], '.' | '!' | '?') {
                end += 1;
            }
            let at_boundary =
                end + 1 >= chars.len() || chars[end + 1].is_whitespace();

            if at_boundary && !(c == '.' && ends_with_abbreviation(&chars[..i])) {
                let sentence: String = chars[start..=end].iter().collect();
                let trimmed = sentence.trim();
                if !trimmed.is_empty() {
                    sentences.push(trimmed.to_string());
                }
                start = end + 1;
            }
            i = end + 1;
        } else {
            i += 1;
        }
    }

    let tail: String = chars[start..].iter().collect();
    let tail = tail.trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }

    sentences
}

/// Does the text ending at the period position finish with an abbreviation
/// or a single-letter initial?
fn ends_with_abbreviation(before_period: &[char]) -> bool {
    // Walk back to the start of the dotted token preceding the period.
    let mut token_start = before_period.len();
    while token_start > 0 && !before_period[token_start - 1].is_whitespace() {
        token_start -= 1;
    }
    let token: String = before_period[token_start..].iter().collect();
    let token = token
        .trim_matches(|c: char| !c.is_alphanumeric() && c != '.')
        .trim_end_matches('.')
        .to_lowercase();

    if token.is_empty() {
        return false;
    }
    // Single alphabetic letter → an initial ("J. Smith").
    if token.len() == 1 && token.chars().all(|c| c.is_alphabetic()) {
        return true;
    }
    ABBREVIATIONS.contains(&token.as_str())
}

// ---------------------------------------------------------------------------
// Chunking
// ---------------------------------------------------------------------------

/// Pack `text` into chunks of at most `max_chars`, splitting only at
/// sentence boundaries.
///
/// Paragraph breaks (blank lines) are preserved inside a chunk. A single
/// sentence longer than the budget — dictations do produce them — is split
/// at word boundaries as a last resort so no chunk ever exceeds the budget.
///
/// Non-empty input always produces at least one chunk.
pub fn chunk_sentences(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    let push_unit = |chunks: &mut Vec<String>, current: &mut String, unit: &str, sep: &str| {
        let extra = if current.is_empty() { 0 } else { sep.len() };
        if !current.is_empty() && current.len() + extra + unit.len() > max_chars {
            chunks.push(std::mem::take(current));
        }
        if !current.is_empty() {
            current.push_str(sep);
        }
        current.push_str(unit);
    };

    for (pi, paragraph) in text.split("\n\n").enumerate() {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        let sep_first = if pi == 0 { " " } else { "\n\n" };
        for (si, sentence) in split_sentences(paragraph).into_iter().enumerate() {
            let sep = if si == 0 { sep_first } else { " " };
            if sentence.len() > max_chars {
                // Oversized sentence: fall back to word-boundary splits.
                for piece in split_words(&sentence, max_chars) {
                    push_unit(&mut chunks, &mut current, &piece, sep);
                }
            } else {
                push_unit(&mut chunks, &mut current, &sentence, sep);
            }
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Split an oversized sentence at word boundaries into pieces ≤ `max_chars`.
fn split_words(sentence: &str, max_chars: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut piece = String::new();
    for word in sentence.split_whitespace() {
        if !piece.is_empty() && piece.len() + 1 + word.len() > max_chars {
            pieces.push(std::mem::take(&mut piece));
        }
        if !piece.is_empty() {
            piece.push(' ');
        }
        piece.push_str(word);
    }
    if !piece.is_empty() {
        pieces.push(piece);
    }
    pieces
}

/// Rejoin corrected chunks with a paragraph break and collapse redundant
/// whitespace. Intentional blank-line separators inside chunks survive.
pub fn join_chunks(chunks: &[String]) -> String {
    collapse_whitespace(&chunks.join("\n\n"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // --- split_sentences ---

    #[test]
    fn splits_simple_sentences() {
        let s = split_sentences("First sentence. Second sentence. Third.");
        assert_eq!(s, vec!["First sentence.", "Second sentence.", "Third."]);
    }

    #[test]
    fn keeps_question_and_exclamation() {
        let s = split_sentences("Really? Yes! Good.");
        assert_eq!(s, vec!["Really?", "Yes!", "Good."]);
    }

    #[test]
    fn does_not_split_after_abbreviation() {
        let s = split_sentences("Dr. Smith examined the patient. All fine.");
        assert_eq!(s, vec!["Dr. Smith examined the patient.", "All fine."]);
    }

    #[test]
    fn does_not_split_after_initial() {
        let s = split_sentences("Seen by J. Smith today.");
        assert_eq!(s, vec!["Seen by J. Smith today."]);
    }

    #[test]
    fn does_not_split_inside_numeric_date() {
        let s = split_sentences("Surgery on 12.05.2024 went well. Discharged.");
        assert_eq!(s, vec!["Surgery on 12.05.2024 went well.", "Discharged."]);
    }

    #[test]
    fn does_not_split_inside_decimal() {
        let s = split_sentences("Dose is 2.5 mg daily. Review in a week.");
        assert_eq!(s, vec!["Dose is 2.5 mg daily.", "Review in a week."]);
    }

    #[test]
    fn sentence_ending_in_number_still_splits() {
        let s = split_sentences("Heart rate 80. Blood pressure normal.");
        assert_eq!(s, vec!["Heart rate 80.", "Blood pressure normal."]);
    }

    #[test]
    fn ellipsis_is_one_boundary() {
        let s = split_sentences("Well... maybe. Fine.");
        assert_eq!(s, vec!["Well...", "maybe.", "Fine."]);
    }

    #[test]
    fn unterminated_tail_is_kept() {
        let s = split_sentences("Complete sentence. trailing fragment");
        assert_eq!(s, vec!["Complete sentence.", "trailing fragment"]);
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(split_sentences("").is_empty());
        assert!(split_sentences("   \n ").is_empty());
    }

    // --- chunk_sentences ---

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = chunk_sentences("One sentence. Another one.", 1_000);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], "One sentence. Another one.");
    }

    #[test]
    fn splits_only_at_sentence_boundaries() {
        let text = "Alpha beta gamma. Delta epsilon zeta. Eta theta iota.";
        let chunks = chunk_sentences(text, 40);
        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.len() <= 40, "chunk too long: {chunk:?}");
            assert!(
                chunk.ends_with('.'),
                "chunk must end at a sentence boundary: {chunk:?}"
            );
        }
    }

    #[test]
    fn oversized_input_splits_into_multiple_chunks() {
        // 45 000 chars against a 40 000 budget must produce at least two
        // chunks, each ending at a sentence boundary.
        let sentence = "The patient tolerated the procedure well and was monitored. ";
        let text: String = sentence.repeat(750); // 60 chars * 750 = 45 000
        let chunks = chunk_sentences(&text, 40_000);
        assert!(chunks.len() >= 2, "expected >=2 chunks, got {}", chunks.len());
        for chunk in &chunks {
            assert!(chunk.len() <= 40_000);
            assert!(chunk.ends_with("monitored."));
        }
    }

    #[test]
    fn single_oversized_sentence_falls_back_to_word_splits() {
        let long = "word ".repeat(100).trim().to_string();
        let chunks = chunk_sentences(&long, 30);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() <= 30);
            // Word boundaries only — no split inside "word".
            assert!(chunk.split_whitespace().all(|word| word == "word"));
        }
    }

    #[test]
    fn paragraph_breaks_survive_within_a_chunk() {
        let text = "First paragraph here.\n\nSecond paragraph here.";
        let chunks = chunk_sentences(text, 1_000);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("\n\n"));
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunk_sentences("", 100).is_empty());
    }

    // --- join_chunks ---

    #[test]
    fn join_uses_at_most_one_blank_line() {
        let joined = join_chunks(&["First part.".to_string(), "Second part.".to_string()]);
        assert_eq!(joined, "First part.\n\nSecond part.");
    }

    #[test]
    fn join_collapses_redundant_whitespace() {
        let joined = join_chunks(&["A  sentence.\n\n\n".to_string(), "  More.".to_string()]);
        assert_eq!(joined, "A sentence.\n\nMore.");
    }

    #[test]
    fn chunk_then_join_is_identity_modulo_whitespace() {
        let text = "One sentence here. Another sentence there.\n\nNew paragraph sentence.";
        let chunks = chunk_sentences(text, 10_000);
        let rejoined = join_chunks(&chunks);
        assert_eq!(rejoined, crate::text::collapse_whitespace(text));
    }
}
