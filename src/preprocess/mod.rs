//! Deterministic transcript normalisation.
//!
//! The preprocessor runs before any LLM stage and handles the mechanical
//! parts of dictation so the nondeterministic correction stage never has to:
//!
//! * spoken formatting directives ("new paragraph", "comma", "delete last
//!   word", …) become real punctuation, line breaks and deletions;
//! * user dictionary substitutions are applied (whole-word or stem match).
//!
//! Both passes are idempotent: running them on already-normalised text
//! changes nothing, which lets recorrect re-run the full pipeline safely.

use crate::dictionary::DictionaryEntry;

// ---------------------------------------------------------------------------
// Preprocessor
// ---------------------------------------------------------------------------

/// Directive rewriting plus dictionary substitution for one user.
pub struct Preprocessor {
    entries: Vec<DictionaryEntry>,
}

impl Preprocessor {
    /// Build a preprocessor over the user's dictionary entries.
    pub fn new(entries: Vec<DictionaryEntry>) -> Self {
        Self { entries }
    }

    /// Apply directives, then dictionary substitutions.
    pub fn apply(&self, text: &str) -> String {
        apply_dictionary(&apply_directives(text), &self.entries)
    }
}

// ---------------------------------------------------------------------------
// Lexing (whitespace-preserving)
// ---------------------------------------------------------------------------

/// Separator that followed a word in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sep {
    Space,
    Newline,
    Paragraph,
    End,
}

impl Sep {
    fn as_str(self) -> &'static str {
        match self {
            Sep::Space => " ",
            Sep::Newline => "\n",
            Sep::Paragraph => "\n\n",
            Sep::End => "",
        }
    }
}

/// Split `text` into words with the separator class that followed each one.
/// Line breaks must survive a round trip — re-running the preprocessor on
/// its own output may not collapse paragraphs.
fn lex(text: &str) -> Vec<(String, Sep)> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    let mut newlines = 0usize;

    let mut close_word = |tokens: &mut Vec<(String, Sep)>, word: &mut String| {
        if !word.is_empty() {
            tokens.push((std::mem::take(word), Sep::End));
        }
    };

    for c in text.chars() {
        if c.is_whitespace() {
            if c == '\n' {
                newlines += 1;
            }
            continue_sep(&mut tokens, &mut word, newlines, &mut close_word);
        } else {
            if word.is_empty() {
                newlines = 0;
            }
            word.push(c);
        }
    }
    close_word(&mut tokens, &mut word);
    tokens
}

fn continue_sep(
    tokens: &mut Vec<(String, Sep)>,
    word: &mut String,
    newlines: usize,
    close_word: &mut impl FnMut(&mut Vec<(String, Sep)>, &mut String),
) {
    close_word(tokens, word);
    if let Some(last) = tokens.last_mut() {
        last.1 = match (last.1, newlines) {
            (_, n) if n >= 2 => Sep::Paragraph,
            (Sep::Paragraph, _) => Sep::Paragraph,
            (_, 1) => Sep::Newline,
            (Sep::Newline, _) => Sep::Newline,
            _ => Sep::Space,
        };
    }
}

// ---------------------------------------------------------------------------
// Directive rewriting
// ---------------------------------------------------------------------------

/// Rewrite spoken formatting directives into punctuation, breaks and
/// deletions. Idempotent: directive words are consumed, and the punctuation
/// they produce never matches a directive again.
pub fn apply_directives(text: &str) -> String {
    let tokens = lex(text);
    let lowered: Vec<String> = tokens.iter().map(|(w, _)| w.to_lowercase()).collect();

    // Output words with the separator to place before the next word.
    let mut out: Vec<String> = Vec::with_capacity(tokens.len());
    let mut seps: Vec<Sep> = Vec::with_capacity(tokens.len());
    let mut pending = Sep::Space;

    let mut i = 0usize;
    while i < tokens.len() {
        let word = lowered[i].as_str();
        let next = lowered.get(i + 1).map(String::as_str);
        let next2 = lowered.get(i + 2).map(String::as_str);

        // Two- and three-word directives first.
        match (word, next, next2) {
            ("new", Some("paragraph"), _) => {
                pending = Sep::Paragraph;
                i += 2;
                continue;
            }
            ("new", Some("line"), _) => {
                if pending != Sep::Paragraph {
                    pending = Sep::Newline;
                }
                i += 2;
                continue;
            }
            ("full", Some("stop"), _) => {
                attach(&mut out, &mut pending, '.', tokens[i + 1].1);
                i += 2;
                continue;
            }
            ("question", Some("mark"), _) => {
                attach(&mut out, &mut pending, '?', tokens[i + 1].1);
                i += 2;
                continue;
            }
            ("exclamation", Some("mark" | "point"), _) => {
                attach(&mut out, &mut pending, '!', tokens[i + 1].1);
                i += 2;
                continue;
            }
            ("delete", Some("last"), Some("word")) => {
                if !out.is_empty() {
                    out.pop();
                    seps.pop();
                }
                i += 3;
                continue;
            }
            ("delete", Some("last"), Some("sentence")) => {
                delete_last_sentence(&mut out, &mut seps);
                i += 3;
                continue;
            }
            _ => {}
        }

        // Single-word punctuation directives.
        let punct = match word {
            "period" => Some('.'),
            "comma" => Some(','),
            "colon" => Some(':'),
            "semicolon" => Some(';'),
            _ => None,
        };
        if let Some(p) = punct {
            attach(&mut out, &mut pending, p, tokens[i].1);
            i += 1;
            continue;
        }

        // Ordinary word.
        out.push(tokens[i].0.clone());
        seps.push(pending);
        pending = tokens[i].1;
        i += 1;
    }

    render(&out, &seps)
}

/// Attach a punctuation character to the last emitted word (dropped when
/// there is nothing to attach to). The separator after the directive word
/// becomes the separator before the next word, unless a break is already
/// pending.
fn attach(out: &mut [String], pending: &mut Sep, punct: char, after: Sep) {
    if let Some(last) = out.last_mut() {
        last.push(punct);
    }
    if !matches!(*pending, Sep::Paragraph | Sep::Newline) {
        *pending = after;
    } else if matches!(after, Sep::Paragraph) {
        *pending = Sep::Paragraph;
    }
}

/// Remove trailing words back through the previous sentence boundary.
fn delete_last_sentence(out: &mut Vec<String>, seps: &mut Vec<Sep>) {
    // Always remove at least one word, then keep removing until the last
    // remaining word closes a sentence.
    if out.is_empty() {
        return;
    }
    out.pop();
    seps.pop();
    while let Some(last) = out.last() {
        if last.ends_with(['.', '!', '?']) {
            break;
        }
        out.pop();
        seps.pop();
    }
}

fn render(out: &[String], seps: &[Sep]) -> String {
    let mut rendered = String::new();
    for (idx, word) in out.iter().enumerate() {
        if idx > 0 {
            rendered.push_str(seps[idx].as_str());
        }
        rendered.push_str(word);
    }
    rendered
}

// ---------------------------------------------------------------------------
// Dictionary substitution
// ---------------------------------------------------------------------------

/// Apply `wrong → correct` substitutions word-by-word.
///
/// Matching is case-insensitive; edge punctuation is preserved; a capitalised
/// source word keeps its capitalisation. `match_stem` entries match any word
/// beginning with the wrong form and replace the whole word.
pub fn apply_dictionary(text: &str, entries: &[DictionaryEntry]) -> String {
    if entries.is_empty() {
        return text.to_string();
    }

    let tokens = lex(text);
    let mut out: Vec<String> = Vec::with_capacity(tokens.len());
    let mut seps: Vec<Sep> = Vec::with_capacity(tokens.len());
    let mut pending = Sep::Space;

    for (word, sep) in tokens {
        out.push(substitute_word(&word, entries));
        seps.push(pending);
        pending = sep;
    }
    render(&out, &seps)
}

fn substitute_word(word: &str, entries: &[DictionaryEntry]) -> String {
    let core_start = word.find(|c: char| c.is_alphanumeric()).unwrap_or(word.len());
    let core_end = word
        .rfind(|c: char| c.is_alphanumeric())
        .map(|i| i + word[i..].chars().next().map_or(1, char::len_utf8))
        .unwrap_or(core_start);
    let (prefix, rest) = word.split_at(core_start);
    let (core, suffix) = rest.split_at(core_end - core_start);

    if core.is_empty() {
        return word.to_string();
    }
    let lowered = core.to_lowercase();

    for entry in entries {
        let wrong = entry.wrong.to_lowercase();
        let hit = if entry.match_stem {
            lowered.starts_with(&wrong)
        } else {
            lowered == wrong
        };
        if hit {
            let replacement = match_capitalisation(core, &entry.correct);
            return format!("{prefix}{replacement}{suffix}");
        }
    }
    word.to_string()
}

/// Capitalise the replacement when the source word was capitalised.
fn match_capitalisation(source: &str, replacement: &str) -> String {
    let source_upper = source.chars().next().is_some_and(char::is_uppercase);
    let mut chars = replacement.chars();
    match (source_upper, chars.next()) {
        (true, Some(first)) => first.to_uppercase().collect::<String>() + chars.as_str(),
        _ => replacement.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::DictionaryEntry;

    // --- directives ---

    #[test]
    fn comma_attaches_to_previous_word() {
        assert_eq!(apply_directives("hello comma world"), "hello, world");
    }

    #[test]
    fn period_attaches_and_keeps_flow() {
        assert_eq!(
            apply_directives("the exam was normal period next topic"),
            "the exam was normal. next topic"
        );
    }

    #[test]
    fn full_stop_is_a_period() {
        assert_eq!(apply_directives("done full stop"), "done.");
    }

    #[test]
    fn new_paragraph_inserts_blank_line() {
        assert_eq!(
            apply_directives("first part new paragraph second part"),
            "first part\n\nsecond part"
        );
    }

    #[test]
    fn new_line_inserts_line_break() {
        assert_eq!(apply_directives("one new line two"), "one\ntwo");
    }

    #[test]
    fn question_and_exclamation_marks() {
        assert_eq!(apply_directives("really question mark"), "really?");
        assert_eq!(apply_directives("now exclamation mark"), "now!");
        assert_eq!(apply_directives("now exclamation point"), "now!");
    }

    #[test]
    fn colon_and_semicolon() {
        assert_eq!(apply_directives("findings colon normal"), "findings: normal");
        assert_eq!(apply_directives("one semicolon two"), "one; two");
    }

    #[test]
    fn delete_last_word_removes_preceding_word() {
        assert_eq!(
            apply_directives("take the red delete last word blue pill"),
            "take the blue pill"
        );
    }

    #[test]
    fn delete_last_word_on_empty_output_is_harmless() {
        assert_eq!(apply_directives("delete last word hello"), "hello");
    }

    #[test]
    fn delete_last_sentence_removes_unfinished_sentence() {
        assert_eq!(
            apply_directives("all good period this is wrong delete last sentence"),
            "all good."
        );
    }

    #[test]
    fn directive_at_start_is_dropped() {
        assert_eq!(apply_directives("comma hello"), "hello");
    }

    #[test]
    fn directives_are_case_insensitive() {
        assert_eq!(apply_directives("hello Comma world Period"), "hello, world.");
    }

    #[test]
    fn directive_rewriting_is_idempotent() {
        let raw = "first finding comma stable period new paragraph second finding period";
        let once = apply_directives(raw);
        let twice = apply_directives(&once);
        assert_eq!(once, twice);
        assert_eq!(once, "first finding, stable.\n\nsecond finding.");
    }

    #[test]
    fn already_normalised_text_is_untouched() {
        let text = "Plain text, with punctuation.\n\nAnd a paragraph.";
        assert_eq!(apply_directives(text), text);
    }

    // --- dictionary ---

    fn entries() -> Vec<DictionaryEntry> {
        vec![
            DictionaryEntry::new("hart", "heart"),
            DictionaryEntry {
                match_stem: true,
                ..DictionaryEntry::new("diagnos", "diagnosis")
            },
        ]
    }

    #[test]
    fn whole_word_substitution() {
        assert_eq!(
            apply_dictionary("the hart rate", &entries()),
            "the heart rate"
        );
    }

    #[test]
    fn whole_word_does_not_match_inside_longer_word() {
        assert_eq!(apply_dictionary("harton", &entries()), "harton");
    }

    #[test]
    fn stem_match_replaces_whole_word() {
        assert_eq!(
            apply_dictionary("the diagnostik was clear", &entries()),
            "the diagnosis was clear"
        );
    }

    #[test]
    fn substitution_preserves_edge_punctuation() {
        assert_eq!(apply_dictionary("(hart)", &entries()), "(heart)");
        assert_eq!(apply_dictionary("hart.", &entries()), "heart.");
    }

    #[test]
    fn substitution_preserves_capitalisation() {
        assert_eq!(apply_dictionary("Hart rate", &entries()), "Heart rate");
    }

    #[test]
    fn dictionary_application_is_idempotent() {
        let once = apply_dictionary("hart diagnostik hart.", &entries());
        let twice = apply_dictionary(&once, &entries());
        assert_eq!(once, twice);
    }

    // --- full preprocessor ---

    #[test]
    fn preprocess_runs_directives_then_dictionary() {
        let pre = Preprocessor::new(entries());
        assert_eq!(
            pre.apply("hart rate stable period new paragraph next"),
            "heart rate stable.\n\nnext"
        );
    }

    #[test]
    fn preprocess_is_idempotent() {
        let pre = Preprocessor::new(entries());
        let raw = "hart rate eighty comma regular period new paragraph lungs clear period";
        let once = pre.apply(raw);
        let twice = pre.apply(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn preprocess_no_change_for_clean_text() {
        let pre = Preprocessor::new(Vec::new());
        let text = "Already clean text.\n\nWith paragraphs.";
        assert_eq!(pre.apply(text), text);
    }
}
