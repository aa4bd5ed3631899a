//! Cleanup of raw model replies.
//!
//! Models echo sentinel delimiters, prepend chatty preambles ("Here is the
//! corrected text:") and add markdown despite instructions. Every reply that
//! flows back into the pipeline goes through [`clean_model_output`] first.

use crate::llm::prompt::{sentinel_close, sentinel_open};

/// Lowercased preamble prefixes models like to prepend. A first line that
/// starts with one of these (and the preamble alone on that line) is dropped.
const PREAMBLE_PREFIXES: &[&str] = &[
    "here is the corrected text",
    "here's the corrected text",
    "here is the merged text",
    "here's the merged text",
    "here is the text",
    "corrected text",
    "corrected version",
    "merged text",
    "corrected",
    "sure",
];

// ---------------------------------------------------------------------------
// clean_model_output
// ---------------------------------------------------------------------------

/// Strip echoed sentinels, known preambles, and markdown from a model reply.
///
/// ```
/// use dictation_pipeline::llm::clean_model_output;
///
/// let raw = "Here is the corrected text:\n**The patient** was seen today.";
/// assert_eq!(clean_model_output(raw), "The patient was seen today.");
/// ```
pub fn clean_model_output(raw: &str) -> String {
    let without_sentinels = strip_sentinels(raw);
    let without_preamble = strip_preamble(&without_sentinels);
    strip_markdown(&without_preamble).trim().to_string()
}

/// Remove sentinel delimiter lines and any inline occurrences, tolerating
/// replies that echo them back partially or with surrounding text.
fn strip_sentinels(text: &str) -> String {
    let open = sentinel_open();
    let close = sentinel_close();
    text.lines()
        .filter(|line| {
            let trimmed = line.trim();
            trimmed != open && trimmed != close
        })
        .map(|line| line.replace(&open, "").replace(&close, ""))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Drop a chatty first line like "Here is the corrected text:".
fn strip_preamble(text: &str) -> String {
    let mut lines = text.trim_start().splitn(2, '\n');
    let first = lines.next().unwrap_or("");
    let rest = lines.next();

    let lowered = first.trim().trim_end_matches(':').trim().to_lowercase();
    let is_preamble = PREAMBLE_PREFIXES
        .iter()
        .any(|prefix| lowered == *prefix || (lowered.starts_with(prefix) && first.trim().ends_with(':')));

    match (is_preamble, rest) {
        (true, Some(rest)) => rest.to_string(),
        // A reply that is nothing but a preamble line cleans to empty.
        (true, None) => String::new(),
        _ => text.to_string(),
    }
}

/// Remove markdown the model may emit: code fences, emphasis markers,
/// heading hashes. Conservative on purpose — dictated text itself never
/// contains these.
fn strip_markdown(text: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") {
            continue;
        }
        let line = if trimmed.starts_with('#') {
            let stripped = trimmed.trim_start_matches('#');
            stripped.trim_start().to_string()
        } else {
            line.to_string()
        };
        out.push(line.replace("**", "").replace("__", ""));
    }
    out.join("\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
