//! Single-pass parser for inline cluster annotations.
//!
//! Grammar, repeated any number of times:
//!
//! ```text
//! <text run without '<'> '<' <tag list without '>'> '>'
//! tag list := pair (',' pair)*
//! pair     := category ':' weight
//! ```
//!
//! Text that is never closed by a tag list is noise and is dropped, as are
//! pairs that fail validation. A record survives only if its trimmed text is
//! non-empty and at least one pair parsed.

use super::Span;
use super::validator::{validate_pair, validate_span};

/// Counters describing what the parser kept and threw away.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseReport {
    /// `text<tags>` records found in the input.
    pub matched_records: usize,
    pub emitted_spans: usize,
    /// Records dropped for blank text or no valid pair.
    pub dropped_records: usize,
    /// Individual pairs that failed validation.
    pub dropped_tags: usize,
    /// Characters outside any matched record (trailing text, stray brackets).
    pub unmatched_chars: usize,
}

/// Parse annotated model output into spans, in order of appearance.
pub fn parse_annotations(input: &str) -> Vec<Span> {
    parse_annotations_with_report(input).0
}

/// Same as [`parse_annotations`], also returning the parse counters.
pub fn parse_annotations_with_report(input: &str) -> (Vec<Span>, ParseReport) {
    let mut spans = Vec::new();
    let mut report = ParseReport::default();
    let mut matched_chars = 0usize;
    let mut pos = 0usize;

    while pos < input.len() {
        let Some(open_rel) = input[pos..].find('<') else {
            break;
        };
        if open_rel == 0 {
            // A record needs at least one character of text before '<'.
            pos += 1;
            continue;
        }
        let open = pos + open_rel;
        let tags_start = open + 1;
        let Some(close_rel) = input[tags_start..].find('>') else {
            // No '>' anywhere after this point, so nothing further can match.
            break;
        };
        if close_rel == 0 {
            // "<>" carries no tags; scanning resumes at the '>'.
            pos = tags_start;
            continue;
        }
        let close = tags_start + close_rel;

        report.matched_records += 1;
        matched_chars += input[pos..=close].chars().count();

        let text = &input[pos..open];
        let mut tags = Vec::new();
        for pair in input[tags_start..close].split(',') {
            match validate_pair(pair) {
                Ok(tag) => tags.push(tag),
                Err(reason) => {
                    report.dropped_tags += 1;
                    tracing::trace!("Dropped tag pair {:?}: {:?}", pair, reason);
                }
            }
        }

        match validate_span(text, tags) {
            Some(span) => spans.push(span),
            None => report.dropped_records += 1,
        }

        pos = close + 1;
    }

    report.emitted_spans = spans.len();
    report.unmatched_chars = input.chars().count() - matched_chars;
    (spans, report)
}
