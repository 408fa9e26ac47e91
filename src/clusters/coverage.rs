//! How much of the source text falls inside tagged spans.

use serde::{Deserialize, Serialize};

use super::Span;

/// Derived coverage counters. Character counts are Unicode scalar values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageStats {
    pub biased_character_count: usize,
    pub total_character_count: usize,
    pub coverage_percentage: f64,
    pub biased_span_count: usize,
    pub total_span_count: usize,
}

impl CoverageStats {
    fn from_counts(biased_chars: usize, total_chars: usize, biased_spans: usize, total_spans: usize) -> Self {
        let coverage_percentage = if total_chars == 0 {
            0.0
        } else {
            100.0 * biased_chars as f64 / total_chars as f64
        };
        Self {
            biased_character_count: biased_chars,
            total_character_count: total_chars,
            coverage_percentage,
            biased_span_count: biased_spans,
            total_span_count: total_spans,
        }
    }
}

/// Coverage of one article.
///
/// `source_len` is the character length of the original article. Without it
/// the total falls back to the summed span lengths, which under-counts any text
/// the parser dropped, so callers wanting a real percentage should pass it.
pub fn coverage(spans: &[Span], source_len: Option<usize>) -> CoverageStats {
    let mut biased_chars = 0;
    let mut biased_spans = 0;
    let mut span_chars = 0;
    for span in spans {
        let len = span.char_len();
        span_chars += len;
        if span.is_tagged() {
            biased_chars += len;
            biased_spans += 1;
        }
    }
    let total_chars = source_len.unwrap_or(span_chars);
    CoverageStats::from_counts(biased_chars, total_chars, biased_spans, spans.len())
}

/// Run-wide coverage: counters summed across articles, percentage recomputed.
pub fn overall_coverage<'a, I>(articles: I) -> CoverageStats
where
    I: IntoIterator<Item = (&'a [Span], Option<usize>)>,
{
    let (mut biased_chars, mut total_chars, mut biased_spans, mut total_spans) = (0, 0, 0, 0);
    for (spans, source_len) in articles {
        let stats = coverage(spans, source_len);
        biased_chars += stats.biased_character_count;
        total_chars += stats.total_character_count;
        biased_spans += stats.biased_span_count;
        total_spans += stats.total_span_count;
    }
    CoverageStats::from_counts(biased_chars, total_chars, biased_spans, total_spans)
}
