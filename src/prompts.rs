//! Prompt text for the annotation, summary and query-rewrite calls.

use crate::clusters::{ClusterSummary, Span, ranked_categories};

/// Default system instruction for thought-cluster annotation.
pub const ANNOTATION_SYSTEM_PROMPT: &str = r#"You annotate articles with the cognitive biases present in their reasoning.

Reproduce the article text in order. After each passage that shows a bias, append a tag list
in angle brackets listing one or more categories with a weight between 0 and 1:

    The new policy has clearly worked everywhere it was tried.<survivorship_bias:0.7,confirmation_bias:0.4>

Rules:
- Use only `category:weight` pairs separated by commas inside the brackets.
- Weights are decimal numbers; higher means the bias is stronger in that passage.
- Never use the characters < or > anywhere else in your output.
- Passages without a bias may be left untagged.
- Prefer these categories: confirmation_bias, anchoring_bias, availability_heuristic,
  survivorship_bias, sunk_cost_fallacy, halo_effect, false_consensus, planning_fallacy,
  attribution_error, recency_bias, selection_bias. Use `uncertain` when a passage is biased
  but fits none of them. New snake_case category names are allowed when clearly warranted.
"#;

pub const SUMMARY_SYSTEM_PROMPT: &str = "You are an expert in cognitive bias analysis. Provide clear, concise summaries of bias patterns found in articles.";

pub const QUERY_SYSTEM_PROMPT: &str = "You are a research assistant that transforms user topics into comprehensive search queries for cognitive analysis.";

/// Spans are shown to the summary model cut to this many characters.
const EXCERPT_CHARS: usize = 100;

/// User message for annotating one article.
pub fn annotation_user_prompt(title: &str, content: &str) -> String {
    format!(
        "Please analyze the following article and provide introspective thought-cluster tags according to your system prompt:\n\n\"{}\"\n\n{}",
        title, content
    )
}

/// User message asking for a 2-3 sentence narrative of the biases in one article.
pub fn summary_user_prompt(title: &str, spans: &[Span], summary: &ClusterSummary) -> String {
    let weights = ranked_categories(summary, &[])
        .into_iter()
        .map(|(category, weight)| format!("{}: {:.2}", category, weight))
        .collect::<Vec<_>>()
        .join("\n");

    let details = spans
        .iter()
        .map(|span| {
            let tags = span
                .tags()
                .iter()
                .map(|t| format!("{} ({})", t.category(), t.weight()))
                .collect::<Vec<_>>()
                .join(", ");
            format!("\"{}\" - {}", excerpt(span.text(), EXCERPT_CHARS), tags)
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Based on the cognitive bias analysis below, provide a concise summary (2-3 sentences) of the main biases found in this article titled \"{title}\".

Focus on:
- The most prevalent biases (by weight)
- How these biases might affect the credibility or interpretation of the article
- Be specific but concise

Bias Analysis:
{weights}

Detailed spans:
{details}

Provide only the summary, no additional commentary."
    )
}

/// User message rewriting a topic into a search query.
pub fn query_user_prompt(topic: &str) -> String {
    format!(
        "You are a research assistant specializing in cognitive landscape analysis.
Transform the following user topic into a comprehensive search query that will help gather diverse perspectives and in-depth information for cognitive analysis.

The search query should:
- Capture multiple angles and perspectives on the topic
- Include relevant academic, practical, and theoretical viewpoints
- Be specific enough to find high-quality sources
- Consider both current developments and foundational concepts

User topic: \"{topic}\"

Return only the transformed search query, nothing else."
    )
}

/// First `max` characters of `text`, with `...` appended when cut.
pub fn excerpt(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
