//! Wire shapes shared with report storage and rendering.
//!
//! Field names are camelCase and must stay stable: saved reports are read back
//! with these exact names.

use serde::{Deserialize, Serialize};

use crate::clusters::{ClusterSummary, CoverageStats, Span, coverage, overall_coverage};

/// An article handed over by the retrieval collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceArticle {
    #[serde(default)]
    pub id: String,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl SourceArticle {
    /// Content length in characters.
    pub fn content_chars(&self) -> usize {
        self.content.chars().count()
    }
}

/// Result of analysing one article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleAnalysis {
    pub article_id: String,
    pub title: String,
    pub url: String,
    pub spans: Vec<Span>,
    pub cluster_summary: ClusterSummary,
    #[serde(alias = "biasSummary")]
    pub narrative_summary: String,
}

impl ArticleAnalysis {
    /// Coverage against the original article when it is known.
    pub fn coverage(&self, source: Option<&SourceArticle>) -> CoverageStats {
        coverage(&self.spans, source.map(SourceArticle::content_chars))
    }
}

/// Everything produced by one run, in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallAnalysis {
    pub article_analyses: Vec<ArticleAnalysis>,
    pub overall_cluster_summary: ClusterSummary,
    pub total_articles_analyzed: usize,
}

impl OverallAnalysis {
    /// Run-wide coverage. Each analysis is matched to its source by id, then
    /// by title and url together.
    pub fn coverage(&self, sources: &[SourceArticle]) -> CoverageStats {
        overall_coverage(self.article_analyses.iter().map(|analysis| {
            let source = sources
                .iter()
                .find(|s| s.id == analysis.article_id)
                .or_else(|| {
                    sources
                        .iter()
                        .find(|s| s.title == analysis.title && s.url == analysis.url)
                });
            (
                analysis.spans.as_slice(),
                source.map(SourceArticle::content_chars),
            )
        }))
    }
}

/// Articles returned for a transformed query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    pub query: String,
    pub total_results: usize,
    pub articles: Vec<SourceArticle>,
}

/// Output of a full topic run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicAnalysis {
    pub original_topic: String,
    pub transformed_query: String,
    pub search_results: SearchResults,
    pub thought_cluster_analysis: OverallAnalysis,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clusters::{aggregate, parse_annotations};
    use serde_json::json;

    fn analysis(id: &str, raw: &str) -> ArticleAnalysis {
        let spans = parse_annotations(raw);
        ArticleAnalysis {
            article_id: id.into(),
            title: format!("Title {id}"),
            url: format!("https://example.org/{id}"),
            cluster_summary: aggregate(&spans),
            spans,
            narrative_summary: "summary".into(),
        }
    }

    #[test]
    fn article_analysis_uses_camel_case_names() {
        let value = serde_json::to_value(analysis("article_0", "Claim.<halo_effect:0.5>")).unwrap();
        assert_eq!(value["articleId"], "article_0");
        assert_eq!(value["clusterSummary"], json!({"halo_effect": 0.5}));
        assert_eq!(value["narrativeSummary"], "summary");
        assert_eq!(value["spans"][0]["tags"][0]["category"], "halo_effect");
    }

    #[test]
    fn legacy_report_shape_deserializes() {
        let value = json!({
            "articleAnalyses": [{
                "articleId": "article_3",
                "title": "T",
                "url": "u",
                "spans": [{"text": "Obviously true.", "clusters": [{"cluster": "confirmation_bias", "weight": 0.9}]}],
                "clusterSummary": {"confirmation_bias": 0.9},
                "biasSummary": "Leans on confirmation."
            }],
            "overallClusterSummary": {"confirmation_bias": 0.9},
            "totalArticlesAnalyzed": 1
        });
        let overall: OverallAnalysis = serde_json::from_value(value).unwrap();
        assert_eq!(overall.total_articles_analyzed, 1);
        assert_eq!(overall.article_analyses[0].narrative_summary, "Leans on confirmation.");
    }

    #[test]
    fn overall_coverage_matches_sources() {
        let overall = OverallAnalysis {
            article_analyses: vec![analysis("a1", "0123456789<x:1>")],
            overall_cluster_summary: Default::default(),
            total_articles_analyzed: 1,
        };
        let source = SourceArticle {
            id: "a1".into(),
            title: "Title a1".into(),
            url: "https://example.org/a1".into(),
            content: "c".repeat(40),
            published_date: None,
            author: None,
            score: None,
        };
        let stats = overall.coverage(&[source]);
        assert_eq!(stats.total_character_count, 40);
        assert_eq!(stats.coverage_percentage, 25.0);

        // unknown source falls back to span lengths
        assert_eq!(overall.coverage(&[]).coverage_percentage, 100.0);
    }

    #[test]
    fn shared_title_alone_does_not_pick_a_source() {
        let overall = OverallAnalysis {
            article_analyses: vec![analysis("a1", "0123456789<x:1>")],
            overall_cluster_summary: Default::default(),
            total_articles_analyzed: 1,
        };
        let other = |url: &str, len: usize| SourceArticle {
            id: "different".into(),
            title: "Title a1".into(),
            url: url.into(),
            content: "c".repeat(len),
            published_date: None,
            author: None,
            score: None,
        };

        // same title, different url: no match, span length is the total
        let stats = overall.coverage(&[other("https://example.org/elsewhere", 1000)]);
        assert_eq!(stats.total_character_count, 10);

        // title and url both agree
        let stats = overall.coverage(&[other("https://example.org/a1", 20)]);
        assert_eq!(stats.total_character_count, 20);
        assert_eq!(stats.coverage_percentage, 50.0);
    }
}
