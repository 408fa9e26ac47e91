//! Directory-backed report store.

use cluster_lens::clusters::{aggregate, parse_annotations};
use cluster_lens::pipeline::reduce_overall;
use cluster_lens::reports::{JsonDirReportStore, ReportStore, SavedReport};
use cluster_lens::schemas::{ArticleAnalysis, OverallAnalysis};

fn sample_analysis() -> OverallAnalysis {
    let spans = parse_annotations("Everyone knows this.<false_consensus:0.6,halo_effect:0.2>");
    reduce_overall(vec![ArticleAnalysis {
        article_id: "article_0".into(),
        title: "Consensus".into(),
        url: "https://example.org/consensus".into(),
        cluster_summary: aggregate(&spans),
        spans,
        narrative_summary: "Relies on assumed agreement.".into(),
    }])
}

#[tokio::test]
async fn save_load_list_delete() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonDirReportStore::new(dir.path().join("reports"));
    assert!(store.list().await.unwrap().is_empty());

    let report = SavedReport::new("Consensus study", sample_analysis())
        .unwrap()
        .with_description("first pass")
        .with_tags(["social"]);
    store.save(&report).await.unwrap();

    let loaded = store.load(&report.id).await.unwrap().unwrap();
    assert_eq!(loaded, report);
    assert_eq!(loaded.thought_cluster_analysis.total_articles_analyzed, 1);

    let listed = store.list().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "Consensus study");

    assert!(store.delete(&report.id).await.unwrap());
    assert!(store.load(&report.id).await.unwrap().is_none());
}

#[tokio::test]
async fn list_is_newest_first_and_skips_garbage() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonDirReportStore::new(dir.path());

    let mut older = SavedReport::new("older", OverallAnalysis::default()).unwrap();
    older.created_at -= chrono::Duration::hours(1);
    let newer = SavedReport::new("newer", OverallAnalysis::default()).unwrap();
    store.save(&older).await.unwrap();
    store.save(&newer).await.unwrap();
    std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let names: Vec<String> = store.list().await.unwrap().into_iter().map(|r| r.name).collect();
    assert_eq!(names, vec!["newer", "older"]);
}

#[tokio::test]
async fn legacy_report_file_loads() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonDirReportStore::new(dir.path());
    let legacy = r#"{
        "id": "legacy-1",
        "name": "Old report",
        "originalTopic": "rates",
        "transformedQuery": "interest rates outlook",
        "thoughtClusterAnalysis": {
            "articleAnalyses": [{
                "articleId": "article_0",
                "title": "Rates",
                "url": "https://example.org/rates",
                "spans": [{"text": "Rates will fall.", "clusters": [{"cluster": "anchoring_bias", "weight": 0.4}]}],
                "clusterSummary": {"anchoring_bias": 0.4},
                "biasSummary": "Anchors on last year."
            }],
            "overallClusterSummary": {"anchoring_bias": 0.4},
            "totalArticlesAnalyzed": 1
        },
        "createdAt": "2025-06-01T12:00:00Z"
    }"#;
    std::fs::write(dir.path().join("legacy-1.json"), legacy).unwrap();

    let report = store.load("legacy-1").await.unwrap().unwrap();
    assert_eq!(report.original_topic, "rates");
    assert!(report.tags.is_empty());
    let article = &report.thought_cluster_analysis.article_analyses[0];
    assert_eq!(article.narrative_summary, "Anchors on last year.");
    assert_eq!(article.spans[0].tags()[0].category().as_str(), "anchoring_bias");
}

#[tokio::test]
async fn missing_report_is_none_not_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonDirReportStore::new(dir.path());
    assert!(store.load("nope").await.unwrap().is_none());
    assert!(!store.delete("nope").await.unwrap());
}
