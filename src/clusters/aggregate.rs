//! Weighted category totals at span, article and run level.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::Span;

/// Category name to cumulative weight. Only observed categories are present.
pub type ClusterSummary = BTreeMap<String, f64>;

/// Sum every tag weight per category across `spans`.
///
/// Categories are exact, case-sensitive keys. Untagged spans contribute nothing.
pub fn aggregate(spans: &[Span]) -> ClusterSummary {
    let mut summary = ClusterSummary::new();
    for tag in spans.iter().flat_map(|s| s.tags()) {
        *summary.entry(tag.category().as_str().to_string()).or_insert(0.0) += tag.weight();
    }
    summary
}

/// Fold per-article summaries into one run-wide summary.
pub fn overall_aggregate<'a, I>(per_article: I) -> ClusterSummary
where
    I: IntoIterator<Item = &'a ClusterSummary>,
{
    let mut overall = ClusterSummary::new();
    for summary in per_article {
        for (category, weight) in summary {
            *overall.entry(category.clone()).or_insert(0.0) += weight;
        }
    }
    overall
}

/// Categories sorted by weight descending, ties by name. Read-only view for display.
pub fn ranked_categories(summary: &ClusterSummary, exclude: &[&str]) -> Vec<(String, f64)> {
    let mut ranked: Vec<(String, f64)> = summary
        .iter()
        .filter(|(category, _)| !exclude.contains(&category.as_str()))
        .map(|(category, weight)| (category.clone(), *weight))
        .collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    ranked
}

/// Each category's fraction of the total weight. Empty when the total is zero.
pub fn category_share(summary: &ClusterSummary) -> BTreeMap<String, f64> {
    let total: f64 = summary.values().sum();
    if total == 0.0 {
        return BTreeMap::new();
    }
    summary
        .iter()
        .map(|(category, weight)| (category.clone(), weight / total))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clusters::parse_annotations;

    fn summary(entries: &[(&str, f64)]) -> ClusterSummary {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn sums_weights_per_category() {
        let spans = parse_annotations("s1<a:0.5,b:0.25>s2<a:0.25>s3<a:1,a:1>");
        let result = aggregate(&spans);
        assert_eq!(result, summary(&[("a", 2.75), ("b", 0.25)]));
    }

    #[test]
    fn categories_are_case_sensitive() {
        let spans = parse_annotations("x<Bias:1,bias:2>");
        let result = aggregate(&spans);
        assert_eq!(result.len(), 2);
        assert_eq!(result["Bias"], 1.0);
        assert_eq!(result["bias"], 2.0);
    }

    #[test]
    fn empty_input_gives_empty_summary() {
        assert!(aggregate(&[]).is_empty());
        assert!(overall_aggregate(std::iter::empty()).is_empty());
    }

    #[test]
    fn span_order_does_not_change_totals() {
        let spans = parse_annotations("p<a:0.1,b:0.7>q<c:0.3>r<a:0.45>s<b:0.05,c:0.9>");
        let forward = aggregate(&spans);
        let mut reversed = spans.clone();
        reversed.reverse();
        let mut rotated = spans.clone();
        rotated.rotate_left(2);

        for other in [aggregate(&reversed), aggregate(&rotated)] {
            assert_eq!(forward.len(), other.len());
            for (k, v) in &forward {
                assert!((v - other[k]).abs() < 1e-12, "category {k} differs");
            }
        }
    }

    #[test]
    fn overall_adds_per_article_summaries() {
        let first = summary(&[("a", 1.0), ("b", 2.0)]);
        let second = summary(&[("a", 3.0)]);
        let overall = overall_aggregate([&first, &second]);
        assert_eq!(overall, summary(&[("a", 4.0), ("b", 2.0)]));
    }

    #[test]
    fn ranking_sorts_and_excludes() {
        let s = summary(&[("uncertain", 9.0), ("b", 2.0), ("a", 2.0), ("c", 5.0)]);
        let ranked = ranked_categories(&s, &["uncertain"]);
        let names: Vec<&str> = ranked.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn shares_sum_to_one() {
        let s = summary(&[("a", 1.0), ("b", 3.0)]);
        let shares = category_share(&s);
        assert_eq!(shares["a"], 0.25);
        assert_eq!(shares["b"], 0.75);
        assert!(category_share(&summary(&[("a", 0.0)])).is_empty());
    }
}
