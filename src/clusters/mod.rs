//! Thought-cluster spans: parsing, validation, aggregation and coverage.
//!
//! The model annotates article text inline as `text<category:weight,...>`.
//! [`parser`] turns that stream into [`Span`]s, [`validator`] owns the rules a
//! span or tag must satisfy, [`aggregate`] folds spans into per-category
//! weights and [`coverage`] relates tagged spans back to the source text.

pub mod aggregate;
pub mod coverage;
pub mod parser;
pub mod validator;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use aggregate::{ClusterSummary, aggregate, category_share, overall_aggregate, ranked_categories};
pub use coverage::{CoverageStats, coverage, overall_coverage};
pub use parser::{ParseReport, parse_annotations, parse_annotations_with_report};

/// Open-vocabulary category name: non-empty, trimmed.
///
/// New categories can show up in model output at any time, so this is a
/// validated string rather than an enum.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Category(String);

impl Category {
    /// Trims `raw`; `None` when nothing is left.
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Category {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Category::new(&value).ok_or_else(|| "category name must not be empty".to_string())
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        value.0
    }
}

/// A weighted category attached to a span. The weight is always finite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTag")]
pub struct CategoryTag {
    category: Category,
    weight: f64,
}

impl CategoryTag {
    /// `None` if `weight` is NaN or infinite.
    pub fn new(category: Category, weight: f64) -> Option<Self> {
        weight.is_finite().then_some(Self { category, weight })
    }

    pub fn category(&self) -> &Category {
        &self.category
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }
}

// Saved reports written by the first version of the tool used `cluster`.
#[derive(Deserialize)]
struct RawTag {
    #[serde(alias = "cluster")]
    category: Category,
    weight: f64,
}

impl TryFrom<RawTag> for CategoryTag {
    type Error = String;

    fn try_from(raw: RawTag) -> Result<Self, Self::Error> {
        CategoryTag::new(raw.category, raw.weight)
            .ok_or_else(|| format!("weight {} is not finite", raw.weight))
    }
}

/// A contiguous piece of annotated text plus its tags, in order of appearance.
///
/// The parser never produces a span without tags, but other producers may, and
/// such spans are kept as "unannotated".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSpan")]
pub struct Span {
    text: String,
    tags: Vec<CategoryTag>,
}

impl Span {
    /// Trims `text`; `None` when the trimmed text is empty.
    pub fn new(text: &str, tags: Vec<CategoryTag>) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self {
            text: trimmed.to_string(),
            tags,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tags(&self) -> &[CategoryTag] {
        &self.tags
    }

    pub fn is_tagged(&self) -> bool {
        !self.tags.is_empty()
    }

    /// Length of the span text in characters (not bytes).
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

#[derive(Deserialize)]
struct RawSpan {
    text: String,
    #[serde(default, alias = "clusters")]
    tags: Vec<CategoryTag>,
}

impl TryFrom<RawSpan> for Span {
    type Error = String;

    fn try_from(raw: RawSpan) -> Result<Self, Self::Error> {
        Span::new(&raw.text, raw.tags).ok_or_else(|| "span text must not be empty".to_string())
    }
}
