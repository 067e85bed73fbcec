use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Serialize)]
pub struct JsonOut<T: Serialize> {
    pub ok: bool,
    pub data: T,
}

#[derive(Serialize)]
pub struct JsonErr {
    pub ok: bool,
    pub error: ErrBody,
}

#[derive(Serialize)]
pub struct ErrBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Stackoverflow,
    Reddit,
    Trends,
    Manual,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Stackoverflow => "stackoverflow",
            Provider::Reddit => "reddit",
            Provider::Trends => "trends",
            Provider::Manual => "manual",
        }
    }
}

/// One provider-native discovery record. Metrics are a flat name→value map
/// so the scorer can stay generic across providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCandidate {
    pub text: String,
    pub provider: Provider,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub title: String,
    pub discovered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    #[serde(flatten)]
    pub raw: RawCandidate,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectionResult {
    pub candidate: ScoredCandidate,
    pub provider: Provider,
    /// 0-indexed rank inside the selection window (0 = highest confidence).
    pub rank: usize,
    pub window_len: usize,
    pub pool_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolutionFragment {
    pub description: String,
    #[serde(default)]
    pub steps: Vec<String>,
    pub reliability: f64,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub source_title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CitationKind {
    Official,
    Community,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceCitation {
    pub title: String,
    pub url: String,
    pub kind: CitationKind,
    pub reliability: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BundleStats {
    pub total_solutions: usize,
    pub unique_citations: usize,
    pub mean_reliability: f64,
}

/// Everything collected for one chosen candidate, ready for synthesis.
/// Built once by the aggregator and never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct AggregatedBundle {
    pub candidate: ScoredCandidate,
    pub solutions: Vec<SolutionFragment>,
    pub citations: Vec<SourceCitation>,
    pub stats: BundleStats,
}

/// Article shape as returned by the synthesis collaborator. Every field is
/// defaulted so the quality gate can treat malformed input as empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Article {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub word_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityIssue {
    pub message: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubScore {
    pub score: u32,
    pub max_score: u32,
    pub issues: Vec<QualityIssue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub sub_scores: BTreeMap<String, SubScore>,
    pub overall_score: f64,
    pub passed: bool,
    pub issues: Vec<QualityIssue>,
}

impl QualityReport {
    pub fn high_issue_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::High)
            .count()
    }
}

#[derive(Serialize)]
pub struct RunReport {
    pub status: String,
    pub error_message: Option<String>,
    pub article_title: Option<String>,
    pub article_directory: Option<String>,
    pub overall_score: Option<f64>,
    pub published_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LibraryEntry {
    pub number: u32,
    pub directory_name: String,
    pub title: String,
    pub error_message: String,
    pub created_at: String,
    pub word_count: usize,
    pub published_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleMetadata {
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub excerpt: String,
    pub word_count: usize,
    pub created_at: DateTime<Utc>,
    pub error_message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishResult {
    pub post_id: u64,
    pub url: String,
    pub status: String,
    pub slug: String,
    pub published_at: String,
}
