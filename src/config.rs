use serde::Deserialize;
use std::path::PathBuf;

/// Whole-run configuration. Loaded once in `main` and passed down by
/// reference; no component reads configuration from ambient state.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub collection: CollectionConfig,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
    #[serde(default)]
    pub quality: QualityConfig,
    #[serde(default)]
    pub publish: PublishConfig,
    #[serde(default)]
    pub library: LibraryConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub min_confidence: f64,
    pub exclude_keywords: Vec<String>,
    pub source_delay_ms: u64,
    pub stackoverflow: StackOverflowSource,
    pub reddit: RedditSource,
    pub trends: TrendsSource,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            exclude_keywords: ["test", "sample", "example", "dummy"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            source_delay_ms: 1000,
            stackoverflow: StackOverflowSource::default(),
            reddit: RedditSource::default(),
            trends: TrendsSource::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StackOverflowSource {
    pub enabled: bool,
    pub api_key: String,
    pub min_score: i64,
    pub max_results: usize,
}

impl Default for StackOverflowSource {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: String::new(),
            min_score: 5,
            max_results: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedditSource {
    pub enabled: bool,
    pub min_upvotes: i64,
    pub subreddit_sample: usize,
}

impl Default for RedditSource {
    fn default() -> Self {
        Self {
            enabled: true,
            min_upvotes: 5,
            subreddit_sample: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrendsSource {
    pub enabled: bool,
    pub max_candidates: usize,
}

impl Default for TrendsSource {
    fn default() -> Self {
        Self {
            enabled: true,
            max_candidates: 20,
        }
    }
}

/// One bonus step: applies when the metric value is strictly above `above`.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricTier {
    pub above: f64,
    pub bonus: f64,
}

/// Tier table for one provider metric. Tiers are evaluated top-down and the
/// first crossed tier wins, so list them with descending thresholds.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricRule {
    pub metric: String,
    pub tiers: Vec<MetricTier>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub stackoverflow: Vec<MetricRule>,
    pub reddit: Vec<MetricRule>,
    /// Speculative providers carry no engagement metrics; their confidence
    /// is drawn uniformly from this range per run.
    pub trends_confidence: [f64; 2],
}

fn rule(metric: &str, tiers: &[(f64, f64)]) -> MetricRule {
    MetricRule {
        metric: metric.to_string(),
        tiers: tiers
            .iter()
            .map(|&(above, bonus)| MetricTier { above, bonus })
            .collect(),
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            stackoverflow: vec![
                rule("score", &[(10.0, 0.3), (5.0, 0.2), (0.0, 0.1)]),
                rule("view_count", &[(1000.0, 0.2), (500.0, 0.1)]),
                rule("answer_count", &[(2.0, 0.3), (0.0, 0.2)]),
            ],
            reddit: vec![
                rule("upvotes", &[(50.0, 0.4), (20.0, 0.3), (5.0, 0.2)]),
                rule("comments", &[(20.0, 0.3), (10.0, 0.2), (5.0, 0.1)]),
            ],
            trends_confidence: [0.4, 0.8],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    pub max_solutions: usize,
    pub max_citations: usize,
    pub timeout_secs: u64,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            max_solutions: 10,
            max_citations: 15,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 6000,
            temperature: 0.7,
            max_retries: 3,
            retry_delay_secs: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub min_overall_score: f64,
    pub target_length: [usize; 2],
    pub sentence_terminators: String,
    pub connectives: Vec<String>,
    pub technical_terms: Vec<String>,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_overall_score: 70.0,
            target_length: [3000, 5000],
            sentence_terminators: "。！？".to_string(),
            connectives: ["しかし", "ただし", "また", "さらに", "そのため", "つまり", "なお"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            technical_terms: ["API", "SQL", "HTTP", "URL", "OS", "CPU", "RAM"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub site_url: String,
    pub username: String,
    pub app_password: String,
    pub auto_publish: bool,
    pub default_category: String,
    pub default_status: String,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            site_url: String::new(),
            username: String::new(),
            app_password: String::new(),
            auto_publish: true,
            default_category: "トラブルシューティング".to_string(),
            default_status: "publish".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LibraryConfig {
    /// Article storage directory. Defaults to
    /// `$HOME/.local/share/errpress/articles`.
    pub data_dir: Option<String>,
}

fn default_config_path() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")?;
    Ok(PathBuf::from(home).join(".config/errpress/config.toml"))
}

/// Missing file means defaults; a present but malformed file is an error.
pub fn load_config(path: Option<&str>) -> anyhow::Result<Config> {
    let p = match path {
        Some(p) => PathBuf::from(p),
        None => default_config_path()?,
    };
    if !p.exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(&p)?;
    Ok(toml::from_str(&raw)?)
}

/// Treats unset placeholders the way the run-book documents them: empty
/// strings and unexpanded `${VAR}` markers are both "not configured".
pub fn effective_secret(raw: &str) -> Option<&str> {
    let s = raw.trim();
    if s.is_empty() || s.starts_with("${") {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_section() {
        let cfg = Config::default();
        assert_eq!(cfg.discovery.min_confidence, 0.5);
        assert_eq!(cfg.collection.max_solutions, 10);
        assert_eq!(cfg.collection.max_citations, 15);
        assert_eq!(cfg.quality.min_overall_score, 70.0);
        assert_eq!(cfg.quality.target_length, [3000, 5000]);
        assert_eq!(cfg.scoring.trends_confidence, [0.4, 0.8]);
        assert!(cfg.discovery.exclude_keywords.contains(&"test".to_string()));
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let cfg: Config = toml::from_str(
            r#"
[discovery]
min_confidence = 0.7

[quality]
min_overall_score = 80.0
"#,
        )
        .expect("parse partial config");
        assert_eq!(cfg.discovery.min_confidence, 0.7);
        assert_eq!(cfg.quality.min_overall_score, 80.0);
        assert_eq!(cfg.collection.max_solutions, 10);
        assert!(cfg.discovery.stackoverflow.enabled);
    }

    #[test]
    fn secret_placeholders_are_treated_as_unset() {
        assert_eq!(effective_secret("real-key"), Some("real-key"));
        assert_eq!(effective_secret(""), None);
        assert_eq!(effective_secret("${STACKOVERFLOW_KEY}"), None);
    }
}
