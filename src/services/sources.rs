use crate::config::{effective_secret, Config, DiscoveryConfig};
use crate::domain::models::{Provider, RawCandidate};
use chrono::{Datelike, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, warn};

const USER_AGENT: &str = "errpress/0.4 (error discovery)";

const ERROR_KEYWORDS: &[&str] = &[
    "error", "exception", "failed", "cannot", "unable", "issue", "bug", "problem", "crash",
    "timeout", "denied", "not found", "invalid", "unexpected", "fatal", "critical", "warning",
];

const SEARCH_TAGS: &[&str] = &[
    "windows", "macos", "linux", "ubuntu", "debian", "centos", "python", "javascript", "java",
    "c#", "php", "node.js", "typescript", "html", "css", "react", "angular", "vue.js", "nginx",
    "apache", "mysql", "postgresql", "mongodb", "redis", "sqlite", "docker", "kubernetes", "aws",
    "azure", "gcp", "git",
];

const SUBREDDITS: &[&str] = &[
    "techsupport", "pcmasterrace", "buildapc", "sysadmin", "windows", "MacOS", "linux", "Ubuntu",
    "debian", "programming", "learnprogramming", "Python", "javascript", "webdev", "docker",
    "kubernetes", "aws", "devops", "selfhosted", "mysql", "PostgreSQL", "mongodb", "node",
];

/// Queries every enabled provider in turn, pausing between providers so
/// none of them sees burst traffic. A provider failure degrades to zero
/// candidates from that provider, never to a pipeline error.
pub fn discover_all(cfg: &Config, rng: &mut impl Rng) -> Vec<RawCandidate> {
    let d = &cfg.discovery;
    let mut out = Vec::new();
    let delay = Duration::from_millis(d.source_delay_ms);

    if d.stackoverflow.enabled {
        match search_stackoverflow(d, rng) {
            Ok(mut found) => {
                info!(count = found.len(), "stackoverflow candidates");
                out.append(&mut found);
            }
            Err(e) => warn!("stackoverflow search failed: {e}"),
        }
        std::thread::sleep(delay);
    }

    if d.reddit.enabled {
        match search_reddit(d, rng) {
            Ok(mut found) => {
                info!(count = found.len(), "reddit candidates");
                out.append(&mut found);
            }
            Err(e) => warn!("reddit search failed: {e}"),
        }
        std::thread::sleep(delay);
    }

    if d.trends.enabled {
        let mut found = trend_candidates(d, rng);
        info!(count = found.len(), "trend candidates");
        out.append(&mut found);
    }

    out
}

fn http_client(timeout_secs: u64) -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

fn metric_map(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
    pairs.iter().map(|&(k, v)| (k.to_string(), v)).collect()
}

fn search_stackoverflow(
    d: &DiscoveryConfig,
    rng: &mut impl Rng,
) -> anyhow::Result<Vec<RawCandidate>> {
    let client = http_client(30)?;
    let api_key = effective_secret(&d.stackoverflow.api_key);
    let keyword_count = rng.gen_range(3..=5);
    let keywords: Vec<&str> = ERROR_KEYWORDS
        .choose_multiple(rng, keyword_count)
        .copied()
        .collect();
    let tag_count = rng.gen_range(5..=8);
    let tags: Vec<String> = SEARCH_TAGS
        .choose_multiple(rng, tag_count)
        .map(|t| t.to_string())
        .collect();

    let mut out = Vec::new();
    for keyword in keywords {
        let request = if let Some(key) = api_key {
            client
                .get("https://api.stackexchange.com/2.3/search/advanced")
                .query(&[
                    ("order", "desc"),
                    ("sort", "votes"),
                    ("q", keyword),
                    ("tagged", tags.join(";").as_str()),
                    ("site", "stackoverflow"),
                    ("pagesize", d.stackoverflow.max_results.min(30).to_string().as_str()),
                    (
                        "min_score",
                        (d.stackoverflow.min_score - 2).max(1).to_string().as_str(),
                    ),
                    ("key", key),
                ])
        } else {
            // Keyless quota is much smaller, so keep the request simple.
            client
                .get("https://api.stackexchange.com/2.3/search")
                .query(&[
                    ("order", "desc"),
                    ("sort", "activity"),
                    ("intitle", keyword),
                    ("site", "stackoverflow"),
                    ("pagesize", "15"),
                ])
        };

        let resp = match request.send() {
            Ok(r) => r,
            Err(e) => {
                warn!(keyword, "stackoverflow request failed: {e}");
                continue;
            }
        };
        if !resp.status().is_success() {
            warn!(keyword, status = %resp.status(), "stackoverflow request rejected");
            continue;
        }
        let body: serde_json::Value = resp.json()?;
        for item in body["items"].as_array().into_iter().flatten() {
            let title = item["title"].as_str().unwrap_or_default();
            let Some(text) = extract_error_text(title) else {
                continue;
            };
            out.push(RawCandidate {
                text,
                provider: Provider::Stackoverflow,
                metrics: metric_map(&[
                    ("score", item["score"].as_f64().unwrap_or(0.0)),
                    ("view_count", item["view_count"].as_f64().unwrap_or(0.0)),
                    ("answer_count", item["answer_count"].as_f64().unwrap_or(0.0)),
                ]),
                source_url: item["link"].as_str().unwrap_or_default().to_string(),
                title: title.to_string(),
                discovered_at: Utc::now(),
            });
        }
        std::thread::sleep(Duration::from_millis(if api_key.is_some() {
            100
        } else {
            300
        }));
    }
    Ok(out)
}

/// Pulls the most error-looking title fragment out of a question title.
pub fn extract_error_text(title: &str) -> Option<String> {
    if let Some(code) = find_hex_code(title) {
        // Keep the symbolic name next to the code when one precedes it.
        let prefix = title[..title.find(&code).unwrap_or(0)]
            .split_whitespace()
            .last()
            .filter(|t| is_symbolic_error_token(t));
        return Some(match prefix {
            Some(p) => format!("{p} {code}"),
            None => code,
        });
    }

    if let Some(token) = title
        .split_whitespace()
        .find(|t| is_symbolic_error_token(t) || t.ends_with("Exception") || t.ends_with("Error"))
    {
        return Some(token.trim_matches(|c: char| !c.is_alphanumeric() && c != '_').to_string());
    }

    for prefix in ["Failed", "failed", "Cannot", "cannot", "Unable to", "unable to"] {
        if let Some(pos) = title.find(prefix) {
            let tail = title[pos..].trim();
            if tail.chars().count() >= 10 {
                return Some(tail.to_string());
            }
        }
    }

    if title.chars().count() < 100 && !title.is_empty() {
        return Some(title.to_string());
    }
    None
}

fn is_symbolic_error_token(token: &str) -> bool {
    token.len() >= 6
        && token.contains('_')
        && token
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

fn find_hex_code(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    for i in 0..bytes.len().saturating_sub(9) {
        if bytes[i] == b'0'
            && bytes[i + 1] == b'x'
            && bytes[i + 2..i + 10].iter().all(u8::is_ascii_hexdigit)
        {
            return Some(String::from_utf8_lossy(&bytes[i..i + 10]).into_owned());
        }
    }
    None
}

fn search_reddit(d: &DiscoveryConfig, rng: &mut impl Rng) -> anyhow::Result<Vec<RawCandidate>> {
    let client = http_client(10)?;
    let subreddits: Vec<&str> = SUBREDDITS
        .choose_multiple(rng, d.reddit.subreddit_sample.clamp(1, SUBREDDITS.len()))
        .copied()
        .collect();

    let mut out = Vec::new();
    for subreddit in subreddits {
        let keyword = ERROR_KEYWORDS.choose(rng).copied().unwrap_or("error");
        let url = format!("https://www.reddit.com/r/{subreddit}/search.json");
        let resp = match client
            .get(&url)
            .query(&[
                ("q", keyword),
                ("restrict_sr", "true"),
                ("sort", "top"),
                ("limit", "10"),
            ])
            .send()
        {
            Ok(r) => r,
            Err(e) => {
                warn!(subreddit, "reddit request failed: {e}");
                continue;
            }
        };
        if !resp.status().is_success() {
            warn!(subreddit, status = %resp.status(), "reddit request rejected");
            continue;
        }
        let body: serde_json::Value = resp.json()?;
        for post in body["data"]["children"].as_array().into_iter().flatten() {
            let data = &post["data"];
            let ups = data["ups"].as_f64().unwrap_or(0.0);
            if ups < d.reddit.min_upvotes as f64 || !is_error_related(data) {
                continue;
            }
            let title = data["title"].as_str().unwrap_or_default();
            let text: String = title.chars().take(100).collect();
            if text.is_empty() {
                continue;
            }
            out.push(RawCandidate {
                text,
                provider: Provider::Reddit,
                metrics: metric_map(&[
                    ("upvotes", ups),
                    ("comments", data["num_comments"].as_f64().unwrap_or(0.0)),
                ]),
                source_url: format!(
                    "https://reddit.com{}",
                    data["permalink"].as_str().unwrap_or_default()
                ),
                title: title.to_string(),
                discovered_at: Utc::now(),
            });
        }
        std::thread::sleep(Duration::from_secs(1));
    }
    Ok(out)
}

fn is_error_related(post: &serde_json::Value) -> bool {
    let title = post["title"].as_str().unwrap_or_default().to_lowercase();
    let flair = post["link_flair_text"]
        .as_str()
        .unwrap_or_default()
        .to_lowercase();
    [
        "error",
        "problem",
        "issue",
        "help",
        "failed",
        "crash",
        "not working",
        "broken",
        "bug",
        "trouble",
    ]
    .iter()
    .any(|k| title.contains(k) || flair.contains(k))
}

struct TrendCategory {
    name: &'static str,
    patterns: &'static [&'static str],
    /// Months in which this category historically spikes.
    peak_months: &'static [u32],
}

const TREND_CATALOG: &[TrendCategory] = &[
    TrendCategory {
        name: "windows",
        patterns: &[
            "ERROR_ACCESS_DENIED 0x80070005",
            "ERROR_SHARING_VIOLATION 0x80070020",
            "ERROR_DISK_FULL 0x80070070",
            "ERROR_INVALID_PARAMETER 0x80070057",
            "CRITICAL_PROCESS_DIED 0x000000EF",
            "IRQL_NOT_LESS_OR_EQUAL 0x0000000A",
            "PAGE_FAULT_IN_NONPAGED_AREA 0x00000050",
            "MEMORY_MANAGEMENT 0x0000001A",
        ],
        peak_months: &[1, 2, 12],
    },
    TrendCategory {
        name: "macos",
        patterns: &[
            "Kernel Panic com.apple.kext",
            "CoreData Migration Failed",
            "Keychain Access Denied",
            "Time Machine Backup Error",
            "macOS Update Installation Failed",
        ],
        peak_months: &[9, 10],
    },
    TrendCategory {
        name: "linux",
        patterns: &[
            "segmentation fault core dumped",
            "No space left on device",
            "Failed to start systemd service",
            "Unable to locate package apt",
            "Connection refused ssh",
            "Input/output error mount",
        ],
        peak_months: &[],
    },
    TrendCategory {
        name: "programming",
        patterns: &[
            "ModuleNotFoundError Python pip",
            "NullPointerException Java Runtime",
            "Cannot read property undefined",
            "CORS policy blocked request",
            "SSL certificate verify failed",
            "Stack overflow recursion limit",
        ],
        peak_months: &[],
    },
    TrendCategory {
        name: "web_server",
        patterns: &[
            "502 Bad Gateway nginx",
            "504 Gateway Timeout error",
            "500 Internal Server Error",
            "401 Unauthorized JWT token",
            "429 Too Many Requests rate limit",
            "Connection reset by peer",
        ],
        peak_months: &[11, 12],
    },
    TrendCategory {
        name: "database",
        patterns: &[
            "MySQL connection refused 3306",
            "PostgreSQL authentication failed",
            "MongoDB connection timeout",
            "Redis NOAUTH Authentication required",
            "SQLite database locked",
            "Elasticsearch cluster unavailable",
        ],
        peak_months: &[],
    },
];

/// Synthetic provider: no API behind it, only a curated catalog of error
/// patterns with seasonal weighting. These candidates are speculative by
/// construction; the scorer treats them accordingly.
fn trend_candidates(d: &DiscoveryConfig, rng: &mut impl Rng) -> Vec<RawCandidate> {
    let month = Utc::now().month();
    let mut picked = Vec::new();

    for category in TREND_CATALOG {
        let weight = if category.peak_months.contains(&month) {
            1.2
        } else {
            1.0
        };
        let take = rng.gen_range(1..=3.min(category.patterns.len()));
        for pattern in category.patterns.choose_multiple(rng, take) {
            let base_volume = rng.gen_range(500..=2000) as f64;
            picked.push(RawCandidate {
                text: pattern.to_string(),
                provider: Provider::Trends,
                metrics: metric_map(&[("search_volume", (base_volume * weight).round())]),
                source_url: String::new(),
                title: format!("{} ({})", pattern, category.name),
                discovered_at: Utc::now(),
            });
        }
    }

    picked.shuffle(rng);
    picked.truncate(d.trends.max_candidates);
    picked
}
