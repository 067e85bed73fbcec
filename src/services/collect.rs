use crate::config::CollectionConfig;
use crate::domain::models::{CitationKind, SolutionFragment, SourceCitation};
use std::time::Duration;
use tracing::{info, warn};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Gathers solution fragments and citations for one chosen error from the
/// community Q&A API and the vendor documentation search. Each source
/// failure degrades to an empty contribution; the caller receives whatever
/// could be collected.
pub fn collect_solutions(
    cfg: &CollectionConfig,
    error_text: &str,
) -> (Vec<SolutionFragment>, Vec<SourceCitation>) {
    let mut solutions = Vec::new();
    let mut citations = Vec::new();

    match search_vendor_docs(cfg, error_text) {
        Ok((mut s, mut c)) => {
            info!(solutions = s.len(), citations = c.len(), "vendor docs results");
            solutions.append(&mut s);
            citations.append(&mut c);
        }
        Err(e) => warn!("vendor docs search failed: {e}"),
    }

    match search_answer_threads(cfg, error_text) {
        Ok((mut s, mut c)) => {
            info!(solutions = s.len(), citations = c.len(), "answer thread results");
            solutions.append(&mut s);
            citations.append(&mut c);
        }
        Err(e) => warn!("answer thread search failed: {e}"),
    }

    (solutions, citations)
}

fn http_client(cfg: &CollectionConfig) -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(cfg.timeout_secs))
        .build()?)
}

/// Vendor documentation search. Official material gets full reliability.
fn search_vendor_docs(
    cfg: &CollectionConfig,
    error_text: &str,
) -> anyhow::Result<(Vec<SolutionFragment>, Vec<SourceCitation>)> {
    let client = http_client(cfg)?;
    let resp = client
        .get("https://learn.microsoft.com/api/search")
        .query(&[
            ("search", error_text),
            ("locale", "en-us"),
            ("$top", "5"),
        ])
        .send()?
        .error_for_status()?;
    let body: serde_json::Value = resp.json()?;

    let mut solutions = Vec::new();
    let mut citations = Vec::new();
    for result in body["results"].as_array().into_iter().flatten() {
        let title = result["title"].as_str().unwrap_or_default().to_string();
        let url = result["url"].as_str().unwrap_or_default().to_string();
        let description = result["description"].as_str().unwrap_or_default();
        if title.is_empty() || url.is_empty() {
            continue;
        }
        if description.chars().count() > 100 {
            solutions.push(SolutionFragment {
                description: format!("Official documentation: {title}"),
                steps: vec![description.to_string()],
                reliability: 0.8,
                source_url: url.clone(),
                source_title: title.clone(),
            });
        }
        citations.push(SourceCitation {
            title,
            url,
            kind: CitationKind::Official,
            reliability: 1.0,
        });
    }
    Ok((solutions, citations))
}

/// Answered community questions. Answer reliability grows with the answer
/// score but never beyond the community ceiling of 0.9.
fn search_answer_threads(
    cfg: &CollectionConfig,
    error_text: &str,
) -> anyhow::Result<(Vec<SolutionFragment>, Vec<SourceCitation>)> {
    let client = http_client(cfg)?;
    let resp = client
        .get("https://api.stackexchange.com/2.3/search/advanced")
        .query(&[
            ("order", "desc"),
            ("sort", "votes"),
            ("q", error_text),
            ("site", "stackoverflow"),
            ("pagesize", "10"),
            ("filter", "withbody"),
            ("accepted", "True"),
        ])
        .send()?
        .error_for_status()?;
    let body: serde_json::Value = resp.json()?;

    let mut solutions = Vec::new();
    let mut citations = Vec::new();
    for (n, item) in body["items"].as_array().into_iter().flatten().enumerate() {
        let question_title = item["title"].as_str().unwrap_or_default().to_string();
        let question_url = item["link"].as_str().unwrap_or_default().to_string();
        citations.push(SourceCitation {
            title: question_title.clone(),
            url: question_url.clone(),
            kind: CitationKind::Community,
            reliability: 0.8,
        });

        // Answer fetches are the expensive part; three threads are plenty.
        if n >= 3 {
            continue;
        }
        let Some(question_id) = item["question_id"].as_u64() else {
            continue;
        };
        match fetch_answers(&client, question_id) {
            Ok(answers) => {
                for answer in answers {
                    let score = answer["score"].as_i64().unwrap_or(0);
                    let accepted = answer["is_accepted"].as_bool().unwrap_or(false);
                    if !accepted && score <= 5 {
                        continue;
                    }
                    solutions.push(SolutionFragment {
                        description: format!("Community answer (score {score})"),
                        steps: extract_steps(answer["body"].as_str().unwrap_or_default()),
                        reliability: (0.5 + score as f64 * 0.05).min(0.9),
                        source_url: question_url.clone(),
                        source_title: question_title.clone(),
                    });
                }
            }
            Err(e) => warn!(question_id, "answer fetch failed: {e}"),
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    Ok((solutions, citations))
}

fn fetch_answers(
    client: &reqwest::blocking::Client,
    question_id: u64,
) -> anyhow::Result<Vec<serde_json::Value>> {
    let url = format!("https://api.stackexchange.com/2.3/questions/{question_id}/answers");
    let resp = client
        .get(&url)
        .query(&[
            ("order", "desc"),
            ("sort", "votes"),
            ("site", "stackoverflow"),
            ("filter", "withbody"),
        ])
        .send()?
        .error_for_status()?;
    let body: serde_json::Value = resp.json()?;
    Ok(body["items"]
        .as_array()
        .map(|a| a.iter().take(3).cloned().collect())
        .unwrap_or_default())
}

/// Turns an HTML answer body into a flat list of actionable steps: code
/// blocks first, then list items, then short plain paragraphs. Capped at 10.
pub fn extract_steps(html: &str) -> Vec<String> {
    let mut steps = Vec::new();

    for code in extract_tag_texts(html, "code") {
        if !code.is_empty() {
            steps.push(format!("command: {code}"));
        }
    }
    for item in extract_tag_texts(html, "li") {
        if !item.is_empty() && item.chars().count() < 200 {
            steps.push(item);
        }
    }
    for paragraph in extract_tag_texts(html, "p") {
        let len = paragraph.chars().count();
        if len > 20 && len < 200 {
            steps.push(paragraph);
        }
    }

    steps.truncate(10);
    steps
}

/// Collects the stripped inner text of every `<tag>...</tag>` pair. Good
/// enough for API-provided answer bodies; this is not a general HTML parser.
fn extract_tag_texts(html: &str, tag: &str) -> Vec<String> {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let mut out = Vec::new();
    let mut rest = html;
    while let Some(start) = rest.find(&open) {
        let after_open = &rest[start..];
        let Some(tag_end) = after_open.find('>') else {
            break;
        };
        let inner_start = &after_open[tag_end + 1..];
        let Some(end) = inner_start.find(&close) else {
            break;
        };
        out.push(strip_tags(&inner_start[..end]).trim().to_string());
        rest = &inner_start[end + close.len()..];
    }
    out
}

fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}
