use crate::config::{effective_secret, SynthesisConfig};
use crate::domain::models::{AggregatedBundle, Article};
use crate::services::PipelineError;
use std::time::Duration;
use tracing::{info, warn};

/// Asks the text-generation service for a full article and normalizes the
/// response. Retries transport failures with exponential backoff; a
/// malformed response body is also retried since the model occasionally
/// wraps its JSON in prose.
pub fn synthesize_article(
    cfg: &SynthesisConfig,
    bundle: &AggregatedBundle,
) -> anyhow::Result<Article> {
    let Some(api_key) = effective_secret(&cfg.api_key) else {
        return Err(PipelineError::SynthesisKeyMissing.into());
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(120))
        .build()?;
    let payload = serde_json::json!({
        "model": cfg.model,
        "max_tokens": cfg.max_tokens,
        "temperature": cfg.temperature,
        "messages": [
            {"role": "system", "content": system_prompt()},
            {"role": "user", "content": user_prompt(bundle)},
        ],
    });

    let mut delay = Duration::from_secs(cfg.retry_delay_secs);
    let mut last_err = anyhow::anyhow!("synthesis not attempted");
    for attempt in 1..=cfg.max_retries.max(1) {
        let result = client
            .post(&cfg.endpoint)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .map_err(anyhow::Error::from)
            .and_then(|resp| Ok(resp.error_for_status()?))
            .and_then(|resp| Ok(resp.json::<serde_json::Value>()?))
            .and_then(|body| parse_article_response(&body));
        match result {
            Ok(article) => {
                info!(attempt, title = %article.title, "article synthesized");
                return Ok(finalize_article(article, bundle));
            }
            Err(e) => {
                warn!(attempt, "synthesis attempt failed: {e}");
                last_err = e;
                if attempt < cfg.max_retries {
                    std::thread::sleep(delay);
                    delay *= 2;
                }
            }
        }
    }
    Err(last_err)
}

fn system_prompt() -> String {
    "あなたは技術系ブログの専門ライターです。エラー解決記事を日本語で執筆します。\
     記事はMarkdownで、H1を1つ、H2を3つ以上、H3を2つ以上、箇条書きとコードブロックを含め、\
     3500文字以上にしてください。出力は次のキーを持つJSONオブジェクトのみ: \
     title, slug, content, excerpt, tags."
        .to_string()
}

fn user_prompt(bundle: &AggregatedBundle) -> String {
    let mut prompt = format!(
        "エラーメッセージ: {}\n\n収集した解決策 ({}件):\n",
        bundle.candidate.raw.text,
        bundle.solutions.len()
    );
    for (i, s) in bundle.solutions.iter().enumerate() {
        prompt.push_str(&format!(
            "{}. {} (信頼度 {:.2})\n",
            i + 1,
            s.description,
            s.reliability
        ));
        for step in s.steps.iter().take(5) {
            prompt.push_str(&format!("   - {step}\n"));
        }
    }
    prompt.push_str("\n参考ソース:\n");
    for c in &bundle.citations {
        prompt.push_str(&format!("- {} ({})\n", c.title, c.url));
    }
    prompt.push_str("\nこの情報をもとに読者が自力で解決できる記事を書いてください。");
    prompt
}

fn parse_article_response(body: &serde_json::Value) -> anyhow::Result<Article> {
    let content = body["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("response carries no message content"))?;
    let json_text = strip_code_fence(content);
    let article: Article = serde_json::from_str(json_text)?;
    if article.content.is_empty() {
        anyhow::bail!("generated article has empty content");
    }
    Ok(article)
}

/// Models love to wrap JSON in ```json fences even when told not to.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

/// Fills the fields the model tends to leave blank and recomputes the
/// character count from the final content.
fn finalize_article(mut article: Article, bundle: &AggregatedBundle) -> Article {
    let error_text = &bundle.candidate.raw.text;

    article.title = optimize_title(&article.title, error_text);
    if article.excerpt.is_empty() {
        article.excerpt = default_excerpt(error_text, bundle.solutions.len());
    }
    article.slug = optimize_slug(&article.slug, error_text);
    article.tags = optimize_tags(article.tags, error_text);
    article.word_count = article.content.chars().count();
    article
}

pub fn optimize_title(title: &str, error_text: &str) -> String {
    let mut title = if title.to_lowercase().contains(&error_text.to_lowercase()) {
        title.to_string()
    } else {
        format!("{error_text}の解決方法【2025年最新版】")
    };
    if title.chars().count() > 60 {
        title = title.chars().take(57).collect::<String>() + "...";
    } else if title.chars().count() < 30 {
        if !title.contains("解決方法") {
            title.push_str("の解決方法");
        }
        if !title.contains("2025") {
            title.push_str("【2025年版】");
        }
    }
    title
}

fn default_excerpt(error_text: &str, solution_count: usize) -> String {
    let mut excerpt = format!("{error_text}のエラーが発生した場合の解決方法を詳しく解説します。");
    if solution_count > 1 {
        excerpt.push_str(&format!("{solution_count}つの効果的な解決策をご紹介。"));
    }
    let lower = error_text.to_lowercase();
    if lower.contains("windows") {
        excerpt.push_str("Windows対応。");
    } else if lower.contains("macos") || lower.contains("mac") {
        excerpt.push_str("macOS対応。");
    } else if lower.contains("linux") {
        excerpt.push_str("Linux対応。");
    }
    if excerpt.chars().count() > 160 {
        excerpt = excerpt.chars().take(157).collect::<String>() + "...";
    }
    excerpt
}

pub fn optimize_slug(slug: &str, error_text: &str) -> String {
    if let Some(keyword) = slug_keyword(error_text) {
        return format!("{keyword}-solution-2025");
    }
    if !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return slug.to_string();
    }
    let safe: String = error_text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                '-'
            }
        })
        .collect();
    let collapsed = safe
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    let head: String = collapsed.chars().take(30).collect();
    format!("{}-solution", head.trim_end_matches('-'))
}

/// Extracts the most slug-worthy keyword: symbolic error names first, hex
/// codes second, exception class names third.
fn slug_keyword(error_text: &str) -> Option<String> {
    for token in error_text.split_whitespace() {
        if token.len() >= 6
            && token.contains('_')
            && token
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
        {
            return Some(token.to_lowercase().replace('_', "-"));
        }
    }
    for token in error_text.split_whitespace() {
        if let Some(hex) = token.strip_prefix("0x") {
            if hex.len() >= 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return Some(format!("0x{}", hex.to_lowercase()));
            }
        }
    }
    error_text
        .split_whitespace()
        .find(|t| t.ends_with("Exception") || t.ends_with("Error"))
        .map(|t| t.to_lowercase())
}

pub fn optimize_tags(existing: Vec<String>, error_text: &str) -> Vec<String> {
    let mut tags = existing;
    let add = |tag: &str, tags: &mut Vec<String>| {
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    };

    add("エラー解決", &mut tags);
    add("トラブルシューティング", &mut tags);

    let lower = error_text.to_lowercase();
    if lower.contains("windows") {
        add("Windows", &mut tags);
    } else if lower.contains("macos") || lower.contains("mac") {
        add("macOS", &mut tags);
    } else if lower.contains("linux") {
        add("Linux", &mut tags);
    }
    if error_text.split_whitespace().any(|t| t.starts_with("0x")) {
        add("エラーコード", &mut tags);
    }

    tags.truncate(10);
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_json_is_unwrapped() {
        let fenced = "```json\n{\"title\":\"t\"}\n```";
        assert_eq!(strip_code_fence(fenced), "{\"title\":\"t\"}");
        assert_eq!(strip_code_fence("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn title_gains_keyword_when_missing() {
        let got = optimize_title("よくあるネットワーク障害まとめ", "ERR_CONNECTION_RESET");
        assert!(got.contains("ERR_CONNECTION_RESET"));
        assert!(got.contains("解決方法"));
    }

    #[test]
    fn overlong_titles_are_truncated() {
        let long = "あ".repeat(80);
        let got = optimize_title(&long, "あ");
        assert_eq!(got.chars().count(), 60);
        assert!(got.ends_with("..."));
    }

    #[test]
    fn slug_prefers_symbolic_error_names() {
        let got = optimize_slug("whatever", "ERROR_ACCESS_DENIED 0x80070005");
        assert_eq!(got, "error-access-denied-solution-2025");
    }

    #[test]
    fn slug_falls_back_to_hex_then_sanitized_text() {
        assert_eq!(
            optimize_slug("", "blue screen 0x0000007B on boot"),
            "0x0000007b-solution-2025"
        );
        assert_eq!(
            optimize_slug("", "npm install hangs forever"),
            "npm-install-hangs-forever-solution"
        );
    }

    #[test]
    fn clean_model_slug_is_kept() {
        assert_eq!(
            optimize_slug("fix-dns-cache", "なにかのエラー"),
            "fix-dns-cache"
        );
    }

    #[test]
    fn base_tags_are_added_without_duplicates() {
        let tags = optimize_tags(
            vec!["エラー解決".to_string()],
            "ERROR_DISK_FULL 0x80070070 windows",
        );
        assert_eq!(
            tags.iter().filter(|t| t.as_str() == "エラー解決").count(),
            1
        );
        assert!(tags.iter().any(|t| t == "Windows"));
        assert!(tags.iter().any(|t| t == "エラーコード"));
        assert!(tags.len() <= 10);
    }
}
