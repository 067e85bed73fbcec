use crate::config::PublishConfig;
use crate::domain::models::{Article, PublishResult};
use crate::services::PipelineError;
use std::time::Duration;
use tracing::{info, warn};

/// Publishes an article through the WordPress REST API: verifies the
/// connection, resolves category and tag IDs (creating missing terms), then
/// creates the post. The caller decides whether publishing happens at all;
/// this client never inspects quality reports.
pub fn publish_article(cfg: &PublishConfig, article: &Article) -> anyhow::Result<PublishResult> {
    if cfg.site_url.is_empty() || cfg.username.is_empty() || cfg.app_password.is_empty() {
        return Err(PipelineError::PublisherNotConfigured.into());
    }
    let site = cfg.site_url.trim_end_matches('/');
    let api_base = format!("{site}/wp-json/wp/v2");
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(60))
        .build()?;

    test_connection(&client, cfg, &api_base)?;

    let category_ids = vec![get_or_create_term(
        &client,
        cfg,
        &format!("{api_base}/categories"),
        &cfg.default_category,
    )?];
    let mut tag_ids = Vec::new();
    for tag in &article.tags {
        match get_or_create_term(&client, cfg, &format!("{api_base}/tags"), tag) {
            Ok(id) => tag_ids.push(id),
            Err(e) => warn!(tag, "tag resolution failed: {e}"),
        }
    }

    let payload = serde_json::json!({
        "title": article.title,
        "slug": article.slug,
        "content": article.content,
        "excerpt": article.excerpt,
        "status": cfg.default_status,
        "categories": category_ids,
        "tags": tag_ids,
    });
    let resp = client
        .post(format!("{api_base}/posts"))
        .basic_auth(&cfg.username, Some(&cfg.app_password))
        .json(&payload)
        .send()?
        .error_for_status()?;
    let body: serde_json::Value = resp.json()?;

    let result = PublishResult {
        post_id: body["id"].as_u64().unwrap_or(0),
        url: body["link"].as_str().unwrap_or_default().to_string(),
        status: body["status"].as_str().unwrap_or_default().to_string(),
        slug: body["slug"].as_str().unwrap_or_default().to_string(),
        published_at: body["date"].as_str().unwrap_or_default().to_string(),
    };
    info!(post_id = result.post_id, url = %result.url, "article published");
    Ok(result)
}

fn test_connection(
    client: &reqwest::blocking::Client,
    cfg: &PublishConfig,
    api_base: &str,
) -> anyhow::Result<()> {
    client
        .get(api_base)
        .basic_auth(&cfg.username, Some(&cfg.app_password))
        .send()?
        .error_for_status()?;
    Ok(())
}

fn get_or_create_term(
    client: &reqwest::blocking::Client,
    cfg: &PublishConfig,
    endpoint: &str,
    name: &str,
) -> anyhow::Result<u64> {
    let found: serde_json::Value = client
        .get(endpoint)
        .basic_auth(&cfg.username, Some(&cfg.app_password))
        .query(&[("search", name)])
        .send()?
        .error_for_status()?
        .json()?;
    if let Some(term) = found
        .as_array()
        .into_iter()
        .flatten()
        .find(|t| t["name"].as_str() == Some(name))
    {
        if let Some(id) = term["id"].as_u64() {
            return Ok(id);
        }
    }

    let created: serde_json::Value = client
        .post(endpoint)
        .basic_auth(&cfg.username, Some(&cfg.app_password))
        .json(&serde_json::json!({ "name": name }))
        .send()?
        .error_for_status()?
        .json()?;
    created["id"]
        .as_u64()
        .ok_or_else(|| anyhow::anyhow!("term creation returned no id for {name}"))
}
