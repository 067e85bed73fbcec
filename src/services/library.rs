use crate::config::LibraryConfig;
use crate::domain::models::{
    AggregatedBundle, Article, ArticleMetadata, LibraryEntry, PublishResult, QualityReport,
};
use crate::services::PipelineError;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub fn articles_dir(cfg: &LibraryConfig) -> anyhow::Result<PathBuf> {
    if let Some(dir) = &cfg.data_dir {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME")?;
    Ok(PathBuf::from(home)
        .join(".local")
        .join("share")
        .join("errpress")
        .join("articles"))
}

fn history_path(base: &Path) -> PathBuf {
    base.join("history.jsonl")
}

fn text_digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.trim().to_lowercase().as_bytes());
    hex::encode(hasher.finalize())
}

/// Directory-name-safe rendition of an error message: keeps ASCII
/// alphanumerics, `-` and `_`, collapses the rest, caps at 50 characters.
pub fn sanitize_error_name(text: &str) -> String {
    let mapped: String = text
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let collapsed = mapped
        .split('_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    let trimmed: String = collapsed.chars().take(50).collect();
    let trimmed = trimmed.trim_matches('_').to_string();
    if trimmed.is_empty() {
        "UNKNOWN_ERROR".to_string()
    } else {
        trimmed
    }
}

/// History predicate for the candidate filter: a text counts as processed
/// when its digest appears in the history log or an article directory
/// already carries its sanitized name.
pub fn is_already_processed(base: &Path, text: &str) -> bool {
    let digest = text_digest(text);
    if let Ok(raw) = std::fs::read_to_string(history_path(base)) {
        for line in raw.lines() {
            if let Ok(entry) = serde_json::from_str::<serde_json::Value>(line) {
                if entry["digest"].as_str() == Some(digest.as_str()) {
                    return true;
                }
            }
        }
    }

    let sanitized = sanitize_error_name(text);
    let Ok(entries) = std::fs::read_dir(base) else {
        return false;
    };
    for entry in entries.flatten() {
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if let Some((_, error_part)) = name.split_once('_') {
            if error_part == sanitized {
                debug!(text, directory = %name, "error already processed");
                return true;
            }
        }
    }
    false
}

fn record_processed(base: &Path, text: &str) -> anyhow::Result<()> {
    let event = serde_json::json!({
        "ts": Utc::now().to_rfc3339(),
        "digest": text_digest(text),
        "text": text,
    });
    let line = format!("{event}\n");
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(history_path(base))
        .and_then(|mut f| std::io::Write::write_all(&mut f, line.as_bytes()))?;
    Ok(())
}

pub fn next_article_number(base: &Path) -> u32 {
    let Ok(entries) = std::fs::read_dir(base) else {
        return 1;
    };
    let mut max = 0;
    for entry in entries.flatten() {
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if let Some((number, _)) = name.split_once('_') {
            if number.len() == 4 {
                if let Ok(n) = number.parse::<u32>() {
                    max = max.max(n);
                }
            }
        }
    }
    max + 1
}

pub fn create_article_directory(base: &Path, error_text: &str) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(base)?;
    let number = next_article_number(base);
    let dir = base.join(format!("{number:04}_{}", sanitize_error_name(error_text)));
    std::fs::create_dir_all(&dir)?;
    info!(directory = %dir.display(), "created article directory");
    Ok(dir)
}

pub fn save_run_artifacts(
    article_dir: &Path,
    article: &Article,
    bundle: &AggregatedBundle,
    quality: Option<&QualityReport>,
) -> anyhow::Result<()> {
    std::fs::write(article_dir.join("article.md"), &article.content)?;

    let metadata = ArticleMetadata {
        title: article.title.clone(),
        slug: article.slug.clone(),
        tags: article.tags.clone(),
        excerpt: article.excerpt.clone(),
        word_count: article.word_count,
        created_at: Utc::now(),
        error_message: bundle.candidate.raw.text.clone(),
    };
    std::fs::write(
        article_dir.join("metadata.json"),
        serde_json::to_string_pretty(&metadata)?,
    )?;
    std::fs::write(
        article_dir.join("sources.json"),
        serde_json::to_string_pretty(bundle)?,
    )?;
    if let Some(report) = quality {
        std::fs::write(
            article_dir.join("quality.json"),
            serde_json::to_string_pretty(report)?,
        )?;
    }

    if let Some(base) = article_dir.parent() {
        record_processed(base, &bundle.candidate.raw.text)?;
    }
    info!(directory = %article_dir.display(), "saved run artifacts");
    Ok(())
}

pub fn save_publish_result(article_dir: &Path, result: &PublishResult) -> anyhow::Result<()> {
    std::fs::write(
        article_dir.join("publish_result.json"),
        serde_json::to_string_pretty(result)?,
    )?;
    Ok(())
}

pub fn list_articles(base: &Path) -> anyhow::Result<Vec<LibraryEntry>> {
    let mut out = Vec::new();
    let Ok(entries) = std::fs::read_dir(base) else {
        return Ok(out);
    };
    let mut dirs: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
    dirs.sort();
    for dir in dirs {
        if !dir.is_dir() {
            continue;
        }
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let Some((number, _)) = name.split_once('_') else {
            continue;
        };
        let Ok(number) = number.parse::<u32>() else {
            continue;
        };
        let metadata: Option<ArticleMetadata> = std::fs::read_to_string(dir.join("metadata.json"))
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok());
        let publish: Option<PublishResult> =
            std::fs::read_to_string(dir.join("publish_result.json"))
                .ok()
                .and_then(|raw| serde_json::from_str(&raw).ok());
        let (title, error_message, created_at, word_count) = match metadata {
            Some(m) => (m.title, m.error_message, m.created_at.to_rfc3339(), m.word_count),
            None => (String::new(), String::new(), String::new(), 0),
        };
        out.push(LibraryEntry {
            number,
            directory_name: name,
            title,
            error_message,
            created_at,
            word_count,
            published_url: publish.map(|p| p.url).unwrap_or_default(),
        });
    }
    Ok(out)
}

pub fn show_article(base: &Path, number: u32) -> anyhow::Result<serde_json::Value> {
    let Ok(entries) = std::fs::read_dir(base) else {
        return Err(PipelineError::ArticleNotFound(number).into());
    };
    let prefix = format!("{number:04}_");
    let dir = entries
        .flatten()
        .map(|e| e.path())
        .find(|p| {
            p.is_dir()
                && p.file_name()
                    .map(|n| n.to_string_lossy().starts_with(&prefix))
                    .unwrap_or(false)
        })
        .ok_or(PipelineError::ArticleNotFound(number))?;

    let mut data = serde_json::Map::new();
    data.insert(
        "directory".to_string(),
        serde_json::Value::String(dir.display().to_string()),
    );
    for (key, file) in [
        ("metadata", "metadata.json"),
        ("quality", "quality.json"),
        ("publish_result", "publish_result.json"),
    ] {
        if let Ok(raw) = std::fs::read_to_string(dir.join(file)) {
            if let Ok(value) = serde_json::from_str(&raw) {
                data.insert(key.to_string(), value);
            }
        }
    }
    if let Ok(content) = std::fs::read_to_string(dir.join("article.md")) {
        data.insert("content".to_string(), serde_json::Value::String(content));
    }
    Ok(serde_json::Value::Object(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitization_keeps_safe_characters_only() {
        assert_eq!(
            sanitize_error_name("ERROR_ACCESS_DENIED 0x80070005"),
            "ERROR_ACCESS_DENIED_0x80070005"
        );
        assert_eq!(sanitize_error_name("502 Bad Gateway: nginx!"), "502_Bad_Gateway_nginx");
        assert_eq!(sanitize_error_name("日本語のみのエラー"), "UNKNOWN_ERROR");
        assert!(sanitize_error_name(&"x y ".repeat(100)).chars().count() <= 50);
    }

    #[test]
    fn numbering_starts_at_one_and_increments() {
        let tmp = tempfile::tempdir().expect("tempdir");
        assert_eq!(next_article_number(tmp.path()), 1);
        std::fs::create_dir(tmp.path().join("0001_FIRST_ERROR")).unwrap();
        std::fs::create_dir(tmp.path().join("0007_LATER_ERROR")).unwrap();
        assert_eq!(next_article_number(tmp.path()), 8);
    }

    #[test]
    fn history_digest_matches_exact_text() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let base = tmp.path();
        std::fs::create_dir_all(base).unwrap();
        record_processed(base, "ERR_CONNECTION_RESET").unwrap();
        assert!(is_already_processed(base, "ERR_CONNECTION_RESET"));
        assert!(is_already_processed(base, "  err_connection_reset  "));
        assert!(!is_already_processed(base, "ERR_CONNECTION_REFUSED"));
    }

    #[test]
    fn directory_names_mark_errors_processed() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let base = tmp.path();
        create_article_directory(base, "DISK_FULL on /dev/sda1").unwrap();
        assert!(is_already_processed(base, "DISK_FULL on /dev/sda1"));
        assert!(!is_already_processed(base, "some other failure"));
    }
}
