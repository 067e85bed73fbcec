use crate::cli::{Cli, Commands};
use crate::config::Config;
use crate::domain::models::{
    JsonOut, Provider, RawCandidate, RunReport, ScoredCandidate, SelectionResult,
};
use crate::services::output::print_one;
use crate::services::{aggregate, collect, library, publish, quality, scoring, selection, sources, synthesis};
use chrono::Utc;
use rand::Rng;
use std::collections::BTreeMap;
use tracing::{info, warn};

pub fn handle_pipeline_commands(
    cli: &Cli,
    cfg: &Config,
    rng: &mut impl Rng,
) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Run {
            dry_run,
            allow_low_quality,
        } => {
            let report = run_full_cycle(cfg, rng, *dry_run, *allow_low_quality)?;
            print_run_report(cli.json, report)?;
        }
        Commands::Discover => match discover_candidate(cfg, rng)? {
            Some(selected) => {
                if cli.json {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&JsonOut {
                            ok: true,
                            data: &selected
                        })?
                    );
                } else {
                    println!("error: {}", selected.candidate.raw.text);
                    println!("confidence: {:.2}", selected.candidate.confidence);
                    println!("provider: {}", selected.provider.as_str());
                    println!(
                        "window: rank {} of {} (pool {})",
                        selected.rank, selected.window_len, selected.pool_len
                    );
                }
            }
            None => {
                print_one(
                    cli.json,
                    serde_json::json!({"status": "no_candidate_found"}),
                    |_| "no candidate found this run".to_string(),
                )?;
            }
        },
        Commands::Compose {
            error,
            dry_run,
            allow_low_quality,
        } => {
            let candidate = manual_candidate(error);
            let report =
                continue_from_candidate(cfg, candidate, *dry_run, *allow_low_quality)?;
            print_run_report(cli.json, report)?;
        }
        _ => unreachable!("handled by inspect commands"),
    }
    Ok(())
}

fn print_run_report(json: bool, report: RunReport) -> anyhow::Result<()> {
    print_one(json, report, |r| {
        let mut line = format!("status: {}", r.status);
        if let Some(title) = &r.article_title {
            line.push_str(&format!("\ntitle: {title}"));
        }
        if let Some(dir) = &r.article_directory {
            line.push_str(&format!("\ndirectory: {dir}"));
        }
        if let Some(score) = r.overall_score {
            line.push_str(&format!("\nquality: {score:.1}"));
        }
        if let Some(url) = &r.published_url {
            line.push_str(&format!("\nurl: {url}"));
        }
        line
    })
}

fn manual_candidate(error: &str) -> ScoredCandidate {
    ScoredCandidate {
        raw: RawCandidate {
            text: error.to_string(),
            provider: Provider::Manual,
            metrics: BTreeMap::new(),
            source_url: String::new(),
            title: String::new(),
            discovered_at: Utc::now(),
        },
        confidence: 1.0,
    }
}

/// Discovery stage: query all providers, score, filter against history,
/// select one candidate. `None` means "nothing worth writing about this
/// run", which is an ordinary outcome.
pub fn discover_candidate(
    cfg: &Config,
    rng: &mut impl Rng,
) -> anyhow::Result<Option<SelectionResult>> {
    let raw = sources::discover_all(cfg, rng);
    if raw.is_empty() {
        warn!("no candidates from any provider");
        return Ok(None);
    }

    let pool: Vec<ScoredCandidate> = raw
        .into_iter()
        .map(|r| scoring::score_candidate(&cfg.scoring, r, rng))
        .collect();

    let base = library::articles_dir(&cfg.library)?;
    let filtered = selection::filter_pool(pool, &cfg.discovery, |text| {
        library::is_already_processed(&base, text)
    });
    if filtered.is_empty() {
        warn!("no candidates survived filtering");
        return Ok(None);
    }
    Ok(selection::select_candidate(filtered, rng))
}

fn run_full_cycle(
    cfg: &Config,
    rng: &mut impl Rng,
    dry_run: bool,
    allow_low_quality: bool,
) -> anyhow::Result<RunReport> {
    info!("phase 1: candidate discovery");
    let Some(selected) = discover_candidate(cfg, rng)? else {
        return Ok(status_report("no_candidate_found", None));
    };
    continue_from_candidate(cfg, selected.candidate, dry_run, allow_low_quality)
}

fn continue_from_candidate(
    cfg: &Config,
    candidate: ScoredCandidate,
    dry_run: bool,
    allow_low_quality: bool,
) -> anyhow::Result<RunReport> {
    let error_text = candidate.raw.text.clone();

    info!("phase 2: solution collection");
    let (solutions, citations) = collect::collect_solutions(&cfg.collection, &error_text);
    if solutions.is_empty() && citations.is_empty() {
        warn!("nothing collected for candidate");
        return Ok(status_report("collection_empty", Some(error_text)));
    }
    let bundle = aggregate::aggregate(candidate, solutions, citations, &cfg.collection);

    info!("phase 3: article synthesis");
    let article = synthesis::synthesize_article(&cfg.synthesis, &bundle)?;

    info!("phase 4: quality gate");
    let report = quality::evaluate(&article, &cfg.quality, &error_text);
    if !report.passed && !allow_low_quality {
        warn!(
            overall = report.overall_score,
            high_issues = report.high_issue_count(),
            "article rejected by quality gate"
        );
        return Ok(RunReport {
            status: "gate_failed".to_string(),
            error_message: Some(error_text),
            article_title: Some(article.title),
            article_directory: None,
            overall_score: Some(report.overall_score),
            published_url: None,
        });
    }

    info!("phase 5: artifact storage");
    let base = library::articles_dir(&cfg.library)?;
    let article_dir = library::create_article_directory(&base, &error_text)?;
    library::save_run_artifacts(&article_dir, &article, &bundle, Some(&report))?;

    let mut status = "stored";
    let mut published_url = None;
    if !dry_run && cfg.publish.auto_publish {
        info!("phase 6: publication");
        let result = publish::publish_article(&cfg.publish, &article)?;
        library::save_publish_result(&article_dir, &result)?;
        published_url = Some(result.url);
        status = "published";
    }

    Ok(RunReport {
        status: status.to_string(),
        error_message: Some(error_text),
        article_title: Some(article.title),
        article_directory: Some(article_dir.display().to_string()),
        overall_score: Some(report.overall_score),
        published_url,
    })
}

fn status_report(status: &str, error_message: Option<String>) -> RunReport {
    RunReport {
        status: status.to_string(),
        error_message,
        article_title: None,
        article_directory: None,
        overall_score: None,
        published_url: None,
    }
}
