use crate::cli::{Cli, Commands, LibraryCommands};
use crate::config::Config;
use crate::domain::models::{Article, JsonOut, ScoredCandidate};
use crate::services::output::{print_one, print_out};
use crate::services::{library, quality, selection};
use rand::Rng;

pub fn handle_inspect_commands(
    cli: &Cli,
    cfg: &Config,
    rng: &mut impl Rng,
) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Gate { article, keyword } => {
            let raw = std::fs::read_to_string(article)?;
            let value: serde_json::Value = serde_json::from_str(&raw)?;
            let parsed: Article = serde_json::from_value(value.clone())?;
            let keyword = keyword
                .clone()
                .or_else(|| value["error_message"].as_str().map(str::to_string))
                .unwrap_or_default();

            let report = quality::evaluate(&parsed, &cfg.quality, &keyword);
            print_one(cli.json, &report, |r| {
                let mut lines = vec![
                    format!("overall: {:.1}", r.overall_score),
                    format!("passed: {}", r.passed),
                ];
                for (name, sub) in &r.sub_scores {
                    lines.push(format!("{name}: {}/{}", sub.score, sub.max_score));
                }
                for issue in &r.issues {
                    lines.push(format!("[{:?}] {}", issue.severity, issue.message));
                }
                lines.join("\n")
            })?;
        }
        Commands::Select { pool } => {
            let raw = std::fs::read_to_string(pool)?;
            let candidates: Vec<ScoredCandidate> = serde_json::from_str(&raw)?;
            let base = library::articles_dir(&cfg.library)?;
            let filtered = selection::filter_pool(candidates, &cfg.discovery, |text| {
                library::is_already_processed(&base, text)
            });
            match selection::select_candidate(filtered, rng) {
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
                        println!(
                            "{}\t{:.2}\t{}",
                            selected.candidate.raw.text,
                            selected.candidate.confidence,
                            selected.provider.as_str()
                        );
                    }
                }
                None => {
                    print_one(
                        cli.json,
                        serde_json::json!({"status": "no_candidate_found"}),
                        |_| "no candidate found".to_string(),
                    )?;
                }
            }
        }
        Commands::Library { command } => match command {
            LibraryCommands::List => {
                let base = library::articles_dir(&cfg.library)?;
                let entries = library::list_articles(&base)?;
                print_out(cli.json, &entries, |e| {
                    format!("{:04}\t{}\t{}", e.number, e.error_message, e.title)
                })?;
            }
            LibraryCommands::Show { number } => {
                let base = library::articles_dir(&cfg.library)?;
                let data = library::show_article(&base, *number)?;
                if cli.json {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&JsonOut { ok: true, data })?
                    );
                } else {
                    println!("{}", serde_json::to_string_pretty(&data)?);
                }
            }
        },
        _ => unreachable!("handled by pipeline commands"),
    }
    Ok(())
}
