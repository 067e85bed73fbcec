use crate::config::CollectionConfig;
use crate::domain::models::{
    AggregatedBundle, BundleStats, ScoredCandidate, SolutionFragment, SourceCitation,
};
use std::collections::HashSet;
use tracing::info;

/// Merges everything collected for one candidate into a single bundle:
/// solutions ranked by reliability (stable on ties), citations deduplicated
/// by URL with the first occurrence winning, both truncated to the
/// configured caps. Summary statistics are computed over the untruncated
/// inputs. Pure transform; an empty solution list is a valid bundle.
pub fn aggregate(
    candidate: ScoredCandidate,
    solutions: Vec<SolutionFragment>,
    citations: Vec<SourceCitation>,
    cfg: &CollectionConfig,
) -> AggregatedBundle {
    let mut solutions = solutions;
    for s in &mut solutions {
        s.reliability = s.reliability.clamp(0.0, 1.0);
    }

    let total_solutions = solutions.len();
    let mean_reliability = if solutions.is_empty() {
        0.0
    } else {
        solutions.iter().map(|s| s.reliability).sum::<f64>() / total_solutions as f64
    };

    solutions.sort_by(|a, b| b.reliability.total_cmp(&a.reliability));
    solutions.truncate(cfg.max_solutions);

    let mut seen = HashSet::new();
    let mut unique: Vec<SourceCitation> = citations
        .into_iter()
        .filter(|c| !c.url.is_empty() && seen.insert(c.url.clone()))
        .collect();
    let unique_citations = unique.len();
    unique.truncate(cfg.max_citations);

    info!(
        solutions = solutions.len(),
        citations = unique.len(),
        mean_reliability,
        "aggregated solution bundle"
    );

    AggregatedBundle {
        candidate,
        solutions,
        citations: unique,
        stats: BundleStats {
            total_solutions,
            unique_citations,
            mean_reliability,
        },
    }
}
