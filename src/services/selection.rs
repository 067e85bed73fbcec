use crate::config::DiscoveryConfig;
use crate::domain::models::{ScoredCandidate, SelectionResult};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use tracing::{debug, info};

/// Candidates shorter than this are too uninformative to be a real error
/// signal.
const MIN_TEXT_LEN: usize = 10;

/// Keeps candidates that pass every rule, applied in this order with
/// short-circuit on the first failure: minimum confidence, minimum text
/// length, exclusion keywords, processed history.
pub fn filter_pool(
    pool: Vec<ScoredCandidate>,
    cfg: &DiscoveryConfig,
    already_processed: impl Fn(&str) -> bool,
) -> Vec<ScoredCandidate> {
    let before = pool.len();
    let excluded: Vec<String> = cfg
        .exclude_keywords
        .iter()
        .map(|k| k.to_lowercase())
        .collect();

    let kept: Vec<ScoredCandidate> = pool
        .into_iter()
        .filter(|c| {
            if c.confidence < cfg.min_confidence {
                return false;
            }
            let text = c.raw.text.trim();
            if text.chars().count() < MIN_TEXT_LEN {
                return false;
            }
            let lower = text.to_lowercase();
            if excluded.iter().any(|k| lower.contains(k)) {
                return false;
            }
            if already_processed(text) {
                debug!(text, "candidate already processed, skipping");
                return false;
            }
            true
        })
        .collect();

    info!(before, after = kept.len(), "filtered candidate pool");
    kept
}

/// Position weight inside the selection window: 4,3,2 then flat 1.
fn window_weight(rank: usize) -> u32 {
    std::cmp::max(1, 4_i64 - rank as i64) as u32
}

/// Draws one candidate from the top of the pool.
///
/// The pool is sorted by confidence descending (stable, so ties keep their
/// discovery order), the window is the top `max(3, n/3)` entries, and one
/// weighted draw picks from the window. Always selecting the single best
/// candidate would republish the same topic every run, so the draw trades a
/// little optimality for topic rotation.
pub fn select_candidate(
    pool: Vec<ScoredCandidate>,
    rng: &mut impl Rng,
) -> Option<SelectionResult> {
    if pool.is_empty() {
        return None;
    }
    let pool_len = pool.len();

    let mut sorted = pool;
    sorted.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let window_len = std::cmp::max(3, pool_len / 3).min(pool_len);
    let weights: Vec<u32> = (0..window_len).map(window_weight).collect();
    let dist = WeightedIndex::new(&weights).ok()?;
    let rank = dist.sample(rng);

    sorted.truncate(window_len);
    let candidate = sorted.swap_remove(rank);
    info!(
        text = %candidate.raw.text,
        confidence = candidate.confidence,
        rank,
        window_len,
        "selected candidate"
    );
    Some(SelectionResult {
        provider: candidate.raw.provider,
        candidate,
        rank,
        window_len,
        pool_len,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Provider, RawCandidate};
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::BTreeMap;

    fn cand(text: &str, confidence: f64) -> ScoredCandidate {
        ScoredCandidate {
            raw: RawCandidate {
                text: text.to_string(),
                provider: Provider::Stackoverflow,
                metrics: BTreeMap::new(),
                source_url: String::new(),
                title: String::new(),
                discovered_at: Utc::now(),
            },
            confidence,
        }
    }

    #[test]
    fn weights_follow_the_rank_formula() {
        let expected = [4, 3, 2, 1, 1, 1, 1];
        for (rank, want) in expected.iter().enumerate() {
            assert_eq!(window_weight(rank), *want);
        }
    }

    #[test]
    fn filter_applies_every_rule() {
        let cfg = DiscoveryConfig::default();
        let pool = vec![
            cand("OUT_OF_MEMORY 0x80070008", 0.9),
            cand("DISK_FULL on /dev/sda1", 0.4),
            cand("short", 0.9),
            cand("test sample error in module", 0.95),
            cand("Kernel panic - not syncing", 0.7),
        ];
        let kept = filter_pool(pool, &cfg, |text| text.contains("Kernel"));
        let texts: Vec<&str> = kept.iter().map(|c| c.raw.text.as_str()).collect();
        assert_eq!(texts, vec!["OUT_OF_MEMORY 0x80070008"]);
        for c in &kept {
            assert!(c.confidence >= cfg.min_confidence);
            assert!(c.raw.text.trim().chars().count() >= MIN_TEXT_LEN);
        }
    }

    #[test]
    fn exclusion_beats_high_confidence_and_window_clips_to_pool() {
        // Highest-confidence candidate contains an excluded keyword; the
        // window is max(3, 3/3) = 3 clipped to the 2 survivors.
        let cfg = DiscoveryConfig::default();
        let pool = vec![
            cand("OUT_OF_MEMORY_0x1", 0.9),
            cand("DISK_FULL error on boot", 0.6),
            cand("test sample error", 0.95),
        ];
        let kept = filter_pool(pool, &cfg, |_| false);
        assert_eq!(kept.len(), 2);

        let mut rng = StdRng::seed_from_u64(9);
        let picked = select_candidate(kept, &mut rng).expect("non-empty pool selects");
        assert_eq!(picked.window_len, 2);
        assert_eq!(picked.pool_len, 2);
        assert_ne!(picked.candidate.raw.text, "test sample error");
    }

    #[test]
    fn empty_pool_selects_none() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(select_candidate(Vec::new(), &mut rng).is_none());
    }

    #[test]
    fn selection_never_leaves_the_window() {
        // 12 candidates -> window of max(3, 4) = 4.
        let pool: Vec<ScoredCandidate> = (0..12)
            .map(|i| cand(&format!("candidate number {i}"), 1.0 - i as f64 * 0.05))
            .collect();
        let top: Vec<String> = pool.iter().take(4).map(|c| c.raw.text.clone()).collect();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..500 {
            let picked = select_candidate(pool.clone(), &mut rng).expect("selects");
            assert_eq!(picked.window_len, 4);
            assert!(top.contains(&picked.candidate.raw.text));
        }
    }

    #[test]
    fn ties_keep_discovery_order() {
        let pool = vec![
            cand("first discovered tie", 0.8),
            cand("second discovered tie", 0.8),
            cand("third discovered tie", 0.8),
        ];
        // Rank 0 must be the first-discovered candidate on every draw that
        // lands on rank 0.
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..200 {
            let picked = select_candidate(pool.clone(), &mut rng).expect("selects");
            if picked.rank == 0 {
                assert_eq!(picked.candidate.raw.text, "first discovered tie");
            }
        }
    }

    #[test]
    fn draw_frequency_matches_weights() {
        // Weights [4,3,2] over three candidates: rank 0 should win with
        // probability 4/9.
        let pool = vec![
            cand("weighted rank zero", 0.9),
            cand("weighted rank one", 0.8),
            cand("weighted rank two", 0.7),
        ];
        let mut rng = StdRng::seed_from_u64(20240811);
        let draws = 10_000;
        let mut zero_hits = 0u32;
        for _ in 0..draws {
            let picked = select_candidate(pool.clone(), &mut rng).expect("selects");
            if picked.candidate.raw.text == "weighted rank zero" {
                zero_hits += 1;
            }
        }
        let freq = f64::from(zero_hits) / f64::from(draws);
        let expected = 4.0 / 9.0;
        assert!(
            (freq - expected).abs() < 0.03,
            "rank-0 frequency {freq:.4} outside {expected:.4} ± 0.03"
        );
    }
}
