use crate::config::{MetricRule, ScoringConfig};
use crate::domain::models::{Provider, RawCandidate, ScoredCandidate};
use rand::Rng;

/// Attaches a confidence score in [0,1] to a raw candidate.
///
/// Engagement providers are scored by their tier tables: each metric
/// contributes the bonus of the first tier its value strictly exceeds, the
/// bonuses are summed and the result clamped to [0,1]. Missing metrics count
/// as 0. Speculative providers (trends) carry no measured engagement, so
/// their confidence is drawn uniformly from the configured range; those
/// candidates are inherently guesswork and reproducibility across runs is
/// not promised.
pub fn score_candidate(
    cfg: &ScoringConfig,
    raw: RawCandidate,
    rng: &mut impl Rng,
) -> ScoredCandidate {
    let confidence = match raw.provider {
        Provider::Stackoverflow => tier_sum(&cfg.stackoverflow, &raw),
        Provider::Reddit => tier_sum(&cfg.reddit, &raw),
        Provider::Trends => draw_speculative(cfg.trends_confidence, rng),
        Provider::Manual => 1.0,
    };
    ScoredCandidate { raw, confidence }
}

fn tier_sum(rules: &[MetricRule], raw: &RawCandidate) -> f64 {
    let mut total = 0.0;
    for rule in rules {
        let value = raw.metrics.get(&rule.metric).copied().unwrap_or(0.0);
        for tier in &rule.tiers {
            if value > tier.above {
                total += tier.bonus;
                break;
            }
        }
    }
    total.clamp(0.0, 1.0)
}

fn draw_speculative(range: [f64; 2], rng: &mut impl Rng) -> f64 {
    let (lo, hi) = if range[0] <= range[1] {
        (range[0], range[1])
    } else {
        (range[1], range[0])
    };
    if lo >= hi {
        return lo.clamp(0.0, 1.0);
    }
    rng.gen_range(lo..=hi).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::BTreeMap;

    fn raw(provider: Provider, metrics: &[(&str, f64)]) -> RawCandidate {
        RawCandidate {
            text: "ERROR_ACCESS_DENIED 0x80070005".to_string(),
            provider,
            metrics: metrics
                .iter()
                .map(|&(k, v)| (k.to_string(), v))
                .collect::<BTreeMap<_, _>>(),
            source_url: String::new(),
            title: String::new(),
            discovered_at: Utc::now(),
        }
    }

    fn score(provider: Provider, metrics: &[(&str, f64)]) -> f64 {
        let cfg = ScoringConfig::default();
        let mut rng = StdRng::seed_from_u64(1);
        score_candidate(&cfg, raw(provider, metrics), &mut rng).confidence
    }

    #[test]
    fn stackoverflow_tiers_follow_the_table() {
        assert_eq!(score(Provider::Stackoverflow, &[]), 0.0);
        assert_eq!(score(Provider::Stackoverflow, &[("score", 1.0)]), 0.1);
        assert_eq!(score(Provider::Stackoverflow, &[("score", 6.0)]), 0.2);
        assert_eq!(score(Provider::Stackoverflow, &[("score", 11.0)]), 0.3);
        let full = score(
            Provider::Stackoverflow,
            &[("score", 20.0), ("view_count", 2000.0), ("answer_count", 3.0)],
        );
        assert!((full - 0.8).abs() < 1e-9);
    }

    #[test]
    fn confidence_is_clamped_for_extreme_metrics() {
        let c = score(
            Provider::Reddit,
            &[("upvotes", 1.0e12), ("comments", 1.0e12)],
        );
        assert!((0.0..=1.0).contains(&c));
        let zero = score(Provider::Reddit, &[("upvotes", 0.0), ("comments", 0.0)]);
        assert_eq!(zero, 0.0);
    }

    #[test]
    fn higher_metrics_never_lower_confidence() {
        let grid = [0.0, 1.0, 5.0, 6.0, 10.0, 11.0, 25.0, 75.0, 600.0, 5000.0];
        for &a in &grid {
            for &b in &grid {
                for &c in &grid {
                    let low = score(
                        Provider::Stackoverflow,
                        &[("score", a), ("view_count", b), ("answer_count", c)],
                    );
                    let high = score(
                        Provider::Stackoverflow,
                        &[
                            ("score", a + 1.0),
                            ("view_count", b + 100.0),
                            ("answer_count", c + 1.0),
                        ],
                    );
                    assert!(
                        high >= low,
                        "monotonicity violated at ({a},{b},{c}): {high} < {low}"
                    );
                }
            }
        }
    }

    #[test]
    fn missing_metrics_default_to_zero() {
        let partial = score(Provider::Reddit, &[("upvotes", 21.0)]);
        assert_eq!(partial, 0.3);
    }

    #[test]
    fn speculative_confidence_stays_in_configured_range() {
        let cfg = ScoringConfig::default();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let c = score_candidate(&cfg, raw(Provider::Trends, &[]), &mut rng).confidence;
            assert!((0.4..=0.8).contains(&c));
        }
    }

    #[test]
    fn manual_candidates_are_fully_trusted() {
        assert_eq!(score(Provider::Manual, &[]), 1.0);
    }
}
