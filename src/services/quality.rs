use crate::config::QualityConfig;
use crate::domain::models::{Article, QualityIssue, QualityReport, Severity, SubScore};
use std::collections::BTreeMap;
use tracing::info;

/// Scores an article along four independent dimensions and decides whether
/// it clears the publication bar. Deterministic: the same article and
/// configuration always yield an identical report. Missing or malformed
/// article fields count as empty and lower the score; they never fail the
/// evaluation.
pub fn evaluate(article: &Article, cfg: &QualityConfig, keyword: &str) -> QualityReport {
    let mut sub_scores = BTreeMap::new();
    let mut issues = Vec::new();

    for (name, sub) in [
        ("basic_completeness", check_basic(article, cfg)),
        ("seo_placement", check_seo(article, keyword)),
        ("structure", check_structure(article)),
        ("readability", check_readability(article, cfg)),
    ] {
        issues.extend(sub.issues.iter().cloned());
        sub_scores.insert(name.to_string(), sub);
    }

    let total: u32 = sub_scores.values().map(|s| s.score).sum();
    let max: u32 = sub_scores.values().map(|s| s.max_score).sum();
    let overall_score = if max > 0 {
        round1(f64::from(total) / f64::from(max) * 100.0)
    } else {
        0.0
    };
    let high_issues = issues
        .iter()
        .filter(|i| i.severity == Severity::High)
        .count();
    let passed = overall_score >= cfg.min_overall_score && high_issues == 0;

    info!(overall_score, passed, high_issues, "quality evaluation finished");
    QualityReport {
        sub_scores,
        overall_score,
        passed,
        issues,
    }
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn issue(message: String, severity: Severity) -> QualityIssue {
    QualityIssue { message, severity }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    haystack.matches(needle).count()
}

fn check_basic(article: &Article, cfg: &QualityConfig) -> SubScore {
    let mut score = 0;
    let mut issues = Vec::new();
    let [min_len, max_len] = cfg.target_length;

    if article.word_count < min_len {
        issues.push(issue(
            format!(
                "word count below minimum: {} (minimum {})",
                article.word_count, min_len
            ),
            Severity::High,
        ));
    } else if article.word_count > max_len {
        issues.push(issue(
            format!(
                "word count above maximum: {} (maximum {})",
                article.word_count, max_len
            ),
            Severity::Medium,
        ));
    } else {
        score += 30;
    }

    let title_len = char_len(&article.title);
    if article.title.is_empty() {
        issues.push(issue("missing title".to_string(), Severity::High));
    } else if title_len < 20 {
        issues.push(issue(
            format!("title too short: {title_len} characters"),
            Severity::Medium,
        ));
    } else if title_len > 70 {
        issues.push(issue(
            format!("title too long: {title_len} characters"),
            Severity::Medium,
        ));
    } else {
        score += 25;
    }

    if article.content.is_empty() {
        issues.push(issue("missing content".to_string(), Severity::High));
    } else {
        score += 20;
    }

    let excerpt_len = char_len(&article.excerpt);
    if article.excerpt.is_empty() {
        issues.push(issue("missing excerpt".to_string(), Severity::Medium));
    } else if !(100..=160).contains(&excerpt_len) {
        issues.push(issue(
            format!("excerpt length out of range: {excerpt_len} characters"),
            Severity::Low,
        ));
    } else {
        score += 25;
    }

    SubScore {
        score,
        max_score: 100,
        issues,
    }
}

fn check_seo(article: &Article, keyword: &str) -> SubScore {
    let mut score = 0;
    let mut issues = Vec::new();

    if !keyword.is_empty() {
        let kw = keyword.to_lowercase();

        if article.title.to_lowercase().contains(&kw) {
            score += 20;
        } else {
            issues.push(issue(
                "keyword missing from title".to_string(),
                Severity::High,
            ));
        }

        if article.excerpt.to_lowercase().contains(&kw) {
            score += 15;
        } else {
            issues.push(issue(
                "keyword missing from excerpt".to_string(),
                Severity::Medium,
            ));
        }

        if !article.content.is_empty() {
            let occurrences = count_occurrences(&article.content.to_lowercase(), &kw);
            let words = article.content.split_whitespace().count();
            if words > 0 {
                let density = occurrences as f64 / words as f64 * 100.0;
                if (1.0..=3.0).contains(&density) {
                    score += 25;
                } else if (0.5..1.0).contains(&density) {
                    score += 15;
                    issues.push(issue(
                        format!("keyword density low: {density:.2}%"),
                        Severity::Low,
                    ));
                } else if density > 3.0 {
                    issues.push(issue(
                        format!("keyword density high: {density:.2}%"),
                        Severity::Medium,
                    ));
                } else {
                    issues.push(issue(
                        "keyword barely present in content".to_string(),
                        Severity::Medium,
                    ));
                }
            }
        }
    }

    if !article.slug.is_empty() {
        let clean = article
            .slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if clean {
            score += 10;
        } else {
            issues.push(issue("slug format invalid".to_string(), Severity::Low));
        }
    }

    match article.tags.len() {
        n if n >= 3 => score += 15,
        n if n >= 1 => {
            score += 10;
            issues.push(issue("too few tags".to_string(), Severity::Low));
        }
        _ => issues.push(issue("no tags set".to_string(), Severity::Medium)),
    }

    SubScore {
        score,
        max_score: 100,
        issues,
    }
}

fn is_list_item(line: &str) -> bool {
    let l = line.trim_start();
    if l.starts_with("- ") || l.starts_with("* ") || l.starts_with("+ ") {
        return true;
    }
    let digits: String = l.chars().take_while(|c| c.is_ascii_digit()).collect();
    !digits.is_empty() && l[digits.len()..].starts_with(". ")
}

fn check_structure(article: &Article) -> SubScore {
    let mut score = 0;
    let mut issues = Vec::new();
    let content = &article.content;

    let h1 = content.lines().filter(|l| l.starts_with("# ")).count();
    let h2 = content.lines().filter(|l| l.starts_with("## ")).count();
    let h3 = content.lines().filter(|l| l.starts_with("### ")).count();

    match h1 {
        1 => score += 20,
        0 => issues.push(issue(
            "missing top-level heading".to_string(),
            Severity::High,
        )),
        n => issues.push(issue(
            format!("multiple top-level headings: {n}"),
            Severity::Medium,
        )),
    }

    match h2 {
        n if n >= 3 => score += 25,
        n if n >= 1 => {
            score += 15;
            issues.push(issue(
                "too few second-level headings".to_string(),
                Severity::Low,
            ));
        }
        _ => issues.push(issue(
            "no second-level headings".to_string(),
            Severity::Medium,
        )),
    }

    match h3 {
        n if n >= 2 => score += 15,
        1 => score += 10,
        _ => {}
    }

    let list_items = content.lines().filter(|l| is_list_item(l)).count();
    match list_items {
        n if n >= 3 => score += 20,
        n if n >= 1 => {
            score += 10;
            issues.push(issue("too few list items".to_string(), Severity::Low));
        }
        _ => issues.push(issue("no lists in content".to_string(), Severity::Low)),
    }

    // Opening and closing markers count separately, so a single complete
    // code block yields 2.
    if count_occurrences(content, "```") >= 2 {
        score += 10;
    }

    let long_paragraphs = content
        .split("\n\n")
        .filter(|p| char_len(p) > 500)
        .count();
    if long_paragraphs == 0 {
        score += 10;
    } else {
        issues.push(issue(
            format!("{long_paragraphs} paragraphs exceed 500 characters"),
            Severity::Low,
        ));
    }

    SubScore {
        score,
        max_score: 100,
        issues,
    }
}

fn is_ideographic(c: char) -> bool {
    ('\u{4e00}'..='\u{9faf}').contains(&c)
}

/// A technical term counts as explained when it is immediately followed by a
/// parenthetical, e.g. `API（...）` or `API (...)`.
fn has_parenthetical_after(content: &str, term: &str) -> bool {
    let mut rest = content;
    while let Some(pos) = rest.find(term) {
        let after = &rest[pos + term.len()..];
        let mut chars = after.chars();
        if matches!(chars.next(), Some('（') | Some('(')) {
            let tail: String = chars.take(80).collect();
            if tail.contains('）') || tail.contains(')') {
                return true;
            }
        }
        rest = &rest[pos + term.len()..];
    }
    false
}

fn check_readability(article: &Article, cfg: &QualityConfig) -> SubScore {
    let content = &article.content;
    if content.is_empty() {
        return SubScore {
            score: 0,
            max_score: 100,
            issues: vec![issue("missing content".to_string(), Severity::High)],
        };
    }

    let mut score = 0;
    let mut issues = Vec::new();

    let terminators: Vec<char> = cfg.sentence_terminators.chars().collect();
    let sentences: Vec<&str> = content.split(|c| terminators.contains(&c)).collect();
    let long_sentences = sentences
        .iter()
        .filter(|s| char_len(s.trim()) > 100)
        .count();
    if (long_sentences as f64) < sentences.len() as f64 * 0.2 {
        score += 25;
    } else {
        issues.push(issue(
            "too many long sentences".to_string(),
            Severity::Medium,
        ));
    }

    let non_ws = content.chars().filter(|c| !c.is_whitespace()).count();
    if non_ws > 0 {
        let ideographic = content.chars().filter(|c| is_ideographic(*c)).count();
        let density = ideographic as f64 / non_ws as f64;
        if (0.2..=0.4).contains(&density) {
            score += 25;
        } else {
            issues.push(issue(
                format!("ideographic density out of range: {density:.2}"),
                Severity::Low,
            ));
        }
    }

    let explained = cfg
        .technical_terms
        .iter()
        .filter(|t| has_parenthetical_after(content, t.as_str()))
        .count();
    if explained > 0 {
        score += 15;
    }

    let connectives: usize = cfg
        .connectives
        .iter()
        .map(|c| count_occurrences(content, c.as_str()))
        .sum();
    match connectives {
        n if n >= 3 => score += 15,
        n if n >= 1 => score += 10,
        _ => issues.push(issue(
            "too few connective words".to_string(),
            Severity::Low,
        )),
    }

    let blank_separators = count_blank_separators(content);
    match blank_separators {
        n if n >= 5 => score += 20,
        n if n >= 2 => score += 15,
        _ => issues.push(issue(
            "too few blank-line separators".to_string(),
            Severity::Low,
        )),
    }

    SubScore {
        score,
        max_score: 100,
        issues,
    }
}

/// Counts groups of consecutive blank lines.
fn count_blank_separators(content: &str) -> usize {
    let mut groups = 0;
    let mut in_blank = false;
    for line in content.lines() {
        if line.trim().is_empty() {
            if !in_blank {
                groups += 1;
                in_blank = true;
            }
        } else {
            in_blank = false;
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Severity;

    const KW: &str = "ERR_CONNECTION_RESET";

    fn rich_article() -> Article {
        let sent = "回線の状態を確認します。";
        let para = sent.repeat(3);
        let mut content = String::new();
        content.push_str(&format!("# {KW} の解決方法\n\n"));
        for i in 0..3 {
            content.push_str(&format!("## 対処法 {} の概要\n\n", i + 1));
            content.push_str(&format!("{KW} {para}\n\n"));
        }
        content.push_str("### 手順の詳細\n\n");
        content.push_str("- 設定を開く\n- 再起動する\n- ログを確認する\n\n");
        content.push_str("### 補足事項\n\n");
        content.push_str("```\nipconfig /flushdns\n```\n\n");
        content.push_str(&"reset the network adapter and update the driver ".repeat(5));
        content.push_str("\n\n");
        content.push_str(&format!("また、{para}さらに、{para}そのため、{para}\n\n"));
        content.push_str(&format!(
            "API（アプリケーション連携の仕組み）の設定も確認します。{para}\n"
        ));

        Article {
            title: format!("{KW} の原因と解決方法を徹底解説【保存版】"),
            slug: "err-connection-reset-solution".to_string(),
            content,
            excerpt: format!("{KW}、{}", "あ".repeat(100)),
            tags: vec![
                "エラー解決".to_string(),
                "トラブルシューティング".to_string(),
                "ネットワーク".to_string(),
            ],
            word_count: 3500,
        }
    }

    #[test]
    fn rich_article_passes_the_gate() {
        let cfg = QualityConfig::default();
        let report = evaluate(&rich_article(), &cfg, KW);
        assert_eq!(report.high_issue_count(), 0, "issues: {:?}", report.issues);
        assert_eq!(report.sub_scores["basic_completeness"].score, 100);
        assert_eq!(report.sub_scores["structure"].score, 100);
        assert!(report.overall_score >= 70.0);
        assert!(report.passed);
    }

    #[test]
    fn evaluation_is_idempotent() {
        let cfg = QualityConfig::default();
        let article = rich_article();
        let first = evaluate(&article, &cfg, KW);
        let second = evaluate(&article, &cfg, KW);
        assert_eq!(first, second);
    }

    #[test]
    fn short_empty_article_fails_every_basic_check() {
        let cfg = QualityConfig::default();
        let article = Article {
            title: "接続エラーを直す方法".to_string(), // 10 chars, below the 20 minimum
            word_count: 500,
            ..Article::default()
        };
        let report = evaluate(&article, &cfg, KW);
        assert_eq!(report.sub_scores["basic_completeness"].score, 0);
        assert!(report
            .issues
            .iter()
            .any(|i| i.severity == Severity::High && i.message.contains("word count below")));
        assert!(!report.passed);
    }

    #[test]
    fn malformed_article_defaults_to_empty_and_never_panics() {
        let cfg = QualityConfig::default();
        let report = evaluate(&Article::default(), &cfg, "");
        assert!(!report.passed);
        assert!(report.high_issue_count() >= 1);
    }

    #[test]
    fn keyword_stuffing_raises_density_issue() {
        let cfg = QualityConfig::default();
        let article = Article {
            title: format!("{KW} を解決するための完全ガイドです"),
            content: format!("# {KW}\n\n{}", format!("{KW} broke again. ").repeat(30)),
            excerpt: format!("{KW}、{}", "あ".repeat(100)),
            tags: vec!["a".into(), "b".into(), "c".into()],
            word_count: 3500,
            slug: "kw-guide".to_string(),
        };
        let report = evaluate(&article, &cfg, KW);
        assert!(report
            .issues
            .iter()
            .any(|i| i.message.starts_with("keyword density high")));
    }

    #[test]
    fn structure_checks_count_markup() {
        let content = "# top\n\nbody\n\n## a\n\n## b\n\n- one\n- two\n- three\n\n```\ncode\n```\n";
        let article = Article {
            content: content.to_string(),
            ..Article::default()
        };
        let sub = check_structure(&article);
        // h1 ok (+20), two h2 (+15 with issue), no h3, three list items
        // (+20), one fenced block (+10), no long paragraphs (+10).
        assert_eq!(sub.score, 75);
        assert!(sub
            .issues
            .iter()
            .any(|i| i.message == "too few second-level headings"));
    }

    #[test]
    fn blank_separator_groups_are_counted_once_per_gap() {
        assert_eq!(count_blank_separators("a\n\nb\n\n\nc"), 2);
        assert_eq!(count_blank_separators("a\nb"), 0);
    }

    #[test]
    fn parenthetical_explanations_are_detected() {
        assert!(has_parenthetical_after("API（説明）を使う", "API"));
        assert!(has_parenthetical_after("the API (interface) layer", "API"));
        assert!(!has_parenthetical_after("API を使う", "API"));
    }
}
