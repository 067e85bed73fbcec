mod common;

use common::{short_article, spec_pool, TestEnv};
use predicates::str::contains;

#[test]
fn gate_text_output_summarizes_the_report() {
    let env = TestEnv::new();
    let article = env.write_fixture("short.json", &short_article());

    env.cmd()
        .args(["gate", article.to_str().unwrap()])
        .assert()
        .success()
        .stdout(contains("overall:"))
        .stdout(contains("passed: false"));
}

#[test]
fn select_text_output_is_tab_separated() {
    let env = TestEnv::new();
    let pool = env.write_fixture("pool.json", &spec_pool());

    env.cmd()
        .args(["select", pool.to_str().unwrap(), "--seed", "2"])
        .assert()
        .success()
        .stdout(contains("\t"));
}

#[test]
fn library_show_without_articles_fails_in_text_mode() {
    let env = TestEnv::new();
    env.cmd()
        .args(["library", "show", "9"])
        .assert()
        .failure()
        .stderr(contains("article not found"));
}
