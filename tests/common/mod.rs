use assert_cmd::Command;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct TestEnv {
    _tmp: TempDir,
    pub home: PathBuf,
    pub fixtures: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let home = tmp.path().join("home");
        let fixtures = tmp.path().join("fixtures");
        fs::create_dir_all(&home).expect("create isolated home");
        fs::create_dir_all(&fixtures).expect("create fixture dir");
        Self {
            _tmp: tmp,
            home,
            fixtures,
        }
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("errpress").expect("binary builds");
        cmd.env("HOME", &self.home).env("ERRPRESS_LOG", "warn");
        cmd
    }

    pub fn run_json(&self, args: &[&str]) -> Value {
        let mut cmd = self.cmd();
        let out = cmd
            .arg("--json")
            .args(args)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&out).expect("valid json output")
    }

    pub fn articles_dir(&self) -> PathBuf {
        self.home
            .join(".local")
            .join("share")
            .join("errpress")
            .join("articles")
    }

    pub fn write_fixture(&self, name: &str, value: &Value) -> PathBuf {
        let path = self.fixtures.join(name);
        fs::write(&path, serde_json::to_string_pretty(value).expect("serialize fixture"))
            .expect("write fixture");
        path
    }
}

pub fn candidate(text: &str, provider: &str, confidence: f64) -> Value {
    json!({
        "text": text,
        "provider": provider,
        "metrics": {},
        "source_url": "",
        "title": "",
        "discovered_at": "2026-08-01T00:00:00Z",
        "confidence": confidence,
    })
}

pub fn spec_pool() -> Value {
    json!([
        candidate("OUT_OF_MEMORY_0x1", "stackoverflow", 0.9),
        candidate("DISK_FULL error on boot", "reddit", 0.6),
        candidate("test sample error", "stackoverflow", 0.95),
    ])
}

pub fn short_article() -> Value {
    json!({
        "title": "接続エラーを直す方法",
        "slug": "",
        "content": "",
        "excerpt": "",
        "tags": [],
        "word_count": 500,
        "error_message": "ERR_CONNECTION_RESET",
    })
}

pub fn rich_article() -> Value {
    let kw = "ERR_CONNECTION_RESET";
    let para = "回線の状態を確認します。".repeat(3);
    let mut content = String::new();
    content.push_str(&format!("# {kw} の解決方法\n\n"));
    for i in 0..3 {
        content.push_str(&format!("## 対処法 {} の概要\n\n", i + 1));
        content.push_str(&format!("{kw} {para}\n\n"));
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

    json!({
        "title": format!("{kw} の原因と解決方法を徹底解説【保存版】"),
        "slug": "err-connection-reset-solution",
        "content": content,
        "excerpt": format!("{kw}、{}", "あ".repeat(100)),
        "tags": ["エラー解決", "トラブルシューティング", "ネットワーク"],
        "word_count": 3500,
        "error_message": kw,
    })
}

pub fn seed_processed_article(home: &Path, number: u32, sanitized: &str) {
    let dir = home
        .join(".local/share/errpress/articles")
        .join(format!("{number:04}_{sanitized}"));
    fs::create_dir_all(dir).expect("seed processed article dir");
}
