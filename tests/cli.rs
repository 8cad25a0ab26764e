use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn crawler_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("ion-crawler");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    // Port 1 refuses connections, so `run` sees an unavailable feed.
    let config_content = format!(
        r#"[db]
path = "{}/data/crawler.sqlite"

[feed]
endpoint = "http://127.0.0.1:1/"
timeout_secs = 2
max_retries = 0

[publisher]
kind = "log"
"#,
        root.display()
    );

    let config_path = config_dir.join("crawler.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_crawler(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = crawler_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run ion-crawler at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_crawler(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/crawler.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_crawler(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_crawler(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_status_on_fresh_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_crawler(&config_path, &["status"]);
    assert!(success, "status failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("(genesis)"));
    assert!(stdout.contains("Pending:     0"));
}

#[test]
fn test_run_with_unreachable_feed_reports_summary() {
    let (_tmp, config_path) = setup_test_env();

    run_crawler(&config_path, &["init"]);
    let (stdout, stderr, success) = run_crawler(&config_path, &["run"]);
    assert!(success, "run failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("crawl feed unavailable"), "got: {}", stdout);
    assert!(stdout.contains("published: 0"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_reset_commands() {
    let (_tmp, config_path) = setup_test_env();

    run_crawler(&config_path, &["init"]);

    let (stdout, _, success) = run_crawler(&config_path, &["reset", "--cursor-only"]);
    assert!(success);
    assert!(stdout.contains("cursor cleared: false"));

    let (stdout, _, success) = run_crawler(&config_path, &["reset"]);
    assert!(success);
    assert!(stdout.contains("removed 0 seen records"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let (_tmp, config_path) = setup_test_env();
    let broken = fs::read_to_string(&config_path).unwrap()
        + "\n[filter]\nsampling_rate = 2.0\n";
    fs::write(&config_path, broken).unwrap();

    let (_, stderr, success) = run_crawler(&config_path, &["status"]);
    assert!(!success);
    assert!(stderr.contains("sampling_rate"), "got: {}", stderr);
}

#[test]
fn test_http_publisher_requires_endpoint() {
    let (_tmp, config_path) = setup_test_env();
    let content = fs::read_to_string(&config_path)
        .unwrap()
        .replace("kind = \"log\"", "kind = \"http\"");
    fs::write(&config_path, content).unwrap();

    let (_, stderr, success) = run_crawler(&config_path, &["status"]);
    assert!(!success);
    assert!(stderr.contains("publisher.endpoint"), "got: {}", stderr);
}
