use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn feed_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("feed");
    path
}

struct TestEnv {
    _tmp: TempDir,
    config_path: PathBuf,
    exports: PathBuf,
}

fn setup_test_env(max_fragment_chars: usize) -> TestEnv {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::create_dir_all(root.join("data")).unwrap();

    let exports = root.join("exports");
    fs::create_dir_all(&exports).unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/feed.sqlite"

[source]
root = "{root}/exports"
include_globs = ["**/*"]
exclude_globs = []

[store]
table = "readiness_chunks"
max_fragment_chars = {max_fragment_chars}

[cache]
ttl_secs = 3600

[access_log]
max_records = 50
"#,
        root = root.display(),
        max_fragment_chars = max_fragment_chars,
    );

    let config_path = config_dir.join("feed.toml");
    fs::write(&config_path, config_content).unwrap();

    TestEnv {
        _tmp: tmp,
        config_path,
        exports,
    }
}

fn run_feed(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = feed_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run feed binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn fetch_json(config_path: &Path) -> serde_json::Value {
    let (stdout, stderr, success) = run_feed(config_path, &["fetch"]);
    assert!(success, "fetch failed: stdout={}, stderr={}", stdout, stderr);
    serde_json::from_str(stdout.trim()).unwrap()
}

#[test]
fn test_init_creates_database() {
    let env = setup_test_env(45000);

    let (stdout, stderr, success) = run_feed(&env.config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let env = setup_test_env(45000);

    let (_, _, success1) = run_feed(&env.config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_feed(&env.config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_ingest_single_file_is_chunked() {
    let env = setup_test_env(2);
    fs::write(env.exports.join("PL_Paths.txt"), "ABC").unwrap();

    run_feed(&env.config_path, &["init"]);
    let (stdout, stderr, success) = run_feed(&env.config_path, &["ingest"]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("matched: 1"));
    assert!(stdout.contains("config|paths"));
    assert!(stdout.contains("rows written: 2"));
    assert!(stdout.contains("ok"));

    let payload = fetch_json(&env.config_path);
    assert_eq!(payload["config"]["paths"], "ABC");
    assert_eq!(payload["data"], serde_json::json!({}));
    assert!(payload["meta"]["lastUpdated"]
        .as_str()
        .unwrap()
        .ends_with('Z'));
}

#[test]
fn test_ingest_empty_file_keeps_key() {
    let env = setup_test_env(45000);
    fs::write(env.exports.join("Roster.csv"), "").unwrap();

    let (stdout, stderr, success) = run_feed(&env.config_path, &["ingest"]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("rows written: 1"));

    let payload = fetch_json(&env.config_path);
    assert_eq!(payload["data"]["roster"], "");
}

#[test]
fn test_unmatched_files_are_reported_not_written() {
    let env = setup_test_env(45000);
    fs::write(env.exports.join("Members.csv"), "id,name").unwrap();
    fs::write(env.exports.join("notes.txt"), "ignore me").unwrap();

    let (stdout, _, success) = run_feed(&env.config_path, &["ingest"]);
    assert!(success);
    assert!(stdout.contains("matched: 1"));
    assert!(stdout.contains("unmatched: 1"));
    assert!(stdout.contains("notes.txt"));

    let payload = fetch_json(&env.config_path);
    assert_eq!(payload["data"]["members"], "id,name");
    assert!(payload["data"].get("notes").is_none());
}

#[test]
fn test_second_ingest_invalidates_cached_payload() {
    let env = setup_test_env(45000);
    let roster = env.exports.join("Roster.csv");

    fs::write(&roster, "first").unwrap();
    let (_, _, success) = run_feed(&env.config_path, &["ingest"]);
    assert!(success);
    assert_eq!(fetch_json(&env.config_path)["data"]["roster"], "first");
    // Served from cache this time
    assert_eq!(fetch_json(&env.config_path)["data"]["roster"], "first");

    fs::write(&roster, "second").unwrap();
    let (_, _, success) = run_feed(&env.config_path, &["ingest"]);
    assert!(success);
    assert_eq!(fetch_json(&env.config_path)["data"]["roster"], "second");
}

#[test]
fn test_fetch_before_ingest_fails() {
    let env = setup_test_env(45000);
    run_feed(&env.config_path, &["init"]);

    let (_, stderr, success) = run_feed(&env.config_path, &["fetch"]);
    assert!(!success, "fetch should fail before any ingest");
    assert!(stderr.contains("run ingest first"), "stderr: {}", stderr);
}

#[test]
fn test_ingest_with_no_matches_leaves_previous_table() {
    let env = setup_test_env(45000);
    let roster = env.exports.join("Roster.csv");
    fs::write(&roster, "kept").unwrap();
    run_feed(&env.config_path, &["ingest"]);

    fs::remove_file(&roster).unwrap();
    fs::write(env.exports.join("unrelated.txt"), "x").unwrap();
    let (stdout, _, success) = run_feed(&env.config_path, &["ingest"]);
    assert!(success);
    assert!(stdout.contains("no data"));

    assert_eq!(fetch_json(&env.config_path)["data"]["roster"], "kept");
}

#[test]
fn test_dry_run_writes_nothing() {
    let env = setup_test_env(2);
    fs::write(env.exports.join("PL_Units.json"), "ABCDE").unwrap();

    let (stdout, stderr, success) = run_feed(&env.config_path, &["ingest", "--dry-run"]);
    assert!(success, "dry run failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("dry-run"));
    assert!(stdout.contains("estimated rows: 3"));

    let (_, stderr, success) = run_feed(&env.config_path, &["fetch"]);
    assert!(!success);
    assert!(stderr.contains("run ingest first"));
}

#[test]
fn test_log_records_invocations() {
    let env = setup_test_env(45000);
    fs::write(env.exports.join("Roster.csv"), "r").unwrap();
    run_feed(&env.config_path, &["ingest"]);
    fetch_json(&env.config_path);
    fetch_json(&env.config_path);

    let (stdout, _, success) = run_feed(&env.config_path, &["log"]);
    assert!(success);
    assert!(stdout.contains("ingest"));
    assert!(stdout.contains("fetch_payload"));
    assert!(stdout.contains("cache_hit"));
}

#[test]
fn test_status_after_ingest() {
    let env = setup_test_env(2);
    fs::write(env.exports.join("PL_Paths.txt"), "ABC").unwrap();
    run_feed(&env.config_path, &["ingest"]);

    let (stdout, stderr, success) = run_feed(&env.config_path, &["status"]);
    assert!(success, "status failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Rows:        2"));
    assert!(stdout.contains("config|paths"));
    assert!(stdout.contains("Cache:       absent"));
}

#[test]
fn test_classify_needs_no_config() {
    let (stdout, _, success) = run_feed(
        Path::new("/nonexistent/feed.toml"),
        &["classify", "Roster_History.csv", "Roster.csv", "misc.txt"],
    );
    assert!(success);
    assert!(stdout.contains("data|rosterHistory"));
    assert!(stdout.contains("data|roster "));
    assert!(stdout.contains("(no match)"));
}

#[test]
fn test_rules_lists_table() {
    let (stdout, _, success) = run_feed(Path::new("/nonexistent/feed.toml"), &["rules"]);
    assert!(success);
    assert!(stdout.contains("PL_Paths"));
    assert!(stdout.contains("config|paths"));
}

#[test]
fn test_missing_config_fails() {
    let (_, stderr, success) = run_feed(Path::new("/nonexistent/feed.toml"), &["ingest"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_missing_source_root_fails_before_writing() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("feed.toml");
    fs::write(
        &config_path,
        format!(
            "[db]\npath = \"{}/feed.sqlite\"\n\n[store]\ntable = \"readiness_chunks\"\n",
            tmp.path().display()
        ),
    )
    .unwrap();

    let (_, stderr, success) = run_feed(&config_path, &["ingest"]);
    assert!(!success);
    assert!(stderr.contains("source.root"), "stderr: {}", stderr);
}

#[test]
fn test_dry_run_needs_only_source_root() {
    let tmp = TempDir::new().unwrap();
    let exports = tmp.path().join("exports");
    fs::create_dir_all(&exports).unwrap();
    fs::write(exports.join("Roster.csv"), "r").unwrap();
    let config_path = tmp.path().join("feed.toml");
    fs::write(
        &config_path,
        format!("[source]\nroot = \"{}\"\n", exports.display()),
    )
    .unwrap();

    let (stdout, stderr, success) = run_feed(&config_path, &["ingest", "--dry-run"]);
    assert!(success, "dry run failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("estimated rows: 1"));

    let (_, stderr, success) = run_feed(&config_path, &["ingest"]);
    assert!(!success);
    assert!(stderr.contains("db.path"), "stderr: {}", stderr);
}

#[test]
fn test_archived_subfolder_does_not_replace_current_export() {
    let env = setup_test_env(45000);
    fs::write(env.exports.join("Roster.csv"), "CURRENT").unwrap();
    let archive = env.exports.join("archive");
    fs::create_dir_all(&archive).unwrap();
    fs::write(archive.join("Roster_2025.csv"), "OLD2025").unwrap();

    let (stdout, _, success) = run_feed(&env.config_path, &["ingest"]);
    assert!(success);
    assert!(stdout.contains("matched: 1"));
    assert!(!stdout.contains("Roster_2025.csv"));

    assert_eq!(fetch_json(&env.config_path)["data"]["roster"], "CURRENT");
}

#[test]
fn test_files_sharing_a_key_are_flagged() {
    let env = setup_test_env(45000);
    fs::write(env.exports.join("Roster.csv"), "CURRENT").unwrap();
    fs::write(env.exports.join("Roster_2025.csv"), "OLD2025").unwrap();

    let (stdout, _, success) = run_feed(&env.config_path, &["ingest"]);
    assert!(success);
    assert!(stdout.contains("warning: data|roster shared by Roster.csv, Roster_2025.csv"));
}
