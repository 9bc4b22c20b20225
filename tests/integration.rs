use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn postline_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("postline");
    path
}

const DOCUMENT: &str = "Day 1:\nHello world, this is a real post.\n—\nAnother valid post right here.\n---\n- \n- \n-\n";

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let docs_dir = root.join("docs");
    fs::create_dir_all(&docs_dir).unwrap();
    fs::write(docs_dir.join("week.md"), DOCUMENT).unwrap();
    fs::write(docs_dir.join("blank.md"), "\n   \n—\n---\n").unwrap();

    // Port 9 on localhost refuses connections, so every delivery fails fast.
    let config_content = format!(
        r#"[db]
path = "{}/data/postline.sqlite"

[retry]
backoff_secs = [1]
inter_post_delay_ms = 0

[publisher]
endpoint = "http://127.0.0.1:9/posts"
timeout_secs = 2

[server]
bind = "127.0.0.1:7340"
"#,
        root.display()
    );

    let config_path = config_dir.join("postline.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_postline(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = postline_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run postline binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn add_client(config_path: &Path) -> String {
    let (stdout, stderr, success) = run_postline(
        config_path,
        &["client", "add", "Acme", "--credential", "acme-token"],
    );
    assert!(success, "client add failed: stdout={}, stderr={}", stdout, stderr);
    stdout.trim().to_string()
}

fn field<'a>(stdout: &'a str, name: &str) -> &'a str {
    let prefix = format!("{}: ", name);
    stdout
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix(prefix.as_str()))
        .unwrap_or_else(|| panic!("no '{}' line in output: {}", name, stdout))
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_postline(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/postline.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_postline(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_postline(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_invalid_config_is_rejected() {
    let (_tmp, config_path) = setup_test_env();
    let content = fs::read_to_string(&config_path).unwrap();
    fs::write(
        &config_path,
        format!("{}\n[pipeline]\npre_weight = 0.9\npost_weight = 0.9\n", content),
    )
    .unwrap();

    let (_, stderr, success) = run_postline(&config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("must equal 1.0"), "stderr: {}", stderr);
}

#[test]
fn test_client_add_and_list() {
    let (_tmp, config_path) = setup_test_env();
    run_postline(&config_path, &["init"]);

    let id = add_client(&config_path);
    assert_eq!(id.len(), 36);

    let (stdout, _, success) = run_postline(&config_path, &["client", "list"]);
    assert!(success);
    assert!(stdout.contains(&id));
    assert!(stdout.contains("Acme"));
    assert!(!stdout.contains("acme-token"));
}

#[test]
fn test_preview_reports_each_chunk() {
    let (tmp, config_path) = setup_test_env();
    let doc = tmp.path().join("docs/week.md");

    let (stdout, stderr, success) =
        run_postline(&config_path, &["preview", doc.to_str().unwrap()]);
    assert!(success, "preview failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("#0 accepted"));
    assert!(stdout.contains("fixed: Removed Day header"));
    assert!(stdout.contains("#2 rejected score=0 stage=pre-validation"));
    assert!(stdout.contains("3 chunks: 2 accepted, 1 rejected"));
}

#[test]
fn test_import_requires_known_client() {
    let (tmp, config_path) = setup_test_env();
    run_postline(&config_path, &["init"]);
    let doc = tmp.path().join("docs/week.md");

    let (_, stderr, success) = run_postline(
        &config_path,
        &["import", "--file", doc.to_str().unwrap(), "--client", "nope"],
    );
    assert!(!success);
    assert!(stderr.contains("client not found"));
}

#[test]
fn test_import_requires_exactly_one_source() {
    let (_tmp, config_path) = setup_test_env();
    let (_, _, success) = run_postline(&config_path, &["import", "--client", "x"]);
    assert!(!success);

    let (_, _, success) = run_postline(
        &config_path,
        &["import", "--text", "a", "--url", "http://x", "--client", "x"],
    );
    assert!(!success);
}

#[test]
fn test_import_blank_document_fails_operation() {
    let (tmp, config_path) = setup_test_env();
    run_postline(&config_path, &["init"]);
    let client = add_client(&config_path);
    let doc = tmp.path().join("docs/blank.md");

    let (stdout, stderr, success) = run_postline(
        &config_path,
        &["import", "--file", doc.to_str().unwrap(), "--client", &client],
    );
    assert!(success, "import failed: stdout={}, stderr={}", stdout, stderr);
    assert_eq!(field(&stdout, "status"), "failed");
    assert_eq!(field(&stdout, "error"), "Document produced no post chunks");
}

#[test]
fn test_import_with_unreachable_publisher_then_retry_until_exhausted() {
    let (tmp, config_path) = setup_test_env();
    run_postline(&config_path, &["init"]);
    let client = add_client(&config_path);
    let doc = tmp.path().join("docs/week.md");

    let (stdout, stderr, success) = run_postline(
        &config_path,
        &["import", "--file", doc.to_str().unwrap(), "--client", &client],
    );
    assert!(success, "import failed: stdout={}, stderr={}", stdout, stderr);
    assert_eq!(field(&stdout, "status"), "failed");
    assert_eq!(field(&stdout, "posts"), "3");
    assert_eq!(field(&stdout, "sent"), "0");
    assert_eq!(field(&stdout, "failed (retry scheduled)"), "2");
    assert_eq!(field(&stdout, "rejected"), "1");
    assert_eq!(field(&stdout, "corrected"), "1");
    let operation_id = field(&stdout, "operation").to_string();

    let (stdout, _, success) = run_postline(&config_path, &["operation", &operation_id]);
    assert!(success);
    assert!(stdout.contains("[0] failed score="));
    assert!(stdout.contains("retries=1"));
    assert!(stdout.contains("[2] rejected score=0"));

    // The single backoff step is 1s; wait it out and retry once more.
    std::thread::sleep(std::time::Duration::from_millis(2100));
    let (stdout, stderr, success) = run_postline(&config_path, &["retry", "run-once"]);
    assert!(success, "retry failed: stdout={}, stderr={}", stdout, stderr);
    assert_eq!(field(&stdout, "attempted"), "2");
    assert_eq!(field(&stdout, "permanently failed"), "2");

    let (stdout, _, success) = run_postline(&config_path, &["status"]);
    assert!(success);
    assert!(stdout.contains("Permanently failed:  2"));
    assert!(stdout.contains("Rejected:            1"));
}
