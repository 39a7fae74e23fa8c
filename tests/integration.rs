//! Integration tests for the cbook command line

use std::fs;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// =============================================================================
// Test Helpers
// =============================================================================

/// Isolated config, session and log files under one temp dir
struct TestEnv {
    temp_dir: TempDir,
    config_path: PathBuf,
    session_path: PathBuf,
}

impl TestEnv {
    fn new(api_url: &str) -> Self {
        Self::with_extra(api_url, "")
    }

    fn with_extra(api_url: &str, extra: &str) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let session_path = temp_dir.path().join("session.json");
        let log_path = temp_dir.path().join("cbook.log");
        let config = format!(
            "api_url = \"{}\"\nsession_file = \"{}\"\nlog_file = \"{}\"\ntimeout_secs = 5\n{}",
            api_url,
            session_path.display(),
            log_path.display(),
            extra
        );
        fs::write(&config_path, config).unwrap();
        Self {
            temp_dir,
            config_path,
            session_path,
        }
    }

    fn signed_in(self) -> Self {
        fs::write(
            &self.session_path,
            r#"{"token":"t0k3n","user":{"id":"u1","username":"ana","email":"ana@example.com"}}"#,
        )
        .unwrap();
        self
    }

    fn path(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    fn cmd(&self) -> Command {
        let mut cmd = cbook_cmd();
        cmd.arg("--config").arg(&self.config_path);
        cmd
    }
}

fn cbook_cmd() -> Command {
    let mut cmd = Command::cargo_bin("cbook").unwrap();
    cmd.env_remove("CBOOK_API_URL").env_remove("RUST_LOG");
    cmd
}

/// Answer exactly one HTTP request with a JSON body; returns the base URL and
/// a handle yielding the raw request.
fn serve_json_once(body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/api", listener.local_addr().unwrap());
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];
        while !String::from_utf8_lossy(&raw).contains("\r\n\r\n") {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
        }
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).unwrap();
        String::from_utf8_lossy(&raw).to_string()
    });
    (url, handle)
}

const TWO_CONTACTS: &str = r#"{"success":true,"data":{"contacts":[
    {"_id":"b1","firstName":"Ben","lastName":"Cruz","phone":"0918-333-4444","createdAt":"2024-03-02T00:00:00Z"},
    {"_id":"a1","firstName":"Ana","lastName":"Reyes","phone":"0917-111-2222","email":"ana@example.com","starred":true,"createdAt":"2024-03-01T00:00:00Z"}
]}}"#;

const THREE_ROWS: &str = "First Name,Last Name,Phone,Company\n\
Ana,Reyes,0917-111-2222,Acme\n\
,,,Orphan Co\n\
Ben,Cruz,0918-333-4444,\n";

fn unused_url() -> &'static str {
    "http://127.0.0.1:9/api"
}

// =============================================================================
// Init Tests
// =============================================================================

#[test]
fn test_init_writes_config() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("nested").join("config.toml");

    cbook_cmd()
        .arg("--config")
        .arg(&config_path)
        .args(["init", "--api-url", "https://contacts.example.com/api/"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote configuration"));

    let content = fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("api_url = \"https://contacts.example.com/api\""));
    assert!(content.contains("[keys.global]"));
}

#[test]
fn test_init_refuses_to_overwrite_without_force() {
    let env = TestEnv::new(unused_url());

    env.cmd()
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    env.cmd().args(["init", "--force"]).assert().success();
    let content = fs::read_to_string(&env.config_path).unwrap();
    assert!(content.contains("# cbook configuration"));
}

#[test]
fn test_init_rejects_non_http_url() {
    let temp_dir = TempDir::new().unwrap();
    cbook_cmd()
        .arg("--config")
        .arg(temp_dir.path().join("config.toml"))
        .args(["init", "--api-url", "ftp://example.com"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("http or https"));
}

// =============================================================================
// Config Tests
// =============================================================================

#[test]
fn test_missing_explicit_config_fails() {
    let temp_dir = TempDir::new().unwrap();
    cbook_cmd()
        .arg("--config")
        .arg(temp_dir.path().join("absent.toml"))
        .arg("recent")
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration file not found"));
}

#[test]
fn test_zero_page_size_is_rejected() {
    let env = TestEnv::with_extra(unused_url(), "\n[view]\npage_size = 0\n");
    env.cmd()
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("page_size must be at least 1"));
}

#[test]
fn test_unknown_key_is_only_a_warning() {
    let env = TestEnv::with_extra(unused_url(), "colour = \"orange\"\n");
    let csv = env.path("contacts.csv");
    fs::write(&csv, THREE_ROWS).unwrap();

    env.cmd()
        .arg("import")
        .arg(&csv)
        .arg("--dry-run")
        .assert()
        .success()
        .stderr(predicate::str::contains("colour"));
}

// =============================================================================
// Session Tests
// =============================================================================

#[test]
fn test_contact_commands_require_login() {
    let env = TestEnv::new(unused_url());
    for args in [vec!["list"], vec!["export"], vec!["star", "a1"]] {
        env.cmd()
            .args(&args)
            .assert()
            .failure()
            .stderr(predicate::str::contains("not logged in"));
    }
}

#[test]
fn test_login_reports_unreachable_server() {
    let env = TestEnv::new(unused_url());
    env.cmd()
        .args(["login", "ana@example.com", "--password-stdin"])
        .write_stdin("secret1\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to connect to server."));
    assert!(!env.session_path.exists());
}

#[test]
fn test_login_stores_session() {
    let (url, server) = serve_json_once(
        r#"{"success":true,"data":{"token":"abc","user":{"_id":"u1","username":"ana","email":"ana@example.com"}}}"#,
    );
    let env = TestEnv::new(&url);

    env.cmd()
        .args(["login", "ana@example.com", "--password-stdin"])
        .write_stdin("secret1\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Signed in as ana"));

    let request = server.join().unwrap();
    assert!(request.starts_with("POST /api/auth/login"));
    let session = fs::read_to_string(&env.session_path).unwrap();
    assert!(session.contains("\"abc\""));

    env.cmd()
        .arg("logout")
        .assert()
        .success()
        .stdout(predicate::str::contains("Signed out."));
    assert!(!env.session_path.exists());
}

#[test]
fn test_register_checks_password_length_before_sending() {
    let env = TestEnv::new(unused_url());
    env.cmd()
        .args(["register", "ana", "ana@example.com", "--password-stdin"])
        .write_stdin("abc\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least 6 characters"));
}

// =============================================================================
// Contact Tests
// =============================================================================

#[test]
fn test_list_groups_by_initial() {
    let (url, server) = serve_json_once(TWO_CONTACTS);
    let env = TestEnv::new(&url).signed_in();

    env.cmd()
        .arg("list")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("-- A --")
                .and(predicate::str::contains("Ana Reyes"))
                .and(predicate::str::contains("-- B --"))
                .and(predicate::str::contains("Page 1 of 1")),
        );

    let request = server.join().unwrap();
    assert!(request.starts_with("GET /api/contact "));
    assert!(request
        .to_ascii_lowercase()
        .contains("authorization: bearer t0k3n"));
}

#[test]
fn test_list_starred_filter() {
    let (url, _server) = serve_json_once(TWO_CONTACTS);
    let env = TestEnv::new(&url).signed_in();

    env.cmd()
        .args(["list", "--starred"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Ana Reyes").and(predicate::str::contains("Ben").not()));
}

#[test]
fn test_export_writes_csv() {
    let (url, _server) = serve_json_once(TWO_CONTACTS);
    let env = TestEnv::new(&url).signed_in();
    let out = env.path("out.csv");

    env.cmd()
        .arg("export")
        .arg("--output")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 2 contacts"));

    let text = fs::read_to_string(&out).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("First Name,Last Name,Email,Phone,Company,Job Title,Address,Social Media Links,Notes,Starred")
    );
    assert_eq!(text.lines().count(), 3);
    assert!(!text.ends_with('\n'));
}

// =============================================================================
// Import Tests
// =============================================================================

#[test]
fn test_import_dry_run_counts_rows() {
    let env = TestEnv::new(unused_url());
    let csv = env.path("contacts.csv");
    fs::write(&csv, THREE_ROWS).unwrap();

    env.cmd()
        .arg("import")
        .arg(&csv)
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Import complete: 2 succeeded, 1 failed.")
                .and(predicate::str::contains("row 2")),
        );
}

#[test]
fn test_import_missing_file_fails() {
    let env = TestEnv::new(unused_url());
    env.cmd()
        .args(["import", "does-not-exist.csv", "--dry-run"])
        .current_dir(env.temp_dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read"));
}

#[test]
fn test_import_header_only_file_fails() {
    let env = TestEnv::new(unused_url());
    let csv = env.path("empty.csv");
    fs::write(&csv, "First Name,Phone\n").unwrap();
    assert_no_contacts(&env, &csv);
}

fn assert_no_contacts(env: &TestEnv, csv: &Path) {
    env.cmd()
        .arg("import")
        .arg(csv)
        .arg("--dry-run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No contacts found"));
}
