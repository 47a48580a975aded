//! Runs the `casefolio` binary against the fake service.

mod support;

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::process::Command;

use casefolio::resume::{ResumeFile, ResumeState};
use support::{pain_result, FakeBackend};

fn setup_test_env(base_url: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[backend]
base_url = "{}"
api_key = "demo"
timeout_secs = 5

[polling]
interval_ms = 10
max_attempts = 50
max_consecutive_failures = 3

[state]
dir = "{}/state"
"#,
        base_url,
        root.display()
    );
    let config_path = config_dir.join("casefolio.toml");
    fs::write(&config_path, config_content).unwrap();

    fs::write(
        root.join("notes.txt"),
        "On 01/10/2024, patient reported severe pain. On 02/15/2024, patient denied any pain.",
    )
    .unwrap();

    (tmp, config_path)
}

async fn run_casefolio(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_casefolio"))
        .arg("--config")
        .arg(config_path)
        .arg("--progress")
        .arg("off")
        .args(args)
        .env_remove("CASEFOLIO_API_KEY")
        .output()
        .await
        .expect("failed to run casefolio binary");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[tokio::test]
async fn test_health_reports_reachable() {
    let fake = FakeBackend::default();
    let url = fake.spawn().await;
    let (_tmp, config) = setup_test_env(&url);

    let (stdout, _, ok) = run_casefolio(&config, &["health"]).await;
    assert!(ok);
    assert!(stdout.contains("reachable"));
    assert!(stdout.contains("demo"));
}

#[tokio::test]
async fn test_health_reports_unreachable_without_failing() {
    let (_tmp, config) = setup_test_env("http://127.0.0.1:9");

    let (stdout, stderr, ok) = run_casefolio(&config, &["health"]).await;
    assert!(ok);
    assert!(stdout.contains("unreachable"));
    assert!(stderr.contains("Backend unreachable"));
}

#[tokio::test]
async fn test_process_prints_timeline() {
    let fake = FakeBackend::default();
    fake.queue_job_id("job-1");
    fake.script(
        "job-1",
        vec![
            serde_json::json!({"job_id": "job-1", "state": "PENDING"}),
            pain_result("job-1"),
        ],
    );
    let url = fake.spawn().await;
    let (tmp, config) = setup_test_env(&url);
    let file = tmp.path().join("notes.txt");

    let (stdout, stderr, ok) = run_casefolio(
        &config,
        &["process", file.to_str().unwrap(), "--case-id", "demo-001"],
    )
    .await;
    assert!(ok, "stderr: {}", stderr);
    assert!(stdout.contains("job_id: job-1"));
    assert!(stdout.contains("Patient reported severe pain"));
    assert!(stdout.contains("Contradictions:"));

    let first = stdout.find("2024-01-10").unwrap();
    let second = stdout.find("2024-02-15").unwrap();
    assert!(first < second);

    let submitted = fake.submissions();
    assert_eq!(submitted[0]["case_id"], "demo-001");
    assert_eq!(submitted[0]["document_name"], "notes.txt");
}

#[tokio::test]
async fn test_timeline_conflicts_filter() {
    let fake = FakeBackend::default();
    fake.script("job-1", vec![pain_result("job-1")]);
    let url = fake.spawn().await;
    let (_tmp, config) = setup_test_env(&url);

    let (stdout, _, ok) =
        run_casefolio(&config, &["timeline", "job-1", "--filter", "conflicts"]).await;
    assert!(ok);
    assert!(stdout.contains("filter: conflicts"));
    assert!(stdout.contains("! 2024-01-10"));
}

#[tokio::test]
async fn test_timeline_of_unfinished_job_fails() {
    let fake = FakeBackend::default();
    fake.script(
        "job-1",
        vec![serde_json::json!({"job_id": "job-1", "state": "ANALYZING"})],
    );
    let url = fake.spawn().await;
    let (_tmp, config) = setup_test_env(&url);

    let (_, stderr, ok) = run_casefolio(&config, &["timeline", "job-1"]).await;
    assert!(!ok);
    assert!(stderr.contains("not finished"));
}

#[tokio::test]
async fn test_anchor_event_shows_source_page() {
    let fake = FakeBackend::default();
    fake.script("job-1", vec![pain_result("job-1")]);
    let url = fake.spawn().await;
    let (_tmp, config) = setup_test_env(&url);

    let (stdout, _, ok) = run_casefolio(&config, &["anchor", "job-1", "--event", "11"]).await;
    assert!(ok);
    assert!(stdout.contains("page      2"));
    assert!(stdout.contains("highlight 2"));

    let (stdout, _, ok) = run_casefolio(&config, &["anchor", "job-1", "--fact", "999"]).await;
    assert!(ok);
    assert!(stdout.contains("fact not found"));
}

#[tokio::test]
async fn test_export_writes_file() {
    let fake = FakeBackend::default();
    fake.script("job-1", vec![pain_result("job-1")]);
    let url = fake.spawn().await;
    let (tmp, config) = setup_test_env(&url);
    let out = tmp.path().join("timeline.json");

    let (_, _, ok) = run_casefolio(
        &config,
        &[
            "export",
            "job-1",
            "--case-name",
            "Johnson v. Smith Motors",
            "--output",
            out.to_str().unwrap(),
        ],
    )
    .await;
    assert!(ok);

    let export: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(export["case_name"], "Johnson v. Smith Motors");
    assert_eq!(export["facts_count"], 2);
    assert_eq!(export["events"][0]["date"], "2024-01-10");
    assert_eq!(export["events"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_resume_without_state_is_a_no_op() {
    let (_tmp, config) = setup_test_env("http://127.0.0.1:9");

    let (stdout, _, ok) = run_casefolio(&config, &["resume"]).await;
    assert!(ok);
    assert!(stdout.contains("Nothing to resume"));
}

#[tokio::test]
async fn test_resume_polls_recorded_job_to_completion() {
    let fake = FakeBackend::default();
    fake.script(
        "job-9",
        vec![
            serde_json::json!({"job_id": "job-9", "state": "ANALYZING"}),
            pain_result("job-9"),
        ],
    );
    let url = fake.spawn().await;
    let (tmp, config) = setup_test_env(&url);
    let resume = ResumeFile::in_dir(&tmp.path().join("state"));
    resume.save(&ResumeState::new("job-9".into(), 2));

    let (stdout, stderr, ok) = run_casefolio(&config, &["resume"]).await;
    assert!(ok, "stderr: {}", stderr);
    assert!(stdout.contains("Resuming job job-9 (page 2"));
    assert!(stdout.contains("Patient denied any pain"));
    assert!(stdout.contains("Contradictions:"));
    assert!(fake.status_calls() >= 2);
    assert!(fake.submissions().is_empty());
}
