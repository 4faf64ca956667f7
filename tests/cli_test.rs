use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

/// Runs the binary with no credentials, no local engine and no config files
/// in reach.
fn storyteller(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("storyteller").unwrap();
    cmd.env_clear()
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env("STORYTELLER_LOCAL_TTS", "/nonexistent/storyteller-engine")
        .current_dir(home);
    cmd
}

#[test]
fn offline_run_prints_text_artifact_path() {
    let home = tempfile::tempdir().unwrap();
    let out = home.path().join("stories");

    let assert = storyteller(home.path())
        .arg("--output-dir")
        .arg(&out)
        .arg("My son got into a fight at school")
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let path = Path::new(stdout.trim());
    assert!(path.extension().is_some_and(|ext| ext == "txt"), "{stdout}");
    assert!(path.starts_with(&out));
    let story = fs::read_to_string(path).unwrap();
    assert!(story.contains("flower and candle"));
}

#[test]
fn key_without_endpoint_falls_back_to_templates() {
    let home = tempfile::tempdir().unwrap();
    let out = home.path().join("stories");

    let assert = storyteller(home.path())
        .env("AZURE_OPENAI_API_KEY", "real-looking-key")
        .arg("--output-dir")
        .arg(&out)
        .arg("My daughter won't share her blocks")
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let path = Path::new(stdout.trim());
    assert!(path.extension().is_some_and(|ext| ext == "txt"), "{stdout}");
    assert!(fs::read_to_string(path).unwrap().contains("twice as much fun"));
}

#[test]
fn json_summary_lists_stage_events() {
    let home = tempfile::tempdir().unwrap();

    storyteller(home.path())
        .arg("--json")
        .arg("--output-dir")
        .arg(home.path().join("out"))
        .arg("She lied about her homework")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"tier\": \"text-file\""))
        .stdout(predicate::str::contains("\"problem_type\": \"lying\""))
        .stdout(predicate::str::contains("\"stage\": \"narration\""));
}

#[test]
fn blank_problem_is_rejected() {
    let home = tempfile::tempdir().unwrap();

    storyteller(home.path())
        .arg("   ")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error: the problem description is empty"));
}

#[test]
fn help_mentions_subcommands() {
    let home = tempfile::tempdir().unwrap();

    storyteller(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("voices"));
}

#[test]
fn check_reports_missing_services() {
    let home = tempfile::tempdir().unwrap();

    storyteller(home.path())
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("not configured"));
}

#[test]
fn ssml_reads_narrative_file() {
    let home = tempfile::tempdir().unwrap();
    let narrative = home.path().join("story.txt");
    fs::write(&narrative, "Woman: Hello & welcome.\nMan: Good night.").unwrap();

    storyteller(home.path())
        .arg("ssml")
        .arg(&narrative)
        .assert()
        .success()
        .stdout(predicate::str::contains("Hello &amp; welcome."))
        .stdout(predicate::str::contains("en-US-GuyNeural"));
}

#[test]
fn config_show_redacts_secrets() {
    let home = tempfile::tempdir().unwrap();

    storyteller(home.path())
        .env("AZURE_SPEECH_KEY", "super-secret-key")
        .args(["config", "--show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("super-secret-key").not());
}
