use assert_cmd::prelude::*;
use serde_json::Value;
use std::fs;
use std::process::Command;
use tempfile::TempDir;

const MANIFEST: &str = r#"
title: Corner Bakery
sections:
  - id: hours
    title: Opening hours
    content: Daily 7-3
    priority: high
  - id: menu
    title: Menu
    summary: Sourdough, rye and 6 more
    content: { items: [Sourdough, Rye, Baguette] }
    priority: low
  - id: reviews
    mode: collapsible
    summary: 212 reviews
    content: Best croissant in town.
    trigger: { strategy: manual }
script:
  - { at_ms: 10, action: expand, section: reviews }
"#;

fn workspace() -> (TempDir, String) {
    let dir = tempfile::tempdir().expect("tempdir");
    let manifest = dir.path().join("bakery.yaml");
    fs::write(&manifest, MANIFEST).expect("write manifest");
    let manifest = manifest.to_str().expect("utf8 path").to_string();
    (dir, manifest)
}

fn pagedefer(dir: &TempDir) -> Command {
    let bin = assert_cmd::cargo::cargo_bin!("pagedefer");
    let mut cmd = Command::new(bin);
    cmd.current_dir(dir.path())
        .env_remove("RUST_LOG")
        .env_remove("PAGEDEFER_POLICY_OVERRIDE_JSON")
        .env_remove("PAGEDEFER_POLICY_CLI_OVERRIDES");
    cmd
}

#[test]
fn render_prints_crawler_view() {
    let (dir, manifest) = workspace();
    let assert = pagedefer(&dir)
        .args(["render", manifest.as_str()])
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 output");

    assert!(stdout.starts_with("<!DOCTYPE html>"));
    assert!(stdout.contains("Daily 7-3"));
    assert!(stdout.contains("Sourdough, rye and 6 more"));
    assert!(!stdout.contains("Baguette"));
    assert!(stdout.contains("href=\"#reviews\""));
    assert!(stdout.contains("aria-controls=\"reviews-panel\""));
}

#[test]
fn streamed_render_produces_the_same_sections() {
    let (dir, manifest) = workspace();
    let assert = pagedefer(&dir)
        .args(["render", manifest.as_str(), "--stream"])
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 output");
    assert!(stdout.trim_end().ends_with("</main></body></html>"));
    assert_eq!(stdout.matches("<section ").count(), 3);
}

#[test]
fn simulate_reports_json_timeline() {
    let (dir, manifest) = workspace();
    let assert = pagedefer(&dir)
        .args(["--output", "json", "simulate", manifest.as_str(), "--max-ms", "300"])
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 output");
    let value: Value = serde_json::from_str(stdout.trim()).expect("valid json");

    let sections = value["sections"].as_array().unwrap();
    assert_eq!(sections.len(), 3);
    assert_eq!(sections[0]["cause"].as_str(), Some("immediate"));
    assert_eq!(sections[2]["strategy"].as_str(), Some("manual"));
    assert_eq!(sections[2]["cause"].as_str(), Some("manual"));
    assert!(value["metrics"]["armed"].as_u64().is_some());
}

#[test]
fn policy_show_reports_cli_overrides() {
    let (dir, _) = workspace();
    let assert = pagedefer(&dir)
        .args([
            "--output",
            "json",
            "--set",
            "activation.min_delay_ms=50",
            "policy",
            "show",
        ])
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 output");
    let value: Value = serde_json::from_str(stdout.trim()).expect("valid json");

    assert_eq!(value["activation"]["min_delay_ms"].as_u64(), Some(50));
    assert_eq!(value["activation"]["interaction_ceiling_ms"].as_u64(), Some(3000));
    assert_eq!(
        value["provenance"]["activation.min_delay_ms"]["source"].as_str(),
        Some("Cli")
    );
}

#[test]
fn missing_manifest_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    pagedefer(&dir)
        .args(["render", "does-not-exist.yaml"])
        .assert()
        .failure();
}
