use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn cspan_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("cspan");
    path
}

const DOCUMENTS: &str = r#"[
  {
    "name": "report-1",
    "meta": {"source": "integration"},
    "sentences": [
      {"position": 0, "char_start": 0, "text": "the cat sat",
       "words": ["the", "cat", "sat"], "char_offsets": [0, 4, 8],
       "lemmas": ["the", "cat", "sit"], "poses": ["DT", "NN", "VBD"]}
    ],
    "tables": [
      {"position": 0, "char_start": 12, "text": "42",
       "cells": [
         {"position": 0, "char_start": 0, "text": "42", "row_num": 0, "col_num": 1,
          "html_tag": "td",
          "phrases": [
            {"position": 0, "char_start": 0, "text": "42",
             "words": ["42"], "char_offsets": [0]}
          ]}
       ]}
    ]
  }
]"#;

fn setup_test_env() -> (TempDir, PathBuf, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/cspan.sqlite"

[extract]
max_ngrams = 2

[logging]
level = "warn"
"#,
        root.display()
    );
    let config_path = config_dir.join("cspan.toml");
    fs::write(&config_path, config_content).unwrap();

    let input_path = root.join("documents.json");
    fs::write(&input_path, DOCUMENTS).unwrap();

    (tmp, config_path, input_path)
}

fn run_cspan(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = cspan_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run cspan binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

/// Whitespace-normalized lines, for matching aligned table output.
fn normalized(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect()
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path, _) = setup_test_env();

    let (stdout, stderr, success) = run_cspan(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path, _) = setup_test_env();

    let (_, _, success1) = run_cspan(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_cspan(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_load_documents() {
    let (_tmp, config_path, input) = setup_test_env();

    run_cspan(&config_path, &["init"]);
    let (stdout, stderr, success) = run_cspan(&config_path, &["load", input.to_str().unwrap()]);
    assert!(success, "load failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("documents: 1"));
    assert!(stdout.contains("contexts inserted: 5 (existing: 0)"));
    // "the cat sat" → 5 spans of up to two tokens, "42" → 1
    assert!(stdout.contains("spans: 6 candidates, 6 distinct, 6 inserted, 0 existing"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_load_idempotent_no_duplicates() {
    let (_tmp, config_path, input) = setup_test_env();

    run_cspan(&config_path, &["init"]);
    run_cspan(&config_path, &["load", input.to_str().unwrap()]);
    let (stdout, _, success) = run_cspan(&config_path, &["load", input.to_str().unwrap()]);
    assert!(success);
    assert!(stdout.contains("contexts inserted: 0 (existing: 5)"));
    assert!(stdout.contains("0 inserted, 6 existing"));

    let (stats, _, _) = run_cspan(&config_path, &["stats"]);
    let lines = normalized(&stats);
    assert!(lines.contains(&"span 6".to_string()));
    assert!(lines.contains(&"total 11".to_string()));
}

#[test]
fn test_load_ngrams_override_and_print() {
    let (_tmp, config_path, input) = setup_test_env();

    run_cspan(&config_path, &["init"]);
    let (stdout, _, success) = run_cspan(
        &config_path,
        &["load", input.to_str().unwrap(), "--ngrams", "1", "--print-spans"],
    );
    assert!(success);
    assert!(stdout.contains("spans: 4 candidates, 4 distinct, 4 inserted"));
    assert!(stdout.contains("report-1::span:4:6\tcat\tcat"));
    assert!(stdout.contains("report-1::span:8:10\tsat\tsit"));
}

#[test]
fn test_get_by_stable_id() {
    let (_tmp, config_path, input) = setup_test_env();

    run_cspan(&config_path, &["init"]);
    run_cspan(&config_path, &["load", input.to_str().unwrap()]);

    let (stdout, stderr, success) = run_cspan(&config_path, &["get", "report-1::sentence:0:10"]);
    assert!(success, "get failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("kind:       sentence"));
    assert!(stdout.contains("the cat sat"));

    // Cell phrase offsets are document-absolute: table at 12, cell +0, phrase +0.
    let (stdout, _, success) = run_cspan(&config_path, &["get", "report-1::phrase:12:13"]);
    assert!(success);
    assert!(stdout.contains("42"));
}

#[test]
fn test_get_malformed_and_missing() {
    let (_tmp, config_path, _) = setup_test_env();

    run_cspan(&config_path, &["init"]);

    let (_, stderr, success) = run_cspan(&config_path, &["get", "not-a-stable-id"]);
    assert!(!success);
    assert!(stderr.contains("not-a-stable-id"));

    let (_, stderr, success) = run_cspan(&config_path, &["get", "nobody::document:0:0"]);
    assert!(!success);
    assert!(stderr.contains("context not found"));
}

#[test]
fn test_delete_cascades() {
    let (_tmp, config_path, input) = setup_test_env();

    run_cspan(&config_path, &["init"]);
    run_cspan(&config_path, &["load", input.to_str().unwrap()]);

    let (stdout, stderr, success) = run_cspan(&config_path, &["delete", "report-1"]);
    assert!(success, "delete failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("contexts removed: 11"));

    let (_, _, found) = run_cspan(&config_path, &["get", "report-1::sentence:0:10"]);
    assert!(!found);

    let (stats, _, _) = run_cspan(&config_path, &["stats"]);
    assert!(normalized(&stats).contains(&"total 0".to_string()));
}
