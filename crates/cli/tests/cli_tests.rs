//! CLI integration tests

use std::process::Command;

fn run_ilab(args: &[&str]) -> std::process::Output {
    let mut full = vec!["run", "-p", "ilab-cli", "--"];
    full.extend_from_slice(args);
    Command::new("cargo")
        .args(&full)
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = run_ilab(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("Infra-Lab"), "Should show app name");
    assert!(stdout.contains("presets"), "Should show presets command");
    assert!(stdout.contains("render"), "Should show render command");
    assert!(
        stdout.contains("estimate-cost"),
        "Should show estimate-cost command"
    );
    assert!(stdout.contains("lint"), "Should show lint command");
    assert!(stdout.contains("rollout"), "Should show rollout command");
    assert!(stdout.contains("validate"), "Should show validate command");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = run_ilab(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("ilab"), "Should show binary name");
}

/// Test render subcommand help
#[test]
fn test_render_help() {
    let output = run_ilab(&["render", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Render help should succeed");
    assert!(stdout.contains("--preset"), "Should show preset option");
    assert!(
        stdout.contains("--sample-rate"),
        "Should show sample-rate option"
    );
    assert!(
        stdout.contains("--filter-mode"),
        "Should show filter-mode option"
    );
    assert!(stdout.contains("--output"), "Should show output option");
}

/// Test estimate-cost subcommand help
#[test]
fn test_estimate_cost_help() {
    let output = run_ilab(&["estimate-cost", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Estimate help should succeed");
    assert!(stdout.contains("--hosts"), "Should show hosts option");
    assert!(stdout.contains("--nrdb"), "Should show nrdb option");
    assert!(
        stdout.contains("--window-hours"),
        "Should show window-hours option"
    );
}

/// Test rollout subcommand help
#[test]
fn test_rollout_help() {
    let output = run_ilab(&["rollout", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Rollout help should succeed");
    assert!(stdout.contains("--backend"), "Should show backend option");
    assert!(stdout.contains("--force"), "Should show force option");
    assert!(stdout.contains("print"), "Should list print backend");
    assert!(stdout.contains("ssh"), "Should list ssh backend");
    assert!(stdout.contains("ansible"), "Should list ansible backend");
}

/// Test validate subcommand help
#[test]
fn test_validate_help() {
    let output = run_ilab(&["validate", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Validate help should succeed");
    assert!(stdout.contains("--expected"), "Should show expected option");
    assert!(
        stdout.contains("--threshold"),
        "Should show threshold option"
    );
}

/// Test format option
#[test]
fn test_format_option() {
    let output = run_ilab(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(stdout.contains("--format"), "Should show format option");
    assert!(stdout.contains("table"), "Should show table format");
    assert!(stdout.contains("json"), "Should show json format");
}

/// Test invalid command error handling
#[test]
fn test_invalid_command() {
    let output = run_ilab(&["invalid-command"]);
    assert!(!output.status.success(), "Invalid command should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("error") || stderr.contains("invalid"),
        "Should show error message"
    );
}

/// Test that presets list shows the built-in presets
#[test]
fn test_presets_list() {
    let output = run_ilab(&["presets", "list"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Presets list should succeed");
    assert!(stdout.contains("web_standard"), "Should list web_standard");
    assert!(stdout.contains("jvm_large"), "Should list jvm_large");
    assert!(stdout.contains("db_primary"), "Should list db_primary");
    assert!(stdout.contains("minimal_cost"), "Should list minimal_cost");
}

/// Test render rejects an out-of-range sample rate
#[test]
fn test_render_rejects_bad_sample_rate() {
    let output = run_ilab(&["render", "--preset", "web_standard", "--sample-rate", "5"]);
    assert!(!output.status.success(), "Out-of-range rate should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("sample_rate"),
        "Should name the invalid field"
    );
}

/// Render to a file, lint it, and dry-run a rollout against it
#[test]
fn test_render_lint_rollout_flow() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config_path = dir.path().join("process-sampling.yml");
    let config_arg = config_path.to_string_lossy().to_string();

    let rendered = run_ilab(&[
        "render",
        "--preset",
        "web_standard",
        "--output",
        &config_arg,
    ]);
    assert!(rendered.status.success(), "Render should succeed");
    let yaml = std::fs::read_to_string(&config_path).expect("rendered file");
    assert!(yaml.contains("metrics_process_sample_rate: 90"));

    let linted = run_ilab(&["lint", "--config", &config_arg]);
    assert!(
        linted.status.success(),
        "web_standard render should lint clean of errors"
    );

    let rolled = run_ilab(&[
        "rollout",
        "--config",
        &config_arg,
        "--hosts",
        "web-01,web-02",
        "--backend",
        "print",
    ]);
    let stdout = String::from_utf8_lossy(&rolled.stdout);
    assert!(rolled.status.success(), "Print rollout should succeed");
    assert!(stdout.contains("web-01"), "Should report web-01");
    assert!(stdout.contains("web-02"), "Should report web-02");
}

/// Estimate without NRDB reports the static-layer confidence
#[test]
fn test_estimate_static_confidence() {
    let output = run_ilab(&[
        "--format",
        "json",
        "estimate-cost",
        "--preset",
        "web_standard",
        "--hosts",
        "10",
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Estimate should succeed");
    assert!(
        stdout.contains("\"confidence\": 0.4"),
        "Should report the static confidence"
    );
    assert!(
        stdout.contains("\"method\": \"static\""),
        "Should include the static layer"
    );
    assert!(
        stdout.contains("\"method\": \"histogram\""),
        "Should include the histogram layer"
    );
}
