use std::process::Command;

fn run_controller(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_traffic_signal"))
        .args(args)
        .env("RUST_LOG", "warn,traffic_signal=info")
        .output()
        .expect("Failed to execute controller")
}

/// Test that a short headless run completes and logs its summary
#[test]
fn test_headless_run_completes() {
    let output = run_controller(&["--cycles", "1", "--tick-ms", "1", "--seed", "7"]);

    assert!(
        output.status.success(),
        "Controller failed to run. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(stdout.contains("cycle 0"), "No status lines printed: {}", stdout);
    assert!(stdout.contains("=== Final Signals ==="));
    for direction in ["NORTH", "SOUTH", "EAST", "WEST"] {
        let line = stdout
            .lines()
            .find(|line| line.trim_start().starts_with(direction) && line.contains(':'))
            .unwrap_or_else(|| panic!("No final signal for {}", direction));
        assert!(line.ends_with("RED"), "{} not red at exit: {}", direction, line);
    }

    assert!(stderr.contains("RUN COMPLETE"), "Missing summary. stderr: {}", stderr);
    assert!(stderr.contains("Cycles completed:"));
    assert!(stderr.contains("Cycle 0: counts"));
}

/// Test that the simulated detector can be switched on
#[test]
fn test_headless_run_with_detector() {
    let output = run_controller(&[
        "--cycles", "1", "--tick-ms", "2", "--seed", "3", "--detector",
    ]);
    assert!(output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Simulated detector opened"));
    assert!(stderr.contains("Simulated detector released"));
}

/// Test that an inverted green range is refused
#[test]
fn test_invalid_timing_is_rejected() {
    let output = run_controller(&["--min-green", "40", "--max-green", "30"]);
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("exceeds maximum green"),
        "Unexpected error output: {}",
        stderr
    );
}
