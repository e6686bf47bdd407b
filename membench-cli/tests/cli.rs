//! End-to-end runs of the membench binary

use std::process::{Command, Output};

use tempfile::TempDir;

fn membench(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_membench"))
        .args(args)
        .env("RUST_LOG", "membench=info")
        .output()
        .expect("failed to run membench")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

#[test]
fn test_ram_two_threads() {
    let output = membench(&["ram", "-j2", "-b=1M", "-n1", "--verbose"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let text = stdout(&output);
    assert!(text.starts_with("Running with 2 thread(s), 1 MB buffer per thread, 1 iteration(s)\n"));
    assert!(text.contains("Thread 0: Write "));
    assert!(text.contains("Thread 1: Write "));
    assert!(text.contains("=== Aggregate Results ==="));
    assert!(text.contains("Total Write Speed: "));
    assert!(text.contains("Total Read Speed:  "));
}

#[test]
fn test_ram_json_totals_are_sums() {
    let output = membench(&["ram", "-j", "2", "-b", "256K", "-n", "2", "--json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let workers = report["workers"].as_array().unwrap();
    assert_eq!(workers.len(), 2);

    let write_sum: f64 = workers.iter().map(|w| w["write_speed_mb_per_s"].as_f64().unwrap()).sum();
    let read_sum: f64 = workers.iter().map(|w| w["read_speed_mb_per_s"].as_f64().unwrap()).sum();
    assert!(workers.iter().all(|w| w["write_speed_mb_per_s"].as_f64().unwrap() > 0.0));
    assert_eq!(report["aggregate"]["total_write_speed_mb_per_s"].as_f64().unwrap(), write_sum);
    assert_eq!(report["aggregate"]["total_read_speed_mb_per_s"].as_f64().unwrap(), read_sum);
}

#[test]
fn test_malformed_buffer_size_fails_before_running() {
    let output = membench(&["ram", "-b=12X"]);
    assert!(!output.status.success());
    assert!(!stdout(&output).contains("Aggregate Results"));
    assert!(stderr(&output).contains("12X"));
}

#[test]
fn test_zero_threads_rejected() {
    let output = membench(&["ram", "-j0", "-b=64"]);
    assert!(!output.status.success());
    assert!(!stdout(&output).contains("Aggregate Results"));
    assert!(stderr(&output).contains("thread count must be at least 1"));
}

#[test]
fn test_allocation_failure_still_reports() {
    let output = membench(&["ram", "-j2", "-b=16000000000G", "-n1", "-v"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let text = stdout(&output);
    assert!(text.contains("Thread 0: allocation failed"));
    assert!(text.contains("Thread 1: allocation failed"));
    assert!(text.contains("Total Write Speed: 0.00 MB/s"));
    assert!(text.contains("Total Read Speed:  0.00 MB/s"));
    assert!(stderr(&output).contains("memory allocation failed"));
}

#[test]
fn test_unknown_flag_rejected() {
    let output = membench(&["ram", "--bogus"]);
    assert!(!output.status.success());
    assert!(stdout(&output).is_empty());
}

#[test]
fn test_help_exits_zero() {
    let output = membench(&["ram", "--help"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("--threads"));
    assert!(text.contains("--buffer-size"));
    assert!(text.contains("--iterations"));
    assert!(!text.contains("Aggregate Results"));
}

#[test]
fn test_settings_file_supplies_defaults() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("membench.toml");
    std::fs::write(&config, "[ram]\nthreads = 3\nbuffer_size = \"128K\"\niterations = 1\n").unwrap();

    let output = membench(&["--config", config.to_str().unwrap(), "ram"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).starts_with("Running with 3 thread(s), 0 MB buffer per thread, 1 iteration(s)"));

    // Flags win over the file
    let output = membench(&["--config", config.to_str().unwrap(), "ram", "-j1"]);
    assert!(stdout(&output).starts_with("Running with 1 thread(s)"));
}

#[test]
fn test_missing_settings_file_fails() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("absent.toml");
    let output = membench(&["--config", missing.to_str().unwrap(), "ram", "-b=64"]);
    assert!(!output.status.success());
}

#[test]
fn test_file_io_small_sweep() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("io.dat");
    let output = membench(&["file-io", "--path", path.to_str().unwrap(), "--sizes", "1,2"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let text = stdout(&output);
    assert!(text.contains("Size: 1 MB | Write: "));
    assert!(text.contains("Size: 2 MB | Write: "));
    assert!(!path.exists());
}

#[test]
fn test_mmap_small_sweep() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("map.bin");
    let output = membench(&["mmap", "--path", path.to_str().unwrap(), "--sizes", "1", "-s=0", "-n=0"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let text = stdout(&output);
    assert!(text.starts_with("Using MS_ASYNC\nF_NOCACHE=0\n"));
    assert!(text.contains("Size: 1 MB\nWrite+msync: "));
    assert!(text.contains("Checksum   : 133693440"));
    assert!(!path.exists());
}

#[test]
fn test_mmap_rejects_out_of_range_flag() {
    let output = membench(&["mmap", "-s=2"]);
    assert!(!output.status.success());
}

#[test]
fn test_ramdisk_check_local() {
    let dir = TempDir::new().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_membench"))
        .args(["ramdisk", "check", "--local"])
        .current_dir(dir.path())
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "Read: Hello from RAM!\n");
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}
