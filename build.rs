//! Stamps the binary with its source revision and build time for `--version`

use chrono::{DateTime, Utc};
use std::process::Command;

fn main() {
    emit("GIT_COMMIT_HASH", &revision().unwrap_or_else(|| "unknown".into()));
    emit("BUILD_TIMESTAMP", &build_time().format("%Y-%m-%d %H:%M:%S UTC").to_string());

    for watched in [".git/HEAD", ".git/refs/heads"] {
        println!("cargo:rerun-if-changed={watched}");
    }
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");
}

fn emit(key: &str, value: &str) {
    println!("cargo:rustc-env={key}={value}");
}

/// Short hash of the checked-out commit, if built from a git checkout
fn revision() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())?;
    let hash = String::from_utf8(output.stdout).ok()?;
    let hash = hash.trim();
    (!hash.is_empty()).then(|| hash.to_string())
}

/// `SOURCE_DATE_EPOCH` for reproducible builds, otherwise now
fn build_time() -> DateTime<Utc> {
    std::env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|epoch| epoch.trim().parse::<i64>().ok())
        .and_then(|seconds| DateTime::from_timestamp(seconds, 0))
        .unwrap_or_else(Utc::now)
}
