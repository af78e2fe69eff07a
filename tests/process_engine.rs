//! `ProcessEngine` against small shell-script engines.
#![cfg(unix)]

mod common;

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use common::Archive;
use synthpro::{
    Calendar, PeriodKeyResolver, ProcessEngine, SynthesisError, SynthesisRunner, plan_batch,
};

fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

const WRITES_PRODUCT: &str = r#"
while [ $# -gt 0 ]; do
  case "$1" in
    --out) out="$2"; shift ;;
    --date) date="$2"; shift ;;
  esac
  shift
done
echo "synthesizing $date into $out"
mkdir -p "$out/SENTINEL2X_${date}-000000-000_L3A_T31TCJ_C_V1-0"
"#;

#[test]
fn successful_engine_produces_the_scheduled_period() {
    let archive = Archive::new();
    archive.add_descriptor("T31TCJ", "20240105");
    let engine = ProcessEngine::new(script(archive.root.path(), "engine.sh", WRITES_PRODUCT));
    let plan = plan_batch(&archive.l2(), &archive.l3(), Calendar::Gregorian).unwrap();
    let runner = SynthesisRunner::new(
        engine,
        archive.params(),
        PeriodKeyResolver::new(Calendar::Gregorian),
    )
    .unwrap();

    let outcome = runner.run(&plan.items[0]).unwrap();

    assert_eq!(outcome.products.len(), 1);
    assert!(
        archive
            .l3()
            .join("T31TCJ")
            .join("SENTINEL2X_20240115-000000-000_L3A_T31TCJ_C_V1-0")
            .is_dir()
    );
    let log = archive
        .scratch()
        .join("T31TCJ")
        .join("202401")
        .join("engine_T31TCJ_202401.log");
    assert!(fs::read_to_string(log).unwrap().contains("synthesizing 20240115"));
}

#[test]
fn non_zero_exit_fails_with_log_tail() {
    let archive = Archive::new();
    archive.add_descriptor("T31TCJ", "20240105");
    let engine = ProcessEngine::new(script(
        archive.root.path(),
        "failing.sh",
        "echo 'reading inputs'\necho 'no valid pixels' >&2\nexit 3",
    ));
    let plan = plan_batch(&archive.l2(), &archive.l3(), Calendar::Gregorian).unwrap();
    let runner = SynthesisRunner::new(
        engine,
        archive.params(),
        PeriodKeyResolver::new(Calendar::Gregorian),
    )
    .unwrap();

    match runner.run(&plan.items[0]) {
        Err(SynthesisError::Exit { log_tail, .. }) => {
            assert!(log_tail.contains("no valid pixels"), "tail: {log_tail}");
        }
        other => panic!("expected exit failure, got {other:?}"),
    }
}

#[test]
fn missing_executable_is_a_launch_failure() {
    let archive = Archive::new();
    archive.add_descriptor("T31TCJ", "20240105");
    let engine = ProcessEngine::new(archive.root.path().join("no-such-engine"));
    let plan = plan_batch(&archive.l2(), &archive.l3(), Calendar::Gregorian).unwrap();
    let runner = SynthesisRunner::new(
        engine,
        archive.params(),
        PeriodKeyResolver::new(Calendar::Gregorian),
    )
    .unwrap();

    assert!(matches!(
        runner.run(&plan.items[0]),
        Err(SynthesisError::Launch { .. })
    ));
}

#[test]
fn slow_engine_is_killed_after_timeout() {
    let archive = Archive::new();
    archive.add_descriptor("T31TCJ", "20240105");
    let engine = ProcessEngine::new(script(archive.root.path(), "slow.sh", "sleep 30"))
        .with_timeout(Some(Duration::from_secs(1)));
    let plan = plan_batch(&archive.l2(), &archive.l3(), Calendar::Gregorian).unwrap();
    let runner = SynthesisRunner::new(
        engine,
        archive.params(),
        PeriodKeyResolver::new(Calendar::Gregorian),
    )
    .unwrap();

    let summary = runner.run_batch(&plan.items);

    assert_eq!(summary.failed(), 1);
    assert!(matches!(summary.failures[0].error, SynthesisError::Timeout(_)));
}

#[test]
fn product_of_a_crashed_engine_is_removed_and_rescheduled() {
    let archive = Archive::new();
    archive.add_descriptor("T31TCJ", "20240105");
    let body = format!("{WRITES_PRODUCT}\nexit 1");
    let engine = ProcessEngine::new(script(archive.root.path(), "crash.sh", &body));
    let plan = plan_batch(&archive.l2(), &archive.l3(), Calendar::Gregorian).unwrap();
    let runner = SynthesisRunner::new(
        engine,
        archive.params(),
        PeriodKeyResolver::new(Calendar::Gregorian),
    )
    .unwrap();

    assert!(matches!(
        runner.run(&plan.items[0]),
        Err(SynthesisError::Exit { .. })
    ));
    assert!(
        !archive
            .l3()
            .join("T31TCJ")
            .join("SENTINEL2X_20240115-000000-000_L3A_T31TCJ_C_V1-0")
            .exists()
    );
    let rescan = plan_batch(&archive.l2(), &archive.l3(), Calendar::Gregorian).unwrap();
    assert_eq!(rescan.items, plan.items);
}
