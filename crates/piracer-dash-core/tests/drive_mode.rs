use piracer_dash_core::config::DriveModeConfig;
use piracer_dash_core::drive_mode::{
    write_snapshot, BridgeDirectionPolicy, DriveMode, DriveModeResolver,
};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::{tempdir, TempDir};

fn write_at(path: &Path, body: &str, mtime: SystemTime) {
    fs::write(path, body).unwrap();
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(mtime)
        .unwrap();
}

fn write_aged(path: &Path, body: &str, age: Duration) -> SystemTime {
    let mtime = SystemTime::now() - age;
    write_at(path, body, mtime);
    mtime
}

fn resolver(policy: BridgeDirectionPolicy) -> (TempDir, PathBuf, DriveModeResolver) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("piracer_drive_mode.json");
    let resolver = DriveModeResolver::new(&DriveModeConfig {
        snapshot_path: path.clone(),
        bridge_direction: policy,
        ..DriveModeConfig::default()
    });
    (dir, path, resolver)
}

#[test]
fn test_stale_snapshot_is_rejected() {
    let (_dir, path, mut resolver) = resolver(BridgeDirectionPolicy::Ignore);
    write_aged(&path, r#"{"direction":"R"}"#, Duration::from_millis(2500));

    assert!(!resolver.read_snapshot(SystemTime::now()));
    assert_eq!(resolver.resolve(10.0, SystemTime::now()), DriveMode::Parking);
}

#[test]
fn test_fresh_snapshot_is_accepted() {
    let (_dir, path, mut resolver) = resolver(BridgeDirectionPolicy::Ignore);
    write_aged(&path, r#"{"direction":"R"}"#, Duration::from_millis(500));

    assert_eq!(resolver.resolve(10.0, SystemTime::now()), DriveMode::Reverse);
}

#[test]
fn test_low_speed_forces_parking() {
    let (_dir, path, mut resolver) = resolver(BridgeDirectionPolicy::Ignore);
    write_aged(&path, r#"{"direction":"F"}"#, Duration::from_millis(100));

    assert_eq!(resolver.resolve(0.10, SystemTime::now()), DriveMode::Parking);
    assert_eq!(resolver.resolve(0.15, SystemTime::now()), DriveMode::Parking);
    assert_eq!(resolver.resolve(0.16, SystemTime::now()), DriveMode::Forward);
}

#[test]
fn test_last_accepted_mode_survives_staleness() {
    let (_dir, path, mut resolver) = resolver(BridgeDirectionPolicy::Ignore);
    let mtime = write_aged(&path, r#"{"direction":"reverse"}"#, Duration::ZERO);

    assert_eq!(resolver.resolve(5.0, mtime), DriveMode::Reverse);
    // Three seconds later the same file is stale; state is kept
    assert_eq!(
        resolver.resolve(5.0, mtime + Duration::from_secs(3)),
        DriveMode::Reverse
    );
}

#[test]
fn test_malformed_snapshot_is_a_noop() {
    let (_dir, path, mut resolver) = resolver(BridgeDirectionPolicy::Ignore);
    write_aged(&path, r#"{"direction":"F"}"#, Duration::ZERO);
    assert_eq!(resolver.resolve(5.0, SystemTime::now()), DriveMode::Forward);

    for body in ["not json", "[]", r#"{"direction": 3}"#, r#"{"direction": ""}"#, "{}"] {
        write_aged(&path, body, Duration::ZERO);
        assert!(!resolver.read_snapshot(SystemTime::now()), "{body}");
        assert_eq!(resolver.resolve(5.0, SystemTime::now()), DriveMode::Forward);
    }
}

#[test]
fn test_missing_snapshot_is_a_noop() {
    let (_dir, _path, mut resolver) = resolver(BridgeDirectionPolicy::Ignore);
    assert!(!resolver.read_snapshot(SystemTime::now()));
    assert_eq!(resolver.current(), DriveMode::Parking);
}

#[test]
fn test_written_snapshot_round_trips() {
    let (_dir, path, mut resolver) = resolver(BridgeDirectionPolicy::Ignore);
    for mode in [DriveMode::Forward, DriveMode::Reverse, DriveMode::Parking] {
        write_snapshot(&path, mode).unwrap();
        assert!(resolver.read_snapshot(SystemTime::now()));
        assert_eq!(resolver.reported(), mode);
    }
}

#[test]
fn test_newest_input_wins_when_bridge_accepted() {
    let (_dir, path, mut resolver) = resolver(BridgeDirectionPolicy::Accept);
    let mtime = write_aged(&path, r#"{"direction":"F"}"#, Duration::from_millis(1000));
    let now = mtime + Duration::from_millis(1000);

    assert!(resolver.read_snapshot(now));
    assert_eq!(resolver.reported(), DriveMode::Forward);

    // Bridge line arrives after the snapshot was written
    assert!(resolver.report_bridge_direction("R", now));
    assert_eq!(resolver.resolve(3.0, now), DriveMode::Reverse);

    // A newer snapshot takes over again
    let later = now + Duration::from_secs(1);
    write_at(&path, r#"{"direction":"F"}"#, later);
    assert_eq!(resolver.resolve(3.0, later), DriveMode::Forward);
}

#[test]
fn test_bridge_direction_ignored_by_policy() {
    let (_dir, path, mut resolver) = resolver(BridgeDirectionPolicy::Ignore);
    write_aged(&path, r#"{"direction":"F"}"#, Duration::ZERO);
    assert!(!resolver.report_bridge_direction("R", SystemTime::now()));
    assert_eq!(resolver.resolve(3.0, SystemTime::now()), DriveMode::Forward);
}
