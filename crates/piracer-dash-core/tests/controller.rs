use piracer_dash_core::acquisition::MotionSample;
use piracer_dash_core::calibration::CalibrationParameters;
use piracer_dash_core::config::DashboardConfig;
use piracer_dash_core::controller::DashboardController;
use piracer_dash_core::display::{DisplayUpdate, RecordingDisplay};
use piracer_dash_core::drive_mode::{write_snapshot, DriveMode};
use piracer_dash_core::telemetry::TelemetryEvent;
use pretty_assertions::assert_eq;
use std::path::Path;
use std::time::Duration;
use tempfile::tempdir;

fn controller(snapshot: &Path) -> DashboardController<RecordingDisplay> {
    let mut config = DashboardConfig::default();
    config.drive_mode.snapshot_path = snapshot.to_path_buf();
    DashboardController::new(&config, CalibrationParameters::default(), RecordingDisplay::default())
}

#[test]
fn test_max_speed_ratchets() {
    let dir = tempdir().unwrap();
    let mut c = controller(&dir.path().join("mode.json"));

    let mut max_seen = Vec::new();
    for speed in [5.0, 12.3, 8.0, 20.1, 3.0] {
        c.on_motion_sample(MotionSample::kmh(speed));
        max_seen.push(c.session().max_speed_kmh);
    }

    assert_eq!(max_seen, vec![5.0, 12.3, 12.3, 20.1, 20.1]);
    assert_eq!(c.session().current_speed_kmh, 3.0);

    let records: Vec<f64> = c
        .display()
        .updates
        .iter()
        .filter_map(|u| match u {
            DisplayUpdate::MaxSpeed { value, new_record: true } => Some(*value),
            _ => None,
        })
        .collect();
    assert_eq!(records, vec![5.0, 12.3, 20.1]);
}

#[test]
fn test_reset_keeps_mode_and_battery() {
    let dir = tempdir().unwrap();
    let snapshot = dir.path().join("mode.json");
    write_snapshot(&snapshot, DriveMode::Reverse).unwrap();
    let mut c = controller(&snapshot);

    c.on_motion_sample(MotionSample::kmh(4.0));
    c.on_telemetry(TelemetryEvent::battery(7.9, 61.5));
    c.on_tick();
    assert_eq!(c.session().drive_mode, DriveMode::Reverse);
    assert_eq!(c.session().max_speed_kmh, 4.0);

    c.display_mut().take();
    c.reset();

    let session = c.session();
    assert_eq!(session.max_speed_kmh, 0.0);
    assert_eq!(session.elapsed(), Duration::ZERO);
    assert_eq!(session.drive_mode, DriveMode::Reverse);
    assert_eq!(session.battery_percent, 61.5);
    assert_eq!(session.battery_voltage, 7.9);
    assert_eq!(session.current_speed_kmh, 4.0);

    assert_eq!(
        c.display().updates,
        vec![
            DisplayUpdate::MaxSpeed { value: 0.0, new_record: false },
            DisplayUpdate::Elapsed(Duration::ZERO),
        ]
    );
}

#[test]
fn test_only_changed_fields_are_published() {
    let dir = tempdir().unwrap();
    let mut c = controller(&dir.path().join("mode.json"));

    c.on_motion_sample(MotionSample::kmh(0.0));
    assert!(c.display().updates.is_empty());

    c.on_motion_sample(MotionSample::kmh(1.0));
    let first = c.display_mut().take();
    assert!(first.contains(&DisplayUpdate::Speed(1.0)));
    assert!(first.contains(&DisplayUpdate::MaxSpeed { value: 1.0, new_record: true }));

    c.on_motion_sample(MotionSample::kmh(1.0));
    assert!(c.display().updates.is_empty());
}

#[test]
fn test_standstill_publishes_parking() {
    let dir = tempdir().unwrap();
    let snapshot = dir.path().join("mode.json");
    write_snapshot(&snapshot, DriveMode::Forward).unwrap();
    let mut c = controller(&snapshot);

    c.on_motion_sample(MotionSample::kmh(6.0));
    assert_eq!(c.display().last_drive_mode(), Some(DriveMode::Forward));

    c.on_motion_sample(MotionSample::kmh(0.1));
    assert_eq!(c.display().last_drive_mode(), Some(DriveMode::Parking));
    assert_eq!(c.session().drive_mode, DriveMode::Parking);
}

#[test]
fn test_battery_published_even_when_unchanged() {
    let dir = tempdir().unwrap();
    let mut c = controller(&dir.path().join("mode.json"));

    c.on_telemetry(TelemetryEvent::battery(7.9, 61.5));
    c.on_telemetry(TelemetryEvent::battery(7.9, 61.5));
    assert_eq!(c.display().battery_percents(), vec![61.5, 61.5]);
}
