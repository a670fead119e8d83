use piracer_dash_core::calibration::CalibrationParameters;
use piracer_dash_core::config::{DashboardConfig, SearchPaths, TelemetryConfig};
use piracer_dash_core::controller::DashboardController;
use piracer_dash_core::display::RecordingDisplay;
use piracer_dash_core::telemetry::{
    TelemetryBridge, TelemetryError, TelemetryEvent, TelemetryReader, TelemetrySource,
};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::{tempdir, TempDir};

const STREAM: &str = concat!(
    "{\"battery\":{\"voltage\":7.9,\"percent\":61.5}}\n",
    "{garbage}\n",
    "{\"battery\":{\"voltage\":7.8,\"percent\":60.0}}\n",
);

fn controller() -> DashboardController<RecordingDisplay> {
    let mut config = DashboardConfig::default();
    config.drive_mode.snapshot_path = PathBuf::from("/nonexistent/piracer_drive_mode.json");
    DashboardController::new(&config, CalibrationParameters::default(), RecordingDisplay::default())
}

#[tokio::test]
async fn test_malformed_line_is_skipped() {
    let mut reader = TelemetryReader::new(STREAM.as_bytes());
    let mut c = controller();
    while let Some(event) = reader.next_event().await {
        c.on_telemetry(event);
    }

    assert_eq!(c.display().battery_percents(), vec![61.5, 60.0]);
    assert_eq!(c.display().last_battery(), Some((60.0, 7.8)));
    assert_eq!(c.session().battery_voltage, 7.8);
}

#[tokio::test]
async fn test_unterminated_tail_is_not_a_line() {
    let mut reader = TelemetryReader::new(
        &b"{\"battery\":{\"percent\":42.0}}\n{\"battery\":{\"percent\":41.0}}"[..],
    );
    let event = reader.next_event().await.unwrap();
    assert_eq!(event.battery.percent, Some(42.0));
    assert!(reader.next_event().await.is_none());
}

#[tokio::test]
async fn test_bridge_direction_is_carried() {
    let mut reader = TelemetryReader::new(
        &b"{\"battery\":{\"voltage\":8.0,\"percent\":80.0},\"direction\":\"R\"}\n"[..],
    );
    assert_eq!(
        reader.next_event().await,
        Some(TelemetryEvent::battery(8.0, 80.0).with_direction("R"))
    );
}

/// Lay out `<dir>/python/<name>` and a config running it with `sh`
fn bridge_fixture(body: &str) -> (TempDir, SearchPaths, TelemetryConfig) {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("python")).unwrap();
    fs::write(dir.path().join("python").join("bridge.sh"), body).unwrap();

    let search = SearchPaths::new(None, dir.path().to_path_buf());
    let config = TelemetryConfig {
        interpreter: "sh".to_string(),
        script_name: "bridge.sh".to_string(),
        startup_timeout_ms: 2000,
        shutdown_grace_ms: 2000,
        ..TelemetryConfig::default()
    };
    (dir, search, config)
}

#[tokio::test]
async fn test_bridge_streams_events() {
    let (_dir, search, config) = bridge_fixture(
        "echo '{\"battery\":{\"voltage\":7.9,\"percent\":61.5}}'\n\
         echo 'not json'\n\
         echo '{\"battery\":{\"voltage\":7.8,\"percent\":60.0}}'\n",
    );

    let mut bridge = TelemetryBridge::start(&config, &search).await.unwrap();
    assert!(bridge.script().ends_with("python/bridge.sh"));

    let mut percents = Vec::new();
    while let Some(event) = bridge.next_event().await {
        percents.push(event.battery.percent.unwrap());
    }
    assert_eq!(percents, vec![61.5, 60.0]);
    assert!(!bridge.is_running());

    bridge.shutdown(config.shutdown_grace()).await;
}

#[tokio::test]
async fn test_missing_script_is_reported() {
    let dir = tempdir().unwrap();
    let search = SearchPaths::new(None, dir.path().to_path_buf());
    let config = TelemetryConfig {
        interpreter: "sh".to_string(),
        script_name: "absent.sh".to_string(),
        ..TelemetryConfig::default()
    };

    match TelemetryBridge::start(&config, &search).await {
        Err(TelemetryError::ScriptNotFound(candidates)) => {
            assert_eq!(candidates, vec![dir.path().join("python").join("absent.sh")]);
        }
        other => panic!("expected ScriptNotFound, got {:?}", other.err()),
    }
}

#[tokio::test]
async fn test_bridge_exiting_at_startup_fails() {
    let (_dir, search, config) = bridge_fixture("exit 0\n");
    assert!(matches!(
        TelemetryBridge::start(&config, &search).await,
        Err(TelemetryError::ExitedEarly)
    ));
}

#[tokio::test]
async fn test_slow_bridge_is_kept() {
    let (_dir, search, mut config) = bridge_fixture(
        "sleep 0.5\n\
         echo '{\"battery\":{\"voltage\":7.4,\"percent\":50.0}}'\n\
         sleep 5\n",
    );
    config.startup_timeout_ms = 50;

    let mut bridge = TelemetryBridge::start(&config, &search).await.unwrap();
    assert!(bridge.is_running());
    let event = bridge.next_event().await.unwrap();
    assert_eq!(event.battery.percent, Some(50.0));

    bridge.shutdown(Duration::from_secs(2)).await;
    assert!(!bridge.is_running());
}

#[tokio::test]
async fn test_shutdown_kills_unresponsive_bridge() {
    let (_dir, search, config) = bridge_fixture(
        "trap '' TERM\n\
         echo '{\"battery\":{\"voltage\":7.4,\"percent\":50.0}}'\n\
         while true; do sleep 0.1; done\n",
    );

    let mut bridge = TelemetryBridge::start(&config, &search).await.unwrap();
    assert!(bridge.id().is_some());

    let started = std::time::Instant::now();
    bridge.shutdown(Duration::from_millis(200)).await;
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(!bridge.is_running());
    assert_eq!(bridge.id(), None);

    // Second call is a no-op
    bridge.shutdown(Duration::from_millis(200)).await;
}

#[cfg(unix)]
#[tokio::test]
async fn test_shutdown_sends_sigterm_first() {
    let (dir, search, config) = bridge_fixture(
        "trap 'touch \"$(dirname \"$0\")/terminated\"; exit 0' TERM\n\
         echo '{\"battery\":{\"voltage\":7.4,\"percent\":50.0}}'\n\
         while true; do sleep 0.1; done\n",
    );

    let mut bridge = TelemetryBridge::start(&config, &search).await.unwrap();
    let started = std::time::Instant::now();
    bridge.shutdown(Duration::from_secs(5)).await;

    assert!(started.elapsed() < Duration::from_secs(4), "graceful exit, not kill");
    assert!(dir.path().join("python").join("terminated").exists());
    assert!(!bridge.is_running());
}
