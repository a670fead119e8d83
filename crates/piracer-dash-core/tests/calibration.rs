use piracer_dash_core::calibration::{CalibrationError, CalibrationParameters};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

#[test]
fn test_missing_battery_section_keeps_other_fields() {
    let json = r#"{
        "speed": {"pulses_per_second_to_kmh": 0.5},
        "rpm": {"pulses_per_revolution": 32}
    }"#;
    let params = CalibrationParameters::from_json(json).unwrap();
    assert_eq!(params.speed_scale_factor, 0.5);
    assert_eq!(params.pulses_per_revolution, 32);
    assert_eq!(params.battery_v_min, 6.4);
    assert_eq!(params.battery_v_max, 8.4);
}

#[test]
fn test_partial_section_defaults_per_field() {
    let json = r#"{"battery": {"v_min": 6.0}}"#;
    let params = CalibrationParameters::from_json(json).unwrap();
    assert_eq!(params.battery_v_min, 6.0);
    assert_eq!(params.battery_v_max, 8.4);
    assert_eq!(params.speed_scale_factor, 0.72);
    assert_eq!(params.pulses_per_revolution, 20);
}

#[test]
fn test_null_section_defaults_without_losing_speed() {
    let json = r#"{"speed": {"pulses_per_second_to_kmh": 0.5}, "battery": null}"#;
    let params = CalibrationParameters::from_json(json).unwrap();
    assert_eq!(params.speed_scale_factor, 0.5);
    assert_eq!(params.battery_v_min, 6.4);
    assert_eq!(params.battery_v_max, 8.4);
}

#[test]
fn test_integral_float_pulse_count_is_accepted() {
    let json = r#"{
        "speed": {"pulses_per_second_to_kmh": 0.5},
        "rpm": {"pulses_per_revolution": 32.0}
    }"#;
    let params = CalibrationParameters::from_json(json).unwrap();
    assert_eq!(params.speed_scale_factor, 0.5);
    assert_eq!(params.pulses_per_revolution, 32);
}

#[test]
fn test_wrongly_typed_field_defaults_alone() {
    let json = r#"{
        "speed": {"pulses_per_second_to_kmh": 0.5},
        "rpm": {"pulses_per_revolution": 2.5},
        "battery": {"v_min": "6.0", "v_max": 8.0}
    }"#;
    let params = CalibrationParameters::from_json(json).unwrap();
    assert_eq!(params.speed_scale_factor, 0.5);
    assert_eq!(params.pulses_per_revolution, 20);
    assert_eq!(params.battery_v_min, 6.4);
    assert_eq!(params.battery_v_max, 8.0);
}

#[test]
fn test_malformed_file_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("calibration.json");
    fs::write(&path, "{ not json").unwrap();
    assert!(matches!(
        CalibrationParameters::load(&path),
        Err(CalibrationError::Parse { .. })
    ));
}

#[test]
fn test_first_existing_candidate_wins() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("a/calibration.json");
    let second = dir.path().join("b.json");
    let third = dir.path().join("c.json");
    fs::write(&second, r#"{"rpm": {"pulses_per_revolution": 40}}"#).unwrap();
    fs::write(&third, r#"{"rpm": {"pulses_per_revolution": 99}}"#).unwrap();

    let (params, path) =
        CalibrationParameters::load_first(&[missing, second.clone(), third]).unwrap();
    assert_eq!(path, second);
    assert_eq!(params.pulses_per_revolution, 40);
}

#[test]
fn test_no_candidate_falls_back_to_defaults() {
    let candidates = vec![PathBuf::from("/nonexistent/config/calibration.json")];
    assert!(matches!(
        CalibrationParameters::load_first(&candidates),
        Err(CalibrationError::NotFound(_))
    ));
    assert_eq!(
        CalibrationParameters::load_or_default(&candidates),
        CalibrationParameters::default()
    );
}

#[test]
fn test_malformed_candidate_falls_back_to_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("calibration.json");
    fs::write(&path, "[]").unwrap();
    assert_eq!(
        CalibrationParameters::load_or_default(&[path]),
        CalibrationParameters::default()
    );
}

#[test]
fn test_save_then_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("calibration.json");
    let params = CalibrationParameters {
        speed_scale_factor: 0.65,
        pulses_per_revolution: 24,
        battery_v_min: 9.6,
        battery_v_max: 12.6,
    };
    params.save(&path).unwrap();
    assert_eq!(CalibrationParameters::load(&path).unwrap(), params);
}
