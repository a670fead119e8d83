//! Unit Conversion Functions
//!
//! Maps raw sensor values to display units:
//! - Pulses/s → km/h (linear speed-scale factor)
//! - Pulses/s → RPM (pulses per wheel revolution)
//! - km/h → estimated pulses/s (CAN source, which reports km/h directly)
//! - Battery voltage → percent (calibrated voltage window)
//!
//! All functions assume non-negative finite input. Clamping happens in the
//! controller and the presentation models, not here.

/// Convert pulses per second to km/h
pub fn pulses_to_kmh(pulses_per_sec: f64, speed_scale_factor: f64) -> f64 {
    pulses_per_sec * speed_scale_factor
}

/// Convert pulses per second to wheel RPM
///
/// Returns 0 when `pulses_per_revolution` is 0. This is a defined result,
/// not an error.
pub fn pulses_to_rpm(pulses_per_sec: f64, pulses_per_revolution: u32) -> f64 {
    if pulses_per_revolution == 0 {
        return 0.0;
    }
    (pulses_per_sec * 60.0) / pulses_per_revolution as f64
}

/// Estimate the pulse rate that would have produced `speed_kmh`
///
/// Returns `None` when the scale factor is not strictly positive.
pub fn kmh_to_pulses(speed_kmh: f64, speed_scale_factor: f64) -> Option<f64> {
    if speed_scale_factor > 0.0 {
        Some(speed_kmh / speed_scale_factor)
    } else {
        None
    }
}

/// Back-derive wheel RPM from a speed in km/h
///
/// Used by the CAN source. Yields 0 when the scale factor is unusable.
pub fn kmh_to_rpm(speed_kmh: f64, speed_scale_factor: f64, pulses_per_revolution: u32) -> f64 {
    kmh_to_pulses(speed_kmh, speed_scale_factor)
        .map(|pps| pulses_to_rpm(pps, pulses_per_revolution))
        .unwrap_or(0.0)
}

/// Convert a pack voltage to a charge percentage
///
/// Linear between `v_min` (0 %) and `v_max` (100 %), clamped to [0, 100].
/// A degenerate window (`v_max <= v_min`) yields 0.
pub fn battery_percent(voltage: f64, v_min: f64, v_max: f64) -> f64 {
    let span = v_max - v_min;
    if span <= 0.0 {
        return 0.0;
    }
    (((voltage - v_min) / span) * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pulses_to_kmh() {
        assert!((pulses_to_kmh(10.0, 0.72) - 7.2).abs() < 1e-9);
        assert_eq!(pulses_to_kmh(0.0, 0.72), 0.0);
    }

    #[test]
    fn test_rpm_zero_pulses_per_revolution() {
        assert_eq!(pulses_to_rpm(120.0, 0), 0.0);
    }

    #[test]
    fn test_kmh_to_pulses_rejects_non_positive_factor() {
        assert_eq!(kmh_to_pulses(10.0, 0.0), None);
        assert_eq!(kmh_to_pulses(10.0, -1.0), None);
        assert_eq!(kmh_to_rpm(10.0, 0.0, 20), 0.0);
    }

    #[test]
    fn test_battery_percent_clamps() {
        assert_eq!(battery_percent(9.0, 6.4, 8.4), 100.0);
        assert_eq!(battery_percent(6.0, 6.4, 8.4), 0.0);
        assert!((battery_percent(7.4, 6.4, 8.4) - 50.0).abs() < 1e-9);
        assert_eq!(battery_percent(7.4, 8.4, 6.4), 0.0);
    }
}
