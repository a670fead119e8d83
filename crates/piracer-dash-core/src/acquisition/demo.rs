//! Demo Mode - simulated vehicle for running without hardware
//!
//! The car waits, accelerates to a random cruise speed, holds it with a small
//! wobble, brakes to a stop, and now and then backs up slowly. Optionally
//! writes the drive-mode snapshot so the gear indicator follows along.

use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::debug;

use super::{MotionSample, MotionSource};
use crate::drive_mode::{write_snapshot, DriveMode};

/// Sample period of the simulator
pub const DEMO_SAMPLE_PERIOD: Duration = Duration::from_millis(100);

const ACCEL_KMH_PER_S: f64 = 6.0;
const BRAKE_KMH_PER_S: f64 = 10.0;
const SNAPSHOT_PERIOD_MS: u64 = 500;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    /// Standing still until the given time
    Stopped { until_ms: u64 },
    /// Speeding up towards the cruise target
    Accelerate,
    /// Holding the target until the given time
    Cruise { until_ms: u64 },
    /// Slowing down to zero
    Brake,
}

/// Vehicle model advanced in simulation milliseconds
#[derive(Debug)]
struct DemoVehicle {
    phase: Phase,
    speed_kmh: f64,
    target_kmh: f64,
    reverse: bool,
    last_ms: u64,
    rng: StdRng,
}

impl DemoVehicle {
    fn new(mut rng: StdRng) -> Self {
        let first_start = rng.gen_range(1000..2500);
        Self {
            phase: Phase::Stopped {
                until_ms: first_start,
            },
            speed_kmh: 0.0,
            target_kmh: 0.0,
            reverse: false,
            last_ms: 0,
            rng,
        }
    }

    fn direction(&self) -> DriveMode {
        match self.phase {
            Phase::Stopped { .. } => DriveMode::Parking,
            _ if self.reverse => DriveMode::Reverse,
            _ => DriveMode::Forward,
        }
    }

    /// Advance to `sim_ms` and return the speed in km/h
    fn update(&mut self, sim_ms: u64) -> f64 {
        let dt = sim_ms.saturating_sub(self.last_ms) as f64 / 1000.0;
        self.last_ms = sim_ms;

        match self.phase {
            Phase::Stopped { until_ms } => {
                self.speed_kmh = 0.0;
                if sim_ms >= until_ms {
                    self.reverse = self.rng.gen_bool(0.2);
                    self.target_kmh = if self.reverse {
                        self.rng.gen_range(2.0..5.0)
                    } else {
                        self.rng.gen_range(8.0..25.0)
                    };
                    self.phase = Phase::Accelerate;
                }
            }
            Phase::Accelerate => {
                self.speed_kmh += ACCEL_KMH_PER_S * dt;
                if self.speed_kmh >= self.target_kmh {
                    self.speed_kmh = self.target_kmh;
                    let hold = self.rng.gen_range(3000..8000);
                    self.phase = Phase::Cruise {
                        until_ms: sim_ms + hold,
                    };
                }
            }
            Phase::Cruise { until_ms } => {
                let t = sim_ms as f64 / 1000.0;
                self.speed_kmh = self.target_kmh + 0.3 * (t * 1.7).sin() + 0.1 * (t * 5.3).sin();
                if sim_ms >= until_ms {
                    self.phase = Phase::Brake;
                }
            }
            Phase::Brake => {
                self.speed_kmh -= BRAKE_KMH_PER_S * dt;
                if self.speed_kmh <= 0.0 {
                    self.speed_kmh = 0.0;
                    let wait = self.rng.gen_range(2000..4000);
                    self.phase = Phase::Stopped {
                        until_ms: sim_ms + wait,
                    };
                }
            }
        }

        self.speed_kmh.max(0.0)
    }
}

/// Simulated motion source emitting km/h every 100 ms
pub struct DemoSource {
    vehicle: DemoVehicle,
    ticker: Option<Interval>,
    started: Option<Instant>,
    snapshot_path: Option<PathBuf>,
    last_snapshot_ms: Option<u64>,
    closed: bool,
}

impl Default for DemoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl DemoSource {
    /// Simulator seeded from OS entropy
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Reproducible run
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            vehicle: DemoVehicle::new(rng),
            ticker: None,
            started: None,
            snapshot_path: None,
            last_snapshot_ms: None,
            closed: false,
        }
    }

    /// Also publish the simulated gear as a drive-mode snapshot
    pub fn with_snapshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    /// Gear the simulated driver has selected
    pub fn direction(&self) -> DriveMode {
        self.vehicle.direction()
    }

    fn publish_snapshot(&mut self, sim_ms: u64) {
        let Some(path) = &self.snapshot_path else {
            return;
        };
        let due = match self.last_snapshot_ms {
            Some(last) => sim_ms.saturating_sub(last) >= SNAPSHOT_PERIOD_MS,
            None => true,
        };
        if !due {
            return;
        }
        if let Err(e) = write_snapshot(path, self.vehicle.direction()) {
            debug!(path = %path.display(), "Failed to write demo snapshot: {e}");
        }
        self.last_snapshot_ms = Some(sim_ms);
    }
}

impl MotionSource for DemoSource {
    async fn next_sample(&mut self) -> Option<MotionSample> {
        if self.closed {
            return None;
        }
        let ticker = self.ticker.get_or_insert_with(|| {
            let mut ticker = time::interval(DEMO_SAMPLE_PERIOD);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        let now = ticker.tick().await;
        let started = *self.started.get_or_insert(now);
        let sim_ms = now.duration_since(started).as_millis() as u64;

        let speed = self.vehicle.update(sim_ms);
        self.publish_snapshot(sim_ms);
        Some(MotionSample::kmh(speed))
    }

    fn is_connected(&self) -> bool {
        !self.closed
    }

    fn close(&mut self) {
        self.closed = true;
        self.ticker = None;
    }

    fn describe(&self) -> String {
        "demo".to_string()
    }
}
