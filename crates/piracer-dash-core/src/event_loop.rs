//! Single-threaded dashboard event loop
//!
//! One `select!` multiplexes motion samples, telemetry events, operator
//! controls, the session tick, the display frame tick, and shutdown. Every
//! branch is cancel-safe: sources keep their reconnect deadlines in their own
//! state, so losing a race to a tick never resets a pending retry.

use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::info;

use crate::acquisition::MotionSource;
use crate::config::DashboardConfig;
use crate::controller::DashboardController;
use crate::display::DisplaySink;
use crate::telemetry::{TelemetryEvent, TelemetrySource};

/// Timer periods of the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopTiming {
    /// Session clock refresh
    pub tick: Duration,
    /// Presentation animation step
    pub frame: Duration,
}

impl Default for LoopTiming {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            frame: Duration::from_millis(50),
        }
    }
}

impl LoopTiming {
    /// Periods from config; zero is raised to 1 ms
    pub fn from_config(config: &DashboardConfig) -> Self {
        Self {
            tick: Duration::from_millis(config.session.tick_ms.max(1)),
            frame: Duration::from_millis(config.display.frame_ms.max(1)),
        }
    }
}

/// Operator actions delivered to the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Zero the session clock and the max-speed record
    Reset,
}

async fn next_telemetry<T: TelemetrySource>(
    telemetry: &mut Option<&mut T>,
) -> Option<TelemetryEvent> {
    match telemetry {
        Some(source) => source.next_event().await,
        None => std::future::pending().await,
    }
}

async fn next_control(controls: &mut Option<mpsc::Receiver<Control>>) -> Option<Control> {
    match controls {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Run until `shutdown` completes
pub async fn run_event_loop<D, S, T, F>(
    controller: &mut DashboardController<D>,
    source: &mut S,
    telemetry: Option<&mut T>,
    shutdown: F,
    timing: LoopTiming,
) where
    D: DisplaySink,
    S: MotionSource,
    T: TelemetrySource,
    F: Future<Output = ()>,
{
    run_event_loop_with_controls(controller, source, telemetry, None, shutdown, timing).await
}

/// [`run_event_loop`] plus an operator control channel
pub async fn run_event_loop_with_controls<D, S, T, F>(
    controller: &mut DashboardController<D>,
    source: &mut S,
    mut telemetry: Option<&mut T>,
    mut controls: Option<mpsc::Receiver<Control>>,
    shutdown: F,
    timing: LoopTiming,
) where
    D: DisplaySink,
    S: MotionSource,
    T: TelemetrySource,
    F: Future<Output = ()>,
{
    let mut ticker = time::interval_at(Instant::now() + timing.tick, timing.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut frames = time::interval(timing.frame);
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    let mut source_open = true;
    info!(source = %source.describe(), telemetry = telemetry.is_some(), "Event loop started");
    controller.on_link_status(source.is_connected());
    controller.publish_all();

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }

            control = next_control(&mut controls), if controls.is_some() => match control {
                Some(Control::Reset) => controller.reset(),
                None => controls = None,
            },

            sample = source.next_sample(), if source_open => {
                match sample {
                    Some(sample) => controller.on_motion_sample(sample),
                    None => {
                        info!(source = %source.describe(), "Motion source ended");
                        source_open = false;
                    }
                }
                controller.on_link_status(source.is_connected());
            }

            event = next_telemetry(&mut telemetry), if telemetry.is_some() => match event {
                Some(event) => controller.on_telemetry(event),
                None => {
                    info!("Telemetry stream ended; battery display frozen");
                    telemetry = None;
                }
            },

            _ = ticker.tick() => {
                controller.on_tick();
                controller.on_link_status(source.is_connected());
            }

            _ = frames.tick() => controller.on_frame(),
        }
    }
}
