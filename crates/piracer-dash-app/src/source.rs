//! Runtime choice of acquisition source

use piracer_dash_core::acquisition::can::CanSource;
use piracer_dash_core::acquisition::serial::SerialSource;
use piracer_dash_core::acquisition::{DemoSource, MotionSample, MotionSource};
use piracer_dash_core::config::{DashboardConfig, SourceKind};

/// One of the built-in sources, picked from configuration
pub enum AnySource {
    Can(CanSource),
    Serial(SerialSource),
    Demo(DemoSource),
}

impl AnySource {
    pub fn from_config(config: &DashboardConfig) -> Self {
        let acq = &config.acquisition;
        match acq.source {
            SourceKind::Can => AnySource::Can(CanSource::new(
                acq.can_interface.clone(),
                acq.can_speed_id,
                acq.can_retry(),
            )),
            SourceKind::Serial => {
                let source = SerialSource::new(
                    acq.serial_port_prefixes.clone(),
                    acq.serial_baud,
                    acq.serial_retry(),
                );
                AnySource::Serial(match &acq.serial_port {
                    Some(port) => source.with_fixed_port(port.clone()),
                    None => source,
                })
            }
            SourceKind::Demo => {
                AnySource::Demo(DemoSource::new().with_snapshot(config.drive_mode.snapshot_path.clone()))
            }
        }
    }
}

impl MotionSource for AnySource {
    async fn next_sample(&mut self) -> Option<MotionSample> {
        match self {
            AnySource::Can(source) => source.next_sample().await,
            AnySource::Serial(source) => source.next_sample().await,
            AnySource::Demo(source) => source.next_sample().await,
        }
    }

    fn is_connected(&self) -> bool {
        match self {
            AnySource::Can(source) => source.is_connected(),
            AnySource::Serial(source) => source.is_connected(),
            AnySource::Demo(source) => source.is_connected(),
        }
    }

    fn close(&mut self) {
        match self {
            AnySource::Can(source) => source.close(),
            AnySource::Serial(source) => source.close(),
            AnySource::Demo(source) => source.close(),
        }
    }

    fn describe(&self) -> String {
        match self {
            AnySource::Can(source) => source.describe(),
            AnySource::Serial(source) => source.describe(),
            AnySource::Demo(source) => source.describe(),
        }
    }
}
