use crate::config::{MetricKind, MetricSettings};

/// Master volume as the platform reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VolumeReading {
    /// Android stream volume, 0 to 15.
    AndroidSteps(u8),
    /// Already a percentage.
    Percent(u8),
    #[default]
    Unavailable,
}

impl VolumeReading {
    pub fn percent(self) -> i64 {
        match self {
            VolumeReading::AndroidSteps(steps) => i64::from(steps.min(15)) * 100 / 15,
            VolumeReading::Percent(percent) => i64::from(percent.min(100)),
            VolumeReading::Unavailable => 0,
        }
    }
}

/// Device readings sampled by trace metrics. Unknown readings default to zero.
pub trait DeviceProbe: Send + Sync {
    fn average_fps(&self) -> f32 {
        0.0
    }

    fn device_temperature(&self) -> i64 {
        0
    }

    /// Battery charge in percent.
    fn battery_level(&self) -> i64 {
        0
    }

    fn memory(&self) -> i64 {
        5
    }

    fn volume(&self) -> VolumeReading {
        VolumeReading::Unavailable
    }
}

/// A probe for hosts that expose none of the readings.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProbe;

impl DeviceProbe for NullProbe {}

/// One metric of a running trace.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub name: String,
    pub kind: MetricKind,
    samples: i64,
}

impl Metric {
    pub fn new(name: impl Into<String>, kind: MetricKind) -> Self {
        Self {
            name: name.into(),
            kind,
            samples: 0,
        }
    }

    pub fn from_settings(settings: &MetricSettings) -> Self {
        Self::new(settings.metric_name.clone(), settings.metric)
    }

    pub fn sample(&mut self, probe: &dyn DeviceProbe) -> i64 {
        match self.kind {
            MetricKind::Fps => probe.average_fps() as i64,
            MetricKind::DeviceTemperature => probe.device_temperature(),
            MetricKind::BatteryLevel => probe.battery_level(),
            MetricKind::Memory => probe.memory(),
            MetricKind::VolumeState => probe.volume().percent(),
            MetricKind::TestIncremental => {
                self.samples += 1;
                self.samples
            }
        }
    }
}
