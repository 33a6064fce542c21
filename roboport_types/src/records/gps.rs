use crate::time::Time;
use serde::{Deserialize, Serialize};

/// Quality of a satellite fix. Closed set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GpsFixType {
    #[default]
    None,
    Normal,
    Differential,
}

/// Receiver-reported time of the fix
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpsTime {
    pub sec: u32,
    pub msec: u32,
}

/// GNSS position fix; angles in degrees, distances in meters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GpsData {
    pub tm: Time,
    pub time_fix: GpsTime,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub horizontal_error: f64,
    pub vertical_error: f64,
    pub heading: f64,
    pub horizontal_speed: f64,
    pub vertical_speed: f64,
    pub num_satellites: u16,
    pub fix_type: GpsFixType,
}

impl GpsData {
    pub fn from_coordinates(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            tm: Time::now(),
            latitude,
            longitude,
            altitude,
            fix_type: GpsFixType::Normal,
            ..Default::default()
        }
    }

    pub fn has_fix(&self) -> bool {
        self.fix_type != GpsFixType::None
    }
}
