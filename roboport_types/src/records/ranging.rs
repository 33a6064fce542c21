use crate::geometry::Geometry3D;
use crate::time::Time;
use serde::{Deserialize, Serialize};

/// Mounting geometry of a range sensor and of its individual elements
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RangerGeometry {
    pub geometry: Geometry3D,
    pub element_geometries: Vec<Geometry3D>,
}

/// Scan configuration; angles in radians, ranges in meters, frequency in Hz
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RangerConfig {
    pub min_angle: f64,
    pub max_angle: f64,
    pub angular_res: f64,
    pub min_range: f64,
    pub max_range: f64,
    pub range_res: f64,
    pub frequency: f64,
}

/// One scan from a range sensor (laser scanner, sonar ring, ToF array).
///
/// `ranges[i]` is measured at `config.min_angle + i * config.angular_res`.
/// `intensities` is either empty or the same length as `ranges`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeData {
    pub tm: Time,
    pub ranges: Vec<f64>,
    pub intensities: Vec<f64>,
    pub geometry: RangerGeometry,
    pub config: RangerConfig,
}

impl RangeData {
    pub fn new(ranges: Vec<f64>) -> Self {
        Self {
            tm: Time::now(),
            ranges,
            ..Default::default()
        }
    }

    /// Angle of the reading at `index`, if it exists
    pub fn angle_at(&self, index: usize) -> Option<f64> {
        (index < self.ranges.len())
            .then(|| self.config.min_angle + index as f64 * self.config.angular_res)
    }

    pub fn is_range_valid(&self, index: usize) -> bool {
        match self.ranges.get(index) {
            Some(&r) => {
                r.is_finite()
                    && r >= self.config.min_range
                    && (self.config.max_range <= 0.0 || r <= self.config.max_range)
            }
            None => false,
        }
    }

    /// Smallest valid reading
    pub fn min_range(&self) -> Option<f64> {
        (0..self.ranges.len())
            .filter(|&i| self.is_range_valid(i))
            .map(|i| self.ranges[i])
            .fold(None, |acc: Option<f64>, r| Some(acc.map_or(r, |a| a.min(r))))
    }
}
