use crate::geometry::Point3D;
use crate::time::Time;
use serde::{Deserialize, Serialize};

/// A point with optional color (`rgb` packed as 0x00RRGGBB, 0 when absent)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PointCloudPoint {
    pub point: Point3D,
    pub rgb: u32,
}

/// Unordered 3D point cloud in the frame named by `frame`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointCloud {
    pub tm: Time,
    pub frame: String,
    pub points: Vec<PointCloudPoint>,
}

impl PointCloud {
    pub fn from_points(frame: &str, points: impl IntoIterator<Item = Point3D>) -> Self {
        Self {
            tm: Time::now(),
            frame: frame.to_string(),
            points: points
                .into_iter()
                .map(|point| PointCloudPoint { point, rgb: 0 })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
