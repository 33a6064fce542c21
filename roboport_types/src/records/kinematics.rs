// Timed poses and velocities.

use crate::geometry::{Pose2D, Pose3D, Velocity2D};
use crate::time::Time;
use serde::{Deserialize, Serialize};

/// Planar pose, e.g. odometry output or a navigation goal
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimedPose2D {
    pub tm: Time,
    pub data: Pose2D,
}

impl TimedPose2D {
    pub fn new(data: Pose2D) -> Self {
        Self {
            tm: Time::now(),
            data,
        }
    }
}

/// Planar velocity command or estimate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimedVelocity2D {
    pub tm: Time,
    pub data: Velocity2D,
}

impl TimedVelocity2D {
    pub fn new(vx: f64, vy: f64, va: f64) -> Self {
        Self {
            tm: Time::now(),
            data: Velocity2D { vx, vy, va },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimedPose3D {
    pub tm: Time,
    pub data: Pose3D,
}
