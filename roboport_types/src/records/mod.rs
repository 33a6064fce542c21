//! The schema catalogue
//!
//! Each type below is one schema. Versions are bumped whenever a field is
//! added, removed, reordered or retyped, because the wire layout follows the
//! declaration order.

mod actuator;
mod basic;
mod contact;
mod gps;
mod kinematics;
mod localization;
mod pointcloud;
mod ranging;
mod vision;

pub use actuator::{ActArrayActuatorState, ActArrayCommand, ActArrayState, ActuatorStatus};
pub use basic::{TimedBoolean, TimedDouble, TimedDoubleSeq, TimedLong, TimedString};
pub use contact::BumperArray;
pub use gps::{GpsData, GpsFixType, GpsTime};
pub use kinematics::{TimedPose2D, TimedPose3D, TimedVelocity2D};
pub use localization::{Hypotheses2D, Hypothesis2D};
pub use pointcloud::{PointCloud, PointCloudPoint};
pub use ranging::{RangeData, RangerConfig, RangerGeometry};
pub use vision::CameraImage;

use crate::schema::schema_catalogue;

schema_catalogue! {
    TimedDouble => ("TimedDouble", 1),
    TimedLong => ("TimedLong", 1),
    TimedBoolean => ("TimedBoolean", 1),
    TimedString => ("TimedString", 1),
    TimedDoubleSeq => ("TimedDoubleSeq", 1),
    TimedPose2D => ("TimedPose2D", 1),
    TimedVelocity2D => ("TimedVelocity2D", 1),
    TimedPose3D => ("TimedPose3D", 1),
    ActArrayState => ("ActArrayState", 1),
    ActArrayCommand => ("ActArrayCommand", 1),
    RangeData => ("RangeData", 1),
    Hypotheses2D => ("Hypotheses2D", 1),
    CameraImage => ("CameraImage", 1),
    GpsData => ("GpsData", 1),
    PointCloud => ("PointCloud", 1),
    BumperArray => ("BumperArray", 1),
}
