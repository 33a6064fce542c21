// Actuator array state and commands.
//
// An actuator array is any set of joints driven together (an arm, a pan/tilt
// unit, a gripper). The array length is not fixed by the schema.

use crate::time::Time;
use serde::{Deserialize, Serialize};

/// Operating status of one actuator. Closed set: decoding any other value
/// is a schema violation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActuatorStatus {
    /// Not moving, ready for a command
    #[default]
    Idle,
    /// Executing a motion
    Moving,
    /// Held by a brake
    Braked,
    /// Blocked by an obstacle or over-current
    Stalled,
}

impl ActuatorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Moving => "Moving",
            Self::Braked => "Braked",
            Self::Stalled => "Stalled",
        }
    }
}

/// State of a single actuator in SI units (rad or m, and derivatives)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActArrayActuatorState {
    pub position: f64,
    pub speed: f64,
    pub acceleration: f64,
    /// Motor current in amperes
    pub current: f64,
    pub status: ActuatorStatus,
    pub calibrated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActArrayState {
    pub tm: Time,
    pub actuators: Vec<ActArrayActuatorState>,
}

impl ActArrayState {
    pub fn new(actuators: Vec<ActArrayActuatorState>) -> Self {
        Self {
            tm: Time::now(),
            actuators,
        }
    }

    /// True if any actuator reports a stall
    pub fn any_stalled(&self) -> bool {
        self.actuators
            .iter()
            .any(|a| a.status == ActuatorStatus::Stalled)
    }
}

/// Target positions for an actuator array; `index` selects a single joint
/// when `Some`, otherwise `targets` covers every joint in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActArrayCommand {
    pub tm: Time,
    pub index: Option<u32>,
    pub targets: Vec<f64>,
}
