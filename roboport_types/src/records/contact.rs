use crate::time::Time;
use serde::{Deserialize, Serialize};

/// Contact state of a ring of bumpers, one flag per bumper
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BumperArray {
    pub tm: Time,
    pub bumpers: Vec<bool>,
}

impl BumperArray {
    pub fn any_pressed(&self) -> bool {
        self.bumpers.iter().any(|&b| b)
    }
}
