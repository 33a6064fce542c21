// Basic timed scalars and sequences.

use crate::time::Time;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimedDouble {
    pub tm: Time,
    pub data: f64,
}

impl TimedDouble {
    pub fn new(data: f64) -> Self {
        Self {
            tm: Time::now(),
            data,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedLong {
    pub tm: Time,
    pub data: i32,
}

impl TimedLong {
    pub fn new(data: i32) -> Self {
        Self {
            tm: Time::now(),
            data,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedBoolean {
    pub tm: Time,
    pub data: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedString {
    pub tm: Time,
    pub data: String,
}

impl TimedString {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            tm: Time::now(),
            data: data.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimedDoubleSeq {
    pub tm: Time,
    pub data: Vec<f64>,
}
