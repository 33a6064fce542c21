use crate::geometry::{Covariance2D, Pose2D};
use crate::time::Time;
use serde::{Deserialize, Serialize};

/// A weighted pose estimate with its uncertainty
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis2D {
    pub mean: Pose2D,
    pub covariance: Covariance2D,
    pub weight: f64,
}

/// Set of pose hypotheses produced by a localizer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hypotheses2D {
    pub tm: Time,
    pub hypotheses: Vec<Hypothesis2D>,
}

impl Hypotheses2D {
    /// Hypothesis with the largest weight
    pub fn best(&self) -> Option<&Hypothesis2D> {
        self.hypotheses.iter().max_by(|a, b| {
            a.weight
                .partial_cmp(&b.weight)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    }
}
