//! Percentage weights and the planner-override pattern.
//!
//! Weights are percentages of a parent's weight, not absolute values. A
//! planner may shadow the default weight of a shared objective without
//! mutating it; the base weight only changes through admin-authored content
//! sync.

use serde::{Deserialize, Serialize};

/// Tolerance used for every percentage comparison in the engine.
pub const WEIGHT_EPSILON: f64 = 0.01;

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < WEIGHT_EPSILON
}

/// Round to 2 fraction digits, the precision all percentages carry.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// A default weight plus an optional planner override.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weight {
    pub base: f64,
    pub planner_override: Option<f64>,
}

impl Weight {
    pub fn new(base: f64) -> Self {
        Self {
            base,
            planner_override: None,
        }
    }

    pub fn with_override(base: f64, planner_override: f64) -> Self {
        Self {
            base,
            planner_override: Some(planner_override),
        }
    }

    /// The weight actually used for validation: the override when set,
    /// otherwise the base.
    pub fn effective(&self) -> f64 {
        self.planner_override.unwrap_or(self.base)
    }

    pub fn is_overridden(&self) -> bool {
        self.planner_override.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_weight_prefers_override() {
        let weight = Weight::new(30.0);
        assert_eq!(weight.effective(), 30.0);
        assert!(!weight.is_overridden());

        let weight = Weight::with_override(30.0, 25.5);
        assert_eq!(weight.effective(), 25.5);
        assert_eq!(weight.base, 30.0);
    }

    #[test]
    fn epsilon_comparison() {
        assert!(approx_eq(100.0, 100.005));
        assert!(!approx_eq(100.0, 100.02));
    }

    #[test]
    fn rounding_to_two_digits() {
        assert_eq!(round2(19.5 * 0.65), 12.68);
        assert_eq!(round2(30.0 * 0.65), 19.5);
    }
}
