//! Drift detection between stored and resolved targets
//!
//! Comparison is positional: the same targets listed in a different order count as
//! drift and leads to a configmap write and a rollout.

use std::fmt;

use thanos_sd_resolver::{Target, TargetSequence};

/// Why the stored targets differ from the resolved ones
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Drift {
    /// Different number of targets
    Length { current: usize, desired: usize },

    /// First position holding a different target
    Mismatch { index: usize, current: Target, desired: Target },
}

impl fmt::Display for Drift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Drift::Length { current, desired } => {
                write!(f, "target count changed from {} to {}", current, desired)
            },
            Drift::Mismatch { index, current, desired } => {
                write!(f, "target {} changed from {} to {}", index, current, desired)
            },
        }
    }
}

/// Report the first difference between `current` and `desired`, if any
pub fn detect_drift(current: &TargetSequence, desired: &TargetSequence) -> Option<Drift> {
    if current.len() != desired.len() {
        return Some(Drift::Length { current: current.len(), desired: desired.len() });
    }

    current.iter().zip(desired.iter()).enumerate().find(|(_, (c, d))| c != d).map(
        |(index, (c, d))| Drift::Mismatch { index, current: c.clone(), desired: d.clone() },
    )
}

/// Whether the stored targets already match the resolved ones, position by position
pub fn is_up_to_date(current: &TargetSequence, desired: &TargetSequence) -> bool {
    detect_drift(current, desired).is_none()
}
