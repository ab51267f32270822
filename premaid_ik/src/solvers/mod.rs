//! Closed-form solvers for each limb group. Every solver writes its result
//! through an [`Actuator`](crate::rotation::Actuator) and continues from the
//! realized angles, so joint limits are respected downstream of each step.

pub mod arm;
pub mod head;
pub mod leg;

pub use arm::{ArmReport, ArmSolver, ArmStrategy, ArmTarget};
pub use head::{HeadReport, HeadSolver, HeadTarget};
pub use leg::{LegReport, LegSolver, LegTarget};

use premaid_link::{JointSet, ServoId};

use crate::errors::IkError;

/// Values closer than this are treated as equal.
pub(crate) const EPSILON: f64 = 1e-9;

pub(crate) fn require_joints(joints: &JointSet, ids: &[ServoId]) -> Result<(), IkError> {
    match ids.iter().find(|id| !joints.contains(**id)) {
        Some(id) => Err(IkError::MissingJoint(*id)),
        None => Ok(()),
    }
}

pub(crate) fn approximately(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}
