//! Closed-form inverse kinematics for the PreMaid AI.
//!
//! A [`RobotModel`] owns the joint table and one solver per limb. Each tick
//! turns [`PoseTargets`] into joint angles, which `premaid_link` encodes
//! into pose frames.

pub mod errors;
pub mod kinematics;
pub mod model;
pub mod robot_config;
pub mod rotation;
pub mod solvers;

pub use errors::IkError;
pub use kinematics::{Chain, ChainPose};
pub use model::{BodyPose, PoseTargets, RobotModel, TickReport};
pub use robot_config::{ArmMode, HeadMode, LegMode, RobotConfig, SolverModes};
pub use rotation::{orientation_or_identity, partial_rotation, PartialRotation, Side};
pub use solvers::{ArmStrategy, ArmTarget, HeadTarget, LegTarget};

pub use nalgebra::{Quaternion, UnitQuaternion, Vector3};
