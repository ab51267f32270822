/// Robot configuration for the PreMaid AI
///
/// Holds the joint table, the neutral-pose position of every joint, the
/// solver tuning constants and the solver mode of each limb group. Positions
/// are in meters in the body frame: X towards the robot's left, Y up and Z
/// forward.

use std::path::Path;

use premaid_link::JointSet;
use serde::{Deserialize, Serialize};

use crate::errors::IkError;

pub type Point = [f64; 3];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RobotConfig {
    pub joints: JointSet,
    pub reference: ReferencePose,
    #[serde(default)]
    pub tuning: SolverTuning,
    #[serde(default)]
    pub modes: SolverModes,
}

/// Joint positions of the neutral pose: standing upright, arms hanging down.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReferencePose {
    pub head: HeadReference,
    pub left_arm: ArmReference,
    pub right_arm: ArmReference,
    pub left_leg: LegReference,
    pub right_leg: LegReference,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct HeadReference {
    pub yaw: Point,
    pub pitch: Point,
    pub roll: Point,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ArmReference {
    pub shoulder_pitch: Point,
    pub shoulder_roll: Point,
    pub upper_arm_yaw: Point,
    pub lower_arm_pitch: Point,
    pub hand_yaw: Point,
    pub hand_tip: Point,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LegReference {
    pub hip_yaw: Point,
    pub hip_roll: Point,
    pub hip_pitch: Point,
    pub knee: Point,
    pub ankle: Point,
    pub foot_roll: Point,
    pub sole: Point,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct HeadTuning {
    /// Distance of the default gaze target in front of the head.
    pub gaze_distance: f64,
    /// Height of the default tilt point above the gaze target.
    pub tilt_distance: f64,
}

impl Default for HeadTuning {
    fn default() -> Self {
        Self {
            gaze_distance: 0.3,
            tilt_distance: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ArmTuning {
    /// Elbow targets closer than this to the shoulder fall back to the
    /// hand-first solver.
    pub elbow_min_distance: f64,
    /// Below this the forearm direction is undefined and the elbow-first
    /// solver leaves the forearm joints alone.
    pub forearm_min_distance: f64,
    /// Elbow angle used when the hand target is inside the inner reach.
    pub fold_angle: f64,
    /// Outward elbow bend at full overreach.
    pub max_extension_angle: f64,
    /// Overreach distance at which the full extension is applied.
    pub max_extension_length: f64,
}

impl Default for ArmTuning {
    fn default() -> Self {
        Self {
            elbow_min_distance: 0.01,
            forearm_min_distance: 0.01,
            fold_angle: 135.0,
            max_extension_angle: 10.0,
            max_extension_length: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LegTuning {
    /// Sole displacement below which the leg stays straight.
    pub min_distance: f64,
}

impl Default for LegTuning {
    fn default() -> Self {
        Self { min_distance: 0.005 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct SolverTuning {
    #[serde(default)]
    pub head: HeadTuning,
    #[serde(default)]
    pub arm: ArmTuning,
    #[serde(default)]
    pub leg: LegTuning,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum HeadMode {
    None,
    /// Aim at a point and roll towards a second one.
    #[default]
    Gaze,
    /// Follow a target orientation.
    Orientation,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ArmMode {
    None,
    /// Place the elbow, then point the forearm at the hand target.
    Elbow,
    /// Place the hand and let the elbow follow.
    #[default]
    Hand,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum LegMode {
    None,
    #[default]
    Sole,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SolverModes {
    #[serde(default)]
    pub head: HeadMode,
    #[serde(default)]
    pub arm: ArmMode,
    #[serde(default)]
    pub leg: LegMode,
}

fn mirror(p: Point) -> Point {
    [-p[0], p[1], p[2]]
}

impl ArmReference {
    pub fn mirrored(&self) -> Self {
        Self {
            shoulder_pitch: mirror(self.shoulder_pitch),
            shoulder_roll: mirror(self.shoulder_roll),
            upper_arm_yaw: mirror(self.upper_arm_yaw),
            lower_arm_pitch: mirror(self.lower_arm_pitch),
            hand_yaw: mirror(self.hand_yaw),
            hand_tip: mirror(self.hand_tip),
        }
    }
}

impl LegReference {
    pub fn mirrored(&self) -> Self {
        Self {
            hip_yaw: mirror(self.hip_yaw),
            hip_roll: mirror(self.hip_roll),
            hip_pitch: mirror(self.hip_pitch),
            knee: mirror(self.knee),
            ankle: mirror(self.ankle),
            foot_roll: mirror(self.foot_roll),
            sole: mirror(self.sole),
        }
    }
}

impl ReferencePose {
    /// Measured neutral pose of the PreMaid AI. The origin is the center of
    /// the pelvis.
    pub fn premaid() -> Self {
        let left_arm = ArmReference {
            shoulder_pitch: [0.045, 0.12, 0.0],
            shoulder_roll: [0.065, 0.12, 0.0],
            upper_arm_yaw: [0.065, 0.09, 0.0],
            lower_arm_pitch: [0.065, 0.05, 0.0],
            hand_yaw: [0.065, -0.005, 0.01],
            hand_tip: [0.065, -0.015, 0.01],
        };
        let left_leg = LegReference {
            hip_yaw: [0.025, -0.01, 0.0],
            hip_roll: [0.025, -0.03, 0.0],
            hip_pitch: [0.025, -0.04, 0.0],
            knee: [0.025, -0.1, 0.0],
            ankle: [0.025, -0.16, 0.0],
            foot_roll: [0.025, -0.17, 0.0],
            sole: [0.025, -0.19, 0.0],
        };
        Self {
            head: HeadReference {
                yaw: [0.0, 0.145, 0.0],
                pitch: [0.0, 0.165, 0.0],
                roll: [0.0, 0.175, 0.0],
            },
            right_arm: left_arm.mirrored(),
            left_arm,
            right_leg: left_leg.mirrored(),
            left_leg,
        }
    }
}

impl RobotConfig {
    pub fn premaid() -> Self {
        Self {
            joints: JointSet::premaid(),
            reference: ReferencePose::premaid(),
            tuning: SolverTuning::default(),
            modes: SolverModes::default(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, IkError> {
        serde_json::from_str(json).map_err(|e| IkError::Serialization(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, IkError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| IkError::InvalidConfig(format!("{}: {}", path.as_ref().display(), e)))?;
        let config = Self::from_json_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String, IkError> {
        serde_json::to_string_pretty(self).map_err(|e| IkError::Serialization(e.to_string()))
    }

    /// Checks the joint table and the tuning values. Limb geometry is
    /// checked when the solvers are built.
    pub fn validate(&self) -> Result<(), IkError> {
        self.joints.validate()?;
        let arm = &self.tuning.arm;
        if !(arm.max_extension_length > 0.0) {
            return Err(IkError::InvalidConfig("max_extension_length must be positive".to_string()));
        }
        if arm.elbow_min_distance < 0.0 || arm.forearm_min_distance < 0.0 || self.tuning.leg.min_distance < 0.0 {
            return Err(IkError::InvalidConfig("distance thresholds cannot be negative".to_string()));
        }
        let all = [
            self.reference.head.yaw,
            self.reference.head.pitch,
            self.reference.head.roll,
        ];
        if all.iter().flatten().any(|v| !v.is_finite()) {
            return Err(IkError::InvalidConfig("head reference is not finite".to_string()));
        }
        Ok(())
    }
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self::premaid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_right_side_is_mirrored() {
        let reference = ReferencePose::premaid();
        assert_eq!(reference.right_arm.shoulder_pitch, [-0.045, 0.12, 0.0]);
        assert_eq!(reference.right_leg.sole, [-0.025, -0.19, 0.0]);
        assert_eq!(reference.right_arm.mirrored(), reference.left_arm);
    }

    #[test]
    fn test_json_round_trip_keeps_defaults() {
        let config = RobotConfig::premaid();
        let json = config.to_json_string().unwrap();
        assert_eq!(RobotConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let mut value: serde_json::Value = serde_json::from_str(&RobotConfig::premaid().to_json_string().unwrap()).unwrap();
        let map = value.as_object_mut().unwrap();
        map.remove("tuning");
        map.remove("modes");
        let config = RobotConfig::from_json_str(&value.to_string()).unwrap();
        assert_eq!(config.modes.arm, ArmMode::Hand);
        assert_eq!(config.tuning.arm.fold_angle, 135.0);
    }

    #[test]
    fn test_validate_rejects_bad_tuning() {
        let mut config = RobotConfig::premaid();
        assert!(config.validate().is_ok());
        config.tuning.arm.max_extension_length = 0.0;
        assert!(config.validate().is_err());
    }
}
