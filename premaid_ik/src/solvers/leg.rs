use nalgebra::{UnitQuaternion, Vector3};
use premaid_link::{Axis, JointSet, ServoId};

use crate::errors::IkError;
use crate::robot_config::{LegMode, LegReference, LegTuning};
use crate::rotation::{partial_rotation, rotation, Actuator, Side};

use super::require_joints;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegTarget {
    /// Where the sole should be.
    pub sole: Vector3<f64>,
    /// Foot orientation relative to the neutral pose.
    pub orientation: Option<UnitQuaternion<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LegReport {
    pub held: bool,
    /// The sole was close enough to its neutral position to stand straight.
    pub neutral: bool,
    pub yaw: f64,
    pub roll: f64,
    /// Hip pitch magnitude; the knee bends by twice this.
    pub bend: f64,
}

/// Sole-on-target solver for a leg.
///
/// The leg is a single parameter chain: the hip and ankle pitch bend by the
/// same angle the knee bends by twice, which keeps the foot parallel to the
/// ground and, with equal thigh and shin, directly below the hip. Hip roll
/// and foot roll cancel the same way for sideways steps.
#[derive(Debug, Clone, PartialEq)]
pub struct LegSolver {
    side: Side,
    ids: [ServoId; 6],
    hip: Vector3<f64>,
    neutral_sole: Vector3<f64>,
    thigh: f64,
    shin: f64,
    hip_drop: f64,
    ankle_drop: f64,
    hip_to_foot: f64,
    tuning: LegTuning,
}

const HIP_YAW: usize = 0;
const HIP_ROLL: usize = 1;
const HIP_PITCH: usize = 2;
const KNEE: usize = 3;
const ANKLE: usize = 4;
const FOOT_ROLL: usize = 5;

impl LegSolver {
    pub fn new(joints: &JointSet, reference: &LegReference, side: Side, tuning: LegTuning) -> Result<Self, IkError> {
        let (ids, reference) = match side {
            Side::Right => (ServoId::RIGHT_LEG, reference.mirrored()),
            _ => (ServoId::LEFT_LEG, *reference),
        };
        require_joints(joints, &ids)?;

        let points = [
            reference.hip_yaw,
            reference.hip_roll,
            reference.hip_pitch,
            reference.knee,
            reference.ankle,
            reference.foot_roll,
            reference.sole,
        ]
        .map(Vector3::from);
        let hip = points[0];
        for pair in points.windows(2) {
            let step = pair[1] - pair[0];
            if step.x.abs() > 1e-6 || step.z.abs() > 1e-6 || step.y >= 0.0 {
                return Err(IkError::InvalidGeometry(format!("{:?} leg joints must stack vertically", side)));
            }
        }

        let thigh = points[2].y - points[3].y;
        let shin = points[3].y - points[4].y;
        if (thigh - shin).abs() > 1e-6 {
            tracing::warn!("{:?} leg thigh {:.4} and shin {:.4} differ, the sole will drift forward when bending", side, thigh, shin);
        }
        Ok(Self {
            side,
            ids,
            hip,
            neutral_sole: points[6],
            thigh,
            shin,
            hip_drop: points[1].y - points[2].y,
            ankle_drop: points[4].y - points[5].y,
            hip_to_foot: points[1].y - points[5].y,
            tuning,
        })
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn neutral_target(&self) -> LegTarget {
        LegTarget {
            sole: self.side.point(self.neutral_sole),
            orientation: Some(UnitQuaternion::identity()),
        }
    }

    fn drive(&self, act: &mut Actuator, joint: usize, angle: f64) -> f64 {
        act.drive(self.ids[joint], self.side, angle)
    }

    pub fn solve(&self, act: &mut Actuator, target: &LegTarget, mode: LegMode) -> LegReport {
        if mode == LegMode::None {
            return LegReport {
                held: true,
                ..LegReport::default()
            };
        }

        let orientation = target
            .orientation
            .map(|q| self.side.orientation(&q))
            .unwrap_or_else(UnitQuaternion::identity);
        let yaw = partial_rotation(&orientation, Axis::Y, false);
        let tilt_pitch = partial_rotation(&yaw.residual, Axis::X, false);
        let tilt_roll = partial_rotation(&tilt_pitch.residual, Axis::Z, false);
        let yaw = self.drive(act, HIP_YAW, yaw.angle);

        let sole = self.side.point(target.sole);
        let mut d = rotation(Axis::Y, -yaw) * (sole - self.hip) - (self.neutral_sole - self.hip);
        d.z = 0.0;

        let mut report = LegReport {
            yaw,
            ..LegReport::default()
        };
        let min = self.tuning.min_distance;
        if d.norm_squared() < min * min {
            // stand straight, only the yaw follows the target
            report.neutral = true;
            for joint in [HIP_ROLL, HIP_PITCH, KNEE, ANKLE, FOOT_ROLL] {
                self.drive(act, joint, 0.0);
            }
            return report;
        }

        let vertical = (self.hip_to_foot - d.y).max(self.hip_drop + self.ankle_drop);
        let roll = d.x.atan2(vertical);
        let h = vertical / roll.cos();
        let cos_bend = (h - self.hip_drop - self.ankle_drop) / (self.thigh + self.shin);
        let bend = if cos_bend >= 1.0 {
            0.0
        } else if cos_bend <= 0.0 {
            90.0
        } else {
            cos_bend.acos().to_degrees()
        };
        let roll = roll.to_degrees();

        report.roll = self.drive(act, HIP_ROLL, roll);
        report.bend = -self.drive(act, HIP_PITCH, -bend);
        self.drive(act, KNEE, 2.0 * bend);
        self.drive(act, ANKLE, -bend + tilt_pitch.angle);
        self.drive(act, FOOT_ROLL, -roll + tilt_roll.angle);
        report
    }
}
