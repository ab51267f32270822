use nalgebra::{UnitQuaternion, Vector3};
use premaid_link::{Axis, JointSet, ServoId};

use crate::errors::IkError;
use crate::robot_config::{HeadMode, HeadReference, HeadTuning};
use crate::rotation::{partial_rotation, rotation, wrap_degrees, Actuator, Side};

use super::{require_joints, EPSILON};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadTarget {
    /// Point to look at.
    pub look_at: Vector3<f64>,
    /// Point whose direction from `look_at` is the head's up direction.
    pub tilt_point: Option<Vector3<f64>>,
    /// Target orientation used by [`HeadMode::Orientation`].
    pub orientation: Option<UnitQuaternion<f64>>,
}

/// Realized physical angles of the head joints.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HeadReport {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
    /// An orientation step had nothing to decompose.
    pub degenerate: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeadSolver {
    origin: Vector3<f64>,
}

impl HeadSolver {
    pub fn new(joints: &JointSet, reference: &HeadReference) -> Result<Self, IkError> {
        require_joints(joints, &ServoId::HEAD)?;
        let origin = Vector3::from(reference.roll);
        if !origin.iter().all(|c| c.is_finite()) {
            return Err(IkError::InvalidGeometry("head roll position is not finite".to_string()));
        }
        Ok(Self { origin })
    }

    /// Looking straight ahead with the head upright.
    pub fn neutral_target(&self, tuning: &HeadTuning) -> HeadTarget {
        let look_at = self.origin + Vector3::z() * tuning.gaze_distance;
        HeadTarget {
            look_at,
            tilt_point: Some(look_at + Vector3::y() * tuning.tilt_distance),
            orientation: Some(UnitQuaternion::identity()),
        }
    }

    pub fn solve(&self, act: &mut Actuator, target: &HeadTarget, mode: HeadMode) -> HeadReport {
        match mode {
            HeadMode::None => HeadReport::default(),
            HeadMode::Gaze => self.solve_gaze(act, target),
            HeadMode::Orientation => match &target.orientation {
                Some(q) => self.solve_orientation(act, q),
                None => HeadReport::default(),
            },
        }
    }

    fn solve_gaze(&self, act: &mut Actuator, target: &HeadTarget) -> HeadReport {
        let v = target.look_at - self.origin;
        let yaw = wrap_degrees(v.x.atan2(v.z).to_degrees());
        let pitch = wrap_degrees((-v.y).atan2(v.x.hypot(v.z)).to_degrees());
        let yaw = act.drive(ServoId::HeadYaw, Side::Center, yaw);
        let pitch = act.drive(ServoId::HeadPitch, Side::Center, pitch);

        let mut report = HeadReport {
            yaw,
            pitch,
            ..HeadReport::default()
        };
        if let Some(tilt_point) = target.tilt_point {
            let up = rotation(Axis::X, -pitch) * rotation(Axis::Y, -yaw) * (tilt_point - target.look_at);
            let roll = if up.x.abs() < EPSILON && up.y.abs() < EPSILON {
                0.0
            } else {
                (-up.x).atan2(up.y).to_degrees()
            };
            report.roll = act.drive(ServoId::HeadRoll, Side::Center, roll);
        }
        report
    }

    fn solve_orientation(&self, act: &mut Actuator, orientation: &UnitQuaternion<f64>) -> HeadReport {
        let mut report = HeadReport::default();
        let mut residual = *orientation;
        for id in [ServoId::HeadYaw, ServoId::HeadRoll, ServoId::HeadPitch] {
            let part = partial_rotation(&residual, act.axis(id), act.is_inverted(id));
            if part.degenerate {
                tracing::debug!("head orientation has no component about {}", id);
                report.degenerate = true;
            }
            residual = part.residual;
            let servo = act.set_servo(id, part.angle);
            let angle = if act.is_inverted(id) { -servo } else { servo };
            match id {
                ServoId::HeadYaw => report.yaw = angle,
                ServoId::HeadRoll => report.roll = angle,
                _ => report.pitch = angle,
            }
        }
        report
    }
}
