// Arm solver
//
// Chain, in the frame of the left arm with the arm hanging down:
//
//   shoulder pitch (X) at P0
//   shoulder roll  (Z) at P1 = P0 + (s, 0, 0)
//   upper arm yaw  (Y) on the upper arm axis
//   elbow          (Z) at P1 + (0, -Lu, 0)
//   hand yaw       (Y) on the forearm axis
//   hand tip           at elbow + (0, -Ll, w)
//
// The forward offset `w` of the hand makes the reachable set, for a given
// shoulder pitch, a plane at distance `w` from the shoulder pitch axis. The
// pitch is chosen so that plane contains the target (a tangent to the circle
// of radius `w` in the YZ plane), which leaves a planar two-link problem for
// the roll and elbow joints.

use nalgebra::{UnitQuaternion, Vector3};
use premaid_link::{Axis, JointSet, ServoId};

use crate::errors::IkError;
use crate::robot_config::{ArmMode, ArmReference, ArmTuning};
use crate::rotation::{partial_rotation, rotation, Actuator, Side};

use super::{approximately, require_joints, EPSILON};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArmTarget {
    pub hand: Vector3<f64>,
    /// Orientation of the hand relative to the neutral pose.
    pub orientation: Option<UnitQuaternion<f64>>,
    /// Used by [`ArmMode::Elbow`]; without it the hand-first solver runs.
    pub elbow: Option<Vector3<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmStrategy {
    Held,
    HandFirst,
    ElbowFirst,
    /// The elbow target was too close to the shoulder.
    ElbowFallback,
    /// The hand target was too close to the elbow; forearm joints unchanged.
    ElbowOnly,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArmReport {
    pub strategy: ArmStrategy,
    /// Outward elbow bend applied because the hand was out of reach.
    pub hyperextension: f64,
    /// The hand was inside the inner reach and the elbow was folded.
    pub folded: bool,
}

impl ArmReport {
    fn new(strategy: ArmStrategy) -> Self {
        Self {
            strategy,
            hyperextension: 0.0,
            folded: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArmSolver {
    side: Side,
    ids: [ServoId; 5],
    shoulder: Vector3<f64>,
    upper_arm_origin: Vector3<f64>,
    neutral_elbow: Vector3<f64>,
    neutral_hand: Vector3<f64>,
    upper_arm_len: f64,
    lower_arm_len: f64,
    hand_offset: f64,
    tuning: ArmTuning,
}

const SHOULDER_PITCH: usize = 0;
const SHOULDER_ROLL: usize = 1;
const UPPER_ARM_YAW: usize = 2;
const LOWER_ARM_PITCH: usize = 3;
const HAND_YAW: usize = 4;

/// Tolerance on the alignment of the neutral arm.
const ALIGNMENT: f64 = 1e-6;

impl ArmSolver {
    pub fn new(joints: &JointSet, reference: &ArmReference, side: Side, tuning: ArmTuning) -> Result<Self, IkError> {
        let (ids, reference) = match side {
            Side::Right => (ServoId::RIGHT_ARM, reference.mirrored()),
            _ => (ServoId::LEFT_ARM, *reference),
        };
        require_joints(joints, &ids)?;

        let shoulder = Vector3::from(reference.shoulder_pitch);
        let upper_arm_origin = Vector3::from(reference.shoulder_roll);
        let elbow = Vector3::from(reference.lower_arm_pitch);
        let hand = Vector3::from(reference.hand_tip);

        let shoulder_offset = upper_arm_origin - shoulder;
        let upper_arm = elbow - upper_arm_origin;
        let forearm = hand - elbow;
        if shoulder_offset.y.abs() > ALIGNMENT || shoulder_offset.z.abs() > ALIGNMENT {
            return Err(IkError::InvalidGeometry(format!("{:?} shoulder roll is not beside the shoulder pitch", side)));
        }
        if upper_arm.x.abs() > ALIGNMENT || upper_arm.z.abs() > ALIGNMENT || upper_arm.y >= 0.0 {
            return Err(IkError::InvalidGeometry(format!("{:?} elbow must hang below the shoulder roll", side)));
        }
        if forearm.x.abs() > ALIGNMENT || forearm.y >= 0.0 {
            return Err(IkError::InvalidGeometry(format!("{:?} hand must hang below the elbow", side)));
        }

        let solver = Self {
            side,
            ids,
            shoulder,
            upper_arm_origin,
            neutral_elbow: elbow,
            neutral_hand: hand,
            upper_arm_len: upper_arm.norm(),
            lower_arm_len: forearm.y.abs(),
            hand_offset: hand.z - shoulder.z,
            tuning,
        };
        tracing::debug!(
            "{:?} arm: upper {:.4} lower {:.4} offset {:.4}",
            side,
            solver.upper_arm_len,
            solver.lower_arm_len,
            solver.hand_offset
        );
        Ok(solver)
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Longest reach from the shoulder roll joint in the arm plane.
    pub fn reach(&self) -> f64 {
        self.upper_arm_len + self.lower_arm_len
    }

    /// Hand and elbow where they hang in the neutral pose.
    pub fn neutral_target(&self) -> ArmTarget {
        ArmTarget {
            hand: self.side.point(self.neutral_hand),
            orientation: Some(UnitQuaternion::identity()),
            elbow: Some(self.side.point(self.neutral_elbow)),
        }
    }

    pub fn solve(&self, act: &mut Actuator, target: &ArmTarget, mode: ArmMode) -> ArmReport {
        let hand = self.side.point(target.hand);
        let orientation = target.orientation.map(|q| self.side.orientation(&q));
        match (mode, target.elbow) {
            (ArmMode::None, _) => ArmReport::new(ArmStrategy::Held),
            (ArmMode::Elbow, Some(elbow)) => self.solve_elbow_first(act, self.side.point(elbow), hand, orientation.as_ref()),
            _ => self.solve_hand_first(act, hand, orientation.as_ref()),
        }
    }

    fn drive(&self, act: &mut Actuator, joint: usize, angle: f64) -> f64 {
        act.drive(self.ids[joint], self.side, angle)
    }

    fn solve_hand_first(&self, act: &mut Actuator, hand: Vector3<f64>, orientation: Option<&UnitQuaternion<f64>>) -> ArmReport {
        let mut report = ArmReport::new(ArmStrategy::HandFirst);
        let h = hand - self.shoulder;
        let pitch = shoulder_pitch_for(h.y, h.z, self.hand_offset);
        let pitch = self.drive(act, SHOULDER_PITCH, pitch);
        let r0 = rotation(Axis::X, pitch);

        let center = self.upper_arm_origin + r0 * Vector3::new(0.0, 0.0, self.hand_offset);
        let planar = r0.inverse() * (hand - center);
        let alpha = planar.x.atan2(-planar.y).to_degrees();
        let distance = planar.norm();

        let lu = self.upper_arm_len;
        let ll = self.lower_arm_len;
        let (roll, elbow) = if distance <= (lu - ll).abs() {
            report.folded = true;
            (0.0, -self.tuning.fold_angle)
        } else if distance >= lu + ll {
            let over = (distance - (lu + ll)) / self.tuning.max_extension_length;
            let extension = self.tuning.max_extension_angle * over.clamp(0.0, 1.0);
            report.hyperextension = extension;
            (alpha - extension / 2.0, extension)
        } else {
            let cos_elbow = (lu * lu + ll * ll - distance * distance) / (2.0 * lu * ll);
            let cos_shoulder = (lu * lu + distance * distance - ll * ll) / (2.0 * lu * distance);
            let gamma = cos_elbow.clamp(-1.0, 1.0).acos().to_degrees();
            let beta = cos_shoulder.clamp(-1.0, 1.0).acos().to_degrees();
            (alpha + beta, -(180.0 - gamma))
        };

        let roll = self.drive(act, SHOULDER_ROLL, roll);
        let twist = self.drive(act, UPPER_ARM_YAW, 0.0);
        let elbow = self.drive(act, LOWER_ARM_PITCH, elbow);
        if let Some(q) = orientation {
            self.solve_wrist(act, [pitch, roll, twist, elbow], q);
        }
        report
    }

    fn solve_elbow_first(
        &self,
        act: &mut Actuator,
        elbow: Vector3<f64>,
        hand: Vector3<f64>,
        orientation: Option<&UnitQuaternion<f64>>,
    ) -> ArmReport {
        let e = elbow - self.shoulder;
        let min = self.tuning.elbow_min_distance;
        if e.norm_squared() < min * min {
            tracing::debug!("{:?} elbow target at the shoulder, solving from the hand", self.side);
            let mut report = self.solve_hand_first(act, hand, orientation);
            report.strategy = ArmStrategy::ElbowFallback;
            return report;
        }

        let pitch = (-e.z).atan2(-e.y).to_degrees();
        let pitch = self.drive(act, SHOULDER_PITCH, pitch);
        let r0 = rotation(Axis::X, pitch);
        let upper = r0.inverse() * (elbow - self.upper_arm_origin);
        let roll = upper.x.atan2(-upper.y).to_degrees();
        let roll = self.drive(act, SHOULDER_ROLL, roll);
        let r01 = r0 * rotation(Axis::Z, roll);

        let realized_elbow = self.upper_arm_origin + r01 * Vector3::new(0.0, -self.upper_arm_len, 0.0);
        let forearm = r01.inverse() * (hand - realized_elbow);
        let min = self.tuning.forearm_min_distance;
        if forearm.norm_squared() < min * min {
            return ArmReport::new(ArmStrategy::ElbowOnly);
        }

        let ll = self.lower_arm_len;
        let w = self.hand_offset;
        let n = forearm.normalize() * (ll * ll + w * w).sqrt();
        let bend = -(-n.y / ll).clamp(-1.0, 1.0).acos().to_degrees();
        let twist = n.x.atan2(n.z).to_degrees() - (ll * bend.to_radians().sin()).atan2(w).to_degrees();

        let twist = self.drive(act, UPPER_ARM_YAW, twist);
        let bend = self.drive(act, LOWER_ARM_PITCH, bend);
        if let Some(q) = orientation {
            self.solve_wrist(act, [pitch, roll, twist, bend], q);
        }
        ArmReport::new(ArmStrategy::ElbowFirst)
    }

    /// Hand yaw from what is left of the target orientation after the four
    /// upper joints.
    fn solve_wrist(&self, act: &mut Actuator, [pitch, roll, twist, elbow]: [f64; 4], orientation: &UnitQuaternion<f64>) {
        let forearm = rotation(Axis::X, pitch) * rotation(Axis::Z, roll) * rotation(Axis::Y, twist) * rotation(Axis::Z, elbow);
        let local = forearm.inverse() * orientation;
        let part = partial_rotation(&local, Axis::Y, false);
        self.drive(act, HAND_YAW, part.angle);
    }
}

/// Shoulder pitch that brings the target `(y, z)`, relative to the shoulder,
/// into the arm plane at offset `w`.
///
/// The plane touches the circle of radius `w` around the pitch axis at
/// `T = w * (-sin p, cos p)` with `T . h = w^2`. Targets inside the circle
/// have no such plane and get zero pitch.
pub fn shoulder_pitch_for(y: f64, z: f64, w: f64) -> f64 {
    let r2 = y * y + z * z;
    let w2 = w * w;
    if approximately(r2, w2) {
        return (-y).atan2(z).to_degrees();
    }
    if r2 < w2 {
        return 0.0;
    }

    let (yt, zt) = if y.abs() < EPSILON {
        let zt = w2 / z;
        let yt = w * (1.0 - w2 / (z * z)).sqrt();
        (if z < 0.0 { -yt } else { yt }, zt)
    } else if z.abs() < EPSILON {
        let yt = w2 / y;
        let zt = w * (1.0 - w2 / (y * y)).sqrt();
        (yt, if y >= 0.0 { -zt } else { zt })
    } else {
        let root = w * ((r2 - w2) * y * y).sqrt();
        let zt = if y < 0.0 { (w2 * z + root) / r2 } else { (w2 * z - root) / r2 };
        ((w2 - z * zt) / y, zt)
    };
    (-yt).atan2(zt).to_degrees()
}
