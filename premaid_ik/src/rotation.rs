use nalgebra::{Quaternion, Unit, UnitQuaternion, Vector3};
use premaid_link::{Axis, JointSet, ServoId};

/// Projections shorter than this have no usable twist about the axis.
const DEGENERATE_NORM: f64 = 1e-12;

pub fn axis_vector(axis: Axis) -> Unit<Vector3<f64>> {
    match axis {
        Axis::X => Vector3::x_axis(),
        Axis::Y => Vector3::y_axis(),
        Axis::Z => Vector3::z_axis(),
    }
}

/// Rotation of `degrees` about a body axis.
pub fn rotation(axis: Axis, degrees: f64) -> UnitQuaternion<f64> {
    UnitQuaternion::from_axis_angle(&axis_vector(axis), degrees.to_radians())
}

/// Wraps an angle in degrees into (-180, 180].
pub fn wrap_degrees(angle: f64) -> f64 {
    let mut a = angle % 360.0;
    if a > 180.0 {
        a -= 360.0;
    } else if a <= -180.0 {
        a += 360.0;
    }
    a
}

/// Normalizes a raw quaternion. A zero quaternion becomes the identity and
/// the second value is `true`.
pub fn orientation_or_identity(q: Quaternion<f64>) -> (UnitQuaternion<f64>, bool) {
    match UnitQuaternion::try_new(q, DEGENERATE_NORM) {
        Some(unit) => (unit, false),
        None => {
            tracing::warn!("zero quaternion used as orientation, substituting identity");
            (UnitQuaternion::identity(), true)
        }
    }
}

/// Twist/swing split of an orientation about one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartialRotation {
    /// Twist about the axis in degrees, in [-180, 180].
    pub angle: f64,
    /// What is left of the orientation once the twist is removed, expressed
    /// in the frame after the twist.
    pub residual: UnitQuaternion<f64>,
    /// The orientation has no component about the axis, so the twist was
    /// taken as zero.
    pub degenerate: bool,
}

/// Extracts the rotation of `orientation` about `axis`.
///
/// The quaternion is flipped to `w >= 0`, reduced to its `w` and axis
/// components and renormalized; the twist angle is `2*acos(w)` with the sign
/// of the axis component. `inverted` negates the angle for servos that turn
/// against their axis. The residual is computed from the unsigned twist, so
/// `rotation(axis, angle) * residual == orientation` when not inverted.
pub fn partial_rotation(orientation: &UnitQuaternion<f64>, axis: Axis, inverted: bool) -> PartialRotation {
    let mut q = *orientation.quaternion();
    if q.w < 0.0 {
        q = -q;
    }
    let component = match axis {
        Axis::X => q.i,
        Axis::Y => q.j,
        Axis::Z => q.k,
    };
    let norm = (q.w * q.w + component * component).sqrt();
    if norm < DEGENERATE_NORM {
        tracing::debug!("orientation has no twist about {:?}, using identity", axis);
        return PartialRotation {
            angle: 0.0,
            residual: *orientation,
            degenerate: true,
        };
    }

    let w = (q.w / norm).clamp(-1.0, 1.0);
    let c = component / norm;
    let [x, y, z] = axis.unit();
    let twist = UnitQuaternion::new_unchecked(Quaternion::new(w, x * c, y * c, z * c));

    let mut angle = 2.0 * w.acos().to_degrees();
    if c < 0.0 {
        angle = -angle;
    }
    if inverted {
        angle = -angle;
    }
    PartialRotation {
        angle,
        residual: twist.inverse() * orientation,
        degenerate: false,
    }
}

/// Which side of the body a limb is on. The solvers work in the frame of
/// the left limbs; right limbs are mirrored through the YZ plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
    Center,
}

impl Side {
    fn mirrored(self) -> bool {
        self == Side::Right
    }

    pub fn point(self, p: Vector3<f64>) -> Vector3<f64> {
        if self.mirrored() {
            Vector3::new(-p.x, p.y, p.z)
        } else {
            p
        }
    }

    /// Reflecting x keeps rotations about X and reverses those about Y and Z.
    pub fn angle(self, axis: Axis, angle: f64) -> f64 {
        match (self.mirrored(), axis) {
            (true, Axis::Y) | (true, Axis::Z) => -angle,
            _ => angle,
        }
    }

    pub fn orientation(self, q: &UnitQuaternion<f64>) -> UnitQuaternion<f64> {
        if self.mirrored() {
            let q = q.quaternion();
            UnitQuaternion::new_unchecked(Quaternion::new(q.w, q.i, -q.j, -q.k))
        } else {
            *q
        }
    }
}

/// Writes solver output into the joint table.
///
/// Angles handed to [`drive`](Self::drive) are physical rotations in the
/// solver's frame; the return value is the angle the joint actually took
/// after limits and rate limiting, in the same frame.
pub struct Actuator<'a> {
    joints: &'a mut JointSet,
    dt: Option<f64>,
}

impl<'a> Actuator<'a> {
    pub fn new(joints: &'a mut JointSet, dt: Option<f64>) -> Self {
        Self { joints, dt }
    }

    pub fn drive(&mut self, id: ServoId, side: Side, angle: f64) -> f64 {
        let dt = self.dt;
        let Some(joint) = self.joints.get_mut(id) else {
            tracing::warn!("no joint {} to drive", id);
            return angle;
        };
        let axis = joint.axis;
        let direction = joint.direction();
        let servo = direction * side.angle(axis, angle);
        let realized = match dt {
            Some(dt) => joint.set_value_limited(servo, dt),
            None => joint.set_value(servo),
        };
        side.angle(axis, direction * realized)
    }

    /// Sets a servo angle directly.
    pub fn set_servo(&mut self, id: ServoId, angle: f64) -> f64 {
        let dt = self.dt;
        match self.joints.get_mut(id) {
            Some(joint) => match dt {
                Some(dt) => joint.set_value_limited(angle, dt),
                None => joint.set_value(angle),
            },
            None => {
                tracing::warn!("no joint {} to drive", id);
                angle
            }
        }
    }

    pub fn axis(&self, id: ServoId) -> Axis {
        self.joints.get(id).map(|j| j.axis).unwrap_or_else(|| id.default_axis())
    }

    pub fn is_inverted(&self, id: ServoId) -> bool {
        self.joints.get(id).map(|j| j.inverted).unwrap_or(false)
    }
}
