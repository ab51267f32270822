use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::servo::{Axis, JointMask, ServoId};
use crate::LinkError;

/// Device units at 0 degrees.
pub const UNITS_CENTER: f64 = 7500.0;
/// Device units per degree: 8000 units span 270 degrees.
pub const UNITS_PER_DEGREE: f64 = 8000.0 / 270.0;
/// Reserved value that switches a servo's torque off.
pub const RELAX_UNITS: u16 = 0;

pub const DEFAULT_MAX_SPEED: f64 = 90.0;
pub const HAND_MAX_SPEED: f64 = 180.0;

/// Converts a servo angle in degrees to device units.
pub fn angle_to_units(angle: f64) -> u16 {
    let units = (UNITS_CENTER + angle * UNITS_PER_DEGREE).round();
    units.clamp(1.0, u16::MAX as f64) as u16
}

/// Converts device units back to a servo angle in degrees.
pub fn units_to_angle(units: u16) -> f64 {
    (units as f64 - UNITS_CENTER) / UNITS_PER_DEGREE
}

/// One id/value pair of a pose frame.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoValue {
    pub id: ServoId,
    pub units: u16,
}

impl ServoValue {
    pub fn new(id: ServoId, units: u16) -> Self {
        Self { id, units }
    }

    pub fn relax(id: ServoId) -> Self {
        Self { id, units: RELAX_UNITS }
    }

    pub fn from_angle(id: ServoId, angle: f64) -> Self {
        Self { id, units: angle_to_units(angle) }
    }

    /// Id byte followed by the value, low byte first.
    pub fn to_bytes(&self) -> [u8; 3] {
        let [lo, hi] = self.units.to_le_bytes();
        [self.id.id(), lo, hi]
    }

    pub fn angle(&self) -> f64 {
        units_to_angle(self.units)
    }
}

/// A single servo of the robot.
///
/// `angle` is the servo angle in degrees as commanded on the wire. When
/// `inverted` is set the servo turns against its axis, so the physical
/// rotation about `axis` is `-angle`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Joint {
    pub id: ServoId,
    pub axis: Axis,
    #[serde(default)]
    pub inverted: bool,
    pub min_angle: f64,
    pub max_angle: f64,
    /// Degrees per second.
    pub max_speed: f64,
    #[serde(default)]
    pub angle: f64,
}

impl Joint {
    pub fn new(id: ServoId, axis: Axis, inverted: bool, min_angle: f64, max_angle: f64, max_speed: f64) -> Self {
        Self {
            id,
            axis,
            inverted,
            min_angle,
            max_angle,
            max_speed,
            angle: 0.0,
        }
    }

    /// Joint with the factory limits of the servo: +-135 degrees, 90 deg/s
    /// (180 deg/s for the hand yaw servos).
    pub fn with_defaults(id: ServoId) -> Self {
        let max_speed = match id {
            ServoId::LeftHandYaw | ServoId::RightHandYaw => HAND_MAX_SPEED,
            _ => DEFAULT_MAX_SPEED,
        };
        Self::new(id, id.default_axis(), false, -135.0, 135.0, max_speed)
    }

    /// Clamps `target` to the joint limits, stores it and returns the
    /// realized angle. A NaN target keeps the current angle.
    pub fn set_value(&mut self, target: f64) -> f64 {
        if !target.is_nan() {
            self.angle = target.max(self.min_angle).min(self.max_angle);
        }
        self.angle
    }

    /// Like [`set_value`](Self::set_value) but the step from the current
    /// angle is limited to `max_speed * dt`.
    pub fn set_value_limited(&mut self, target: f64, dt: f64) -> f64 {
        if target.is_nan() {
            return self.angle;
        }
        let clamped = target.max(self.min_angle).min(self.max_angle);
        let max_step = (self.max_speed * dt.max(0.0)).abs();
        let step = (clamped - self.angle).max(-max_step).min(max_step);
        self.set_value(self.angle + step)
    }

    /// Direction of the servo relative to its axis.
    pub fn direction(&self) -> f64 {
        if self.inverted {
            -1.0
        } else {
            1.0
        }
    }

    /// Physical rotation about `axis` in degrees.
    pub fn physical_angle(&self) -> f64 {
        self.direction() * self.angle
    }

    pub fn units(&self) -> u16 {
        angle_to_units(self.angle)
    }

    pub fn servo_value(&self) -> ServoValue {
        ServoValue::new(self.id, self.units())
    }

    pub fn encode_for_wire(&self) -> (u8, [u8; 2]) {
        (self.id.id(), self.units().to_le_bytes())
    }

    pub fn validate(&self) -> Result<(), LinkError> {
        if !(self.min_angle <= self.max_angle) {
            return Err(LinkError::InvalidConfig(format!(
                "joint {} has min_angle {} above max_angle {}",
                self.id, self.min_angle, self.max_angle
            )));
        }
        if !(self.max_speed > 0.0) {
            return Err(LinkError::InvalidConfig(format!(
                "joint {} needs a positive max_speed",
                self.id
            )));
        }
        Ok(())
    }
}

/// The joints of the robot keyed by servo id.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(from = "Vec<Joint>", into = "Vec<Joint>")]
pub struct JointSet {
    joints: BTreeMap<ServoId, Joint>,
}

impl JointSet {
    pub fn new(joints: impl IntoIterator<Item = Joint>) -> Self {
        Self {
            joints: joints.into_iter().map(|j| (j.id, j)).collect(),
        }
    }

    /// Every servo of the robot with its factory limits.
    pub fn premaid() -> Self {
        Self::new(ServoId::ALL.into_iter().map(Joint::with_defaults))
    }

    pub fn get(&self, id: ServoId) -> Option<&Joint> {
        self.joints.get(&id)
    }

    pub fn get_mut(&mut self, id: ServoId) -> Option<&mut Joint> {
        self.joints.get_mut(&id)
    }

    pub fn contains(&self, id: ServoId) -> bool {
        self.joints.contains_key(&id)
    }

    pub fn insert(&mut self, joint: Joint) {
        self.joints.insert(joint.id, joint);
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Joint> {
        self.joints.values()
    }

    pub fn angle(&self, id: ServoId) -> Option<f64> {
        self.get(id).map(|j| j.angle)
    }

    /// Returns the realized angle, or `None` if the joint is not present.
    pub fn set_value(&mut self, id: ServoId, target: f64) -> Option<f64> {
        self.get_mut(id).map(|j| j.set_value(target))
    }

    pub fn mask(&self) -> JointMask {
        JointMask::of(&self.joints.keys().copied().collect::<Vec<_>>())
    }

    pub fn servo_values(&self) -> Vec<ServoValue> {
        self.iter().map(Joint::servo_value).collect()
    }

    /// Values of the joints selected by `mask`, ascending by id.
    pub fn masked_values(&self, mask: JointMask) -> Vec<ServoValue> {
        self.iter()
            .filter(|j| mask.contains(j.id))
            .map(Joint::servo_value)
            .collect()
    }

    pub fn reset(&mut self) {
        for joint in self.joints.values_mut() {
            joint.angle = 0.0;
        }
    }

    pub fn validate(&self) -> Result<(), LinkError> {
        self.iter().try_for_each(Joint::validate)
    }
}

impl Default for JointSet {
    fn default() -> Self {
        Self::premaid()
    }
}

impl From<Vec<Joint>> for JointSet {
    fn from(joints: Vec<Joint>) -> Self {
        Self::new(joints)
    }
}

impl From<JointSet> for Vec<Joint> {
    fn from(set: JointSet) -> Self {
        set.joints.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_value_clamps_extremes() {
        let mut joint = Joint::with_defaults(ServoId::HeadYaw);
        for target in [1e30, -1e30, f64::INFINITY, f64::NEG_INFINITY, 200.0, -135.5, 42.0] {
            let realized = joint.set_value(target);
            assert!(realized >= joint.min_angle && realized <= joint.max_angle);
            assert_eq!(realized, joint.angle);
        }
        assert_eq!(joint.set_value(f64::INFINITY), 135.0);
        assert_eq!(joint.set_value(-500.0), -135.0);
    }

    #[test]
    fn test_nan_holds_current_angle() {
        let mut joint = Joint::with_defaults(ServoId::HeadPitch);
        joint.set_value(12.5);
        assert_eq!(joint.set_value(f64::NAN), 12.5);
    }

    #[test]
    fn test_units_scale() {
        assert_eq!(angle_to_units(0.0), 7500);
        assert_eq!(angle_to_units(135.0), 11500);
        assert_eq!(angle_to_units(-135.0), 3500);
        assert_eq!(angle_to_units(90.0), 10167);
    }

    #[test]
    fn test_units_round_trip_within_resolution() {
        let resolution = 1.0 / UNITS_PER_DEGREE;
        let mut angle = -135.0;
        while angle <= 135.0 {
            let back = units_to_angle(angle_to_units(angle));
            assert!((back - angle).abs() <= resolution / 2.0 + 1e-9, "angle {} came back as {}", angle, back);
            angle += 0.37;
        }
    }

    #[test]
    fn test_wire_bytes_are_low_byte_first() {
        let joint = Joint::with_defaults(ServoId::LeftShoulderPitch);
        assert_eq!(joint.encode_for_wire(), (0x04, [0x4C, 0x1D]));
        assert_eq!(ServoValue::relax(ServoId::LeftFootRoll).to_bytes(), [0x1C, 0x00, 0x00]);
    }

    #[test]
    fn test_speed_limited_step() {
        let mut joint = Joint::with_defaults(ServoId::LeftShoulderRoll);
        assert!((joint.set_value_limited(90.0, 0.1) - 9.0).abs() < 1e-9);
        assert!((joint.set_value_limited(-90.0, 0.1) - 0.0).abs() < 1e-9);
        let mut hand = Joint::with_defaults(ServoId::RightHandYaw);
        assert!((hand.set_value_limited(90.0, 0.1) - 18.0).abs() < 1e-9);
        assert!((hand.set_value_limited(19.0, 1.0) - 19.0).abs() < 1e-9);
    }

    #[test]
    fn test_masked_values_are_ordered_by_id() {
        let set = JointSet::premaid();
        let values = set.masked_values(JointMask::HEAD);
        let ids: Vec<u8> = values.iter().map(|v| v.id.id()).collect();
        assert_eq!(ids, vec![0x03, 0x05, 0x07]);
        assert_eq!(set.servo_values().len(), 25);
        assert_eq!(set.mask(), JointMask::FULL_BODY);
    }

    #[test]
    fn test_joint_set_json_round_trip() {
        let mut set = JointSet::premaid();
        set.get_mut(ServoId::RightHipRoll).unwrap().inverted = true;
        let json = serde_json::to_string(&set).unwrap();
        let back: JointSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn test_validate_rejects_inverted_limits() {
        let mut joint = Joint::with_defaults(ServoId::HeadRoll);
        joint.min_angle = 10.0;
        joint.max_angle = -10.0;
        assert!(joint.validate().is_err());
    }
}
