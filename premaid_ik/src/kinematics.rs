// Forward kinematics for the PreMaid AI limbs
//
// Every limb is a serial chain of single-axis joints whose positions are
// known in the neutral pose. Walking from the root, each joint turns
// everything below it about its own axis:
//
//   R_k = R_{k-1} * Rot(axis_k, angle_k)
//   P_k = P_{k-1} + R_{k-1} * (origin_k - origin_{k-1})
//
// which needs no DH parameters at all.

use nalgebra::{UnitQuaternion, Vector3};
use premaid_link::{JointSet, ServoId};

use crate::robot_config::{ArmReference, HeadReference, LegReference};
use crate::rotation::rotation;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainLink {
    pub id: ServoId,
    /// Joint position in the neutral pose.
    pub origin: Vector3<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    pub links: Vec<ChainLink>,
    /// End point carried by the last joint, in the neutral pose.
    pub tip: Vector3<f64>,
}

/// Result of a forward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainPose {
    pub positions: Vec<Vector3<f64>>,
    pub tip: Vector3<f64>,
    /// Orientation of the last link relative to the neutral pose.
    pub tip_rotation: UnitQuaternion<f64>,
}

impl ChainPose {
    /// Where the last link's forward (+Z) direction points.
    pub fn forward(&self) -> Vector3<f64> {
        self.tip_rotation * Vector3::z()
    }
}

fn v(p: [f64; 3]) -> Vector3<f64> {
    Vector3::new(p[0], p[1], p[2])
}

impl Chain {
    pub fn head(reference: &HeadReference) -> Self {
        Self {
            links: vec![
                ChainLink { id: ServoId::HeadYaw, origin: v(reference.yaw) },
                ChainLink { id: ServoId::HeadPitch, origin: v(reference.pitch) },
                ChainLink { id: ServoId::HeadRoll, origin: v(reference.roll) },
            ],
            tip: v(reference.roll),
        }
    }

    /// `ids` in [`ServoId::LEFT_ARM`] order.
    pub fn arm(reference: &ArmReference, ids: [ServoId; 5]) -> Self {
        let origins = [
            reference.shoulder_pitch,
            reference.shoulder_roll,
            reference.upper_arm_yaw,
            reference.lower_arm_pitch,
            reference.hand_yaw,
        ];
        Self {
            links: ids
                .into_iter()
                .zip(origins)
                .map(|(id, origin)| ChainLink { id, origin: v(origin) })
                .collect(),
            tip: v(reference.hand_tip),
        }
    }

    /// `ids` in [`ServoId::LEFT_LEG`] order.
    pub fn leg(reference: &LegReference, ids: [ServoId; 6]) -> Self {
        let origins = [
            reference.hip_yaw,
            reference.hip_roll,
            reference.hip_pitch,
            reference.knee,
            reference.ankle,
            reference.foot_roll,
        ];
        Self {
            links: ids
                .into_iter()
                .zip(origins)
                .map(|(id, origin)| ChainLink { id, origin: v(origin) })
                .collect(),
            tip: v(reference.sole),
        }
    }

    /// Positions for the physical joint angles in `joints`. Joints missing
    /// from the table are treated as being at zero.
    pub fn forward(&self, joints: &JointSet) -> ChainPose {
        let mut positions = Vec::with_capacity(self.links.len());
        let mut rot = UnitQuaternion::identity();
        let mut position = match self.links.first() {
            Some(link) => link.origin,
            None => return ChainPose {
                positions,
                tip: self.tip,
                tip_rotation: rot,
            },
        };
        let mut previous = position;

        for link in &self.links {
            position += rot * (link.origin - previous);
            previous = link.origin;
            positions.push(position);
            if let Some(joint) = joints.get(link.id) {
                rot *= rotation(joint.axis, joint.physical_angle());
            }
        }

        ChainPose {
            positions,
            tip: position + rot * (self.tip - previous),
            tip_rotation: rot,
        }
    }
}
