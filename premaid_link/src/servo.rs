use int_enum::IntEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rotation axis of a servo, expressed in the body frame of the robot
/// (X = robot's left, Y = up, Z = forward).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn unit(&self) -> [f64; 3] {
        match self {
            Axis::X => [1.0, 0.0, 0.0],
            Axis::Y => [0.0, 1.0, 0.0],
            Axis::Z => [0.0, 0.0, 1.0],
        }
    }
}

/// Servo identifiers as addressed on the wire.
///
/// The numbering is fixed by the servo bus of the robot and is sparse:
/// 0x19 and 0x1B are not populated. Discriminants must never change.
#[repr(u8)]
#[derive(Serialize, Deserialize, Debug, IntEnum, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServoId {
    RightShoulderPitch = 0x02,
    HeadPitch = 0x03,
    LeftShoulderPitch = 0x04,
    HeadYaw = 0x05,
    RightHipYaw = 0x06,
    HeadRoll = 0x07,
    LeftHipYaw = 0x08,
    RightShoulderRoll = 0x09,
    RightHipRoll = 0x0A,
    LeftShoulderRoll = 0x0B,
    LeftHipRoll = 0x0C,
    RightUpperArmYaw = 0x0D,
    RightUpperLegPitch = 0x0E,
    LeftUpperArmYaw = 0x0F,
    LeftUpperLegPitch = 0x10,
    RightLowerArmPitch = 0x11,
    RightLowerLegPitch = 0x12,
    LeftLowerArmPitch = 0x13,
    LeftLowerLegPitch = 0x14,
    RightHandYaw = 0x15,
    RightFootPitch = 0x16,
    LeftHandYaw = 0x17,
    LeftFootPitch = 0x18,
    RightFootRoll = 0x1A,
    LeftFootRoll = 0x1C,
}

impl ServoId {
    /// Every servo in ascending id order. This is the order the device
    /// expects for full-body pose frames.
    pub const ALL: [ServoId; 25] = [
        ServoId::RightShoulderPitch,
        ServoId::HeadPitch,
        ServoId::LeftShoulderPitch,
        ServoId::HeadYaw,
        ServoId::RightHipYaw,
        ServoId::HeadRoll,
        ServoId::LeftHipYaw,
        ServoId::RightShoulderRoll,
        ServoId::RightHipRoll,
        ServoId::LeftShoulderRoll,
        ServoId::LeftHipRoll,
        ServoId::RightUpperArmYaw,
        ServoId::RightUpperLegPitch,
        ServoId::LeftUpperArmYaw,
        ServoId::LeftUpperLegPitch,
        ServoId::RightLowerArmPitch,
        ServoId::RightLowerLegPitch,
        ServoId::LeftLowerArmPitch,
        ServoId::LeftLowerLegPitch,
        ServoId::RightHandYaw,
        ServoId::RightFootPitch,
        ServoId::LeftHandYaw,
        ServoId::LeftFootPitch,
        ServoId::RightFootRoll,
        ServoId::LeftFootRoll,
    ];

    pub const HEAD: [ServoId; 3] = [ServoId::HeadYaw, ServoId::HeadPitch, ServoId::HeadRoll];

    pub const LEFT_ARM: [ServoId; 5] = [
        ServoId::LeftShoulderPitch,
        ServoId::LeftShoulderRoll,
        ServoId::LeftUpperArmYaw,
        ServoId::LeftLowerArmPitch,
        ServoId::LeftHandYaw,
    ];

    pub const RIGHT_ARM: [ServoId; 5] = [
        ServoId::RightShoulderPitch,
        ServoId::RightShoulderRoll,
        ServoId::RightUpperArmYaw,
        ServoId::RightLowerArmPitch,
        ServoId::RightHandYaw,
    ];

    pub const LEFT_LEG: [ServoId; 6] = [
        ServoId::LeftHipYaw,
        ServoId::LeftHipRoll,
        ServoId::LeftUpperLegPitch,
        ServoId::LeftLowerLegPitch,
        ServoId::LeftFootPitch,
        ServoId::LeftFootRoll,
    ];

    pub const RIGHT_LEG: [ServoId; 6] = [
        ServoId::RightHipYaw,
        ServoId::RightHipRoll,
        ServoId::RightUpperLegPitch,
        ServoId::RightLowerLegPitch,
        ServoId::RightFootPitch,
        ServoId::RightFootRoll,
    ];

    pub fn id(&self) -> u8 {
        u8::from(*self)
    }

    pub fn from_id(id: u8) -> Option<ServoId> {
        ServoId::try_from(id).ok()
    }

    /// Axis the servo turns about when the robot stands in its neutral pose.
    pub fn default_axis(&self) -> Axis {
        use ServoId::*;
        match self {
            HeadPitch | RightShoulderPitch | LeftShoulderPitch | RightUpperLegPitch
            | LeftUpperLegPitch | RightLowerLegPitch | LeftLowerLegPitch | RightFootPitch
            | LeftFootPitch => Axis::X,
            HeadYaw | RightHipYaw | LeftHipYaw | RightUpperArmYaw | LeftUpperArmYaw
            | RightHandYaw | LeftHandYaw => Axis::Y,
            HeadRoll | RightShoulderRoll | LeftShoulderRoll | RightHipRoll | LeftHipRoll
            | RightLowerArmPitch | LeftLowerArmPitch | RightFootRoll | LeftFootRoll => Axis::Z,
        }
    }

    pub fn is_right_side(&self) -> bool {
        ServoId::RIGHT_ARM.contains(self) || ServoId::RIGHT_LEG.contains(self)
    }

    pub fn mask(&self) -> JointMask {
        JointMask(1 << self.id())
    }
}

impl fmt::Display for ServoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}(0x{:02X})", self, self.id())
    }
}

/// Selects a subset of servos. Bit `n` selects the servo whose id is `n`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct JointMask(pub u32);

impl JointMask {
    pub const NONE: JointMask = JointMask(0);
    pub const HEAD: JointMask = JointMask::of(&ServoId::HEAD);
    pub const ARMS: JointMask =
        JointMask::of(&ServoId::LEFT_ARM).union(JointMask::of(&ServoId::RIGHT_ARM));
    pub const LEGS: JointMask =
        JointMask::of(&ServoId::LEFT_LEG).union(JointMask::of(&ServoId::RIGHT_LEG));
    pub const UPPER_BODY: JointMask = JointMask::HEAD.union(JointMask::ARMS);
    pub const FULL_BODY: JointMask = JointMask::of(&ServoId::ALL);

    pub const fn of(ids: &[ServoId]) -> JointMask {
        let mut bits = 0u32;
        let mut i = 0;
        while i < ids.len() {
            bits |= 1 << (ids[i] as u8);
            i += 1;
        }
        JointMask(bits)
    }

    pub const fn union(self, other: JointMask) -> JointMask {
        JointMask(self.0 | other.0)
    }

    pub fn contains(&self, id: ServoId) -> bool {
        self.0 & (1 << id.id()) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Selected servos in ascending id order.
    pub fn servos(&self) -> impl Iterator<Item = ServoId> + '_ {
        ServoId::ALL.into_iter().filter(move |id| self.contains(*id))
    }

    pub fn count(&self) -> usize {
        self.servos().count()
    }
}

impl std::ops::BitOr for JointMask {
    type Output = JointMask;
    fn bitor(self, rhs: JointMask) -> JointMask {
        self.union(rhs)
    }
}
