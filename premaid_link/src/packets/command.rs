use serde::{Deserialize, Serialize};

use super::rewrite_checksum;
use crate::joint::{JointSet, ServoValue};
use crate::servo::{JointMask, ServoId};
use crate::LinkError;

pub const OP_PARAMETER_READ: u8 = 0x01;
pub const OP_POSE: u8 = 0x18;
pub const OP_PROPERTY: u8 = 0x19;
pub const OP_FLASH_DUMP: u8 = 0x1C;

pub const PROPERTY_SPEED: u8 = 0x00;
pub const PROPERTY_STRETCH: u8 = 0x10;

/// Playback speed the device uses for the relax-all frame.
pub const RELAX_SPEED: u8 = 0x06;
/// Property value given to servos outside the mask when no other value is requested.
pub const DEFAULT_PROPERTY_VALUE: u8 = 60;

const CHECKSUM_PLACEHOLDER: u8 = 0xFF;

/// Largest frame the one-byte length field can describe.
pub const MAX_FRAME_LEN: usize = u8::MAX as usize;

/// A command frame for the robot.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Command {
    /// Moves the listed servos. `speed` is 1 (fastest) to 255 (slowest).
    Pose { speed: u8, servos: Vec<ServoValue> },
    /// Switches the torque of every servo off.
    RelaxAll,
    /// Sets the stretch (holding stiffness) property, 1..=127 per servo.
    StretchProperty(Vec<(ServoId, u8)>),
    /// Sets the speed property, 1..=127 per servo.
    SpeedProperty(Vec<(ServoId, u8)>),
    BatteryRequest,
    FlashDump { page: u8 },
}

impl Command {
    /// Pose frame with `speed` clamped to 1..=255.
    pub fn pose(servos: Vec<ServoValue>, speed: i32) -> Self {
        Command::Pose {
            speed: speed.clamp(1, 255) as u8,
            servos,
        }
    }

    /// Pose frame for the joints of `joints` selected by `mask`.
    pub fn pose_from_joints(joints: &JointSet, mask: JointMask, speed: i32) -> Self {
        Command::pose(joints.masked_values(mask), speed)
    }

    /// Stretch values for every servo: `value` for servos in `mask`, and
    /// `others` (or [`DEFAULT_PROPERTY_VALUE`] when negative) for the rest.
    /// With `others` set to `None` the servos outside the mask are omitted.
    pub fn stretch(mask: JointMask, value: i32, others: Option<i32>) -> Self {
        Command::StretchProperty(property_values(mask, value, others))
    }

    pub fn servo_speed(mask: JointMask, value: i32, others: Option<i32>) -> Self {
        Command::SpeedProperty(property_values(mask, value, others))
    }

    /// Pose frames are the only ones worth resending when the device drops one.
    pub fn is_pose(&self) -> bool {
        matches!(self, Command::Pose { .. })
    }

    pub fn build(&self) -> Result<Vec<u8>, LinkError> {
        match self {
            Command::Pose { speed, servos } => build_pose(servos, *speed as i32),
            Command::RelaxAll => {
                let servos: Vec<ServoValue> = ServoId::ALL.into_iter().map(ServoValue::relax).collect();
                build_pose(&servos, RELAX_SPEED as i32)
            }
            Command::StretchProperty(values) => build_property(PROPERTY_STRETCH, values),
            Command::SpeedProperty(values) => build_property(PROPERTY_SPEED, values),
            Command::BatteryRequest => finish_frame(&[OP_PARAMETER_READ, 0x00, 0x02, 0x00, 0x02]),
            Command::FlashDump { page } => finish_frame(&[OP_FLASH_DUMP, 0x00, *page]),
        }
    }
}

fn property_values(mask: JointMask, value: i32, others: Option<i32>) -> Vec<(ServoId, u8)> {
    let value = value.clamp(1, 127) as u8;
    let others = others.map(|v| {
        if v < 0 {
            DEFAULT_PROPERTY_VALUE
        } else {
            v.clamp(1, 127) as u8
        }
    });
    ServoId::ALL
        .into_iter()
        .filter_map(|id| {
            if mask.contains(id) {
                Some((id, value))
            } else {
                others.map(|v| (id, v))
            }
        })
        .collect()
}

/// `[len][0x18][0x00][speed]{[id][lo][hi]}*N[xor]` with `len = 3N + 5`.
pub fn build_pose(servos: &[ServoValue], speed: i32) -> Result<Vec<u8>, LinkError> {
    let mut body = Vec::with_capacity(3 + servos.len() * 3);
    body.extend_from_slice(&[OP_POSE, 0x00, speed.clamp(1, 255) as u8]);
    for servo in servos {
        body.extend_from_slice(&servo.to_bytes());
    }
    finish_frame(&body)
}

/// `[len][0x19][property]{[id][value]}*N[xor]` with `len = 2N + 4`.
fn build_property(property: u8, values: &[(ServoId, u8)]) -> Result<Vec<u8>, LinkError> {
    let mut body = Vec::with_capacity(2 + values.len() * 2);
    body.extend_from_slice(&[OP_PROPERTY, property]);
    for (id, value) in values {
        body.extend_from_slice(&[id.id(), *value]);
    }
    finish_frame(&body)
}

/// Wraps `body` with the length byte and a checksum trailer.
pub fn finish_frame(body: &[u8]) -> Result<Vec<u8>, LinkError> {
    let len = body.len() + 2;
    if len > MAX_FRAME_LEN {
        return Err(LinkError::FrameTooLong(len));
    }
    let mut frame = Vec::with_capacity(len);
    frame.push(len as u8);
    frame.extend_from_slice(body);
    frame.push(CHECKSUM_PLACEHOLDER);
    rewrite_checksum(&mut frame);
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packets::hex::{from_hex, to_hex};
    use crate::packets::verify_checksum;

    #[test]
    fn test_battery_request_literal() {
        let frame = Command::BatteryRequest.build().unwrap();
        assert_eq!(to_hex(&frame), "07 01 00 02 00 02 06");
    }

    #[test]
    fn test_flash_dump_request() {
        let frame = Command::FlashDump { page: 0x03 }.build().unwrap();
        assert_eq!(frame[..4], [0x05, 0x1C, 0x00, 0x03]);
        assert!(verify_checksum(&frame));
    }

    #[test]
    fn test_relax_all_matches_device_literal() {
        let mut expected = from_hex(
            "50 18 00 06 02 00 00 03 00 00 04 00 00 05 00 00 06 00 00 07 00 00 08 00 00 09 00 00 \
             0A 00 00 0B 00 00 0C 00 00 0D 00 00 0E 00 00 0F 00 00 10 00 00 11 00 00 12 00 00 \
             13 00 00 14 00 00 15 00 00 16 00 00 17 00 00 18 00 00 1A 00 00 1C 00 00 FF",
        )
        .unwrap();
        rewrite_checksum(&mut expected);
        assert_eq!(Command::RelaxAll.build().unwrap(), expected);
        assert_eq!(expected.len(), 0x50);
    }

    #[test]
    fn test_single_servo_pose() {
        let frame = Command::pose(vec![ServoValue::new(ServoId::HeadYaw, 7500)], 20).build().unwrap();
        assert_eq!(frame[..7], [0x08, 0x18, 0x00, 0x14, 0x05, 0x4C, 0x1D]);
        assert!(verify_checksum(&frame));
    }

    #[test]
    fn test_speed_is_clamped() {
        match Command::pose(vec![], 0) {
            Command::Pose { speed, .. } => assert_eq!(speed, 1),
            _ => unreachable!(),
        }
        match Command::pose(vec![], 1000) {
            Command::Pose { speed, .. } => assert_eq!(speed, 255),
            _ => unreachable!(),
        }
        assert_eq!(build_pose(&[], -3).unwrap()[3], 1);
    }

    #[test]
    fn test_stretch_property_length() {
        let frame = Command::stretch(JointMask::HEAD, 200, None).build().unwrap();
        assert_eq!(frame.len(), 2 * 3 + 4);
        assert_eq!(frame[..4], [0x0A, 0x19, 0x10, 0x03]);
        assert_eq!(frame[4], 127);
        assert!(verify_checksum(&frame));

        let frame = Command::stretch(JointMask::HEAD, 10, Some(-1)).build().unwrap();
        assert_eq!(frame.len(), 2 * 25 + 4);
        // RightShoulderPitch is outside the mask and gets the default value
        assert_eq!(frame[3..5], [0x02, DEFAULT_PROPERTY_VALUE]);
        assert_eq!(frame[5..7], [0x03, 10]);
    }

    #[test]
    fn test_speed_property_opcode() {
        let frame = Command::servo_speed(JointMask::LEGS, 0, Some(90)).build().unwrap();
        assert_eq!(frame[..3], [0x36, 0x19, 0x00]);
        assert_eq!(frame[3..5], [0x02, 90]);
        assert_eq!(frame[11..13], [0x06, 1]);
    }

    #[test]
    fn test_overlong_frame_is_rejected() {
        let servos: Vec<ServoValue> = (0..84).map(|_| ServoValue::new(ServoId::HeadYaw, 7500)).collect();
        assert!(matches!(build_pose(&servos, 10), Err(LinkError::FrameTooLong(257))));
        assert!(build_pose(&servos[..83], 10).is_ok());
    }
}
