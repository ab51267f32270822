use std::collections::{BTreeMap, BTreeSet};

use premaid_ik::{IkError, RobotConfig, RobotModel, Vector3};
use premaid_link::joint::{units_to_angle, RELAX_UNITS};
use premaid_link::packets::{
    finish_frame, hex, OP_FLASH_DUMP, OP_PARAMETER_READ, OP_POSE, OP_PROPERTY, PROPERTY_SPEED, PROPERTY_STRETCH,
    STATUS_ACCEPTED, STATUS_DROPPED,
};
use premaid_link::{JointSet, LinkError, ReplyFrame, ServoId};

use crate::sim_config::SimConfig;

/// Bytes returned per flash page.
pub const FLASH_PAGE_LEN: usize = 16;

/// The device side of the link: decodes command frames, keeps the servo
/// state they describe and builds the replies the robot would send.
#[derive(Debug)]
pub struct SimRobot {
    config: SimConfig,
    model: RobotModel,
    relaxed: BTreeSet<ServoId>,
    stretch: BTreeMap<ServoId, u8>,
    servo_speed: BTreeMap<ServoId, u8>,
    poses_received: u64,
    poses_applied: u64,
    last_speed: u8,
}

impl SimRobot {
    pub fn new(config: SimConfig) -> Result<Self, IkError> {
        let model = RobotModel::new(RobotConfig::premaid())?;
        Ok(Self {
            config,
            model,
            // servos come up without torque
            relaxed: ServoId::ALL.into_iter().collect(),
            stretch: BTreeMap::new(),
            servo_speed: BTreeMap::new(),
            poses_received: 0,
            poses_applied: 0,
            last_speed: 0,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn joints(&self) -> &JointSet {
        self.model.joints()
    }

    pub fn is_relaxed(&self, id: ServoId) -> bool {
        self.relaxed.contains(&id)
    }

    pub fn stretch(&self, id: ServoId) -> Option<u8> {
        self.stretch.get(&id).copied()
    }

    pub fn servo_speed(&self, id: ServoId) -> Option<u8> {
        self.servo_speed.get(&id).copied()
    }

    pub fn poses_received(&self) -> u64 {
        self.poses_received
    }

    pub fn poses_applied(&self) -> u64 {
        self.poses_applied
    }

    pub fn last_speed(&self) -> u8 {
        self.last_speed
    }

    /// Left and right hand tip positions for the current servo angles.
    pub fn hand_positions(&self) -> (Vector3<f64>, Vector3<f64>) {
        let pose = self.model.forward();
        (pose.left_hand.tip, pose.right_hand.tip)
    }

    /// Handles one inbound frame and returns the reply to send, if any.
    pub fn handle(&mut self, frame: &ReplyFrame) -> Result<Option<Vec<u8>>, LinkError> {
        if !frame.checksum_ok {
            tracing::warn!("ignoring frame with bad checksum: {}", frame.to_hex());
            return Ok(None);
        }
        let bytes = &frame.bytes;
        let reply = match frame.opcode() {
            Some(OP_POSE) => self.handle_pose(bytes)?,
            Some(OP_PROPERTY) => self.handle_property(bytes)?,
            Some(OP_PARAMETER_READ) => {
                let [lo, hi] = self.config.battery_raw.to_le_bytes();
                Some(finish_frame(&[OP_PARAMETER_READ, STATUS_ACCEPTED, lo, hi])?)
            }
            Some(OP_FLASH_DUMP) => match bytes.get(3) {
                Some(&page) => Some(finish_frame(&flash_page(page))?),
                None => None,
            },
            _ => {
                tracing::warn!("unknown command: {}", frame.to_hex());
                None
            }
        };
        Ok(reply)
    }

    fn handle_pose(&mut self, bytes: &[u8]) -> Result<Option<Vec<u8>>, LinkError> {
        if bytes.len() < 5 || (bytes.len() - 5) % 3 != 0 {
            tracing::warn!("malformed pose frame: {}", hex::to_hex(bytes));
            return Ok(None);
        }
        self.poses_received += 1;
        let drop_every = self.config.drop_every as u64;
        if drop_every > 0 && self.poses_received % drop_every == 0 {
            tracing::debug!("dropping pose {}", self.poses_received);
            return Ok(Some(finish_frame(&[OP_POSE, STATUS_DROPPED])?));
        }

        self.last_speed = bytes[3];
        for servo in bytes[4..bytes.len() - 1].chunks_exact(3) {
            let Some(id) = ServoId::from_id(servo[0]) else {
                tracing::warn!("pose for unknown servo id {:#04X}", servo[0]);
                continue;
            };
            let units = u16::from_le_bytes([servo[1], servo[2]]);
            if units == RELAX_UNITS {
                self.relaxed.insert(id);
                continue;
            }
            self.relaxed.remove(&id);
            if let Some(joint) = self.model.joints_mut().get_mut(id) {
                joint.angle = units_to_angle(units);
            }
        }
        self.poses_applied += 1;

        let every = self.config.report_every as u64;
        if every > 0 && self.poses_applied % every == 0 {
            let (left, right) = self.hand_positions();
            tracing::info!(
                "pose {}: left hand ({:.3}, {:.3}, {:.3}) right hand ({:.3}, {:.3}, {:.3})",
                self.poses_applied,
                left.x,
                left.y,
                left.z,
                right.x,
                right.y,
                right.z
            );
        }
        Ok(Some(finish_frame(&[OP_POSE, STATUS_ACCEPTED])?))
    }

    fn handle_property(&mut self, bytes: &[u8]) -> Result<Option<Vec<u8>>, LinkError> {
        if bytes.len() < 4 || (bytes.len() - 4) % 2 != 0 {
            tracing::warn!("malformed property frame: {}", hex::to_hex(bytes));
            return Ok(None);
        }
        let table = match bytes[2] {
            PROPERTY_STRETCH => &mut self.stretch,
            PROPERTY_SPEED => &mut self.servo_speed,
            other => {
                tracing::warn!("unknown property {:#04X}", other);
                return Ok(Some(finish_frame(&[OP_PROPERTY, STATUS_DROPPED])?));
            }
        };
        for pair in bytes[3..bytes.len() - 1].chunks_exact(2) {
            if let Some(id) = ServoId::from_id(pair[0]) {
                table.insert(id, pair[1]);
            }
        }
        Ok(Some(finish_frame(&[OP_PROPERTY, STATUS_ACCEPTED])?))
    }
}

/// Reply body for a flash page: the page number followed by a fixed
/// pattern derived from it.
fn flash_page(page: u8) -> Vec<u8> {
    let mut body = Vec::with_capacity(3 + FLASH_PAGE_LEN);
    body.extend_from_slice(&[OP_FLASH_DUMP, STATUS_ACCEPTED, page]);
    body.extend((0..FLASH_PAGE_LEN as u8).map(|i| page.wrapping_mul(FLASH_PAGE_LEN as u8).wrapping_add(i)));
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use premaid_link::{Command, JointMask, Reply};

    fn robot(config: SimConfig) -> SimRobot {
        SimRobot::new(config).unwrap()
    }

    fn send(robot: &mut SimRobot, command: Command) -> Option<Reply> {
        let frame = ReplyFrame::new(command.build().unwrap());
        robot.handle(&frame).unwrap().map(|bytes| ReplyFrame::new(bytes).reply())
    }

    #[test]
    fn test_pose_is_applied_and_acknowledged() {
        let mut sim = robot(SimConfig::default());
        let mut joints = JointSet::premaid();
        joints.set_value(ServoId::LeftShoulderPitch, -45.0);
        let reply = send(&mut sim, Command::pose_from_joints(&joints, JointMask::ARMS, 30)).unwrap();
        assert!(reply.is_recovery());
        assert_eq!(sim.last_speed(), 30);
        assert!((sim.joints().angle(ServoId::LeftShoulderPitch).unwrap() + 45.0).abs() < 0.05);
        assert!(!sim.is_relaxed(ServoId::LeftShoulderPitch));
        assert!(sim.is_relaxed(ServoId::HeadYaw));
    }

    #[test]
    fn test_relax_all_relaxes_every_servo() {
        let mut sim = robot(SimConfig::default());
        send(&mut sim, Command::pose_from_joints(&JointSet::premaid(), JointMask::FULL_BODY, 20));
        assert!(!sim.is_relaxed(ServoId::RightFootRoll));
        send(&mut sim, Command::RelaxAll);
        assert!(ServoId::ALL.into_iter().all(|id| sim.is_relaxed(id)));
    }

    #[test]
    fn test_every_nth_pose_is_dropped() {
        let mut sim = robot(SimConfig {
            drop_every: 3,
            ..SimConfig::default()
        });
        let joints = JointSet::premaid();
        let replies: Vec<bool> = (0..6)
            .map(|_| send(&mut sim, Command::pose_from_joints(&joints, JointMask::HEAD, 10)).unwrap().is_drop())
            .collect();
        assert_eq!(replies, vec![false, false, true, false, false, true]);
        assert_eq!(sim.poses_received(), 6);
        assert_eq!(sim.poses_applied(), 4);
    }

    #[test]
    fn test_property_values_are_recorded() {
        let mut sim = robot(SimConfig::default());
        let reply = send(&mut sim, Command::stretch(JointMask::HEAD, 100, None)).unwrap();
        assert_eq!(reply, Reply::PropertyAck { status: STATUS_ACCEPTED });
        assert_eq!(sim.stretch(ServoId::HeadPitch), Some(100));
        assert_eq!(sim.stretch(ServoId::LeftHipYaw), None);

        send(&mut sim, Command::servo_speed(JointMask::LEGS, 20, Some(-1)));
        assert_eq!(sim.servo_speed(ServoId::LeftLowerLegPitch), Some(20));
        assert_eq!(sim.servo_speed(ServoId::HeadYaw), Some(60));
    }

    #[test]
    fn test_battery_and_flash_reads() {
        let mut sim = robot(SimConfig {
            battery_raw: 0x1234,
            ..SimConfig::default()
        });
        let reply = send(&mut sim, Command::BatteryRequest).unwrap();
        assert_eq!(reply.battery_raw(), Some(0x1234));

        match send(&mut sim, Command::FlashDump { page: 2 }).unwrap() {
            Reply::FlashPage { status, data } => {
                assert_eq!(status, STATUS_ACCEPTED);
                assert_eq!(data.len(), 1 + FLASH_PAGE_LEN);
                assert_eq!(data[0], 2);
                assert_eq!(data[1], 0x20);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_bad_frames_get_no_reply() {
        let mut sim = robot(SimConfig::default());
        let mut bytes = Command::RelaxAll.build().unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert_eq!(sim.handle(&ReplyFrame::new(bytes)).unwrap(), None);
        assert_eq!(sim.handle(&ReplyFrame::new(vec![0x03, 0x7E, 0x7D])).unwrap(), None);
    }

    #[test]
    fn test_hand_positions_follow_pose() {
        let mut sim = robot(SimConfig::default());
        let (left, right) = sim.hand_positions();
        assert!((left.x + right.x).abs() < 1e-9);

        let mut joints = JointSet::premaid();
        joints.set_value(ServoId::LeftShoulderPitch, -90.0);
        send(&mut sim, Command::pose_from_joints(&joints, JointMask::ARMS, 20));
        let (left, _) = sim.hand_positions();
        assert!(left.z > 0.1, "{:?}", left);
    }
}
