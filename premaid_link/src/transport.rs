use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::packets::{Command, Reply};
use crate::LinkError;

/// Delivery state of the link as reported by the device.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BurstState {
    #[default]
    Normal,
    /// The device dropped a pose; the last pose frame is resent every cycle.
    Bursting,
}

/// Tracks [`BurstState`] from parsed replies. Shared between the reader and
/// the writer of a link.
#[derive(Debug, Default)]
pub struct BurstMonitor {
    bursting: AtomicBool,
}

impl BurstMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> BurstState {
        if self.bursting.load(Ordering::Acquire) {
            BurstState::Bursting
        } else {
            BurstState::Normal
        }
    }

    /// Applies a reply and returns the new state if it changed.
    pub fn observe(&self, reply: &Reply) -> Option<BurstState> {
        let next = if reply.is_drop() {
            BurstState::Bursting
        } else if reply.is_recovery() {
            BurstState::Normal
        } else {
            return None;
        };
        let was = self.bursting.swap(next == BurstState::Bursting, Ordering::AcqRel);
        if was != (next == BurstState::Bursting) {
            Some(next)
        } else {
            None
        }
    }

    pub fn reset(&self) {
        self.bursting.store(false, Ordering::Release);
    }
}

/// A built frame waiting in the outbound queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame {
    pub bytes: Vec<u8>,
    /// Whether the frame may be resent while bursting.
    pub retryable: bool,
}

impl OutboundFrame {
    pub fn from_command(command: &Command) -> Result<Self, LinkError> {
        Ok(Self {
            bytes: command.build()?,
            retryable: command.is_pose(),
        })
    }
}

/// Decides what to write on each I/O cycle.
#[derive(Debug, Clone, Default)]
pub struct SendCycle {
    last_pose: Option<Vec<u8>>,
}

impl SendCycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames to write this cycle, in order: everything drained from the
    /// queue, then a resend of the last pose frame when bursting and the
    /// queue held no fresh pose.
    pub fn plan(&mut self, drained: Vec<OutboundFrame>, state: BurstState) -> Vec<Vec<u8>> {
        let mut fresh_pose = false;
        let mut writes = Vec::with_capacity(drained.len() + 1);
        for frame in drained {
            if frame.retryable {
                self.last_pose = Some(frame.bytes.clone());
                fresh_pose = true;
            }
            writes.push(frame.bytes);
        }
        if state == BurstState::Bursting && !fresh_pose {
            if let Some(last) = &self.last_pose {
                writes.push(last.clone());
            }
        }
        writes
    }

    pub fn last_pose(&self) -> Option<&[u8]> {
        self.last_pose.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joint::ServoValue;
    use crate::servo::ServoId;

    fn pose(units: u16) -> OutboundFrame {
        OutboundFrame::from_command(&Command::pose(vec![ServoValue::new(ServoId::HeadYaw, units)], 10)).unwrap()
    }

    #[test]
    fn test_monitor_transitions() {
        let monitor = BurstMonitor::new();
        assert_eq!(monitor.state(), BurstState::Normal);
        assert_eq!(monitor.observe(&Reply::PoseAck { status: 0x08 }), Some(BurstState::Bursting));
        assert_eq!(monitor.observe(&Reply::PoseAck { status: 0x08 }), None);
        assert_eq!(monitor.observe(&Reply::PropertyAck { status: 0x00 }), None);
        assert_eq!(monitor.state(), BurstState::Bursting);
        assert_eq!(monitor.observe(&Reply::PoseAck { status: 0x00 }), Some(BurstState::Normal));
        assert_eq!(monitor.state(), BurstState::Normal);
    }

    #[test]
    fn test_drop_pattern_inside_a_value_is_ignored() {
        // 18 08 14 inside a parameter payload must not start a burst
        let monitor = BurstMonitor::new();
        let reply = Reply::ParameterRead {
            status: 0,
            data: vec![0x18, 0x08, 0x14],
        };
        assert_eq!(monitor.observe(&reply), None);
        assert_eq!(monitor.state(), BurstState::Normal);
    }

    #[test]
    fn test_cycle_writes_in_order() {
        let mut cycle = SendCycle::new();
        let battery = OutboundFrame::from_command(&Command::BatteryRequest).unwrap();
        let writes = cycle.plan(vec![pose(7000), battery.clone(), pose(8000)], BurstState::Normal);
        assert_eq!(writes, vec![pose(7000).bytes, battery.bytes, pose(8000).bytes]);
        assert_eq!(cycle.last_pose(), Some(pose(8000).bytes.as_slice()));
    }

    #[test]
    fn test_resend_while_bursting() {
        let mut cycle = SendCycle::new();
        assert!(cycle.plan(vec![], BurstState::Bursting).is_empty());
        cycle.plan(vec![pose(7000)], BurstState::Normal);
        let battery = OutboundFrame::from_command(&Command::BatteryRequest).unwrap();
        let writes = cycle.plan(vec![battery.clone()], BurstState::Bursting);
        assert_eq!(writes, vec![battery.bytes, pose(7000).bytes]);
        assert_eq!(cycle.plan(vec![], BurstState::Bursting), vec![pose(7000).bytes]);
        assert!(cycle.plan(vec![], BurstState::Normal).is_empty());
    }
}
