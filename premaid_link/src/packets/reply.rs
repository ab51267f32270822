use serde::{Deserialize, Serialize};

use super::{verify_checksum, OP_FLASH_DUMP, OP_PARAMETER_READ, OP_POSE, OP_PROPERTY};
use super::hex::to_hex;

/// Status byte of a pose reply when the command was taken.
pub const STATUS_ACCEPTED: u8 = 0x00;
/// Status byte of a pose reply when the device dropped the command.
pub const STATUS_DROPPED: u8 = 0x08;

/// One length-delimited frame cut out of the inbound stream.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ReplyFrame {
    pub bytes: Vec<u8>,
    pub checksum_ok: bool,
}

impl ReplyFrame {
    pub fn new(bytes: Vec<u8>) -> Self {
        let checksum_ok = verify_checksum(&bytes);
        Self { bytes, checksum_ok }
    }

    pub fn opcode(&self) -> Option<u8> {
        self.bytes.get(1).copied()
    }

    pub fn status(&self) -> Option<u8> {
        self.bytes.get(2).copied()
    }

    /// Bytes between the opcode/status header and the checksum.
    pub fn payload(&self) -> &[u8] {
        if self.bytes.len() <= 4 {
            return &[];
        }
        &self.bytes[3..self.bytes.len() - 1]
    }

    pub fn to_hex(&self) -> String {
        to_hex(&self.bytes)
    }

    pub fn reply(&self) -> Reply {
        Reply::from_frame(self)
    }
}

/// A reply frame interpreted by opcode.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    PoseAck { status: u8 },
    PropertyAck { status: u8 },
    ParameterRead { status: u8, data: Vec<u8> },
    FlashPage { status: u8, data: Vec<u8> },
    Unknown(Vec<u8>),
}

impl Reply {
    pub fn from_frame(frame: &ReplyFrame) -> Reply {
        let status = match frame.status() {
            Some(status) if frame.checksum_ok => status,
            _ => return Reply::Unknown(frame.bytes.clone()),
        };
        match frame.opcode() {
            Some(OP_POSE) => Reply::PoseAck { status },
            Some(OP_PROPERTY) => Reply::PropertyAck { status },
            Some(OP_PARAMETER_READ) => Reply::ParameterRead {
                status,
                data: frame.payload().to_vec(),
            },
            Some(OP_FLASH_DUMP) => Reply::FlashPage {
                status,
                data: frame.payload().to_vec(),
            },
            _ => Reply::Unknown(frame.bytes.clone()),
        }
    }

    /// `04 18 08 14`: the device dropped a pose command.
    pub fn is_drop(&self) -> bool {
        matches!(self, Reply::PoseAck { status: STATUS_DROPPED })
    }

    /// `04 18 00 1C`: the device took the pose command.
    pub fn is_recovery(&self) -> bool {
        matches!(self, Reply::PoseAck { status: STATUS_ACCEPTED })
    }

    /// Battery level from a parameter reply, as the raw little-endian word.
    pub fn battery_raw(&self) -> Option<u16> {
        match self {
            Reply::ParameterRead { data, .. } if data.len() >= 2 => Some(u16::from_le_bytes([data[0], data[1]])),
            _ => None,
        }
    }
}
