//! Servo link for the PreMaid AI humanoid: servo ids and joints, command
//! frames, the inbound frame parser, burst-retry transport logic and an
//! async driver that ties them to a byte stream.

pub mod servo;
pub mod joint;
pub mod packets;
pub mod parser;
pub mod transport;
pub mod drivers;
pub mod errors;

pub use errors::*;
pub use servo::{Axis, JointMask, ServoId};
pub use joint::{Joint, JointSet, ServoValue};
pub use packets::{Command, Reply, ReplyFrame};
pub use parser::{FrameParser, ParserConfig};
pub use transport::BurstState;
pub use drivers::DriverConfig;
#[cfg(feature="driver")]
pub use drivers::PremaidDriver;
