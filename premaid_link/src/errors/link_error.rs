use std::error::Error;
use std::fmt;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum LinkError {
    FrameTooLong(usize),
    InvalidHex(String),
    InvalidConfig(String),
    FailedToSend(String),
    FailedToReceive(String),
    Disconnected(),
    Connection(String),
}

impl Error for LinkError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        None
    }
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            LinkError::FrameTooLong(len) => write!(f, "Frame of {} bytes does not fit the length byte", len),
            LinkError::InvalidHex(ref msg) => write!(f, "Invalid hex: {}", msg),
            LinkError::InvalidConfig(ref msg) => write!(f, "Invalid configuration: {}", msg),
            LinkError::FailedToSend(ref msg) => write!(f, "SendError: {}", msg),
            LinkError::FailedToReceive(ref msg) => write!(f, "ReceiveError: {}", msg),
            LinkError::Disconnected() => write!(f, "Robot appears to be disconnected"),
            LinkError::Connection(ref msg) => write!(f, "Could not connect: {}", msg),
        }
    }
}
