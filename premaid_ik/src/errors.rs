use std::error::Error;
use std::fmt;

use premaid_link::{LinkError, ServoId};

#[derive(Debug, Clone, PartialEq)]
pub enum IkError {
    MissingJoint(ServoId),
    InvalidGeometry(String),
    InvalidConfig(String),
    Serialization(String),
}

impl Error for IkError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        None
    }
}

impl fmt::Display for IkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            IkError::MissingJoint(id) => write!(f, "Joint {} is not configured", id),
            IkError::InvalidGeometry(ref msg) => write!(f, "Invalid limb geometry: {}", msg),
            IkError::InvalidConfig(ref msg) => write!(f, "Invalid configuration: {}", msg),
            IkError::Serialization(ref msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl From<LinkError> for IkError {
    fn from(e: LinkError) -> Self {
        IkError::InvalidConfig(e.to_string())
    }
}
