//! Failure classification shared by the broker and its collaborators
//!
//! Callers of the broker decide whether to retry, drop or escalate based
//! on the [`ErrorKind`] carried in every nack:
//! - `Structural`: the input itself is malformed; resending it unchanged is pointless
//! - `Behavioural`: well-formed, but nothing known authenticates or owns it
//! - `Operational`: a downstream delivery failed; retry with backoff

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Structural,
    Behavioural,
    Operational,
}

impl ErrorKind {
    /// Wire identifier used in NACK datagrams
    pub fn to_byte(self) -> u8 {
        match self {
            ErrorKind::Structural => 0x01,
            ErrorKind::Behavioural => 0x02,
            ErrorKind::Operational => 0x03,
        }
    }

    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(ErrorKind::Structural),
            0x02 => Some(ErrorKind::Behavioural),
            0x03 => Some(ErrorKind::Operational),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Structural => write!(f, "structural"),
            ErrorKind::Behavioural => write!(f, "behavioural"),
            ErrorKind::Operational => write!(f, "operational"),
        }
    }
}

/// A classified failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn structural(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Structural, message)
    }

    pub fn behavioural(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Behavioural, message)
    }

    pub fn operational(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Operational, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub type Result<T> = std::result::Result<T, Error>;
