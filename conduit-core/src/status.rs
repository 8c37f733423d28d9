//! Read status protocol
//!
//! Every read in a pipeline answers with one of four codes. Only `Ok`
//! may be accompanied by payload changes; the other three are forwarded
//! upward untouched by every layer.

use serde::{Deserialize, Serialize};

use crate::unit::UnitBuffer;

/// Outcome of one read call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadStatus {
    /// The designated destination holds a fresh unit
    Ok,
    /// Nothing available yet; retry later
    Again,
    /// Upstream exhausted
    Eof,
    /// Unrecoverable for this source
    Error,
}

impl ReadStatus {
    /// True only for `Ok`
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }

    /// `Eof` and `Error` end a stream; `Ok` and `Again` do not
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Eof | Self::Error)
    }
}

impl std::fmt::Display for ReadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Again => write!(f, "AGAIN"),
            Self::Eof => write!(f, "EOF"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Outcome of a read that hands back a borrowed unit
///
/// Returned by source-allocating capabilities and by reads where the
/// caller supplied no buffer. The borrow ends at the next read.
#[derive(Debug)]
pub enum Pull<'a> {
    /// A unit owned by the callee
    Unit(&'a UnitBuffer),
    Again,
    Eof,
    Error,
}

impl<'a> Pull<'a> {
    /// Build a unit-less pull from a non-`Ok` status
    ///
    /// # Panics
    /// If `status` is `Ok`, which needs a unit to go with it.
    pub fn from_status(status: ReadStatus) -> Self {
        match status {
            ReadStatus::Again => Self::Again,
            ReadStatus::Eof => Self::Eof,
            ReadStatus::Error => Self::Error,
            ReadStatus::Ok => panic!("Pull::from_status called with OK and no unit"),
        }
    }

    /// Status code of this pull
    pub fn status(&self) -> ReadStatus {
        match self {
            Self::Unit(_) => ReadStatus::Ok,
            Self::Again => ReadStatus::Again,
            Self::Eof => ReadStatus::Eof,
            Self::Error => ReadStatus::Error,
        }
    }

    /// The delivered unit, if any
    pub fn unit(&self) -> Option<&'a UnitBuffer> {
        match self {
            Self::Unit(unit) => Some(unit),
            _ => None,
        }
    }
}
