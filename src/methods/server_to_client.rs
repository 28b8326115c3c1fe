use serde_json::Value;
use std::fmt;

use crate::{error::Error, json_rpc::split_envelope};

/// Result of a `submitblock` call or of a proposal.
///
/// The server answers `null` when it accepts the block and a short reason string (for example
/// `"duplicate"` or `"bad-txnmrklroot"`) when it does not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitResult {
    Accepted,
    Rejected(String),
}

impl SubmitResult {
    pub fn from_json(json: &Value) -> Result<Self, Error> {
        match split_envelope(json)? {
            Value::Null => Ok(SubmitResult::Accepted),
            Value::String(reason) => Ok(SubmitResult::Rejected(reason.clone())),
            _ => Err(Error::WrongType("result")),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmitResult::Accepted)
    }
}

impl fmt::Display for SubmitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitResult::Accepted => write!(f, "accepted"),
            SubmitResult::Rejected(reason) => write!(f, "rejected: {reason}"),
        }
    }
}
