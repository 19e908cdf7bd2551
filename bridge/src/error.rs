//! Error taxonomy and structured invocation results

use std::path::PathBuf;

use hmbridge_host::Unresolved;
use thiserror::Error;

use crate::guard::ExecState;
use crate::value::MacroValue;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    /// The requested invocation mode is not legal in the current engine state
    #[error("macro engine is {actual}, operation requires {expected}")]
    StateViolation {
        expected: ExecState,
        actual: ExecState,
    },

    #[error("macro file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// A required host export was never bound
    #[error("host function '{0}' is unavailable")]
    HostUnavailable(&'static str),

    /// The host reported a zero status
    #[error("macro failed: {0}")]
    MacroFailure(String),

    #[error("marshaling failed: {0}")]
    MarshalFailure(String),
}

impl From<Unresolved> for BridgeError {
    fn from(e: Unresolved) -> Self {
        BridgeError::HostUnavailable(e.0)
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Outcome of a statement-style macro invocation.
///
/// Failures are carried in `error`; callers inspect it instead of relying on
/// control flow.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroResult {
    /// `-1` rejected before reaching the host, `0` host failure, host status otherwise
    pub status: i32,
    pub message: String,
    pub error: Option<BridgeError>,
}

impl MacroResult {
    pub fn ok(status: i32, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            error: None,
        }
    }

    pub fn rejected(error: BridgeError) -> Self {
        Self {
            status: -1,
            message: String::new(),
            error: Some(error),
        }
    }

    pub fn failed(message: impl Into<String>, error: BridgeError) -> Self {
        Self {
            status: 0,
            message: message.into(),
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Turn the result into a `Result`, dropping the message.
    pub fn into_result(self) -> Result<i32> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.status),
        }
    }
}

/// Outcome of a function-style macro invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionResult {
    pub value: Option<MacroValue>,
    pub message: String,
    pub error: Option<BridgeError>,
}

impl FunctionResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}
