//! Error types for the scripting-runtime boundary

/// Result type for calls made from the scripting runtime
pub type ScriptResult<T> = Result<T, ScriptError>;

/// Failure of the current scripting call.
///
/// This is the runtime's fail-the-current-call primitive: returning it from a
/// [`ScriptFunction`](crate::ScriptFunction) aborts the call with the
/// formatted message but leaves the runtime itself usable.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScriptError {
    /// A stack slot did not hold a value of the expected kind
    #[error("bad argument #{index} ({message})")]
    BadArgument {
        /// 1-based stack index of the offending argument
        index: i32,
        /// What was expected and what was found
        message: String,
    },

    /// Any other failure, carrying a fully formatted message
    #[error("{0}")]
    Runtime(String),
}

impl ScriptError {
    /// Create a bad-argument error
    pub fn bad_argument(index: i32, message: impl Into<String>) -> Self {
        ScriptError::BadArgument {
            index,
            message: message.into(),
        }
    }

    /// Create a "X expected, got Y" bad-argument error
    pub fn type_mismatch(index: i32, expected: &str, got: &str) -> Self {
        Self::bad_argument(index, format!("{} expected, got {}", expected, got))
    }
}

impl From<String> for ScriptError {
    fn from(s: String) -> Self {
        ScriptError::Runtime(s)
    }
}

impl From<&str> for ScriptError {
    fn from(s: &str) -> Self {
        ScriptError::Runtime(s.to_string())
    }
}
