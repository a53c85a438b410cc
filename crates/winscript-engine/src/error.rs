//! Engine error types
//!
//! Every failure the engine can detect is detected before a native call is
//! made. Internal layers return [`EngineError`]; the module views translate it
//! into the runtime's [`ScriptError`] at the outermost boundary.

use thiserror::Error;
use winscript_sdk::ScriptError;

use crate::config::ConfigError;
use crate::ffi::Slot;
use crate::metadata::MetadataError;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised while looking up, resolving or binding native functions
#[derive(Debug, Error)]
pub enum EngineError {
    /// Type lookup failed
    #[error("Type '{namespace}.{name}' could not be found")]
    TypeNotFound {
        /// Namespace that was searched
        namespace: String,
        /// Bare type name that was searched
        name: String,
    },

    /// Dotted type name without a namespace part
    #[error("Type '{0}' is missing a namespace qualifier")]
    MissingNamespace(String),

    /// Type reference that does not lead to a definition
    #[error("Unable to resolve {0}")]
    Unresolved(String),

    /// Named value type or enum storage without marshaling support
    #[error("Unsupported type '{name}' at {slot}")]
    UnsupportedType {
        /// Bare type name
        name: String,
        /// Parameter position or return slot
        slot: Slot,
    },

    /// Element kind outside the supported subset
    #[error("Unrecognized ELEMENT_TYPE {element} at {slot}")]
    UnsupportedElementType {
        /// Element kind name
        element: String,
        /// Parameter position or return slot
        slot: Slot,
    },

    /// Parameter count above the trampoline's maximum arity
    #[error("{name} has too many parameters.")]
    TooManyParameters {
        /// Exported function name
        name: String,
        /// Declared parameter count
        count: usize,
    },

    /// No exported function with this name in the metadata
    #[error("{0} not found.")]
    ApiNotFound(String),

    /// Module or symbol could not be loaded
    #[error("{0} can't load.")]
    CannotLoad(String),

    /// No constant with this name in the metadata
    #[error("{0} not found.")]
    ConstantNotFound(String),

    /// Metadata source failed to load
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// Configuration failed to load
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Failure reported by the scripting runtime
    #[error(transparent)]
    Script(#[from] ScriptError),
}

impl From<EngineError> for ScriptError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Script(err) => err,
            other => ScriptError::Runtime(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_offender() {
        let err = EngineError::UnsupportedType {
            name: "Bar".to_string(),
            slot: Slot::Param(1),
        };
        assert_eq!(err.to_string(), "Unsupported type 'Bar' at #1");

        let err = EngineError::UnsupportedElementType {
            element: "R8".to_string(),
            slot: Slot::Return,
        };
        assert_eq!(err.to_string(), "Unrecognized ELEMENT_TYPE R8 at #RET");

        let err = EngineError::TooManyParameters {
            name: "CreateWindowExW".to_string(),
            count: 13,
        };
        assert_eq!(err.to_string(), "CreateWindowExW has too many parameters.");
        assert_eq!(EngineError::ApiNotFound("Foo".into()).to_string(), "Foo not found.");
        assert_eq!(EngineError::CannotLoad("Foo".into()).to_string(), "Foo can't load.");
    }

    #[test]
    fn test_into_script_error() {
        let script: ScriptError = EngineError::ApiNotFound("Foo".into()).into();
        assert_eq!(script, ScriptError::Runtime("Foo not found.".to_string()));

        let inner = ScriptError::bad_argument(2, "number expected, got nil");
        let script: ScriptError = EngineError::Script(inner.clone()).into();
        assert_eq!(script, inner);
    }
}
