//! winscript SDK - scripting-runtime boundary types
//!
//! This crate provides the minimal types and traits the native call engine
//! needs from an embedded scripting runtime, without depending on the engine:
//!
//! - [`ScriptValue`]: values on the runtime stack
//! - [`ScriptState`]: the state handle (check/push primitives)
//! - [`ScriptFunction`]: a callable installed into the runtime
//! - [`ScriptError`]: the fail-the-current-call primitive
//! - [`ValueStack`]: a concrete single-threaded host implementing `ScriptState`
//!
//! # Example
//!
//! ```ignore
//! use winscript_sdk::{ScriptState, ValueStack};
//!
//! let mut stack = ValueStack::with_args([750i64, 300]);
//! let freq = stack.check_integer(1)?;
//! stack.push_integer(freq * 2);
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod function;
pub mod stack;
pub mod state;
pub mod value;

pub use error::{ScriptError, ScriptResult};
pub use function::{ScriptFunction, ScriptFunctionRef};
pub use stack::ValueStack;
pub use state::ScriptState;
pub use value::{ScriptString, ScriptValue, ValueKind};
