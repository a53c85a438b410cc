//! ScriptFunction trait - callables installed into the runtime
//!
//! A callable reads its arguments from the bottom of the current frame,
//! pushes its results on top, and reports how many results it pushed.

use std::sync::Arc;

use crate::error::ScriptResult;
use crate::state::ScriptState;

/// A native callable bound into the scripting runtime.
pub trait ScriptFunction {
    /// Run the callable against the current frame.
    ///
    /// Returns the number of results pushed onto the stack.
    fn call(&self, state: &mut dyn ScriptState) -> ScriptResult<usize>;
}

impl<F> ScriptFunction for F
where
    F: Fn(&mut dyn ScriptState) -> ScriptResult<usize>,
{
    fn call(&self, state: &mut dyn ScriptState) -> ScriptResult<usize> {
        self(state)
    }
}

/// Shared handle to an installed callable
pub type ScriptFunctionRef = Arc<dyn ScriptFunction + Send + Sync>;
