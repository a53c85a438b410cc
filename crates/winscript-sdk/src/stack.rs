//! ValueStack - a single-threaded value stack implementing [`ScriptState`]
//!
//! This is the default embedded host: a call frame is a stack whose bottom
//! values are the call arguments, and a handler pushes its results on top.

use crate::state::ScriptState;
use crate::value::ScriptValue;

/// Growable stack of script values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueStack {
    values: Vec<ScriptValue>,
}

impl ValueStack {
    /// Create an empty stack
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Create a call frame holding `args` at indices 1..=n
    pub fn with_args<I>(args: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<ScriptValue>,
    {
        Self {
            values: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Pop the top value
    pub fn pop(&mut self) -> Option<ScriptValue> {
        self.values.pop()
    }

    /// Remove and return the top `count` values, bottom-most first
    pub fn take_results(&mut self, count: usize) -> Vec<ScriptValue> {
        let start = self.values.len().saturating_sub(count);
        self.values.split_off(start)
    }

    /// Number of values on the stack
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the stack is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Remove every value
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Translate a 1-based or negative index into a vector position
    fn position(&self, index: i32) -> Option<usize> {
        let len = self.values.len() as i64;
        let index = index as i64;
        let pos = if index > 0 {
            index - 1
        } else if index < 0 {
            len + index
        } else {
            return None;
        };
        (0..len).contains(&pos).then_some(pos as usize)
    }
}

impl ScriptState for ValueStack {
    fn top(&self) -> i32 {
        self.values.len() as i32
    }

    fn get(&self, index: i32) -> Option<&ScriptValue> {
        self.position(index).map(|pos| &self.values[pos])
    }

    fn push(&mut self, value: ScriptValue) {
        self.values.push(value);
    }
}
