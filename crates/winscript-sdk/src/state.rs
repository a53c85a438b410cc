//! ScriptState trait - the runtime state handle
//!
//! Defines the interface the embedding runtime implements. The engine programs
//! against this trait only: it reads arguments through the `check_*`
//! primitives and reports results through the `push_*` primitives.
//!
//! Stack indices follow the usual embedded-runtime convention: positive
//! indices count from the bottom starting at 1, negative indices count from
//! the top starting at -1.

use std::ffi::c_char;

use crate::error::{ScriptError, ScriptResult};
use crate::value::{ScriptValue, ValueKind};

/// Abstract runtime state for native call handlers.
pub trait ScriptState {
    // ========================================================================
    // Required
    // ========================================================================

    /// Number of values on the stack
    fn top(&self) -> i32;

    /// Value at a stack index, `None` if the index is out of range
    fn get(&self, index: i32) -> Option<&ScriptValue>;

    /// Push a value onto the stack
    fn push(&mut self, value: ScriptValue);

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Kind of the value at `index`
    fn kind(&self, index: i32) -> ValueKind {
        self.get(index).map_or(ValueKind::None, ScriptValue::kind)
    }

    /// True if `index` is past the top of the stack or holds nil
    fn is_none_or_nil(&self, index: i32) -> bool {
        matches!(self.kind(index), ValueKind::None | ValueKind::Nil)
    }

    // ========================================================================
    // Checks (fail the current call on mismatch)
    // ========================================================================

    /// Require an integer-convertible value at `index`.
    ///
    /// Integers pass through, floats with an exact integer value and numeric
    /// strings are converted, everything else is a bad-argument error.
    fn check_integer(&self, index: i32) -> ScriptResult<i64> {
        match self.get(index) {
            Some(ScriptValue::Integer(i)) => Ok(*i),
            Some(ScriptValue::Number(n)) => float_to_integer(*n).ok_or_else(|| {
                ScriptError::bad_argument(index, "number has no integer representation")
            }),
            Some(ScriptValue::String(s)) => parse_integer(&s.to_string_lossy())
                .ok_or_else(|| ScriptError::type_mismatch(index, "number", "string")),
            other => Err(ScriptError::type_mismatch(
                index,
                "number",
                other.map_or(ValueKind::None, ScriptValue::kind).type_name(),
            )),
        }
    }

    /// Require a string at `index` and return its NUL-terminated buffer.
    ///
    /// The pointer stays valid while the value remains on the stack.
    fn check_string(&self, index: i32) -> ScriptResult<*const c_char> {
        match self.get(index) {
            Some(ScriptValue::String(s)) => Ok(s.as_ptr()),
            _ => Err(ScriptError::type_mismatch(
                index,
                "string",
                self.kind(index).type_name(),
            )),
        }
    }

    /// Require a string at `index` and return a NUL-terminated UTF-16 copy.
    ///
    /// The copy is owned by the stack value and shares its lifetime.
    fn check_wide_string(&self, index: i32) -> ScriptResult<*const u16> {
        match self.get(index) {
            Some(ScriptValue::String(s)) => Ok(s.as_wide_ptr()),
            _ => Err(ScriptError::type_mismatch(
                index,
                "string",
                self.kind(index).type_name(),
            )),
        }
    }

    // ========================================================================
    // Pushes
    // ========================================================================

    /// Push nil
    fn push_nil(&mut self) {
        self.push(ScriptValue::Nil);
    }

    /// Push a boolean
    fn push_boolean(&mut self, b: bool) {
        self.push(ScriptValue::Boolean(b));
    }

    /// Push an integer
    fn push_integer(&mut self, i: i64) {
        self.push(ScriptValue::Integer(i));
    }

    /// Push a float
    fn push_number(&mut self, n: f64) {
        self.push(ScriptValue::Number(n));
    }

    /// Push a copy of a byte string
    fn push_string(&mut self, bytes: &[u8]) {
        self.push(ScriptValue::string(bytes));
    }
}

fn float_to_integer(n: f64) -> Option<i64> {
    // 2^63 is exactly representable, i64::MAX is not
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if n.fract() == 0.0 && n >= -LIMIT && n < LIMIT {
        Some(n as i64)
    } else {
        None
    }
}

fn parse_integer(s: &str) -> Option<i64> {
    let s = s.trim();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let hex = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"));
    if let Some(hex) = hex {
        // Hex literals wrap around like native integer literals do
        let value = u64::from_str_radix(hex, 16).ok()? as i64;
        return Some(if negative { value.wrapping_neg() } else { value });
    }
    if let Ok(value) = s.parse::<i64>() {
        return Some(value);
    }
    s.parse::<f64>().ok().and_then(float_to_integer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_to_integer() {
        assert_eq!(float_to_integer(3.0), Some(3));
        assert_eq!(float_to_integer(-0.0), Some(0));
        assert_eq!(float_to_integer(3.5), None);
        assert_eq!(float_to_integer(f64::NAN), None);
        assert_eq!(float_to_integer(9.3e18), None);
    }

    #[test]
    fn test_parse_integer() {
        assert_eq!(parse_integer("42"), Some(42));
        assert_eq!(parse_integer("  -7 "), Some(-7));
        assert_eq!(parse_integer("0x10"), Some(16));
        assert_eq!(parse_integer("-0x10"), Some(-16));
        assert_eq!(parse_integer("0xFFFFFFFFFFFFFFFF"), Some(-1));
        assert_eq!(parse_integer("1e3"), Some(1000));
        assert_eq!(parse_integer("1.5"), None);
        assert_eq!(parse_integer("abc"), None);
    }
}
