//! ScriptValue - values living on the scripting runtime's stack
//!
//! The runtime is dynamically typed with a small set of value kinds:
//!
//! ```text
//! nil      absent value
//! boolean  true / false
//! integer  64-bit signed integer
//! number   64-bit float
//! string   immutable byte string, always NUL-terminated in memory
//! ```
//!
//! Strings keep their NUL-terminated buffer at a stable heap address for as
//! long as the value lives, so native code can be handed a raw pointer to it.

use once_cell::unsync::OnceCell;
use std::ffi::c_char;
use std::fmt;

/// Kind tag of a stack slot, used in argument error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Slot index is beyond the top of the stack
    None,
    /// nil
    Nil,
    /// boolean
    Boolean,
    /// integer or float number
    Number,
    /// string
    String,
}

impl ValueKind {
    /// Type name as shown to script authors
    pub fn type_name(self) -> &'static str {
        match self {
            ValueKind::None => "no value",
            ValueKind::Nil => "nil",
            ValueKind::Boolean => "boolean",
            ValueKind::Number => "number",
            ValueKind::String => "string",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

// ============================================================================
// ScriptString
// ============================================================================

/// Immutable script string.
///
/// The narrow buffer always carries a trailing NUL that is not part of the
/// string contents. A UTF-16 copy is created on first request and then owned
/// by the string, so its address stays valid for the string's lifetime.
pub struct ScriptString {
    bytes: Box<[u8]>,
    wide: OnceCell<Box<[u16]>>,
}

impl ScriptString {
    /// Create a string from raw bytes (embedded NULs are kept)
    pub fn new(contents: impl AsRef<[u8]>) -> Self {
        let contents = contents.as_ref();
        let mut bytes = Vec::with_capacity(contents.len() + 1);
        bytes.extend_from_slice(contents);
        bytes.push(0);
        Self {
            bytes: bytes.into_boxed_slice(),
            wide: OnceCell::new(),
        }
    }

    /// String contents without the trailing NUL
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.bytes.len() - 1]
    }

    /// Contents decoded as UTF-8, replacing invalid sequences
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(self.as_bytes()).into_owned()
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len() - 1
    }

    /// Check if the string is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Address of the NUL-terminated narrow buffer
    pub fn as_ptr(&self) -> *const c_char {
        self.bytes.as_ptr() as *const c_char
    }

    /// Address of a NUL-terminated UTF-16 copy of the contents
    pub fn as_wide_ptr(&self) -> *const u16 {
        self.wide
            .get_or_init(|| {
                self.to_string_lossy()
                    .encode_utf16()
                    .chain(std::iter::once(0))
                    .collect::<Vec<u16>>()
                    .into_boxed_slice()
            })
            .as_ptr()
    }
}

impl Clone for ScriptString {
    fn clone(&self) -> Self {
        Self::new(self.as_bytes())
    }
}

impl PartialEq for ScriptString {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl fmt::Debug for ScriptString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_string_lossy())
    }
}

impl From<&str> for ScriptString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ScriptString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

// ============================================================================
// ScriptValue
// ============================================================================

/// A single value on the scripting runtime's stack
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ScriptValue {
    /// Absent value
    #[default]
    Nil,
    /// Boolean
    Boolean(bool),
    /// 64-bit signed integer
    Integer(i64),
    /// 64-bit float
    Number(f64),
    /// Byte string
    String(ScriptString),
}

impl ScriptValue {
    /// Create a string value
    pub fn string(s: impl AsRef<[u8]>) -> Self {
        ScriptValue::String(ScriptString::new(s))
    }

    /// Kind of this value
    pub fn kind(&self) -> ValueKind {
        match self {
            ScriptValue::Nil => ValueKind::Nil,
            ScriptValue::Boolean(_) => ValueKind::Boolean,
            ScriptValue::Integer(_) | ScriptValue::Number(_) => ValueKind::Number,
            ScriptValue::String(_) => ValueKind::String,
        }
    }

    /// Check if this is nil
    pub fn is_nil(&self) -> bool {
        matches!(self, ScriptValue::Nil)
    }

    /// Get as integer if this is an integer
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            ScriptValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as float if this is a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ScriptValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as boolean if this is a boolean
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            ScriptValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as string if this is a string
    pub fn as_str(&self) -> Option<&ScriptString> {
        match self {
            ScriptValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i64> for ScriptValue {
    fn from(i: i64) -> Self {
        ScriptValue::Integer(i)
    }
}

impl From<bool> for ScriptValue {
    fn from(b: bool) -> Self {
        ScriptValue::Boolean(b)
    }
}

impl From<f64> for ScriptValue {
    fn from(n: f64) -> Self {
        ScriptValue::Number(n)
    }
}

impl From<&str> for ScriptValue {
    fn from(s: &str) -> Self {
        ScriptValue::string(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn test_string_is_nul_terminated() {
        let s = ScriptString::from("hello");
        assert_eq!(s.len(), 5);
        let c = unsafe { CStr::from_ptr(s.as_ptr()) };
        assert_eq!(c.to_bytes(), b"hello");
    }

    #[test]
    fn test_wide_buffer_is_stable() {
        let s = ScriptString::from("héllo");
        let first = s.as_wide_ptr();
        let second = s.as_wide_ptr();
        assert_eq!(first, second);
        let units = unsafe { std::slice::from_raw_parts(first, 6) };
        assert_eq!(units, &[0x68, 0xE9, 0x6C, 0x6C, 0x6F, 0][..]);
    }

    #[test]
    fn test_empty_string() {
        let s = ScriptString::from("");
        assert!(s.is_empty());
        assert_eq!(unsafe { *s.as_ptr() }, 0);
    }

    #[test]
    fn test_kinds() {
        assert_eq!(ScriptValue::Nil.kind(), ValueKind::Nil);
        assert_eq!(ScriptValue::from(1i64).kind(), ValueKind::Number);
        assert_eq!(ScriptValue::from(1.5).kind(), ValueKind::Number);
        assert_eq!(ScriptValue::from(true).kind(), ValueKind::Boolean);
        assert_eq!(ScriptValue::from("x").kind(), ValueKind::String);
        assert_eq!(ValueKind::None.to_string(), "no value");
    }

    #[test]
    fn test_clone_and_eq() {
        let a = ScriptValue::from("abc");
        let b = a.clone();
        assert_eq!(a, b);
        assert_ne!(a, ScriptValue::from("abd"));
    }
}
