//! Marshaling registry
//!
//! Converts script values to machine words (decode) and machine words back to
//! script values (encode). Dispatch is two-tier:
//!
//! 1. A fixed set of categories derived from the element kind: void,
//!    pointers, primitive integers and enums stored as integers.
//! 2. A name-keyed table for named value types (handles, string pointers,
//!    integer typedefs), looked up by bare type name.
//!
//! Everything else is rejected at bind time with an error naming the slot.

use rustc_hash::FxHashMap;
use std::ffi::{c_char, CStr};
use std::fmt;
use winscript_sdk::{ScriptError, ScriptResult, ScriptState, ScriptValue};

use crate::error::{EngineError, EngineResult};
use crate::metadata::{resolve, Catalog, ElementType, TypeSig};

/// Reads the script value at a 1-based stack index and produces a machine word
pub type DecodeFn = fn(&dyn ScriptState, i32) -> ScriptResult<usize>;

/// Pushes the script value for a machine word; returns the number of values pushed
pub type EncodeFn = fn(&mut dyn ScriptState, usize) -> usize;

/// A parameter position or the return slot of a signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// 1-based parameter position
    Param(usize),
    /// Return value
    Return,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Param(index) => write!(f, "#{}", index),
            Slot::Return => f.write_str("#RET"),
        }
    }
}

// ============================================================================
// Integer kinds
// ============================================================================

/// Integer storage kinds that marshal as script integers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegerKind {
    /// i8
    I1,
    /// u8
    U1,
    /// i16
    I2,
    /// u16
    U2,
    /// i32
    I4,
    /// u32
    U4,
    /// i64
    I8,
    /// u64
    U8,
    /// isize
    ISize,
    /// usize
    USize,
}

impl IntegerKind {
    /// Every supported kind
    pub const ALL: [IntegerKind; 10] = [
        IntegerKind::I1,
        IntegerKind::U1,
        IntegerKind::I2,
        IntegerKind::U2,
        IntegerKind::I4,
        IntegerKind::U4,
        IntegerKind::I8,
        IntegerKind::U8,
        IntegerKind::ISize,
        IntegerKind::USize,
    ];

    /// Integer kind of an element type, if it is one
    pub fn from_element(element: &ElementType) -> Option<Self> {
        Some(match element {
            ElementType::I1 => IntegerKind::I1,
            ElementType::U1 => IntegerKind::U1,
            ElementType::I2 => IntegerKind::I2,
            ElementType::U2 => IntegerKind::U2,
            ElementType::I4 => IntegerKind::I4,
            ElementType::U4 => IntegerKind::U4,
            ElementType::I8 => IntegerKind::I8,
            ElementType::U8 => IntegerKind::U8,
            ElementType::I => IntegerKind::ISize,
            ElementType::U => IntegerKind::USize,
            _ => return None,
        })
    }

    /// True for signed kinds
    pub fn is_signed(self) -> bool {
        matches!(
            self,
            IntegerKind::I1 | IntegerKind::I2 | IntegerKind::I4 | IntegerKind::I8 | IntegerKind::ISize
        )
    }

    /// Reinterpret a raw word as a value of this kind.
    ///
    /// Only the low bytes of a narrow return value are defined, so the word is
    /// truncated to the kind's width and then sign- or zero-extended.
    pub fn narrow(self, word: usize) -> i64 {
        match self {
            IntegerKind::I1 => word as i8 as i64,
            IntegerKind::U1 => word as u8 as i64,
            IntegerKind::I2 => word as i16 as i64,
            IntegerKind::U2 => word as u16 as i64,
            IntegerKind::I4 => word as i32 as i64,
            IntegerKind::U4 => word as u32 as i64,
            IntegerKind::I8 => word as u64 as i64,
            IntegerKind::U8 => word as u64 as i64,
            IntegerKind::ISize => word as isize as i64,
            IntegerKind::USize => word as u64 as i64,
        }
    }

    /// Encoder pushing a word of this kind
    pub fn encoder(self) -> EncodeFn {
        match self {
            IntegerKind::I1 => encode_i1,
            IntegerKind::U1 => encode_u1,
            IntegerKind::I2 => encode_i2,
            IntegerKind::U2 => encode_u2,
            IntegerKind::I4 => encode_i4,
            IntegerKind::U4 => encode_u4,
            IntegerKind::I8 => encode_i8,
            IntegerKind::U8 => encode_u8,
            IntegerKind::ISize => encode_isize,
            IntegerKind::USize => encode_usize,
        }
    }
}

macro_rules! integer_encoders {
    ($($name:ident => $kind:ident),* $(,)?) => {
        $(
            fn $name(state: &mut dyn ScriptState, word: usize) -> usize {
                state.push_integer(IntegerKind::$kind.narrow(word));
                1
            }
        )*
    };
}

integer_encoders! {
    encode_i1 => I1,
    encode_u1 => U1,
    encode_i2 => I2,
    encode_u2 => U2,
    encode_i4 => I4,
    encode_u4 => U4,
    encode_i8 => I8,
    encode_u8 => U8,
    encode_isize => ISize,
    encode_usize => USize,
}

// ============================================================================
// Classification
// ============================================================================

/// Why a type has no marshaling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unsupported<'c> {
    /// Element kind outside the supported subset
    Element(&'static str),
    /// Enum whose storage is not an integer kind
    EnumStorage(&'c str),
}

impl Unsupported<'_> {
    fn into_error(self, slot: Slot) -> EngineError {
        match self {
            Unsupported::Element(element) => EngineError::UnsupportedElementType {
                element: element.to_string(),
                slot,
            },
            Unsupported::EnumStorage(name) => EngineError::UnsupportedType {
                name: name.to_string(),
                slot,
            },
        }
    }
}

/// Marshaling category of a signature slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marshaling<'c> {
    /// No value
    Void,
    /// Any pointer type: nil or string in, address out
    Pointer,
    /// Primitive integer kind
    PrimitiveInteger(IntegerKind),
    /// Enum stored as an integer kind
    EnumOnInteger {
        /// Bare enum name
        name: &'c str,
        /// Underlying storage
        kind: IntegerKind,
    },
    /// Named non-enum value type, marshaled through the name table
    NamedValueType(&'c str),
    /// No marshaling exists
    Unsupported(Unsupported<'c>),
}

impl Marshaling<'_> {
    /// Integer storage kind for primitive integers and integer-backed enums
    pub fn integer_kind(&self) -> Option<IntegerKind> {
        match *self {
            Marshaling::PrimitiveInteger(kind) | Marshaling::EnumOnInteger { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

/// Classify a signature slot, resolving value types through the catalog.
///
/// Fails only when a value type reference cannot be resolved.
pub fn classify<'c>(catalog: &'c Catalog, sig: &TypeSig) -> EngineResult<Marshaling<'c>> {
    if sig.ptr_count > 0 {
        return Ok(Marshaling::Pointer);
    }
    if let Some(kind) = IntegerKind::from_element(&sig.element) {
        return Ok(Marshaling::PrimitiveInteger(kind));
    }
    match &sig.element {
        ElementType::Void => Ok(Marshaling::Void),
        ElementType::ValueType(type_ref) => {
            let def = resolve(catalog, type_ref)?;
            Ok(match def.enum_underlying() {
                Some(underlying) => match IntegerKind::from_element(underlying) {
                    Some(kind) => Marshaling::EnumOnInteger {
                        name: &def.name,
                        kind,
                    },
                    None => Marshaling::Unsupported(Unsupported::EnumStorage(&def.name)),
                },
                None => Marshaling::NamedValueType(&def.name),
            })
        }
        other => Ok(Marshaling::Unsupported(Unsupported::Element(other.name()))),
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Name-keyed decode/encode tables for named value types.
///
/// Built once and passed by reference to binding; the built-in entries are
/// registered by [`MarshalRegistry::new`].
pub struct MarshalRegistry {
    decoders: FxHashMap<String, DecodeFn>,
    encoders: FxHashMap<String, EncodeFn>,
}

impl std::fmt::Debug for MarshalRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.decoders.keys().collect();
        names.sort();
        f.debug_struct("MarshalRegistry")
            .field("named_types", &names)
            .finish()
    }
}

impl MarshalRegistry {
    /// Create a registry with the built-in named value types
    pub fn new() -> Self {
        let mut registry = Self::empty();

        registry.register("HWND", decode_zero, encode_address);
        for handle in ["HANDLE", "HINSTANCE", "HMODULE"] {
            registry.register(handle, decode_optional_integer, encode_address);
        }
        for typedef in ["BOOL", "HRESULT", "NTSTATUS"] {
            registry.register(typedef, decode_integer, encode_i4);
        }
        registry.register("WPARAM", decode_integer, encode_usize);
        registry.register("LPARAM", decode_integer, encode_isize);
        registry.register("LRESULT", decode_integer, encode_isize);
        for narrow in ["PSTR", "PCSTR"] {
            registry.register(narrow, decode_narrow_string, encode_narrow_string);
        }
        for wide in ["PWSTR", "PCWSTR"] {
            registry.register(wide, decode_wide_string, encode_wide_string);
        }

        registry
    }

    /// Create a registry without any named value types
    pub fn empty() -> Self {
        Self {
            decoders: FxHashMap::default(),
            encoders: FxHashMap::default(),
        }
    }

    /// Register (or replace) the marshaling of a named value type
    pub fn register(&mut self, name: &str, decode: DecodeFn, encode: EncodeFn) {
        self.decoders.insert(name.to_string(), decode);
        self.encoders.insert(name.to_string(), encode);
    }

    /// Check if a named value type is registered
    pub fn contains(&self, name: &str) -> bool {
        self.decoders.contains_key(name)
    }

    /// Number of registered named value types
    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    /// Check if no named value types are registered
    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Decoder for a parameter slot
    pub fn decoder_for(&self, catalog: &Catalog, sig: &TypeSig, slot: Slot) -> EngineResult<DecodeFn> {
        match classify(catalog, sig)? {
            Marshaling::Void => match slot {
                Slot::Return => Ok(decode_void),
                Slot::Param(_) => Err(Unsupported::Element(ElementType::Void.name()).into_error(slot)),
            },
            Marshaling::Pointer => Ok(decode_pointer),
            Marshaling::PrimitiveInteger(_) | Marshaling::EnumOnInteger { .. } => Ok(decode_integer),
            Marshaling::NamedValueType(name) => {
                self.decoders
                    .get(name)
                    .copied()
                    .ok_or_else(|| EngineError::UnsupportedType {
                        name: name.to_string(),
                        slot,
                    })
            }
            Marshaling::Unsupported(reason) => Err(reason.into_error(slot)),
        }
    }

    /// Encoder for a return slot
    pub fn encoder_for(&self, catalog: &Catalog, sig: &TypeSig) -> EngineResult<EncodeFn> {
        let slot = Slot::Return;
        match classify(catalog, sig)? {
            Marshaling::Void => Ok(encode_void),
            Marshaling::Pointer => Ok(encode_address),
            Marshaling::PrimitiveInteger(kind) | Marshaling::EnumOnInteger { kind, .. } => {
                Ok(kind.encoder())
            }
            Marshaling::NamedValueType(name) => {
                self.encoders
                    .get(name)
                    .copied()
                    .ok_or_else(|| EngineError::UnsupportedType {
                        name: name.to_string(),
                        slot,
                    })
            }
            Marshaling::Unsupported(reason) => Err(reason.into_error(slot)),
        }
    }
}

impl Default for MarshalRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Decoders
// ============================================================================

fn decode_void(_state: &dyn ScriptState, _index: i32) -> ScriptResult<usize> {
    Ok(0)
}

fn decode_zero(_state: &dyn ScriptState, _index: i32) -> ScriptResult<usize> {
    Ok(0)
}

fn decode_integer(state: &dyn ScriptState, index: i32) -> ScriptResult<usize> {
    state.check_integer(index).map(|i| i as usize)
}

fn decode_optional_integer(state: &dyn ScriptState, index: i32) -> ScriptResult<usize> {
    if state.is_none_or_nil(index) {
        return Ok(0);
    }
    decode_integer(state, index)
}

fn decode_pointer(state: &dyn ScriptState, index: i32) -> ScriptResult<usize> {
    match state.get(index) {
        None | Some(ScriptValue::Nil) => Ok(0),
        Some(ScriptValue::String(s)) => Ok(s.as_ptr() as usize),
        Some(other) => Err(ScriptError::type_mismatch(
            index,
            "string or nil",
            other.kind().type_name(),
        )),
    }
}

fn decode_narrow_string(state: &dyn ScriptState, index: i32) -> ScriptResult<usize> {
    if state.is_none_or_nil(index) {
        return Ok(0);
    }
    state.check_string(index).map(|ptr| ptr as usize)
}

fn decode_wide_string(state: &dyn ScriptState, index: i32) -> ScriptResult<usize> {
    if state.is_none_or_nil(index) {
        return Ok(0);
    }
    state.check_wide_string(index).map(|ptr| ptr as usize)
}

// ============================================================================
// Encoders
// ============================================================================

fn encode_void(_state: &mut dyn ScriptState, _word: usize) -> usize {
    0
}

fn encode_address(state: &mut dyn ScriptState, word: usize) -> usize {
    state.push_integer(word as i64);
    1
}

fn encode_narrow_string(state: &mut dyn ScriptState, word: usize) -> usize {
    if word == 0 {
        state.push_nil();
        return 1;
    }
    // SAFETY: a non-null PSTR return is a NUL-terminated string owned by the
    // callee; native functions are trusted to honor their declared signature.
    let bytes = unsafe { CStr::from_ptr(word as *const c_char) }.to_bytes();
    state.push_string(bytes);
    1
}

fn encode_wide_string(state: &mut dyn ScriptState, word: usize) -> usize {
    if word == 0 {
        state.push_nil();
        return 1;
    }
    let ptr = word as *const u16;
    // SAFETY: as for narrow strings, a non-null PWSTR return points at a
    // NUL-terminated UTF-16 buffer.
    let units = unsafe {
        let mut len = 0;
        while *ptr.add(len) != 0 {
            len += 1;
        }
        std::slice::from_raw_parts(ptr, len)
    };
    state.push_string(String::from_utf16_lossy(units).as_bytes());
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{MetadataDocument, TypeDef, TypeKind, TypeRef};
    use winscript_sdk::ValueStack;

    fn catalog() -> Catalog {
        let mut doc = MetadataDocument::new();
        doc.add_type(TypeDef::new("Windows.Win32.Foundation", "HWND", TypeKind::Struct));
        doc.add_type(TypeDef::new("Windows.Win32.Foundation", "PSTR", TypeKind::Struct));
        doc.add_type(TypeDef::new("Windows.Win32.Foundation", "PWSTR", TypeKind::Struct));
        doc.add_type(TypeDef::new("Windows.Win32.Foundation", "HANDLE", TypeKind::Struct));
        doc.add_type(TypeDef::new(
            "Windows.Win32.UI",
            "MESSAGEBOX_RESULT",
            TypeKind::Enum(ElementType::I4),
        ));
        doc.add_type(TypeDef::new(
            "Windows.Win32.UI",
            "FLOAT_ENUM",
            TypeKind::Enum(ElementType::R8),
        ));
        doc.add_type(TypeDef::new("Foo", "Bar", TypeKind::Struct));
        Catalog::load(doc).unwrap()
    }

    fn value_type(namespace: &str, name: &str) -> TypeSig {
        TypeSig::value_type(TypeRef::named(namespace, name))
    }

    #[test]
    fn test_slot_display() {
        assert_eq!(Slot::Param(3).to_string(), "#3");
        assert_eq!(Slot::Return.to_string(), "#RET");
    }

    #[test]
    fn test_classify() {
        let catalog = catalog();
        assert_eq!(
            classify(&catalog, &TypeSig::new(ElementType::U4)).unwrap(),
            Marshaling::PrimitiveInteger(IntegerKind::U4)
        );
        assert_eq!(
            classify(&catalog, &TypeSig::pointer(ElementType::I1, 1)).unwrap(),
            Marshaling::Pointer
        );
        assert_eq!(
            classify(&catalog, &TypeSig::pointer(ElementType::Void, 1)).unwrap(),
            Marshaling::Pointer
        );
        assert_eq!(
            classify(&catalog, &TypeSig::new(ElementType::Void)).unwrap(),
            Marshaling::Void
        );
        assert_eq!(
            classify(&catalog, &value_type("Windows.Win32.UI", "MESSAGEBOX_RESULT")).unwrap(),
            Marshaling::EnumOnInteger {
                name: "MESSAGEBOX_RESULT",
                kind: IntegerKind::I4
            }
        );
        assert_eq!(
            classify(&catalog, &value_type("Windows.Win32.Foundation", "HWND")).unwrap(),
            Marshaling::NamedValueType("HWND")
        );
        assert_eq!(
            classify(&catalog, &TypeSig::new(ElementType::R8)).unwrap(),
            Marshaling::Unsupported(Unsupported::Element("R8"))
        );
        assert_eq!(
            classify(&catalog, &value_type("Windows.Win32.UI", "FLOAT_ENUM")).unwrap(),
            Marshaling::Unsupported(Unsupported::EnumStorage("FLOAT_ENUM"))
        );
    }

    #[test]
    fn test_classify_unresolved_value_type() {
        let catalog = catalog();
        let err = classify(&catalog, &value_type("Missing", "Type")).unwrap_err();
        assert!(matches!(err, EngineError::TypeNotFound { .. }));
    }

    #[test]
    fn test_unsupported_elements_name_the_slot() {
        let catalog = catalog();
        let registry = MarshalRegistry::new();
        for element in [
            ElementType::R4,
            ElementType::R8,
            ElementType::Boolean,
            ElementType::Char,
            ElementType::String,
            ElementType::Object,
            ElementType::GenericInst,
            ElementType::Var,
        ] {
            let name = element.name();
            let err = registry
                .decoder_for(&catalog, &TypeSig::new(element), Slot::Param(2))
                .unwrap_err();
            assert_eq!(err.to_string(), format!("Unrecognized ELEMENT_TYPE {} at #2", name));
        }
        let err = registry
            .encoder_for(&catalog, &TypeSig::new(ElementType::R4))
            .unwrap_err();
        assert_eq!(err.to_string(), "Unrecognized ELEMENT_TYPE R4 at #RET");
    }

    #[test]
    fn test_void_parameter_is_rejected() {
        let catalog = catalog();
        let registry = MarshalRegistry::new();
        let sig = TypeSig::new(ElementType::Void);
        assert!(registry.decoder_for(&catalog, &sig, Slot::Param(1)).is_err());
        assert!(registry.decoder_for(&catalog, &sig, Slot::Return).is_ok());

        let encode = registry.encoder_for(&catalog, &sig).unwrap();
        let mut stack = ValueStack::new();
        assert_eq!(encode(&mut stack, 123), 0);
        assert!(stack.is_empty());
    }

    #[test]
    fn test_unregistered_named_type() {
        let catalog = catalog();
        let registry = MarshalRegistry::new();
        let err = registry
            .decoder_for(&catalog, &value_type("Foo", "Bar"), Slot::Param(1))
            .unwrap_err();
        match err {
            EngineError::UnsupportedType { name, slot } => {
                assert_eq!(name, "Bar");
                assert_eq!(slot, Slot::Param(1));
            }
            other => panic!("Expected UnsupportedType, got {:?}", other),
        }
    }

    #[test]
    fn test_enum_storage_error_names_type() {
        let catalog = catalog();
        let registry = MarshalRegistry::new();
        let err = registry
            .encoder_for(&catalog, &value_type("Windows.Win32.UI", "FLOAT_ENUM"))
            .unwrap_err();
        assert_eq!(err.to_string(), "Unsupported type 'FLOAT_ENUM' at #RET");
    }

    #[test]
    fn test_integer_roundtrip() {
        let kinds = IntegerKind::ALL.map(|kind| {
            let element = match kind {
                IntegerKind::I1 => ElementType::I1,
                IntegerKind::U1 => ElementType::U1,
                IntegerKind::I2 => ElementType::I2,
                IntegerKind::U2 => ElementType::U2,
                IntegerKind::I4 => ElementType::I4,
                IntegerKind::U4 => ElementType::U4,
                IntegerKind::I8 => ElementType::I8,
                IntegerKind::U8 => ElementType::U8,
                IntegerKind::ISize => ElementType::I,
                IntegerKind::USize => ElementType::U,
            };
            (kind, element)
        });

        // One enum per integer storage kind
        let mut doc = MetadataDocument::new();
        for (_, element) in &kinds {
            doc.add_type(TypeDef::new(
                "Windows.Win32.Test",
                format!("ENUM_{}", element.name()),
                TypeKind::Enum(element.clone()),
            ));
        }
        let catalog = Catalog::load(doc).unwrap();
        let registry = MarshalRegistry::new();

        for (kind, element) in kinds {
            let max: usize = match kind {
                IntegerKind::I1 => i8::MAX as usize,
                IntegerKind::U1 => u8::MAX as usize,
                IntegerKind::I2 => i16::MAX as usize,
                IntegerKind::U2 => u16::MAX as usize,
                IntegerKind::I4 => i32::MAX as usize,
                IntegerKind::U4 => u32::MAX as usize,
                IntegerKind::I8 => i64::MAX as usize,
                IntegerKind::U8 => u64::MAX as usize,
                IntegerKind::ISize => isize::MAX as usize,
                IntegerKind::USize => usize::MAX,
            };
            let mut words = vec![0usize, 1, max];
            if kind.is_signed() {
                words.push(-1isize as usize);
            }

            let enum_sig = value_type("Windows.Win32.Test", &format!("ENUM_{}", element.name()));
            let sigs = [TypeSig::new(element), enum_sig];
            for sig in &sigs {
                assert_eq!(
                    classify(&catalog, sig).unwrap().integer_kind(),
                    Some(kind),
                    "{:?}",
                    sig
                );
                let decode = registry.decoder_for(&catalog, sig, Slot::Param(1)).unwrap();
                let encode = registry.encoder_for(&catalog, sig).unwrap();
                for &word in &words {
                    let mut stack = ValueStack::new();
                    assert_eq!(encode(&mut stack, word), 1);
                    assert_eq!(decode(&stack, 1).unwrap(), word, "{:?} {:#x}", sig, word);
                }
            }
        }
    }

    #[test]
    fn test_narrowing_return_words() {
        let mut stack = ValueStack::new();
        encode_i4(&mut stack, 0xDEAD_BEEF_FFFF_FFFFu64 as usize);
        encode_u1(&mut stack, 0x1234);
        encode_i2(&mut stack, 0x8000);
        assert_eq!(
            stack.take_results(3),
            vec![
                ScriptValue::Integer(-1),
                ScriptValue::Integer(0x34),
                ScriptValue::Integer(-32768)
            ]
        );
    }

    #[test]
    fn test_enum_decodes_like_underlying_integer() {
        let catalog = catalog();
        let registry = MarshalRegistry::new();
        let as_enum = registry
            .decoder_for(&catalog, &value_type("Windows.Win32.UI", "MESSAGEBOX_RESULT"), Slot::Param(1))
            .unwrap();
        let as_int = registry
            .decoder_for(&catalog, &TypeSig::new(ElementType::I4), Slot::Param(1))
            .unwrap();
        for input in [0i64, -5, 2147483647] {
            let stack = ValueStack::with_args([input]);
            assert_eq!(as_enum(&stack, 1).unwrap(), as_int(&stack, 1).unwrap());
        }
    }

    #[test]
    fn test_hwnd_decodes_to_zero() {
        let catalog = catalog();
        let registry = MarshalRegistry::new();
        let decode = registry
            .decoder_for(&catalog, &value_type("Windows.Win32.Foundation", "HWND"), Slot::Param(1))
            .unwrap();
        for value in [ScriptValue::Integer(77), ScriptValue::from("x"), ScriptValue::Nil] {
            let stack = ValueStack::with_args([value]);
            assert_eq!(decode(&stack, 1).unwrap(), 0);
        }
    }

    #[test]
    fn test_handle_accepts_nil_or_integer() {
        let catalog = catalog();
        let registry = MarshalRegistry::new();
        let decode = registry
            .decoder_for(&catalog, &value_type("Windows.Win32.Foundation", "HANDLE"), Slot::Param(1))
            .unwrap();
        let stack = ValueStack::with_args([ScriptValue::Nil, ScriptValue::Integer(0x40)]);
        assert_eq!(decode(&stack, 1).unwrap(), 0);
        assert_eq!(decode(&stack, 2).unwrap(), 0x40);
    }

    #[test]
    fn test_narrow_string_decode() {
        let catalog = catalog();
        let registry = MarshalRegistry::new();
        let decode = registry
            .decoder_for(&catalog, &value_type("Windows.Win32.Foundation", "PSTR"), Slot::Param(1))
            .unwrap();
        let stack = ValueStack::with_args([ScriptValue::from("text"), ScriptValue::Nil]);

        let address = decode(&stack, 1).unwrap();
        let text = unsafe { CStr::from_ptr(address as *const c_char) };
        assert_eq!(text.to_bytes(), b"text");
        assert_eq!(decode(&stack, 2).unwrap(), 0);
        assert_eq!(decode(&stack, 3).unwrap(), 0);
    }

    #[test]
    fn test_wide_string_decode() {
        let catalog = catalog();
        let registry = MarshalRegistry::new();
        let decode = registry
            .decoder_for(&catalog, &value_type("Windows.Win32.Foundation", "PWSTR"), Slot::Param(1))
            .unwrap();
        let stack = ValueStack::with_args([ScriptValue::from("ok")]);
        let address = decode(&stack, 1).unwrap();
        let units = unsafe { std::slice::from_raw_parts(address as *const u16, 3) };
        assert_eq!(units, &[u16::from(b'o'), u16::from(b'k'), 0][..]);
    }

    #[test]
    fn test_pointer_decode() {
        let catalog = catalog();
        let registry = MarshalRegistry::new();
        let decode = registry
            .decoder_for(&catalog, &TypeSig::pointer(ElementType::U1, 1), Slot::Param(1))
            .unwrap();
        let stack = ValueStack::with_args([
            ScriptValue::Nil,
            ScriptValue::from("abc"),
            ScriptValue::Integer(5),
        ]);
        assert_eq!(decode(&stack, 1).unwrap(), 0);
        assert_eq!(decode(&stack, 2).unwrap(), stack.check_string(2).unwrap() as usize);
        assert_eq!(
            decode(&stack, 3).unwrap_err().to_string(),
            "bad argument #3 (string or nil expected, got number)"
        );
    }

    #[test]
    fn test_string_encoders() {
        let mut stack = ValueStack::new();
        let narrow = b"narrow\0";
        let wide: Vec<u16> = "wïde\0".encode_utf16().collect();

        assert_eq!(encode_narrow_string(&mut stack, narrow.as_ptr() as usize), 1);
        assert_eq!(encode_wide_string(&mut stack, wide.as_ptr() as usize), 1);
        assert_eq!(encode_narrow_string(&mut stack, 0), 1);
        assert_eq!(encode_wide_string(&mut stack, 0), 1);
        assert_eq!(
            stack.take_results(4),
            vec![
                ScriptValue::from("narrow"),
                ScriptValue::from("wïde"),
                ScriptValue::Nil,
                ScriptValue::Nil
            ]
        );
    }

    #[test]
    fn test_register_extends_table() {
        let mut registry = MarshalRegistry::empty();
        assert!(registry.is_empty());
        registry.register("Bar", decode_integer, encode_i4);
        assert!(registry.contains("Bar"));

        let catalog = catalog();
        assert!(registry
            .decoder_for(&catalog, &value_type("Foo", "Bar"), Slot::Param(1))
            .is_ok());
        assert!(MarshalRegistry::new().len() > registry.len());
    }
}
