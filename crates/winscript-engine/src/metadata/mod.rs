//! Metadata model
//!
//! Read-only records describing native types, exported functions and
//! constants. A [`MetadataSource`] supplies them as flat tables; the
//! [`Catalog`] indexes those tables by name.
//!
//! - `document`: JSON-backed metadata source (`MetadataDocument`)
//! - `catalog`: name indexes over a source (`Catalog`)
//! - `resolver`: type reference → type definition

mod catalog;
mod document;
mod resolver;

pub use catalog::{Catalog, ConstantLookup, FunctionRecord};
pub use document::{MetadataDocument, MetadataError};
pub use resolver::resolve;

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Type references
// ============================================================================

/// Index of a type definition in its source's type table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeDefId(pub u32);

impl TypeDefId {
    /// Position in the type table
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Reference to a type from a signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeRef {
    /// Direct reference to a definition in the same source
    Def(TypeDefId),
    /// Named reference, resolved through the catalog's namespace index
    Ref {
        /// Namespace of the referenced type
        namespace: String,
        /// Bare name of the referenced type
        name: String,
    },
}

impl TypeRef {
    /// Create a named reference
    pub fn named(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        TypeRef::Ref {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

// ============================================================================
// Element types and signatures
// ============================================================================

/// Primitive category of a type in a signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementType {
    /// No value
    Void,
    /// Managed boolean
    Boolean,
    /// UTF-16 code unit
    Char,
    /// Signed 8-bit integer
    I1,
    /// Unsigned 8-bit integer
    U1,
    /// Signed 16-bit integer
    I2,
    /// Unsigned 16-bit integer
    U2,
    /// Signed 32-bit integer
    I4,
    /// Unsigned 32-bit integer
    U4,
    /// Signed 64-bit integer
    I8,
    /// Unsigned 64-bit integer
    U8,
    /// 32-bit float
    R4,
    /// 64-bit float
    R8,
    /// Managed string
    String,
    /// Pointer-sized signed integer
    I,
    /// Pointer-sized unsigned integer
    U,
    /// Managed object
    Object,
    /// Value type (struct, enum or typedef)
    ValueType(TypeRef),
    /// Reference type
    Class(TypeRef),
    /// Generic instantiation
    GenericInst,
    /// Generic type parameter
    Var,
}

impl ElementType {
    /// Short name of the element kind
    pub fn name(&self) -> &'static str {
        match self {
            ElementType::Void => "Void",
            ElementType::Boolean => "Boolean",
            ElementType::Char => "Char",
            ElementType::I1 => "I1",
            ElementType::U1 => "U1",
            ElementType::I2 => "I2",
            ElementType::U2 => "U2",
            ElementType::I4 => "I4",
            ElementType::U4 => "U4",
            ElementType::I8 => "I8",
            ElementType::U8 => "U8",
            ElementType::R4 => "R4",
            ElementType::R8 => "R8",
            ElementType::String => "String",
            ElementType::I => "I",
            ElementType::U => "U",
            ElementType::Object => "Object",
            ElementType::ValueType(_) => "ValueType",
            ElementType::Class(_) => "Class",
            ElementType::GenericInst => "GenericInst",
            ElementType::Var => "Var",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Type of a parameter or return slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSig {
    /// Element kind
    pub element: ElementType,
    /// Levels of pointer indirection applied to the element
    #[serde(default)]
    pub ptr_count: u32,
}

impl TypeSig {
    /// A non-pointer type
    pub fn new(element: ElementType) -> Self {
        Self {
            element,
            ptr_count: 0,
        }
    }

    /// A pointer to `element`
    pub fn pointer(element: ElementType, ptr_count: u32) -> Self {
        Self { element, ptr_count }
    }

    /// A non-pointer value type reference
    pub fn value_type(type_ref: TypeRef) -> Self {
        Self::new(ElementType::ValueType(type_ref))
    }
}

/// A named parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    /// Parameter name
    pub name: String,
    /// Declared type
    #[serde(rename = "type")]
    pub ty: TypeSig,
}

/// Ordered parameters plus optional return type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSig {
    /// Parameters, left to right
    #[serde(default)]
    pub params: Vec<Param>,
    /// Return type, absent for functions without one
    #[serde(default, rename = "return", skip_serializing_if = "Option::is_none")]
    pub ret: Option<TypeSig>,
}

impl MethodSig {
    /// Create a signature from parameter types and a return type
    pub fn new(params: impl IntoIterator<Item = TypeSig>, ret: Option<TypeSig>) -> Self {
        Self {
            params: params
                .into_iter()
                .enumerate()
                .map(|(i, ty)| Param {
                    name: format!("p{}", i),
                    ty,
                })
                .collect(),
            ret,
        }
    }

    /// Number of parameters
    pub fn param_count(&self) -> usize {
        self.params.len()
    }
}

// ============================================================================
// Table rows
// ============================================================================

/// Category of a type definition
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TypeKind {
    /// Struct or typedef-like value type
    #[default]
    Struct,
    /// Enum with its underlying storage kind
    Enum(ElementType),
    /// Reference type
    Class,
    /// Interface
    Interface,
    /// Function pointer type
    Delegate,
}

/// A type definition row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDef {
    /// Namespace
    pub namespace: String,
    /// Bare name
    pub name: String,
    /// Category
    #[serde(default)]
    pub kind: TypeKind,
}

impl TypeDef {
    /// Create a struct-like type definition
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            kind,
        }
    }

    /// Check if this type is an enum
    pub fn is_enum(&self) -> bool {
        matches!(self.kind, TypeKind::Enum(_))
    }

    /// Underlying storage kind if this type is an enum
    pub fn enum_underlying(&self) -> Option<&ElementType> {
        match &self.kind {
            TypeKind::Enum(underlying) => Some(underlying),
            _ => None,
        }
    }

    /// `namespace.name`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }
}

/// Nesting relationship between two type definitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedClass {
    /// The nested type
    pub nested: TypeDefId,
    /// The type it is declared in
    pub enclosing: TypeDefId,
}

/// An exported native function (import map row)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplMap {
    /// Native module that exports the function
    pub module: String,
    /// Exported symbol name
    pub import_name: String,
    /// Parameter and return types
    pub signature: MethodSig,
    /// Calling-convention and mapping flags
    #[serde(default)]
    pub flags: u16,
}

/// Typed literal value of a constant field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstantValue {
    /// Boolean
    Boolean(bool),
    /// UTF-16 code unit
    Char(u16),
    /// Signed 8-bit
    Int8(i8),
    /// Unsigned 8-bit
    UInt8(u8),
    /// Signed 16-bit
    Int16(i16),
    /// Unsigned 16-bit
    UInt16(u16),
    /// Signed 32-bit
    Int32(i32),
    /// Unsigned 32-bit
    UInt32(u32),
    /// Signed 64-bit
    Int64(i64),
    /// Unsigned 64-bit
    UInt64(u64),
    /// 32-bit float
    Float32(f32),
    /// 64-bit float
    Float64(f64),
    /// String literal (not marshaled)
    String(String),
    /// Null class reference (not marshaled)
    Class,
}

/// A field row; only fields with a constant value are indexed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Field name
    pub name: String,
    /// Constant value, if the field has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constant: Option<ConstantValue>,
}

/// Assembly version record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyVersion {
    /// Major version
    pub major_version: u16,
    /// Minor version
    pub minor_version: u16,
    /// Build number
    pub build_number: u16,
    /// Revision number
    pub revision_number: u16,
}

// ============================================================================
// Metadata source
// ============================================================================

/// Read-only structured source of metadata tables.
///
/// The catalog reads every table exactly once while building its indexes and
/// keeps the source alive afterwards so it can hand out references into it.
pub trait MetadataSource: Send + Sync {
    /// Type definition table; a [`TypeDefId`] indexes into it
    fn type_defs(&self) -> &[TypeDef];

    /// Nesting relationships
    fn nested_classes(&self) -> &[NestedClass];

    /// Exported native functions
    fn impl_maps(&self) -> &[ImplMap];

    /// Fields, possibly carrying constant values
    fn fields(&self) -> &[Field];

    /// Assembly version record, if present
    fn assembly(&self) -> Option<&AssemblyVersion>;
}
