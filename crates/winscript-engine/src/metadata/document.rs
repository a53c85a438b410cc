//! JSON-backed metadata source
//!
//! A `MetadataDocument` holds the metadata tables as plain serde records:
//!
//! ```json
//! {
//!   "assembly": { "major_version": 1, "minor_version": 0, "build_number": 0, "revision_number": 0 },
//!   "types":    [ { "namespace": "Windows.Win32.Foundation", "name": "PSTR" } ],
//!   "nested":   [ { "nested": 3, "enclosing": 2 } ],
//!   "apis":     [ { "module": "KERNEL32", "import_name": "Beep",
//!                   "signature": { "params": [ { "name": "dwFreq", "type": { "element": "U4" } } ],
//!                                  "return": { "element": "I4" } } } ],
//!   "fields":   [ { "name": "MAX_PATH", "constant": { "UInt32": 260 } } ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use super::{
    AssemblyVersion, ConstantValue, Field, ImplMap, MetadataSource, MethodSig, NestedClass,
    TypeDef, TypeDefId,
};

/// Errors that can occur while loading a metadata document
#[derive(Debug, Error)]
pub enum MetadataError {
    /// Failed to read the metadata file
    #[error("Failed to read metadata file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse JSON
    #[error("Failed to parse metadata: {0}")]
    Parse(#[from] serde_json::Error),

    /// Structurally invalid tables
    #[error("Invalid metadata: {0}")]
    Invalid(String),
}

/// Metadata tables loaded from a JSON document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataDocument {
    /// Assembly version record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assembly: Option<AssemblyVersion>,

    /// Type definitions
    #[serde(default)]
    pub types: Vec<TypeDef>,

    /// Nesting relationships
    #[serde(default)]
    pub nested: Vec<NestedClass>,

    /// Exported native functions
    #[serde(default)]
    pub apis: Vec<ImplMap>,

    /// Constant-bearing fields
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl MetadataDocument {
    /// Create an empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a document from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self, MetadataError> {
        let document: MetadataDocument = serde_json::from_str(json)?;
        document.validate()?;
        Ok(document)
    }

    /// Read, parse and validate a document from a file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, MetadataError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Serialize the document to pretty-printed JSON
    pub fn to_json_string(&self) -> Result<String, MetadataError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check that every nesting row points at an existing type
    pub fn validate(&self) -> Result<(), MetadataError> {
        let count = self.types.len();
        for row in &self.nested {
            for id in [row.nested, row.enclosing] {
                if id.index() >= count {
                    return Err(MetadataError::Invalid(format!(
                        "nested class row references type #{} but only {} types exist",
                        id.0, count
                    )));
                }
            }
            if row.nested == row.enclosing {
                return Err(MetadataError::Invalid(format!(
                    "type #{} is nested in itself",
                    row.nested.0
                )));
            }
        }
        Ok(())
    }

    // ========================================================================
    // Builders
    // ========================================================================

    /// Set the assembly version
    pub fn with_assembly(mut self, version: AssemblyVersion) -> Self {
        self.assembly = Some(version);
        self
    }

    /// Append a type definition and return its id
    pub fn add_type(&mut self, def: TypeDef) -> TypeDefId {
        self.types.push(def);
        TypeDefId((self.types.len() - 1) as u32)
    }

    /// Record that `nested` is declared inside `enclosing`
    pub fn add_nested(&mut self, nested: TypeDefId, enclosing: TypeDefId) {
        self.nested.push(NestedClass { nested, enclosing });
    }

    /// Append an exported function
    pub fn add_api(
        &mut self,
        module: impl Into<String>,
        import_name: impl Into<String>,
        signature: MethodSig,
    ) {
        self.apis.push(ImplMap {
            module: module.into(),
            import_name: import_name.into(),
            signature,
            flags: 0,
        });
    }

    /// Append a constant field
    pub fn add_constant(&mut self, name: impl Into<String>, value: ConstantValue) {
        self.fields.push(Field {
            name: name.into(),
            constant: Some(value),
        });
    }
}

impl MetadataSource for MetadataDocument {
    fn type_defs(&self) -> &[TypeDef] {
        &self.types
    }

    fn nested_classes(&self) -> &[NestedClass] {
        &self.nested
    }

    fn impl_maps(&self) -> &[ImplMap] {
        &self.apis
    }

    fn fields(&self) -> &[Field] {
        &self.fields
    }

    fn assembly(&self) -> Option<&AssemblyVersion> {
        self.assembly.as_ref()
    }
}
