//! Module views exposed to the scripting runtime
//!
//! [`Win32`] is the module object. It owns the catalog, the marshaling
//! registry and the symbol resolver, and exposes three views:
//!
//! - `apis`: exported functions, bound on first use and cached by name
//! - `constants`: typed literal values, looked up on first use and cached
//! - `version`: the metadata assembly version, read once at construction
//!
//! The views return [`EngineError`] internally; the `Win32` entry points
//! translate it into the runtime's [`ScriptError`].

use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};
use winscript_sdk::{ScriptError, ScriptResult, ScriptState};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::ffi::{BoundFunction, MarshalRegistry, NativeModules, SymbolResolver};
use crate::metadata::{AssemblyVersion, Catalog, ConstantLookup, ConstantValue};

// ============================================================================
// Functions
// ============================================================================

/// Bound exported functions, keyed by exported name
#[derive(Debug, Default)]
pub struct ApiTable {
    functions: FxHashMap<String, Arc<BoundFunction>>,
}

impl ApiTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound function for `name`, resolving and binding it on first use.
    ///
    /// Failures are not cached.
    pub fn get(
        &mut self,
        name: &str,
        catalog: &Catalog,
        registry: &MarshalRegistry,
        symbols: &mut dyn SymbolResolver,
    ) -> EngineResult<Arc<BoundFunction>> {
        if let Some(function) = self.functions.get(name) {
            debug!(function = name, "api cache hit");
            return Ok(Arc::clone(function));
        }

        let record = catalog
            .find_function(name)
            .ok_or_else(|| EngineError::ApiNotFound(name.to_string()))?;
        let address = symbols
            .resolve(&record.module, &record.import_name)
            .filter(|&address| address != 0)
            .ok_or_else(|| EngineError::CannotLoad(name.to_string()))?;

        // SAFETY: the address was exported under this name by the module the
        // metadata names, and the metadata signature describes it.
        let function = Arc::new(unsafe {
            BoundFunction::bind(name, address, &record.signature, catalog, registry)?
        });
        self.functions.insert(name.to_string(), Arc::clone(&function));
        Ok(function)
    }

    /// Check if `name` has been bound
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Number of bound functions
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Check if nothing has been bound yet
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

// ============================================================================
// Constants
// ============================================================================

/// Constant values, keyed by name
#[derive(Debug, Default)]
pub struct ConstantTable {
    values: FxHashMap<String, ConstantValue>,
}

impl ConstantTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of `name`, asking `lookup` only the first time
    pub fn get<C: ConstantLookup + ?Sized>(
        &mut self,
        name: &str,
        lookup: &C,
    ) -> EngineResult<&ConstantValue> {
        if !self.values.contains_key(name) {
            let value = lookup
                .find_constant(name)
                .cloned()
                .ok_or_else(|| EngineError::ConstantNotFound(name.to_string()))?;
            self.values.insert(name.to_string(), value);
        }
        self.values
            .get(name)
            .ok_or_else(|| EngineError::ConstantNotFound(name.to_string()))
    }

    /// Push the value of `name`; returns the number of values pushed
    pub fn push<C: ConstantLookup + ?Sized>(
        &mut self,
        name: &str,
        lookup: &C,
        state: &mut dyn ScriptState,
    ) -> EngineResult<usize> {
        let value = self.get(name, lookup)?;
        Ok(push_constant(state, value))
    }

    /// Number of cached constants
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if nothing has been cached yet
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Push a constant as a script value.
///
/// String and class constants have no script representation and push nil.
pub fn push_constant(state: &mut dyn ScriptState, value: &ConstantValue) -> usize {
    match *value {
        ConstantValue::Boolean(b) => state.push_boolean(b),
        ConstantValue::Char(c) => state.push_integer(i64::from(c)),
        ConstantValue::Int8(i) => state.push_integer(i64::from(i)),
        ConstantValue::UInt8(i) => state.push_integer(i64::from(i)),
        ConstantValue::Int16(i) => state.push_integer(i64::from(i)),
        ConstantValue::UInt16(i) => state.push_integer(i64::from(i)),
        ConstantValue::Int32(i) => state.push_integer(i64::from(i)),
        ConstantValue::UInt32(i) => state.push_integer(i64::from(i)),
        ConstantValue::Int64(i) => state.push_integer(i),
        // Wraps like any 64-bit word pushed as a script integer
        ConstantValue::UInt64(i) => state.push_integer(i as i64),
        ConstantValue::Float32(n) => state.push_number(f64::from(n)),
        ConstantValue::Float64(n) => state.push_number(n),
        ConstantValue::String(_) | ConstantValue::Class => state.push_nil(),
    }
    1
}

// ============================================================================
// Version
// ============================================================================

/// Assembly version of the loaded metadata
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Version {
    /// Major version
    pub major: u16,
    /// Minor version
    pub minor: u16,
    /// Build number
    pub build: u16,
    /// Revision number
    pub revision: u16,
}

impl Version {
    /// Field names, in order
    pub const FIELDS: [&'static str; 4] =
        ["MajorVersion", "MinorVersion", "BuildNumber", "RevisionNumber"];

    /// Read the version from the catalog; 0.0.0.0 if the source has none
    pub fn from_catalog(catalog: &Catalog) -> Self {
        match catalog.assembly_version() {
            Some(assembly) => Self::from(*assembly),
            None => {
                warn!("metadata has no assembly record, reporting version 0.0.0.0");
                Self::default()
            }
        }
    }

    /// Value of a named field
    pub fn field(&self, name: &str) -> Option<u16> {
        match name {
            "MajorVersion" => Some(self.major),
            "MinorVersion" => Some(self.minor),
            "BuildNumber" => Some(self.build),
            "RevisionNumber" => Some(self.revision),
            _ => None,
        }
    }

    /// Push a named field as an integer, or nil for an unknown name
    pub fn push_field(&self, name: &str, state: &mut dyn ScriptState) -> usize {
        match self.field(name) {
            Some(value) => state.push_integer(i64::from(value)),
            None => state.push_nil(),
        }
        1
    }
}

impl From<AssemblyVersion> for Version {
    fn from(assembly: AssemblyVersion) -> Self {
        Self {
            major: assembly.major_version,
            minor: assembly.minor_version,
            build: assembly.build_number,
            revision: assembly.revision_number,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.major, self.minor, self.build, self.revision)
    }
}

// ============================================================================
// Module
// ============================================================================

/// The native API module: `apis`, `constants` and `version` views over one
/// metadata catalog
pub struct Win32 {
    catalog: Catalog,
    registry: MarshalRegistry,
    symbols: Box<dyn SymbolResolver>,
    apis: ApiTable,
    constants: ConstantTable,
    version: Version,
}

impl fmt::Debug for Win32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Win32")
            .field("catalog", &self.catalog)
            .field("registry", &self.registry)
            .field("apis", &self.apis)
            .field("constants", &self.constants)
            .field("version", &self.version)
            .finish()
    }
}

impl Win32 {
    /// Load the metadata named by `config` and resolve symbols from real
    /// native modules
    pub fn open(config: &EngineConfig) -> EngineResult<Self> {
        let catalog = Catalog::open(&config.metadata)?;
        let symbols = NativeModules::with_search_paths(config.library_paths.iter().cloned());
        Ok(Self::new(catalog, symbols))
    }

    /// Create the module over `catalog`, resolving symbols through `symbols`
    pub fn new<R: SymbolResolver + 'static>(catalog: Catalog, symbols: R) -> Self {
        let version = Version::from_catalog(&catalog);
        debug!(%version, "win32 module initialized");
        Self {
            catalog,
            registry: MarshalRegistry::new(),
            symbols: Box::new(symbols),
            apis: ApiTable::new(),
            constants: ConstantTable::new(),
            version,
        }
    }

    /// Replace the marshaling registry; affects functions bound afterwards
    pub fn with_registry(mut self, registry: MarshalRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Bound function for an exported name
    pub fn api(&mut self, name: &str) -> EngineResult<Arc<BoundFunction>> {
        self.apis
            .get(name, &self.catalog, &self.registry, self.symbols.as_mut())
    }

    /// Call an exported function with the arguments on `state`
    pub fn call(&mut self, name: &str, state: &mut dyn ScriptState) -> ScriptResult<usize> {
        let function = self.api(name)?;
        function.invoke(state)
    }

    /// Push the value of a constant onto `state`
    pub fn constant(&mut self, name: &str, state: &mut dyn ScriptState) -> ScriptResult<usize> {
        self.constants
            .push(name, &self.catalog, state)
            .map_err(ScriptError::from)
    }

    /// Assembly version of the metadata
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// The metadata catalog
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The marshaling registry
    pub fn registry(&self) -> &MarshalRegistry {
        &self.registry
    }

    /// Mutable access to the marshaling registry; affects functions bound
    /// afterwards
    pub fn registry_mut(&mut self) -> &mut MarshalRegistry {
        &mut self.registry
    }

    /// Bound functions
    pub fn apis(&self) -> &ApiTable {
        &self.apis
    }

    /// Cached constants
    pub fn constants(&self) -> &ConstantTable {
        &self.constants
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetadataDocument;
    use std::cell::Cell;
    use winscript_sdk::{ScriptValue, ValueStack};

    struct CountingLookup {
        inner: Catalog,
        lookups: Cell<usize>,
    }

    impl ConstantLookup for CountingLookup {
        fn find_constant(&self, name: &str) -> Option<&ConstantValue> {
            self.lookups.set(self.lookups.get() + 1);
            self.inner.find_constant(name)
        }
    }

    fn constants_catalog() -> Catalog {
        let mut doc = MetadataDocument::new();
        doc.add_constant("MAX_PATH", ConstantValue::UInt32(260));
        doc.add_constant("TRUE_FLAG", ConstantValue::Boolean(true));
        doc.add_constant("NEG", ConstantValue::Int8(-3));
        doc.add_constant("WIDE_CHAR", ConstantValue::Char(0x41));
        doc.add_constant("ALL_BITS", ConstantValue::UInt64(u64::MAX));
        doc.add_constant("HALF", ConstantValue::Float32(0.5));
        doc.add_constant("PI", ConstantValue::Float64(std::f64::consts::PI));
        doc.add_constant("NAME", ConstantValue::String("text".to_string()));
        doc.add_constant("NULL_CLASS", ConstantValue::Class);
        Catalog::load(doc).unwrap()
    }

    #[test]
    fn test_constant_lookup_is_cached() {
        let lookup = CountingLookup {
            inner: constants_catalog(),
            lookups: Cell::new(0),
        };
        let mut table = ConstantTable::new();
        let mut stack = ValueStack::new();

        assert_eq!(table.push("MAX_PATH", &lookup, &mut stack).unwrap(), 1);
        assert_eq!(table.push("MAX_PATH", &lookup, &mut stack).unwrap(), 1);
        assert_eq!(lookup.lookups.get(), 1);
        assert_eq!(
            stack.take_results(2),
            vec![ScriptValue::Integer(260), ScriptValue::Integer(260)]
        );
    }

    #[test]
    fn test_missing_constant_is_not_cached() {
        let lookup = CountingLookup {
            inner: constants_catalog(),
            lookups: Cell::new(0),
        };
        let mut table = ConstantTable::new();
        let err = table.get("NOPE", &lookup).unwrap_err();
        assert_eq!(err.to_string(), "NOPE not found.");
        assert!(table.get("NOPE", &lookup).is_err());
        assert_eq!(lookup.lookups.get(), 2);
        assert!(table.is_empty());
    }

    #[test]
    fn test_constant_kinds() {
        let catalog = constants_catalog();
        let mut table = ConstantTable::new();
        let mut stack = ValueStack::new();
        let names = [
            "TRUE_FLAG",
            "NEG",
            "WIDE_CHAR",
            "ALL_BITS",
            "HALF",
            "PI",
            "NAME",
            "NULL_CLASS",
        ];
        for name in names {
            assert_eq!(table.push(name, &catalog, &mut stack).unwrap(), 1);
        }
        assert_eq!(
            stack.take_results(names.len()),
            vec![
                ScriptValue::Boolean(true),
                ScriptValue::Integer(-3),
                ScriptValue::Integer(0x41),
                ScriptValue::Integer(-1),
                ScriptValue::Number(0.5),
                ScriptValue::Number(std::f64::consts::PI),
                ScriptValue::Nil,
                ScriptValue::Nil,
            ]
        );
    }

    #[test]
    fn test_version_fields() {
        let doc = MetadataDocument::new().with_assembly(AssemblyVersion {
            major_version: 10,
            minor_version: 0,
            build_number: 22621,
            revision_number: 3,
        });
        let version = Version::from_catalog(&Catalog::load(doc).unwrap());
        assert_eq!(version.to_string(), "10.0.22621.3");
        assert_eq!(version.field("BuildNumber"), Some(22621));
        assert_eq!(version.field("Patch"), None);

        let mut stack = ValueStack::new();
        for name in Version::FIELDS {
            version.push_field(name, &mut stack);
        }
        version.push_field("Patch", &mut stack);
        assert_eq!(
            stack.take_results(5),
            vec![
                ScriptValue::Integer(10),
                ScriptValue::Integer(0),
                ScriptValue::Integer(22621),
                ScriptValue::Integer(3),
                ScriptValue::Nil,
            ]
        );
    }

    #[test]
    fn test_missing_assembly_reports_zero() {
        let version = Version::from_catalog(&Catalog::load(MetadataDocument::new()).unwrap());
        assert_eq!(version, Version::default());
        assert_eq!(version.to_string(), "0.0.0.0");
    }

    #[test]
    fn test_win32_constant_view() {
        let mut win32 = Win32::new(constants_catalog(), NativeModules::new());
        let mut stack = ValueStack::new();
        assert_eq!(win32.constant("MAX_PATH", &mut stack).unwrap(), 1);
        assert_eq!(stack.pop(), Some(ScriptValue::Integer(260)));
        assert_eq!(win32.constants().len(), 1);

        let err = win32.constant("MIN_PATH", &mut stack).unwrap_err();
        assert_eq!(err, ScriptError::Runtime("MIN_PATH not found.".to_string()));
    }
}
