//! Metadata catalog
//!
//! Indexes a [`MetadataSource`] once at load time: namespaced type
//! definitions, nesting relationships, exported functions and constants.
//! All lookups afterwards are read-only.

use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;
use std::path::Path;

use super::{
    AssemblyVersion, ConstantValue, ImplMap, MetadataDocument, MetadataError, MetadataSource,
    TypeDef, TypeDefId,
};
use crate::error::{EngineError, EngineResult};

/// An exported function record: module, exported name, signature, flags
pub type FunctionRecord = ImplMap;

/// Members of one namespace, keyed by bare type name
pub type NamespaceMembers = BTreeMap<String, TypeDefId>;

/// Read access to named constants.
///
/// The constants view works against this trait so a host can put its own
/// lookup (or a counting wrapper) in front of the catalog.
pub trait ConstantLookup {
    /// Find a constant value by field name
    fn find_constant(&self, name: &str) -> Option<&ConstantValue>;
}

/// Name indexes over a loaded metadata source.
pub struct Catalog {
    source: Box<dyn MetadataSource>,
    namespaces: BTreeMap<String, NamespaceMembers>,
    nested_types: FxHashMap<TypeDefId, Vec<TypeDefId>>,
    apis: BTreeMap<String, usize>,
    constants: BTreeMap<String, usize>,
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("namespaces", &self.namespaces.len())
            .field("apis", &self.apis.len())
            .field("constants", &self.constants.len())
            .finish()
    }
}

impl Catalog {
    /// Build the indexes over `source`.
    ///
    /// Fails if a nesting row references a type that does not exist.
    pub fn load<S: MetadataSource + 'static>(source: S) -> Result<Self, MetadataError> {
        let source: Box<dyn MetadataSource> = Box::new(source);
        let types = source.type_defs();

        let mut nested_types: FxHashMap<TypeDefId, Vec<TypeDefId>> = FxHashMap::default();
        for row in source.nested_classes() {
            if row.nested.index() >= types.len() || row.enclosing.index() >= types.len() {
                return Err(MetadataError::Invalid(format!(
                    "nested class row #{} -> #{} is out of range",
                    row.nested.0, row.enclosing.0
                )));
            }
            nested_types.entry(row.enclosing).or_default().push(row.nested);
        }
        let nested_ids: FxHashSet<TypeDefId> =
            source.nested_classes().iter().map(|row| row.nested).collect();

        let mut namespaces: BTreeMap<String, NamespaceMembers> = BTreeMap::new();
        for (index, def) in types.iter().enumerate() {
            let id = TypeDefId(index as u32);
            if nested_ids.contains(&id) {
                continue;
            }
            namespaces
                .entry(def.namespace.clone())
                .or_default()
                .entry(def.name.clone())
                .or_insert(id);
        }

        let mut apis = BTreeMap::new();
        for (index, api) in source.impl_maps().iter().enumerate() {
            apis.insert(api.import_name.clone(), index);
        }

        let mut constants = BTreeMap::new();
        for (index, field) in source.fields().iter().enumerate() {
            if field.constant.is_some() {
                constants.insert(field.name.clone(), index);
            }
        }

        tracing::debug!(
            namespaces = namespaces.len(),
            types = types.len(),
            apis = apis.len(),
            constants = constants.len(),
            "metadata catalog loaded"
        );

        Ok(Self {
            source,
            namespaces,
            nested_types,
            apis,
            constants,
        })
    }

    /// Load a JSON metadata document from `path` and index it
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, MetadataError> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "loading metadata document");
        Self::load(MetadataDocument::from_path(path)?)
    }

    // ========================================================================
    // Types
    // ========================================================================

    /// Id of the type `namespace.name`
    pub fn find_type_id(&self, namespace: &str, name: &str) -> Option<TypeDefId> {
        self.namespaces.get(namespace)?.get(name).copied()
    }

    /// Find the type `namespace.name`
    pub fn find_type(&self, namespace: &str, name: &str) -> Option<&TypeDef> {
        self.find_type_id(namespace, name)
            .and_then(|id| self.type_def(id))
    }

    /// Find a type by dotted name, splitting on the last `.`
    pub fn find_type_qualified(&self, type_string: &str) -> EngineResult<Option<&TypeDef>> {
        let (namespace, name) = split_qualified(type_string)?;
        Ok(self.find_type(namespace, name))
    }

    /// Find the type `namespace.name`, failing if it does not exist
    pub fn find_type_required(&self, namespace: &str, name: &str) -> EngineResult<&TypeDef> {
        self.find_type(namespace, name)
            .ok_or_else(|| EngineError::TypeNotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    /// Find a type by dotted name, failing if it does not exist
    pub fn find_type_required_qualified(&self, type_string: &str) -> EngineResult<&TypeDef> {
        let (namespace, name) = split_qualified(type_string)?;
        self.find_type_required(namespace, name)
    }

    /// Definition behind a direct type reference
    pub fn type_def(&self, id: TypeDefId) -> Option<&TypeDef> {
        self.source.type_defs().get(id.index())
    }

    /// Ids of the types declared inside `enclosing` (empty if none)
    pub fn nested_type_ids(&self, enclosing: TypeDefId) -> &[TypeDefId] {
        self.nested_types
            .get(&enclosing)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Types declared inside `enclosing`, in table order
    pub fn nested_types_of(&self, enclosing: TypeDefId) -> impl Iterator<Item = &TypeDef> + '_ {
        self.nested_type_ids(enclosing)
            .iter()
            .filter_map(move |id| self.type_def(*id))
    }

    /// Namespaces and their members, in name order
    pub fn namespaces(&self) -> impl Iterator<Item = (&str, &NamespaceMembers)> + '_ {
        self.namespaces.iter().map(|(ns, members)| (ns.as_str(), members))
    }

    // ========================================================================
    // Functions and constants
    // ========================================================================

    /// Find an exported function by its exported name
    pub fn find_function(&self, name: &str) -> Option<&FunctionRecord> {
        let index = *self.apis.get(name)?;
        self.source.impl_maps().get(index)
    }

    /// Find a constant value by field name
    pub fn find_constant(&self, name: &str) -> Option<&ConstantValue> {
        let index = *self.constants.get(name)?;
        self.source.fields().get(index)?.constant.as_ref()
    }

    /// Number of indexed exported functions
    pub fn function_count(&self) -> usize {
        self.apis.len()
    }

    /// Number of indexed constants
    pub fn constant_count(&self) -> usize {
        self.constants.len()
    }

    /// Assembly version record of the source
    pub fn assembly_version(&self) -> Option<&AssemblyVersion> {
        self.source.assembly()
    }

    /// The underlying metadata source
    pub fn source(&self) -> &dyn MetadataSource {
        self.source.as_ref()
    }
}

impl ConstantLookup for Catalog {
    fn find_constant(&self, name: &str) -> Option<&ConstantValue> {
        Catalog::find_constant(self, name)
    }
}

fn split_qualified(type_string: &str) -> EngineResult<(&str, &str)> {
    type_string
        .rsplit_once('.')
        .ok_or_else(|| EngineError::MissingNamespace(type_string.to_string()))
}
