//! Type reference resolution
//!
//! Signatures refer to value types either directly (by definition index) or
//! by namespace and name. Binding needs the concrete definition to see
//! whether a type is an enum and what its storage is; resolution happens
//! once per slot at bind time, never per call.

use super::{Catalog, TypeDef, TypeRef};
use crate::error::{EngineError, EngineResult};

/// Follow `type_ref` to its concrete definition.
pub fn resolve<'c>(catalog: &'c Catalog, type_ref: &TypeRef) -> EngineResult<&'c TypeDef> {
    match type_ref {
        TypeRef::Def(id) => catalog
            .type_def(*id)
            .ok_or_else(|| EngineError::Unresolved(format!("type definition #{}", id.0))),
        TypeRef::Ref { namespace, name } => catalog.find_type_required(namespace, name),
    }
}
