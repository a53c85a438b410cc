//! Native call plumbing
//!
//! - [`marshal`]: script value ⇄ machine word conversion
//! - [`trampoline`]: binding a native address to a signature and calling it
//! - [`loader`]: locating native modules and their exported symbols

pub mod loader;
pub mod marshal;
pub mod trampoline;

pub use loader::{Library, LoadError, NativeModules, SymbolResolver};
pub use marshal::{classify, DecodeFn, EncodeFn, IntegerKind, MarshalRegistry, Marshaling, Slot};
pub use trampoline::{BoundFunction, MAX_ARITY};
