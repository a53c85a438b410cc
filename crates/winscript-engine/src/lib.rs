//! winscript engine - metadata-driven native calls for embedded scripting
//!
//! Lets a script call native library functions by name without precompiled
//! bindings. Function signatures, constants and type definitions come from a
//! metadata source; values cross the script/native boundary through a
//! marshaling registry keyed by type.
//!
//! # Architecture
//!
//! - **metadata**: catalog of types, exported functions and constants
//! - **ffi**: marshaling, arity-specialized call thunks, native module loading
//! - **module**: the `apis`, `constants` and `version` views exposed to scripts
//! - **config**: engine configuration (metadata path, library search paths)
//!
//! # Example
//!
//! ```ignore
//! use winscript_engine::{EngineConfig, Win32};
//! use winscript_sdk::ValueStack;
//!
//! let mut win32 = Win32::open(&EngineConfig::default())?;
//! let mut stack = ValueStack::with_args([750i64, 300]);
//! win32.call("Beep", &mut stack)?;
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod ffi;
pub mod metadata;
pub mod module;

pub use config::{ConfigError, EngineConfig};
pub use error::{EngineError, EngineResult};
pub use ffi::{
    BoundFunction, DecodeFn, EncodeFn, MarshalRegistry, NativeModules, Slot, SymbolResolver,
    MAX_ARITY,
};
pub use metadata::{Catalog, ConstantLookup, MetadataDocument, MetadataError};
pub use module::{ApiTable, ConstantTable, Version, Win32};
