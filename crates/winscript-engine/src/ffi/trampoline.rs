//! Call trampoline
//!
//! A bound function captures a native address, one decoder per parameter and
//! an optional return encoder. Calling it decodes the script arguments into
//! machine words, dispatches through an arity-specialized thunk and encodes
//! the return word.
//!
//! Every parameter and the return value travel as pointer-sized words using
//! the platform's system calling convention.

use tracing::{debug, trace};
use winscript_sdk::{ScriptFunction, ScriptResult, ScriptState};

use super::marshal::{DecodeFn, EncodeFn, MarshalRegistry, Slot};
use crate::error::{EngineError, EngineResult};
use crate::metadata::{Catalog, MethodSig};

/// Largest parameter count a native function can be bound with
pub const MAX_ARITY: usize = 12;

/// Argument buffer passed to a thunk; only the first `arity` words are used
pub type ArgWords = [usize; MAX_ARITY];

type Thunk = unsafe fn(usize, &ArgWords) -> usize;

macro_rules! word {
    ($i:tt) => {
        usize
    };
}

macro_rules! thunk {
    ($name:ident $(, $i:tt)*) => {
        #[allow(unused_variables)]
        unsafe fn $name(address: usize, args: &ArgWords) -> usize {
            let f: extern "system" fn($(word!($i)),*) -> usize = std::mem::transmute(address);
            f($(args[$i]),*)
        }
    };
}

thunk!(call0);
thunk!(call1, 0);
thunk!(call2, 0, 1);
thunk!(call3, 0, 1, 2);
thunk!(call4, 0, 1, 2, 3);
thunk!(call5, 0, 1, 2, 3, 4);
thunk!(call6, 0, 1, 2, 3, 4, 5);
thunk!(call7, 0, 1, 2, 3, 4, 5, 6);
thunk!(call8, 0, 1, 2, 3, 4, 5, 6, 7);
thunk!(call9, 0, 1, 2, 3, 4, 5, 6, 7, 8);
thunk!(call10, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9);
thunk!(call11, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10);
thunk!(call12, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11);

static THUNKS: [Thunk; MAX_ARITY + 1] = [
    call0, call1, call2, call3, call4, call5, call6, call7, call8, call9, call10, call11, call12,
];

/// A native function bound to its signature
pub struct BoundFunction {
    name: String,
    address: usize,
    decoders: Vec<DecodeFn>,
    encoder: Option<EncodeFn>,
    thunk: Thunk,
}

impl std::fmt::Debug for BoundFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundFunction")
            .field("name", &self.name)
            .field("address", &format_args!("{:#x}", self.address))
            .field("arity", &self.decoders.len())
            .field("returns", &self.encoder.is_some())
            .finish()
    }
}

impl BoundFunction {
    /// Bind `address` to `signature`.
    ///
    /// Fails with [`EngineError::TooManyParameters`] above [`MAX_ARITY`], or
    /// with the first slot that has no marshaling. Nothing is called.
    ///
    /// # Safety
    ///
    /// `address` must be a function taking `signature.param_count()`
    /// pointer-sized arguments with the system calling convention and
    /// returning a pointer-sized word (or nothing when no return type is
    /// declared). It must stay valid for the lifetime of the binding.
    pub unsafe fn bind(
        name: &str,
        address: usize,
        signature: &MethodSig,
        catalog: &Catalog,
        registry: &MarshalRegistry,
    ) -> EngineResult<Self> {
        let arity = signature.param_count();
        if arity > MAX_ARITY {
            return Err(EngineError::TooManyParameters {
                name: name.to_string(),
                count: arity,
            });
        }

        let decoders = signature
            .params
            .iter()
            .enumerate()
            .map(|(i, param)| registry.decoder_for(catalog, &param.ty, Slot::Param(i + 1)))
            .collect::<EngineResult<Vec<_>>>()?;
        let encoder = signature
            .ret
            .as_ref()
            .map(|ret| registry.encoder_for(catalog, ret))
            .transpose()?;

        debug!(function = name, address, arity, "bound native function");

        Ok(Self {
            name: name.to_string(),
            address,
            decoders,
            encoder,
            thunk: THUNKS[arity],
        })
    }

    /// Exported name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Native address
    pub fn address(&self) -> usize {
        self.address
    }

    /// Number of parameters
    pub fn arity(&self) -> usize {
        self.decoders.len()
    }

    /// Check if a return value is reported
    pub fn has_return(&self) -> bool {
        self.encoder.is_some()
    }

    /// Decode the call arguments at stack indices 1..=arity, left to right.
    ///
    /// Unused trailing words are zero.
    pub fn decode_args(&self, state: &dyn ScriptState) -> ScriptResult<ArgWords> {
        let mut args = [0usize; MAX_ARITY];
        for (i, decode) in self.decoders.iter().enumerate() {
            args[i] = decode(state, i as i32 + 1)?;
        }
        Ok(args)
    }

    /// Decode the arguments, call the native function and push its result.
    ///
    /// Returns the number of values pushed. A decode failure returns before
    /// the native function is reached.
    pub fn invoke(&self, state: &mut dyn ScriptState) -> ScriptResult<usize> {
        let args = self.decode_args(&*state)?;
        trace!(function = %self.name, args = ?&args[..self.arity()], "calling native function");

        // SAFETY: the address and signature were vouched for in `bind`, and
        // the thunk was chosen for exactly this arity.
        let word = unsafe { (self.thunk)(self.address, &args) };

        Ok(match self.encoder {
            Some(encode) => encode(state, word),
            None => 0,
        })
    }
}

impl ScriptFunction for BoundFunction {
    fn call(&self, state: &mut dyn ScriptState) -> ScriptResult<usize> {
        self.invoke(state)
    }
}
