// Compilation backend interface.
pub mod direct;

pub use direct::DirectBackend;

use thiserror::Error;

use crate::registry::FunctionDef;
use crate::signature::Signature;
use crate::value::Value;

/// Entry point of a compiled kernel.
pub type KernelFn = Box<dyn Fn(&mut [Value]) -> anyhow::Result<Value> + Send + Sync>;

/// Classified compilation failure.
///
/// Compilation is assumed deterministic for a given (function, signature)
/// pair, which is what makes failures safe to cache permanently.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// The backend cannot specialize this signature. Callers still get a
    /// correct result through fallback unless the function is strict.
    #[error("unsupported signature {signature}: {reason}")]
    UnsupportedSignature { signature: Signature, reason: String },

    /// The backend itself broke, as opposed to rejecting the signature.
    #[error("backend failure: {0}")]
    BackendFailure(String),
}

/// Produces kernels specialized for one call signature.
///
/// The dispatcher treats this as a black box that may be slow and dominates
/// first-call latency.
pub trait KernelBackend: Send + Sync {
    /// Backend name for logs and diagnostics.
    fn name(&self) -> &str;

    /// Whether opaque-classified argument positions can be specialized.
    fn supports_opaque(&self) -> bool {
        false
    }

    /// Produce a kernel for one (function, signature) pair.
    fn compile(&self, def: &FunctionDef, signature: &Signature) -> Result<KernelFn, CompileError>;
}
