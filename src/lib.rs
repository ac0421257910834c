//! Signature-specializing kernel cache and dispatcher.
//!
//! A registered numeric function is specialized on first call for the
//! concrete shape of its arguments and served from the kernel cache on every
//! later call with the same call shape. Compilation is delegated to a
//! pluggable [`backend::KernelBackend`]; when it is unavailable or fails,
//! calls fall back to the unspecialized body with identical results.

pub mod backend;
pub mod cache;
pub mod dispatch;
pub mod errors;
pub mod registry;
pub mod signature;
pub mod value;

pub use backend::{CompileError, DirectBackend, KernelBackend, KernelFn};
pub use cache::{CacheStats, Kernel, KernelCache, KernelKey, KernelMetadata};
pub use dispatch::{
    DispatchConfig, DispatchEvent, DispatchOutcome, Dispatcher, EventSink, MemorySink, WaitPolicy,
};
pub use errors::DispatchError;
pub use registry::{BodyFn, FunctionDef, FunctionId, FunctionRegistry, ParamSpec, SpecializationMode};
pub use signature::{classify, ArgDescriptor, ClassifyError, ElementKind, Signature};
pub use value::{ArrayBuf, Value};
