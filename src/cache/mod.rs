// Kernel caching for specialized call shapes.
pub mod kernel_cache;
pub mod metadata;

pub use kernel_cache::{CacheStats, KernelCache, Lookup, Reservation, Resolution};
pub use metadata::KernelMetadata;

use std::fmt;

use crate::backend::KernelFn;
use crate::registry::FunctionId;
use crate::signature::Signature;
use crate::value::Value;

/// Cache key. Exactly one entry exists per (function, signature) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KernelKey {
    pub function: FunctionId,
    pub signature: Signature,
}

impl KernelKey {
    pub fn new(function: FunctionId, signature: Signature) -> Self {
        Self {
            function,
            signature,
        }
    }
}

impl fmt::Display for KernelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn#{}{}", self.function.index(), self.signature)
    }
}

/// A compiled kernel bound to exactly one call signature.
///
/// Owned by its cache entry, never mutated after creation, and safe to
/// invoke concurrently. It may still write argument buffers in place for
/// positions the signature marks mutable.
pub struct Kernel {
    key: KernelKey,
    enter: KernelFn,
    metadata: KernelMetadata,
}

impl Kernel {
    pub fn new(key: KernelKey, enter: KernelFn, metadata: KernelMetadata) -> Self {
        Self {
            key,
            enter,
            metadata,
        }
    }

    pub fn key(&self) -> &KernelKey {
        &self.key
    }

    pub fn signature(&self) -> &Signature {
        &self.key.signature
    }

    pub fn metadata(&self) -> &KernelMetadata {
        &self.metadata
    }

    pub fn execute(&self, args: &mut [Value]) -> anyhow::Result<Value> {
        (self.enter)(args)
    }
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kernel")
            .field("key", &self.key)
            .field("metadata", &self.metadata)
            .finish()
    }
}
