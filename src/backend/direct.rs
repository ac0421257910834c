use std::sync::Arc;

use super::{CompileError, KernelBackend, KernelFn};
use crate::registry::FunctionDef;
use crate::signature::Signature;

/// Reference backend whose kernels wrap the unspecialized body.
///
/// Produces no speedup; it exists so the dispatch and caching machinery can
/// run without a code generator attached.
#[derive(Debug, Default)]
pub struct DirectBackend;

impl DirectBackend {
    pub fn new() -> Self {
        Self
    }
}

impl KernelBackend for DirectBackend {
    fn name(&self) -> &str {
        "direct"
    }

    fn compile(&self, def: &FunctionDef, signature: &Signature) -> Result<KernelFn, CompileError> {
        if signature.has_opaque() {
            return Err(CompileError::UnsupportedSignature {
                signature: signature.clone(),
                reason: "opaque arguments cannot be specialized".into(),
            });
        }
        let body = Arc::clone(def.body());
        Ok(Box::new(move |args| body(args)))
    }
}
