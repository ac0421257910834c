use thiserror::Error;

use super::{ArgDescriptor, Signature};
use crate::registry::FunctionDef;
use crate::value::Value;

/// Classification failure. A caller bug, never cached.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    #[error("function `{function}` expects {expected} arguments, got {actual}")]
    ArityMismatch {
        function: String,
        expected: usize,
        actual: usize,
    },
}

/// Derive the call signature from the runtime arguments.
///
/// Deterministic and side-effect-free: identical argument shapes and types
/// always yield an equal signature regardless of argument values. The
/// `mutable` flag comes from the declared parameter, kind and rank from the
/// value itself.
pub fn classify(def: &FunctionDef, args: &[Value]) -> Result<Signature, ClassifyError> {
    if args.len() != def.arity() {
        return Err(ClassifyError::ArityMismatch {
            function: def.name().to_string(),
            expected: def.arity(),
            actual: args.len(),
        });
    }

    let descriptors = args
        .iter()
        .zip(def.params())
        .map(|(value, param)| ArgDescriptor {
            kind: value.element_kind(),
            rank: value.rank(),
            mutable: param.mutable,
        })
        .collect();

    Ok(Signature::new(descriptors))
}
