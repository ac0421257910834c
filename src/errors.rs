use thiserror::Error;

use crate::backend::CompileError;
use crate::registry::FunctionId;
use crate::signature::ClassifyError;

/// Errors surfaced by the dispatcher.
///
/// Compilation problems appear here only for strict functions; permissive
/// functions degrade to direct execution instead. Execution errors pass
/// through unchanged.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no function registered under id {}", .0.index())]
    UnknownFunction(FunctionId),

    #[error(transparent)]
    Classify(#[from] ClassifyError),

    #[error("function `{function}` cannot be specialized")]
    Uncompilable {
        function: String,
        #[source]
        source: CompileError,
    },

    #[error(transparent)]
    Execution(anyhow::Error),
}
