// Call-shape classification.
pub mod classify;
pub mod key;

pub use classify::{classify, ClassifyError};
pub use key::{ArgDescriptor, ElementKind, Signature};
