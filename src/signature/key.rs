use std::fmt;
use std::hash::{Hash, Hasher};

use ahash::AHasher;
use serde::Serialize;

/// Element type of an argument after value-independent classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Int64,
    Float64,
    Bool,
    /// Anything the classifier does not understand. Uncompilable unless the
    /// backend advertises support.
    Opaque,
}

impl ElementKind {
    fn symbol(self) -> &'static str {
        match self {
            ElementKind::Int64 => "i64",
            ElementKind::Float64 => "f64",
            ElementKind::Bool => "bool",
            ElementKind::Opaque => "opaque",
        }
    }
}

/// Classification of one argument position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ArgDescriptor {
    pub kind: ElementKind,
    /// Number of array dimensions; 0 for scalars.
    pub rank: usize,
    /// Whether the argument may be written in place.
    pub mutable: bool,
}

/// Unique key classifying one call shape.
///
/// Two calls produce equal signatures iff all argument descriptors are
/// pairwise equal; argument values never participate. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Signature {
    args: Vec<ArgDescriptor>,
}

impl Signature {
    pub fn new(args: Vec<ArgDescriptor>) -> Self {
        Self { args }
    }

    pub fn args(&self) -> &[ArgDescriptor] {
        &self.args
    }

    pub fn arity(&self) -> usize {
        self.args.len()
    }

    pub fn has_opaque(&self) -> bool {
        self.args.iter().any(|arg| arg.kind == ElementKind::Opaque)
    }

    /// Compact hash of the full descriptor sequence, for logs and events.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = AHasher::default();
        for arg in &self.args {
            arg.hash(&mut hasher);
        }
        hasher.finish()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if arg.mutable {
                write!(f, "mut ")?;
            }
            write!(f, "{}", arg.kind.symbol())?;
            if arg.rank > 0 {
                write!(f, "[{}]", arg.rank)?;
            }
        }
        write!(f, ")")
    }
}
