use std::any::Any;
use std::fmt;
use std::sync::Arc;

use anyhow::{bail, ensure, Result};

use crate::signature::ElementKind;

/// Dense row-major buffer with an explicit shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayBuf<T> {
    data: Vec<T>,
    shape: Vec<usize>,
}

impl<T> ArrayBuf<T> {
    pub fn new(data: Vec<T>, shape: Vec<usize>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        ensure!(
            data.len() == expected,
            "buffer holds {} elements but shape {:?} needs {}",
            data.len(),
            shape,
            expected
        );
        Ok(Self { data, shape })
    }

    /// Rank-1 buffer over an existing vector.
    pub fn from_vec(data: Vec<T>) -> Self {
        let shape = vec![data.len()];
        Self { data, shape }
    }

    /// Rank-2 buffer from equally sized rows.
    pub fn from_rows(rows: Vec<Vec<T>>) -> Result<Self> {
        let cols = rows.first().map(Vec::len).unwrap_or(0);
        ensure!(
            rows.iter().all(|row| row.len() == cols),
            "rows must all have the same length"
        );
        let shape = vec![rows.len(), cols];
        let data = rows.into_iter().flatten().collect();
        Ok(Self { data, shape })
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Row-major element access.
    pub fn at(&self, index: &[usize]) -> Option<&T> {
        if index.len() != self.shape.len() {
            return None;
        }
        let mut flat = 0;
        for (&pos, &dim) in index.iter().zip(&self.shape) {
            if pos >= dim {
                return None;
            }
            flat = flat * dim + pos;
        }
        self.data.get(flat)
    }
}

/// A runtime argument or return value.
///
/// Scalars have rank 0; arrays carry their shape. `Opaque` covers values the
/// classifier does not understand and always classifies as rank 0.
#[derive(Clone)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    IntArray(ArrayBuf<i64>),
    FloatArray(ArrayBuf<f64>),
    BoolArray(ArrayBuf<bool>),
    Opaque(Arc<dyn Any + Send + Sync>),
}

impl Value {
    pub fn element_kind(&self) -> ElementKind {
        match self {
            Value::Int(_) | Value::IntArray(_) => ElementKind::Int64,
            Value::Float(_) | Value::FloatArray(_) => ElementKind::Float64,
            Value::Bool(_) | Value::BoolArray(_) => ElementKind::Bool,
            Value::Opaque(_) => ElementKind::Opaque,
        }
    }

    pub fn rank(&self) -> usize {
        match self {
            Value::Int(_) | Value::Float(_) | Value::Bool(_) | Value::Opaque(_) => 0,
            Value::IntArray(buf) => buf.rank(),
            Value::FloatArray(buf) => buf.rank(),
            Value::BoolArray(buf) => buf.rank(),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "i64",
            Value::Float(_) => "f64",
            Value::Bool(_) => "bool",
            Value::IntArray(_) => "i64 array",
            Value::FloatArray(_) => "f64 array",
            Value::BoolArray(_) => "bool array",
            Value::Opaque(_) => "opaque",
        }
    }

    pub fn as_int(&self) -> Result<i64> {
        match self {
            Value::Int(v) => Ok(*v),
            other => bail!("expected i64 scalar, got {}", other.kind_name()),
        }
    }

    pub fn as_float(&self) -> Result<f64> {
        match self {
            Value::Float(v) => Ok(*v),
            other => bail!("expected f64 scalar, got {}", other.kind_name()),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(v) => Ok(*v),
            other => bail!("expected bool scalar, got {}", other.kind_name()),
        }
    }

    pub fn as_int_array(&self) -> Result<&ArrayBuf<i64>> {
        match self {
            Value::IntArray(buf) => Ok(buf),
            other => bail!("expected i64 array, got {}", other.kind_name()),
        }
    }

    pub fn as_float_array(&self) -> Result<&ArrayBuf<f64>> {
        match self {
            Value::FloatArray(buf) => Ok(buf),
            other => bail!("expected f64 array, got {}", other.kind_name()),
        }
    }

    pub fn as_float_array_mut(&mut self) -> Result<&mut ArrayBuf<f64>> {
        match self {
            Value::FloatArray(buf) => Ok(buf),
            other => bail!("expected f64 array, got {}", other.kind_name()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "Int({v})"),
            Value::Float(v) => write!(f, "Float({v})"),
            Value::Bool(v) => write!(f, "Bool({v})"),
            Value::IntArray(buf) => write!(f, "IntArray(shape={:?})", buf.shape()),
            Value::FloatArray(buf) => write!(f, "FloatArray(shape={:?})", buf.shape()),
            Value::BoolArray(buf) => write!(f, "BoolArray(shape={:?})", buf.shape()),
            Value::Opaque(_) => write!(f, "Opaque"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::IntArray(a), Value::IntArray(b)) => a == b,
            (Value::FloatArray(a), Value::FloatArray(b)) => a == b,
            (Value::BoolArray(a), Value::BoolArray(b)) => a == b,
            (Value::Opaque(a), Value::Opaque(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}
