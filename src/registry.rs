use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::value::Value;

/// Unspecialized function body as supplied at registration.
pub type BodyFn = Arc<dyn Fn(&mut [Value]) -> anyhow::Result<Value> + Send + Sync>;

/// Stable identity of a registered function.
///
/// Identity is assigned at registration, not derived from the body:
/// registering the same closure twice yields two distinct identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FunctionId(u64);

impl FunctionId {
    pub fn index(self) -> u64 {
        self.0
    }
}

/// Declared shape of one parameter position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    /// Whether the argument buffer may be written in place.
    pub mutable: bool,
}

impl ParamSpec {
    pub const fn by_value() -> Self {
        Self { mutable: false }
    }

    pub const fn in_place() -> Self {
        Self { mutable: true }
    }
}

/// What happens when a signature cannot be compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpecializationMode {
    /// Serve uncompilable signatures through the unspecialized body.
    #[default]
    Permissive,
    /// Surface uncompilable signatures as a hard error.
    Strict,
}

/// A registered function definition. Immutable once created.
pub struct FunctionDef {
    id: FunctionId,
    name: String,
    params: Vec<ParamSpec>,
    mode: SpecializationMode,
    body: BodyFn,
}

impl FunctionDef {
    pub fn id(&self) -> FunctionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn mode(&self) -> SpecializationMode {
        self.mode
    }

    pub fn body(&self) -> &BodyFn {
        &self.body
    }

    /// Run the unspecialized body directly.
    pub fn call_direct(&self, args: &mut [Value]) -> anyhow::Result<Value> {
        (self.body)(args)
    }
}

impl fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDef")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("arity", &self.params.len())
            .field("mode", &self.mode)
            .finish()
    }
}

/// Process-lifetime registry of function definitions.
///
/// Functions are registered once at startup and read on every call; the
/// registry is passed to the dispatcher explicitly rather than living in
/// global state.
pub struct FunctionRegistry {
    functions: RwLock<HashMap<FunctionId, Arc<FunctionDef>>>,
    next_id: AtomicU64,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self {
            functions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn register<F>(
        &self,
        name: impl Into<String>,
        params: Vec<ParamSpec>,
        mode: SpecializationMode,
        body: F,
    ) -> FunctionId
    where
        F: Fn(&mut [Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        let id = FunctionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let def = Arc::new(FunctionDef {
            id,
            name: name.into(),
            params,
            mode,
            body: Arc::new(body),
        });
        self.functions.write().insert(id, def);
        id
    }

    pub fn get(&self, id: FunctionId) -> Option<Arc<FunctionDef>> {
        self.functions.read().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.functions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.read().is_empty()
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
