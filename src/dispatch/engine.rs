use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use super::events::{DispatchEvent, DispatchOutcome, EventSink};
use crate::backend::{CompileError, KernelBackend};
use crate::cache::{
    CacheStats, Kernel, KernelCache, KernelKey, KernelMetadata, Lookup, Resolution,
};
use crate::errors::DispatchError;
use crate::registry::{FunctionDef, FunctionId, FunctionRegistry, SpecializationMode};
use crate::signature::{classify, Signature};
use crate::value::Value;

/// What a caller does when another caller holds the compile reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitPolicy {
    /// Block until the in-flight compilation resolves.
    #[default]
    Block,
    /// Execute the unspecialized body while compilation completes.
    Fallback,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchConfig {
    pub wait_policy: WaitPolicy,
    /// Bounds how long a blocked caller defers before falling back to
    /// direct execution. Never cancels the in-flight compilation.
    pub wait_timeout: Option<Duration>,
}

enum Action {
    Execute(Arc<Kernel>, DispatchOutcome),
    Direct,
}

/// The entry point consulted on every call.
///
/// Classifies the call signature, consults the kernel cache, compiles on
/// miss, executes, and falls back to direct execution when compilation is
/// disallowed or failed. Compilation is purely a performance transform: a
/// call served by fallback returns the same result as one served by a
/// kernel.
pub struct Dispatcher {
    registry: Arc<FunctionRegistry>,
    backend: Arc<dyn KernelBackend>,
    cache: KernelCache,
    config: DispatchConfig,
    sink: Option<Arc<dyn EventSink>>,
}

impl Dispatcher {
    pub fn new(registry: Arc<FunctionRegistry>, backend: Arc<dyn KernelBackend>) -> Self {
        Self::with_config(registry, backend, DispatchConfig::default())
    }

    pub fn with_config(
        registry: Arc<FunctionRegistry>,
        backend: Arc<dyn KernelBackend>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            registry,
            backend,
            cache: KernelCache::new(),
            config,
            sink: None,
        }
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn registry(&self) -> &Arc<FunctionRegistry> {
        &self.registry
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Invoke a registered function with the given arguments.
    ///
    /// Arguments are owned by the caller; positions declared mutable may be
    /// written in place. Errors raised by the function body propagate
    /// unchanged.
    pub fn invoke(
        &self,
        function: FunctionId,
        args: &mut [Value],
    ) -> Result<Value, DispatchError> {
        let def = self
            .registry
            .get(function)
            .ok_or(DispatchError::UnknownFunction(function))?;
        let signature = classify(&def, args)?;
        let key = KernelKey::new(function, signature.clone());

        let mut compile_time = None;
        let plan = self.plan(&def, &key, &mut compile_time);

        let (result, outcome, execute_time) = match plan {
            Ok(Action::Execute(kernel, outcome)) => {
                let started = Instant::now();
                let result = kernel.execute(args).map_err(DispatchError::Execution);
                let execute_time = started.elapsed();
                let outcome = if result.is_err() {
                    DispatchOutcome::Error
                } else {
                    outcome
                };
                (result, outcome, execute_time)
            }
            Ok(Action::Direct) => {
                let started = Instant::now();
                let result = def.call_direct(args).map_err(DispatchError::Execution);
                let execute_time = started.elapsed();
                let outcome = if result.is_err() {
                    DispatchOutcome::Error
                } else {
                    DispatchOutcome::Fallback
                };
                (result, outcome, execute_time)
            }
            Err(error) => (Err(error), DispatchOutcome::Error, Duration::ZERO),
        };

        self.emit(&def, &signature, outcome, compile_time, execute_time);
        result
    }

    fn plan(
        &self,
        def: &FunctionDef,
        key: &KernelKey,
        compile_time: &mut Option<Duration>,
    ) -> Result<Action, DispatchError> {
        match self.cache.lookup_or_reserve(key) {
            Lookup::Hit(kernel) => Ok(Action::Execute(kernel, DispatchOutcome::Hit)),
            Lookup::Uncompilable(error) => self.rejected(def, error),
            Lookup::Reserved(reservation) => {
                let started = Instant::now();
                let compiled = if key.signature.has_opaque() && !self.backend.supports_opaque() {
                    Err(CompileError::UnsupportedSignature {
                        signature: key.signature.clone(),
                        reason: format!(
                            "backend `{}` does not support opaque arguments",
                            self.backend.name()
                        ),
                    })
                } else {
                    self.backend.compile(def, &key.signature)
                };
                match compiled {
                    Ok(enter) => {
                        let elapsed = started.elapsed();
                        *compile_time = Some(elapsed);
                        debug!(
                            function = %def.name(),
                            signature = %key.signature,
                            backend = %self.backend.name(),
                            compile_us = elapsed.as_micros() as u64,
                            "kernel compiled"
                        );
                        let kernel = Arc::new(Kernel::new(
                            key.clone(),
                            enter,
                            KernelMetadata::new(elapsed),
                        ));
                        Ok(Action::Execute(
                            reservation.publish(kernel),
                            DispatchOutcome::Compiled,
                        ))
                    }
                    Err(error) => {
                        reservation.fail(error.clone());
                        self.rejected(def, error)
                    }
                }
            }
            Lookup::InFlight => match self.config.wait_policy {
                WaitPolicy::Fallback => Ok(Action::Direct),
                WaitPolicy::Block => match self.cache.wait(key, self.config.wait_timeout) {
                    Some(Resolution::Ready(kernel)) => {
                        Ok(Action::Execute(kernel, DispatchOutcome::Hit))
                    }
                    Some(Resolution::Failed(error)) => self.rejected(def, error),
                    None => Ok(Action::Direct),
                },
            },
        }
    }

    /// Route a compilation failure per the function's registration mode.
    fn rejected(&self, def: &FunctionDef, error: CompileError) -> Result<Action, DispatchError> {
        match def.mode() {
            SpecializationMode::Permissive => Ok(Action::Direct),
            SpecializationMode::Strict => Err(DispatchError::Uncompilable {
                function: def.name().to_string(),
                source: error,
            }),
        }
    }

    fn emit(
        &self,
        def: &FunctionDef,
        signature: &Signature,
        outcome: DispatchOutcome,
        compile_time: Option<Duration>,
        execute_time: Duration,
    ) {
        debug!(
            function = %def.name(),
            signature = %signature,
            outcome = ?outcome,
            execute_us = execute_time.as_micros() as u64,
            "dispatch"
        );
        if let Some(sink) = &self.sink {
            sink.record(&DispatchEvent {
                function: def.id(),
                function_name: def.name().to_string(),
                signature: signature.clone(),
                outcome,
                compile_time,
                execute_time,
            });
        }
    }
}
