use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

use crate::registry::FunctionId;
use crate::signature::Signature;

/// How a single dispatch was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// Served from a cached kernel.
    Hit,
    /// Compiled on this call, then served from the new kernel.
    Compiled,
    /// Served by the unspecialized body.
    Fallback,
    /// The call failed, in compilation (strict mode) or execution.
    Error,
}

/// Structured record of one dispatcher invocation.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchEvent {
    pub function: FunctionId,
    pub function_name: String,
    pub signature: Signature,
    pub outcome: DispatchOutcome,
    pub compile_time: Option<Duration>,
    pub execute_time: Duration,
}

/// Receives one event per dispatcher invocation.
pub trait EventSink: Send + Sync {
    fn record(&self, event: &DispatchEvent);
}

/// Sink that retains every event, for tests and diagnostics.
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<DispatchEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DispatchEvent> {
        self.events.lock().clone()
    }

    pub fn outcomes(&self) -> Vec<DispatchOutcome> {
        self.events.lock().iter().map(|event| event.outcome).collect()
    }
}

impl EventSink for MemorySink {
    fn record(&self, event: &DispatchEvent) {
        self.events.lock().push(event.clone());
    }
}
