// Signature dispatch engine.
pub mod engine;
pub mod events;

pub use engine::{DispatchConfig, Dispatcher, WaitPolicy};
pub use events::{DispatchEvent, DispatchOutcome, EventSink, MemorySink};
