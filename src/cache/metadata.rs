use std::time::{Duration, Instant};

/// Metadata for cached kernels.
#[derive(Debug, Clone)]
pub struct KernelMetadata {
    pub created_at: Instant,
    pub compile_time: Duration,
}

impl KernelMetadata {
    pub fn new(compile_time: Duration) -> Self {
        Self {
            created_at: Instant::now(),
            compile_time,
        }
    }
}

impl Default for KernelMetadata {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}
