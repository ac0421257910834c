use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use super::{Kernel, KernelKey};
use crate::backend::CompileError;

/// Per-key entry state. Ready and Failed are terminal.
enum KernelState {
    Pending,
    Ready(Arc<Kernel>),
    Failed(CompileError),
}

/// Outcome of one atomic cache consultation.
pub enum Lookup<'a> {
    /// A kernel is already cached for this key.
    Hit(Arc<Kernel>),
    /// No entry existed; the caller now holds the only compile reservation.
    Reserved(Reservation<'a>),
    /// Another caller holds the reservation and compilation is in flight.
    InFlight,
    /// Compilation failed for this key before and is never retried.
    Uncompilable(CompileError),
}

/// How an in-flight entry resolved.
#[derive(Debug, Clone)]
pub enum Resolution {
    Ready(Arc<Kernel>),
    Failed(CompileError),
}

/// Cache of compiled kernels keyed by (function, signature).
///
/// Entries move `Pending -> Ready | Failed` exactly once and are never
/// removed. The entry table is the single shared mutable resource; every
/// reserve, publish, and fail is atomic with respect to the key, and a
/// publish happens-before any later lookup observing the hit.
pub struct KernelCache {
    entries: Mutex<HashMap<KernelKey, KernelState>>,
    resolved: Condvar,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl KernelCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            resolved: Condvar::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// The single atomic decision point for a key.
    ///
    /// If no entry exists, one is created in Pending state and the returned
    /// reservation is the only one that will ever be handed out for the key;
    /// concurrent callers observe `InFlight` instead.
    pub fn lookup_or_reserve(&self, key: &KernelKey) -> Lookup<'_> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(KernelState::Ready(kernel)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Lookup::Hit(Arc::clone(kernel))
            }
            Some(KernelState::Failed(error)) => Lookup::Uncompilable(error.clone()),
            Some(KernelState::Pending) => Lookup::InFlight,
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                entries.insert(key.clone(), KernelState::Pending);
                Lookup::Reserved(Reservation {
                    cache: self,
                    key: key.clone(),
                    done: false,
                })
            }
        }
    }

    /// Block until the entry for `key` resolves.
    ///
    /// Returns `None` if no entry exists, or if `timeout` elapses while the
    /// entry is still pending. A timeout never touches the reservation
    /// itself; the compile keeps running.
    pub fn wait(&self, key: &KernelKey, timeout: Option<Duration>) -> Option<Resolution> {
        let deadline = timeout.map(|limit| Instant::now() + limit);
        let mut entries = self.entries.lock();
        loop {
            match entries.get(key) {
                Some(KernelState::Ready(kernel)) => {
                    return Some(Resolution::Ready(Arc::clone(kernel)));
                }
                Some(KernelState::Failed(error)) => {
                    return Some(Resolution::Failed(error.clone()));
                }
                Some(KernelState::Pending) => {}
                None => return None,
            }
            match deadline {
                None => self.resolved.wait(&mut entries),
                Some(deadline) => {
                    if self.resolved.wait_until(&mut entries, deadline).timed_out() {
                        return match entries.get(key) {
                            Some(KernelState::Ready(kernel)) => {
                                Some(Resolution::Ready(Arc::clone(kernel)))
                            }
                            Some(KernelState::Failed(error)) => {
                                Some(Resolution::Failed(error.clone()))
                            }
                            _ => None,
                        };
                    }
                }
            }
        }
    }

    pub fn contains(&self, key: &KernelKey) -> bool {
        self.entries.lock().contains_key(key)
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock();
        let mut ready = 0;
        let mut failed = 0;
        let mut pending = 0;
        for state in entries.values() {
            match state {
                KernelState::Ready(_) => ready += 1,
                KernelState::Failed(_) => failed += 1,
                KernelState::Pending => pending += 1,
            }
        }
        CacheStats {
            entries: entries.len(),
            ready,
            failed,
            pending,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn resolve(&self, key: &KernelKey, state: KernelState) {
        let mut entries = self.entries.lock();
        entries.insert(key.clone(), state);
        drop(entries);
        self.resolved.notify_all();
    }
}

impl Default for KernelCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive right to compile one (function, signature) key.
///
/// Must be resolved with [`publish`](Reservation::publish) or
/// [`fail`](Reservation::fail). Dropping it unresolved marks the entry
/// failed so waiters blocked on the key are never stranded by a compile
/// that died.
pub struct Reservation<'a> {
    cache: &'a KernelCache,
    key: KernelKey,
    done: bool,
}

impl Reservation<'_> {
    pub fn key(&self) -> &KernelKey {
        &self.key
    }

    /// Transition the entry to Ready. All waiters observe the hit from now
    /// on. Consumes the reservation; at most one publish per key, ever.
    pub fn publish(mut self, kernel: Arc<Kernel>) -> Arc<Kernel> {
        self.done = true;
        debug!(key = %self.key, "kernel published");
        self.cache
            .resolve(&self.key, KernelState::Ready(Arc::clone(&kernel)));
        kernel
    }

    /// Transition the entry to Failed. Permanent: later lookups for the key
    /// short-circuit without retrying compilation.
    pub fn fail(mut self, error: CompileError) {
        self.done = true;
        debug!(key = %self.key, %error, "kernel compilation failed permanently");
        self.cache.resolve(&self.key, KernelState::Failed(error));
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.cache.resolve(
                &self.key,
                KernelState::Failed(CompileError::BackendFailure(
                    "compilation abandoned before publishing".into(),
                )),
            );
        }
    }
}

/// Snapshot of cache occupancy and traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub ready: usize,
    pub failed: usize,
    pub pending: usize,
    pub hits: u64,
    pub misses: u64,
}
