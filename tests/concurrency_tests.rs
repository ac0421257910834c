use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use jitcache::{
    CompileError, DirectBackend, DispatchConfig, DispatchOutcome, Dispatcher, FunctionDef,
    FunctionRegistry, KernelBackend, KernelFn, MemorySink, ParamSpec, Signature,
    SpecializationMode, Value, WaitPolicy,
};

/// Backend that counts compilations and takes a while doing them.
struct SlowBackend {
    delay: Duration,
    compiles: AtomicUsize,
}

impl SlowBackend {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            compiles: AtomicUsize::new(0),
        }
    }

    fn compile_count(&self) -> usize {
        self.compiles.load(Ordering::SeqCst)
    }
}

impl KernelBackend for SlowBackend {
    fn name(&self) -> &str {
        "slow"
    }

    fn compile(&self, def: &FunctionDef, signature: &Signature) -> Result<KernelFn, CompileError> {
        self.compiles.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.delay);
        DirectBackend::new().compile(def, signature)
    }
}

fn square_registry() -> (Arc<FunctionRegistry>, jitcache::FunctionId) {
    let registry = Arc::new(FunctionRegistry::new());
    let id = registry.register(
        "square",
        vec![ParamSpec::by_value()],
        SpecializationMode::Permissive,
        |args| {
            let v = args[0].as_int()?;
            Ok(Value::Int(v * v))
        },
    );
    (registry, id)
}

#[test]
fn concurrent_first_callers_compile_exactly_once() {
    let (registry, square) = square_registry();
    let backend = Arc::new(SlowBackend::new(Duration::from_millis(50)));
    let sink = Arc::new(MemorySink::new());
    let dispatcher = Dispatcher::new(registry, backend.clone()).with_event_sink(sink.clone());

    let workers = 8;
    let barrier = Barrier::new(workers);
    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| {
                barrier.wait();
                let result = dispatcher
                    .invoke(square, &mut [Value::Int(12)])
                    .expect("dispatch");
                assert_eq!(result, Value::Int(144));
            });
        }
    });

    assert_eq!(backend.compile_count(), 1);

    let outcomes = sink.outcomes();
    assert_eq!(outcomes.len(), workers);
    let compiled = outcomes
        .iter()
        .filter(|outcome| **outcome == DispatchOutcome::Compiled)
        .count();
    let hits = outcomes
        .iter()
        .filter(|outcome| **outcome == DispatchOutcome::Hit)
        .count();
    assert_eq!(compiled, 1);
    assert_eq!(hits, workers - 1);

    let stats = dispatcher.cache_stats();
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.ready, 1);
}

#[test]
fn fallback_policy_never_blocks_waiting_callers() {
    let (registry, square) = square_registry();
    let backend = Arc::new(SlowBackend::new(Duration::from_millis(100)));
    let dispatcher = Dispatcher::with_config(
        registry,
        backend.clone(),
        DispatchConfig {
            wait_policy: WaitPolicy::Fallback,
            wait_timeout: None,
        },
    );

    let workers = 6;
    let barrier = Barrier::new(workers);
    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| {
                barrier.wait();
                let result = dispatcher
                    .invoke(square, &mut [Value::Int(9)])
                    .expect("dispatch");
                assert_eq!(result, Value::Int(81));
            });
        }
    });

    // Only the reservation holder ever ran the backend; everyone else was
    // served without waiting on it.
    assert_eq!(backend.compile_count(), 1);
    assert_eq!(dispatcher.cache_stats().ready, 1);
}

#[test]
fn wait_timeout_bounds_the_deferral_not_the_compile() {
    let (registry, square) = square_registry();
    let backend = Arc::new(SlowBackend::new(Duration::from_millis(150)));
    let sink = Arc::new(MemorySink::new());
    let dispatcher = Dispatcher::with_config(
        registry,
        backend.clone(),
        DispatchConfig {
            wait_policy: WaitPolicy::Block,
            wait_timeout: Some(Duration::from_millis(10)),
        },
    )
    .with_event_sink(sink.clone());

    let barrier = Barrier::new(2);
    thread::scope(|scope| {
        for _ in 0..2 {
            scope.spawn(|| {
                barrier.wait();
                let result = dispatcher
                    .invoke(square, &mut [Value::Int(5)])
                    .expect("dispatch");
                assert_eq!(result, Value::Int(25));
            });
        }
    });

    // One caller compiled; the other timed out waiting and fell back, which
    // must not have cancelled the in-flight compilation.
    assert_eq!(backend.compile_count(), 1);
    let outcomes = sink.outcomes();
    assert!(outcomes.contains(&DispatchOutcome::Compiled));
    assert!(outcomes.contains(&DispatchOutcome::Fallback));
    assert_eq!(dispatcher.cache_stats().ready, 1);

    // And the published kernel serves later callers.
    let result = dispatcher
        .invoke(square, &mut [Value::Int(6)])
        .expect("dispatch");
    assert_eq!(result, Value::Int(36));
    assert_eq!(sink.outcomes().last(), Some(&DispatchOutcome::Hit));
}

#[test]
fn concurrent_callers_share_one_sticky_failure() {
    struct FailingBackend {
        attempts: AtomicUsize,
    }

    impl KernelBackend for FailingBackend {
        fn name(&self) -> &str {
            "failing"
        }

        fn compile(
            &self,
            _def: &FunctionDef,
            signature: &Signature,
        ) -> Result<KernelFn, CompileError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(30));
            Err(CompileError::UnsupportedSignature {
                signature: signature.clone(),
                reason: "shape not supported".into(),
            })
        }
    }

    let (registry, square) = square_registry();
    let backend = Arc::new(FailingBackend {
        attempts: AtomicUsize::new(0),
    });
    let dispatcher = Dispatcher::new(registry, backend.clone());

    let workers = 4;
    let barrier = Barrier::new(workers);
    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| {
                barrier.wait();
                // Permissive mode: everyone still gets the right answer.
                let result = dispatcher
                    .invoke(square, &mut [Value::Int(3)])
                    .expect("dispatch");
                assert_eq!(result, Value::Int(9));
            });
        }
    });

    assert_eq!(backend.attempts.load(Ordering::SeqCst), 1);
    assert_eq!(dispatcher.cache_stats().failed, 1);
}
