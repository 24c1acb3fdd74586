use aspect_core::{
    AspectConfig, AspectKind, AspectStack, CallArgs, CallTarget, FnTarget, LogSink, MemorySink,
    PredicateRegistry, RecursiveHandle, Signature, Value,
};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const DESCRIPTOR: &str = "
    @Precondition always positional(n) keywords() ()
    @Postcondition always positional() keywords() (1,) return
";

fn counted_square(calls: &Arc<AtomicUsize>, sink: Option<MemorySink>) -> FnTarget {
    let calls = Arc::clone(calls);
    FnTarget::new("square", Signature::fixed(1), move |call| {
        calls.fetch_add(1, Ordering::SeqCst);
        if let Some(sink) = &sink {
            sink.write("in square");
        }
        let n = call.arg(0).and_then(Value::as_int).unwrap_or_default();
        Ok(Value::Int(n * n))
    })
    .with_descriptor(DESCRIPTOR)
}

fn always_registry() -> PredicateRegistry {
    PredicateRegistry::new().with("always", |_| Ok(Value::Bool(true)))
}

#[test]
fn nested_diagnostics_log_in_nesting_order() {
    let sink = MemorySink::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let square5 = AspectStack::new(counted_square(&calls, Some(sink.clone())))
        .with_config(AspectConfig::with_sink(Arc::new(sink.clone())))
        .layers([AspectKind::Trace, AspectKind::Timestamp, AspectKind::TimedCall])
        .unwrap()
        .build();

    let value = square5.invoke(&CallArgs::positional([12])).unwrap();
    assert_eq!(value, Value::Int(144));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let lines = sink.lines();
    assert_eq!(lines.len(), 4, "{lines:?}");
    assert!(lines[0].chars().next().is_some_and(|c| c.is_ascii_digit()), "timestamp first: {lines:?}");
    assert_eq!(lines[1], "in square");
    assert_eq!(lines[2], "Function: square\tArgs: 12\tReturn: 144");
    assert!(lines[3].starts_with("Call elapsed time: "));
}

#[test]
fn memoized_fibonacci_recurses_through_cache() {
    let calls = Arc::new(AtomicUsize::new(0));
    let handle = RecursiveHandle::new();
    let body_calls = Arc::clone(&calls);
    let body_handle = handle.clone();
    let fib = FnTarget::new("fibonacci", Signature::fixed(1), move |call| {
        body_calls.fetch_add(1, Ordering::SeqCst);
        let n = call.arg(0).and_then(Value::as_int).unwrap_or_default();
        if n < 2 {
            return Ok(Value::Int(n));
        }
        let a = body_handle.invoke("fibonacci", &CallArgs::positional([n - 1]))?;
        let b = body_handle.invoke("fibonacci", &CallArgs::positional([n - 2]))?;
        Ok(Value::Int(
            a.as_int().unwrap_or_default() + b.as_int().unwrap_or_default(),
        ))
    });

    let fib = AspectStack::new(fib)
        .layer(AspectKind::Memoize)
        .unwrap()
        .build_recursive(&handle);

    assert_eq!(fib.invoke(&CallArgs::positional([10])).unwrap(), Value::Int(55));
    assert_eq!(calls.load(Ordering::SeqCst), 11, "one body run per distinct n");

    assert_eq!(fib.invoke(&CallArgs::positional([10])).unwrap(), Value::Int(55));
    assert_eq!(calls.load(Ordering::SeqCst), 11, "second call is a pure cache hit");
}

#[test]
fn inner_errors_pass_through_every_layer() {
    let sink = MemorySink::new();
    let failing = FnTarget::new("fails", Signature::variadic(), |_| {
        Err(anyhow::anyhow!("inner failure").into())
    });
    let wrapped = AspectStack::new(failing)
        .with_config(AspectConfig::with_sink(Arc::new(sink.clone())))
        .layers([
            AspectKind::Memoize,
            AspectKind::Trace,
            AspectKind::Timestamp,
            AspectKind::TimedCall,
        ])
        .unwrap()
        .build();

    let err = wrapped.invoke(&CallArgs::positional([1])).unwrap_err();
    assert_eq!(err.to_string(), "inner failure");
    let lines = sink.lines();
    assert!(lines.iter().any(|l| l.ends_with("Raised: inner failure")));
    assert!(lines.last().is_some_and(|l| l.starts_with("Call elapsed time: ")));
}

proptest! {
    #[test]
    fn proptest_any_stack_invokes_target_exactly_once(
        kinds in prop::collection::vec(prop::sample::select(AspectKind::ALL.to_vec()), 0..8),
        n in -50i64..50,
    ) {
        let calls = Arc::new(AtomicUsize::new(0));
        let sink = MemorySink::new();
        let wrapped = AspectStack::new(counted_square(&calls, None))
            .with_config(AspectConfig::with_sink(Arc::new(sink)))
            .with_registry(always_registry())
            .layers(kinds)
            .unwrap()
            .build();

        let value = wrapped.invoke(&CallArgs::positional([n])).unwrap();
        prop_assert_eq!(value, Value::Int(n * n));
        prop_assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
