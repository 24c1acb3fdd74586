//! # Aspect Core
//!
//! Composable call aspects with declarative contract checking.
//!
//! ## Philosophy
//!
//! An aspect wraps a call target and presents the same external signature:
//! - Every wrapper invokes its inner target exactly once per call, so stacking
//!   never duplicates or skips the wrapped behavior
//! - Contract declarations are parsed at wrap time; malformed ones never reach a call
//! - Diagnostic output goes to an explicit sink, never to process-wide state
//!
//! ## Architecture
//!
//! ```text
//! caller
//!   │
//!   └──> outermost aspect ── pre-logic (timestamp, precondition check)
//!          │
//!          └──> inner aspect ... ──> CallTarget (the wrapped behavior)
//!          │
//!        post-logic (trace, postcondition check, elapsed time)
//!
//! Contract setup (wrap time)
//!   descriptor ──> DeclarationParser ──> Declaration ──> PredicateRegistry lookup
//! Contract check (call time)
//!   CallArgs + Declaration (+ return value) ──> route() ──> Predicate
//! ```
//!
//! ## Example
//!
//! ```rust
//! use aspect_core::{
//!     AspectKind, AspectStack, CallArgs, CallTarget, FnTarget, PredicateRegistry, Signature,
//!     Value,
//! };
//!
//! let registry = PredicateRegistry::new().with("is_positive", |args| {
//!     Ok(Value::Bool(args.arg(0).and_then(Value::as_int).is_some_and(|n| n > 0)))
//! });
//!
//! let square = FnTarget::new("square", Signature::fixed(1), |call| {
//!     let n = call.arg(0).and_then(Value::as_int).unwrap_or_default();
//!     Ok(Value::Int(n * n))
//! })
//! .with_descriptor("@Precondition is_positive positional(n) keywords() ()");
//!
//! let square = AspectStack::new(square)
//!     .with_registry(registry)
//!     .layer(AspectKind::Precondition)
//!     .unwrap()
//!     .build();
//!
//! assert_eq!(square.invoke(&CallArgs::positional([5])).unwrap(), Value::Int(25));
//! assert!(square.invoke(&CallArgs::positional([-1])).is_err());
//! ```

mod aspect;
mod config;
mod contract;
mod declaration;
mod diagnostic;
mod error;
mod literal;
mod predicate;
mod router;
mod sink;
mod target;
mod value;

pub use aspect::{describe_layers, AspectKind, AspectStack};
pub use config::{AspectConfig, AspectSettings};
pub use contract::{Postcondition, Precondition};
pub use declaration::{Declaration, DeclarationParser};
pub use diagnostic::{Memoize, TimedCall, Timestamp, Trace};
pub use error::{AspectError, Result};
pub use literal::{parse_literal, parse_literal_list};
pub use predicate::{Predicate, PredicateRegistry};
pub use router::route;
pub use sink::{LogCrateSink, LogSink, MemorySink, SharedSink, StdoutSink};
pub use target::{BoxedTarget, CallTarget, FnTarget, RecursiveHandle, SharedTarget, Signature};
pub use value::{CallArgs, Value};
