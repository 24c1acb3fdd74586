//! Demo functions wrapped in the aspect stacks they showcase.

use aspect_core::{
    describe_layers, AspectConfig, AspectKind, AspectStack, CallArgs, FnTarget, LogSink,
    PredicateRegistry, RecursiveHandle, Result, SharedSink, SharedTarget, Signature, Value,
};
use clap::ValueEnum;
use serde::Serialize;

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum DemoName {
    SquarePre,
    SquarePost,
    Square,
    Square2,
    Square3,
    Square4,
    Square5,
    Fibonacci,
}

/// Static description of a demo
#[derive(Debug, Clone, Serialize)]
pub struct DemoInfo {
    pub name: &'static str,
    pub stack: String,
    pub default_args: Vec<i64>,
    pub default_keywords: Vec<(String, Value)>,
}

impl DemoName {
    pub const ALL: [Self; 8] = [
        Self::SquarePre,
        Self::SquarePost,
        Self::Square,
        Self::Square2,
        Self::Square3,
        Self::Square4,
        Self::Square5,
        Self::Fibonacci,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SquarePre => "square-pre",
            Self::SquarePost => "square-post",
            Self::Square => "square",
            Self::Square2 => "square2",
            Self::Square3 => "square3",
            Self::Square4 => "square4",
            Self::Square5 => "square5",
            Self::Fibonacci => "fibonacci",
        }
    }

    /// Function name seen by the aspects
    const fn function_name(self) -> &'static str {
        match self {
            Self::SquarePre => "square_pre",
            Self::SquarePost => "square_post",
            Self::Square => "square",
            Self::Square2 => "square2",
            Self::Square3 => "square3",
            Self::Square4 => "square4",
            Self::Square5 => "square5",
            Self::Fibonacci => "fibonacci",
        }
    }

    /// Layers, innermost first
    pub const fn layers(self) -> &'static [AspectKind] {
        match self {
            Self::SquarePre => &[AspectKind::Precondition],
            Self::SquarePost => &[AspectKind::Postcondition],
            Self::Square => &[AspectKind::Timestamp],
            Self::Square2 => &[AspectKind::TimedCall],
            Self::Square3 => &[AspectKind::Trace],
            Self::Square4 => &[AspectKind::Trace, AspectKind::Timestamp],
            Self::Square5 => &[
                AspectKind::Trace,
                AspectKind::Timestamp,
                AspectKind::TimedCall,
            ],
            Self::Fibonacci => &[AspectKind::Memoize],
        }
    }

    const fn descriptor(self) -> Option<&'static str> {
        match self {
            Self::SquarePre => {
                Some("@Precondition is_positive positional(n) keywords('a') (100, 200)")
            }
            Self::SquarePost => Some(
                "@Postcondition is_return_le_upper positional(n) keywords('a') (100, 200) return",
            ),
            _ => None,
        }
    }

    pub const fn default_args(self) -> &'static [i64] {
        match self {
            Self::SquarePre => &[5],
            Self::SquarePost => &[11],
            Self::Square5 => &[12],
            Self::Square4 => &[5],
            Self::Fibonacci => &[15],
            _ => &[10],
        }
    }

    pub fn default_keywords(self) -> Vec<(String, Value)> {
        match self {
            Self::SquarePre | Self::SquarePost => vec![("a".to_string(), Value::Int(10))],
            _ => Vec::new(),
        }
    }

    pub fn info(self) -> DemoInfo {
        DemoInfo {
            name: self.as_str(),
            stack: describe_layers(self.function_name(), self.layers()),
            default_args: self.default_args().to_vec(),
            default_keywords: self.default_keywords(),
        }
    }

    /// Build the wrapped demo function
    pub fn build(self, config: &AspectConfig) -> Result<SharedTarget> {
        let handle = (self == Self::Fibonacci).then(RecursiveHandle::new);
        let stack = AspectStack::new(self.target(config.sink.clone(), handle.clone()))
            .with_config(config.clone())
            .with_registry(predicates())
            .layers(self.layers().iter().copied())?;

        Ok(match handle {
            Some(handle) => stack.build_recursive(&handle),
            None => stack.build(),
        })
    }

    fn target(self, sink: SharedSink, recurse: Option<RecursiveHandle>) -> FnTarget {
        let name = self.function_name();
        let target = match (self, recurse) {
            (Self::Fibonacci, Some(handle)) => {
                FnTarget::new(name, Signature::fixed(1), move |call| {
                    sink.write("in fib");
                    let n = int_arg(call, 0);
                    if n < 2 {
                        return Ok(Value::Int(n));
                    }
                    let a = int_result(handle.invoke(name, &CallArgs::positional([n - 1]))?)?;
                    let b = int_result(handle.invoke(name, &CallArgs::positional([n - 2]))?)?;
                    a.checked_add(b).map(Value::Int).ok_or_else(|| {
                        anyhow::anyhow!("fibonacci({n}) overflows a 64-bit integer").into()
                    })
                })
            }
            _ => {
                let signature = if self.descriptor().is_some() {
                    Signature::fixed(1).with_keywords()
                } else {
                    Signature::fixed(1)
                };
                let banner = format!("in {}", name.replace('_', " "));
                FnTarget::new(name, signature, move |call| {
                    sink.write(&banner);
                    let n = int_arg(call, 0);
                    n.checked_mul(n).map(Value::Int).ok_or_else(|| {
                        anyhow::anyhow!("{n} squared overflows a 64-bit integer").into()
                    })
                })
            }
        };

        match self.descriptor() {
            Some(descriptor) => target.with_descriptor(descriptor),
            None => target,
        }
    }
}

fn int_arg(call: &CallArgs, index: usize) -> i64 {
    call.arg(index).and_then(Value::as_int).unwrap_or_default()
}

fn int_result(value: Value) -> Result<i64> {
    value
        .as_int()
        .ok_or_else(|| {
            anyhow::anyhow!("expected an integer result, got {} {value}", value.type_name()).into()
        })
}

/// Predicates referenced by the demo declarations
pub fn predicates() -> PredicateRegistry {
    PredicateRegistry::new()
        .with("is_positive", |args| {
            log::debug!("is_positive({})", args.render());
            Ok(Value::Bool(
                args.arg(0).and_then(Value::as_f64).is_some_and(|n| n > 0.0),
            ))
        })
        .with("is_return_le_upper", |args| {
            // (forwarded..., upper, return value)
            log::debug!("is_return_le_upper({})", args.render());
            let values: Vec<f64> = args.positional.iter().filter_map(Value::as_f64).collect();
            let [.., upper, ret] = values.as_slice() else {
                return Ok(Value::Bool(false));
            };
            Ok(Value::Bool(ret <= upper))
        })
}
