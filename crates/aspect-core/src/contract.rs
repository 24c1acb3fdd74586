//! Precondition and postcondition aspects.
//!
//! Both parse their declaration from the wrapped target's descriptor at wrap
//! time, resolve the named predicate from a [`PredicateRegistry`], and route
//! call arguments to it with [`route`].

use crate::aspect::forward_target_identity;
use crate::config::AspectConfig;
use crate::declaration::{Declaration, DeclarationParser};
use crate::error::{AspectError, Result};
use crate::predicate::{Predicate, PredicateRegistry};
use crate::router::route;
use crate::target::{BoxedTarget, CallTarget, Signature};
use crate::value::{CallArgs, Value};

/// Checks a predicate before the inner call; the inner target never runs on failure
///
/// A violation reports the forwarded caller positionals only.
pub struct Precondition {
    inner: BoxedTarget,
    declaration: Declaration,
    predicate: Predicate,
}

impl Precondition {
    pub fn wrap(
        target: impl CallTarget + 'static,
        registry: &PredicateRegistry,
        config: &AspectConfig,
    ) -> Result<Self> {
        let marker = config.settings.precondition_marker.as_str();
        let (declaration, predicate) = bind_contract(&target, marker, registry)?;
        if declaration.include_return_value {
            return Err(AspectError::configuration(format!(
                "`{marker}` for `{}` cannot use the return flag",
                target.name()
            )));
        }
        Ok(Self {
            inner: Box::new(target),
            declaration,
            predicate,
        })
    }

    #[must_use]
    pub const fn declaration(&self) -> &Declaration {
        &self.declaration
    }
}

impl CallTarget for Precondition {
    forward_target_identity!();

    fn invoke(&self, call: &CallArgs) -> Result<Value> {
        let routed = route(&self.declaration, call, None)?;
        if !self.predicate.check(&routed)? {
            log::debug!(
                "Precondition {} rejected call to {}",
                self.predicate.name(),
                self.inner.name()
            );
            return Err(AspectError::PreconditionViolation {
                predicate: self.predicate.name().to_string(),
                args: call.positional[..self.declaration.positional_arg_count].to_vec(),
            });
        }
        self.inner.invoke(call)
    }
}

/// Calls the inner target, then checks a predicate against its return value
///
/// The predicate is only consulted when the declaration carries the `return` flag.
/// A violation reports the return value followed by the declared literals.
pub struct Postcondition {
    inner: BoxedTarget,
    declaration: Declaration,
    predicate: Predicate,
}

impl Postcondition {
    pub fn wrap(
        target: impl CallTarget + 'static,
        registry: &PredicateRegistry,
        config: &AspectConfig,
    ) -> Result<Self> {
        let marker = config.settings.postcondition_marker.as_str();
        let (declaration, predicate) = bind_contract(&target, marker, registry)?;
        if !declaration.include_return_value {
            log::debug!(
                "Postcondition {} on {} has no return flag and will not be checked",
                predicate.name(),
                target.name()
            );
        }
        Ok(Self {
            inner: Box::new(target),
            declaration,
            predicate,
        })
    }

    #[must_use]
    pub const fn declaration(&self) -> &Declaration {
        &self.declaration
    }
}

impl CallTarget for Postcondition {
    forward_target_identity!();

    fn invoke(&self, call: &CallArgs) -> Result<Value> {
        let value = self.inner.invoke(call)?;
        if !self.declaration.include_return_value {
            return Ok(value);
        }

        let routed = route(&self.declaration, call, Some(&value))?;
        if !self.predicate.check(&routed)? {
            log::debug!(
                "Postcondition {} rejected result {value} of {}",
                self.predicate.name(),
                self.inner.name()
            );
            return Err(AspectError::PostconditionViolation {
                predicate: self.predicate.name().to_string(),
                args: std::iter::once(value)
                    .chain(self.declaration.literal_args.iter().cloned())
                    .collect(),
            });
        }
        Ok(value)
    }
}

/// Parse the target's declaration for `marker`, resolve its predicate and check it fits the signature
fn bind_contract(
    target: &dyn CallTarget,
    marker: &str,
    registry: &PredicateRegistry,
) -> Result<(Declaration, Predicate)> {
    let descriptor = target.descriptor().ok_or_else(|| {
        AspectError::configuration(format!(
            "`{}` has no descriptor to read `{marker}` from",
            target.name()
        ))
    })?;

    let declaration = DeclarationParser::new(marker).parse(descriptor)?;
    let predicate = registry.resolve(&declaration.predicate_name)?;
    check_fits_signature(target.name(), target.signature(), &declaration)?;

    log::debug!(
        "Bound {marker} {} to {}: {} positional, {} literal(s), keywords {:?}, return={}",
        declaration.predicate_name,
        target.name(),
        declaration.positional_arg_count,
        declaration.literal_args.len(),
        declaration.keyword_keys,
        declaration.include_return_value
    );
    Ok((declaration, predicate))
}

fn check_fits_signature(name: &str, signature: Signature, declaration: &Declaration) -> Result<()> {
    if let Some(arity) = signature.positional {
        if declaration.positional_arg_count > arity {
            return Err(AspectError::configuration(format!(
                "`{}` forwards {} positional argument(s) but `{name}` takes {arity}",
                declaration.predicate_name, declaration.positional_arg_count
            )));
        }
    }
    if !declaration.keyword_keys.is_empty() && !signature.accepts_keywords {
        return Err(AspectError::configuration(format!(
            "`{}` forwards keywords but `{name}` does not accept keyword arguments",
            declaration.predicate_name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::FnTarget;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn registry() -> PredicateRegistry {
        PredicateRegistry::new()
            .with("is_positive", |args| {
                Ok(Value::Bool(args.arg(0).and_then(Value::as_f64).is_some_and(|n| n > 0.0)))
            })
            .with("within_upper_bound", |args| {
                // (..., upper, ret): return value must not exceed the upper literal
                let n = args.positional.len();
                let (Some(upper), Some(ret)) = (
                    args.positional.get(n.wrapping_sub(2)).and_then(Value::as_f64),
                    args.positional.last().and_then(Value::as_f64),
                ) else {
                    return Ok(Value::Bool(false));
                };
                Ok(Value::Bool(ret <= upper))
            })
    }

    fn counted_square(descriptor: &str, calls: &Arc<AtomicUsize>) -> FnTarget {
        let calls = Arc::clone(calls);
        FnTarget::new("square", Signature::fixed(1).with_keywords(), move |call| {
            calls.fetch_add(1, Ordering::SeqCst);
            let n = call.arg(0).and_then(Value::as_int).unwrap_or_default();
            Ok(Value::Int(n * n))
        })
        .with_descriptor(descriptor)
    }

    #[test]
    fn precondition_passes_and_blocks() {
        let calls = Arc::new(AtomicUsize::new(0));
        let target = counted_square(
            "@Precondition is_positive positional(n) keywords() (100, 200)",
            &calls,
        );
        let pre = Precondition::wrap(target, &registry(), &AspectConfig::default()).unwrap();
        assert_eq!(pre.declaration().predicate_name, "is_positive");
        assert_eq!(pre.declaration().literal_args, vec![Value::Int(100), Value::Int(200)]);

        assert_eq!(pre.invoke(&CallArgs::positional([5])).unwrap(), Value::Int(25));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let err = pre.invoke(&CallArgs::positional([-1])).unwrap_err();
        match err {
            AspectError::PreconditionViolation { predicate, args } => {
                assert_eq!(predicate, "is_positive");
                assert_eq!(args, vec![Value::Int(-1)]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1, "body must not run on violation");
    }

    #[test]
    fn postcondition_checks_return_value() {
        let calls = Arc::new(AtomicUsize::new(0));
        let target = counted_square(
            "@Postcondition within_upper_bound positional(n) keywords('a') (100, 200) return",
            &calls,
        );
        let post = Postcondition::wrap(target, &registry(), &AspectConfig::default()).unwrap();
        assert!(post.declaration().include_return_value);
        assert_eq!(post.declaration().keyword_keys, vec!["a"]);

        let ok = post
            .invoke(&CallArgs::positional([11]).with_keyword("a", 10))
            .unwrap();
        assert_eq!(ok, Value::Int(121));

        let err = post
            .invoke(&CallArgs::positional([15]).with_keyword("a", 10))
            .unwrap_err();
        match err {
            AspectError::PostconditionViolation { predicate, args } => {
                assert_eq!(predicate, "within_upper_bound");
                assert_eq!(
                    args,
                    vec![Value::Int(225), Value::Int(100), Value::Int(200)]
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2, "body runs before the check");
    }

    #[test]
    fn postcondition_without_return_flag_is_not_checked() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = PredicateRegistry::new().with("never", |_| Ok(Value::Bool(false)));
        let target = counted_square("@Postcondition never positional(n) keywords() ()", &calls);
        let post = Postcondition::wrap(target, &registry, &AspectConfig::default()).unwrap();
        assert_eq!(post.invoke(&CallArgs::positional([3])).unwrap(), Value::Int(9));
    }

    #[test]
    fn missing_keyword_surfaces_at_call_time() {
        let calls = Arc::new(AtomicUsize::new(0));
        let target = counted_square(
            "@Precondition is_positive positional(n) keywords('a') ()",
            &calls,
        );
        let pre = Precondition::wrap(target, &registry(), &AspectConfig::default()).unwrap();
        let err = pre.invoke(&CallArgs::positional([3])).unwrap_err();
        assert!(matches!(err, AspectError::MissingArgument { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn wrap_time_configuration_errors() {
        let calls = Arc::new(AtomicUsize::new(0));
        let config = AspectConfig::default();

        let unknown = counted_square("@Precondition nope positional(n) keywords() ()", &calls);
        assert!(Precondition::wrap(unknown, &registry(), &config).is_err());

        let too_many = counted_square("@Precondition is_positive positional(a, b) keywords() ()", &calls);
        assert!(Precondition::wrap(too_many, &registry(), &config).is_err());

        let return_flag = counted_square(
            "@Precondition is_positive positional(n) keywords() () return",
            &calls,
        );
        assert!(Precondition::wrap(return_flag, &registry(), &config).is_err());

        let no_descriptor = FnTarget::new("bare", Signature::fixed(1), |_| Ok(Value::None));
        let err = Postcondition::wrap(no_descriptor, &registry(), &config)
            .err()
            .expect("configuration error");
        assert!(err.to_string().contains("no descriptor"));

        let no_keywords = FnTarget::new("strict", Signature::fixed(1), |_| Ok(Value::None))
            .with_descriptor("@Precondition is_positive positional(n) keywords(a) ()");
        assert!(Precondition::wrap(no_keywords, &registry(), &config).is_err());

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn predicate_errors_propagate() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry =
            PredicateRegistry::new().with("broken", |_| Err(anyhow::anyhow!("predicate exploded").into()));
        let target = counted_square("@Precondition broken positional(n) keywords() ()", &calls);
        let pre = Precondition::wrap(target, &registry, &AspectConfig::default()).unwrap();
        let err = pre.invoke(&CallArgs::positional([1])).unwrap_err();
        assert_eq!(err.to_string(), "predicate exploded");
    }
}
