use crate::config::AspectConfig;
use crate::contract::{Postcondition, Precondition};
use crate::diagnostic::{Memoize, TimedCall, Timestamp, Trace};
use crate::error::{AspectError, Result};
use crate::predicate::PredicateRegistry;
use crate::target::{BoxedTarget, CallTarget, RecursiveHandle, SharedTarget};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Expands to `name`, `signature` and `descriptor` forwarding to `self.inner`.
///
/// Wrappers keep the inner target's external identity so stacked contract
/// aspects all read the same descriptor.
macro_rules! forward_target_identity {
    () => {
        fn name(&self) -> &str {
            self.inner.name()
        }

        fn signature(&self) -> $crate::target::Signature {
            self.inner.signature()
        }

        fn descriptor(&self) -> Option<&str> {
            self.inner.descriptor()
        }
    };
}
pub(crate) use forward_target_identity;

/// The available aspects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AspectKind {
    TimedCall,
    Timestamp,
    Trace,
    Memoize,
    Precondition,
    Postcondition,
}

impl AspectKind {
    pub const ALL: [Self; 6] = [
        Self::TimedCall,
        Self::Timestamp,
        Self::Trace,
        Self::Memoize,
        Self::Precondition,
        Self::Postcondition,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TimedCall => "timed-call",
            Self::Timestamp => "timestamp",
            Self::Trace => "trace",
            Self::Memoize => "memoize",
            Self::Precondition => "precondition",
            Self::Postcondition => "postcondition",
        }
    }

    /// Type name as it appears in nested descriptions
    #[must_use]
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::TimedCall => "TimedCall",
            Self::Timestamp => "Timestamp",
            Self::Trace => "Trace",
            Self::Memoize => "Memoize",
            Self::Precondition => "Precondition",
            Self::Postcondition => "Postcondition",
        }
    }

    /// True for aspects that read a declaration from the descriptor
    #[must_use]
    pub const fn is_contract(self) -> bool {
        matches!(self, Self::Precondition | Self::Postcondition)
    }

    /// Wrap `target` in this aspect
    pub fn wrap(
        self,
        target: BoxedTarget,
        config: &AspectConfig,
        registry: &PredicateRegistry,
    ) -> Result<BoxedTarget> {
        Ok(match self {
            Self::TimedCall => Box::new(TimedCall::wrap(target, config)?),
            Self::Timestamp => Box::new(Timestamp::wrap(target, config)?),
            Self::Trace => Box::new(Trace::wrap(target, config)?),
            Self::Memoize => Box::new(Memoize::wrap(target, config)?),
            Self::Precondition => Box::new(Precondition::wrap(target, registry, config)?),
            Self::Postcondition => Box::new(Postcondition::wrap(target, registry, config)?),
        })
    }
}

impl fmt::Display for AspectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectKind {
    type Err = AspectError;

    /// Accepts `timed-call`, `timed_call` or `TimedCall` spellings
    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.type_name().to_ascii_lowercase() == normalized)
            .ok_or_else(|| AspectError::configuration(format!("unknown aspect `{s}`")))
    }
}

/// Builds a stack of aspects around one target.
///
/// Layers are applied innermost first, so
/// `AspectStack::new(f).layer(Trace)?.layer(Timestamp)?.layer(TimedCall)?`
/// yields `TimedCall(Timestamp(Trace(f)))`. Each layer is wrapped immediately,
/// so configuration errors surface from [`Self::layer`].
pub struct AspectStack {
    target: BoxedTarget,
    config: AspectConfig,
    registry: PredicateRegistry,
    layers: Vec<AspectKind>,
}

impl AspectStack {
    pub fn new(target: impl CallTarget + 'static) -> Self {
        Self {
            target: Box::new(target),
            config: AspectConfig::default(),
            registry: PredicateRegistry::default(),
            layers: Vec::new(),
        }
    }

    /// Builder: configuration for subsequent layers
    #[must_use]
    pub fn with_config(mut self, config: AspectConfig) -> Self {
        self.config = config;
        self
    }

    /// Builder: predicates for subsequent contract layers
    #[must_use]
    pub fn with_registry(mut self, registry: PredicateRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Wrap the current stack in one more aspect
    pub fn layer(mut self, kind: AspectKind) -> Result<Self> {
        log::debug!("Wrapping {} in {}", self.target.name(), kind.type_name());
        self.target = kind.wrap(self.target, &self.config, &self.registry)?;
        self.layers.push(kind);
        Ok(self)
    }

    /// Apply several layers, innermost first
    pub fn layers(self, kinds: impl IntoIterator<Item = AspectKind>) -> Result<Self> {
        kinds.into_iter().try_fold(self, Self::layer)
    }

    /// Applied layers, innermost first
    #[must_use]
    pub fn applied(&self) -> &[AspectKind] {
        &self.layers
    }

    /// Nested rendering such as `TimedCall(Timestamp(Trace(square)))`
    #[must_use]
    pub fn describe(&self) -> String {
        describe_layers(self.target.name(), &self.layers)
    }

    #[must_use]
    pub fn build(self) -> SharedTarget {
        Arc::from(self.target)
    }

    /// Build and bind `handle` so the body can recurse through the full stack
    #[must_use]
    pub fn build_recursive(self, handle: &RecursiveHandle) -> SharedTarget {
        let shared = self.build();
        if !handle.bind(&shared) {
            log::warn!("Recursive handle for {} was already bound", shared.name());
        }
        shared
    }
}

/// Render `layers` (innermost first) around `name`
#[must_use]
pub fn describe_layers(name: &str, layers: &[AspectKind]) -> String {
    layers.iter().fold(name.to_string(), |inner, kind| {
        format!("{}({inner})", kind.type_name())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use crate::target::{FnTarget, Signature};
    use crate::value::{CallArgs, Value};
    use pretty_assertions::assert_eq;

    #[test]
    fn kind_parsing_accepts_common_spellings() {
        for text in ["timed-call", "timed_call", "TimedCall", "TIMEDCALL"] {
            assert_eq!(text.parse::<AspectKind>().unwrap(), AspectKind::TimedCall);
        }
        assert!("logging".parse::<AspectKind>().is_err());
        let contracts: Vec<AspectKind> =
            AspectKind::ALL.into_iter().filter(|k| k.is_contract()).collect();
        assert_eq!(contracts, vec![AspectKind::Precondition, AspectKind::Postcondition]);
        for kind in AspectKind::ALL {
            assert_eq!(kind.as_str().parse::<AspectKind>().unwrap(), kind);
        }
    }

    #[test]
    fn kind_serializes_kebab_case() {
        let json = serde_json::to_string(&AspectKind::TimedCall).unwrap();
        assert_eq!(json, "\"timed-call\"");
    }

    #[test]
    fn stack_describes_nesting_innermost_first() {
        let sink = MemorySink::new();
        let target = FnTarget::new("square5", Signature::fixed(1), |call| {
            let n = call.arg(0).and_then(Value::as_int).unwrap_or_default();
            Ok(Value::Int(n * n))
        });
        let stack = AspectStack::new(target)
            .with_config(AspectConfig::with_sink(Arc::new(sink)))
            .layers([AspectKind::Trace, AspectKind::Timestamp, AspectKind::TimedCall])
            .unwrap();
        assert_eq!(stack.describe(), "TimedCall(Timestamp(Trace(square5)))");
        assert_eq!(
            stack.applied(),
            &[AspectKind::Trace, AspectKind::Timestamp, AspectKind::TimedCall]
        );

        let wrapped = stack.build();
        assert_eq!(wrapped.name(), "square5");
        assert_eq!(wrapped.signature(), Signature::fixed(1));
        assert_eq!(wrapped.invoke(&CallArgs::positional([12])).unwrap(), Value::Int(144));
    }

    #[test]
    fn contract_layer_without_descriptor_fails_at_wrap_time() {
        let target = FnTarget::new("bare", Signature::variadic(), |_| Ok(Value::None));
        let err = AspectStack::new(target)
            .layer(AspectKind::Precondition)
            .err()
            .expect("wrap must fail");
        assert!(matches!(err, AspectError::Configuration(_)));
    }
}
