use crate::error::{AspectError, Result};
use crate::value::{CallArgs, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

/// Declared parameter shape of a call target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Exact positional count, `None` for variadic targets
    pub positional: Option<usize>,

    /// Whether keyword arguments are accepted
    pub accepts_keywords: bool,
}

impl Signature {
    /// Fixed positional arity without keywords
    #[must_use]
    pub const fn fixed(positional: usize) -> Self {
        Self {
            positional: Some(positional),
            accepts_keywords: false,
        }
    }

    /// Any number of positionals and keywords
    #[must_use]
    pub const fn variadic() -> Self {
        Self {
            positional: None,
            accepts_keywords: true,
        }
    }

    /// Builder: accept keyword arguments
    #[must_use]
    pub const fn with_keywords(mut self) -> Self {
        self.accepts_keywords = true;
        self
    }

    /// Check a call against this shape
    pub fn check(&self, target: &str, call: &CallArgs) -> Result<()> {
        if let Some(expected) = self.positional {
            if call.positional.len() != expected {
                return Err(AspectError::signature(
                    target,
                    format!(
                        "expected {expected} positional argument(s), got {}",
                        call.positional.len()
                    ),
                ));
            }
        }
        if !self.accepts_keywords && !call.keywords.is_empty() {
            let keys: Vec<&str> = call.keywords.keys().map(String::as_str).collect();
            return Err(AspectError::signature(
                target,
                format!("unexpected keyword argument(s): {}", keys.join(", ")),
            ));
        }
        Ok(())
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self::variadic()
    }
}

/// A unit of callable behavior that aspects wrap
///
/// Wrappers implement this trait too, so stacks compose by nesting.
pub trait CallTarget: Send + Sync {
    /// Name used in diagnostics
    fn name(&self) -> &str;

    /// Declared parameter shape
    fn signature(&self) -> Signature;

    /// Declaration text attached to the target, if any
    fn descriptor(&self) -> Option<&str> {
        None
    }

    /// Invoke the target once
    fn invoke(&self, call: &CallArgs) -> Result<Value>;
}

/// Owned, type-erased target held by a wrapper
pub type BoxedTarget = Box<dyn CallTarget>;

/// Shared handle to a fully wrapped target
pub type SharedTarget = Arc<dyn CallTarget>;

impl<T: CallTarget + ?Sized> CallTarget for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn signature(&self) -> Signature {
        (**self).signature()
    }

    fn descriptor(&self) -> Option<&str> {
        (**self).descriptor()
    }

    fn invoke(&self, call: &CallArgs) -> Result<Value> {
        (**self).invoke(call)
    }
}

impl<T: CallTarget + ?Sized> CallTarget for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn signature(&self) -> Signature {
        (**self).signature()
    }

    fn descriptor(&self) -> Option<&str> {
        (**self).descriptor()
    }

    fn invoke(&self, call: &CallArgs) -> Result<Value> {
        (**self).invoke(call)
    }
}

type Body = dyn Fn(&CallArgs) -> Result<Value> + Send + Sync;

/// Closure-backed leaf target
pub struct FnTarget {
    name: String,
    signature: Signature,
    descriptor: Option<String>,
    body: Box<Body>,
}

impl FnTarget {
    pub fn new<F>(name: impl Into<String>, signature: Signature, body: F) -> Self
    where
        F: Fn(&CallArgs) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            signature,
            descriptor: None,
            body: Box::new(body),
        }
    }

    /// Builder: attach declaration text
    #[must_use]
    pub fn with_descriptor(mut self, descriptor: impl Into<String>) -> Self {
        self.descriptor = Some(descriptor.into());
        self
    }
}

impl fmt::Debug for FnTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTarget")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

impl CallTarget for FnTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn signature(&self) -> Signature {
        self.signature
    }

    fn descriptor(&self) -> Option<&str> {
        self.descriptor.as_deref()
    }

    fn invoke(&self, call: &CallArgs) -> Result<Value> {
        self.signature.check(&self.name, call)?;
        (self.body)(call)
    }
}

/// Late-bound reference to a wrapped target, for bodies that recurse through their own aspects
///
/// Holds the target weakly so a body capturing its own handle does not leak the stack.
#[derive(Clone, Default)]
pub struct RecursiveHandle {
    slot: Arc<OnceLock<Weak<dyn CallTarget>>>,
}

impl RecursiveHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind to the outermost wrapper. Only the first bind takes effect.
    pub fn bind(&self, target: &SharedTarget) -> bool {
        self.slot.set(Arc::downgrade(target)).is_ok()
    }

    /// Call through the bound wrapper
    pub fn invoke(&self, name: &str, call: &CallArgs) -> Result<Value> {
        let target = self
            .slot
            .get()
            .and_then(Weak::upgrade)
            .ok_or_else(|| AspectError::Unbound(name.to_string()))?;
        target.invoke(call)
    }
}

impl fmt::Debug for RecursiveHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecursiveHandle")
            .field("bound", &self.slot.get().is_some())
            .finish()
    }
}
