use crate::error::{AspectError, Result};
use crate::value::{CallArgs, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type PredicateFn = dyn Fn(&CallArgs) -> Result<Value> + Send + Sync;

/// External predicate consulted by contract aspects; the result is read by truthiness
#[derive(Clone)]
pub struct Predicate {
    name: String,
    func: Arc<PredicateFn>,
}

impl Predicate {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&CallArgs) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &CallArgs) -> Result<Value> {
        log::trace!("Calling predicate {} with ({})", self.name, args.render());
        (self.func)(args)
    }

    /// Call and reduce the result to a boolean
    pub fn check(&self, args: &CallArgs) -> Result<bool> {
        self.call(args).map(|value| value.is_truthy())
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate").field("name", &self.name).finish()
    }
}

/// Name-to-predicate table consulted at wrap time
#[derive(Debug, Clone, Default)]
pub struct PredicateRegistry {
    predicates: HashMap<String, Predicate>,
}

impl PredicateRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a predicate, replacing any previous one with the same name
    pub fn register<F>(&mut self, name: impl Into<String>, func: F) -> &mut Self
    where
        F: Fn(&CallArgs) -> Result<Value> + Send + Sync + 'static,
    {
        let predicate = Predicate::new(name, func);
        self.predicates
            .insert(predicate.name().to_string(), predicate);
        self
    }

    /// Builder form of [`Self::register`]
    #[must_use]
    pub fn with<F>(mut self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&CallArgs) -> Result<Value> + Send + Sync + 'static,
    {
        self.register(name, func);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Predicate> {
        self.predicates.get(name)
    }

    /// Resolve a declared predicate; absence is a configuration error
    pub fn resolve(&self, name: &str) -> Result<Predicate> {
        self.get(name).cloned().ok_or_else(|| {
            AspectError::configuration(format!("predicate `{name}` is not registered"))
        })
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.predicates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}
