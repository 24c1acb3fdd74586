//! Pure call-interception aspects: timing, timestamps, tracing and memoization.

use crate::aspect::forward_target_identity;
use crate::config::AspectConfig;
use crate::error::Result;
use crate::sink::SharedSink;
use crate::target::{BoxedTarget, CallTarget};
use crate::value::{CallArgs, Value};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Logs elapsed wall time of the inner call on every exit path
pub struct TimedCall {
    inner: BoxedTarget,
    sink: SharedSink,
}

impl TimedCall {
    pub fn wrap(target: impl CallTarget + 'static, config: &AspectConfig) -> Result<Self> {
        Ok(Self {
            inner: Box::new(target),
            sink: config.sink.clone(),
        })
    }
}

/// Writes the elapsed line when dropped, including during error returns and unwinding
struct ElapsedGuard<'a> {
    start: Instant,
    sink: &'a SharedSink,
}

impl Drop for ElapsedGuard<'_> {
    fn drop(&mut self) {
        self.sink
            .write(&format!("Call elapsed time: {:?}", self.start.elapsed()));
    }
}

impl CallTarget for TimedCall {
    forward_target_identity!();

    fn invoke(&self, call: &CallArgs) -> Result<Value> {
        let _guard = ElapsedGuard {
            start: Instant::now(),
            sink: &self.sink,
        };
        self.inner.invoke(call)
    }
}

/// Logs the local time right before the inner call
pub struct Timestamp {
    inner: BoxedTarget,
    sink: SharedSink,
    format: String,
}

impl Timestamp {
    pub fn wrap(target: impl CallTarget + 'static, config: &AspectConfig) -> Result<Self> {
        config.settings.validate()?;
        Ok(Self {
            inner: Box::new(target),
            sink: config.sink.clone(),
            format: config.settings.timestamp_format.clone(),
        })
    }
}

impl CallTarget for Timestamp {
    forward_target_identity!();

    fn invoke(&self, call: &CallArgs) -> Result<Value> {
        let now = chrono::Local::now();
        self.sink.write(&now.format(&self.format).to_string());
        self.inner.invoke(call)
    }
}

/// Logs target name, arguments and outcome after the inner call
pub struct Trace {
    inner: BoxedTarget,
    sink: SharedSink,
}

impl Trace {
    pub fn wrap(target: impl CallTarget + 'static, config: &AspectConfig) -> Result<Self> {
        Ok(Self {
            inner: Box::new(target),
            sink: config.sink.clone(),
        })
    }
}

impl CallTarget for Trace {
    forward_target_identity!();

    fn invoke(&self, call: &CallArgs) -> Result<Value> {
        let result = self.inner.invoke(call);
        let outcome = match &result {
            Ok(value) => format!("Return: {value}"),
            Err(e) => format!("Raised: {e}"),
        };
        self.sink.write(&format!(
            "Function: {}\tArgs: {}\t{outcome}",
            self.inner.name(),
            call.render()
        ));
        result
    }
}

/// Caches results keyed by the positional argument tuple.
///
/// Keyword arguments are not part of the key, so calls differing only in
/// keywords share an entry. Errors are never cached. The cache lock is
/// released before calling the inner target so recursive bodies can re-enter.
pub struct Memoize {
    inner: BoxedTarget,
    cache: Mutex<HashMap<Vec<Value>, Value>>,
}

impl Memoize {
    pub fn wrap(target: impl CallTarget + 'static, _config: &AspectConfig) -> Result<Self> {
        Ok(Self {
            inner: Box::new(target),
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Number of cached entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Vec<Value>, Value>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CallTarget for Memoize {
    forward_target_identity!();

    fn invoke(&self, call: &CallArgs) -> Result<Value> {
        let cached = self.lock().get(&call.positional).cloned();
        if let Some(hit) = cached {
            log::trace!("Memoize hit for {}({})", self.inner.name(), call.render());
            return Ok(hit);
        }
        if !call.keywords.is_empty() {
            log::debug!(
                "Memoize key for {} ignores keyword arguments {:?}",
                self.inner.name(),
                call.keywords.keys().collect::<Vec<_>>()
            );
        }

        let value = self.inner.invoke(call)?;
        log::trace!("Memoize miss for {}({})", self.inner.name(), call.render());
        Ok(self
            .lock()
            .entry(call.positional.clone())
            .or_insert(value)
            .clone())
    }
}
