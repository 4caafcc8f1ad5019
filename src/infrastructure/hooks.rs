//! Shutdown hook registration and execution.
//!
//! Process-exit work is explicit here: hooks are registered with
//! [`ShutdownHooks::register`] and executed by [`ShutdownHooks::run`], which
//! the runtime calls from its `shutdown`. Nothing is wired to ambient exit
//! machinery; only the panic-dump path (in the runtime) touches
//! `std::panic::set_hook`.

use std::fmt;
use std::panic;
use std::sync::{Mutex, PoisonError};

use tracing::{debug, warn};

type Hook = Box<dyn FnOnce() + Send>;

/// Ordered set of run-once shutdown callbacks.
///
/// Hooks run in registration order. Each hook runs at most once: `run`
/// drains the set, so a second call finds nothing to do. A panicking hook is
/// logged and never prevents the hooks behind it from running.
#[derive(Default)]
pub struct ShutdownHooks {
    hooks: Mutex<Vec<(String, Hook)>>,
}

impl ShutdownHooks {
    /// Create an empty hook set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named hook.
    ///
    /// The name only appears in diagnostics when the hook panics.
    pub fn register(&self, name: impl Into<String>, hook: impl FnOnce() + Send + 'static) {
        let mut hooks = self.hooks.lock().unwrap_or_else(PoisonError::into_inner);
        hooks.push((name.into(), Box::new(hook)));
    }

    /// Run and drain every registered hook, in registration order.
    pub fn run(&self) {
        let drained = {
            let mut hooks = self.hooks.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *hooks)
        };
        for (name, hook) in drained {
            debug!(target: "optrack::hooks", hook = name.as_str(), "running shutdown hook");
            if panic::catch_unwind(panic::AssertUnwindSafe(hook)).is_err() {
                warn!(target: "optrack::hooks", hook = name.as_str(), "shutdown hook panicked");
            }
        }
    }

    /// Number of hooks waiting to run.
    pub fn len(&self) -> usize {
        self.hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no hooks are waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ShutdownHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownHooks")
            .field("registered", &self.len())
            .finish()
    }
}
