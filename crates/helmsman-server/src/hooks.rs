//! On-shutdown callback registry.
//!
//! Callbacks registered here are fired by the transport during its
//! shutdown sequence, in registration order, exactly once per shutdown
//! even when two triggers race.
//!
//! # Example
//!
//! ```rust
//! use helmsman_server::ShutdownHooks;
//!
//! let hooks = ShutdownHooks::new();
//! hooks.register(|| println!("closing caches"));
//! hooks.register(|| println!("flushing logs"));
//!
//! hooks.run();
//! assert!(hooks.has_run());
//! ```

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

type Hook = Box<dyn Fn() + Send + Sync>;

/// Ordered, fire-once registry of shutdown callbacks.
pub struct ShutdownHooks {
    hooks: Mutex<Vec<(String, Hook)>>,
    fired: AtomicBool,
}

impl std::fmt::Debug for ShutdownHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownHooks")
            .field("hooks", &self.hooks.lock().len())
            .field("fired", &self.fired.load(Ordering::SeqCst))
            .finish()
    }
}

impl ShutdownHooks {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            hooks: Mutex::new(Vec::new()),
            fired: AtomicBool::new(false),
        }
    }

    /// Appends a callback.
    ///
    /// Callbacks run in registration order when the shutdown sequence
    /// fires.
    pub fn register<F>(&self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut hooks = self.hooks.lock();
        let name = format!("shutdown_{}", hooks.len());
        hooks.push((name, Box::new(hook)));
    }

    /// Returns the number of registered callbacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hooks.lock().len()
    }

    /// Returns `true` if no callbacks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hooks.lock().is_empty()
    }

    /// Returns `true` once the callbacks have fired.
    #[must_use]
    pub fn has_run(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Fires every callback in registration order.
    ///
    /// Only the first call runs anything; racing callers lose the latch
    /// and return without re-firing.
    pub fn run(&self) {
        if self
            .fired
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let hooks = self.hooks.lock();
        for (name, hook) in hooks.iter() {
            tracing::debug!(hook = %name, "running shutdown hook");
            hook();
        }
    }
}

impl Default for ShutdownHooks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn test_empty_registry_runs() {
        let hooks = ShutdownHooks::new();
        assert!(hooks.is_empty());
        hooks.run();
        assert!(hooks.has_run());
    }

    #[test]
    fn test_hooks_fire_in_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let hooks = ShutdownHooks::new();

        for i in 1..=3 {
            let order = Arc::clone(&order);
            hooks.register(move || order.lock().push(i));
        }

        hooks.run();
        assert_eq!(*order.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn test_hooks_fire_exactly_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let hooks = ShutdownHooks::new();

        let counter = Arc::clone(&count);
        hooks.register(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        hooks.run();
        hooks.run();
        hooks.run();

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_len_reflects_registrations() {
        let hooks = ShutdownHooks::new();
        hooks.register(|| {});
        hooks.register(|| {});
        assert_eq!(hooks.len(), 2);
    }
}
