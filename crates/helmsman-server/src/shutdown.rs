//! Shutdown signalling and connection accounting.
//!
//! [`ShutdownSignal`] is a one-shot, latched trigger that can be cloned
//! across tasks: the first `trigger` wins, later ones are ignored, and
//! every waiter past or future observes the fired state. It is the
//! primitive behind the drain and abort phases of the transport and the
//! injectable external-termination source of the controller.
//!
//! [`ConnectionTracker`] counts in-flight connections so the drain can
//! wait for them to finish.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, Notify};

/// A clonable, one-shot shutdown trigger.
///
/// # Example
///
/// ```rust
/// use helmsman_server::ShutdownSignal;
///
/// let signal = ShutdownSignal::new();
/// let other = signal.clone();
///
/// signal.trigger();
/// assert!(other.is_triggered());
/// ```
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    fired: Arc<AtomicBool>,
    sender: broadcast::Sender<()>,
}

impl ShutdownSignal {
    /// Creates a new untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            fired: Arc::new(AtomicBool::new(false)),
            sender,
        }
    }

    /// Fires the signal, waking every waiter.
    ///
    /// Idempotent: only the first call has any effect.
    pub fn trigger(&self) {
        if self
            .fired
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            // No receivers is fine; the latched flag covers late waiters.
            let _ = self.sender.send(());
        }
    }

    /// Returns `true` once the signal has fired.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Completes when the signal fires.
    ///
    /// Completes immediately if it already has.
    pub async fn triggered(&self) {
        if self.fired.load(Ordering::SeqCst) {
            return;
        }
        let mut receiver = self.sender.subscribe();
        // A trigger may have slipped in between the check and the
        // subscription; the flag re-check closes that window.
        if self.fired.load(Ordering::SeqCst) {
            return;
        }
        let _ = receiver.recv().await;
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Waits for an OS termination signal.
///
/// On Unix this is SIGTERM or SIGINT; elsewhere Ctrl+C only.
///
/// # Errors
///
/// Returns an error if the signal handlers cannot be registered.
pub(crate) async fn wait_for_os_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("received SIGTERM, initiating graceful shutdown");
            }
            _ = sigint.recv() => {
                tracing::info!("received SIGINT, initiating graceful shutdown");
            }
        }
        Ok(())
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        tracing::info!("received Ctrl+C, initiating graceful shutdown");
        Ok(())
    }
}

/// Tracks in-flight connections during shutdown.
///
/// Each accepted connection holds a [`ConnectionToken`]; the drain waits
/// on [`ConnectionTracker::idle`] until every token has been dropped.
///
/// # Example
///
/// ```rust
/// use helmsman_server::ConnectionTracker;
///
/// let tracker = ConnectionTracker::new();
/// let token = tracker.track();
/// assert_eq!(tracker.active(), 1);
///
/// drop(token);
/// assert_eq!(tracker.active(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    active: Arc<AtomicUsize>,
    notify: Arc<Notify>,
}

impl ConnectionTracker {
    /// Creates a new tracker with no active connections.
    #[must_use]
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicUsize::new(0)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Registers a connection, returning its token.
    #[must_use]
    pub fn track(&self) -> ConnectionToken {
        self.active.fetch_add(1, Ordering::SeqCst);
        ConnectionToken {
            active: Arc::clone(&self.active),
            notify: Arc::clone(&self.notify),
        }
    }

    /// Returns the number of connections currently in flight.
    #[must_use]
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Completes once every tracked connection has finished.
    ///
    /// Completes immediately when nothing is in flight.
    pub async fn idle(&self) {
        loop {
            let notified = self.notify.notified();
            if self.active.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Token representing one in-flight connection.
///
/// Dropping the token releases the connection from its tracker.
#[derive(Debug)]
pub struct ConnectionToken {
    active: Arc<AtomicUsize>,
    notify: Arc<Notify>,
}

impl Drop for ConnectionToken {
    fn drop(&mut self) {
        let previous = self.active.fetch_sub(1, Ordering::SeqCst);
        if previous == 1 {
            self.notify.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_signal_starts_untriggered() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_triggered());
    }

    #[test]
    fn test_trigger_is_idempotent() {
        let signal = ShutdownSignal::new();
        signal.trigger();
        signal.trigger();
        assert!(signal.is_triggered());
    }

    #[test]
    fn test_clones_share_state() {
        let signal = ShutdownSignal::new();
        let clone = signal.clone();

        clone.trigger();
        assert!(signal.is_triggered());
    }

    #[tokio::test]
    async fn test_triggered_wakes_waiter() {
        let signal = ShutdownSignal::new();
        let remote = signal.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            remote.trigger();
        });

        tokio::time::timeout(Duration::from_secs(1), signal.triggered())
            .await
            .expect("waiter should be woken");
    }

    #[tokio::test]
    async fn test_triggered_completes_immediately_when_fired() {
        let signal = ShutdownSignal::new();
        signal.trigger();

        tokio::time::timeout(Duration::from_millis(10), signal.triggered())
            .await
            .expect("already-fired signal should complete immediately");
    }

    #[test]
    fn test_tracker_counts_tokens() {
        let tracker = ConnectionTracker::new();
        let a = tracker.track();
        let b = tracker.track();
        assert_eq!(tracker.active(), 2);

        drop(a);
        assert_eq!(tracker.active(), 1);
        drop(b);
        assert_eq!(tracker.active(), 0);
    }

    #[tokio::test]
    async fn test_idle_completes_immediately_when_empty() {
        let tracker = ConnectionTracker::new();

        tokio::time::timeout(Duration::from_millis(10), tracker.idle())
            .await
            .expect("idle should complete with no connections");
    }

    #[tokio::test]
    async fn test_idle_waits_for_last_token() {
        let tracker = ConnectionTracker::new();
        let token = tracker.track();

        let waiter = {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.idle().await })
        };

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            drop(token);
        });

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("idle should complete")
            .expect("waiter task should not panic");
    }
}
