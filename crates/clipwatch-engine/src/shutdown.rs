//! Shutdown coordination for spawned workers.

use std::thread::JoinHandle;

use tracing::{debug, warn};

use clipwatch_types::CancelToken;

/// Owns the cancellation token and the join handles of every spawned
/// worker.
///
/// A stop request trips the token once and joins workers in reverse
/// registration order, tolerating workers that already exited on their own.
pub struct ShutdownCoordinator {
    token: CancelToken,
    workers: Vec<(String, JoinHandle<()>)>,
}

impl ShutdownCoordinator {
    /// Create a coordinator around the given token.
    pub fn new(token: CancelToken) -> Self {
        Self {
            token,
            workers: Vec::new(),
        }
    }

    /// The shared cancellation token.
    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Take ownership of a worker's join handle.
    pub fn register(&mut self, name: impl Into<String>, handle: JoinHandle<()>) {
        self.workers.push((name.into(), handle));
    }

    /// Trip the token and join every registered worker, newest first.
    pub fn shutdown(mut self) {
        self.token.cancel();

        while let Some((name, handle)) = self.workers.pop() {
            debug!(worker = %name, "Joining worker");
            if handle.join().is_err() {
                warn!(worker = %name, "Worker panicked before shutdown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;

    #[test]
    fn test_joins_workers_in_reverse_registration_order() {
        let token = CancelToken::new();
        let mut coordinator = ShutdownCoordinator::new(token.clone());
        let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

        for name in ["first", "second", "third"] {
            let worker_token = token.clone();
            let worker_order = Arc::clone(&order);
            let handle = thread::spawn(move || {
                while !worker_token.is_cancelled() {
                    thread::sleep(Duration::from_millis(5));
                }
                worker_order.lock().push(name);
            });
            coordinator.register(name, handle);
        }

        coordinator.shutdown();

        // All workers observed the stop request. Exit order is scheduling-
        // dependent, but every handle was joined exactly once.
        let mut observed = order.lock().clone();
        observed.sort_unstable();
        assert_eq!(observed, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_tolerates_workers_that_already_exited() {
        let token = CancelToken::new();
        let mut coordinator = ShutdownCoordinator::new(token);

        let handle = thread::spawn(|| {});
        // Let the worker finish before shutdown runs.
        thread::sleep(Duration::from_millis(20));
        coordinator.register("short-lived", handle);

        coordinator.shutdown();
    }
}
