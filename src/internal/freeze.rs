//! Write-once cache with blocking and async waiters.

use std::future::Future;
use std::thread::{self, ThreadId};

use futures::future;
use parking_lot::{Condvar, Mutex, RwLock};
use tokio::sync::Notify;

use crate::cancellation::CancellationToken;
use crate::error::{DependencyError, DependencyResult};

/// A value computed at most once by a single winner.
///
/// Readers take the read lock only. Until the value is frozen, exactly one
/// caller holds the in-flight claim and runs the initializer; every other
/// caller waits for it. A failed initialization does not freeze: the callers
/// that waited on it get the same error, and the next caller tries again.
pub(crate) struct FreezeCell<T> {
    value: RwLock<Option<T>>,
    flight: Mutex<Flight>,
    ready: Condvar,
    notify: Notify,
}

#[derive(Default)]
struct Flight {
    active: bool,
    owner: Option<ThreadId>,
    generation: u64,
    failure: Option<(u64, DependencyError)>,
}

impl Flight {
    fn claim(&mut self, owner: Option<ThreadId>) -> u64 {
        self.active = true;
        self.owner = owner;
        self.generation += 1;
        self.failure = None;
        self.generation
    }

    fn failure_of(&self, waited_on: Option<u64>) -> Option<DependencyError> {
        match (&self.failure, waited_on) {
            (Some((generation, err)), Some(waited)) if *generation == waited => Some(err.clone()),
            _ => None,
        }
    }
}

impl<T: Clone> FreezeCell<T> {
    pub(crate) fn new() -> Self {
        Self {
            value: RwLock::new(None),
            flight: Mutex::new(Flight::default()),
            ready: Condvar::new(),
            notify: Notify::new(),
        }
    }

    /// The frozen value, if any.
    pub(crate) fn peek(&self) -> Option<T> {
        self.value.read().clone()
    }

    pub(crate) fn is_frozen(&self) -> bool {
        self.value.read().is_some()
    }

    /// Drops the frozen value.
    pub(crate) fn clear(&self) {
        self.value.write().take();
        self.flight.lock().failure = None;
    }

    pub(crate) fn get_or_try_init<F>(&self, init: F) -> DependencyResult<T>
    where
        F: FnOnce() -> DependencyResult<T>,
    {
        if let Some(value) = self.peek() {
            return Ok(value);
        }

        let me = thread::current().id();
        let mut flight = self.flight.lock();
        let mut waited_on = None;
        loop {
            if let Some(value) = self.peek() {
                return Ok(value);
            }
            if let Some(err) = flight.failure_of(waited_on) {
                return Err(err);
            }
            if !flight.active {
                break;
            }
            if flight.owner == Some(me) {
                return Err(DependencyError::circular(&[
                    "value re-entered its own initialization".to_string(),
                ]));
            }
            waited_on = Some(flight.generation);
            self.ready.wait(&mut flight);
        }
        let generation = flight.claim(Some(me));
        drop(flight);

        let mut claim = Claim::new(self, generation);
        let result = init();
        claim.finish(&result);
        result
    }

    pub(crate) async fn get_or_try_init_async<F, Fut>(
        &self,
        cancel: &CancellationToken,
        init: F,
    ) -> DependencyResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = DependencyResult<T>>,
    {
        if let Some(value) = self.peek() {
            return Ok(value);
        }

        let mut waited_on = None;
        loop {
            cancel.check()?;

            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let claimed = {
                let mut flight = self.flight.lock();
                if let Some(value) = self.peek() {
                    return Ok(value);
                }
                if let Some(err) = flight.failure_of(waited_on) {
                    return Err(err);
                }
                if flight.active {
                    waited_on = Some(flight.generation);
                    None
                } else {
                    Some(flight.claim(None))
                }
            };

            if let Some(generation) = claimed {
                let mut claim = Claim::new(self, generation);
                let init = init();
                tokio::pin!(init);
                // Whichever thread polls the initializer owns the claim for
                // that poll, so blocking re-entry from it is reported.
                let result = future::poll_fn(|cx| {
                    self.flight.lock().owner = Some(thread::current().id());
                    let poll = init.as_mut().poll(cx);
                    self.flight.lock().owner = None;
                    poll
                })
                .await;
                claim.finish(&result);
                return result;
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = cancel.cancelled() => return Err(DependencyError::cancelled()),
            }
        }
    }
}

/// In-flight claim; releases the flag and wakes waiters on drop, including
/// when the initializer panics or its future is dropped.
struct Claim<'a, T> {
    cell: &'a FreezeCell<T>,
    generation: u64,
    failure: Option<DependencyError>,
}

impl<'a, T: Clone> Claim<'a, T> {
    fn new(cell: &'a FreezeCell<T>, generation: u64) -> Self {
        Self {
            cell,
            generation,
            failure: None,
        }
    }

    fn finish(&mut self, result: &DependencyResult<T>) {
        match result {
            Ok(value) => *self.cell.value.write() = Some(value.clone()),
            Err(err) => self.failure = Some(err.clone()),
        }
    }
}

impl<'a, T> Drop for Claim<'a, T> {
    fn drop(&mut self) {
        let mut flight = self.cell.flight.lock();
        if let Some(err) = self.failure.take() {
            flight.failure = Some((self.generation, err));
        }
        flight.active = false;
        flight.owner = None;
        drop(flight);
        self.cell.ready.notify_all();
        self.cell.notify.notify_waiters();
    }
}
