//! Guarded single-flight calls.
//!
//! Some native operations (sign-in, leaderboard queries) misbehave when issued twice
//! before the first one finishes. A [`SingleFlight`] slot owns the busy flag for one
//! operation kind: a second issue while busy is answered immediately with
//! [`Error::Busy`] and never reaches the native layer.
//!
//! The slot is also released when the bridged continuation is dropped without
//! running, e.g. because the main context is gone.

use super::bridge::{AsyncBridge, NativeCompletion};
use super::{category, Error, Outcome};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type Continuation<T> = Box<dyn FnOnce(Outcome<T>) + Send + 'static>;

pub struct SingleFlight<T> {
    operation: &'static str,
    busy_message: &'static str,
    busy: AtomicBool,
    pending: Mutex<Option<Continuation<T>>>,
}

impl<T: Default + Send + 'static> SingleFlight<T> {
    pub fn new(operation: &'static str, busy_message: &'static str) -> Arc<Self> {
        Arc::new(Self {
            operation,
            busy_message,
            busy: AtomicBool::new(false),
            pending: Mutex::new(None),
        })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Issues `op` through `bridge` unless a previous call is still outstanding.
    ///
    /// Returns `false` when the slot was busy; `on_complete` has then already been
    /// called with [`Error::Busy`]. Otherwise the slot is released right before
    /// `on_complete` runs, so the continuation may issue again.
    pub fn try_issue<Op, F>(self: &Arc<Self>, bridge: &AsyncBridge, op: Op, on_complete: F) -> bool
    where
        Op: FnOnce(NativeCompletion<T>),
        F: FnOnce(Outcome<T>) + Send + 'static,
    {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(
                target: category::CORE,
                operation = self.operation,
                "rejected, previous call in flight"
            );
            on_complete(Outcome::failure(Error::Busy(self.busy_message.to_string())));
            return false;
        }

        *self.pending.lock() = Some(Box::new(on_complete));

        let flight = Flight {
            slot: Arc::clone(self),
            finished: false,
        };
        bridge.issue(self.operation, op, move |outcome| flight.finish(outcome));
        true
    }

    fn finish(&self, outcome: Outcome<T>) {
        let continuation = self.pending.lock().take();
        self.busy.store(false, Ordering::Release);
        if let Some(continuation) = continuation {
            continuation(outcome);
        }
    }

    fn abandon(&self) {
        let continuation = self.pending.lock().take();
        self.busy.store(false, Ordering::Release);
        tracing::warn!(
            target: category::CORE,
            operation = self.operation,
            "continuation dropped before it could run, slot released"
        );
        drop(continuation);
    }
}

/// Owns the busy flag of one accepted call until its continuation runs.
struct Flight<T: Default + Send + 'static> {
    slot: Arc<SingleFlight<T>>,
    finished: bool,
}

impl<T: Default + Send + 'static> Flight<T> {
    fn finish(mut self, outcome: Outcome<T>) {
        self.finished = true;
        self.slot.finish(outcome);
    }
}

impl<T: Default + Send + 'static> Drop for Flight<T> {
    fn drop(&mut self) {
        if !self.finished {
            self.slot.abandon();
        }
    }
}
