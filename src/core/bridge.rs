//! Async bridge between native completions and the main execution context.
//!
//! A native layer receives a [`NativeCompletion`] and may resolve it from any thread,
//! any number of times. Only the first resolution counts: its [`Outcome`] is handed
//! to the caller's continuation on the main context. A completion that is dropped
//! without ever being resolved delivers a `Cancelled` error instead, so every issue
//! gets exactly one answer.

use super::game_thread::GameThreadHandle;
use super::{category, Error, ErrorCode, Outcome};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;

type Continuation<T> = Box<dyn FnOnce(Outcome<T>) + Send + 'static>;

struct CompletionSlot<T: Default + Send + 'static> {
    operation: &'static str,
    game_thread: GameThreadHandle,
    continuation: Mutex<Option<Continuation<T>>>,
}

impl<T: Default + Send + 'static> CompletionSlot<T> {
    fn resolve(&self, outcome: Outcome<T>) -> bool {
        let Some(continuation) = self.continuation.lock().take() else {
            tracing::debug!(
                target: category::CORE,
                operation = self.operation,
                "ignoring repeated native completion"
            );
            return false;
        };

        if let Some(error) = &outcome.error {
            tracing::debug!(
                target: category::CORE,
                operation = self.operation,
                %error,
                "native operation failed"
            );
        }

        self.game_thread.dispatch(move || continuation(outcome));
        true
    }
}

impl<T: Default + Send + 'static> Drop for CompletionSlot<T> {
    fn drop(&mut self) {
        if let Some(continuation) = self.continuation.get_mut().take() {
            tracing::warn!(
                target: category::CORE,
                operation = self.operation,
                "native layer dropped its completion without resolving it"
            );
            let outcome = Outcome::failure(Error::native(
                ErrorCode::Cancelled,
                "native operation finished without reporting a result",
            ));
            self.game_thread.dispatch(move || continuation(outcome));
        }
    }
}

/// Resolve-once handle given to the native layer.
pub struct NativeCompletion<T: Default + Send + 'static> {
    slot: Arc<CompletionSlot<T>>,
}

impl<T: Default + Send + 'static> Clone for NativeCompletion<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T: Default + Send + 'static> NativeCompletion<T> {
    fn new(
        operation: &'static str,
        game_thread: GameThreadHandle,
        continuation: Continuation<T>,
    ) -> Self {
        Self {
            slot: Arc::new(CompletionSlot {
                operation,
                game_thread,
                continuation: Mutex::new(Some(continuation)),
            }),
        }
    }

    /// Resolves with a success payload. Returns `false` if already resolved.
    pub fn succeed(&self, payload: T) -> bool {
        self.slot.resolve(Outcome::success(payload))
    }

    /// Resolves with an error. Returns `false` if already resolved.
    pub fn fail(&self, error: Error) -> bool {
        self.slot.resolve(Outcome::failure(error))
    }

    /// Resolves from the raw shape native SDKs report: a code, a message and an
    /// optional payload. The payload is discarded unless the code means success.
    pub fn complete(&self, raw_code: i32, message: &str, payload: Option<T>) -> bool {
        self.slot
            .resolve(Outcome::from_native(raw_code, message, payload))
    }

    pub fn resolve(&self, outcome: Outcome<T>) -> bool {
        self.slot.resolve(outcome)
    }

    pub fn is_resolved(&self) -> bool {
        self.slot.continuation.lock().is_none()
    }
}

/// Issues native operations and routes their completion to the main context.
#[derive(Clone)]
pub struct AsyncBridge {
    game_thread: GameThreadHandle,
}

impl AsyncBridge {
    pub fn new(game_thread: GameThreadHandle) -> Self {
        Self { game_thread }
    }

    pub fn game_thread(&self) -> &GameThreadHandle {
        &self.game_thread
    }

    /// Starts `op` right away and returns. `on_complete` runs once, on the main
    /// context, with whatever the native side reports first.
    pub fn issue<T, Op, F>(&self, operation: &'static str, op: Op, on_complete: F)
    where
        T: Default + Send + 'static,
        Op: FnOnce(NativeCompletion<T>),
        F: FnOnce(Outcome<T>) + Send + 'static,
    {
        let completion = NativeCompletion::new(
            operation,
            self.game_thread.clone(),
            Box::new(on_complete),
        );
        op(completion);
    }

    /// Runs `future` on the runtime and bridges its result.
    pub fn issue_future<T, Fut, F>(&self, operation: &'static str, future: Fut, on_complete: F)
    where
        T: Default + Send + 'static,
        Fut: Future<Output = Result<T, Error>> + Send + 'static,
        F: FnOnce(Outcome<T>) + Send + 'static,
    {
        let game_thread = self.game_thread.clone();
        self.issue(
            operation,
            move |completion| {
                game_thread.spawn(async move {
                    completion.resolve(Outcome::from_result(future.await));
                });
            },
            on_complete,
        );
    }
}
