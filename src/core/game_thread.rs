//! The main execution context.
//!
//! The host owns a [`GameThread`] and drains it once per frame with [`GameThread::pump`]
//! (or awaits [`GameThread::tick`] in an async host). Everything else holds a cloneable
//! [`GameThreadHandle`] and uses it to hop back onto the main context from native
//! callback threads.

use super::category;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Handle, TryCurrentError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A continuation scheduled on the main context.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Owner side of the main execution context.
pub struct GameThread {
    handle: GameThreadHandle,
    receiver: mpsc::UnboundedReceiver<Task>,
}

impl GameThread {
    /// Creates a main context whose native work and timers run on `runtime`.
    pub fn new(runtime: Handle) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            handle: GameThreadHandle { sender, runtime },
            receiver,
        }
    }

    /// Creates a main context bound to the runtime of the calling task.
    pub fn try_current() -> Result<Self, TryCurrentError> {
        Ok(Self::new(Handle::try_current()?))
    }

    pub fn handle(&self) -> GameThreadHandle {
        self.handle.clone()
    }

    /// Runs every queued continuation without waiting. Returns how many ran.
    pub fn pump(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.receiver.try_recv() {
            task();
            ran += 1;
        }
        ran
    }

    /// Waits for at least one continuation, then drains the queue.
    pub async fn tick(&mut self) -> usize {
        match self.receiver.recv().await {
            Some(task) => {
                task();
                1 + self.pump()
            }
            None => 0,
        }
    }
}

/// Cloneable, thread-safe access to the main execution context.
#[derive(Clone)]
pub struct GameThreadHandle {
    sender: mpsc::UnboundedSender<Task>,
    runtime: Handle,
}

impl GameThreadHandle {
    /// Schedules `task` on the main context. Returns `false` when the context is gone.
    pub fn dispatch<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        if self.sender.send(Box::new(task)).is_err() {
            tracing::warn!(
                target: category::CORE,
                "main execution context is gone, dropping continuation"
            );
            return false;
        }
        true
    }

    /// Runs native work off the main context.
    pub fn spawn<Fut>(&self, future: Fut) -> JoinHandle<Fut::Output>
    where
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        self.runtime.spawn(future)
    }

    /// Fires `callback` on the main context after `first_delay` (defaults to `rate`),
    /// then every `rate` while `repeating`.
    ///
    /// The timer stops when the returned handle is cleared or dropped. A repeating
    /// timer with a zero rate is never armed.
    pub fn set_timer<F>(
        &self,
        rate: Duration,
        repeating: bool,
        first_delay: Option<Duration>,
        callback: F,
    ) -> TimerHandle
    where
        F: FnMut() + Send + 'static,
    {
        if repeating && rate.is_zero() {
            return TimerHandle::inactive();
        }

        let active = Arc::new(AtomicBool::new(true));
        let callback = Arc::new(Mutex::new(callback));
        let sender = self.sender.clone();
        let first = first_delay.unwrap_or(rate);
        let armed = Arc::clone(&active);

        let task = self.runtime.spawn(async move {
            tokio::time::sleep(first).await;
            loop {
                if !armed.load(Ordering::Acquire) {
                    break;
                }
                let callback = Arc::clone(&callback);
                let armed_on_fire = Arc::clone(&armed);
                let fire: Task = Box::new(move || {
                    // A tick may already be queued when the timer is cleared.
                    if armed_on_fire.load(Ordering::Acquire) {
                        let mut callback = callback.lock();
                        (*callback)();
                    }
                });
                if sender.send(fire).is_err() || !repeating {
                    break;
                }
                tokio::time::sleep(rate).await;
            }
        });

        TimerHandle {
            active,
            task: Some(task),
        }
    }
}

/// Keeps a timer armed. Clearing or dropping it stops further firings.
pub struct TimerHandle {
    active: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl TimerHandle {
    fn inactive() -> Self {
        Self {
            active: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
            && self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn clear(&mut self) {
        self.active.store(false, Ordering::Release);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.clear();
    }
}
