//! A one-shot broadcast latch.
//!
//! Once opened a latch stays open: every thread blocked in [`Latch::wait`]
//! is released and every later call returns straight away. Opening never
//! waits for a receiver.

use crate::context::{Context, ContextError, Notify};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

pub struct Latch {
    open: AtomicBool,
    lock: Mutex<()>,
    cvar: Condvar,
}

impl Latch {
    pub fn new() -> Latch {
        Latch {
            open: AtomicBool::new(false),
            lock: Mutex::new(()),
            cvar: Condvar::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Opens the latch and releases all waiters.
    ///
    /// Returns `true` for the call that actually opened it.
    pub fn open(&self) -> bool {
        let _guard = self.lock.lock();
        let first = !self.open.swap(true, Ordering::AcqRel);
        self.cvar.notify_all();
        first
    }

    /// Blocks until the latch is open.
    pub fn wait(&self) {
        if self.is_open() {
            return;
        }
        let mut guard = self.lock.lock();
        while !self.is_open() {
            self.cvar.wait(&mut guard);
        }
    }

    /// Blocks until the latch is open or `ctx` is done.
    ///
    /// An open latch wins over a finished context when both hold.
    pub fn wait_with(self: &Arc<Self>, ctx: &Context) -> Result<(), ContextError> {
        if self.is_open() {
            return Ok(());
        }
        if !ctx.can_finish() {
            self.wait();
            return Ok(());
        }

        // Subscribe before the first check so a cancel racing with us is not lost:
        // the notifier needs `lock`, which we only give up inside the condvar wait.
        let observer: Weak<dyn Notify> = Arc::downgrade(self) as Weak<dyn Notify>;
        let _subscription = ctx.subscribe(observer);
        let deadline = ctx.deadline();

        let mut guard = self.lock.lock();
        loop {
            if self.is_open() {
                return Ok(());
            }
            if let Some(err) = ctx.err() {
                return Err(err);
            }
            match deadline {
                Some(deadline) => {
                    self.cvar.wait_until(&mut guard, deadline);
                }
                None => self.cvar.wait(&mut guard),
            }
        }
    }
}

impl Default for Latch {
    fn default() -> Latch {
        Latch::new()
    }
}

impl Notify for Latch {
    fn notify(&self) {
        let _guard = self.lock.lock();
        self.cvar.notify_all();
    }
}

impl std::fmt::Debug for Latch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Latch").field("open", &self.is_open()).finish()
    }
}
