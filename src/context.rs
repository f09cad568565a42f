//! Cancellation contexts that bound how long a waiter is willing to block.
//!
//! A [`Context`] is a cheap, cloneable handle onto a chain of nodes. Each node
//! may carry a deadline, a cancel state, or both; a context is *done* as soon
//! as any node in its chain is cancelled or past its deadline. Contexts only
//! limit the patience of whoever is waiting on them. They never stop work that
//! is already running.
//!
//! ```
//! use spawn_future::context::{Context, ContextError};
//! use std::time::Duration;
//!
//! let (ctx, cancel) = Context::with_timeout(&Context::background(), Duration::from_secs(5));
//! assert!(!ctx.is_done());
//! cancel.cancel();
//! assert_eq!(ctx.err(), Some(ContextError::Canceled));
//! ```

use crate::latch::Latch;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// The reason a context finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ContextError {
    /// [`CancelHandle::cancel`] was called on the context or one of its parents.
    #[error("context canceled")]
    Canceled,
    /// The deadline of the context or one of its parents has passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Something that wants to hear about cancellation.
///
/// Observers are invoked on the cancelling thread, after the cancel state has
/// been recorded, with no context lock held.
pub trait Notify: Send + Sync {
    fn notify(&self);
}

#[derive(Default)]
struct CancelState {
    err: Option<ContextError>,
    next_id: u64,
    observers: HashMap<u64, Weak<dyn Notify>>,
}

struct Node {
    parent: Option<Context>,
    deadline: Option<Instant>,
    cancel: Option<Mutex<CancelState>>,
}

/// A deadline/cancel signal shared between a caller and the waits it bounds.
#[derive(Clone)]
pub struct Context {
    node: Arc<Node>,
}

impl Context {
    /// A context that is never done and has no deadline.
    pub fn background() -> Context {
        Context {
            node: Arc::new(Node {
                parent: None,
                deadline: None,
                cancel: None,
            }),
        }
    }

    /// Derives a child that can be cancelled through the returned handle.
    pub fn with_cancel(parent: &Context) -> (Context, CancelHandle) {
        Context::derive(parent, None)
    }

    /// Derives a child that becomes done at `deadline` or when cancelled.
    pub fn with_deadline(parent: &Context, deadline: Instant) -> (Context, CancelHandle) {
        Context::derive(parent, Some(deadline))
    }

    /// Derives a child that becomes done `timeout` from now or when cancelled.
    ///
    /// A timeout too large to represent as an `Instant` means no deadline.
    pub fn with_timeout(parent: &Context, timeout: Duration) -> (Context, CancelHandle) {
        Context::derive(parent, Instant::now().checked_add(timeout))
    }

    fn derive(parent: &Context, deadline: Option<Instant>) -> (Context, CancelHandle) {
        let ctx = Context {
            node: Arc::new(Node {
                parent: Some(parent.clone()),
                deadline,
                cancel: Some(Mutex::new(CancelState::default())),
            }),
        };
        let handle = CancelHandle { ctx: ctx.clone() };
        (ctx, handle)
    }

    fn ancestry(&self) -> impl Iterator<Item = &Context> {
        std::iter::successors(Some(self), |ctx| ctx.node.parent.as_ref())
    }

    /// Why the context is done, or `None` while it is still live.
    ///
    /// Walks the chain from this node up to the root; the nearest node that
    /// has finished supplies the reason.
    pub fn err(&self) -> Option<ContextError> {
        let now = Instant::now();
        for ctx in self.ancestry() {
            if let Some(cancel) = &ctx.node.cancel {
                if let Some(err) = cancel.lock().err {
                    return Some(err);
                }
            }
            if ctx.node.deadline.is_some_and(|deadline| now >= deadline) {
                return Some(ContextError::DeadlineExceeded);
            }
        }
        None
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// The earliest deadline anywhere in the chain.
    pub fn deadline(&self) -> Option<Instant> {
        self.ancestry().filter_map(|ctx| ctx.node.deadline).min()
    }

    /// Whether this context can ever become done.
    pub fn can_finish(&self) -> bool {
        self.ancestry()
            .any(|ctx| ctx.node.cancel.is_some() || ctx.node.deadline.is_some())
    }

    /// Blocks until the context is done and returns the reason.
    ///
    /// On a context that can never finish this blocks forever.
    pub fn done_wait(&self) -> ContextError {
        let latch = Arc::new(Latch::new());
        loop {
            if let Err(err) = latch.wait_with(self) {
                return err;
            }
        }
    }

    /// Registers `observer` to be notified when any cancellable node in the
    /// chain is cancelled.
    ///
    /// Deadlines are not pushed to observers; callers that care bound their
    /// own sleep by [`Context::deadline`]. The registration lasts until the
    /// returned [`Subscription`] is dropped.
    pub fn subscribe(&self, observer: Weak<dyn Notify>) -> Subscription {
        let mut entries = Vec::new();
        for ctx in self.ancestry() {
            if let Some(cancel) = &ctx.node.cancel {
                let mut state = cancel.lock();
                let id = state.next_id;
                state.next_id += 1;
                state.observers.insert(id, observer.clone());
                entries.push((ctx.clone(), id));
            }
        }
        Subscription { entries }
    }
}

impl Default for Context {
    fn default() -> Context {
        Context::background()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("deadline", &self.deadline())
            .field("err", &self.err())
            .finish()
    }
}

/// Cancels the context it was created with.
///
/// Dropping the handle does not cancel anything.
#[derive(Clone)]
pub struct CancelHandle {
    ctx: Context,
}

impl CancelHandle {
    /// Marks the context as cancelled and wakes its observers.
    ///
    /// Only the first call has an effect; a context that already finished
    /// through its deadline or a parent keeps that reason.
    pub fn cancel(&self) {
        let Some(cancel) = &self.ctx.node.cancel else {
            return;
        };
        let reason = self.ctx.err().unwrap_or(ContextError::Canceled);
        let observers: Vec<_> = {
            let mut state = cancel.lock();
            if state.err.is_some() {
                return;
            }
            state.err = Some(reason);
            state.observers.drain().map(|(_, observer)| observer).collect()
        };
        tracing::debug!(%reason, observers = observers.len(), "context canceled");
        for observer in observers.iter().filter_map(Weak::upgrade) {
            observer.notify();
        }
    }

    /// The context this handle cancels.
    pub fn context(&self) -> &Context {
        &self.ctx
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle").field("ctx", &self.ctx).finish()
    }
}

/// Keeps an observer registered with a context; deregisters on drop.
#[must_use = "dropping a Subscription deregisters the observer"]
pub struct Subscription {
    entries: Vec<(Context, u64)>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        for (ctx, id) in self.entries.drain(..) {
            if let Some(cancel) = &ctx.node.cancel {
                cancel.lock().observers.remove(&id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl Notify for Counter {
        fn notify(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn observer_count(ctx: &Context) -> usize {
        ctx.node
            .cancel
            .as_ref()
            .map_or(0, |cancel| cancel.lock().observers.len())
    }

    #[test]
    fn background_is_never_done() {
        let ctx = Context::background();
        assert_eq!(ctx.err(), None);
        assert_eq!(ctx.deadline(), None);
        assert!(!ctx.can_finish());
    }

    #[test]
    fn cancel_is_idempotent() {
        let (ctx, cancel) = Context::with_cancel(&Context::background());
        assert!(ctx.can_finish());
        assert!(!ctx.is_done());
        cancel.cancel();
        cancel.cancel();
        assert_eq!(ctx.err(), Some(ContextError::Canceled));
    }

    #[test]
    fn unrepresentable_timeout_has_no_deadline() {
        let (ctx, cancel) = Context::with_timeout(&Context::background(), Duration::MAX);
        assert!(!ctx.is_done());
        assert_eq!(ctx.deadline(), None);
        assert!(ctx.can_finish());
        cancel.cancel();
        assert_eq!(ctx.err(), Some(ContextError::Canceled));
    }

    #[test]
    fn timeout_reports_deadline_exceeded() {
        let (ctx, _cancel) =
            Context::with_timeout(&Context::background(), Duration::from_millis(20));
        assert!(!ctx.is_done());
        thread::sleep(Duration::from_millis(40));
        assert_eq!(ctx.err(), Some(ContextError::DeadlineExceeded));
    }

    #[test]
    fn cancel_after_deadline_keeps_deadline_reason() {
        let (ctx, cancel) = Context::with_deadline(&Context::background(), Instant::now());
        assert_eq!(ctx.err(), Some(ContextError::DeadlineExceeded));
        cancel.cancel();
        assert_eq!(ctx.err(), Some(ContextError::DeadlineExceeded));
    }

    #[test]
    fn child_sees_parent_cancellation() {
        let (parent, cancel) = Context::with_cancel(&Context::background());
        let (child, _child_cancel) = Context::with_cancel(&parent);
        cancel.cancel();
        assert_eq!(child.err(), Some(ContextError::Canceled));
    }

    #[test]
    fn child_of_done_parent_is_born_done() {
        let (parent, cancel) = Context::with_cancel(&Context::background());
        cancel.cancel();
        let (child, _) = Context::with_timeout(&parent, Duration::from_secs(60));
        assert!(child.is_done());
    }

    #[test]
    fn parent_is_unaffected_by_child() {
        let (parent, _) = Context::with_cancel(&Context::background());
        let (child, cancel) = Context::with_cancel(&parent);
        cancel.cancel();
        assert!(child.is_done());
        assert!(!parent.is_done());
    }

    #[test]
    fn deadline_is_earliest_in_chain() {
        let now = Instant::now();
        let early = now + Duration::from_secs(1);
        let late = now + Duration::from_secs(10);
        let (parent, _) = Context::with_deadline(&Context::background(), early);
        let (child, _) = Context::with_deadline(&parent, late);
        assert_eq!(child.deadline(), Some(early));
    }

    #[test]
    fn observers_are_notified_once_and_deregistered() {
        let (parent, cancel) = Context::with_cancel(&Context::background());
        let (child, _) = Context::with_cancel(&parent);
        let counter = Arc::new(Counter::default());
        let observer: Weak<dyn Notify> = Arc::downgrade(&counter) as Weak<dyn Notify>;

        let sub = child.subscribe(observer);
        assert_eq!(observer_count(&parent), 1);
        assert_eq!(observer_count(&child), 1);

        cancel.cancel();
        cancel.cancel();
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);

        drop(sub);
        assert_eq!(observer_count(&parent), 0);
        assert_eq!(observer_count(&child), 0);
    }

    #[test]
    fn dropped_observer_is_skipped() {
        let (ctx, cancel) = Context::with_cancel(&Context::background());
        let counter = Arc::new(Counter::default());
        let _sub = ctx.subscribe(Arc::downgrade(&counter) as Weak<dyn Notify>);
        drop(counter);
        cancel.cancel();
        assert!(ctx.is_done());
    }

    #[test]
    fn done_wait_wakes_on_cancel_from_other_thread() {
        let (ctx, cancel) = Context::with_cancel(&Context::background());
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            cancel.cancel();
        });
        assert_eq!(ctx.done_wait(), ContextError::Canceled);
        canceller.join().unwrap();
    }

    #[test]
    fn done_wait_wakes_at_deadline() {
        let start = Instant::now();
        let (ctx, _cancel) =
            Context::with_timeout(&Context::background(), Duration::from_millis(30));
        assert_eq!(ctx.done_wait(), ContextError::DeadlineExceeded);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn error_messages() {
        assert_eq!(ContextError::Canceled.to_string(), "context canceled");
        assert_eq!(
            ContextError::DeadlineExceeded.to_string(),
            "context deadline exceeded"
        );
    }
}
