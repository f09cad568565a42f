use crate::base::{self, Awaitable, Base};
use crate::context::Context;
use crate::error::{BoxError, Error};
use crate::executor::{Executor, ThreadExecutor};
use std::fmt;
use std::sync::Arc;

/// Handle to a computation that only reports success or failure.
///
/// Clones share the same computation; any of them may be waited on from any thread.
#[derive(Clone)]
pub struct EmptyFuture {
    base: Arc<Base<()>>,
}

impl EmptyFuture {
    pub fn is_ready(&self) -> bool {
        self.base.is_ready()
    }

    /// Blocks until the computation finishes or the context is done.
    pub fn wait(&self) {
        let _ = self.base.wait();
    }

    /// Waits, then returns the computation's error, if any.
    ///
    /// Returns [`Error::Canceled`] when the context finished first; the
    /// computation keeps running in the background regardless.
    pub fn get(&self) -> Result<(), Error> {
        self.base.get()
    }

    /// The outcome if the computation has already finished, without blocking.
    pub fn try_get(&self) -> Option<Result<(), Error>> {
        self.base.try_get()
    }
}

impl Awaitable for EmptyFuture {
    fn is_ready(&self) -> bool {
        EmptyFuture::is_ready(self)
    }

    fn wait(&self) {
        EmptyFuture::wait(self)
    }
}

impl fmt::Debug for EmptyFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmptyFuture")
            .field("ready", &self.is_ready())
            .finish()
    }
}

/// Runs `f` on its own thread and returns a handle to its outcome.
///
/// The computation starts immediately. `ctx` bounds only how long `wait` and
/// `get` block; it never interrupts `f`. A panic in `f` is reported as
/// [`Error::Panicked`].
///
/// ```
/// use spawn_future::{execute, Context};
///
/// let future = execute(&Context::background(), || Err::<(), _>("error"));
/// assert_eq!(future.get().unwrap_err().to_string(), "error");
/// ```
pub fn execute<E, F>(ctx: &Context, f: F) -> EmptyFuture
where
    E: Into<BoxError>,
    F: FnOnce() -> Result<(), E> + Send + 'static,
{
    execute_on(&ThreadExecutor::default(), ctx, f)
}

/// Like [`execute`], launching through `executor`.
pub fn execute_on<X, E, F>(executor: &X, ctx: &Context, f: F) -> EmptyFuture
where
    X: Executor + ?Sized,
    E: Into<BoxError>,
    F: FnOnce() -> Result<(), E> + Send + 'static,
{
    EmptyFuture {
        base: base::spawn(executor, ctx, f),
    }
}
