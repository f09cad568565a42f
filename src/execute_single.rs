use crate::base::{self, Awaitable, Base};
use crate::context::Context;
use crate::error::{BoxError, Error};
use crate::executor::{Executor, ThreadExecutor};
use std::fmt;
use std::sync::Arc;

/// Handle to a computation that produces a value of type `T`.
pub struct SingleFuture<T> {
    base: Arc<Base<T>>,
}

impl<T> SingleFuture<T> {
    pub fn is_ready(&self) -> bool {
        self.base.is_ready()
    }

    /// Blocks until the computation finishes or the context is done.
    pub fn wait(&self) {
        let _ = self.base.wait();
    }

    /// Waits, then returns the value or the error that replaced it.
    ///
    /// No value is produced on any failure, including [`Error::Canceled`] when
    /// the context finished first and [`Error::Panicked`].
    pub fn get(&self) -> Result<T, Error>
    where
        T: Clone,
    {
        self.base.get()
    }

    /// The outcome if the computation has already finished, without blocking.
    pub fn try_get(&self) -> Option<Result<T, Error>>
    where
        T: Clone,
    {
        self.base.try_get()
    }

    /// Waits, then moves the value out without cloning it.
    ///
    /// Other handles to the same computation see [`Error::Taken`] afterwards.
    /// A cancelled wait leaves the value in place for them.
    pub fn into_result(self) -> Result<T, Error> {
        self.base.take()
    }
}

impl<T> Clone for SingleFuture<T> {
    fn clone(&self) -> Self {
        SingleFuture {
            base: self.base.clone(),
        }
    }
}

impl<T> Awaitable for SingleFuture<T> {
    fn is_ready(&self) -> bool {
        SingleFuture::is_ready(self)
    }

    fn wait(&self) {
        SingleFuture::wait(self)
    }
}

impl<T> fmt::Debug for SingleFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleFuture")
            .field("ready", &self.is_ready())
            .finish()
    }
}

/// Runs `f` on its own thread and returns a handle to the value it produces.
///
/// Same contract as [`execute`](crate::execute), generalized over the result.
///
/// ```
/// use spawn_future::{execute_single, Context};
///
/// let future = execute_single(&Context::background(), || Ok::<_, std::io::Error>(1));
/// assert_eq!(future.get().unwrap(), 1);
/// ```
pub fn execute_single<T, E, F>(ctx: &Context, f: F) -> SingleFuture<T>
where
    T: Send + 'static,
    E: Into<BoxError>,
    F: FnOnce() -> Result<T, E> + Send + 'static,
{
    execute_single_on(&ThreadExecutor::default(), ctx, f)
}

/// Like [`execute_single`], launching through `executor`.
pub fn execute_single_on<X, T, E, F>(executor: &X, ctx: &Context, f: F) -> SingleFuture<T>
where
    X: Executor + ?Sized,
    T: Send + 'static,
    E: Into<BoxError>,
    F: FnOnce() -> Result<T, E> + Send + 'static,
{
    SingleFuture {
        base: base::spawn(executor, ctx, f),
    }
}
