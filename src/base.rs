use crate::context::{Context, ContextError};
use crate::error::{BoxError, Error};
use crate::executor::{Executor, ExecutorTask};
use crate::latch::Latch;
use crate::panic;
use parking_lot::Mutex;
use std::sync::Arc;

/// Something whose completion can be observed and waited for.
pub trait Awaitable {
    /// Whether the computation has finished. Never blocks.
    fn is_ready(&self) -> bool;

    /// Blocks until the computation finishes or the context is done.
    fn wait(&self);
}

/// Completion state shared by the spawned computation and every handle.
///
/// Exactly one producer publishes an outcome; any number of readers wait for it.
pub(crate) struct Base<T> {
    latch: Arc<Latch>,
    outcome: Mutex<Option<Result<T, Error>>>,
    ctx: Context,
}

impl<T> Base<T> {
    fn new(ctx: Context) -> Base<T> {
        Base {
            latch: Arc::new(Latch::new()),
            outcome: Mutex::new(None),
            ctx,
        }
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.latch.is_open()
    }

    /// Waits for completion, or for the context to finish first.
    pub(crate) fn wait(&self) -> Result<(), ContextError> {
        if self.is_ready() {
            tracing::trace!("future already ready");
            return Ok(());
        }
        self.latch.wait_with(&self.ctx).inspect_err(|err| {
            tracing::debug!(%err, "gave up waiting for computation");
        })
    }

    /// Stores the outcome and releases all waiters. Only the first call counts.
    ///
    /// Never blocks on waiters, so a computation whose waiters already gave up
    /// still retires.
    fn publish(&self, outcome: Result<T, Error>) -> bool {
        let mut slot = self.outcome.lock();
        if self.latch.is_open() {
            return false;
        }
        *slot = Some(outcome);
        self.latch.open()
    }

    fn read(&self) -> Result<T, Error>
    where
        T: Clone,
    {
        match &*self.outcome.lock() {
            Some(outcome) => outcome.clone(),
            None => Err(Error::Taken),
        }
    }

    pub(crate) fn get(&self) -> Result<T, Error>
    where
        T: Clone,
    {
        self.wait()?;
        self.read()
    }

    pub(crate) fn try_get(&self) -> Option<Result<T, Error>>
    where
        T: Clone,
    {
        self.is_ready().then(|| self.read())
    }

    /// Like [`Base::get`] but moves a successful value out of the slot.
    pub(crate) fn take(&self) -> Result<T, Error> {
        self.wait()?;
        let mut slot = self.outcome.lock();
        match slot.take() {
            Some(Ok(value)) => Ok(value),
            Some(Err(err)) => {
                *slot = Some(Err(err.clone()));
                Err(err)
            }
            None => Err(Error::Taken),
        }
    }
}

/// Launches `f` on `executor` and returns the state it will publish into.
///
/// If the executor refuses the task the outcome is published right away as
/// [`Error::Spawn`].
pub(crate) fn spawn<T, E, F, X>(executor: &X, ctx: &Context, f: F) -> Arc<Base<T>>
where
    T: Send + 'static,
    E: Into<BoxError>,
    F: FnOnce() -> Result<T, E> + Send + 'static,
    X: Executor + ?Sized,
{
    let base = Arc::new(Base::new(ctx.clone()));
    let producer = base.clone();
    let task = ExecutorTask::new(move || {
        let outcome = panic::catch(f);
        let failed = outcome.is_err();
        producer.publish(outcome);
        tracing::debug!(failed, "computation finished");
    });
    if let Err(err) = executor.execute(task) {
        tracing::error!(%err, "failed to spawn computation");
        base.publish(Err(Error::Spawn(Arc::new(err))));
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::thread;
    use std::time::Duration;

    struct Refuse;

    impl Executor for Refuse {
        fn execute(&self, _task: ExecutorTask) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::WouldBlock, "no threads left"))
        }
    }

    struct Inline;

    impl Executor for Inline {
        fn execute(&self, task: ExecutorTask) -> io::Result<()> {
            task.run();
            Ok(())
        }
    }

    #[test]
    fn publish_happens_once() {
        let base = Base::new(Context::background());
        assert!(base.publish(Ok(1)));
        assert!(!base.publish(Ok(2)));
        assert_eq!(base.get().unwrap(), 1);
    }

    #[test]
    fn refused_spawn_is_published_as_error() {
        let base = spawn(&Refuse, &Context::background(), || Ok::<_, BoxError>(1));
        assert!(base.is_ready());
        let err = base.get().unwrap_err();
        assert!(matches!(err, Error::Spawn(_)));
        assert_eq!(err.to_string(), "failed to spawn computation: no threads left");
    }

    #[test]
    fn inline_executor_is_ready_on_return() {
        let base = spawn(&Inline, &Context::background(), || Ok::<_, BoxError>("done"));
        assert!(base.is_ready());
        assert_eq!(base.try_get().unwrap().unwrap(), "done");
    }

    #[test]
    fn take_moves_value_out_once() {
        let base = spawn(&Inline, &Context::background(), || Ok::<_, BoxError>(vec![1, 2]));
        assert_eq!(base.take().unwrap(), vec![1, 2]);
        assert!(matches!(base.take(), Err(Error::Taken)));
        assert!(matches!(base.get(), Err(Error::Taken)));
    }

    #[test]
    fn take_leaves_errors_in_place() {
        let base = spawn(&Inline, &Context::background(), || Err::<u8, _>("error"));
        assert_eq!(base.take().unwrap_err().to_string(), "error");
        assert_eq!(base.get().unwrap_err().to_string(), "error");
    }

    #[test]
    fn cancelled_wait_does_not_mark_ready() {
        let (ctx, cancel) = Context::with_cancel(&Context::background());
        let base = spawn(&crate::executor::ThreadExecutor::default(), &ctx, || {
            thread::sleep(Duration::from_millis(200));
            Ok::<_, BoxError>(3)
        });
        cancel.cancel();
        assert_eq!(base.wait(), Err(ContextError::Canceled));
        assert!(!base.is_ready());
        assert!(base.try_get().is_none());

        while !base.is_ready() {
            thread::sleep(Duration::from_millis(10));
        }
        // Completion wins over the finished context once it is visible.
        assert_eq!(base.get().unwrap(), 3);
    }
}
