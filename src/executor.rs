//! Where computations run.
//!
//! Every launched computation gets its own unit of execution; there is no
//! pool and no queue. [`ThreadExecutor`] starts one named OS thread per task.

use std::borrow::Cow;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

static NEXT_THREAD_ID: AtomicUsize = AtomicUsize::new(0);

pub struct ExecutorTask {
    body: Box<dyn FnOnce() + Send + 'static>,
}

impl ExecutorTask {
    pub fn new<F: FnOnce() + Send + 'static>(body: F) -> ExecutorTask {
        ExecutorTask {
            body: Box::new(body),
        }
    }

    pub fn run(self) {
        (self.body)()
    }
}

impl std::fmt::Debug for ExecutorTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ExecutorTask")
    }
}

/// Starts tasks.
///
/// `execute` must either arrange for the task to run exactly once or return
/// an error. Dropping the task without running it while returning `Ok` leaves
/// the corresponding future unready forever.
pub trait Executor {
    fn execute(&self, task: ExecutorTask) -> io::Result<()>;
}

impl<X: Executor + ?Sized> Executor for &X {
    fn execute(&self, task: ExecutorTask) -> io::Result<()> {
        (**self).execute(task)
    }
}

impl<X: Executor + ?Sized> Executor for Arc<X> {
    fn execute(&self, task: ExecutorTask) -> io::Result<()> {
        (**self).execute(task)
    }
}

/// Runs each task on a dedicated, detached OS thread.
#[derive(Debug, Clone)]
pub struct ThreadExecutor {
    name_prefix: Cow<'static, str>,
    stack_size: Option<usize>,
}

impl ThreadExecutor {
    pub const DEFAULT_NAME_PREFIX: &'static str = "spawn-future";

    pub fn builder() -> Builder {
        Builder::default()
    }

    pub fn name_prefix(&self) -> &str {
        &self.name_prefix
    }

    pub fn stack_size(&self) -> Option<usize> {
        self.stack_size
    }
}

impl Default for ThreadExecutor {
    fn default() -> ThreadExecutor {
        Builder::default().build()
    }
}

impl Executor for ThreadExecutor {
    fn execute(&self, task: ExecutorTask) -> io::Result<()> {
        let id = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
        let name = format!("{}-{}", self.name_prefix, id);
        let mut builder = thread::Builder::new().name(name.clone());
        if let Some(size) = self.stack_size {
            builder = builder.stack_size(size);
        }
        // Detached: the JoinHandle is dropped, the thread retires on its own.
        builder.spawn(move || task.run())?;
        tracing::debug!(thread = %name, "spawned computation");
        Ok(())
    }
}

/// Configures a [`ThreadExecutor`].
#[derive(Debug, Clone)]
pub struct Builder {
    name_prefix: Cow<'static, str>,
    stack_size: Option<usize>,
}

impl Default for Builder {
    fn default() -> Builder {
        Builder {
            name_prefix: Cow::Borrowed(ThreadExecutor::DEFAULT_NAME_PREFIX),
            stack_size: None,
        }
    }
}

impl Builder {
    /// Threads are named `<prefix>-<n>`.
    ///
    /// NUL bytes are stripped; thread names cannot carry them.
    pub fn name_prefix(mut self, prefix: impl Into<Cow<'static, str>>) -> Builder {
        let prefix = prefix.into();
        self.name_prefix = if prefix.contains('\0') {
            Cow::Owned(prefix.replace('\0', ""))
        } else {
            prefix
        };
        self
    }

    /// Stack size in bytes for each thread; the platform default when unset.
    pub fn stack_size(mut self, size: usize) -> Builder {
        self.stack_size = Some(size);
        self
    }

    pub fn build(self) -> ThreadExecutor {
        ThreadExecutor {
            name_prefix: self.name_prefix,
            stack_size: self.stack_size,
        }
    }
}
