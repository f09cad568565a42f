//! Thread-backed futures whose waits are bounded by a cancellation [`Context`].
//!
//! [`execute`] and [`execute_single`] start a computation on its own thread
//! right away and hand back a cloneable handle. Any number of threads may poll
//! [`is_ready`](Awaitable::is_ready) or block in `get`; a waiter whose context
//! finishes first gets [`Error::Canceled`] while the computation runs on.
//!
//! ```
//! use spawn_future::{execute_single, Context};
//! use std::time::Duration;
//!
//! let (ctx, _cancel) = Context::with_timeout(&Context::background(), Duration::from_secs(5));
//! let future = execute_single(&ctx, || "42".parse::<u32>());
//! assert_eq!(future.get().unwrap(), 42);
//! ```

pub use base::Awaitable;
pub use context::{CancelHandle, Context, ContextError};
pub use error::{BoxError, Error};
pub use execute::{execute, execute_on, EmptyFuture};
pub use execute_single::{execute_single, execute_single_on, SingleFuture};
pub use executor::{Executor, ExecutorTask, ThreadExecutor};
pub use latch::Latch;

mod base;
pub mod context;
mod error;
mod execute;
mod execute_single;
pub mod executor;
pub mod latch;
mod panic;
