use crate::context::ContextError;
use std::io;
use std::sync::Arc;

/// Boxed error accepted from user computations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why a future did not produce a value.
///
/// Cloneable so that every observer of a shared future can be handed its own copy.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The computation returned this error.
    #[error(transparent)]
    Failed(Arc<dyn std::error::Error + Send + Sync + 'static>),
    /// The computation panicked; holds the panic message.
    #[error("{0}")]
    Panicked(String),
    /// The waiter's context finished before the computation did.
    #[error(transparent)]
    Canceled(#[from] ContextError),
    /// The executor could not start the computation.
    #[error("failed to spawn computation: {0}")]
    Spawn(#[source] Arc<io::Error>),
    /// The value was already moved out through another handle.
    #[error("result already taken")]
    Taken,
}

impl Error {
    pub(crate) fn failed(err: impl Into<BoxError>) -> Error {
        Error::Failed(Arc::from(err.into()))
    }

    /// The error returned by the computation, if that is what this is.
    ///
    /// Use it to downcast back to the computation's own error type.
    pub fn failure(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Error::Failed(err) => Some(&**err),
            _ => None,
        }
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, Error::Canceled(_))
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, Error::Panicked(_))
    }
}
