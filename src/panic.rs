use crate::error::{BoxError, Error};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Runs `f`, turning a panic into [`Error::Panicked`] instead of unwinding.
pub(crate) fn catch<T, E, F>(f: F) -> Result<T, Error>
where
    F: FnOnce() -> Result<T, E>,
    E: Into<BoxError>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(Error::failed(err)),
        Err(payload) => {
            let message = payload_to_string(&*payload);
            tracing::warn!(%message, "computation panicked");
            Err(Error::Panicked(message))
        }
    }
}

fn payload_to_string(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
