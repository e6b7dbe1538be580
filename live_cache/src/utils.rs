//! A few helpers to build cache-related code.
use std::{
    future::Future,
    panic::{resume_unwind, AssertUnwindSafe},
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use futures::FutureExt;
use tokio::task::JoinHandle;

use crate::interfaces::DynError;

/// Holds a tokio task that is aborted when the handle is dropped.
///
/// [`JoinError`]s are handled like:
/// - **panic:** wrapped via [`CatchUnwindDynErrorExt`]
/// - **runtime lost:** converted into [`DynError`]
///
///
/// [`JoinError`]: tokio::task::JoinError
pub struct TokioTask<T>(JoinHandle<Result<T, DynError>>)
where
    T: Send + 'static;

impl<T> TokioTask<T>
where
    T: Send + 'static,
{
    /// Spawn new task on the current runtime.
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, DynError>> + Send + 'static,
    {
        Self(tokio::spawn(future.catch_unwind_dyn_error()))
    }
}

impl<T> std::fmt::Debug for TokioTask<T>
where
    T: Send + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokioTask")
            .field("finished", &self.0.is_finished())
            .finish()
    }
}

impl<T> Drop for TokioTask<T>
where
    T: Send + 'static,
{
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl<T> Future for TokioTask<T>
where
    T: Send + 'static,
{
    type Output = Result<T, DynError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Poll::Ready(match std::task::ready!(self.0.poll_unpin(cx)) {
            Ok(v) => v,
            Err(e) if e.is_cancelled() => Err(str_err("Runtime was shut down")),
            Err(e) => resume_unwind(e.into_panic()),
        })
    }
}

/// Extension trait to catch a panic and convert the message into a [`DynError`].
///
/// This automatically [assumes unwind safety](AssertUnwindSafe).
///
/// The [`DynError`] can be [cast down] to [`PanicError`].
///
///
// Note: Linking to `dyn Error` doesn't really work via intradoc links, see
// https://github.com/rust-lang/rust/issues/74563
/// [cast down]: https://doc.rust-lang.org/std/error/trait.Error.html#method.downcast_ref-2
pub trait CatchUnwindDynErrorExt {
    type Output;

    /// Catch unwind and convert panic message into a [`DynError`].
    fn catch_unwind_dyn_error(self) -> impl Future<Output = Result<Self::Output, DynError>> + Send;
}

impl<F, T> CatchUnwindDynErrorExt for F
where
    F: Future<Output = Result<T, DynError>> + Send,
{
    type Output = T;

    async fn catch_unwind_dyn_error(self) -> Result<Self::Output, DynError> {
        match AssertUnwindSafe(self).catch_unwind().await {
            Ok(res) => res,
            Err(e) => {
                let msg = if let Some(s) = e.downcast_ref::<String>() {
                    s.clone()
                } else if let Some(s) = e.downcast_ref::<&str>() {
                    (*s).to_owned()
                } else {
                    "<unknown>".to_owned()
                };

                Err(Arc::new(PanicError {
                    message: StringError(msg),
                }))
            }
        }
    }
}

/// Error produced by [`CatchUnwindDynErrorExt`].
#[derive(Debug)]
pub struct PanicError {
    message: StringError,
}

impl PanicError {
    /// Panic message.
    pub fn message(&self) -> &str {
        self.message.inner()
    }
}

impl std::fmt::Display for PanicError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "panic: {}", self.message)
    }
}

impl std::error::Error for PanicError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.message)
    }
}

/// Create a [`DynError`] from a string.
///
/// The contained error can be [cast down] to [`StringError`].
///
///
// Note: Linking to `dyn Error` doesn't really work via intradoc links, see
// https://github.com/rust-lang/rust/issues/74563
/// [cast down]: https://doc.rust-lang.org/std/error/trait.Error.html#method.downcast_ref-2
pub fn str_err(s: &str) -> DynError {
    Arc::new(StringError(s.to_owned()))
}

/// Error produced by [`str_err`].
#[derive(Debug)]
pub struct StringError(String);

impl StringError {
    /// Get string.
    pub fn inner(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StringError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for StringError {}
