//! Execution context and the blocking driver.
//!
//! Every I/O operation in this crate is authored once, as an `async fn` that
//! takes an [`IoContext`]. The context carries a single piece of information:
//! whether the surrounding caller is running under an async scheduler. In
//! async mode, storage access goes through `tokio::fs` and suspends at I/O
//! boundaries; in blocking mode it goes through `std::fs` and never yields.
//!
//! The `*_sync` entry points in [`crate::io`] are thin wrappers built on
//! [`run_sync`]: a private current-thread tokio runtime drives the async
//! operation to completion, so blocking callers never manage a scheduler.

use std::future::Future;

use crate::error::{Error, Result};

/// Tells every I/O operation whether the caller runs under an async scheduler.
///
/// The flag is deliberately three-valued: [`IoContext::default`] leaves it
/// unset, and any storage-touching operation handed an unset context fails
/// with [`Error::MissingAsyncFlag`] before touching storage. There is no
/// silent default — the caller must state which world it lives in.
///
/// # Example
///
/// ```rust
/// use immio::IoContext;
///
/// let ctx = IoContext::asynchronous();
/// assert_eq!(ctx.async_mode().unwrap(), true);
///
/// let ctx = IoContext::blocking();
/// assert_eq!(ctx.async_mode().unwrap(), false);
///
/// // Unset: a configuration error, not a default.
/// assert!(IoContext::default().async_mode().is_err());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoContext {
    async_mode: Option<bool>,
}

impl IoContext {
    /// Context for callers already inside an async runtime.
    pub fn asynchronous() -> Self {
        Self {
            async_mode: Some(true),
        }
    }

    /// Context for plain blocking callers.
    pub fn blocking() -> Self {
        Self {
            async_mode: Some(false),
        }
    }

    /// Whether storage access should suspend (`true`) or block (`false`).
    ///
    /// Fails with [`Error::MissingAsyncFlag`] when the flag was never set.
    pub fn async_mode(&self) -> Result<bool> {
        self.async_mode.ok_or(Error::MissingAsyncFlag)
    }
}

/// Drive an async operation to completion from blocking code.
///
/// Builds a private current-thread tokio runtime for the duration of the
/// call, so this works from contexts that are not inside any runtime and
/// leaks nothing across calls. The wrapped operation's result or failure is
/// returned unchanged; the only failure added here is runtime construction
/// itself, which surfaces as [`Error::Io`].
///
/// Calling this from inside an async runtime is a programming error and will
/// panic in tokio's `block_on`; use the async flavor of the operation there.
///
/// # Example
///
/// ```rust,no_run
/// use immio::{context::run_sync, CodecHints, IoContext};
///
/// let pixels = run_sync(immio::imread(
///     "photo.png",
///     &CodecHints::default(),
///     &IoContext::blocking(),
/// ))?;
/// # Ok::<(), immio::Error>(())
/// ```
pub fn run_sync<T, F>(op: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(op)
}
