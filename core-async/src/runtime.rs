//! Runtime utilities.
//!
//! Hosts that drive the engine from a non-async UI thread use [`block_on`] or
//! hold a [`Handle`] to dispatch runs; they never depend on Tokio directly.

pub use tokio::runtime::{Builder, Handle, Runtime};

/// Drives `future` to completion on a fresh current-thread runtime.
///
/// # Panics
///
/// Panics if the runtime cannot be created, which only happens when the
/// process is out of OS resources.
pub fn block_on<F>(future: F) -> F::Output
where
    F: std::future::Future,
{
    Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("core_async::runtime::block_on: failed to build Tokio runtime")
        .block_on(future)
}
