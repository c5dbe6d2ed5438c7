//! Task spawning.
//!
//! A run's worker is a single spawned task; filesystem walks and other
//! blocking reads go through [`spawn_blocking`] so they never stall it.
//!
//! # Examples
//!
//! ```rust
//! use core_async::task;
//!
//! # async fn example() {
//! let handle = task::spawn(async { 42 });
//! assert_eq!(handle.await.unwrap(), 42);
//!
//! let listing = task::spawn_blocking(|| vec!["a.jpg"]).await.unwrap();
//! assert_eq!(listing.len(), 1);
//! # }
//! ```

pub use tokio::task::{spawn_blocking, yield_now, JoinError, JoinHandle};

/// Spawns a new asynchronous task.
///
/// # Arguments
///
/// * `future` - The future to execute
///
/// # Returns
///
/// A `JoinHandle` that can be awaited to get the task's result.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::task::spawn(future)
}

/// Result type for task operations.
pub type Result<T> = std::result::Result<T, JoinError>;
