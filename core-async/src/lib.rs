//! Async runtime facade.
//!
//! Downstream crates reach the executor, timers, channels and cancellation
//! primitives only through this crate, so the engine never names `tokio`
//! directly and tests share one entry point (`#[core_async::test]`).
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_async::sync::CancellationToken;
//! use core_async::time::{sleep, Duration};
//!
//! #[core_async::test]
//! async fn waits_until_cancelled() {
//!     let token = CancellationToken::new();
//!     let child = token.clone();
//!     core_async::spawn(async move {
//!         sleep(Duration::from_millis(5)).await;
//!         child.cancel();
//!     });
//!     token.cancelled().await;
//! }
//! ```

pub use core_async_macros::{main, test};

pub mod fs;
pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

pub use task::spawn;
pub use time::{sleep, Duration, Instant};
