//! Synchronization primitives.
//!
//! Everything here is `Send + Sync` and async-aware. Locks never block the
//! executor, and channels cover the single-writer progress hand-off (`watch`)
//! as well as fan-out event delivery (`broadcast`).
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::{watch, CancellationToken};
//!
//! let (tx, rx) = watch::channel(0u32);
//! tx.send(3).unwrap();
//! assert_eq!(*rx.borrow(), 3);
//!
//! let token = CancellationToken::new();
//! token.cancel();
//! token.cancel(); // idempotent
//! assert!(token.is_cancelled());
//! ```

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, Barrier, Mutex, MutexGuard, Notify, RwLock, RwLockReadGuard,
    RwLockWriteGuard, Semaphore, SemaphorePermit,
};

pub use tokio_util::sync::CancellationToken;
