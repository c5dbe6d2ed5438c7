//! # Run State Machine
//!
//! Lifecycle shared by upload, download and catalog runs.
//!
//! ## State Machine
//!
//! ```text
//! Idle → Discovering → Transferring → Organizing → Complete → Idle
//!             │             │              │           ↑
//!             │             └──→ Cancelling ←──┘       │
//!             │                      └─────────────────┤
//!             └────────────────────────────────────────┘
//! ```
//!
//! Transferring and Organizing may also go straight to Complete.
//!
//! ## RunSlot
//!
//! Each orchestrator owns one [`RunSlot`]. It guards against overlapping runs,
//! holds the per-run [`CancellationToken`], and publishes the latest
//! [`TransferProgress`] on a `watch` channel. The worker task is the only
//! writer; hosts read through [`RunSlot::subscribe`] or [`RunSlot::progress`].
//!
//! Phase state sits behind a `parking_lot::Mutex` so UI threads outside the
//! async runtime can query it without awaiting.

use crate::error::{Result, TransferError};
use core_async::sync::{watch, CancellationToken};
use core_async::task::JoinHandle;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Phase
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunPhase {
    Idle,
    Discovering,
    Transferring,
    Organizing,
    Cancelling,
    Complete,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Idle => "idle",
            RunPhase::Discovering => "discovering",
            RunPhase::Transferring => "transferring",
            RunPhase::Organizing => "organizing",
            RunPhase::Cancelling => "cancelling",
            RunPhase::Complete => "complete",
        }
    }

    /// Whether a run occupies the slot.
    pub fn is_active(&self) -> bool {
        !matches!(self, RunPhase::Idle)
    }

    pub fn can_transition_to(&self, to: RunPhase) -> bool {
        matches!(
            (self, to),
            (RunPhase::Idle, RunPhase::Discovering)
                | (RunPhase::Discovering, RunPhase::Transferring)
                | (RunPhase::Discovering, RunPhase::Complete)
                | (RunPhase::Transferring, RunPhase::Organizing)
                | (RunPhase::Transferring, RunPhase::Cancelling)
                | (RunPhase::Transferring, RunPhase::Complete)
                | (RunPhase::Organizing, RunPhase::Cancelling)
                | (RunPhase::Organizing, RunPhase::Complete)
                | (RunPhase::Cancelling, RunPhase::Complete)
                | (RunPhase::Complete, RunPhase::Idle)
        )
    }

    fn validate_transition(&self, to: RunPhase) -> Result<()> {
        if self.can_transition_to(to) {
            return Ok(());
        }

        Err(TransferError::InvalidStateTransition {
            from: self.as_str().to_string(),
            to: to.as_str().to_string(),
            reason: format!("Cannot transition from {} to {}", self.as_str(), to.as_str()),
        })
    }
}

impl FromStr for RunPhase {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "idle" => Ok(RunPhase::Idle),
            "discovering" => Ok(RunPhase::Discovering),
            "transferring" => Ok(RunPhase::Transferring),
            "organizing" => Ok(RunPhase::Organizing),
            "cancelling" => Ok(RunPhase::Cancelling),
            "complete" => Ok(RunPhase::Complete),
            _ => Err(TransferError::Internal(format!("unknown run phase '{}'", s))),
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Progress
// ============================================================================

/// Latest progress of a slot's run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferProgress {
    pub run_id: Option<RunId>,
    pub phase: RunPhase,
    pub completed: u64,
    pub total: u64,
    /// Human-readable status line.
    pub status: String,
}

impl TransferProgress {
    fn idle(status: &str) -> Self {
        Self {
            run_id: None,
            phase: RunPhase::Idle,
            completed: 0,
            total: 0,
            status: status.to_string(),
        }
    }

    /// Completion in `[0, 1]`; `0` while the total is unknown.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.completed as f64 / self.total as f64).clamp(0.0, 1.0)
    }

    pub fn percent(&self) -> u8 {
        (self.fraction() * 100.0).round() as u8
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    /// Cancelled by the user.
    Stopped,
    /// Nothing matched the request.
    NothingToDo,
    Failed(String),
}

// ============================================================================
// RunSlot
// ============================================================================

/// Handed to the worker when a run begins.
#[derive(Debug, Clone)]
pub struct RunTicket {
    pub run_id: RunId,
    pub token: CancellationToken,
}

struct SlotState {
    phase: RunPhase,
    run_id: Option<RunId>,
    token: Option<CancellationToken>,
}

/// Single-run guard with phase tracking and a progress channel.
pub struct RunSlot {
    kind: &'static str,
    state: Mutex<SlotState>,
    progress: watch::Sender<TransferProgress>,
}

impl RunSlot {
    /// # Arguments
    ///
    /// * `kind` - Run kind used in errors and logs (`"upload"`, `"download"`)
    /// * `idle_status` - Status line shown before the first run
    pub fn new(kind: &'static str, idle_status: &str) -> Self {
        let (progress, _) = watch::channel(TransferProgress::idle(idle_status));
        Self {
            kind,
            state: Mutex::new(SlotState {
                phase: RunPhase::Idle,
                run_id: None,
                token: None,
            }),
            progress,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Claims the slot and moves it to `Discovering`.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::AlreadyRunning`] unless the slot is idle.
    pub fn try_begin(&self) -> Result<RunTicket> {
        let mut state = self.state.lock();
        if state.phase != RunPhase::Idle {
            return Err(TransferError::AlreadyRunning {
                kind: self.kind.to_string(),
            });
        }

        state.phase.validate_transition(RunPhase::Discovering)?;

        let run_id = RunId::new();
        let token = CancellationToken::new();
        state.phase = RunPhase::Discovering;
        state.run_id = Some(run_id);
        state.token = Some(token.clone());
        drop(state);

        self.progress.send_modify(|progress| {
            progress.run_id = Some(run_id);
            progress.phase = RunPhase::Discovering;
            progress.completed = 0;
            progress.total = 0;
        });

        debug!(kind = self.kind, run_id = %run_id, "Run slot claimed");
        Ok(RunTicket { run_id, token })
    }

    /// Validated phase change.
    pub fn advance(&self, to: RunPhase) -> Result<()> {
        let mut state = self.state.lock();
        state.phase.validate_transition(to)?;
        debug!(kind = self.kind, from = %state.phase, to = %to, "Run phase change");
        state.phase = to;
        drop(state);

        self.progress.send_modify(|progress| progress.phase = to);
        Ok(())
    }

    /// Requests cooperative cancellation of the current run.
    ///
    /// Returns `false` when idle. Repeated calls are harmless.
    pub fn cancel(&self) -> bool {
        let state = self.state.lock();
        match (&state.token, state.phase) {
            (Some(token), phase) if phase.is_active() => {
                if !token.is_cancelled() {
                    info!(kind = self.kind, "Cancellation requested");
                    token.cancel();
                }
                true
            }
            _ => false,
        }
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.state
            .lock()
            .token
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Drives the slot through `Complete` back to `Idle`, whatever phase the
    /// run reached.
    pub fn finish(&self) {
        let mut state = self.state.lock();
        if state.phase.is_active() && state.phase != RunPhase::Complete {
            debug!(kind = self.kind, phase = %state.phase, "Run ended early; forcing completion");
        }
        state.phase = RunPhase::Idle;
        state.token = None;
        let run_id = state.run_id;
        drop(state);

        self.progress.send_modify(|progress| progress.phase = RunPhase::Idle);
        debug!(kind = self.kind, run_id = ?run_id, "Run slot released");
    }

    pub fn phase(&self) -> RunPhase {
        self.state.lock().phase
    }

    pub fn is_idle(&self) -> bool {
        self.phase() == RunPhase::Idle
    }

    /// Id of the current or most recent run.
    pub fn run_id(&self) -> Option<RunId> {
        self.state.lock().run_id
    }

    pub fn subscribe(&self) -> watch::Receiver<TransferProgress> {
        self.progress.subscribe()
    }

    pub fn progress(&self) -> TransferProgress {
        self.progress.borrow().clone()
    }

    /// Publishes counters and status for the current phase.
    pub fn report(&self, completed: u64, total: u64, status: impl Into<String>) {
        let status = status.into();
        self.progress.send_modify(|progress| {
            progress.completed = completed;
            progress.total = total;
            progress.status = status;
        });
    }

    /// Replaces only the status line.
    pub fn set_status(&self, status: impl Into<String>) {
        let status = status.into();
        self.progress.send_modify(|progress| progress.status = status);
    }
}

// ============================================================================
// Handles
// ============================================================================

/// Background run started by an orchestrator.
///
/// Dropping the handle detaches the run; it keeps going and still reports
/// through the slot and the event bus.
pub struct RunHandle<T> {
    run_id: RunId,
    handle: JoinHandle<T>,
}

impl<T> RunHandle<T> {
    pub(crate) fn new(run_id: RunId, handle: JoinHandle<T>) -> Self {
        Self { run_id, handle }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Waits for the run to reach its terminal state.
    pub async fn wait(self) -> Result<T> {
        self.handle
            .await
            .map_err(|e| TransferError::Internal(format!("run task aborted: {}", e)))
    }
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("worker panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("worker panicked: {}", message)
    } else {
        "worker panicked".to_string()
    }
}
