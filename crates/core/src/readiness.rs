//! One-shot readiness gate for the inference backend.
//!
//! The backend initializes in the background after process start. Request
//! paths consult [`ReadinessGate::is_ready`] (a single atomic load) and
//! reject work until the initializer calls [`ReadinessGate::mark_ready`].
//! The state only moves forward:
//!
//! ```text
//! Uninitialized -> Initializing -> Ready
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;
use tokio::sync::watch;

use crate::error::CoreError;

/// Message returned to callers while the backend is still loading.
pub const NOT_READY_MESSAGE: &str =
    "Model is still initializing, please try again in a few minutes";

/// Lifecycle of the backend engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum EngineState {
    Uninitialized = 0,
    Initializing = 1,
    Ready = 2,
}

impl EngineState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Uninitialized,
            1 => Self::Initializing,
            _ => Self::Ready,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Write-once, read-many readiness signal.
///
/// Readers use an `Acquire` load; the initializer publishes with `Release`,
/// so everything it did before [`mark_ready`](Self::mark_ready) is visible
/// to any reader that observes `Ready`. Waiters park on a watch channel
/// instead of polling.
pub struct ReadinessGate {
    state: AtomicU8,
    notify: watch::Sender<EngineState>,
}

impl ReadinessGate {
    pub fn new() -> Self {
        let (notify, _) = watch::channel(EngineState::Uninitialized);
        Self {
            state: AtomicU8::new(EngineState::Uninitialized as u8),
            notify,
        }
    }

    /// Current engine state.
    pub fn state(&self) -> EngineState {
        EngineState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// `true` once the backend has finished initializing.
    pub fn is_ready(&self) -> bool {
        self.state() == EngineState::Ready
    }

    /// Fail with [`CoreError::NotReady`] unless the backend is ready.
    pub fn ensure_ready(&self) -> Result<(), CoreError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(CoreError::NotReady(NOT_READY_MESSAGE.to_string()))
        }
    }

    /// Record that initialization has started.
    pub fn begin_initializing(&self) -> Result<(), CoreError> {
        self.advance(EngineState::Uninitialized, EngineState::Initializing)
    }

    /// Record that initialization finished. May only follow
    /// [`begin_initializing`](Self::begin_initializing).
    pub fn mark_ready(&self) -> Result<(), CoreError> {
        self.advance(EngineState::Initializing, EngineState::Ready)
    }

    /// Resolve once the gate is open. Returns immediately if already ready.
    pub async fn wait_ready(&self) {
        let mut rx = self.notify.subscribe();
        // The sender lives as long as `self`, so the channel cannot close here.
        let _ = rx.wait_for(|state| *state == EngineState::Ready).await;
    }

    fn advance(&self, from: EngineState, to: EngineState) -> Result<(), CoreError> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|actual| {
                CoreError::Internal(format!(
                    "invalid engine state transition {} -> {to}",
                    EngineState::from_u8(actual)
                ))
            })?;
        self.notify.send_replace(to);
        Ok(())
    }
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}
