//! Request admission and execution orchestration.
//!
//! A request flows through the pieces in this order:
//!
//! ```text
//! InferenceFacade ── validate ── ReadinessGate::ensure_ready
//!        │
//!        └─ JobExecutor::submit ──> FIFO queue ──> worker task
//!                                                   ├─ AdmissionController::acquire
//!                                                   ├─ WorkspaceScope::open
//!                                                   ├─ InferenceBackend::execute
//!                                                   └─ WorkspaceScope::close
//!        TimeoutSupervisor::await_result bounds the facade's wait.
//! ```

pub mod admission;
pub mod backend;
pub mod config;
pub mod executor;
pub mod facade;
pub mod supervisor;
pub mod workspace;

#[cfg(test)]
pub(crate) mod test_support;
