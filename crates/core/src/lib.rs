//! Domain types shared by the orchestration core and the HTTP layer.
//!
//! Everything here is free of I/O: the error taxonomy, the readiness gate,
//! the job lifecycle model, and the request payloads with their validation
//! rules.

pub mod completion;
pub mod error;
pub mod job;
pub mod media;
pub mod readiness;
pub mod types;
