//! Orchestration stages.
//!
//! Each stage is a function with typed input and output, run strictly in
//! order. A stage does one thing and reports what it created through its
//! output; leak tracking is the orchestrator's job.
//!
//! ```text
//! Provision ──→ Identity ──→ Register ──→ Secrets ──→ Bootstrap
//! (skipped for                          (skipped without
//!  existing hosts)                       secret items)
//! ```

pub mod bootstrap;
pub mod identity;
pub mod provision;
pub mod register;
pub mod secrets;
