//! Process-wide primitives shared by the gateway binary and library: graceful
//! drain, signal handling, readiness tracking, structured logging bootstrap,
//! and build metadata. None of this crate knows anything about HTTP routing
//! or proxying; it is the same kind of ambient substrate layer the teacher
//! project keeps in its own `agent-core` crate.

pub mod drain;
pub mod readiness;
pub mod signal;
pub mod telemetry;
pub mod version;
