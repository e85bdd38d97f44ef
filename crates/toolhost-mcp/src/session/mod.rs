//! Session lifecycle and in-flight request tracking.

pub mod inflight;
pub mod manager;
pub mod state;

pub use inflight::{InFlightGuard, InFlightRequests};
pub use manager::{Session, DEFAULT_TOOL_TIMEOUT};
pub use state::SessionState;
