//! MCP protocol handling: envelope checks, version negotiation and dispatch.

pub mod dispatcher;
pub mod negotiation;
pub mod validator;

pub use dispatcher::{error_value, Dispatcher, PendingRequest, RequestPhase, Routed};
pub use negotiation::{negotiate_version, NegotiatedCapabilities};
