//! toolhost core library: input contracts, argument validation,
//! handlers, and the capability registry.

pub mod capability;
pub mod contract;
pub mod handler;
pub mod registry;
pub mod types;
pub mod validator;

pub use capability::Capability;
pub use contract::{InputContract, ParamSpec, ParamType};
pub use handler::{handler_fn, Arguments, Handler};
pub use registry::CapabilityRegistry;
pub use types::*;
pub use validator::validate;
