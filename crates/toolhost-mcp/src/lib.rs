//! toolhost MCP server: schema-validated tools and resources over JSON-RPC 2.0.

pub mod clients;
pub mod config;
pub mod protocol;
pub mod resources;
pub mod server;
pub mod session;
pub mod tools;
pub mod transport;
pub mod types;

pub use config::{load_config, ServerConfig};
pub use protocol::Dispatcher;
pub use server::ServerContext;
pub use session::{Session, SessionState};
pub use transport::{serve, StdioTransport, TcpTransport};
