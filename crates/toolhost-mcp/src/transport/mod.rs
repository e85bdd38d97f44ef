//! Transport layer for MCP communication.

pub mod connection;
pub mod framing;
#[cfg(feature = "http")]
pub mod http;
pub mod stdio;
pub mod tcp;

pub use connection::serve;
#[cfg(feature = "http")]
pub use http::HttpTransport;
pub use stdio::StdioTransport;
pub use tcp::TcpTransport;
