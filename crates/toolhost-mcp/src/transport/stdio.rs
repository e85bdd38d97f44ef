//! Stdio transport: reads JSON-RPC from stdin, writes to stdout.

use crate::protocol::Dispatcher;
use crate::types::McpResult;

use super::connection::serve;

/// Stdio transport for desktop MCP clients.
pub struct StdioTransport {
    dispatcher: Dispatcher,
    max_message_bytes: usize,
}

impl StdioTransport {
    pub fn new(dispatcher: Dispatcher, max_message_bytes: usize) -> Self {
        Self {
            dispatcher,
            max_message_bytes,
        }
    }

    /// Run until stdin closes or the client shuts the session down.
    pub async fn run(self) -> McpResult<()> {
        tracing::info!("Stdio transport started");
        serve(
            self.dispatcher,
            tokio::io::stdin(),
            tokio::io::stdout(),
            self.max_message_bytes,
        )
        .await
    }
}
