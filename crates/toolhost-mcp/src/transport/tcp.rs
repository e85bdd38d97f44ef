//! TCP transport: one independent session per accepted connection.

use tokio::net::TcpListener;

use crate::server::ServerContext;
use crate::types::{McpError, McpResult};

use super::connection::serve;

pub struct TcpTransport {
    context: ServerContext,
}

impl TcpTransport {
    pub fn new(context: ServerContext) -> Self {
        Self { context }
    }

    /// Bind `addr` and accept connections until the process stops.
    pub async fn run(&self, addr: &str) -> McpResult<()> {
        let listener = TcpListener::bind(addr).await.map_err(McpError::Io)?;
        tracing::info!("TCP transport listening on {addr}");
        self.serve_listener(listener).await
    }

    /// Accept loop over an already bound listener.
    pub async fn serve_listener(&self, listener: TcpListener) -> McpResult<()> {
        loop {
            let (stream, peer) = listener.accept().await.map_err(McpError::Io)?;
            let dispatcher = self.context.new_dispatcher();
            let max_message_bytes = self.context.max_message_bytes();
            tracing::info!(
                "Accepted connection from {peer} (session {})",
                dispatcher.session().id()
            );

            tokio::spawn(async move {
                let (reader, writer) = stream.into_split();
                match serve(dispatcher, reader, writer, max_message_bytes).await {
                    Ok(()) => tracing::info!("Connection from {peer} finished"),
                    Err(e) => tracing::warn!("Connection from {peer} dropped: {e}"),
                }
            });
        }
    }
}
