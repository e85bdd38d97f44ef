//! The `config://server` resource: effective server configuration.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use toolhost::{Arguments, Capability, Handler, HandlerResult, InputContract};

use crate::config::ServerConfig;

pub const URI: &str = "config://server";

struct ServerConfigResource(Arc<ServerConfig>);

#[async_trait]
impl Handler for ServerConfigResource {
    async fn call(&self, _args: Arguments) -> HandlerResult<Value> {
        Ok(serde_json::to_value(self.0.as_ref())?)
    }
}

pub fn capability(config: Arc<ServerConfig>) -> Capability {
    Capability::resource(
        URI,
        InputContract::new(),
        Arc::new(ServerConfigResource(config)),
    )
    .with_description("Effective server configuration")
}
