//! The `files://data` resource, a listing of the file-tool data directory.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use toolhost::{Arguments, Capability, Handler, HandlerError, HandlerResult, InputContract};

use crate::tools::files::Sandbox;

pub const URI: &str = "files://data";

struct DataDirResource(Arc<Sandbox>);

#[async_trait]
impl Handler for DataDirResource {
    async fn call(&self, _args: Arguments) -> HandlerResult<Value> {
        let sandbox = Arc::clone(&self.0);
        tokio::task::spawn_blocking(move || -> HandlerResult<Value> {
            let entries = sandbox.list(".")?;
            Ok(json!({
                "base_path": sandbox.root().display().to_string(),
                "count": entries.len(),
                "entries": entries,
            }))
        })
        .await
        .map_err(|e| HandlerError::new(format!("listing task failed: {e}")))?
    }
}

pub fn capability(sandbox: Arc<Sandbox>) -> Capability {
    Capability::resource(URI, InputContract::new(), Arc::new(DataDirResource(sandbox)))
        .with_description("Files in the data directory")
}
