//! Resource registration.

use std::sync::Arc;

use toolhost::Capability;

use crate::config::ServerConfig;
use crate::tools::files::Sandbox;

use super::{data_dir, server_config};

/// Built-in resources, or none when `resources.enabled` is false.
pub fn builtin_resources(config: &Arc<ServerConfig>) -> Vec<Capability> {
    if !config.resources.enabled {
        return Vec::new();
    }
    vec![
        server_config::capability(Arc::clone(config)),
        data_dir::capability(Arc::new(Sandbox::new(&config.files.base_path))),
    ]
}
