//! Tool registration: every built-in tool, filtered by `tools.enabled`.

use std::sync::Arc;

use toolhost::Capability;

use crate::clients::Collaborators;
use crate::config::ServerConfig;

use super::files::Sandbox;
use super::{api, clock, data, echo, files, lm_studio};

/// Names of all built-in tools, in registration order.
pub const BUILTIN_TOOLS: &[&str] = &[
    "echo",
    "get_current_time",
    "read_file",
    "write_file",
    "list_files",
    "delete_file",
    "process_data",
    "call_api",
    "lm_studio_generate",
    "lm_studio_chat",
    "lm_studio_list_models",
    "lm_studio_test_connection",
];

/// Build the enabled built-in tools. LM Studio tools exist only when the backend is configured.
pub fn builtin_capabilities(config: &ServerConfig, collaborators: &Collaborators) -> Vec<Capability> {
    for name in &config.tools.enabled {
        if !BUILTIN_TOOLS.contains(&name.as_str()) {
            tracing::warn!("tools.enabled names unknown tool '{name}'");
        }
    }

    let sandbox = Arc::new(Sandbox::new(&config.files.base_path));
    let mut tools = vec![
        echo::capability(),
        clock::capability(),
        files::read_file(Arc::clone(&sandbox)),
        files::write_file(Arc::clone(&sandbox)),
        files::list_files(Arc::clone(&sandbox)),
        files::delete_file(sandbox),
        data::capability(),
        api::capability(collaborators.http.clone()),
    ];
    if let Some(client) = &collaborators.lm_studio {
        tools.extend(lm_studio::capabilities(Arc::clone(client)));
    }

    tools
        .into_iter()
        .filter(|tool| config.tools.is_enabled(tool.name()))
        .collect()
}
