//! Server context: the configuration and the capability registry every session shares.

use std::sync::Arc;

use serde_json::{json, Value};

use toolhost::{CapabilityKind, CapabilityRegistry};

use crate::clients::Collaborators;
use crate::config::ServerConfig;
use crate::protocol::Dispatcher;
use crate::resources;
use crate::session::Session;
use crate::tools;
use crate::types::{
    McpError, McpResult, LATEST_PROTOCOL_VERSION, SERVER_NAME, SERVER_VERSION,
    SUPPORTED_PROTOCOL_VERSIONS,
};

/// Everything a transport needs to open sessions.
///
/// Cheap to clone; the registry is shared read-only by all sessions.
#[derive(Debug, Clone)]
pub struct ServerContext {
    config: Arc<ServerConfig>,
    registry: Arc<CapabilityRegistry>,
}

impl ServerContext {
    /// Build the collaborators and register every enabled built-in tool and resource.
    pub fn from_config(config: ServerConfig) -> McpResult<Self> {
        let config = Arc::new(config);
        let collaborators = Collaborators::from_config(&config)?;

        let mut capabilities = tools::builtin_capabilities(&config, &collaborators);
        capabilities.extend(resources::builtin_resources(&config));

        let registry = CapabilityRegistry::from_capabilities(capabilities)
            .map_err(|e| McpError::Config(e.to_string()))?;
        tracing::info!(
            "Registered {} tools and {} resources",
            registry.iter_kind(CapabilityKind::Tool).count(),
            registry.iter_kind(CapabilityKind::Resource).count()
        );

        Ok(Self {
            config,
            registry: Arc::new(registry),
        })
    }

    /// Use a caller-built registry instead of the built-ins.
    pub fn with_registry(config: ServerConfig, registry: CapabilityRegistry) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    pub fn max_message_bytes(&self) -> usize {
        self.config.server.max_message_bytes
    }

    /// A fresh session in `Uninitialized` over the shared registry.
    pub fn new_session(&self) -> Arc<Session> {
        Arc::new(Session::new(
            Arc::clone(&self.registry),
            self.config.server.tool_timeout(),
        ))
    }

    pub fn new_dispatcher(&self) -> Dispatcher {
        Dispatcher::new(self.new_session())
    }

    /// Server identity, protocol versions and the capability list, as printed by `info`.
    pub fn info(&self) -> Value {
        let capabilities = self.registry.list();
        json!({
            "server": { "name": SERVER_NAME, "version": SERVER_VERSION },
            "protocol_version": LATEST_PROTOCOL_VERSION,
            "supported_protocol_versions": SUPPORTED_PROTOCOL_VERSIONS,
            "capability_count": capabilities.len(),
            "capabilities": capabilities,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;

    #[test]
    fn test_default_config_registers_builtins() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServerConfig::default();
        config.files.base_path = dir.path().to_path_buf();

        let context = ServerContext::from_config(config).unwrap();
        let registry = context.registry();
        assert!(registry.lookup("echo").is_ok());
        assert!(registry.lookup("process_data").is_ok());
        assert!(registry.lookup("lm_studio_chat").is_err());
        assert!(registry.lookup("config://server").is_ok());
        assert!(registry.lookup("files://data").is_ok());
        assert_eq!(registry.iter_kind(CapabilityKind::Tool).count(), 8);
    }

    #[test]
    fn test_enabled_list_and_disabled_resources() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServerConfig::default();
        config.files.base_path = dir.path().to_path_buf();
        config.tools.enabled = vec!["echo".to_string(), "get_current_time".to_string()];
        config.resources.enabled = false;

        let context = ServerContext::from_config(config).unwrap();
        let names: Vec<&str> = context.registry().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["echo", "get_current_time"]);
    }

    #[test]
    fn test_sessions_are_independent() {
        let context = ServerContext::with_registry(ServerConfig::default(), CapabilityRegistry::new());
        let a = context.new_session();
        let b = context.new_session();
        assert_ne!(a.id(), b.id());
        assert!(a.close());
        assert_eq!(a.state(), SessionState::Closed);
        assert_eq!(b.state(), SessionState::Uninitialized);
    }

    #[test]
    fn test_info_lists_capabilities() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServerConfig::default();
        config.files.base_path = dir.path().to_path_buf();
        let context = ServerContext::from_config(config).unwrap();

        let info = context.info();
        assert_eq!(info["server"]["name"], SERVER_NAME);
        assert_eq!(info["protocol_version"], LATEST_PROTOCOL_VERSION);
        assert_eq!(info["capability_count"], 10);
        assert_eq!(info["capabilities"][0]["name"], "echo");
    }
}
