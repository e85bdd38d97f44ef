//! A named, contract-described unit bound to its handler.

use std::sync::Arc;

use serde_json::Value;

use crate::contract::InputContract;
use crate::handler::{Arguments, Handler};
use crate::types::{CapabilityKind, CapabilitySummary, HandlerResult};

/// One invocable tool or readable resource.
#[derive(Clone)]
pub struct Capability {
    name: String,
    kind: CapabilityKind,
    description: Option<String>,
    contract: InputContract,
    handler: Arc<dyn Handler>,
}

impl Capability {
    pub fn new(
        name: impl Into<String>,
        kind: CapabilityKind,
        contract: InputContract,
        handler: Arc<dyn Handler>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            description: None,
            contract,
            handler,
        }
    }

    pub fn tool(name: impl Into<String>, contract: InputContract, handler: Arc<dyn Handler>) -> Self {
        Self::new(name, CapabilityKind::Tool, contract, handler)
    }

    /// A resource is addressed by its URI, which doubles as its name.
    pub fn resource(uri: impl Into<String>, contract: InputContract, handler: Arc<dyn Handler>) -> Self {
        Self::new(uri, CapabilityKind::Resource, contract, handler)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> CapabilityKind {
        self.kind
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn contract(&self) -> &InputContract {
        &self.contract
    }

    pub fn summary(&self) -> CapabilitySummary {
        CapabilitySummary {
            name: self.name.clone(),
            kind: self.kind,
            description: self.description.clone(),
            input_contract: self.contract.clone(),
        }
    }

    /// Run the handler. Arguments are expected to be validated already.
    pub async fn invoke(&self, args: Arguments) -> HandlerResult<Value> {
        self.handler.call(args).await
    }
}

impl std::fmt::Debug for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capability")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("description", &self.description)
            .field("contract", &self.contract)
            .finish_non_exhaustive()
    }
}
