//! Core data types shared by the registry, validator, and handlers.

use serde::{Deserialize, Serialize};

use crate::contract::InputContract;

/// What a capability is: something to invoke, or something to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    Tool,
    Resource,
}

impl std::fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapabilityKind::Tool => write!(f, "tool"),
            CapabilityKind::Resource => write!(f, "resource"),
        }
    }
}

/// Discovery view of a registered capability.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilitySummary {
    pub name: String,
    pub kind: CapabilityKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_contract: InputContract,
}

/// A single problem found while validating one argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub field: String,
    pub problem: IssueKind,
}

/// The ways an argument can violate its contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IssueKind {
    Required,
    TypeMismatch { expected: String, actual: String },
    NotInEnum { allowed: Vec<String> },
    UnknownField,
    NotAnObject { actual: String },
}

impl std::fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.problem {
            IssueKind::Required => write!(f, "{}: required", self.field),
            IssueKind::TypeMismatch { expected, actual } => {
                write!(f, "{}: expected {expected}, got {actual}", self.field)
            }
            IssueKind::NotInEnum { allowed } => {
                write!(f, "{}: expected one of [{}]", self.field, allowed.join(", "))
            }
            IssueKind::UnknownField => write!(f, "{}: unknown field", self.field),
            IssueKind::NotAnObject { actual } => {
                write!(f, "{}: arguments must be an object, got {actual}", self.field)
            }
        }
    }
}

/// Arguments violated the declared input contract.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid arguments: {}", render_issues(.issues))]
pub struct ValidationError {
    pub issues: Vec<FieldIssue>,
}

impl ValidationError {
    /// Issues rendered as `"<field>: <problem>"` strings.
    pub fn messages(&self) -> Vec<String> {
        self.issues.iter().map(ToString::to_string).collect()
    }
}

fn render_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors raised by the capability registry.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Capability already registered: {0}")]
    DuplicateName(String),

    #[error("Registry is sealed, cannot register: {0}")]
    Sealed(String),

    #[error("Capability not found: {0}")]
    NotFound(String),
}

/// A handler's own execution failure. The message is shown to the caller.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct HandlerError {
    pub message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for HandlerError {
    fn from(e: std::io::Error) -> Self {
        HandlerError::new(e.to_string())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(e: serde_json::Error) -> Self {
        HandlerError::new(format!("JSON error: {e}"))
    }
}

/// Convenience result type for handlers.
pub type HandlerResult<T> = Result<T, HandlerError>;
