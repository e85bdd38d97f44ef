//! Protocol version negotiation during initialization.

use chrono::NaiveDate;

use crate::types::{
    ClientCapabilities, Implementation, InitializeParams, McpError, McpResult,
    SUPPORTED_PROTOCOL_VERSIONS,
};

/// What the client declared during a successful handshake.
#[derive(Debug, Clone)]
pub struct NegotiatedCapabilities {
    pub protocol_version: String,
    pub client_info: Implementation,
    pub client: ClientCapabilities,
}

impl NegotiatedCapabilities {
    pub fn negotiate(params: InitializeParams) -> McpResult<Self> {
        let protocol_version = negotiate_version(&params.protocol_version)?;
        if protocol_version != params.protocol_version {
            tracing::warn!(
                "Client requested protocol version {}, answering with {protocol_version}",
                params.protocol_version
            );
        }

        tracing::info!(
            "Initialized with client: {} v{} (protocol {protocol_version})",
            params.client_info.name,
            params.client_info.version
        );

        Ok(Self {
            protocol_version: protocol_version.to_string(),
            client_info: params.client_info,
            client: params.capabilities,
        })
    }
}

fn parse_version(version: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(version, "%Y-%m-%d").ok()
}

/// Pick the version to answer with.
///
/// A supported version is echoed. A later date gets the newest supported
/// version not after it. Dates before the oldest supported version, and
/// anything that is not a date, are incompatible.
pub fn negotiate_version(requested: &str) -> McpResult<&'static str> {
    if let Some(exact) = SUPPORTED_PROTOCOL_VERSIONS
        .iter()
        .find(|v| **v == requested)
    {
        return Ok(*exact);
    }

    let mismatch = || McpError::VersionMismatch {
        requested: requested.to_string(),
        supported: SUPPORTED_PROTOCOL_VERSIONS
            .iter()
            .map(|v| v.to_string())
            .collect(),
    };

    let requested_date = parse_version(requested).ok_or_else(mismatch)?;

    SUPPORTED_PROTOCOL_VERSIONS
        .iter()
        .filter_map(|v| parse_version(v).map(|date| (date, *v)))
        .filter(|(date, _)| *date <= requested_date)
        .max_by_key(|(date, _)| *date)
        .map(|(_, v)| v)
        .ok_or_else(mismatch)
}
