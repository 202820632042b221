//! Inbound requests sent by the Neutron plugin.
//!
//! Operations and resource types form a closed key space: known values get
//! their own variant, anything else is kept verbatim so the request can still
//! be decoded and forwarded.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::filters::Filters;

// ── Operation ─────────────────────────────────────────────────────

/// The Neutron operation requested.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operation {
    Create,
    Read,
    ReadAll,
    ReadCount,
    Update,
    Delete,
    Other(String),
}

impl Operation {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Create => "CREATE",
            Self::Read => "READ",
            Self::ReadAll => "READALL",
            Self::ReadCount => "READCOUNT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for Operation {
    fn from(s: String) -> Self {
        match s.as_str() {
            "CREATE" => Self::Create,
            "READ" => Self::Read,
            "READALL" => Self::ReadAll,
            "READCOUNT" => Self::ReadCount,
            "UPDATE" => Self::Update,
            "DELETE" => Self::Delete,
            _ => Self::Other(s),
        }
    }
}

impl From<Operation> for String {
    fn from(op: Operation) -> Self {
        op.as_str().to_string()
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Resource type ─────────────────────────────────────────────────

/// The Neutron resource a request targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResourceType {
    Port,
    Network,
    Subnet,
    SecurityGroup,
    Router,
    FloatingIp,
    Other(String),
}

impl ResourceType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Port => "port",
            Self::Network => "network",
            Self::Subnet => "subnet",
            Self::SecurityGroup => "security_group",
            Self::Router => "router",
            Self::FloatingIp => "floatingip",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for ResourceType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "port" => Self::Port,
            "network" => Self::Network,
            "subnet" => Self::Subnet,
            "security_group" => Self::SecurityGroup,
            "router" => Self::Router,
            "floatingip" => Self::FloatingIp,
            _ => Self::Other(s),
        }
    }
}

impl From<ResourceType> for String {
    fn from(rt: ResourceType) -> Self {
        rt.as_str().to_string()
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Request ───────────────────────────────────────────────────────

/// Who is asking, and for what.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    #[serde(rename = "type")]
    pub resource: ResourceType,
    pub operation: Operation,
    #[serde(default)]
    pub tenant_id: Uuid,
    #[serde(default)]
    pub user_id: Uuid,
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub is_admin: bool,
}

/// The payload of a request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestData {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fields: Vec<String>,
    #[serde(default)]
    pub filters: Filters,
}

/// A request from the Neutron plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub context: RequestContext,
    #[serde(default)]
    pub data: RequestData,
}

impl Request {
    /// Decode a request body.
    pub fn decode(body: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(body)?)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
