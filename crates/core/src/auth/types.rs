use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;

/// Request information for authentication
#[derive(Debug, Clone)]
pub struct AuthRequest {
    pub headers: HashMap<String, String>,
    pub source_ip: IpAddr,
}

/// Authenticated identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub method: String,
    /// Whether this caller may advance or reset the queue.
    #[serde(default)]
    pub operator: bool,
    #[serde(default)]
    pub claims: HashMap<String, serde_json::Value>,
}

impl Identity {
    /// A walk-up customer. May take tickets, nothing else.
    pub fn anonymous() -> Self {
        Self {
            user_id: "anonymous".to_string(),
            method: "none".to_string(),
            operator: false,
            claims: HashMap::new(),
        }
    }

    /// A caller holding the operator capability.
    pub fn operator(user_id: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            method: method.into(),
            operator: true,
            claims: HashMap::new(),
        }
    }

    pub fn is_operator(&self) -> bool {
        self.operator
    }
}
