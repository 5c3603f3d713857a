//! Values exchanged with the capability invocation boundary

use serde::{Deserialize, Serialize};

/// One node's raw spend report for a capability call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpend {
    /// Peer id of the reporting node
    pub peer_id: String,
    /// Resource dimension the value is expressed in
    pub spend_type: String,
    /// Raw spend value as a decimal string
    pub spend_value: String,
}

impl NodeSpend {
    pub fn new(
        peer_id: impl Into<String>,
        spend_type: impl Into<String>,
        spend_value: impl Into<String>,
    ) -> Self {
        Self {
            peer_id: peer_id.into(),
            spend_type: spend_type.into(),
            spend_value: spend_value.into(),
        }
    }
}

/// Native-unit ceiling passed down to a capability call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendLimit {
    pub spend_type: String,
    pub limit: String,
}
