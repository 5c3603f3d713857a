//! Report labels - identifying attributes of one workflow execution
//!
//! Labels arrive from the execution engine as a flat string map using the
//! monitoring keys below. Owner, workflow id and execution id are required.

use crate::error::ReportError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

pub const WORKFLOW_OWNER: &str = "workflowOwner";
pub const WORKFLOW_ID: &str = "workflowID";
pub const WORKFLOW_EXECUTION_ID: &str = "workflowExecutionID";
pub const WORKFLOW_NAME: &str = "workflowName";
pub const DON_ID: &str = "donID";
pub const DON_F: &str = "donF";
pub const DON_N: &str = "donN";
pub const P2P_ID: &str = "p2pID";
pub const TRIGGER_ID: &str = "triggerID";
pub const ORG_ID: &str = "orgID";

/// Identifying attributes for one metering report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportLabels {
    pub workflow_owner: String,
    pub workflow_id: String,
    pub workflow_execution_id: String,
    pub workflow_name: Option<String>,
    pub don_id: Option<u32>,
    pub don_f: Option<u32>,
    pub don_n: Option<u32>,
    pub p2p_id: Option<String>,
    pub trigger_id: Option<String>,
    pub org_id: Option<String>,
}

impl ReportLabels {
    /// Build labels from the engine's label map
    pub fn from_map(labels: &HashMap<String, String>) -> Result<Self, ReportError> {
        let required = |key: &str| {
            labels
                .get(key)
                .filter(|v| !v.is_empty())
                .cloned()
                .ok_or_else(|| ReportError::MissingLabel(key.to_string()))
        };
        let optional = |key: &str| labels.get(key).filter(|v| !v.is_empty()).cloned();
        let numeric = |key: &str| {
            optional(key).and_then(|raw| match raw.parse::<u32>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(label = key, value = %raw, "Ignoring non-numeric label");
                    None
                }
            })
        };

        Ok(Self {
            workflow_owner: required(WORKFLOW_OWNER)?,
            workflow_id: required(WORKFLOW_ID)?,
            workflow_execution_id: required(WORKFLOW_EXECUTION_ID)?,
            workflow_name: optional(WORKFLOW_NAME),
            don_id: numeric(DON_ID),
            don_f: numeric(DON_F),
            don_n: numeric(DON_N),
            p2p_id: optional(P2P_ID),
            trigger_id: optional(TRIGGER_ID),
            org_id: optional(ORG_ID),
        })
    }

    /// Check the required labels are present
    pub fn validate(&self) -> Result<(), ReportError> {
        for (key, value) in [
            (WORKFLOW_OWNER, &self.workflow_owner),
            (WORKFLOW_ID, &self.workflow_id),
            (WORKFLOW_EXECUTION_ID, &self.workflow_execution_id),
        ] {
            if value.is_empty() {
                return Err(ReportError::MissingLabel(key.to_string()));
            }
        }
        Ok(())
    }

    /// Flatten back into the monitoring key space
    pub fn to_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert(WORKFLOW_OWNER.to_string(), self.workflow_owner.clone());
        map.insert(WORKFLOW_ID.to_string(), self.workflow_id.clone());
        map.insert(
            WORKFLOW_EXECUTION_ID.to_string(),
            self.workflow_execution_id.clone(),
        );
        let optional = [
            (WORKFLOW_NAME, self.workflow_name.clone()),
            (DON_ID, self.don_id.map(|v| v.to_string())),
            (DON_F, self.don_f.map(|v| v.to_string())),
            (DON_N, self.don_n.map(|v| v.to_string())),
            (P2P_ID, self.p2p_id.clone()),
            (TRIGGER_ID, self.trigger_id.clone()),
            (ORG_ID, self.org_id.clone()),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                map.insert(key.to_string(), value);
            }
        }
        map
    }
}
