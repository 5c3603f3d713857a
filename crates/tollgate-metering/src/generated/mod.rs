//! Protobuf types for the billing service and the metering report snapshot
//!
//! These types are written by hand to match the proto definitions of the
//! billing service (`billing.v1`) and the metering event (`metering.v1`).

pub mod metering {
    pub mod v1 {
        use prost::Message;
        use serde::{Deserialize, Serialize};
        use std::collections::BTreeMap;

        /// One node's spend for one resource dimension
        #[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
        pub struct MeteringReportNodeDetail {
            #[prost(string, tag = "1")]
            pub peer_2_peer_id: String,
            #[prost(string, tag = "2")]
            pub spend_unit: String,
            #[prost(string, tag = "3")]
            pub spend_value: String,
            #[prost(string, tag = "4")]
            pub spend_value_credits: String,
        }

        /// Aggregated (median) spend for one resource dimension
        #[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
        pub struct MeteringReportAggregate {
            #[prost(string, tag = "1")]
            pub spend_unit: String,
            #[prost(string, tag = "2")]
            pub spend_value: String,
            #[prost(string, tag = "3")]
            pub spend_value_credits: String,
        }

        /// One capability invocation
        #[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
        pub struct MeteringReportStep {
            #[prost(string, tag = "1")]
            pub capability_id: String,
            #[prost(uint32, tag = "2")]
            pub cap_don_n: u32,
            #[prost(string, tag = "3")]
            pub deduction: String,
            #[prost(message, repeated, tag = "4")]
            pub nodes: Vec<MeteringReportNodeDetail>,
            #[prost(message, repeated, tag = "5")]
            pub aggregated: Vec<MeteringReportAggregate>,
        }

        /// Workflow and DON attributes of the execution
        #[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
        pub struct WorkflowMetadata {
            #[prost(string, tag = "1")]
            pub workflow_owner: String,
            #[prost(string, tag = "2")]
            pub workflow_id: String,
            #[prost(string, tag = "3")]
            pub workflow_execution_id: String,
            #[prost(string, tag = "4")]
            pub workflow_name: String,
            #[prost(uint32, tag = "5")]
            pub don_id: u32,
            #[prost(uint32, tag = "6")]
            pub don_f: u32,
            #[prost(uint32, tag = "7")]
            pub don_n: u32,
            #[prost(string, tag = "8")]
            pub p2p_id: String,
            #[prost(string, tag = "9")]
            pub trigger_id: String,
            #[prost(string, tag = "10")]
            pub org_id: String,
            #[prost(int64, tag = "11")]
            pub started_at: i64,
        }

        /// Snapshot of one execution's metering state
        #[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
        pub struct MeteringReport {
            #[prost(btree_map = "string, message", tag = "1")]
            pub steps: BTreeMap<String, MeteringReportStep>,
            #[prost(message, optional, tag = "2")]
            pub metadata: Option<WorkflowMetadata>,
            #[prost(bool, tag = "3")]
            pub metering_mode: bool,
            #[prost(string, tag = "4")]
            pub message: String,
        }
    }
}

pub mod billing {
    pub mod v1 {
        use super::super::metering::v1 as metering;
        use prost::Message;
        use serde::{Deserialize, Serialize};
        use std::collections::HashMap;

        /// Fully-qualified service name used to build request paths
        pub const SERVICE_NAME: &str = "billing.v1.WorkflowService";

        /// Rate of one resource dimension
        #[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
        pub struct ResourceUnitRate {
            #[prost(string, tag = "1")]
            pub resource_type: String,
            #[prost(string, tag = "2")]
            pub units_per_credit: String,
        }

        #[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
        pub struct GetOrganizationCreditsByWorkflowRequest {
            #[prost(string, tag = "1")]
            pub workflow_id: String,
        }

        #[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
        pub struct OrganizationCredits {
            #[prost(string, tag = "1")]
            pub organization_id: String,
            #[prost(string, tag = "2")]
            pub credits: String,
        }

        #[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
        pub struct GetOrganizationCreditsByWorkflowResponse {
            #[prost(message, optional, tag = "1")]
            pub credits: Option<OrganizationCredits>,
        }

        #[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
        pub struct GetWorkflowExecutionRatesRequest {
            #[prost(string, tag = "1")]
            pub workflow_owner: String,
            #[prost(string, tag = "2")]
            pub workflow_id: String,
        }

        #[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
        pub struct GetWorkflowExecutionRatesResponse {
            #[prost(message, repeated, tag = "1")]
            pub rate_cards: Vec<ResourceUnitRate>,
            #[prost(map = "uint64, string", tag = "2")]
            pub gas_tokens_per_credit: HashMap<u64, String>,
        }

        #[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
        pub struct ReserveCreditsRequest {
            #[prost(string, tag = "1")]
            pub workflow_owner: String,
            #[prost(string, tag = "2")]
            pub workflow_id: String,
            #[prost(string, tag = "3")]
            pub workflow_execution_id: String,
            #[prost(uint32, tag = "4")]
            pub don_id: u32,
        }

        #[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
        pub struct ReserveCreditsResponse {
            #[prost(bool, tag = "1")]
            pub success: bool,
            #[prost(string, tag = "2")]
            pub credits: String,
            #[prost(message, repeated, tag = "3")]
            pub rates: Vec<ResourceUnitRate>,
            #[prost(map = "uint64, string", tag = "4")]
            pub gas_tokens_per_credit: HashMap<u64, String>,
        }

        #[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
        pub struct SubmitWorkflowReceiptRequest {
            #[prost(string, tag = "1")]
            pub workflow_owner: String,
            #[prost(string, tag = "2")]
            pub workflow_id: String,
            #[prost(string, tag = "3")]
            pub workflow_execution_id: String,
            #[prost(message, optional, tag = "4")]
            pub metering: Option<metering::MeteringReport>,
            #[prost(string, tag = "5")]
            pub credits_consumed: String,
        }

        #[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
        pub struct SubmitWorkflowReceiptResponse {
            #[prost(bool, tag = "1")]
            pub success: bool,
            #[prost(string, tag = "2")]
            pub message: String,
        }
    }
}
