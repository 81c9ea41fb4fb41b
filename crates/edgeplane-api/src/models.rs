use chrono::{DateTime, Utc};
use edgeplane_control::{
    AgentConfig, CertificateBundle, LineGroupConfig, NodeGroupConfig, WebsiteConfig,
};
use edgeplane_db::entities::agent_task;
use sea_orm::ActiveEnum;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Current configuration version
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConfigVersionResponse {
    /// Monotonic version, 0 before the first mutation
    pub version: i64,
}

/// HTTPS settings of a website
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebsiteHttps {
    /// Certificate to fetch from `/api/agent/certificates/{id}`
    pub certificate_id: i32,
}

/// Website as served by the edge
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Website {
    pub id: i32,
    /// `active` or `disabled`
    pub status: String,
    /// Primary domain first
    pub domains: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub https: Option<WebsiteHttps>,
}

/// Node group
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NodeGroup {
    pub id: i32,
    pub name: String,
    pub cname: String,
    /// Enabled sub-IPs
    pub sub_ips: Vec<String>,
}

/// Line group
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LineGroup {
    pub id: i32,
    pub name: String,
    pub cname: String,
    pub node_group_id: i32,
}

/// Full configuration snapshot
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AgentConfigResponse {
    pub version: i64,
    pub websites: Vec<Website>,
    pub node_groups: Vec<NodeGroup>,
    pub line_groups: Vec<LineGroup>,
}

/// Query parameters for pending tasks
#[derive(Debug, Clone, Deserialize, IntoParams, ToSchema)]
pub struct TaskQuery {
    /// Node the tasks are addressed to
    pub node_id: i32,
}

/// Work item for one node
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AgentTask {
    pub id: i32,
    pub node_id: i32,
    /// `purge_cache`, `apply_config` or `reload`
    pub task_type: String,
    pub payload: serde_json::Value,
    /// `pending`, `running`, `success` or `failed`
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Pending tasks of a node, oldest first
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AgentTaskList {
    pub tasks: Vec<AgentTask>,
    pub total: usize,
}

/// Status report from an agent
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateTaskStatusRequest {
    pub status: String,
    #[serde(default)]
    pub last_error: Option<String>,
}

/// Certificate and key for the edge TLS stack
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Certificate {
    pub id: i32,
    pub domains: Vec<String>,
    pub fingerprint: String,
    pub expire_at: DateTime<Utc>,
    pub certificate_pem: String,
    pub private_key_pem: String,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    pub config_version: i64,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl From<WebsiteConfig> for Website {
    fn from(website: WebsiteConfig) -> Self {
        Self {
            id: website.id,
            status: website.status.to_value(),
            domains: website.domains,
            https: website.https.map(|https| WebsiteHttps {
                certificate_id: https.certificate_id,
            }),
        }
    }
}

impl From<NodeGroupConfig> for NodeGroup {
    fn from(group: NodeGroupConfig) -> Self {
        Self {
            id: group.id,
            name: group.name,
            cname: group.cname,
            sub_ips: group.sub_ips,
        }
    }
}

impl From<LineGroupConfig> for LineGroup {
    fn from(group: LineGroupConfig) -> Self {
        Self {
            id: group.id,
            name: group.name,
            cname: group.cname,
            node_group_id: group.node_group_id,
        }
    }
}

impl From<AgentConfig> for AgentConfigResponse {
    fn from(config: AgentConfig) -> Self {
        Self {
            version: config.version,
            websites: config.websites.into_iter().map(Into::into).collect(),
            node_groups: config.node_groups.into_iter().map(Into::into).collect(),
            line_groups: config.line_groups.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<agent_task::Model> for AgentTask {
    fn from(task: agent_task::Model) -> Self {
        // Payloads are written by the control plane as JSON; anything else is passed as text
        let payload = serde_json::from_str(&task.payload)
            .unwrap_or(serde_json::Value::String(task.payload));
        Self {
            id: task.id,
            node_id: task.node_id,
            task_type: task.task_type.to_value(),
            payload,
            status: task.status.to_value(),
            last_error: task.last_error,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

impl From<CertificateBundle> for Certificate {
    fn from(bundle: CertificateBundle) -> Self {
        Self {
            id: bundle.id,
            domains: bundle.domains,
            fingerprint: bundle.fingerprint,
            expire_at: bundle.expire_at,
            certificate_pem: bundle.certificate_pem,
            private_key_pem: bundle.private_key_pem,
        }
    }
}
