//! What edge agents pull
//!
//! Agents poll [`AgentService::config_version`] and fetch the full
//! [`AgentConfig`] only when the version moved.

use chrono::{DateTime, Utc};
use edgeplane_db::{
    entities::{
        agent_task::{self, TaskStatus, TaskType},
        certificate_binding::BindType,
        website::WebsiteStatus,
    },
    store::{
        AgentTaskStore, BindingStore, CertificateStore, ConfigVersionStore, TopologyStore,
        WebsiteStore,
    },
};
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::ControlError;
use crate::ledger::ConfigLedger;

/// Full configuration snapshot served to agents
#[derive(Debug, Clone, Serialize)]
pub struct AgentConfig {
    pub version: i64,
    pub websites: Vec<WebsiteConfig>,
    pub node_groups: Vec<NodeGroupConfig>,
    pub line_groups: Vec<LineGroupConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WebsiteConfig {
    pub id: i32,
    pub status: WebsiteStatus,
    /// Primary domain first
    pub domains: Vec<String>,
    pub https: Option<HttpsConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HttpsConfig {
    pub certificate_id: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeGroupConfig {
    pub id: i32,
    pub name: String,
    pub cname: String,
    /// Enabled sub-IPs only
    pub sub_ips: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LineGroupConfig {
    pub id: i32,
    pub name: String,
    pub cname: String,
    pub node_group_id: i32,
}

/// Key material of one certificate
#[derive(Debug, Clone, Serialize)]
pub struct CertificateBundle {
    pub id: i32,
    pub domains: Vec<String>,
    pub fingerprint: String,
    pub expire_at: DateTime<Utc>,
    pub certificate_pem: String,
    pub private_key_pem: String,
}

#[derive(Clone)]
pub struct AgentService {
    db: DatabaseConnection,
    ledger: ConfigLedger,
}

impl AgentService {
    pub fn new(db: DatabaseConnection) -> Self {
        let ledger = ConfigLedger::new(db.clone());
        Self { db, ledger }
    }

    pub async fn config_version(&self) -> Result<i64, ControlError> {
        Ok(self.ledger.latest().await?.version)
    }

    /// Assemble the snapshot inside one read transaction
    pub async fn config(&self) -> Result<AgentConfig, ControlError> {
        let txn = self.db.begin().await?;

        let version = txn
            .latest_config_version()
            .await?
            .map(|row| row.version)
            .unwrap_or(0);

        let mut websites = Vec::new();
        for site in txn.list_websites().await? {
            let domains = txn
                .website_domains(site.id)
                .await?
                .into_iter()
                .map(|d| d.domain)
                .collect();
            let https = txn
                .active_binding(BindType::Website, site.id)
                .await?
                .map(|binding| HttpsConfig {
                    certificate_id: binding.certificate_id,
                });
            websites.push(WebsiteConfig {
                id: site.id,
                status: site.status,
                domains,
                https,
            });
        }

        let mut node_groups = Vec::new();
        for group in txn.list_node_groups().await? {
            let sub_ips = txn
                .node_group_sub_ips(group.id)
                .await?
                .into_iter()
                .filter(|ip| ip.enabled)
                .map(|ip| ip.ip)
                .collect();
            node_groups.push(NodeGroupConfig {
                id: group.id,
                name: group.name,
                cname: group.cname,
                sub_ips,
            });
        }

        let line_groups = txn
            .list_line_groups()
            .await?
            .into_iter()
            .map(|group| LineGroupConfig {
                id: group.id,
                name: group.name,
                cname: group.cname,
                node_group_id: group.node_group_id,
            })
            .collect();

        txn.commit().await?;

        debug!(version, websites = websites.len(), "Agent config assembled");
        Ok(AgentConfig {
            version,
            websites,
            node_groups,
            line_groups,
        })
    }

    pub async fn pending_tasks(&self, node_id: i32) -> Result<Vec<agent_task::Model>, ControlError> {
        Ok(self.db.pending_agent_tasks(node_id).await?)
    }

    /// `status` must be one of `pending`, `running`, `success`, `failed`
    pub async fn update_task_status(
        &self,
        task_id: i32,
        status: &str,
        last_error: Option<String>,
    ) -> Result<agent_task::Model, ControlError> {
        let status: TaskStatus = status.parse().map_err(ControlError::Validation)?;

        let task = self
            .db
            .set_agent_task_status(task_id, status, last_error)
            .await?
            .ok_or_else(|| ControlError::NotFound(format!("Task {}", task_id)))?;

        info!(task_id, node_id = task.node_id, status = ?task.status, "Agent task status updated");
        Ok(task)
    }

    pub async fn enqueue_task(
        &self,
        node_id: i32,
        task_type: TaskType,
        payload: &serde_json::Value,
    ) -> Result<agent_task::Model, ControlError> {
        self.db
            .find_node(node_id)
            .await?
            .ok_or_else(|| ControlError::NotFound(format!("Node {}", node_id)))?;

        let task = self
            .db
            .insert_agent_task(node_id, task_type, &payload.to_string())
            .await?;

        info!(task_id = task.id, node_id, task_type = ?task_type, "Agent task enqueued");
        Ok(task)
    }

    /// Key material of a certificate that currently serves something
    ///
    /// Unbound certificates are reported as not found.
    pub async fn certificate(&self, id: i32) -> Result<CertificateBundle, ControlError> {
        if self.db.active_bindings_for_certificate(id).await?.is_empty() {
            debug!(certificate_id = id, "Refusing key material of unbound certificate");
            return Err(ControlError::NotFound(format!("Certificate {}", id)));
        }
        let certificate = self
            .db
            .find_certificate(id)
            .await?
            .ok_or_else(|| ControlError::NotFound(format!("Certificate {}", id)))?;
        let domains = self.db.certificate_domains(id).await?;

        Ok(CertificateBundle {
            id: certificate.id,
            domains,
            fingerprint: certificate.fingerprint,
            expire_at: certificate.expire_at,
            certificate_pem: certificate.certificate_pem,
            private_key_pem: certificate.private_key_pem,
        })
    }
}
