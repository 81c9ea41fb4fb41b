//! Node groups, line groups and websites
//!
//! The topology is published through DNS: a node group's CNAME resolves to
//! the A records of its enabled sub-IPs, a line group's CNAME points at a
//! node group, and each website domain is a CNAME to its line group.
//! Writes here declare those records and bump the ledger in the same
//! transaction; provider-side clean-up of replaced records runs after commit.

use edgeplane_db::{
    entities::{
        certificate_binding::BindType, dns_record, dns_record::RecordType, domain, line_group,
        node_group, node_sub_ip, website, website_domain,
    },
    store::{BindingStore, TopologyStore, WebsiteStore, ZoneStore},
    Owner,
};
use edgeplane_dns::{zone, CreateRecord, DnsRecordService};
use rand::Rng;
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use tracing::{debug, info};

use crate::error::ControlError;
use crate::ledger::ConfigLedger;

/// Length of generated CNAME prefixes
pub const CNAME_PREFIX_LEN: usize = 8;

const CNAME_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Random `[a-z0-9]{8}` label
pub fn generate_cname_prefix() -> String {
    let mut rng = rand::thread_rng();
    (0..CNAME_PREFIX_LEN)
        .map(|_| CNAME_CHARSET[rng.gen_range(0..CNAME_CHARSET.len())] as char)
        .collect()
}

fn validate_host(host: &str) -> Result<(), ControlError> {
    if host.is_empty() {
        return Err(ControlError::Validation("domain is empty".to_string()));
    }
    if host.contains(char::is_whitespace) || host.contains("..") || !host.contains('.') {
        return Err(ControlError::Validation(format!(
            "'{}' is not a valid host name",
            host
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct TopologyService {
    db: DatabaseConnection,
    records: DnsRecordService,
}

impl TopologyService {
    pub fn new(db: DatabaseConnection, records: DnsRecordService) -> Self {
        Self { db, records }
    }

    /// Create a node group publishing its enabled sub-IPs as A records
    pub async fn create_node_group(
        &self,
        name: &str,
        domain_id: i32,
        sub_ip_ids: &[i32],
    ) -> Result<node_group::Model, ControlError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ControlError::Validation("node group name is empty".to_string()));
        }

        let txn = self.db.begin().await?;
        let zone = find_zone(&txn, domain_id).await?;
        let sub_ips = load_sub_ips(&txn, sub_ip_ids).await?;

        let prefix = generate_cname_prefix();
        let cname = format!("{}.{}", prefix, zone.domain);
        let group = txn
            .insert_node_group(name, zone.id, &prefix, &cname)
            .await?;

        let ids: Vec<i32> = sub_ips.iter().map(|ip| ip.id).collect();
        txn.link_node_group_sub_ips(group.id, &ids).await?;
        let declared = declare_node_group_records(&txn, &group, &sub_ips).await?;

        let version = ConfigLedger::bump(&txn, "node_group:create").await?;
        txn.commit().await?;

        info!(
            node_group_id = group.id,
            cname = %group.cname,
            records = declared,
            version,
            "Node group created"
        );
        Ok(group)
    }

    /// Replace the sub-IP set and re-derive the A records
    pub async fn update_node_group_sub_ips(
        &self,
        id: i32,
        sub_ip_ids: &[i32],
    ) -> Result<node_group::Model, ControlError> {
        let txn = self.db.begin().await?;
        let group = txn
            .find_node_group(id)
            .await?
            .ok_or_else(|| ControlError::NotFound(format!("Node group {}", id)))?;
        let sub_ips = load_sub_ips(&txn, sub_ip_ids).await?;

        txn.unlink_node_group_sub_ips(id).await?;
        let ids: Vec<i32> = sub_ips.iter().map(|ip| ip.id).collect();
        txn.link_node_group_sub_ips(id, &ids).await?;

        let removed = DnsRecordService::delete_owned(&txn, Owner::NodeGroup(id)).await?;
        let declared = declare_node_group_records(&txn, &group, &sub_ips).await?;
        txn.touch_node_group(id).await?;

        let version = ConfigLedger::bump(&txn, "node_group:update").await?;
        txn.commit().await?;

        self.records.purge_from_provider(&removed).await;
        info!(node_group_id = id, records = declared, version, "Node group updated");
        Ok(group)
    }

    /// Refused while a line group still points at the node group
    pub async fn delete_node_group(&self, id: i32) -> Result<(), ControlError> {
        let txn = self.db.begin().await?;
        txn.find_node_group(id)
            .await?
            .ok_or_else(|| ControlError::NotFound(format!("Node group {}", id)))?;

        let line_groups = txn.count_line_groups_for_node_group(id).await?;
        if line_groups > 0 {
            return Err(ControlError::Conflict(format!(
                "node group {} is used by {} line group(s)",
                id, line_groups
            )));
        }

        txn.unlink_node_group_sub_ips(id).await?;
        let removed = DnsRecordService::delete_owned(&txn, Owner::NodeGroup(id)).await?;
        txn.delete_node_group_row(id).await?;

        let version = ConfigLedger::bump(&txn, "node_group:delete").await?;
        txn.commit().await?;

        self.records.purge_from_provider(&removed).await;
        info!(node_group_id = id, version, "Node group deleted");
        Ok(())
    }

    /// Create a line group whose CNAME points at the node group's CNAME
    pub async fn create_line_group(
        &self,
        name: &str,
        domain_id: i32,
        node_group_id: i32,
    ) -> Result<line_group::Model, ControlError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ControlError::Validation("line group name is empty".to_string()));
        }

        let txn = self.db.begin().await?;
        let zone = find_zone(&txn, domain_id).await?;
        let node_group = txn
            .find_node_group(node_group_id)
            .await?
            .ok_or_else(|| ControlError::NotFound(format!("Node group {}", node_group_id)))?;

        let prefix = generate_cname_prefix();
        let cname = format!("{}.{}", prefix, zone.domain);
        let group = txn
            .insert_line_group(name, zone.id, node_group.id, &prefix, &cname)
            .await?;

        DnsRecordService::create_in(
            &txn,
            CreateRecord {
                domain_id: zone.id,
                record_type: RecordType::Cname,
                name: group.cname.clone(),
                value: node_group.cname.clone(),
                ttl: None,
                proxied: false,
                owner: Owner::LineGroup(group.id),
            },
        )
        .await?;

        let version = ConfigLedger::bump(&txn, "line_group:create").await?;
        txn.commit().await?;

        info!(line_group_id = group.id, cname = %group.cname, version, "Line group created");
        Ok(group)
    }

    /// Refused while a website is served through the line group
    pub async fn delete_line_group(&self, id: i32) -> Result<(), ControlError> {
        let txn = self.db.begin().await?;
        txn.find_line_group(id)
            .await?
            .ok_or_else(|| ControlError::NotFound(format!("Line group {}", id)))?;

        let websites = txn.count_websites_for_line_group(id).await?;
        if websites > 0 {
            return Err(ControlError::Conflict(format!(
                "line group {} is used by {} website(s)",
                id, websites
            )));
        }

        let removed = DnsRecordService::delete_owned(&txn, Owner::LineGroup(id)).await?;
        txn.delete_line_group_row(id).await?;

        let version = ConfigLedger::bump(&txn, "line_group:delete").await?;
        txn.commit().await?;

        self.records.purge_from_provider(&removed).await;
        info!(line_group_id = id, version, "Line group deleted");
        Ok(())
    }

    /// Create a website; the first domain is the primary one
    pub async fn create_website(
        &self,
        line_group_id: i32,
        domains: &[String],
    ) -> Result<(website::Model, Vec<website_domain::Model>), ControlError> {
        let mut hosts: Vec<String> = Vec::with_capacity(domains.len());
        for domain in domains {
            let host = zone::normalize(domain);
            validate_host(&host)?;
            if !hosts.contains(&host) {
                hosts.push(host);
            }
        }
        if hosts.is_empty() {
            return Err(ControlError::Validation(
                "a website needs at least one domain".to_string(),
            ));
        }

        let txn = self.db.begin().await?;
        let line_group = txn
            .find_line_group(line_group_id)
            .await?
            .ok_or_else(|| ControlError::NotFound(format!("Line group {}", line_group_id)))?;

        let site = txn.insert_website(line_group.id).await?;
        let mut attached = Vec::with_capacity(hosts.len());
        for (index, host) in hosts.iter().enumerate() {
            attached.push(attach_domain(&txn, site.id, host, index == 0, &line_group).await?);
        }

        let version = ConfigLedger::bump(&txn, "website:create").await?;
        txn.commit().await?;

        info!(website_id = site.id, domains = attached.len(), version, "Website created");
        Ok((site, attached))
    }

    /// Attach another domain; it becomes primary only when the website has none
    pub async fn add_website_domain(
        &self,
        website_id: i32,
        domain: &str,
    ) -> Result<website_domain::Model, ControlError> {
        let host = zone::normalize(domain);
        validate_host(&host)?;

        let txn = self.db.begin().await?;
        let site = txn
            .find_website(website_id)
            .await?
            .ok_or_else(|| ControlError::NotFound(format!("Website {}", website_id)))?;
        let line_group = txn
            .find_line_group(site.line_group_id)
            .await?
            .ok_or_else(|| ControlError::NotFound(format!("Line group {}", site.line_group_id)))?;

        let is_primary = txn.website_domains(website_id).await?.is_empty();
        let attached = attach_domain(&txn, website_id, &host, is_primary, &line_group).await?;

        let version =
            ConfigLedger::bump(&txn, &format!("website:add_domain:{}", website_id)).await?;
        txn.commit().await?;

        info!(website_id, domain = %host, version, "Website domain added");
        Ok(attached)
    }

    pub async fn remove_website_domain(
        &self,
        website_id: i32,
        domain: &str,
    ) -> Result<(), ControlError> {
        let host = zone::normalize(domain);

        let txn = self.db.begin().await?;
        let attached = txn
            .find_website_domain_by_name(&host)
            .await?
            .filter(|row| row.website_id == website_id)
            .ok_or_else(|| {
                ControlError::NotFound(format!("Domain {} of website {}", host, website_id))
            })?;

        let removed =
            DnsRecordService::delete_owned(&txn, Owner::WebsiteDomain(attached.id)).await?;
        txn.delete_website_domain_row(attached.id).await?;

        let version =
            ConfigLedger::bump(&txn, &format!("website:remove_domain:{}", website_id)).await?;
        txn.commit().await?;

        self.records.purge_from_provider(&removed).await;
        info!(website_id, domain = %host, version, "Website domain removed");
        Ok(())
    }

    /// Remove a website with its domains, records and certificate binding
    pub async fn delete_website(&self, website_id: i32) -> Result<(), ControlError> {
        let txn = self.db.begin().await?;
        txn.find_website(website_id)
            .await?
            .ok_or_else(|| ControlError::NotFound(format!("Website {}", website_id)))?;

        let mut removed: Vec<dns_record::Model> = Vec::new();
        for attached in txn.website_domains(website_id).await? {
            removed.extend(
                DnsRecordService::delete_owned(&txn, Owner::WebsiteDomain(attached.id)).await?,
            );
            txn.delete_website_domain_row(attached.id).await?;
        }
        txn.deactivate_bindings(BindType::Website, website_id)
            .await?;
        txn.delete_website_row(website_id).await?;

        let version = ConfigLedger::bump(&txn, &format!("website:delete:{}", website_id)).await?;
        txn.commit().await?;

        self.records.purge_from_provider(&removed).await;
        info!(website_id, version, "Website deleted");
        Ok(())
    }
}

async fn find_zone(txn: &DatabaseTransaction, domain_id: i32) -> Result<domain::Model, ControlError> {
    txn.find_zone(domain_id)
        .await?
        .ok_or_else(|| ControlError::NotFound(format!("Zone {}", domain_id)))
}

/// Load the requested sub-IPs, rejecting unknown ids
async fn load_sub_ips(
    txn: &DatabaseTransaction,
    sub_ip_ids: &[i32],
) -> Result<Vec<node_sub_ip::Model>, ControlError> {
    let mut ids = sub_ip_ids.to_vec();
    ids.sort_unstable();
    ids.dedup();

    let sub_ips = txn.find_node_sub_ips(&ids).await?;
    if let Some(missing) = ids
        .iter()
        .find(|id| !sub_ips.iter().any(|ip| ip.id == **id))
    {
        return Err(ControlError::Validation(format!(
            "sub IP {} does not exist",
            missing
        )));
    }
    Ok(sub_ips)
}

/// One A record per enabled sub-IP at the group's CNAME
async fn declare_node_group_records(
    txn: &DatabaseTransaction,
    group: &node_group::Model,
    sub_ips: &[node_sub_ip::Model],
) -> Result<usize, ControlError> {
    let mut declared = 0;
    for sub_ip in sub_ips.iter().filter(|ip| ip.enabled) {
        DnsRecordService::create_in(
            txn,
            CreateRecord {
                domain_id: group.domain_id,
                record_type: RecordType::A,
                name: group.cname.clone(),
                value: sub_ip.ip.clone(),
                ttl: None,
                proxied: false,
                owner: Owner::NodeGroup(group.id),
            },
        )
        .await?;
        declared += 1;
    }
    debug!(node_group_id = group.id, declared, "Node group A records declared");
    Ok(declared)
}

/// Insert the website domain row and its CNAME to the line group
async fn attach_domain(
    txn: &DatabaseTransaction,
    website_id: i32,
    host: &str,
    is_primary: bool,
    line_group: &line_group::Model,
) -> Result<website_domain::Model, ControlError> {
    if txn.find_website_domain_by_name(host).await?.is_some() {
        return Err(ControlError::Conflict(format!(
            "domain {} is already served by a website",
            host
        )));
    }

    let zone = zone::find_zone_for(txn, host)
        .await?
        .ok_or_else(|| ControlError::Validation(format!("no zone configured for {}", host)))?;

    let attached = txn
        .insert_website_domain(website_id, host, is_primary, &line_group.cname)
        .await?;

    DnsRecordService::create_in(
        txn,
        CreateRecord {
            domain_id: zone.id,
            record_type: RecordType::Cname,
            name: host.to_string(),
            value: line_group.cname.clone(),
            ttl: None,
            proxied: false,
            owner: Owner::WebsiteDomain(attached.id),
        },
    )
    .await?;

    Ok(attached)
}
