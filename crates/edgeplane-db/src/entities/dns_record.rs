//! DesiredDNSRecord entity: one row per record the control plane wants the
//! external provider to serve

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    #[sea_orm(string_value = "A")]
    A,

    #[sea_orm(string_value = "AAAA")]
    Aaaa,

    #[sea_orm(string_value = "CNAME")]
    Cname,

    #[sea_orm(string_value = "TXT")]
    Txt,
}

impl RecordType {
    /// Wire name as used by DNS providers
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Cname => "CNAME",
            RecordType::Txt => "TXT",
        }
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Synchronization status against the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Waiting for the reconciliation worker
    #[sea_orm(string_value = "pending")]
    Pending,

    /// Provider accepted the record
    #[sea_orm(string_value = "active")]
    Active,

    /// Last sync attempt failed, retried after `next_retry_at`
    #[sea_orm(string_value = "error")]
    Error,
}

/// Kind of object a record was derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum OwnerType {
    #[sea_orm(string_value = "node_group")]
    NodeGroup,

    #[sea_orm(string_value = "line_group")]
    LineGroup,

    #[sea_orm(string_value = "website_domain")]
    WebsiteDomain,

    #[sea_orm(string_value = "acme_challenge")]
    AcmeChallenge,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "dns_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Zone the record lives in
    #[sea_orm(indexed)]
    pub domain_id: i32,

    pub record_type: RecordType,

    /// Zone-relative name, `@` for the apex
    pub name: String,

    #[sea_orm(column_type = "Text")]
    pub value: String,

    pub ttl: i32,

    pub proxied: bool,

    pub status: RecordStatus,

    /// Provider-side id, set once the provider accepted the record
    #[sea_orm(nullable)]
    pub provider_record_id: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub last_error: Option<String>,

    pub retry_count: i32,

    pub next_retry_at: Option<ChronoDateTimeUtc>,

    pub owner_type: OwnerType,

    pub owner_id: i32,

    pub created_at: ChronoDateTimeUtc,

    pub updated_at: ChronoDateTimeUtc,
}

impl Model {
    /// Typed back-reference to the object this record was derived from
    pub fn owner(&self) -> crate::Owner {
        crate::Owner::from_parts(self.owner_type, self.owner_id)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::domain::Entity",
        from = "Column::DomainId",
        to = "super::domain::Column::Id"
    )]
    Domain,
}

impl Related<super::domain::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Domain.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
