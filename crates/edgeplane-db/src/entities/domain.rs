//! Domain entity: an authoritative DNS zone managed by the control plane

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum ZoneStatus {
    #[sea_orm(string_value = "active")]
    Active,

    #[sea_orm(string_value = "inactive")]
    Inactive,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "domains")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Zone apex, lower-case without trailing dot (e.g. `example.com`)
    #[sea_orm(unique)]
    pub domain: String,

    pub status: ZoneStatus,

    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::dns_record::Entity")]
    DnsRecord,

    #[sea_orm(has_one = "super::domain_dns_provider::Entity")]
    DomainDnsProvider,
}

impl Related<super::dns_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DnsRecord.def()
    }
}

impl Related<super::domain_dns_provider::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DomainDnsProvider.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
