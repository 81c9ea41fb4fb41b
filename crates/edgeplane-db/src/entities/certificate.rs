//! Certificate entity
//!
//! Rows are immutable once issued except for the lifecycle fields
//! (`status`, `renew_at`, `last_error`). Covered names live in
//! `certificate_domains`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum CertificateSource {
    #[sea_orm(string_value = "acme")]
    Acme,

    #[sea_orm(string_value = "manual")]
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum CertificateStatus {
    #[sea_orm(string_value = "valid")]
    Valid,

    /// Inside the renewal window
    #[sea_orm(string_value = "expiring")]
    Expiring,

    #[sea_orm(string_value = "expired")]
    Expired,

    #[sea_orm(string_value = "revoked")]
    Revoked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum RenewMode {
    #[sea_orm(string_value = "auto")]
    Auto,

    #[sea_orm(string_value = "manual")]
    Manual,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "certificates")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// ACME provider name, or `manual` for uploads
    pub provider: String,

    pub source: CertificateSource,

    pub acme_account_id: Option<i32>,

    pub status: CertificateStatus,

    /// Lower-case hex sha256 of the leaf DER
    #[sea_orm(unique)]
    pub fingerprint: String,

    pub issue_at: ChronoDateTimeUtc,

    pub expire_at: ChronoDateTimeUtc,

    pub renew_mode: RenewMode,

    pub renew_at: Option<ChronoDateTimeUtc>,

    #[sea_orm(column_type = "Text")]
    pub certificate_pem: String,

    #[sea_orm(column_type = "Text")]
    #[serde(skip_serializing)]
    pub private_key_pem: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub last_error: Option<String>,

    pub created_at: ChronoDateTimeUtc,

    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::certificate_domain::Entity")]
    CertificateDomain,

    #[sea_orm(has_many = "super::certificate_binding::Entity")]
    CertificateBinding,
}

impl Related<super::certificate_domain::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CertificateDomain.def()
    }
}

impl Related<super::certificate_binding::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CertificateBinding.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
