//! CertificateRequest entity: one row per ACME issuance attempt

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    #[sea_orm(string_value = "pending")]
    Pending,

    #[sea_orm(string_value = "running")]
    Running,

    #[sea_orm(string_value = "success")]
    Success,

    #[sea_orm(string_value = "failed")]
    Failed,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Success | RequestStatus::Failed)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "certificate_requests")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub acme_account_id: i32,

    /// JSON array of requested names, in request order
    #[sea_orm(column_type = "Text")]
    pub domains_json: String,

    #[sea_orm(indexed)]
    pub status: RequestStatus,

    pub poll_interval_secs: i32,

    pub poll_max_attempts: i32,

    pub attempts: i32,

    #[sea_orm(column_type = "Text", nullable)]
    pub last_error: Option<String>,

    pub result_certificate_id: Option<i32>,

    /// Certificate this request renews, when created by the renewal scan
    pub renews_certificate_id: Option<i32>,

    pub created_at: ChronoDateTimeUtc,

    pub updated_at: ChronoDateTimeUtc,
}

impl Model {
    /// Requested names; a malformed column yields an empty list
    pub fn domains(&self) -> Vec<String> {
        serde_json::from_str(&self.domains_json).unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::acme_account::Entity",
        from = "Column::AcmeAccountId",
        to = "super::acme_account::Column::Id"
    )]
    AcmeAccount,
}

impl Related<super::acme_account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AcmeAccount.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
