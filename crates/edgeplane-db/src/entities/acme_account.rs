//! ACME account registered against one provider

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    /// Not registered with the directory yet
    #[sea_orm(string_value = "pending")]
    Pending,

    #[sea_orm(string_value = "active")]
    Active,

    #[sea_orm(string_value = "disabled")]
    Disabled,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "acme_accounts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(indexed)]
    pub provider_id: i32,

    pub email: String,

    /// Serialized account credentials (key + account URL) returned on registration
    #[sea_orm(column_type = "Text", nullable)]
    #[serde(skip_serializing)]
    pub credentials_json: Option<String>,

    pub status: AccountStatus,

    #[sea_orm(column_type = "Text", nullable)]
    pub last_error: Option<String>,

    pub created_at: ChronoDateTimeUtc,

    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::acme_provider::Entity",
        from = "Column::ProviderId",
        to = "super::acme_provider::Column::Id"
    )]
    AcmeProvider,
}

impl Related<super::acme_provider::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AcmeProvider.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
