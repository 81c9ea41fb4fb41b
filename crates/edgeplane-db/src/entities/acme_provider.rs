//! ACME certificate authority (directory) configuration

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "acme_providers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Display name, copied onto issued certificates (e.g. `letsencrypt`)
    #[sea_orm(unique)]
    pub name: String,

    #[sea_orm(column_type = "Text")]
    pub directory_url: String,

    /// Whether new accounts need external account binding
    pub requires_eab: bool,

    #[sea_orm(nullable)]
    pub eab_kid: Option<String>,

    /// Base64url-encoded EAB HMAC key
    #[sea_orm(column_type = "Text", nullable)]
    #[serde(skip_serializing)]
    pub eab_hmac_key: Option<String>,

    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::acme_account::Entity")]
    AcmeAccount,
}

impl Related<super::acme_account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AcmeAccount.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
