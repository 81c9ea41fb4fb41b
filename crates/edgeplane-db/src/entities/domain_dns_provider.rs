//! Binding of a zone to the provider account and provider-side zone id

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "domain_dns_providers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub domain_id: i32,

    /// Provider kind (e.g. `cloudflare`)
    pub provider: String,

    /// Zone identifier on the provider side
    pub provider_zone_id: String,

    pub credential_id: i32,

    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::domain::Entity",
        from = "Column::DomainId",
        to = "super::domain::Column::Id"
    )]
    Domain,

    #[sea_orm(
        belongs_to = "super::provider_credential::Entity",
        from = "Column::CredentialId",
        to = "super::provider_credential::Column::Id"
    )]
    ProviderCredential,
}

impl Related<super::domain::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Domain.def()
    }
}

impl Related<super::provider_credential::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProviderCredential.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
