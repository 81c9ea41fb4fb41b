use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};

use crate::entities::{
    domain::{self, ZoneStatus},
    domain_dns_provider,
    provider_credential::{self, CredentialStatus},
};

#[async_trait]
pub trait ZoneStore: Send + Sync {
    async fn insert_zone(&self, domain: &str) -> Result<domain::Model, DbErr>;

    async fn find_zone(&self, id: i32) -> Result<Option<domain::Model>, DbErr>;

    async fn find_zone_by_name(&self, domain: &str) -> Result<Option<domain::Model>, DbErr>;

    async fn list_active_zones(&self) -> Result<Vec<domain::Model>, DbErr>;

    async fn insert_credential(
        &self,
        name: &str,
        provider: &str,
        api_token: &str,
    ) -> Result<provider_credential::Model, DbErr>;

    /// Attach a zone to a provider account; one binding per zone
    async fn bind_zone_provider(
        &self,
        domain_id: i32,
        provider: &str,
        provider_zone_id: &str,
        credential_id: i32,
    ) -> Result<domain_dns_provider::Model, DbErr>;

    /// Provider binding of a zone together with its credential row
    async fn find_zone_provider(
        &self,
        domain_id: i32,
    ) -> Result<
        Option<(
            domain_dns_provider::Model,
            Option<provider_credential::Model>,
        )>,
        DbErr,
    >;
}

#[async_trait]
impl<C> ZoneStore for C
where
    C: ConnectionTrait + Send,
{
    async fn insert_zone(&self, domain: &str) -> Result<domain::Model, DbErr> {
        domain::ActiveModel {
            domain: Set(domain.trim_end_matches('.').to_ascii_lowercase()),
            status: Set(ZoneStatus::Active),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(self)
        .await
    }

    async fn find_zone(&self, id: i32) -> Result<Option<domain::Model>, DbErr> {
        domain::Entity::find_by_id(id).one(self).await
    }

    async fn find_zone_by_name(&self, domain: &str) -> Result<Option<domain::Model>, DbErr> {
        domain::Entity::find()
            .filter(domain::Column::Domain.eq(domain))
            .one(self)
            .await
    }

    async fn list_active_zones(&self) -> Result<Vec<domain::Model>, DbErr> {
        domain::Entity::find()
            .filter(domain::Column::Status.eq(ZoneStatus::Active))
            .order_by_asc(domain::Column::Id)
            .all(self)
            .await
    }

    async fn insert_credential(
        &self,
        name: &str,
        provider: &str,
        api_token: &str,
    ) -> Result<provider_credential::Model, DbErr> {
        provider_credential::ActiveModel {
            name: Set(name.to_string()),
            provider: Set(provider.to_string()),
            api_token: Set(api_token.to_string()),
            status: Set(CredentialStatus::Active),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(self)
        .await
    }

    async fn bind_zone_provider(
        &self,
        domain_id: i32,
        provider: &str,
        provider_zone_id: &str,
        credential_id: i32,
    ) -> Result<domain_dns_provider::Model, DbErr> {
        domain_dns_provider::ActiveModel {
            domain_id: Set(domain_id),
            provider: Set(provider.to_string()),
            provider_zone_id: Set(provider_zone_id.to_string()),
            credential_id: Set(credential_id),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(self)
        .await
    }

    async fn find_zone_provider(
        &self,
        domain_id: i32,
    ) -> Result<
        Option<(
            domain_dns_provider::Model,
            Option<provider_credential::Model>,
        )>,
        DbErr,
    > {
        domain_dns_provider::Entity::find()
            .filter(domain_dns_provider::Column::DomainId.eq(domain_id))
            .find_also_related(provider_credential::Entity)
            .one(self)
            .await
    }
}
