use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait, QueryOrder, Set,
};

use crate::entities::config_version;

#[async_trait]
pub trait ConfigVersionStore: Send + Sync {
    /// Row with the highest version, if the ledger is not empty
    async fn latest_config_version(&self) -> Result<Option<config_version::Model>, DbErr>;

    async fn insert_config_version(
        &self,
        version: i64,
        reason: &str,
    ) -> Result<config_version::Model, DbErr>;

    /// One page of history, newest first, plus the total row count
    async fn config_version_page(
        &self,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<config_version::Model>, u64), DbErr>;
}

#[async_trait]
impl<C> ConfigVersionStore for C
where
    C: ConnectionTrait + Send,
{
    async fn latest_config_version(&self) -> Result<Option<config_version::Model>, DbErr> {
        config_version::Entity::find()
            .order_by_desc(config_version::Column::Version)
            .one(self)
            .await
    }

    async fn insert_config_version(
        &self,
        version: i64,
        reason: &str,
    ) -> Result<config_version::Model, DbErr> {
        config_version::ActiveModel {
            version: Set(version),
            reason: Set(reason.to_string()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(self)
        .await
    }

    async fn config_version_page(
        &self,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<config_version::Model>, u64), DbErr> {
        let paginator = config_version::Entity::find()
            .order_by_desc(config_version::Column::Version)
            .paginate(self, page_size.max(1));
        let total = paginator.num_items().await?;
        let rows = paginator.fetch_page(page).await?;
        Ok((rows, total))
    }
}
