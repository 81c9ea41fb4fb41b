use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};

use crate::entities::{
    website::{self, WebsiteStatus},
    website_domain,
};

#[async_trait]
pub trait WebsiteStore: Send + Sync {
    async fn insert_website(&self, line_group_id: i32) -> Result<website::Model, DbErr>;

    async fn find_website(&self, id: i32) -> Result<Option<website::Model>, DbErr>;

    async fn list_websites(&self) -> Result<Vec<website::Model>, DbErr>;

    async fn count_websites_for_line_group(&self, line_group_id: i32) -> Result<u64, DbErr>;

    async fn delete_website_row(&self, id: i32) -> Result<bool, DbErr>;

    async fn insert_website_domain(
        &self,
        website_id: i32,
        domain: &str,
        is_primary: bool,
        cname: &str,
    ) -> Result<website_domain::Model, DbErr>;

    async fn find_website_domain_by_name(
        &self,
        domain: &str,
    ) -> Result<Option<website_domain::Model>, DbErr>;

    /// Domains of a website, primary first
    async fn website_domains(&self, website_id: i32) -> Result<Vec<website_domain::Model>, DbErr>;

    async fn delete_website_domain_row(&self, id: i32) -> Result<bool, DbErr>;
}

#[async_trait]
impl<C> WebsiteStore for C
where
    C: ConnectionTrait + Send,
{
    async fn insert_website(&self, line_group_id: i32) -> Result<website::Model, DbErr> {
        let now = Utc::now();
        website::ActiveModel {
            line_group_id: Set(line_group_id),
            status: Set(WebsiteStatus::Active),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(self)
        .await
    }

    async fn find_website(&self, id: i32) -> Result<Option<website::Model>, DbErr> {
        website::Entity::find_by_id(id).one(self).await
    }

    async fn list_websites(&self) -> Result<Vec<website::Model>, DbErr> {
        website::Entity::find()
            .order_by_asc(website::Column::Id)
            .all(self)
            .await
    }

    async fn count_websites_for_line_group(&self, line_group_id: i32) -> Result<u64, DbErr> {
        website::Entity::find()
            .filter(website::Column::LineGroupId.eq(line_group_id))
            .count(self)
            .await
    }

    async fn delete_website_row(&self, id: i32) -> Result<bool, DbErr> {
        let result = website::Entity::delete_by_id(id).exec(self).await?;
        Ok(result.rows_affected > 0)
    }

    async fn insert_website_domain(
        &self,
        website_id: i32,
        domain: &str,
        is_primary: bool,
        cname: &str,
    ) -> Result<website_domain::Model, DbErr> {
        website_domain::ActiveModel {
            website_id: Set(website_id),
            domain: Set(domain.to_string()),
            is_primary: Set(is_primary),
            cname: Set(cname.to_string()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(self)
        .await
    }

    async fn find_website_domain_by_name(
        &self,
        domain: &str,
    ) -> Result<Option<website_domain::Model>, DbErr> {
        website_domain::Entity::find()
            .filter(website_domain::Column::Domain.eq(domain))
            .one(self)
            .await
    }

    async fn website_domains(&self, website_id: i32) -> Result<Vec<website_domain::Model>, DbErr> {
        website_domain::Entity::find()
            .filter(website_domain::Column::WebsiteId.eq(website_id))
            .order_by_desc(website_domain::Column::IsPrimary)
            .order_by_asc(website_domain::Column::Id)
            .all(self)
            .await
    }

    async fn delete_website_domain_row(&self, id: i32) -> Result<bool, DbErr> {
        let result = website_domain::Entity::delete_by_id(id).exec(self).await?;
        Ok(result.rows_affected > 0)
    }
}
