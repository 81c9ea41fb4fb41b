use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};

use crate::entities::{line_group, node, node_group, node_group_sub_ip, node_sub_ip};

#[async_trait]
pub trait TopologyStore: Send + Sync {
    async fn insert_node(&self, name: &str, main_ip: &str) -> Result<node::Model, DbErr>;

    async fn find_node(&self, id: i32) -> Result<Option<node::Model>, DbErr>;

    async fn insert_node_sub_ip(
        &self,
        node_id: i32,
        ip: &str,
        enabled: bool,
    ) -> Result<node_sub_ip::Model, DbErr>;

    async fn find_node_sub_ips(&self, ids: &[i32]) -> Result<Vec<node_sub_ip::Model>, DbErr>;

    async fn insert_node_group(
        &self,
        name: &str,
        domain_id: i32,
        cname_prefix: &str,
        cname: &str,
    ) -> Result<node_group::Model, DbErr>;

    async fn find_node_group(&self, id: i32) -> Result<Option<node_group::Model>, DbErr>;

    async fn list_node_groups(&self) -> Result<Vec<node_group::Model>, DbErr>;

    async fn touch_node_group(&self, id: i32) -> Result<(), DbErr>;

    async fn link_node_group_sub_ips(&self, node_group_id: i32, sub_ip_ids: &[i32])
        -> Result<(), DbErr>;

    async fn unlink_node_group_sub_ips(&self, node_group_id: i32) -> Result<u64, DbErr>;

    /// Sub-IP rows linked to a node group, enabled or not
    async fn node_group_sub_ips(&self, node_group_id: i32)
        -> Result<Vec<node_sub_ip::Model>, DbErr>;

    async fn delete_node_group_row(&self, id: i32) -> Result<bool, DbErr>;

    async fn insert_line_group(
        &self,
        name: &str,
        domain_id: i32,
        node_group_id: i32,
        cname_prefix: &str,
        cname: &str,
    ) -> Result<line_group::Model, DbErr>;

    async fn find_line_group(&self, id: i32) -> Result<Option<line_group::Model>, DbErr>;

    async fn list_line_groups(&self) -> Result<Vec<line_group::Model>, DbErr>;

    async fn count_line_groups_for_node_group(&self, node_group_id: i32) -> Result<u64, DbErr>;

    async fn delete_line_group_row(&self, id: i32) -> Result<bool, DbErr>;
}

#[async_trait]
impl<C> TopologyStore for C
where
    C: ConnectionTrait + Send,
{
    async fn insert_node(&self, name: &str, main_ip: &str) -> Result<node::Model, DbErr> {
        node::ActiveModel {
            name: Set(name.to_string()),
            main_ip: Set(main_ip.to_string()),
            enabled: Set(true),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(self)
        .await
    }

    async fn find_node(&self, id: i32) -> Result<Option<node::Model>, DbErr> {
        node::Entity::find_by_id(id).one(self).await
    }

    async fn insert_node_sub_ip(
        &self,
        node_id: i32,
        ip: &str,
        enabled: bool,
    ) -> Result<node_sub_ip::Model, DbErr> {
        node_sub_ip::ActiveModel {
            node_id: Set(node_id),
            ip: Set(ip.to_string()),
            enabled: Set(enabled),
            ..Default::default()
        }
        .insert(self)
        .await
    }

    async fn find_node_sub_ips(&self, ids: &[i32]) -> Result<Vec<node_sub_ip::Model>, DbErr> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        node_sub_ip::Entity::find()
            .filter(node_sub_ip::Column::Id.is_in(ids.iter().copied()))
            .order_by_asc(node_sub_ip::Column::Id)
            .all(self)
            .await
    }

    async fn insert_node_group(
        &self,
        name: &str,
        domain_id: i32,
        cname_prefix: &str,
        cname: &str,
    ) -> Result<node_group::Model, DbErr> {
        let now = Utc::now();
        node_group::ActiveModel {
            name: Set(name.to_string()),
            domain_id: Set(domain_id),
            cname_prefix: Set(cname_prefix.to_string()),
            cname: Set(cname.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(self)
        .await
    }

    async fn find_node_group(&self, id: i32) -> Result<Option<node_group::Model>, DbErr> {
        node_group::Entity::find_by_id(id).one(self).await
    }

    async fn list_node_groups(&self) -> Result<Vec<node_group::Model>, DbErr> {
        node_group::Entity::find()
            .order_by_asc(node_group::Column::Id)
            .all(self)
            .await
    }

    async fn touch_node_group(&self, id: i32) -> Result<(), DbErr> {
        node_group::ActiveModel {
            id: Set(id),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .update(self)
        .await?;
        Ok(())
    }

    async fn link_node_group_sub_ips(
        &self,
        node_group_id: i32,
        sub_ip_ids: &[i32],
    ) -> Result<(), DbErr> {
        for sub_ip_id in sub_ip_ids {
            node_group_sub_ip::ActiveModel {
                node_group_id: Set(node_group_id),
                sub_ip_id: Set(*sub_ip_id),
                ..Default::default()
            }
            .insert(self)
            .await?;
        }
        Ok(())
    }

    async fn unlink_node_group_sub_ips(&self, node_group_id: i32) -> Result<u64, DbErr> {
        let result = node_group_sub_ip::Entity::delete_many()
            .filter(node_group_sub_ip::Column::NodeGroupId.eq(node_group_id))
            .exec(self)
            .await?;
        Ok(result.rows_affected)
    }

    async fn node_group_sub_ips(
        &self,
        node_group_id: i32,
    ) -> Result<Vec<node_sub_ip::Model>, DbErr> {
        let links = node_group_sub_ip::Entity::find()
            .filter(node_group_sub_ip::Column::NodeGroupId.eq(node_group_id))
            .all(self)
            .await?;
        let ids: Vec<i32> = links.into_iter().map(|link| link.sub_ip_id).collect();
        self.find_node_sub_ips(&ids).await
    }

    async fn delete_node_group_row(&self, id: i32) -> Result<bool, DbErr> {
        let result = node_group::Entity::delete_by_id(id).exec(self).await?;
        Ok(result.rows_affected > 0)
    }

    async fn insert_line_group(
        &self,
        name: &str,
        domain_id: i32,
        node_group_id: i32,
        cname_prefix: &str,
        cname: &str,
    ) -> Result<line_group::Model, DbErr> {
        let now = Utc::now();
        line_group::ActiveModel {
            name: Set(name.to_string()),
            domain_id: Set(domain_id),
            node_group_id: Set(node_group_id),
            cname_prefix: Set(cname_prefix.to_string()),
            cname: Set(cname.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(self)
        .await
    }

    async fn find_line_group(&self, id: i32) -> Result<Option<line_group::Model>, DbErr> {
        line_group::Entity::find_by_id(id).one(self).await
    }

    async fn list_line_groups(&self) -> Result<Vec<line_group::Model>, DbErr> {
        line_group::Entity::find()
            .order_by_asc(line_group::Column::Id)
            .all(self)
            .await
    }

    async fn count_line_groups_for_node_group(&self, node_group_id: i32) -> Result<u64, DbErr> {
        line_group::Entity::find()
            .filter(line_group::Column::NodeGroupId.eq(node_group_id))
            .count(self)
            .await
    }

    async fn delete_line_group_row(&self, id: i32) -> Result<bool, DbErr> {
        let result = line_group::Entity::delete_by_id(id).exec(self).await?;
        Ok(result.rows_affected > 0)
    }
}
