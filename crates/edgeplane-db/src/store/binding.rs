use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set,
};

use crate::entities::certificate_binding::{self, BindType};

#[async_trait]
pub trait BindingStore: Send + Sync {
    async fn active_binding(
        &self,
        bind_type: BindType,
        bind_id: i32,
    ) -> Result<Option<certificate_binding::Model>, DbErr>;

    /// Flip every active binding of the target to inactive
    async fn deactivate_bindings(&self, bind_type: BindType, bind_id: i32) -> Result<u64, DbErr>;

    /// Flip one binding to inactive; `false` when it was no longer active
    async fn deactivate_binding(&self, id: i32) -> Result<bool, DbErr>;

    async fn insert_binding(
        &self,
        certificate_id: i32,
        bind_type: BindType,
        bind_id: i32,
    ) -> Result<certificate_binding::Model, DbErr>;

    async fn active_bindings_for_certificate(
        &self,
        certificate_id: i32,
    ) -> Result<Vec<certificate_binding::Model>, DbErr>;

    async fn bindings_for_target(
        &self,
        bind_type: BindType,
        bind_id: i32,
    ) -> Result<Vec<certificate_binding::Model>, DbErr>;
}

#[async_trait]
impl<C> BindingStore for C
where
    C: ConnectionTrait + Send,
{
    async fn active_binding(
        &self,
        bind_type: BindType,
        bind_id: i32,
    ) -> Result<Option<certificate_binding::Model>, DbErr> {
        certificate_binding::Entity::find()
            .filter(certificate_binding::Column::BindType.eq(bind_type))
            .filter(certificate_binding::Column::BindId.eq(bind_id))
            .filter(certificate_binding::Column::IsActive.eq(true))
            .one(self)
            .await
    }

    async fn deactivate_bindings(&self, bind_type: BindType, bind_id: i32) -> Result<u64, DbErr> {
        let result = certificate_binding::Entity::update_many()
            .col_expr(certificate_binding::Column::IsActive, Expr::value(false))
            .col_expr(certificate_binding::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(certificate_binding::Column::BindType.eq(bind_type))
            .filter(certificate_binding::Column::BindId.eq(bind_id))
            .filter(certificate_binding::Column::IsActive.eq(true))
            .exec(self)
            .await?;
        Ok(result.rows_affected)
    }

    async fn deactivate_binding(&self, id: i32) -> Result<bool, DbErr> {
        let result = certificate_binding::Entity::update_many()
            .col_expr(certificate_binding::Column::IsActive, Expr::value(false))
            .col_expr(certificate_binding::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(certificate_binding::Column::Id.eq(id))
            .filter(certificate_binding::Column::IsActive.eq(true))
            .exec(self)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn insert_binding(
        &self,
        certificate_id: i32,
        bind_type: BindType,
        bind_id: i32,
    ) -> Result<certificate_binding::Model, DbErr> {
        let now = Utc::now();
        certificate_binding::ActiveModel {
            certificate_id: Set(certificate_id),
            bind_type: Set(bind_type),
            bind_id: Set(bind_id),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(self)
        .await
    }

    async fn active_bindings_for_certificate(
        &self,
        certificate_id: i32,
    ) -> Result<Vec<certificate_binding::Model>, DbErr> {
        certificate_binding::Entity::find()
            .filter(certificate_binding::Column::CertificateId.eq(certificate_id))
            .filter(certificate_binding::Column::IsActive.eq(true))
            .order_by_asc(certificate_binding::Column::Id)
            .all(self)
            .await
    }

    async fn bindings_for_target(
        &self,
        bind_type: BindType,
        bind_id: i32,
    ) -> Result<Vec<certificate_binding::Model>, DbErr> {
        certificate_binding::Entity::find()
            .filter(certificate_binding::Column::BindType.eq(bind_type))
            .filter(certificate_binding::Column::BindId.eq(bind_id))
            .order_by_asc(certificate_binding::Column::Id)
            .all(self)
            .await
    }
}
