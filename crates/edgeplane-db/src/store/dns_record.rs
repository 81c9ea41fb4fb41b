use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait,
    IntoActiveModel, QueryFilter, QueryOrder, QuerySelect, Set,
};

use crate::entities::dns_record::{self, RecordStatus, RecordType};
use crate::Owner;

/// Desired record as declared by a caller, before it has an id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDnsRecord {
    pub domain_id: i32,
    pub record_type: RecordType,
    /// Zone-relative name, `@` for the apex
    pub name: String,
    pub value: String,
    pub ttl: i32,
    pub proxied: bool,
    pub owner: Owner,
}

#[async_trait]
pub trait DnsRecordStore: Send + Sync {
    /// Insert a record in `pending` state
    async fn insert_record(&self, record: NewDnsRecord) -> Result<dns_record::Model, DbErr>;

    async fn find_record(&self, id: i32) -> Result<Option<dns_record::Model>, DbErr>;

    /// Row with the same (zone, type, name, value, owner) identity, if any
    async fn find_record_by_identity(
        &self,
        record: &NewDnsRecord,
    ) -> Result<Option<dns_record::Model>, DbErr>;

    /// Pending/error rows whose retry time has come, oldest first
    async fn find_due_records(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<dns_record::Model>, DbErr>;

    async fn find_records_by_owner(&self, owner: Owner) -> Result<Vec<dns_record::Model>, DbErr>;

    async fn mark_record_synced(&self, id: i32, provider_record_id: &str) -> Result<(), DbErr>;

    async fn mark_record_failed(
        &self,
        id: i32,
        retry_count: i32,
        error: &str,
        next_retry_at: DateTime<Utc>,
    ) -> Result<(), DbErr>;

    /// Replace value/ttl/proxied; the row goes back to `pending` with no provider id
    async fn update_record_content(
        &self,
        id: i32,
        value: String,
        ttl: i32,
        proxied: bool,
    ) -> Result<Option<dns_record::Model>, DbErr>;

    /// Delete one row, returning what was deleted
    async fn delete_record_row(&self, id: i32) -> Result<Option<dns_record::Model>, DbErr>;

    /// Delete every row of an owner, returning what was deleted
    async fn delete_records_by_owner(&self, owner: Owner)
        -> Result<Vec<dns_record::Model>, DbErr>;

    /// Put one record back in the queue with a clean retry counter
    async fn reset_record_sync(&self, id: i32) -> Result<bool, DbErr>;

    /// Put every `error` record back in the queue
    async fn reset_failed_records(&self) -> Result<u64, DbErr>;
}

#[async_trait]
impl<C> DnsRecordStore for C
where
    C: ConnectionTrait + Send,
{
    async fn insert_record(&self, record: NewDnsRecord) -> Result<dns_record::Model, DbErr> {
        let now = Utc::now();
        dns_record::ActiveModel {
            domain_id: Set(record.domain_id),
            record_type: Set(record.record_type),
            name: Set(record.name),
            value: Set(record.value),
            ttl: Set(record.ttl),
            proxied: Set(record.proxied),
            status: Set(RecordStatus::Pending),
            provider_record_id: Set(None),
            last_error: Set(None),
            retry_count: Set(0),
            next_retry_at: Set(None),
            owner_type: Set(record.owner.owner_type()),
            owner_id: Set(record.owner.id()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(self)
        .await
    }

    async fn find_record(&self, id: i32) -> Result<Option<dns_record::Model>, DbErr> {
        dns_record::Entity::find_by_id(id).one(self).await
    }

    async fn find_record_by_identity(
        &self,
        record: &NewDnsRecord,
    ) -> Result<Option<dns_record::Model>, DbErr> {
        dns_record::Entity::find()
            .filter(dns_record::Column::DomainId.eq(record.domain_id))
            .filter(dns_record::Column::RecordType.eq(record.record_type))
            .filter(dns_record::Column::Name.eq(record.name.as_str()))
            .filter(dns_record::Column::Value.eq(record.value.as_str()))
            .filter(dns_record::Column::OwnerType.eq(record.owner.owner_type()))
            .filter(dns_record::Column::OwnerId.eq(record.owner.id()))
            .one(self)
            .await
    }

    async fn find_due_records(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<dns_record::Model>, DbErr> {
        dns_record::Entity::find()
            .filter(dns_record::Column::Status.is_in([RecordStatus::Pending, RecordStatus::Error]))
            .filter(
                Condition::any()
                    .add(dns_record::Column::NextRetryAt.is_null())
                    .add(dns_record::Column::NextRetryAt.lte(now)),
            )
            .order_by_asc(dns_record::Column::CreatedAt)
            .order_by_asc(dns_record::Column::Id)
            .limit(limit)
            .all(self)
            .await
    }

    async fn find_records_by_owner(&self, owner: Owner) -> Result<Vec<dns_record::Model>, DbErr> {
        dns_record::Entity::find()
            .filter(dns_record::Column::OwnerType.eq(owner.owner_type()))
            .filter(dns_record::Column::OwnerId.eq(owner.id()))
            .order_by_asc(dns_record::Column::Id)
            .all(self)
            .await
    }

    async fn mark_record_synced(&self, id: i32, provider_record_id: &str) -> Result<(), DbErr> {
        dns_record::ActiveModel {
            id: Set(id),
            status: Set(RecordStatus::Active),
            provider_record_id: Set(Some(provider_record_id.to_string())),
            last_error: Set(None),
            retry_count: Set(0),
            next_retry_at: Set(None),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .update(self)
        .await?;
        Ok(())
    }

    async fn mark_record_failed(
        &self,
        id: i32,
        retry_count: i32,
        error: &str,
        next_retry_at: DateTime<Utc>,
    ) -> Result<(), DbErr> {
        dns_record::ActiveModel {
            id: Set(id),
            status: Set(RecordStatus::Error),
            last_error: Set(Some(error.to_string())),
            retry_count: Set(retry_count),
            next_retry_at: Set(Some(next_retry_at)),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .update(self)
        .await?;
        Ok(())
    }

    async fn update_record_content(
        &self,
        id: i32,
        value: String,
        ttl: i32,
        proxied: bool,
    ) -> Result<Option<dns_record::Model>, DbErr> {
        let Some(existing) = dns_record::Entity::find_by_id(id).one(self).await? else {
            return Ok(None);
        };

        let mut active = existing.into_active_model();
        active.value = Set(value);
        active.ttl = Set(ttl);
        active.proxied = Set(proxied);
        active.status = Set(RecordStatus::Pending);
        active.provider_record_id = Set(None);
        active.last_error = Set(None);
        active.retry_count = Set(0);
        active.next_retry_at = Set(None);
        active.updated_at = Set(Utc::now());

        active.update(self).await.map(Some)
    }

    async fn delete_record_row(&self, id: i32) -> Result<Option<dns_record::Model>, DbErr> {
        let Some(existing) = dns_record::Entity::find_by_id(id).one(self).await? else {
            return Ok(None);
        };
        dns_record::Entity::delete_by_id(id).exec(self).await?;
        Ok(Some(existing))
    }

    async fn delete_records_by_owner(
        &self,
        owner: Owner,
    ) -> Result<Vec<dns_record::Model>, DbErr> {
        let existing = self.find_records_by_owner(owner).await?;
        if existing.is_empty() {
            return Ok(existing);
        }

        dns_record::Entity::delete_many()
            .filter(dns_record::Column::OwnerType.eq(owner.owner_type()))
            .filter(dns_record::Column::OwnerId.eq(owner.id()))
            .exec(self)
            .await?;

        Ok(existing)
    }

    async fn reset_record_sync(&self, id: i32) -> Result<bool, DbErr> {
        let result = dns_record::Entity::update_many()
            .col_expr(
                dns_record::Column::Status,
                sea_orm::sea_query::Expr::value(RecordStatus::Pending),
            )
            .col_expr(dns_record::Column::RetryCount, sea_orm::sea_query::Expr::value(0))
            .col_expr(
                dns_record::Column::NextRetryAt,
                sea_orm::sea_query::Expr::value(Option::<DateTime<Utc>>::None),
            )
            .col_expr(
                dns_record::Column::UpdatedAt,
                sea_orm::sea_query::Expr::value(Utc::now()),
            )
            .filter(dns_record::Column::Id.eq(id))
            .exec(self)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn reset_failed_records(&self) -> Result<u64, DbErr> {
        let result = dns_record::Entity::update_many()
            .col_expr(
                dns_record::Column::Status,
                sea_orm::sea_query::Expr::value(RecordStatus::Pending),
            )
            .col_expr(dns_record::Column::RetryCount, sea_orm::sea_query::Expr::value(0))
            .col_expr(
                dns_record::Column::NextRetryAt,
                sea_orm::sea_query::Expr::value(Option::<DateTime<Utc>>::None),
            )
            .col_expr(
                dns_record::Column::UpdatedAt,
                sea_orm::sea_query::Expr::value(Utc::now()),
            )
            .filter(dns_record::Column::Status.eq(RecordStatus::Error))
            .exec(self)
            .await?;
        Ok(result.rows_affected)
    }
}
