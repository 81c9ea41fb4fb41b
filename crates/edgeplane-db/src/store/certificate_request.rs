use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};

use crate::entities::certificate_request::{self, RequestStatus};

/// Issuance request as submitted, before it has an id
#[derive(Debug, Clone)]
pub struct NewCertificateRequest {
    pub acme_account_id: i32,
    pub domains: Vec<String>,
    pub poll_interval_secs: i32,
    pub poll_max_attempts: i32,
    pub renews_certificate_id: Option<i32>,
}

#[async_trait]
pub trait CertificateRequestStore: Send + Sync {
    async fn insert_request(
        &self,
        request: NewCertificateRequest,
    ) -> Result<certificate_request::Model, DbErr>;

    async fn find_request(&self, id: i32) -> Result<Option<certificate_request::Model>, DbErr>;

    /// `pending -> running`; false when somebody else claimed it first
    async fn claim_request(&self, id: i32) -> Result<bool, DbErr>;

    async fn pending_request_ids(&self, limit: u64) -> Result<Vec<i32>, DbErr>;

    async fn record_request_attempt(&self, id: i32, attempts: i32) -> Result<(), DbErr>;

    async fn complete_request(&self, id: i32, certificate_id: i32) -> Result<(), DbErr>;

    async fn fail_request(&self, id: i32, error: &str) -> Result<(), DbErr>;

    /// `running -> pending`, used when a worker is interrupted
    async fn release_request(&self, id: i32, note: &str) -> Result<(), DbErr>;

    /// Return every `running` request to `pending`
    async fn reset_running_requests(&self) -> Result<u64, DbErr>;

    /// Whether a pending/running request already renews this certificate
    async fn open_renewal_exists(&self, certificate_id: i32) -> Result<bool, DbErr>;
}

#[async_trait]
impl<C> CertificateRequestStore for C
where
    C: ConnectionTrait + Send,
{
    async fn insert_request(
        &self,
        request: NewCertificateRequest,
    ) -> Result<certificate_request::Model, DbErr> {
        let now = Utc::now();
        let domains_json = serde_json::to_string(&request.domains)
            .map_err(|e| DbErr::Custom(format!("failed to encode domains: {}", e)))?;

        certificate_request::ActiveModel {
            acme_account_id: Set(request.acme_account_id),
            domains_json: Set(domains_json),
            status: Set(RequestStatus::Pending),
            poll_interval_secs: Set(request.poll_interval_secs),
            poll_max_attempts: Set(request.poll_max_attempts),
            attempts: Set(0),
            last_error: Set(None),
            result_certificate_id: Set(None),
            renews_certificate_id: Set(request.renews_certificate_id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(self)
        .await
    }

    async fn find_request(&self, id: i32) -> Result<Option<certificate_request::Model>, DbErr> {
        certificate_request::Entity::find_by_id(id).one(self).await
    }

    async fn claim_request(&self, id: i32) -> Result<bool, DbErr> {
        let result = certificate_request::Entity::update_many()
            .col_expr(
                certificate_request::Column::Status,
                Expr::value(RequestStatus::Running),
            )
            .col_expr(certificate_request::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(certificate_request::Column::Id.eq(id))
            .filter(certificate_request::Column::Status.eq(RequestStatus::Pending))
            .exec(self)
            .await?;
        Ok(result.rows_affected == 1)
    }

    async fn pending_request_ids(&self, limit: u64) -> Result<Vec<i32>, DbErr> {
        certificate_request::Entity::find()
            .select_only()
            .column(certificate_request::Column::Id)
            .filter(certificate_request::Column::Status.eq(RequestStatus::Pending))
            .order_by_asc(certificate_request::Column::Id)
            .limit(limit)
            .into_tuple::<i32>()
            .all(self)
            .await
    }

    async fn record_request_attempt(&self, id: i32, attempts: i32) -> Result<(), DbErr> {
        certificate_request::ActiveModel {
            id: Set(id),
            attempts: Set(attempts),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .update(self)
        .await?;
        Ok(())
    }

    async fn complete_request(&self, id: i32, certificate_id: i32) -> Result<(), DbErr> {
        certificate_request::ActiveModel {
            id: Set(id),
            status: Set(RequestStatus::Success),
            last_error: Set(None),
            result_certificate_id: Set(Some(certificate_id)),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .update(self)
        .await?;
        Ok(())
    }

    async fn fail_request(&self, id: i32, error: &str) -> Result<(), DbErr> {
        certificate_request::ActiveModel {
            id: Set(id),
            status: Set(RequestStatus::Failed),
            last_error: Set(Some(error.to_string())),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .update(self)
        .await?;
        Ok(())
    }

    async fn release_request(&self, id: i32, note: &str) -> Result<(), DbErr> {
        certificate_request::Entity::update_many()
            .col_expr(
                certificate_request::Column::Status,
                Expr::value(RequestStatus::Pending),
            )
            .col_expr(
                certificate_request::Column::LastError,
                Expr::value(Some(note.to_string())),
            )
            .col_expr(certificate_request::Column::Attempts, Expr::value(0))
            .col_expr(certificate_request::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(certificate_request::Column::Id.eq(id))
            .filter(certificate_request::Column::Status.eq(RequestStatus::Running))
            .exec(self)
            .await?;
        Ok(())
    }

    async fn reset_running_requests(&self) -> Result<u64, DbErr> {
        let result = certificate_request::Entity::update_many()
            .col_expr(
                certificate_request::Column::Status,
                Expr::value(RequestStatus::Pending),
            )
            .col_expr(certificate_request::Column::Attempts, Expr::value(0))
            .col_expr(certificate_request::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(certificate_request::Column::Status.eq(RequestStatus::Running))
            .exec(self)
            .await?;
        Ok(result.rows_affected)
    }

    async fn open_renewal_exists(&self, certificate_id: i32) -> Result<bool, DbErr> {
        let open = certificate_request::Entity::find()
            .filter(certificate_request::Column::RenewsCertificateId.eq(certificate_id))
            .filter(
                certificate_request::Column::Status
                    .is_in([RequestStatus::Pending, RequestStatus::Running]),
            )
            .count(self)
            .await?;
        Ok(open > 0)
    }
}
