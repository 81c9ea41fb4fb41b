use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set,
};

use crate::entities::{
    certificate::{self, CertificateSource, CertificateStatus, RenewMode},
    certificate_binding, certificate_domain,
};

/// Parsed certificate ready to be persisted
#[derive(Debug, Clone)]
pub struct NewCertificate {
    pub provider: String,
    pub source: CertificateSource,
    pub acme_account_id: Option<i32>,
    pub fingerprint: String,
    pub issue_at: DateTime<Utc>,
    pub expire_at: DateTime<Utc>,
    pub renew_mode: RenewMode,
    pub renew_at: Option<DateTime<Utc>>,
    pub certificate_pem: String,
    pub private_key_pem: String,
}

#[async_trait]
pub trait CertificateStore: Send + Sync {
    /// Insert the certificate and one `certificate_domains` row per name
    async fn insert_certificate(
        &self,
        certificate: NewCertificate,
        domains: &[String],
    ) -> Result<certificate::Model, DbErr>;

    async fn find_certificate(&self, id: i32) -> Result<Option<certificate::Model>, DbErr>;

    async fn find_certificate_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<Option<certificate::Model>, DbErr>;

    /// Names covered by a certificate, in insertion order
    async fn certificate_domains(&self, certificate_id: i32) -> Result<Vec<String>, DbErr>;

    async fn list_certificates(&self) -> Result<Vec<certificate::Model>, DbErr>;

    /// Remove the certificate, its names and its (inactive) binding history
    async fn delete_certificate_row(&self, id: i32) -> Result<bool, DbErr>;

    /// Auto-renewing certificates whose renewal time has passed
    async fn certificates_due_for_renewal(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<certificate::Model>, DbErr>;

    /// Move certificates into `expiring` / `expired`; returns (expiring, expired) counts
    async fn refresh_certificate_statuses(
        &self,
        now: DateTime<Utc>,
        renewal_window: Duration,
    ) -> Result<(u64, u64), DbErr>;

    /// Take a superseded certificate out of the renewal scan
    async fn clear_renew_at(&self, id: i32) -> Result<(), DbErr>;
}

#[async_trait]
impl<C> CertificateStore for C
where
    C: ConnectionTrait + Send,
{
    async fn insert_certificate(
        &self,
        new: NewCertificate,
        domains: &[String],
    ) -> Result<certificate::Model, DbErr> {
        let now = Utc::now();
        let model = certificate::ActiveModel {
            provider: Set(new.provider),
            source: Set(new.source),
            acme_account_id: Set(new.acme_account_id),
            status: Set(CertificateStatus::Valid),
            fingerprint: Set(new.fingerprint),
            issue_at: Set(new.issue_at),
            expire_at: Set(new.expire_at),
            renew_mode: Set(new.renew_mode),
            renew_at: Set(new.renew_at),
            certificate_pem: Set(new.certificate_pem),
            private_key_pem: Set(new.private_key_pem),
            last_error: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(self)
        .await?;

        for domain in domains {
            certificate_domain::ActiveModel {
                certificate_id: Set(model.id),
                domain: Set(domain.clone()),
                ..Default::default()
            }
            .insert(self)
            .await?;
        }

        Ok(model)
    }

    async fn find_certificate(&self, id: i32) -> Result<Option<certificate::Model>, DbErr> {
        certificate::Entity::find_by_id(id).one(self).await
    }

    async fn find_certificate_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<Option<certificate::Model>, DbErr> {
        certificate::Entity::find()
            .filter(certificate::Column::Fingerprint.eq(fingerprint))
            .one(self)
            .await
    }

    async fn certificate_domains(&self, certificate_id: i32) -> Result<Vec<String>, DbErr> {
        let rows = certificate_domain::Entity::find()
            .filter(certificate_domain::Column::CertificateId.eq(certificate_id))
            .order_by_asc(certificate_domain::Column::Id)
            .all(self)
            .await?;
        Ok(rows.into_iter().map(|row| row.domain).collect())
    }

    async fn list_certificates(&self) -> Result<Vec<certificate::Model>, DbErr> {
        certificate::Entity::find()
            .order_by_asc(certificate::Column::Id)
            .all(self)
            .await
    }

    async fn delete_certificate_row(&self, id: i32) -> Result<bool, DbErr> {
        certificate_domain::Entity::delete_many()
            .filter(certificate_domain::Column::CertificateId.eq(id))
            .exec(self)
            .await?;
        certificate_binding::Entity::delete_many()
            .filter(certificate_binding::Column::CertificateId.eq(id))
            .exec(self)
            .await?;
        let result = certificate::Entity::delete_by_id(id).exec(self).await?;
        Ok(result.rows_affected > 0)
    }

    async fn certificates_due_for_renewal(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<certificate::Model>, DbErr> {
        certificate::Entity::find()
            .filter(certificate::Column::RenewMode.eq(RenewMode::Auto))
            .filter(certificate::Column::RenewAt.lte(now))
            .filter(certificate::Column::Status.ne(CertificateStatus::Revoked))
            .order_by_asc(certificate::Column::Id)
            .all(self)
            .await
    }

    async fn refresh_certificate_statuses(
        &self,
        now: DateTime<Utc>,
        renewal_window: Duration,
    ) -> Result<(u64, u64), DbErr> {
        let expired = certificate::Entity::update_many()
            .col_expr(
                certificate::Column::Status,
                Expr::value(CertificateStatus::Expired),
            )
            .col_expr(certificate::Column::UpdatedAt, Expr::value(now))
            .filter(certificate::Column::ExpireAt.lte(now))
            .filter(
                certificate::Column::Status
                    .is_in([CertificateStatus::Valid, CertificateStatus::Expiring]),
            )
            .exec(self)
            .await?;

        let horizon = now
            .checked_add_signed(renewal_window)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let expiring = certificate::Entity::update_many()
            .col_expr(
                certificate::Column::Status,
                Expr::value(CertificateStatus::Expiring),
            )
            .col_expr(certificate::Column::UpdatedAt, Expr::value(now))
            .filter(certificate::Column::ExpireAt.gt(now))
            .filter(certificate::Column::ExpireAt.lte(horizon))
            .filter(certificate::Column::Status.eq(CertificateStatus::Valid))
            .exec(self)
            .await?;

        Ok((expiring.rows_affected, expired.rows_affected))
    }

    async fn clear_renew_at(&self, id: i32) -> Result<(), DbErr> {
        certificate::Entity::update_many()
            .col_expr(
                certificate::Column::RenewAt,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .col_expr(certificate::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(certificate::Column::Id.eq(id))
            .exec(self)
            .await?;
        Ok(())
    }
}
