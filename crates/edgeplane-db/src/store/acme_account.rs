use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectionTrait, DbErr, EntityTrait, Set};

use crate::entities::{
    acme_account::{self, AccountStatus},
    acme_provider,
};

#[async_trait]
pub trait AcmeAccountStore: Send + Sync {
    /// Register a directory; `eab` is (key id, base64url HMAC key)
    async fn insert_acme_provider(
        &self,
        name: &str,
        directory_url: &str,
        eab: Option<(String, String)>,
    ) -> Result<acme_provider::Model, DbErr>;

    async fn insert_acme_account(
        &self,
        provider_id: i32,
        email: &str,
    ) -> Result<acme_account::Model, DbErr>;

    /// Account together with the directory it belongs to
    async fn find_acme_account(
        &self,
        id: i32,
    ) -> Result<Option<(acme_account::Model, acme_provider::Model)>, DbErr>;

    /// Persist credentials returned by registration and mark the account active
    async fn store_account_credentials(&self, id: i32, credentials_json: &str)
        -> Result<(), DbErr>;

    async fn mark_account_error(&self, id: i32, error: &str) -> Result<(), DbErr>;
}

#[async_trait]
impl<C> AcmeAccountStore for C
where
    C: ConnectionTrait + Send,
{
    async fn insert_acme_provider(
        &self,
        name: &str,
        directory_url: &str,
        eab: Option<(String, String)>,
    ) -> Result<acme_provider::Model, DbErr> {
        let (eab_kid, eab_hmac_key) = match eab {
            Some((kid, key)) => (Some(kid), Some(key)),
            None => (None, None),
        };

        acme_provider::ActiveModel {
            name: Set(name.to_string()),
            directory_url: Set(directory_url.to_string()),
            requires_eab: Set(eab_kid.is_some()),
            eab_kid: Set(eab_kid),
            eab_hmac_key: Set(eab_hmac_key),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(self)
        .await
    }

    async fn insert_acme_account(
        &self,
        provider_id: i32,
        email: &str,
    ) -> Result<acme_account::Model, DbErr> {
        let now = Utc::now();
        acme_account::ActiveModel {
            provider_id: Set(provider_id),
            email: Set(email.to_string()),
            credentials_json: Set(None),
            status: Set(AccountStatus::Pending),
            last_error: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(self)
        .await
    }

    async fn find_acme_account(
        &self,
        id: i32,
    ) -> Result<Option<(acme_account::Model, acme_provider::Model)>, DbErr> {
        let found = acme_account::Entity::find_by_id(id)
            .find_also_related(acme_provider::Entity)
            .one(self)
            .await?;

        Ok(found.and_then(|(account, provider)| provider.map(|provider| (account, provider))))
    }

    async fn store_account_credentials(
        &self,
        id: i32,
        credentials_json: &str,
    ) -> Result<(), DbErr> {
        acme_account::ActiveModel {
            id: Set(id),
            credentials_json: Set(Some(credentials_json.to_string())),
            status: Set(AccountStatus::Active),
            last_error: Set(None),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .update(self)
        .await?;
        Ok(())
    }

    async fn mark_account_error(&self, id: i32, error: &str) -> Result<(), DbErr> {
        acme_account::ActiveModel {
            id: Set(id),
            last_error: Set(Some(error.to_string())),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .update(self)
        .await?;
        Ok(())
    }
}
