//! At most one active certificate binding per target

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Partial index: SQLite and PostgreSQL both accept this form
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE UNIQUE INDEX IF NOT EXISTS idx_certificate_bindings_active_target
                ON certificate_bindings (bind_type, bind_id)
                WHERE is_active
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .if_exists()
                    .name("idx_certificate_bindings_active_target")
                    .table(CertificateBindings::Table)
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum CertificateBindings {
    Table,
}
