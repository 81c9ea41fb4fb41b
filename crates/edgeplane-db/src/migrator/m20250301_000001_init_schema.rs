//! Initial schema: zones, desired DNS records, certificates and the config ledger

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Domains::Table)
                    .if_not_exists()
                    .col(pk_auto(Domains::Id))
                    .col(string_len(Domains::Domain, 255).unique_key())
                    .col(string_len(Domains::Status, 16).default("active"))
                    .col(
                        timestamp_with_time_zone(Domains::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ProviderCredentials::Table)
                    .if_not_exists()
                    .col(pk_auto(ProviderCredentials::Id))
                    .col(string_len(ProviderCredentials::Name, 255))
                    .col(string_len(ProviderCredentials::Provider, 32))
                    .col(text(ProviderCredentials::ApiToken))
                    .col(string_len(ProviderCredentials::Status, 16).default("active"))
                    .col(
                        timestamp_with_time_zone(ProviderCredentials::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DomainDnsProviders::Table)
                    .if_not_exists()
                    .col(pk_auto(DomainDnsProviders::Id))
                    .col(integer(DomainDnsProviders::DomainId).unique_key())
                    .col(string_len(DomainDnsProviders::Provider, 32))
                    .col(string_len(DomainDnsProviders::ProviderZoneId, 128))
                    .col(integer(DomainDnsProviders::CredentialId))
                    .col(
                        timestamp_with_time_zone(DomainDnsProviders::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DnsRecords::Table)
                    .if_not_exists()
                    .col(pk_auto(DnsRecords::Id))
                    .col(integer(DnsRecords::DomainId))
                    .col(string_len(DnsRecords::RecordType, 8))
                    .col(string_len(DnsRecords::Name, 255))
                    .col(text(DnsRecords::Value))
                    .col(integer(DnsRecords::Ttl).default(120))
                    .col(boolean(DnsRecords::Proxied).default(false))
                    .col(string_len(DnsRecords::Status, 16).default("pending"))
                    .col(string_len_null(DnsRecords::ProviderRecordId, 128))
                    .col(text_null(DnsRecords::LastError))
                    .col(integer(DnsRecords::RetryCount).default(0))
                    .col(timestamp_with_time_zone_null(DnsRecords::NextRetryAt))
                    .col(string_len(DnsRecords::OwnerType, 32))
                    .col(integer(DnsRecords::OwnerId))
                    .col(
                        timestamp_with_time_zone(DnsRecords::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(DnsRecords::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // One row per (zone, type, name, value, owner)
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_dns_records_identity")
                    .table(DnsRecords::Table)
                    .col(DnsRecords::DomainId)
                    .col(DnsRecords::RecordType)
                    .col(DnsRecords::Name)
                    .col(DnsRecords::Value)
                    .col(DnsRecords::OwnerType)
                    .col(DnsRecords::OwnerId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Reconciliation worker scans by status
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_dns_records_status")
                    .table(DnsRecords::Table)
                    .col(DnsRecords::Status)
                    .col(DnsRecords::NextRetryAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_dns_records_owner")
                    .table(DnsRecords::Table)
                    .col(DnsRecords::OwnerType)
                    .col(DnsRecords::OwnerId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AcmeProviders::Table)
                    .if_not_exists()
                    .col(pk_auto(AcmeProviders::Id))
                    .col(string_len(AcmeProviders::Name, 64).unique_key())
                    .col(text(AcmeProviders::DirectoryUrl))
                    .col(boolean(AcmeProviders::RequiresEab).default(false))
                    .col(string_len_null(AcmeProviders::EabKid, 255))
                    .col(text_null(AcmeProviders::EabHmacKey))
                    .col(
                        timestamp_with_time_zone(AcmeProviders::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AcmeAccounts::Table)
                    .if_not_exists()
                    .col(pk_auto(AcmeAccounts::Id))
                    .col(integer(AcmeAccounts::ProviderId))
                    .col(string_len(AcmeAccounts::Email, 255))
                    .col(text_null(AcmeAccounts::CredentialsJson))
                    .col(string_len(AcmeAccounts::Status, 16).default("pending"))
                    .col(text_null(AcmeAccounts::LastError))
                    .col(
                        timestamp_with_time_zone(AcmeAccounts::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(AcmeAccounts::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CertificateRequests::Table)
                    .if_not_exists()
                    .col(pk_auto(CertificateRequests::Id))
                    .col(integer(CertificateRequests::AcmeAccountId))
                    .col(text(CertificateRequests::DomainsJson))
                    .col(string_len(CertificateRequests::Status, 16).default("pending"))
                    .col(integer(CertificateRequests::PollIntervalSecs).default(40))
                    .col(integer(CertificateRequests::PollMaxAttempts).default(10))
                    .col(integer(CertificateRequests::Attempts).default(0))
                    .col(text_null(CertificateRequests::LastError))
                    .col(integer_null(CertificateRequests::ResultCertificateId))
                    .col(integer_null(CertificateRequests::RenewsCertificateId))
                    .col(
                        timestamp_with_time_zone(CertificateRequests::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(CertificateRequests::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_certificate_requests_status")
                    .table(CertificateRequests::Table)
                    .col(CertificateRequests::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Certificates::Table)
                    .if_not_exists()
                    .col(pk_auto(Certificates::Id))
                    .col(string_len(Certificates::Provider, 64))
                    .col(string_len(Certificates::Source, 16))
                    .col(integer_null(Certificates::AcmeAccountId))
                    .col(string_len(Certificates::Status, 16).default("valid"))
                    .col(string_len(Certificates::Fingerprint, 64).unique_key())
                    .col(timestamp_with_time_zone(Certificates::IssueAt))
                    .col(timestamp_with_time_zone(Certificates::ExpireAt))
                    .col(string_len(Certificates::RenewMode, 16).default("manual"))
                    .col(timestamp_with_time_zone_null(Certificates::RenewAt))
                    .col(text(Certificates::CertificatePem))
                    .col(text(Certificates::PrivateKeyPem))
                    .col(text_null(Certificates::LastError))
                    .col(
                        timestamp_with_time_zone(Certificates::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Certificates::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CertificateDomains::Table)
                    .if_not_exists()
                    .col(pk_auto(CertificateDomains::Id))
                    .col(integer(CertificateDomains::CertificateId))
                    .col(string_len(CertificateDomains::Domain, 255))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_certificate_domains_pair")
                    .table(CertificateDomains::Table)
                    .col(CertificateDomains::CertificateId)
                    .col(CertificateDomains::Domain)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_certificate_domains_domain")
                    .table(CertificateDomains::Table)
                    .col(CertificateDomains::Domain)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CertificateBindings::Table)
                    .if_not_exists()
                    .col(pk_auto(CertificateBindings::Id))
                    .col(integer(CertificateBindings::CertificateId))
                    .col(string_len(CertificateBindings::BindType, 16))
                    .col(integer(CertificateBindings::BindId))
                    .col(boolean(CertificateBindings::IsActive).default(true))
                    .col(
                        timestamp_with_time_zone(CertificateBindings::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(CertificateBindings::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_certificate_bindings_target")
                    .table(CertificateBindings::Table)
                    .col(CertificateBindings::BindType)
                    .col(CertificateBindings::BindId)
                    .col(CertificateBindings::IsActive)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ConfigVersions::Table)
                    .if_not_exists()
                    .col(pk_auto(ConfigVersions::Id))
                    .col(big_integer(ConfigVersions::Version).unique_key())
                    .col(string_len(ConfigVersions::Reason, 255))
                    .col(
                        timestamp_with_time_zone(ConfigVersions::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ConfigVersions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CertificateBindings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CertificateDomains::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Certificates::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CertificateRequests::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AcmeAccounts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AcmeProviders::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(DnsRecords::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(DomainDnsProviders::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ProviderCredentials::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Domains::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Domains {
    Table,
    Id,
    Domain,
    Status,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ProviderCredentials {
    Table,
    Id,
    Name,
    Provider,
    ApiToken,
    Status,
    CreatedAt,
}

#[derive(DeriveIden)]
enum DomainDnsProviders {
    Table,
    Id,
    DomainId,
    Provider,
    ProviderZoneId,
    CredentialId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum DnsRecords {
    Table,
    Id,
    DomainId,
    RecordType,
    Name,
    Value,
    Ttl,
    Proxied,
    Status,
    ProviderRecordId,
    LastError,
    RetryCount,
    NextRetryAt,
    OwnerType,
    OwnerId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum AcmeProviders {
    Table,
    Id,
    Name,
    DirectoryUrl,
    RequiresEab,
    EabKid,
    EabHmacKey,
    CreatedAt,
}

#[derive(DeriveIden)]
enum AcmeAccounts {
    Table,
    Id,
    ProviderId,
    Email,
    CredentialsJson,
    Status,
    LastError,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum CertificateRequests {
    Table,
    Id,
    AcmeAccountId,
    DomainsJson,
    Status,
    PollIntervalSecs,
    PollMaxAttempts,
    Attempts,
    LastError,
    ResultCertificateId,
    RenewsCertificateId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Certificates {
    Table,
    Id,
    Provider,
    Source,
    AcmeAccountId,
    Status,
    Fingerprint,
    IssueAt,
    ExpireAt,
    RenewMode,
    RenewAt,
    CertificatePem,
    PrivateKeyPem,
    LastError,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum CertificateDomains {
    Table,
    Id,
    CertificateId,
    Domain,
}

#[derive(DeriveIden)]
enum CertificateBindings {
    Table,
    Id,
    CertificateId,
    BindType,
    BindId,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ConfigVersions {
    Table,
    Id,
    Version,
    Reason,
    CreatedAt,
}
