//! Edge topology: nodes, node/line groups, websites and agent tasks

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Nodes::Table)
                    .if_not_exists()
                    .col(pk_auto(Nodes::Id))
                    .col(string_len(Nodes::Name, 128).unique_key())
                    .col(string_len(Nodes::MainIp, 64))
                    .col(boolean(Nodes::Enabled).default(true))
                    .col(
                        timestamp_with_time_zone(Nodes::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(NodeSubIps::Table)
                    .if_not_exists()
                    .col(pk_auto(NodeSubIps::Id))
                    .col(integer(NodeSubIps::NodeId))
                    .col(string_len(NodeSubIps::Ip, 64))
                    .col(boolean(NodeSubIps::Enabled).default(true))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(NodeGroups::Table)
                    .if_not_exists()
                    .col(pk_auto(NodeGroups::Id))
                    .col(string_len(NodeGroups::Name, 128).unique_key())
                    .col(integer(NodeGroups::DomainId))
                    .col(string_len(NodeGroups::CnamePrefix, 32))
                    .col(string_len(NodeGroups::Cname, 255).unique_key())
                    .col(
                        timestamp_with_time_zone(NodeGroups::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(NodeGroups::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(NodeGroupSubIps::Table)
                    .if_not_exists()
                    .col(pk_auto(NodeGroupSubIps::Id))
                    .col(integer(NodeGroupSubIps::NodeGroupId))
                    .col(integer(NodeGroupSubIps::SubIpId))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_node_group_sub_ips_pair")
                    .table(NodeGroupSubIps::Table)
                    .col(NodeGroupSubIps::NodeGroupId)
                    .col(NodeGroupSubIps::SubIpId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(LineGroups::Table)
                    .if_not_exists()
                    .col(pk_auto(LineGroups::Id))
                    .col(string_len(LineGroups::Name, 128))
                    .col(integer(LineGroups::DomainId))
                    .col(integer(LineGroups::NodeGroupId))
                    .col(string_len(LineGroups::CnamePrefix, 32))
                    .col(string_len(LineGroups::Cname, 255).unique_key())
                    .col(
                        timestamp_with_time_zone(LineGroups::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(LineGroups::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Websites::Table)
                    .if_not_exists()
                    .col(pk_auto(Websites::Id))
                    .col(integer(Websites::LineGroupId))
                    .col(string_len(Websites::Status, 16).default("active"))
                    .col(
                        timestamp_with_time_zone(Websites::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Websites::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(WebsiteDomains::Table)
                    .if_not_exists()
                    .col(pk_auto(WebsiteDomains::Id))
                    .col(integer(WebsiteDomains::WebsiteId))
                    .col(string_len(WebsiteDomains::Domain, 255).unique_key())
                    .col(boolean(WebsiteDomains::IsPrimary).default(false))
                    .col(string_len(WebsiteDomains::Cname, 255))
                    .col(
                        timestamp_with_time_zone(WebsiteDomains::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AgentTasks::Table)
                    .if_not_exists()
                    .col(pk_auto(AgentTasks::Id))
                    .col(integer(AgentTasks::NodeId))
                    .col(string_len(AgentTasks::TaskType, 32))
                    .col(text(AgentTasks::Payload))
                    .col(string_len(AgentTasks::Status, 16).default("pending"))
                    .col(text_null(AgentTasks::LastError))
                    .col(
                        timestamp_with_time_zone(AgentTasks::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(AgentTasks::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Agents poll pending tasks by node
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_agent_tasks_node_status")
                    .table(AgentTasks::Table)
                    .col(AgentTasks::NodeId)
                    .col(AgentTasks::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AgentTasks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(WebsiteDomains::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Websites::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LineGroups::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(NodeGroupSubIps::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(NodeGroups::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(NodeSubIps::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Nodes::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Nodes {
    Table,
    Id,
    Name,
    MainIp,
    Enabled,
    CreatedAt,
}

#[derive(DeriveIden)]
enum NodeSubIps {
    Table,
    Id,
    NodeId,
    Ip,
    Enabled,
}

#[derive(DeriveIden)]
enum NodeGroups {
    Table,
    Id,
    Name,
    DomainId,
    CnamePrefix,
    Cname,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum NodeGroupSubIps {
    Table,
    Id,
    NodeGroupId,
    SubIpId,
}

#[derive(DeriveIden)]
enum LineGroups {
    Table,
    Id,
    Name,
    DomainId,
    NodeGroupId,
    CnamePrefix,
    Cname,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Websites {
    Table,
    Id,
    LineGroupId,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum WebsiteDomains {
    Table,
    Id,
    WebsiteId,
    Domain,
    IsPrimary,
    Cname,
    CreatedAt,
}

#[derive(DeriveIden)]
enum AgentTasks {
    Table,
    Id,
    NodeId,
    TaskType,
    Payload,
    Status,
    LastError,
    CreatedAt,
    UpdatedAt,
}
