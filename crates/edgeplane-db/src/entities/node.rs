//! Edge node running an agent

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "nodes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub name: String,

    pub main_ip: String,

    pub enabled: bool,

    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::node_sub_ip::Entity")]
    NodeSubIp,
}

impl Related<super::node_sub_ip::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::NodeSubIp.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
