//! Membership of a node sub-IP in a node group

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "node_group_sub_ips")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(indexed)]
    pub node_group_id: i32,

    pub sub_ip_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::node_sub_ip::Entity",
        from = "Column::SubIpId",
        to = "super::node_sub_ip::Column::Id"
    )]
    NodeSubIp,
}

impl Related<super::node_sub_ip::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::NodeSubIp.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
