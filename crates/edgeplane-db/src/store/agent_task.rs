use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, IntoActiveModel,
    QueryFilter, QueryOrder, Set,
};

use crate::entities::agent_task::{self, TaskStatus, TaskType};

#[async_trait]
pub trait AgentTaskStore: Send + Sync {
    async fn insert_agent_task(
        &self,
        node_id: i32,
        task_type: TaskType,
        payload: &str,
    ) -> Result<agent_task::Model, DbErr>;

    /// Pending tasks of one node in creation order
    async fn pending_agent_tasks(&self, node_id: i32) -> Result<Vec<agent_task::Model>, DbErr>;

    async fn find_agent_task(&self, id: i32) -> Result<Option<agent_task::Model>, DbErr>;

    async fn set_agent_task_status(
        &self,
        id: i32,
        status: TaskStatus,
        last_error: Option<String>,
    ) -> Result<Option<agent_task::Model>, DbErr>;
}

#[async_trait]
impl<C> AgentTaskStore for C
where
    C: ConnectionTrait + Send,
{
    async fn insert_agent_task(
        &self,
        node_id: i32,
        task_type: TaskType,
        payload: &str,
    ) -> Result<agent_task::Model, DbErr> {
        let now = Utc::now();
        agent_task::ActiveModel {
            node_id: Set(node_id),
            task_type: Set(task_type),
            payload: Set(payload.to_string()),
            status: Set(TaskStatus::Pending),
            last_error: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(self)
        .await
    }

    async fn pending_agent_tasks(&self, node_id: i32) -> Result<Vec<agent_task::Model>, DbErr> {
        agent_task::Entity::find()
            .filter(agent_task::Column::NodeId.eq(node_id))
            .filter(agent_task::Column::Status.eq(TaskStatus::Pending))
            .order_by_asc(agent_task::Column::Id)
            .all(self)
            .await
    }

    async fn find_agent_task(&self, id: i32) -> Result<Option<agent_task::Model>, DbErr> {
        agent_task::Entity::find_by_id(id).one(self).await
    }

    async fn set_agent_task_status(
        &self,
        id: i32,
        status: TaskStatus,
        last_error: Option<String>,
    ) -> Result<Option<agent_task::Model>, DbErr> {
        let Some(task) = agent_task::Entity::find_by_id(id).one(self).await? else {
            return Ok(None);
        };

        let mut active = task.into_active_model();
        active.status = Set(status);
        active.last_error = Set(last_error);
        active.updated_at = Set(Utc::now());
        active.update(self).await.map(Some)
    }
}
