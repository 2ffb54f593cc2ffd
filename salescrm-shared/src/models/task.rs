/// Follow-up tasks
///
/// Tasks are assigned to one user and may point at any other record through
/// the loose `(related_type, related_id)` pair. Moving a task to
/// `completed` stamps `completed_at`; moving it anywhere else clears it.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE task_status AS ENUM ('todo', 'in_progress', 'completed', 'cancelled');
/// CREATE TYPE task_priority AS ENUM ('low', 'medium', 'high', 'urgent');
///
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
///     title VARCHAR(255) NOT NULL,
///     description TEXT,
///     status task_status NOT NULL DEFAULT 'todo',
///     priority task_priority NOT NULL DEFAULT 'medium',
///     due_date TIMESTAMPTZ,
///     related_type VARCHAR(50),
///     related_id UUID,
///     assigned_to UUID REFERENCES users(id) ON DELETE SET NULL,
///     created_by UUID REFERENCES users(id) ON DELETE SET NULL,
///     completed_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use super::like_pattern;
use crate::auth::scope::Owned;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    /// Whether the task still needs doing
    pub fn is_open(&self) -> bool {
        matches!(self, TaskStatus::Todo | TaskStatus::InProgress)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_priority", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Urgent,
}

const TASK_COLUMNS: &str = "t.*, a.name AS assigned_to_name, c.name AS created_by_name";
const TASK_LOOKUPS: &str = "LEFT JOIN users a ON a.id = t.assigned_to LEFT JOIN users c ON c.id = t.created_by";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub related_type: Option<String>,
    pub related_id: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub completed_at: Option<DateTime<Utc>>,

    #[sqlx(default)]
    pub assigned_to_name: Option<String>,
    #[sqlx(default)]
    pub created_by_name: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Owned for Task {
    const RESOURCE: &'static str = "task";

    fn owner_id(&self) -> Option<Uuid> {
        self.assigned_to
    }
}

impl Task {
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status.is_open() && self.due_date.is_some_and(|due| due < now)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTask {
    #[validate(length(min = 1, max = 255, message = "Title is required (max 255 characters)"))]
    pub title: String,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<DateTime<Utc>>,
    #[validate(length(max = 50))]
    pub related_type: Option<String>,
    pub related_id: Option<Uuid>,
    /// Defaults to the creating user
    pub assigned_to: Option<Uuid>,
}

/// Partial update; `None` leaves a column untouched
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTask {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<DateTime<Utc>>,
    #[validate(length(max = 50))]
    pub related_type: Option<String>,
    pub related_id: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFilter {
    pub search: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assigned_to: Option<Uuid>,
    pub due_from: Option<DateTime<Utc>>,
    pub due_to: Option<DateTime<Utc>>,
    pub related_type: Option<String>,
    pub related_id: Option<Uuid>,
}

impl Task {
    pub async fn create(
        pool: &PgPool,
        tenant_id: Uuid,
        created_by: Uuid,
        assigned_to: Uuid,
        data: CreateTask,
    ) -> Result<Self, sqlx::Error> {
        let status = data.status.unwrap_or(TaskStatus::Todo);

        sqlx::query_as::<_, Task>(&format!(
            r#"
            WITH t AS (
                INSERT INTO tasks (
                    tenant_id, title, description, status, priority, due_date,
                    related_type, related_id, assigned_to, created_by, completed_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                        CASE WHEN $4 = 'completed'::task_status THEN NOW() END)
                RETURNING *
            )
            SELECT {TASK_COLUMNS} FROM t {TASK_LOOKUPS}
            "#
        ))
        .bind(tenant_id)
        .bind(data.title)
        .bind(data.description)
        .bind(status)
        .bind(data.priority.unwrap_or(TaskPriority::Medium))
        .bind(data.due_date)
        .bind(data.related_type)
        .bind(data.related_id)
        .bind(assigned_to)
        .bind(created_by)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks t {TASK_LOOKUPS} WHERE t.id = $1 AND t.tenant_id = $2"
        ))
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list(
        pool: &PgPool,
        tenant_id: Uuid,
        filter: &TaskFilter,
        scope_ids: Option<Vec<Uuid>>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let search = like_pattern(&filter.search);
        let predicate = "t.tenant_id = $1 \
            AND ($2::uuid[] IS NULL OR t.assigned_to = ANY($2)) \
            AND ($3::text IS NULL OR t.title ILIKE $3) \
            AND ($4::task_status IS NULL OR t.status = $4) \
            AND ($5::task_priority IS NULL OR t.priority = $5) \
            AND ($6::uuid IS NULL OR t.assigned_to = $6) \
            AND ($7::timestamptz IS NULL OR t.due_date >= $7) \
            AND ($8::timestamptz IS NULL OR t.due_date <= $8) \
            AND ($9::text IS NULL OR t.related_type = $9) \
            AND ($10::uuid IS NULL OR t.related_id = $10)";

        let tasks = sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks t {TASK_LOOKUPS} \
             WHERE {predicate} ORDER BY t.due_date ASC NULLS LAST, t.created_at DESC LIMIT $11 OFFSET $12"
        ))
        .bind(tenant_id)
        .bind(&scope_ids)
        .bind(&search)
        .bind(filter.status)
        .bind(filter.priority)
        .bind(filter.assigned_to)
        .bind(filter.due_from)
        .bind(filter.due_to)
        .bind(&filter.related_type)
        .bind(filter.related_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM tasks t WHERE {predicate}"))
            .bind(tenant_id)
            .bind(&scope_ids)
            .bind(&search)
            .bind(filter.status)
            .bind(filter.priority)
            .bind(filter.assigned_to)
            .bind(filter.due_from)
            .bind(filter.due_to)
            .bind(&filter.related_type)
            .bind(filter.related_id)
            .fetch_one(pool)
            .await?;

        Ok((tasks, total))
    }

    pub async fn update(
        pool: &PgPool,
        tenant_id: Uuid,
        id: Uuid,
        data: UpdateTask,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE tasks SET updated_at = NOW()");

        if let Some(title) = data.title {
            qb.push(", title = ").push_bind(title);
        }
        if let Some(description) = data.description {
            qb.push(", description = ").push_bind(description);
        }
        if let Some(status) = data.status {
            qb.push(", status = ").push_bind(status);
            if status == TaskStatus::Completed {
                qb.push(", completed_at = COALESCE(completed_at, NOW())");
            } else {
                qb.push(", completed_at = NULL");
            }
        }
        if let Some(priority) = data.priority {
            qb.push(", priority = ").push_bind(priority);
        }
        if let Some(due_date) = data.due_date {
            qb.push(", due_date = ").push_bind(due_date);
        }
        if let Some(related_type) = data.related_type {
            qb.push(", related_type = ").push_bind(related_type);
        }
        if let Some(related_id) = data.related_id {
            qb.push(", related_id = ").push_bind(related_id);
        }
        if let Some(assigned_to) = data.assigned_to {
            qb.push(", assigned_to = ").push_bind(assigned_to);
        }

        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" AND tenant_id = ").push_bind(tenant_id);
        qb.push(" RETURNING id");

        let Some(id) = qb.build_query_scalar::<Uuid>().fetch_optional(pool).await? else {
            return Ok(None);
        };
        Self::find_by_id(pool, tenant_id, id).await
    }

    pub async fn delete(pool: &PgPool, tenant_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
