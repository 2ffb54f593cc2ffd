/// Calendar events (meetings, calls, demos)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::auth::scope::Owned;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub event_type: Option<String>,
    pub location: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub all_day: bool,
    pub related_type: Option<String>,
    pub related_id: Option<Uuid>,
    pub owner_id: Option<Uuid>,

    #[sqlx(default)]
    pub owner_name: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Owned for CalendarEvent {
    const RESOURCE: &'static str = "calendar event";

    fn owner_id(&self) -> Option<Uuid> {
        self.owner_id
    }
}

fn validate_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), ValidationError> {
    if end < start {
        let mut err = ValidationError::new("time_window");
        err.message = Some("End time must not be before start time".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCalendarEvent {
    #[validate(length(min = 1, max = 255, message = "Title is required (max 255 characters)"))]
    pub title: String,
    pub description: Option<String>,
    #[validate(length(max = 50))]
    pub event_type: Option<String>,
    #[validate(length(max = 255))]
    pub location: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub all_day: bool,
    #[validate(length(max = 50))]
    pub related_type: Option<String>,
    pub related_id: Option<Uuid>,
    pub owner_id: Option<Uuid>,
}

impl CreateCalendarEvent {
    pub fn validate_window(&self) -> Result<(), ValidationError> {
        validate_window(self.start_time, self.end_time)
    }
}

/// Partial update; `None` leaves a column untouched
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCalendarEvent {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    pub description: Option<String>,
    #[validate(length(max = 50))]
    pub event_type: Option<String>,
    #[validate(length(max = 255))]
    pub location: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub all_day: Option<bool>,
    #[validate(length(max = 50))]
    pub related_type: Option<String>,
    pub related_id: Option<Uuid>,
    pub owner_id: Option<Uuid>,
}

impl UpdateCalendarEvent {
    /// Checks the window that would result from applying this update
    pub fn validate_against(&self, current: &CalendarEvent) -> Result<(), ValidationError> {
        validate_window(
            self.start_time.unwrap_or(current.start_time),
            self.end_time.unwrap_or(current.end_time),
        )
    }
}

/// Events overlapping `[from, to]`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub owner_id: Option<Uuid>,
    pub event_type: Option<String>,
}

impl CalendarEvent {
    pub async fn create(
        pool: &PgPool,
        tenant_id: Uuid,
        owner_id: Uuid,
        data: CreateCalendarEvent,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, CalendarEvent>(
            r#"
            WITH e AS (
                INSERT INTO calendar_events (
                    tenant_id, title, description, event_type, location, start_time, end_time,
                    all_day, related_type, related_id, owner_id
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                RETURNING *
            )
            SELECT e.*, o.name AS owner_name FROM e LEFT JOIN users o ON o.id = e.owner_id
            "#,
        )
        .bind(tenant_id)
        .bind(data.title)
        .bind(data.description)
        .bind(data.event_type)
        .bind(data.location)
        .bind(data.start_time)
        .bind(data.end_time)
        .bind(data.all_day)
        .bind(data.related_type)
        .bind(data.related_id)
        .bind(owner_id)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, CalendarEvent>(
            "SELECT e.*, o.name AS owner_name FROM calendar_events e LEFT JOIN users o ON o.id = e.owner_id \
             WHERE e.id = $1 AND e.tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list(
        pool: &PgPool,
        tenant_id: Uuid,
        filter: &CalendarFilter,
        scope_ids: Option<Vec<Uuid>>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let predicate = "e.tenant_id = $1 \
            AND ($2::uuid[] IS NULL OR e.owner_id = ANY($2)) \
            AND ($3::timestamptz IS NULL OR e.end_time >= $3) \
            AND ($4::timestamptz IS NULL OR e.start_time <= $4) \
            AND ($5::uuid IS NULL OR e.owner_id = $5) \
            AND ($6::text IS NULL OR e.event_type = $6)";

        let events = sqlx::query_as::<_, CalendarEvent>(&format!(
            "SELECT e.*, o.name AS owner_name FROM calendar_events e LEFT JOIN users o ON o.id = e.owner_id \
             WHERE {predicate} ORDER BY e.start_time ASC LIMIT $7 OFFSET $8"
        ))
        .bind(tenant_id)
        .bind(&scope_ids)
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.owner_id)
        .bind(&filter.event_type)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM calendar_events e WHERE {predicate}"))
            .bind(tenant_id)
            .bind(&scope_ids)
            .bind(filter.from)
            .bind(filter.to)
            .bind(filter.owner_id)
            .bind(&filter.event_type)
            .fetch_one(pool)
            .await?;

        Ok((events, total))
    }

    pub async fn update(
        pool: &PgPool,
        tenant_id: Uuid,
        id: Uuid,
        data: UpdateCalendarEvent,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE calendar_events SET updated_at = NOW()");

        if let Some(title) = data.title {
            qb.push(", title = ").push_bind(title);
        }
        if let Some(description) = data.description {
            qb.push(", description = ").push_bind(description);
        }
        if let Some(event_type) = data.event_type {
            qb.push(", event_type = ").push_bind(event_type);
        }
        if let Some(location) = data.location {
            qb.push(", location = ").push_bind(location);
        }
        if let Some(start_time) = data.start_time {
            qb.push(", start_time = ").push_bind(start_time);
        }
        if let Some(end_time) = data.end_time {
            qb.push(", end_time = ").push_bind(end_time);
        }
        if let Some(all_day) = data.all_day {
            qb.push(", all_day = ").push_bind(all_day);
        }
        if let Some(related_type) = data.related_type {
            qb.push(", related_type = ").push_bind(related_type);
        }
        if let Some(related_id) = data.related_id {
            qb.push(", related_id = ").push_bind(related_id);
        }
        if let Some(owner_id) = data.owner_id {
            qb.push(", owner_id = ").push_bind(owner_id);
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
        let result = sqlx::query("DELETE FROM calendar_events WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn create(start: DateTime<Utc>, end: DateTime<Utc>) -> CreateCalendarEvent {
        CreateCalendarEvent {
            title: "Demo".to_string(),
            description: None,
            event_type: Some("meeting".to_string()),
            location: None,
            start_time: start,
            end_time: end,
            all_day: false,
            related_type: None,
            related_id: None,
            owner_id: None,
        }
    }

    #[test]
    fn test_window_validation() {
        let start = Utc::now();
        assert!(create(start, start + Duration::hours(1)).validate_window().is_ok());
        assert!(create(start, start).validate_window().is_ok());
        assert!(create(start, start - Duration::minutes(1)).validate_window().is_err());
        assert!(create(start, start - Duration::minutes(1)).validate().is_ok());
    }

    #[test]
    fn test_update_window_uses_current_values() {
        let start = Utc::now();
        let current = CalendarEvent {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            title: "Demo".to_string(),
            description: None,
            event_type: None,
            location: None,
            start_time: start,
            end_time: start + Duration::hours(1),
            all_day: false,
            related_type: None,
            related_id: None,
            owner_id: None,
            owner_name: None,
            created_at: start,
            updated_at: start,
        };

        let moves_start_past_end = UpdateCalendarEvent {
            start_time: Some(start + Duration::hours(2)),
            ..Default::default()
        };
        assert!(moves_start_past_end.validate_against(&current).is_err());

        let extends_end = UpdateCalendarEvent {
            end_time: Some(start + Duration::hours(3)),
            ..Default::default()
        };
        assert!(extends_end.validate_against(&current).is_ok());
    }
}
