use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{Executor, FromRow, QueryBuilder, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

const AUDIT_COLUMNS: &str = r#"
    id, table_name, action, record_id, module, actor_id, actor_email,
    occurred_at, old_data, new_data, changes, metadata
"#;

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display)]
#[sqlx(type_name = "audit_action", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
}

/// One append-only audit record
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub table_name: String,
    pub action: AuditAction,
    pub record_id: Uuid,
    pub module: String,
    pub actor_id: Option<Uuid>,
    pub actor_email: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub old_data: Option<String>, // JSON snapshot before the change
    pub new_data: Option<String>, // JSON snapshot after the change
    pub changes: Option<String>,  // JSON object of changed fields
    pub metadata: String,
}

#[derive(Debug, Clone)]
pub struct CreateAuditLogEntry {
    pub table_name: String,
    pub action: AuditAction,
    pub record_id: Uuid,
    pub module: String,
    pub actor_id: Option<Uuid>,
    pub actor_email: Option<String>,
    pub old_data: Option<Value>,
    pub new_data: Option<Value>,
    pub changes: Option<Value>,
    pub metadata: Value,
}

/// Filters for the audit listing; every field is optional
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct AuditLogQuery {
    pub table_name: Option<String>,
    pub record_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub module: Option<String>,
    pub action: Option<AuditAction>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Case-insensitive match against actor email or table name
    pub search: Option<String>,
}

/// Day/actor/table buckets with an unusual number of deletes
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct BulkDeletion {
    pub day: String,
    pub actor_email: Option<String>,
    pub table_name: String,
    pub total_deletions: i64,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct ModuleSummary {
    pub module: String,
    pub total_events: i64,
    pub active_actors: i64,
    pub total_creates: i64,
    pub total_updates: i64,
    pub total_deletes: i64,
    pub first_event: Option<DateTime<Utc>>,
    pub last_event: Option<DateTime<Utc>>,
}

fn to_json_text(value: &Value) -> String {
    value.to_string()
}

impl AuditLogEntry {
    pub fn parsed_changes(&self) -> Option<Value> {
        self.changes
            .as_ref()
            .and_then(|json| serde_json::from_str(json).ok())
    }

    pub async fn create<'e, E>(executor: E, data: &CreateAuditLogEntry) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, AuditLogEntry>(&format!(
            r#"INSERT INTO audit_log (
                id, table_name, action, record_id, module, actor_id, actor_email,
                occurred_at, old_data, new_data, changes, metadata
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {AUDIT_COLUMNS}"#
        ))
        .bind(Uuid::new_v4())
        .bind(&data.table_name)
        .bind(data.action)
        .bind(data.record_id)
        .bind(&data.module)
        .bind(data.actor_id)
        .bind(&data.actor_email)
        .bind(Utc::now())
        .bind(data.old_data.as_ref().map(to_json_text))
        .bind(data.new_data.as_ref().map(to_json_text))
        .bind(data.changes.as_ref().map(to_json_text))
        .bind(to_json_text(&data.metadata))
        .fetch_one(executor)
        .await
    }

    fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, filter: &AuditLogQuery) {
        query.push(" WHERE 1 = 1");
        if let Some(table_name) = &filter.table_name {
            query.push(" AND table_name = ");
            query.push_bind(table_name.clone());
        }
        if let Some(record_id) = filter.record_id {
            query.push(" AND record_id = ");
            query.push_bind(record_id);
        }
        if let Some(actor_id) = filter.actor_id {
            query.push(" AND actor_id = ");
            query.push_bind(actor_id);
        }
        if let Some(module) = &filter.module {
            query.push(" AND module = ");
            query.push_bind(module.clone());
        }
        if let Some(action) = filter.action {
            query.push(" AND action = ");
            query.push_bind(action);
        }
        if let Some(from) = filter.from {
            query.push(" AND occurred_at >= ");
            query.push_bind(from);
        }
        if let Some(to) = filter.to {
            query.push(" AND occurred_at <= ");
            query.push_bind(to);
        }
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = super::contains_pattern(search);
            query.push(" AND (actor_email LIKE ");
            query.push_bind(pattern.clone());
            query.push(" ESCAPE '\\' OR table_name LIKE ");
            query.push_bind(pattern);
            query.push(" ESCAPE '\\')");
        }
    }

    /// One page of matching entries, newest first, plus the total match count
    pub async fn search(
        pool: &SqlitePool,
        filter: &AuditLogQuery,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let mut count_query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM audit_log");
        Self::push_filters(&mut count_query, filter);
        let total: i64 = count_query.build_query_scalar().fetch_one(pool).await?;

        let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT {AUDIT_COLUMNS} FROM audit_log"));
        Self::push_filters(&mut query, filter);
        query.push(" ORDER BY occurred_at DESC LIMIT ");
        query.push_bind(limit);
        query.push(" OFFSET ");
        query.push_bind(offset);
        let items = query.build_query_as::<AuditLogEntry>().fetch_all(pool).await?;

        Ok((items, total))
    }

    pub async fn find_by_record(
        pool: &SqlitePool,
        table_name: &str,
        record_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, AuditLogEntry>(&format!(
            r#"SELECT {AUDIT_COLUMNS} FROM audit_log
            WHERE table_name = $1 AND record_id = $2
            ORDER BY occurred_at DESC
            LIMIT $3"#
        ))
        .bind(table_name)
        .bind(record_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_actor_since(
        pool: &SqlitePool,
        actor_id: Uuid,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, AuditLogEntry>(&format!(
            r#"SELECT {AUDIT_COLUMNS} FROM audit_log
            WHERE actor_id = $1 AND occurred_at >= $2
            ORDER BY occurred_at DESC
            LIMIT $3"#
        ))
        .bind(actor_id)
        .bind(since)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    pub async fn bulk_deletions_since(
        pool: &SqlitePool,
        since: DateTime<Utc>,
        threshold: i64,
    ) -> Result<Vec<BulkDeletion>, sqlx::Error> {
        sqlx::query_as::<_, BulkDeletion>(
            r#"SELECT
                substr(occurred_at, 1, 10) AS day,
                actor_email,
                table_name,
                COUNT(*) AS total_deletions
            FROM audit_log
            WHERE action = 'delete' AND occurred_at >= $1
            GROUP BY day, actor_email, table_name
            HAVING COUNT(*) >= $2
            ORDER BY day DESC, total_deletions DESC"#,
        )
        .bind(since)
        .bind(threshold)
        .fetch_all(pool)
        .await
    }

    pub async fn module_summary(pool: &SqlitePool) -> Result<Vec<ModuleSummary>, sqlx::Error> {
        sqlx::query_as::<_, ModuleSummary>(
            r#"SELECT
                module,
                COUNT(*) AS total_events,
                COUNT(DISTINCT actor_id) AS active_actors,
                SUM(CASE WHEN action = 'create' THEN 1 ELSE 0 END) AS total_creates,
                SUM(CASE WHEN action = 'update' THEN 1 ELSE 0 END) AS total_updates,
                SUM(CASE WHEN action = 'delete' THEN 1 ELSE 0 END) AS total_deletes,
                MIN(occurred_at) AS first_event,
                MAX(occurred_at) AS last_event
            FROM audit_log
            GROUP BY module
            ORDER BY total_events DESC"#,
        )
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::DBService;

    fn entry(action: AuditAction, email: &str, module: &str) -> CreateAuditLogEntry {
        CreateAuditLogEntry {
            table_name: "documents".to_string(),
            action,
            record_id: Uuid::new_v4(),
            module: module.to_string(),
            actor_id: Some(Uuid::new_v4()),
            actor_email: Some(email.to_string()),
            old_data: None,
            new_data: Some(json!({"title": "Plano"})),
            changes: None,
            metadata: json!({}),
        }
    }

    #[tokio::test]
    async fn test_search_filters_and_counts() {
        let db = DBService::new_in_memory().await.unwrap();
        for _ in 0..3 {
            AuditLogEntry::create(&db.pool, &entry(AuditAction::Create, "ana@ryr.co", "proyectos"))
                .await
                .unwrap();
        }
        AuditLogEntry::create(&db.pool, &entry(AuditAction::Delete, "luis@ryr.co", "viviendas"))
            .await
            .unwrap();

        let (items, total) = AuditLogEntry::search(&db.pool, &AuditLogQuery::default(), 2, 0)
            .await
            .unwrap();
        assert_eq!(total, 4);
        assert_eq!(items.len(), 2);

        let query = AuditLogQuery {
            search: Some("LUIS".to_string()),
            ..Default::default()
        };
        let (items, total) = AuditLogEntry::search(&db.pool, &query, 50, 0).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].action, AuditAction::Delete);

        let query = AuditLogQuery {
            action: Some(AuditAction::Create),
            module: Some("proyectos".to_string()),
            ..Default::default()
        };
        let (_, total) = AuditLogEntry::search(&db.pool, &query, 50, 0).await.unwrap();
        assert_eq!(total, 3);
    }

    #[tokio::test]
    async fn test_search_does_not_expand_wildcards() {
        let db = DBService::new_in_memory().await.unwrap();
        AuditLogEntry::create(&db.pool, &entry(AuditAction::Create, "ana_m@ryr.co", "proyectos"))
            .await
            .unwrap();
        AuditLogEntry::create(&db.pool, &entry(AuditAction::Create, "anaxm@ryr.co", "proyectos"))
            .await
            .unwrap();

        let query = AuditLogQuery {
            search: Some("ana_m".to_string()),
            ..Default::default()
        };
        let (items, total) = AuditLogEntry::search(&db.pool, &query, 50, 0).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].actor_email.as_deref(), Some("ana_m@ryr.co"));

        let query = AuditLogQuery {
            search: Some("%".to_string()),
            ..Default::default()
        };
        let (_, total) = AuditLogEntry::search(&db.pool, &query, 50, 0).await.unwrap();
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_module_summary_groups_by_module() {
        let db = DBService::new_in_memory().await.unwrap();
        AuditLogEntry::create(&db.pool, &entry(AuditAction::Create, "ana@ryr.co", "proyectos"))
            .await
            .unwrap();
        AuditLogEntry::create(&db.pool, &entry(AuditAction::Delete, "ana@ryr.co", "proyectos"))
            .await
            .unwrap();
        AuditLogEntry::create(&db.pool, &entry(AuditAction::Update, "ana@ryr.co", "clientes"))
            .await
            .unwrap();

        let summary = AuditLogEntry::module_summary(&db.pool).await.unwrap();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].module, "proyectos");
        assert_eq!(summary[0].total_events, 2);
        assert_eq!(summary[0].total_deletes, 1);
    }
}
