use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::{Executor, FromRow, QueryBuilder, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

const DOCUMENT_COLUMNS: &str = r#"
    id, owner_kind, owner_id, lineage_id, version, is_current, state,
    version_status, status_reason, corrected_by_id,
    title, description, category, is_important, document_date, expires_at,
    file_name, original_name, mime_type, size_bytes, storage_path,
    metadata, last_operation, actor_id, created_at, updated_at
"#;

/// Kind of entity a document belongs to
#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, Hash, TS, EnumString, Display)]
#[sqlx(type_name = "owner_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OwnerKind {
    Project,
    Housing,
    Client,
}

impl OwnerKind {
    /// Storage bucket holding the files of this owner kind
    pub fn bucket(&self) -> &'static str {
        match self {
            OwnerKind::Project => "documentos-proyectos",
            OwnerKind::Housing => "documentos-viviendas",
            OwnerKind::Client => "documentos-clientes",
        }
    }

    /// Audit module name for documents of this owner kind
    pub fn module(&self) -> &'static str {
        match self {
            OwnerKind::Project => "proyectos",
            OwnerKind::Housing => "viviendas",
            OwnerKind::Client => "clientes",
        }
    }
}

/// The project, housing unit or client a document belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS)]
pub struct OwnerRef {
    pub kind: OwnerKind,
    pub id: Uuid,
}

impl OwnerRef {
    pub fn new(kind: OwnerKind, id: Uuid) -> Self {
        Self { kind, id }
    }
}

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default)]
#[sqlx(type_name = "document_state", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DocumentState {
    #[default]
    Active,
    Archived,
    Deleted,
}

/// Quality flag of a single version, independent of its lifecycle state
#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default)]
#[sqlx(type_name = "version_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum VersionStatus {
    #[default]
    Valid,
    Erroneous,
    Obsolete,
}

/// Whether a soft delete took the whole lineage or a single version
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(rename_all = "lowercase")]
pub enum DeletionScope {
    Lineage,
    Version,
}

/// Context recorded by the most recent mutation of a document row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationContext {
    Uploaded,
    VersionAdded {
        change_description: String,
        previous_version_id: Uuid,
    },
    VersionRestored {
        reason: Option<String>,
        previous_current_id: Option<Uuid>,
    },
    Deleted {
        scope: DeletionScope,
        actor_id: Uuid,
        reason: String,
        deleted_at: DateTime<Utc>,
    },
    Restored {
        restored_at: DateTime<Utc>,
    },
    Archived,
    Unarchived,
    StatusChanged {
        status: VersionStatus,
        reason: Option<String>,
        corrected_by_id: Option<Uuid>,
    },
    DetailsUpdated {
        fields: Vec<String>,
    },
    FileReplaced {
        reason: String,
        backup_path: String,
        previous_original_name: String,
        previous_size_bytes: i64,
    },
}

impl OperationContext {
    pub fn deletion_scope(&self) -> Option<DeletionScope> {
        match self {
            OperationContext::Deleted { scope, .. } => Some(*scope),
            _ => None,
        }
    }

    fn to_json(&self) -> Result<String, sqlx::Error> {
        serde_json::to_string(self).map_err(|e| sqlx::Error::Protocol(e.to_string()))
    }
}

/// One stored revision of a document
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Document {
    pub id: Uuid,
    pub owner_kind: OwnerKind,
    pub owner_id: Uuid,
    pub lineage_id: Uuid, // id of version 1
    pub version: i64,
    pub is_current: bool,
    pub state: DocumentState,
    pub version_status: VersionStatus,
    pub status_reason: Option<String>,
    pub corrected_by_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub is_important: bool,
    pub document_date: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub file_name: String,
    pub original_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub storage_path: String,
    pub metadata: String,               // JSON object supplied at upload
    pub last_operation: Option<String>, // JSON-serialized OperationContext
    pub actor_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn owner(&self) -> OwnerRef {
        OwnerRef::new(self.owner_kind, self.owner_id)
    }

    /// Parse the last_operation JSON into an OperationContext
    pub fn parsed_operation(&self) -> Option<OperationContext> {
        self.last_operation
            .as_ref()
            .and_then(|json| serde_json::from_str(json).ok())
    }

    /// Parse the metadata JSON into a key/value map
    pub fn parsed_metadata(&self) -> Map<String, Value> {
        serde_json::from_str(&self.metadata).unwrap_or_default()
    }

    pub fn is_deleted(&self) -> bool {
        self.state == DocumentState::Deleted
    }
}

/// Row data for a new document version
#[derive(Debug, Clone)]
pub struct CreateDocument {
    pub id: Uuid,
    pub owner: OwnerRef,
    pub lineage_id: Uuid,
    pub version: i64,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub is_important: bool,
    pub document_date: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub file_name: String,
    pub original_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub storage_path: String,
    pub metadata: Map<String, Value>,
    pub operation: OperationContext,
    pub actor_id: Option<Uuid>,
}

/// Editable descriptive fields; `None` leaves the column untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateDocumentDetails {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub is_important: Option<bool>,
    pub document_date: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl UpdateDocumentDetails {
    /// Names of the fields this patch touches
    pub fn changed_fields(&self) -> Vec<String> {
        let mut fields = Vec::new();
        if self.title.is_some() {
            fields.push("title".to_string());
        }
        if self.description.is_some() {
            fields.push("description".to_string());
        }
        if self.category.is_some() {
            fields.push("category".to_string());
        }
        if self.is_important.is_some() {
            fields.push("is_important".to_string());
        }
        if self.document_date.is_some() {
            fields.push("document_date".to_string());
        }
        if self.expires_at.is_some() {
            fields.push("expires_at".to_string());
        }
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.changed_fields().is_empty()
    }
}

/// New file facts for a version whose bytes were overwritten in place
#[derive(Debug, Clone)]
pub struct ReplacedFile {
    pub original_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub metadata: Map<String, Value>,
}

/// Filters for listing the current versions of an owner's documents
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct DocumentFilter {
    pub category: Option<String>,
    #[serde(default)]
    pub important_only: bool,
    pub search: Option<String>,
}

/// Active/deleted/total row counts for a lineage
#[derive(Debug, Clone, Copy, Default, FromRow, Serialize, Deserialize, PartialEq, Eq, TS)]
pub struct LineageCounts {
    pub total: i64,
    pub active: i64,
    pub deleted: i64,
}

impl Document {
    pub async fn create<'e, E>(executor: E, data: &CreateDocument) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let metadata =
            serde_json::to_string(&data.metadata).map_err(|e| sqlx::Error::Protocol(e.to_string()))?;
        let operation = data.operation.to_json()?;
        let now = Utc::now();

        sqlx::query_as::<_, Document>(&format!(
            r#"INSERT INTO documents (
                id, owner_kind, owner_id, lineage_id, version, is_current, state,
                title, description, category, is_important, document_date, expires_at,
                file_name, original_name, mime_type, size_bytes, storage_path,
                metadata, last_operation, actor_id, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, 1, 'active', $6, $7, $8, $9, $10, $11,
                    $12, $13, $14, $15, $16, $17, $18, $19, $20, $20)
            RETURNING {DOCUMENT_COLUMNS}"#
        ))
        .bind(data.id)
        .bind(data.owner.kind)
        .bind(data.owner.id)
        .bind(data.lineage_id)
        .bind(data.version)
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.category)
        .bind(data.is_important)
        .bind(data.document_date)
        .bind(data.expires_at)
        .bind(&data.file_name)
        .bind(&data.original_name)
        .bind(&data.mime_type)
        .bind(data.size_bytes)
        .bind(&data.storage_path)
        .bind(metadata)
        .bind(operation)
        .bind(data.actor_id)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Document>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Every stored version of a lineage, newest first
    pub async fn find_by_lineage<'e, E>(executor: E, lineage_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Document>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE lineage_id = $1 ORDER BY version DESC"
        ))
        .bind(lineage_id)
        .fetch_all(executor)
        .await
    }

    pub async fn max_version<'e, E>(executor: E, lineage_id: Uuid) -> Result<Option<i64>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar::<_, Option<i64>>("SELECT MAX(version) FROM documents WHERE lineage_id = $1")
            .bind(lineage_id)
            .fetch_one(executor)
            .await
    }

    pub async fn lineage_counts<'e, E>(executor: E, lineage_id: Uuid) -> Result<LineageCounts, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, LineageCounts>(
            r#"SELECT
                COUNT(*) AS total,
                COALESCE(SUM(CASE WHEN state = 'active' THEN 1 ELSE 0 END), 0) AS active,
                COALESCE(SUM(CASE WHEN state = 'deleted' THEN 1 ELSE 0 END), 0) AS deleted
            FROM documents
            WHERE lineage_id = $1"#,
        )
        .bind(lineage_id)
        .fetch_one(executor)
        .await
    }

    /// Current versions of an owner's lineages in the given state
    pub async fn find_current_by_owner(
        pool: &SqlitePool,
        owner: OwnerRef,
        state: DocumentState,
        filter: &DocumentFilter,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE is_current = 1 AND owner_kind = "
        ));
        query.push_bind(owner.kind);
        query.push(" AND owner_id = ");
        query.push_bind(owner.id);
        query.push(" AND state = ");
        query.push_bind(state);

        if let Some(category) = &filter.category {
            query.push(" AND category = ");
            query.push_bind(category.clone());
        }
        if filter.important_only {
            query.push(" AND is_important = 1");
        }
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = super::contains_pattern(search);
            query.push(" AND (title LIKE ");
            query.push_bind(pattern.clone());
            query.push(" ESCAPE '\\' OR description LIKE ");
            query.push_bind(pattern);
            query.push(" ESCAPE '\\')");
        }

        query.push(" ORDER BY is_important DESC, created_at DESC");
        query.build_query_as::<Document>().fetch_all(pool).await
    }

    /// Heads of deleted lineages, optionally restricted to one owner; most recently deleted first.
    /// The head is the newest row deleted together with its lineage, wherever the current flag sits.
    pub async fn find_deleted_heads(
        pool: &SqlitePool,
        owner: Option<OwnerRef>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut query = QueryBuilder::<Sqlite>::new(format!(
            r#"SELECT {DOCUMENT_COLUMNS} FROM documents d
            WHERE d.state = 'deleted'
              AND json_extract(d.last_operation, '$.scope') = 'lineage'
              AND d.version = (
                SELECT MAX(x.version) FROM documents x
                WHERE x.lineage_id = d.lineage_id
                  AND x.state = 'deleted'
                  AND json_extract(x.last_operation, '$.scope') = 'lineage'
              )"#
        ));
        if let Some(owner) = owner {
            query.push(" AND d.owner_kind = ");
            query.push_bind(owner.kind);
            query.push(" AND d.owner_id = ");
            query.push_bind(owner.id);
        }
        query.push(" ORDER BY d.updated_at DESC");
        query.build_query_as::<Document>().fetch_all(pool).await
    }

    /// Active current versions whose expiry falls on or before `until`
    pub async fn find_expiring(pool: &SqlitePool, until: DateTime<Utc>) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Document>(&format!(
            r#"SELECT {DOCUMENT_COLUMNS} FROM documents
            WHERE state = 'active' AND is_current = 1
              AND expires_at IS NOT NULL AND expires_at <= $1
            ORDER BY expires_at ASC"#
        ))
        .bind(until)
        .fetch_all(pool)
        .await
    }

    pub async fn clear_current<'e, E>(executor: E, lineage_id: Uuid) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query("UPDATE documents SET is_current = 0 WHERE lineage_id = $1 AND is_current = 1")
            .bind(lineage_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn mark_current<'e, E>(
        executor: E,
        id: Uuid,
        actor_id: Option<Uuid>,
        operation: Option<&OperationContext>,
    ) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let operation = operation.map(OperationContext::to_json).transpose()?;
        sqlx::query(
            r#"UPDATE documents
            SET is_current = 1,
                last_operation = COALESCE($2, last_operation),
                actor_id = COALESCE($3, actor_id),
                updated_at = $4
            WHERE id = $1"#,
        )
        .bind(id)
        .bind(operation)
        .bind(actor_id)
        .bind(Utc::now())
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn update_state<'e, E>(
        executor: E,
        id: Uuid,
        state: DocumentState,
        actor_id: Option<Uuid>,
        operation: &OperationContext,
    ) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            r#"UPDATE documents
            SET state = $2,
                last_operation = $3,
                actor_id = COALESCE($4, actor_id),
                updated_at = $5
            WHERE id = $1"#,
        )
        .bind(id)
        .bind(state)
        .bind(operation.to_json()?)
        .bind(actor_id)
        .bind(Utc::now())
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Move every row of a lineage currently in `from` to `to`; returns the number of rows touched
    pub async fn update_lineage_state<'e, E>(
        executor: E,
        lineage_id: Uuid,
        from: DocumentState,
        to: DocumentState,
        actor_id: Option<Uuid>,
        operation: &OperationContext,
    ) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            r#"UPDATE documents
            SET state = $3,
                last_operation = $4,
                actor_id = COALESCE($5, actor_id),
                updated_at = $6
            WHERE lineage_id = $1 AND state = $2"#,
        )
        .bind(lineage_id)
        .bind(from)
        .bind(to)
        .bind(operation.to_json()?)
        .bind(actor_id)
        .bind(Utc::now())
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn update_details(
        pool: &SqlitePool,
        id: Uuid,
        patch: &UpdateDocumentDetails,
        actor_id: Option<Uuid>,
    ) -> Result<(), sqlx::Error> {
        let operation = OperationContext::DetailsUpdated {
            fields: patch.changed_fields(),
        };
        sqlx::query(
            r#"UPDATE documents
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                category = COALESCE($4, category),
                is_important = COALESCE($5, is_important),
                document_date = COALESCE($6, document_date),
                expires_at = COALESCE($7, expires_at),
                last_operation = $8,
                actor_id = COALESCE($9, actor_id),
                updated_at = $10
            WHERE id = $1"#,
        )
        .bind(id)
        .bind(&patch.title)
        .bind(&patch.description)
        .bind(&patch.category)
        .bind(patch.is_important)
        .bind(patch.document_date)
        .bind(patch.expires_at)
        .bind(operation.to_json()?)
        .bind(actor_id)
        .bind(Utc::now())
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn replace_file(
        pool: &SqlitePool,
        id: Uuid,
        file: &ReplacedFile,
        actor_id: Option<Uuid>,
        operation: &OperationContext,
    ) -> Result<(), sqlx::Error> {
        let metadata =
            serde_json::to_string(&file.metadata).map_err(|e| sqlx::Error::Protocol(e.to_string()))?;
        let result = sqlx::query(
            r#"UPDATE documents
            SET original_name = $2,
                mime_type = $3,
                size_bytes = $4,
                metadata = $5,
                last_operation = $6,
                actor_id = COALESCE($7, actor_id),
                updated_at = $8
            WHERE id = $1"#,
        )
        .bind(id)
        .bind(&file.original_name)
        .bind(&file.mime_type)
        .bind(file.size_bytes)
        .bind(metadata)
        .bind(operation.to_json()?)
        .bind(actor_id)
        .bind(Utc::now())
        .execute(pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }
        Ok(())
    }

    pub async fn update_version_status(
        pool: &SqlitePool,
        id: Uuid,
        status: VersionStatus,
        reason: Option<&str>,
        corrected_by_id: Option<Uuid>,
        actor_id: Option<Uuid>,
    ) -> Result<(), sqlx::Error> {
        let operation = OperationContext::StatusChanged {
            status,
            reason: reason.map(str::to_string),
            corrected_by_id,
        };
        sqlx::query(
            r#"UPDATE documents
            SET version_status = $2,
                status_reason = $3,
                corrected_by_id = $4,
                last_operation = $5,
                actor_id = COALESCE($6, actor_id),
                updated_at = $7
            WHERE id = $1"#,
        )
        .bind(id)
        .bind(status)
        .bind(reason)
        .bind(corrected_by_id)
        .bind(operation.to_json()?)
        .bind(actor_id)
        .bind(Utc::now())
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn delete_many<'e, E>(executor: E, ids: &[Uuid]) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut query = QueryBuilder::<Sqlite>::new("DELETE FROM documents WHERE id IN (");
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");
        let result = query.build().execute(executor).await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DBService;

    fn new_row(owner: OwnerRef, lineage_id: Option<Uuid>, version: i64) -> CreateDocument {
        let id = Uuid::new_v4();
        CreateDocument {
            id,
            owner,
            lineage_id: lineage_id.unwrap_or(id),
            version,
            title: format!("Licencia v{version}"),
            description: None,
            category: Some("licencias".to_string()),
            is_important: false,
            document_date: None,
            expires_at: None,
            file_name: format!("{id}.pdf"),
            original_name: "licencia.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            size_bytes: 1024,
            storage_path: format!("{}/licencias/{id}.pdf", owner.id),
            metadata: Map::new(),
            operation: OperationContext::Uploaded,
            actor_id: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_find_round_trip() {
        let db = DBService::new_in_memory().await.unwrap();
        let owner = OwnerRef::new(OwnerKind::Project, Uuid::new_v4());
        let created = Document::create(&db.pool, &new_row(owner, None, 1)).await.unwrap();

        assert_eq!(created.lineage_id, created.id);
        assert!(created.is_current);
        assert_eq!(created.state, DocumentState::Active);
        assert_eq!(created.parsed_operation(), Some(OperationContext::Uploaded));

        let found = Document::find_by_id(&db.pool, created.id).await.unwrap().unwrap();
        assert_eq!(found.owner(), owner);
        assert_eq!(found.title, "Licencia v1");
    }

    #[tokio::test]
    async fn test_schema_rejects_second_current_version() {
        let db = DBService::new_in_memory().await.unwrap();
        let owner = OwnerRef::new(OwnerKind::Housing, Uuid::new_v4());
        let v1 = Document::create(&db.pool, &new_row(owner, None, 1)).await.unwrap();

        // v1 is still current, so inserting another current row must fail
        let result = Document::create(&db.pool, &new_row(owner, Some(v1.lineage_id), 2)).await;
        assert!(result.is_err());

        Document::clear_current(&db.pool, v1.lineage_id).await.unwrap();
        Document::create(&db.pool, &new_row(owner, Some(v1.lineage_id), 2)).await.unwrap();

        assert_eq!(Document::max_version(&db.pool, v1.lineage_id).await.unwrap(), Some(2));
        let counts = Document::lineage_counts(&db.pool, v1.lineage_id).await.unwrap();
        assert_eq!(counts, LineageCounts { total: 2, active: 2, deleted: 0 });
    }

    #[tokio::test]
    async fn test_find_current_by_owner_applies_filters() {
        let db = DBService::new_in_memory().await.unwrap();
        let owner = OwnerRef::new(OwnerKind::Client, Uuid::new_v4());

        let mut contract = new_row(owner, None, 1);
        contract.title = "Contrato de compraventa".to_string();
        contract.is_important = true;
        Document::create(&db.pool, &contract).await.unwrap();

        let mut id_card = new_row(owner, None, 1);
        id_card.title = "Cedula".to_string();
        id_card.category = Some("identidad".to_string());
        Document::create(&db.pool, &id_card).await.unwrap();

        let all = Document::find_current_by_owner(
            &db.pool,
            owner,
            DocumentState::Active,
            &DocumentFilter::default(),
        )
        .await
        .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].title, "Contrato de compraventa");

        let search = DocumentFilter {
            search: Some("compraventa".to_string()),
            ..Default::default()
        };
        let found = Document::find_current_by_owner(&db.pool, owner, DocumentState::Active, &search)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);

        let by_category = DocumentFilter {
            category: Some("identidad".to_string()),
            ..Default::default()
        };
        let found = Document::find_current_by_owner(&db.pool, owner, DocumentState::Active, &by_category)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Cedula");
    }

    #[tokio::test]
    async fn test_search_treats_wildcards_literally() {
        let db = DBService::new_in_memory().await.unwrap();
        let owner = OwnerRef::new(OwnerKind::Project, Uuid::new_v4());

        let mut advance = new_row(owner, None, 1);
        advance.title = "Anticipo 50% obra gris".to_string();
        Document::create(&db.pool, &advance).await.unwrap();

        let mut budget = new_row(owner, None, 1);
        budget.title = "Presupuesto 500 millones".to_string();
        budget.description = Some("plano_final".to_string());
        Document::create(&db.pool, &budget).await.unwrap();

        let search = |text: &str| DocumentFilter {
            search: Some(text.to_string()),
            ..Default::default()
        };
        let found = Document::find_current_by_owner(&db.pool, owner, DocumentState::Active, &search("50%"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Anticipo 50% obra gris");

        let found = Document::find_current_by_owner(&db.pool, owner, DocumentState::Active, &search("5_0"))
            .await
            .unwrap();
        assert!(found.is_empty());

        let found = Document::find_current_by_owner(&db.pool, owner, DocumentState::Active, &search("plano_"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_many_removes_rows() {
        let db = DBService::new_in_memory().await.unwrap();
        let owner = OwnerRef::new(OwnerKind::Project, Uuid::new_v4());
        let a = Document::create(&db.pool, &new_row(owner, None, 1)).await.unwrap();
        let b = Document::create(&db.pool, &new_row(owner, None, 1)).await.unwrap();

        let removed = Document::delete_many(&db.pool, &[a.id, b.id]).await.unwrap();
        assert_eq!(removed, 2);
        assert!(Document::find_by_id(&db.pool, a.id).await.unwrap().is_none());
        assert_eq!(Document::delete_many(&db.pool, &[]).await.unwrap(), 0);
    }

    #[test]
    fn test_operation_context_is_tagged() {
        let context = OperationContext::VersionAdded {
            change_description: "fixed signature".to_string(),
            previous_version_id: Uuid::nil(),
        };
        let json = serde_json::to_value(&context).unwrap();
        assert_eq!(json["type"], "version_added");
        assert_eq!(json["change_description"], "fixed signature");
        assert_eq!(context.deletion_scope(), None);
    }
}
