use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

use super::document::OwnerKind;

const CATEGORY_COLUMNS: &str = "id, name, description, color, icon, sort_order, modules, created_at, updated_at";

/// Shared label documents are filed under
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct DocumentCategory {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub icon: String,
    pub sort_order: i64,
    pub modules: String, // JSON array of OwnerKind; empty means every module
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentCategory {
    pub fn parsed_modules(&self) -> Vec<OwnerKind> {
        serde_json::from_str(&self.modules).unwrap_or_default()
    }

    pub fn applies_to(&self, kind: OwnerKind) -> bool {
        let modules = self.parsed_modules();
        modules.is_empty() || modules.contains(&kind)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateDocumentCategory {
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub icon: String,
    pub sort_order: i64,
    pub modules: Vec<OwnerKind>,
}

/// Partial update; `None` leaves the column untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateDocumentCategory {
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub sort_order: Option<i64>,
    pub modules: Option<Vec<OwnerKind>>,
}

/// Documents filed under a category, per owner kind
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq, TS)]
pub struct CategoryUsage {
    pub owner_kind: OwnerKind,
    pub documents: i64,
}

fn modules_json(modules: &[OwnerKind]) -> Result<String, sqlx::Error> {
    serde_json::to_string(modules).map_err(|e| sqlx::Error::Protocol(e.to_string()))
}

impl DocumentCategory {
    pub async fn create<'e, E>(executor: E, data: &CreateDocumentCategory) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let now = Utc::now();
        sqlx::query_as::<_, DocumentCategory>(&format!(
            r#"INSERT INTO document_categories (
                id, name, description, color, icon, sort_order, modules, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {CATEGORY_COLUMNS}"#
        ))
        .bind(Uuid::new_v4())
        .bind(&data.name)
        .bind(&data.description)
        .bind(&data.color)
        .bind(&data.icon)
        .bind(data.sort_order)
        .bind(modules_json(&data.modules)?)
        .bind(now)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, DocumentCategory>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM document_categories WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Case-insensitive lookup
    pub async fn find_by_name(pool: &SqlitePool, name: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, DocumentCategory>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM document_categories WHERE name = $1 COLLATE NOCASE"
        ))
        .bind(name)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, DocumentCategory>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM document_categories ORDER BY sort_order ASC, name ASC"
        ))
        .fetch_all(pool)
        .await
    }

    /// Categories offered to documents of `kind`, in display order
    pub async fn find_by_module(pool: &SqlitePool, kind: OwnerKind) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, DocumentCategory>(&format!(
            r#"SELECT {CATEGORY_COLUMNS} FROM document_categories
            WHERE json_array_length(modules) = 0
               OR EXISTS (SELECT 1 FROM json_each(modules) WHERE json_each.value = $1)
            ORDER BY sort_order ASC, name ASC"#
        ))
        .bind(kind)
        .fetch_all(pool)
        .await
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM document_categories")
            .fetch_one(pool)
            .await
    }

    /// Apply `patch`. A rename also relabels every document filed under the old name.
    pub async fn update(pool: &SqlitePool, id: Uuid, patch: &UpdateDocumentCategory) -> Result<(), sqlx::Error> {
        let modules = patch.modules.as_deref().map(modules_json).transpose()?;
        let mut tx = pool.begin().await?;

        if let Some(name) = &patch.name {
            sqlx::query(
                r#"UPDATE documents
                SET category = $2
                WHERE category = (SELECT name FROM document_categories WHERE id = $1) COLLATE NOCASE"#,
            )
            .bind(id)
            .bind(name)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"UPDATE document_categories
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                color = COALESCE($4, color),
                icon = COALESCE($5, icon),
                sort_order = COALESCE($6, sort_order),
                modules = COALESCE($7, modules),
                updated_at = $8
            WHERE id = $1"#,
        )
        .bind(id)
        .bind(&patch.name)
        .bind(&patch.description)
        .bind(&patch.color)
        .bind(&patch.icon)
        .bind(patch.sort_order)
        .bind(modules)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await
    }

    /// Set `sort_order` for every `(id, sort_order)` pair in one transaction.
    pub async fn reorder(pool: &SqlitePool, order: &[(Uuid, i64)]) -> Result<u64, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let now = Utc::now();
        let mut touched = 0;
        for (id, sort_order) in order {
            let result = sqlx::query("UPDATE document_categories SET sort_order = $2, updated_at = $3 WHERE id = $1")
                .bind(*id)
                .bind(*sort_order)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            touched += result.rows_affected();
        }
        tx.commit().await?;
        Ok(touched)
    }

    /// Stored documents (any state) filed under `name`, per owner kind
    pub async fn usage(pool: &SqlitePool, name: &str) -> Result<Vec<CategoryUsage>, sqlx::Error> {
        sqlx::query_as::<_, CategoryUsage>(
            r#"SELECT owner_kind, COUNT(*) AS documents
            FROM documents
            WHERE category = $1 COLLATE NOCASE
            GROUP BY owner_kind
            ORDER BY owner_kind"#,
        )
        .bind(name)
        .fetch_all(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM document_categories WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
