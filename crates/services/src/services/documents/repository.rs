use async_trait::async_trait;
use chrono::{DateTime, Utc};
use db::{
    DBService,
    models::{
        audit_log::{AuditLogEntry, CreateAuditLogEntry},
        document::{
            CreateDocument, Document, DocumentFilter, DocumentState, LineageCounts, OperationContext,
            OwnerRef, ReplacedFile, UpdateDocumentDetails, VersionStatus,
        },
    },
};
use uuid::Uuid;

/// Storage-facing operations the document lifecycle depends on. Multi-row changes are atomic.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Document>, sqlx::Error>;

    /// Every stored version of a lineage, newest first.
    async fn find_by_lineage(&self, lineage_id: Uuid) -> Result<Vec<Document>, sqlx::Error>;

    async fn find_active(&self, owner: OwnerRef, filter: &DocumentFilter) -> Result<Vec<Document>, sqlx::Error>;

    async fn find_archived(&self, owner: OwnerRef) -> Result<Vec<Document>, sqlx::Error>;

    /// Heads of deleted lineages.
    async fn find_deleted(&self, owner: Option<OwnerRef>) -> Result<Vec<Document>, sqlx::Error>;

    async fn find_expiring(&self, until: DateTime<Utc>) -> Result<Vec<Document>, sqlx::Error>;

    async fn lineage_counts(&self, lineage_id: Uuid) -> Result<LineageCounts, sqlx::Error>;

    async fn insert_document(&self, data: &CreateDocument) -> Result<Document, sqlx::Error>;

    /// Insert `data` as `max(version) + 1` of its lineage and make it the only current version.
    async fn insert_version(&self, data: CreateDocument) -> Result<Document, sqlx::Error>;

    /// Make `id` the only current version of `lineage_id`.
    async fn make_current(
        &self,
        lineage_id: Uuid,
        id: Uuid,
        actor_id: Uuid,
        operation: &OperationContext,
    ) -> Result<(), sqlx::Error>;

    async fn set_state(
        &self,
        id: Uuid,
        state: DocumentState,
        actor_id: Uuid,
        operation: &OperationContext,
    ) -> Result<(), sqlx::Error>;

    /// Move every row of the lineage in one of `from` to `to`.
    async fn set_lineage_state(
        &self,
        lineage_id: Uuid,
        from: &[DocumentState],
        to: DocumentState,
        actor_id: Uuid,
        operation: &OperationContext,
    ) -> Result<u64, sqlx::Error>;

    /// Reactivate `ids`, optionally moving the current flag to `promote`.
    async fn restore_rows(
        &self,
        lineage_id: Uuid,
        ids: &[Uuid],
        promote: Option<Uuid>,
        actor_id: Uuid,
        operation: &OperationContext,
    ) -> Result<(), sqlx::Error>;

    async fn update_details(
        &self,
        id: Uuid,
        patch: &UpdateDocumentDetails,
        actor_id: Uuid,
    ) -> Result<(), sqlx::Error>;

    /// Record new file facts for a version whose bytes were overwritten in place.
    async fn replace_file(
        &self,
        id: Uuid,
        file: &ReplacedFile,
        actor_id: Uuid,
        operation: &OperationContext,
    ) -> Result<(), sqlx::Error>;

    async fn update_version_status(
        &self,
        id: Uuid,
        status: VersionStatus,
        reason: Option<&str>,
        corrected_by_id: Option<Uuid>,
        actor_id: Uuid,
    ) -> Result<(), sqlx::Error>;

    /// Physically remove rows.
    async fn purge(&self, ids: &[Uuid]) -> Result<u64, sqlx::Error>;

    async fn record_audit(&self, entry: &CreateAuditLogEntry) -> Result<AuditLogEntry, sqlx::Error>;
}

/// `DocumentRepository` backed by the SQLite models.
#[derive(Clone)]
pub struct SqliteDocumentRepository {
    db: DBService,
}

impl SqliteDocumentRepository {
    pub fn new(db: DBService) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DocumentRepository for SqliteDocumentRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Document>, sqlx::Error> {
        Document::find_by_id(&self.db.pool, id).await
    }

    async fn find_by_lineage(&self, lineage_id: Uuid) -> Result<Vec<Document>, sqlx::Error> {
        Document::find_by_lineage(&self.db.pool, lineage_id).await
    }

    async fn find_active(&self, owner: OwnerRef, filter: &DocumentFilter) -> Result<Vec<Document>, sqlx::Error> {
        Document::find_current_by_owner(&self.db.pool, owner, DocumentState::Active, filter).await
    }

    async fn find_archived(&self, owner: OwnerRef) -> Result<Vec<Document>, sqlx::Error> {
        Document::find_current_by_owner(
            &self.db.pool,
            owner,
            DocumentState::Archived,
            &DocumentFilter::default(),
        )
        .await
    }

    async fn find_deleted(&self, owner: Option<OwnerRef>) -> Result<Vec<Document>, sqlx::Error> {
        Document::find_deleted_heads(&self.db.pool, owner).await
    }

    async fn find_expiring(&self, until: DateTime<Utc>) -> Result<Vec<Document>, sqlx::Error> {
        Document::find_expiring(&self.db.pool, until).await
    }

    async fn lineage_counts(&self, lineage_id: Uuid) -> Result<LineageCounts, sqlx::Error> {
        Document::lineage_counts(&self.db.pool, lineage_id).await
    }

    async fn insert_document(&self, data: &CreateDocument) -> Result<Document, sqlx::Error> {
        Document::create(&self.db.pool, data).await
    }

    async fn insert_version(&self, mut data: CreateDocument) -> Result<Document, sqlx::Error> {
        let mut tx = self.db.pool.begin().await?;

        let max_version = Document::max_version(&mut *tx, data.lineage_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        data.version = max_version + 1;

        Document::clear_current(&mut *tx, data.lineage_id).await?;
        let document = Document::create(&mut *tx, &data).await?;

        tx.commit().await?;
        Ok(document)
    }

    async fn make_current(
        &self,
        lineage_id: Uuid,
        id: Uuid,
        actor_id: Uuid,
        operation: &OperationContext,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.db.pool.begin().await?;
        Document::clear_current(&mut *tx, lineage_id).await?;
        Document::mark_current(&mut *tx, id, Some(actor_id), Some(operation)).await?;
        tx.commit().await
    }

    async fn set_state(
        &self,
        id: Uuid,
        state: DocumentState,
        actor_id: Uuid,
        operation: &OperationContext,
    ) -> Result<(), sqlx::Error> {
        Document::update_state(&self.db.pool, id, state, Some(actor_id), operation).await
    }

    async fn set_lineage_state(
        &self,
        lineage_id: Uuid,
        from: &[DocumentState],
        to: DocumentState,
        actor_id: Uuid,
        operation: &OperationContext,
    ) -> Result<u64, sqlx::Error> {
        let mut tx = self.db.pool.begin().await?;
        let mut touched = 0;
        for state in from {
            touched +=
                Document::update_lineage_state(&mut *tx, lineage_id, *state, to, Some(actor_id), operation)
                    .await?;
        }
        tx.commit().await?;
        Ok(touched)
    }

    async fn restore_rows(
        &self,
        lineage_id: Uuid,
        ids: &[Uuid],
        promote: Option<Uuid>,
        actor_id: Uuid,
        operation: &OperationContext,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.db.pool.begin().await?;
        for id in ids {
            Document::update_state(&mut *tx, *id, DocumentState::Active, Some(actor_id), operation).await?;
        }
        if let Some(promote) = promote {
            Document::clear_current(&mut *tx, lineage_id).await?;
            Document::mark_current(&mut *tx, promote, Some(actor_id), None).await?;
        }
        tx.commit().await
    }

    async fn update_details(
        &self,
        id: Uuid,
        patch: &UpdateDocumentDetails,
        actor_id: Uuid,
    ) -> Result<(), sqlx::Error> {
        Document::update_details(&self.db.pool, id, patch, Some(actor_id)).await
    }

    async fn replace_file(
        &self,
        id: Uuid,
        file: &ReplacedFile,
        actor_id: Uuid,
        operation: &OperationContext,
    ) -> Result<(), sqlx::Error> {
        Document::replace_file(&self.db.pool, id, file, Some(actor_id), operation).await
    }

    async fn update_version_status(
        &self,
        id: Uuid,
        status: VersionStatus,
        reason: Option<&str>,
        corrected_by_id: Option<Uuid>,
        actor_id: Uuid,
    ) -> Result<(), sqlx::Error> {
        Document::update_version_status(&self.db.pool, id, status, reason, corrected_by_id, Some(actor_id))
            .await
    }

    async fn purge(&self, ids: &[Uuid]) -> Result<u64, sqlx::Error> {
        let mut tx = self.db.pool.begin().await?;
        let removed = Document::delete_many(&mut *tx, ids).await?;
        tx.commit().await?;
        Ok(removed)
    }

    async fn record_audit(&self, entry: &CreateAuditLogEntry) -> Result<AuditLogEntry, sqlx::Error> {
        AuditLogEntry::create(&self.db.pool, entry).await
    }
}
