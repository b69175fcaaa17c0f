//! Document lifecycle: upload, versioning, trash and purge for project, housing-unit and client
//! documents. Every rule is checked here before the repository or object store is touched.

mod error;
mod replace;
mod repository;
mod trash;
mod upload;
mod versions;

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use db::models::{
    audit_log::{AuditAction, CreateAuditLogEntry},
    document::{CreateDocument, Document, DocumentFilter, OperationContext, OwnerRef, UpdateDocumentDetails},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{info, warn};
use ts_rs::TS;
use utils::text::{has_min_chars, strip_extension};
use uuid::Uuid;

pub use error::{DocumentError, RemoteError};
pub use repository::{DocumentRepository, SqliteDocumentRepository};
pub use trash::{PURGE_CONFIRMATION_TOKEN, PurgeReport};
pub use upload::{DEFAULT_MAX_UPLOAD_BYTES, FileUpload, StorageLocation, UploadPolicy, storage_location};
pub use versions::VersionSummary;

use super::storage::ObjectStore;

/// Minimum trimmed length of deletion reasons, purge justifications and status reasons.
pub const MIN_REASON_CHARS: usize = 10;

const DOCUMENTS_TABLE: &str = "documents";

/// User performing a mutation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
pub struct Actor {
    pub id: Uuid,
    pub email: Option<String>,
}

impl Actor {
    pub fn new(id: Uuid, email: Option<String>) -> Self {
        Self { id, email }
    }
}

/// Descriptive fields for a first upload
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewDocument {
    /// Defaults to the file name without extension
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub is_important: bool,
    pub document_date: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

pub struct DocumentService<R = SqliteDocumentRepository> {
    repo: R,
    store: Arc<dyn ObjectStore>,
    policy: UploadPolicy,
}

impl<R: DocumentRepository> DocumentService<R> {
    pub fn new(repo: R, store: Arc<dyn ObjectStore>, policy: UploadPolicy) -> Self {
        Self { repo, store, policy }
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    pub async fn get(&self, id: Uuid) -> Result<Document, DocumentError> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| DocumentError::NotFound(format!("document {id}")))
    }

    /// Upload the first version of a new document.
    pub async fn create_document(
        &self,
        owner: OwnerRef,
        upload: FileUpload,
        details: NewDocument,
        actor: &Actor,
    ) -> Result<Document, DocumentError> {
        if owner.id.is_nil() {
            return Err(DocumentError::validation("owning entity is required"));
        }
        self.policy.validate(&upload)?;

        let title = details
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| strip_extension(&upload.original_name).to_string());

        let location = storage_location(owner, details.category.as_deref(), &upload.original_name);
        self.store.put(location.bucket, &location.path, &upload.bytes).await?;

        let id = Uuid::new_v4();
        let data = CreateDocument {
            id,
            owner,
            lineage_id: id,
            version: 1,
            title,
            description: details.description,
            category: details.category,
            is_important: details.is_important,
            document_date: details.document_date,
            expires_at: details.expires_at,
            file_name: location.file_name.clone(),
            original_name: upload.original_name.clone(),
            mime_type: upload.mime_type.clone(),
            size_bytes: upload.size() as i64,
            storage_path: location.path.clone(),
            metadata: details.metadata,
            operation: OperationContext::Uploaded,
            actor_id: Some(actor.id),
        };

        let document = match self.repo.insert_document(&data).await {
            Ok(document) => document,
            Err(e) => {
                self.discard_upload(&location).await;
                return Err(e.into());
            }
        };

        info!(
            document_id = %document.id,
            owner_kind = %owner.kind,
            owner_id = %owner.id,
            size_bytes = document.size_bytes,
            "Document uploaded"
        );
        self.audit(AuditAction::Create, actor, None, Some(&document), json!({ "version": 1 }))
            .await;
        Ok(document)
    }

    /// Current active versions of an owner's documents.
    pub async fn list_active(&self, owner: OwnerRef, filter: &DocumentFilter) -> Result<Vec<Document>, DocumentError> {
        Ok(self.repo.find_active(owner, filter).await?)
    }

    pub async fn list_archived(&self, owner: OwnerRef) -> Result<Vec<Document>, DocumentError> {
        Ok(self.repo.find_archived(owner).await?)
    }

    /// Deleted documents, most recently deleted first.
    pub async fn list_trash(&self, owner: Option<OwnerRef>) -> Result<Vec<Document>, DocumentError> {
        Ok(self.repo.find_deleted(owner).await?)
    }

    /// Active documents expiring within `days` days (already expired ones included).
    pub async fn list_expiring(&self, days: i64) -> Result<Vec<Document>, DocumentError> {
        if days < 0 {
            return Err(DocumentError::validation("days must not be negative"));
        }
        let until = TimeDelta::try_days(days)
            .and_then(|window| Utc::now().checked_add_signed(window))
            .ok_or_else(|| DocumentError::validation(format!("{days} days is out of range")))?;
        Ok(self.repo.find_expiring(until).await?)
    }

    pub async fn update_details(
        &self,
        id: Uuid,
        patch: UpdateDocumentDetails,
        actor: &Actor,
    ) -> Result<Document, DocumentError> {
        if patch.is_empty() {
            return Err(DocumentError::validation("nothing to update"));
        }
        if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(DocumentError::validation("title must not be empty"));
        }

        let before = self.get(id).await?;
        if before.is_deleted() {
            return Err(DocumentError::conflict("deleted documents cannot be edited"));
        }

        self.repo.update_details(id, &patch, actor.id).await?;
        let after = self.get(id).await?;
        self.audit(
            AuditAction::Update,
            actor,
            Some(&before),
            Some(&after),
            json!({ "fields": patch.changed_fields() }),
        )
        .await;
        Ok(after)
    }

    pub async fn rename(&self, id: Uuid, title: &str, actor: &Actor) -> Result<Document, DocumentError> {
        let patch = UpdateDocumentDetails {
            title: Some(title.trim().to_string()),
            ..Default::default()
        };
        self.update_details(id, patch, actor).await
    }

    /// Stored bytes of one version.
    pub async fn download(&self, id: Uuid) -> Result<(Document, Vec<u8>), DocumentError> {
        let document = self.get(id).await?;
        let bytes = self
            .store
            .get(document.owner_kind.bucket(), &document.storage_path)
            .await?;
        Ok((document, bytes))
    }

    fn ensure_reason(reason: &str, what: &str) -> Result<(), DocumentError> {
        if has_min_chars(reason, MIN_REASON_CHARS) {
            Ok(())
        } else {
            Err(DocumentError::validation(format!(
                "{what} must have at least {MIN_REASON_CHARS} characters"
            )))
        }
    }

    /// Best-effort removal of bytes whose row was never written.
    async fn discard_upload(&self, location: &StorageLocation) {
        if let Err(e) = self.store.remove(location.bucket, &location.path).await {
            warn!(storage_path = %location.path, error = %e, "Failed to remove orphaned upload");
        }
    }

    /// Append an audit entry; failures are logged and never fail the mutation.
    async fn audit(
        &self,
        action: AuditAction,
        actor: &Actor,
        before: Option<&Document>,
        after: Option<&Document>,
        changes: Value,
    ) {
        let Some(record) = after.or(before) else {
            return;
        };
        let entry = CreateAuditLogEntry {
            table_name: DOCUMENTS_TABLE.to_string(),
            action,
            record_id: record.id,
            module: record.owner_kind.module().to_string(),
            actor_id: Some(actor.id),
            actor_email: actor.email.clone(),
            old_data: before.and_then(|d| serde_json::to_value(d).ok()),
            new_data: after.and_then(|d| serde_json::to_value(d).ok()),
            changes: Some(changes),
            metadata: json!({
                "lineage_id": record.lineage_id,
                "version": record.version,
            }),
        };
        if let Err(e) = self.repo.record_audit(&entry).await {
            warn!(document_id = %record.id, error = %e, "Failed to record audit entry");
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use db::{
        DBService,
        models::document::{OwnerKind, OwnerRef},
    };
    use tempfile::TempDir;
    use uuid::Uuid;

    use super::*;
    use crate::services::storage::FilesystemStore;

    pub struct Fixture {
        pub service: DocumentService,
        pub db: DBService,
        pub store: Arc<FilesystemStore>,
        pub owner: OwnerRef,
        pub actor: Actor,
        _dir: TempDir,
    }

    pub async fn fixture() -> Fixture {
        let db = DBService::new_in_memory().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FilesystemStore::new(dir.path()));
        let service = DocumentService::new(
            SqliteDocumentRepository::new(db.clone()),
            store.clone(),
            UploadPolicy::default(),
        );
        Fixture {
            service,
            db,
            store,
            owner: OwnerRef::new(OwnerKind::Project, Uuid::new_v4()),
            actor: Actor::new(Uuid::new_v4(), Some("ana@ryr.co".to_string())),
            _dir: dir,
        }
    }

    pub fn pdf(name: &str, content: &str) -> FileUpload {
        FileUpload::new(name, "application/pdf", content.as_bytes().to_vec())
    }

    impl Fixture {
        pub async fn upload(&self, name: &str) -> Document {
            self.service
                .create_document(self.owner, pdf(name, "original"), NewDocument::default(), &self.actor)
                .await
                .unwrap()
        }

        pub async fn lineage(&self, lineage_id: Uuid) -> Vec<Document> {
            Document::find_by_lineage(&self.db.pool, lineage_id).await.unwrap()
        }
    }
}

#[cfg(test)]
mod tests {
    use db::models::{
        audit_log::{AuditLogEntry, AuditLogQuery},
        document::DocumentState,
    };

    use super::{test_support::*, *};
    use crate::services::storage::ObjectStore;

    #[tokio::test]
    async fn test_create_document_starts_lineage() {
        let fx = fixture().await;
        let document = fx.upload("Licencia de construccion.pdf").await;

        assert_eq!(document.version, 1);
        assert!(document.is_current);
        assert_eq!(document.state, DocumentState::Active);
        assert_eq!(document.lineage_id, document.id);
        assert_eq!(document.title, "Licencia de construccion");
        assert_eq!(document.actor_id, Some(fx.actor.id));
        assert!(
            fx.store
                .exists(document.owner_kind.bucket(), &document.storage_path)
                .await
                .unwrap()
        );

        let (entries, total) = AuditLogEntry::search(&fx.db.pool, &AuditLogQuery::default(), 50, 0)
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(entries[0].record_id, document.id);
        assert_eq!(entries[0].module, "proyectos");
    }

    #[tokio::test]
    async fn test_create_document_requires_owner() {
        let fx = fixture().await;
        let owner = OwnerRef::new(fx.owner.kind, Uuid::nil());
        let err = fx
            .service
            .create_document(owner, pdf("a.pdf", "x"), NewDocument::default(), &fx.actor)
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_document_rejects_disallowed_type_before_upload() {
        let fx = fixture().await;
        let upload = FileUpload::new("virus.exe", "application/x-msdownload", vec![1, 2, 3]);
        let err = fx
            .service
            .create_document(fx.owner, upload, NewDocument::default(), &fx.actor)
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::Validation(_)));
        assert!(!fx.store.root().join(fx.owner.kind.bucket()).exists());
    }

    #[tokio::test]
    async fn test_create_document_sanitizes_category_folder() {
        let fx = fixture().await;
        let details = NewDocument {
            category: Some("../planos".to_string()),
            ..Default::default()
        };
        let document = fx
            .service
            .create_document(fx.owner, pdf("plano.pdf", "x"), details, &fx.actor)
            .await
            .unwrap();

        assert!(document.storage_path.starts_with(&format!("{}/planos/", fx.owner.id)));
        assert_eq!(document.category.as_deref(), Some("../planos"));
        assert!(
            fx.store
                .exists(document.owner_kind.bucket(), &document.storage_path)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_update_details_and_rename() {
        let fx = fixture().await;
        let document = fx.upload("acta.pdf").await;

        let renamed = fx.service.rename(document.id, "  Acta de entrega ", &fx.actor).await.unwrap();
        assert_eq!(renamed.title, "Acta de entrega");

        let err = fx.service.rename(document.id, "   ", &fx.actor).await.unwrap_err();
        assert!(matches!(err, DocumentError::Validation(_)));

        let err = fx
            .service
            .update_details(document.id, UpdateDocumentDetails::default(), &fx.actor)
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::Validation(_)));

        let patch = UpdateDocumentDetails {
            is_important: Some(true),
            ..Default::default()
        };
        let updated = fx.service.update_details(document.id, patch, &fx.actor).await.unwrap();
        assert!(updated.is_important);
        assert_eq!(updated.title, "Acta de entrega");
    }

    #[tokio::test]
    async fn test_download_returns_bytes() {
        let fx = fixture().await;
        let document = fx.upload("plano.pdf").await;
        let (found, bytes) = fx.service.download(document.id).await.unwrap();
        assert_eq!(found.id, document.id);
        assert_eq!(bytes, b"original");
    }

    #[tokio::test]
    async fn test_list_expiring() {
        let fx = fixture().await;
        let details = NewDocument {
            expires_at: Some(Utc::now() + TimeDelta::days(5)),
            ..Default::default()
        };
        fx.service
            .create_document(fx.owner, pdf("poliza.pdf", "x"), details, &fx.actor)
            .await
            .unwrap();
        fx.upload("sin-vencimiento.pdf").await;

        assert_eq!(fx.service.list_expiring(30).await.unwrap().len(), 1);
        assert!(fx.service.list_expiring(1).await.unwrap().is_empty());
        assert!(matches!(
            fx.service.list_expiring(-1).await,
            Err(DocumentError::Validation(_))
        ));
        assert!(matches!(
            fx.service.list_expiring(1_000_000_000).await,
            Err(DocumentError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_document_is_not_found() {
        let fx = fixture().await;
        assert!(matches!(
            fx.service.get(Uuid::new_v4()).await,
            Err(DocumentError::NotFound(_))
        ));
    }
}
