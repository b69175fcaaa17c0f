use chrono::Utc;
use db::models::{
    audit_log::AuditAction,
    document::{Document, DocumentState, OperationContext, ReplacedFile},
};
use serde_json::{Value, json};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{Actor, DocumentError, DocumentRepository, DocumentService, FileUpload};
use crate::services::storage::StorageError;

/// `{owner_id}/backups/replacements/{document_id}_backup_{millis}_{file_name}`
fn backup_path(document: &Document) -> String {
    format!(
        "{}/backups/replacements/{}_backup_{}_{}",
        document.owner_id,
        document.id,
        Utc::now().timestamp_millis(),
        document.file_name
    )
}

impl<R: DocumentRepository> DocumentService<R> {
    /// Overwrite the bytes of one version in place, keeping a backup of the previous file.
    ///
    /// The previous bytes are copied to a backup object before anything is overwritten. If the
    /// row cannot be updated afterwards, the previous bytes are written back.
    pub async fn replace_file(
        &self,
        document_id: Uuid,
        upload: FileUpload,
        reason: &str,
        actor: &Actor,
    ) -> Result<Document, DocumentError> {
        Self::ensure_reason(reason, "replacement reason")?;
        self.policy.validate(&upload)?;

        let before = self.get(document_id).await?;
        match before.state {
            DocumentState::Deleted => {
                return Err(DocumentError::conflict("deleted documents must be restored first"));
            }
            DocumentState::Archived => {
                return Err(DocumentError::conflict("archived documents must be unarchived first"));
            }
            DocumentState::Active => {}
        }

        let bucket = before.owner_kind.bucket();
        let previous = self.store.get(bucket, &before.storage_path).await?;
        let backup = backup_path(&before);
        self.store.put(bucket, &backup, &previous).await?;
        if !self.store.exists(bucket, &backup).await? {
            return Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                path: backup,
            }
            .into());
        }

        self.store.put(bucket, &before.storage_path, &upload.bytes).await?;

        let reason = reason.trim().to_string();
        let mut metadata = before.parsed_metadata();
        metadata.insert(
            "replacement".to_string(),
            json!({
                "replaced_at": Utc::now(),
                "reason": reason,
                "previous_file": before.original_name,
                "new_file": upload.original_name,
                "previous_size_bytes": before.size_bytes,
                "new_size_bytes": upload.size(),
                "backup_path": backup,
                "replaced_by": actor.id,
            }),
        );
        let file = ReplacedFile {
            original_name: upload.original_name.clone(),
            mime_type: upload.mime_type.clone(),
            size_bytes: upload.size() as i64,
            metadata,
        };
        let operation = OperationContext::FileReplaced {
            reason: reason.clone(),
            backup_path: backup.clone(),
            previous_original_name: before.original_name.clone(),
            previous_size_bytes: before.size_bytes,
        };

        if let Err(e) = self.repo.replace_file(document_id, &file, actor.id, &operation).await {
            warn!(document_id = %document_id, error = %e, "Replacement not recorded, restoring previous file");
            if let Err(rollback) = self.store.put(bucket, &before.storage_path, &previous).await {
                error!(
                    document_id = %document_id,
                    backup_path = %backup,
                    error = %rollback,
                    "Failed to restore previous file; recover it from the backup"
                );
            }
            return Err(e.into());
        }

        let after = self.get(document_id).await?;
        info!(
            document_id = %document_id,
            previous_size_bytes = before.size_bytes,
            size_bytes = after.size_bytes,
            backup_path = %backup,
            "Document file replaced"
        );
        self.audit(
            AuditAction::Update,
            actor,
            Some(&before),
            Some(&after),
            replacement_changes(&before, &after, &reason, &backup),
        )
        .await;
        Ok(after)
    }
}

fn replacement_changes(before: &Document, after: &Document, reason: &str, backup: &str) -> Value {
    json!({
        "operation": "file_replaced",
        "reason": reason,
        "backup_path": backup,
        "previous": {
            "original_name": before.original_name,
            "mime_type": before.mime_type,
            "size_bytes": before.size_bytes,
        },
        "new": {
            "original_name": after.original_name,
            "mime_type": after.mime_type,
            "size_bytes": after.size_bytes,
        },
        "size_delta_bytes": after.size_bytes - before.size_bytes,
    })
}

#[cfg(test)]
mod tests {
    use db::models::audit_log::AuditLogEntry;

    use super::super::test_support::*;
    use super::*;
    use crate::services::storage::ObjectStore;

    #[tokio::test]
    async fn test_replace_file_overwrites_in_place_and_keeps_backup() {
        let fx = fixture().await;
        let document = fx.upload("licencia.pdf").await;

        let replaced = fx
            .service
            .replace_file(
                document.id,
                pdf("licencia-firmada.pdf", "signed copy"),
                "signature page was missing",
                &fx.actor,
            )
            .await
            .unwrap();

        assert_eq!(replaced.id, document.id);
        assert_eq!(replaced.version, document.version);
        assert_eq!(replaced.storage_path, document.storage_path);
        assert_eq!(replaced.original_name, "licencia-firmada.pdf");
        assert_eq!(replaced.size_bytes, "signed copy".len() as i64);

        let (_, bytes) = fx.service.download(document.id).await.unwrap();
        assert_eq!(bytes, b"signed copy");

        let backup = match replaced.parsed_operation() {
            Some(OperationContext::FileReplaced {
                backup_path,
                previous_original_name,
                ..
            }) => {
                assert_eq!(previous_original_name, "licencia.pdf");
                backup_path
            }
            other => panic!("unexpected operation context: {other:?}"),
        };
        assert!(backup.starts_with(&format!("{}/backups/replacements/{}_backup_", fx.owner.id, document.id)));
        let saved = fx.store.get(document.owner_kind.bucket(), &backup).await.unwrap();
        assert_eq!(saved, b"original");
        assert_eq!(replaced.parsed_metadata()["replacement"]["backup_path"], backup.as_str());

        let history = AuditLogEntry::find_by_record(&fx.db.pool, "documents", document.id, 10)
            .await
            .unwrap();
        let changes = history[0].parsed_changes().unwrap();
        assert_eq!(changes["operation"], "file_replaced");
        assert_eq!(changes["reason"], "signature page was missing");
        assert_eq!(changes["size_delta_bytes"], 3);
    }

    #[tokio::test]
    async fn test_replace_file_validates_before_touching_storage() {
        let fx = fixture().await;
        let document = fx.upload("licencia.pdf").await;

        let err = fx
            .service
            .replace_file(document.id, pdf("nuevo.pdf", "x"), "short", &fx.actor)
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::Validation(_)));

        let upload = FileUpload::new("nuevo.exe", "application/x-msdownload", vec![1]);
        let err = fx
            .service
            .replace_file(document.id, upload, "wrong file uploaded", &fx.actor)
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::Validation(_)));

        fx.service
            .soft_delete(document.id, &fx.actor, "filed in the wrong project")
            .await
            .unwrap();
        let err = fx
            .service
            .replace_file(document.id, pdf("nuevo.pdf", "x"), "wrong file uploaded", &fx.actor)
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::Conflict(_)));

        let (_, bytes) = fx.service.download(document.id).await.unwrap();
        assert_eq!(bytes, b"original");
        let backups = fx
            .store
            .root()
            .join(document.owner_kind.bucket())
            .join(fx.owner.id.to_string())
            .join("backups");
        assert!(!backups.exists());
    }

    #[tokio::test]
    async fn test_replace_file_restores_previous_bytes_when_row_update_fails() {
        let fx = fixture().await;
        let document = fx.upload("licencia.pdf").await;
        sqlx::query(
            r#"CREATE TRIGGER reject_file_changes BEFORE UPDATE OF original_name ON documents
            BEGIN SELECT RAISE(ABORT, 'file columns are locked'); END"#,
        )
        .execute(&fx.db.pool)
        .await
        .unwrap();

        let err = fx
            .service
            .replace_file(document.id, pdf("otro.pdf", "replacement"), "signature page was missing", &fx.actor)
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::Remote(_)));

        let (unchanged, bytes) = fx.service.download(document.id).await.unwrap();
        assert_eq!(bytes, b"original");
        assert_eq!(unchanged.original_name, "licencia.pdf");
        assert_eq!(unchanged.size_bytes, document.size_bytes);
    }
}
