use db::models::{
    audit_log::AuditAction,
    document::{CreateDocument, Document, DocumentState, OperationContext, VersionStatus},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use ts_rs::TS;
use uuid::Uuid;

use super::{Actor, DocumentError, DocumentRepository, DocumentService, FileUpload, storage_location};

/// Version counts for one lineage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
pub struct VersionSummary {
    pub lineage_id: Uuid,
    pub total_versions: i64,
    pub active_versions: i64,
    pub current_version: Option<i64>,
}

impl<R: DocumentRepository> DocumentService<R> {
    /// All stored versions of the lineage that `id` belongs to. `id` may be any version.
    async fn lineage_of(&self, id: Uuid) -> Result<Vec<Document>, DocumentError> {
        let document = self.repo.find_by_id(id).await?.ok_or_else(|| {
            DocumentError::NotFound(format!("document lineage {id} has no versions"))
        })?;
        let versions = self.repo.find_by_lineage(document.lineage_id).await?;
        if versions.is_empty() {
            return Err(DocumentError::NotFound(format!(
                "document lineage {} has no versions",
                document.lineage_id
            )));
        }
        Ok(versions)
    }

    /// Append a new version to a lineage and make it current.
    pub async fn add_version(
        &self,
        lineage_or_version_id: Uuid,
        upload: FileUpload,
        change_description: &str,
        actor: &Actor,
    ) -> Result<Document, DocumentError> {
        let change_description = change_description.trim();
        if change_description.is_empty() {
            return Err(DocumentError::validation("change description is required"));
        }
        self.policy.validate(&upload)?;

        let versions = self.lineage_of(lineage_or_version_id).await?;
        let previous = versions
            .iter()
            .find(|v| v.is_current && v.state == DocumentState::Active)
            .or_else(|| versions.iter().find(|v| v.state == DocumentState::Active))
            .ok_or_else(|| {
                DocumentError::conflict("document has no active version; restore it before adding versions")
            })?;

        let location = storage_location(previous.owner(), previous.category.as_deref(), &upload.original_name);
        self.store.put(location.bucket, &location.path, &upload.bytes).await?;

        let mut metadata = previous.parsed_metadata();
        metadata.insert("previous_version_id".to_string(), json!(previous.id));

        let data = CreateDocument {
            id: Uuid::new_v4(),
            owner: previous.owner(),
            lineage_id: previous.lineage_id,
            version: previous.version + 1, // replaced with max + 1 by the repository
            title: previous.title.clone(),
            description: previous.description.clone(),
            category: previous.category.clone(),
            is_important: previous.is_important,
            document_date: previous.document_date,
            expires_at: previous.expires_at,
            file_name: location.file_name.clone(),
            original_name: upload.original_name.clone(),
            mime_type: upload.mime_type.clone(),
            size_bytes: upload.size() as i64,
            storage_path: location.path.clone(),
            metadata,
            operation: OperationContext::VersionAdded {
                change_description: change_description.to_string(),
                previous_version_id: previous.id,
            },
            actor_id: Some(actor.id),
        };

        let document = match self.repo.insert_version(data).await {
            Ok(document) => document,
            Err(e) => {
                self.discard_upload(&location).await;
                return Err(e.into());
            }
        };

        info!(
            document_id = %document.id,
            lineage_id = %document.lineage_id,
            version = document.version,
            "Document version added"
        );
        self.audit(
            AuditAction::Create,
            actor,
            None,
            Some(&document),
            json!({
                "version": document.version,
                "previous_version_id": previous.id,
                "change_description": change_description,
            }),
        )
        .await;
        Ok(document)
    }

    /// Make an existing version the current one again.
    pub async fn restore_version(
        &self,
        version_id: Uuid,
        actor: &Actor,
        reason: Option<String>,
    ) -> Result<Document, DocumentError> {
        let target = self.get(version_id).await?;
        match target.state {
            DocumentState::Deleted => {
                return Err(DocumentError::conflict("deleted versions must be restored from the trash first"));
            }
            DocumentState::Archived => {
                return Err(DocumentError::conflict("archived documents must be unarchived first"));
            }
            DocumentState::Active => {}
        }
        if target.is_current {
            return Ok(target);
        }

        let previous_current = self
            .repo
            .find_by_lineage(target.lineage_id)
            .await?
            .into_iter()
            .find(|v| v.is_current)
            .map(|v| v.id);

        let operation = OperationContext::VersionRestored {
            reason: reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty()),
            previous_current_id: previous_current,
        };
        self.repo
            .make_current(target.lineage_id, target.id, actor.id, &operation)
            .await?;

        let restored = self.get(version_id).await?;
        info!(
            document_id = %restored.id,
            lineage_id = %restored.lineage_id,
            version = restored.version,
            "Document version made current"
        );
        self.audit(
            AuditAction::Update,
            actor,
            Some(&target),
            Some(&restored),
            json!({ "is_current": true, "previous_current_id": previous_current }),
        )
        .await;
        Ok(restored)
    }

    /// Active versions of the lineage, newest first.
    pub async fn list_versions(&self, id: Uuid) -> Result<Vec<Document>, DocumentError> {
        Ok(self
            .lineage_of(id)
            .await?
            .into_iter()
            .filter(|v| v.state == DocumentState::Active)
            .collect())
    }

    /// Soft-deleted versions of the lineage, newest first.
    pub async fn list_deleted_versions(&self, id: Uuid) -> Result<Vec<Document>, DocumentError> {
        Ok(self
            .lineage_of(id)
            .await?
            .into_iter()
            .filter(|v| v.is_deleted())
            .collect())
    }

    pub async fn version_summary(&self, id: Uuid) -> Result<VersionSummary, DocumentError> {
        let versions = self.lineage_of(id).await?;
        let lineage_id = versions[0].lineage_id;
        let counts = self.repo.lineage_counts(lineage_id).await?;
        Ok(VersionSummary {
            lineage_id,
            total_versions: counts.total,
            active_versions: counts.active,
            current_version: versions.iter().find(|v| v.is_current).map(|v| v.version),
        })
    }

    /// Flag a version as erroneous or obsolete, optionally pointing at the version that corrects it.
    pub async fn mark_version_status(
        &self,
        version_id: Uuid,
        status: VersionStatus,
        reason: &str,
        corrected_by_id: Option<Uuid>,
        actor: &Actor,
    ) -> Result<Document, DocumentError> {
        if status == VersionStatus::Valid {
            return self.reset_version_status(version_id, actor).await;
        }
        Self::ensure_reason(reason, "status reason")?;

        let target = self.get(version_id).await?;
        if target.is_deleted() {
            return Err(DocumentError::conflict("deleted versions cannot change status"));
        }
        if let Some(corrected_by_id) = corrected_by_id {
            if corrected_by_id == version_id {
                return Err(DocumentError::validation("a version cannot correct itself"));
            }
            let correction = self.get(corrected_by_id).await?;
            if correction.lineage_id != target.lineage_id {
                return Err(DocumentError::validation(
                    "correcting version must belong to the same document",
                ));
            }
        }

        self.repo
            .update_version_status(version_id, status, Some(reason.trim()), corrected_by_id, actor.id)
            .await?;
        let updated = self.get(version_id).await?;
        info!(document_id = %version_id, status = %status, "Document version status changed");
        self.audit(
            AuditAction::Update,
            actor,
            Some(&target),
            Some(&updated),
            json!({
                "version_status": { "from": target.version_status, "to": status },
                "reason": reason.trim(),
                "corrected_by_id": corrected_by_id,
            }),
        )
        .await;
        Ok(updated)
    }

    pub async fn reset_version_status(&self, version_id: Uuid, actor: &Actor) -> Result<Document, DocumentError> {
        let target = self.get(version_id).await?;
        if target.version_status == VersionStatus::Valid {
            return Ok(target);
        }
        self.repo
            .update_version_status(version_id, VersionStatus::Valid, None, None, actor.id)
            .await?;
        let updated = self.get(version_id).await?;
        self.audit(
            AuditAction::Update,
            actor,
            Some(&target),
            Some(&updated),
            json!({
                "version_status": { "from": target.version_status, "to": VersionStatus::Valid },
                "previous_reason": target.status_reason,
            }),
        )
        .await;
        Ok(updated)
    }
}
