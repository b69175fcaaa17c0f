use chrono::Utc;
use db::models::{
    audit_log::AuditAction,
    document::{DeletionScope, Document, DocumentState, OperationContext},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use ts_rs::TS;
use uuid::Uuid;

use super::{Actor, DocumentError, DocumentRepository, DocumentService};

/// Literal the caller must type to confirm a purge.
pub const PURGE_CONFIRMATION_TOKEN: &str = "DELETE";

/// A lineage keeps at least this many stored versions before one version can be removed alone.
const MIN_RETAINED_VERSIONS: usize = 2;

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct PurgeReport {
    pub purged_ids: Vec<Uuid>,
    /// Storage paths whose bytes could not be removed
    pub orphaned_files: Vec<String>,
}

fn deletion_scope(document: &Document) -> Option<DeletionScope> {
    document
        .parsed_operation()
        .and_then(|operation| operation.deletion_scope())
}

/// Version that must become current once `restored` are active again, if any.
fn promotion_after_restore(versions: &[Document], restored: &[Uuid]) -> Option<Uuid> {
    let active: Vec<&Document> = versions
        .iter()
        .filter(|v| v.state == DocumentState::Active || restored.contains(&v.id))
        .collect();
    if active.iter().any(|v| v.is_current) {
        return None;
    }
    active
        .iter()
        .max_by_key(|v| (v.created_at, v.version))
        .map(|v| v.id)
}

impl<R: DocumentRepository> DocumentService<R> {
    /// Move every version of the document's lineage to the trash.
    pub async fn soft_delete(&self, document_id: Uuid, actor: &Actor, reason: &str) -> Result<Document, DocumentError> {
        Self::ensure_reason(reason, "deletion reason")?;

        let target = self.get(document_id).await?;
        if target.is_deleted() {
            return Err(DocumentError::conflict("document is already in the trash"));
        }

        let operation = OperationContext::Deleted {
            scope: DeletionScope::Lineage,
            actor_id: actor.id,
            reason: reason.trim().to_string(),
            deleted_at: Utc::now(),
        };
        let touched = self
            .repo
            .set_lineage_state(
                target.lineage_id,
                &[DocumentState::Active, DocumentState::Archived],
                DocumentState::Deleted,
                actor.id,
                &operation,
            )
            .await?;

        let deleted = self.get(document_id).await?;
        info!(
            document_id = %document_id,
            lineage_id = %target.lineage_id,
            versions = touched,
            "Document moved to trash"
        );
        self.audit(
            AuditAction::Delete,
            actor,
            Some(&target),
            Some(&deleted),
            json!({ "state": "deleted", "scope": "lineage", "reason": reason.trim(), "versions": touched }),
        )
        .await;
        Ok(deleted)
    }

    /// Move a single, non-current version to the trash.
    pub async fn soft_delete_version(
        &self,
        version_id: Uuid,
        actor: &Actor,
        reason: &str,
    ) -> Result<Document, DocumentError> {
        Self::ensure_reason(reason, "deletion reason")?;

        let target = self.get(version_id).await?;
        match target.state {
            DocumentState::Deleted => return Err(DocumentError::conflict("version is already deleted")),
            DocumentState::Archived => {
                return Err(DocumentError::conflict("archived documents must be unarchived first"));
            }
            DocumentState::Active => {}
        }
        if target.is_current {
            return Err(DocumentError::conflict(
                "the current version cannot be deleted; make another version current first",
            ));
        }

        let counts = self.repo.lineage_counts(target.lineage_id).await?;
        if (counts.total as usize) < MIN_RETAINED_VERSIONS {
            return Err(DocumentError::conflict(format!(
                "a document must keep at least {MIN_RETAINED_VERSIONS} versions"
            )));
        }
        if counts.active <= 1 {
            return Err(DocumentError::conflict(
                "the last active version cannot be deleted; delete the document instead",
            ));
        }

        let operation = OperationContext::Deleted {
            scope: DeletionScope::Version,
            actor_id: actor.id,
            reason: reason.trim().to_string(),
            deleted_at: Utc::now(),
        };
        self.repo
            .set_state(version_id, DocumentState::Deleted, actor.id, &operation)
            .await?;

        let deleted = self.get(version_id).await?;
        info!(
            document_id = %version_id,
            lineage_id = %target.lineage_id,
            version = target.version,
            "Document version moved to trash"
        );
        self.audit(
            AuditAction::Delete,
            actor,
            Some(&target),
            Some(&deleted),
            json!({ "state": "deleted", "scope": "version", "reason": reason.trim() }),
        )
        .await;
        Ok(deleted)
    }

    /// Bring a deleted document back. Restoring a document that is not deleted changes nothing.
    pub async fn restore(&self, document_id: Uuid, actor: &Actor) -> Result<Document, DocumentError> {
        let target = self.get(document_id).await?;
        if !target.is_deleted() {
            return Ok(target);
        }

        let versions = self.repo.find_by_lineage(target.lineage_id).await?;
        let ids: Vec<Uuid> = match deletion_scope(&target) {
            Some(DeletionScope::Lineage) => versions
                .iter()
                .filter(|v| v.is_deleted() && deletion_scope(v) == Some(DeletionScope::Lineage))
                .map(|v| v.id)
                .collect(),
            _ => vec![target.id],
        };
        let promote = promotion_after_restore(&versions, &ids);

        let operation = OperationContext::Restored {
            restored_at: Utc::now(),
        };
        self.repo
            .restore_rows(target.lineage_id, &ids, promote, actor.id, &operation)
            .await?;

        let restored = self.get(document_id).await?;
        info!(
            document_id = %document_id,
            lineage_id = %target.lineage_id,
            versions = ids.len(),
            promoted = ?promote,
            "Document restored from trash"
        );
        self.audit(
            AuditAction::Update,
            actor,
            Some(&target),
            Some(&restored),
            json!({ "state": "active", "restored_ids": ids, "promoted_id": promote }),
        )
        .await;
        Ok(restored)
    }

    /// Restore each selected version (or the lineage it was deleted with).
    pub async fn restore_versions(&self, ids: &[Uuid], actor: &Actor) -> Result<Vec<Document>, DocumentError> {
        if ids.is_empty() {
            return Err(DocumentError::validation("select at least one version to restore"));
        }
        let mut restored = Vec::with_capacity(ids.len());
        for id in ids {
            restored.push(self.restore(*id, actor).await?);
        }
        Ok(restored)
    }

    /// Irreversibly remove a deleted document and its files.
    pub async fn purge_permanently(
        &self,
        document_id: Uuid,
        confirmation_token: &str,
        justification: &str,
        actor: &Actor,
    ) -> Result<PurgeReport, DocumentError> {
        if confirmation_token != PURGE_CONFIRMATION_TOKEN {
            return Err(DocumentError::validation(format!(
                "type {PURGE_CONFIRMATION_TOKEN} to confirm permanent deletion"
            )));
        }
        Self::ensure_reason(justification, "justification")?;

        let target = self.get(document_id).await?;
        if !target.is_deleted() {
            return Err(DocumentError::conflict("only documents in the trash can be purged"));
        }

        let versions = self.repo.find_by_lineage(target.lineage_id).await?;
        let victims: Vec<Document> = match deletion_scope(&target) {
            Some(DeletionScope::Lineage) => versions.into_iter().filter(Document::is_deleted).collect(),
            _ => {
                if target.is_current {
                    return Err(DocumentError::conflict("the current version cannot be purged on its own"));
                }
                if versions.len() < MIN_RETAINED_VERSIONS {
                    return Err(DocumentError::conflict(format!(
                        "a document must keep at least {MIN_RETAINED_VERSIONS} versions before one is purged"
                    )));
                }
                vec![target]
            }
        };
        let ids: Vec<Uuid> = victims.iter().map(|v| v.id).collect();

        self.repo.purge(&ids).await?;

        let mut orphaned_files = Vec::new();
        for victim in &victims {
            if let Err(e) = self
                .store
                .remove(victim.owner_kind.bucket(), &victim.storage_path)
                .await
            {
                warn!(
                    document_id = %victim.id,
                    storage_path = %victim.storage_path,
                    error = %e,
                    "Failed to remove purged file"
                );
                orphaned_files.push(victim.storage_path.clone());
            }
            self.audit(
                AuditAction::Delete,
                actor,
                Some(victim),
                None,
                json!({ "purged": true, "justification": justification.trim() }),
            )
            .await;
        }

        info!(
            document_id = %document_id,
            purged = ids.len(),
            orphaned = orphaned_files.len(),
            "Document purged permanently"
        );
        Ok(PurgeReport {
            purged_ids: ids,
            orphaned_files,
        })
    }

    /// Archive every active version of the lineage.
    pub async fn archive(&self, document_id: Uuid, actor: &Actor) -> Result<Document, DocumentError> {
        self.move_lineage(document_id, DocumentState::Active, DocumentState::Archived, actor)
            .await
    }

    pub async fn unarchive(&self, document_id: Uuid, actor: &Actor) -> Result<Document, DocumentError> {
        self.move_lineage(document_id, DocumentState::Archived, DocumentState::Active, actor)
            .await
    }

    async fn move_lineage(
        &self,
        document_id: Uuid,
        from: DocumentState,
        to: DocumentState,
        actor: &Actor,
    ) -> Result<Document, DocumentError> {
        let target = self.get(document_id).await?;
        if target.is_deleted() {
            return Err(DocumentError::conflict("deleted documents must be restored first"));
        }
        if target.state == to {
            return Ok(target);
        }

        let operation = if to == DocumentState::Archived {
            OperationContext::Archived
        } else {
            OperationContext::Unarchived
        };
        self.repo
            .set_lineage_state(target.lineage_id, &[from], to, actor.id, &operation)
            .await?;

        let moved = self.get(document_id).await?;
        info!(document_id = %document_id, state = %to, "Document lineage state changed");
        self.audit(
            AuditAction::Update,
            actor,
            Some(&target),
            Some(&moved),
            json!({ "state": { "from": from, "to": to } }),
        )
        .await;
        Ok(moved)
    }
}
