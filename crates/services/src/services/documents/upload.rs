use chrono::Utc;
use db::models::document::OwnerRef;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utils::text::{extension, slugify};
use uuid::Uuid;

use super::error::DocumentError;

pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

const DEFAULT_ALLOWED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "image/jpeg",
    "image/png",
    "image/webp",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
];

/// File bytes as received from the caller
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub original_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    pub fn new(original_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            original_name: original_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Size and type allow-list applied to every upload
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UploadPolicy {
    pub max_bytes: u64,
    pub allowed_mime_types: Vec<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allowed_mime_types: DEFAULT_ALLOWED_MIME_TYPES.iter().map(|m| m.to_string()).collect(),
        }
    }
}

impl UploadPolicy {
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn validate(&self, upload: &FileUpload) -> Result<(), DocumentError> {
        if upload.original_name.trim().is_empty() {
            return Err(DocumentError::validation("file name is required"));
        }
        if upload.bytes.is_empty() {
            return Err(DocumentError::validation("file is empty"));
        }
        if upload.size() > self.max_bytes {
            return Err(DocumentError::validation(format!(
                "file is {} bytes, maximum is {} bytes",
                upload.size(),
                self.max_bytes
            )));
        }
        let mime_type = upload.mime_type.to_ascii_lowercase();
        if !self.allowed_mime_types.iter().any(|allowed| *allowed == mime_type) {
            return Err(DocumentError::validation(format!(
                "file type '{}' is not allowed",
                upload.mime_type
            )));
        }
        Ok(())
    }
}

/// Generated object name and its path inside the owner's bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLocation {
    pub bucket: &'static str,
    pub file_name: String,
    pub path: String,
}

/// `{owner_id}/{category-slug}/{millis}-{uuid}.{ext}`, inside the bucket of the owner kind.
pub fn storage_location(owner: OwnerRef, category: Option<&str>, original_name: &str) -> StorageLocation {
    let folder = category
        .map(slugify)
        .filter(|slug| !slug.is_empty())
        .unwrap_or_else(|| "general".to_string());
    let safe_extension = extension(original_name)
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()));
    let file_name = match safe_extension {
        Some(ext) => format!(
            "{}-{}.{}",
            Utc::now().timestamp_millis(),
            Uuid::new_v4(),
            ext.to_ascii_lowercase()
        ),
        None => format!("{}-{}", Utc::now().timestamp_millis(), Uuid::new_v4()),
    };
    StorageLocation {
        bucket: owner.kind.bucket(),
        path: format!("{}/{}/{}", owner.id, folder, file_name),
        file_name,
    }
}

#[cfg(test)]
mod tests {
    use db::models::document::OwnerKind;

    use super::*;

    fn pdf(size: usize) -> FileUpload {
        FileUpload::new("escritura.pdf", "application/pdf", vec![0u8; size])
    }

    #[test]
    fn test_policy_accepts_allowed_upload() {
        assert!(UploadPolicy::default().validate(&pdf(2048)).is_ok());
    }

    #[test]
    fn test_policy_rejects_oversized_and_empty() {
        let policy = UploadPolicy::default().with_max_bytes(1024);
        assert!(matches!(policy.validate(&pdf(1025)), Err(DocumentError::Validation(_))));
        assert!(matches!(policy.validate(&pdf(0)), Err(DocumentError::Validation(_))));
    }

    #[test]
    fn test_policy_rejects_unknown_mime_type() {
        let upload = FileUpload::new("script.sh", "application/x-sh", vec![1, 2, 3]);
        assert!(matches!(
            UploadPolicy::default().validate(&upload),
            Err(DocumentError::Validation(_))
        ));
    }

    #[test]
    fn test_storage_location_layout() {
        let owner = OwnerRef::new(OwnerKind::Housing, Uuid::new_v4());
        let location = storage_location(owner, Some("Planos Estructurales"), "Plano.PDF");
        assert_eq!(location.bucket, "documentos-viviendas");
        assert!(location.path.starts_with(&format!("{}/planos-estructurales/", owner.id)));
        assert!(location.file_name.ends_with(".pdf"));
        assert!(location.path.ends_with(&location.file_name));

        let location = storage_location(owner, None, "acta");
        assert!(location.path.starts_with(&format!("{}/general/", owner.id)));
    }

    #[test]
    fn test_storage_location_stays_inside_owner_folder() {
        let owner = OwnerRef::new(OwnerKind::Client, Uuid::new_v4());
        let location = storage_location(owner, Some("../../otros"), "cedula./../x");
        assert!(location.path.starts_with(&format!("{}/otros/", owner.id)));
        assert!(!location.path.contains(".."));
        assert_eq!(location.path.matches('/').count(), 2);

        let location = storage_location(owner, Some("/"), "cedula.pdf");
        assert!(location.path.starts_with(&format!("{}/general/", owner.id)));
    }
}
