pub mod actor;
pub mod error;
pub mod routes;

use std::sync::Arc;

use db::DBService;
use services::services::{
    audit_trail::AuditTrail,
    categories::CategoryService,
    documents::{DocumentService, SqliteDocumentRepository, UploadPolicy},
    storage::ObjectStore,
};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    db: DBService,
    documents: Arc<DocumentService>,
    audit: AuditTrail,
    categories: CategoryService,
}

impl AppState {
    pub fn new(db: DBService, store: Arc<dyn ObjectStore>, policy: UploadPolicy) -> Self {
        let documents = DocumentService::new(SqliteDocumentRepository::new(db.clone()), store, policy);
        Self {
            audit: AuditTrail::new(db.clone()),
            categories: CategoryService::new(db.clone()),
            documents: Arc::new(documents),
            db,
        }
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }

    pub fn documents(&self) -> &DocumentService {
        &self.documents
    }

    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    pub fn categories(&self) -> &CategoryService {
        &self.categories
    }
}
