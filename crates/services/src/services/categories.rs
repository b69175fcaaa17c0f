//! Shared document categories: per-module listing, CRUD, display order and the housing system set.

use db::{
    DBService,
    models::{
        document::OwnerKind,
        document_category::{CategoryUsage, CreateDocumentCategory, DocumentCategory, UpdateDocumentCategory},
    },
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use ts_rs::TS;
use utils::text::is_hex_color;
use uuid::Uuid;

pub const DEFAULT_CATEGORY_COLOR: &str = "#3B82F6";
pub const DEFAULT_CATEGORY_ICON: &str = "FileText";

const MAX_NAME_CHARS: usize = 80;

/// name, description, color, icon
const HOUSING_SYSTEM_CATEGORIES: [(&str, &str, &str, &str); 8] = [
    (
        "Certificado de Tradición",
        "Certificados de tradición y libertad de la propiedad",
        "#3B82F6",
        "FileText",
    ),
    (
        "Escrituras Públicas",
        "Escrituras de compraventa y documentos notariales",
        "#8B5CF6",
        "FileSignature",
    ),
    (
        "Planos Arquitectónicos",
        "Planos, diseños y renders de la vivienda",
        "#10B981",
        "Ruler",
    ),
    (
        "Licencias y Permisos",
        "Licencias de construcción y permisos municipales",
        "#F59E0B",
        "Shield",
    ),
    (
        "Avalúos Comerciales",
        "Avalúos y valoraciones de la propiedad",
        "#EF4444",
        "DollarSign",
    ),
    (
        "Fotos de Progreso",
        "Fotografías del avance y estado de la obra",
        "#06B6D4",
        "Camera",
    ),
    (
        "Contrato de Promesa",
        "Contratos de promesa de compraventa",
        "#EC4899",
        "FileContract",
    ),
    (
        "Recibos de Servicios",
        "Recibos de servicios públicos y pagos",
        "#14B8A6",
        "Receipt",
    ),
];

#[derive(Debug, Error)]
pub enum CategoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct NewCategory {
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
    /// Defaults to the end of the list
    pub sort_order: Option<i64>,
    /// Defaults to projects only
    pub modules: Option<Vec<OwnerKind>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, TS)]
pub struct CategoryOrder {
    pub id: Uuid,
    pub sort_order: i64,
}

#[derive(Clone)]
pub struct CategoryService {
    db: DBService,
}

impl CategoryService {
    pub fn new(db: DBService) -> Self {
        Self { db }
    }

    /// Categories in display order, restricted to those offered to `module` when given.
    pub async fn list(&self, module: Option<OwnerKind>) -> Result<Vec<DocumentCategory>, CategoryError> {
        let categories = match module {
            Some(kind) => DocumentCategory::find_by_module(&self.db.pool, kind).await?,
            None => DocumentCategory::find_all(&self.db.pool).await?,
        };
        Ok(categories)
    }

    pub async fn get(&self, id: Uuid) -> Result<DocumentCategory, CategoryError> {
        DocumentCategory::find_by_id(&self.db.pool, id)
            .await?
            .ok_or_else(|| CategoryError::NotFound(format!("category {id}")))
    }

    pub async fn has_categories(&self) -> Result<bool, CategoryError> {
        Ok(DocumentCategory::count(&self.db.pool).await? > 0)
    }

    pub async fn create(&self, new: NewCategory) -> Result<DocumentCategory, CategoryError> {
        let name = validate_name(&new.name)?;
        if let Some(color) = &new.color {
            validate_color(color)?;
        }
        self.ensure_name_free(&name, None).await?;

        let sort_order = match new.sort_order {
            Some(order) => order,
            None => DocumentCategory::count(&self.db.pool).await? + 1,
        };
        let data = CreateDocumentCategory {
            name,
            description: new.description.map(|d| d.trim().to_string()).filter(|d| !d.is_empty()),
            color: new.color.unwrap_or_else(|| DEFAULT_CATEGORY_COLOR.to_string()),
            icon: new.icon.unwrap_or_else(|| DEFAULT_CATEGORY_ICON.to_string()),
            sort_order,
            modules: new.modules.unwrap_or_else(|| vec![OwnerKind::Project]),
        };
        let category = DocumentCategory::create(&self.db.pool, &data).await?;
        info!(category_id = %category.id, name = %category.name, "Document category created");
        Ok(category)
    }

    /// Partial update. Renaming relabels the documents filed under the old name.
    pub async fn update(&self, id: Uuid, mut patch: UpdateDocumentCategory) -> Result<DocumentCategory, CategoryError> {
        let current = self.get(id).await?;
        if let Some(name) = &patch.name {
            let name = validate_name(name)?;
            self.ensure_name_free(&name, Some(id)).await?;
            patch.name = Some(name);
        }
        if let Some(color) = &patch.color {
            validate_color(color)?;
        }

        DocumentCategory::update(&self.db.pool, id, &patch).await?;
        let updated = self.get(id).await?;
        if updated.name != current.name {
            info!(category_id = %id, from = %current.name, to = %updated.name, "Document category renamed");
        }
        Ok(updated)
    }

    /// Remove a category no stored document is filed under.
    pub async fn delete(&self, id: Uuid) -> Result<(), CategoryError> {
        let category = self.get(id).await?;
        let usage = DocumentCategory::usage(&self.db.pool, &category.name).await?;
        if !usage.is_empty() {
            return Err(CategoryError::Conflict(format!(
                "category '{}' is still used by {}",
                category.name,
                describe_usage(&usage)
            )));
        }
        DocumentCategory::delete(&self.db.pool, id).await?;
        info!(category_id = %id, name = %category.name, "Document category deleted");
        Ok(())
    }

    pub async fn reorder(&self, order: &[CategoryOrder]) -> Result<(), CategoryError> {
        if order.is_empty() {
            return Err(CategoryError::Validation("nothing to reorder".to_string()));
        }
        let pairs: Vec<(Uuid, i64)> = order.iter().map(|o| (o.id, o.sort_order)).collect();
        let touched = DocumentCategory::reorder(&self.db.pool, &pairs).await?;
        if touched as usize != pairs.len() {
            return Err(CategoryError::NotFound(format!(
                "{} of {} categories were not found",
                pairs.len() - touched as usize,
                pairs.len()
            )));
        }
        Ok(())
    }

    /// Create whichever of the housing system categories are missing. Returns the ones created.
    pub async fn seed_housing_categories(&self) -> Result<Vec<DocumentCategory>, CategoryError> {
        let mut created = Vec::new();
        for (position, (name, description, color, icon)) in HOUSING_SYSTEM_CATEGORIES.iter().enumerate() {
            if DocumentCategory::find_by_name(&self.db.pool, name).await?.is_some() {
                continue;
            }
            let data = CreateDocumentCategory {
                name: name.to_string(),
                description: Some(description.to_string()),
                color: color.to_string(),
                icon: icon.to_string(),
                sort_order: position as i64 + 1,
                modules: vec![OwnerKind::Housing],
            };
            created.push(DocumentCategory::create(&self.db.pool, &data).await?);
        }
        if !created.is_empty() {
            info!(created = created.len(), "Housing system categories seeded");
        }
        Ok(created)
    }

    async fn ensure_name_free(&self, name: &str, except: Option<Uuid>) -> Result<(), CategoryError> {
        match DocumentCategory::find_by_name(&self.db.pool, name).await? {
            Some(existing) if Some(existing.id) != except => {
                Err(CategoryError::Conflict(format!("category '{}' already exists", existing.name)))
            }
            _ => Ok(()),
        }
    }
}

fn validate_name(name: &str) -> Result<String, CategoryError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CategoryError::Validation("category name is required".to_string()));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(CategoryError::Validation(format!(
            "category name must have at most {MAX_NAME_CHARS} characters"
        )));
    }
    Ok(name.to_string())
}

fn validate_color(color: &str) -> Result<(), CategoryError> {
    if is_hex_color(color) {
        Ok(())
    } else {
        Err(CategoryError::Validation(format!("'{color}' is not a #RRGGBB color")))
    }
}

fn describe_usage(usage: &[CategoryUsage]) -> String {
    usage
        .iter()
        .map(|u| format!("{} documents in {}", u.documents, u.owner_kind.module()))
        .collect::<Vec<_>>()
        .join(", ")
}
