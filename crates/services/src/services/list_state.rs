//! Client-side view of an owner's document list, driven by a reducer, plus optimistic
//! commands that patch the view before the remote call and undo the patch when it fails.

use db::models::document::{Document, DocumentState};
use serde::{Deserialize, Serialize};
use tracing::debug;
use ts_rs::TS;
use uuid::Uuid;

use super::documents::{Actor, DocumentError, DocumentRepository, DocumentService};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct ListFilters {
    pub category: Option<String>,
    pub search: String,
    pub important_only: bool,
}

#[derive(Debug, Clone)]
pub enum ListAction {
    Loaded(Vec<Document>),
    SetCategory(Option<String>),
    SetSearch(String),
    ToggleImportantOnly,
    ClearFilters,
    Select(Option<Uuid>),
    /// Insert or replace the lineage entry; non-current or inactive rows drop it
    Upsert(Document),
    Remove(Uuid),
    Rename { id: Uuid, title: String },
    Failed(String),
}

#[derive(Debug, Clone, Default)]
pub struct DocumentListState {
    items: Vec<Document>,
    filters: ListFilters,
    selected: Option<Uuid>,
    error: Option<String>,
}

impl DocumentListState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, action: ListAction) {
        match action {
            ListAction::Loaded(items) => {
                self.items = items;
                self.error = None;
                let items = &self.items;
                self.selected = self.selected.filter(|id| items.iter().any(|d| d.id == *id));
            }
            ListAction::SetCategory(category) => self.filters.category = category,
            ListAction::SetSearch(search) => self.filters.search = search,
            ListAction::ToggleImportantOnly => self.filters.important_only = !self.filters.important_only,
            ListAction::ClearFilters => self.filters = ListFilters::default(),
            ListAction::Select(id) => self.selected = id,
            ListAction::Upsert(document) => {
                let position = self.items.iter().position(|d| d.lineage_id == document.lineage_id);
                let visible = document.is_current && document.state == DocumentState::Active;
                match (position, visible) {
                    (Some(i), true) => self.items[i] = document,
                    (None, true) => self.items.push(document),
                    (Some(i), false) => {
                        let removed = self.items.remove(i);
                        if self.selected == Some(removed.id) {
                            self.selected = None;
                        }
                    }
                    (None, false) => {}
                }
            }
            ListAction::Remove(id) => {
                self.items.retain(|d| d.id != id && d.lineage_id != id);
                if self.selected == Some(id) {
                    self.selected = None;
                }
            }
            ListAction::Rename { id, title } => {
                if let Some(document) = self.items.iter_mut().find(|d| d.id == id) {
                    document.title = title;
                }
            }
            ListAction::Failed(message) => self.error = Some(message),
        }
    }

    pub fn items(&self) -> &[Document] {
        &self.items
    }

    pub fn filters(&self) -> &ListFilters {
        &self.filters
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn selected(&self) -> Option<&Document> {
        self.selected
            .and_then(|id| self.items.iter().find(|d| d.id == id))
    }

    pub fn get(&self, id: Uuid) -> Option<&Document> {
        self.items.iter().find(|d| d.id == id)
    }

    /// Items passing the filters, important first then newest.
    pub fn visible(&self) -> Vec<&Document> {
        let needle = self.filters.search.trim().to_lowercase();
        let mut visible: Vec<&Document> = self
            .items
            .iter()
            .filter(|d| {
                self.filters
                    .category
                    .as_ref()
                    .is_none_or(|c| d.category.as_ref() == Some(c))
            })
            .filter(|d| !self.filters.important_only || d.is_important)
            .filter(|d| {
                needle.is_empty()
                    || d.title.to_lowercase().contains(&needle)
                    || d
                        .description
                        .as_deref()
                        .is_some_and(|desc| desc.to_lowercase().contains(&needle))
            })
            .collect();
        visible.sort_by(|a, b| {
            b.is_important
                .cmp(&a.is_important)
                .then(b.created_at.cmp(&a.created_at))
        });
        visible
    }
}

/// Undo for an optimistic patch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compensation {
    Rename { id: Uuid, title: String },
}

impl Compensation {
    pub fn apply(self, state: &mut DocumentListState) {
        match self {
            Compensation::Rename { id, title } => state.apply(ListAction::Rename { id, title }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenameCommand {
    pub id: Uuid,
    pub title: String,
}

impl RenameCommand {
    pub fn new(id: Uuid, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
        }
    }

    /// Show the new title right away. Returns `None` when the document is not in the view.
    pub fn apply_optimistic(&self, state: &mut DocumentListState) -> Option<Compensation> {
        let previous = state.get(self.id)?.title.clone();
        state.apply(ListAction::Rename {
            id: self.id,
            title: self.title.trim().to_string(),
        });
        Some(Compensation::Rename {
            id: self.id,
            title: previous,
        })
    }

    /// Patch the view, rename remotely, then either confirm with the stored row or roll back.
    pub async fn run<R: DocumentRepository>(
        &self,
        state: &mut DocumentListState,
        service: &DocumentService<R>,
        actor: &Actor,
    ) -> Result<Document, DocumentError> {
        let compensation = self.apply_optimistic(state);
        match service.rename(self.id, &self.title, actor).await {
            Ok(document) => {
                state.apply(ListAction::Upsert(document.clone()));
                Ok(document)
            }
            Err(e) => {
                debug!(document_id = %self.id, error = %e, "Rename failed, rolling back");
                if let Some(compensation) = compensation {
                    compensation.apply(state);
                }
                state.apply(ListAction::Failed(e.to_string()));
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use db::models::document::DocumentFilter;

    use super::*;
    use crate::services::documents::test_support::*;

    async fn loaded(fx: &Fixture) -> DocumentListState {
        let mut state = DocumentListState::new();
        let items = fx
            .service
            .list_active(fx.owner, &DocumentFilter::default())
            .await
            .unwrap();
        state.apply(ListAction::Loaded(items));
        state
    }

    #[tokio::test]
    async fn test_filters_narrow_visible_items() {
        let fx = fixture().await;
        let acta = fx.upload("Acta de entrega.pdf").await;
        fx.upload("Plano estructural.pdf").await;
        let mut state = loaded(&fx).await;
        assert_eq!(state.visible().len(), 2);

        state.apply(ListAction::SetSearch("  ACTA ".to_string()));
        let visible = state.visible();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, acta.id);

        state.apply(ListAction::ToggleImportantOnly);
        assert!(state.visible().is_empty());

        state.apply(ListAction::ClearFilters);
        assert_eq!(state.visible().len(), 2);
    }

    #[tokio::test]
    async fn test_upsert_replaces_lineage_entry() {
        let fx = fixture().await;
        let v1 = fx.upload("plano.pdf").await;
        let mut state = loaded(&fx).await;
        state.apply(ListAction::Select(Some(v1.id)));

        let v2 = fx
            .service
            .add_version(v1.id, pdf("plano.pdf", "v2"), "new facade", &fx.actor)
            .await
            .unwrap();
        state.apply(ListAction::Upsert(v2.clone()));
        assert_eq!(state.items().len(), 1);
        assert_eq!(state.items()[0].id, v2.id);
        assert!(state.selected().is_none());

        let deleted = fx
            .service
            .soft_delete(v2.id, &fx.actor, "uploaded to the wrong project")
            .await
            .unwrap();
        state.apply(ListAction::Upsert(deleted));
        assert!(state.items().is_empty());
    }

    #[tokio::test]
    async fn test_rename_command_confirms_on_success() {
        let fx = fixture().await;
        let document = fx.upload("acta.pdf").await;
        let mut state = loaded(&fx).await;

        let command = RenameCommand::new(document.id, "Acta final");
        let renamed = command.run(&mut state, &fx.service, &fx.actor).await.unwrap();
        assert_eq!(renamed.title, "Acta final");
        assert_eq!(state.get(document.id).unwrap().title, "Acta final");
        assert!(state.error().is_none());
    }

    #[tokio::test]
    async fn test_rename_command_compensates_on_failure() {
        let fx = fixture().await;
        let document = fx.upload("acta.pdf").await;
        let mut state = loaded(&fx).await;

        let command = RenameCommand::new(document.id, "   ");
        let compensation = command.apply_optimistic(&mut state).unwrap();
        assert_eq!(state.get(document.id).unwrap().title, "");
        compensation.apply(&mut state);
        assert_eq!(state.get(document.id).unwrap().title, "acta");

        let err = command.run(&mut state, &fx.service, &fx.actor).await.unwrap_err();
        assert!(matches!(err, DocumentError::Validation(_)));
        assert_eq!(state.get(document.id).unwrap().title, "acta");
        assert!(state.error().is_some());
    }

    #[test]
    fn test_rename_outside_view_has_no_compensation() {
        let mut state = DocumentListState::new();
        assert!(
            RenameCommand::new(Uuid::new_v4(), "x")
                .apply_optimistic(&mut state)
                .is_none()
        );
    }
}
