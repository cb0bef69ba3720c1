//! Shared application state: one service instance per component, all
//! wired to the same storage backend.

use std::path::Path;
use std::sync::Arc;

use crate::access::AccessGate;
use crate::collab::{CollabService, Comment, Notification, NotificationDispatcher};
use crate::config::{AppConfig, StorageBackend};
use crate::documents::{Block, DocumentStore, Page, PageShare, Workspace, WorkspaceMember};
use crate::favorites::{Favorite, FavoritesService};
use crate::storage::{Collection, JsonFileCollection, MemoryCollection};
use crate::templates::{Template, TemplatesService};

pub struct AppState {
    pub store: DocumentStore,
    pub gate: AccessGate,
    pub collab: CollabService,
    pub favorites: FavoritesService,
    pub templates: TemplatesService,
}

struct Collections {
    workspaces: Arc<dyn Collection<Workspace>>,
    members: Arc<dyn Collection<WorkspaceMember>>,
    pages: Arc<dyn Collection<Page>>,
    blocks: Arc<dyn Collection<Block>>,
    shares: Arc<dyn Collection<PageShare>>,
    comments: Arc<dyn Collection<Comment>>,
    notifications: Arc<dyn Collection<Notification>>,
    favorites: Arc<dyn Collection<Favorite>>,
    templates: Arc<dyn Collection<Template>>,
}

impl Collections {
    fn memory() -> Self {
        Self {
            workspaces: Arc::new(MemoryCollection::new()),
            members: Arc::new(MemoryCollection::new()),
            pages: Arc::new(MemoryCollection::new()),
            blocks: Arc::new(MemoryCollection::new()),
            shares: Arc::new(MemoryCollection::new()),
            comments: Arc::new(MemoryCollection::new()),
            notifications: Arc::new(MemoryCollection::new()),
            favorites: Arc::new(MemoryCollection::new()),
            templates: Arc::new(MemoryCollection::new()),
        }
    }

    fn json_file(data_dir: &Path) -> Self {
        Self {
            workspaces: Arc::new(JsonFileCollection::new(data_dir)),
            members: Arc::new(JsonFileCollection::new(data_dir)),
            pages: Arc::new(JsonFileCollection::new(data_dir)),
            blocks: Arc::new(JsonFileCollection::new(data_dir)),
            shares: Arc::new(JsonFileCollection::new(data_dir)),
            comments: Arc::new(JsonFileCollection::new(data_dir)),
            notifications: Arc::new(JsonFileCollection::new(data_dir)),
            favorites: Arc::new(JsonFileCollection::new(data_dir)),
            templates: Arc::new(JsonFileCollection::new(data_dir)),
        }
    }
}

impl AppState {
    pub fn in_memory() -> Self {
        Self::build(Collections::memory())
    }

    pub fn with_file_backend(data_dir: &Path) -> Self {
        Self::build(Collections::json_file(data_dir))
    }

    pub fn from_config(config: &AppConfig) -> Self {
        match config.storage.backend {
            StorageBackend::Memory => Self::in_memory(),
            StorageBackend::JsonFile => Self::with_file_backend(&config.storage.data_dir),
        }
    }

    fn build(collections: Collections) -> Self {
        let store = DocumentStore::new(
            collections.workspaces.clone(),
            collections.members.clone(),
            collections.pages.clone(),
            collections.blocks.clone(),
            collections.shares.clone(),
            collections.comments.clone(),
            collections.favorites.clone(),
        );
        let gate = AccessGate::new(
            collections.members.clone(),
            collections.pages.clone(),
            collections.shares.clone(),
        );
        let dispatcher = NotificationDispatcher::new(collections.notifications.clone());
        let collab = CollabService::new(
            collections.pages.clone(),
            collections.blocks.clone(),
            collections.comments.clone(),
            collections.notifications.clone(),
            dispatcher,
        );
        let favorites =
            FavoritesService::new(collections.favorites.clone(), collections.pages.clone());
        let templates = TemplatesService::new(collections.templates.clone(), store.clone());

        Self {
            store,
            gate,
            collab,
            favorites,
            templates,
        }
    }
}
