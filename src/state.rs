use crate::config::{Config, UPLOADS_PREFIX};
use crate::db::{MemoryStore, RecordStore};
use crate::editor::EditorSessions;
use crate::storage::{LocalStorage, ObjectStorage};
use std::sync::Arc;

pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub storage: Arc<dyn ObjectStorage>,
    pub config: Arc<Config>,
    pub editors: Arc<EditorSessions>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn RecordStore>,
        storage: Arc<dyn ObjectStorage>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            store,
            storage,
            config,
            editors: Arc::new(EditorSessions::new()),
        }
    }

    /// In-memory records with backgrounds stored under the upload folder.
    pub fn in_memory(config: Config) -> Self {
        let storage = LocalStorage::new(config.upload_folder.clone(), UPLOADS_PREFIX);
        Self::new(
            Arc::new(MemoryStore::new()),
            Arc::new(storage),
            Arc::new(config),
        )
    }
}
