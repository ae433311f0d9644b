mod memory;
mod models;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{create_pool, run_migrations, PgStore};

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::schema::{Field, FieldValues, Submission, Template, TemplateMeta};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Template {0} not found")]
    TemplateNotFound(Uuid),

    #[error("The URL alias '{0}' is already taken")]
    SlugTaken(String),

    #[error("Field {field} does not belong to template {template}")]
    ForeignField { field: Uuid, template: Uuid },

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

#[derive(Debug, Clone)]
pub struct NewTemplate {
    pub meta: TemplateMeta,
    pub created_by: String,
}

/// Table-like access to templates, their fields and submissions.
///
/// Implementations must make [`replace_fields`](RecordStore::replace_fields)
/// and [`save_template`](RecordStore::save_template) atomic: either every
/// change is in place or the previous records are untouched.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert_template(&self, new: NewTemplate) -> Result<Template, StoreError>;

    /// Update an existing template's metadata and make `fields` its
    /// complete field list, in one unit.
    async fn save_template(
        &self,
        id: Uuid,
        meta: TemplateMeta,
        fields: Vec<Field>,
    ) -> Result<(Template, Vec<Field>), StoreError>;

    async fn get_template(&self, id: Uuid) -> Result<Option<Template>, StoreError>;

    async fn find_template_by_slug(&self, slug: &str) -> Result<Option<Template>, StoreError>;

    /// Newest first.
    async fn list_templates(&self) -> Result<Vec<Template>, StoreError>;

    /// Deletes the template with its fields and submissions. Returns whether
    /// anything was deleted.
    async fn delete_template(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Fields in their stored order.
    async fn list_fields(&self, template_id: Uuid) -> Result<Vec<Field>, StoreError>;

    /// Make `fields` the template's complete field list.
    ///
    /// Persisted ids are updated in place, draft ids get fresh ids, and
    /// fields missing from the list are deleted. Returns the stored list.
    async fn replace_fields(
        &self,
        template_id: Uuid,
        fields: Vec<Field>,
    ) -> Result<Vec<Field>, StoreError>;

    async fn insert_submission(
        &self,
        template_id: Uuid,
        values: FieldValues,
    ) -> Result<Submission, StoreError>;

    /// Newest first.
    async fn list_submissions(&self, template_id: Uuid) -> Result<Vec<Submission>, StoreError>;
}
