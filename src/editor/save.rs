use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{BackgroundAsset, EditorError, SavePlan, TemplateEditor};
use crate::db::{NewTemplate, RecordStore, StoreError};
use crate::schema::{Field, Template, TemplateMeta};
use crate::storage::{generate_object_name, ObjectStorage, StorageError};

#[derive(Debug, Error)]
pub enum SaveError {
    #[error(transparent)]
    Editor(#[from] EditorError),

    #[error("Could not upload the background: {0}")]
    Upload(#[from] StorageError),

    #[error("Could not save the template: {0}")]
    Store(#[from] StoreError),
}

/// What had already been persisted when a save failed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveFailure {
    /// Set when the template row was created before the failure.
    pub template_id: Option<Uuid>,
    /// Set when a pending background was uploaded before the failure.
    pub background_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SavedTemplate {
    pub template: Template,
    pub fields: Vec<Field>,
}

/// Upload the background if needed, then write the template with its
/// fields. On error, reports how far it got.
pub async fn persist(
    plan: SavePlan,
    created_by: &str,
    store: &dyn RecordStore,
    storage: &dyn ObjectStorage,
) -> Result<SavedTemplate, (SaveError, SaveFailure)> {
    let mut progress = SaveFailure::default();

    let background_url = match plan.background {
        BackgroundAsset::Published { url } => url,
        BackgroundAsset::Pending {
            file_name, bytes, ..
        } => {
            let name = generate_object_name(&file_name);
            let url = storage
                .upload(&name, &bytes)
                .await
                .map_err(|e| (SaveError::from(e), progress.clone()))?;
            progress.background_url = Some(url.clone());
            url
        }
    };

    let meta = TemplateMeta {
        name: plan.name,
        slug: plan.slug,
        background_url,
    };
    let (template, fields) = match plan.template_id {
        // Metadata and fields change together or not at all.
        Some(id) => store
            .save_template(id, meta, plan.fields)
            .await
            .map_err(|e| (SaveError::from(e), progress))?,
        None => {
            let template = store
                .insert_template(NewTemplate {
                    meta,
                    created_by: created_by.to_string(),
                })
                .await
                .map_err(|e| (SaveError::from(e), progress.clone()))?;
            progress.template_id = Some(template.id);
            let fields = store
                .replace_fields(template.id, plan.fields)
                .await
                .map_err(|e| (SaveError::from(e), progress))?;
            (template, fields)
        }
    };

    Ok(SavedTemplate { template, fields })
}

/// Save one editor session.
///
/// The editor lock is only taken to start and to settle the save, so other
/// requests on the session see `Saving` instead of blocking on the store.
pub async fn save_editor(
    editor: &Mutex<TemplateEditor>,
    created_by: &str,
    store: &dyn RecordStore,
    storage: &dyn ObjectStorage,
) -> Result<SavedTemplate, SaveError> {
    let plan = editor.lock().await.begin_save()?;
    let field_count = plan.fields.len();

    match persist(plan, created_by, store, storage).await {
        Ok(saved) => {
            editor.lock().await.finish_save(&saved);
            tracing::info!(
                template = %saved.template.id,
                fields = field_count,
                "Template saved"
            );
            Ok(saved)
        }
        Err((err, failure)) => {
            editor.lock().await.abort_save(&failure);
            tracing::warn!(
                error = %err,
                template = ?failure.template_id,
                "Template save failed"
            );
            Err(err)
        }
    }
}
