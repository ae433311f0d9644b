//! # Template Editor
//!
//! In-memory draft of one template: name, alias, background asset and an
//! ordered list of fields.
//!
//! ```text
//! Empty --set_background--> Draft --begin_save--> Saving --finish_save--> Saved (new template)
//!                             ^                     |    \-finish_save--> Draft (existing template)
//!                             +------abort_save-----+
//! ```
//!
//! Persistence itself lives in [`save`]; the editor only hands out a
//! [`SavePlan`] snapshot and records the outcome, so no lock is held while
//! the record store is busy.

pub mod save;
pub mod session;

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::coords::{NaturalPoint, NaturalSize};
use crate::schema::{
    self, is_valid_slug, normalize_slug, Field, FieldId, FieldUpdate, SchemaError, Template,
};

pub use save::{save_editor, SaveError, SaveFailure, SavedTemplate};
pub use session::EditorSessions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorState {
    Empty,
    Draft,
    Saving,
    Saved,
}

impl fmt::Display for EditorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EditorState::Empty => "empty",
            EditorState::Draft => "draft",
            EditorState::Saving => "saving",
            EditorState::Saved => "saved",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EditorError {
    #[error("Cannot {op} while the editor is {state}")]
    InvalidState { op: &'static str, state: EditorState },

    #[error("Field {0} not found")]
    FieldNotFound(FieldId),

    #[error("Please provide a template name")]
    MissingName,

    #[error("Please provide a background image")]
    MissingBackground,

    #[error("Invalid URL alias '{0}': use lowercase letters, digits and dashes")]
    InvalidSlug(String),

    #[error("A save is already in progress")]
    SaveInFlight,

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// The certificate background as known to the editor.
#[derive(Debug, Clone, PartialEq)]
pub enum BackgroundAsset {
    /// Already in object storage.
    Published { url: String },
    /// Chosen in this session, uploaded on save.
    Pending {
        file_name: String,
        content_type: String,
        bytes: Arc<[u8]>,
        natural: NaturalSize,
    },
}

/// Everything a save needs, captured when the save starts.
#[derive(Debug, Clone)]
pub struct SavePlan {
    pub template_id: Option<Uuid>,
    pub name: String,
    pub slug: Option<String>,
    pub background: BackgroundAsset,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone)]
pub struct TemplateEditor {
    state: EditorState,
    template_id: Option<Uuid>,
    name: String,
    slug: Option<String>,
    background: Option<BackgroundAsset>,
    fields: Vec<Field>,
    next_draft: u32,
    /// Set for editors started from scratch, until their first successful
    /// save. A retry after a partial first save still ends in `Saved`.
    creating: bool,
}

impl Default for TemplateEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEditor {
    /// Editor for a brand-new template.
    pub fn new() -> Self {
        Self {
            state: EditorState::Empty,
            template_id: None,
            name: String::new(),
            slug: None,
            background: None,
            fields: Vec::new(),
            next_draft: 1,
            creating: true,
        }
    }

    /// Editor seeded from a persisted template and its fields.
    pub fn load(template: &Template, fields: Vec<Field>) -> Self {
        Self {
            state: EditorState::Draft,
            template_id: Some(template.id),
            name: template.name.clone(),
            slug: template.slug.clone(),
            background: Some(BackgroundAsset::Published {
                url: template.background_url.clone(),
            }),
            fields,
            next_draft: 1,
            creating: false,
        }
    }

    pub fn state(&self) -> EditorState {
        self.state
    }

    pub fn template_id(&self) -> Option<Uuid> {
        self.template_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn slug(&self) -> Option<&str> {
        self.slug.as_deref()
    }

    pub fn background(&self) -> Option<&BackgroundAsset> {
        self.background.as_ref()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, id: FieldId) -> Option<&Field> {
        self.fields.iter().find(|f| f.id == id)
    }

    fn require(&self, op: &'static str, allowed: &[EditorState]) -> Result<(), EditorError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(EditorError::InvalidState {
                op,
                state: self.state,
            })
        }
    }

    fn index_of(&self, id: FieldId) -> Result<usize, EditorError> {
        self.fields
            .iter()
            .position(|f| f.id == id)
            .ok_or(EditorError::FieldNotFound(id))
    }

    pub fn set_name(&mut self, name: &str) -> Result<(), EditorError> {
        self.require("rename", &[EditorState::Empty, EditorState::Draft])?;
        self.name = name.trim().to_string();
        Ok(())
    }

    /// Set or clear the URL alias. Whitespace becomes '-', letters are lowercased.
    pub fn set_slug(&mut self, raw: &str) -> Result<(), EditorError> {
        self.require("change the alias", &[EditorState::Empty, EditorState::Draft])?;
        let slug = normalize_slug(raw);
        if let Some(slug) = &slug {
            if !is_valid_slug(slug) {
                return Err(EditorError::InvalidSlug(slug.clone()));
            }
        }
        self.slug = slug;
        Ok(())
    }

    /// Choose or replace the background.
    ///
    /// Existing field positions are kept as they are, even if the new image
    /// has different dimensions.
    pub fn set_background(&mut self, asset: BackgroundAsset) -> Result<(), EditorError> {
        self.require("change the background", &[EditorState::Empty, EditorState::Draft])?;
        self.background = Some(asset);
        self.state = EditorState::Draft;
        Ok(())
    }

    /// Append a default-styled field at a natural-space point.
    pub fn add_field_at(&mut self, at: NaturalPoint) -> Result<&Field, EditorError> {
        self.require("add a field", &[EditorState::Draft])?;
        schema::check_coordinate(at.x)?;
        schema::check_coordinate(at.y)?;

        let id = FieldId::Draft(self.next_draft);
        self.next_draft += 1;
        let label = format!("Field {}", self.fields.len() + 1);
        self.fields.push(Field::draft(id, label, at.x, at.y));
        tracing::debug!(field = %id, x = at.x, y = at.y, "Field added");
        Ok(&self.fields[self.fields.len() - 1])
    }

    /// Apply updates to one field. Either all of them apply or none do.
    pub fn update_field(
        &mut self,
        id: FieldId,
        updates: Vec<FieldUpdate>,
    ) -> Result<&Field, EditorError> {
        self.require("update a field", &[EditorState::Draft])?;
        let index = self.index_of(id)?;
        let mut next = self.fields[index].clone();
        for update in updates {
            next.apply(update)?;
        }
        self.fields[index] = next;
        Ok(&self.fields[index])
    }

    pub fn remove_field(&mut self, id: FieldId) -> Result<Field, EditorError> {
        self.require("remove a field", &[EditorState::Draft])?;
        let index = self.index_of(id)?;
        Ok(self.fields.remove(index))
    }

    /// Validate the draft and move to `Saving`.
    pub fn begin_save(&mut self) -> Result<SavePlan, EditorError> {
        if self.state == EditorState::Saving {
            return Err(EditorError::SaveInFlight);
        }
        self.require("save", &[EditorState::Draft])?;
        if self.name.is_empty() {
            return Err(EditorError::MissingName);
        }
        let background = self
            .background
            .clone()
            .ok_or(EditorError::MissingBackground)?;
        schema::validate_fields(&self.fields)?;

        self.state = EditorState::Saving;
        Ok(SavePlan {
            template_id: self.template_id,
            name: self.name.clone(),
            slug: self.slug.clone(),
            background,
            fields: self.fields.clone(),
        })
    }

    /// Record a successful save. Persisted ids replace the draft ids.
    pub fn finish_save(&mut self, saved: &SavedTemplate) {
        self.template_id = Some(saved.template.id);
        self.name = saved.template.name.clone();
        self.slug = saved.template.slug.clone();
        self.background = Some(BackgroundAsset::Published {
            url: saved.template.background_url.clone(),
        });
        self.fields = saved.fields.clone();
        self.state = if self.creating {
            EditorState::Saved
        } else {
            EditorState::Draft
        };
        self.creating = false;
    }

    /// Return to `Draft` after a failed save, keeping whatever did persist
    /// so a retry neither re-uploads the background nor creates a second
    /// template.
    pub fn abort_save(&mut self, failure: &SaveFailure) {
        if let Some(id) = failure.template_id {
            self.template_id = Some(id);
        }
        if let Some(url) = &failure.background_url {
            self.background = Some(BackgroundAsset::Published { url: url.clone() });
        }
        self.state = EditorState::Draft;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::InputType;
    use pretty_assertions::assert_eq;

    fn published() -> BackgroundAsset {
        BackgroundAsset::Published {
            url: "/uploads/bg.png".into(),
        }
    }

    fn draft_editor() -> TemplateEditor {
        let mut editor = TemplateEditor::new();
        editor.set_background(published()).unwrap();
        editor
    }

    fn at(x: f64, y: f64) -> NaturalPoint {
        NaturalPoint { x, y }
    }

    #[test]
    fn test_background_moves_empty_to_draft() {
        let mut editor = TemplateEditor::new();
        assert_eq!(editor.state(), EditorState::Empty);
        assert!(matches!(
            editor.add_field_at(at(1.0, 1.0)),
            Err(EditorError::InvalidState { .. })
        ));
        editor.set_background(published()).unwrap();
        assert_eq!(editor.state(), EditorState::Draft);
    }

    #[test]
    fn test_add_field_labels_and_defaults() {
        let mut editor = draft_editor();
        for n in 0..4 {
            assert_eq!(editor.fields().len(), n);
            let field = editor.add_field_at(at(10.0 * n as f64, 20.0)).unwrap();
            assert_eq!(field.label, format!("Field {}", n + 1));
            assert_eq!(field.font_size, 16);
            assert_eq!(field.color.as_str(), "#000000");
            assert_eq!(field.input_type, InputType::Text);
            assert!(field.is_required && field.is_visible && !field.is_center_x);
        }
        assert_eq!(editor.fields().len(), 4);
    }

    #[test]
    fn test_draft_ids_are_unique_after_removal() {
        let mut editor = draft_editor();
        let first = editor.add_field_at(at(1.0, 1.0)).unwrap().id;
        editor.remove_field(first).unwrap();
        let second = editor.add_field_at(at(1.0, 1.0)).unwrap().id;
        assert_ne!(first, second);
    }

    #[test]
    fn test_remove_then_update_is_not_found() {
        let mut editor = draft_editor();
        let id = editor.add_field_at(at(5.0, 5.0)).unwrap().id;
        editor.add_field_at(at(6.0, 6.0)).unwrap();
        editor.remove_field(id).unwrap();

        let before = editor.fields().to_vec();
        assert_eq!(
            editor.update_field(id, vec![FieldUpdate::Label("Name".into())]),
            Err(EditorError::FieldNotFound(id))
        );
        assert_eq!(editor.remove_field(id), Err(EditorError::FieldNotFound(id)));
        assert_eq!(editor.fields(), &before[..]);
    }

    #[test]
    fn test_update_is_all_or_nothing() {
        let mut editor = draft_editor();
        let id = editor.add_field_at(at(5.0, 5.0)).unwrap().id;
        let result = editor.update_field(
            id,
            vec![FieldUpdate::Label("Name".into()), FieldUpdate::FontSize(0)],
        );
        assert!(result.is_err());
        assert_eq!(editor.field(id).unwrap().label, "Field 1");
    }

    #[test]
    fn test_background_swap_keeps_positions() {
        let mut editor = draft_editor();
        editor.add_field_at(at(300.0, 200.0)).unwrap();
        editor
            .set_background(BackgroundAsset::Published {
                url: "/uploads/other.png".into(),
            })
            .unwrap();
        assert_eq!(editor.fields()[0].x, 300.0);
        assert_eq!(editor.fields()[0].y, 200.0);
    }

    #[test]
    fn test_begin_save_requires_name_and_unique_labels() {
        let mut editor = draft_editor();
        assert_eq!(editor.begin_save().unwrap_err(), EditorError::MissingName);

        editor.set_name("Webinar").unwrap();
        let a = editor.add_field_at(at(1.0, 1.0)).unwrap().id;
        editor.add_field_at(at(1.0, 2.0)).unwrap();
        editor
            .update_field(a, vec![FieldUpdate::Label("Field 2".into())])
            .unwrap();
        assert_eq!(
            editor.begin_save().unwrap_err(),
            EditorError::Schema(SchemaError::DuplicateLabel("Field 2".into()))
        );
        assert_eq!(editor.state(), EditorState::Draft);
    }

    #[test]
    fn test_saving_blocks_edits_and_second_save() {
        let mut editor = draft_editor();
        editor.set_name("Webinar").unwrap();
        let plan = editor.begin_save().unwrap();
        assert_eq!(plan.template_id, None);
        assert_eq!(editor.state(), EditorState::Saving);
        assert_eq!(editor.begin_save().unwrap_err(), EditorError::SaveInFlight);
        assert!(editor.add_field_at(at(1.0, 1.0)).is_err());
    }

    #[test]
    fn test_new_template_retry_still_ends_saved() {
        let mut editor = draft_editor();
        editor.set_name("Webinar").unwrap();
        editor.begin_save().unwrap();

        // The first attempt created the row, then failed.
        let id = Uuid::new_v4();
        editor.abort_save(&SaveFailure {
            template_id: Some(id),
            background_url: None,
        });
        let plan = editor.begin_save().unwrap();
        assert_eq!(plan.template_id, Some(id));

        let template = Template {
            id,
            name: plan.name.clone(),
            slug: None,
            background_url: "/uploads/bg.png".into(),
            created_by: "admin".into(),
            created_at: chrono::Utc::now(),
        };
        editor.finish_save(&SavedTemplate {
            template,
            fields: Vec::new(),
        });
        assert_eq!(editor.state(), EditorState::Saved);
    }

    #[test]
    fn test_loaded_template_returns_to_draft_after_save() {
        let template = Template {
            id: Uuid::new_v4(),
            name: "Webinar".into(),
            slug: None,
            background_url: "/uploads/bg.png".into(),
            created_by: "admin".into(),
            created_at: chrono::Utc::now(),
        };
        let mut editor = TemplateEditor::load(&template, Vec::new());
        editor.begin_save().unwrap();
        editor.finish_save(&SavedTemplate {
            template,
            fields: Vec::new(),
        });
        assert_eq!(editor.state(), EditorState::Draft);
    }

    #[test]
    fn test_slug_is_normalized() {
        let mut editor = TemplateEditor::new();
        editor.set_slug("Spring Webinar").unwrap();
        assert_eq!(editor.slug(), Some("spring-webinar"));
        editor.set_slug("").unwrap();
        assert_eq!(editor.slug(), None);
        assert!(matches!(
            editor.set_slug("a/b"),
            Err(EditorError::InvalidSlug(_))
        ));
    }
}
