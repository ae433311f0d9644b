use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::StoreError;
use crate::schema::{Field, FieldId, FieldValues, Submission, Template};

#[derive(Debug, FromRow)]
pub struct TemplateRow {
    pub id: Uuid,
    pub name: String,
    pub slug: Option<String>,
    pub background_image_url: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl From<TemplateRow> for Template {
    fn from(row: TemplateRow) -> Self {
        Template {
            id: row.id,
            name: row.name,
            slug: row.slug,
            background_url: row.background_image_url,
            created_by: row.created_by,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct FieldRow {
    pub id: Uuid,
    pub label: String,
    #[sqlx(rename = "type")]
    pub input_type: String,
    pub placeholder: Option<String>,
    pub is_required: bool,
    pub x_coordinate: f64,
    pub y_coordinate: f64,
    pub font_size: i32,
    pub color: String,
    pub width: Option<f64>,
    pub alignment: String,
    pub is_center_x: bool,
    pub is_visible_on_certificate: bool,
}

impl TryFrom<FieldRow> for Field {
    type Error = StoreError;

    fn try_from(row: FieldRow) -> Result<Self, Self::Error> {
        let corrupt = |what: String| StoreError::Corrupt(format!("field {}: {}", row.id, what));
        Ok(Field {
            id: FieldId::Persisted(row.id),
            input_type: row.input_type.parse().map_err(corrupt)?,
            alignment: row.alignment.parse().map_err(corrupt)?,
            color: row.color.parse().map_err(|e| corrupt(format!("{}", e)))?,
            font_size: u32::try_from(row.font_size)
                .map_err(|_| corrupt(format!("negative font size {}", row.font_size)))?,
            label: row.label,
            placeholder: row.placeholder,
            is_required: row.is_required,
            x: row.x_coordinate,
            y: row.y_coordinate,
            width: row.width,
            is_center_x: row.is_center_x,
            is_visible: row.is_visible_on_certificate,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct SubmissionRow {
    pub id: Uuid,
    pub template_id: Uuid,
    pub user_data: Json<FieldValues>,
    pub created_at: DateTime<Utc>,
}

impl From<SubmissionRow> for Submission {
    fn from(row: SubmissionRow) -> Self {
        Submission {
            id: row.id,
            template_id: row.template_id,
            created_at: row.created_at,
            values: row.user_data.0,
        }
    }
}
