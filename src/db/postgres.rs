use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use std::sync::Arc;
use uuid::Uuid;

use super::models::{FieldRow, SubmissionRow, TemplateRow};
use super::{NewTemplate, RecordStore, StoreError};
use crate::schema::{Field, FieldValues, Submission, Template, TemplateMeta};

pub type DbPool = Arc<PgPool>;

pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(Arc::new(pool))
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Record store backed by PostgreSQL.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn slug_conflict(err: sqlx::Error, slug: Option<&str>) -> StoreError {
    if let (Some(slug), Some(db)) = (slug, err.as_database_error()) {
        if db.is_unique_violation() {
            return StoreError::SlugTaken(slug.to_string());
        }
    }
    StoreError::Database(err)
}

/// Upsert `fields` in list order and delete the template's other fields.
/// Runs on the caller's transaction.
async fn write_fields(
    conn: &mut PgConnection,
    template_id: Uuid,
    fields: &[Field],
) -> Result<Vec<Field>, StoreError> {
    let keep: Vec<Uuid> = fields.iter().filter_map(|f| f.id.persisted()).collect();
    sqlx::query("DELETE FROM template_fields WHERE template_id = $1 AND NOT (id = ANY($2))")
        .bind(template_id)
        .bind(keep)
        .execute(&mut *conn)
        .await?;

    for (position, field) in fields.iter().enumerate() {
        let id = field.id.persisted().unwrap_or_else(Uuid::new_v4);
        let result = sqlx::query(
            r#"
            INSERT INTO template_fields (
                id, template_id, position, label, type, placeholder, is_required,
                x_coordinate, y_coordinate, font_size, color, width, alignment,
                is_center_x, is_visible_on_certificate
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (id) DO UPDATE SET
                position = EXCLUDED.position,
                label = EXCLUDED.label,
                type = EXCLUDED.type,
                placeholder = EXCLUDED.placeholder,
                is_required = EXCLUDED.is_required,
                x_coordinate = EXCLUDED.x_coordinate,
                y_coordinate = EXCLUDED.y_coordinate,
                font_size = EXCLUDED.font_size,
                color = EXCLUDED.color,
                width = EXCLUDED.width,
                alignment = EXCLUDED.alignment,
                is_center_x = EXCLUDED.is_center_x,
                is_visible_on_certificate = EXCLUDED.is_visible_on_certificate
            WHERE template_fields.template_id = EXCLUDED.template_id
            "#,
        )
        .bind(id)
        .bind(template_id)
        .bind(position as i32)
        .bind(&field.label)
        .bind(field.input_type.as_str())
        .bind(&field.placeholder)
        .bind(field.is_required)
        .bind(field.x)
        .bind(field.y)
        .bind(field.font_size as i32)
        .bind(field.color.as_str())
        .bind(field.width)
        .bind(field.alignment.as_str())
        .bind(field.is_center_x)
        .bind(field.is_visible)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            // Dropping the transaction rolls everything back.
            return Err(StoreError::ForeignField {
                field: id,
                template: template_id,
            });
        }
    }

    let rows = sqlx::query_as::<_, FieldRow>(
        "SELECT * FROM template_fields WHERE template_id = $1 ORDER BY position",
    )
    .bind(template_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(Field::try_from).collect()
}

#[async_trait]
impl RecordStore for PgStore {
    async fn insert_template(&self, new: NewTemplate) -> Result<Template, StoreError> {
        let row = sqlx::query_as::<_, TemplateRow>(
            r#"
            INSERT INTO templates (id, name, slug, background_image_url, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.meta.name)
        .bind(&new.meta.slug)
        .bind(&new.meta.background_url)
        .bind(&new.created_by)
        .fetch_one(self.pool.as_ref())
        .await
        .map_err(|e| slug_conflict(e, new.meta.slug.as_deref()))?;

        Ok(row.into())
    }

    async fn save_template(
        &self,
        id: Uuid,
        meta: TemplateMeta,
        fields: Vec<Field>,
    ) -> Result<(Template, Vec<Field>), StoreError> {
        let mut tx = self.pool.begin().await?;

        // The UPDATE also takes the row lock for the field writes.
        let row = sqlx::query_as::<_, TemplateRow>(
            r#"
            UPDATE templates
            SET name = $2, slug = $3, background_image_url = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&meta.name)
        .bind(&meta.slug)
        .bind(&meta.background_url)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| slug_conflict(e, meta.slug.as_deref()))?
        .ok_or(StoreError::TemplateNotFound(id))?;

        let fields = write_fields(&mut *tx, id, &fields).await?;
        tx.commit().await?;
        Ok((row.into(), fields))
    }

    async fn get_template(&self, id: Uuid) -> Result<Option<Template>, StoreError> {
        let row = sqlx::query_as::<_, TemplateRow>("SELECT * FROM templates WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;
        Ok(row.map(Template::from))
    }

    async fn find_template_by_slug(&self, slug: &str) -> Result<Option<Template>, StoreError> {
        let row = sqlx::query_as::<_, TemplateRow>("SELECT * FROM templates WHERE slug = $1")
            .bind(slug)
            .fetch_optional(self.pool.as_ref())
            .await?;
        Ok(row.map(Template::from))
    }

    async fn list_templates(&self) -> Result<Vec<Template>, StoreError> {
        let rows =
            sqlx::query_as::<_, TemplateRow>("SELECT * FROM templates ORDER BY created_at DESC")
                .fetch_all(self.pool.as_ref())
                .await?;
        Ok(rows.into_iter().map(Template::from).collect())
    }

    async fn delete_template(&self, id: Uuid) -> Result<bool, StoreError> {
        // Fields and submissions go with it (ON DELETE CASCADE).
        let result = sqlx::query("DELETE FROM templates WHERE id = $1")
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_fields(&self, template_id: Uuid) -> Result<Vec<Field>, StoreError> {
        let rows = sqlx::query_as::<_, FieldRow>(
            "SELECT * FROM template_fields WHERE template_id = $1 ORDER BY position",
        )
        .bind(template_id)
        .fetch_all(self.pool.as_ref())
        .await?;
        rows.into_iter().map(Field::try_from).collect()
    }

    async fn replace_fields(
        &self,
        template_id: Uuid,
        fields: Vec<Field>,
    ) -> Result<Vec<Field>, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent saves of the same template.
        let exists = sqlx::query("SELECT id FROM templates WHERE id = $1 FOR UPDATE")
            .bind(template_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(StoreError::TemplateNotFound(template_id));
        }

        let fields = write_fields(&mut *tx, template_id, &fields).await?;
        tx.commit().await?;
        Ok(fields)
    }

    async fn insert_submission(
        &self,
        template_id: Uuid,
        values: FieldValues,
    ) -> Result<Submission, StoreError> {
        let row = sqlx::query_as::<_, SubmissionRow>(
            r#"
            INSERT INTO generated_certificates (id, template_id, user_data)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(template_id)
        .bind(Json(&values))
        .fetch_one(self.pool.as_ref())
        .await
        .map_err(|e| {
            let missing_template = e
                .as_database_error()
                .is_some_and(|db| db.is_foreign_key_violation());
            if missing_template {
                StoreError::TemplateNotFound(template_id)
            } else {
                StoreError::Database(e)
            }
        })?;

        Ok(row.into())
    }

    async fn list_submissions(&self, template_id: Uuid) -> Result<Vec<Submission>, StoreError> {
        let rows = sqlx::query_as::<_, SubmissionRow>(
            r#"
            SELECT * FROM generated_certificates
            WHERE template_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(template_id)
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(rows.into_iter().map(Submission::from).collect())
    }
}
