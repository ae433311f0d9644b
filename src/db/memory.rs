use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{NewTemplate, RecordStore, StoreError};
use crate::schema::{Field, FieldId, FieldValues, Submission, Template, TemplateMeta};

#[derive(Default)]
struct Tables {
    /// Insertion order, oldest first.
    templates: Vec<Template>,
    fields: HashMap<Uuid, Vec<Field>>,
    submissions: HashMap<Uuid, Vec<Submission>>,
}

impl Tables {
    fn template_mut(&mut self, id: Uuid) -> Option<&mut Template> {
        self.templates.iter_mut().find(|t| t.id == id)
    }

    /// Persisted ids must already belong to this template or be unused.
    fn check_fields(&self, template_id: Uuid, fields: &[Field]) -> Result<(), StoreError> {
        for id in fields.iter().filter_map(|f| f.id.persisted()) {
            let foreign = self
                .fields
                .iter()
                .filter(|(owner, _)| **owner != template_id)
                .flat_map(|(_, list)| list.iter())
                .any(|f| f.id == FieldId::Persisted(id));
            if foreign {
                return Err(StoreError::ForeignField {
                    field: id,
                    template: template_id,
                });
            }
        }
        Ok(())
    }

    fn store_fields(&mut self, template_id: Uuid, fields: Vec<Field>) -> Vec<Field> {
        let stored: Vec<Field> = fields
            .into_iter()
            .map(|mut field| {
                if field.id.persisted().is_none() {
                    field.id = FieldId::Persisted(Uuid::new_v4());
                }
                field
            })
            .collect();
        self.fields.insert(template_id, stored.clone());
        stored
    }

    fn slug_taken(&self, slug: Option<&str>, except: Option<Uuid>) -> bool {
        slug.is_some_and(|slug| {
            self.templates
                .iter()
                .any(|t| t.slug.as_deref() == Some(slug) && Some(t.id) != except)
        })
    }
}

/// Process-local record store. Data is lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert_template(&self, new: NewTemplate) -> Result<Template, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.slug_taken(new.meta.slug.as_deref(), None) {
            return Err(StoreError::SlugTaken(new.meta.slug.unwrap_or_default()));
        }
        let template = Template {
            id: Uuid::new_v4(),
            name: new.meta.name,
            slug: new.meta.slug,
            background_url: new.meta.background_url,
            created_by: new.created_by,
            created_at: Utc::now(),
        };
        tables.templates.push(template.clone());
        Ok(template)
    }

    async fn save_template(
        &self,
        id: Uuid,
        meta: TemplateMeta,
        fields: Vec<Field>,
    ) -> Result<(Template, Vec<Field>), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.slug_taken(meta.slug.as_deref(), Some(id)) {
            return Err(StoreError::SlugTaken(meta.slug.unwrap_or_default()));
        }
        if tables.template_mut(id).is_none() {
            return Err(StoreError::TemplateNotFound(id));
        }
        tables.check_fields(id, &fields)?;

        let template = tables
            .template_mut(id)
            .ok_or(StoreError::TemplateNotFound(id))?;
        template.name = meta.name;
        template.slug = meta.slug;
        template.background_url = meta.background_url;
        let template = template.clone();
        let stored = tables.store_fields(id, fields);
        Ok((template, stored))
    }

    async fn get_template(&self, id: Uuid) -> Result<Option<Template>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.templates.iter().find(|t| t.id == id).cloned())
    }

    async fn find_template_by_slug(&self, slug: &str) -> Result<Option<Template>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .templates
            .iter()
            .find(|t| t.slug.as_deref() == Some(slug))
            .cloned())
    }

    async fn list_templates(&self) -> Result<Vec<Template>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.templates.iter().rev().cloned().collect())
    }

    async fn delete_template(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.templates.len();
        tables.templates.retain(|t| t.id != id);
        tables.fields.remove(&id);
        tables.submissions.remove(&id);
        Ok(tables.templates.len() != before)
    }

    async fn list_fields(&self, template_id: Uuid) -> Result<Vec<Field>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.fields.get(&template_id).cloned().unwrap_or_default())
    }

    async fn replace_fields(
        &self,
        template_id: Uuid,
        fields: Vec<Field>,
    ) -> Result<Vec<Field>, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.template_mut(template_id).is_none() {
            return Err(StoreError::TemplateNotFound(template_id));
        }

        tables.check_fields(template_id, &fields)?;
        Ok(tables.store_fields(template_id, fields))
    }

    async fn insert_submission(
        &self,
        template_id: Uuid,
        values: FieldValues,
    ) -> Result<Submission, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.template_mut(template_id).is_none() {
            return Err(StoreError::TemplateNotFound(template_id));
        }
        let submission = Submission {
            id: Uuid::new_v4(),
            template_id,
            created_at: Utc::now(),
            values,
        };
        tables
            .submissions
            .entry(template_id)
            .or_default()
            .push(submission.clone());
        Ok(submission)
    }

    async fn list_submissions(&self, template_id: Uuid) -> Result<Vec<Submission>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .submissions
            .get(&template_id)
            .map(|list| list.iter().rev().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_template(name: &str, slug: Option<&str>) -> NewTemplate {
        NewTemplate {
            meta: TemplateMeta {
                name: name.to_string(),
                slug: slug.map(str::to_string),
                background_url: "/uploads/bg.png".to_string(),
            },
            created_by: "admin".to_string(),
        }
    }

    #[tokio::test]
    async fn test_replace_fields_upserts_and_deletes() {
        let store = MemoryStore::new();
        let template = store.insert_template(new_template("A", None)).await.unwrap();

        let first = store
            .replace_fields(
                template.id,
                vec![
                    Field::draft(FieldId::Draft(1), "Name", 1.0, 1.0),
                    Field::draft(FieldId::Draft(2), "Date", 1.0, 2.0),
                ],
            )
            .await
            .unwrap();
        assert!(first.iter().all(|f| f.id.persisted().is_some()));

        // Keep "Name" (renamed), drop "Date", add "Email".
        let mut kept = first[0].clone();
        kept.label = "Full name".into();
        let second = store
            .replace_fields(
                template.id,
                vec![kept.clone(), Field::draft(FieldId::Draft(3), "Email", 1.0, 3.0)],
            )
            .await
            .unwrap();
        assert_eq!(second.len(), 2);
        assert_eq!(second[0].id, kept.id);
        assert_eq!(second[0].label, "Full name");
        assert_eq!(store.list_fields(template.id).await.unwrap(), second);
    }

    #[tokio::test]
    async fn test_foreign_field_id_rejected_without_changes() {
        let store = MemoryStore::new();
        let a = store.insert_template(new_template("A", None)).await.unwrap();
        let b = store.insert_template(new_template("B", None)).await.unwrap();
        let a_fields = store
            .replace_fields(a.id, vec![Field::draft(FieldId::Draft(1), "Name", 0.0, 0.0)])
            .await
            .unwrap();
        store
            .replace_fields(b.id, vec![Field::draft(FieldId::Draft(1), "Other", 0.0, 0.0)])
            .await
            .unwrap();

        let result = store.replace_fields(b.id, a_fields.clone()).await;
        assert!(matches!(result, Err(StoreError::ForeignField { .. })));
        assert_eq!(store.list_fields(b.id).await.unwrap()[0].label, "Other");
    }

    #[tokio::test]
    async fn test_rejected_save_leaves_template_untouched() {
        let store = MemoryStore::new();
        let a = store.insert_template(new_template("A", None)).await.unwrap();
        let b = store.insert_template(new_template("B", None)).await.unwrap();
        let a_fields = store
            .replace_fields(a.id, vec![Field::draft(FieldId::Draft(1), "Name", 0.0, 0.0)])
            .await
            .unwrap();
        let b_fields = store
            .replace_fields(b.id, vec![Field::draft(FieldId::Draft(1), "Other", 0.0, 0.0)])
            .await
            .unwrap();

        let meta = TemplateMeta {
            name: "Renamed".into(),
            slug: Some("renamed".into()),
            background_url: "/uploads/other.png".into(),
        };
        let result = store.save_template(b.id, meta, a_fields).await;
        assert!(matches!(result, Err(StoreError::ForeignField { .. })));

        let b_after = store.get_template(b.id).await.unwrap().unwrap();
        assert_eq!(b_after, b);
        assert_eq!(store.list_fields(b.id).await.unwrap(), b_fields);
        assert!(store.find_template_by_slug("renamed").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_slug_uniqueness() {
        let store = MemoryStore::new();
        let a = store
            .insert_template(new_template("A", Some("webinar")))
            .await
            .unwrap();
        assert!(matches!(
            store.insert_template(new_template("B", Some("webinar"))).await,
            Err(StoreError::SlugTaken(_))
        ));
        // Re-saving the owner with its own slug is fine.
        let meta = TemplateMeta {
            name: "A2".into(),
            slug: Some("webinar".into()),
            background_url: a.background_url.clone(),
        };
        let (saved, _) = store.save_template(a.id, meta, Vec::new()).await.unwrap();
        assert_eq!(saved.name, "A2");
        assert_eq!(
            store.find_template_by_slug("webinar").await.unwrap().map(|t| t.id),
            Some(a.id)
        );
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let store = MemoryStore::new();
        let t = store.insert_template(new_template("A", None)).await.unwrap();
        store
            .replace_fields(t.id, vec![Field::draft(FieldId::Draft(1), "Name", 0.0, 0.0)])
            .await
            .unwrap();
        let mut values = FieldValues::new();
        values.insert("Name".into(), "Jane".into());
        store.insert_submission(t.id, values).await.unwrap();

        assert!(store.delete_template(t.id).await.unwrap());
        assert!(!store.delete_template(t.id).await.unwrap());
        assert!(store.list_fields(t.id).await.unwrap().is_empty());
        assert!(store.list_submissions(t.id).await.unwrap().is_empty());
        assert!(matches!(
            store.insert_submission(t.id, FieldValues::new()).await,
            Err(StoreError::TemplateNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_submissions_newest_first() {
        let store = MemoryStore::new();
        let t = store.insert_template(new_template("A", None)).await.unwrap();
        for name in ["first", "second"] {
            let mut values = FieldValues::new();
            values.insert("Name".into(), name.into());
            store.insert_submission(t.id, values).await.unwrap();
        }
        let listed = store.list_submissions(t.id).await.unwrap();
        assert_eq!(listed[0].values["Name"], "second");
        assert_eq!(listed[1].values["Name"], "first");
    }
}
