use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use indexmap::IndexMap;
use serde_json::json;
use thiserror::Error;

use crate::coords::MappingError;
use crate::db::StoreError;
use crate::editor::{EditorError, SaveError};
use crate::export::ExportError;
use crate::form::{FieldError, FormErrors};
use crate::pdf::PdfError;
use crate::schema::SchemaError;
use crate::storage::StorageError;

/// Failure of one HTTP request, turned into a JSON error body.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Input(String),

    #[error("{0}")]
    Form(FormErrors),

    #[error("Please sign in as an administrator")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Mapping(#[from] MappingError),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Persistence(String),

    #[error("{0}")]
    Render(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Input(_) | AppError::Form(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Mapping(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Persistence(_) | AppError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn template_not_found() -> Self {
        AppError::NotFound(
            "The certificate template you are looking for does not exist or has been removed."
                .to_string(),
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }

        let fields: IndexMap<String, String> = match &self {
            AppError::Form(errors) => errors
                .0
                .iter()
                .map(|(label, err): (&String, &FieldError)| (label.clone(), err.to_string()))
                .collect(),
            _ => IndexMap::new(),
        };
        let body = json!({
            "success": false,
            "error": self.to_string(),
            "fields": fields,
        });
        (status, Json(body)).into_response()
    }
}

impl From<FormErrors> for AppError {
    fn from(errors: FormErrors) -> Self {
        AppError::Form(errors)
    }
}

impl From<SchemaError> for AppError {
    fn from(err: SchemaError) -> Self {
        AppError::Input(err.to_string())
    }
}

impl From<EditorError> for AppError {
    fn from(err: EditorError) -> Self {
        match err {
            EditorError::FieldNotFound(_) => AppError::NotFound(err.to_string()),
            EditorError::SaveInFlight | EditorError::InvalidState { .. } => {
                AppError::Conflict(err.to_string())
            }
            _ => AppError::Input(err.to_string()),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::TemplateNotFound(_) => AppError::template_not_found(),
            StoreError::SlugTaken(_) => AppError::Conflict(err.to_string()),
            _ => AppError::Persistence(err.to_string()),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Persistence(err.to_string())
    }
}

impl From<SaveError> for AppError {
    fn from(err: SaveError) -> Self {
        match err {
            SaveError::Editor(e) => e.into(),
            SaveError::Store(e) => e.into(),
            SaveError::Upload(e) => e.into(),
        }
    }
}

impl From<PdfError> for AppError {
    fn from(err: PdfError) -> Self {
        AppError::Render(err.to_string())
    }
}

impl From<ExportError> for AppError {
    fn from(err: ExportError) -> Self {
        AppError::Render(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldId;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::from(EditorError::MissingName).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(EditorError::SaveInFlight).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(EditorError::FieldNotFound(FieldId::Draft(3))).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(StoreError::SlugTaken("webinar".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(MappingError::NonFinite).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::from(PdfError::NoFont).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
