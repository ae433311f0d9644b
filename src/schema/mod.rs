//! # Field Schema
//!
//! The single description of a certificate template that drives the admin
//! editor, the end-user form and the document renderer.
//!
//! Positions (`x`, `y`) live in the natural pixel space of the background
//! asset. `y` always anchors the top of the text; `x` is ignored when the
//! field is centered across the page.

mod color;
mod update;

pub use color::HexColor;
pub use update::FieldUpdate;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

pub const DEFAULT_FONT_SIZE: u32 = 16;
pub const MAX_FONT_SIZE: u32 = 200;

/// Submitted values keyed by field label, in form order.
pub type FieldValues = IndexMap<String, String>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("Invalid color '{0}': expected #rgb or #rrggbb")]
    InvalidColor(String),

    #[error("Field label cannot be empty")]
    EmptyLabel,

    #[error("Duplicate field label '{0}'")]
    DuplicateLabel(String),

    #[error("Font size {0} is out of range (1-200)")]
    FontSize(u32),

    #[error("Invalid coordinate {0}: must be a finite, non-negative number")]
    Coordinate(f64),

    #[error("Invalid width {0}: must be a finite, positive number")]
    Width(f64),

    #[error("Invalid field id '{0}'")]
    FieldId(String),
}

/// Identifier of a field.
///
/// Fields created in the editor carry a `Draft` id until the template is
/// saved; the record store then assigns `Persisted` ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldId {
    Draft(u32),
    Persisted(Uuid),
}

impl FieldId {
    pub fn persisted(&self) -> Option<Uuid> {
        match self {
            FieldId::Persisted(id) => Some(*id),
            FieldId::Draft(_) => None,
        }
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldId::Draft(n) => write!(f, "draft-{}", n),
            FieldId::Persisted(id) => write!(f, "{}", id),
        }
    }
}

impl FromStr for FieldId {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(n) = s.strip_prefix("draft-") {
            return n
                .parse()
                .map(FieldId::Draft)
                .map_err(|_| SchemaError::FieldId(s.to_string()));
        }
        Uuid::parse_str(s)
            .map(FieldId::Persisted)
            .map_err(|_| SchemaError::FieldId(s.to_string()))
    }
}

impl Serialize for FieldId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FieldId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    #[default]
    Text,
    Date,
    Email,
    Number,
}

impl InputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::Text => "text",
            InputType::Date => "date",
            InputType::Email => "email",
            InputType::Number => "number",
        }
    }
}

impl FromStr for InputType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(InputType::Text),
            "date" => Ok(InputType::Date),
            "email" => Ok(InputType::Email),
            "number" => Ok(InputType::Number),
            other => Err(format!("unknown input type '{}'", other)),
        }
    }
}

/// Horizontal alignment of text inside a fixed-width field box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

impl Alignment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
        }
    }
}

impl FromStr for Alignment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(Alignment::Left),
            "center" => Ok(Alignment::Center),
            "right" => Ok(Alignment::Right),
            other => Err(format!("unknown alignment '{}'", other)),
        }
    }
}

/// One placeable, styled text element of a certificate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub id: FieldId,
    pub label: String,
    #[serde(rename = "type")]
    pub input_type: InputType,
    #[serde(default)]
    pub placeholder: Option<String>,
    pub is_required: bool,
    pub x: f64,
    pub y: f64,
    pub font_size: u32,
    pub color: HexColor,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub alignment: Alignment,
    #[serde(default)]
    pub is_center_x: bool,
    #[serde(default = "default_visible")]
    pub is_visible: bool,
}

fn default_visible() -> bool {
    true
}

impl Field {
    /// A freshly placed field with the editor's default style.
    pub fn draft(id: FieldId, label: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            id,
            label: label.into(),
            input_type: InputType::Text,
            placeholder: None,
            is_required: true,
            x,
            y,
            font_size: DEFAULT_FONT_SIZE,
            color: HexColor::black(),
            width: None,
            alignment: Alignment::Left,
            is_center_x: false,
            is_visible: true,
        }
    }

    /// Check the per-field invariants that do not depend on sibling fields.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.label.trim().is_empty() {
            return Err(SchemaError::EmptyLabel);
        }
        check_coordinate(self.x)?;
        check_coordinate(self.y)?;
        if self.font_size == 0 || self.font_size > MAX_FONT_SIZE {
            return Err(SchemaError::FontSize(self.font_size));
        }
        if let Some(width) = self.width {
            if !width.is_finite() || width <= 0.0 {
                return Err(SchemaError::Width(width));
            }
        }
        Ok(())
    }
}

pub(crate) fn check_coordinate(value: f64) -> Result<(), SchemaError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SchemaError::Coordinate(value))
    }
}

/// Validate a whole field list: every field on its own, plus label uniqueness.
///
/// Labels key the submitted values, so two fields sharing one would read
/// the same value.
pub fn validate_fields(fields: &[Field]) -> Result<(), SchemaError> {
    let mut seen = HashSet::new();
    for field in fields {
        field.validate()?;
        if !seen.insert(field.label.trim()) {
            return Err(SchemaError::DuplicateLabel(field.label.clone()));
        }
    }
    Ok(())
}

/// Template metadata as written by the editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateMeta {
    pub name: String,
    pub slug: Option<String>,
    pub background_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: Uuid,
    pub name: String,
    pub slug: Option<String>,
    pub background_url: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Template {
    /// Public link to the certificate form, preferring the alias.
    pub fn public_path(&self) -> String {
        match &self.slug {
            Some(slug) => format!("/view?slug={}", slug),
            None => format!("/view?id={}", self.id),
        }
    }

    /// File name offered for download, e.g. `Webinar_2024_Certificate.pdf`.
    pub fn download_name(&self, suffix: &str) -> String {
        let stem = self.name.split_whitespace().collect::<Vec<_>>().join("_");
        format!("{}_{}", stem, suffix)
    }
}

/// One recorded end-user fill-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    pub template_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub values: FieldValues,
}

/// Normalize a URL alias: whitespace runs become '-', lowercase.
///
/// Returns `None` for an empty alias.
pub fn normalize_slug(raw: &str) -> Option<String> {
    let slug = raw
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase();
    if slug.is_empty() {
        None
    } else {
        Some(slug)
    }
}

/// Slugs end up in query strings, keep them to a safe alphabet.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

/// How a public link identifies its template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateLookup {
    Id(Uuid),
    Slug(String),
}

impl TemplateLookup {
    /// A UUID resolves by id, anything else by alias.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        Some(match Uuid::parse_str(raw) {
            Ok(id) => TemplateLookup::Id(id),
            Err(_) => TemplateLookup::Slug(raw.to_lowercase()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_defaults() {
        let field = Field::draft(FieldId::Draft(1), "Field 1", 10.0, 20.0);
        assert_eq!(field.font_size, 16);
        assert_eq!(field.color.as_str(), "#000000");
        assert_eq!(field.input_type, InputType::Text);
        assert!(field.is_required);
        assert!(field.is_visible);
        assert!(!field.is_center_x);
        assert!(field.validate().is_ok());
    }

    #[test]
    fn test_field_id_text_form() {
        assert_eq!(FieldId::Draft(7).to_string(), "draft-7");
        assert_eq!("draft-7".parse::<FieldId>().unwrap(), FieldId::Draft(7));

        let id = Uuid::new_v4();
        assert_eq!(id.to_string().parse::<FieldId>().unwrap(), FieldId::Persisted(id));
        assert!("draft-x".parse::<FieldId>().is_err());
        assert!("nonsense".parse::<FieldId>().is_err());
    }

    #[test]
    fn test_duplicate_labels_rejected() {
        let fields = vec![
            Field::draft(FieldId::Draft(1), "Name", 0.0, 0.0),
            Field::draft(FieldId::Draft(2), "Name ", 0.0, 40.0),
        ];
        assert_eq!(
            validate_fields(&fields),
            Err(SchemaError::DuplicateLabel("Name ".to_string()))
        );
    }

    #[test]
    fn test_field_validation_limits() {
        let mut field = Field::draft(FieldId::Draft(1), "Name", 0.0, 0.0);
        field.font_size = 0;
        assert_eq!(field.validate(), Err(SchemaError::FontSize(0)));

        field.font_size = 24;
        field.y = f64::NAN;
        assert!(matches!(field.validate(), Err(SchemaError::Coordinate(_))));

        field.y = 5.0;
        field.width = Some(0.0);
        assert_eq!(field.validate(), Err(SchemaError::Width(0.0)));
    }

    #[test]
    fn test_visibility_defaults_to_true_when_missing() {
        let json = r##"{
            "id": "draft-1", "label": "Name", "type": "email", "is_required": false,
            "x": 1, "y": 2, "font_size": 12, "color": "#333"
        }"##;
        let field: Field = serde_json::from_str(json).unwrap();
        assert!(field.is_visible);
        assert_eq!(field.input_type, InputType::Email);
        assert_eq!(field.alignment, Alignment::Left);
    }

    #[test]
    fn test_slug_normalization() {
        assert_eq!(normalize_slug("  Webinar  Spring 2024 "), Some("webinar-spring-2024".into()));
        assert_eq!(normalize_slug("   "), None);
        assert!(is_valid_slug("webinar-2024"));
        assert!(!is_valid_slug("webinar?x=1"));
    }

    #[test]
    fn test_lookup_parsing() {
        let id = Uuid::new_v4();
        assert_eq!(TemplateLookup::parse(&id.to_string()), Some(TemplateLookup::Id(id)));
        assert_eq!(
            TemplateLookup::parse("Webinar"),
            Some(TemplateLookup::Slug("webinar".into()))
        );
        assert_eq!(TemplateLookup::parse(" "), None);
    }

    #[test]
    fn test_download_name() {
        let template = Template {
            id: Uuid::new_v4(),
            name: "Spring  Webinar".into(),
            slug: None,
            background_url: "/uploads/bg.png".into(),
            created_by: "admin".into(),
            created_at: Utc::now(),
        };
        assert_eq!(template.download_name("Certificate.pdf"), "Spring_Webinar_Certificate.pdf");
        assert_eq!(template.public_path(), format!("/view?id={}", template.id));
    }
}
