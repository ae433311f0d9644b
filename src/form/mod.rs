//! # Form Renderer
//!
//! Turns a field list into end-user input controls and validates what comes
//! back. The result of a successful submit is keyed by field label and
//! always holds every label of the template.

use chrono::NaiveDate;
use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

use crate::schema::{Field, FieldId, FieldValues, InputType};

/// One input control, in field order. Hidden-on-certificate fields are
/// still collected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormControl {
    pub id: FieldId,
    pub label: String,
    pub input_type: InputType,
    pub html_type: &'static str,
    pub placeholder: String,
    pub required: bool,
}

impl FormControl {
    pub fn from_field(field: &Field) -> Self {
        Self {
            id: field.id,
            label: field.label.clone(),
            input_type: field.input_type,
            html_type: field.input_type.as_str(),
            placeholder: field
                .placeholder
                .clone()
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| format!("Enter {}", field.label)),
            required: field.is_required,
        }
    }
}

pub fn controls(fields: &[Field]) -> Vec<FormControl> {
    fields.iter().map(FormControl::from_field).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldError {
    Required,
    InvalidEmail,
    InvalidNumber,
    InvalidDate,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            FieldError::Required => "This field is required",
            FieldError::InvalidEmail => "Please enter a valid email address",
            FieldError::InvalidNumber => "Please enter a number",
            FieldError::InvalidDate => "Please enter a date (YYYY-MM-DD)",
        };
        f.write_str(msg)
    }
}

/// Every failing label of a rejected submission, in field order.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Please fix: {}", summary(.0))]
pub struct FormErrors(pub IndexMap<String, FieldError>);

fn summary(errors: &IndexMap<String, FieldError>) -> String {
    errors
        .iter()
        .map(|(label, err)| format!("{} ({})", label, err))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown field '{0}'")]
pub struct UnknownField(pub String);

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
    })
}

/// Check one value against its field. Surrounding whitespace is ignored.
pub fn check_value(field: &Field, value: &str) -> Option<FieldError> {
    let value = value.trim();
    if value.is_empty() {
        return field.is_required.then_some(FieldError::Required);
    }
    match field.input_type {
        InputType::Text => None,
        InputType::Email => (!email_pattern().is_match(value)).then_some(FieldError::InvalidEmail),
        InputType::Number => match value.parse::<f64>() {
            Ok(n) if n.is_finite() => None,
            _ => Some(FieldError::InvalidNumber),
        },
        InputType::Date => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .err()
            .map(|_| FieldError::InvalidDate),
    }
}

/// Live form: values are re-checked as they change.
#[derive(Debug, Clone)]
pub struct FormState {
    fields: Vec<Field>,
    values: FieldValues,
    touched: IndexMap<String, FieldError>,
}

impl FormState {
    pub fn new(fields: Vec<Field>) -> Self {
        let values = fields
            .iter()
            .map(|f| (f.label.clone(), String::new()))
            .collect();
        Self {
            fields,
            values,
            touched: IndexMap::new(),
        }
    }

    pub fn controls(&self) -> Vec<FormControl> {
        controls(&self.fields)
    }

    pub fn value(&self, label: &str) -> Option<&str> {
        self.values.get(label).map(String::as_str)
    }

    /// Store a value and return the field's current error, if any.
    pub fn set_value(&mut self, label: &str, value: &str) -> Result<Option<FieldError>, UnknownField> {
        let field = self
            .fields
            .iter()
            .find(|f| f.label == label)
            .ok_or_else(|| UnknownField(label.to_string()))?;
        let error = check_value(field, value);
        self.values.insert(label.to_string(), value.trim().to_string());
        match error {
            Some(err) => {
                self.touched.insert(label.to_string(), err);
            }
            None => {
                self.touched.shift_remove(label);
            }
        }
        Ok(error)
    }

    /// Errors of the fields changed so far.
    pub fn errors(&self) -> &IndexMap<String, FieldError> {
        &self.touched
    }

    /// Whether a submit would succeed right now.
    pub fn is_valid(&self) -> bool {
        self.fields
            .iter()
            .all(|f| check_value(f, self.values.get(&f.label).map_or("", String::as_str)).is_none())
    }

    pub fn submit(&self) -> Result<FieldValues, FormErrors> {
        let errors: IndexMap<String, FieldError> = self
            .fields
            .iter()
            .filter_map(|f| {
                let value = self.values.get(&f.label).map_or("", String::as_str);
                check_value(f, value).map(|e| (f.label.clone(), e))
            })
            .collect();
        if errors.is_empty() {
            Ok(self.values.clone())
        } else {
            Err(FormErrors(errors))
        }
    }
}

/// Evaluate a whole submission at once. Keys that are not field labels are
/// dropped.
pub fn validate_submission<'a, I>(fields: &[Field], raw: I) -> Result<FieldValues, FormErrors>
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let mut form = FormState::new(fields.to_vec());
    for (label, value) in raw {
        if form.set_value(label, value).is_err() {
            tracing::debug!(label = %label, "Ignoring unknown form key");
        }
    }
    form.submit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn field(label: &str, input_type: InputType, required: bool) -> Field {
        let mut field = Field::draft(FieldId::Draft(1), label, 0.0, 0.0);
        field.input_type = input_type;
        field.is_required = required;
        field
    }

    fn schema() -> Vec<Field> {
        vec![
            field("Name", InputType::Text, true),
            field("Email", InputType::Email, false),
            field("Score", InputType::Number, false),
        ]
    }

    #[test]
    fn test_controls_follow_field_order_and_types() {
        let mut fields = schema();
        fields[0].placeholder = Some("Your full name".into());
        fields[1].is_visible = false;
        let controls = controls(&fields);
        assert_eq!(
            controls.iter().map(|c| c.label.as_str()).collect::<Vec<_>>(),
            vec!["Name", "Email", "Score"]
        );
        assert_eq!(controls[0].placeholder, "Your full name");
        assert_eq!(controls[1].placeholder, "Enter Email");
        assert_eq!(controls[1].html_type, "email");
        assert!(controls[0].required && !controls[2].required);
    }

    #[test]
    fn test_required_empty_is_rejected() {
        let form = FormState::new(schema());
        assert!(!form.is_valid());
        let errors = form.submit().unwrap_err();
        assert_eq!(errors.0.get("Name"), Some(&FieldError::Required));
        assert_eq!(errors.0.len(), 1);

        let mut form = FormState::new(schema());
        assert_eq!(form.set_value("Name", "   ").unwrap(), Some(FieldError::Required));
    }

    #[test]
    fn test_optional_fields_fill_with_empty_strings() {
        let mut form = FormState::new(schema());
        assert_eq!(form.set_value("Name", "Jane Doe").unwrap(), None);
        assert!(form.is_valid());
        let values = form.submit().unwrap();
        assert_eq!(
            values.into_iter().collect::<Vec<_>>(),
            vec![
                ("Name".to_string(), "Jane Doe".to_string()),
                ("Email".to_string(), String::new()),
                ("Score".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_errors_update_on_every_change() {
        let mut form = FormState::new(schema());
        assert_eq!(
            form.set_value("Email", "jane").unwrap(),
            Some(FieldError::InvalidEmail)
        );
        assert_eq!(form.errors().get("Email"), Some(&FieldError::InvalidEmail));
        assert_eq!(form.set_value("Email", "jane@example.com").unwrap(), None);
        assert!(form.errors().is_empty());
        assert!(form.set_value("Nope", "x").is_err());
    }

    #[test]
    fn test_typed_values() {
        let number = field("Score", InputType::Number, true);
        assert_eq!(check_value(&number, "12.5"), None);
        assert_eq!(check_value(&number, "abc"), Some(FieldError::InvalidNumber));
        assert_eq!(check_value(&number, "inf"), Some(FieldError::InvalidNumber));

        let date = field("Date", InputType::Date, true);
        assert_eq!(check_value(&date, "2024-03-15"), None);
        assert_eq!(check_value(&date, "15/03/2024"), Some(FieldError::InvalidDate));
    }

    #[test]
    fn test_invisible_fields_are_still_collected() {
        let mut fields = schema();
        fields[0].is_visible = false;
        let mut raw = HashMap::new();
        raw.insert("Name".to_string(), "Jane".to_string());
        raw.insert("Extra".to_string(), "dropped".to_string());
        let values = validate_submission(&fields, &raw).unwrap();
        assert_eq!(values["Name"], "Jane");
        assert!(!values.contains_key("Extra"));
    }

    #[test]
    fn test_rejection_lists_every_failing_label() {
        let mut raw = HashMap::new();
        raw.insert("Email".to_string(), "not-an-email".to_string());
        let errors = validate_submission(&schema(), &raw).unwrap_err();
        assert_eq!(
            errors.0.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["Name", "Email"]
        );
        assert_eq!(
            errors.to_string(),
            "Please fix: Name (This field is required), Email (Please enter a valid email address)"
        );
    }
}
