use serde::{Deserialize, Serialize};

use super::{check_coordinate, Alignment, Field, HexColor, InputType, SchemaError};

/// One attribute change for a field.
///
/// The set of updatable attributes is closed: a patch naming anything else
/// fails to deserialize instead of being merged into the record.
///
/// ```json
/// [{"attribute": "label", "value": "Full name"},
///  {"attribute": "center_x", "value": true}]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "attribute", content = "value", rename_all = "snake_case")]
pub enum FieldUpdate {
    Label(String),
    InputType(InputType),
    Placeholder(Option<String>),
    Required(bool),
    X(f64),
    Y(f64),
    FontSize(u32),
    Color(HexColor),
    Width(Option<f64>),
    Alignment(Alignment),
    CenterX(bool),
    Visible(bool),
}

impl Field {
    /// Apply a single update, validating the result.
    ///
    /// On error the field is left exactly as it was.
    pub fn apply(&mut self, update: FieldUpdate) -> Result<(), SchemaError> {
        let mut next = self.clone();
        match update {
            FieldUpdate::Label(label) => next.label = label,
            FieldUpdate::InputType(input_type) => next.input_type = input_type,
            FieldUpdate::Placeholder(placeholder) => {
                next.placeholder = placeholder.filter(|p| !p.trim().is_empty())
            }
            FieldUpdate::Required(required) => next.is_required = required,
            FieldUpdate::X(x) => {
                check_coordinate(x)?;
                next.x = x;
            }
            FieldUpdate::Y(y) => {
                check_coordinate(y)?;
                next.y = y;
            }
            FieldUpdate::FontSize(size) => next.font_size = size,
            FieldUpdate::Color(color) => next.color = color,
            FieldUpdate::Width(width) => next.width = width,
            FieldUpdate::Alignment(alignment) => next.alignment = alignment,
            FieldUpdate::CenterX(center) => next.is_center_x = center,
            FieldUpdate::Visible(visible) => next.is_visible = visible,
        }
        next.validate()?;
        *self = next;
        Ok(())
    }
}
