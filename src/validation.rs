//! The validation gate.
//!
//! Payload schemas are plain structs deriving [`validator::Validate`] (see
//! [`crate::forms`]). [`check`] runs a schema and either hands the payload back
//! or reports every violated field at once, so a client fixes the whole form in
//! a single round trip. The gate has no side effects and never touches storage.

use std::fmt;

use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// One violated field. `field` is a dotted path for nested schemas
/// (`campground.title`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Every field that failed, sorted by path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    errors: Vec<FieldError>,
}

impl ValidationFailure {
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// All messages joined into the one line shown on the error page.
    pub fn message(&self) -> String {
        self.errors
            .iter()
            .map(|error| error.message.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|error| error.field == field)
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl From<&ValidationErrors> for ValidationFailure {
    fn from(errors: &ValidationErrors) -> Self {
        let mut collected = Vec::new();
        collect("", errors, &mut collected);
        collected.sort_by(|a, b| a.field.cmp(&b.field));
        Self { errors: collected }
    }
}

/// check
///
/// Runs the payload's declared schema. `Ok` hands the payload back untouched.
pub fn check<T: Validate>(payload: T) -> Result<T, ValidationFailure> {
    match payload.validate() {
        Ok(()) => Ok(payload),
        Err(errors) => Err(ValidationFailure::from(&errors)),
    }
}

fn collect(prefix: &str, errors: &ValidationErrors, out: &mut Vec<FieldError>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };

        match kind {
            ValidationErrorsKind::Field(list) => {
                for error in list {
                    let message = error
                        .message
                        .as_ref()
                        .map(|message| message.to_string())
                        .unwrap_or_else(|| format!("{} is invalid", path));
                    out.push(FieldError {
                        field: path.clone(),
                        message,
                    });
                }
            }
            ValidationErrorsKind::Struct(inner) => collect(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect(&format!("{}[{}]", path, index), inner, out);
                }
            }
        }
    }
}
