use serde::Serialize;
use serde_json::json;
use std::fmt;

use crate::model::NodeId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub reason: String,
}

impl FieldError {
    pub fn new(field: &str, reason: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Non-blocking finding reported alongside a successful edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationWarning {
    pub field: String,
    pub reason: String,
}

/// One or more field-level failures. Never constructed empty by the rules in
/// [`crate::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn single(field: &str, reason: impl Into<String>) -> Self {
        Self(vec![FieldError::new(field, reason)])
    }

    pub fn push(&mut self, field: &str, reason: impl Into<String>) {
        self.0.push(FieldError::new(field, reason));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    /// Prefix every field with a location, e.g. `boards[0].title`.
    pub fn located(self, location: &str) -> Self {
        Self(
            self.0
                .into_iter()
                .map(|e| FieldError {
                    field: format!("{}.{}", location, e.field),
                    reason: e.reason,
                })
                .collect(),
        )
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.reason))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

fn join_ids(path: &[NodeId]) -> String {
    path.iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join("/")
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EditError {
    #[error("node {missing} not found (path {})", join_ids(.path))]
    NotFound { path: Vec<NodeId>, missing: NodeId },
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

impl EditError {
    pub(crate) fn not_found(path: &[NodeId], missing: &NodeId) -> Self {
        EditError::NotFound {
            path: path.to_vec(),
            missing: missing.clone(),
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        EditError::InvalidOperation(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            EditError::NotFound { .. } => "not_found",
            EditError::Validation(_) => "validation_failed",
            EditError::InvalidOperation(_) => "invalid_operation",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            EditError::NotFound { path, missing } => Some(json!({
                "path": path,
                "missing": missing,
            })),
            EditError::Validation(errors) => Some(json!({ "fields": errors })),
            EditError::InvalidOperation(_) => None,
        }
    }
}

impl From<ValidationErrors> for EditError {
    fn from(value: ValidationErrors) -> Self {
        EditError::Validation(value)
    }
}
