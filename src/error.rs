use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: ApiErrorBody },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Rejected locally before any request was sent.
    #[error("Validation failed: {0:?}")]
    Validation(BTreeMap<String, Vec<String>>),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> Option<u16> {
        match self {
            AppError::Api { status, .. } => Some(*status),
            AppError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn api_body(&self) -> Option<&ApiErrorBody> {
        match self {
            AppError::Api { body, .. } => Some(body),
            _ => None,
        }
    }

    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(field.to_string(), vec![message.into()]);
        AppError::Validation(fields)
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Error payload returned by the backend on a non-2xx response.
///
/// The backend answers either with `{"detail": "..."}` / `{"error": "..."}`
/// or with a field-keyed validation map such as
/// `{"tag_id": ["This tag is in use."], "non_field_errors": ["..."]}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiErrorBody {
    pub detail: Option<String>,
    pub error: Option<String>,
    pub fields: BTreeMap<String, Vec<String>>,
    /// Response text that was not JSON (HTML error pages, proxies).
    pub raw: Option<String>,
}

impl ApiErrorBody {
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Self::default();
        }

        match serde_json::from_str::<Value>(trimmed) {
            Ok(Value::Object(map)) => {
                let mut body = Self::default();
                for (key, value) in map {
                    match value {
                        Value::String(s) if key == "detail" => body.detail = Some(s),
                        Value::String(s) if key == "error" => body.error = Some(s),
                        value => {
                            let messages = collect_messages(&value);
                            if !messages.is_empty() {
                                body.fields.insert(key, messages);
                            }
                        }
                    }
                }
                body
            }
            Ok(Value::String(s)) => Self {
                detail: Some(s),
                ..Self::default()
            },
            Ok(Value::Array(items)) => {
                let messages = collect_messages(&Value::Array(items));
                let mut body = Self::default();
                if !messages.is_empty() {
                    body.fields
                        .insert("non_field_errors".to_string(), messages);
                }
                body
            }
            _ => Self {
                raw: Some(trimmed.to_string()),
                ..Self::default()
            },
        }
    }

    /// `detail` first, then `error`.
    pub fn message(&self) -> Option<&str> {
        self.detail.as_deref().or(self.error.as_deref())
    }

    pub fn first_field_message(&self, field: &str) -> Option<&str> {
        self.fields
            .get(field)
            .and_then(|m| m.first())
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.detail.is_none() && self.error.is_none() && self.fields.is_empty() && self.raw.is_none()
    }
}

impl std::fmt::Display for ApiErrorBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(msg) = self.message() {
            return write!(f, "{}", msg);
        }
        if !self.fields.is_empty() {
            let parts: Vec<String> = self
                .fields
                .iter()
                .map(|(k, v)| format!("{}: {}", k, v.join(" ")))
                .collect();
            return write!(f, "{}", parts.join("; "));
        }
        match &self.raw {
            Some(raw) => write!(f, "{}", raw),
            None => write!(f, "empty response body"),
        }
    }
}

fn collect_messages(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items.iter().flat_map(collect_messages).collect(),
        // Nested serializer errors: {"images": {"0": ["Too large."]}}
        Value::Object(map) => map.values().flat_map(collect_messages).collect(),
        Value::Number(n) => vec![n.to_string()],
        _ => vec![],
    }
}
