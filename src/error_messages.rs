//! Turns `AppError` values into the single message shown to the user, plus
//! the per-field messages for inline display.

use std::collections::BTreeMap;

use crate::error::{ApiErrorBody, AppError};

pub const NETWORK_ERROR_MESSAGE: &str =
    "Unable to reach the server. Check your connection and try again.";
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong. Please try again.";
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid credentials";
const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please log in again.";
const FORBIDDEN_MESSAGE: &str = "You don't have permission to do that.";
const NOT_FOUND_MESSAGE: &str = "We couldn't find that listing. It may have been removed.";
const WRONG_PIN_MESSAGE: &str = "That PIN is incorrect. Use the PIN from your recall confirmation.";

/// Field groups in the order their first message wins the headline.
const FIELD_PRIORITY: &[&[&str]] = &[
    &["item_id", "item"],
    &["tag_id", "tag"],
    &["condition"],
    &["category"],
    &["price"],
    &["store"],
    &["listing_limit"],
    &["non_field_errors"],
];

/// Case-insensitive substrings of `detail`/`error` with a tailored message.
const DOMAIN_MESSAGES: &[(&str, &str)] = &[
    ("already active", "This tag already has an active listing."),
    ("not found", NOT_FOUND_MESSAGE),
    ("invalid pin", WRONG_PIN_MESSAGE),
    ("incorrect pin", WRONG_PIN_MESSAGE),
    ("deadline", "The collection deadline for this item has passed."),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Validation,
    Domain,
    Unexpected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserFacingError {
    pub kind: ErrorKind,
    pub message: String,
    /// Field the headline message came from, if any.
    pub field: Option<String>,
    pub field_errors: BTreeMap<String, Vec<String>>,
}

impl UserFacingError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            field: None,
            field_errors: BTreeMap::new(),
        }
    }

    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut field_errors = BTreeMap::new();
        field_errors.insert(field.to_string(), vec![message.clone()]);
        Self {
            kind: ErrorKind::Validation,
            message,
            field: Some(field.to_string()),
            field_errors,
        }
    }
}

impl std::fmt::Display for UserFacingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for UserFacingError {}

impl From<AppError> for UserFacingError {
    fn from(err: AppError) -> Self {
        surface(&err)
    }
}

/// Highest-priority field message; other fields only when none of the
/// known ones is present.
pub fn headline_field_error(fields: &BTreeMap<String, Vec<String>>) -> Option<(String, String)> {
    let first = |name: &str| {
        fields
            .get(name)
            .and_then(|messages| messages.first())
            .map(|m| (name.to_string(), m.clone()))
    };

    FIELD_PRIORITY
        .iter()
        .flat_map(|group| group.iter())
        .find_map(|name| first(*name))
        .or_else(|| fields.keys().find_map(|name| first(name.as_str())))
}

pub fn domain_message(text: &str) -> Option<&'static str> {
    let lowered = text.to_lowercase();
    DOMAIN_MESSAGES
        .iter()
        .find(|(needle, _)| lowered.contains(needle))
        .map(|(_, message)| *message)
}

fn from_fields(fields: &BTreeMap<String, Vec<String>>) -> UserFacingError {
    let (field, message) = match headline_field_error(fields) {
        Some((field, message)) => (Some(field), message),
        None => (None, GENERIC_ERROR_MESSAGE.to_string()),
    };
    UserFacingError {
        kind: ErrorKind::Validation,
        message,
        field,
        field_errors: fields.clone(),
    }
}

fn from_api(status: u16, body: &ApiErrorBody) -> UserFacingError {
    if !body.fields.is_empty() {
        return from_fields(&body.fields);
    }
    if let Some(text) = body.message() {
        let message = domain_message(text).unwrap_or(text);
        return UserFacingError::new(ErrorKind::Domain, message);
    }
    let message = match status {
        401 => SESSION_EXPIRED_MESSAGE,
        403 => FORBIDDEN_MESSAGE,
        404 => NOT_FOUND_MESSAGE,
        _ => GENERIC_ERROR_MESSAGE,
    };
    UserFacingError::new(ErrorKind::Unexpected, message)
}

pub fn surface(err: &AppError) -> UserFacingError {
    match err {
        AppError::Http(_) => UserFacingError::new(ErrorKind::Network, NETWORK_ERROR_MESSAGE),
        AppError::Api { status, body } => from_api(*status, body),
        AppError::Validation(fields) => from_fields(fields),
        AppError::InvalidInput(message) => UserFacingError::new(ErrorKind::Validation, message.clone()),
        AppError::Config(message) => UserFacingError::new(ErrorKind::Unexpected, message.clone()),
        AppError::Serialization(_) | AppError::Storage(_) | AppError::Internal(_) => {
            tracing::error!("Unexpected client error: {}", err);
            UserFacingError::new(ErrorKind::Unexpected, GENERIC_ERROR_MESSAGE)
        }
    }
}

/// Login form message: the first `non_field_errors` entry, else "Invalid credentials".
pub fn login_error(err: &AppError) -> UserFacingError {
    match err {
        AppError::Http(_) => UserFacingError::new(ErrorKind::Network, NETWORK_ERROR_MESSAGE),
        AppError::Api { body, .. } => {
            let message = body
                .first_field_message("non_field_errors")
                .unwrap_or(INVALID_CREDENTIALS_MESSAGE);
            UserFacingError {
                kind: ErrorKind::Validation,
                message: message.to_string(),
                field: None,
                field_errors: body.fields.clone(),
            }
        }
        other => surface(other),
    }
}
