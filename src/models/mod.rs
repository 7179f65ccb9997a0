pub mod auth;
pub mod checkout;
pub mod item;
pub mod listing;
pub mod payment_account;
pub mod store;

pub use auth::*;
pub use checkout::*;
pub use item::*;
pub use listing::*;
pub use payment_account::*;
pub use store::*;

use serde::{Deserialize, Deserializer, Serialize};

/// Paginated list envelope returned by list endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// Some list endpoints are not paginated and return a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum PageOrList<T> {
    Page(Paginated<T>),
    List(Vec<T>),
}

impl<T> From<PageOrList<T>> for Paginated<T> {
    fn from(value: PageOrList<T>) -> Self {
        match value {
            PageOrList::Page(page) => page,
            PageOrList::List(results) => Paginated {
                count: results.len() as u64,
                next: None,
                previous: None,
                results,
            },
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    Text(String),
}

/// Decimal fields arrive as JSON strings (`"12.50"`) or numbers.
pub(crate) fn de_opt_amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<NumberOrString> = Option::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(NumberOrString::Number(n)) => Ok(Some(n)),
        Some(NumberOrString::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(NumberOrString::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Identifier {
    Number(serde_json::Number),
    Text(String),
}

/// Identifiers printed on tags may be numeric or alphanumeric. Integers keep
/// every digit.
pub(crate) fn de_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Identifier> = Option::deserialize(deserializer)?;
    Ok(value.map(|v| match v {
        Identifier::Number(n) => n.to_string(),
        Identifier::Text(s) => s,
    }))
}

pub fn format_amount(amount: Option<f64>) -> String {
    match amount {
        Some(a) => format!("{:.2}", a),
        None => "-".to_string(),
    }
}
