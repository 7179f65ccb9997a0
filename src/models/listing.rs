use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{de_opt_amount, de_opt_string};

pub type ListingId = u64;

/// Status string reported under `item_details.status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ListingStatus {
    Listed,
    Recalled,
    Abandoned,
    Sold,
    Delisted,
    Other(String),
}

impl ListingStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ListingStatus::Listed => "listed",
            ListingStatus::Recalled => "recalled",
            ListingStatus::Abandoned => "abandoned",
            ListingStatus::Sold => "sold",
            ListingStatus::Delisted => "delisted",
            ListingStatus::Other(s) => s,
        }
    }
}

impl From<String> for ListingStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "listed" => ListingStatus::Listed,
            "recalled" => ListingStatus::Recalled,
            "abandoned" => ListingStatus::Abandoned,
            "sold" => ListingStatus::Sold,
            "delisted" => ListingStatus::Delisted,
            _ => ListingStatus::Other(value),
        }
    }
}

impl From<ListingStatus> for String {
    fn from(value: ListingStatus) -> Self {
        value.as_str().to_string()
    }
}

/// Relation of the viewer to a listing, as computed by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserListingRelation {
    /// Owner of the store holding the tag.
    Host,
    /// Owner of the item.
    Owner,
    Guest,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckRoleResponse {
    #[serde(default, alias = "user_role", alias = "relation")]
    pub role: Option<UserListingRelation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemImage {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(alias = "url")]
    pub image: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemDetails {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub images: Vec<ItemImage>,
    #[serde(default)]
    pub status: Option<ListingStatus>,
    #[serde(default, deserialize_with = "de_opt_amount")]
    pub listing_price: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_amount")]
    pub minimum_price: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_amount")]
    pub store_commission: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_amount")]
    pub member_earnings: Option<f64>,
    #[serde(default)]
    pub recalled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub collection_deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub abandoned_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sold_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub delisted_at: Option<DateTime<Utc>>,
}

/// A physical tag in a store, optionally carrying an item for sale.
#[derive(Debug, Clone, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub tag_id: Option<String>,
    #[serde(default)]
    pub store: Option<u64>,
    #[serde(default)]
    pub store_name: Option<String>,
    /// `None` when the tag is vacant.
    #[serde(default)]
    pub item: Option<u64>,
    #[serde(default)]
    pub item_details: Option<ItemDetails>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Listing {
    pub fn is_vacant(&self) -> bool {
        self.item.is_none()
    }

    pub fn status(&self) -> Option<&ListingStatus> {
        self.item_details.as_ref().and_then(|d| d.status.as_ref())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateListingRequest {
    pub tag_id: String,
    pub item_id: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplaceTagRequest {
    pub new_tag_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectRequest {
    pub pin: String,
}
