use std::path::Path;

use chrono::{DateTime, Utc};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};

use super::{de_opt_amount, ItemImage};
use crate::error::{AppError, AppResult};

/// Conditions accepted by the item form.
pub const ITEM_CONDITIONS: &[&str] = &["new", "like_new", "good", "fair", "poor"];

#[derive(Debug, Clone, Deserialize)]
pub struct Item {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "de_opt_amount")]
    pub price: Option<f64>,
    #[serde(default)]
    pub images: Vec<ItemImage>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn from_path(path: &Path) -> AppResult<Self> {
        let mime = image_mime(path).ok_or_else(|| {
            AppError::InvalidInput(format!(
                "Unsupported image type: {}",
                path.display()
            ))
        })?;
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image")
            .to_string();

        Ok(Self {
            file_name,
            mime,
            bytes,
        })
    }
}

fn image_mime(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

/// Item creation form, sent as multipart because of the images.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub name: String,
    pub description: String,
    pub condition: String,
    pub category: String,
    pub price: f64,
    pub images: Vec<ImageUpload>,
}

impl NewItem {
    pub fn into_form(self) -> AppResult<Form> {
        let mut form = Form::new()
            .text("name", self.name)
            .text("description", self.description)
            .text("condition", self.condition)
            .text("category", self.category)
            .text("price", format!("{:.2}", self.price));

        for image in self.images {
            let part = Part::bytes(image.bytes)
                .file_name(image.file_name)
                .mime_str(image.mime)?;
            form = form.part("images", part);
        }
        Ok(form)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ItemUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
}
