use serde::{Deserialize, Serialize};

use super::de_opt_amount;

const MAPS_EMBED_URL: &str = "https://www.google.com/maps/embed/v1/place";

#[derive(Debug, Clone, Deserialize)]
pub struct Store {
    pub id: u64,
    #[serde(default, alias = "store_name")]
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub postcode: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_amount")]
    pub commission_rate: Option<f64>,
    #[serde(default)]
    pub opening_hours: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub active_listings: Option<u64>,
}

impl Store {
    /// Embeddable map URL; coordinates win over the postal address.
    pub fn maps_embed_url(&self, api_key: &str) -> Option<String> {
        let query = match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => format!("{},{}", lat, lng),
            _ => {
                let parts: Vec<&str> = [
                    Some(self.name.as_str()),
                    self.address.as_deref(),
                    self.postcode.as_deref(),
                    self.city.as_deref(),
                ]
                .into_iter()
                .flatten()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .collect();
                // The name alone does not locate a store.
                if parts.len() < 2 {
                    return None;
                }
                parts.join(", ")
            }
        };

        Some(format!(
            "{}?key={}&q={}",
            MAPS_EMBED_URL,
            urlencoding::encode(api_key),
            urlencoding::encode(&query)
        ))
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Store {
        serde_json::from_str(r#"{"id": 1, "name": "Second Spin", "address": "1 High St", "city": "Leeds"}"#)
            .unwrap()
    }

    #[test]
    fn test_maps_url_from_address() {
        let url = store().maps_embed_url("KEY 1").unwrap();
        assert_eq!(
            url,
            "https://www.google.com/maps/embed/v1/place?key=KEY%201&q=Second%20Spin%2C%201%20High%20St%2C%20Leeds"
        );
    }

    #[test]
    fn test_maps_url_prefers_coordinates() {
        let mut s = store();
        s.latitude = Some(53.8);
        s.longitude = Some(-1.55);
        let url = s.maps_embed_url("k").unwrap();
        assert!(url.ends_with("q=53.8%2C-1.55"));
    }

    #[test]
    fn test_maps_url_needs_location() {
        let s: Store = serde_json::from_str(r#"{"id": 2, "name": "Nowhere"}"#).unwrap();
        assert!(s.maps_embed_url("k").is_none());
    }
}
