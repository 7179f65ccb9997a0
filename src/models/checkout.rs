use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ListingId;

#[derive(Debug, Clone, Serialize)]
pub struct ItemCheckoutRequest {
    pub listing_id: ListingId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupplyLine {
    pub supply_id: u64,
    pub quantity: u32,
}

/// Parses `"<supply_id>:<quantity>"`; a bare id means quantity 1.
impl FromStr for SupplyLine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, qty) = match s.split_once(':') {
            Some((id, qty)) => (id, qty),
            None => (s, "1"),
        };
        let supply_id = id
            .trim()
            .parse()
            .map_err(|_| format!("invalid supply id: {}", id))?;
        let quantity: u32 = qty
            .trim()
            .parse()
            .map_err(|_| format!("invalid quantity: {}", qty))?;
        if quantity == 0 {
            return Err("quantity must be at least 1".to_string());
        }
        Ok(Self {
            supply_id,
            quantity,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SuppliesCheckoutRequest {
    pub items: Vec<SupplyLine>,
}

/// Hosted checkout session created by the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    #[serde(default, alias = "url")]
    pub checkout_url: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}
