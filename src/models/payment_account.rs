use serde::Deserialize;

/// Connected payout account of a member or store.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentAccountStatus {
    #[serde(default)]
    pub has_account: bool,
    #[serde(default)]
    pub charges_enabled: bool,
    #[serde(default)]
    pub payouts_enabled: bool,
    #[serde(default)]
    pub details_submitted: bool,
}

impl PaymentAccountStatus {
    pub fn is_ready(&self) -> bool {
        self.has_account && self.details_submitted && self.payouts_enabled
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountLink {
    #[serde(alias = "link")]
    pub url: String,
}
