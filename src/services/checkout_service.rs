use crate::error::{AppError, AppResult};
use crate::http_client::HttpClient;
use crate::models::{
    CheckoutSession, ItemCheckoutRequest, ListingId, SuppliesCheckoutRequest, SupplyLine,
};

/// Creates hosted payment sessions; the caller redirects to the returned URL.
#[derive(Clone)]
pub struct CheckoutService {
    http: HttpClient,
    publishable_key: Option<String>,
}

impl CheckoutService {
    pub fn new(http: HttpClient, publishable_key: Option<String>) -> Self {
        Self {
            http,
            publishable_key,
        }
    }

    fn ensure_configured(&self) -> AppResult<()> {
        if self.publishable_key.is_none() {
            return Err(AppError::Config(
                "Payments are not configured. Set STRIPE_PUBLISHABLE_KEY.".to_string(),
            ));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn checkout_item(&self, listing_id: ListingId) -> AppResult<CheckoutSession> {
        self.ensure_configured()?;
        let session: CheckoutSession = self
            .http
            .post_json("/checkout/item/", &ItemCheckoutRequest { listing_id })
            .await?;
        require_url(session)
    }

    #[tracing::instrument(skip(self))]
    pub async fn checkout_supplies(&self, items: Vec<SupplyLine>) -> AppResult<CheckoutSession> {
        self.ensure_configured()?;
        if items.is_empty() {
            return Err(AppError::validation("items", "Select at least one supply."));
        }
        let session: CheckoutSession = self
            .http
            .post_json("/checkout/supplies/", &SuppliesCheckoutRequest { items })
            .await?;
        require_url(session)
    }
}

fn require_url(session: CheckoutSession) -> AppResult<CheckoutSession> {
    match session.checkout_url.as_deref() {
        Some(url) if !url.is_empty() => Ok(session),
        _ => Err(AppError::Internal(
            "Checkout session did not include a redirect URL".to_string(),
        )),
    }
}
