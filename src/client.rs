use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::auth_store::AuthState;
use crate::config::Config;
use crate::error::AppResult;
use crate::http_client::HttpClient;
use crate::models::{CheckoutSession, Listing, ListingId, UserListingRelation};
use crate::services::{
    AuthService, CheckoutService, ItemsService, ListingBackend, ListingsService,
    PaymentAccountsService, StoresService,
};

/// Every API service, sharing one HTTP client and therefore one bearer
/// token and cookie jar.
#[derive(Clone)]
pub struct MarketplaceClient {
    pub http: HttpClient,
    pub auth: AuthService,
    pub listings: ListingsService,
    pub items: ItemsService,
    pub stores: StoresService,
    pub checkout: CheckoutService,
    pub payments: PaymentAccountsService,
}

impl MarketplaceClient {
    pub fn new(config: &Config) -> AppResult<Self> {
        let http = HttpClient::new(
            config.api_base_url(),
            Duration::from_secs(config.request_timeout_secs),
        )?;
        tracing::debug!("API base URL: {}", http.base_url());
        Ok(Self::with_http(http, config.stripe_publishable_key.clone()))
    }

    pub fn with_http(http: HttpClient, stripe_publishable_key: Option<String>) -> Self {
        Self {
            auth: AuthService::new(http.clone()),
            listings: ListingsService::new(http.clone()),
            items: ItemsService::new(http.clone()),
            stores: StoresService::new(http.clone()),
            checkout: CheckoutService::new(http.clone(), stripe_publishable_key),
            payments: PaymentAccountsService::new(http.clone()),
            http,
        }
    }

    /// Keeps the bearer token in step with the auth store, including
    /// changes made by other instances.
    pub fn spawn_bearer_sync(&self, mut state: watch::Receiver<AuthState>) -> JoinHandle<()> {
        let http = self.http.clone();
        tokio::spawn(async move {
            loop {
                let token = state.borrow_and_update().token.clone();
                http.set_bearer(token).await;
                if state.changed().await.is_err() {
                    break;
                }
            }
        })
    }
}

#[async_trait]
impl ListingBackend for MarketplaceClient {
    async fn get_listing(&self, id: ListingId) -> AppResult<Option<Listing>> {
        self.listings.get_listing(id).await
    }

    async fn check_role(&self, id: ListingId) -> AppResult<Option<UserListingRelation>> {
        self.listings.check_role(id).await
    }

    async fn recall(&self, id: ListingId) -> AppResult<()> {
        self.listings.recall(id).await
    }

    async fn delist(&self, id: ListingId) -> AppResult<()> {
        self.listings.delist(id).await
    }

    async fn replace_tag(&self, id: ListingId, new_tag_id: &str) -> AppResult<()> {
        self.listings.replace_tag(id, new_tag_id).await
    }

    async fn collect(&self, id: ListingId, pin: &str) -> AppResult<()> {
        self.listings.collect(id, pin).await
    }

    async fn remove_abandoned_tag(&self, id: ListingId) -> AppResult<()> {
        self.listings.remove_abandoned_tag(id).await
    }

    async fn remove_sold_tag(&self, id: ListingId) -> AppResult<()> {
        self.listings.remove_sold_tag(id).await
    }

    async fn checkout_item(&self, id: ListingId) -> AppResult<CheckoutSession> {
        self.checkout.checkout_item(id).await
    }
}
