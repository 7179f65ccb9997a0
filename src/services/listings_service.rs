use async_trait::async_trait;

use crate::error::AppResult;
use crate::http_client::HttpClient;
use crate::models::{
    CheckRoleResponse, CheckoutSession, CollectRequest, CreateListingRequest, Listing, ListingId,
    PageOrList, Paginated, ReplaceTagRequest, UserListingRelation,
};

/// Everything the listing screen and its action dispatchers call.
#[async_trait]
pub trait ListingBackend: Send + Sync {
    /// `None` when no listing exists for the id (unassigned tag).
    async fn get_listing(&self, id: ListingId) -> AppResult<Option<Listing>>;

    async fn check_role(&self, id: ListingId) -> AppResult<Option<UserListingRelation>>;

    async fn recall(&self, id: ListingId) -> AppResult<()>;

    async fn delist(&self, id: ListingId) -> AppResult<()>;

    async fn replace_tag(&self, id: ListingId, new_tag_id: &str) -> AppResult<()>;

    async fn collect(&self, id: ListingId, pin: &str) -> AppResult<()>;

    async fn remove_abandoned_tag(&self, id: ListingId) -> AppResult<()>;

    async fn remove_sold_tag(&self, id: ListingId) -> AppResult<()>;

    async fn checkout_item(&self, id: ListingId) -> AppResult<CheckoutSession>;
}

/// Store-side listing collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreListingKind {
    Active,
    Recalled,
    Abandoned,
    Sold,
}

impl StoreListingKind {
    pub fn path(&self) -> &'static str {
        match self {
            StoreListingKind::Active => "/stores/me/listings/",
            StoreListingKind::Recalled => "/stores/me/recalled-listings/",
            StoreListingKind::Abandoned => "/stores/me/abandoned-listings/",
            StoreListingKind::Sold => "/stores/me/sold-listings/",
        }
    }
}

#[derive(Clone)]
pub struct ListingsService {
    http: HttpClient,
}

impl ListingsService {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_listing(&self, id: ListingId) -> AppResult<Option<Listing>> {
        match self.http.get_json(&format!("/listings/{}/", id)).await {
            Ok(listing) => Ok(Some(listing)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn check_role(&self, id: ListingId) -> AppResult<Option<UserListingRelation>> {
        let response: CheckRoleResponse = self
            .http
            .get_json(&format!("/listings/{}/check-role/", id))
            .await?;
        Ok(response.role)
    }

    /// Attaches an item to a scanned tag.
    #[tracing::instrument(skip(self))]
    pub async fn create_listing(&self, tag_id: &str, item_id: u64) -> AppResult<Listing> {
        let body = CreateListingRequest {
            tag_id: tag_id.trim().to_string(),
            item_id,
        };
        let listing: Listing = self.http.post_json("/listings/", &body).await?;
        tracing::info!("Created listing {} on tag {}", listing.id, body.tag_id);
        Ok(listing)
    }

    #[tracing::instrument(skip(self))]
    pub async fn store_listings(
        &self,
        kind: StoreListingKind,
        page: Option<u32>,
    ) -> AppResult<Paginated<Listing>> {
        let query: Vec<(&str, String)> = page.map(|p| ("page", p.to_string())).into_iter().collect();
        let response: PageOrList<Listing> =
            self.http.get_json_with_query(kind.path(), &query).await?;
        Ok(response.into())
    }

    #[tracing::instrument(skip(self))]
    pub async fn recall(&self, id: ListingId) -> AppResult<()> {
        self.transition(&format!("/stores/me/listings/{}/recall/", id))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn delist(&self, id: ListingId) -> AppResult<()> {
        self.transition(&format!("/stores/me/listings/{}/delist/", id))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn replace_tag(&self, id: ListingId, new_tag_id: &str) -> AppResult<()> {
        let body = ReplaceTagRequest {
            new_tag_id: new_tag_id.trim().to_string(),
        };
        self.http
            .post_json::<_, Option<serde_json::Value>>(
                &format!("/stores/me/listings/{}/replace-tag/", id),
                &body,
            )
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, pin))]
    pub async fn collect(&self, id: ListingId, pin: &str) -> AppResult<()> {
        let body = CollectRequest {
            pin: pin.trim().to_string(),
        };
        self.http
            .post_json::<_, Option<serde_json::Value>>(
                &format!("/stores/me/recalled-listings/{}/collect/", id),
                &body,
            )
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_abandoned_tag(&self, id: ListingId) -> AppResult<()> {
        self.transition(&format!("/stores/me/abandoned-listings/{}/remove-tag/", id))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_sold_tag(&self, id: ListingId) -> AppResult<()> {
        self.transition(&format!("/stores/me/sold-listings/{}/remove-tag/", id))
            .await
    }

    async fn transition(&self, path: &str) -> AppResult<()> {
        self.http
            .post_empty::<Option<serde_json::Value>>(path)
            .await?;
        tracing::info!("Listing transition accepted: {}", path);
        Ok(())
    }
}
