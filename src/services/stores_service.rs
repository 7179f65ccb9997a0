use crate::error::AppResult;
use crate::http_client::HttpClient;
use crate::models::{Listing, PageOrList, Paginated, Store, StoreQuery};

#[derive(Clone)]
pub struct StoresService {
    http: HttpClient,
}

impl StoresService {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    #[tracing::instrument(skip(self))]
    pub async fn search_stores(&self, query: &StoreQuery) -> AppResult<Paginated<Store>> {
        let response: PageOrList<Store> = self.http.get_json_with_query("/stores/", query).await?;
        Ok(response.into())
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_store(&self, id: u64) -> AppResult<Store> {
        self.http.get_json(&format!("/stores/{}/", id)).await
    }

    /// Listings currently on sale in a store.
    #[tracing::instrument(skip(self))]
    pub async fn store_listings(&self, id: u64) -> AppResult<Paginated<Listing>> {
        let response: PageOrList<Listing> = self
            .http
            .get_json(&format!("/stores/{}/listings/", id))
            .await?;
        Ok(response.into())
    }

    /// Profile of the store owned by the signed-in account.
    #[tracing::instrument(skip(self))]
    pub async fn my_store(&self) -> AppResult<Store> {
        self.http.get_json("/stores/me/").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StubServer;
    use std::time::Duration;

    #[tokio::test]
    async fn test_search_query_string() {
        let server = StubServer::start(vec![(200, r#"[{"id": 1, "name": "Second Spin", "city": "Leeds"}]"#)]).await;
        let stores = StoresService::new(
            HttpClient::new(server.base_url.as_str(), Duration::from_secs(5)).unwrap(),
        );

        let page = stores
            .search_stores(&StoreQuery {
                search: Some("vintage shoes".to_string()),
                city: None,
                page: None,
            })
            .await
            .unwrap();
        assert_eq!(page.results[0].name, "Second Spin");

        let requests = server.finish().await;
        assert!(requests[0].starts_with("GET /stores/?search=vintage+shoes "));
    }
}
