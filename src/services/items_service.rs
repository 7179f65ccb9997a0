use crate::error::{AppError, AppResult};
use crate::http_client::HttpClient;
use crate::models::{Item, ItemUpdate, NewItem, PageOrList, Paginated};
use crate::validation;

/// Member-owned items, before and while they hang on a tag.
#[derive(Clone)]
pub struct ItemsService {
    http: HttpClient,
}

impl ItemsService {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_items(&self) -> AppResult<Paginated<Item>> {
        let response: PageOrList<Item> = self.http.get_json("/items/").await?;
        Ok(response.into())
    }

    #[tracing::instrument(skip(self, item), fields(name = %item.name, images = item.images.len()))]
    pub async fn create_item(&self, item: NewItem) -> AppResult<Item> {
        validation::validate_new_item(&item)?;
        let form = item.into_form()?;
        let created: Item = self.http.post_multipart("/items/", form).await?;
        tracing::info!("Created item {}", created.id);
        Ok(created)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_item(&self, id: u64) -> AppResult<Item> {
        self.http.get_json(&format!("/items/{}/", id)).await
    }

    #[tracing::instrument(skip(self, update))]
    pub async fn update_item(&self, id: u64, update: &ItemUpdate) -> AppResult<Item> {
        if let Some(name) = &update.name {
            if name.trim().is_empty() {
                return Err(AppError::validation("name", "Name is required."));
            }
        }
        self.http
            .patch_json(&format!("/items/{}/", id), update)
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_item(&self, id: u64) -> AppResult<()> {
        self.http.delete(&format!("/items/{}/", id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ImageUpload;
    use crate::test_support::StubServer;
    use std::time::Duration;

    fn service(base_url: &str) -> ItemsService {
        ItemsService::new(HttpClient::new(base_url, Duration::from_secs(5)).unwrap())
    }

    #[tokio::test]
    async fn test_create_item_sends_multipart() {
        let server = StubServer::start(vec![(201, r#"{"id": 31, "name": "Lamp", "price": "15.00"}"#)]).await;
        let items = service(&server.base_url);

        let created = items
            .create_item(NewItem {
                name: "Lamp".to_string(),
                description: "Brass".to_string(),
                condition: "good".to_string(),
                category: "home".to_string(),
                price: 15.0,
                images: vec![ImageUpload {
                    file_name: "lamp.png".to_string(),
                    mime: "image/png",
                    bytes: b"png-bytes".to_vec(),
                }],
            })
            .await
            .unwrap();
        assert_eq!(created.id, 31);
        assert_eq!(created.price, Some(15.0));

        let requests = server.finish().await;
        let request = &requests[0];
        assert!(request.starts_with("POST /items/ "));
        assert!(request
            .to_ascii_lowercase()
            .contains("content-type: multipart/form-data"));
        assert!(request.contains(r#"filename="lamp.png""#));
        assert!(request.contains("15.00"));
    }

    #[tokio::test]
    async fn test_invalid_item_is_not_sent() {
        let items = service("http://127.0.0.1:9");
        let err = items
            .create_item(NewItem {
                name: String::new(),
                description: String::new(),
                condition: "good".to_string(),
                category: "home".to_string(),
                price: 1.0,
                images: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(ref f) if f.contains_key("name")));
    }

    #[tokio::test]
    async fn test_delete_item() {
        let server = StubServer::start(vec![(204, "")]).await;
        let items = service(&server.base_url);

        items.delete_item(8).await.unwrap();
        let requests = server.finish().await;
        assert!(requests[0].starts_with("DELETE /items/8/ "));
    }
}
