//! Listing actions: one local precondition check, one request, then either
//! a reload of the listing screen or a redirect to checkout.

use crate::error_messages::{self, ErrorKind, UserFacingError};
use crate::listing_state::{map_listing, ListingAction, ListingBranch, ListingScreen};
use crate::models::{CheckoutSession, Listing, ListingId, UserListingRelation};
use crate::services::ListingBackend;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingCommand {
    Recall,
    Delist,
    ReplaceTag { new_tag_id: String },
    Collect { pin: String },
    RemoveAbandonedTag,
    RemoveSoldTag,
    Checkout,
}

impl ListingCommand {
    /// Command behind an action offered on the listing screen.
    pub fn for_action(
        action: ListingAction,
        branch: &ListingBranch,
        pin: Option<&str>,
    ) -> Option<ListingCommand> {
        match (action, branch) {
            (ListingAction::Checkout, _) => Some(ListingCommand::Checkout),
            (ListingAction::Recall, _) => Some(ListingCommand::Recall),
            (ListingAction::CollectWithPin, _) => Some(ListingCommand::Collect {
                pin: pin.unwrap_or_default().to_string(),
            }),
            (ListingAction::RemoveTag, ListingBranch::Abandoned) => {
                Some(ListingCommand::RemoveAbandonedTag)
            }
            // The store takes the tag off a recalled item by delisting it.
            (ListingAction::RemoveTag, ListingBranch::Recalled) => Some(ListingCommand::Delist),
            (ListingAction::ConfirmPurchase, _) => Some(ListingCommand::RemoveSoldTag),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionSuccess {
    /// Re-fetch the listing and render it again.
    Reload,
    /// Send the user to this URL (hosted checkout).
    Redirect(String),
}

fn validate(command: &ListingCommand) -> Result<(), UserFacingError> {
    match command {
        ListingCommand::Collect { pin } if pin.trim().is_empty() => Err(
            UserFacingError::validation("pin", "Enter the PIN from your recall confirmation."),
        ),
        ListingCommand::ReplaceTag { new_tag_id } if new_tag_id.trim().is_empty() => Err(
            UserFacingError::validation("new_tag_id", "Scan or enter the new tag ID."),
        ),
        _ => Ok(()),
    }
}

#[tracing::instrument(skip(backend, command))]
pub async fn dispatch<B>(
    backend: &B,
    listing_id: ListingId,
    command: &ListingCommand,
) -> Result<ActionSuccess, UserFacingError>
where
    B: ListingBackend + ?Sized,
{
    validate(command)?;

    let result = match command {
        ListingCommand::Recall => backend.recall(listing_id).await,
        ListingCommand::Delist => backend.delist(listing_id).await,
        ListingCommand::ReplaceTag { new_tag_id } => {
            backend.replace_tag(listing_id, new_tag_id).await
        }
        ListingCommand::Collect { pin } => backend.collect(listing_id, pin).await,
        ListingCommand::RemoveAbandonedTag => backend.remove_abandoned_tag(listing_id).await,
        ListingCommand::RemoveSoldTag => backend.remove_sold_tag(listing_id).await,
        ListingCommand::Checkout => {
            return match backend.checkout_item(listing_id).await {
                Ok(CheckoutSession {
                    checkout_url: Some(url),
                    ..
                }) => Ok(ActionSuccess::Redirect(url)),
                Ok(_) => Err(UserFacingError::new(
                    ErrorKind::Unexpected,
                    error_messages::GENERIC_ERROR_MESSAGE,
                )),
                Err(e) => {
                    tracing::warn!("Checkout for listing {} failed: {}", listing_id, e);
                    Err(error_messages::surface(&e))
                }
            };
        }
    };

    result.map(|()| ActionSuccess::Reload).map_err(|e| {
        tracing::warn!("Action on listing {} failed: {}", listing_id, e);
        error_messages::surface(&e)
    })
}

#[derive(Debug, Clone)]
pub struct ListingPage {
    pub listing: Option<Listing>,
    pub relation: Option<UserListingRelation>,
    pub screen: ListingScreen,
}

/// Fetches a listing and the viewer's relation to it, and maps both onto
/// the screen to render.
#[tracing::instrument(skip(backend))]
pub async fn load_listing_page<B>(backend: &B, listing_id: ListingId) -> Result<ListingPage, UserFacingError>
where
    B: ListingBackend + ?Sized,
{
    let listing = backend
        .get_listing(listing_id)
        .await
        .map_err(|e| error_messages::surface(&e))?;

    let relation = match backend.check_role(listing_id).await {
        Ok(relation) => relation,
        // Anonymous viewers are guests.
        Err(e) if matches!(e.status(), Some(401) | Some(403)) => Some(UserListingRelation::Guest),
        Err(e) => {
            tracing::warn!("Role check for listing {} failed: {}", listing_id, e);
            None
        }
    };

    let screen = map_listing(listing.as_ref(), relation);
    Ok(ListingPage {
        listing,
        relation,
        screen,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ApiErrorBody, AppError, AppResult};
    use crate::models::{ItemDetails, ListingStatus};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeListings {
        calls: Mutex<Vec<String>>,
        fail_with: Option<fn() -> AppError>,
        status: Option<&'static str>,
        role_error: Option<u16>,
    }

    impl FakeListings {
        fn record(&self, call: String) -> AppResult<()> {
            self.calls.lock().unwrap().push(call);
            match self.fail_with {
                Some(make) => Err(make()),
                None => Ok(()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ListingBackend for FakeListings {
        async fn get_listing(&self, id: ListingId) -> AppResult<Option<Listing>> {
            Ok(self.status.map(|status| Listing {
                id,
                tag_id: Some("T-1".to_string()),
                store: Some(1),
                store_name: None,
                item: Some(3),
                item_details: Some(ItemDetails {
                    status: Some(ListingStatus::from(status.to_string())),
                    ..ItemDetails::default()
                }),
                created_at: None,
            }))
        }

        async fn check_role(&self, _id: ListingId) -> AppResult<Option<UserListingRelation>> {
            match self.role_error {
                Some(status) => Err(AppError::Api {
                    status,
                    body: ApiErrorBody::default(),
                }),
                None => Ok(Some(UserListingRelation::Host)),
            }
        }

        async fn recall(&self, id: ListingId) -> AppResult<()> {
            self.record(format!("recall {}", id))
        }

        async fn delist(&self, id: ListingId) -> AppResult<()> {
            self.record(format!("delist {}", id))
        }

        async fn replace_tag(&self, id: ListingId, new_tag_id: &str) -> AppResult<()> {
            self.record(format!("replace-tag {} {}", id, new_tag_id))
        }

        async fn collect(&self, id: ListingId, pin: &str) -> AppResult<()> {
            self.record(format!("collect {} {}", id, pin))
        }

        async fn remove_abandoned_tag(&self, id: ListingId) -> AppResult<()> {
            self.record(format!("remove-abandoned {}", id))
        }

        async fn remove_sold_tag(&self, id: ListingId) -> AppResult<()> {
            self.record(format!("remove-sold {}", id))
        }

        async fn checkout_item(&self, id: ListingId) -> AppResult<CheckoutSession> {
            self.record(format!("checkout {}", id))?;
            Ok(CheckoutSession {
                checkout_url: Some("https://checkout.stripe.com/c/pay/cs_test".to_string()),
                session_id: None,
            })
        }
    }

    #[tokio::test]
    async fn test_blank_pin_fails_without_request() {
        let backend = FakeListings::default();
        let err = dispatch(&backend, 4, &ListingCommand::Collect { pin: "  ".to_string() })
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(err.field.as_deref(), Some("pin"));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_blank_tag_fails_without_request() {
        let backend = FakeListings::default();
        let command = ListingCommand::ReplaceTag {
            new_tag_id: String::new(),
        };
        assert!(dispatch(&backend, 4, &command).await.is_err());
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_each_command_calls_one_endpoint() {
        let backend = FakeListings::default();
        let commands = [
            ListingCommand::Recall,
            ListingCommand::Delist,
            ListingCommand::ReplaceTag {
                new_tag_id: "T-2".to_string(),
            },
            ListingCommand::Collect {
                pin: "4821".to_string(),
            },
            ListingCommand::RemoveAbandonedTag,
            ListingCommand::RemoveSoldTag,
        ];
        for command in &commands {
            assert_eq!(
                dispatch(&backend, 9, command).await.unwrap(),
                ActionSuccess::Reload
            );
        }
        assert_eq!(
            backend.calls(),
            vec![
                "recall 9",
                "delist 9",
                "replace-tag 9 T-2",
                "collect 9 4821",
                "remove-abandoned 9",
                "remove-sold 9",
            ]
        );
    }

    #[tokio::test]
    async fn test_checkout_redirects() {
        let backend = FakeListings::default();
        let outcome = dispatch(&backend, 2, &ListingCommand::Checkout).await.unwrap();
        assert_eq!(
            outcome,
            ActionSuccess::Redirect("https://checkout.stripe.com/c/pay/cs_test".to_string())
        );
    }

    #[tokio::test]
    async fn test_failure_is_surfaced() {
        let backend = FakeListings {
            fail_with: Some(|| AppError::Api {
                status: 400,
                body: ApiErrorBody::parse(r#"{"detail": "Incorrect PIN"}"#),
            }),
            ..FakeListings::default()
        };
        let err = dispatch(&backend, 4, &ListingCommand::Collect { pin: "0000".to_string() })
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Domain);
        assert!(err.message.contains("PIN is incorrect"));
        assert_eq!(backend.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_load_listing_page() {
        let backend = FakeListings {
            status: Some("sold"),
            ..FakeListings::default()
        };
        let page = load_listing_page(&backend, 5).await.unwrap();
        assert_eq!(page.screen.branch, ListingBranch::Sold);
        assert_eq!(page.screen.actions, vec![ListingAction::ConfirmPurchase]);

        let anonymous = FakeListings {
            status: Some("listed"),
            role_error: Some(401),
            ..FakeListings::default()
        };
        let page = load_listing_page(&anonymous, 5).await.unwrap();
        assert_eq!(page.relation, Some(UserListingRelation::Guest));
        assert!(page.screen.allows(ListingAction::Checkout));

        let vacant = FakeListings::default();
        let page = load_listing_page(&vacant, 5).await.unwrap();
        assert_eq!(page.screen.branch, ListingBranch::VacantTag);
    }

    #[test]
    fn test_command_for_screen_action() {
        assert_eq!(
            ListingCommand::for_action(ListingAction::RemoveTag, &ListingBranch::Abandoned, None),
            Some(ListingCommand::RemoveAbandonedTag)
        );
        assert_eq!(
            ListingCommand::for_action(ListingAction::RemoveTag, &ListingBranch::Recalled, None),
            Some(ListingCommand::Delist)
        );
        assert_eq!(
            ListingCommand::for_action(ListingAction::ListItem, &ListingBranch::VacantTag, None),
            None
        );
    }
}
