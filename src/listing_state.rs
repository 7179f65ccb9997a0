//! Maps a fetched listing and the viewer's relation to it onto the screen
//! branch to render and the actions that branch offers.
//!
//! The lifecycle itself lives on the server; nothing here mutates state.

use crate::models::{Listing, ListingStatus, UserListingRelation};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingBranch {
    /// Tag without an item attached.
    VacantTag,
    Active,
    Recalled,
    Abandoned,
    Sold,
    /// Status the client does not know how to render (includes `delisted`).
    Unknown(Option<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingAction {
    /// Attach one of the viewer's items to this tag.
    ListItem,
    Checkout,
    Recall,
    CollectWithPin,
    RemoveTag,
    /// Remove the tag of a sold item, confirming the purchase was handed over.
    ConfirmPurchase,
}

impl ListingAction {
    pub fn label(&self) -> &'static str {
        match self {
            ListingAction::ListItem => "List an item on this tag",
            ListingAction::Checkout => "Buy now",
            ListingAction::Recall => "Recall item",
            ListingAction::CollectWithPin => "Collect with PIN",
            ListingAction::RemoveTag => "Remove tag",
            ListingAction::ConfirmPurchase => "Confirm purchase and remove tag",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingScreen {
    pub branch: ListingBranch,
    pub actions: Vec<ListingAction>,
}

impl ListingScreen {
    pub fn allows(&self, action: ListingAction) -> bool {
        self.actions.contains(&action)
    }
}

pub fn map_listing(
    listing: Option<&Listing>,
    relation: Option<UserListingRelation>,
) -> ListingScreen {
    use ListingAction::*;
    use UserListingRelation::*;

    let listing = match listing {
        Some(l) if !l.is_vacant() => l,
        _ => {
            let actions = match relation {
                Some(Owner) => vec![ListItem],
                _ => vec![],
            };
            return ListingScreen {
                branch: ListingBranch::VacantTag,
                actions,
            };
        }
    };

    let (branch, actions) = match listing.status() {
        Some(ListingStatus::Listed) => (
            ListingBranch::Active,
            match relation {
                Some(Guest) => vec![Checkout],
                Some(Owner) | Some(Host) => vec![Recall],
                None => vec![],
            },
        ),
        Some(ListingStatus::Recalled) => (
            ListingBranch::Recalled,
            match relation {
                Some(Owner) => vec![CollectWithPin],
                Some(Host) => vec![RemoveTag],
                _ => vec![],
            },
        ),
        Some(ListingStatus::Abandoned) => (
            ListingBranch::Abandoned,
            match relation {
                Some(Host) => vec![RemoveTag],
                _ => vec![],
            },
        ),
        Some(ListingStatus::Sold) => (
            ListingBranch::Sold,
            match relation {
                Some(Host) => vec![ConfirmPurchase],
                _ => vec![],
            },
        ),
        other => {
            tracing::warn!("Listing {} has unexpected status {:?}", listing.id, other);
            (
                ListingBranch::Unknown(other.map(|s| s.as_str().to_string())),
                vec![],
            )
        }
    };

    ListingScreen { branch, actions }
}
