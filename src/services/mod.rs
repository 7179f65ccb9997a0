pub mod auth_service;
pub mod checkout_service;
pub mod items_service;
pub mod listings_service;
pub mod payment_accounts_service;
pub mod stores_service;

pub use auth_service::{AuthBackend, AuthService};
pub use checkout_service::CheckoutService;
pub use items_service::ItemsService;
pub use listings_service::{ListingBackend, ListingsService, StoreListingKind};
pub use payment_accounts_service::PaymentAccountsService;
pub use stores_service::StoresService;
