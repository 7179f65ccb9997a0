use crate::models::{AccountRole, ListingId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Login,
    MemberDashboard,
    StoreDashboard,
    Listing(ListingId),
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::Login => "/login".to_string(),
            Route::MemberDashboard => "/member/dashboard".to_string(),
            Route::StoreDashboard => "/store/dashboard".to_string(),
            Route::Listing(id) => format!("/listings/{}", id),
        }
    }

    /// Landing page for a signed-in account.
    pub fn dashboard_for(role: Option<&AccountRole>) -> Route {
        match role {
            Some(AccountRole::Member) => Route::MemberDashboard,
            Some(AccountRole::Store) => Route::StoreDashboard,
            _ => Route::Home,
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path())
    }
}
