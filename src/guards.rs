//! Access decisions for protected and public-only pages.

use tokio::sync::watch;

use crate::auth_store::{read_persisted, AuthState};
use crate::models::AccountRole;
use crate::routes::Route;
use crate::storage::SessionStorage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Loading,
    Authenticated,
    Unauthorized,
    Unauthenticated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    /// Offered to the user, never followed on its own.
    Suggested(Route),
    Automatic(Route),
}

impl Redirect {
    pub fn route(&self) -> &Route {
        match self {
            Redirect::Suggested(route) | Redirect::Automatic(route) => route,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardDecision {
    pub state: GuardState,
    pub redirect: Option<Redirect>,
}

impl GuardDecision {
    fn new(state: GuardState, redirect: Option<Redirect>) -> Self {
        Self { state, redirect }
    }

    pub fn loading() -> Self {
        Self::new(GuardState::Loading, None)
    }

    /// Whether the guarded content may be shown.
    pub fn may_render(&self) -> bool {
        self.state == GuardState::Authenticated && self.redirect.is_none()
    }

    pub fn message(&self) -> &'static str {
        match self.state {
            GuardState::Loading => "Checking your session...",
            GuardState::Authenticated => "",
            GuardState::Unauthorized => "You don't have access to this page.",
            GuardState::Unauthenticated => "Please log in to continue.",
        }
    }
}

fn role_allowed(allowed: &[AccountRole], role: Option<&AccountRole>) -> bool {
    allowed.is_empty() || role.is_some_and(|r| allowed.contains(r))
}

/// Checks the persisted record directly, so it works before any live store
/// has been initialized.
#[derive(Debug, Clone, Default)]
pub struct PermissionGate {
    pub allowed_roles: Vec<AccountRole>,
}

impl PermissionGate {
    pub fn new(allowed_roles: Vec<AccountRole>) -> Self {
        Self { allowed_roles }
    }

    pub fn evaluate(&self, storage: &dyn SessionStorage) -> GuardDecision {
        let state = match read_persisted(storage) {
            Ok(Some(state)) => state,
            Ok(None) => AuthState::default(),
            Err(e) => {
                tracing::warn!("Unreadable persisted auth state: {}", e);
                AuthState::default()
            }
        };

        if !state.is_authenticated {
            return GuardDecision::new(
                GuardState::Unauthenticated,
                Some(Redirect::Suggested(Route::Login)),
            );
        }
        if !role_allowed(&self.allowed_roles, state.role.as_ref()) {
            return GuardDecision::new(
                GuardState::Unauthorized,
                Some(Redirect::Suggested(Route::dashboard_for(state.role.as_ref()))),
            );
        }
        GuardDecision::new(GuardState::Authenticated, None)
    }
}

/// Follows the live auth state and redirects on its own once it settles.
#[derive(Debug, Clone, Default)]
pub struct AuthenticatedPage {
    pub allowed_roles: Vec<AccountRole>,
}

impl AuthenticatedPage {
    pub fn new(allowed_roles: Vec<AccountRole>) -> Self {
        Self { allowed_roles }
    }

    pub fn evaluate(&self, state: &AuthState) -> GuardDecision {
        if !state.initialization_status.is_settled() {
            return GuardDecision::loading();
        }
        if !state.is_authenticated {
            return GuardDecision::new(
                GuardState::Unauthenticated,
                Some(Redirect::Automatic(Route::Login)),
            );
        }
        if !role_allowed(&self.allowed_roles, state.role.as_ref()) {
            return GuardDecision::new(
                GuardState::Unauthorized,
                Some(Redirect::Automatic(Route::dashboard_for(state.role.as_ref()))),
            );
        }
        GuardDecision::new(GuardState::Authenticated, None)
    }

    /// Waits for initialization to settle, then decides.
    pub async fn resolve(&self, state: &mut watch::Receiver<AuthState>) -> GuardDecision {
        resolve_with(state, |s| self.evaluate(s)).await
    }
}

/// For login and signup pages: signed-in users go to their dashboard.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedirectIfAuthenticated;

impl RedirectIfAuthenticated {
    pub fn evaluate(&self, state: &AuthState) -> GuardDecision {
        if !state.initialization_status.is_settled() {
            return GuardDecision::loading();
        }
        if state.is_authenticated {
            return GuardDecision::new(
                GuardState::Authenticated,
                Some(Redirect::Automatic(Route::dashboard_for(state.role.as_ref()))),
            );
        }
        GuardDecision::new(GuardState::Unauthenticated, None)
    }

    pub async fn resolve(&self, state: &mut watch::Receiver<AuthState>) -> GuardDecision {
        resolve_with(state, |s| self.evaluate(s)).await
    }
}

async fn resolve_with<F>(state: &mut watch::Receiver<AuthState>, evaluate: F) -> GuardDecision
where
    F: Fn(&AuthState) -> GuardDecision,
{
    let settled = state
        .wait_for(|s| evaluate(s).state != GuardState::Loading)
        .await
        .map(|s| evaluate(&*s));
    match settled {
        Ok(decision) => decision,
        // Store dropped while loading.
        Err(_) => {
            let current = state.borrow().clone();
            let decision = evaluate(&current);
            if decision.state == GuardState::Loading {
                GuardDecision::new(
                    GuardState::Unauthenticated,
                    Some(Redirect::Automatic(Route::Login)),
                )
            } else {
                decision
            }
        }
    }
}
