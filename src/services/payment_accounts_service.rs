use crate::error::AppResult;
use crate::http_client::HttpClient;
use crate::models::{AccountLink, PaymentAccountStatus};

#[derive(Clone)]
pub struct PaymentAccountsService {
    http: HttpClient,
}

impl PaymentAccountsService {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    #[tracing::instrument(skip(self))]
    pub async fn status(&self) -> AppResult<PaymentAccountStatus> {
        match self.http.get_json("/payment-accounts/").await {
            Ok(status) => Ok(status),
            // No account created yet.
            Err(e) if e.is_not_found() => Ok(PaymentAccountStatus::default()),
            Err(e) => Err(e),
        }
    }

    /// Link to the hosted onboarding form; creates the account if needed.
    #[tracing::instrument(skip(self))]
    pub async fn onboarding_link(&self) -> AppResult<AccountLink> {
        self.http
            .post_empty("/payment-accounts/onboarding-link/")
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn dashboard_link(&self) -> AppResult<AccountLink> {
        self.http
            .post_empty("/payment-accounts/dashboard-link/")
            .await
    }
}
