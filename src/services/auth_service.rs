use async_trait::async_trait;

use crate::error::AppResult;
use crate::http_client::HttpClient;
use crate::models::{
    AuthStatusResponse, LoginRequest, LoginResponse, MemberSignup, MessageResponse,
    PasswordResetConfirm, PasswordResetRequest, RefreshResponse, SignupResponse, StoreSignup,
};
use crate::validation;

/// Session endpoints the auth store depends on.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn login(&self, credentials: &LoginRequest) -> AppResult<LoginResponse>;

    async fn refresh(&self) -> AppResult<RefreshResponse>;

    async fn logout(&self) -> AppResult<()>;

    async fn auth_status(&self) -> AppResult<AuthStatusResponse>;
}

#[derive(Clone)]
pub struct AuthService {
    http: HttpClient,
}

impl AuthService {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    #[tracing::instrument(skip(self, form), fields(email = %form.email))]
    pub async fn signup_member(&self, form: &MemberSignup) -> AppResult<SignupResponse> {
        validation::validate_member_signup(form)?;
        self.http
            .post_json("/signup/member/", form)
            .await
            .inspect_err(|e| tracing::error!("Member signup failed: {}", e))
    }

    #[tracing::instrument(skip(self, form), fields(email = %form.email))]
    pub async fn signup_store(&self, form: &StoreSignup) -> AppResult<SignupResponse> {
        validation::validate_store_signup(form)?;
        self.http
            .post_json("/signup/store/", form)
            .await
            .inspect_err(|e| tracing::error!("Store signup failed: {}", e))
    }

    #[tracing::instrument(skip(self, token))]
    pub async fn activate(&self, uid: &str, token: &str) -> AppResult<MessageResponse> {
        let path = format!(
            "/activate/{}/{}/",
            urlencoding::encode(uid),
            urlencoding::encode(token)
        );
        let response: Option<MessageResponse> = self
            .http
            .post_empty(&path)
            .await
            .inspect_err(|e| tracing::error!("Account activation failed: {}", e))?;
        Ok(response.unwrap_or_default())
    }

    #[tracing::instrument(skip(self))]
    pub async fn request_password_reset(&self, email: &str) -> AppResult<MessageResponse> {
        validation::validate_password_reset_request(email)?;
        let body = PasswordResetRequest {
            email: email.trim().to_string(),
        };
        let response: Option<MessageResponse> =
            self.http.post_json("/password-reset/", &body).await?;
        Ok(response.unwrap_or_default())
    }

    #[tracing::instrument(skip(self, form, confirm))]
    pub async fn confirm_password_reset(
        &self,
        form: &PasswordResetConfirm,
        confirm: &str,
    ) -> AppResult<MessageResponse> {
        validation::validate_password_reset_confirm(form, confirm)?;
        let response: Option<MessageResponse> =
            self.http.post_json("/password-reset/confirm/", form).await?;
        Ok(response.unwrap_or_default())
    }
}

#[async_trait]
impl AuthBackend for AuthService {
    #[tracing::instrument(skip(self, credentials), fields(email = %credentials.email))]
    async fn login(&self, credentials: &LoginRequest) -> AppResult<LoginResponse> {
        let response: LoginResponse = self.http.post_json("/login/", credentials).await?;
        self.http.set_bearer(Some(response.access.clone())).await;
        tracing::info!("Logged in as {:?}", response.user.role);
        Ok(response)
    }

    #[tracing::instrument(skip(self))]
    async fn refresh(&self) -> AppResult<RefreshResponse> {
        let response: RefreshResponse = self.http.post_empty("/login/refresh/").await?;
        self.http.set_bearer(Some(response.access.clone())).await;
        Ok(response)
    }

    #[tracing::instrument(skip(self))]
    async fn logout(&self) -> AppResult<()> {
        let result = self
            .http
            .post_empty::<Option<serde_json::Value>>("/logout/")
            .await
            .map(|_| ());
        // The in-memory bearer goes away whatever the server said.
        self.http.set_bearer(None).await;
        result
    }

    #[tracing::instrument(skip(self))]
    async fn auth_status(&self) -> AppResult<AuthStatusResponse> {
        let response: AuthStatusResponse = self.http.get_json("/auth-status/").await?;
        if let Some(token) = &response.access {
            self.http.set_bearer(Some(token.clone())).await;
        }
        Ok(response)
    }
}
