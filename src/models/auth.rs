use serde::{Deserialize, Serialize};

/// Account type reported by the backend in `user.role`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AccountRole {
    Member,
    Store,
    Other(String),
}

impl AccountRole {
    pub fn as_str(&self) -> &str {
        match self {
            AccountRole::Member => "member",
            AccountRole::Store => "store",
            AccountRole::Other(s) => s,
        }
    }
}

impl From<String> for AccountRole {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "member" => AccountRole::Member,
            "store" => AccountRole::Store,
            _ => AccountRole::Other(value),
        }
    }
}

impl From<AccountRole> for String {
    fn from(value: AccountRole) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for AccountRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserSummary {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<AccountRole>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(alias = "token", alias = "access_token")]
    pub access: String,
    #[serde(default)]
    pub user: UserSummary,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    #[serde(alias = "token", alias = "access_token")]
    pub access: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthStatusResponse {
    #[serde(default, alias = "authenticated")]
    pub is_authenticated: bool,
    #[serde(default)]
    pub user: Option<UserSummary>,
    #[serde(default)]
    pub role: Option<AccountRole>,
    #[serde(default, alias = "token", alias = "access_token")]
    pub access: Option<String>,
}

impl AuthStatusResponse {
    /// `user.role` wins over a top-level `role`.
    pub fn role(&self) -> Option<AccountRole> {
        self.user
            .as_ref()
            .and_then(|u| u.role.clone())
            .or_else(|| self.role.clone())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberSignup {
    pub email: String,
    pub password: String,
    #[serde(skip)]
    pub password_confirm: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreSignup {
    pub email: String,
    pub password: String,
    #[serde(skip)]
    pub password_confirm: String,
    pub store_name: String,
    pub address: String,
    pub city: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignupResponse {
    #[serde(default, alias = "detail")]
    pub message: Option<String>,
    #[serde(default)]
    pub user: Option<UserSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PasswordResetConfirm {
    pub uid: String,
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageResponse {
    #[serde(default, alias = "detail")]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_role_parsing() {
        let role: AccountRole = serde_json::from_str(r#""STORE""#).unwrap();
        assert_eq!(role, AccountRole::Store);
        let role: AccountRole = serde_json::from_str(r#""admin""#).unwrap();
        assert_eq!(role, AccountRole::Other("admin".to_string()));
        assert_eq!(serde_json::to_string(&AccountRole::Member).unwrap(), r#""member""#);
    }

    #[test]
    fn test_login_response_role() {
        let resp: LoginResponse = serde_json::from_str(
            r#"{"access": "tok", "user": {"id": 4, "email": "a@b.c", "role": "member"}}"#,
        )
        .unwrap();
        assert_eq!(resp.access, "tok");
        assert_eq!(resp.user.role, Some(AccountRole::Member));
    }

    #[test]
    fn test_auth_status_prefers_user_role() {
        let resp: AuthStatusResponse = serde_json::from_str(
            r#"{"authenticated": true, "role": "member", "user": {"role": "store"}}"#,
        )
        .unwrap();
        assert!(resp.is_authenticated);
        assert_eq!(resp.role(), Some(AccountRole::Store));
    }

    #[test]
    fn test_signup_skips_confirmation() {
        let signup = MemberSignup {
            email: "a@b.c".to_string(),
            password: "hunter22".to_string(),
            password_confirm: "hunter22".to_string(),
            first_name: "Ana".to_string(),
            last_name: "Li".to_string(),
        };
        let json = serde_json::to_value(&signup).unwrap();
        assert!(json.get("password_confirm").is_none());
        assert_eq!(json["first_name"], "Ana");
    }
}
