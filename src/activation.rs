//! Account activation from the link sent by email.

use async_trait::async_trait;

use crate::error::AppResult;
use crate::error_messages::{self, UserFacingError};
use crate::models::MessageResponse;
use crate::services::AuthService;

const ACTIVATED_MESSAGE: &str = "Your account has been activated. You can now log in.";

#[async_trait]
pub trait ActivationBackend: Send + Sync {
    async fn activate(&self, uid: &str, token: &str) -> AppResult<MessageResponse>;
}

#[async_trait]
impl ActivationBackend for AuthService {
    async fn activate(&self, uid: &str, token: &str) -> AppResult<MessageResponse> {
        AuthService::activate(self, uid, token).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationState {
    /// The link is missing its user id or token.
    InvalidLink,
    Activated(String),
    Failed(UserFacingError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationParams {
    pub uid: String,
    pub token: String,
}

/// Reads `uuid` (or `uid`) and `token` from a link or its query string.
pub fn parse_activation_link(link: &str) -> Option<ActivationParams> {
    let query = link.split_once('?').map_or(link, |(_, q)| q);
    let query = query.split('#').next().unwrap_or_default();

    let mut uid = None;
    let mut token = None;
    for pair in query.split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let value = urlencoding::decode(&value.replace('+', " "))
            .map(|v| v.trim().to_string())
            .ok()
            .filter(|v| !v.is_empty());
        match key {
            "uuid" | "uid" => uid = uid.or(value),
            "token" => token = token.or(value),
            _ => {}
        }
    }

    Some(ActivationParams {
        uid: uid?,
        token: token?,
    })
}

/// Runs the activation for `link`. Incomplete links never reach the API.
pub async fn activate_from_link<B>(backend: &B, link: &str) -> ActivationState
where
    B: ActivationBackend + ?Sized,
{
    let Some(params) = parse_activation_link(link) else {
        tracing::warn!("Activation link is missing uuid or token");
        return ActivationState::InvalidLink;
    };

    match backend.activate(&params.uid, &params.token).await {
        Ok(response) => ActivationState::Activated(
            response
                .message
                .unwrap_or_else(|| ACTIVATED_MESSAGE.to_string()),
        ),
        Err(e) => {
            tracing::error!("Activation failed for {}: {}", params.uid, e);
            ActivationState::Failed(error_messages::surface(&e))
        }
    }
}
