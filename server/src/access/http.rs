//! HTTP middlewares for access control.

use axum::{
    extract::{Extension, Request},
    middleware::Next,
    response::Response,
};
use tokio::sync::OnceCell;

use super::{hash_token, parse_authorization_header, Identity};
use crate::database::HatchDatabase;
use crate::error::{ServerError, ServerResult};
use crate::{RequestState, State};

/// Auth state.
#[derive(Debug)]
pub struct AuthState {
    /// The authenticated user.
    pub identity: OnceCell<Identity>,
}

impl AuthState {
    /// Returns an auth state with no authenticated user.
    pub fn new() -> Self {
        Self {
            identity: OnceCell::new(),
        }
    }

    /// Returns the authenticated user if it exists.
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.get()
    }

    /// Returns the authenticated user if they may upload files.
    pub fn require_uploader(&self) -> ServerResult<&Identity> {
        let identity = self.identity.get().ok_or(ServerError::Unauthorized)?;

        if !identity.can_upload() {
            return Err(ServerError::Forbidden);
        }

        Ok(identity)
    }
}

/// Performs auth.
pub async fn apply_auth(
    Extension(state): Extension<State>,
    Extension(req_state): Extension<RequestState>,
    req: Request,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|bytes| bytes.to_str().ok())
        .and_then(parse_authorization_header);

    if let Some(token) = token {
        match find_identity(&state, &token).await {
            Ok(Some(identity)) => {
                tracing::trace!("Authenticated as {}", identity.name);
                if req_state.auth.identity.set(identity).is_err() {
                    tracing::debug!("Identity already set");
                }
            }
            Ok(None) => {
                tracing::debug!("Ignoring unknown token");
            }
            Err(e) => {
                tracing::debug!("Ignoring token that could not be looked up: {}", e);
            }
        }
    }

    next.run(req).await
}

async fn find_identity(state: &State, token: &str) -> ServerResult<Option<Identity>> {
    let database = state.database().await?;
    let user = database.find_user_by_token(&hash_token(token)).await?;

    Ok(user.map(Identity::from))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(banned: bool, verified: bool) -> Identity {
        Identity {
            id: 1,
            name: "alice".to_string(),
            banned,
            verified,
        }
    }

    #[test]
    fn test_require_uploader() {
        let anonymous = AuthState::new();
        assert!(matches!(
            anonymous.require_uploader(),
            Err(ServerError::Unauthorized)
        ));

        let banned = AuthState::new();
        banned.identity.set(identity(true, true)).unwrap();
        assert!(matches!(
            banned.require_uploader(),
            Err(ServerError::Forbidden)
        ));

        let unverified = AuthState::new();
        unverified.identity.set(identity(false, false)).unwrap();
        assert!(matches!(
            unverified.require_uploader(),
            Err(ServerError::Forbidden)
        ));

        let ok = AuthState::new();
        ok.identity.set(identity(false, true)).unwrap();
        assert_eq!(1, ok.require_uploader().unwrap().id);
    }
}
