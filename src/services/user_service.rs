use crate::auth::{Identity, IdentityVerifier};
use crate::error::{AppError, AppResult};
use crate::models::{ProfileUpdate, User, UserRole};
use crate::repositories::UserRepository;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Service resolving identities to users and managing profiles
pub struct UserService {
    user_repo: Arc<UserRepository>,
    verifier: IdentityVerifier,
}

impl UserService {
    pub fn new(user_repo: Arc<UserRepository>, verifier: IdentityVerifier) -> Self {
        Self {
            user_repo,
            verifier,
        }
    }

    /// Upsert the user behind a verified identity
    pub async fn store(&self, identity: &Identity) -> AppResult<User> {
        self.verifier.verify(identity)?;

        let email = identity
            .email
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| AppError::Validation("Identity has no email address".to_string()))?;

        let user = self
            .user_repo
            .upsert_from_identity(
                &identity.subject,
                email,
                identity.name.as_deref(),
                identity.picture_url.as_deref(),
            )
            .await?;

        info!("Stored user {} ({})", user.id, user.external_id);
        Ok(user)
    }

    /// User behind an identity, or None when anonymous or not yet stored
    pub async fn current_user(&self, identity: Option<&Identity>) -> AppResult<Option<User>> {
        let Some(identity) = identity else {
            return Ok(None);
        };
        self.verifier.verify(identity)?;
        Ok(self.user_repo.find_by_external_id(&identity.subject).await?)
    }

    /// User behind an identity; stores the user on first sight
    pub async fn require_user(&self, identity: Option<&Identity>) -> AppResult<User> {
        let identity =
            identity.ok_or_else(|| AppError::Unauthorized("Not authenticated".to_string()))?;
        self.verifier.verify(identity)?;

        match self.user_repo.find_by_external_id(&identity.subject).await? {
            Some(user) => Ok(user),
            None => self.store(identity).await,
        }
    }

    pub async fn get_by_id(&self, user_id: Uuid) -> AppResult<Option<User>> {
        Ok(self.user_repo.find_by_id(user_id).await?)
    }

    pub async fn update_profile(&self, caller: &User, update: ProfileUpdate) -> AppResult<User> {
        update.validate().map_err(AppError::Validation)?;

        self.user_repo
            .update_profile(caller.id, &update)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    /// Admin-only role change
    pub async fn update_role(&self, caller: &User, user_id: Uuid, role: UserRole) -> AppResult<User> {
        if !caller.is_admin() {
            return Err(AppError::Forbidden(
                "Only admins can change roles".to_string(),
            ));
        }

        let user = self
            .user_repo
            .update_role(user_id, role)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        info!("User {} role set to {} by {}", user.id, role.as_str(), caller.id);
        Ok(user)
    }
}
