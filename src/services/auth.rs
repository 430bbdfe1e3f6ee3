//! Registration, login and user management

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use std::sync::Arc;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::{CreateUser, UpdateUser, UserClaims, UserInfo, UserQuery},
    repository::UserStore,
};

const DEFAULT_PER_PAGE: i64 = 20;
const MAX_PER_PAGE: i64 = 100;

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, config: AuthConfig) -> Self {
        Self { users, config }
    }

    /// Register a new user and return a token for it
    pub async fn register(&self, username: &str, password: &str) -> AppResult<String> {
        let username = username.trim();
        let password_hash = self.hash_password(password)?;
        let user = self.users.create_user(username, &password_hash, None).await?;
        tracing::info!(username = %user.username, "User registered");
        self.issue_token(&user.username)
    }

    /// Verify credentials and return a fresh token
    pub async fn login(&self, username: &str, password: &str) -> AppResult<String> {
        let user = self
            .users
            .find_by_username(username.trim())
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid credentials".to_string()))?;

        if !self.verify_password(password, &user.password_hash)? {
            tracing::warn!(username = %user.username, "Login rejected");
            return Err(AppError::Authentication("Invalid credentials".to_string()));
        }

        self.issue_token(&user.username)
    }

    /// Create a user on behalf of an authenticated caller
    pub async fn create_user(&self, request: CreateUser) -> AppResult<UserInfo> {
        let username = request.username.trim();
        if username.is_empty() {
            return Err(AppError::Validation("username is required".to_string()));
        }
        let password_hash = self.hash_password(&request.password)?;
        let user = self
            .users
            .create_user(username, &password_hash, request.email.as_deref())
            .await?;
        tracing::info!(id = user.id, username = %user.username, "User created");
        Ok(user.into())
    }

    pub async fn get_user(&self, id: i32) -> AppResult<UserInfo> {
        self.users
            .find_by_id(id)
            .await?
            .map(UserInfo::from)
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    pub async fn update_user(&self, id: i32, request: UpdateUser) -> AppResult<UserInfo> {
        let username = request.username.as_deref().map(str::trim);
        if username == Some("") {
            return Err(AppError::Validation("username is required".to_string()));
        }
        let password_hash = request
            .password
            .as_deref()
            .map(|password| self.hash_password(password))
            .transpose()?;

        let user = self
            .users
            .update_user(id, username, password_hash.as_deref(), request.email.as_deref())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))?;
        tracing::info!(id, username = %user.username, "User updated");
        Ok(user.into())
    }

    /// Soft-delete a user. Tokens already issued stay valid until they expire.
    pub async fn delete_user(&self, id: i32) -> AppResult<()> {
        if self.users.delete_user(id).await? == 0 {
            return Err(AppError::NotFound(format!("User with id {} not found", id)));
        }
        tracing::info!(id, "User deleted");
        Ok(())
    }

    /// One page of active users with the total active count
    pub async fn list_users(&self, query: &UserQuery) -> AppResult<(Vec<UserInfo>, i64)> {
        let page = query.page.unwrap_or(1);
        if page < 1 {
            return Err(AppError::Validation("page must be at least 1".to_string()));
        }
        let per_page = query.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);

        let (users, total) = self.users.list_users(per_page, (page - 1).saturating_mul(per_page)).await?;
        Ok((users.into_iter().map(UserInfo::from).collect(), total))
    }

    /// Decode and validate a bearer token
    pub fn verify_token(&self, token: &str) -> AppResult<UserClaims> {
        UserClaims::from_token(token, &self.config.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))
    }

    fn issue_token(&self, username: &str) -> AppResult<String> {
        UserClaims::new(username, self.config.jwt_expiration_hours)
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    /// Hash a password using Argon2
    fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }

    fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::InMemoryUserStore;

    fn service() -> AuthService {
        AuthService::new(Arc::new(InMemoryUserStore::default()), AuthConfig::default())
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let auth = service();
        let token = auth.register("alice", "wonderland").await.unwrap();
        assert_eq!(auth.verify_token(&token).unwrap().sub, "alice");

        let token = auth.login("alice", "wonderland").await.unwrap();
        assert_eq!(auth.verify_token(&token).unwrap().sub, "alice");
    }

    #[tokio::test]
    async fn test_login_rejects_bad_password() {
        let auth = service();
        auth.register("alice", "wonderland").await.unwrap();
        assert!(matches!(
            auth.login("alice", "looking-glass").await,
            Err(AppError::Authentication(_))
        ));
        assert!(matches!(
            auth.login("bob", "wonderland").await,
            Err(AppError::Authentication(_))
        ));
    }

    #[tokio::test]
    async fn test_register_duplicate_is_conflict() {
        let auth = service();
        auth.register("alice", "wonderland").await.unwrap();
        assert!(matches!(
            auth.register("alice", "again!").await,
            Err(AppError::Conflict(_))
        ));
        assert_eq!(auth.list_users(&UserQuery::default()).await.unwrap().1, 1);
    }

    #[tokio::test]
    async fn test_deleted_user_cannot_log_in() {
        let auth = service();
        auth.register("alice", "wonderland").await.unwrap();
        let alice = auth.list_users(&UserQuery::default()).await.unwrap().0.remove(0);

        auth.delete_user(alice.id).await.unwrap();
        assert!(matches!(
            auth.login("alice", "wonderland").await,
            Err(AppError::Authentication(_))
        ));
        assert!(matches!(auth.get_user(alice.id).await, Err(AppError::NotFound(_))));
        assert!(matches!(auth.delete_user(alice.id).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_password_changes_login() {
        let auth = service();
        auth.register("alice", "wonderland").await.unwrap();
        let id = auth.list_users(&UserQuery::default()).await.unwrap().0[0].id;

        let updated = auth
            .update_user(
                id,
                UpdateUser {
                    password: Some("looking-glass".to_string()),
                    email: Some("alice@example.com".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.email.as_deref(), Some("alice@example.com"));
        assert!(auth.login("alice", "wonderland").await.is_err());
        assert!(auth.login("alice", "looking-glass").await.is_ok());
    }

    #[tokio::test]
    async fn test_list_users_paginates() {
        let auth = service();
        for name in ["carol", "alice", "bob"] {
            auth.create_user(CreateUser {
                username: name.to_string(),
                password: "secret-pass".to_string(),
                email: None,
            })
            .await
            .unwrap();
        }

        let query = UserQuery {
            page: Some(2),
            per_page: Some(2),
        };
        let (users, total) = auth.list_users(&query).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].username, "carol");

        let query = UserQuery {
            page: Some(0),
            per_page: None,
        };
        assert!(matches!(auth.list_users(&query).await, Err(AppError::Validation(_))));
    }
}
