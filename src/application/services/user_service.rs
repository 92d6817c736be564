//! User Service
//!
//! Profile lookup and editing.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::{User, UserRepository};
use crate::shared::error::AppError;

#[async_trait]
pub trait UserService: Send + Sync {
    async fn get_user(&self, user_id: i64) -> Result<UserDto, UserError>;

    async fn get_user_by_username(&self, username: &str) -> Result<UserDto, UserError>;

    /// Apply a partial profile update. Fields left as `None` are unchanged.
    async fn update_profile(&self, user_id: i64, update: UpdateProfileDto) -> Result<UserDto, UserError>;
}

/// User data transfer object
#[derive(Debug, Clone)]
pub struct UserDto {
    pub id: String,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub created_at: String,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_string(),
            username: user.username,
            email: user.email,
            display_name: user.display_name,
            avatar_url: user.avatar_url,
            bio: user.bio,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UpdateProfileDto {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("User not found")]
    NotFound,

    #[error("Username already taken")]
    UsernameTaken,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<UserError> for AppError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::NotFound => AppError::NotFound(err.to_string()),
            UserError::UsernameTaken => AppError::Conflict(err.to_string()),
            UserError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

pub struct UserServiceImpl<U>
where
    U: UserRepository,
{
    user_repo: Arc<U>,
}

impl<U> UserServiceImpl<U>
where
    U: UserRepository,
{
    pub fn new(user_repo: Arc<U>) -> Self {
        Self { user_repo }
    }
}

#[async_trait]
impl<U> UserService for UserServiceImpl<U>
where
    U: UserRepository + 'static,
{
    async fn get_user(&self, user_id: i64) -> Result<UserDto, UserError> {
        let user = self
            .user_repo
            .find_by_id(user_id)
            .await
            .map_err(|e| UserError::Internal(e.to_string()))?
            .ok_or(UserError::NotFound)?;

        Ok(UserDto::from(user))
    }

    async fn get_user_by_username(&self, username: &str) -> Result<UserDto, UserError> {
        let user = self
            .user_repo
            .find_by_username(username)
            .await
            .map_err(|e| UserError::Internal(e.to_string()))?
            .ok_or(UserError::NotFound)?;

        Ok(UserDto::from(user))
    }

    async fn update_profile(&self, user_id: i64, update: UpdateProfileDto) -> Result<UserDto, UserError> {
        let mut user = self
            .user_repo
            .find_by_id(user_id)
            .await
            .map_err(|e| UserError::Internal(e.to_string()))?
            .ok_or(UserError::NotFound)?;

        if let Some(new_username) = update.username {
            if new_username != user.username {
                let exists = self
                    .user_repo
                    .username_exists(&new_username)
                    .await
                    .map_err(|e| UserError::Internal(e.to_string()))?;

                if exists {
                    return Err(UserError::UsernameTaken);
                }
                user.username = new_username;
            }
        }

        if let Some(display_name) = update.display_name {
            user.display_name = Some(display_name);
        }
        if let Some(avatar_url) = update.avatar_url {
            user.avatar_url = Some(avatar_url);
        }
        if let Some(bio) = update.bio {
            user.bio = Some(bio);
        }
        user.updated_at = Utc::now();

        let updated = self.user_repo.update(&user).await.map_err(|e| match e {
            AppError::Conflict(_) => UserError::UsernameTaken,
            e => UserError::Internal(e.to_string()),
        })?;

        Ok(UserDto::from(updated))
    }
}
