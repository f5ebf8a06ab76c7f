//! User directory - the current-session user and the registry of all users.

use crate::key::progress_key;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use yapp_core::{Time, User, UserPermissions};
use yapp_storage::{keys, load_json, save_json, KeyValueStore, StorageError};

/// Errors from user bookkeeping.
#[derive(Debug, thiserror::Error)]
pub enum UserError {
    /// Underlying storage failed
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The operation needs a logged-in user
    #[error("no user is logged in")]
    NoCurrentUser,
}

/// Identity of the player the engine is serving.
#[async_trait]
pub trait UserProvider: Send + Sync {
    /// Name of the current user, if one is logged in.
    async fn current_user_name(&self) -> Option<String>;

    /// Whether final stats were already sent for the current user.
    async fn has_submitted_final_stats(&self) -> bool;

    /// Record that final stats were sent for the current user.
    async fn mark_final_stats_submitted(&self) -> Result<(), UserError>;

    /// Drop the current session.
    async fn end_session(&self) -> Result<(), UserError>;
}

/// [`UserProvider`] backed by the `yapp_user` / `yapp_users` keys.
pub struct UserDirectory {
    store: Arc<dyn KeyValueStore>,
    current: RwLock<Option<User>>,
}

impl UserDirectory {
    /// Load the current-session user from storage.
    ///
    /// An unreadable session record is discarded rather than treated as fatal.
    pub async fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let current = match load_json::<User>(store.as_ref(), keys::CURRENT_USER).await {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "failed to parse stored user, discarding it");
                if let Err(e) = store.remove(keys::CURRENT_USER).await {
                    warn!(error = %e, "failed to remove unreadable user record");
                }
                None
            }
        };

        Self {
            store,
            current: RwLock::new(current),
        }
    }

    /// The logged-in user.
    pub async fn current(&self) -> Option<User> {
        self.current.read().await.clone()
    }

    /// Every registered user.
    pub async fn all_users(&self) -> Result<Vec<User>, UserError> {
        match load_json::<Vec<User>>(self.store.as_ref(), keys::ALL_USERS).await {
            Ok(users) => Ok(users.unwrap_or_default()),
            Err(StorageError::Json(e)) => {
                warn!(error = %e, "user registry is unreadable, treating it as empty");
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Make `user` the current session and upsert it into the registry.
    ///
    /// The in-memory session is updated first, so a failed write still leaves
    /// the process with the new state; the storage error is returned.
    pub async fn save_user(&self, user: User) -> Result<(), UserError> {
        *self.current.write().await = Some(user.clone());
        if let Err(e) = self.persist_user(&user).await {
            warn!(user = %user.name, error = %e, "failed to persist user");
            return Err(e);
        }
        Ok(())
    }

    async fn persist_user(&self, user: &User) -> Result<(), UserError> {
        save_json(self.store.as_ref(), keys::CURRENT_USER, user).await?;

        let mut users = self.all_users().await?;
        match users.iter_mut().find(|u| u.name == user.name) {
            Some(existing) => *existing = user.clone(),
            None => users.push(user.clone()),
        }
        save_json(self.store.as_ref(), keys::ALL_USERS, &users).await?;
        Ok(())
    }

    /// Log in as `name`, registering the user on first sight.
    pub async fn register(&self, name: &str, now: Time) -> Result<User, UserError> {
        let existing = self.all_users().await?.into_iter().find(|u| u.name == name);
        let user = match existing {
            Some(user) => {
                info!(user = %user.name, "returning user logged in");
                user
            }
            None => {
                info!(user = %name, "registered new user");
                User::new(name, now)
            }
        };
        self.save_user(user.clone()).await?;
        Ok(user)
    }

    /// Merge permission grants into the current user.
    pub async fn update_permissions(&self, permissions: UserPermissions) -> Result<(), UserError> {
        let mut user = self.current().await.ok_or(UserError::NoCurrentUser)?;
        user.permissions = permissions;
        self.save_user(user).await
    }

    /// Mark onboarding as finished for the current user.
    pub async fn complete_setup(&self) -> Result<(), UserError> {
        let mut user = self.current().await.ok_or(UserError::NoCurrentUser)?;
        user.is_setup_complete = true;
        self.save_user(user).await
    }

    /// End the session, keeping the user's progress and registry entry.
    pub async fn logout(&self) -> Result<(), UserError> {
        self.store.remove(keys::CURRENT_USER).await?;
        *self.current.write().await = None;
        Ok(())
    }

    /// Delete the current user's progress and end the session.
    pub async fn clear_user_data(&self) -> Result<(), UserError> {
        if let Some(user) = self.current().await {
            if !user.name.is_empty() {
                self.store.remove(&progress_key(Some(&user.name))).await?;
            }
        }
        self.logout().await
    }
}

#[async_trait]
impl UserProvider for UserDirectory {
    async fn current_user_name(&self) -> Option<String> {
        self.current.read().await.as_ref().map(|u| u.name.clone())
    }

    async fn has_submitted_final_stats(&self) -> bool {
        self.current
            .read()
            .await
            .as_ref()
            .is_some_and(|u| u.has_submitted_final_stats)
    }

    async fn mark_final_stats_submitted(&self) -> Result<(), UserError> {
        let mut user = self.current().await.ok_or(UserError::NoCurrentUser)?;
        user.has_submitted_final_stats = true;
        self.save_user(user).await
    }

    async fn end_session(&self) -> Result<(), UserError> {
        self.logout().await
    }
}
