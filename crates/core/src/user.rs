//! User model.

use crate::Time;
use serde::{Deserialize, Serialize};

/// A registered player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Display name, also used to derive storage keys
    pub name: String,

    /// Granted device permissions
    #[serde(default)]
    pub permissions: UserPermissions,

    /// Onboarding finished
    #[serde(default)]
    pub is_setup_complete: bool,

    /// Registration time
    pub created_at: Time,

    /// Final stats were already sent for this user
    #[serde(default)]
    pub has_submitted_final_stats: bool,
}

impl User {
    /// Create a user registered at `created_at`.
    pub fn new(name: impl Into<String>, created_at: Time) -> Self {
        Self {
            name: name.into(),
            permissions: UserPermissions::default(),
            is_setup_complete: false,
            created_at,
            has_submitted_final_stats: false,
        }
    }
}

/// Device permissions a user granted during onboarding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPermissions {
    /// Location access
    pub location: bool,
    /// Camera access
    pub camera: bool,
}
