//! Well-known storage keys.

/// Suffix of the per-user progress key.
pub const HUNT_PROGRESS_SUFFIX: &str = "hunt_progress";

/// Current-session user.
pub const CURRENT_USER: &str = "yapp_user";

/// All registered users.
pub const ALL_USERS: &str = "yapp_users";

/// RFC 3339 timestamp written when the app goes to the background.
pub const APP_BACKGROUND_TIME: &str = "app_background_time";

/// Mirror of the running timer anchor.
pub const TIMER_STATE: &str = "hunt_timer_state";
