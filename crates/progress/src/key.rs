//! Storage-key derivation.

use regex::Regex;
use std::sync::OnceLock;
use yapp_storage::keys::HUNT_PROGRESS_SUFFIX;

fn whitespace() -> &'static Regex {
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("static regex"))
}

/// Lower-case a user name and collapse whitespace runs into `_`.
pub fn normalize_user_name(name: &str) -> String {
    whitespace().replace_all(&name.to_lowercase(), "_").into_owned()
}

/// Key holding the progress of `user_name`.
///
/// Users without a name share the bare `hunt_progress` key. Two unnamed
/// users on one device therefore see each other's progress.
pub fn progress_key(user_name: Option<&str>) -> String {
    match user_name {
        Some(name) if !name.is_empty() => {
            format!("{}_{}", normalize_user_name(name), HUNT_PROGRESS_SUFFIX)
        }
        _ => HUNT_PROGRESS_SUFFIX.to_string(),
    }
}
