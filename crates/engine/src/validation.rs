//! Hunt transition preconditions.

use yapp_core::{Hunt, HuntId, HuntProgress};

/// Why a transition was refused.
///
/// These point at a sequencing bug upstream (a double tap, a stale screen),
/// so they are always returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Another hunt is running
    #[error("cannot start hunt {requested}: hunt {active} is already in progress")]
    AlreadyActive {
        /// Hunt the caller asked for
        requested: HuntId,
        /// Hunt currently running
        active: HuntId,
    },

    /// No hunt with that id
    #[error("hunt {0} not found")]
    NotFound(HuntId),

    /// Hunt is not unlocked yet
    #[error("hunt '{title}' ({id}) is locked and cannot be started")]
    Locked {
        /// Hunt id
        id: HuntId,
        /// Hunt title
        title: String,
    },

    /// Hunt was already completed or skipped
    #[error("hunt '{title}' ({id}) is already completed")]
    AlreadyTerminal {
        /// Hunt id
        id: HuntId,
        /// Hunt title
        title: String,
    },

    /// Hunt is not the running one
    #[error("hunt '{title}' ({id}) is not the currently active hunt")]
    NotActive {
        /// Hunt id
        id: HuntId,
        /// Hunt title
        title: String,
    },

    /// Active hunt has no start time
    #[error("hunt '{title}' ({id}) has no start time")]
    MissingStartTime {
        /// Hunt id
        id: HuntId,
        /// Hunt title
        title: String,
    },
}

/// Stateless checks run before every transition.
pub struct HuntValidator;

impl HuntValidator {
    /// A hunt can start when nothing is running and it is unlocked and not finished.
    ///
    /// Starting the hunt that is already running is refused as well, so a
    /// repeated start can never reset its start time.
    pub fn validate_can_start(progress: &HuntProgress, id: HuntId) -> Result<(), ValidationError> {
        if let Some(active) = progress.current_active_hunt {
            return Err(ValidationError::AlreadyActive { requested: id, active });
        }
        let hunt = find(progress, id)?;
        if !hunt.is_unlocked {
            return Err(ValidationError::Locked { id, title: hunt.title.clone() });
        }
        ensure_not_terminal(hunt)
    }

    /// A hunt can complete when it is the running one and has a start time.
    pub fn validate_can_complete(
        progress: &HuntProgress,
        id: HuntId,
    ) -> Result<(), ValidationError> {
        let hunt = find(progress, id)?;
        if progress.current_active_hunt != Some(id) {
            return Err(ValidationError::NotActive { id, title: hunt.title.clone() });
        }
        ensure_not_terminal(hunt)?;
        if hunt.start_time.is_none() {
            return Err(ValidationError::MissingStartTime { id, title: hunt.title.clone() });
        }
        Ok(())
    }

    /// Any hunt that exists and is not finished can be skipped.
    pub fn validate_can_skip(progress: &HuntProgress, id: HuntId) -> Result<(), ValidationError> {
        ensure_not_terminal(find(progress, id)?)
    }
}

fn find(progress: &HuntProgress, id: HuntId) -> Result<&Hunt, ValidationError> {
    progress.find(id).ok_or(ValidationError::NotFound(id))
}

fn ensure_not_terminal(hunt: &Hunt) -> Result<(), ValidationError> {
    if hunt.is_terminal() {
        return Err(ValidationError::AlreadyTerminal { id: hunt.id, title: hunt.title.clone() });
    }
    Ok(())
}
