//! Per-user progress aggregate.

use crate::hunt::Hunt;
use crate::id::HuntId;
use serde::{Deserialize, Serialize};

/// The full progress of one user through the hunt sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HuntProgress {
    /// Hunts in catalog order
    pub hunts: Vec<Hunt>,

    /// The single running hunt, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_active_hunt: Option<HuntId>,

    /// Completions that were not skips
    #[serde(default)]
    pub total_completed: u32,
}

impl HuntProgress {
    /// Create progress over the given hunts with nothing started.
    pub fn new(hunts: Vec<Hunt>) -> Self {
        Self {
            hunts,
            current_active_hunt: None,
            total_completed: 0,
        }
    }

    /// Look up a hunt by id.
    pub fn find(&self, id: HuntId) -> Option<&Hunt> {
        self.hunts.iter().find(|h| h.id == id)
    }

    /// Look up a hunt by id for mutation.
    pub fn find_mut(&mut self, id: HuntId) -> Option<&mut Hunt> {
        self.hunts.iter_mut().find(|h| h.id == id)
    }

    /// The running hunt, if the active pointer is set and valid.
    pub fn active_hunt(&self) -> Option<&Hunt> {
        self.current_active_hunt.and_then(|id| self.find(id))
    }

    /// Unlock the hunt after `id`. Returns true if a hunt was unlocked.
    pub fn unlock_next(&mut self, id: HuntId) -> bool {
        match self.find_mut(id.next()) {
            Some(next) => {
                next.is_unlocked = true;
                true
            }
            None => false,
        }
    }

    /// Every hunt is completed or skipped.
    pub fn all_terminal(&self) -> bool {
        self.hunts.iter().all(Hunt::is_terminal)
    }

    /// Hunts completed without skipping.
    pub fn completed_count(&self) -> usize {
        self.hunts.iter().filter(|h| h.is_completed && !h.is_skipped).count()
    }

    /// Hunts that were skipped.
    pub fn skipped_count(&self) -> usize {
        self.hunts.iter().filter(|h| h.is_skipped).count()
    }

    /// Completions that overran their budget.
    pub fn late_count(&self) -> usize {
        self.hunts
            .iter()
            .filter(|h| h.is_completed && !h.is_skipped && h.is_late_completion)
            .count()
    }

    /// Sum of recorded durations across all hunts.
    pub fn total_duration(&self) -> u64 {
        self.hunts.iter().filter_map(|h| h.duration).sum()
    }

    /// Whether the active pointer satisfies the single-active-hunt invariant.
    pub fn active_pointer_is_valid(&self) -> bool {
        match self.current_active_hunt {
            None => true,
            Some(id) => self
                .find(id)
                .is_some_and(|h| !h.is_terminal() && h.start_time.is_some()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::initial_progress;

    #[test]
    fn test_unlock_next_only_touches_successor() {
        let mut progress = initial_progress();
        assert!(progress.unlock_next(HuntId::new(1)));

        let unlocked: Vec<bool> = progress.hunts.iter().map(|h| h.is_unlocked).collect();
        assert_eq!(unlocked, vec![true, true, false, false]);

        // Last hunt has no successor
        assert!(!progress.unlock_next(HuntId::new(4)));
    }

    #[test]
    fn test_counts() {
        let mut progress = initial_progress();
        progress.hunts[0].is_completed = true;
        progress.hunts[0].is_late_completion = true;
        progress.hunts[0].duration = Some(310);
        progress.hunts[1].is_completed = true;
        progress.hunts[1].is_skipped = true;
        progress.hunts[1].duration = Some(12);

        assert_eq!(progress.completed_count(), 1);
        assert_eq!(progress.skipped_count(), 1);
        assert_eq!(progress.late_count(), 1);
        assert_eq!(progress.total_duration(), 322);
        assert!(!progress.all_terminal());
    }

    #[test]
    fn test_active_pointer_validity() {
        let mut progress = initial_progress();
        assert!(progress.active_pointer_is_valid());

        progress.current_active_hunt = Some(HuntId::new(1));
        assert!(!progress.active_pointer_is_valid());

        progress.hunts[0].start_time = Some(chrono::Utc::now());
        assert!(progress.active_pointer_is_valid());

        progress.current_active_hunt = Some(HuntId::new(42));
        assert!(!progress.active_pointer_is_valid());
    }
}
