//! Static hunt catalog used to seed new progress.

use crate::hunt::Hunt;
use crate::progress::HuntProgress;

/// The hunt sequence every user starts from. Only the first hunt is unlocked.
///
/// Builds fresh owned values on each call, so callers can never alias or
/// mutate a shared catalog.
pub fn seed_catalog() -> Vec<Hunt> {
    vec![
        Hunt::new(1, "Secret Location", "Find the secret spot")
            .with_max_duration(300)
            .unlocked(),
        Hunt::new(2, "Scan the truth", "Scan the true QR code").with_max_duration(120),
        Hunt::new(3, "Power Play", "Test your device charging skills").with_max_duration(60),
        Hunt::new(4, "Connectivity", "Test your connectivity skills").with_max_duration(120),
    ]
}

/// Fresh progress seeded from [`seed_catalog`].
pub fn initial_progress() -> HuntProgress {
    HuntProgress::new(seed_catalog())
}
