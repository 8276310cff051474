//! Per-MID revision negotiation.
//!
//! Mirrors a real controller's notion of schema versioning: each MID has a
//! maximum revision the controller can emit, and a client may ask for any
//! revision at or below that maximum.

use std::collections::HashMap;

use crate::profile::Profile;

/// MIDs that ship with a non-default maximum revision.
const DEFAULT_MAX_REVISIONS: &[(u16, u32)] =
    &[(2, 6), (4, 3), (15, 2), (41, 5), (52, 2), (61, 7), (101, 5), (215, 2)];

/// Maps MID to its maximum supported revision.
///
/// Any MID absent from the map defaults to revision 1.
#[derive(Debug, Clone)]
pub struct RevisionRegistry {
    max_rev: HashMap<u16, u32>,
}

impl RevisionRegistry {
    pub fn new() -> Self {
        Self {
            max_rev: DEFAULT_MAX_REVISIONS.iter().copied().collect(),
        }
    }

    /// Maximum revision the registry will emit for `mid`. Unlisted MIDs are 1.
    pub fn max_rev(&self, mid: u16) -> u32 {
        self.max_rev.get(&mid).copied().unwrap_or(1)
    }

    /// Pick the revision to actually use: never higher than the registry max.
    pub fn negotiate(&self, mid: u16, requested: u32) -> u32 {
        requested.min(self.max_rev(mid))
    }

    /// Override a MID's maximum revision. Rejects non-positive values.
    pub fn set_max_rev(&mut self, mid: u16, n: u32) -> Result<(), &'static str> {
        if n < 1 {
            return Err("revision must be >= 1");
        }
        self.max_rev.insert(mid, n);
        Ok(())
    }

    /// Overwrite entries listed in `profile`; anything not listed is untouched.
    pub fn apply_profile(&mut self, profile: &Profile) {
        for (&mid, &rev) in &profile.revisions {
            self.max_rev.insert(mid, rev);
        }
    }
}

impl Default for RevisionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_mid_defaults_to_one() {
        let reg = RevisionRegistry::new();
        assert_eq!(reg.max_rev(7777), 1);
    }

    #[test]
    fn known_defaults_match_registry_maxima() {
        let reg = RevisionRegistry::new();
        assert_eq!(reg.max_rev(61), 7);
        assert_eq!(reg.max_rev(101), 5);
        assert_eq!(reg.max_rev(215), 2);
    }

    #[test]
    fn negotiate_downgrades_above_max() {
        let reg = RevisionRegistry::new();
        assert_eq!(reg.negotiate(61, 99), 7);
        assert_eq!(reg.negotiate(61, 3), 3);
    }

    #[test]
    fn set_max_rev_rejects_non_positive() {
        let mut reg = RevisionRegistry::new();
        assert!(reg.set_max_rev(61, 0).is_err());
        assert!(reg.set_max_rev(61, 4).is_ok());
        assert_eq!(reg.max_rev(61), 4);
    }

    #[test]
    fn apply_profile_only_touches_listed_mids() {
        let mut reg = RevisionRegistry::new();
        let before_215 = reg.max_rev(215);
        let profile = Profile {
            name: "legacy".into(),
            description: String::new(),
            revisions: [(61, 1)].into_iter().collect(),
            relay_mappings: Default::default(),
        };
        reg.apply_profile(&profile);
        assert_eq!(reg.max_rev(61), 1);
        assert_eq!(reg.max_rev(215), before_215);
    }
}
