//! Parameter sets (Psets): torque/angle targets and tolerances, plus the
//! fixed set of identifiers a controller accepts.

use serde::{Deserialize, Serialize};

/// The only Pset identifiers a controller will accept (see glossary).
pub const ALLOWED_PSET_IDS: &[&str] = &[
    "001", "002", "003", "004", "005",
    "010", "011", "012", "013", "014", "015",
    "050", "051", "052", "053", "054", "055",
    "100", "101", "102", "103", "104", "105",
];

/// `"0"` and `"000"` both mean "no Pset selected".
pub fn is_none_id(id: &str) -> bool {
    id == "0" || id == "000"
}

pub fn is_allowed_id(id: &str) -> bool {
    ALLOWED_PSET_IDS.contains(&id)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Pset {
    pub target_torque: f64,
    pub min_torque: f64,
    pub max_torque: f64,
    pub target_angle: i32,
    pub min_angle: i32,
    pub max_angle: i32,
    pub batch_size: u32,
}

impl Pset {
    pub fn is_valid(&self) -> bool {
        self.min_torque <= self.max_torque && self.min_angle <= self.max_angle
    }
}

impl Default for Pset {
    /// Global defaults used when no Pset is selected.
    fn default() -> Self {
        Self {
            target_torque: 50.00,
            min_torque: 47.00,
            max_torque: 53.00,
            target_angle: 90,
            min_angle: 80,
            max_angle: 100,
            batch_size: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_ids_recognized() {
        assert!(is_none_id("0"));
        assert!(is_none_id("000"));
        assert!(!is_none_id("001"));
    }

    #[test]
    fn allowed_set_matches_glossary() {
        assert!(is_allowed_id("001"));
        assert!(is_allowed_id("105"));
        assert!(!is_allowed_id("999"));
        assert!(!is_allowed_id("006"));
    }

    #[test]
    fn default_is_valid() {
        assert!(Pset::default().is_valid());
    }

    #[test]
    fn inverted_bounds_are_invalid() {
        let mut p = Pset::default();
        p.min_torque = 60.0;
        assert!(!p.is_valid());
    }
}
