//! Controller profiles: named snapshots of revision maxima plus optional
//! relay-function mappings.
//!
//! Loading a profile file from disk is an external collaborator's job (a
//! plain configuration loader per the system overview); this module owns
//! only the shape and the three built-ins.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub revisions: HashMap<u16, u32>,
    #[serde(default)]
    pub relay_mappings: HashMap<String, u16>,
}

/// All MIDs the registry knows a non-default maximum for, at revision 1.
fn all_mids_at(rev: u32) -> HashMap<u16, u32> {
    [2u16, 4, 15, 41, 52, 61, 101, 215]
        .into_iter()
        .map(|mid| (mid, rev))
        .collect()
}

impl Profile {
    /// Every MID pinned to revision 1 — oldest-client compatibility mode.
    pub fn legacy() -> Self {
        Self {
            name: "legacy".to_string(),
            description: "All MIDs pinned to revision 1".to_string(),
            revisions: all_mids_at(1),
            relay_mappings: HashMap::new(),
        }
    }

    /// A moderate, mid-generation controller firmware.
    pub fn pf6000_basic() -> Self {
        Self {
            name: "pf6000-basic".to_string(),
            description: "PF6000 moderate revision support".to_string(),
            revisions: [
                (2, 3),
                (4, 2),
                (15, 1),
                (41, 2),
                (52, 1),
                (61, 2),
                (101, 2),
                (215, 1),
            ]
            .into_iter()
            .collect(),
            relay_mappings: [
                ("trigger".to_string(), 1u16),
                ("forward".to_string(), 2),
                ("reverse".to_string(), 3),
            ]
            .into_iter()
            .collect(),
        }
    }

    /// Every MID at its documented maximum revision.
    pub fn pf6000_full() -> Self {
        Self {
            name: "pf6000-full".to_string(),
            description: "PF6000 with every MID at its maximum revision".to_string(),
            revisions: [
                (2, 6),
                (4, 3),
                (15, 2),
                (41, 5),
                (52, 2),
                (61, 7),
                (101, 5),
                (215, 2),
            ]
            .into_iter()
            .collect(),
            relay_mappings: [
                ("trigger".to_string(), 1u16),
                ("forward".to_string(), 2),
                ("reverse".to_string(), 3),
                ("locked".to_string(), 4),
            ]
            .into_iter()
            .collect(),
        }
    }

    /// Resolve one of the three built-in profiles by name.
    pub fn built_in(name: &str) -> Option<Self> {
        match name {
            "legacy" => Some(Self::legacy()),
            "pf6000-basic" => Some(Self::pf6000_basic()),
            "pf6000-full" => Some(Self::pf6000_full()),
            _ => None,
        }
    }
}
