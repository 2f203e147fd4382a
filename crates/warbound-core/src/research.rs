//! Research ledger — which technologies each player has been granted.
//!
//! Artifact pickups grant techs through this ledger, which enforces the
//! at-most-once invariant: a tech already held is a harmless no-op.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchLedger {
    granted: HashMap<u8, BTreeSet<String>>,
}

impl ResearchLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant a tech. Returns false when the player already had it.
    pub fn grant(&mut self, player: u8, tech: &str) -> bool {
        self.granted
            .entry(player)
            .or_default()
            .insert(tech.to_string())
    }

    pub fn has(&self, player: u8, tech: &str) -> bool {
        self.granted
            .get(&player)
            .map(|techs| techs.contains(tech))
            .unwrap_or(false)
    }

    pub fn count(&self, player: u8) -> usize {
        self.granted.get(&player).map(|t| t.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_once() {
        let mut ledger = ResearchLedger::new();
        assert!(ledger.grant(0, "R-Wpn-Cannon1"));
        assert!(!ledger.grant(0, "R-Wpn-Cannon1"));
        assert!(ledger.has(0, "R-Wpn-Cannon1"));
        assert!(!ledger.has(1, "R-Wpn-Cannon1"));
        assert_eq!(ledger.count(0), 1);
    }
}
