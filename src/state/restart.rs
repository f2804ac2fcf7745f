//! Restart quorum: "play again" votes collected after a round.

use crate::error::{GameError, GameResult};
use crate::types::PlayerId;
use std::collections::BTreeSet;

/// Votes needed out of `total` eligible players
pub fn threshold(total: usize) -> usize {
    if total == 0 {
        1
    } else {
        total / 3 + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tally {
    pub ready_count: usize,
    pub ready_total: usize,
    pub threshold: usize,
}

impl Tally {
    pub fn reached(&self) -> bool {
        self.ready_count >= self.threshold
    }
}

#[derive(Debug, Clone, Default)]
pub struct RestartQuorum {
    voters: BTreeSet<PlayerId>,
    fired: bool,
}

impl RestartQuorum {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tally(&self, eligible: &BTreeSet<PlayerId>) -> Tally {
        let ready_total = eligible.len();
        Tally {
            ready_count: self.voters.intersection(eligible).count(),
            ready_total,
            threshold: threshold(ready_total),
        }
    }

    pub fn has_voted(&self, player: &str) -> bool {
        self.voters.contains(player)
    }

    /// Record a vote. Returns true exactly once, when the quorum is first reached.
    pub fn cast(&mut self, player: &str, eligible: &BTreeSet<PlayerId>) -> GameResult<bool> {
        if !eligible.contains(player) {
            return Err(GameError::NotEligible(player.to_string()));
        }
        self.voters.insert(player.to_string());
        Ok(self.check(eligible))
    }

    /// Re-evaluate after the eligible set changed
    pub fn check(&mut self, eligible: &BTreeSet<PlayerId>) -> bool {
        if self.fired || eligible.is_empty() {
            return false;
        }
        if self.tally(eligible).reached() {
            self.fired = true;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[&str]) -> BTreeSet<PlayerId> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_threshold() {
        assert_eq!(threshold(0), 1);
        assert_eq!(threshold(1), 1);
        assert_eq!(threshold(2), 1);
        assert_eq!(threshold(3), 2);
        assert_eq!(threshold(4), 2);
        assert_eq!(threshold(6), 3);
    }

    #[test]
    fn test_fires_exactly_once() {
        let eligible = set(&["a", "b", "c", "d"]);
        let mut quorum = RestartQuorum::new();

        assert!(!quorum.cast("a", &eligible).unwrap());
        assert!(quorum.cast("b", &eligible).unwrap());
        assert!(!quorum.cast("c", &eligible).unwrap());
        assert!(!quorum.check(&eligible));
    }

    #[test]
    fn test_recast_does_not_increase_count() {
        let eligible = set(&["a", "b", "c", "d", "e", "f"]);
        let mut quorum = RestartQuorum::new();

        assert!(!quorum.cast("a", &eligible).unwrap());
        assert!(!quorum.cast("a", &eligible).unwrap());
        assert_eq!(quorum.tally(&eligible).ready_count, 1);
    }

    #[test]
    fn test_ineligible_voter_rejected() {
        let eligible = set(&["a", "b"]);
        let mut quorum = RestartQuorum::new();
        assert_eq!(
            quorum.cast("z", &eligible),
            Err(GameError::NotEligible("z".to_string()))
        );
        assert_eq!(quorum.tally(&eligible).ready_count, 0);
    }

    #[test]
    fn test_shrinking_eligible_set_can_fire() {
        let mut quorum = RestartQuorum::new();
        let all = set(&["a", "b", "c", "d", "e", "f"]);
        assert!(!quorum.cast("a", &all).unwrap());
        assert!(!quorum.cast("b", &all).unwrap());

        // Three players leave: 2 of 3 is over floor(3/3)+1
        assert!(quorum.check(&set(&["a", "b", "c"])));
    }
}
