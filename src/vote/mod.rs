//! Validator voting on scalar network parameters.
//!
//! Validators attach their preferred values to validations; on a voting
//! ledger every node tallies the trusted validations of the previous
//! ledger with a [`VoteTally`] and moves its own stance to the winner.

pub mod dividend;

use std::collections::BTreeMap;

/// Multiset vote counter over an ordered scalar.
///
/// Only values in the closed range between `current` and `target` can win,
/// so the outcome moves monotonically from the status quo toward this
/// node's target and out-of-range votes never take over.
#[derive(Clone, Debug)]
pub struct VoteTally<T> {
    current: T,
    target: T,
    votes: BTreeMap<T, u32>,
}

impl<T: Ord + Copy> VoteTally<T> {
    /// Seeds the tally with our own vote for `target`.
    pub fn new(current: T, target: T) -> Self {
        let mut votes = BTreeMap::new();
        votes.insert(target, 1);
        Self {
            current,
            target,
            votes,
        }
    }

    /// Whether we have a proposal of our own to push.
    pub fn may_vote(&self) -> bool {
        self.current != self.target
    }

    pub fn add_vote(&mut self, vote: T) {
        *self.votes.entry(vote).or_insert(0) += 1;
    }

    /// A validator with no explicit preference votes for the status quo.
    pub fn no_vote(&mut self) {
        self.add_vote(self.current);
    }

    pub fn current(&self) -> T {
        self.current
    }

    pub fn target(&self) -> T {
        self.target
    }

    /// Most voted value in `[min(current, target), max(current, target)]`.
    ///
    /// Keys are scanned in ascending order and only a strictly heavier
    /// candidate replaces the leader, so ties go to the smaller value.
    /// Falls back to `current` when nothing in range received a vote.
    pub fn get_votes(&self) -> T {
        let low = self.current.min(self.target);
        let high = self.current.max(self.target);

        let mut winner = self.current;
        let mut weight = 0;
        for (&value, &count) in self.votes.range(low..=high) {
            if count > weight {
                winner = value;
                weight = count;
            }
        }
        winner
    }
}
