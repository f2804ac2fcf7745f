//! Peer validation queue.
//!
//! After a round closes, every answer that survived screening is put in front
//! of the other participants, one entry at a time and in submission order.
//! Only the head of the queue accepts votes.

use super::submission::AnswerEntry;
use crate::error::{GameError, GameResult};
use crate::protocol::ValidationView;
use crate::types::*;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationEntry {
    pub id: ValidationId,
    pub player_id: PlayerId,
    pub player_name: String,
    pub category: String,
    pub answer: String,
    pub approvals: BTreeMap<PlayerId, bool>,
    /// Players allowed to vote on this entry
    pub eligible: BTreeSet<PlayerId>,
    pub required: usize,
    pub completed: bool,
    pub accepted: bool,
}

impl ValidationEntry {
    fn approvals_count(&self) -> usize {
        self.approvals.values().filter(|v| **v).count()
    }

    fn outstanding(&self) -> usize {
        self.eligible
            .iter()
            .filter(|id| !self.approvals.contains_key(*id))
            .count()
    }

    /// Accepted once approvals reach `required`, rejected once they no longer can
    fn decide(&mut self) -> bool {
        let yes = self.approvals_count();
        if yes >= self.required {
            self.completed = true;
            self.accepted = true;
        } else if yes + self.outstanding() < self.required {
            self.completed = true;
            self.accepted = false;
        }
        self.completed
    }

    pub fn as_entry(&self) -> AnswerEntry {
        AnswerEntry {
            player_id: self.player_id.clone(),
            category: self.category.clone(),
            text: self.answer.clone(),
        }
    }

    pub fn view(&self) -> ValidationView {
        ValidationView {
            id: self.id,
            player_id: self.player_id.clone(),
            player_name: self.player_name.clone(),
            category: self.category.clone(),
            answer: self.answer.clone(),
            votes: self.approvals.len(),
            required: self.required,
            approvals: self.approvals.clone(),
            completed: self.completed,
            accepted: self.accepted,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationQueue {
    pending: VecDeque<ValidationEntry>,
    resolved: Vec<ValidationEntry>,
    next_id: ValidationId,
}

impl ValidationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill the queue for a closed round.
    ///
    /// `entries` must already be screened and in submission order. `voters` are
    /// the participants of the round; an entry with nobody left to vote on it is
    /// accepted on the spot.
    pub fn build(
        &mut self,
        entries: Vec<AnswerEntry>,
        voters: &BTreeSet<PlayerId>,
        name_of: impl Fn(&str) -> String,
    ) {
        self.reset();

        for entry in entries {
            self.next_id += 1;
            let eligible: BTreeSet<PlayerId> = voters
                .iter()
                .filter(|id| **id != entry.player_id)
                .cloned()
                .collect();

            let mut validation = ValidationEntry {
                id: self.next_id,
                player_name: name_of(&entry.player_id),
                player_id: entry.player_id,
                category: entry.category,
                answer: entry.text,
                approvals: BTreeMap::new(),
                required: eligible.len(),
                eligible,
                completed: false,
                accepted: false,
            };

            if validation.required == 0 {
                validation.decide();
                self.resolved.push(validation);
            } else {
                self.pending.push_back(validation);
            }
        }
    }

    /// The entry currently open to vote
    pub fn head(&self) -> Option<&ValidationEntry> {
        self.pending.front()
    }

    pub fn is_active(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Remaining entries, the open one included
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn resolved(&self) -> &[ValidationEntry] {
        &self.resolved
    }

    pub fn accepted(&self) -> impl Iterator<Item = &ValidationEntry> {
        self.resolved.iter().filter(|e| e.accepted)
    }

    /// Cast a vote on the open entry. Returns the entries resolved by this vote.
    pub fn cast_vote(
        &mut self,
        validation_id: ValidationId,
        voter: &str,
        approve: bool,
    ) -> GameResult<Vec<ValidationEntry>> {
        let head = self
            .pending
            .front_mut()
            .filter(|e| e.id == validation_id)
            .ok_or(GameError::ValidationNotOpen(validation_id))?;

        if head.player_id == voter {
            return Err(GameError::SelfVoteForbidden);
        }
        if head.approvals.contains_key(voter) {
            return Err(GameError::AlreadyVoted);
        }
        if !head.eligible.contains(voter) {
            return Err(GameError::NotEligible(voter.to_string()));
        }

        head.approvals.insert(voter.to_string(), approve);
        Ok(self.advance())
    }

    /// Withdraw a voter who left the room from every entry they have not voted on yet
    pub fn remove_voter(&mut self, voter: &str) -> Vec<ValidationEntry> {
        for entry in self.pending.iter_mut() {
            if !entry.approvals.contains_key(voter) && entry.eligible.remove(voter) {
                entry.required = entry.eligible.len();
            }
        }
        self.advance()
    }

    fn advance(&mut self) -> Vec<ValidationEntry> {
        let mut done = Vec::new();
        while let Some(head) = self.pending.front_mut() {
            if !head.decide() {
                break;
            }
            if let Some(entry) = self.pending.pop_front() {
                done.push(entry.clone());
                self.resolved.push(entry);
            }
        }
        done
    }

    /// Forget the current round; ids keep increasing across rounds
    pub fn reset(&mut self) {
        self.pending.clear();
        self.resolved.clear();
    }
}
