//! Answer ledger: one answer sheet per player for the current round.

use crate::error::{GameError, GameResult};
use crate::types::*;
use std::collections::HashMap;

/// One submitted answer
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerEntry {
    pub player_id: PlayerId,
    pub category: String,
    /// Empty means "no answer"
    pub text: String,
}

#[derive(Debug, Clone)]
struct Sheet {
    player_id: PlayerId,
    seq: u64,
    answers: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct AnswerLedger {
    sheets: Vec<Sheet>,
    next_seq: u64,
    frozen: bool,
}

impl AnswerLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a player's answers, replacing any earlier sheet from the same player.
    ///
    /// Keys outside `categories` are ignored and returned; configured categories
    /// missing from the form count as empty.
    pub fn submit(
        &mut self,
        player_id: &str,
        answers: &HashMap<String, String>,
        categories: &[String],
    ) -> GameResult<Vec<GameError>> {
        if self.frozen {
            return Err(GameError::RoundNotActive);
        }

        let ignored = answers
            .keys()
            .filter(|key| !categories.contains(key))
            .map(|key| GameError::UnknownCategory(key.clone()))
            .collect();

        let sheet_answers = categories
            .iter()
            .map(|cat| {
                let text = answers.get(cat).map(|t| clean_answer(t)).unwrap_or_default();
                (cat.clone(), text)
            })
            .collect();

        // Last write wins; a replaced sheet keeps its place in submission order
        match self.sheets.iter_mut().find(|s| s.player_id == player_id) {
            Some(sheet) => sheet.answers = sheet_answers,
            None => {
                self.next_seq += 1;
                self.sheets.push(Sheet {
                    player_id: player_id.to_string(),
                    seq: self.next_seq,
                    answers: sheet_answers,
                });
            }
        }

        Ok(ignored)
    }

    pub fn has_submitted(&self, player_id: &str) -> bool {
        self.sheets.iter().any(|s| s.player_id == player_id)
    }

    pub fn submitted_count(&self) -> usize {
        self.sheets.len()
    }

    pub fn answer(&self, player_id: &str, category: &str) -> Option<&str> {
        self.sheets
            .iter()
            .find(|s| s.player_id == player_id)
            .and_then(|s| s.answers.get(category))
            .map(String::as_str)
    }

    /// All answers in submission order, categories in room order
    pub fn entries(&self, categories: &[String]) -> Vec<AnswerEntry> {
        let mut sheets: Vec<&Sheet> = self.sheets.iter().collect();
        sheets.sort_by_key(|s| s.seq);

        sheets
            .into_iter()
            .flat_map(|sheet| {
                categories.iter().map(move |cat| AnswerEntry {
                    player_id: sheet.player_id.clone(),
                    category: cat.clone(),
                    text: sheet.answers.get(cat).cloned().unwrap_or_default(),
                })
            })
            .collect()
    }

    /// Stop accepting submissions for this round
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Drop every sheet and reopen for a new round
    pub fn clear(&mut self) {
        self.sheets.clear();
        self.frozen = false;
    }
}

fn clean_answer(text: &str) -> String {
    text.trim().chars().take(MAX_ANSWER_CHARS).collect()
}
