//! Scoring rules shared by peer validation and automatic scoring.
//!
//! Table:
//! - an accepted answer whose loose key is unique in its category: 1 point
//! - an accepted answer sharing its loose key with another accepted answer: 0.5 point
//! - empty, duplicate or rejected answers: 0

use super::submission::AnswerEntry;
use crate::types::PlayerId;
use std::collections::{HashMap, HashSet};

pub const FULL_POINTS: f64 = 1.0;
pub const HALF_POINTS: f64 = 0.5;

const ARTICLES: &[&str] = &["le ", "la ", "les ", "un ", "une ", "des ", "the ", "a ", "an "];

/// Normalize text for exact duplicate comparison (trim whitespace, lowercase)
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

fn fold_char(c: char, out: &mut String) {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => out.push('a'),
        'ç' => out.push('c'),
        'è' | 'é' | 'ê' | 'ë' => out.push('e'),
        'ì' | 'í' | 'î' | 'ï' => out.push('i'),
        'ñ' => out.push('n'),
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' => out.push('o'),
        'ù' | 'ú' | 'û' | 'ü' => out.push('u'),
        'ý' | 'ÿ' => out.push('y'),
        'œ' => out.push_str("oe"),
        'æ' => out.push_str("ae"),
        other => out.push(other),
    }
}

/// Key under which near-duplicates collide ("The Beatles" and "beatles")
pub fn loose_key(text: &str) -> String {
    let mut folded = String::new();
    for c in normalize(text).chars() {
        fold_char(c, &mut folded);
    }

    let mut rest = folded.as_str();
    if let Some(stripped) = rest.strip_prefix("l'").or_else(|| rest.strip_prefix("l’")) {
        rest = stripped;
    } else if let Some(article) = ARTICLES.iter().find(|a| rest.starts_with(*a)) {
        rest = &rest[article.len()..];
    }

    rest.chars().filter(|c| c.is_alphanumeric()).collect()
}

/// First letter of an answer, folded and uppercased
pub fn initial(text: &str) -> Option<char> {
    let first = text.trim().chars().find(|c| c.is_alphanumeric())?;
    let mut folded = String::new();
    for c in first.to_lowercase() {
        fold_char(c, &mut folded);
    }
    folded.chars().next().map(|c| c.to_ascii_uppercase())
}

/// Source of truth for automatic scoring
pub trait AnswerBook: Send + Sync {
    fn accepts(&self, category: &str, letter: char, answer: &str) -> bool;

    fn name(&self) -> &str;
}

/// Accepts any answer that starts with the round letter
#[derive(Debug, Clone, Default)]
pub struct LetterRule;

impl AnswerBook for LetterRule {
    fn accepts(&self, _category: &str, letter: char, answer: &str) -> bool {
        initial(answer) == Some(letter.to_ascii_uppercase())
    }

    fn name(&self) -> &str {
        "letter"
    }
}

/// Accepts only known answers, per category
#[derive(Debug, Clone, Default)]
pub struct WordList {
    words: HashMap<String, HashSet<String>>,
}

impl WordList {
    pub fn new(lists: &HashMap<String, Vec<String>>) -> Self {
        let words = lists
            .iter()
            .map(|(cat, words)| {
                let keys = words.iter().map(|w| loose_key(w)).filter(|k| !k.is_empty());
                (normalize(cat), keys.collect())
            })
            .collect();
        Self { words }
    }
}

impl AnswerBook for WordList {
    fn accepts(&self, category: &str, letter: char, answer: &str) -> bool {
        LetterRule.accepts(category, letter, answer)
            && self
                .words
                .get(&normalize(category))
                .is_some_and(|known| known.contains(&loose_key(answer)))
    }

    fn name(&self) -> &str {
        "word_list"
    }
}

/// Split answers into those worth reviewing and those rejected outright.
///
/// Empty answers are rejected, and so is every answer whose normalized text
/// was already given by an earlier submitter in the same category.
pub fn screen(entries: Vec<AnswerEntry>) -> (Vec<AnswerEntry>, Vec<AnswerEntry>) {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut kept = Vec::new();
    let mut rejected = Vec::new();

    for entry in entries {
        let text = normalize(&entry.text);
        if text.is_empty() || !seen.insert((entry.category.clone(), text)) {
            rejected.push(entry);
        } else {
            kept.push(entry);
        }
    }

    (kept, rejected)
}

/// Automatic path: screen, then let the book decide
pub fn auto_accept(entries: Vec<AnswerEntry>, letter: char, book: &dyn AnswerBook) -> Vec<AnswerEntry> {
    let (kept, _) = screen(entries);
    kept.into_iter()
        .filter(|e| book.accepts(&e.category, letter, &e.text))
        .collect()
}

/// Round points per player from the accepted answers of that round
pub fn score_round<'a>(accepted: impl IntoIterator<Item = &'a AnswerEntry>) -> HashMap<PlayerId, f64> {
    let accepted: Vec<&AnswerEntry> = accepted.into_iter().collect();

    let mut occurrences: HashMap<(&str, String), usize> = HashMap::new();
    for entry in &accepted {
        *occurrences
            .entry((entry.category.as_str(), loose_key(&entry.text)))
            .or_insert(0) += 1;
    }

    let mut points: HashMap<PlayerId, f64> = HashMap::new();
    for entry in &accepted {
        let shared = occurrences
            .get(&(entry.category.as_str(), loose_key(&entry.text)))
            .copied()
            .unwrap_or(0)
            > 1;
        *points.entry(entry.player_id.clone()).or_insert(0.0) +=
            if shared { HALF_POINTS } else { FULL_POINTS };
    }
    points
}
