use serde::{Deserialize, Serialize};

/// Opaque ID types
pub type RoomCode = String;
pub type PlayerId = String;
pub type ValidationId = u64;
/// Socket-scoped id handed out by the room actor, never reused within a room
pub type ConnectionId = u64;

/// Code of the room that always exists and receives code-less connections
pub const DEFAULT_ROOM_CODE: &str = "CLASSIC";

pub const MIN_ROUND_SECONDS: u32 = 15;
pub const MAX_ROUND_SECONDS: u32 = 600;
pub const MIN_ROUNDS: u32 = 1;
pub const MAX_ROUNDS: u32 = 20;
pub const MAX_ANSWER_CHARS: usize = 100;
pub const MAX_NAME_CHARS: usize = 24;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomPhase {
    Lobby,
    RoundActive,
    RoundClosing,
    WaitingRestart,
    GameOver,
}

impl RoomPhase {
    /// Transition table of the room lifecycle
    pub fn can_transition(&self, to: &RoomPhase) -> bool {
        use RoomPhase::*;

        match (self, to) {
            (Lobby, RoundActive) => true,
            (RoundActive, RoundClosing) => true,
            // Rounds without anything to review skip straight to the restart vote
            (RoundActive, WaitingRestart) => true,
            (RoundClosing, WaitingRestart) => true,
            (WaitingRestart, RoundActive) => true,
            (WaitingRestart, GameOver) => true,

            // Config updates send any room back to the lobby
            (_, Lobby) => true,

            _ => false,
        }
    }
}

/// Who counts towards `readyTotal` in the restart vote
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReadyEligibility {
    /// Every player currently connected to the room
    #[default]
    Present,
    /// Connected players that took part in the round just closed
    Participants,
}

impl ReadyEligibility {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "present" | "all" => Some(Self::Present),
            "participants" | "last_round" => Some(Self::Participants),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomSettings {
    pub categories: Vec<String>,
    pub round_duration: u32,
    pub round_limit: u32,
    pub validation_enabled: bool,
    pub ready_eligibility: ReadyEligibility,
    pub max_players: usize,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            categories: default_categories(),
            round_duration: 90,
            round_limit: 5,
            validation_enabled: true,
            ready_eligibility: ReadyEligibility::Present,
            max_players: 5,
        }
    }
}

impl RoomSettings {
    /// Merge a partial update, keeping current values for anything out of range
    pub fn apply(&mut self, update: &SettingsUpdate) {
        if let Some(categories) = &update.categories {
            let categories = sanitize_categories(categories);
            if !categories.is_empty() {
                self.categories = categories;
            }
        }
        if let Some(duration) = update.duration {
            if duration >= MIN_ROUND_SECONDS {
                self.round_duration = duration.min(MAX_ROUND_SECONDS);
            }
        }
        if let Some(rounds) = update.rounds {
            if rounds >= MIN_ROUNDS {
                self.round_limit = rounds.min(MAX_ROUNDS);
            }
        }
        if let Some(enabled) = update.validation {
            self.validation_enabled = enabled;
        }
    }
}

/// Partial room configuration as sent by the HTTP surface
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SettingsUpdate {
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub rounds: Option<u32>,
    #[serde(default)]
    pub validation: Option<bool>,
}

pub fn default_categories() -> Vec<String> {
    ["Artiste", "Album", "Groupe de musique", "Instrument de musique", "Featuring"]
        .iter()
        .map(|c| c.to_string())
        .collect()
}

/// Trim, drop empties and drop case-insensitive repeats, keeping first-seen order
pub fn sanitize_categories(categories: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    categories
        .iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .filter(|c| seen.insert(c.to_lowercase()))
        .collect()
}

/// Normalize a client-supplied room code
pub fn normalize_room_code(code: &str) -> RoomCode {
    code.trim().to_uppercase()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// Points earned in the current round
    pub score: f64,
    /// Points banked across finished rounds
    pub total_score: f64,
    /// Participant of the current round
    pub active: bool,
    /// Restart vote cast
    pub ready: bool,
    pub connected: bool,
}

impl Player {
    pub fn new(id: PlayerId) -> Self {
        Self {
            id,
            name: String::new(),
            score: 0.0,
            total_score: 0.0,
            active: false,
            ready: false,
            connected: true,
        }
    }
}
