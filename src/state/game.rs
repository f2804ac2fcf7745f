//! Room state machine.
//!
//! `Room` is plain synchronous state owned by exactly one room actor. Every
//! operation either fails without touching state or applies completely, and
//! reports the side effects (timers, persistence) the actor must carry out.

use super::player::PlayerRegistry;
use super::restart::{threshold, RestartQuorum, Tally};
use super::round::{LetterPool, Round};
use super::score::{self, AnswerBook, LetterRule};
use super::submission::{AnswerEntry, AnswerLedger};
use super::validation::ValidationQueue;
use crate::error::{GameError, GameResult};
use crate::protocol::{ClientMessage, RoomSnapshot};
use crate::store::{PlayerRecord, RoomRecord};
use crate::types::*;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Work the room actor has to do after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    StartTimer { round: u32, seconds: u32 },
    CancelTimer,
    SaveScoreboard,
    RoomEmpty,
}

pub struct Room {
    code: RoomCode,
    host: String,
    settings: RoomSettings,
    phase: RoomPhase,
    round: Option<Round>,
    players: PlayerRegistry,
    ledger: AnswerLedger,
    validation: ValidationQueue,
    restart: Option<RestartQuorum>,
    /// Active players at the moment the last round closed
    participants: BTreeSet<PlayerId>,
    letters: LetterPool,
    book: Arc<dyn AnswerBook>,
}

impl Room {
    pub fn new(code: &str, host: &str, settings: RoomSettings) -> Self {
        let code = normalize_room_code(code);
        Self {
            players: PlayerRegistry::new(&code, settings.max_players),
            code,
            host: host.trim().to_string(),
            settings,
            phase: RoomPhase::Lobby,
            round: None,
            ledger: AnswerLedger::new(),
            validation: ValidationQueue::new(),
            restart: None,
            participants: BTreeSet::new(),
            letters: LetterPool::new(),
            book: Arc::new(LetterRule),
        }
    }

    /// Replace the answer source used when peer validation is off
    pub fn with_book(mut self, book: Arc<dyn AnswerBook>) -> Self {
        self.book = book;
        self
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    pub fn settings(&self) -> &RoomSettings {
        &self.settings
    }

    pub fn round(&self) -> Option<&Round> {
        self.round.as_ref()
    }

    pub fn round_number(&self) -> u32 {
        self.round.as_ref().map(|r| r.number).unwrap_or(0)
    }

    pub fn players(&self) -> &PlayerRegistry {
        &self.players
    }

    pub fn ledger(&self) -> &AnswerLedger {
        &self.ledger
    }

    pub fn validation(&self) -> &ValidationQueue {
        &self.validation
    }

    pub fn player_for(&self, connection: ConnectionId) -> Option<&PlayerId> {
        self.players.by_connection(connection)
    }

    fn transition(&mut self, to: RoomPhase, action: &'static str) -> GameResult<()> {
        if !self.phase.can_transition(&to) {
            return Err(GameError::InvalidTransition {
                from: self.phase,
                action,
            });
        }
        tracing::info!(room = %self.code, from = ?self.phase, to = ?to, "Room phase transition");
        self.phase = to;
        Ok(())
    }

    /// Dispatch one client message
    pub fn handle(
        &mut self,
        connection: ConnectionId,
        message: ClientMessage,
    ) -> GameResult<Vec<Effect>> {
        let player = self
            .players
            .by_connection(connection)
            .cloned()
            .ok_or(GameError::UnknownConnection(connection))?;

        match message {
            ClientMessage::Join { name, .. } => {
                self.join(connection, Some(name.as_str()))?;
                Ok(Vec::new())
            }
            ClientMessage::Answers { answers } => self.submit(&player, &answers),
            ClientMessage::Ready => self.ready(&player),
            ClientMessage::Validate {
                validation_id,
                approve,
            } => self.vote(&player, validation_id, approve),
            ClientMessage::Start => self.start(),
        }
    }

    /// Bind a connection to a player. New connections are refused once the game is over.
    pub fn join(&mut self, connection: ConnectionId, name: Option<&str>) -> GameResult<PlayerId> {
        let known = self.players.by_connection(connection).cloned();
        if self.phase == RoomPhase::GameOver {
            return known.ok_or_else(|| GameError::RoomUnavailable(self.code.clone()));
        }

        let id = self.players.join(connection, name)?;
        if known.is_none() && self.phase == RoomPhase::RoundActive {
            // Late joiners play the rest of the round
            if let Some(player) = self.players.get_mut(&id) {
                player.active = true;
            }
        }
        Ok(id)
    }

    /// A connection went away: the player stays on the scoreboard but stops counting
    pub fn disconnect(&mut self, connection: ConnectionId) -> GameResult<Vec<Effect>> {
        let id = self
            .players
            .leave(connection)
            .ok_or(GameError::UnknownConnection(connection))?;
        tracing::info!(room = %self.code, player = %id, "Player left");

        let mut effects = Vec::new();
        match self.phase {
            RoomPhase::RoundActive => {
                if self.everyone_submitted() {
                    effects.extend(self.close_round()?);
                }
            }
            RoomPhase::RoundClosing => {
                if !self.validation.remove_voter(&id).is_empty() {
                    self.rescore();
                }
                if !self.validation.is_active() {
                    effects.extend(self.finish_round()?);
                }
            }
            RoomPhase::WaitingRestart => {
                let eligible = self.ready_eligible();
                let fired = self
                    .restart
                    .as_mut()
                    .is_some_and(|quorum| quorum.check(&eligible));
                if fired {
                    effects.extend(self.restart_approved()?);
                }
            }
            RoomPhase::Lobby | RoomPhase::GameOver => {}
        }

        if self.players.present_count() == 0 {
            effects.push(Effect::RoomEmpty);
        }
        Ok(effects)
    }

    /// LOBBY -> ROUND_ACTIVE
    pub fn start(&mut self) -> GameResult<Vec<Effect>> {
        match self.phase {
            RoomPhase::Lobby => self.begin_round(1),
            RoomPhase::GameOver => Err(GameError::GameOver),
            from => Err(GameError::InvalidTransition {
                from,
                action: "start the game",
            }),
        }
    }

    fn begin_round(&mut self, number: u32) -> GameResult<Vec<Effect>> {
        self.transition(RoomPhase::RoundActive, "start a round")?;

        let letter = self.letters.draw();
        self.ledger.clear();
        self.validation.reset();
        self.restart = None;
        self.participants.clear();
        for player in self.players.iter_mut() {
            player.score = 0.0;
            player.ready = false;
            player.active = player.connected;
        }

        let duration = self.settings.round_duration;
        self.round = Some(Round::new(number, letter, duration));
        tracing::info!(room = %self.code, round = number, %letter, duration, "Round started");

        Ok(vec![Effect::StartTimer {
            round: number,
            seconds: duration,
        }])
    }

    pub fn submit(
        &mut self,
        player: &str,
        answers: &HashMap<String, String>,
    ) -> GameResult<Vec<Effect>> {
        match self.phase {
            RoomPhase::RoundActive => {}
            RoomPhase::GameOver => return Err(GameError::GameOver),
            _ => return Err(GameError::RoundNotActive),
        }
        if !self.players.is_present(player) {
            return Err(GameError::NotEligible(player.to_string()));
        }

        let ignored = self
            .ledger
            .submit(player, answers, &self.settings.categories)?;
        for err in ignored {
            tracing::debug!(room = %self.code, %player, %err, "Ignoring answer key");
        }
        if let Some(p) = self.players.get_mut(player) {
            p.active = true;
        }

        if self.everyone_submitted() {
            return self.close_round();
        }
        Ok(Vec::new())
    }

    fn everyone_submitted(&self) -> bool {
        let mut active = self.players.list_active().peekable();
        active.peek().is_some() && active.all(|p| self.ledger.has_submitted(&p.id))
    }

    /// ROUND_ACTIVE -> ROUND_CLOSING, or straight to WAITING_RESTART when nothing needs review
    fn close_round(&mut self) -> GameResult<Vec<Effect>> {
        let mut effects = vec![Effect::CancelTimer];

        self.ledger.freeze();
        let letter = match self.round.as_mut() {
            Some(round) => {
                round.close();
                round.letter
            }
            None => return Err(GameError::RoundNotActive),
        };
        self.participants = self.players.list_active().map(|p| p.id.clone()).collect();
        let entries = self.ledger.entries(&self.settings.categories);

        if self.settings.validation_enabled {
            let (kept, rejected) = score::screen(entries);
            tracing::info!(
                room = %self.code,
                to_review = kept.len(),
                auto_rejected = rejected.len(),
                "Round closed"
            );

            let players = &self.players;
            self.validation
                .build(kept, &self.participants, |id| players.name_of(id));
            self.rescore();

            if self.validation.is_active() {
                self.transition(RoomPhase::RoundClosing, "close the round")?;
                return Ok(effects);
            }
        } else {
            let accepted = score::auto_accept(entries, letter, self.book.as_ref());
            tracing::info!(
                room = %self.code,
                accepted = accepted.len(),
                book = self.book.name(),
                "Round closed and scored automatically"
            );
            self.apply_points(score::score_round(&accepted));
        }

        effects.extend(self.finish_round()?);
        Ok(effects)
    }

    fn rescore(&mut self) {
        let accepted: Vec<AnswerEntry> = self.validation.accepted().map(|e| e.as_entry()).collect();
        self.apply_points(score::score_round(&accepted));
    }

    fn apply_points(&mut self, points: HashMap<PlayerId, f64>) {
        for player in self.players.iter_mut() {
            player.score = points.get(&player.id).copied().unwrap_or(0.0);
        }
    }

    /// Bank round points and open the restart vote
    fn finish_round(&mut self) -> GameResult<Vec<Effect>> {
        self.transition(RoomPhase::WaitingRestart, "finish the round")?;
        for player in self.players.iter_mut() {
            player.total_score += player.score;
        }
        self.restart = Some(RestartQuorum::new());
        Ok(vec![Effect::SaveScoreboard])
    }

    pub fn vote(
        &mut self,
        voter: &str,
        validation_id: ValidationId,
        approve: bool,
    ) -> GameResult<Vec<Effect>> {
        match self.phase {
            RoomPhase::RoundClosing => {}
            RoomPhase::GameOver => return Err(GameError::GameOver),
            _ => return Err(GameError::ValidationNotOpen(validation_id)),
        }

        let resolved = self.validation.cast_vote(validation_id, voter, approve)?;
        for entry in &resolved {
            tracing::info!(
                room = %self.code,
                validation = entry.id,
                player = %entry.player_id,
                accepted = entry.accepted,
                "Validation resolved"
            );
        }
        if !resolved.is_empty() {
            self.rescore();
        }

        if !self.validation.is_active() {
            return self.finish_round();
        }
        Ok(Vec::new())
    }

    fn ready_eligible(&self) -> BTreeSet<PlayerId> {
        let present: BTreeSet<PlayerId> =
            self.players.list_present().map(|p| p.id.clone()).collect();
        match self.settings.ready_eligibility {
            ReadyEligibility::Present => present,
            ReadyEligibility::Participants => {
                let staying: BTreeSet<PlayerId> = present
                    .iter()
                    .filter(|id| self.participants.contains(*id))
                    .cloned()
                    .collect();
                // Every participant left, whoever is still here decides
                if staying.is_empty() {
                    present
                } else {
                    staying
                }
            }
        }
    }

    pub fn ready_tally(&self) -> Tally {
        let eligible = self.ready_eligible();
        match (&self.restart, self.phase) {
            (Some(quorum), RoomPhase::WaitingRestart) => quorum.tally(&eligible),
            _ => Tally {
                ready_count: 0,
                ready_total: eligible.len(),
                threshold: threshold(eligible.len()),
            },
        }
    }

    /// Restart vote. Casting twice is a no-op.
    pub fn ready(&mut self, player: &str) -> GameResult<Vec<Effect>> {
        match self.phase {
            RoomPhase::WaitingRestart => {}
            RoomPhase::GameOver => return Err(GameError::GameOver),
            from => {
                return Err(GameError::InvalidTransition {
                    from,
                    action: "vote to restart",
                })
            }
        }

        let eligible = self.ready_eligible();
        let quorum = self.restart.as_mut().ok_or(GameError::InvalidTransition {
            from: self.phase,
            action: "vote to restart",
        })?;
        if quorum.has_voted(player) {
            return Ok(Vec::new());
        }

        let fired = quorum.cast(player, &eligible)?;
        if let Some(p) = self.players.get_mut(player) {
            p.ready = true;
        }

        if fired {
            return self.restart_approved();
        }
        Ok(Vec::new())
    }

    /// WAITING_RESTART -> ROUND_ACTIVE, or GAME_OVER once the round limit is used up
    fn restart_approved(&mut self) -> GameResult<Vec<Effect>> {
        self.restart = None;
        for player in self.players.iter_mut() {
            player.active = false;
            player.ready = false;
        }

        let next = self.round_number() + 1;
        if next > self.settings.round_limit {
            self.transition(RoomPhase::GameOver, "end the game")?;
            tracing::info!(room = %self.code, rounds = self.round_number(), "Game over");
            return Ok(vec![Effect::SaveScoreboard]);
        }
        self.begin_round(next)
    }

    fn live_round(&mut self, number: u32) -> GameResult<&mut Round> {
        if self.phase != RoomPhase::RoundActive {
            return Err(GameError::StaleTimer(number));
        }
        self.round
            .as_mut()
            .filter(|r| r.number == number && r.active)
            .ok_or(GameError::StaleTimer(number))
    }

    /// Countdown sample from the round timer
    pub fn tick(&mut self, round: u32, remaining: u32) -> GameResult<()> {
        let current = self.live_round(round)?;
        current.remaining_seconds = remaining.min(current.remaining_seconds);
        Ok(())
    }

    /// Timer ran out: same as every player being done
    pub fn expire(&mut self, round: u32) -> GameResult<Vec<Effect>> {
        self.live_round(round)?;
        tracing::info!(room = %self.code, round, "Round timer expired");
        self.close_round()
    }

    /// New settings: scores are wiped and the room goes back to the lobby
    pub fn configure(&mut self, update: &SettingsUpdate) -> GameResult<Vec<Effect>> {
        self.transition(RoomPhase::Lobby, "reconfigure")?;
        self.settings.apply(update);

        self.round = None;
        self.ledger.clear();
        self.validation.reset();
        self.restart = None;
        self.participants.clear();
        self.letters.reset();
        for player in self.players.iter_mut() {
            player.score = 0.0;
            player.total_score = 0.0;
            player.active = false;
            player.ready = false;
        }

        Ok(vec![Effect::CancelTimer])
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        let round = self.round.as_ref();
        let tally = self.ready_tally();
        let closing = self.phase == RoomPhase::RoundClosing;
        let validation_active = closing && self.validation.is_active();

        RoomSnapshot {
            code: self.code.clone(),
            phase: self.phase,
            letter: round.map(|r| r.letter.to_string()).unwrap_or_default(),
            remaining_seconds: round.map(|r| r.remaining_seconds).unwrap_or(0),
            round_number: self.round_number(),
            round_limit: self.settings.round_limit,
            round_active: self.phase == RoomPhase::RoundActive && round.is_some_and(|r| r.active),
            waiting_restart: self.phase == RoomPhase::WaitingRestart,
            game_over: self.phase == RoomPhase::GameOver,
            categories: self.settings.categories.clone(),
            round_duration: self.settings.round_duration,
            players: self.players.list().to_vec(),
            active_players: self.players.list_active().count(),
            ready_count: tally.ready_count,
            ready_total: tally.ready_total,
            ready_threshold: tally.threshold,
            validation_enabled: self.settings.validation_enabled,
            validation_active,
            validation_entry: if validation_active {
                self.validation.head().map(|e| e.view())
            } else {
                None
            },
            validation_pending: if closing { self.validation.pending() } else { 0 },
            server_now: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn record(&self) -> RoomRecord {
        RoomRecord {
            code: self.code.clone(),
            host: self.host.clone(),
            categories: self.settings.categories.clone(),
            round_time: self.settings.round_duration,
            rounds: self.settings.round_limit,
            updated_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn scoreboard(&self) -> Vec<PlayerRecord> {
        self.players
            .list()
            .iter()
            .filter(|p| !p.name.is_empty())
            .map(|p| PlayerRecord {
                pseudo: p.name.clone(),
                total_score: p.total_score,
            })
            .collect()
    }
}
