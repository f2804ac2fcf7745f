//! Player registry: the set of participants known to a room.
//!
//! Players are never removed. A lost connection only marks the player absent,
//! so scores stay on the scoreboard for the lifetime of the room.

use crate::error::{GameError, GameResult};
use crate::types::*;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct PlayerRegistry {
    code: RoomCode,
    players: Vec<Player>,
    connections: HashMap<ConnectionId, PlayerId>,
    next_seq: u64,
    capacity: usize,
}

impl PlayerRegistry {
    pub fn new(code: &str, capacity: usize) -> Self {
        Self {
            code: code.to_string(),
            players: Vec::new(),
            connections: HashMap::new(),
            next_seq: 0,
            capacity: capacity.max(1),
        }
    }

    /// Bind a connection to a player, creating the player on first contact.
    ///
    /// Idempotent per connection: a repeated join only updates the display name.
    pub fn join(&mut self, connection: ConnectionId, name: Option<&str>) -> GameResult<PlayerId> {
        let name = name.map(clean_name).filter(|n| !n.is_empty());

        if let Some(id) = self.connections.get(&connection).cloned() {
            if let (Some(name), Some(player)) = (name, self.get_mut(&id)) {
                player.name = name;
            }
            return Ok(id);
        }

        if self.present_count() >= self.capacity {
            return Err(GameError::RoomFull(self.code.clone()));
        }

        self.next_seq += 1;
        let id = format!("p-{}-{}", self.code.to_lowercase(), self.next_seq);
        let mut player = Player::new(id.clone());
        if let Some(name) = name {
            player.name = name;
        }
        self.players.push(player);
        self.connections.insert(connection, id.clone());
        Ok(id)
    }

    /// Mark the player behind a connection absent. Returns the player id if it was present.
    pub fn leave(&mut self, connection: ConnectionId) -> Option<PlayerId> {
        let id = self.connections.remove(&connection)?;
        let player = self.get_mut(&id)?;
        player.connected = false;
        player.active = false;
        player.ready = false;
        Some(id)
    }

    pub fn by_connection(&self, connection: ConnectionId) -> Option<&PlayerId> {
        self.connections.get(&connection)
    }

    pub fn get(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn name_of(&self, id: &str) -> String {
        self.get(id).map(|p| p.name.clone()).unwrap_or_default()
    }

    /// Every player ever seen in this room, in join order
    pub fn list(&self) -> &[Player] {
        &self.players
    }

    pub fn list_present(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.connected)
    }

    /// Connected participants of the current round
    pub fn list_active(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.connected && p.active)
    }

    pub fn present_count(&self) -> usize {
        self.list_present().count()
    }

    pub fn is_present(&self, id: &str) -> bool {
        self.get(id).is_some_and(|p| p.connected)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.iter_mut()
    }
}

fn clean_name(name: &str) -> String {
    name.trim().chars().take(MAX_NAME_CHARS).collect()
}
