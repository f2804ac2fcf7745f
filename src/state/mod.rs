pub mod game;
pub mod player;
pub mod restart;
pub mod round;
pub mod score;
pub mod submission;
pub mod timer;
pub mod validation;

use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::broadcast::{spawn_room, RoomHandle};
use crate::config::Config;
use crate::error::{GameError, GameResult};
use crate::protocol::CreateRoomRequest;
use crate::store::{JsonFileStore, NullStore, RoomStore};
use crate::types::*;
use game::Room;
use score::WordList;

/// Room code to running room. Held only for lookup, insert and removal.
pub type RoomDirectory = Arc<RwLock<HashMap<RoomCode, RoomHandle>>>;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 5;

fn random_code() -> RoomCode {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub rooms: RoomDirectory,
    pub config: Arc<Config>,
    pub store: Arc<dyn RoomStore>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let store: Arc<dyn RoomStore> = match &config.data_dir {
            Some(dir) => Arc::new(JsonFileStore::new(dir)),
            None => Arc::new(NullStore),
        };
        Self::with_store(config, store)
    }

    pub fn with_store(config: Config, store: Arc<dyn RoomStore>) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            config: Arc::new(config),
            store,
        }
    }

    fn spawn(&self, room: Room) -> RoomHandle {
        spawn_room(room, self.rooms.clone(), self.store.clone(), &self.config)
    }

    /// Get the default room, (re)opening it if needed
    pub async fn ensure_default_room(&self) -> RoomHandle {
        let mut rooms = self.rooms.write().await;
        if let Some(handle) = rooms.get(DEFAULT_ROOM_CODE).filter(|h| !h.is_closed()) {
            return handle.clone();
        }

        let room = Room::new(DEFAULT_ROOM_CODE, "", self.config.defaults.clone());
        let handle = self.spawn(room);
        rooms.insert(DEFAULT_ROOM_CODE.to_string(), handle.clone());
        handle
    }

    /// Open a room with a fresh unique code
    pub async fn create_room(&self, request: CreateRoomRequest) -> RoomHandle {
        let mut settings = self.config.defaults.clone();
        settings.apply(&SettingsUpdate {
            categories: Some(request.categories),
            duration: request.duration,
            rounds: request.rounds,
            validation: request.validation,
        });

        let mut rooms = self.rooms.write().await;
        let code = loop {
            let code = random_code();
            if !rooms.contains_key(&code) {
                break code;
            }
        };

        let mut room = Room::new(&code, &request.host, settings);
        if let Some(lists) = request.word_list.filter(|l| !l.is_empty()) {
            room = room.with_book(Arc::new(WordList::new(&lists)));
        }
        tracing::info!(room = %code, host = %request.host, "Room created");

        let handle = self.spawn(room);
        rooms.insert(code, handle.clone());
        handle
    }

    pub async fn get_room(&self, code: &str) -> GameResult<RoomHandle> {
        let code = normalize_room_code(code);
        if code == DEFAULT_ROOM_CODE {
            return Ok(self.ensure_default_room().await);
        }

        let rooms = self.rooms.read().await;
        rooms
            .get(&code)
            .filter(|h| !h.is_closed())
            .cloned()
            .ok_or(GameError::RoomUnavailable(code))
    }

    /// Room for a socket: the given code, or the default room when none
    pub async fn resolve_room(&self, code: Option<&str>) -> GameResult<RoomHandle> {
        match code.map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => self.get_room(code).await,
            None => Ok(self.ensure_default_room().await),
        }
    }

    /// Explicit teardown. The default room reopens empty on next use.
    pub async fn remove_room(&self, code: &str) -> GameResult<()> {
        let code = normalize_room_code(code);
        let handle = self
            .rooms
            .write()
            .await
            .remove(&code)
            .ok_or_else(|| GameError::RoomUnavailable(code.clone()))?;
        handle.shutdown().await;
        tracing::info!(room = %code, "Room removed");
        Ok(())
    }

    pub async fn room_codes(&self) -> Vec<RoomCode> {
        let mut codes: Vec<RoomCode> = self.rooms.read().await.keys().cloned().collect();
        codes.sort();
        codes
    }
}
