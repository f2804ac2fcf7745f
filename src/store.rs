//! Room and scoreboard persistence.
//!
//! The game never reads back from the store; records are kept for history only.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::types::RoomCode;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomRecord {
    pub code: RoomCode,
    pub host: String,
    pub categories: Vec<String>,
    pub round_time: u32,
    pub rounds: u32,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    pub pseudo: String,
    pub total_score: f64,
}

/// On-disk document of one room
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RoomFile {
    #[serde(flatten)]
    pub room: RoomRecord,
    #[serde(default)]
    pub players: Vec<PlayerRecord>,
}

#[async_trait]
pub trait RoomStore: Send + Sync {
    async fn save_room(&self, room: RoomRecord) -> Result<(), StoreError>;

    async fn record_player(&self, code: &str, pseudo: &str) -> Result<(), StoreError>;

    async fn save_scoreboard(&self, code: &str, players: Vec<PlayerRecord>) -> Result<(), StoreError>;
}

/// Store that forgets everything
#[derive(Debug, Clone, Default)]
pub struct NullStore;

#[async_trait]
impl RoomStore for NullStore {
    async fn save_room(&self, _room: RoomRecord) -> Result<(), StoreError> {
        Ok(())
    }

    async fn record_player(&self, _code: &str, _pseudo: &str) -> Result<(), StoreError> {
        Ok(())
    }

    async fn save_scoreboard(&self, _code: &str, _players: Vec<PlayerRecord>) -> Result<(), StoreError> {
        Ok(())
    }
}

/// One pretty-printed JSON file per room under `dir`
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
    // Serializes read-modify-write cycles
    lock: std::sync::Arc<tokio::sync::Mutex<()>>,
}

impl JsonFileStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            lock: Default::default(),
        }
    }

    pub fn path_for(&self, code: &str) -> PathBuf {
        self.dir.join(format!("{}.json", code))
    }

    pub async fn load(&self, code: &str) -> Result<Option<RoomFile>, StoreError> {
        let _guard = self.lock.lock().await;
        self.read(code).await
    }

    async fn read(&self, code: &str) -> Result<Option<RoomFile>, StoreError> {
        match tokio::fs::read(self.path_for(code)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&self, code: &str, apply: impl FnOnce(&mut RoomFile)) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        tokio::fs::create_dir_all(&self.dir).await?;

        let mut file = self.read(code).await?.unwrap_or_else(|| RoomFile {
            room: RoomRecord {
                code: code.to_string(),
                ..RoomRecord::default()
            },
            players: Vec::new(),
        });
        apply(&mut file);
        file.room.updated_at = chrono::Utc::now().to_rfc3339();

        let json = serde_json::to_vec_pretty(&file)?;
        tokio::fs::write(self.path_for(code), json).await?;
        Ok(())
    }
}

#[async_trait]
impl RoomStore for JsonFileStore {
    async fn save_room(&self, room: RoomRecord) -> Result<(), StoreError> {
        let code = room.code.clone();
        self.update(&code, |file| file.room = room).await
    }

    async fn record_player(&self, code: &str, pseudo: &str) -> Result<(), StoreError> {
        self.update(code, |file| {
            if !file.players.iter().any(|p| p.pseudo == pseudo) {
                file.players.push(PlayerRecord {
                    pseudo: pseudo.to_string(),
                    total_score: 0.0,
                });
            }
        })
        .await
    }

    async fn save_scoreboard(&self, code: &str, players: Vec<PlayerRecord>) -> Result<(), StoreError> {
        self.update(code, |file| {
            for player in players {
                match file.players.iter_mut().find(|p| p.pseudo == player.pseudo) {
                    Some(existing) => existing.total_score = player.total_score,
                    None => file.players.push(player),
                }
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(code: &str) -> RoomRecord {
        RoomRecord {
            code: code.to_string(),
            host: "Alice".to_string(),
            categories: vec!["Animal".to_string()],
            round_time: 60,
            rounds: 3,
            updated_at: String::new(),
        }
    }

    #[tokio::test]
    async fn test_json_store_writes_room_and_players() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        store.save_room(record("ABCDE")).await.unwrap();
        store.record_player("ABCDE", "Alice").await.unwrap();
        store.record_player("ABCDE", "Alice").await.unwrap();
        store
            .save_scoreboard(
                "ABCDE",
                vec![
                    PlayerRecord { pseudo: "Alice".into(), total_score: 2.5 },
                    PlayerRecord { pseudo: "Bob".into(), total_score: 1.0 },
                ],
            )
            .await
            .unwrap();

        let file = store.load("ABCDE").await.unwrap().unwrap();
        assert_eq!(file.room.host, "Alice");
        assert_eq!(file.room.round_time, 60);
        assert!(!file.room.updated_at.is_empty());
        assert_eq!(file.players.len(), 2);
        assert_eq!(file.players[0].total_score, 2.5);
    }

    #[tokio::test]
    async fn test_json_store_uses_wire_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        store.save_room(record("WXYZ2")).await.unwrap();

        let raw = std::fs::read_to_string(store.path_for("WXYZ2")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["code"], "WXYZ2");
        assert_eq!(json["roundTime"], 60);
        assert!(json.get("updatedAt").is_some());
        assert_eq!(json["players"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_missing_room_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        assert!(store.load("NOPE").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_null_store_accepts_everything() {
        let store = NullStore;
        assert!(store.save_room(record("ABCDE")).await.is_ok());
        assert!(store.save_scoreboard("ABCDE", vec![]).await.is_ok());
    }
}
