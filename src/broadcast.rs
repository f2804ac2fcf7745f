//! Room actor.
//!
//! Each room runs as one spawned task that owns its `Room` outright. Sockets,
//! HTTP handlers and the round timer talk to it through a command queue, so
//! every mutation of a room is serialized without a lock. After each
//! successful mutation the actor fans a fresh snapshot out to subscribers.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::config::Config;
use crate::error::{GameError, GameResult};
use crate::protocol::{ClientMessage, RoomSnapshot, ServerMessage};
use crate::state::game::{Effect, Room};
use crate::state::timer::RoundTimer;
use crate::state::RoomDirectory;
use crate::store::RoomStore;
use crate::types::*;

const COMMAND_CAPACITY: usize = 64;

pub enum RoomCommand {
    Connect {
        name: Option<String>,
        reply: oneshot::Sender<GameResult<Connected>>,
    },
    Client {
        connection: ConnectionId,
        message: ClientMessage,
        reply: oneshot::Sender<GameResult<()>>,
    },
    Disconnect {
        connection: ConnectionId,
    },
    Start {
        reply: oneshot::Sender<GameResult<()>>,
    },
    Configure {
        update: SettingsUpdate,
        reply: oneshot::Sender<GameResult<()>>,
    },
    Snapshot {
        reply: oneshot::Sender<RoomSnapshot>,
    },
    TimerTick {
        round: u32,
        remaining: u32,
    },
    TimerExpired {
        round: u32,
    },
    ReapIfEmpty {
        generation: u64,
    },
    Shutdown,
}

/// A socket bound to a player of the room
pub struct Connected {
    pub connection: ConnectionId,
    pub player_id: PlayerId,
    /// Subscribed before the join was published, so the first message is the post-join state
    pub updates: broadcast::Receiver<ServerMessage>,
}

/// Cheap, cloneable address of a running room
#[derive(Clone)]
pub struct RoomHandle {
    code: RoomCode,
    commands: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn code(&self) -> &str {
        &self.code
    }

    /// True once the actor has stopped
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    fn unavailable(&self) -> GameError {
        GameError::RoomUnavailable(self.code.clone())
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> GameResult<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| self.unavailable())?;
        rx.await.map_err(|_| self.unavailable())
    }

    pub async fn connect(&self, name: Option<String>) -> GameResult<Connected> {
        self.request(|reply| RoomCommand::Connect { name, reply })
            .await?
    }

    pub async fn send(&self, connection: ConnectionId, message: ClientMessage) -> GameResult<()> {
        self.request(|reply| RoomCommand::Client {
            connection,
            message,
            reply,
        })
        .await?
    }

    pub async fn disconnect(&self, connection: ConnectionId) {
        let _ = self
            .commands
            .send(RoomCommand::Disconnect { connection })
            .await;
    }

    pub async fn start(&self) -> GameResult<()> {
        self.request(|reply| RoomCommand::Start { reply }).await?
    }

    pub async fn configure(&self, update: SettingsUpdate) -> GameResult<()> {
        self.request(|reply| RoomCommand::Configure { update, reply })
            .await?
    }

    pub async fn snapshot(&self) -> GameResult<RoomSnapshot> {
        self.request(|reply| RoomCommand::Snapshot { reply }).await
    }

    pub async fn shutdown(&self) {
        let _ = self.commands.send(RoomCommand::Shutdown).await;
    }
}

struct RoomActor {
    room: Room,
    timer: RoundTimer,
    commands: mpsc::WeakSender<RoomCommand>,
    snapshots: broadcast::Sender<ServerMessage>,
    directory: RoomDirectory,
    store: Arc<dyn RoomStore>,
    empty_room_ttl: Duration,
    next_connection: ConnectionId,
    reap_generation: u64,
    /// The default room lives as long as the process
    permanent: bool,
}

/// Spawn the actor for `room` and return its handle.
///
/// The caller is responsible for inserting the handle into the directory.
pub fn spawn_room(
    room: Room,
    directory: RoomDirectory,
    store: Arc<dyn RoomStore>,
    config: &Config,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
    let (snapshots, _) = broadcast::channel(config.broadcast_capacity);
    let handle = RoomHandle {
        code: room.code().to_string(),
        commands: tx.clone(),
    };

    let mut actor = RoomActor {
        permanent: room.code() == DEFAULT_ROOM_CODE,
        room,
        timer: RoundTimer::new(),
        commands: tx.downgrade(),
        snapshots,
        directory,
        store,
        empty_room_ttl: config.empty_room_ttl,
        next_connection: 0,
        reap_generation: 0,
    };

    tracing::info!(room = %actor.room.code(), "Room opened");
    actor.persist_room();
    // A room nobody ever joins goes away too
    actor.schedule_reap();
    tokio::spawn(actor.run(rx));

    handle
}

impl RoomActor {
    async fn run(mut self, mut rx: mpsc::Receiver<RoomCommand>) {
        while let Some(command) = rx.recv().await {
            if self.dispatch(command).await.is_break() {
                break;
            }
        }
        self.timer.cancel();
        tracing::info!(room = %self.room.code(), "Room closed");
    }

    async fn dispatch(&mut self, command: RoomCommand) -> ControlFlow<()> {
        match command {
            RoomCommand::Connect { name, reply } => {
                self.next_connection += 1;
                let connection = self.next_connection;
                let updates = self.snapshots.subscribe();

                match self.room.join(connection, name.as_deref()) {
                    Ok(player_id) => {
                        tracing::info!(room = %self.room.code(), player = %player_id, connection, "Player connected");
                        // Cancels any pending teardown
                        self.reap_generation += 1;
                        self.persist_player(connection);
                        self.publish();

                        let connected = Connected {
                            connection,
                            player_id,
                            updates,
                        };
                        if reply.send(Ok(connected)).is_err() {
                            // Socket gave up while waiting
                            let _ = self.mutate(|room| room.disconnect(connection));
                        }
                    }
                    Err(e) => {
                        tracing::debug!(room = %self.room.code(), "Connection refused: {}", e);
                        let _ = reply.send(Err(e));
                    }
                }
            }
            RoomCommand::Client {
                connection,
                message,
                reply,
            } => {
                let is_join = matches!(message, ClientMessage::Join { .. });
                let result = self.mutate(|room| room.handle(connection, message));
                if result.is_ok() && is_join {
                    self.persist_player(connection);
                }
                let _ = reply.send(result);
            }
            RoomCommand::Disconnect { connection } => {
                let _ = self.mutate(|room| room.disconnect(connection));
            }
            RoomCommand::Start { reply } => {
                let _ = reply.send(self.mutate(Room::start));
            }
            RoomCommand::Configure { update, reply } => {
                let result = self.mutate(|room| room.configure(&update));
                if result.is_ok() {
                    self.persist_room();
                }
                let _ = reply.send(result);
            }
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(self.room.snapshot());
            }
            RoomCommand::TimerTick { round, remaining } => match self.room.tick(round, remaining) {
                Ok(()) => self.publish(),
                Err(e) => tracing::debug!(room = %self.room.code(), "Dropping timer tick: {}", e),
            },
            RoomCommand::TimerExpired { round } => {
                let _ = self.mutate(|room| room.expire(round));
            }
            RoomCommand::ReapIfEmpty { generation } => {
                if generation == self.reap_generation
                    && self.room.players().present_count() == 0
                {
                    self.leave_directory().await;
                    return ControlFlow::Break(());
                }
            }
            RoomCommand::Shutdown => {
                tracing::info!(room = %self.room.code(), "Room shutdown requested");
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// Run one room operation; on success carry out its effects and publish
    fn mutate(&mut self, op: impl FnOnce(&mut Room) -> GameResult<Vec<Effect>>) -> GameResult<()> {
        match op(&mut self.room) {
            Ok(effects) => {
                self.apply(effects);
                self.publish();
                Ok(())
            }
            Err(e) => {
                tracing::debug!(room = %self.room.code(), code = e.code(), "Rejected: {}", e);
                Err(e)
            }
        }
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::StartTimer { round, seconds } => match self.commands.upgrade() {
                    Some(tx) => self.timer.begin(round, seconds, tx),
                    None => tracing::warn!(room = %self.room.code(), "Room queue gone, timer not started"),
                },
                Effect::CancelTimer => self.timer.cancel(),
                Effect::SaveScoreboard => self.persist_scoreboard(),
                Effect::RoomEmpty => self.schedule_reap(),
            }
        }
    }

    fn publish(&self) {
        // No subscribers is fine
        let _ = self.snapshots.send(ServerMessage::State(self.room.snapshot()));
    }

    fn schedule_reap(&mut self) {
        if self.permanent {
            return;
        }
        self.reap_generation += 1;
        let generation = self.reap_generation;
        let commands = self.commands.clone();
        let ttl = self.empty_room_ttl;
        tracing::debug!(room = %self.room.code(), "Room empty, teardown in {:?}", ttl);

        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Some(tx) = commands.upgrade() {
                let _ = tx.send(RoomCommand::ReapIfEmpty { generation }).await;
            }
        });
    }

    async fn leave_directory(&self) {
        let Some(own) = self.commands.upgrade() else {
            return;
        };
        let mut rooms = self.directory.write().await;
        if rooms
            .get(self.room.code())
            .is_some_and(|h| h.commands.same_channel(&own))
        {
            rooms.remove(self.room.code());
            tracing::info!(room = %self.room.code(), "Empty room torn down");
        }
    }

    fn persist_room(&self) {
        let store = self.store.clone();
        let record = self.room.record();
        tokio::spawn(async move {
            if let Err(e) = store.save_room(record.clone()).await {
                tracing::error!(room = %record.code, "Failed to save room: {}", e);
            }
        });
    }

    fn persist_player(&self, connection: ConnectionId) {
        let Some(id) = self.room.player_for(connection) else {
            return;
        };
        let name = self.room.players().name_of(id);
        if name.is_empty() {
            return;
        }
        let store = self.store.clone();
        let code = self.room.code().to_string();
        tokio::spawn(async move {
            if let Err(e) = store.record_player(&code, &name).await {
                tracing::error!(room = %code, "Failed to record player: {}", e);
            }
        });
    }

    fn persist_scoreboard(&self) {
        let store = self.store.clone();
        let code = self.room.code().to_string();
        let players = self.room.scoreboard();
        tokio::spawn(async move {
            if let Err(e) = store.save_scoreboard(&code, players).await {
                tracing::error!(room = %code, "Failed to save scoreboard: {}", e);
            }
        });
    }
}
