//! Round countdown task.
//!
//! The timer never touches room state; it only sends tick and expiry
//! commands back into the room's own queue, tagged with the round number so
//! the room can drop events from a round that is already over.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::broadcast::RoomCommand;

const TICK: Duration = Duration::from_millis(250);

#[derive(Debug, Default)]
pub struct RoundTimer {
    handle: Option<JoinHandle<()>>,
}

impl RoundTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start counting down `seconds` for `round`, replacing any running countdown
    pub fn begin(&mut self, round: u32, seconds: u32, commands: mpsc::Sender<RoomCommand>) {
        self.cancel();

        let deadline = Instant::now() + Duration::from_secs(u64::from(seconds));
        self.handle = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last = seconds;

            loop {
                interval.tick().await;
                let left = deadline.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    break;
                }

                let remaining = left.as_secs_f64().ceil() as u32;
                if remaining < last {
                    last = remaining;
                    if commands
                        .send(RoomCommand::TimerTick { round, remaining })
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
            }

            let _ = commands.send(RoomCommand::TimerExpired { round }).await;
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for RoundTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
