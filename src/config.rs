//! Server configuration loaded from the environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::types::*;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub static_dir: PathBuf,
    /// Settings new rooms start with
    pub defaults: RoomSettings,
    /// How long an empty room survives before teardown
    pub empty_room_ttl: Duration,
    pub broadcast_capacity: usize,
    /// Enables the JSON file store when set
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            static_dir: PathBuf::from("static"),
            defaults: RoomSettings::default(),
            empty_room_ttl: Duration::from_secs(300),
            broadcast_capacity: 32,
            data_dir: None,
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("Invalid value {:?} for {}, using default", raw, key);
                default
            }
        },
        Err(_) => default,
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| {
            let v = v.trim().to_lowercase();
            v != "0" && v != "false" && v != "off"
        })
        .unwrap_or(default)
}

impl Config {
    /// Load config from environment variables
    pub fn from_env() -> Self {
        let base = Self::default();

        let round_duration = env_parse("PETITBAC_ROUND_SECONDS", base.defaults.round_duration)
            .clamp(MIN_ROUND_SECONDS, MAX_ROUND_SECONDS);
        let round_limit =
            env_parse("PETITBAC_ROUNDS", base.defaults.round_limit).clamp(MIN_ROUNDS, MAX_ROUNDS);
        let max_players = env_parse("PETITBAC_MAX_PLAYERS", base.defaults.max_players).max(1);

        let ready_eligibility = match std::env::var("PETITBAC_READY_ELIGIBILITY") {
            Ok(raw) => ReadyEligibility::parse(&raw).unwrap_or_else(|| {
                tracing::warn!("Unknown ready eligibility {:?}, using present players", raw);
                ReadyEligibility::Present
            }),
            Err(_) => ReadyEligibility::Present,
        };

        let data_dir = std::env::var("PETITBAC_DATA_DIR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let config = Self {
            port: env_parse("PETITBAC_PORT", base.port),
            static_dir: std::env::var("PETITBAC_STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(base.static_dir),
            defaults: RoomSettings {
                round_duration,
                round_limit,
                max_players,
                validation_enabled: env_flag("PETITBAC_VALIDATION", true),
                ready_eligibility,
                ..base.defaults
            },
            empty_room_ttl: Duration::from_secs(env_parse(
                "PETITBAC_EMPTY_ROOM_TTL_SECS",
                base.empty_room_ttl.as_secs(),
            )),
            broadcast_capacity: env_parse("PETITBAC_BROADCAST_CAPACITY", base.broadcast_capacity)
                .max(1),
            data_dir,
        };

        match &config.data_dir {
            Some(dir) => tracing::info!("Persisting rooms to {}", dir.display()),
            None => tracing::info!("Room persistence disabled (set PETITBAC_DATA_DIR to enable)"),
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: &[&str] = &[
        "PETITBAC_PORT",
        "PETITBAC_STATIC_DIR",
        "PETITBAC_ROUND_SECONDS",
        "PETITBAC_ROUNDS",
        "PETITBAC_MAX_PLAYERS",
        "PETITBAC_VALIDATION",
        "PETITBAC_READY_ELIGIBILITY",
        "PETITBAC_EMPTY_ROOM_TTL_SECS",
        "PETITBAC_BROADCAST_CAPACITY",
        "PETITBAC_DATA_DIR",
    ];

    fn clear_env() {
        for key in KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let config = Config::from_env();

        assert_eq!(config.port, 8080);
        assert_eq!(config.defaults.round_duration, 90);
        assert_eq!(config.defaults.round_limit, 5);
        assert_eq!(config.defaults.max_players, 5);
        assert!(config.defaults.validation_enabled);
        assert_eq!(config.defaults.ready_eligibility, ReadyEligibility::Present);
        assert_eq!(config.empty_room_ttl, Duration::from_secs(300));
        assert!(config.data_dir.is_none());
    }

    #[test]
    #[serial]
    fn test_values_are_clamped() {
        clear_env();
        std::env::set_var("PETITBAC_ROUND_SECONDS", "5");
        std::env::set_var("PETITBAC_ROUNDS", "500");
        let config = Config::from_env();

        assert_eq!(config.defaults.round_duration, MIN_ROUND_SECONDS);
        assert_eq!(config.defaults.round_limit, MAX_ROUNDS);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_values_fall_back() {
        clear_env();
        std::env::set_var("PETITBAC_PORT", "not-a-port");
        std::env::set_var("PETITBAC_READY_ELIGIBILITY", "everyone");
        std::env::set_var("PETITBAC_VALIDATION", "false");
        std::env::set_var("PETITBAC_DATA_DIR", "/tmp/petitbac");
        let config = Config::from_env();

        assert_eq!(config.port, 8080);
        assert_eq!(config.defaults.ready_eligibility, ReadyEligibility::Present);
        assert!(!config.defaults.validation_enabled);
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/petitbac")));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_participants_eligibility() {
        clear_env();
        std::env::set_var("PETITBAC_READY_ELIGIBILITY", "participants");
        let config = Config::from_env();
        assert_eq!(config.defaults.ready_eligibility, ReadyEligibility::Participants);
        clear_env();
    }
}
