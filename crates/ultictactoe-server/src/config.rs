use std::path::Path;

use serde::Deserialize;

use ultictactoe_core::net::protocol::{DEFAULT_PLAY_PATH_PREFIX, MAX_MESSAGE_SIZE};
use ultictactoe_core::room::{DEFAULT_MAX_MEMBERS, MIN_MEMBERS_TO_START};

/// Config file looked up in the working directory.
pub const CONFIG_FILE: &str = "ultictactoe.toml";

/// Top-level server configuration, loaded from `ultictactoe.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub web_root: String,
    pub limits: LimitsConfig,
    pub rooms: RoomsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            web_root: "web".to_string(),
            limits: LimitsConfig::default(),
            rooms: RoomsConfig::default(),
        }
    }
}

/// Infrastructure limits (connection caps, buffer sizes, rate limits).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_ws_connections: usize,
    /// Maximum concurrent WebSocket connections per IP address.
    pub max_ws_per_ip: usize,
    pub ws_rate_limit_per_sec: f64,
    /// Outbound frames buffered per member before broadcasts skip it.
    pub member_message_buffer: usize,
    /// Inbound text frames above this many bytes are dropped.
    pub max_message_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_ws_connections: 200,
            max_ws_per_ip: 10,
            ws_rate_limit_per_sec: 20.0,
            member_message_buffer: 64,
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }
}

/// Room lifecycle configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoomsConfig {
    pub max_members: usize,
    pub min_members_to_start: usize,
    /// How long an allocated code stays reserved for its first joiner.
    pub code_reservation_secs: u64,
    pub reservation_sweep_interval_secs: u64,
    /// Game page prefix announced in `start` (`<prefix>/<code>/`).
    pub play_path_prefix: String,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            max_members: DEFAULT_MAX_MEMBERS,
            min_members_to_start: MIN_MEMBERS_TO_START,
            code_reservation_secs: 60,
            reservation_sweep_interval_secs: 30,
            play_path_prefix: DEFAULT_PLAY_PATH_PREFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidListenAddr(String),
    /// A numeric setting that must be positive was zero (or negative).
    NotPositive(&'static str),
    MembersBelowStartMinimum { max: usize, min: usize },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidListenAddr(addr) => {
                write!(f, "listen_addr is not a valid socket address: {addr}")
            },
            Self::NotPositive(key) => write!(f, "{key} must be > 0"),
            Self::MembersBelowStartMinimum { max, min } => write!(
                f,
                "rooms.max_members ({max}) is below rooms.min_members_to_start ({min})"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

impl ServerConfig {
    /// Check the configuration; the first problem found is returned.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::InvalidListenAddr(self.listen_addr.clone()));
        }

        let limits = &self.limits;
        let positive = [
            ("limits.max_ws_connections", limits.max_ws_connections),
            ("limits.max_ws_per_ip", limits.max_ws_per_ip),
            ("limits.member_message_buffer", limits.member_message_buffer),
            ("limits.max_message_size", limits.max_message_size),
            ("rooms.max_members", self.rooms.max_members),
            ("rooms.min_members_to_start", self.rooms.min_members_to_start),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::NotPositive(key));
            }
        }
        if limits.ws_rate_limit_per_sec <= 0.0 {
            return Err(ConfigError::NotPositive("limits.ws_rate_limit_per_sec"));
        }
        if self.rooms.code_reservation_secs == 0 {
            return Err(ConfigError::NotPositive("rooms.code_reservation_secs"));
        }
        if self.rooms.reservation_sweep_interval_secs == 0 {
            return Err(ConfigError::NotPositive(
                "rooms.reservation_sweep_interval_secs",
            ));
        }
        if self.rooms.max_members < self.rooms.min_members_to_start {
            return Err(ConfigError::MembersBelowStartMinimum {
                max: self.rooms.max_members,
                min: self.rooms.min_members_to_start,
            });
        }

        if limits.max_message_size > MAX_MESSAGE_SIZE {
            tracing::warn!(
                configured = limits.max_message_size,
                codec_max = MAX_MESSAGE_SIZE,
                "limits.max_message_size exceeds the codec limit; larger frames still fail to decode"
            );
        }

        Ok(())
    }

    /// Load `ultictactoe.toml` if it exists, then apply env var overrides.
    pub fn load() -> Self {
        let mut config = Self::load_file(Path::new(CONFIG_FILE));
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    fn load_file(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!(path = %path.display(), "Loaded configuration");
                    cfg
                },
                Err(e) => {
                    tracing::warn!(path = %path.display(), "Failed to parse config: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!(path = %path.display(), "No config file found, using defaults");
                ServerConfig::default()
            },
        }
    }

    /// Apply `ULTICTACTOE_*` overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = lookup("ULTICTACTOE_LISTEN_ADDR")
            && !addr.is_empty()
        {
            self.listen_addr = addr;
        }
        if let Some(root) = lookup("ULTICTACTOE_WEB_ROOT")
            && !root.is_empty()
        {
            self.web_root = root;
        }
        if let Some(val) = lookup("ULTICTACTOE_MAX_WS_CONNECTIONS")
            && let Ok(n) = val.parse::<usize>()
        {
            self.limits.max_ws_connections = n;
        }
        if let Some(val) = lookup("ULTICTACTOE_MAX_MEMBERS")
            && let Ok(n) = val.parse::<usize>()
        {
            self.rooms.max_members = n;
        }
        if let Some(val) = lookup("ULTICTACTOE_WS_RATE_LIMIT")
            && let Ok(n) = val.parse::<f64>()
        {
            self.limits.ws_rate_limit_per_sec = n;
        }
    }
}
