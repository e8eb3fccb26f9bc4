use std::time::Duration;

use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Command-line overrides. Only flags that were actually passed are merged,
/// so a TOML or env value is never clobbered by a CLI default.
#[derive(Parser, Serialize, Debug, Default)]
#[command(name = "notify-hub", version, about = "Real-time notification hub")]
pub struct Cli {
    /// Port to listen on
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Bind address
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long)]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub json_logs: bool,

    /// Path to TOML config file
    #[arg(long, default_value = "./notify-hub.toml")]
    #[serde(skip)]
    pub config: String,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    #[serde(skip)]
    pub generate_config: bool,
}

/// Resolved server configuration.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default)]
    pub json_logs: bool,

    /// HS256 secret shared with the auth service. Empty means "generate one
    /// at startup", which only makes sense for local development.
    #[serde(default)]
    pub jwt_secret: String,

    #[serde(default)]
    pub hub: HubConfig,
}

/// Tuning for connection lifecycle and backpressure (`[hub]` in TOML).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct HubConfig {
    /// Per-connection outbox bound. A connection whose outbox is full is evicted.
    pub outbox_capacity: usize,
    /// Interval between protocol-level pings on the outbound loop.
    pub ping_interval_ms: u64,
    /// Inbound read deadline, extended by every received frame.
    pub read_deadline_ms: u64,
    /// Deadline applied to each outbound write.
    pub write_deadline_ms: u64,
    /// Largest inbound frame accepted, in bytes.
    pub max_message_size: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            outbox_capacity: 256,
            ping_interval_ms: 54_000,
            read_deadline_ms: 60_000,
            write_deadline_ms: 10_000,
            max_message_size: 4096,
        }
    }
}

impl HubConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn read_deadline(&self) -> Duration {
        Duration::from_millis(self.read_deadline_ms)
    }

    pub fn write_deadline(&self) -> Duration {
        Duration::from_millis(self.write_deadline_ms)
    }

    /// Reject settings that would make keepalive or backpressure misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.outbox_capacity == 0 {
            return Err(ConfigError::Invalid("hub.outbox_capacity must be > 0".into()));
        }
        if self.ping_interval_ms == 0 || self.read_deadline_ms == 0 || self.write_deadline_ms == 0
        {
            return Err(ConfigError::Invalid("hub timings must be > 0".into()));
        }
        // A ping must go out before the peer's silence trips the read deadline
        if self.ping_interval_ms >= self.read_deadline_ms {
            return Err(ConfigError::Invalid(
                "hub.ping_interval_ms must be less than hub.read_deadline_ms".into(),
            ));
        }
        if self.max_message_size == 0 {
            return Err(ConfigError::Invalid("hub.max_message_size must be > 0".into()));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Figment(#[from] Box<figment::Error>),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn default_port() -> u16 {
    5000
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            json_logs: false,
            jwt_secret: String::new(),
            hub: HubConfig::default(),
        }
    }
}

impl Config {
    /// Layered precedence:
    /// built-in defaults < TOML file < env vars (NOTIFY_HUB_*) < CLI args
    pub fn figment(cli: &Cli) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&cli.config))
            .merge(Env::prefixed("NOTIFY_HUB_").split("__"))
            .merge(Serialized::defaults(cli))
    }

    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment(cli))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Config = figment.extract()?;
        config.hub.validate()?;
        Ok(config)
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Notification Hub Configuration
# Place this file at ./notify-hub.toml or specify with --config <path>
# All settings can be overridden via environment variables (NOTIFY_HUB_PORT,
# NOTIFY_HUB_HUB__OUTBOX_CAPACITY, etc.) or CLI flags (--port, etc.)

# Server port (default: 5000)
# port = 5000

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# HS256 secret shared with the auth service that issues bearer tokens.
# Leave empty to generate a throwaway secret at startup (development only).
# jwt_secret = ""

# ---- Connection lifecycle ----
# [hub]

# Outbound mailbox size per connection. A client that falls this far
# behind is disconnected instead of stalling broadcasts.
# outbox_capacity = 256

# Keepalive: ping every 54s, drop the client after 60s of silence.
# ping_interval_ms must be less than read_deadline_ms.
# ping_interval_ms = 54000
# read_deadline_ms = 60000

# Deadline for a single outbound write
# write_deadline_ms = 10000

# Largest inbound frame accepted, in bytes
# max_message_size = 4096
"#
    .to_string()
}
