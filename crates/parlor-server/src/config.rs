//! Server configuration.
//!
//! Configuration can be loaded from:
//! - A `parlor.toml` file in the working directory, `/etc/parlor/` or `~/.config/parlor/`
//! - Environment variables (`PARLOR_PORT`, `PARLOR_ROOM__ECHO_TO_SENDER`, ...)
//! - An explicit TOML file via [`Config::from_file`]

use anyhow::{Context, Result};
use parlor_core::{RoomConfig, SlowConsumerPolicy};
use parlor_protocol::{Encoding, FrameCodec};
use parlor_transport::PumpConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_PATHS: [&str; 3] = [
    "parlor.toml",
    "/etc/parlor/parlor.toml",
    "~/.config/parlor/parlor.toml",
];

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Encoding of outgoing frames.
    #[serde(default)]
    pub encoding: Encoding,

    /// Room configuration.
    #[serde(default)]
    pub room: RoomSettings,

    /// Resource limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Heartbeat configuration.
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,

    /// Session cookie configuration.
    #[serde(default)]
    pub session: SessionConfig,

    /// Room event tracing.
    #[serde(default)]
    pub trace: TraceConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// How the room treats a member whose queue is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlowConsumer {
    /// Evict the member.
    #[default]
    Disconnect,
    /// Skip the message for that member.
    Drop,
    /// Wait up to `block_timeout_ms`, then evict.
    Block,
}

/// Room configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSettings {
    /// Room name used in logs.
    #[serde(default = "default_room_name")]
    pub name: String,

    /// Per-client outbound queue capacity.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Room command queue capacity.
    #[serde(default = "default_command_capacity")]
    pub command_capacity: usize,

    /// Deliver a client's messages back to itself.
    #[serde(default = "default_true")]
    pub echo_to_sender: bool,

    /// Full-queue policy.
    #[serde(default)]
    pub slow_consumer: SlowConsumer,

    /// Delivery timeout for the `block` policy.
    #[serde(default = "default_block_timeout")]
    pub block_timeout_ms: u64,
}

/// Resource limits configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum inbound frame size in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

/// Heartbeat configuration. A value of zero disables the timer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Ping interval in milliseconds.
    #[serde(default = "default_ping_interval")]
    pub ping_interval_ms: u64,

    /// Disconnect after this many milliseconds without inbound traffic.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_ms: u64,

    /// Maximum duration of one write in milliseconds.
    #[serde(default = "default_write_timeout")]
    pub write_timeout_ms: u64,

    /// Time the outbound pump gets to flush on disconnect.
    #[serde(default = "default_close_grace")]
    pub close_grace_ms: u64,
}

/// Session cookie configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Name of the signed identity cookie.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Path to the JSON secrets file.
    #[serde(default)]
    pub secrets_path: Option<String>,
}

/// Room event tracing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceConfig {
    /// Write room events to stdout.
    #[serde(default)]
    pub enabled: bool,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics export.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_true() -> bool {
    true
}

fn default_room_name() -> String {
    "lobby".to_string()
}

fn default_queue_capacity() -> usize {
    parlor_core::DEFAULT_QUEUE_CAPACITY
}

fn default_command_capacity() -> usize {
    1024
}

fn default_block_timeout() -> u64 {
    1_000
}

fn default_max_message_size() -> usize {
    parlor_protocol::MAX_FRAME_SIZE
}

fn default_ping_interval() -> u64 {
    30_000 // 30 seconds
}

fn default_idle_timeout() -> u64 {
    60_000 // 60 seconds
}

fn default_write_timeout() -> u64 {
    10_000
}

fn default_close_grace() -> u64 {
    5_000
}

fn default_cookie_name() -> String {
    "auth".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

fn millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            encoding: Encoding::default(),
            room: RoomSettings::default(),
            limits: LimitsConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            session: SessionConfig::default(),
            trace: TraceConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            name: default_room_name(),
            queue_capacity: default_queue_capacity(),
            command_capacity: default_command_capacity(),
            echo_to_sender: true,
            slow_consumer: SlowConsumer::default(),
            block_timeout_ms: default_block_timeout(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_message_size: default_max_message_size(),
        }
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            ping_interval_ms: default_ping_interval(),
            idle_timeout_ms: default_idle_timeout(),
            write_timeout_ms: default_write_timeout(),
            close_grace_ms: default_close_grace(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            secrets_path: None,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration from the first config file found, overlaid with
    /// `PARLOR_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file or variable cannot be parsed.
    pub fn load() -> Result<Self> {
        Self::layered(Self::find_file(), Self::environment())
    }

    /// `PARLOR_PORT`, `PARLOR_ROOM__ECHO_TO_SENDER`, ...
    fn environment() -> config::Environment {
        config::Environment::with_prefix("PARLOR")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    fn layered(file: Option<PathBuf>, env: config::Environment) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path));
        }

        builder
            .add_source(env)
            .build()
            .context("Failed to load configuration")?
            .try_deserialize()
            .context("Invalid configuration")
    }

    fn find_file() -> Option<PathBuf> {
        CONFIG_PATHS
            .iter()
            .map(|path| PathBuf::from(shellexpand::tilde(path).as_ref()))
            .find(|path| path.exists())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Get the socket address to bind to.
    ///
    /// # Errors
    ///
    /// Returns an error if `host:port` is not a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))
    }

    /// Settings for the room loop.
    #[must_use]
    pub fn room_config(&self) -> RoomConfig {
        let slow_consumer = match self.room.slow_consumer {
            SlowConsumer::Disconnect => SlowConsumerPolicy::Disconnect,
            SlowConsumer::Drop => SlowConsumerPolicy::Drop,
            SlowConsumer::Block => SlowConsumerPolicy::Block {
                timeout: Duration::from_millis(self.room.block_timeout_ms),
            },
        };
        RoomConfig {
            name: self.room.name.clone(),
            command_capacity: self.room.command_capacity,
            echo_to_sender: self.room.echo_to_sender,
            slow_consumer,
        }
    }

    /// Settings for each client's pumps.
    #[must_use]
    pub fn pump_config(&self) -> PumpConfig {
        PumpConfig {
            codec: FrameCodec::new(self.encoding, self.limits.max_message_size),
            write_timeout: Duration::from_millis(self.heartbeat.write_timeout_ms),
            idle_timeout: millis(self.heartbeat.idle_timeout_ms),
            ping_interval: millis(self.heartbeat.ping_interval_ms),
            close_grace: Duration::from_millis(self.heartbeat.close_grace_ms),
        }
    }
}
