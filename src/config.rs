//! Protocol constants and the runtime configuration of the packet parser.
//!
//! A [`CodecConfig`] comes from a TOML file ([`CodecConfig::from_file`]),
//! `GQUIC_CODEC_*` environment variables ([`CodecConfig::from_env`]) or the
//! defaults. The wire-format constants are fixed by the protocol; only how
//! datagrams are accepted and logged is configurable.

use crate::error::{ProtocolError, Result};
use crate::protocol::dispatcher::Perspective;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::Level;

/// Largest datagram the protocol sends.
pub const MAX_PACKET_SIZE: usize = 1350;

/// Length of a connection ID on the wire.
pub const CONNECTION_ID_LEN: usize = 8;

/// Length of the server's diversification nonce.
pub const DIVERSIFICATION_NONCE_LEN: usize = 32;

/// Length of the `RNON` nonce proof in a public reset.
pub const NONCE_PROOF_LEN: usize = 32;

/// Smallest accepted `max_packet_size`.
pub const MIN_MAX_PACKET_SIZE: usize = 1200;

/// Largest UDP payload over IPv4.
pub const MAX_UDP_PAYLOAD: usize = 65527;

/// Longest accepted `logging.app_name`.
const MAX_APP_NAME_LEN: usize = 64;

/// Everything a codec deployment can tune: the `[parser]` and `[logging]`
/// tables of the TOML file.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct CodecConfig {
    #[serde(default)]
    pub parser: ParserConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CodecConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ProtocolError::ConfigError(format!("Cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml(&contents)
    }

    /// Parse a TOML document. Missing tables and keys take their defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Invalid codec TOML: {e}")))
    }

    /// Defaults overlaid with `GQUIC_CODEC_MAX_PACKET_SIZE`,
    /// `GQUIC_CODEC_LOG_LEVEL` and `GQUIC_CODEC_PERSPECTIVE`.
    ///
    /// A variable that is set but does not parse is an error.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(size) = std::env::var("GQUIC_CODEC_MAX_PACKET_SIZE") {
            config.parser.max_packet_size = size.parse::<usize>().map_err(|e| {
                ProtocolError::ConfigError(format!(
                    "Invalid GQUIC_CODEC_MAX_PACKET_SIZE '{size}': {e}"
                ))
            })?;
        }

        if let Ok(level) = std::env::var("GQUIC_CODEC_LOG_LEVEL") {
            config.logging.log_level = level.parse::<Level>().map_err(|_| {
                ProtocolError::ConfigError(format!("Invalid GQUIC_CODEC_LOG_LEVEL '{level}'"))
            })?;
        }

        if let Ok(perspective) = std::env::var("GQUIC_CODEC_PERSPECTIVE") {
            config.parser.perspective = match perspective.to_ascii_lowercase().as_str() {
                "client" => Perspective::Client,
                "server" => Perspective::Server,
                _ => {
                    return Err(ProtocolError::ConfigError(format!(
                        "Invalid GQUIC_CODEC_PERSPECTIVE '{perspective}'"
                    )))
                }
            };
        }

        Ok(config)
    }

    pub fn default_with_overrides(edit: impl FnOnce(&mut Self)) -> Self {
        let mut config = Self::default();
        edit(&mut config);
        config
    }

    /// The defaults rendered as TOML, suitable as a starting config file.
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let rendered = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Cannot render config: {e}")))?;
        std::fs::write(path, rendered).map_err(|e| {
            ProtocolError::ConfigError(format!("Cannot write {}: {e}", path.display()))
        })
    }

    /// Every problem found, one message each; empty when the config is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = self.parser.validate();
        problems.extend(self.logging.validate());
        problems
    }

    /// [`validate`](Self::validate) folded into a single `ConfigError`.
    pub fn validate_strict(&self) -> Result<()> {
        let problems = self.validate();
        if problems.is_empty() {
            return Ok(());
        }
        Err(ProtocolError::ConfigError(format!(
            "Invalid codec config: {}",
            problems.join("; ")
        )))
    }
}

/// How incoming datagrams are accepted
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ParserConfig {
    /// Datagrams longer than this are rejected before decoding
    #[serde(default = "default_max_packet_size")]
    pub max_packet_size: usize,

    /// Which endpoint is parsing
    #[serde(default)]
    pub perspective: Perspective,
}

fn default_max_packet_size() -> usize {
    MAX_PACKET_SIZE
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_packet_size: MAX_PACKET_SIZE,
            perspective: Perspective::default(),
        }
    }
}

impl ParserConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.max_packet_size < MIN_MAX_PACKET_SIZE {
            problems.push(format!(
                "max_packet_size too small: {} bytes (minimum: {MIN_MAX_PACKET_SIZE})",
                self.max_packet_size
            ));
        } else if self.max_packet_size > MAX_UDP_PAYLOAD {
            problems.push(format!(
                "max_packet_size too large: {} bytes (maximum: {MAX_UDP_PAYLOAD})",
                self.max_packet_size
            ));
        }

        problems
    }
}

/// Settings consumed by [`init_logging`](crate::utils::logging::init_logging).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingConfig {
    /// Reported in the "Logging initialized" event.
    pub app_name: String,

    /// Default filter when `RUST_LOG` is unset. Written lowercase in TOML.
    #[serde(with = "level_name")]
    pub log_level: Level,

    #[serde(default)]
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("gquic-codec"),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Vec<String> {
        let len = self.app_name.len();
        if len == 0 {
            vec!["logging.app_name cannot be empty".to_string()]
        } else if len > MAX_APP_NAME_LEN {
            vec![format!(
                "logging.app_name too long: {len} bytes (maximum: {MAX_APP_NAME_LEN})"
            )]
        } else {
            Vec::new()
        }
    }
}

// `tracing::Level` has no serde support of its own
mod level_name {
    use serde::{Deserialize, Deserializer, Serializer};
    use tracing::Level;

    pub fn serialize<S: Serializer>(level: &Level, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&level.as_str().to_ascii_lowercase())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Level, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse()
            .map_err(|_| serde::de::Error::custom(format!("unknown log level '{name}'")))
    }
}
