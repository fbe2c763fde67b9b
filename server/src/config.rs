//! Server tunables

use clap::ValueEnum;
use shared::CLIENT_MESSAGE_SIZE;

/// How the per-tick status is serialized inside the status frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PayloadFormat {
    /// Human-readable single line
    Text,
    /// bincode-encoded `StatusSnapshot`
    Binary,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind, `host:port`
    pub address: String,
    /// Ticks per second
    pub tick_rate: u32,
    /// Unconsumed bytes a client may leave buffered before it is dropped
    pub max_inbound_bytes: usize,
    pub payload_format: PayloadFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:0".to_string(),
            tick_rate: 10,
            max_inbound_bytes: 4096,
            payload_format: PayloadFormat::Text,
        }
    }
}

/// Parses `--max-inbound-bytes`, which must hold at least one whole frame
pub fn parse_inbound_limit(value: &str) -> Result<usize, String> {
    let limit: usize = value
        .parse()
        .map_err(|e| format!("invalid byte count `{value}`: {e}"))?;
    if limit < CLIENT_MESSAGE_SIZE {
        return Err(format!(
            "must be at least {CLIENT_MESSAGE_SIZE} bytes, got {limit}"
        ));
    }
    Ok(limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_inbound_limit() {
        assert_eq!(parse_inbound_limit("4096"), Ok(4096));
        assert_eq!(parse_inbound_limit("10"), Ok(CLIENT_MESSAGE_SIZE));
        assert!(parse_inbound_limit("9").is_err());
        assert!(parse_inbound_limit("0").is_err());
        assert!(parse_inbound_limit("lots").is_err());
    }

    #[test]
    fn test_default_config_accepts_whole_frames() {
        let config = ServerConfig::default();
        assert!(config.max_inbound_bytes >= CLIENT_MESSAGE_SIZE);
        assert_eq!(config.tick_rate, 10);
        assert_eq!(config.payload_format, PayloadFormat::Text);
    }
}
