use serde::{Deserialize, Serialize};
use std::net::ToSocketAddrs;

use crate::parser::ParserConfig;

/// ```rust,ignore
/// // Serial bridge exposing the robot's Bluetooth port over TCP
/// let config = DriverConfig::new("192.168.0.20".to_string(), 23100);
///
/// if let Err(e) = config.validate() {
///     println!("Configuration error: {}", e);
///     return;
/// }
/// let driver = PremaidDriver::connect(config).await?;
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DriverConfig {
    pub addr: String,
    pub port: u32,
    /// Period of the writer loop in milliseconds.
    #[serde(default = "default_cycle_period_ms")]
    pub cycle_period_ms: u64,
    #[serde(default = "default_connect_retries")]
    pub connect_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default)]
    pub parser: ParserConfig,
}

fn default_cycle_period_ms() -> u64 {
    16
}

fn default_connect_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    2000
}

impl DriverConfig {
    pub fn new(addr: String, port: u32) -> Self {
        Self {
            addr,
            port,
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| format!("Invalid driver configuration: {}", e))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.addr.is_empty() {
            return Err("Address cannot be empty.".to_string());
        }
        if self.port == 0 || self.port > u16::MAX as u32 {
            return Err("Port number must be between 1 and 65535.".to_string());
        }
        if self.cycle_period_ms == 0 {
            return Err("Cycle period must be greater than 0.".to_string());
        }
        if self.connect_retries == 0 {
            return Err("At least one connection attempt is required.".to_string());
        }
        self.parser.validate()
    }

    /// Generates a connection URL from the address and port.
    pub fn connection_url(&self) -> String {
        format!("{}:{}", self.addr, self.port)
    }

    /// Resolves the address to a `SocketAddr` if possible.
    pub fn resolve(&self) -> Result<String, String> {
        let address_with_port = self.connection_url();
        match address_with_port.to_socket_addrs() {
            Ok(mut iter) => match iter.next() {
                Some(socket_addr) => Ok(socket_addr.to_string()),
                None => Err("Could not resolve address".to_string()),
            },
            Err(_) => Err("Invalid address format".to_string()),
        }
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1".to_string(),
            port: 23100,
            cycle_period_ms: default_cycle_period_ms(),
            connect_retries: default_connect_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            parser: ParserConfig::default(),
        }
    }
}
