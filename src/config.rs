use serde::Deserialize;
use std::path::Path;

use crate::registration::DeviceRegistration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub udp: UdpConfig,
    pub logging: LoggingConfig,
    /// Devices registered at startup
    #[serde(default)]
    pub devices: Vec<DeviceRegistration>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UdpConfig {
    pub bind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {:?}: {}", path, e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).map_err(|e| anyhow::anyhow!("Failed to parse config file: {}", e))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            udp: UdpConfig {
                bind: "0.0.0.0:1681".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
            devices: vec![],
        }
    }
}
