use std::net::IpAddr;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::hardware::temperature_controller::protocol::Address;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    pub temperature_controller: Option<TemperatureControllerConfig>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TemperatureControllerConfig {
    pub ip: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_timeout")]
    pub timeout_s: f32,
}

impl Config {
    pub async fn load(path: &str) -> Result<Self> {
        let data = fs::read(path)
            .await
            .wrap_err_with(|| format!("Failed to read config file {path}"))?;

        Self::parse(&data)
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        let config: Self = serde_yaml::from_slice(data).wrap_err("Failed to parse config")?;

        if let Some(controller) = &config.temperature_controller {
            Address::try_from(controller).wrap_err("Invalid temperature_controller section")?;
        }

        Ok(config)
    }
}

impl TemperatureControllerConfig {
    pub fn new(ip: IpAddr) -> Self {
        Self {
            ip,
            port: default_port(),
            timeout_s: default_timeout(),
        }
    }
}

const fn default_port() -> u16 {
    Address::DEFAULT_PORT
}

fn default_timeout() -> f32 {
    Address::DEFAULT_TIMEOUT.as_secs_f32()
}

#[cfg(test)]
mod tests {
    use std::{net::Ipv4Addr, time::Duration};

    use super::*;

    #[test]
    fn test_parse_defaults() {
        let config = Config::parse(b"temperature_controller:\n  ip: 192.168.0.12\n").unwrap();
        let controller = config.temperature_controller.unwrap();

        let expected = TemperatureControllerConfig::new(Ipv4Addr::new(192, 168, 0, 12).into());

        assert_eq!(controller, expected);
        assert_eq!(Address::try_from(&controller).unwrap().timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_parse_overrides() {
        let yaml = r#"
temperature_controller:
  ip: 10.0.0.3
  port: 6000
  timeout_s: 2.5
"#;

        let config = Config::parse(yaml.as_bytes()).unwrap();
        let address = Address::try_from(config.temperature_controller.as_ref().unwrap()).unwrap();

        assert_eq!(address.port, 6000);
        assert_eq!(address.timeout, Duration::from_millis(2500));
    }

    #[test]
    fn test_parse_empty() {
        let config = Config::parse(b"{}").unwrap();
        assert!(config.temperature_controller.is_none());
    }

    #[test]
    fn test_parse_invalid_ip() {
        assert!(Config::parse(b"temperature_controller:\n  ip: not-an-ip\n").is_err());
    }

    #[test]
    fn test_parse_invalid_timeout() {
        for timeout in ["-1", "0", ".nan", "1e39"] {
            let yaml =
                format!("temperature_controller:\n  ip: 10.0.0.3\n  timeout_s: {timeout}\n");
            assert!(Config::parse(yaml.as_bytes()).is_err(), "timeout_s {timeout} accepted");
        }
    }
}
