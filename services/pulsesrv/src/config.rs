//! Service configuration
//!
//! Layered with figment, later layers win:
//! 1. built-in defaults
//! 2. YAML file (`config/pulsesrv.yaml` unless `--config` names another)
//! 3. `PULSESRV_*` environment variables, `__` separating nested keys
//! 4. command-line flags (merged in by [`crate::bootstrap`])
//!
//! Read once at startup and never reloaded.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{PulseSrvError, Result};
use crate::link::{LinkPolicy, SerialLinkConfig};

/// Config file read when `--config` is not given; skipped if absent
pub const DEFAULT_CONFIG_FILE: &str = "config/pulsesrv.yaml";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "PULSESRV_";

/// Top-level service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseSrvConfig {
    /// Serial device of the pulse counter
    pub device: String,
    /// Persistent counter state
    pub state_file: PathBuf,
    /// Log file; rotated backups are kept beside it
    pub log_file: PathBuf,
    /// HTTP listen address
    pub host: String,
    /// HTTP listen port
    pub port: u16,
    pub link: LinkConfig,
}

/// Serial link tunables; the 7E1 framing is fixed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    pub baud_rate: u32,
    /// Device existence check interval while disconnected
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    /// Wait after a link fault
    #[serde(with = "humantime_serde")]
    pub retry_backoff: Duration,
}

impl Default for PulseSrvConfig {
    fn default() -> Self {
        Self {
            device: SerialLinkConfig::default().port,
            state_file: PathBuf::from("pulse_counter.state"),
            log_file: PathBuf::from("pulse_counter.log"),
            host: common::DEFAULT_API_HOST.to_string(),
            port: crate::DEFAULT_PORT,
            link: LinkConfig::default(),
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        let policy = LinkPolicy::default();
        Self {
            baud_rate: SerialLinkConfig::default().baud_rate,
            poll_interval: policy.poll_interval,
            retry_backoff: policy.retry_backoff,
        }
    }
}

impl PulseSrvConfig {
    /// Defaults, file and environment layers.
    ///
    /// An explicitly named config file must exist; the default one is
    /// optional.
    pub fn figment(config_file: Option<&Path>) -> Result<Figment> {
        let file = match config_file {
            Some(path) if !path.exists() => {
                return Err(PulseSrvError::config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            },
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        Ok(Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Yaml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Extract and validate
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load without command-line overrides
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        Self::from_figment(&Self::figment(config_file)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.device.trim().is_empty() {
            return Err(PulseSrvError::config("device cannot be empty"));
        }
        if self.state_file.as_os_str().is_empty() {
            return Err(PulseSrvError::config("state_file cannot be empty"));
        }
        if self.log_file.as_os_str().is_empty() {
            return Err(PulseSrvError::config("log_file cannot be empty"));
        }
        if self.host.trim().is_empty() {
            return Err(PulseSrvError::config("host cannot be empty"));
        }
        if self.port == 0 {
            return Err(PulseSrvError::config("port must be non-zero"));
        }
        if self.link.baud_rate == 0 {
            return Err(PulseSrvError::config("link.baud_rate must be non-zero"));
        }
        if self.link.poll_interval.is_zero() {
            return Err(PulseSrvError::config("link.poll_interval must be non-zero"));
        }
        if self.link.retry_backoff.is_zero() {
            return Err(PulseSrvError::config("link.retry_backoff must be non-zero"));
        }
        Ok(())
    }

    /// `host:port` for the HTTP listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn link_policy(&self) -> LinkPolicy {
        LinkPolicy {
            poll_interval: self.link.poll_interval,
            retry_backoff: self.link.retry_backoff,
        }
    }

    pub fn serial_config(&self) -> SerialLinkConfig {
        SerialLinkConfig {
            port: self.device.clone(),
            baud_rate: self.link.baud_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults() {
        Jail::expect_with(|_jail| {
            let config = PulseSrvConfig::load(None).map_err(|e| e.to_string())?;

            assert_eq!(config, PulseSrvConfig::default());
            assert_eq!(config.device, "/dev/ttyACM0");
            assert_eq!(config.state_file, PathBuf::from("pulse_counter.state"));
            assert_eq!(config.bind_address(), "0.0.0.0:8000");
            assert_eq!(config.link_policy(), LinkPolicy::default());
            assert_eq!(config.serial_config(), SerialLinkConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_yaml_file_overrides_defaults() {
        Jail::expect_with(|jail| {
            std::fs::create_dir_all("config").map_err(|e| e.to_string())?;
            jail.create_file(
                DEFAULT_CONFIG_FILE,
                r#"
device: /dev/ttyUSB0
port: 8080
link:
  retry_backoff: 30s
"#,
            )?;

            let config = PulseSrvConfig::load(None).map_err(|e| e.to_string())?;
            assert_eq!(config.device, "/dev/ttyUSB0");
            assert_eq!(config.port, 8080);
            assert_eq!(config.link.retry_backoff, Duration::from_secs(30));
            // Untouched keys keep their defaults
            assert_eq!(config.link.poll_interval, Duration::from_secs(1));
            assert_eq!(config.log_file, PathBuf::from("pulse_counter.log"));
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("custom.yaml", "port: 8080\nstate_file: /var/lib/a.state\n")?;
            jail.set_env("PULSESRV_PORT", "9100");
            jail.set_env("PULSESRV_LINK__POLL_INTERVAL", "500ms");

            let config =
                PulseSrvConfig::load(Some(Path::new("custom.yaml"))).map_err(|e| e.to_string())?;
            assert_eq!(config.port, 9100);
            assert_eq!(config.state_file, PathBuf::from("/var/lib/a.state"));
            assert_eq!(config.link.poll_interval, Duration::from_millis(500));
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        Jail::expect_with(|_jail| {
            let err = PulseSrvConfig::load(Some(Path::new("nope.yaml")));
            assert!(matches!(err, Err(PulseSrvError::Config(_))));
            Ok(())
        });
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("PULSESRV_PORT", "0");
            let err = PulseSrvConfig::load(None);
            assert!(matches!(err, Err(PulseSrvError::Config(msg)) if msg.contains("port")));

            jail.set_env("PULSESRV_PORT", "not-a-port");
            assert!(PulseSrvConfig::load(None).is_err());
            Ok(())
        });
    }

    #[test]
    fn test_validate() {
        let mut config = PulseSrvConfig::default();
        assert!(config.validate().is_ok());

        config.device = String::new();
        assert!(config.validate().is_err());

        let mut config = PulseSrvConfig::default();
        config.link.retry_backoff = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = PulseSrvConfig::default();
        config.state_file = PathBuf::new();
        assert!(config.validate().is_err());
    }
}
