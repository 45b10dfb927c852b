//! Configuration file support for eni-agent
//!
//! Loads and validates agent configuration from TOML files.
//! Default location: /etc/eni-agent/eni-agent.toml

use crate::backoff::Backoff;
use crate::error::{EniError, Result};
use crate::sysctl::PROC_SYS_ROOT;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/eni-agent/eni-agent.toml";

/// Settings applied to every newly attached device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfigSection {
    /// MTU applied to new devices
    #[serde(default = "default_mtu")]
    pub mtu: u32,

    /// Use the primary address as-is instead of assigning it explicitly.
    /// A node spec override takes precedence.
    #[serde(default)]
    pub use_primary_address: bool,
}

/// Attachment wait settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachConfig {
    /// Maximum number of link enumeration attempts
    #[serde(default = "default_max_tries")]
    pub max_tries: u32,

    /// Retry interval floor in milliseconds
    #[serde(default = "default_min_retry_interval")]
    pub min_retry_interval_ms: u64,

    /// Retry interval ceiling in milliseconds
    #[serde(default = "default_max_retry_interval")]
    pub max_retry_interval_ms: u64,

    /// Multiplier applied per attempt
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
}

/// Kernel parameter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SysctlConfig {
    /// procfs root used for kernel parameter writes
    #[serde(default = "default_proc_root")]
    pub proc_root: PathBuf,
}

/// Complete eni-agent configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub device: DeviceConfigSection,

    #[serde(default)]
    pub attach: AttachConfig,

    #[serde(default)]
    pub sysctl: SysctlConfig,
}

fn default_mtu() -> u32 {
    9001
}

fn default_max_tries() -> u32 {
    15
}

fn default_min_retry_interval() -> u64 {
    100
}

fn default_max_retry_interval() -> u64 {
    30_000
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_proc_root() -> PathBuf {
    PathBuf::from(PROC_SYS_ROOT)
}

impl Default for DeviceConfigSection {
    fn default() -> Self {
        Self {
            mtu: default_mtu(),
            use_primary_address: false,
        }
    }
}

impl Default for AttachConfig {
    fn default() -> Self {
        Self {
            max_tries: default_max_tries(),
            min_retry_interval_ms: default_min_retry_interval(),
            max_retry_interval_ms: default_max_retry_interval(),
            backoff_factor: default_backoff_factor(),
        }
    }
}

impl Default for SysctlConfig {
    fn default() -> Self {
        Self {
            proc_root: default_proc_root(),
        }
    }
}

impl AttachConfig {
    /// Retry interval floor as Duration
    pub fn min_retry_interval(&self) -> Duration {
        Duration::from_millis(self.min_retry_interval_ms)
    }

    /// Retry interval ceiling as Duration
    pub fn max_retry_interval(&self) -> Duration {
        Duration::from_millis(self.max_retry_interval_ms)
    }

    /// Backoff schedule for the attachment wait, without jitter
    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            self.min_retry_interval(),
            self.max_retry_interval(),
            self.backoff_factor,
        )
    }
}

impl AgentConfig {
    /// Reads `path`, or returns the defaults when the file does not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                EniError::config(format!(
                    "Failed to parse config file {}: {}",
                    path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(EniError::Io(e)),
        }
    }

    /// Reads the configuration from [`DEFAULT_CONFIG_PATH`].
    pub fn load() -> Result<Self> {
        Self::load_or_default(DEFAULT_CONFIG_PATH)
    }

    /// Rejects values the agent cannot run with.
    pub fn validate(&self) -> Result<()> {
        // 68 is the IPv4 minimum
        if !(68..=65535).contains(&self.device.mtu) {
            return Err(EniError::config("device.mtu must be 68-65535"));
        }

        if self.attach.max_tries == 0 {
            return Err(EniError::config("attach.max_tries must be > 0"));
        }

        if !self.attach.backoff_factor.is_finite() || self.attach.backoff_factor < 1.0 {
            return Err(EniError::config("attach.backoff_factor must be >= 1.0"));
        }

        if self.attach.min_retry_interval_ms > self.attach.max_retry_interval_ms {
            return Err(EniError::config(
                "attach.min_retry_interval_ms must not exceed attach.max_retry_interval_ms",
            ));
        }

        if !self.sysctl.proc_root.is_absolute() {
            return Err(EniError::config("sysctl.proc_root must be an absolute path"));
        }

        Ok(())
    }
}
