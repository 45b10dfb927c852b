//! Error types for the ENI agent.
//!
//! All errors implement `std::error::Error` via `thiserror`. Nothing in the
//! reconciliation path returns these to the node update caller; they end at
//! a log record.

use eni_types::ParseError;
use std::fmt;
use std::io;
use thiserror::Error;

/// Result type alias for ENI agent operations.
pub type Result<T> = std::result::Result<T, EniError>;

/// A failed kernel call, classified by errno where the kernel supplied one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} failed: {message}")]
pub struct KernelError {
    /// The kernel operation that failed (e.g., "link set mtu").
    pub operation: &'static str,
    /// Positive errno value, if known.
    pub errno: Option<i32>,
    /// Error message.
    pub message: String,
}

impl KernelError {
    /// Creates a kernel error with an explicit message.
    pub fn new(operation: &'static str, errno: Option<i32>, message: impl Into<String>) -> Self {
        Self {
            operation,
            errno,
            message: message.into(),
        }
    }

    /// Creates a kernel error from a raw errno, using the OS description.
    pub fn from_errno(operation: &'static str, errno: i32) -> Self {
        Self {
            operation,
            errno: Some(errno),
            message: io::Error::from_raw_os_error(errno).to_string(),
        }
    }

    /// Returns true if the kernel reported EEXIST.
    pub fn is_already_exists(&self) -> bool {
        self.errno == Some(libc::EEXIST)
    }

    /// Returns true if the kernel reported ESRCH, which route deletion uses
    /// for an entry that is already gone.
    pub fn is_no_such_entry(&self) -> bool {
        self.errno == Some(libc::ESRCH)
    }
}

/// Configuration steps applied to a device, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetupStep {
    SetMtu,
    SetUp,
    AddAddress,
    DeleteRoute,
}

impl fmt::Display for SetupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SetupStep::SetMtu => "change MTU",
            SetupStep::SetUp => "bring up link",
            SetupStep::AddAddress => "set primary IP address",
            SetupStep::DeleteRoute => "delete subnet route",
        };
        f.write_str(s)
    }
}

/// Errors that can occur in the ENI agent.
#[derive(Debug, Error)]
pub enum EniError {
    /// An interface record carried a malformed address or subnet.
    #[error("Invalid {field} {value:?} for ENI {name}: {source}")]
    InvalidDeviceConfig {
        /// Interface name.
        name: String,
        /// The offending field ("primary ip" or "subnet cidr").
        field: &'static str,
        /// The raw value.
        value: String,
        #[source]
        source: ParseError,
    },

    /// A kernel call failed outside of device setup (e.g., link listing).
    #[error(transparent)]
    Kernel(#[from] KernelError),

    /// A configuration step failed for one device.
    #[error("Failed to {step} on link {device}: {source}")]
    DeviceSetup {
        /// Kernel link name.
        device: String,
        /// The step that failed.
        step: SetupStep,
        #[source]
        source: KernelError,
    },

    /// Not every expected device appeared before the retry budget ran out.
    #[error("Timed out waiting for ENIs to be attached after {attempts} attempts")]
    AttachTimeout {
        /// Number of enumeration attempts made.
        attempts: u32,
    },

    /// Reading or writing a kernel parameter failed.
    #[error("Sysctl {path} failed: {source}")]
    Sysctl {
        /// Dotted parameter name (e.g., net.ipv4.conf.eth1.rp_filter).
        path: String,
        #[source]
        source: io::Error,
    },

    /// Configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl EniError {
    /// Creates a device setup error.
    pub fn device_setup(device: impl Into<String>, step: SetupStep, source: KernelError) -> Self {
        Self::DeviceSetup {
            device: device.into(),
            step,
            source,
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_error_classification() {
        let exists = KernelError::from_errno("addr add", libc::EEXIST);
        assert!(exists.is_already_exists());
        assert!(!exists.is_no_such_entry());

        let gone = KernelError::from_errno("route del", libc::ESRCH);
        assert!(gone.is_no_such_entry());
        assert!(!gone.is_already_exists());

        let other = KernelError::new("link set mtu", None, "connection closed");
        assert!(!other.is_already_exists());
        assert!(!other.is_no_such_entry());
    }

    #[test]
    fn test_device_setup_display() {
        let err = EniError::device_setup(
            "eth1",
            SetupStep::SetMtu,
            KernelError::new("link set mtu", Some(libc::EINVAL), "Invalid argument"),
        );
        assert_eq!(
            err.to_string(),
            "Failed to change MTU on link eth1: link set mtu failed: Invalid argument"
        );
    }

    #[test]
    fn test_invalid_device_config_display() {
        let err = EniError::InvalidDeviceConfig {
            name: "eni-1".to_string(),
            field: "subnet cidr",
            value: "10.0.1.0/33".to_string(),
            source: ParseError::InvalidIpPrefix("10.0.1.0/33".to_string()),
        };
        let msg = err.to_string();
        assert!(msg.contains("subnet cidr"));
        assert!(msg.contains("\"10.0.1.0/33\""));
        assert!(msg.contains("eni-1"));
    }

    #[test]
    fn test_attach_timeout_display() {
        let err = EniError::AttachTimeout { attempts: 15 };
        assert_eq!(
            err.to_string(),
            "Timed out waiting for ENIs to be attached after 15 attempts"
        );
    }
}
