//! Verification helpers for kernel call sequences
//!
//! Asserts on the calls recorded by [`crate::FakeKernel`]

use crate::kernel::{FakeKernel, KernelCall};
use thiserror::Error;

/// Verification error types
#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("Device '{device}' not found in kernel")]
    DeviceNotFound { device: String },

    #[error("Mismatch for {device}:{what}: expected '{expected}', got '{actual}'")]
    ValueMismatch {
        device: String,
        what: String,
        expected: String,
        actual: String,
    },

    #[error("Expected steps {expected:?} for '{device}', got {actual:?}")]
    StepMismatch {
        device: String,
        expected: Vec<&'static str>,
        actual: Vec<&'static str>,
    },

    #[error("Expected {expected} {what} calls, found {actual}")]
    CallCountMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },
}

/// Result type for verification operations
pub type VerifyResult<T> = Result<T, VerificationError>;

/// Short name of a recorded call
pub fn step_name(call: &KernelCall) -> &'static str {
    match call {
        KernelCall::ListLinks => "list",
        KernelCall::SetMtu { .. } => "mtu",
        KernelCall::SetUp { .. } => "up",
        KernelCall::AddAddress { .. } => "addr",
        KernelCall::DeleteRoute { .. } => "route",
        KernelCall::SysctlWrite { .. } => "sysctl",
    }
}

/// Kernel state verification helper
pub struct KernelVerifier<'a> {
    kernel: &'a FakeKernel,
}

impl<'a> KernelVerifier<'a> {
    /// Create a new kernel verifier
    pub fn new(kernel: &'a FakeKernel) -> Self {
        Self { kernel }
    }

    /// Steps applied to `device`, in order. Route deletions are attributed by
    /// the source address of the route.
    pub fn steps_for(&self, device: &str) -> Vec<&'static str> {
        let addresses: Vec<_> = self
            .kernel
            .link_state(device)
            .map(|s| s.addresses.into_iter().map(|(a, _)| a).collect())
            .unwrap_or_default();

        self.kernel
            .mutations()
            .iter()
            .filter(|call| match call {
                KernelCall::DeleteRoute { route } => addresses.contains(&route.source),
                other => other.device() == Some(device),
            })
            .map(step_name)
            .collect()
    }

    /// Verify the exact step sequence applied to a device
    pub fn assert_steps(&self, device: &str, expected: &[&'static str]) -> VerifyResult<()> {
        let actual = self.steps_for(device);
        if actual != expected {
            return Err(VerificationError::StepMismatch {
                device: device.to_string(),
                expected: expected.to_vec(),
                actual,
            });
        }
        Ok(())
    }

    /// Verify that nothing was applied to a device
    pub fn assert_untouched(&self, device: &str) -> VerifyResult<()> {
        self.assert_steps(device, &[])
    }

    /// Verify link MTU and admin state
    pub fn assert_link(&self, device: &str, mtu: u32, up: bool) -> VerifyResult<()> {
        let state = self
            .kernel
            .link_state(device)
            .ok_or_else(|| VerificationError::DeviceNotFound {
                device: device.to_string(),
            })?;

        if state.mtu != mtu {
            return Err(VerificationError::ValueMismatch {
                device: device.to_string(),
                what: "mtu".to_string(),
                expected: mtu.to_string(),
                actual: state.mtu.to_string(),
            });
        }
        if state.up != up {
            return Err(VerificationError::ValueMismatch {
                device: device.to_string(),
                what: "up".to_string(),
                expected: up.to_string(),
                actual: state.up.to_string(),
            });
        }
        Ok(())
    }

    /// Verify the number of link enumerations
    pub fn assert_list_count(&self, expected: usize) -> VerifyResult<()> {
        let actual = self
            .kernel
            .calls()
            .iter()
            .filter(|c| matches!(c, KernelCall::ListLinks))
            .count();
        if actual != expected {
            return Err(VerificationError::CallCountMismatch {
                what: "list".to_string(),
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Verify that no configuration call reached the kernel
    pub fn assert_no_mutations(&self) -> VerifyResult<()> {
        let actual = self.kernel.mutations().len();
        if actual != 0 {
            return Err(VerificationError::CallCountMismatch {
                what: "mutating".to_string(),
                expected: 0,
                actual,
            });
        }
        Ok(())
    }
}
