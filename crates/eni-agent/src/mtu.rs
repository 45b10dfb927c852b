//! Device MTU provider.

/// Supplies the MTU applied to newly attached devices.
#[cfg_attr(test, mockall::automock)]
pub trait MtuConfiguration: Send + Sync {
    fn device_mtu(&self) -> u32;
}

/// Fixed MTU, typically taken from the agent configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticMtu(pub u32);

impl MtuConfiguration for StaticMtu {
    fn device_mtu(&self) -> u32 {
        self.0
    }
}
