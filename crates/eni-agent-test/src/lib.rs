//! Test infrastructure for the ENI device agent
//!
//! Provides:
//! - An in-memory fake kernel implementing `LinkOps` and `Sysctl`
//! - Node snapshot fixtures
//! - Call-sequence verification helpers

pub mod fixtures;
mod kernel;
mod verification;

pub use fixtures::*;
pub use kernel::{FakeKernel, FakeLinkState, KernelCall, KernelOp};
pub use verification::*;
