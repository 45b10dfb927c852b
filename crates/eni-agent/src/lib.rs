//! ENI device agent
//!
//! Brings newly attached cloud network interfaces (ENIs) into a usable
//! state on the local node. On every node update the agent:
//!
//! 1. Diffs the prior and current node snapshots to find interfaces that
//!    appeared since the last update ([`detect_new_devices`])
//! 2. Polls the kernel link table until those interfaces are visible,
//!    matching them by MAC ([`DeviceWaiter`])
//! 3. Applies MTU, link state, primary address, subnet route removal and
//!    rp_filter relaxation to each one ([`configure_device`])
//!
//! Steps 2 and 3 run in a background task per update ([`EniReconciler`]).
//! Failures are isolated per record and per device and only ever end in a
//! log record.
//!
//! # Architecture
//!
//! ```text
//! node update ──▶ EniReconciler ──▶ detect_new_devices (sync)
//!                      │
//!                      ▼  spawn
//!               DeviceWaiter ──▶ LinkOps::list_links (backoff)
//!                      │
//!                      ▼  per device
//!               configure_device ──▶ LinkOps / Sysctl
//! ```

pub mod backoff;
pub mod config;
pub mod configurator;
pub mod detector;
pub mod device;
pub mod error;
pub mod kernel;
pub mod mtu;
pub mod netlink;
pub mod reconciler;
pub mod sysctl;
pub mod waiter;

pub use backoff::{Backoff, calculate_duration};
pub use config::AgentConfig;
pub use configurator::configure_device;
pub use detector::detect_new_devices;
pub use device::{DeviceConfig, PendingSet, parse_device_config};
pub use error::{EniError, KernelError, Result, SetupStep};
pub use kernel::{Link, LinkOps, RT_TABLE_MAIN, RouteSpec};
pub use mtu::{MtuConfiguration, StaticMtu};
#[cfg(target_os = "linux")]
pub use netlink::RtNetlinkOps;
pub use reconciler::{AttachDiagnostic, EniReconciler, SetupSummary, setup_devices};
pub use sysctl::{ProcSysctl, Sysctl};
pub use waiter::{DeviceWaiter, LinkMap, WaitTimeout};
