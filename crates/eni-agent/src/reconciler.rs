//! ENI reconciler - entry point for node update events.
//!
//! The diff between two snapshots runs synchronously in the caller. Waiting
//! for attachment and configuring devices runs in a tracked background task
//! per event, so the event handler returns promptly and concurrent events
//! each work on their own pending set.

use crate::config::AgentConfig;
use crate::configurator::configure_device;
use crate::detector::detect_new_devices;
use crate::device::PendingSet;
use crate::kernel::LinkOps;
use crate::mtu::{MtuConfiguration, StaticMtu};
use crate::sysctl::Sysctl;
use crate::waiter::{DeviceWaiter, LinkMap};
use eni_types::NodeSnapshot;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// Outcome of one background setup run, by interface name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetupSummary {
    pub configured: Vec<String>,
    pub failed: Vec<String>,
    /// Set when not every expected device appeared in time
    pub timeout: Option<AttachDiagnostic>,
}

impl SetupSummary {
    pub fn timed_out(&self) -> bool {
        self.timeout.is_some()
    }
}

/// Expected and attached devices at the end of a timed-out wait, as MAC to
/// interface name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachDiagnostic {
    pub expected: BTreeMap<String, String>,
    pub attached: BTreeMap<String, String>,
}

impl AttachDiagnostic {
    pub fn new(pending: &PendingSet, found: &LinkMap) -> Self {
        Self {
            expected: pending
                .iter()
                .map(|(mac, cfg)| (mac.to_string(), cfg.name.clone()))
                .collect(),
            attached: found
                .iter()
                .map(|(mac, link)| (mac.to_string(), link.name.clone()))
                .collect(),
        }
    }
}

/// Dispatches device setup for newly attached ENIs.
pub struct EniReconciler {
    links: Arc<dyn LinkOps>,
    sysctl: Arc<dyn Sysctl>,
    mtu: Arc<dyn MtuConfiguration>,
    waiter: DeviceWaiter,
    use_primary_address: bool,
    tasks: TaskTracker,
}

impl EniReconciler {
    pub fn new(
        links: Arc<dyn LinkOps>,
        sysctl: Arc<dyn Sysctl>,
        mtu: Arc<dyn MtuConfiguration>,
        waiter: DeviceWaiter,
        use_primary_address: bool,
    ) -> Self {
        Self {
            links,
            sysctl,
            mtu,
            waiter,
            use_primary_address,
            tasks: TaskTracker::new(),
        }
    }

    /// Builds a reconciler whose MTU, primary-address default and wait
    /// schedule come from `config`.
    pub fn from_config(
        config: &AgentConfig,
        links: Arc<dyn LinkOps>,
        sysctl: Arc<dyn Sysctl>,
    ) -> Self {
        Self::new(
            links,
            sysctl,
            Arc::new(StaticMtu(config.device.mtu)),
            DeviceWaiter::from_config(&config.attach),
            config.device.use_primary_address,
        )
    }

    /// Handles a node update.
    ///
    /// Returns the handle of the spawned setup task, or `None` when no new
    /// device needs configuration or the reconciler has been shut down.
    /// Must be called within a tokio runtime.
    pub fn on_node_update(
        &self,
        prior: Option<&NodeSnapshot>,
        current: &NodeSnapshot,
    ) -> Option<JoinHandle<SetupSummary>> {
        if self.tasks.is_closed() {
            warn!(node = %current.name, "Reconciler shut down, ignoring node update");
            return None;
        }

        let pending = detect_new_devices(
            prior,
            current,
            self.mtu.as_ref(),
            self.use_primary_address,
        );
        if pending.is_empty() {
            debug!(node = %current.name, "No new ENI devices");
            return None;
        }

        info!(
            node = %current.name,
            count = pending.len(),
            "Dispatching ENI device setup"
        );

        let links = Arc::clone(&self.links);
        let sysctl = Arc::clone(&self.sysctl);
        let waiter = self.waiter;
        Some(self.tasks.spawn(async move {
            setup_devices(links.as_ref(), sysctl.as_ref(), &waiter, pending).await
        }))
    }

    /// Number of setup tasks still running.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Stops accepting node updates and waits for running setup tasks.
    ///
    /// In-flight tasks are not cancelled; each ends once its retry budget
    /// is spent at the latest.
    pub async fn shutdown(&self) {
        self.tasks.close();
        self.tasks.wait().await;
    }
}

/// Waits for the pending devices and configures every one that was found.
///
/// A timeout is logged with the expected and attached devices and does not
/// stop configuration of what was found. Each device is configured
/// independently; a failure is logged and the batch continues.
pub async fn setup_devices(
    links: &dyn LinkOps,
    sysctl: &dyn Sysctl,
    waiter: &DeviceWaiter,
    pending: PendingSet,
) -> SetupSummary {
    let mut summary = SetupSummary::default();

    let found = match waiter.wait_for_devices(links, &pending).await {
        Ok(found) => found,
        Err(timeout) => {
            let diagnostic = AttachDiagnostic::new(&pending, &timeout.found);
            error!(
                error = %timeout.to_error(),
                attached = ?diagnostic.attached,
                expected = ?diagnostic.expected,
                "Timed out waiting for ENIs to be attached"
            );
            summary.timeout = Some(diagnostic);
            timeout.found
        }
    };

    let ordered: BTreeMap<_, _> = found.into_iter().collect();
    for (mac, link) in ordered {
        let Some(cfg) = pending.get(&mac) else {
            warn!(%mac, "No configuration found for ENI device");
            continue;
        };

        match configure_device(links, sysctl, &link, cfg).await {
            Ok(()) => {
                info!(%mac, device = %cfg.name, link = %link.name, "Configured ENI device");
                summary.configured.push(cfg.name.clone());
            }
            Err(e) => {
                error!(error = %e, %mac, device = %cfg.name, "Failed to configure ENI device");
                summary.failed.push(cfg.name.clone());
            }
        }
    }

    summary
}
