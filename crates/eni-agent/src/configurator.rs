//! Bring-up of a single ENI device.
//!
//! Steps run strictly in order: MTU, link up, then (unless the primary
//! address is already usable) primary address, subnet route removal and
//! reverse-path filter relaxation. Nothing is rolled back on failure; every
//! step is safe to re-apply.

use crate::device::DeviceConfig;
use crate::error::{EniError, Result, SetupStep};
use crate::kernel::{Link, LinkOps, RouteSpec};
use crate::sysctl::{Sysctl, display_name, rp_filter_path};
use tracing::{debug, instrument};

/// Applies `cfg` to `link`, returning the first step that failed.
///
/// EEXIST from address assignment and ESRCH from route deletion count as
/// success. A failure to disable rp_filter is logged and otherwise ignored.
#[instrument(skip_all, fields(device = %cfg.name, index = link.index))]
pub async fn configure_device(
    links: &dyn LinkOps,
    sysctl: &dyn Sysctl,
    link: &Link,
    cfg: &DeviceConfig,
) -> Result<()> {
    links
        .set_mtu(link, cfg.mtu)
        .await
        .map_err(|e| EniError::device_setup(&link.name, SetupStep::SetMtu, e))?;

    links
        .set_up(link)
        .await
        .map_err(|e| EniError::device_setup(&link.name, SetupStep::SetUp, e))?;

    if cfg.use_primary_ip {
        return Ok(());
    }

    // The primary address must be on the link for SNAT on this interface
    match links
        .add_address(link, cfg.ip, cfg.cidr.prefix_len())
        .await
    {
        Ok(()) => {}
        Err(e) if e.is_already_exists() => {
            debug!(ip = %cfg.ip, "Primary address already assigned");
        }
        Err(e) => return Err(EniError::device_setup(&link.name, SetupStep::AddAddress, e)),
    }

    // The subnet route of a secondary interface can shadow the primary
    // interface's default route and cut off the node
    let route = RouteSpec::subnet_route(cfg.cidr, cfg.ip);
    match links.delete_route(&route).await {
        Ok(()) => {}
        Err(e) if e.is_no_such_entry() => {
            debug!(%route, "Subnet route already absent");
        }
        Err(e) => return Err(EniError::device_setup(&link.name, SetupStep::DeleteRoute, e)),
    }

    // Load balancers preserving the client IP deliver traffic whose source
    // is only reachable via the primary interface
    let path = rp_filter_path(&link.name);
    if let Err(e) = sysctl.disable(&path) {
        debug!(error = %e, sysctl = %display_name(&path), "Failed to disable rp_filter");
    }

    Ok(())
}
