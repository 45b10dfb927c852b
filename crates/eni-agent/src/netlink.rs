//! rtnetlink implementation of [`LinkOps`].
//!
//! A single rtnetlink connection task is spawned per [`RtNetlinkOps`] and
//! shared by every reconciliation; requests are independent and the kernel
//! serialises them.

#[cfg(target_os = "linux")]
mod linux {
    use crate::error::{EniError, KernelError, Result};
    use crate::kernel::{Link, LinkOps, RouteSpec};
    use async_trait::async_trait;
    use eni_types::MacAddress;
    use futures::TryStreamExt;
    use rtnetlink::packet_route::link::{LinkAttribute, LinkMessage};
    use rtnetlink::packet_route::route::RouteScope;
    use rtnetlink::{Handle, LinkUnspec, RouteMessageBuilder};
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
    use tokio::task::JoinHandle;
    use tracing::{debug, instrument};

    /// Kernel link operations over an rtnetlink socket.
    pub struct RtNetlinkOps {
        handle: Handle,
        connection: JoinHandle<()>,
    }

    impl RtNetlinkOps {
        /// Opens the netlink socket and spawns its connection task.
        ///
        /// Must be called from within a tokio runtime.
        pub fn new() -> Result<Self> {
            let (connection, handle, _) = rtnetlink::new_connection().map_err(EniError::Io)?;
            let connection = tokio::spawn(connection);
            debug!("rtnetlink connection established");
            Ok(Self { handle, connection })
        }
    }

    impl Drop for RtNetlinkOps {
        fn drop(&mut self) {
            self.connection.abort();
        }
    }

    fn kernel_error(operation: &'static str, err: rtnetlink::Error) -> KernelError {
        let errno = match &err {
            rtnetlink::Error::NetlinkError(msg) => msg.code.map(|code| code.get().abs()),
            _ => None,
        };
        KernelError::new(operation, errno, err.to_string())
    }

    fn link_from_message(msg: &LinkMessage) -> Link {
        let mut name = String::new();
        let mut mac = None;
        for attr in &msg.attributes {
            match attr {
                LinkAttribute::IfName(ifname) => name = ifname.clone(),
                LinkAttribute::Address(raw) => mac = MacAddress::try_from(raw.as_slice()).ok(),
                _ => {}
            }
        }

        Link {
            index: msg.header.index,
            name,
            mac,
        }
    }

    #[async_trait]
    impl LinkOps for RtNetlinkOps {
        async fn list_links(&self) -> std::result::Result<Vec<Link>, KernelError> {
            let mut messages = self.handle.link().get().execute();
            let mut links = Vec::new();
            while let Some(msg) = messages
                .try_next()
                .await
                .map_err(|e| kernel_error("link list", e))?
            {
                links.push(link_from_message(&msg));
            }
            Ok(links)
        }

        #[instrument(skip(self), fields(link = %link.name))]
        async fn set_mtu(&self, link: &Link, mtu: u32) -> std::result::Result<(), KernelError> {
            self.handle
                .link()
                .set(LinkUnspec::new_with_index(link.index).mtu(mtu).build())
                .execute()
                .await
                .map_err(|e| kernel_error("link set mtu", e))
        }

        #[instrument(skip(self), fields(link = %link.name))]
        async fn set_up(&self, link: &Link) -> std::result::Result<(), KernelError> {
            self.handle
                .link()
                .set(LinkUnspec::new_with_index(link.index).up().build())
                .execute()
                .await
                .map_err(|e| kernel_error("link set up", e))
        }

        #[instrument(skip(self), fields(link = %link.name))]
        async fn add_address(
            &self,
            link: &Link,
            address: IpAddr,
            prefix_len: u8,
        ) -> std::result::Result<(), KernelError> {
            self.handle
                .address()
                .add(link.index, address, prefix_len)
                .execute()
                .await
                .map_err(|e| kernel_error("address add", e))
        }

        #[instrument(skip(self), fields(route = %route))]
        async fn delete_route(&self, route: &RouteSpec) -> std::result::Result<(), KernelError> {
            let prefix_len = route.destination.prefix_len();
            let message = match (route.destination.network(), route.source) {
                (IpAddr::V4(dst), IpAddr::V4(src)) => RouteMessageBuilder::<Ipv4Addr>::new()
                    .destination_prefix(dst, prefix_len)
                    .pref_source(src)
                    .table_id(route.table)
                    .scope(RouteScope::Link)
                    .build(),
                (IpAddr::V6(dst), IpAddr::V6(src)) => RouteMessageBuilder::<Ipv6Addr>::new()
                    .destination_prefix(dst, prefix_len)
                    .pref_source(src)
                    .table_id(route.table)
                    .scope(RouteScope::Link)
                    .build(),
                _ => {
                    return Err(KernelError::new(
                        "route del",
                        Some(libc::EAFNOSUPPORT),
                        "destination and source address families differ",
                    ));
                }
            };

            self.handle
                .route()
                .del(message)
                .execute()
                .await
                .map_err(|e| kernel_error("route del", e))
        }
    }

}

#[cfg(target_os = "linux")]
pub use linux::RtNetlinkOps;
