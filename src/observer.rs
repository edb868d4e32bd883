use std::net::{IpAddr, SocketAddr};

use service::session::FiveTuple;
use service::ServiceHandler;

/// [`ServiceHandler`] that just logs; the binary has no metrics/hooks
/// surface, so this is the only observer wired up.
#[derive(Debug, Clone, Default)]
pub struct Observer;

impl ServiceHandler for Observer {
    fn on_allocated(&self, tuple: FiveTuple, relay_addr: SocketAddr, lifetime: u32) {
        log::info!(
            "allocated: client={} interface={} relay={} lifetime={}s",
            tuple.client,
            tuple.interface,
            relay_addr,
            lifetime
        );
    }

    fn on_create_permission(&self, tuple: FiveTuple, peers: &[IpAddr]) {
        log::info!(
            "create permission: client={} interface={} peers={:?}",
            tuple.client,
            tuple.interface,
            peers
        );
    }

    fn on_refresh(&self, tuple: FiveTuple, lifetime: u32) {
        log::info!(
            "refresh: client={} interface={} lifetime={}s",
            tuple.client,
            tuple.interface,
            lifetime
        );
    }

    fn on_destroy(&self, tuple: FiveTuple) {
        log::info!(
            "destroyed: client={} interface={}",
            tuple.client,
            tuple.interface
        );
    }
}
