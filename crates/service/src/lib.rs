pub mod clock;
pub mod routing;
pub mod session;

use std::net::SocketAddr;
use std::sync::Arc;

use codec::crypto::Password;
use session::{AllocationManager, FiveTuple, PeerDataSink};

pub use session::ports::PortRange;

/// Long-term credential lookup. A request's USERNAME/REALM identify a
/// principal; the store resolves it to a key, or `None` if the principal is
/// unknown (the caller responds 401 either way -- this crate never leaks
/// which).
pub trait CredentialStore: Send + Sync + 'static {
    fn password(&self, username: &str, realm: &str) -> Option<Password>;
}

/// Observer hooks a binary wires up to logging/metrics. All have a no-op
/// default so implementors only override what they care about.
///
/// <https://datatracker.ietf.org/doc/html/rfc8656>
pub trait ServiceHandler: Send + Sync + Clone + 'static {
    /// A new allocation was created for `tuple`, relayed through
    /// `relay_addr`, valid for `lifetime` seconds.
    fn on_allocated(&self, tuple: FiveTuple, relay_addr: SocketAddr, lifetime: u32) {
        let _ = (tuple, relay_addr, lifetime);
    }

    /// Permissions were installed for `tuple` against the given peer IPs.
    fn on_create_permission(&self, tuple: FiveTuple, peers: &[std::net::IpAddr]) {
        let _ = (tuple, peers);
    }

    /// An allocation's lifetime was refreshed to `lifetime` seconds (`0`
    /// means it was torn down).
    fn on_refresh(&self, tuple: FiveTuple, lifetime: u32) {
        let _ = (tuple, lifetime);
    }

    /// An allocation expired or was explicitly destroyed.
    fn on_destroy(&self, tuple: FiveTuple) {
        let _ = tuple;
    }
}

/// Options used to build a [`Service`].
pub struct ServiceOptions<T> {
    pub realm: String,
    pub software: String,
    pub interfaces: Vec<SocketAddr>,
    pub port_range: PortRange,
    pub credentials: Arc<dyn CredentialStore>,
    pub handler: T,
    /// Permission lifetime assumed when CreatePermission omits LIFETIME.
    pub default_permission_lifetime_secs: u32,
    /// Cap a CreatePermission's requested LIFETIME is rejected past.
    pub max_permission_lifetime_secs: u32,
}

/// Top-level TURN service state shared across every reactor task: the
/// allocation table, the long-term credential store, and the observer
/// hooks. Built once at startup and cloned (cheaply, via `Arc`s inside) into
/// each per-interface router.
pub struct Service<T, S>
where
    T: ServiceHandler,
    S: PeerDataSink,
{
    pub realm: String,
    pub software: String,
    pub interfaces: Arc<Vec<SocketAddr>>,
    pub credentials: Arc<dyn CredentialStore>,
    pub manager: Arc<AllocationManager<S>>,
    pub handler: T,
}

impl<T, S> Service<T, S>
where
    T: ServiceHandler,
    S: PeerDataSink,
{
    pub fn new(options: ServiceOptions<T>, clock: Arc<dyn clock::Clock>, sink: Arc<S>) -> Self {
        Self {
            realm: options.realm,
            software: options.software,
            interfaces: Arc::new(options.interfaces),
            credentials: options.credentials,
            manager: Arc::new(AllocationManager::with_permission_lifetimes(
                options.port_range,
                clock,
                sink,
                options.default_permission_lifetime_secs,
                options.max_permission_lifetime_secs,
            )),
            handler: options.handler,
        }
    }
}
