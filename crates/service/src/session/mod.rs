pub mod ports;

use std::collections::HashMap;
use std::hash::BuildHasherDefault;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use ahash::AHasher;
use parking_lot::RwLock;
use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::clock::Clock;
use ports::{PortAllocator, PortRange};

/// Pre-sized hash map keyed on a fast non-cryptographic hasher; allocation
/// lookups happen on every packet, so this avoids `SipHash`'s DoS-resistant
/// but slower default.
pub type Table<K, V> = HashMap<K, V, BuildHasherDefault<AHasher>>;

/// Default permission lifetime when a CreatePermission request doesn't carry
/// a LIFETIME attribute.
pub const DEFAULT_PERMISSION_LIFETIME_SECS: u32 = 60;

/// Permissions may not be installed for longer than this; a CreatePermission
/// requesting more is rejected outright rather than silently capped.
pub const MAX_PERMISSION_LIFETIME_SECS: u32 = 3600;

/// Default allocation lifetime when the client doesn't request one.
pub const DEFAULT_ALLOCATION_LIFETIME_SECS: u32 = 600;

/// Allocations may not be refreshed past this, regardless of what the
/// client requests.
pub const MAX_ALLOCATION_LIFETIME_SECS: u32 = 3600;

/// Identifies an allocation: the client's transport address plus the server
/// interface it arrived on. TURN only relays UDP, so transport protocol is
/// not part of the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FiveTuple {
    pub client: SocketAddr,
    pub interface: SocketAddr,
}

/// Errors an [`AllocationManager`] operation can fail with.
#[derive(Debug)]
pub enum Error {
    AllocationMismatch,
    AllocationQuotaReached,
    InsufficientCapacity,
    NoPermission,
    LifetimeTooLong,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::AllocationMismatch => "allocation mismatch",
                Self::AllocationQuotaReached => "allocation quota reached",
                Self::InsufficientCapacity => "insufficient capacity",
                Self::NoPermission => "no permission installed for peer",
                Self::LifetimeTooLong => "requested lifetime exceeds the maximum",
            }
        )
    }
}

impl std::error::Error for Error {}

/// Receives data arriving on a relay socket from a permitted peer, so it can
/// be wrapped in a DATA-INDICATION and written back to the client.
///
/// Allocations live inside the manager and peer-facing reader tasks run
/// independently of any one request; routing the data back out through a
/// trait object rather than a handle to the manager itself avoids a
/// manager -> reactor -> manager call cycle.
pub trait PeerDataSink: Send + Sync + 'static {
    fn relay(&self, tuple: FiveTuple, peer: SocketAddr, data: Vec<u8>);

    /// A datagram arrived on a relay socket from a peer with no installed
    /// permission. Default is a no-op; implementors that want the "internal
    /// counter incremented" behavior called out for this case can override
    /// it.
    fn reject(&self, tuple: FiveTuple, peer: SocketAddr) {
        let _ = (tuple, peer);
    }
}

struct Permission {
    expires_at: u64,
}

/// Permission set shared between the table owner and that allocation's relay
/// reader task, so the reader can filter inbound peer traffic without
/// reaching back through the whole `FiveTuple`-keyed table.
type PermissionSet = Arc<RwLock<Table<IpAddr, Permission>>>;

struct Allocation {
    relay_socket: Arc<UdpSocket>,
    relay_addr: SocketAddr,
    username: String,
    expires_at: u64,
    permissions: PermissionSet,
    reader: JoinHandle<()>,
    stop: Option<oneshot::Sender<()>>,
}

impl Drop for Allocation {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.reader.abort();
    }
}

/// Single owner of allocation state: request handlers and the expiry
/// collector both go through this type rather than reaching into a shared
/// table directly, so there is exactly one place that decides what counts
/// as a live allocation.
pub struct AllocationManager<S: PeerDataSink> {
    table: RwLock<Table<FiveTuple, Allocation>>,
    port_allocator: PortAllocator,
    clock: Arc<dyn Clock>,
    sink: Arc<S>,
    default_permission_lifetime_secs: u32,
    max_permission_lifetime_secs: u32,
}

impl<S: PeerDataSink> AllocationManager<S> {
    pub fn new(port_range: PortRange, clock: Arc<dyn Clock>, sink: Arc<S>) -> Self {
        Self::with_permission_lifetimes(
            port_range,
            clock,
            sink,
            DEFAULT_PERMISSION_LIFETIME_SECS,
            MAX_PERMISSION_LIFETIME_SECS,
        )
    }

    pub fn with_permission_lifetimes(
        port_range: PortRange,
        clock: Arc<dyn Clock>,
        sink: Arc<S>,
        default_permission_lifetime_secs: u32,
        max_permission_lifetime_secs: u32,
    ) -> Self {
        Self {
            table: RwLock::new(Table::default()),
            port_allocator: PortAllocator::new(port_range),
            clock,
            sink,
            default_permission_lifetime_secs,
            max_permission_lifetime_secs,
        }
    }

    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    /// Create a relayed transport address for `tuple`. Fails with
    /// `AllocationMismatch` if one already exists for `tuple`, per
    /// `spec.md` §4.D -- this server has no retransmission carve-out, so a
    /// second `Allocate` against a live five-tuple is always rejected.
    pub async fn allocate(
        &self,
        tuple: FiveTuple,
        username: &str,
        relay_ip: IpAddr,
        requested_lifetime: Option<u32>,
    ) -> Result<(SocketAddr, u32), Error> {
        if self.table.read().contains_key(&tuple) {
            return Err(Error::AllocationMismatch);
        }

        let socket = self
            .port_allocator
            .allocate(relay_ip)
            .await
            .map_err(|_| Error::InsufficientCapacity)?;

        let socket = Arc::new(socket);
        let relay_addr = socket.local_addr().map_err(|_| Error::InsufficientCapacity)?;

        let lifetime = requested_lifetime
            .unwrap_or(DEFAULT_ALLOCATION_LIFETIME_SECS)
            .min(MAX_ALLOCATION_LIFETIME_SECS);

        let expires_at = self.clock.now() + lifetime as u64;
        let permissions: PermissionSet = Arc::new(RwLock::new(Table::default()));

        let (stop_tx, stop_rx) = oneshot::channel();
        let reader = spawn_relay_reader(
            tuple,
            socket.clone(),
            self.sink.clone(),
            self.clock.clone(),
            permissions.clone(),
            stop_rx,
        );

        let allocation = Allocation {
            relay_socket: socket,
            relay_addr,
            username: username.to_string(),
            expires_at,
            permissions,
            reader,
            stop: Some(stop_tx),
        };

        self.table.write().insert(tuple, allocation);
        Ok((relay_addr, lifetime))
    }

    /// Install (or refresh) permissions for `peers` against `tuple`'s
    /// allocation.
    ///
    /// `requested_lifetime` is the CreatePermission request's optional
    /// LIFETIME attribute: absent means the default lifetime, present but
    /// over the configured maximum is rejected outright rather than capped
    /// (unlike allocation/permission refresh via Send, which caps silently).
    pub fn create_permission(
        &self,
        tuple: FiveTuple,
        peers: &[IpAddr],
        requested_lifetime: Option<u32>,
    ) -> Result<(), Error> {
        if let Some(lifetime) = requested_lifetime {
            if lifetime > self.max_permission_lifetime_secs {
                return Err(Error::LifetimeTooLong);
            }
        }

        let table = self.table.read();
        let allocation = table.get(&tuple).ok_or(Error::AllocationMismatch)?;
        let lifetime = requested_lifetime.unwrap_or(self.default_permission_lifetime_secs);
        let expires_at = self.clock.now() + lifetime as u64;

        let mut permissions = allocation.permissions.write();
        for peer in peers {
            permissions.insert(*peer, Permission { expires_at });
        }

        Ok(())
    }

    /// Refresh an allocation's lifetime. A `lifetime` of zero tears the
    /// allocation down immediately, per RFC 8656 7.2. Refreshing with
    /// `lifetime = 0` a `tuple` that has no allocation is an error, not a
    /// no-op success -- per `spec.md` §8's boundary behavior.
    pub fn refresh(&self, tuple: FiveTuple, lifetime: u32) -> Result<u32, Error> {
        if lifetime == 0 {
            return if self.table.write().remove(&tuple).is_some() {
                Ok(0)
            } else {
                Err(Error::AllocationMismatch)
            };
        }

        let mut table = self.table.write();
        let allocation = table.get_mut(&tuple).ok_or(Error::AllocationMismatch)?;
        let lifetime = lifetime.min(MAX_ALLOCATION_LIFETIME_SECS);
        allocation.expires_at = self.clock.now() + lifetime as u64;
        Ok(lifetime)
    }

    pub fn relay_address(&self, tuple: FiveTuple) -> Option<SocketAddr> {
        self.table.read().get(&tuple).map(|a| a.relay_addr)
    }

    /// Send `data` to `peer` through `tuple`'s relay socket. Fails if there
    /// is no unexpired permission installed for `peer`'s IP. Sending does
    /// not itself refresh the permission -- only an explicit
    /// CreatePermission does that.
    pub async fn send_to_peer(
        &self,
        tuple: FiveTuple,
        peer: SocketAddr,
        data: &[u8],
    ) -> Result<(), Error> {
        let socket = {
            let table = self.table.read();
            let allocation = table.get(&tuple).ok_or(Error::AllocationMismatch)?;
            let now = self.clock.now();

            let permitted = allocation
                .permissions
                .read()
                .get(&peer.ip())
                .is_some_and(|p| p.expires_at > now);

            if !permitted {
                return Err(Error::NoPermission);
            }

            allocation.relay_socket.clone()
        };

        let _ = socket.send_to(data, peer).await;
        Ok(())
    }

    /// Drop allocations and permissions whose lifetime has elapsed as of
    /// `now`. Called periodically by the reactor off an injected [`Clock`]
    /// rather than a background thread, so tests can call it directly after
    /// advancing a [`crate::clock::ManualClock`].
    pub fn collect(&self, now: u64) {
        let mut table = self.table.write();
        table.retain(|tuple, allocation| {
            allocation.permissions.write().retain(|_, p| p.expires_at > now);
            let alive = allocation.expires_at > now;
            if !alive {
                log::debug!(
                    "collected expired allocation {:?} (username={})",
                    tuple, allocation.username
                );
            }
            alive
        });
        log::trace!("allocation table size after collect: {}", table.len());
    }
}

fn spawn_relay_reader<S: PeerDataSink>(
    tuple: FiveTuple,
    socket: Arc<UdpSocket>,
    sink: Arc<S>,
    clock: Arc<dyn Clock>,
    permissions: PermissionSet,
    mut stop: oneshot::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = [0u8; 65536];

        loop {
            tokio::select! {
                biased;

                _ = &mut stop => break,
                result = socket.recv_from(&mut buf) => {
                    match result {
                        Ok((len, peer)) => {
                            let now = clock.now();
                            let permitted = permissions
                                .read()
                                .get(&peer.ip())
                                .is_some_and(|p| p.expires_at > now);

                            if permitted {
                                sink.relay(tuple, peer, buf[..len].to_vec());
                            } else {
                                log::debug!(
                                    "dropping {} bytes from unpermitted peer {} for {:?}",
                                    len, peer, tuple
                                );
                                sink.reject(tuple, peer);
                            }
                        }
                        Err(e) => {
                            log::warn!("relay socket read error for {:?}: {}", tuple, e);
                            break;
                        }
                    }
                }
            }
        }
    })
}
