use std::net::SocketAddr;
use std::sync::Arc;

use codec::crypto::Password;
use codec::message::attributes::{Realm, UserName};
use codec::message::Message;

use crate::session::{FiveTuple, PeerDataSink};
use crate::{CredentialStore, ServiceHandler};

/// Shared, per-router context: cloned once per interface, not per request.
pub struct State<T, S>
where
    T: ServiceHandler,
    S: PeerDataSink,
{
    pub realm: String,
    pub software: String,
    pub interface: SocketAddr,
    pub interfaces: Arc<Vec<SocketAddr>>,
    pub credentials: Arc<dyn CredentialStore>,
    pub manager: Arc<crate::session::AllocationManager<S>>,
    pub handler: T,
}

/// A decoded request together with the context needed to answer it.
pub struct Request<'a, 'b, T, S>
where
    T: ServiceHandler,
    S: PeerDataSink,
{
    pub client: SocketAddr,
    pub state: &'b State<T, S>,
    pub message: &'a Message<'a>,
}

impl<'a, 'b, T, S> Request<'a, 'b, T, S>
where
    T: ServiceHandler,
    S: PeerDataSink,
{
    pub fn tuple(&self) -> FiveTuple {
        FiveTuple {
            client: self.client,
            interface: self.state.interface,
        }
    }

    /// Reject peer/relay targets on loopback or link-local addresses --
    /// without this a client could use CreatePermission/Send to make the
    /// server attack its own management interfaces.
    pub fn is_permitted_target(&self, target: SocketAddr) -> bool {
        !is_loopback_or_link_local(target)
    }

    /// Validate MESSAGE-INTEGRITY against the long-term credential the
    /// request's USERNAME/REALM resolve to.
    ///
    /// Returns the resolved `(username, password)` on success. The caller
    /// is responsible for turning `None`/error into a 401.
    pub fn authenticate(&self) -> Option<(&'a str, Password)> {
        let username = self.message.get::<UserName>()?;
        let realm = self.message.get::<Realm>()?;
        let password = self.state.credentials.password(username, realm)?;

        self.message.checksum(Some(&password)).ok()?;
        Some((username, password))
    }
}

fn is_loopback_or_link_local(addr: SocketAddr) -> bool {
    match addr.ip() {
        std::net::IpAddr::V4(ip) => ip.is_loopback() || ip.is_link_local(),
        std::net::IpAddr::V6(ip) => ip.is_loopback(),
    }
}
