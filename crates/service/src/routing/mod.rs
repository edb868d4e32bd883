pub mod handlers;
pub mod request;

use std::net::SocketAddr;

use codec::message::methods::MethodType;
use codec::{DecodeResult, Decoder};

use crate::session::PeerDataSink;
use crate::{Service, ServiceHandler};

pub use request::{Request, State};

/// Outcome of routing one packet.
#[derive(Debug)]
pub enum RouteResult {
    /// Bytes to write back to the address the packet came from.
    Reply(Vec<u8>),
    /// The packet decoded cleanly but needs no reply (an indication, or a
    /// request this server silently ignores).
    None,
    /// The packet wasn't a valid STUN/TURN message at all.
    Exceptional(codec::Error),
}

/// Decodes and dispatches packets arriving on one server interface.
///
/// Holds its own [`Decoder`] and response scratch buffer so a single
/// `Router` can be reused across every packet that interface receives,
/// rather than allocating per-packet.
pub struct Router<T, S>
where
    T: ServiceHandler,
    S: PeerDataSink,
{
    state: State<T, S>,
    decoder: Decoder,
}

impl<T, S> Router<T, S>
where
    T: ServiceHandler,
    S: PeerDataSink,
{
    pub fn new(service: &Service<T, S>, interface: SocketAddr) -> Self {
        Self {
            decoder: Decoder::default(),
            state: State {
                realm: service.realm.clone(),
                software: service.software.clone(),
                interface,
                interfaces: service.interfaces.clone(),
                credentials: service.credentials.clone(),
                manager: service.manager.clone(),
                handler: service.handler.clone(),
            },
        }
    }

    pub async fn route(&mut self, bytes: &[u8], client: SocketAddr) -> RouteResult {
        let message = match self.decoder.decode(bytes) {
            Ok(DecodeResult::Message(message)) => message,
            Err(codec::Error::MalformedAttribute { method, token }) if method.is_request() => {
                return RouteResult::Reply(handlers::bad_request(
                    method,
                    token,
                    &self.state.software,
                ));
            }
            Err(e) => return RouteResult::Exceptional(e),
        };

        let method = message.method();

        let req = Request {
            client,
            state: &self.state,
            message: &message,
        };

        let result = match method.kind {
            MethodType::Binding if method.is_request() => handlers::binding(req),
            MethodType::Allocate if method.is_request() => handlers::allocate(req).await,
            MethodType::CreatePermission if method.is_request() => {
                handlers::create_permission(req).await
            }
            MethodType::Refresh if method.is_request() => handlers::refresh(req).await,
            MethodType::Send if method.is_indication() => handlers::send_indication(req).await,
            _ => handlers::unsupported(&req),
        };

        result.map(RouteResult::Reply).unwrap_or(RouteResult::None)
    }
}
