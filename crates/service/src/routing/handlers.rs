use std::net::SocketAddr;

use codec::crypto::Password;
use codec::message::attributes::{
    Data, ErrorCode, Lifetime, Nonce, Realm, RequestedTransport, Software, XorMappedAddress,
    XorPeerAddress, XorRelayedAddress,
};
use codec::message::methods::{
    ALLOCATE_ERROR, ALLOCATE_RESPONSE, BINDING_RESPONSE, CREATE_PERMISSION_ERROR,
    CREATE_PERMISSION_RESPONSE, DATA_INDICATION, REFRESH_ERROR, REFRESH_RESPONSE,
};
use codec::message::MessageEncoder;
use rand::RngCore;

use crate::session::{self, PeerDataSink};
use crate::ServiceHandler;

use super::request::Request;

/// Any request whose `(method, class)` isn't one of the rows this server
/// dispatches on. Indications with no matching row are simply dropped by
/// the router (they never get a response); requests get a generic 400.
///
/// <https://datatracker.ietf.org/doc/html/rfc8489#section-18.3>
pub fn unsupported<T, S>(req: &Request<'_, '_, T, S>) -> Option<Vec<u8>>
where
    T: ServiceHandler,
    S: PeerDataSink,
{
    use codec::message::methods::Class;

    if !req.message.method().is_request() {
        return None;
    }

    let method = codec::message::methods::Method {
        kind: req.message.method().kind,
        class: Class::Error,
    };

    Some(error_response(
        req,
        method,
        codec::message::attributes::ErrorType::BadRequest,
        None,
    ))
}

/// Build a 400 (Bad Request) response when decoding failed on an attribute
/// that ran past the message body -- the one malformed-message case where
/// `Message::decode` still hands back enough (method, transaction id) to
/// answer in kind, per `spec.md` §7's "reply 400 if request" rule. There is
/// no parsed [`Request`] to build this from, so it's assembled directly
/// rather than through [`error_response`].
pub fn bad_request(
    method: codec::message::methods::Method,
    token: [u8; 12],
    software: &str,
) -> Vec<u8> {
    use codec::message::methods::Class;

    let method = codec::message::methods::Method {
        kind: method.kind,
        class: Class::Error,
    };

    let mut encoder = MessageEncoder::new(method, token, Vec::with_capacity(128));
    encoder.append::<ErrorCode>((400, "Bad Request"));
    encoder.append::<Software>(software);
    encoder.flush(None)
}

fn error_response<T, S>(
    req: &Request<'_, '_, T, S>,
    method: codec::message::methods::Method,
    error: codec::message::attributes::ErrorType,
    password: Option<&Password>,
) -> Vec<u8>
where
    T: ServiceHandler,
    S: PeerDataSink,
{
    let token = *req.message.token();
    let reason: &str = error.into();
    let mut encoder = MessageEncoder::new(method, token, Vec::with_capacity(128));
    encoder.append::<ErrorCode>((error as u16, reason));
    encoder.append::<Software>(&req.state.software);
    encoder.flush(password)
}

/// STUN Binding: pure connectivity/NAT discovery, no long-term credentials
/// involved.
///
/// <https://datatracker.ietf.org/doc/html/rfc5389#section-7.3.1>
pub fn binding<T, S>(req: Request<'_, '_, T, S>) -> Option<Vec<u8>>
where
    T: ServiceHandler,
    S: PeerDataSink,
{
    let token = *req.message.token();
    let mut encoder = MessageEncoder::new(BINDING_RESPONSE, token, Vec::with_capacity(64));
    encoder.append::<XorMappedAddress>(req.client);
    encoder.append::<Software>(&req.state.software);
    Some(encoder.flush(None))
}

/// TURN Allocate: reserve a relayed transport address for the requesting
/// client.
///
/// <https://datatracker.ietf.org/doc/html/rfc8656#section-7.2>
pub async fn allocate<T, S>(req: Request<'_, '_, T, S>) -> Option<Vec<u8>>
where
    T: ServiceHandler,
    S: PeerDataSink,
{
    let Some((username, password)) = req.authenticate() else {
        return Some(unauthorized(&req));
    };

    if let Some(transport) = req.message.get::<RequestedTransport>() {
        if transport != RequestedTransport::UDP {
            return Some(error_response(
                &req,
                ALLOCATE_ERROR,
                codec::message::attributes::ErrorType::BadRequest,
                Some(&password),
            ));
        }
    }

    let tuple = req.tuple();
    let requested_lifetime = req.message.get::<Lifetime>();
    let relay_ip = req.state.interface.ip();

    match req
        .state
        .manager
        .allocate(tuple, username, relay_ip, requested_lifetime)
        .await
    {
        Ok((relay_addr, lifetime)) => {
            req.state.handler.on_allocated(tuple, relay_addr, lifetime);

            let token = *req.message.token();
            let mut encoder =
                MessageEncoder::new(ALLOCATE_RESPONSE, token, Vec::with_capacity(128));
            encoder.append::<XorRelayedAddress>(relay_addr);
            encoder.append::<XorMappedAddress>(req.client);
            encoder.append::<Lifetime>(lifetime);
            encoder.append::<Software>(&req.state.software);
            Some(encoder.flush(Some(&password)))
        }
        Err(session::Error::AllocationMismatch) => Some(error_response(
            &req,
            ALLOCATE_ERROR,
            codec::message::attributes::ErrorType::AllocationMismatch,
            Some(&password),
        )),
        Err(session::Error::InsufficientCapacity) => Some(error_response(
            &req,
            ALLOCATE_ERROR,
            codec::message::attributes::ErrorType::ServerError,
            Some(&password),
        )),
        Err(_) => Some(error_response(
            &req,
            ALLOCATE_ERROR,
            codec::message::attributes::ErrorType::ServerError,
            Some(&password),
        )),
    }
}

/// TURN CreatePermission: authorize the allocation to exchange data with
/// the given peer addresses.
///
/// <https://datatracker.ietf.org/doc/html/rfc8656#section-9.2>
pub async fn create_permission<T, S>(req: Request<'_, '_, T, S>) -> Option<Vec<u8>>
where
    T: ServiceHandler,
    S: PeerDataSink,
{
    let Some((_, password)) = req.authenticate() else {
        return Some(unauthorized(&req));
    };

    let peers: Vec<SocketAddr> = req.message.get_all::<XorPeerAddress>().collect();

    if peers.iter().any(|p| !req.is_permitted_target(*p)) {
        return Some(error_response(
            &req,
            CREATE_PERMISSION_ERROR,
            codec::message::attributes::ErrorType::BadRequest,
            Some(&password),
        ));
    }

    let tuple = req.tuple();
    let ips: Vec<_> = peers.iter().map(|p| p.ip()).collect();
    let requested_lifetime = req.message.get::<Lifetime>();

    match req
        .state
        .manager
        .create_permission(tuple, &ips, requested_lifetime)
    {
        Ok(()) => {
            req.state.handler.on_create_permission(tuple, &ips);
            let token = *req.message.token();
            let mut encoder = MessageEncoder::new(
                CREATE_PERMISSION_RESPONSE,
                token,
                Vec::with_capacity(32),
            );
            encoder.append::<Software>(&req.state.software);
            Some(encoder.flush(Some(&password)))
        }
        Err(session::Error::LifetimeTooLong) => Some(error_response(
            &req,
            CREATE_PERMISSION_ERROR,
            codec::message::attributes::ErrorType::BadRequest,
            Some(&password),
        )),
        Err(_) => Some(error_response(
            &req,
            CREATE_PERMISSION_ERROR,
            codec::message::attributes::ErrorType::AllocationMismatch,
            Some(&password),
        )),
    }
}

/// TURN Refresh: extend (or, with LIFETIME 0, tear down) an allocation.
///
/// Only the LIFETIME attribute is meaningful here -- a Refresh carrying a
/// stray XOR-PEER-ADDRESS (some clients send one out of habit) must not be
/// mistaken for a CreatePermission.
///
/// <https://datatracker.ietf.org/doc/html/rfc8656#section-7.3>
pub async fn refresh<T, S>(req: Request<'_, '_, T, S>) -> Option<Vec<u8>>
where
    T: ServiceHandler,
    S: PeerDataSink,
{
    let Some((_, password)) = req.authenticate() else {
        return Some(unauthorized(&req));
    };

    let requested = req
        .message
        .get::<Lifetime>()
        .unwrap_or(session::DEFAULT_ALLOCATION_LIFETIME_SECS);

    let tuple = req.tuple();

    match req.state.manager.refresh(tuple, requested) {
        Ok(lifetime) => {
            req.state.handler.on_refresh(tuple, lifetime);
            if lifetime == 0 {
                req.state.handler.on_destroy(tuple);
            }

            let token = *req.message.token();
            let mut encoder =
                MessageEncoder::new(REFRESH_RESPONSE, token, Vec::with_capacity(32));
            encoder.append::<Lifetime>(lifetime);
            encoder.append::<Software>(&req.state.software);
            Some(encoder.flush(Some(&password)))
        }
        Err(_) => Some(error_response(
            &req,
            REFRESH_ERROR,
            codec::message::attributes::ErrorType::AllocationMismatch,
            Some(&password),
        )),
    }
}

/// TURN Send indication: relay DATA to a peer the allocation has
/// permission for. Indications never get a response, success or failure.
///
/// <https://datatracker.ietf.org/doc/html/rfc8656#section-9.1>
pub async fn send_indication<T, S>(req: Request<'_, '_, T, S>) -> Option<Vec<u8>>
where
    T: ServiceHandler,
    S: PeerDataSink,
{
    let peer = req.message.get::<XorPeerAddress>()?;
    let data = req.message.get::<Data>()?;

    if !req.is_permitted_target(peer) {
        return None;
    }

    let tuple = req.tuple();
    if let Err(e) = req.state.manager.send_to_peer(tuple, peer, data).await {
        log::warn!("dropping send indication for {:?} to {}: {}", tuple, peer, e);
    }
    None
}

/// Build a DATA-INDICATION carrying `data` received from `peer`.
///
/// Uses a fresh random transaction id, as every indication must -- reusing
/// an all-zero id here would make every relayed datagram indistinguishable
/// from a retransmission to anything inspecting transaction ids.
pub fn build_data_indication(peer: SocketAddr, data: &[u8]) -> Vec<u8> {
    let mut token = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut token);

    let mut encoder = MessageEncoder::new(DATA_INDICATION, token, Vec::with_capacity(data.len() + 32));
    encoder.append::<XorPeerAddress>(peer);
    encoder.append::<Data>(data);
    encoder.flush(None)
}

fn unauthorized<T, S>(req: &Request<'_, '_, T, S>) -> Vec<u8>
where
    T: ServiceHandler,
    S: PeerDataSink,
{
    let token = *req.message.token();
    let mut nonce = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut nonce);
    let nonce = hex_encode(&nonce);

    let mut encoder =
        MessageEncoder::new(unauthorized_method(req), token, Vec::with_capacity(128));
    encoder.append::<ErrorCode>((401, "Unauthorized"));
    encoder.append::<Realm>(&req.state.realm);
    encoder.append::<Nonce>(&nonce);
    encoder.append::<Software>(&req.state.software);
    encoder.flush(None)
}

fn unauthorized_method<T, S>(req: &Request<'_, '_, T, S>) -> codec::message::methods::Method
where
    T: ServiceHandler,
    S: PeerDataSink,
{
    use codec::message::methods::MethodType;

    match req.message.method().kind {
        MethodType::Allocate => ALLOCATE_ERROR,
        MethodType::CreatePermission => CREATE_PERMISSION_ERROR,
        MethodType::Refresh => REFRESH_ERROR,
        _ => ALLOCATE_ERROR,
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{:02x}", b);
    }
    out
}
