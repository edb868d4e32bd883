use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use codec::crypto::{generate_password, Password};
use codec::message::attributes::{
    Data, Lifetime, Realm, RequestedTransport, UserName, XorPeerAddress, XorRelayedAddress,
};
use codec::message::methods::{ALLOCATE_REQUEST, CREATE_PERMISSION_REQUEST, REFRESH_REQUEST, SEND_INDICATION};
use codec::message::MessageEncoder;
use codec::{DecodeResult, Decoder};
use service::clock::ManualClock;
use service::routing::{Router, RouteResult};
use service::session::FiveTuple;
use service::{CredentialStore, PortRange, Service, ServiceHandler, ServiceOptions};

const REALM: &str = "example.org";

#[derive(Clone, Default)]
struct NoopHandler;
impl ServiceHandler for NoopHandler {}

#[derive(Clone, Default)]
struct NoopSink;
impl service::session::PeerDataSink for NoopSink {
    fn relay(&self, _tuple: FiveTuple, _peer: SocketAddr, _data: Vec<u8>) {}
}

/// Records every `relay`/`reject` call it sees, so tests can assert on the
/// peer -> client relay datapath without a real client socket on the other
/// end.
#[derive(Clone, Default)]
struct RecordingSink {
    relayed: Arc<Mutex<Vec<(FiveTuple, SocketAddr, Vec<u8>)>>>,
    rejected: Arc<Mutex<Vec<(FiveTuple, SocketAddr)>>>,
}

impl service::session::PeerDataSink for RecordingSink {
    fn relay(&self, tuple: FiveTuple, peer: SocketAddr, data: Vec<u8>) {
        self.relayed.lock().unwrap().push((tuple, peer, data));
    }

    fn reject(&self, tuple: FiveTuple, peer: SocketAddr) {
        self.rejected.lock().unwrap().push((tuple, peer));
    }
}

struct FixedCredentials(HashMap<&'static str, &'static str>);

impl CredentialStore for FixedCredentials {
    fn password(&self, username: &str, realm: &str) -> Option<Password> {
        if realm != REALM {
            return None;
        }
        let secret = self.0.get(username)?;
        Some(generate_password(username, secret, realm))
    }
}

fn build_service() -> (Service<NoopHandler, NoopSink>, Arc<ManualClock>) {
    let (service, clock) = build_service_with_sink(Arc::new(NoopSink));
    (service, clock)
}

fn build_service_with_sink<S: service::session::PeerDataSink>(
    sink: Arc<S>,
) -> (Service<NoopHandler, S>, Arc<ManualClock>) {
    let clock = ManualClock::new(0);
    let mut users = HashMap::new();
    users.insert("alice", "s3cret");

    let service = Service::new(
        ServiceOptions {
            realm: REALM.to_string(),
            software: "turn-server-test".to_string(),
            interfaces: vec!["127.0.0.1:3478".parse().unwrap()],
            port_range: PortRange {
                start: 41000,
                end: 41100,
            },
            credentials: Arc::new(FixedCredentials(users)),
            handler: NoopHandler,
            default_permission_lifetime_secs: 60,
            max_permission_lifetime_secs: 3600,
        },
        clock.clone(),
        sink,
    );

    (service, clock)
}

/// Poll `f` until it returns `Some`, or panic with `msg` after ~1s.
async fn wait_until<T>(msg: &str, mut f: impl FnMut() -> Option<T>) -> T {
    for _ in 0..200 {
        if let Some(value) = f() {
            return value;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("{msg}");
}

fn allocate_request(token: [u8; 12], password: &Password) -> Vec<u8> {
    let mut encoder = MessageEncoder::new(ALLOCATE_REQUEST, token, Vec::new());
    encoder.append::<RequestedTransport>(RequestedTransport::UDP);
    encoder.append::<UserName>("alice");
    encoder.append::<Realm>(REALM);
    encoder.flush(Some(password))
}

#[tokio::test]
async fn allocate_without_credentials_is_challenged() {
    let (service, _clock) = build_service();
    let interface: SocketAddr = "127.0.0.1:3478".parse().unwrap();
    let client: SocketAddr = "127.0.0.1:50000".parse().unwrap();

    let mut router = Router::new(&service, interface);
    let mut encoder = MessageEncoder::new(ALLOCATE_REQUEST, [9; 12], Vec::new());
    encoder.append::<RequestedTransport>(RequestedTransport::UDP);
    let request = encoder.flush(None);

    let RouteResult::Reply(bytes) = router.route(&request, client).await else {
        panic!("expected a 401 challenge");
    };

    let mut decoder = Decoder::default();
    let DecodeResult::Message(message) = decoder.decode(&bytes).unwrap();
    assert!(message.method().is_error());
}

#[tokio::test]
async fn allocate_then_create_permission_then_refresh_to_zero_destroys_it() {
    let (service, clock) = build_service();
    let interface: SocketAddr = "127.0.0.1:3478".parse().unwrap();
    let client: SocketAddr = "127.0.0.1:50001".parse().unwrap();
    let password = generate_password("alice", "s3cret", REALM);

    let mut router = Router::new(&service, interface);

    let allocate = allocate_request([1; 12], &password);
    let RouteResult::Reply(reply) = router.route(&allocate, client).await else {
        panic!("expected allocate response");
    };

    let mut decoder = Decoder::default();
    let DecodeResult::Message(message) = decoder.decode(&reply).unwrap();
    assert!(message.method().is_success());
    let relay_addr = message.get::<XorRelayedAddress>().expect("relay address");

    let tuple = FiveTuple { client, interface };
    assert_eq!(service.manager.relay_address(tuple), Some(relay_addr));

    let peer: SocketAddr = "93.184.216.34:9000".parse().unwrap();
    let mut encoder = MessageEncoder::new(CREATE_PERMISSION_REQUEST, [2; 12], Vec::new());
    encoder.append::<XorPeerAddress>(peer);
    encoder.append::<UserName>("alice");
    encoder.append::<Realm>(REALM);
    let create_permission = encoder.flush(Some(&password));

    let RouteResult::Reply(reply) = router.route(&create_permission, client).await else {
        panic!("expected create permission response");
    };
    let mut decoder = Decoder::default();
    let DecodeResult::Message(message) = decoder.decode(&reply).unwrap();
    assert!(message.method().is_success());

    // A Send Indication to the now-permitted peer should succeed silently.
    let mut encoder = MessageEncoder::new(SEND_INDICATION, [3; 12], Vec::new());
    encoder.append::<XorPeerAddress>(peer);
    encoder.append::<Data>(b"hello".as_slice());
    let send = encoder.flush(None);
    assert!(matches!(router.route(&send, client).await, RouteResult::None));

    let mut encoder = MessageEncoder::new(REFRESH_REQUEST, [4; 12], Vec::new());
    encoder.append::<Lifetime>(0);
    encoder.append::<UserName>("alice");
    encoder.append::<Realm>(REALM);
    let refresh = encoder.flush(Some(&password));

    let RouteResult::Reply(reply) = router.route(&refresh, client).await else {
        panic!("expected refresh response");
    };
    let mut decoder = Decoder::default();
    let DecodeResult::Message(message) = decoder.decode(&reply).unwrap();
    assert_eq!(message.get::<Lifetime>(), Some(0));

    assert_eq!(service.manager.relay_address(tuple), None);
    let _ = clock.now();
}

#[tokio::test]
async fn permission_expires_after_its_lifetime() {
    let (service, clock) = build_service();
    let interface: SocketAddr = "127.0.0.1:3478".parse().unwrap();
    let client: SocketAddr = "127.0.0.1:50002".parse().unwrap();
    let password = generate_password("alice", "s3cret", REALM);

    let mut router = Router::new(&service, interface);
    let allocate = allocate_request([5; 12], &password);
    router.route(&allocate, client).await;

    let tuple = FiveTuple { client, interface };
    let peer: SocketAddr = "93.184.216.34:9000".parse().unwrap();
    service
        .manager
        .create_permission(tuple, &[peer.ip()], None)
        .unwrap();

    clock.advance(61);
    service.manager.collect(clock.now());

    let err = service
        .manager
        .send_to_peer(tuple, peer, b"hi")
        .await
        .unwrap_err();
    assert!(matches!(err, service::session::Error::NoPermission));
}

#[tokio::test]
async fn peer_datagram_reaches_client_sink_only_with_permission() {
    let sink = Arc::new(RecordingSink::default());
    let (service, _clock) = build_service_with_sink(sink.clone());
    let interface: SocketAddr = "127.0.0.1:3478".parse().unwrap();
    let client: SocketAddr = "127.0.0.1:50003".parse().unwrap();
    let password = generate_password("alice", "s3cret", REALM);

    let mut router = Router::new(&service, interface);
    let allocate = allocate_request([6; 12], &password);
    let RouteResult::Reply(reply) = router.route(&allocate, client).await else {
        panic!("expected allocate response");
    };
    let mut decoder = Decoder::default();
    let DecodeResult::Message(message) = decoder.decode(&reply).unwrap();
    let relay_addr = message.get::<XorRelayedAddress>().expect("relay address");

    let tuple = FiveTuple { client, interface };

    // A peer with no installed permission: its datagrams are dropped and
    // counted as rejected, never handed to the client-facing sink.
    let stranger = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let stranger_addr = stranger.local_addr().unwrap();
    stranger.send_to(b"uninvited", relay_addr).await.unwrap();

    wait_until("expected the stranger's datagram to be rejected", || {
        sink.rejected
            .lock()
            .unwrap()
            .contains(&(tuple, stranger_addr))
            .then_some(())
    })
    .await;
    assert!(sink.relayed.lock().unwrap().is_empty());

    // A permitted peer: its datagram is relayed with the right tuple, peer
    // address and payload.
    let peer = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let peer_addr = peer.local_addr().unwrap();
    service
        .manager
        .create_permission(tuple, &[peer_addr.ip()], None)
        .unwrap();

    peer.send_to(b"hello from peer", relay_addr).await.unwrap();

    let (relayed_tuple, relayed_peer, relayed_data) =
        wait_until("expected the permitted peer's datagram to be relayed", || {
            sink.relayed.lock().unwrap().first().cloned()
        })
        .await;

    assert_eq!(relayed_tuple, tuple);
    assert_eq!(relayed_peer, peer_addr);
    assert_eq!(relayed_data, b"hello from peer");
    assert!(sink.rejected.lock().unwrap().contains(&(tuple, stranger_addr)));
}
