use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use service::clock::Clock;
use service::routing::{Router, RouteResult};
use service::session::{FiveTuple, PeerDataSink};
use service::{Service, ServiceHandler};
use tokio::net::UdpSocket;

/// Routes DATA-INDICATIONs from an allocation's relay socket back out the
/// listening socket the client originally arrived on.
///
/// One [`ClientSink`] is shared across every interface: a relay reader task
/// only knows the [`FiveTuple`] it was spawned for, and looks the matching
/// listening socket up by `tuple.interface` at send time. This keeps the
/// allocation manager from needing a direct reference to any reactor.
#[derive(Clone)]
pub struct ClientSink {
    sockets: Arc<RwLock<HashMap<SocketAddr, Arc<UdpSocket>>>>,
    write_deadline: Duration,
}

impl ClientSink {
    pub fn new(write_deadline: Duration) -> Self {
        Self {
            sockets: Arc::default(),
            write_deadline,
        }
    }

    pub fn register(&self, interface: SocketAddr, socket: Arc<UdpSocket>) {
        self.sockets.write().insert(interface, socket);
    }
}

impl PeerDataSink for ClientSink {
    fn relay(&self, tuple: FiveTuple, peer: SocketAddr, data: Vec<u8>) {
        let Some(socket) = self.sockets.read().get(&tuple.interface).cloned() else {
            log::warn!("no listening socket for interface {}", tuple.interface);
            return;
        };

        let write_deadline = self.write_deadline;
        tokio::spawn(async move {
            let message = service::routing::handlers::build_data_indication(peer, &data);
            if let Err(e) =
                send_with_deadline(&socket, &message, tuple.client, write_deadline).await
            {
                log::warn!("failed to deliver data indication to {}: {}", tuple.client, e);
            }
        });
    }

    fn reject(&self, tuple: FiveTuple, peer: SocketAddr) {
        log::warn!(
            "dropped datagram from peer {} with no permission on {:?}",
            peer,
            tuple
        );
    }
}

async fn send_with_deadline(
    socket: &UdpSocket,
    bytes: &[u8],
    to: SocketAddr,
    write_deadline: Duration,
) -> std::io::Result<()> {
    match tokio::time::timeout(write_deadline, socket.send_to(bytes, to)).await {
        Ok(result) => result.map(|_| ()),
        Err(_) => Err(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "write deadline exceeded",
        )),
    }
}

/// Owns one UDP listening socket and the [`Router`] that answers packets
/// arriving on it.
///
/// Each interface configured in `server.interfaces` gets its own `Reactor`,
/// run as an independent task -- a panic unwinding out of one interface's
/// packet-processing loop is contained by that task's `JoinHandle` rather
/// than taking the whole process down with it.
pub struct Reactor<T>
where
    T: ServiceHandler,
{
    socket: Arc<UdpSocket>,
    router: Router<T, ClientSink>,
    manager: Arc<service::session::AllocationManager<ClientSink>>,
    clock: Arc<dyn Clock>,
    read_buffer: usize,
    write_deadline: Duration,
    collect_interval: Duration,
}

impl<T> Reactor<T>
where
    T: ServiceHandler,
{
    #[allow(clippy::too_many_arguments)]
    pub async fn bind(
        interface: SocketAddr,
        service: &Service<T, ClientSink>,
        sink: &ClientSink,
        clock: Arc<dyn Clock>,
        read_buffer: usize,
        write_deadline: Duration,
        collect_interval: Duration,
    ) -> std::io::Result<Self> {
        let socket = Arc::new(UdpSocket::bind(interface).await?);
        sink.register(interface, socket.clone());

        let router = Router::new(service, interface);
        Ok(Self {
            socket,
            router,
            manager: service.manager.clone(),
            clock,
            read_buffer,
            write_deadline,
            collect_interval,
        })
    }

    pub async fn run(mut self) {
        // Reused across every iteration instead of allocated per packet. Any
        // datagram bigger than this is truncated by the OS on read and then
        // rejected by the codec as malformed, per the 1024-byte wire budget.
        let mut recv_buf = vec![0u8; self.read_buffer];
        let mut collect = tokio::time::interval(self.collect_interval);

        loop {
            tokio::select! {
                biased;

                _ = collect.tick() => {
                    self.manager.collect(self.clock.now());
                }

                received = self.socket.recv_from(&mut recv_buf) => {
                    match received {
                        Ok((len, client)) => {
                            match self.router.route(&recv_buf[..len], client).await {
                                RouteResult::Reply(bytes) => {
                                    if let Err(e) = send_with_deadline(
                                        &self.socket,
                                        &bytes,
                                        client,
                                        self.write_deadline,
                                    )
                                    .await
                                    {
                                        log::warn!("failed to reply to {}: {}", client, e);
                                    }
                                }
                                RouteResult::None => {}
                                RouteResult::Exceptional(e) => {
                                    log::debug!("dropped malformed packet from {}: {}", client, e);
                                }
                            }
                        }
                        Err(e) => {
                            log::error!("socket read error: {}", e);
                        }
                    }
                }
            }
        }
    }
}
