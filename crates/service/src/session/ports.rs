use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use rand::Rng;
use tokio::net::UdpSocket;

/// Inclusive-exclusive port range the relay allocates sockets from.
///
/// # Test
///
/// ```
/// use turn_server_service::session::ports::PortRange;
/// use std::str::FromStr;
///
/// let range = PortRange::from_str("49152..65535").unwrap();
/// assert_eq!(range.size(), 16383);
/// assert!(range.contains(50000));
/// assert!(!range.contains(49151));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl Default for PortRange {
    fn default() -> Self {
        Self {
            start: 49152,
            end: 65535,
        }
    }
}

impl PortRange {
    pub fn size(&self) -> usize {
        self.end.saturating_sub(self.start) as usize
    }

    pub fn contains(&self, port: u16) -> bool {
        port >= self.start && port < self.end
    }
}

impl FromStr for PortRange {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s.split_once("..").unwrap_or((s, s));
        Ok(Self {
            start: start.trim().parse()?,
            end: end.trim().parse()?,
        })
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for PortRange {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for PortRange {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Binds relay sockets from a configured [`PortRange`].
///
/// Unlike a logical bitset allocator, each allocation gets a real
/// `tokio::net::UdpSocket` bound to a port drawn at random from the range;
/// the OS rejects a port already in use, so a handful of bind retries stand
/// in for tracking allocated ports ourselves.
pub struct PortAllocator {
    range: PortRange,
}

impl PortAllocator {
    pub fn new(range: PortRange) -> Self {
        Self { range }
    }

    /// Bind a UDP socket on `relay_ip` at a random port within range.
    ///
    /// The initial attempt is followed by 3 retries on `EADDRINUSE`, backing
    /// off 1ms/4ms/16ms between them so a burst of colliding allocations
    /// doesn't hammer the kernel's bind path in a tight loop.
    pub async fn allocate(&self, relay_ip: IpAddr) -> std::io::Result<UdpSocket> {
        const RETRIES: u32 = 3;

        let mut last_err = None;
        for attempt in 0..=RETRIES {
            if attempt > 0 {
                let backoff_ms = 4u64.pow(attempt - 1);
                tokio::time::sleep(std::time::Duration::from_millis(backoff_ms)).await;
            }

            let port = {
                let mut rng = rand::thread_rng();
                rng.gen_range(self.range.start..self.range.end)
            };

            match UdpSocket::bind(SocketAddr::new(relay_ip, port)).await {
                Ok(socket) => return Ok(socket),
                Err(e) => last_err = Some(e),
            }
        }

        Err(last_err.unwrap_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, "port range exhausted")
        }))
    }
}
