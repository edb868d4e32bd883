pub mod address;
pub mod error;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::Error;

pub use address::{IpFamily, XAddress};
pub use error::{errno, ErrorType};

/// STUN/TURN attribute types this crate understands.
///
/// <https://datatracker.ietf.org/doc/html/rfc8489#section-18.2>
/// <https://datatracker.ietf.org/doc/html/rfc8656#section-18>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u16)]
pub enum AttributeType {
    UserName = 0x0006,
    MessageIntegrity = 0x0008,
    ErrorCode = 0x0009,
    Lifetime = 0x000D,
    XorPeerAddress = 0x0012,
    Data = 0x0013,
    Realm = 0x0014,
    Nonce = 0x0015,
    XorRelayedAddress = 0x0016,
    RequestedTransport = 0x0019,
    XorMappedAddress = 0x0020,
    Software = 0x8022,
    Fingerprint = 0x8028,
}

/// A typed STUN attribute: knows its [`AttributeType`] and how to read and
/// write its value from/to the TLV body (everything after the 4-byte
/// type+length header).
pub trait Attribute<'a> {
    const KIND: AttributeType;

    type Output;

    fn encode(value: Self::Output, token: &[u8; 12], buf: &mut Vec<u8>);

    fn decode(buf: &'a [u8], token: &[u8; 12]) -> Result<Self::Output, Error>;
}

fn as_str(buf: &[u8]) -> Result<&str, Error> {
    std::str::from_utf8(buf).map_err(|_| Error::InvalidAttribute)
}

pub struct UserName;

impl<'a> Attribute<'a> for UserName {
    const KIND: AttributeType = AttributeType::UserName;
    type Output = &'a str;

    fn encode(value: Self::Output, _token: &[u8; 12], buf: &mut Vec<u8>) {
        buf.extend_from_slice(value.as_bytes());
    }

    fn decode(buf: &'a [u8], _token: &[u8; 12]) -> Result<Self::Output, Error> {
        as_str(buf)
    }
}

pub struct Realm;

impl<'a> Attribute<'a> for Realm {
    const KIND: AttributeType = AttributeType::Realm;
    type Output = &'a str;

    fn encode(value: Self::Output, _token: &[u8; 12], buf: &mut Vec<u8>) {
        buf.extend_from_slice(value.as_bytes());
    }

    fn decode(buf: &'a [u8], _token: &[u8; 12]) -> Result<Self::Output, Error> {
        as_str(buf)
    }
}

pub struct Nonce;

impl<'a> Attribute<'a> for Nonce {
    const KIND: AttributeType = AttributeType::Nonce;
    type Output = &'a str;

    fn encode(value: Self::Output, _token: &[u8; 12], buf: &mut Vec<u8>) {
        buf.extend_from_slice(value.as_bytes());
    }

    fn decode(buf: &'a [u8], _token: &[u8; 12]) -> Result<Self::Output, Error> {
        as_str(buf)
    }
}

pub struct Software;

impl<'a> Attribute<'a> for Software {
    const KIND: AttributeType = AttributeType::Software;
    type Output = &'a str;

    fn encode(value: Self::Output, _token: &[u8; 12], buf: &mut Vec<u8>) {
        buf.extend_from_slice(value.as_bytes());
    }

    fn decode(buf: &'a [u8], _token: &[u8; 12]) -> Result<Self::Output, Error> {
        as_str(buf)
    }
}

pub struct Data;

impl<'a> Attribute<'a> for Data {
    const KIND: AttributeType = AttributeType::Data;
    type Output = &'a [u8];

    fn encode(value: Self::Output, _token: &[u8; 12], buf: &mut Vec<u8>) {
        buf.extend_from_slice(value);
    }

    fn decode(buf: &'a [u8], _token: &[u8; 12]) -> Result<Self::Output, Error> {
        Ok(buf)
    }
}

pub struct Lifetime;

impl<'a> Attribute<'a> for Lifetime {
    const KIND: AttributeType = AttributeType::Lifetime;
    type Output = u32;

    fn encode(value: Self::Output, _token: &[u8; 12], buf: &mut Vec<u8>) {
        buf.extend_from_slice(&value.to_be_bytes());
    }

    fn decode(buf: &'a [u8], _token: &[u8; 12]) -> Result<Self::Output, Error> {
        let bytes: [u8; 4] = buf.get(..4).ok_or(Error::InvalidAttribute)?.try_into().unwrap();
        Ok(u32::from_be_bytes(bytes))
    }
}

/// Transport protocol requested in REQUESTED-TRANSPORT; TURN relays only UDP
/// so the only value ever produced or accepted is [`RequestedTransport::UDP`].
pub struct RequestedTransport;

impl RequestedTransport {
    pub const UDP: u8 = 17;
}

impl<'a> Attribute<'a> for RequestedTransport {
    const KIND: AttributeType = AttributeType::RequestedTransport;
    type Output = u8;

    fn encode(value: Self::Output, _token: &[u8; 12], buf: &mut Vec<u8>) {
        buf.push(value);
        buf.extend_from_slice(&[0, 0, 0]);
    }

    fn decode(buf: &'a [u8], _token: &[u8; 12]) -> Result<Self::Output, Error> {
        buf.first().copied().ok_or(Error::InvalidAttribute)
    }
}

pub struct XorMappedAddress;

impl<'a> Attribute<'a> for XorMappedAddress {
    const KIND: AttributeType = AttributeType::XorMappedAddress;
    type Output = std::net::SocketAddr;

    fn encode(value: Self::Output, token: &[u8; 12], buf: &mut Vec<u8>) {
        XAddress::encode(value, token, buf);
    }

    fn decode(buf: &'a [u8], token: &[u8; 12]) -> Result<Self::Output, Error> {
        XAddress::decode(buf, token).ok_or(Error::InvalidAttribute)
    }
}

pub struct XorPeerAddress;

impl<'a> Attribute<'a> for XorPeerAddress {
    const KIND: AttributeType = AttributeType::XorPeerAddress;
    type Output = std::net::SocketAddr;

    fn encode(value: Self::Output, token: &[u8; 12], buf: &mut Vec<u8>) {
        XAddress::encode(value, token, buf);
    }

    fn decode(buf: &'a [u8], token: &[u8; 12]) -> Result<Self::Output, Error> {
        XAddress::decode(buf, token).ok_or(Error::InvalidAttribute)
    }
}

pub struct XorRelayedAddress;

impl<'a> Attribute<'a> for XorRelayedAddress {
    const KIND: AttributeType = AttributeType::XorRelayedAddress;
    type Output = std::net::SocketAddr;

    fn encode(value: Self::Output, token: &[u8; 12], buf: &mut Vec<u8>) {
        XAddress::encode(value, token, buf);
    }

    fn decode(buf: &'a [u8], token: &[u8; 12]) -> Result<Self::Output, Error> {
        XAddress::decode(buf, token).ok_or(Error::InvalidAttribute)
    }
}

/// `(code, reason)`.
pub struct ErrorCode;

impl<'a> Attribute<'a> for ErrorCode {
    const KIND: AttributeType = AttributeType::ErrorCode;
    type Output = (u16, &'a str);

    fn encode(value: Self::Output, _token: &[u8; 12], buf: &mut Vec<u8>) {
        let (class, number) = errno(value.0);
        buf.extend_from_slice(&[0, 0, class, number]);
        buf.extend_from_slice(value.1.as_bytes());
    }

    fn decode(buf: &'a [u8], _token: &[u8; 12]) -> Result<Self::Output, Error> {
        if buf.len() < 4 {
            return Err(Error::InvalidAttribute);
        }

        let code = buf[2] as u16 * 100 + buf[3] as u16;
        Ok((code, as_str(&buf[4..])?))
    }
}

/// MESSAGE-INTEGRITY carries a raw 20-byte HMAC-SHA1 digest; verification
/// happens in [`crate::message::Message::checksum`], which needs the whole
/// message up to this attribute, not just its body.
pub struct MessageIntegrity;

impl<'a> Attribute<'a> for MessageIntegrity {
    const KIND: AttributeType = AttributeType::MessageIntegrity;
    type Output = &'a [u8; 20];

    fn encode(value: Self::Output, _token: &[u8; 12], buf: &mut Vec<u8>) {
        buf.extend_from_slice(value);
    }

    fn decode(buf: &'a [u8], _token: &[u8; 12]) -> Result<Self::Output, Error> {
        buf.get(..20)
            .and_then(|b| <&[u8; 20]>::try_from(b).ok())
            .ok_or(Error::InvalidAttribute)
    }
}

/// FINGERPRINT carries the CRC32 checksum of everything before it, XOR'd
/// with a fixed constant; see [`crate::crypto::fingerprint`].
pub struct Fingerprint;

impl<'a> Attribute<'a> for Fingerprint {
    const KIND: AttributeType = AttributeType::Fingerprint;
    type Output = u32;

    fn encode(value: Self::Output, _token: &[u8; 12], buf: &mut Vec<u8>) {
        buf.extend_from_slice(&value.to_be_bytes());
    }

    fn decode(buf: &'a [u8], _token: &[u8; 12]) -> Result<Self::Output, Error> {
        let bytes: [u8; 4] = buf.get(..4).ok_or(Error::InvalidAttribute)?.try_into().unwrap();
        Ok(u32::from_be_bytes(bytes))
    }
}
