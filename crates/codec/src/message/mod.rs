pub mod attributes;
pub mod methods;

use std::convert::TryFrom;

use attributes::{Attribute, AttributeType, Fingerprint, MessageIntegrity};
use methods::Method;

use crate::crypto::{self, Password};
use crate::{Attributes, Error};

/// STUN magic cookie, fixed by RFC 5389.
pub const MAGIC_NUMBER: u32 = 0x2112_A442;

const HEADER_LEN: usize = 20;

/// Round `n` up to the next multiple of 4; STUN attribute values are padded
/// to a 32-bit boundary.
pub const fn alignment_32(n: usize) -> usize {
    (n + 3) & !3
}

/// A decoded STUN/TURN message borrowing from the packet buffer it was
/// parsed out of.
pub struct Message<'a> {
    method: Method,
    token: &'a [u8; 12],
    bytes: &'a [u8],
    attributes: &'a Attributes,
}

impl<'a> Message<'a> {
    pub fn method(&self) -> Method {
        self.method
    }

    pub fn token(&self) -> &'a [u8; 12] {
        self.token
    }

    /// Look up the first occurrence of attribute `T`, decoding its body.
    pub fn get<T>(&self) -> Option<T::Output>
    where
        T: Attribute<'a>,
    {
        let range = self.attributes.get(T::KIND)?;
        T::decode(&self.bytes[range.clone()], self.token).ok()
    }

    /// Look up every occurrence of attribute `T`, in wire order.
    pub fn get_all<T>(&self) -> impl Iterator<Item = T::Output> + 'a
    where
        T: Attribute<'a>,
    {
        let bytes = self.bytes;
        let token = self.token;
        self.attributes
            .get_all(T::KIND)
            .filter_map(move |range| T::decode(&bytes[range.clone()], token).ok())
    }

    /// Total length, header + body, of the message this value was decoded
    /// from.
    pub fn message_size(&self) -> usize {
        self.bytes.len()
    }

    /// Comprehension-required attribute types (`< 0x8000`) present on the
    /// wire that this decoder didn't recognize. Recorded rather than
    /// treated as a parse failure, so the rest of the message -- and
    /// whatever attributes it does understand -- is still usable.
    pub fn unknown_attributes(&self) -> &[u16] {
        self.attributes.unknown()
    }

    /// Peek the total length a message at the front of `buf` declares,
    /// without decoding it. Returns `None` if `buf` doesn't yet hold a full
    /// header.
    pub fn message_size_hint(buf: &[u8]) -> Option<usize> {
        if buf.len() < HEADER_LEN {
            return None;
        }

        let body_len = u16::from_be_bytes([buf[2], buf[3]]) as usize;
        Some(HEADER_LEN + body_len)
    }

    /// Verify MESSAGE-INTEGRITY (if `password` is given) and FINGERPRINT (if
    /// present). Returns an error if either attribute fails to validate.
    ///
    /// The FINGERPRINT and MESSAGE-INTEGRITY attributes cover everything
    /// before them, with the length field in the header rewritten as if the
    /// message ended right after the attribute being checked -- this method
    /// reconstructs that view of the buffer rather than trusting the
    /// as-received length.
    pub fn checksum(&self, password: Option<&Password>) -> Result<(), Error> {
        if let Some(range) = self.attributes.get(AttributeType::Fingerprint) {
            let covered = range.start - 4;
            let want = Fingerprint::decode(&self.bytes[range.clone()], self.token)
                .map_err(|_| Error::InvalidAttribute)?;

            let mut scratch = self.bytes[..covered].to_vec();
            patch_length(&mut scratch, covered + 8 - HEADER_LEN);

            if crypto::fingerprint(&scratch) != want {
                return Err(Error::InvalidAttribute);
            }
        }

        if let Some(password) = password {
            let range = self
                .attributes
                .get(AttributeType::MessageIntegrity)
                .ok_or(Error::InvalidAttribute)?;

            let covered = range.start - 4;
            let want = MessageIntegrity::decode(&self.bytes[range.clone()], self.token)
                .map_err(|_| Error::InvalidAttribute)?;

            let mut scratch = self.bytes[..covered].to_vec();
            patch_length(&mut scratch, covered + 24 - HEADER_LEN);

            if !crypto::verify_hmac_sha1(password, &scratch, want) {
                return Err(Error::InvalidAttribute);
            }
        }

        Ok(())
    }

    /// Decode a single message out of `buf`, recording each attribute's body
    /// range into `attributes`.
    pub fn decode(buf: &'a [u8], attributes: &'a mut Attributes) -> Result<Message<'a>, Error> {
        if buf.len() < HEADER_LEN {
            return Err(Error::InvalidInput);
        }

        if buf[0] >> 6 != 0 {
            return Err(Error::NotStunMessage);
        }

        let kind = u16::from_be_bytes([buf[0], buf[1]]);
        let body_len = u16::from_be_bytes([buf[2], buf[3]]) as usize;
        let cookie = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);

        if cookie != MAGIC_NUMBER {
            return Err(Error::NotStunMessage);
        }

        if buf.len() < HEADER_LEN + body_len {
            return Err(Error::InvalidInput);
        }

        let method = Method::try_from(kind)?;
        let token: &[u8; 12] = buf[8..20].try_into().map_err(|_| Error::InvalidInput)?;

        let mut offset = HEADER_LEN;
        let end = HEADER_LEN + body_len;

        while offset + 4 <= end {
            let attr_type = u16::from_be_bytes([buf[offset], buf[offset + 1]]);
            let attr_len = u16::from_be_bytes([buf[offset + 2], buf[offset + 3]]) as usize;
            let body_start = offset + 4;
            let body_end = body_start + attr_len;

            if body_end > end {
                return Err(Error::MalformedAttribute {
                    method,
                    token: *token,
                });
            }

            match AttributeType::try_from(attr_type) {
                Ok(kind) => attributes.push(kind, body_start..body_end),
                Err(_) if attr_type < 0x8000 => attributes.push_unknown(attr_type),
                Err(_) => {}
            }

            offset = body_start + alignment_32(attr_len);
        }

        Ok(Message {
            method,
            token,
            bytes: &buf[..end],
            attributes,
        })
    }
}

fn patch_length(buf: &mut [u8], len: usize) {
    let len = len as u16;
    buf[2..4].copy_from_slice(&len.to_be_bytes());
}

/// Builds a STUN/TURN message into a caller-owned byte buffer.
///
/// The buffer is handed in empty (or reused from a previous message via
/// [`MessageEncoder::reset`]) and grown attribute by attribute; [`Self::flush`]
/// patches in the final length and appends MESSAGE-INTEGRITY / FINGERPRINT.
pub struct MessageEncoder {
    token: [u8; 12],
    bytes: Vec<u8>,
}

impl MessageEncoder {
    pub fn new(method: Method, token: [u8; 12], mut bytes: Vec<u8>) -> Self {
        bytes.clear();
        bytes.extend_from_slice(&u16::from(method).to_be_bytes());
        bytes.extend_from_slice(&0u16.to_be_bytes());
        bytes.extend_from_slice(&MAGIC_NUMBER.to_be_bytes());
        bytes.extend_from_slice(&token);
        Self { token, bytes }
    }

    /// Append attribute `T` with `value`, padding its body to 4 bytes.
    pub fn append<'b, T>(&mut self, value: T::Output) -> &mut Self
    where
        T: Attribute<'b>,
    {
        let start = self.bytes.len();
        self.bytes.extend_from_slice(&[0, 0, 0, 0]);

        let mut body = Vec::new();
        T::encode(value, &self.token, &mut body);
        let body_len = body.len();

        self.bytes.extend_from_slice(&body);
        let padded = alignment_32(body_len);
        self.bytes.resize(start + 4 + padded, 0);

        let kind: u16 = T::KIND.into();
        self.bytes[start..start + 2].copy_from_slice(&kind.to_be_bytes());
        self.bytes[start + 2..start + 4].copy_from_slice(&(body_len as u16).to_be_bytes());

        self.set_len(self.bytes.len() - HEADER_LEN);
        self
    }

    fn set_len(&mut self, body_len: usize) {
        patch_length(&mut self.bytes, body_len);
    }

    /// Append MESSAGE-INTEGRITY (if `password` is given) and FINGERPRINT,
    /// then return the finished message buffer. FINGERPRINT must be last.
    pub fn flush(mut self, password: Option<&Password>) -> Vec<u8> {
        if let Some(password) = password {
            self.set_len(self.bytes.len() + 24 - HEADER_LEN);
            let mac = crypto::hmac_sha1(password, &[&self.bytes]);
            self.append::<MessageIntegrity>(&mac);
        }

        self.set_len(self.bytes.len() + 8 - HEADER_LEN);
        let fp = crypto::fingerprint(&self.bytes);
        self.append::<Fingerprint>(fp);

        self.bytes
    }
}
