pub mod crypto;
pub mod message;

use std::fmt;
use std::ops::Range;

use message::attributes::AttributeType;
use message::methods::Method;
use message::Message;

/// Errors produced while decoding a STUN/TURN message.
#[derive(Debug)]
pub enum Error {
    /// the buffer is shorter than a STUN header, or shorter than the length
    /// the header declares.
    InvalidInput,
    /// the leading two bits of the message type were not zero, or the magic
    /// cookie did not match [`message::MAGIC_NUMBER`].
    NotStunMessage,
    /// an attribute's declared length runs past the end of the message.
    InvalidAttribute,
    /// an attribute's declared length runs past the end of the message, but
    /// the header parsed cleanly first -- `method` and `token` are carried
    /// along so a caller can still build a same-method, same-transaction
    /// error response for a request (spec.md §7: "reply 400 if request, drop
    /// if indication").
    MalformedAttribute { method: Method, token: [u8; 12] },
    /// the message method is not one this crate knows about.
    UnknownMethod,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::InvalidInput => "invalid input",
                Self::NotStunMessage => "not a stun message",
                Self::InvalidAttribute => "invalid attribute",
                Self::MalformedAttribute { .. } => "malformed attribute",
                Self::UnknownMethod => "unknown method",
            }
        )
    }
}

impl std::error::Error for Error {}

/// Result of decoding a single packet: either a complete STUN/TURN message,
/// or a signal that more bytes are needed before decoding can proceed.
#[derive(Debug)]
pub enum DecodeResult<'a> {
    Message(Message<'a>),
}

/// Index of attribute ranges found while scanning a message, keyed in the
/// order they appeared on the wire, plus any comprehension-required
/// attribute types (`< 0x8000`) the decoder didn't recognize.
#[derive(Debug, Default)]
pub struct Attributes {
    entries: Vec<(AttributeType, Range<usize>)>,
    unknown: Vec<u16>,
}

impl Attributes {
    pub fn push(&mut self, kind: AttributeType, range: Range<usize>) {
        self.entries.push((kind, range));
    }

    /// Record a comprehension-required attribute type this decoder didn't
    /// recognize, without aborting the parse of the rest of the message.
    pub fn push_unknown(&mut self, attr_type: u16) {
        self.unknown.push(attr_type);
    }

    pub fn get(&self, kind: AttributeType) -> Option<&Range<usize>> {
        self.entries.iter().find(|(k, _)| k == &kind).map(|(_, r)| r)
    }

    pub fn get_all(&self, kind: AttributeType) -> impl Iterator<Item = &Range<usize>> {
        self.entries.iter().filter(move |(k, _)| k == &kind).map(|(_, r)| r)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(AttributeType, Range<usize>)> {
        self.entries.iter()
    }

    /// Comprehension-required attribute types seen during decode that this
    /// version of the codec doesn't know how to parse.
    pub fn unknown(&self) -> &[u16] {
        &self.unknown
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.unknown.clear();
    }
}

/// Reusable attribute scanner.
///
/// [`Decoder::decode`] borrows from the buffer it's handed, so a single
/// `Decoder` can be kept around across packets -- each call clears and
/// refills the same attribute index instead of allocating a fresh one.
#[derive(Debug, Default)]
pub struct Decoder(Attributes);

impl Decoder {
    /// Decode a single STUN/TURN message from `buf`.
    ///
    /// `buf` must hold exactly one message; TURN runs over UDP datagrams, so
    /// there is no stream framing to resync on.
    pub fn decode<'a>(&'a mut self, buf: &'a [u8]) -> Result<DecodeResult<'a>, Error> {
        self.0.clear();
        let message = Message::decode(buf, &mut self.0)?;
        Ok(DecodeResult::Message(message))
    }

    /// Peek the total length (header + body) a message at the front of `buf`
    /// declares, without fully decoding it.
    pub fn message_size(buf: &[u8]) -> Option<usize> {
        Message::message_size_hint(buf)
    }
}
