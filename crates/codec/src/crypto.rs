use aws_lc_rs::hmac;
use md5::{Digest, Md5};

/// Long-term credential key: `MD5(username ":" realm ":" password)`.
///
/// A newtype rather than a bare `[u8; 16]` so that a key can only ever reach
/// [`hmac_sha1`] by way of [`generate_password`] -- the crate doesn't expose a
/// way to construct one from arbitrary bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Password([u8; 16]);

impl Password {
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

/// create long term credential key.
///
/// > key = MD5(username ":" OpaqueString(realm) ":" OpaqueString(password))
///
/// # Test
///
/// ```
/// use turn_server_codec::crypto::generate_password;
///
/// let key = generate_password("panda", "raspberry", "panda");
///
/// assert_eq!(
///     key.as_bytes(),
///     &[
///         0x3e, 0x2f, 0x79, 0x1e, 0x1f, 0x14, 0xd1, 0x73, 0xfc, 0x91, 0xff,
///         0x2f, 0x59, 0xb5, 0x0f, 0xd1,
///     ]
/// );
/// ```
pub fn generate_password(username: &str, password: &str, realm: &str) -> Password {
    let mut hasher = Md5::new();
    hasher.update([username, realm, password].join(":"));
    Password(hasher.finalize().into())
}

/// HMAC-SHA1 digest over the message body, keyed by the long-term credential key.
///
/// # Test
///
/// ```
/// use turn_server_codec::crypto::{hmac_sha1, generate_password};
///
/// let buffer = [
///     0x00u8, 0x03, 0x00, 0x50, 0x21, 0x12, 0xa4, 0x42, 0x64, 0x4f, 0x5a,
///     0x78, 0x6a, 0x56, 0x33, 0x62, 0x4b, 0x52, 0x33, 0x31, 0x00, 0x19, 0x00,
///     0x04, 0x11, 0x00, 0x00, 0x00, 0x00, 0x06, 0x00, 0x05, 0x70, 0x61, 0x6e,
///     0x64, 0x61, 0x00, 0x00, 0x00, 0x00, 0x14, 0x00, 0x09, 0x72, 0x61, 0x73,
///     0x70, 0x62, 0x65, 0x72, 0x72, 0x79, 0x00, 0x00, 0x00, 0x00, 0x15, 0x00,
///     0x10, 0x31, 0x63, 0x31, 0x33, 0x64, 0x32, 0x62, 0x32, 0x34, 0x35, 0x62,
///     0x33, 0x61, 0x37, 0x33, 0x34,
/// ];
///
/// let key = generate_password("panda", "raspberry", "panda");
///
/// let sign = [
///     0xd6u8, 0x78, 0x26, 0x99, 0x0e, 0x15, 0x56, 0x15, 0xe5, 0xf4, 0x24,
///     0x74, 0xe2, 0x3c, 0x26, 0xc5, 0xb1, 0x03, 0xb2, 0x6d,
/// ];
///
/// assert_eq!(&hmac_sha1(&key, &[&buffer])[..], &sign);
/// ```
pub fn hmac_sha1(password: &Password, source: &[&[u8]]) -> [u8; 20] {
    let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, password.as_bytes());
    let mut ctx = hmac::Context::with_key(&key);

    for buf in source {
        ctx.update(buf);
    }

    let signature = ctx.sign();
    let mut result = [0u8; 20];
    result.copy_from_slice(signature.as_ref());
    result
}

/// Verify a MESSAGE-INTEGRITY tag against `data` in constant time.
///
/// Authentication must not leak timing information about how many leading
/// bytes of the supplied tag matched, so this goes through `aws-lc-rs`'s own
/// constant-time comparison rather than a hand-rolled `==` on the computed
/// digest.
pub fn verify_hmac_sha1(password: &Password, data: &[u8], tag: &[u8; 20]) -> bool {
    let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, password.as_bytes());
    hmac::verify(&key, data, tag).is_ok()
}

/// CRC32 Fingerprint.
///
/// # Test
///
/// ```
/// use turn_server_codec::crypto::fingerprint;
///
/// assert_eq!(fingerprint(b"1"), 3498621689);
/// ```
pub fn fingerprint(bytes: &[u8]) -> u32 {
    crc32fast::hash(bytes) ^ 0x5354_554e
}
