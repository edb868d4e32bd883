use turn_server_codec::crypto::generate_password;
use turn_server_codec::message::attributes::{
    ErrorCode, Lifetime, RequestedTransport, Software, UserName, XorMappedAddress,
    XorRelayedAddress,
};
use turn_server_codec::message::methods::{
    ALLOCATE_ERROR, ALLOCATE_REQUEST, ALLOCATE_RESPONSE, BINDING_REQUEST,
};
use turn_server_codec::message::MessageEncoder;
use turn_server_codec::{DecodeResult, Decoder};

fn token() -> [u8; 12] {
    [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]
}

#[test]
fn decodes_a_binding_request_it_encoded() {
    let bytes = MessageEncoder::new(BINDING_REQUEST, token(), Vec::new()).flush(None);

    let mut decoder = Decoder::default();
    let DecodeResult::Message(message) = decoder.decode(&bytes).unwrap();

    assert_eq!(message.method(), BINDING_REQUEST);
    assert_eq!(message.token(), &token());
}

#[test]
fn allocate_response_carries_relayed_and_mapped_addresses() {
    let relay: std::net::SocketAddr = "203.0.113.9:51000".parse().unwrap();
    let mapped: std::net::SocketAddr = "198.51.100.5:4000".parse().unwrap();

    let password = generate_password("alice", "s3cret", "example.org");

    let mut encoder = MessageEncoder::new(ALLOCATE_RESPONSE, token(), Vec::new());
    encoder.append::<XorRelayedAddress>(relay);
    encoder.append::<XorMappedAddress>(mapped);
    encoder.append::<Lifetime>(600);
    let bytes = encoder.flush(Some(&password));

    let mut decoder = Decoder::default();
    let DecodeResult::Message(message) = decoder.decode(&bytes).unwrap();

    assert_eq!(message.get::<XorRelayedAddress>(), Some(relay));
    assert_eq!(message.get::<XorMappedAddress>(), Some(mapped));
    assert_eq!(message.get::<Lifetime>(), Some(600));
    assert!(message.checksum(Some(&password)).is_ok());
}

#[test]
fn checksum_rejects_a_tampered_body() {
    let password = generate_password("alice", "s3cret", "example.org");

    let mut encoder = MessageEncoder::new(ALLOCATE_REQUEST, token(), Vec::new());
    encoder.append::<UserName>("alice");
    encoder.append::<RequestedTransport>(RequestedTransport::UDP);
    let mut bytes = encoder.flush(Some(&password));

    // Flip a bit in the username body, after MESSAGE-INTEGRITY has already
    // been computed over the original bytes.
    bytes[20 + 4] ^= 0xff;

    let mut decoder = Decoder::default();
    let DecodeResult::Message(message) = decoder.decode(&bytes).unwrap();
    assert!(message.checksum(Some(&password)).is_err());
}

#[test]
fn wrong_password_fails_checksum() {
    let password = generate_password("alice", "s3cret", "example.org");
    let wrong = generate_password("alice", "wrong", "example.org");

    let bytes = MessageEncoder::new(ALLOCATE_REQUEST, token(), Vec::new()).flush(Some(&password));

    let mut decoder = Decoder::default();
    let DecodeResult::Message(message) = decoder.decode(&bytes).unwrap();
    assert!(message.checksum(Some(&wrong)).is_err());
}

#[test]
fn error_response_round_trips_code_and_reason() {
    let bytes = {
        let mut encoder = MessageEncoder::new(ALLOCATE_ERROR, token(), Vec::new());
        encoder.append::<ErrorCode>((437, "Allocation Mismatch"));
        encoder.append::<Software>("turn-server");
        encoder.flush(None)
    };

    let mut decoder = Decoder::default();
    let DecodeResult::Message(message) = decoder.decode(&bytes).unwrap();

    assert_eq!(message.get::<ErrorCode>(), Some((437, "Allocation Mismatch")));
    assert_eq!(message.get::<Software>(), Some("turn-server"));
}

#[test]
fn message_size_hint_matches_decoded_length() {
    let bytes = MessageEncoder::new(BINDING_REQUEST, token(), Vec::new()).flush(None);
    assert_eq!(Decoder::message_size(&bytes), Some(bytes.len()));
}

#[test]
fn rejects_truncated_input() {
    let bytes = MessageEncoder::new(BINDING_REQUEST, token(), Vec::new()).flush(None);
    let mut decoder = Decoder::default();
    assert!(decoder.decode(&bytes[..10]).is_err());
}
