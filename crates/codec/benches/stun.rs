use criterion::{black_box, criterion_group, criterion_main, Criterion};

use turn_server_codec::crypto::generate_password;
use turn_server_codec::message::attributes::{Lifetime, UserName, XorRelayedAddress};
use turn_server_codec::message::methods::ALLOCATE_RESPONSE;
use turn_server_codec::message::MessageEncoder;
use turn_server_codec::{DecodeResult, Decoder};

fn encode(c: &mut Criterion) {
    let password = generate_password("alice", "s3cret", "example.org");
    let relay: std::net::SocketAddr = "203.0.113.9:51000".parse().unwrap();

    c.bench_function("encode allocate response", |b| {
        b.iter(|| {
            let mut encoder =
                MessageEncoder::new(ALLOCATE_RESPONSE, [0u8; 12], Vec::with_capacity(256));
            encoder.append::<XorRelayedAddress>(black_box(relay));
            encoder.append::<Lifetime>(black_box(600));
            black_box(encoder.flush(Some(&password)))
        });
    });
}

fn decode(c: &mut Criterion) {
    let password = generate_password("alice", "s3cret", "example.org");
    let relay: std::net::SocketAddr = "203.0.113.9:51000".parse().unwrap();

    let mut encoder = MessageEncoder::new(ALLOCATE_RESPONSE, [0u8; 12], Vec::new());
    encoder.append::<XorRelayedAddress>(relay);
    encoder.append::<Lifetime>(600);
    encoder.append::<UserName>("alice");
    let bytes = encoder.flush(Some(&password));

    c.bench_function("decode allocate response", |b| {
        let mut decoder = Decoder::default();
        b.iter(|| {
            let DecodeResult::Message(message) = decoder.decode(black_box(&bytes)).unwrap();
            black_box(message.checksum(Some(&password)).unwrap());
        });
    });
}

criterion_group!(benches, encode, decode);
criterion_main!(benches);
