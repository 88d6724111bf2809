use bytes::{Bytes, BytesMut};
use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use honchat_protocol::core::codec::{PacketCodec, WireCodec};
use honchat_protocol::protocol::message::ClientMessage;
use tokio_util::codec::Encoder;

fn joined_channel_packet(users: usize) -> Vec<u8> {
    let mut raw = vec![0x04, 0x00];
    raw.extend_from_slice(b"town\0");
    raw.extend_from_slice(&7u32.to_le_bytes());
    raw.push(0);
    raw.extend_from_slice(b"welcome\0");
    raw.extend_from_slice(&0u32.to_le_bytes());
    raw.extend_from_slice(&(users as u32).to_le_bytes());
    for i in 0..users {
        raw.extend_from_slice(format!("player{i}\0").as_bytes());
        raw.extend_from_slice(&(i as u32).to_le_bytes());
        raw.extend_from_slice(&[3, 0]);
        raw.extend_from_slice(b"\0white\0\0");
    }
    raw
}

#[allow(clippy::unwrap_used)]
fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("wire_codec");
    let codec = WireCodec::new();

    for &users in &[1usize, 50, 500] {
        let raw = joined_channel_packet(users);
        group.throughput(Throughput::Bytes(raw.len() as u64));
        group.bench_function(format!("decode_joined_{users}_users"), |b| {
            b.iter(|| codec.decode(0x04, &raw[2..]).unwrap())
        });
    }

    group.bench_function("decode_whisper", |b| {
        b.iter(|| codec.decode(0x08, b"somebody\0hello there\0").unwrap())
    });

    group.bench_function("encode_channel_message", |b| {
        b.iter_batched(
            || ClientMessage::ChannelMessage {
                message: "hello channel".into(),
                channel_id: 7,
            },
            |message| {
                let mut buf = BytesMut::with_capacity(64);
                PacketCodec.encode(message, &mut buf).unwrap();
                buf
            },
            BatchSize::SmallInput,
        )
    });

    group.bench_function("encode_prebuilt_frame", |b| {
        let frame: Bytes = WireCodec::encode(&ClientMessage::Pong).freeze();
        b.iter(|| {
            let mut buf = BytesMut::with_capacity(8);
            PacketCodec.encode(frame.clone(), &mut buf).unwrap();
            buf
        })
    });

    group.finish();
}

criterion_group!(benches, bench_codec);
criterion_main!(benches);
