use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use protowire::{Decoder, Encoder, Input, Output};

fn scalar_record(encoder: &mut Encoder<'_>) {
    encoder.write_u32(1, 150);
    encoder.write_s64(2, -123_456_789);
    encoder.write_double(3, 2.718281828459045);
    encoder.write_bool(4, true);
    encoder.write_string(5, "telemetry/device-42");
    encoder.write_fixed64(6, u64::MAX);
}

fn encode_scalars(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    let mut encoder = Encoder::new();
    scalar_record(&mut encoder);
    group.throughput(Throughput::Bytes(encoder.size() as u64));
    group.bench_function("scalars", |b| {
        let mut encoder = Encoder::new();
        b.iter(|| {
            encoder.clear();
            scalar_record(&mut encoder);
            black_box(encoder.size())
        })
    });
    group.finish();
}

fn encode_spliced_bytes(c: &mut Criterion) {
    let payload = vec![0xA5u8; 64 * 1024];
    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Bytes(payload.len() as u64));
    group.bench_function("spliced_bytes", |b| {
        b.iter(|| {
            let mut encoder = Encoder::new();
            encoder.write_bytes(1, &payload);
            black_box(encoder.size())
        })
    });
    group.finish();
}

fn encode_nested_messages(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    group.bench_function("nested_messages", |b| {
        let mut encoder = Encoder::new();
        b.iter(|| {
            encoder.clear();
            for field in 1..32 {
                encoder.write_message(field, |w| {
                    w.write_u32(1, field);
                    w.write_string(2, "abcdefghijklmnopqrstuvwxyz");
                });
            }
            black_box(encoder.size())
        })
    });
    group.finish();
}

fn decode_scalars(c: &mut Criterion) {
    let mut encoder = Encoder::new();
    scalar_record(&mut encoder);
    let bytes = encoder.to_bytes();
    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.bench_function("scalars", |b| {
        b.iter(|| {
            let mut decoder = Decoder::new(&bytes);
            while decoder.read_field_number().unwrap() != 0 {
                decoder.handle_unknown_field().unwrap();
            }
        })
    });
    group.finish();
}

fn decode_packed_doubles(c: &mut Criterion) {
    let values: Vec<f64> = (0..1024).map(|i| i as f64 * 0.5).collect();
    let mut encoder = Encoder::new();
    encoder.write_list(1, values.iter().copied(), |w, v| w.write_double_packed(v));
    let bytes = encoder.to_bytes();
    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.bench_function("packed_doubles", |b| {
        b.iter(|| {
            let mut decoder = Decoder::new(&bytes);
            decoder.read_field_number().unwrap();
            black_box(decoder.read_list(|d| d.read_double()).unwrap())
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    encode_scalars,
    encode_spliced_bytes,
    encode_nested_messages,
    decode_scalars,
    decode_packed_doubles
);
criterion_main!(benches);
