//! Benchmarks for the DNS message codec.
//!
//! Run with: cargo bench

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};

use sift::dns::{self, Header, Question};

fn create_dns_query(query_id: u16, domain: &str) -> Vec<u8> {
    let mut packet = Vec::with_capacity(512);

    // Header (12 bytes)
    packet.extend_from_slice(&query_id.to_be_bytes());
    packet.extend_from_slice(&[0x01, 0x00]); // Flags: standard query
    packet.extend_from_slice(&[0x00, 0x01]); // Questions: 1
    packet.extend_from_slice(&[0x00, 0x00]); // Answer RRs: 0
    packet.extend_from_slice(&[0x00, 0x00]); // Authority RRs: 0
    packet.extend_from_slice(&[0x00, 0x00]); // Additional RRs: 0

    // Question section
    for label in domain.split('.') {
        packet.push(label.len() as u8);
        packet.extend_from_slice(label.as_bytes());
    }
    packet.push(0x00); // Root label

    packet.extend_from_slice(&[0x00, 0x01]); // Type: A
    packet.extend_from_slice(&[0x00, 0x01]); // Class: IN

    packet
}

fn create_dns_response(query_id: u16, domain: &str) -> Vec<u8> {
    let mut packet = create_dns_query(query_id, domain);

    packet[2] = 0x81; // QR + RD
    packet[3] = 0x80; // RA
    packet[7] = 0x01; // Answer RRs: 1

    packet.extend_from_slice(&[0xC0, 0x0C]); // Name: pointer to question
    packet.extend_from_slice(&[0x00, 0x01]); // Type: A
    packet.extend_from_slice(&[0x00, 0x01]); // Class: IN
    packet.extend_from_slice(&[0x00, 0x00, 0x01, 0x2C]); // TTL: 300
    packet.extend_from_slice(&[0x00, 0x04]); // RDLENGTH
    packet.extend_from_slice(&[93, 184, 216, 34]);

    packet
}

fn bench_transaction_id(c: &mut Criterion) {
    let query = create_dns_query(0x1234, "example.com");

    c.bench_function("transaction_id", |b| {
        b.iter(|| dns::transaction_id(black_box(&query)))
    });
}

fn bench_decode_query(c: &mut Criterion) {
    let short = create_dns_query(0x1234, "example.com");
    let long = create_dns_query(0x1234, "subdomain.example.domain.com");

    c.bench_function("decode_query_short", |b| {
        b.iter(|| dns::decode_query(black_box(&short)))
    });

    c.bench_function("decode_query_long", |b| {
        b.iter(|| dns::decode_query(black_box(&long)))
    });
}

fn bench_decode_response(c: &mut Criterion) {
    let response = create_dns_response(0x1234, "example.com");

    c.bench_function("decode_response", |b| {
        b.iter(|| dns::decode_response(black_box(&response)))
    });
}

fn bench_encode(c: &mut Criterion) {
    let header = Header {
        id: 0x1234,
        flags: 0x0100,
        qdcount: 1,
        ancount: 0,
        nscount: 0,
        arcount: 0,
    };
    let question = Question {
        name: "example.com".to_string(),
        qtype: 1,
        qclass: 1,
    };

    c.bench_function("encode_query", |b| {
        b.iter(|| dns::encode(black_box(&header), black_box(Some(&question))))
    });

    c.bench_function("encode_header_only", |b| {
        b.iter(|| dns::encode(black_box(&header), None))
    });
}

fn bench_throughput(c: &mut Criterion) {
    let queries: Vec<Vec<u8>> = (0..1000u16)
        .map(|id| create_dns_query(id, "example.com"))
        .collect();

    let mut group = c.benchmark_group("throughput");
    group.throughput(Throughput::Elements(1000));

    group.bench_function("decode_rebuild_1000_queries", |b| {
        b.iter(|| {
            for query in &queries {
                let (header, questions) = dns::decode_query(query).unwrap();
                let rebuilt = dns::encode(&header, questions.first()).unwrap();
                black_box(rebuilt);
            }
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_transaction_id,
    bench_decode_query,
    bench_decode_response,
    bench_encode,
    bench_throughput,
);

criterion_main!(benches);
