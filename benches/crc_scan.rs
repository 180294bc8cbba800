// CLASSIFICATION: COMMUNITY
// Filename: crc_scan.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

use cohesix_fsi::crc4::{crc4_valid, seal};
use cohesix_fsi::scan::ConfigEntry;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn make_table() -> Vec<u32> {
    (0..255u32)
        .map(|i| ConfigEntry::engine((i % 0x1b) as u8 + 1, (i % 15) as u8, 1).encode())
        .collect()
}

fn bench_crc4(c: &mut Criterion) {
    c.bench_function("crc4_seal_validate", |b| {
        b.iter(|| {
            let mut ok = 0u32;
            for payload in 0..1024u32 {
                if crc4_valid(seal(black_box(payload << 8))) {
                    ok += 1;
                }
            }
            ok
        });
    });
}

fn bench_table_decode(c: &mut Criterion) {
    let table = make_table();
    c.bench_function("config_table_decode", |b| {
        b.iter(|| {
            table
                .iter()
                .filter_map(|w| ConfigEntry::decode(black_box(*w)).ok())
                .map(|e| e.size())
                .sum::<u32>()
        });
    });
}

criterion_group!(benches, bench_crc4, bench_table_decode);
criterion_main!(benches);
