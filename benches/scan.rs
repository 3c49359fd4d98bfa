use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;

use isaprobe::core::binary::Endianness;
use isaprobe::core::disassembler::Architecture;
use isaprobe::core::issues::IssueSink;
use isaprobe::core::section::CodeSection;
use isaprobe::core::seed::SeedGroup;
use isaprobe::disasm::for_arch;
use isaprobe::scan::{aggregate, GuidedScanner};

const BASE: u64 = 0x40_0000;
const STRIDE: usize = 16;

/// `count` 16-byte x86-64 functions, each calling the next:
/// vpaddd ymm0, ymm1, ymm2; paddd xmm0, xmm1; call +3; ret; nop; nop
fn chained_functions(count: usize) -> Vec<u8> {
    let body = [
        0xC5, 0xF5, 0xFE, 0xC2, 0x66, 0x0F, 0xFE, 0xC1, 0xE8, 0x03, 0x00, 0x00, 0x00, 0xC3, 0x90,
        0x90,
    ];
    body.iter().copied().cycle().take(count * STRIDE).collect()
}

fn bench_guided_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("guided_scan");
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let backend = for_arch(Architecture::X86_64, Endianness::Little).unwrap();

    for count in [256usize, 4096] {
        let section = CodeSection::new(".text", BASE, chained_functions(count));
        group.throughput(Throughput::Bytes(section.len()));

        // One seed: the call chain reaches every function.
        let chained: Vec<SeedGroup> = SeedGroup::new("entry point", [BASE]).into_iter().collect();
        group.bench_function(format!("call_chain_{count}"), |b| {
            b.iter(|| {
                let mut issues = IssueSink::default();
                let result = runtime.block_on(
                    GuidedScanner::new(&backend).run(
                        std::slice::from_ref(&section),
                        &chained,
                        &mut issues,
                    ),
                );
                black_box(aggregate(&result, &backend))
            })
        });

        // Every function seeded up front, as exported symbols would be.
        let exported: Vec<SeedGroup> = SeedGroup::new(
            "exported functions",
            (0..count).map(|i| BASE + (i * STRIDE) as u64),
        )
        .into_iter()
        .collect();
        group.bench_function(format!("all_seeded_{count}"), |b| {
            b.iter(|| {
                let mut issues = IssueSink::default();
                let result = runtime.block_on(
                    GuidedScanner::new(&backend).run(
                        std::slice::from_ref(&section),
                        &exported,
                        &mut issues,
                    ),
                );
                black_box(result.instruction_count)
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_guided_scan);
criterion_main!(benches);
