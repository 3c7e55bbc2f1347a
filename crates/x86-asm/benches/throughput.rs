//! Performance benchmarks for `x86_asm`.
//!
//! Measures:
//! - Single instruction latency (per mode and addressing form)
//! - Multi-instruction throughput (bytes of source text per second)
//! - Label-heavy workloads with deferred fields
//! - Encoding alone versus encoding plus linking
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use x86_asm::{assemble, Assembler, TargetMode};

// ─── Single-Instruction Latency ──────────────────────────────────────────────

fn bench_single_instruction(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_instruction");

    let cases: &[(&str, &str, TargetMode)] = &[
        ("o64_nop", "nop", TargetMode::O64),
        ("o64_mov_reg_imm", "mov rax, 0x1234", TargetMode::O64),
        ("o64_add_reg_reg", "add rax, rbx", TargetMode::O64),
        ("o64_mov_mem_sib", "mov [rax + rcx*8 + 0x10], rdx", TargetMode::O64),
        ("o64_lea_rip", "lea rax, [rip + 0x1000]", TargetMode::O64),
        ("o64_cmov_alias", "cmovnge r9, [rsp + 8]", TargetMode::O64),
        ("o32_push", "push eax", TargetMode::O32),
        ("o16_bx_si", "mov ax, [bx + si + 4]", TargetMode::O16),
    ];
    for &(name, source, mode) in cases {
        group.bench_function(name, |b| b.iter(|| assemble(black_box(source), mode).unwrap()));
    }

    group.finish();
}

// ─── Multi-Instruction Throughput ─────────────────────────────────────────────

/// Generate a block of N register-only instructions.
fn gen_register_block(n: usize) -> String {
    let mut s = String::with_capacity(n * 20);
    for i in 0..n {
        match i % 6 {
            0 => s.push_str("mov rax, rbx\n"),
            1 => s.push_str("add rcx, rdx\n"),
            2 => s.push_str("sub rsi, rdi\n"),
            3 => s.push_str("xor r8, r9\n"),
            4 => s.push_str("and r10d, 0x7f\n"),
            5 => s.push_str("shl r12, 3\n"),
            _ => unreachable!(),
        }
    }
    s
}

/// Generate a block of N memory-operand instructions.
fn gen_memory_block(n: usize) -> String {
    let mut s = String::with_capacity(n * 32);
    for i in 0..n {
        match i % 5 {
            0 => s.push_str("mov eax, [rsp + 8]\n"),
            1 => s.push_str("mov [rbp - 0x40], rcx\n"),
            2 => s.push_str("lea rdx, [rbx + rsi*4 + 0x100]\n"),
            3 => s.push_str("add qword [r13], 1\n"),
            4 => s.push_str("cmp byte [rdi + r12], 0\n"),
            _ => unreachable!(),
        }
    }
    s
}

fn bench_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("throughput");

    for n in [100, 1000, 5000] {
        let src = gen_register_block(n);
        group.throughput(Throughput::Bytes(src.len() as u64));
        group.bench_function(format!("registers_{n}_insn"), |b| {
            b.iter(|| assemble(black_box(&src), TargetMode::O64).unwrap())
        });
    }

    let src = gen_memory_block(1000);
    group.throughput(Throughput::Bytes(src.len() as u64));
    group.bench_function("memory_1000_insn", |b| {
        b.iter(|| assemble(black_box(&src), TargetMode::O64).unwrap())
    });

    group.finish();
}

// ─── Label-Heavy Workloads ────────────────────────────────────────────────────

/// Generate code with many labels and forward/backward references.
fn gen_label_heavy(n_labels: usize) -> String {
    let mut s = String::with_capacity(n_labels * 40);
    for i in 0..n_labels {
        s.push_str(&format!("label_{i}:\n"));
        s.push_str("nop\n");
    }
    for i in 0..n_labels.min(50) {
        let target = (i + n_labels / 2) % n_labels;
        s.push_str(&format!("jmp label_{target}\n"));
        s.push_str(&format!("lea rax, [rip + label_{i}]\n"));
    }
    s
}

fn bench_labels(c: &mut Criterion) {
    let mut group = c.benchmark_group("labels");

    for n in [50, 200, 500] {
        let src = gen_label_heavy(n);
        group.bench_function(format!("{n}_labels"), |b| {
            b.iter(|| assemble(black_box(&src), TargetMode::O64).unwrap())
        });
    }

    group.finish();
}

// ─── Encode vs. Link ──────────────────────────────────────────────────────────

fn bench_encode_vs_finish(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_vs_finish");
    let src = gen_label_heavy(200);

    let mut asm = Assembler::new(TargetMode::O64);
    asm.emit(&src).unwrap();
    group.bench_function("encode_only", |b| b.iter(|| black_box(&asm).encode().unwrap()));

    group.bench_function("emit_and_finish", |b| {
        b.iter(|| {
            let mut asm = Assembler::new(TargetMode::O64);
            asm.emit(black_box(&src)).unwrap();
            asm.finish().unwrap()
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_single_instruction,
    bench_throughput,
    bench_labels,
    bench_encode_vs_finish,
);
criterion_main!(benches);
