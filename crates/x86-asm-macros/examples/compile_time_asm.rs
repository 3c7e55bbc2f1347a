//! Compile-time assembly with the `x86_bytes!` and `x86_array!` macros.
//!
//! These macros assemble instructions at compile time, producing
//! `&'static [u8]` or `[u8; N]` constants with zero runtime overhead.
//!
//! Run with: `cargo run --example compile_time_asm -p x86-asm-macros`

use x86_asm_macros::{x86_array, x86_bytes};

// ── Compile-time constants ──────────────────────────────────────────────

/// Function prologue.
const PROLOGUE: &[u8] = x86_bytes!(
    o64,
    "
    push rbp
    mov rbp, rsp
"
);

/// Function epilogue.
const EPILOGUE: [u8; 2] = x86_array!(o64, "leave\nret");

/// `exit(0)` through the Linux system call interface.
const EXIT: &[u8] = x86_bytes!(o64, "mov eax, 60\nxor edi, edi\nsyscall");

/// A counted loop with a short backward branch.
const LOOP_CODE: &[u8] = x86_bytes!(
    o64,
    "
    mov ecx, 10
top:
    dec ecx
    jnz short top
    ret
"
);

/// Real-mode boot sector stub, linked at 0x7c00.
const BOOT: &[u8] = x86_bytes!(
    o16,
    0x7c00,
    "
start:
    cli
    xor ax, ax
    mov ds, ax
    jmp short start
"
);

fn main() {
    println!("=== x86_asm_macros compile-time assembly ===\n");
    show("prologue", PROLOGUE);
    show("epilogue", &EPILOGUE);
    show("exit(0)", EXIT);
    show("loop", LOOP_CODE);
    show("boot stub", BOOT);
}

fn show(name: &str, bytes: &[u8]) {
    let hex: Vec<String> = bytes.iter().map(|b| format!("{:02X}", b)).collect();
    println!("{:>10} ({:2} bytes): {}", name, bytes.len(), hex.join(" "));
}
