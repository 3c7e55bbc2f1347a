//! Basic assembly example: the one-shot and builder APIs.
//!
//! Run with: `cargo run --example basic`

use x86_asm::{assemble, assemble_with, AsmError, Assembler, TargetMode};

fn main() {
    println!("=== x86_asm basic example ===\n");

    // --- One-shot assembly ---
    println!("1. One-shot assembly (mov eax, 42; ret):");
    let bytes = assemble("mov eax, 42\nret", TargetMode::O64).unwrap();
    print_hex("   ", &bytes);

    // --- Builder API ---
    println!("\n2. Builder API (function prologue/epilogue):");
    let mut asm = Assembler::new(TargetMode::O64);
    asm.base_address(0x40_1000).enable_listing();
    asm.emit(
        r#"
entry:
    push rbp
    mov rbp, rsp
    sub rsp, 0x20
    mov [rbp - 8], rdi
    lea rax, [rdi + rsi*4 + 8]
    xor eax, eax        # return 0
    leave
    ret
"#,
    )
    .unwrap();

    let result = asm.finish().unwrap();
    print_hex("   ", result.bytes());

    println!("\n   Labels:");
    for (name, addr) in result.labels() {
        println!("   {}: 0x{:X}", name, addr);
    }

    println!("\n   Listing:");
    for line in result.listing().lines() {
        println!("   {}", line);
    }

    // --- External symbols ---
    println!("\n3. External symbols (call into a known address):");
    let bytes = assemble_with(
        "mov edi, 1\ncall exit",
        TargetMode::O64,
        0x1000,
        &[("exit", 0x2000)],
    )
    .unwrap();
    print_hex("   ", &bytes);

    // --- Short and near branches ---
    println!("\n4. Branches (short on request, rel32 otherwise):");
    let bytes = assemble("top:\ndec ecx\njnz short top\njmp top", TargetMode::O64).unwrap();
    print_hex("   ", &bytes);

    // --- Diagnostics ---
    println!("\n5. Diagnostics (every bad statement is reported):");
    match assemble("mov eax, bx\nlea rax, [rsp*2]\nnop", TargetMode::O64) {
        Ok(_) => println!("   unexpected success"),
        Err(AsmError::Multiple { errors }) => {
            for e in errors {
                println!("   {}", e);
            }
        }
        Err(e) => println!("   {}", e),
    }

    println!("\n=== Done! ===");
}

fn print_hex(prefix: &str, bytes: &[u8]) {
    print!("{}", prefix);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 && i % 16 == 0 {
            println!();
            print!("{}", prefix);
        }
        print!("{:02X} ", b);
    }
    println!();
}
