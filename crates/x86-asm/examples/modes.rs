//! Mode switching example: one source that starts in real mode and ends in
//! long mode, the way a boot stub does.
//!
//! Run with: `cargo run --example modes`

use x86_asm::{Assembler, TargetMode};

fn main() {
    println!("=== x86_asm mode switching example ===\n");

    let mut asm = Assembler::new(TargetMode::O16);
    asm.base_address(0x7C00).enable_listing();
    asm.emit(
        r#"
start:
    cli
    xor ax, ax
    mov ds, ax
    mov si, [bx + di + 2]
    mov eax, [0x7e00]
.code32
protected:
    mov eax, [esp + 4]
    push eax
    mov ax, [esi]
.code64
long:
    mov rax, [rsp + 8]
    mov r8d, [rip + protected]
    jmp start
"#,
    )
    .unwrap();

    let result = asm.finish().unwrap();
    print!("{}", result.listing());

    println!("\nThe same `mov` in each mode:");
    for mode in [TargetMode::O16, TargetMode::O32, TargetMode::O64] {
        let bytes = x86_asm::assemble("mov eax, ebx\nmov ax, bx", mode).unwrap();
        let hex: Vec<String> = bytes.iter().map(|b| format!("{:02X}", b)).collect();
        println!("   {:>2}-bit: {}", mode.bits(), hex.join(" "));
    }

    println!("\n=== Done! ===");
}
