#![no_main]
use libfuzzer_sys::fuzz_target;
use x86_asm::{Assembler, TargetMode};

fuzz_target!(|data: &str| {
    // Every mode must only ever return Ok/Err, never panic.
    for mode in [TargetMode::O16, TargetMode::O32, TargetMode::O64] {
        let _ = x86_asm::assemble(data, mode);
    }

    // Deferred fields near the top of the address space.
    let _ = x86_asm::assemble_at(data, TargetMode::O64, u64::MAX - 0x10);

    // Builder API with multiple emit calls (split on newlines).
    let mut asm = Assembler::new(TargetMode::O64);
    asm.define_external("ext", 0x1000);
    for line in data.lines() {
        if asm.emit(line).is_err() {
            return;
        }
    }
    let _ = asm.encode();
    let _ = asm.finish();
});
