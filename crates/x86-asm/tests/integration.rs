//! End-to-end tests through the public API: source text in, bytes out.

use x86_asm::{
    assemble, assemble_at, assemble_with, AsmError, Assembler, EncodingError, ResourceLimits,
    TargetMode,
};

fn o64(source: &str) -> Vec<u8> {
    assemble(source, TargetMode::O64).unwrap()
}

fn o64_err(source: &str) -> AsmError {
    assemble(source, TargetMode::O64).unwrap_err()
}

// ============================================================================
// One-shot API
// ============================================================================

#[test]
fn one_shot_nop() {
    assert_eq!(o64("nop"), vec![0x90]);
}

#[test]
fn one_shot_empty_source() {
    assert!(o64("").is_empty());
    assert!(o64("# only a comment\n\n").is_empty());
    assert!(o64("; ;\n// still nothing").is_empty());
}

#[test]
fn one_shot_multiple_separators() {
    assert_eq!(o64("nop; nop\nret"), vec![0x90, 0x90, 0xC3]);
}

#[test]
fn one_shot_with_base_address() {
    let code = assemble_at("here: jmp here", TargetMode::O64, 0x40_0000).unwrap();
    assert_eq!(code, vec![0xE9, 0xFB, 0xFF, 0xFF, 0xFF]);
}

#[test]
fn one_shot_with_externals() {
    let code = assemble_with("call exit", TargetMode::O64, 0x1000, &[("exit", 0x2000)]).unwrap();
    assert_eq!(code, vec![0xE8, 0xFB, 0x0F, 0x00, 0x00]);
}

// ============================================================================
// Register forms
// ============================================================================

#[test]
fn register_to_register() {
    assert_eq!(o64("mov eax, ebx"), vec![0x89, 0xD8]);
    assert_eq!(o64("mov rax, rbx"), vec![0x48, 0x89, 0xD8]);
    assert_eq!(o64("mov rdi, r12"), vec![0x4C, 0x89, 0xE7]);
    assert_eq!(o64("xor eax, eax"), vec![0x31, 0xC0]);
}

#[test]
fn uniform_byte_registers_need_rex() {
    assert_eq!(o64("mov sil, al"), vec![0x40, 0x88, 0xC6]);
    assert_eq!(o64("mov al, bl"), vec![0x88, 0xD8]);
}

#[test]
fn high_byte_and_rex_do_not_mix() {
    let err = o64_err("mov ah, r8b");
    assert!(matches!(
        err,
        AsmError::Encoding {
            error: EncodingError::RexConflict,
            ..
        }
    ));
}

// ============================================================================
// Memory forms
// ============================================================================

#[test]
fn stack_pointer_base_needs_sib() {
    assert_eq!(o64("mov eax, [rsp]"), vec![0x8B, 0x04, 0x24]);
    assert_eq!(o64("mov eax, [r12]"), vec![0x41, 0x8B, 0x04, 0x24]);
}

#[test]
fn frame_pointer_base_needs_disp8() {
    assert_eq!(o64("mov eax, [rbp]"), vec![0x8B, 0x45, 0x00]);
    assert_eq!(o64("mov eax, [r13]"), vec![0x41, 0x8B, 0x45, 0x00]);
}

#[test]
fn displacement_sizing() {
    assert_eq!(o64("mov eax, [rax - 0x80]"), vec![0x8B, 0x40, 0x80]);
    assert_eq!(
        o64("mov eax, [rax + 0x80]"),
        vec![0x8B, 0x80, 0x80, 0x00, 0x00, 0x00]
    );
}

#[test]
fn scaled_index() {
    assert_eq!(
        o64("lea rax, [rbx + rcx*4 + 8]"),
        vec![0x48, 0x8D, 0x44, 0x8B, 0x08]
    );
    assert_eq!(
        o64("mov eax, [rcx*8]"),
        vec![0x8B, 0x04, 0xCD, 0x00, 0x00, 0x00, 0x00]
    );
}

#[test]
fn rip_relative() {
    assert_eq!(o64("mov eax, [rip + 0x10]"), vec![0x8B, 0x05, 0x10, 0, 0, 0]);
    // The displacement is measured from the end of the 6-byte load.
    assert_eq!(
        o64("mov eax, [rip + data]\ndata: nop"),
        vec![0x8B, 0x05, 0x00, 0x00, 0x00, 0x00, 0x90]
    );
}

#[test]
fn stack_pointer_cannot_be_an_index() {
    let err = o64_err("lea rax, [rbx + rsp*2]");
    assert!(matches!(
        err,
        AsmError::Encoding {
            error: EncodingError::InvalidIndex { .. },
            ..
        }
    ));
}

#[test]
fn segment_override() {
    assert_eq!(
        o64("mov rax, fs:[0x28]"),
        vec![0x64, 0x48, 0x8B, 0x04, 0x25, 0x28, 0, 0, 0]
    );
}

// ============================================================================
// Immediates
// ============================================================================

#[test]
fn narrowest_immediate_wins() {
    assert_eq!(o64("add eax, 1"), vec![0x83, 0xC0, 0x01]);
    assert_eq!(o64("add eax, 0x1000"), vec![0x05, 0x00, 0x10, 0x00, 0x00]);
    assert_eq!(
        o64("mov rax, 0x1122334455667788"),
        vec![0x48, 0xB8, 0x88, 0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11]
    );
}

#[test]
fn immediate_arithmetic() {
    assert_eq!(o64("mov eax, 2 + 3 * 4"), vec![0xB8, 0x0E, 0x00, 0x00, 0x00]);
    assert_eq!(o64("add eax, (32 - 2) / 2"), vec![0x83, 0xC0, 0x0F]);
}

#[test]
fn division_by_zero_is_reported() {
    assert!(matches!(o64_err("mov eax, 1 / 0"), AsmError::OperandEvaluation { .. }));
}

#[test]
fn unsized_memory_immediate_is_rejected() {
    assert!(matches!(o64_err("mov [rax], 5"), AsmError::NoMatchingEncoding { .. }));
    assert_eq!(o64("mov dword [rax], 5"), vec![0xC7, 0x00, 0x05, 0, 0, 0]);
}

// ============================================================================
// Branches and labels
// ============================================================================

#[test]
fn forward_call() {
    assert_eq!(
        o64("call f\nret\nf: ret"),
        vec![0xE8, 0x01, 0x00, 0x00, 0x00, 0xC3, 0xC3]
    );
}

#[test]
fn short_jump_over_instruction() {
    assert_eq!(o64("jmp short skip\nnop\nskip: ret"), vec![0xEB, 0x01, 0x90, 0xC3]);
}

#[test]
fn backward_loop() {
    let src = "mov ecx, 10\ntop:\ndec ecx\njnz top\nret";
    assert_eq!(
        o64(src),
        vec![0xB9, 0x0A, 0, 0, 0, 0xFF, 0xC9, 0x0F, 0x85, 0xF8, 0xFF, 0xFF, 0xFF, 0xC3]
    );
}

#[test]
fn short_branch_out_of_range() {
    let mut src = String::from("top:\n");
    for _ in 0..200 {
        src.push_str("nop\n");
    }
    src.push_str("jmp short top\n");
    assert!(matches!(o64_err(&src), AsmError::BranchOutOfRange { .. }));
}

#[test]
fn undefined_label() {
    match o64_err("jmp nowhere") {
        AsmError::OperandEvaluation { detail, .. } => assert!(detail.contains("nowhere")),
        other => panic!("unexpected: {:?}", other),
    }
    match o64_err("mov eax, [nowhere]") {
        AsmError::UndefinedLabel { label, .. } => assert_eq!(label, "nowhere"),
        other => panic!("unexpected: {:?}", other),
    }
}

#[test]
fn duplicate_label() {
    assert!(matches!(o64_err("a: nop\na: nop"), AsmError::DuplicateLabel { .. }));
}

// ============================================================================
// Modes
// ============================================================================

#[test]
fn operand_size_prefix_depends_on_mode() {
    assert_eq!(assemble("mov ax, bx", TargetMode::O64).unwrap(), vec![0x66, 0x89, 0xD8]);
    assert_eq!(assemble("mov ax, bx", TargetMode::O16).unwrap(), vec![0x89, 0xD8]);
    assert_eq!(
        assemble("mov eax, ebx", TargetMode::O16).unwrap(),
        vec![0x66, 0x89, 0xD8]
    );
}

#[test]
fn absolute_address_per_mode() {
    assert_eq!(
        assemble("mov eax, [0x1000]", TargetMode::O32).unwrap(),
        vec![0x8B, 0x05, 0x00, 0x10, 0x00, 0x00]
    );
    assert_eq!(
        assemble("mov eax, [0x1000]", TargetMode::O64).unwrap(),
        vec![0x8B, 0x04, 0x25, 0x00, 0x10, 0x00, 0x00]
    );
}

#[test]
fn sixteen_bit_addressing() {
    assert_eq!(assemble("mov ax, [bx + si]", TargetMode::O16).unwrap(), vec![0x8B, 0x00]);
    assert_eq!(assemble("mov ax, [bp]", TargetMode::O16).unwrap(), vec![0x8B, 0x46, 0x00]);
}

#[test]
fn long_mode_only_features() {
    let err = assemble("mov rax, rbx", TargetMode::O32).unwrap_err();
    assert!(matches!(
        err,
        AsmError::Encoding {
            error: EncodingError::OperandSize { bits: 64, mode_bits: 32 },
            ..
        }
    ));
    let err = assemble("mov sil, al", TargetMode::O32).unwrap_err();
    assert!(matches!(
        err,
        AsmError::Encoding {
            error: EncodingError::RexOutsideLongMode,
            ..
        }
    ));
}

#[test]
fn mode_directives() {
    assert_eq!(
        o64(".code32\nmov eax, ebx\n.code16\nmov eax, ebx\n.code64\nmov rax, rbx"),
        vec![0x89, 0xD8, 0x66, 0x89, 0xD8, 0x48, 0x89, 0xD8]
    );
}

// ============================================================================
// Builder API
// ============================================================================

#[test]
fn builder_collects_labels() {
    let mut asm = Assembler::new(TargetMode::O64);
    asm.base_address(0x1000);
    asm.emit("entry: push rbp\nmov rbp, rsp\nbody: pop rbp\nret").unwrap();
    let result = asm.finish().unwrap();
    assert_eq!(result.base_address(), 0x1000);
    assert_eq!(result.label_address("entry"), Some(0x1000));
    assert_eq!(result.label_address("body"), Some(0x1004));
    assert_eq!(result.instructions().len(), 4);
    assert_eq!(result.len(), 6);
}

#[test]
fn builder_label_method() {
    let mut asm = Assembler::new(TargetMode::O64);
    asm.label("top").unwrap();
    asm.emit("nop\njmp short top").unwrap();
    assert_eq!(asm.finish().unwrap().bytes(), &[0x90, 0xEB, 0xFD]);
}

#[test]
fn builder_multiple_emits_share_labels() {
    let mut asm = Assembler::new(TargetMode::O64);
    asm.emit("jmp short done").unwrap();
    asm.emit("nop").unwrap();
    asm.emit("done: ret").unwrap();
    assert_eq!(asm.finish().unwrap().bytes(), &[0xEB, 0x01, 0x90, 0xC3]);
}

#[test]
fn listing_contains_source() {
    let mut asm = Assembler::new(TargetMode::O64);
    asm.enable_listing();
    asm.emit("start:\nmov eax, ebx").unwrap();
    let listing = asm.finish().unwrap().listing();
    assert!(listing.contains("start:"));
    assert!(listing.contains("89D8"));
    assert!(listing.contains("mov eax, ebx"));
}

#[test]
fn every_error_is_reported() {
    let err = o64_err("nop\nmov eax, bx\nbogus\nret");
    match err {
        AsmError::Multiple { errors } => {
            assert_eq!(errors.len(), 2);
            assert!(matches!(errors[0], AsmError::NoMatchingEncoding { .. }));
            assert!(matches!(errors[1], AsmError::UnknownMnemonic { .. }));
        }
        other => panic!("unexpected: {:?}", other),
    }
}

#[test]
fn error_spans_point_at_the_statement() {
    match o64_err("nop\n  bogus rax") {
        AsmError::UnknownMnemonic { span, .. } => {
            assert_eq!(span.line, 2);
            assert_eq!(span.col, 3);
        }
        other => panic!("unexpected: {:?}", other),
    }
}

#[test]
fn output_limit_is_fatal() {
    let mut asm = Assembler::new(TargetMode::O64);
    asm.limits(ResourceLimits {
        max_output_bytes: 4,
        ..ResourceLimits::default()
    });
    asm.emit("nop\nnop\nnop\nnop\nnop").unwrap();
    assert!(matches!(
        asm.finish(),
        Err(AsmError::ResourceLimitExceeded { .. })
    ));
}
