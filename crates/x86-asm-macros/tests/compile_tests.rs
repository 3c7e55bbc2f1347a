//! Integration tests for the `x86_bytes!` and `x86_array!` proc-macros.

use x86_asm_macros::{x86_array, x86_bytes};

// ── Long mode ───────────────────────────────────────────────────────────────

#[test]
fn o64_nop() {
    const CODE: &[u8] = x86_bytes!(o64, "nop");
    assert_eq!(CODE, &[0x90]);
}

#[test]
fn o64_multi_instruction() {
    const CODE: &[u8] = x86_bytes!(o64, "xor eax, eax\ninc eax\nret");
    // xor eax,eax = 31 C0, inc eax = FF C0, ret = C3
    assert_eq!(CODE, &[0x31, 0xC0, 0xFF, 0xC0, 0xC3]);
}

#[test]
fn o64_semicolon_separator() {
    const CODE: &[u8] = x86_bytes!(o64, "nop; nop; ret");
    assert_eq!(CODE, &[0x90, 0x90, 0xC3]);
}

#[test]
fn o64_rex_forms() {
    const CODE: &[u8] = x86_bytes!(o64, "mov rbp, rsp\npush r12");
    assert_eq!(CODE, &[0x48, 0x89, 0xE5, 0x41, 0x54]);
}

#[test]
fn o64_with_label() {
    const CODE: &[u8] = x86_bytes!(
        o64,
        "
        start:
            nop
            jmp short start
    "
    );
    assert_eq!(CODE, &[0x90, 0xEB, 0xFD]);
}

#[test]
fn o64_with_base_address() {
    const CODE: &[u8] = x86_bytes!(o64, 0x1000, "call 0x2000");
    assert_eq!(CODE, &[0xE8, 0xFB, 0x0F, 0x00, 0x00]);
}

#[test]
fn base_address_with_separators_and_suffix() {
    const CODE: &[u8] = x86_bytes!(o64, 0x1_000u64, "call 0x2000");
    assert_eq!(CODE, &[0xE8, 0xFB, 0x0F, 0x00, 0x00]);
}

#[test]
fn decimal_base_address() {
    const CODE: &[u8] = x86_bytes!(o64, 4096, "nop");
    assert_eq!(CODE, &[0x90]);
}

// ── Legacy modes ────────────────────────────────────────────────────────────

#[test]
fn o32_short_inc() {
    const CODE: &[u8] = x86_bytes!(o32, "inc eax\npush eax");
    assert_eq!(CODE, &[0x40, 0x50]);
}

#[test]
fn o16_operand_size() {
    const CODE: &[u8] = x86_bytes!(o16, "mov ax, bx\nmov eax, ebx");
    assert_eq!(CODE, &[0x89, 0xD8, 0x66, 0x89, 0xD8]);
}

#[test]
fn o16_bx_si_addressing() {
    const CODE: [u8; 2] = x86_array!(o16, "mov ax, [bx + si]");
    assert_eq!(CODE, [0x8B, 0x00]);
}

// ── Arrays ──────────────────────────────────────────────────────────────────

#[test]
fn array_form() {
    const CODE: [u8; 1] = x86_array!(o64, "nop");
    assert_eq!(CODE, [0x90]);
}

#[test]
fn array_multi() {
    const CODE: [u8; 5] = x86_array!(o64, "xor eax, eax\ninc eax\nret");
    assert_eq!(CODE, [0x31, 0xC0, 0xFF, 0xC0, 0xC3]);
}

#[test]
fn empty_source_is_an_empty_array() {
    const CODE: [u8; 0] = x86_array!(o64, "# nothing here");
    assert_eq!(CODE.len(), 0);
}

// ── Literals and contexts ───────────────────────────────────────────────────

#[test]
fn raw_string() {
    const CODE: &[u8] = x86_bytes!(
        o64,
        r#"
        nop
        nop
        ret
    "#
    );
    assert_eq!(CODE, &[0x90, 0x90, 0xC3]);
}

#[test]
fn escaped_tab_and_trailing_comma() {
    const CODE: &[u8] = x86_bytes!(o64, "mov\teax, ebx\n", );
    assert_eq!(CODE, &[0x89, 0xD8]);
}

#[test]
fn const_in_static_context() {
    static BYTES: &[u8] = x86_bytes!(o64, "ret");
    assert_eq!(BYTES, &[0xC3]);
}

#[test]
fn array_in_static_context() {
    static BYTES: [u8; 1] = x86_array!(o64, "ret");
    assert_eq!(BYTES, [0xC3]);
}
