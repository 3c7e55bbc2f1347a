//! # x86-asm: x86 / x86-64 assembler front-end
//!
//! `x86-asm` turns Intel-syntax assembly text into machine-code bytes. The
//! core is an operand classification and encoding engine: evaluated
//! operands are matched against the shapes of each candidate encoding, and
//! the first match is encoded into legacy prefixes, REX, opcode, ModR/M,
//! SIB, displacement, immediate and relative-target fields.
//!
//! ## Quick Start
//!
//! ```rust
//! use x86_asm::{assemble, TargetMode};
//!
//! let code = assemble("mov eax, 1\nret", TargetMode::O64).unwrap();
//! assert_eq!(code, vec![0xB8, 0x01, 0x00, 0x00, 0x00, 0xC3]);
//! ```
//!
//! ## Features
//!
//! - **Three modes**: 16-, 32- and 64-bit targets, switchable with
//!   `.code16` / `.code32` / `.code64`.
//! - **Deferred fields**: symbolic displacements, immediates and branch
//!   targets get a fixed-size field at encode time and are patched after
//!   layout.
//! - **Error containment**: one bad statement does not stop the others;
//!   every error is reported with its source location.
//! - **`no_std` + `alloc`**: embeddable in firmware, kernels, WASM.

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]
// ── Pedantic lint policy ─────────────────────────────────────────────────
// An assembler performs many narrowing / sign-changing casts between integer
// widths and uses dense hex literals without separators.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_lossless,
    clippy::cast_possible_wrap,
    clippy::unreadable_literal,
    clippy::match_same_arms,
    clippy::redundant_closure_for_method_calls,
    clippy::wildcard_imports,
    clippy::enum_glob_use,
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::uninlined_format_args,
    clippy::doc_markdown,
    clippy::similar_names,
    clippy::too_many_lines,
    clippy::single_match_else,
    clippy::manual_let_else,
    clippy::return_self_not_must_use,
    clippy::missing_errors_doc
)]

extern crate alloc;

/// Public assembler API: builder pattern, one-shot assembly, and `AssemblyResult`.
pub mod assembler;
/// Instruction dispatcher and the encoded `Instruction` record.
pub mod builder;
/// Overflow-checked arithmetic and fallible container growth.
pub mod checked;
/// ModR/M, SIB, REX and displacement encoder.
pub mod encoder;
/// Error types and source-span diagnostics.
pub mod error;
/// Operand evaluator and label tables.
pub mod eval;
/// Syntax model: widths, modes, expressions, statements.
pub mod ir;
/// Zero-copy lexer (tokenizer) with span tracking.
pub mod lexer;
/// Sequential layout and patching of deferred fields.
pub mod linker;
/// Classified operands.
pub mod operand;
/// Intel-syntax parser producing IR statements.
pub mod parser;
/// Register catalog.
pub mod register;
/// Operand-shape matchers.
pub mod shape;
/// Declarative encoding table.
pub mod table;

// Re-exports
pub use assembler::{Assembler, AssemblyResult, Encoded, ResourceLimits};
pub use builder::{build_instruction, Instruction};
pub use encoder::{encode_operands, EncodedOperands};
pub use error::{AsmError, EncodingError, Span};
pub use eval::{Evaluator, LabelTable, SymbolTable};
pub use ir::{Expr, InstrStmt, OperandSyntax, Prefix, Statement, TargetMode, Width};
pub use operand::{Bounds, Immediate, Memory, Operand, OperandKind};
pub use register::{Register, RegisterClass, RexRequirement};
pub use shape::{
    fits_immediate_field, is_immediate, is_memory, is_register, is_register_or_memory,
    matches_scheme, Shape,
};

use alloc::vec::Vec;

/// Assemble a string of assembly into machine code bytes.
///
/// Semicolons or newlines separate instructions.
/// Labels are defined with a trailing colon: `loop:`
///
/// # Errors
///
/// Returns [`AsmError`] if the input contains syntax errors, unknown
/// mnemonics, invalid operand combinations, undefined labels, or any
/// other encoding issue. Several errors come back as
/// [`AsmError::Multiple`].
///
/// # Examples
///
/// ```rust
/// use x86_asm::{assemble, TargetMode};
///
/// let code = assemble("nop", TargetMode::O64).unwrap();
/// assert_eq!(code, vec![0x90]);
/// ```
pub fn assemble(source: &str, mode: TargetMode) -> Result<Vec<u8>, AsmError> {
    assemble_at(source, mode, 0)
}

/// Assemble with an explicit base virtual address.
///
/// # Errors
///
/// Returns [`AsmError`] on assembly failure (see [`assemble`] for details).
///
/// # Examples
///
/// ```rust
/// use x86_asm::{assemble_at, TargetMode};
///
/// let code = assemble_at("here: jmp here", TargetMode::O32, 0x1000).unwrap();
/// assert_eq!(code, vec![0xE9, 0xFB, 0xFF, 0xFF, 0xFF]);
/// ```
pub fn assemble_at(source: &str, mode: TargetMode, base_addr: u64) -> Result<Vec<u8>, AsmError> {
    let mut asm = Assembler::new(mode);
    asm.base_address(base_addr);
    asm.emit(source)?;
    let result = asm.finish()?;
    Ok(result.into_bytes())
}

/// Assemble with external labels pre-defined at known addresses.
///
/// # Errors
///
/// Returns [`AsmError`] on assembly failure (see [`assemble`] for details).
///
/// # Examples
///
/// ```rust
/// use x86_asm::{assemble_with, TargetMode};
///
/// let code = assemble_with("call exit", TargetMode::O64, 0x1000, &[("exit", 0x2000)]).unwrap();
/// assert_eq!(code, vec![0xE8, 0xFB, 0x0F, 0x00, 0x00]);
/// ```
pub fn assemble_with(
    source: &str,
    mode: TargetMode,
    base_addr: u64,
    external_labels: &[(&str, u64)],
) -> Result<Vec<u8>, AsmError> {
    let mut asm = Assembler::new(mode);
    asm.base_address(base_addr);
    for &(name, addr) in external_labels {
        asm.define_external(name, addr);
    }
    asm.emit(source)?;
    let result = asm.finish()?;
    Ok(result.into_bytes())
}
