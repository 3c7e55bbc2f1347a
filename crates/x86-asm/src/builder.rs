//! Instruction dispatcher.
//!
//! [`build_instruction`] turns one parsed instruction statement into an
//! [`Instruction`] record: evaluate the operands, walk the mnemonic's
//! candidate encodings in table order, and merge legacy prefixes, REX,
//! opcode and the encoder's fields for the first candidate that encodes.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use log::{debug, trace};

use crate::checked;
use crate::encoder::{self, Field, MAX_INSTRUCTION_LEN};
use crate::error::{AsmError, EncodingError, Span};
use crate::eval::{Evaluator, SymbolTable};
use crate::ir::{InstrStmt, Prefix, TargetMode, Width};
use crate::operand::Operand;
use crate::register::Register;
use crate::shape::matches_scheme;
use crate::table::{self, Encoding};

// ─── Legacy prefixes ────────────────────────────────────────────────────────

/// Legacy prefix bytes of one instruction, one slot per group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LegacyPrefixes {
    /// Group 1: `lock`, `rep`, `repne`.
    pub group1: Option<u8>,
    /// Group 2: segment override or branch hint.
    pub group2: Option<u8>,
    /// Group 3: operand-size override (0x66).
    pub operand_size: bool,
    /// Group 4: address-size override (0x67).
    pub address_size: bool,
}

impl LegacyPrefixes {
    /// Number of prefix bytes.
    pub fn len(&self) -> usize {
        usize::from(self.group1.is_some())
            + usize::from(self.group2.is_some())
            + usize::from(self.operand_size)
            + usize::from(self.address_size)
    }

    /// No prefix bytes at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write(&self, out: &mut Vec<u8>) {
        if let Some(b) = self.group1 {
            out.push(b);
        }
        if let Some(b) = self.group2 {
            out.push(b);
        }
        if self.operand_size {
            out.push(0x66);
        }
        if self.address_size {
            out.push(0x67);
        }
    }

    fn claim(slot: &mut Option<u8>, group: u8, byte: u8) -> Result<(), EncodingError> {
        if slot.is_some() {
            return Err(EncodingError::PrefixCollision { group });
        }
        *slot = Some(byte);
        Ok(())
    }

    /// Collect group 1 and 2 prefixes from the statement's prefix keywords
    /// and any segment override on a memory operand.
    fn compose(prefixes: &[Prefix], ops: &[Operand]) -> Result<Self, EncodingError> {
        let mut out = Self::default();
        for p in prefixes {
            let slot = match p.group() {
                1 => &mut out.group1,
                _ => &mut out.group2,
            };
            Self::claim(slot, p.group(), p.byte())?;
        }
        for seg in ops.iter().filter_map(|op| op.as_memory()?.segment) {
            Self::claim(&mut out.group2, 2, segment_override(seg)?)?;
        }
        Ok(out)
    }
}

fn segment_override(seg: Register) -> Result<u8, EncodingError> {
    match seg {
        Register::Es => Ok(0x26),
        Register::Cs => Ok(0x2E),
        Register::Ss => Ok(0x36),
        Register::Ds => Ok(0x3E),
        Register::Fs => Ok(0x64),
        Register::Gs => Ok(0x65),
        _ => Err(EncodingError::InvalidCombination {
            detail: alloc::format!("'{}' is not a segment register", seg),
        }),
    }
}

// ─── Instruction record ─────────────────────────────────────────────────────

/// Which field of an instruction a fixup patches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FieldKind {
    /// Address displacement.
    Displacement,
    /// Immediate operand.
    Immediate,
    /// Relative branch target.
    Branch,
}

/// A deferred field of an [`Instruction`] and where it sits in its bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fixup<'a> {
    /// Byte offset from the start of the instruction.
    pub offset: usize,
    /// Which field.
    pub kind: FieldKind,
    /// The field itself.
    pub field: &'a Field,
}

/// One encoded instruction.
///
/// Field widths are final; the linker only fills in the values of deferred
/// fields.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Instruction {
    /// Legacy prefixes.
    pub prefixes: LegacyPrefixes,
    /// REX byte.
    pub rex: Option<u8>,
    /// Opcode bytes; only the first `opcode_len` are used.
    pub opcode: [u8; 3],
    /// Number of opcode bytes (1–3).
    pub opcode_len: u8,
    /// ModR/M byte.
    pub modrm: Option<u8>,
    /// SIB byte.
    pub sib: Option<u8>,
    /// Displacement.
    pub disp: Field,
    /// Immediate.
    pub imm: Field,
    /// Relative branch target.
    pub rel: Field,
    /// Source location of the statement.
    pub span: Span,
}

impl Instruction {
    /// The opcode bytes.
    pub fn opcode(&self) -> &[u8] {
        &self.opcode[..self.opcode_len as usize]
    }

    fn header_len(&self) -> usize {
        self.prefixes.len()
            + usize::from(self.rex.is_some())
            + self.opcode_len as usize
            + usize::from(self.modrm.is_some())
            + usize::from(self.sib.is_some())
    }

    /// Encoded length in bytes.
    pub fn len(&self) -> usize {
        self.header_len()
            + self.disp.size as usize
            + self.imm.size as usize
            + self.rel.size as usize
    }

    /// Always false: every instruction has an opcode.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Byte image. Deferred fields read as zero until patched.
    pub fn bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        self.prefixes.write(&mut out);
        if let Some(rex) = self.rex {
            out.push(rex);
        }
        out.extend_from_slice(self.opcode());
        if let Some(m) = self.modrm {
            out.push(m);
        }
        if let Some(s) = self.sib {
            out.push(s);
        }
        self.disp.write(&mut out);
        self.imm.write(&mut out);
        self.rel.write(&mut out);
        out
    }

    /// Deferred fields in byte order.
    pub fn fixups(&self) -> impl Iterator<Item = Fixup<'_>> {
        let disp_at = self.header_len();
        let imm_at = disp_at + self.disp.size as usize;
        let rel_at = imm_at + self.imm.size as usize;
        [
            (disp_at, FieldKind::Displacement, &self.disp),
            (imm_at, FieldKind::Immediate, &self.imm),
            (rel_at, FieldKind::Branch, &self.rel),
        ]
        .into_iter()
        .filter(|(_, _, field)| field.is_deferred())
        .map(|(offset, kind, field)| Fixup {
            offset,
            kind,
            field,
        })
    }

    /// Mutable access to a field, for patching.
    pub fn field_mut(&mut self, kind: FieldKind) -> &mut Field {
        match kind {
            FieldKind::Displacement => &mut self.disp,
            FieldKind::Immediate => &mut self.imm,
            FieldKind::Branch => &mut self.rel,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.bytes().iter() {
            write!(f, "{:02X}", b)?;
        }
        Ok(())
    }
}

// ─── Dispatch ───────────────────────────────────────────────────────────────

/// Encode one instruction statement and append the record to `out`.
///
/// Candidates are tried in table order; a candidate whose shapes match but
/// whose encoding fails structurally is skipped. When every shape-matching
/// candidate failed with the same structural error, that error is reported.
///
/// # Errors
///
/// [`AsmError::UnknownMnemonic`], [`AsmError::OperandEvaluation`],
/// [`AsmError::Encoding`], [`AsmError::NoMatchingEncoding`], or
/// [`AsmError::AllocationFailure`] when `out` cannot grow.
pub fn build_instruction(
    stmt: &InstrStmt,
    mode: TargetMode,
    symbols: &dyn SymbolTable,
    out: &mut Vec<Instruction>,
) -> Result<(), AsmError> {
    let span = stmt.span;
    let opcode = table::lookup(&stmt.mnemonic).ok_or_else(|| AsmError::UnknownMnemonic {
        mnemonic: stmt.mnemonic.clone(),
        span,
    })?;

    let ops = Evaluator::new(symbols).evaluate_all(&stmt.operands)?;
    let prefixes = LegacyPrefixes::compose(&stmt.prefixes, &ops)
        .map_err(|error| AsmError::Encoding { error, span })?;

    let mut failure: Option<EncodingError> = None;
    let mut consistent = true;
    for enc in opcode.encodings {
        if !enc.modes.contains(mode) {
            continue;
        }
        if !matches_scheme(enc.scheme.shapes, &ops) {
            trace!("{} {}: shapes do not match", stmt.mnemonic, enc.scheme.name);
            continue;
        }
        match encode_candidate(enc, &ops, prefixes, mode, span) {
            Ok(instr) => {
                debug!(
                    "{} {} -> {} ({} bytes)",
                    stmt.mnemonic,
                    enc.scheme.name,
                    instr,
                    instr.len()
                );
                return checked::try_push(out, instr);
            }
            Err(error) => {
                trace!("{} {}: {}", stmt.mnemonic, enc.scheme.name, error);
                match &failure {
                    Some(prev) if *prev != error => consistent = false,
                    Some(_) => {}
                    None => failure = Some(error),
                }
            }
        }
    }

    match failure {
        Some(error) if consistent => Err(AsmError::Encoding { error, span }),
        _ => Err(AsmError::NoMatchingEncoding {
            mnemonic: String::from(opcode.mnemonic),
            span,
        }),
    }
}

fn encode_candidate(
    enc: &Encoding,
    ops: &[Operand],
    mut prefixes: LegacyPrefixes,
    mode: TargetMode,
    span: Span,
) -> Result<Instruction, EncodingError> {
    let mut force_w = false;
    match enc.size {
        Some(Width::Word) => prefixes.operand_size = mode != TargetMode::O16,
        Some(Width::Dword) => prefixes.operand_size = mode == TargetMode::O16,
        Some(Width::Qword) if mode != TargetMode::O64 => {
            return Err(EncodingError::OperandSize {
                bits: 64,
                mode_bits: mode.bits(),
            });
        }
        Some(Width::Qword) => force_w = !enc.default64,
        Some(Width::Byte) | None => {}
    }

    let fields = encoder::encode_operands(&enc.scheme, enc.ext, force_w, ops, mode)?;

    if let Some(address) = fields.address_size {
        prefixes.address_size = address != mode.address_width();
    }

    let rex = fields.rex.compose()?;
    if rex.is_some() && mode != TargetMode::O64 {
        return Err(EncodingError::RexOutsideLongMode);
    }

    let mut opcode = [0u8; 3];
    opcode[..enc.opcode.len()].copy_from_slice(enc.opcode);
    if let Some(r) = fields.opcode_reg {
        opcode[enc.opcode.len() - 1] |= r;
    }

    let instr = Instruction {
        prefixes,
        rex,
        opcode,
        opcode_len: enc.opcode.len() as u8,
        modrm: fields.modrm,
        sib: fields.sib,
        disp: fields.disp,
        imm: fields.imm,
        rel: fields.rel,
        span,
    };
    let len = instr.len();
    if len > MAX_INSTRUCTION_LEN {
        return Err(EncodingError::TooLong { len });
    }
    Ok(instr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{LabelTable, NoSymbols};
    use crate::ir::Statement;
    use crate::operand::Bounds;
    use crate::parser::parse_str;

    fn stmt(src: &str) -> InstrStmt {
        match parse_str(src).unwrap().into_iter().next() {
            Some(Statement::Instruction(i)) => i,
            other => panic!("not an instruction: {:?}", other),
        }
    }

    fn build_in(src: &str, mode: TargetMode, symbols: &dyn SymbolTable) -> Result<Instruction, AsmError> {
        let mut out = Vec::new();
        build_instruction(&stmt(src), mode, symbols, &mut out)?;
        assert_eq!(out.len(), 1);
        Ok(out.remove(0))
    }

    fn bytes(src: &str, mode: TargetMode) -> Vec<u8> {
        build_in(src, mode, &NoSymbols).unwrap().bytes().to_vec()
    }

    fn o64(src: &str) -> Vec<u8> {
        bytes(src, TargetMode::O64)
    }

    #[test]
    fn register_moves() {
        assert_eq!(o64("mov eax, ebx"), [0x89, 0xD8]);
        assert_eq!(o64("mov rax, rbx"), [0x48, 0x89, 0xD8]);
        assert_eq!(o64("mov ax, bx"), [0x66, 0x89, 0xD8]);
        assert_eq!(o64("mov r8, rbx"), [0x49, 0x89, 0xD8]);
        assert_eq!(o64("mov al, bl"), [0x88, 0xD8]);
        assert_eq!(o64("mov sil, al"), [0x40, 0x88, 0xC6]);
    }

    #[test]
    fn immediates_choose_narrowest_row() {
        assert_eq!(o64("add eax, 1"), [0x83, 0xC0, 0x01]);
        assert_eq!(o64("add eax, 0x1000"), [0x05, 0x00, 0x10, 0x00, 0x00]);
        assert_eq!(o64("add ecx, 0x1000"), [0x81, 0xC1, 0x00, 0x10, 0x00, 0x00]);
        assert_eq!(o64("mov al, 0xFF"), [0xB0, 0xFF]);
        assert_eq!(o64("int 0x80"), [0xCD, 0x80]);
        assert_eq!(
            o64("mov rax, 0x1122334455667788"),
            [0x48, 0xB8, 0x88, 0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11]
        );
        assert_eq!(o64("mov rax, -1"), [0x48, 0xC7, 0xC0, 0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn memory_forms() {
        assert_eq!(o64("mov eax, [rsp]"), [0x8B, 0x04, 0x24]);
        assert_eq!(o64("mov eax, [rbp]"), [0x8B, 0x45, 0x00]);
        assert_eq!(o64("mov eax, [rip + 0x10]"), [0x8B, 0x05, 0x10, 0, 0, 0]);
        assert_eq!(o64("lea rax, [rbx + rcx*4 + 8]"), [0x48, 0x8D, 0x44, 0x8B, 0x08]);
        assert_eq!(o64("mov dword [rax], 5"), [0xC7, 0x00, 0x05, 0, 0, 0]);
        assert_eq!(o64("mov eax, [ebx]"), [0x67, 0x8B, 0x03]);
        assert_eq!(o64("mov rax, fs:[0x28]"), [0x64, 0x48, 0x8B, 0x04, 0x25, 0x28, 0, 0, 0]);
    }

    #[test]
    fn default_64_bit_operations() {
        assert_eq!(o64("push rbp"), [0x55]);
        assert_eq!(o64("push r12"), [0x41, 0x54]);
        assert_eq!(o64("pop rax"), [0x58]);
        assert_eq!(o64("push qword [rax]"), [0xFF, 0x30]);
        assert_eq!(o64("push [rax]"), [0xFF, 0x30]);
        assert_eq!(o64("ret"), [0xC3]);
    }

    #[test]
    fn legacy_modes() {
        assert_eq!(bytes("mov eax, ebx", TargetMode::O16), [0x66, 0x89, 0xD8]);
        assert_eq!(bytes("mov ax, bx", TargetMode::O16), [0x89, 0xD8]);
        assert_eq!(bytes("inc eax", TargetMode::O32), [0x40]);
        assert_eq!(bytes("mov ax, [bx + si]", TargetMode::O16), [0x8B, 0x00]);
        assert_eq!(bytes("mov ax, [bx + si]", TargetMode::O32), [0x66, 0x67, 0x8B, 0x00]);
    }

    #[test]
    fn qword_outside_long_mode_is_an_error() {
        let err = build_in("mov rax, rbx", TargetMode::O32, &NoSymbols).unwrap_err();
        assert!(matches!(
            err,
            AsmError::Encoding {
                error: EncodingError::OperandSize { bits: 64, mode_bits: 32 },
                ..
            }
        ));
    }

    #[test]
    fn rex_outside_long_mode() {
        let err = build_in("mov sil, al", TargetMode::O32, &NoSymbols).unwrap_err();
        assert!(matches!(
            err,
            AsmError::Encoding {
                error: EncodingError::RexOutsideLongMode,
                ..
            }
        ));
    }

    #[test]
    fn high_byte_with_rex_reports_conflict() {
        let err = build_in("mov ah, r8b", TargetMode::O64, &NoSymbols).unwrap_err();
        assert!(matches!(
            err,
            AsmError::Encoding {
                error: EncodingError::RexConflict,
                ..
            }
        ));
        assert_eq!(o64("mov ah, bl"), [0x88, 0xDC]);
    }

    #[test]
    fn prefixes() {
        assert_eq!(o64("lock add [rax], ecx"), [0xF0, 0x01, 0x08]);
        assert_eq!(o64("rep movsb"), [0xF3, 0xA4]);
        let err = build_in("lock rep movsb", TargetMode::O64, &NoSymbols).unwrap_err();
        assert!(matches!(
            err,
            AsmError::Encoding {
                error: EncodingError::PrefixCollision { group: 1 },
                ..
            }
        ));
    }

    #[test]
    fn unknown_and_unmatched() {
        let err = build_in("frobnicate eax", TargetMode::O64, &NoSymbols).unwrap_err();
        assert!(matches!(err, AsmError::UnknownMnemonic { .. }));

        let err = build_in("mov eax, bx", TargetMode::O64, &NoSymbols).unwrap_err();
        assert!(matches!(err, AsmError::NoMatchingEncoding { .. }));

        let err = build_in("mov [rax], 5", TargetMode::O64, &NoSymbols).unwrap_err();
        assert!(matches!(err, AsmError::NoMatchingEncoding { .. }));
    }

    #[test]
    fn deferred_fields_have_fixed_size() {
        let mut labels = LabelTable::new();
        labels.define("target", Bounds { min: 0x10, max: 0x100 });
        let jmp = build_in("jmp target", TargetMode::O64, &labels).unwrap();
        assert_eq!(jmp.len(), 5);
        assert_eq!(jmp.bytes(), alloc::vec![0xE9, 0, 0, 0, 0]);
        let fixups: Vec<_> = jmp.fixups().collect();
        assert_eq!(fixups.len(), 1);
        assert_eq!(fixups[0].offset, 1);
        assert_eq!(fixups[0].kind, FieldKind::Branch);
        assert!(fixups[0].field.pc_relative);

        let short = build_in("jmp short target", TargetMode::O64, &labels).unwrap();
        assert_eq!(short.len(), 2);

        let load = build_in("mov eax, [rip + target]", TargetMode::O64, &labels).unwrap();
        assert_eq!(load.len(), 6);
        let f: Vec<_> = load.fixups().collect();
        assert_eq!((f[0].offset, f[0].kind), (2, FieldKind::Displacement));
    }

    #[test]
    fn immediate_bounds_pick_the_field() {
        let mut labels = LabelTable::new();
        labels.define("small", Bounds { min: 1, max: 100 });
        let add = build_in("add eax, small", TargetMode::O64, &labels).unwrap();
        assert_eq!(add.len(), 3);
        assert_eq!(add.opcode(), [0x83]);

        let unknown = build_in("add ecx, [later]", TargetMode::O64, &labels).unwrap();
        assert_eq!(unknown.bytes(), alloc::vec![0x03, 0x0C, 0x25, 0, 0, 0, 0]);
    }

    #[test]
    fn display_is_hex() {
        let instr = build_in("mov eax, ebx", TargetMode::O64, &NoSymbols).unwrap();
        assert_eq!(alloc::format!("{}", instr), "89D8");
    }
}
