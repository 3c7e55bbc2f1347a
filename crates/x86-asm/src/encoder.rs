//! ModR/M, SIB, REX and displacement encoder.
//!
//! Given an encoding scheme and operands that already matched its shapes,
//! computes the byte-level fields of the instruction. Prefix policy and
//! opcode bytes belong to the dispatcher in [`crate::builder`].

use alloc::vec::Vec;

use crate::error::EncodingError;
use crate::ir::{Expr, TargetMode, Width};
use crate::operand::{ImmValue, Immediate, Memory, Operand, OperandKind};
use crate::register::{Register, RexRequirement};
use crate::shape::Shape;
use crate::table::{OpEn, Scheme};

/// Architectural limit on instruction length.
pub const MAX_INSTRUCTION_LEN: usize = 15;

// ─── REX ────────────────────────────────────────────────────────────────────

/// Request for one REX bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RexBit {
    /// Nothing to say about REX.
    #[default]
    NotApplicable,
    /// A REX byte must not be present.
    Unencodable,
    /// REX must be present with this bit clear.
    False,
    /// REX must be present with this bit set.
    True,
}

impl RexBit {
    /// Request contributed by a register in a ModR/M, SIB or opcode field.
    pub fn for_register(reg: Register) -> RexBit {
        match reg.rex() {
            RexRequirement::NotApplicable => RexBit::NotApplicable,
            RexRequirement::Unencodable => RexBit::Unencodable,
            RexRequirement::RequiresClearRexB => RexBit::False,
            RexRequirement::RequiresSetRexB => RexBit::True,
        }
    }

    fn demands_rex(self) -> bool {
        matches!(self, RexBit::False | RexBit::True)
    }
}

/// The four independent REX bit requests of one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RexRequest {
    /// Operand-size bit.
    pub w: RexBit,
    /// ModR/M.reg extension.
    pub r: RexBit,
    /// SIB.index extension.
    pub x: RexBit,
    /// ModR/M.rm, SIB.base or opcode register extension.
    pub b: RexBit,
}

impl RexRequest {
    /// Combine the four requests into a REX byte, no REX byte, or a
    /// conflict.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError::RexConflict`] when one field forbids REX
    /// while another requires it.
    pub fn compose(self) -> Result<Option<u8>, EncodingError> {
        let bits = [self.w, self.r, self.x, self.b];
        if !bits.iter().any(|b| b.demands_rex()) {
            return Ok(None);
        }
        if bits.contains(&RexBit::Unencodable) {
            return Err(EncodingError::RexConflict);
        }
        let mut val = 0x40;
        if self.w == RexBit::True {
            val |= 0x08;
        }
        if self.r == RexBit::True {
            val |= 0x04;
        }
        if self.x == RexBit::True {
            val |= 0x02;
        }
        if self.b == RexBit::True {
            val |= 0x01;
        }
        Ok(Some(val))
    }
}

// ─── Fields ─────────────────────────────────────────────────────────────────

/// A displacement, immediate or branch-target field.
///
/// `size == 0` means the field is absent. A field with `deferred` set holds
/// zero bytes until the linker patches it; its size never changes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Field {
    /// Width in bytes (0, 1, 2, 4 or 8).
    pub size: u8,
    /// Resolved value, truncated to `size` when written.
    pub value: i64,
    /// Expression to resolve at link time.
    pub deferred: Option<Expr>,
    /// Resolved value is relative to the end of the instruction.
    pub pc_relative: bool,
    /// The CPU sign-extends the field, so only the signed range is valid.
    pub signed: bool,
}

impl Field {
    /// Field with a known value.
    pub fn fixed(size: u8, value: i64) -> Self {
        Self {
            size,
            value,
            deferred: None,
            pc_relative: false,
            signed: false,
        }
    }

    /// Field patched later.
    pub fn deferred(size: u8, expr: Expr, pc_relative: bool) -> Self {
        Self {
            size,
            value: 0,
            deferred: Some(expr),
            pc_relative,
            signed: pc_relative,
        }
    }

    /// Field holding an immediate operand.
    pub fn from_immediate(size: u8, imm: &Immediate) -> Self {
        match &imm.value {
            ImmValue::Fixed(v) => Self::fixed(size, *v),
            ImmValue::Expr(d) => Self::deferred(size, d.expr.clone(), false),
        }
    }

    /// The field occupies bytes.
    pub fn is_present(&self) -> bool {
        self.size > 0
    }

    /// The value is still symbolic.
    pub fn is_deferred(&self) -> bool {
        self.deferred.is_some()
    }

    /// Append the little-endian value, truncated to the field width.
    pub fn write(&self, out: &mut Vec<u8>) {
        let bytes = self.value.to_le_bytes();
        out.extend_from_slice(&bytes[..self.size as usize]);
    }
}

/// Encoder output for one instruction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EncodedOperands {
    /// Register code added to the last opcode byte (O and OI forms).
    pub opcode_reg: Option<u8>,
    /// REX bit requests.
    pub rex: RexRequest,
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
    /// Effective address size of the memory operand, if any.
    pub address_size: Option<Width>,
}

// ─── Byte helpers ───────────────────────────────────────────────────────────

/// Build a ModR/M byte.
#[inline]
pub fn modrm(mod_: u8, reg: u8, rm: u8) -> u8 {
    (mod_ << 6) | ((reg & 7) << 3) | (rm & 7)
}

/// Build a SIB byte from an already-encoded scale field.
#[inline]
pub fn sib(ss: u8, index: u8, base: u8) -> u8 {
    (ss << 6) | ((index & 7) << 3) | (base & 7)
}

fn scale_bits(scale: i64) -> Result<u8, EncodingError> {
    match scale {
        1 => Ok(0),
        2 => Ok(1),
        4 => Ok(2),
        8 => Ok(3),
        _ => Err(EncodingError::IllegalScale { scale }),
    }
}

fn invalid(detail: &str) -> EncodingError {
    EncodingError::InvalidCombination {
        detail: alloc::string::String::from(detail),
    }
}

// ─── Operand encoding ───────────────────────────────────────────────────────

/// Compute the operand fields for `ops` under `scheme`.
///
/// `ext` is the `/digit` for M and MI forms; `force_w` requests REX.W.
///
/// # Errors
///
/// Returns an [`EncodingError`] for structural problems: illegal scale,
/// RIP with an index, ESP/RSP as index, displacements out of range,
/// address sizes the mode cannot express, or operands missing for a role.
pub fn encode_operands(
    scheme: &Scheme,
    ext: Option<u8>,
    force_w: bool,
    ops: &[Operand],
    mode: TargetMode,
) -> Result<EncodedOperands, EncodingError> {
    if scheme.shapes.len() != ops.len() {
        return Err(invalid("operand count does not match the encoding"));
    }

    let mut out = EncodedOperands::default();
    if force_w {
        out.rex.w = RexBit::True;
    }

    // A segment register always takes ModR/M.reg, pushing a general
    // register into r/m.
    let has_sreg = scheme.shapes.contains(&Shape::Sreg);
    let mut reg_op = None;
    let mut rm_op = None;
    for (&shape, op) in scheme.shapes.iter().zip(ops) {
        match shape {
            Shape::Sreg => reg_op = Some(op),
            Shape::Reg(_) if has_sreg => rm_op = Some(op),
            Shape::Reg(_) => reg_op = Some(op),
            s if s.is_rm() => rm_op = Some(op),
            Shape::Imm(w) | Shape::ImmSx(w) => {
                let imm = op
                    .as_immediate()
                    .ok_or_else(|| invalid("expected an immediate"))?;
                out.imm = Field::from_immediate(w.bytes(), imm);
                out.imm.signed = matches!(shape, Shape::ImmSx(_));
            }
            Shape::Rel(w) => {
                let imm = op
                    .as_immediate()
                    .ok_or_else(|| invalid("expected a branch target"))?;
                let target = match &imm.value {
                    ImmValue::Fixed(v) => Expr::Int(*v),
                    ImmValue::Expr(d) => d.expr.clone(),
                };
                out.rel = Field::deferred(w.bytes(), target, true);
            }
            _ => {}
        }
    }

    let reg_of = |op: Option<&Operand>| {
        op.and_then(Operand::as_register)
            .ok_or_else(|| invalid("expected a register operand"))
    };

    match scheme.op_en {
        OpEn::NP | OpEn::I | OpEn::D => {}
        OpEn::O | OpEn::OI => {
            let reg = reg_of(reg_op)?;
            out.opcode_reg = Some(reg.code());
            out.rex.b = RexBit::for_register(reg);
        }
        OpEn::M | OpEn::MI => {
            let digit = ext.ok_or_else(|| invalid("missing opcode extension"))?;
            let rm = rm_op.ok_or_else(|| invalid("missing r/m operand"))?;
            encode_rm(&mut out, digit, rm, mode)?;
        }
        OpEn::MR | OpEn::RM | OpEn::RMI => {
            let reg = reg_of(reg_op)?;
            let rm = rm_op.ok_or_else(|| invalid("missing r/m operand"))?;
            out.rex.r = RexBit::for_register(reg);
            encode_rm(&mut out, reg.code(), rm, mode)?;
        }
    }
    Ok(out)
}

fn encode_rm(
    out: &mut EncodedOperands,
    reg_field: u8,
    op: &Operand,
    mode: TargetMode,
) -> Result<(), EncodingError> {
    match &op.kind {
        OperandKind::Register(r) => {
            out.modrm = Some(modrm(0b11, reg_field, r.code()));
            out.rex.b = RexBit::for_register(*r);
            Ok(())
        }
        OperandKind::Memory(mem) => encode_memory(out, reg_field, mem, mode),
        OperandKind::Immediate(_) => Err(invalid("immediate in r/m position")),
    }
}

/// Displacement as seen by the addressing-form rules.
enum Disp<'a> {
    None,
    Fixed(i64),
    Deferred(&'a Expr),
}

impl<'a> Disp<'a> {
    fn of(mem: &'a Memory) -> Self {
        match mem.disp.as_ref().map(|d| &d.value) {
            None => Disp::None,
            Some(ImmValue::Fixed(v)) => Disp::Fixed(*v),
            Some(ImmValue::Expr(d)) => Disp::Deferred(&d.expr),
        }
    }

    fn is_zero(&self) -> bool {
        matches!(self, Disp::None | Disp::Fixed(0))
    }

    /// Forced 32-bit displacement. With 32-bit addressing the unsigned
    /// range is accepted too, since the address wraps at 4 GiB.
    fn disp32(&self, address: Width, pc_relative: bool) -> Result<Field, EncodingError> {
        match *self {
            Disp::None => Ok(Field::fixed(4, 0)),
            Disp::Fixed(v) => {
                let ok = Width::Dword.fits_signed(v)
                    || (address == Width::Dword && Width::Dword.fits(v));
                if ok {
                    Ok(Field::fixed(4, v))
                } else {
                    Err(EncodingError::DisplacementRange { value: v })
                }
            }
            Disp::Deferred(e) => {
                let mut field = Field::deferred(4, e.clone(), pc_relative);
                field.signed |= address == Width::Qword;
                Ok(field)
            }
        }
    }

    fn disp16(&self) -> Result<Field, EncodingError> {
        match *self {
            Disp::None => Ok(Field::fixed(2, 0)),
            Disp::Fixed(v) if Width::Word.fits(v) => Ok(Field::fixed(2, v)),
            Disp::Fixed(v) => Err(EncodingError::DisplacementRange { value: v }),
            Disp::Deferred(e) => Ok(Field::deferred(2, e.clone(), false)),
        }
    }
}

fn encode_memory(
    out: &mut EncodedOperands,
    reg_field: u8,
    mem: &Memory,
    mode: TargetMode,
) -> Result<(), EncodingError> {
    let address = mem
        .address_size
        .or_else(|| mem.base.or(mem.index.map(|i| i.reg)).map(Register::width))
        .unwrap_or_else(|| mode.address_width());
    if let Some(base) = mem.base.filter(|r| r.width() != address) {
        return Err(EncodingError::InvalidBase { register: base });
    }
    if let Some(idx) = mem.index.filter(|i| i.reg.width() != address) {
        return Err(EncodingError::InvalidIndex { register: idx.reg });
    }
    out.address_size = Some(address);
    match address {
        Width::Word => encode_memory16(out, reg_field, mem, mode),
        Width::Qword if mode != TargetMode::O64 => Err(EncodingError::AddressSize {
            bits: 64,
            mode_bits: mode.bits(),
        }),
        Width::Dword | Width::Qword => encode_memory32(out, reg_field, mem, address, mode),
        Width::Byte => Err(EncodingError::AddressSize {
            bits: 8,
            mode_bits: mode.bits(),
        }),
    }
}

/// 32- and 64-bit addressing forms.
fn encode_memory32(
    out: &mut EncodedOperands,
    reg_field: u8,
    mem: &Memory,
    address: Width,
    mode: TargetMode,
) -> Result<(), EncodingError> {
    let disp = Disp::of(mem);

    let index = match mem.index {
        Some(idx) => {
            let ss = scale_bits(idx.scale)?;
            // Index code 4 without REX.X means "no index".
            if idx.reg.code() == 4 && !idx.reg.is_extended() {
                return Err(EncodingError::InvalidIndex { register: idx.reg });
            }
            out.rex.x = RexBit::for_register(idx.reg);
            Some((ss, idx.reg.code()))
        }
        None => None,
    };

    match mem.base {
        Some(base @ (Register::Rip | Register::Eip)) => {
            if index.is_some() {
                return Err(EncodingError::RipWithIndex);
            }
            if mode != TargetMode::O64 {
                return Err(EncodingError::InvalidBase { register: base });
            }
            out.modrm = Some(modrm(0b00, reg_field, 0b101));
            out.disp = disp.disp32(address, true)?;
        }
        None => {
            match index {
                Some((ss, idx)) => {
                    out.modrm = Some(modrm(0b00, reg_field, 0b100));
                    out.sib = Some(sib(ss, idx, 0b101));
                }
                // mod=00 rm=101 is RIP-relative in long mode.
                None if mode == TargetMode::O64 => {
                    out.modrm = Some(modrm(0b00, reg_field, 0b100));
                    out.sib = Some(sib(0, 0b100, 0b101));
                }
                None => out.modrm = Some(modrm(0b00, reg_field, 0b101)),
            }
            out.disp = disp.disp32(address, false)?;
        }
        Some(base) => {
            if !base.is_address_register() {
                return Err(EncodingError::InvalidBase { register: base });
            }
            out.rex.b = RexBit::for_register(base);
            let base_code = base.code();

            let (mod_bits, field) = match disp {
                _ if disp.is_zero() && base_code != 0b101 => (0b00, Field::default()),
                // mod=00 with base 101 means "no base".
                _ if disp.is_zero() => (0b01, Field::fixed(1, 0)),
                Disp::Fixed(v) if Width::Byte.fits_signed(v) => (0b01, Field::fixed(1, v)),
                _ => (0b10, disp.disp32(address, false)?),
            };

            if index.is_some() || base_code == 0b100 {
                let (ss, idx) = index.unwrap_or((0, 0b100));
                out.modrm = Some(modrm(mod_bits, reg_field, 0b100));
                out.sib = Some(sib(ss, idx, base_code));
            } else {
                out.modrm = Some(modrm(mod_bits, reg_field, base_code));
            }
            out.disp = field;
        }
    }
    Ok(())
}

/// 16-bit addressing: the fixed `[bx+si]` family table.
fn encode_memory16(
    out: &mut EncodedOperands,
    reg_field: u8,
    mem: &Memory,
    mode: TargetMode,
) -> Result<(), EncodingError> {
    if mode == TargetMode::O64 {
        return Err(EncodingError::AddressSize {
            bits: 16,
            mode_bits: 64,
        });
    }
    if let Some(idx) = mem.index {
        if idx.scale != 1 {
            return Err(EncodingError::IllegalScale { scale: idx.scale });
        }
    }

    let disp = Disp::of(mem);
    let index = mem.index.map(|i| i.reg);
    let rm = match rm16(mem.base, index) {
        Ok(rm) => rm,
        Err(register) => return Err(EncodingError::InvalidBase { register }),
    };

    let Some(rm) = rm else {
        out.modrm = Some(modrm(0b00, reg_field, 0b110));
        out.disp = disp.disp16()?;
        return Ok(());
    };

    let (mod_bits, field) = match disp {
        _ if disp.is_zero() && rm != 0b110 => (0b00, Field::default()),
        // mod=00 rm=110 is the bare disp16 form; [bp] needs a disp8.
        _ if disp.is_zero() => (0b01, Field::fixed(1, 0)),
        Disp::Fixed(v) if Width::Byte.fits_signed(v) => (0b01, Field::fixed(1, v)),
        _ => (0b10, disp.disp16()?),
    };
    out.modrm = Some(modrm(mod_bits, reg_field, rm));
    out.disp = field;
    Ok(())
}

/// R/M code of a 16-bit register combination; `Ok(None)` when there are no
/// registers, `Err` names a register the table cannot express.
fn rm16(base: Option<Register>, index: Option<Register>) -> Result<Option<u8>, Register> {
    use Register::{Bp, Bx, Di, Si};
    let rm = match (base, index) {
        (None, None) => return Ok(None),
        (Some(Bx), Some(Si)) | (Some(Si), Some(Bx)) => 0,
        (Some(Bx), Some(Di)) | (Some(Di), Some(Bx)) => 1,
        (Some(Bp), Some(Si)) | (Some(Si), Some(Bp)) => 2,
        (Some(Bp), Some(Di)) | (Some(Di), Some(Bp)) => 3,
        (Some(Si), None) | (None, Some(Si)) => 4,
        (Some(Di), None) | (None, Some(Di)) => 5,
        (Some(Bp), None) | (None, Some(Bp)) => 6,
        (Some(Bx), None) | (None, Some(Bx)) => 7,
        (Some(r), _) | (None, Some(r)) => return Err(r),
    };
    Ok(Some(rm))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Span;
    use crate::operand::Index;

    const MR32: Scheme = Scheme {
        name: "MR_rm32_r32",
        op_en: OpEn::MR,
        shapes: &[Shape::Rm(Width::Dword), Shape::Reg(Width::Dword)],
    };
    const MR64: Scheme = Scheme {
        name: "MR_rm64_r64",
        op_en: OpEn::MR,
        shapes: &[Shape::Rm(Width::Qword), Shape::Reg(Width::Qword)],
    };
    const RM32: Scheme = Scheme {
        name: "RM_r32_rm32",
        op_en: OpEn::RM,
        shapes: &[Shape::Reg(Width::Dword), Shape::Rm(Width::Dword)],
    };
    const MR8: Scheme = Scheme {
        name: "MR_rm8_r8",
        op_en: OpEn::MR,
        shapes: &[Shape::Rm(Width::Byte), Shape::Reg(Width::Byte)],
    };
    const OI32: Scheme = Scheme {
        name: "OI_r32_imm32",
        op_en: OpEn::OI,
        shapes: &[Shape::Reg(Width::Dword), Shape::Imm(Width::Dword)],
    };
    const M32: Scheme = Scheme {
        name: "M_rm32",
        op_en: OpEn::M,
        shapes: &[Shape::Rm(Width::Dword)],
    };
    const D32: Scheme = Scheme {
        name: "D_rel32",
        op_en: OpEn::D,
        shapes: &[Shape::Rel(Width::Dword)],
    };

    const MR_SREG: Scheme = Scheme {
        name: "MR_r32_sreg",
        op_en: OpEn::MR,
        shapes: &[Shape::Reg(Width::Dword), Shape::Sreg],
    };
    const RM_SREG: Scheme = Scheme {
        name: "RM_sreg_r32",
        op_en: OpEn::RM,
        shapes: &[Shape::Sreg, Shape::Reg(Width::Dword)],
    };

    fn reg(r: Register) -> Operand {
        Operand::register(r, Span::dummy())
    }

    fn mem(m: Memory) -> Operand {
        Operand::memory(m, None, Span::dummy())
    }

    fn base(r: Register, disp: Option<i64>) -> Memory {
        Memory {
            base: Some(r),
            disp: disp.map(Immediate::fixed),
            ..Memory::default()
        }
    }

    fn o64(scheme: &Scheme, ops: &[Operand]) -> Result<EncodedOperands, EncodingError> {
        encode_operands(scheme, None, false, ops, TargetMode::O64)
    }

    #[test]
    fn register_direct_without_rex() {
        let e = o64(&MR32, &[reg(Register::Eax), reg(Register::Ebx)]).unwrap();
        assert_eq!(e.modrm, Some(0xD8));
        assert_eq!(e.sib, None);
        assert_eq!(e.rex.compose(), Ok(None));
    }

    #[test]
    fn extended_registers_set_rex_bits() {
        let e = encode_operands(
            &MR64,
            None,
            true,
            &[reg(Register::R8), reg(Register::Rbx)],
            TargetMode::O64,
        )
        .unwrap();
        assert_eq!(e.modrm, Some(0xD8));
        assert_eq!(e.rex.compose(), Ok(Some(0x49)));

        let e = o64(&RM32, &[reg(Register::R8d), reg(Register::Ebx)]).unwrap();
        assert_eq!(e.rex.compose(), Ok(Some(0x44)));
    }

    #[test]
    fn rip_relative_forces_disp32() {
        let e = o64(&MR32, &[mem(base(Register::Rip, Some(4))), reg(Register::Eax)]).unwrap();
        assert_eq!(e.modrm, Some(0x05));
        assert_eq!(e.sib, None);
        assert_eq!(e.disp, Field::fixed(4, 4));
        assert_eq!(e.address_size, Some(Width::Qword));
    }

    #[test]
    fn rip_with_index_is_rejected() {
        let m = Memory {
            base: Some(Register::Rip),
            index: Some(Index {
                reg: Register::Rax,
                scale: 1,
            }),
            ..Memory::default()
        };
        let err = o64(&MR32, &[mem(m), reg(Register::Eax)]).unwrap_err();
        assert_eq!(err, EncodingError::RipWithIndex);
    }

    #[test]
    fn rsp_base_needs_sib() {
        let e = o64(&RM32, &[reg(Register::Eax), mem(base(Register::Rsp, None))]).unwrap();
        assert_eq!(e.modrm, Some(0x04));
        assert_eq!(e.sib, Some(0x24));
        assert!(!e.disp.is_present());

        let e = o64(&RM32, &[reg(Register::Eax), mem(base(Register::R12, None))]).unwrap();
        assert_eq!(e.sib, Some(0x24));
        assert_eq!(e.rex.compose(), Ok(Some(0x41)));
    }

    #[test]
    fn rbp_base_keeps_a_zero_disp8() {
        let e = o64(&RM32, &[reg(Register::Eax), mem(base(Register::Rbp, None))]).unwrap();
        assert_eq!(e.modrm, Some(0x45));
        assert_eq!(e.disp, Field::fixed(1, 0));

        let e = o64(&RM32, &[reg(Register::Eax), mem(base(Register::R13, Some(0)))]).unwrap();
        assert_eq!(e.modrm, Some(0x45));
        assert_eq!(e.disp, Field::fixed(1, 0));
        assert_eq!(e.rex.compose(), Ok(Some(0x41)));
    }

    #[test]
    fn displacement_sizing() {
        let e = o64(&RM32, &[reg(Register::Eax), mem(base(Register::Rbx, Some(-128)))]).unwrap();
        assert_eq!(e.modrm, Some(0x43));
        assert_eq!(e.disp, Field::fixed(1, -128));

        let e = o64(&RM32, &[reg(Register::Eax), mem(base(Register::Rbx, Some(128)))]).unwrap();
        assert_eq!(e.modrm, Some(0x83));
        assert_eq!(e.disp, Field::fixed(4, 128));

        let err = o64(
            &RM32,
            &[reg(Register::Eax), mem(base(Register::Rbx, Some(0x1_0000_0000)))],
        )
        .unwrap_err();
        assert_eq!(err, EncodingError::DisplacementRange { value: 0x1_0000_0000 });
    }

    #[test]
    fn index_without_base() {
        let m = Memory {
            index: Some(Index {
                reg: Register::Rax,
                scale: 4,
            }),
            disp: Some(Immediate::fixed(8)),
            ..Memory::default()
        };
        let e = o64(&RM32, &[reg(Register::Ecx), mem(m)]).unwrap();
        assert_eq!(e.modrm, Some(0x0C));
        assert_eq!(e.sib, Some(0x85));
        assert_eq!(e.disp, Field::fixed(4, 8));
    }

    #[test]
    fn absolute_address_per_mode() {
        let m = Memory {
            disp: Some(Immediate::fixed(0x1000)),
            ..Memory::default()
        };
        let ops = [reg(Register::Eax), mem(m)];
        let e = o64(&RM32, &ops).unwrap();
        assert_eq!((e.modrm, e.sib), (Some(0x04), Some(0x25)));

        let e = encode_operands(&RM32, None, false, &ops, TargetMode::O32).unwrap();
        assert_eq!((e.modrm, e.sib), (Some(0x05), None));
        assert_eq!(e.disp, Field::fixed(4, 0x1000));
    }

    #[test]
    fn scaled_index_and_extensions() {
        let m = Memory {
            base: Some(Register::Rbx),
            index: Some(Index {
                reg: Register::R12,
                scale: 2,
            }),
            ..Memory::default()
        };
        let e = o64(&RM32, &[reg(Register::Eax), mem(m)]).unwrap();
        assert_eq!(e.modrm, Some(0x04));
        assert_eq!(e.sib, Some(0x63));
        assert_eq!(e.rex.compose(), Ok(Some(0x42)));
    }

    #[test]
    fn rsp_index_and_bad_scale_are_rejected() {
        let mut m = Memory {
            base: Some(Register::Rbx),
            index: Some(Index {
                reg: Register::Rsp,
                scale: 1,
            }),
            ..Memory::default()
        };
        let err = o64(&RM32, &[reg(Register::Eax), mem(m.clone())]).unwrap_err();
        assert_eq!(
            err,
            EncodingError::InvalidIndex {
                register: Register::Rsp
            }
        );

        m.index = Some(Index {
            reg: Register::Rsi,
            scale: 3,
        });
        let err = o64(&RM32, &[reg(Register::Eax), mem(m)]).unwrap_err();
        assert_eq!(err, EncodingError::IllegalScale { scale: 3 });
    }

    #[test]
    fn deferred_displacement_reserves_disp32() {
        let m = Memory {
            base: Some(Register::Rbx),
            disp: Some(Immediate::deferred(Expr::var("near"), None)),
            ..Memory::default()
        };
        let e = o64(&RM32, &[reg(Register::Eax), mem(m)]).unwrap();
        assert_eq!(e.modrm, Some(0x83));
        assert_eq!(e.disp.size, 4);
        assert!(e.disp.is_deferred());
        assert!(!e.disp.pc_relative);

        let m = Memory {
            base: Some(Register::Rip),
            disp: Some(Immediate::deferred(Expr::var("data"), None)),
            ..Memory::default()
        };
        let e = o64(&RM32, &[reg(Register::Eax), mem(m)]).unwrap();
        assert_eq!(e.disp.size, 4);
        assert!(e.disp.pc_relative);
    }

    #[test]
    fn high_byte_registers_conflict_with_rex() {
        let err = o64(&MR8, &[reg(Register::Ah), reg(Register::R8b)])
            .unwrap()
            .rex
            .compose()
            .unwrap_err();
        assert_eq!(err, EncodingError::RexConflict);

        let e = o64(&MR8, &[reg(Register::Ah), reg(Register::Bl)]).unwrap();
        assert_eq!(e.rex.compose(), Ok(None));

        let e = o64(&MR8, &[reg(Register::Spl), reg(Register::Al)]).unwrap();
        assert_eq!(e.rex.compose(), Ok(Some(0x40)));

        let e = o64(&MR8, &[reg(Register::Ah), reg(Register::Sil)]).unwrap();
        assert_eq!(e.rex.compose(), Err(EncodingError::RexConflict));
    }

    #[test]
    fn opcode_register_form() {
        let ops = [reg(Register::R9d), Operand::immediate(Immediate::fixed(7), Span::dummy())];
        let e = o64(&OI32, &ops).unwrap();
        assert_eq!(e.opcode_reg, Some(1));
        assert_eq!(e.modrm, None);
        assert_eq!(e.imm, Field::fixed(4, 7));
        assert_eq!(e.rex.compose(), Ok(Some(0x41)));
    }

    #[test]
    fn digit_goes_to_reg_field() {
        let e = encode_operands(&M32, Some(4), false, &[reg(Register::Ecx)], TargetMode::O64)
            .unwrap();
        assert_eq!(e.modrm, Some(0xE1));
        assert!(encode_operands(&M32, None, false, &[reg(Register::Ecx)], TargetMode::O64).is_err());
    }

    #[test]
    fn branch_targets_are_pc_relative() {
        let target = Operand::immediate(Immediate::deferred(Expr::var("top"), None), Span::dummy());
        let e = o64(&D32, &[target]).unwrap();
        assert_eq!(e.rel.size, 4);
        assert!(e.rel.pc_relative);
        assert_eq!(e.rel.deferred, Some(Expr::var("top")));
    }

    #[test]
    fn segment_register_takes_the_reg_field() {
        let e = o64(&MR_SREG, &[reg(Register::Eax), reg(Register::Ds)]).unwrap();
        assert_eq!(e.modrm, Some(0xD8));
        assert_eq!(e.rex.compose(), Ok(None));

        let e = o64(&RM_SREG, &[reg(Register::Ds), reg(Register::Eax)]).unwrap();
        assert_eq!(e.modrm, Some(0xD8));

        let e = o64(&MR_SREG, &[reg(Register::R9d), reg(Register::Es)]).unwrap();
        assert_eq!(e.modrm, Some(0xC1));
        assert_eq!(e.rex.compose(), Ok(Some(0x41)));
    }

    #[test]
    fn address_registers_must_match_the_address_size() {
        let m = Memory {
            base: Some(Register::Rax),
            address_size: Some(Width::Dword),
            ..Memory::default()
        };
        let err = o64(&RM32, &[reg(Register::Eax), mem(m)]).unwrap_err();
        assert_eq!(err, EncodingError::InvalidBase { register: Register::Rax });

        let m = Memory {
            base: Some(Register::Rax),
            index: Some(Index {
                reg: Register::Ecx,
                scale: 2,
            }),
            ..Memory::default()
        };
        let err = o64(&RM32, &[reg(Register::Eax), mem(m)]).unwrap_err();
        assert_eq!(err, EncodingError::InvalidIndex { register: Register::Ecx });

        // Without a declared size the registers decide.
        let m = Memory {
            base: Some(Register::Ebx),
            ..Memory::default()
        };
        let e = o64(&RM32, &[reg(Register::Eax), mem(m)]).unwrap();
        assert_eq!(e.address_size, Some(Width::Dword));
    }

    #[test]
    fn sixteen_bit_addressing() {
        let m = Memory {
            base: Some(Register::Bx),
            index: Some(Index {
                reg: Register::Si,
                scale: 1,
            }),
            address_size: Some(Width::Word),
            ..Memory::default()
        };
        let ops = [reg(Register::Eax), mem(m)];
        let e = encode_operands(&RM32, None, false, &ops, TargetMode::O16).unwrap();
        assert_eq!(e.modrm, Some(0x00));
        assert_eq!(e.address_size, Some(Width::Word));

        let err = o64(&RM32, &ops).unwrap_err();
        assert_eq!(
            err,
            EncodingError::AddressSize {
                bits: 16,
                mode_bits: 64
            }
        );

        let e = encode_operands(
            &RM32,
            None,
            false,
            &[reg(Register::Eax), mem(base(Register::Bp, None))],
            TargetMode::O16,
        )
        .unwrap();
        assert_eq!(e.modrm, Some(0x46));
        assert_eq!(e.disp, Field::fixed(1, 0));

        let abs = Memory {
            disp: Some(Immediate::fixed(0x1234)),
            ..Memory::default()
        };
        let e = encode_operands(&RM32, None, false, &[reg(Register::Eax), mem(abs)], TargetMode::O16)
            .unwrap();
        assert_eq!(e.modrm, Some(0x06));
        assert_eq!(e.disp, Field::fixed(2, 0x1234));

        let bad = Memory {
            base: Some(Register::Ax),
            ..Memory::default()
        };
        let err = encode_operands(&RM32, None, false, &[reg(Register::Eax), mem(bad)], TargetMode::O16)
            .unwrap_err();
        assert_eq!(
            err,
            EncodingError::InvalidBase {
                register: Register::Ax
            }
        );
    }

    #[test]
    fn sixty_four_bit_addresses_need_long_mode() {
        let ops = [reg(Register::Eax), mem(base(Register::Rbx, None))];
        let m = Memory {
            base: Some(Register::Rbx),
            address_size: Some(Width::Qword),
            ..Memory::default()
        };
        assert!(o64(&RM32, &ops).is_ok());
        let err = encode_operands(&RM32, None, false, &[reg(Register::Eax), mem(m)], TargetMode::O32)
            .unwrap_err();
        assert_eq!(
            err,
            EncodingError::AddressSize {
                bits: 64,
                mode_bits: 32
            }
        );
    }

    #[test]
    fn field_write_truncates() {
        let mut buf = Vec::new();
        Field::fixed(1, -1).write(&mut buf);
        Field::fixed(2, 0x1234).write(&mut buf);
        Field::deferred(4, Expr::var("x"), false).write(&mut buf);
        assert_eq!(buf, alloc::vec![0xFF, 0x34, 0x12, 0, 0, 0, 0]);
    }
}
