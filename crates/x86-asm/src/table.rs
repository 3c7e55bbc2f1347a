//! Declarative encoding table.
//!
//! Each mnemonic maps to an ordered list of [`Encoding`]s. The dispatcher
//! tries them in order and the first one whose shapes match wins, so rows
//! with narrower immediates come before wider ones.

use crate::ir::TargetMode;
use crate::ir::Width::{self, Byte, Dword, Qword, Word};
use crate::register::Register;
use crate::shape::Shape::{self, *};

// ─── Types ──────────────────────────────────────────────────────────────────

/// Intel operand-encoding class: which operand lands in which field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(clippy::upper_case_acronyms)]
pub enum OpEn {
    /// No encoded operands.
    NP,
    /// Immediate only; register operands are implicit.
    I,
    /// Relative branch target.
    D,
    /// Register added to the last opcode byte.
    O,
    /// Register added to the opcode, plus an immediate.
    OI,
    /// ModR/M.rm with an opcode extension in ModR/M.reg.
    M,
    /// ModR/M.rm plus an immediate.
    MI,
    /// ModR/M.rm destination, ModR/M.reg source.
    MR,
    /// ModR/M.reg destination, ModR/M.rm source.
    RM,
    /// ModR/M.reg, ModR/M.rm and an immediate.
    RMI,
}

/// A named operand pattern with its encoding class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scheme {
    /// Table name, e.g. `MR_rm32_r32`.
    pub name: &'static str,
    /// Field assignment.
    pub op_en: OpEn,
    /// One shape per operand.
    pub shapes: &'static [Shape],
}

/// Set of target modes an encoding is valid in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Modes(u8);

impl Modes {
    /// 16-bit default mode only.
    pub const O16: Modes = Modes(0b001);
    /// 32-bit default mode only.
    pub const O32: Modes = Modes(0b010);
    /// 64-bit mode only.
    pub const O64: Modes = Modes(0b100);
    /// 16- and 32-bit modes.
    pub const LEGACY: Modes = Modes(0b011);
    /// 32- and 64-bit modes.
    pub const WIDE: Modes = Modes(0b110);
    /// Every mode.
    pub const ALL: Modes = Modes(0b111);

    /// True if `mode` is in the set.
    pub fn contains(self, mode: TargetMode) -> bool {
        let bit = match mode {
            TargetMode::O16 => 0b001,
            TargetMode::O32 => 0b010,
            TargetMode::O64 => 0b100,
        };
        self.0 & bit != 0
    }
}

/// One row of the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoding {
    /// Operand pattern.
    pub scheme: Scheme,
    /// Opcode bytes (1–3).
    pub opcode: &'static [u8],
    /// `/digit` placed in ModR/M.reg for M and MI forms.
    pub ext: Option<u8>,
    /// Operand size driving the 0x66 / REX.W policy; `None` for
    /// instructions whose size is fixed by the opcode.
    pub size: Option<Width>,
    /// 64-bit operand size is the default in long mode (no REX.W).
    pub default64: bool,
    /// Modes the row is valid in.
    pub modes: Modes,
}

impl Encoding {
    const fn new(
        name: &'static str,
        op_en: OpEn,
        shapes: &'static [Shape],
        opcode: &'static [u8],
        size: Option<Width>,
    ) -> Self {
        Self {
            scheme: Scheme {
                name,
                op_en,
                shapes,
            },
            opcode,
            ext: None,
            size,
            default64: false,
            modes: Modes::ALL,
        }
    }

    const fn digit(mut self, d: u8) -> Self {
        self.ext = Some(d);
        self
    }

    const fn d64(mut self) -> Self {
        self.default64 = true;
        self
    }

    const fn only(mut self, modes: Modes) -> Self {
        self.modes = modes;
        self
    }
}

/// A mnemonic and its candidate encodings in match order.
#[derive(Debug, Clone, Copy)]
pub struct Opcode {
    /// Lowercase mnemonic.
    pub mnemonic: &'static str,
    /// Candidate rows.
    pub encodings: &'static [Encoding],
}

/// Find the table entry for a lowercase mnemonic.
pub fn lookup(mnemonic: &str) -> Option<&'static Opcode> {
    OPCODES
        .binary_search_by(|op| op.mnemonic.cmp(mnemonic))
        .ok()
        .map(|i| &OPCODES[i])
}

/// Every mnemonic in the table, in sorted order.
pub fn mnemonics() -> impl Iterator<Item = &'static str> {
    OPCODES.iter().map(|op| op.mnemonic)
}

use Encoding as E;
use OpEn::*;

const AL: Shape = FixedReg(Register::Al);
const AX: Shape = FixedReg(Register::Ax);
const EAX: Shape = FixedReg(Register::Eax);
const RAX: Shape = FixedReg(Register::Rax);
const CL: Shape = FixedReg(Register::Cl);

// ─── Families ───────────────────────────────────────────────────────────────

/// The eight classic two-operand arithmetic instructions.
macro_rules! alu {
    ($name:ident, $base:literal, $digit:literal) => {
        static $name: &[Encoding] = &[
            E::new("I_al_imm8", I, &[AL, Imm(Byte)], &[$base + 4], Some(Byte)),
            E::new("MI_rm8_imm8", MI, &[Rm(Byte), Imm(Byte)], &[0x80], Some(Byte)).digit($digit),
            E::new("MI_rm16_imm8", MI, &[Rm(Word), ImmSx(Byte)], &[0x83], Some(Word)).digit($digit),
            E::new("MI_rm32_imm8", MI, &[Rm(Dword), ImmSx(Byte)], &[0x83], Some(Dword)).digit($digit),
            E::new("MI_rm64_imm8", MI, &[Rm(Qword), ImmSx(Byte)], &[0x83], Some(Qword)).digit($digit),
            E::new("I_ax_imm16", I, &[AX, Imm(Word)], &[$base + 5], Some(Word)),
            E::new("I_eax_imm32", I, &[EAX, Imm(Dword)], &[$base + 5], Some(Dword)),
            E::new("I_rax_imm32", I, &[RAX, ImmSx(Dword)], &[$base + 5], Some(Qword)),
            E::new("MI_rm16_imm16", MI, &[Rm(Word), Imm(Word)], &[0x81], Some(Word)).digit($digit),
            E::new("MI_rm32_imm32", MI, &[Rm(Dword), Imm(Dword)], &[0x81], Some(Dword)).digit($digit),
            E::new("MI_rm64_imm32", MI, &[Rm(Qword), ImmSx(Dword)], &[0x81], Some(Qword)).digit($digit),
            E::new("MR_rm8_r8", MR, &[Rm(Byte), Reg(Byte)], &[$base], Some(Byte)),
            E::new("MR_rm16_r16", MR, &[Rm(Word), Reg(Word)], &[$base + 1], Some(Word)),
            E::new("MR_rm32_r32", MR, &[Rm(Dword), Reg(Dword)], &[$base + 1], Some(Dword)),
            E::new("MR_rm64_r64", MR, &[Rm(Qword), Reg(Qword)], &[$base + 1], Some(Qword)),
            E::new("RM_r8_rm8", RM, &[Reg(Byte), Rm(Byte)], &[$base + 2], Some(Byte)),
            E::new("RM_r16_rm16", RM, &[Reg(Word), Rm(Word)], &[$base + 3], Some(Word)),
            E::new("RM_r32_rm32", RM, &[Reg(Dword), Rm(Dword)], &[$base + 3], Some(Dword)),
            E::new("RM_r64_rm64", RM, &[Reg(Qword), Rm(Qword)], &[$base + 3], Some(Qword)),
        ];
    };
}

/// Single r/m operand instructions in the F6/F7 group.
macro_rules! unary {
    ($name:ident, $digit:literal) => {
        static $name: &[Encoding] = &[
            E::new("M_rm8", M, &[Rm(Byte)], &[0xF6], Some(Byte)).digit($digit),
            E::new("M_rm16", M, &[Rm(Word)], &[0xF7], Some(Word)).digit($digit),
            E::new("M_rm32", M, &[Rm(Dword)], &[0xF7], Some(Dword)).digit($digit),
            E::new("M_rm64", M, &[Rm(Qword)], &[0xF7], Some(Qword)).digit($digit),
        ];
    };
}

/// Shifts and rotates: by one, by imm8, by CL.
macro_rules! shift {
    ($name:ident, $digit:literal) => {
        static $name: &[Encoding] = &[
            E::new("M_rm8_1", M, &[Rm(Byte), One], &[0xD0], Some(Byte)).digit($digit),
            E::new("M_rm16_1", M, &[Rm(Word), One], &[0xD1], Some(Word)).digit($digit),
            E::new("M_rm32_1", M, &[Rm(Dword), One], &[0xD1], Some(Dword)).digit($digit),
            E::new("M_rm64_1", M, &[Rm(Qword), One], &[0xD1], Some(Qword)).digit($digit),
            E::new("MI_rm8_imm8", MI, &[Rm(Byte), Imm(Byte)], &[0xC0], Some(Byte)).digit($digit),
            E::new("MI_rm16_imm8", MI, &[Rm(Word), Imm(Byte)], &[0xC1], Some(Word)).digit($digit),
            E::new("MI_rm32_imm8", MI, &[Rm(Dword), Imm(Byte)], &[0xC1], Some(Dword)).digit($digit),
            E::new("MI_rm64_imm8", MI, &[Rm(Qword), Imm(Byte)], &[0xC1], Some(Qword)).digit($digit),
            E::new("M_rm8_cl", M, &[Rm(Byte), CL], &[0xD2], Some(Byte)).digit($digit),
            E::new("M_rm16_cl", M, &[Rm(Word), CL], &[0xD3], Some(Word)).digit($digit),
            E::new("M_rm32_cl", M, &[Rm(Dword), CL], &[0xD3], Some(Dword)).digit($digit),
            E::new("M_rm64_cl", M, &[Rm(Qword), CL], &[0xD3], Some(Qword)).digit($digit),
        ];
    };
}

/// Bit test family: register and imm8 bit offsets.
macro_rules! bit_test {
    ($name:ident, $op:literal, $digit:literal) => {
        static $name: &[Encoding] = &[
            E::new("MR_rm16_r16", MR, &[Rm(Word), Reg(Word)], &[0x0F, $op], Some(Word)),
            E::new("MR_rm32_r32", MR, &[Rm(Dword), Reg(Dword)], &[0x0F, $op], Some(Dword)),
            E::new("MR_rm64_r64", MR, &[Rm(Qword), Reg(Qword)], &[0x0F, $op], Some(Qword)),
            E::new("MI_rm16_imm8", MI, &[Rm(Word), Imm(Byte)], &[0x0F, 0xBA], Some(Word)).digit($digit),
            E::new("MI_rm32_imm8", MI, &[Rm(Dword), Imm(Byte)], &[0x0F, 0xBA], Some(Dword)).digit($digit),
            E::new("MI_rm64_imm8", MI, &[Rm(Qword), Imm(Byte)], &[0x0F, 0xBA], Some(Qword)).digit($digit),
        ];
    };
}

/// Conditional jump, set and move for one condition code.
macro_rules! cond {
    ($j:ident, $set:ident, $cmov:ident, $cc:literal) => {
        static $j: &[Encoding] = &[
            E::new("D_rel8", D, &[Rel(Byte)], &[0x70 + $cc], None),
            E::new("D_rel32", D, &[Rel(Dword)], &[0x0F, 0x80 + $cc], Some(Dword)),
        ];
        static $set: &[Encoding] = &[
            E::new("M_rm8", M, &[Rm(Byte)], &[0x0F, 0x90 + $cc], Some(Byte)).digit(0),
        ];
        static $cmov: &[Encoding] = &[
            E::new("RM_r16_rm16", RM, &[Reg(Word), Rm(Word)], &[0x0F, 0x40 + $cc], Some(Word)),
            E::new("RM_r32_rm32", RM, &[Reg(Dword), Rm(Dword)], &[0x0F, 0x40 + $cc], Some(Dword)),
            E::new("RM_r64_rm64", RM, &[Reg(Qword), Rm(Qword)], &[0x0F, 0x40 + $cc], Some(Qword)),
        ];
    };
}

/// A zero-operand instruction.
macro_rules! np {
    ($name:ident, [$($b:literal),+]) => {
        np!($name, [$($b),+], None, Modes::ALL);
    };
    ($name:ident, [$($b:literal),+], $size:expr) => {
        np!($name, [$($b),+], $size, Modes::ALL);
    };
    ($name:ident, [$($b:literal),+], $size:expr, $modes:expr) => {
        static $name: &[Encoding] = &[E::new("NP", NP, &[], &[$($b),+], $size).only($modes)];
    };
}

alu!(ADD, 0x00, 0);
alu!(OR, 0x08, 1);
alu!(ADC, 0x10, 2);
alu!(SBB, 0x18, 3);
alu!(AND, 0x20, 4);
alu!(SUB, 0x28, 5);
alu!(XOR, 0x30, 6);
alu!(CMP, 0x38, 7);

unary!(NOT, 2);
unary!(NEG, 3);
unary!(MUL, 4);
unary!(DIV, 6);
unary!(IDIV, 7);

shift!(ROL, 0);
shift!(ROR, 1);
shift!(RCL, 2);
shift!(RCR, 3);
shift!(SHL, 4);
shift!(SHR, 5);
shift!(SAR, 7);

bit_test!(BT, 0xA3, 4);
bit_test!(BTS, 0xAB, 5);
bit_test!(BTR, 0xB3, 6);
bit_test!(BTC, 0xBB, 7);

cond!(JO, SETO, CMOVO, 0x0);
cond!(JNO, SETNO, CMOVNO, 0x1);
cond!(JB, SETB, CMOVB, 0x2);
cond!(JAE, SETAE, CMOVAE, 0x3);
cond!(JE, SETE, CMOVE, 0x4);
cond!(JNE, SETNE, CMOVNE, 0x5);
cond!(JBE, SETBE, CMOVBE, 0x6);
cond!(JA, SETA, CMOVA, 0x7);
cond!(JS, SETS, CMOVS, 0x8);
cond!(JNS, SETNS, CMOVNS, 0x9);
cond!(JP, SETP, CMOVP, 0xA);
cond!(JNP, SETNP, CMOVNP, 0xB);
cond!(JL, SETL, CMOVL, 0xC);
cond!(JGE, SETGE, CMOVGE, 0xD);
cond!(JLE, SETLE, CMOVLE, 0xE);
cond!(JG, SETG, CMOVG, 0xF);

np!(CLC, [0xF8]);
np!(CLD, [0xFC]);
np!(CLI, [0xFA]);
np!(CMC, [0xF5]);
np!(CPUID, [0x0F, 0xA2]);
np!(HLT, [0xF4]);
np!(INT1, [0xF1]);
np!(INT3, [0xCC]);
np!(LAHF, [0x9F]);
np!(LEAVE, [0xC9]);
np!(LFENCE, [0x0F, 0xAE, 0xE8]);
np!(MFENCE, [0x0F, 0xAE, 0xF0]);
np!(PAUSE, [0xF3, 0x90]);
np!(POPF, [0x9D]);
np!(PUSHF, [0x9C]);
np!(RDTSC, [0x0F, 0x31]);
np!(SAHF, [0x9E]);
np!(SFENCE, [0x0F, 0xAE, 0xF8]);
np!(STC, [0xF9]);
np!(STD, [0xFD]);
np!(STI, [0xFB]);
np!(SYSCALL, [0x0F, 0x05], None, Modes::O64);
np!(UD2, [0x0F, 0x0B]);
np!(XLATB, [0xD7]);

np!(CBW, [0x98], Some(Word));
np!(CWDE, [0x98], Some(Dword));
np!(CDQE, [0x98], Some(Qword));
np!(CWD, [0x99], Some(Word));
np!(CDQ, [0x99], Some(Dword));
np!(CQO, [0x99], Some(Qword));

np!(MOVSB, [0xA4]);
np!(MOVSW, [0xA5], Some(Word));
np!(MOVSD, [0xA5], Some(Dword));
np!(MOVSQ, [0xA5], Some(Qword));
np!(CMPSB, [0xA6]);
np!(CMPSW, [0xA7], Some(Word));
np!(CMPSD, [0xA7], Some(Dword));
np!(CMPSQ, [0xA7], Some(Qword));
np!(STOSB, [0xAA]);
np!(STOSW, [0xAB], Some(Word));
np!(STOSD, [0xAB], Some(Dword));
np!(STOSQ, [0xAB], Some(Qword));
np!(LODSB, [0xAC]);
np!(LODSW, [0xAD], Some(Word));
np!(LODSD, [0xAD], Some(Dword));
np!(LODSQ, [0xAD], Some(Qword));
np!(SCASB, [0xAE]);
np!(SCASW, [0xAF], Some(Word));
np!(SCASD, [0xAF], Some(Dword));
np!(SCASQ, [0xAF], Some(Qword));

// ─── Data movement ──────────────────────────────────────────────────────────

static MOV: &[Encoding] = &[
    E::new("MR_rm8_r8", MR, &[Rm(Byte), Reg(Byte)], &[0x88], Some(Byte)),
    E::new("MR_rm16_r16", MR, &[Rm(Word), Reg(Word)], &[0x89], Some(Word)),
    E::new("MR_rm32_r32", MR, &[Rm(Dword), Reg(Dword)], &[0x89], Some(Dword)),
    E::new("MR_rm64_r64", MR, &[Rm(Qword), Reg(Qword)], &[0x89], Some(Qword)),
    E::new("RM_r8_rm8", RM, &[Reg(Byte), Rm(Byte)], &[0x8A], Some(Byte)),
    E::new("RM_r16_rm16", RM, &[Reg(Word), Rm(Word)], &[0x8B], Some(Word)),
    E::new("RM_r32_rm32", RM, &[Reg(Dword), Rm(Dword)], &[0x8B], Some(Dword)),
    E::new("RM_r64_rm64", RM, &[Reg(Qword), Rm(Qword)], &[0x8B], Some(Qword)),
    E::new("OI_r8_imm8", OI, &[Reg(Byte), Imm(Byte)], &[0xB0], Some(Byte)),
    E::new("OI_r16_imm16", OI, &[Reg(Word), Imm(Word)], &[0xB8], Some(Word)),
    E::new("OI_r32_imm32", OI, &[Reg(Dword), Imm(Dword)], &[0xB8], Some(Dword)),
    E::new("MI_rm64_imm32", MI, &[Rm(Qword), ImmSx(Dword)], &[0xC7], Some(Qword)).digit(0),
    E::new("OI_r64_imm64", OI, &[Reg(Qword), Imm(Qword)], &[0xB8], Some(Qword)),
    E::new("MI_rm8_imm8", MI, &[Rm(Byte), Imm(Byte)], &[0xC6], Some(Byte)).digit(0),
    E::new("MI_rm16_imm16", MI, &[Rm(Word), Imm(Word)], &[0xC7], Some(Word)).digit(0),
    E::new("MI_rm32_imm32", MI, &[Rm(Dword), Imm(Dword)], &[0xC7], Some(Dword)).digit(0),
    E::new("MR_r16_sreg", MR, &[Reg(Word), Sreg], &[0x8C], Some(Word)),
    E::new("MR_r32_sreg", MR, &[Reg(Dword), Sreg], &[0x8C], Some(Dword)),
    E::new("MR_r64_sreg", MR, &[Reg(Qword), Sreg], &[0x8C], Some(Qword)),
    E::new("MR_m16_sreg", MR, &[MemAny, Sreg], &[0x8C], None),
    E::new("RM_sreg_rm16", RM, &[Sreg, Rm(Word)], &[0x8E], None),
    E::new("RM_sreg_r32", RM, &[Sreg, Reg(Dword)], &[0x8E], None),
    E::new("RM_sreg_m16", RM, &[Sreg, MemAny], &[0x8E], None),
];

static MOVZX: &[Encoding] = &[
    E::new("RM_r16_rm8", RM, &[Reg(Word), Rm(Byte)], &[0x0F, 0xB6], Some(Word)),
    E::new("RM_r32_rm8", RM, &[Reg(Dword), Rm(Byte)], &[0x0F, 0xB6], Some(Dword)),
    E::new("RM_r64_rm8", RM, &[Reg(Qword), Rm(Byte)], &[0x0F, 0xB6], Some(Qword)),
    E::new("RM_r32_rm16", RM, &[Reg(Dword), Rm(Word)], &[0x0F, 0xB7], Some(Dword)),
    E::new("RM_r64_rm16", RM, &[Reg(Qword), Rm(Word)], &[0x0F, 0xB7], Some(Qword)),
];

static MOVSX: &[Encoding] = &[
    E::new("RM_r16_rm8", RM, &[Reg(Word), Rm(Byte)], &[0x0F, 0xBE], Some(Word)),
    E::new("RM_r32_rm8", RM, &[Reg(Dword), Rm(Byte)], &[0x0F, 0xBE], Some(Dword)),
    E::new("RM_r64_rm8", RM, &[Reg(Qword), Rm(Byte)], &[0x0F, 0xBE], Some(Qword)),
    E::new("RM_r32_rm16", RM, &[Reg(Dword), Rm(Word)], &[0x0F, 0xBF], Some(Dword)),
    E::new("RM_r64_rm16", RM, &[Reg(Qword), Rm(Word)], &[0x0F, 0xBF], Some(Qword)),
];

static MOVSXD: &[Encoding] = &[
    E::new("RM_r64_rm32", RM, &[Reg(Qword), Rm(Dword)], &[0x63], Some(Qword)).only(Modes::O64),
];

static LEA: &[Encoding] = &[
    E::new("RM_r16_m", RM, &[Reg(Word), MemAny], &[0x8D], Some(Word)),
    E::new("RM_r32_m", RM, &[Reg(Dword), MemAny], &[0x8D], Some(Dword)),
    E::new("RM_r64_m", RM, &[Reg(Qword), MemAny], &[0x8D], Some(Qword)),
];

static XCHG: &[Encoding] = &[
    // 90 is NOP in long mode and would keep the upper half of RAX.
    E::new("NP_eax_eax", NP, &[EAX, EAX], &[0x87, 0xC0], Some(Dword)).only(Modes::O64),
    E::new("O_ax_r16", O, &[AX, Reg(Word)], &[0x90], Some(Word)),
    E::new("O_r16_ax", O, &[Reg(Word), AX], &[0x90], Some(Word)),
    E::new("O_eax_r32", O, &[EAX, Reg(Dword)], &[0x90], Some(Dword)),
    E::new("O_r32_eax", O, &[Reg(Dword), EAX], &[0x90], Some(Dword)),
    E::new("O_rax_r64", O, &[RAX, Reg(Qword)], &[0x90], Some(Qword)),
    E::new("O_r64_rax", O, &[Reg(Qword), RAX], &[0x90], Some(Qword)),
    E::new("MR_rm8_r8", MR, &[Rm(Byte), Reg(Byte)], &[0x86], Some(Byte)),
    E::new("MR_rm16_r16", MR, &[Rm(Word), Reg(Word)], &[0x87], Some(Word)),
    E::new("MR_rm32_r32", MR, &[Rm(Dword), Reg(Dword)], &[0x87], Some(Dword)),
    E::new("MR_rm64_r64", MR, &[Rm(Qword), Reg(Qword)], &[0x87], Some(Qword)),
    E::new("RM_r8_rm8", RM, &[Reg(Byte), Rm(Byte)], &[0x86], Some(Byte)),
    E::new("RM_r16_rm16", RM, &[Reg(Word), Rm(Word)], &[0x87], Some(Word)),
    E::new("RM_r32_rm32", RM, &[Reg(Dword), Rm(Dword)], &[0x87], Some(Dword)),
    E::new("RM_r64_rm64", RM, &[Reg(Qword), Rm(Qword)], &[0x87], Some(Qword)),
];

static CMPXCHG: &[Encoding] = &[
    E::new("MR_rm8_r8", MR, &[Rm(Byte), Reg(Byte)], &[0x0F, 0xB0], Some(Byte)),
    E::new("MR_rm16_r16", MR, &[Rm(Word), Reg(Word)], &[0x0F, 0xB1], Some(Word)),
    E::new("MR_rm32_r32", MR, &[Rm(Dword), Reg(Dword)], &[0x0F, 0xB1], Some(Dword)),
    E::new("MR_rm64_r64", MR, &[Rm(Qword), Reg(Qword)], &[0x0F, 0xB1], Some(Qword)),
];

static XADD: &[Encoding] = &[
    E::new("MR_rm8_r8", MR, &[Rm(Byte), Reg(Byte)], &[0x0F, 0xC0], Some(Byte)),
    E::new("MR_rm16_r16", MR, &[Rm(Word), Reg(Word)], &[0x0F, 0xC1], Some(Word)),
    E::new("MR_rm32_r32", MR, &[Rm(Dword), Reg(Dword)], &[0x0F, 0xC1], Some(Dword)),
    E::new("MR_rm64_r64", MR, &[Rm(Qword), Reg(Qword)], &[0x0F, 0xC1], Some(Qword)),
];

static BSWAP: &[Encoding] = &[
    E::new("O_r32", O, &[Reg(Dword)], &[0x0F, 0xC8], Some(Dword)),
    E::new("O_r64", O, &[Reg(Qword)], &[0x0F, 0xC8], Some(Qword)),
];

static BSF: &[Encoding] = &[
    E::new("RM_r16_rm16", RM, &[Reg(Word), Rm(Word)], &[0x0F, 0xBC], Some(Word)),
    E::new("RM_r32_rm32", RM, &[Reg(Dword), Rm(Dword)], &[0x0F, 0xBC], Some(Dword)),
    E::new("RM_r64_rm64", RM, &[Reg(Qword), Rm(Qword)], &[0x0F, 0xBC], Some(Qword)),
];

static BSR: &[Encoding] = &[
    E::new("RM_r16_rm16", RM, &[Reg(Word), Rm(Word)], &[0x0F, 0xBD], Some(Word)),
    E::new("RM_r32_rm32", RM, &[Reg(Dword), Rm(Dword)], &[0x0F, 0xBD], Some(Dword)),
    E::new("RM_r64_rm64", RM, &[Reg(Qword), Rm(Qword)], &[0x0F, 0xBD], Some(Qword)),
];

// ─── Arithmetic ─────────────────────────────────────────────────────────────

static TEST: &[Encoding] = &[
    E::new("I_al_imm8", I, &[AL, Imm(Byte)], &[0xA8], Some(Byte)),
    E::new("I_ax_imm16", I, &[AX, Imm(Word)], &[0xA9], Some(Word)),
    E::new("I_eax_imm32", I, &[EAX, Imm(Dword)], &[0xA9], Some(Dword)),
    E::new("I_rax_imm32", I, &[RAX, ImmSx(Dword)], &[0xA9], Some(Qword)),
    E::new("MI_rm8_imm8", MI, &[Rm(Byte), Imm(Byte)], &[0xF6], Some(Byte)).digit(0),
    E::new("MI_rm16_imm16", MI, &[Rm(Word), Imm(Word)], &[0xF7], Some(Word)).digit(0),
    E::new("MI_rm32_imm32", MI, &[Rm(Dword), Imm(Dword)], &[0xF7], Some(Dword)).digit(0),
    E::new("MI_rm64_imm32", MI, &[Rm(Qword), ImmSx(Dword)], &[0xF7], Some(Qword)).digit(0),
    E::new("MR_rm8_r8", MR, &[Rm(Byte), Reg(Byte)], &[0x84], Some(Byte)),
    E::new("MR_rm16_r16", MR, &[Rm(Word), Reg(Word)], &[0x85], Some(Word)),
    E::new("MR_rm32_r32", MR, &[Rm(Dword), Reg(Dword)], &[0x85], Some(Dword)),
    E::new("MR_rm64_r64", MR, &[Rm(Qword), Reg(Qword)], &[0x85], Some(Qword)),
    E::new("RM_r8_rm8", RM, &[Reg(Byte), Rm(Byte)], &[0x84], Some(Byte)),
    E::new("RM_r16_rm16", RM, &[Reg(Word), Rm(Word)], &[0x85], Some(Word)),
    E::new("RM_r32_rm32", RM, &[Reg(Dword), Rm(Dword)], &[0x85], Some(Dword)),
    E::new("RM_r64_rm64", RM, &[Reg(Qword), Rm(Qword)], &[0x85], Some(Qword)),
];

static INC: &[Encoding] = &[
    E::new("O_r16", O, &[Reg(Word)], &[0x40], Some(Word)).only(Modes::LEGACY),
    E::new("O_r32", O, &[Reg(Dword)], &[0x40], Some(Dword)).only(Modes::LEGACY),
    E::new("M_rm8", M, &[Rm(Byte)], &[0xFE], Some(Byte)).digit(0),
    E::new("M_rm16", M, &[Rm(Word)], &[0xFF], Some(Word)).digit(0),
    E::new("M_rm32", M, &[Rm(Dword)], &[0xFF], Some(Dword)).digit(0),
    E::new("M_rm64", M, &[Rm(Qword)], &[0xFF], Some(Qword)).digit(0),
];

static DEC: &[Encoding] = &[
    E::new("O_r16", O, &[Reg(Word)], &[0x48], Some(Word)).only(Modes::LEGACY),
    E::new("O_r32", O, &[Reg(Dword)], &[0x48], Some(Dword)).only(Modes::LEGACY),
    E::new("M_rm8", M, &[Rm(Byte)], &[0xFE], Some(Byte)).digit(1),
    E::new("M_rm16", M, &[Rm(Word)], &[0xFF], Some(Word)).digit(1),
    E::new("M_rm32", M, &[Rm(Dword)], &[0xFF], Some(Dword)).digit(1),
    E::new("M_rm64", M, &[Rm(Qword)], &[0xFF], Some(Qword)).digit(1),
];

static IMUL: &[Encoding] = &[
    E::new("M_rm8", M, &[Rm(Byte)], &[0xF6], Some(Byte)).digit(5),
    E::new("M_rm16", M, &[Rm(Word)], &[0xF7], Some(Word)).digit(5),
    E::new("M_rm32", M, &[Rm(Dword)], &[0xF7], Some(Dword)).digit(5),
    E::new("M_rm64", M, &[Rm(Qword)], &[0xF7], Some(Qword)).digit(5),
    E::new("RM_r16_rm16", RM, &[Reg(Word), Rm(Word)], &[0x0F, 0xAF], Some(Word)),
    E::new("RM_r32_rm32", RM, &[Reg(Dword), Rm(Dword)], &[0x0F, 0xAF], Some(Dword)),
    E::new("RM_r64_rm64", RM, &[Reg(Qword), Rm(Qword)], &[0x0F, 0xAF], Some(Qword)),
    E::new("RMI_r16_rm16_imm8", RMI, &[Reg(Word), Rm(Word), ImmSx(Byte)], &[0x6B], Some(Word)),
    E::new("RMI_r32_rm32_imm8", RMI, &[Reg(Dword), Rm(Dword), ImmSx(Byte)], &[0x6B], Some(Dword)),
    E::new("RMI_r64_rm64_imm8", RMI, &[Reg(Qword), Rm(Qword), ImmSx(Byte)], &[0x6B], Some(Qword)),
    E::new("RMI_r16_rm16_imm16", RMI, &[Reg(Word), Rm(Word), Imm(Word)], &[0x69], Some(Word)),
    E::new("RMI_r32_rm32_imm32", RMI, &[Reg(Dword), Rm(Dword), Imm(Dword)], &[0x69], Some(Dword)),
    E::new("RMI_r64_rm64_imm32", RMI, &[Reg(Qword), Rm(Qword), ImmSx(Dword)], &[0x69], Some(Qword)),
];

// ─── Stack ──────────────────────────────────────────────────────────────────

static PUSH: &[Encoding] = &[
    E::new("O_r64", O, &[Reg(Qword)], &[0x50], Some(Qword)).d64().only(Modes::O64),
    E::new("O_r32", O, &[Reg(Dword)], &[0x50], Some(Dword)).only(Modes::LEGACY),
    E::new("O_r16", O, &[Reg(Word)], &[0x50], Some(Word)),
    E::new("M_rm64", M, &[RmDefault(Qword)], &[0xFF], Some(Qword)).digit(6).d64().only(Modes::O64),
    E::new("M_rm32", M, &[RmDefault(Dword)], &[0xFF], Some(Dword)).digit(6).only(Modes::O32),
    E::new("M_rm16", M, &[RmDefault(Word)], &[0xFF], Some(Word)).digit(6).only(Modes::O16),
    E::new("M_rm16", M, &[Rm(Word)], &[0xFF], Some(Word)).digit(6).only(Modes::WIDE),
    E::new("M_rm32", M, &[Rm(Dword)], &[0xFF], Some(Dword)).digit(6).only(Modes::O16),
    E::new("I_imm8", I, &[ImmSx(Byte)], &[0x6A], None),
    E::new("I_imm16", I, &[Imm(Word)], &[0x68], None).only(Modes::O16),
    E::new("I_imm32", I, &[ImmSx(Dword)], &[0x68], None).only(Modes::WIDE),
    E::new("NP_fs", NP, &[FixedReg(Register::Fs)], &[0x0F, 0xA0], None),
    E::new("NP_gs", NP, &[FixedReg(Register::Gs)], &[0x0F, 0xA8], None),
    E::new("NP_es", NP, &[FixedReg(Register::Es)], &[0x06], None).only(Modes::LEGACY),
    E::new("NP_cs", NP, &[FixedReg(Register::Cs)], &[0x0E], None).only(Modes::LEGACY),
    E::new("NP_ss", NP, &[FixedReg(Register::Ss)], &[0x16], None).only(Modes::LEGACY),
    E::new("NP_ds", NP, &[FixedReg(Register::Ds)], &[0x1E], None).only(Modes::LEGACY),
];

static POP: &[Encoding] = &[
    E::new("O_r64", O, &[Reg(Qword)], &[0x58], Some(Qword)).d64().only(Modes::O64),
    E::new("O_r32", O, &[Reg(Dword)], &[0x58], Some(Dword)).only(Modes::LEGACY),
    E::new("O_r16", O, &[Reg(Word)], &[0x58], Some(Word)),
    E::new("M_rm64", M, &[RmDefault(Qword)], &[0x8F], Some(Qword)).digit(0).d64().only(Modes::O64),
    E::new("M_rm32", M, &[RmDefault(Dword)], &[0x8F], Some(Dword)).digit(0).only(Modes::O32),
    E::new("M_rm16", M, &[RmDefault(Word)], &[0x8F], Some(Word)).digit(0).only(Modes::O16),
    E::new("M_rm16", M, &[Rm(Word)], &[0x8F], Some(Word)).digit(0).only(Modes::WIDE),
    E::new("M_rm32", M, &[Rm(Dword)], &[0x8F], Some(Dword)).digit(0).only(Modes::O16),
    E::new("NP_fs", NP, &[FixedReg(Register::Fs)], &[0x0F, 0xA1], None),
    E::new("NP_gs", NP, &[FixedReg(Register::Gs)], &[0x0F, 0xA9], None),
    E::new("NP_es", NP, &[FixedReg(Register::Es)], &[0x07], None).only(Modes::LEGACY),
    E::new("NP_ss", NP, &[FixedReg(Register::Ss)], &[0x17], None).only(Modes::LEGACY),
    E::new("NP_ds", NP, &[FixedReg(Register::Ds)], &[0x1F], None).only(Modes::LEGACY),
];

// ─── Control flow ───────────────────────────────────────────────────────────

static JMP: &[Encoding] = &[
    E::new("D_rel8", D, &[Rel(Byte)], &[0xEB], None),
    E::new("D_rel32", D, &[Rel(Dword)], &[0xE9], Some(Dword)),
    E::new("M_rm64", M, &[RmDefault(Qword)], &[0xFF], Some(Qword)).digit(4).d64().only(Modes::O64),
    E::new("M_rm32", M, &[RmDefault(Dword)], &[0xFF], Some(Dword)).digit(4).only(Modes::O32),
    E::new("M_rm16", M, &[RmDefault(Word)], &[0xFF], Some(Word)).digit(4).only(Modes::O16),
];

static CALL: &[Encoding] = &[
    E::new("D_rel32", D, &[Rel(Dword)], &[0xE8], Some(Dword)),
    E::new("M_rm64", M, &[RmDefault(Qword)], &[0xFF], Some(Qword)).digit(2).d64().only(Modes::O64),
    E::new("M_rm32", M, &[RmDefault(Dword)], &[0xFF], Some(Dword)).digit(2).only(Modes::O32),
    E::new("M_rm16", M, &[RmDefault(Word)], &[0xFF], Some(Word)).digit(2).only(Modes::O16),
];

static RET: &[Encoding] = &[
    E::new("NP", NP, &[], &[0xC3], None),
    E::new("I_imm16", I, &[Imm(Word)], &[0xC2], None),
];

static INT: &[Encoding] = &[E::new("I_imm8", I, &[Imm(Byte)], &[0xCD], None)];

static NOP: &[Encoding] = &[
    E::new("NP", NP, &[], &[0x90], None),
    E::new("M_rm16", M, &[Rm(Word)], &[0x0F, 0x1F], Some(Word)).digit(0),
    E::new("M_rm32", M, &[Rm(Dword)], &[0x0F, 0x1F], Some(Dword)).digit(0),
];

// ─── Mnemonic index (sorted) ────────────────────────────────────────────────

static OPCODES: &[Opcode] = &[
    Opcode { mnemonic: "adc", encodings: ADC },
    Opcode { mnemonic: "add", encodings: ADD },
    Opcode { mnemonic: "and", encodings: AND },
    Opcode { mnemonic: "bsf", encodings: BSF },
    Opcode { mnemonic: "bsr", encodings: BSR },
    Opcode { mnemonic: "bswap", encodings: BSWAP },
    Opcode { mnemonic: "bt", encodings: BT },
    Opcode { mnemonic: "btc", encodings: BTC },
    Opcode { mnemonic: "btr", encodings: BTR },
    Opcode { mnemonic: "bts", encodings: BTS },
    Opcode { mnemonic: "call", encodings: CALL },
    Opcode { mnemonic: "cbw", encodings: CBW },
    Opcode { mnemonic: "cdq", encodings: CDQ },
    Opcode { mnemonic: "cdqe", encodings: CDQE },
    Opcode { mnemonic: "clc", encodings: CLC },
    Opcode { mnemonic: "cld", encodings: CLD },
    Opcode { mnemonic: "cli", encodings: CLI },
    Opcode { mnemonic: "cmc", encodings: CMC },
    Opcode { mnemonic: "cmova", encodings: CMOVA },
    Opcode { mnemonic: "cmovae", encodings: CMOVAE },
    Opcode { mnemonic: "cmovb", encodings: CMOVB },
    Opcode { mnemonic: "cmovbe", encodings: CMOVBE },
    Opcode { mnemonic: "cmovc", encodings: CMOVB },
    Opcode { mnemonic: "cmove", encodings: CMOVE },
    Opcode { mnemonic: "cmovg", encodings: CMOVG },
    Opcode { mnemonic: "cmovge", encodings: CMOVGE },
    Opcode { mnemonic: "cmovl", encodings: CMOVL },
    Opcode { mnemonic: "cmovle", encodings: CMOVLE },
    Opcode { mnemonic: "cmovna", encodings: CMOVBE },
    Opcode { mnemonic: "cmovnae", encodings: CMOVB },
    Opcode { mnemonic: "cmovnb", encodings: CMOVAE },
    Opcode { mnemonic: "cmovnbe", encodings: CMOVA },
    Opcode { mnemonic: "cmovnc", encodings: CMOVAE },
    Opcode { mnemonic: "cmovne", encodings: CMOVNE },
    Opcode { mnemonic: "cmovng", encodings: CMOVLE },
    Opcode { mnemonic: "cmovnge", encodings: CMOVL },
    Opcode { mnemonic: "cmovnl", encodings: CMOVGE },
    Opcode { mnemonic: "cmovnle", encodings: CMOVG },
    Opcode { mnemonic: "cmovno", encodings: CMOVNO },
    Opcode { mnemonic: "cmovnp", encodings: CMOVNP },
    Opcode { mnemonic: "cmovns", encodings: CMOVNS },
    Opcode { mnemonic: "cmovnz", encodings: CMOVNE },
    Opcode { mnemonic: "cmovo", encodings: CMOVO },
    Opcode { mnemonic: "cmovp", encodings: CMOVP },
    Opcode { mnemonic: "cmovpe", encodings: CMOVP },
    Opcode { mnemonic: "cmovpo", encodings: CMOVNP },
    Opcode { mnemonic: "cmovs", encodings: CMOVS },
    Opcode { mnemonic: "cmovz", encodings: CMOVE },
    Opcode { mnemonic: "cmp", encodings: CMP },
    Opcode { mnemonic: "cmpsb", encodings: CMPSB },
    Opcode { mnemonic: "cmpsd", encodings: CMPSD },
    Opcode { mnemonic: "cmpsq", encodings: CMPSQ },
    Opcode { mnemonic: "cmpsw", encodings: CMPSW },
    Opcode { mnemonic: "cmpxchg", encodings: CMPXCHG },
    Opcode { mnemonic: "cpuid", encodings: CPUID },
    Opcode { mnemonic: "cqo", encodings: CQO },
    Opcode { mnemonic: "cwd", encodings: CWD },
    Opcode { mnemonic: "cwde", encodings: CWDE },
    Opcode { mnemonic: "dec", encodings: DEC },
    Opcode { mnemonic: "div", encodings: DIV },
    Opcode { mnemonic: "hlt", encodings: HLT },
    Opcode { mnemonic: "idiv", encodings: IDIV },
    Opcode { mnemonic: "imul", encodings: IMUL },
    Opcode { mnemonic: "inc", encodings: INC },
    Opcode { mnemonic: "int", encodings: INT },
    Opcode { mnemonic: "int1", encodings: INT1 },
    Opcode { mnemonic: "int3", encodings: INT3 },
    Opcode { mnemonic: "ja", encodings: JA },
    Opcode { mnemonic: "jae", encodings: JAE },
    Opcode { mnemonic: "jb", encodings: JB },
    Opcode { mnemonic: "jbe", encodings: JBE },
    Opcode { mnemonic: "jc", encodings: JB },
    Opcode { mnemonic: "je", encodings: JE },
    Opcode { mnemonic: "jg", encodings: JG },
    Opcode { mnemonic: "jge", encodings: JGE },
    Opcode { mnemonic: "jl", encodings: JL },
    Opcode { mnemonic: "jle", encodings: JLE },
    Opcode { mnemonic: "jmp", encodings: JMP },
    Opcode { mnemonic: "jna", encodings: JBE },
    Opcode { mnemonic: "jnae", encodings: JB },
    Opcode { mnemonic: "jnb", encodings: JAE },
    Opcode { mnemonic: "jnbe", encodings: JA },
    Opcode { mnemonic: "jnc", encodings: JAE },
    Opcode { mnemonic: "jne", encodings: JNE },
    Opcode { mnemonic: "jng", encodings: JLE },
    Opcode { mnemonic: "jnge", encodings: JL },
    Opcode { mnemonic: "jnl", encodings: JGE },
    Opcode { mnemonic: "jnle", encodings: JG },
    Opcode { mnemonic: "jno", encodings: JNO },
    Opcode { mnemonic: "jnp", encodings: JNP },
    Opcode { mnemonic: "jns", encodings: JNS },
    Opcode { mnemonic: "jnz", encodings: JNE },
    Opcode { mnemonic: "jo", encodings: JO },
    Opcode { mnemonic: "jp", encodings: JP },
    Opcode { mnemonic: "jpe", encodings: JP },
    Opcode { mnemonic: "jpo", encodings: JNP },
    Opcode { mnemonic: "js", encodings: JS },
    Opcode { mnemonic: "jz", encodings: JE },
    Opcode { mnemonic: "lahf", encodings: LAHF },
    Opcode { mnemonic: "lea", encodings: LEA },
    Opcode { mnemonic: "leave", encodings: LEAVE },
    Opcode { mnemonic: "lfence", encodings: LFENCE },
    Opcode { mnemonic: "lodsb", encodings: LODSB },
    Opcode { mnemonic: "lodsd", encodings: LODSD },
    Opcode { mnemonic: "lodsq", encodings: LODSQ },
    Opcode { mnemonic: "lodsw", encodings: LODSW },
    Opcode { mnemonic: "mfence", encodings: MFENCE },
    Opcode { mnemonic: "mov", encodings: MOV },
    Opcode { mnemonic: "movsb", encodings: MOVSB },
    Opcode { mnemonic: "movsd", encodings: MOVSD },
    Opcode { mnemonic: "movsq", encodings: MOVSQ },
    Opcode { mnemonic: "movsw", encodings: MOVSW },
    Opcode { mnemonic: "movsx", encodings: MOVSX },
    Opcode { mnemonic: "movsxd", encodings: MOVSXD },
    Opcode { mnemonic: "movzx", encodings: MOVZX },
    Opcode { mnemonic: "mul", encodings: MUL },
    Opcode { mnemonic: "neg", encodings: NEG },
    Opcode { mnemonic: "nop", encodings: NOP },
    Opcode { mnemonic: "not", encodings: NOT },
    Opcode { mnemonic: "or", encodings: OR },
    Opcode { mnemonic: "pause", encodings: PAUSE },
    Opcode { mnemonic: "pop", encodings: POP },
    Opcode { mnemonic: "popf", encodings: POPF },
    Opcode { mnemonic: "push", encodings: PUSH },
    Opcode { mnemonic: "pushf", encodings: PUSHF },
    Opcode { mnemonic: "rcl", encodings: RCL },
    Opcode { mnemonic: "rcr", encodings: RCR },
    Opcode { mnemonic: "rdtsc", encodings: RDTSC },
    Opcode { mnemonic: "ret", encodings: RET },
    Opcode { mnemonic: "rol", encodings: ROL },
    Opcode { mnemonic: "ror", encodings: ROR },
    Opcode { mnemonic: "sahf", encodings: SAHF },
    Opcode { mnemonic: "sal", encodings: SHL },
    Opcode { mnemonic: "sar", encodings: SAR },
    Opcode { mnemonic: "sbb", encodings: SBB },
    Opcode { mnemonic: "scasb", encodings: SCASB },
    Opcode { mnemonic: "scasd", encodings: SCASD },
    Opcode { mnemonic: "scasq", encodings: SCASQ },
    Opcode { mnemonic: "scasw", encodings: SCASW },
    Opcode { mnemonic: "seta", encodings: SETA },
    Opcode { mnemonic: "setae", encodings: SETAE },
    Opcode { mnemonic: "setb", encodings: SETB },
    Opcode { mnemonic: "setbe", encodings: SETBE },
    Opcode { mnemonic: "setc", encodings: SETB },
    Opcode { mnemonic: "sete", encodings: SETE },
    Opcode { mnemonic: "setg", encodings: SETG },
    Opcode { mnemonic: "setge", encodings: SETGE },
    Opcode { mnemonic: "setl", encodings: SETL },
    Opcode { mnemonic: "setle", encodings: SETLE },
    Opcode { mnemonic: "setna", encodings: SETBE },
    Opcode { mnemonic: "setnae", encodings: SETB },
    Opcode { mnemonic: "setnb", encodings: SETAE },
    Opcode { mnemonic: "setnbe", encodings: SETA },
    Opcode { mnemonic: "setnc", encodings: SETAE },
    Opcode { mnemonic: "setne", encodings: SETNE },
    Opcode { mnemonic: "setng", encodings: SETLE },
    Opcode { mnemonic: "setnge", encodings: SETL },
    Opcode { mnemonic: "setnl", encodings: SETGE },
    Opcode { mnemonic: "setnle", encodings: SETG },
    Opcode { mnemonic: "setno", encodings: SETNO },
    Opcode { mnemonic: "setnp", encodings: SETNP },
    Opcode { mnemonic: "setns", encodings: SETNS },
    Opcode { mnemonic: "setnz", encodings: SETNE },
    Opcode { mnemonic: "seto", encodings: SETO },
    Opcode { mnemonic: "setp", encodings: SETP },
    Opcode { mnemonic: "setpe", encodings: SETP },
    Opcode { mnemonic: "setpo", encodings: SETNP },
    Opcode { mnemonic: "sets", encodings: SETS },
    Opcode { mnemonic: "setz", encodings: SETE },
    Opcode { mnemonic: "sfence", encodings: SFENCE },
    Opcode { mnemonic: "shl", encodings: SHL },
    Opcode { mnemonic: "shr", encodings: SHR },
    Opcode { mnemonic: "stc", encodings: STC },
    Opcode { mnemonic: "std", encodings: STD },
    Opcode { mnemonic: "sti", encodings: STI },
    Opcode { mnemonic: "stosb", encodings: STOSB },
    Opcode { mnemonic: "stosd", encodings: STOSD },
    Opcode { mnemonic: "stosq", encodings: STOSQ },
    Opcode { mnemonic: "stosw", encodings: STOSW },
    Opcode { mnemonic: "sub", encodings: SUB },
    Opcode { mnemonic: "syscall", encodings: SYSCALL },
    Opcode { mnemonic: "test", encodings: TEST },
    Opcode { mnemonic: "ud2", encodings: UD2 },
    Opcode { mnemonic: "xadd", encodings: XADD },
    Opcode { mnemonic: "xchg", encodings: XCHG },
    Opcode { mnemonic: "xlatb", encodings: XLATB },
    Opcode { mnemonic: "xor", encodings: XOR },];

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn opcode_table_is_sorted() {
        for pair in OPCODES.windows(2) {
            assert!(
                pair[0].mnemonic < pair[1].mnemonic,
                "{} >= {}",
                pair[0].mnemonic,
                pair[1].mnemonic
            );
        }
    }

    #[test]
    fn every_mnemonic_is_reachable() {
        for m in mnemonics() {
            let op = lookup(m).unwrap();
            assert_eq!(op.mnemonic, m);
            assert!(!op.encodings.is_empty(), "{m}");
        }
        assert!(lookup("frobnicate").is_none());
        assert!(lookup("MOV").is_none());
    }

    #[test]
    fn aliases_share_rows() {
        let jz = lookup("jz").unwrap();
        let je = lookup("je").unwrap();
        assert_eq!(jz.encodings, je.encodings);
        assert_eq!(lookup("sal").unwrap().encodings, lookup("shl").unwrap().encodings);
        assert_eq!(
            lookup("cmovnae").unwrap().encodings,
            lookup("cmovc").unwrap().encodings
        );
    }

    #[test]
    fn opcode_lengths_and_digits() {
        for op in OPCODES {
            for enc in op.encodings {
                assert!((1..=3).contains(&enc.opcode.len()), "{}", op.mnemonic);
                let needs_digit = matches!(enc.scheme.op_en, OpEn::M | OpEn::MI);
                assert_eq!(
                    enc.ext.is_some(),
                    needs_digit,
                    "{} {}",
                    op.mnemonic,
                    enc.scheme.name
                );
                if let Some(d) = enc.ext {
                    assert!(d < 8);
                }
            }
        }
    }

    #[test]
    fn long_mode_xchg_eax_eax_is_not_nop() {
        let xchg = lookup("xchg").unwrap();
        let first = &xchg.encodings[0];
        assert_eq!(first.scheme.name, "NP_eax_eax");
        assert!(first.modes.contains(TargetMode::O64));
        assert!(!first.modes.contains(TargetMode::O32));
    }

    #[test]
    fn rm_schemes_have_one_rm_slot() {
        for op in OPCODES {
            for enc in op.encodings {
                let shapes = enc.scheme.shapes;
                let has_sreg = shapes.contains(&Shape::Sreg);
                let rm = shapes
                    .iter()
                    .filter(|s| s.is_rm() || (has_sreg && matches!(s, Shape::Reg(_))))
                    .count();
                let expected = match enc.scheme.op_en {
                    OpEn::M | OpEn::MI | OpEn::MR | OpEn::RM | OpEn::RMI => 1,
                    _ => 0,
                };
                assert_eq!(rm, expected, "{} {}", op.mnemonic, enc.scheme.name);
            }
        }
    }

    #[test]
    fn narrow_immediates_come_first() {
        let add = lookup("add").unwrap();
        let names: Vec<&str> = add.encodings.iter().map(|e| e.scheme.name).collect();
        let imm8 = names.iter().position(|n| *n == "MI_rm32_imm8").unwrap();
        let imm32 = names.iter().position(|n| *n == "MI_rm32_imm32").unwrap();
        assert!(imm8 < imm32);

        let mov = lookup("mov").unwrap();
        let names: Vec<&str> = mov.encodings.iter().map(|e| e.scheme.name).collect();
        let sx = names.iter().position(|n| *n == "MI_rm64_imm32").unwrap();
        let full = names.iter().position(|n| *n == "OI_r64_imm64").unwrap();
        assert!(sx < full);
    }

    #[test]
    fn mode_sets() {
        assert!(Modes::ALL.contains(TargetMode::O16));
        assert!(Modes::LEGACY.contains(TargetMode::O32));
        assert!(!Modes::LEGACY.contains(TargetMode::O64));
        assert!(Modes::WIDE.contains(TargetMode::O64));
        assert!(!Modes::WIDE.contains(TargetMode::O16));
        assert!(Modes::O64.contains(TargetMode::O64));
    }
}
