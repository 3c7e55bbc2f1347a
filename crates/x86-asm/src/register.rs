//! Register catalog: name lookup, width, hardware code and REX behaviour.

use core::fmt;

use crate::ir::Width;

/// An x86 register identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(missing_docs)]
#[rustfmt::skip]
pub enum Register {
    // 8-bit
    Al, Cl, Dl, Bl, Ah, Ch, Dh, Bh, Spl, Bpl, Sil, Dil,
    R8b, R9b, R10b, R11b, R12b, R13b, R14b, R15b,
    // 16-bit
    Ax, Cx, Dx, Bx, Sp, Bp, Si, Di,
    R8w, R9w, R10w, R11w, R12w, R13w, R14w, R15w,
    // 32-bit
    Eax, Ecx, Edx, Ebx, Esp, Ebp, Esi, Edi,
    R8d, R9d, R10d, R11d, R12d, R13d, R14d, R15d,
    // 64-bit
    Rax, Rcx, Rdx, Rbx, Rsp, Rbp, Rsi, Rdi,
    R8, R9, R10, R11, R12, R13, R14, R15,
    // segment
    Es, Cs, Ss, Ds, Fs, Gs,
    // instruction pointer
    Eip, Rip,
    // flags
    Flags, Eflags, Rflags,
}

/// Broad register family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RegisterClass {
    /// General-purpose integer register.
    General,
    /// Segment register (ES, CS, SS, DS, FS, GS).
    Segment,
    /// EIP / RIP, only usable as an address base.
    InstructionPointer,
    /// FLAGS / EFLAGS / RFLAGS, never an explicit operand.
    Flags,
}

/// How a register interacts with the REX prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RexRequirement {
    /// No REX needed regardless of position.
    NotApplicable,
    /// Cannot be encoded at all when a REX byte is present (AH/CH/DH/BH).
    Unencodable,
    /// Needs a REX byte with the extension bit clear (SPL/BPL/SIL/DIL).
    RequiresClearRexB,
    /// Needs a REX byte with the extension bit set (R8–R15 family).
    RequiresSetRexB,
}

/// Sorted lowercase name → register table (binary-searched).
const REGISTER_TABLE: &[(&str, Register)] = &[
    ("ah", Register::Ah),
    ("al", Register::Al),
    ("ax", Register::Ax),
    ("bh", Register::Bh),
    ("bl", Register::Bl),
    ("bp", Register::Bp),
    ("bpl", Register::Bpl),
    ("bx", Register::Bx),
    ("ch", Register::Ch),
    ("cl", Register::Cl),
    ("cs", Register::Cs),
    ("cx", Register::Cx),
    ("dh", Register::Dh),
    ("di", Register::Di),
    ("dil", Register::Dil),
    ("dl", Register::Dl),
    ("ds", Register::Ds),
    ("dx", Register::Dx),
    ("eax", Register::Eax),
    ("ebp", Register::Ebp),
    ("ebx", Register::Ebx),
    ("ecx", Register::Ecx),
    ("edi", Register::Edi),
    ("edx", Register::Edx),
    ("eflags", Register::Eflags),
    ("eip", Register::Eip),
    ("es", Register::Es),
    ("esi", Register::Esi),
    ("esp", Register::Esp),
    ("flags", Register::Flags),
    ("fs", Register::Fs),
    ("gs", Register::Gs),
    ("r10", Register::R10),
    ("r10b", Register::R10b),
    ("r10d", Register::R10d),
    ("r10l", Register::R10b),
    ("r10w", Register::R10w),
    ("r11", Register::R11),
    ("r11b", Register::R11b),
    ("r11d", Register::R11d),
    ("r11l", Register::R11b),
    ("r11w", Register::R11w),
    ("r12", Register::R12),
    ("r12b", Register::R12b),
    ("r12d", Register::R12d),
    ("r12l", Register::R12b),
    ("r12w", Register::R12w),
    ("r13", Register::R13),
    ("r13b", Register::R13b),
    ("r13d", Register::R13d),
    ("r13l", Register::R13b),
    ("r13w", Register::R13w),
    ("r14", Register::R14),
    ("r14b", Register::R14b),
    ("r14d", Register::R14d),
    ("r14l", Register::R14b),
    ("r14w", Register::R14w),
    ("r15", Register::R15),
    ("r15b", Register::R15b),
    ("r15d", Register::R15d),
    ("r15l", Register::R15b),
    ("r15w", Register::R15w),
    ("r8", Register::R8),
    ("r8b", Register::R8b),
    ("r8d", Register::R8d),
    ("r8l", Register::R8b),
    ("r8w", Register::R8w),
    ("r9", Register::R9),
    ("r9b", Register::R9b),
    ("r9d", Register::R9d),
    ("r9l", Register::R9b),
    ("r9w", Register::R9w),
    ("rax", Register::Rax),
    ("rbp", Register::Rbp),
    ("rbx", Register::Rbx),
    ("rcx", Register::Rcx),
    ("rdi", Register::Rdi),
    ("rdx", Register::Rdx),
    ("rflags", Register::Rflags),
    ("rip", Register::Rip),
    ("rsi", Register::Rsi),
    ("rsp", Register::Rsp),
    ("si", Register::Si),
    ("sil", Register::Sil),
    ("sp", Register::Sp),
    ("spl", Register::Spl),
    ("ss", Register::Ss),
];

impl Register {
    /// Every register, in declaration order.
    #[rustfmt::skip]
    pub const ALL: &'static [Register] = &[
        Register::Al, Register::Cl, Register::Dl, Register::Bl,
        Register::Ah, Register::Ch, Register::Dh, Register::Bh,
        Register::Spl, Register::Bpl, Register::Sil, Register::Dil,
        Register::R8b, Register::R9b, Register::R10b, Register::R11b,
        Register::R12b, Register::R13b, Register::R14b, Register::R15b,
        Register::Ax, Register::Cx, Register::Dx, Register::Bx,
        Register::Sp, Register::Bp, Register::Si, Register::Di,
        Register::R8w, Register::R9w, Register::R10w, Register::R11w,
        Register::R12w, Register::R13w, Register::R14w, Register::R15w,
        Register::Eax, Register::Ecx, Register::Edx, Register::Ebx,
        Register::Esp, Register::Ebp, Register::Esi, Register::Edi,
        Register::R8d, Register::R9d, Register::R10d, Register::R11d,
        Register::R12d, Register::R13d, Register::R14d, Register::R15d,
        Register::Rax, Register::Rcx, Register::Rdx, Register::Rbx,
        Register::Rsp, Register::Rbp, Register::Rsi, Register::Rdi,
        Register::R8, Register::R9, Register::R10, Register::R11,
        Register::R12, Register::R13, Register::R14, Register::R15,
        Register::Es, Register::Cs, Register::Ss, Register::Ds,
        Register::Fs, Register::Gs,
        Register::Eip, Register::Rip,
        Register::Flags, Register::Eflags, Register::Rflags,
    ];

    /// Look up a register by name (case-insensitive).
    ///
    /// `r8l`..`r15l` are accepted as aliases of `r8b`..`r15b`.
    pub fn from_name(name: &str) -> Option<Register> {
        let mut buf = [0u8; 8];
        let bytes = name.as_bytes();
        if bytes.is_empty() || bytes.len() > buf.len() {
            return None;
        }
        for (dst, src) in buf.iter_mut().zip(bytes) {
            *dst = src.to_ascii_lowercase();
        }
        let lower = core::str::from_utf8(&buf[..bytes.len()]).ok()?;
        REGISTER_TABLE
            .binary_search_by(|(n, _)| (*n).cmp(lower))
            .ok()
            .map(|i| REGISTER_TABLE[i].1)
    }

    /// Canonical lowercase name.
    #[rustfmt::skip]
    pub fn name(self) -> &'static str {
        use Register::*;
        match self {
            Al => "al", Cl => "cl", Dl => "dl", Bl => "bl",
            Ah => "ah", Ch => "ch", Dh => "dh", Bh => "bh",
            Spl => "spl", Bpl => "bpl", Sil => "sil", Dil => "dil",
            R8b => "r8b", R9b => "r9b", R10b => "r10b", R11b => "r11b",
            R12b => "r12b", R13b => "r13b", R14b => "r14b", R15b => "r15b",
            Ax => "ax", Cx => "cx", Dx => "dx", Bx => "bx",
            Sp => "sp", Bp => "bp", Si => "si", Di => "di",
            R8w => "r8w", R9w => "r9w", R10w => "r10w", R11w => "r11w",
            R12w => "r12w", R13w => "r13w", R14w => "r14w", R15w => "r15w",
            Eax => "eax", Ecx => "ecx", Edx => "edx", Ebx => "ebx",
            Esp => "esp", Ebp => "ebp", Esi => "esi", Edi => "edi",
            R8d => "r8d", R9d => "r9d", R10d => "r10d", R11d => "r11d",
            R12d => "r12d", R13d => "r13d", R14d => "r14d", R15d => "r15d",
            Rax => "rax", Rcx => "rcx", Rdx => "rdx", Rbx => "rbx",
            Rsp => "rsp", Rbp => "rbp", Rsi => "rsi", Rdi => "rdi",
            R8 => "r8", R9 => "r9", R10 => "r10", R11 => "r11",
            R12 => "r12", R13 => "r13", R14 => "r14", R15 => "r15",
            Es => "es", Cs => "cs", Ss => "ss", Ds => "ds", Fs => "fs", Gs => "gs",
            Eip => "eip", Rip => "rip",
            Flags => "flags", Eflags => "eflags", Rflags => "rflags",
        }
    }

    /// Intrinsic width.
    pub fn width(self) -> Width {
        use Register::*;
        match self {
            Al | Cl | Dl | Bl | Ah | Ch | Dh | Bh | Spl | Bpl | Sil | Dil | R8b | R9b | R10b
            | R11b | R12b | R13b | R14b | R15b => Width::Byte,
            Ax | Cx | Dx | Bx | Sp | Bp | Si | Di | R8w | R9w | R10w | R11w | R12w | R13w
            | R14w | R15w | Es | Cs | Ss | Ds | Fs | Gs | Flags => Width::Word,
            Eax | Ecx | Edx | Ebx | Esp | Ebp | Esi | Edi | R8d | R9d | R10d | R11d | R12d
            | R13d | R14d | R15d | Eip | Eflags => Width::Dword,
            Rax | Rcx | Rdx | Rbx | Rsp | Rbp | Rsi | Rdi | R8 | R9 | R10 | R11 | R12 | R13
            | R14 | R15 | Rip | Rflags => Width::Qword,
        }
    }

    /// Register family.
    pub fn class(self) -> RegisterClass {
        use Register::*;
        match self {
            Es | Cs | Ss | Ds | Fs | Gs => RegisterClass::Segment,
            Eip | Rip => RegisterClass::InstructionPointer,
            Flags | Eflags | Rflags => RegisterClass::Flags,
            _ => RegisterClass::General,
        }
    }

    /// Position within the 16-entry general-purpose file (0–15); segment
    /// registers report their Sreg number, IP and flags registers 0.
    fn number(self) -> u8 {
        use Register::*;
        match self {
            Al | Ax | Eax | Rax | Es => 0,
            Cl | Cx | Ecx | Rcx | Cs => 1,
            Dl | Dx | Edx | Rdx | Ss => 2,
            Bl | Bx | Ebx | Rbx | Ds => 3,
            Ah | Spl | Sp | Esp | Rsp | Fs => 4,
            Ch | Bpl | Bp | Ebp | Rbp | Gs => 5,
            Dh | Sil | Si | Esi | Rsi => 6,
            Bh | Dil | Di | Edi | Rdi => 7,
            R8b | R8w | R8d | R8 => 8,
            R9b | R9w | R9d | R9 => 9,
            R10b | R10w | R10d | R10 => 10,
            R11b | R11w | R11d | R11 => 11,
            R12b | R12w | R12d | R12 => 12,
            R13b | R13w | R13d | R13 => 13,
            R14b | R14w | R14d | R14 => 14,
            R15b | R15w | R15d | R15 => 15,
            Eip | Rip | Flags | Eflags | Rflags => 0,
        }
    }

    /// 3-bit hardware encoding slot (0–7).
    pub fn code(self) -> u8 {
        self.number() & 7
    }

    /// True for the R8–R15 family (needs an extension bit).
    pub fn is_extended(self) -> bool {
        self.number() >= 8
    }

    /// REX interaction of this register.
    pub fn rex(self) -> RexRequirement {
        use Register::*;
        match self {
            Ah | Ch | Dh | Bh => RexRequirement::Unencodable,
            Spl | Bpl | Sil | Dil => RexRequirement::RequiresClearRexB,
            r if r.is_extended() => RexRequirement::RequiresSetRexB,
            _ => RexRequirement::NotApplicable,
        }
    }

    /// True for registers usable as a memory base or index.
    pub fn is_address_register(self) -> bool {
        self.class() == RegisterClass::General && self.width() != Width::Byte
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
