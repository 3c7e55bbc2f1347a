//! Classified operands: the evaluator's output and the matchers' input.

use core::fmt;

use crate::error::Span;
use crate::ir::{Expr, Width};
use crate::register::Register;

/// Conservative value range of a deferred expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bounds {
    /// Smallest possible value.
    pub min: i64,
    /// Largest possible value.
    pub max: i64,
}

impl Bounds {
    /// A single known value.
    pub fn exact(v: i64) -> Self {
        Self { min: v, max: v }
    }

    /// Both ends fit the signed range of `w`.
    pub fn fits_signed(self, w: Width) -> bool {
        w.fits_signed(self.min) && w.fits_signed(self.max)
    }
}

/// A deferred (symbolic) value, resolved by the linker.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Deferred {
    /// The symbolic expression.
    pub expr: Expr,
    /// Range of the value, when the label table allows computing one.
    pub bounds: Option<Bounds>,
}

/// Immediate payload.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ImmValue {
    /// Compile-time constant.
    Fixed(i64),
    /// Value known only after layout.
    Expr(Deferred),
}

/// An immediate with its declared size.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Immediate {
    /// The value.
    pub value: ImmValue,
    /// Declared size; `None` means "infer from context".
    pub size: Option<Width>,
}

impl Immediate {
    /// Unsized constant.
    pub fn fixed(v: i64) -> Self {
        Self {
            value: ImmValue::Fixed(v),
            size: None,
        }
    }

    /// Unsized deferred value.
    pub fn deferred(expr: Expr, bounds: Option<Bounds>) -> Self {
        Self {
            value: ImmValue::Expr(Deferred { expr, bounds }),
            size: None,
        }
    }

    /// The constant, when fixed.
    pub fn as_fixed(&self) -> Option<i64> {
        match self.value {
            ImmValue::Fixed(v) => Some(v),
            ImmValue::Expr(_) => None,
        }
    }

    /// True for deferred values.
    pub fn is_deferred(&self) -> bool {
        matches!(self.value, ImmValue::Expr(_))
    }
}

impl fmt::Display for Immediate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            ImmValue::Fixed(v) => fmt::Display::fmt(&Expr::Int(*v), f),
            ImmValue::Expr(d) => write!(f, "{}", d.expr),
        }
    }
}

/// Scaled index register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Index {
    /// Index register.
    pub reg: Register,
    /// Scale factor; anything but 1, 2, 4 or 8 is rejected by the encoder.
    pub scale: i64,
}

/// Memory address operand.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Memory {
    /// Base register.
    pub base: Option<Register>,
    /// Scaled index register.
    pub index: Option<Index>,
    /// Displacement.
    pub disp: Option<Immediate>,
    /// Address size, from the registers or an explicit `[dword ...]`.
    pub address_size: Option<Width>,
    /// Segment override register.
    pub segment: Option<Register>,
}

impl fmt::Display for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(seg) = self.segment {
            write!(f, "{}:", seg)?;
        }
        f.write_str("[")?;
        let mut first = true;
        if let Some(base) = self.base {
            write!(f, "{}", base)?;
            first = false;
        }
        if let Some(index) = self.index {
            if !first {
                f.write_str(" + ")?;
            }
            write!(f, "{}*{}", index.reg, index.scale)?;
            first = false;
        }
        if let Some(disp) = &self.disp {
            match disp.as_fixed() {
                Some(v) if v < 0 && !first => write!(f, " - {:#x}", v.unsigned_abs())?,
                _ if !first => write!(f, " + {}", disp)?,
                _ => write!(f, "{}", disp)?,
            }
        } else if first {
            f.write_str("0")?;
        }
        f.write_str("]")
    }
}

/// Operand payload.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OperandKind {
    /// A register.
    Register(Register),
    /// An immediate.
    Immediate(Immediate),
    /// A memory reference.
    Memory(Memory),
}

/// A classified operand with its resolved operand size.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Operand {
    /// What the operand is.
    pub kind: OperandKind,
    /// Operand size: the register width, the declared immediate size or the
    /// declared memory size. `None` while unknown.
    pub size: Option<Width>,
    /// Source location.
    pub span: Span,
}

impl Operand {
    /// Register operand sized by the register.
    pub fn register(reg: Register, span: Span) -> Self {
        Self {
            kind: OperandKind::Register(reg),
            size: Some(reg.width()),
            span,
        }
    }

    /// Immediate operand sized by its declaration.
    pub fn immediate(imm: Immediate, span: Span) -> Self {
        Self {
            size: imm.size,
            kind: OperandKind::Immediate(imm),
            span,
        }
    }

    /// Memory operand.
    pub fn memory(mem: Memory, size: Option<Width>, span: Span) -> Self {
        Self {
            kind: OperandKind::Memory(mem),
            size,
            span,
        }
    }

    /// The register, for register operands.
    pub fn as_register(&self) -> Option<Register> {
        match self.kind {
            OperandKind::Register(r) => Some(r),
            _ => None,
        }
    }

    /// The immediate, for immediate operands.
    pub fn as_immediate(&self) -> Option<&Immediate> {
        match &self.kind {
            OperandKind::Immediate(i) => Some(i),
            _ => None,
        }
    }

    /// The address, for memory operands.
    pub fn as_memory(&self) -> Option<&Memory> {
        match &self.kind {
            OperandKind::Memory(m) => Some(m),
            _ => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            OperandKind::Register(r) => write!(f, "{}", r),
            OperandKind::Immediate(i) => match i.size {
                Some(w) => write!(f, "{} {}", w, i),
                None => write!(f, "{}", i),
            },
            OperandKind::Memory(m) => match self.size {
                Some(w) => write!(f, "{} ptr {}", w, m),
                None => write!(f, "{}", m),
            },
        }
    }
}
