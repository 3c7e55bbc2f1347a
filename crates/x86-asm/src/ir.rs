//! Intermediate representation: widths, target modes, expression trees and
//! parsed statements.
//!
//! Everything here is syntax: the parser produces these values and the
//! evaluator ([`crate::eval`]) is the first consumer to assign operands a
//! semantic type.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::checked::{self, ArithmeticError};
use crate::error::Span;
use crate::register::Register;

// ─── Widths and modes ───────────────────────────────────────────────────────

/// Operand or address width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Width {
    /// 8 bits.
    Byte,
    /// 16 bits.
    Word,
    /// 32 bits.
    Dword,
    /// 64 bits.
    Qword,
}

impl Width {
    /// Width in bits.
    pub fn bits(self) -> u32 {
        match self {
            Width::Byte => 8,
            Width::Word => 16,
            Width::Dword => 32,
            Width::Qword => 64,
        }
    }

    /// Width in bytes.
    pub fn bytes(self) -> u8 {
        (self.bits() / 8) as u8
    }

    /// Width from a byte count (1, 2, 4 or 8).
    pub fn from_bytes(bytes: u8) -> Option<Width> {
        match bytes {
            1 => Some(Width::Byte),
            2 => Some(Width::Word),
            4 => Some(Width::Dword),
            8 => Some(Width::Qword),
            _ => None,
        }
    }

    /// Smallest signed value of this width.
    pub fn min_signed(self) -> i128 {
        -(1i128 << (self.bits() - 1))
    }

    /// Largest signed value of this width.
    pub fn max_signed(self) -> i128 {
        (1i128 << (self.bits() - 1)) - 1
    }

    /// Largest unsigned value of this width.
    pub fn max_unsigned(self) -> i128 {
        (1i128 << self.bits()) - 1
    }

    /// `v` lies in the signed range of this width.
    pub fn fits_signed(self, v: i64) -> bool {
        let v = v as i128;
        v >= self.min_signed() && v <= self.max_signed()
    }

    /// `v` lies in the signed or the unsigned range of this width.
    pub fn fits(self, v: i64) -> bool {
        let v = v as i128;
        v >= self.min_signed() && v <= self.max_unsigned()
    }

    /// Size keyword (`byte`, `word`, `dword`, `qword`).
    pub fn keyword(self) -> &'static str {
        match self {
            Width::Byte => "byte",
            Width::Word => "word",
            Width::Dword => "dword",
            Width::Qword => "qword",
        }
    }
}

impl fmt::Display for Width {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Default operand/address width context of the assembler.
///
/// Set by `.code16`, `.code32`, `.code64` directives or the
/// [`Assembler`](crate::Assembler) builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TargetMode {
    /// 16-bit default operand and address size.
    O16,
    /// 32-bit default operand and address size.
    O32,
    /// 64-bit long mode: default operand size 32, address size 64.
    #[default]
    O64,
}

impl TargetMode {
    /// Nominal width of the mode in bits (16, 32 or 64).
    pub fn bits(self) -> u32 {
        self.address_width().bits()
    }

    /// Default operand size.
    pub fn operand_width(self) -> Width {
        match self {
            TargetMode::O16 => Width::Word,
            TargetMode::O32 | TargetMode::O64 => Width::Dword,
        }
    }

    /// Default address size.
    pub fn address_width(self) -> Width {
        match self {
            TargetMode::O16 => Width::Word,
            TargetMode::O32 => Width::Dword,
            TargetMode::O64 => Width::Qword,
        }
    }

    /// Mode from a bit count (16, 32 or 64).
    pub fn from_bits(bits: u32) -> Option<TargetMode> {
        match bits {
            16 => Some(TargetMode::O16),
            32 => Some(TargetMode::O32),
            64 => Some(TargetMode::O64),
            _ => None,
        }
    }
}

impl fmt::Display for TargetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-bit", self.bits())
    }
}

// ─── Expressions ────────────────────────────────────────────────────────────

/// Unary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PrefixOp {
    /// `+x`
    Plus,
    /// `-x`
    Neg,
    /// `~x`
    Not,
}

/// Binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InfixOp {
    /// `a + b`
    Add,
    /// `a - b`
    Sub,
    /// `a * b`
    Mul,
    /// `a / b` (truncating)
    Div,
}

impl InfixOp {
    fn symbol(self) -> char {
        match self {
            InfixOp::Add => '+',
            InfixOp::Sub => '-',
            InfixOp::Mul => '*',
            InfixOp::Div => '/',
        }
    }
}

/// Expression tree as produced by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Expr {
    /// Integer literal.
    Int(i64),
    /// Identifier: register name or symbol.
    Var(String),
    /// Unary operator applied to a subexpression.
    Prefix(PrefixOp, Box<Expr>),
    /// Binary operator.
    Infix(InfixOp, Box<Expr>, Box<Expr>),
}

/// Failure while computing the value of a deferred expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The named symbol has no value.
    Undefined(String),
    /// Arithmetic overflowed or divided by zero.
    Arithmetic(ArithmeticError),
}

impl Expr {
    /// Build `Var(name)`.
    pub fn var(name: impl Into<String>) -> Expr {
        Expr::Var(name.into())
    }

    /// Build a binary node.
    pub fn infix(op: InfixOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Infix(op, Box::new(lhs), Box::new(rhs))
    }

    /// Build a unary node.
    pub fn prefix(op: PrefixOp, inner: Expr) -> Expr {
        Expr::Prefix(op, Box::new(inner))
    }

    /// Compute the value, looking symbols up through `lookup`.
    pub fn resolve(&self, lookup: &dyn Fn(&str) -> Option<i64>) -> Result<i64, ResolveError> {
        match self {
            Expr::Int(v) => Ok(*v),
            Expr::Var(name) => lookup(name).ok_or_else(|| ResolveError::Undefined(name.clone())),
            Expr::Prefix(op, inner) => {
                let v = inner.resolve(lookup)?;
                checked::unary(*op, v).map_err(ResolveError::Arithmetic)
            }
            Expr::Infix(op, lhs, rhs) => {
                let a = lhs.resolve(lookup)?;
                let b = rhs.resolve(lookup)?;
                checked::apply(*op, a, b).map_err(ResolveError::Arithmetic)
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Int(v) if *v < 0 => write!(f, "-{:#x}", v.unsigned_abs()),
            Expr::Int(v) if *v > 9 => write!(f, "{:#x}", v),
            Expr::Int(v) => write!(f, "{}", v),
            Expr::Var(name) => f.write_str(name),
            Expr::Prefix(op, inner) => {
                let sym = match op {
                    PrefixOp::Plus => '+',
                    PrefixOp::Neg => '-',
                    PrefixOp::Not => '~',
                };
                match **inner {
                    Expr::Infix(..) => write!(f, "{}({})", sym, inner),
                    _ => write!(f, "{}{}", sym, inner),
                }
            }
            Expr::Infix(op, lhs, rhs) => {
                write!(f, "{} {} ", lhs, op.symbol())?;
                match **rhs {
                    Expr::Infix(..) => write!(f, "({})", rhs),
                    _ => write!(f, "{}", rhs),
                }
            }
        }
    }
}

// ─── Statements ─────────────────────────────────────────────────────────────

/// One operand as written: an expression, optionally sized and/or bracketed.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OperandSyntax {
    /// Size keyword in front of the operand (`dword [rax]`, `byte 5`).
    pub size: Option<Width>,
    /// The size keyword was `short` or `near`.
    pub distance: bool,
    /// Written inside `[...]`.
    pub address: bool,
    /// Size keyword inside the brackets (`[dword label]`): address size.
    pub address_size: Option<Width>,
    /// Segment override (`fs:[...]` or `[fs:...]`).
    pub segment: Option<Register>,
    /// The expression itself.
    pub expr: Expr,
    /// Source location of the whole operand.
    pub span: Span,
}

impl OperandSyntax {
    /// A plain, unsized, unbracketed operand.
    pub fn plain(expr: Expr, span: Span) -> Self {
        Self {
            size: None,
            distance: false,
            address: false,
            address_size: None,
            segment: None,
            expr,
            span,
        }
    }

    /// A bracketed memory operand.
    pub fn memory(size: Option<Width>, expr: Expr, span: Span) -> Self {
        Self {
            size,
            address: true,
            ..Self::plain(expr, span)
        }
    }
}

/// Instruction prefix keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Prefix {
    /// `lock` (F0)
    Lock,
    /// `rep` / `repe` / `repz` (F3)
    Rep,
    /// `repne` / `repnz` (F2)
    Repne,
    /// Branch hint taken (3E).
    BranchTaken,
    /// Branch hint not taken (2E).
    BranchNotTaken,
}

impl Prefix {
    /// Parse a prefix keyword.
    pub fn from_keyword(word: &str) -> Option<Prefix> {
        let p = if word.eq_ignore_ascii_case("lock") {
            Prefix::Lock
        } else if word.eq_ignore_ascii_case("rep")
            || word.eq_ignore_ascii_case("repe")
            || word.eq_ignore_ascii_case("repz")
        {
            Prefix::Rep
        } else if word.eq_ignore_ascii_case("repne") || word.eq_ignore_ascii_case("repnz") {
            Prefix::Repne
        } else if word.eq_ignore_ascii_case("taken") {
            Prefix::BranchTaken
        } else if word.eq_ignore_ascii_case("nottaken") {
            Prefix::BranchNotTaken
        } else {
            return None;
        };
        Some(p)
    }

    /// Legacy prefix group (1 or 2).
    pub fn group(self) -> u8 {
        match self {
            Prefix::Lock | Prefix::Rep | Prefix::Repne => 1,
            Prefix::BranchTaken | Prefix::BranchNotTaken => 2,
        }
    }

    /// Encoded prefix byte.
    pub fn byte(self) -> u8 {
        match self {
            Prefix::Lock => 0xF0,
            Prefix::Rep => 0xF3,
            Prefix::Repne => 0xF2,
            Prefix::BranchTaken => 0x3E,
            Prefix::BranchNotTaken => 0x2E,
        }
    }
}

/// A parsed instruction statement: mnemonic plus raw operands.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InstrStmt {
    /// Lowercased mnemonic.
    pub mnemonic: String,
    /// Prefix keywords in source order.
    pub prefixes: Vec<Prefix>,
    /// Operands in source order.
    pub operands: Vec<OperandSyntax>,
    /// Source location of the statement.
    pub span: Span,
}

/// A statement in the IR.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Statement {
    /// A label definition.
    Label(String, Span),
    /// An instruction.
    Instruction(InstrStmt),
    /// A code-mode switch (`.code16`, `.code32`, `.code64`).
    CodeMode(TargetMode, Span),
}
