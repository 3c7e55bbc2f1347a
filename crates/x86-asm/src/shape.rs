//! Operand-shape matchers.
//!
//! Pure predicates testing whether classified operands satisfy one row of
//! an encoding table. Nothing here allocates or reports errors; a failed
//! match simply means "try the next encoding".

use crate::ir::Width;
use crate::operand::{ImmValue, Immediate, Operand, OperandKind};
use crate::register::{Register, RegisterClass};

// ─── Single-operand predicates ──────────────────────────────────────────────

/// Immediate that fits a sign-extended field of width `w`.
///
/// An undeclared constant must lie in the signed range of `w` (always true
/// for 64 bits). A declared immediate matches only its own width. An
/// undeclared deferred value matches when its bounds fit, or, with unknown
/// bounds, only 32- and 64-bit fields.
pub fn is_immediate(op: &Operand, w: Width) -> bool {
    match &op.kind {
        OperandKind::Immediate(imm) => immediate_fits(imm, w, false),
        _ => false,
    }
}

/// Like [`is_immediate`] but also accepts the unsigned range of `w`, for
/// fields that are not sign-extended into a wider operand.
pub fn fits_immediate_field(op: &Operand, w: Width) -> bool {
    match &op.kind {
        OperandKind::Immediate(imm) => immediate_fits(imm, w, true),
        _ => false,
    }
}

fn immediate_fits(imm: &Immediate, w: Width, unsigned_ok: bool) -> bool {
    if let Some(declared) = imm.size {
        return declared == w
            && match imm.value {
                ImmValue::Fixed(v) => w.fits(v),
                ImmValue::Expr(_) => true,
            };
    }
    match &imm.value {
        ImmValue::Fixed(v) => {
            w == Width::Qword || w.fits_signed(*v) || (unsigned_ok && w.fits(*v))
        }
        ImmValue::Expr(d) => match d.bounds {
            Some(b) => {
                w == Width::Qword
                    || b.fits_signed(w)
                    || (unsigned_ok && b.min >= 0 && i128::from(b.max) <= w.max_unsigned())
            }
            None => matches!(w, Width::Dword | Width::Qword),
        },
    }
}

/// General-purpose register of width `w`.
pub fn is_register(op: &Operand, w: Width) -> bool {
    match op.kind {
        OperandKind::Register(r) => r.class() == RegisterClass::General && r.width() == w,
        _ => false,
    }
}

/// Memory operand whose size is `w` or not yet known.
pub fn is_memory(op: &Operand, w: Width) -> bool {
    matches!(op.kind, OperandKind::Memory(_)) && op.size.map_or(true, |s| s == w)
}

/// [`is_register`] or [`is_memory`].
pub fn is_register_or_memory(op: &Operand, w: Width) -> bool {
    is_register(op, w) || is_memory(op, w)
}

fn is_sized_memory(op: &Operand, w: Width) -> bool {
    matches!(op.kind, OperandKind::Memory(_)) && op.size == Some(w)
}

fn is_unsized_memory(op: &Operand) -> bool {
    matches!(op.kind, OperandKind::Memory(_)) && op.size.is_none()
}

// ─── Shapes ─────────────────────────────────────────────────────────────────

/// One operand slot of an encoding-table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Shape {
    /// Immediate field of width W, zero- or sign-extension irrelevant.
    Imm(Width),
    /// Immediate of width W sign-extended to the operand size.
    ImmSx(Width),
    /// The constant 1 (shift-by-one forms).
    One,
    /// Branch target encoded as a W-wide displacement from the next
    /// instruction.
    Rel(Width),
    /// General-purpose register of width W.
    Reg(Width),
    /// This exact register.
    FixedReg(Register),
    /// Segment register.
    Sreg,
    /// Register or memory of width W.
    Rm(Width),
    /// Register or memory of width W; unsized memory defaults to W.
    RmDefault(Width),
    /// Memory of width W.
    Mem(Width),
    /// Memory of any size (`lea`).
    MemAny,
}

impl Shape {
    /// Check one operand against this slot, ignoring the unsized-memory
    /// rule that needs the whole operand list.
    pub fn matches(self, op: &Operand) -> bool {
        match self {
            Shape::Imm(w) => fits_immediate_field(op, w),
            Shape::ImmSx(w) => {
                is_immediate(op, w)
                    && op
                        .as_immediate()
                        .and_then(Immediate::as_fixed)
                        .map_or(true, |v| w == Width::Qword || w.fits_signed(v))
            }
            Shape::One => op
                .as_immediate()
                .is_some_and(|i| i.as_fixed() == Some(1) && i.size.map_or(true, |s| s == Width::Byte)),
            Shape::Rel(w) => match op.as_immediate() {
                Some(imm) if w == Width::Byte => imm.size == Some(Width::Byte),
                Some(imm) => imm.size.map_or(true, |s| s == w),
                None => false,
            },
            Shape::Reg(w) => is_register(op, w),
            Shape::FixedReg(r) => op.as_register() == Some(r),
            Shape::Sreg => op
                .as_register()
                .is_some_and(|r| r.class() == RegisterClass::Segment),
            Shape::Rm(w) => is_register(op, w) || is_sized_memory(op, w),
            Shape::RmDefault(w) => is_register_or_memory(op, w),
            Shape::Mem(w) => is_sized_memory(op, w),
            Shape::MemAny => matches!(op.kind, OperandKind::Memory(_)),
        }
    }

    /// Memory-capable slot width, for the unsized-memory rule.
    fn memory_width(self) -> Option<Width> {
        match self {
            Shape::Rm(w) | Shape::Mem(w) => Some(w),
            _ => None,
        }
    }

    /// True for slots that land in ModR/M.rm.
    pub fn is_rm(self) -> bool {
        matches!(
            self,
            Shape::Rm(_) | Shape::RmDefault(_) | Shape::Mem(_) | Shape::MemAny
        )
    }
}

/// Check a whole operand list against a row of shapes.
///
/// An unsized memory operand satisfies `Rm(W)`/`Mem(W)` only when another
/// slot is `Reg(W)` and holds a register of that width, so `mov [rbx], eax`
/// matches while `mov [rbx], 5` does not.
pub fn matches_scheme(shapes: &[Shape], ops: &[Operand]) -> bool {
    if shapes.len() != ops.len() {
        return false;
    }
    shapes.iter().zip(ops).enumerate().all(|(i, (&shape, op))| {
        if shape.matches(op) {
            return true;
        }
        match shape.memory_width() {
            Some(w) if is_unsized_memory(op) => {
                shapes.iter().zip(ops).enumerate().any(|(j, (&other, other_op))| {
                    j != i && other == Shape::Reg(w) && is_register(other_op, w)
                })
            }
            _ => false,
        }
    })
}
