//! Sequential layout and patching of deferred fields.
//!
//! The linker lays instructions out back to back from the base address,
//! records label addresses, and patches every deferred displacement,
//! immediate and branch field in place. Field widths were fixed by the
//! encoder and never change here, so one layout pass is enough.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use log::debug;

use crate::builder::{FieldKind, Instruction};
use crate::checked;
use crate::error::{AsmError, Span};
use crate::ir::{Expr, ResolveError, Width};

/// One unit of layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    /// A label bound to the current address.
    Label {
        /// Label name.
        name: String,
        /// Source location of the definition.
        span: Span,
    },
    /// An encoded instruction.
    Instruction(Instruction),
}

/// Result of [`Linker::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Linked {
    /// Machine code.
    pub bytes: Vec<u8>,
    /// Label addresses in definition order.
    pub labels: Vec<(String, u64)>,
    /// Every instruction with its address, fields patched.
    pub instructions: Vec<(u64, Instruction)>,
}

/// Collects labels and instructions, then lays them out.
#[derive(Debug, Default)]
pub struct Linker {
    items: Vec<Item>,
    base_address: u64,
    externals: BTreeMap<String, u64>,
}

impl Linker {
    /// Create an empty linker with base address 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the address of the first byte.
    pub fn set_base_address(&mut self, addr: u64) {
        self.base_address = addr;
    }

    /// The address of the first byte.
    pub fn base_address(&self) -> u64 {
        self.base_address
    }

    /// Number of labels and instructions added so far.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Define a symbol that lives outside the assembled code.
    pub fn define_external(&mut self, name: &str, addr: u64) {
        self.externals.insert(String::from(name), addr);
    }

    /// Bind a label to the current position.
    ///
    /// # Errors
    ///
    /// Returns [`AsmError::AllocationFailure`] if the item list cannot grow.
    pub fn add_label(&mut self, name: &str, span: Span) -> Result<(), AsmError> {
        checked::try_push(
            &mut self.items,
            Item::Label {
                name: String::from(name),
                span,
            },
        )
    }

    /// Append an encoded instruction.
    ///
    /// # Errors
    ///
    /// Returns [`AsmError::AllocationFailure`] if the item list cannot grow.
    pub fn add_instruction(&mut self, instr: Instruction) -> Result<(), AsmError> {
        checked::try_push(&mut self.items, Item::Instruction(instr))
    }

    /// Lay out every item, patch deferred fields and produce the bytes.
    ///
    /// Errors in individual fields are collected; all of them are returned
    /// together through [`AsmError::from_errors`].
    ///
    /// # Errors
    ///
    /// [`AsmError::DuplicateLabel`], [`AsmError::UndefinedLabel`],
    /// [`AsmError::BranchOutOfRange`], [`AsmError::ImmediateOverflow`],
    /// [`AsmError::AllocationFailure`], or [`AsmError::Multiple`].
    pub fn resolve(self) -> Result<Linked, AsmError> {
        let mut errors = Vec::new();

        // Pass 1: addresses.
        let mut addresses: BTreeMap<String, (u64, Span)> = BTreeMap::new();
        let mut labels = Vec::new();
        let mut instructions = Vec::new();
        let mut pc = self.base_address;
        for item in self.items {
            match item {
                Item::Label { name, span } => {
                    if let Some(&(_, first_span)) = addresses.get(&name) {
                        errors.push(AsmError::DuplicateLabel {
                            label: name,
                            span,
                            first_span,
                        });
                        continue;
                    }
                    addresses.insert(name.clone(), (pc, span));
                    checked::try_push(&mut labels, (name, pc))?;
                }
                Item::Instruction(instr) => {
                    let len = instr.len() as u64;
                    checked::try_push(&mut instructions, (pc, instr))?;
                    pc = pc.checked_add(len).ok_or_else(|| AsmError::ResourceLimitExceeded {
                        resource: String::from("address space"),
                        limit: usize::MAX,
                    })?;
                }
            }
        }
        debug!(
            "layout: {} labels, {} instructions, {:#x}..{:#x}",
            labels.len(),
            instructions.len(),
            self.base_address,
            pc
        );

        let lookup = |name: &str| -> Option<i64> {
            addresses
                .get(name)
                .map(|&(addr, _)| addr)
                .or_else(|| self.externals.get(name).copied())
                .and_then(|addr| i64::try_from(addr).ok())
        };

        // Pass 2: patch.
        for (addr, instr) in &mut instructions {
            let end = *addr + instr.len() as u64;
            let span = instr.span;
            for kind in [FieldKind::Displacement, FieldKind::Immediate, FieldKind::Branch] {
                let field = instr.field_mut(kind);
                let Some(expr) = &field.deferred else {
                    continue;
                };
                let patched = resolve_field(
                    expr,
                    kind,
                    field.size,
                    field.pc_relative,
                    field.signed,
                    end,
                    &lookup,
                    span,
                );
                match patched {
                    Ok(v) => field.value = v,
                    Err(e) => errors.push(e),
                }
            }
        }

        if let Some(err) = AsmError::from_errors(errors) {
            return Err(err);
        }

        // Pass 3: bytes.
        let total = (pc - self.base_address) as usize;
        let mut bytes = Vec::new();
        checked::try_reserve(&mut bytes, total)?;
        for (_, instr) in &instructions {
            checked::try_extend(&mut bytes, &instr.bytes())?;
        }

        Ok(Linked {
            bytes,
            labels,
            instructions,
        })
    }
}

#[allow(clippy::too_many_arguments)]
fn resolve_field(
    expr: &Expr,
    kind: FieldKind,
    size: u8,
    pc_relative: bool,
    signed: bool,
    end: u64,
    lookup: &dyn Fn(&str) -> Option<i64>,
    span: Span,
) -> Result<i64, AsmError> {
    let value = expr.resolve(lookup).map_err(|e| match e {
        ResolveError::Undefined(label) => AsmError::UndefinedLabel { label, span },
        ResolveError::Arithmetic(err) => AsmError::OperandEvaluation {
            detail: alloc::format!("'{}': {}", expr, err),
            span,
        },
    })?;

    let overflow = |value: i128, min: i128, max: i128| AsmError::ImmediateOverflow {
        value,
        min,
        max,
        span,
    };

    let value = if pc_relative {
        let end = i64::try_from(end).map_err(|_| overflow(end as i128, 0, i64::MAX as i128))?;
        value
            .checked_sub(end)
            .ok_or_else(|| overflow(value as i128 - end as i128, i64::MIN as i128, i64::MAX as i128))?
    } else {
        value
    };

    let Some(w) = Width::from_bytes(size) else {
        return Ok(value);
    };
    let fits = if signed { w.fits_signed(value) } else { w.fits(value) };
    if fits {
        return Ok(value);
    }
    let max = if signed { w.max_signed() } else { w.max_unsigned() };
    Err(match kind {
        FieldKind::Branch => AsmError::BranchOutOfRange {
            label: expr.to_string(),
            disp: value,
            max: w.max_signed() as i64,
            span,
        },
        FieldKind::Displacement | FieldKind::Immediate => {
            overflow(value as i128, w.min_signed(), max)
        }
    })
}
