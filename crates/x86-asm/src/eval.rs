//! Operand evaluator: turns parsed operand syntax into classified
//! [`Operand`]s.
//!
//! Evaluation is a fold over the expression tree. Registers found by name
//! become register values, integers become fixed immediates, and any other
//! identifier becomes a deferred immediate. Arithmetic between registers and
//! immediates builds memory addresses. Symbols are looked up through a
//! read-only [`SymbolTable`]; the evaluator never mutates it.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::checked;
use crate::error::{AsmError, Span};
use crate::ir::{Expr, InfixOp, OperandSyntax, PrefixOp, Width};
use crate::operand::{Bounds, ImmValue, Immediate, Index, Memory, Operand};
use crate::register::Register;

// ─── Symbol tables ──────────────────────────────────────────────────────────

/// Read-only symbol lookup used during operand evaluation.
pub trait SymbolTable {
    /// Range of addresses the symbol may resolve to, or `None` when the
    /// symbol is unknown.
    fn lookup(&self, name: &str) -> Option<Bounds>;
}

/// A symbol table with no entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSymbols;

impl SymbolTable for NoSymbols {
    fn lookup(&self, _name: &str) -> Option<Bounds> {
        None
    }
}

/// Label table built by the assembler's pre-pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelTable {
    entries: BTreeMap<String, Bounds>,
}

impl LabelTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a symbol. Returns the previous bounds if the name was taken.
    pub fn define(&mut self, name: impl Into<String>, bounds: Bounds) -> Option<Bounds> {
        self.entries.insert(name.into(), bounds)
    }

    /// Number of symbols.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No symbols at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Symbols in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Bounds)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl SymbolTable for LabelTable {
    fn lookup(&self, name: &str) -> Option<Bounds> {
        self.entries.get(name).copied()
    }
}

// ─── Evaluator ──────────────────────────────────────────────────────────────

/// Intermediate evaluation result.
#[derive(Debug, Clone)]
enum Value {
    Reg(Register),
    Imm(Immediate),
    Mem(Memory),
}

/// Classifies operands against a symbol table.
pub struct Evaluator<'t> {
    symbols: &'t dyn SymbolTable,
}

impl<'t> Evaluator<'t> {
    /// Evaluator resolving symbols through `symbols`.
    pub fn new(symbols: &'t dyn SymbolTable) -> Self {
        Self { symbols }
    }

    /// Classify one operand.
    ///
    /// # Errors
    ///
    /// Returns [`AsmError::OperandEvaluation`] for unsupported operator and
    /// operand combinations, size conflicts, malformed addresses and
    /// undefined symbols outside of an address.
    pub fn evaluate(&self, syn: &OperandSyntax) -> Result<Operand, AsmError> {
        let span = syn.span;
        let value = self.eval(&syn.expr, syn.address, span)?;

        let value = if syn.address {
            Value::Mem(match value {
                Value::Reg(r) => Memory {
                    base: Some(r),
                    ..Memory::default()
                },
                Value::Imm(i) => Memory {
                    disp: Some(i),
                    ..Memory::default()
                },
                Value::Mem(m) => m,
            })
        } else {
            value
        };

        match value {
            Value::Reg(reg) => {
                if let Some(w) = syn.size {
                    if w != reg.width() {
                        return Err(fail(
                            alloc::format!("invalid operand size: '{}' is not {}", reg, w),
                            span,
                        ));
                    }
                }
                Ok(Operand::register(reg, span))
            }
            Value::Imm(mut imm) => {
                if let Some(w) = syn.size {
                    // `short`/`near` bound the displacement; the linker checks it.
                    if let ImmValue::Fixed(v) = imm.value {
                        if !syn.distance && !w.fits(v) {
                            return Err(fail(
                                alloc::format!("value {} does not fit in {}", v, w),
                                span,
                            ));
                        }
                    }
                    imm.size = Some(w);
                }
                Ok(Operand::immediate(imm, span))
            }
            Value::Mem(mut mem) => {
                mem.segment = syn.segment;
                mem.address_size = resolve_address_size(&mem, syn.address_size, span)?;
                Ok(Operand::memory(mem, syn.size, span))
            }
        }
    }

    /// Classify every operand of a statement.
    ///
    /// # Errors
    ///
    /// Returns the first operand that fails to evaluate.
    pub fn evaluate_all(&self, operands: &[OperandSyntax]) -> Result<Vec<Operand>, AsmError> {
        operands.iter().map(|op| self.evaluate(op)).collect()
    }

    fn eval(&self, expr: &Expr, in_address: bool, span: Span) -> Result<Value, AsmError> {
        match expr {
            Expr::Int(v) => Ok(Value::Imm(Immediate::fixed(*v))),
            Expr::Var(name) => {
                if let Some(reg) = Register::from_name(name) {
                    return Ok(Value::Reg(reg));
                }
                let bounds = self.symbols.lookup(name);
                if bounds.is_none() && !in_address {
                    return Err(fail(alloc::format!("undefined symbol '{}'", name), span));
                }
                Ok(Value::Imm(Immediate::deferred(expr.clone(), bounds)))
            }
            Expr::Prefix(op, inner) => match self.eval(inner, in_address, span)? {
                Value::Imm(imm) => self.unary(*op, imm, span).map(Value::Imm),
                _ => Err(fail(
                    "unary operator needs an immediate operand",
                    span,
                )),
            },
            Expr::Infix(op, lhs, rhs) => {
                let l = self.eval(lhs, in_address, span)?;
                let r = self.eval(rhs, in_address, span)?;
                self.combine(*op, l, r, span)
            }
        }
    }

    fn unary(&self, op: PrefixOp, imm: Immediate, span: Span) -> Result<Immediate, AsmError> {
        match imm.value {
            ImmValue::Fixed(v) => checked::unary(op, v)
                .map(Immediate::fixed)
                .map_err(|e| fail(e.to_string(), span)),
            ImmValue::Expr(d) => Ok(self.deferred(Expr::prefix(op, d.expr))),
        }
    }

    fn deferred(&self, expr: Expr) -> Immediate {
        let bounds = self.bounds(&expr);
        Immediate::deferred(expr, bounds)
    }

    fn arith(&self, op: InfixOp, a: Immediate, b: Immediate, span: Span) -> Result<Immediate, AsmError> {
        match (a.value, b.value) {
            (ImmValue::Fixed(x), ImmValue::Fixed(y)) => checked::apply(op, x, y)
                .map(Immediate::fixed)
                .map_err(|e| fail(e.to_string(), span)),
            (ImmValue::Expr(_), ImmValue::Expr(_)) if matches!(op, InfixOp::Mul | InfixOp::Div) => {
                Err(fail(
                    "cannot multiply or divide two symbolic values",
                    span,
                ))
            }
            (x, y) => Ok(self.deferred(Expr::infix(op, into_expr(x), into_expr(y)))),
        }
    }

    fn combine(&self, op: InfixOp, l: Value, r: Value, span: Span) -> Result<Value, AsmError> {
        use Value::*;
        match (op, l, r) {
            (_, Imm(a), Imm(b)) => self.arith(op, a, b, span).map(Imm),
            (InfixOp::Add, Reg(reg), Imm(disp)) | (InfixOp::Add, Imm(disp), Reg(reg)) => {
                Ok(Mem(Memory {
                    base: Some(reg),
                    disp: Some(disp),
                    ..Memory::default()
                }))
            }
            (InfixOp::Sub, Reg(reg), Imm(disp)) => Ok(Mem(Memory {
                base: Some(reg),
                disp: Some(self.unary(PrefixOp::Neg, disp, span)?),
                ..Memory::default()
            })),
            (InfixOp::Add, Reg(base), Reg(index)) => Ok(Mem(Memory {
                base: Some(base),
                index: Some(Index {
                    reg: index,
                    scale: 1,
                }),
                ..Memory::default()
            })),
            (InfixOp::Mul, Reg(reg), Imm(scale)) | (InfixOp::Mul, Imm(scale), Reg(reg)) => {
                let scale = scale
                    .as_fixed()
                    .ok_or_else(|| fail("scale factor must be a constant", span))?;
                Ok(Mem(Memory {
                    index: Some(Index { reg, scale }),
                    ..Memory::default()
                }))
            }
            (InfixOp::Add, Mem(mut m), Reg(reg)) | (InfixOp::Add, Reg(reg), Mem(mut m)) => {
                if m.base.is_some() {
                    return Err(fail("invalid syntax: address already has a base register", span));
                }
                m.base = Some(reg);
                Ok(Mem(m))
            }
            (InfixOp::Add | InfixOp::Sub, Mem(mut m), Imm(disp)) => {
                m.disp = Some(match m.disp.take() {
                    Some(old) => self.arith(op, old, disp, span)?,
                    None if op == InfixOp::Sub => self.unary(PrefixOp::Neg, disp, span)?,
                    None => disp,
                });
                Ok(Mem(m))
            }
            (InfixOp::Add, Imm(disp), Mem(mut m)) => {
                m.disp = Some(match m.disp.take() {
                    Some(old) => self.arith(InfixOp::Add, disp, old, span)?,
                    None => disp,
                });
                Ok(Mem(m))
            }
            _ => Err(fail("invalid syntax", span)),
        }
    }

    /// Conservative interval of `expr` over the symbol table's bounds.
    fn bounds(&self, expr: &Expr) -> Option<Bounds> {
        match expr {
            Expr::Int(v) => Some(Bounds::exact(*v)),
            Expr::Var(name) => self.symbols.lookup(name),
            Expr::Prefix(op, inner) => {
                let b = self.bounds(inner)?;
                match op {
                    PrefixOp::Plus => Some(b),
                    PrefixOp::Neg => Some(Bounds {
                        min: b.max.checked_neg()?,
                        max: b.min.checked_neg()?,
                    }),
                    PrefixOp::Not => Some(Bounds {
                        min: !b.max,
                        max: !b.min,
                    }),
                }
            }
            Expr::Infix(op, lhs, rhs) => {
                let a = self.bounds(lhs)?;
                let b = self.bounds(rhs)?;
                match op {
                    InfixOp::Add => Some(Bounds {
                        min: a.min.checked_add(b.min)?,
                        max: a.max.checked_add(b.max)?,
                    }),
                    InfixOp::Sub => Some(Bounds {
                        min: a.min.checked_sub(b.max)?,
                        max: a.max.checked_sub(b.min)?,
                    }),
                    InfixOp::Mul => corners(a, b, i64::checked_mul),
                    InfixOp::Div if b.min == b.max && b.min != 0 => {
                        corners(a, b, i64::checked_div)
                    }
                    InfixOp::Div => None,
                }
            }
        }
    }
}

fn fail(detail: impl Into<String>, span: Span) -> AsmError {
    AsmError::OperandEvaluation {
        detail: detail.into(),
        span,
    }
}

/// Check address registers and settle the address size.
fn resolve_address_size(
    mem: &Memory,
    declared: Option<Width>,
    span: Span,
) -> Result<Option<Width>, AsmError> {
    let mut size: Option<Width> = None;

    if let Some(base) = mem.base {
        let ok = base.is_address_register()
            || matches!(base, Register::Rip | Register::Eip);
        if !ok {
            return Err(fail(
                alloc::format!("'{}' cannot be used as a base register", base),
                span,
            ));
        }
        size = Some(base.width());
    }

    if let Some(index) = mem.index {
        let reg = index.reg;
        if !reg.is_address_register() {
            return Err(fail(
                alloc::format!("'{}' cannot be used as an index register", reg),
                span,
            ));
        }
        if matches!(mem.base, Some(Register::Rip | Register::Eip)) {
            return Err(fail("instruction pointer cannot be combined with an index", span));
        }
        match size {
            Some(w) if w != reg.width() => {
                return Err(fail("mismatched address register sizes", span));
            }
            _ => size = Some(reg.width()),
        }
    }

    match (size, declared) {
        (_, Some(Width::Byte)) => Err(fail("invalid address size", span)),
        (Some(w), Some(d)) if w != d => Err(fail(
            alloc::format!("address registers are {} but {} addressing was requested", w, d),
            span,
        )),
        (Some(w), _) => Ok(Some(w)),
        (None, d) => Ok(d),
    }
}

fn into_expr(v: ImmValue) -> Expr {
    match v {
        ImmValue::Fixed(n) => Expr::Int(n),
        ImmValue::Expr(d) => d.expr,
    }
}

fn corners(a: Bounds, b: Bounds, f: fn(i64, i64) -> Option<i64>) -> Option<Bounds> {
    let vals = [
        f(a.min, b.min)?,
        f(a.min, b.max)?,
        f(a.max, b.min)?,
        f(a.max, b.max)?,
    ];
    Some(Bounds {
        min: vals.iter().copied().min()?,
        max: vals.iter().copied().max()?,
    })
}
