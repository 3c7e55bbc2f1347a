//! Error types and source span tracking for diagnostics.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::register::Register;

/// Source location for diagnostics.
///
/// Tracks the line, column, byte offset, and length of a token or construct
/// in the original assembly source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Span {
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number (byte offset within line).
    pub col: u32,
    /// 0-based byte offset from start of source.
    pub offset: usize,
    /// Byte length of the spanned region.
    pub len: usize,
}

impl Span {
    /// Create a new span.
    #[must_use]
    pub fn new(line: u32, col: u32, offset: usize, len: usize) -> Self {
        Self {
            line,
            col,
            offset,
            len,
        }
    }

    /// A dummy span for generated/internal constructs.
    #[must_use]
    pub fn dummy() -> Self {
        Self::default()
    }

    /// Smallest span covering both `self` and `other`.
    #[must_use]
    pub fn to(self, other: Span) -> Span {
        let end = (other.offset + other.len).max(self.offset + self.len);
        Span {
            len: end.saturating_sub(self.offset),
            ..self
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

// ─── Structural encoder errors ──────────────────────────────────────────────

/// A structural violation detected while encoding one candidate scheme.
///
/// The dispatcher treats these as "this scheme does not apply" and moves on
/// to the next candidate. They only reach the user (wrapped in
/// [`AsmError::Encoding`]) when a single candidate matched the operand shapes
/// or when the violation does not depend on the scheme at all.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EncodingError {
    /// A high-byte register (AH/CH/DH/BH) was combined with something that
    /// needs a REX prefix.
    RexConflict,
    /// The encoding needs a REX prefix but the target mode is not 64-bit.
    RexOutsideLongMode,
    /// SIB scale is not one of 1, 2, 4 or 8.
    IllegalScale {
        /// The rejected scale factor.
        scale: i64,
    },
    /// RIP/EIP-relative addressing cannot carry an index register.
    RipWithIndex,
    /// Register cannot be used as an index (ESP/RSP, or any non-GPR).
    InvalidIndex {
        /// The offending register.
        register: Register,
    },
    /// Register cannot be used as a base in this addressing form.
    InvalidBase {
        /// The offending register.
        register: Register,
    },
    /// Fixed displacement does not fit the largest displacement field.
    DisplacementRange {
        /// The displacement value.
        value: i64,
    },
    /// Address size not available in the target mode.
    AddressSize {
        /// Requested address size in bits.
        bits: u32,
        /// Default width of the target mode in bits.
        mode_bits: u32,
    },
    /// Operand size not available in the target mode.
    OperandSize {
        /// Requested operand size in bits.
        bits: u32,
        /// Default width of the target mode in bits.
        mode_bits: u32,
    },
    /// Two prefixes claim the same legacy prefix group.
    PrefixCollision {
        /// Prefix group number (1–4).
        group: u8,
    },
    /// The encoded instruction exceeds the architectural 15-byte limit.
    TooLong {
        /// Length of the rejected encoding.
        len: usize,
    },
    /// Operand roles cannot be assigned for this scheme.
    InvalidCombination {
        /// What went wrong.
        detail: String,
    },
}

impl fmt::Display for EncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodingError::RexConflict => {
                write!(f, "high-byte register cannot be encoded with a REX prefix")
            }
            EncodingError::RexOutsideLongMode => {
                write!(f, "REX prefix is only available in 64-bit mode")
            }
            EncodingError::IllegalScale { scale } => {
                write!(f, "illegal scale factor {} (expected 1, 2, 4 or 8)", scale)
            }
            EncodingError::RipWithIndex => {
                write!(f, "instruction-pointer relative address cannot have an index")
            }
            EncodingError::InvalidIndex { register } => {
                write!(f, "'{}' cannot be used as an index register", register)
            }
            EncodingError::InvalidBase { register } => {
                write!(f, "'{}' cannot be used as a base register", register)
            }
            EncodingError::DisplacementRange { value } => {
                write!(f, "displacement {} out of range", value)
            }
            EncodingError::AddressSize { bits, mode_bits } => {
                write!(
                    f,
                    "{}-bit addressing is not available in {}-bit mode",
                    bits, mode_bits
                )
            }
            EncodingError::OperandSize { bits, mode_bits } => {
                write!(
                    f,
                    "{}-bit operand size is not available in {}-bit mode",
                    bits, mode_bits
                )
            }
            EncodingError::PrefixCollision { group } => {
                write!(f, "conflicting prefixes in prefix group {}", group)
            }
            EncodingError::TooLong { len } => {
                write!(f, "instruction length {} exceeds 15 bytes", len)
            }
            EncodingError::InvalidCombination { detail } => write!(f, "{}", detail),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for EncodingError {}

// ─── User-facing errors ─────────────────────────────────────────────────────

/// Assembly error with source location and descriptive message.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AsmError {
    /// Syntax error during lexing or parsing.
    Syntax {
        /// The syntax error message.
        msg: String,
        /// Source location of the syntax error.
        span: Span,
    },

    /// Operand expression could not be classified.
    OperandEvaluation {
        /// Description of the failure.
        detail: String,
        /// Source location of the operand.
        span: Span,
    },

    /// Mnemonic is not in the encoding table.
    UnknownMnemonic {
        /// The mnemonic that was not recognized.
        mnemonic: String,
        /// Source location of the unknown mnemonic.
        span: Span,
    },

    /// The operand list matched no encoding scheme of the mnemonic.
    NoMatchingEncoding {
        /// The instruction mnemonic.
        mnemonic: String,
        /// Source location of the instruction.
        span: Span,
    },

    /// Structural encoding failure.
    Encoding {
        /// The structural error.
        error: EncodingError,
        /// Source location of the instruction.
        span: Span,
    },

    /// Immediate value exceeds the allowed range.
    ImmediateOverflow {
        /// The immediate value that overflowed.
        value: i128,
        /// Minimum allowed value.
        min: i128,
        /// Maximum allowed value.
        max: i128,
        /// Source location of the immediate.
        span: Span,
    },

    /// Referenced label was never defined.
    UndefinedLabel {
        /// The undefined label name.
        label: String,
        /// Source location of the reference.
        span: Span,
    },

    /// Label was defined more than once.
    DuplicateLabel {
        /// The duplicated label name.
        label: String,
        /// Source location of the duplicate definition.
        span: Span,
        /// Source location of the first definition.
        first_span: Span,
    },

    /// Branch target does not fit the reserved relative field.
    BranchOutOfRange {
        /// The branch target expression.
        label: String,
        /// The actual displacement to the target.
        disp: i64,
        /// Maximum allowed displacement.
        max: i64,
        /// Source location of the branch instruction.
        span: Span,
    },

    /// A configurable resource limit was exceeded.
    ResourceLimitExceeded {
        /// Human-readable name of the resource (e.g. "statements", "labels").
        resource: String,
        /// The configured limit that was exceeded.
        limit: usize,
    },

    /// A container could not grow.
    AllocationFailure {
        /// Number of additional elements requested.
        requested: usize,
    },

    /// Multiple errors collected during assembly.
    Multiple {
        /// The collected assembly errors.
        errors: Vec<AsmError>,
    },
}

impl AsmError {
    /// Returns `true` for errors that abort the whole run rather than a
    /// single statement.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AsmError::AllocationFailure { .. } | AsmError::ResourceLimitExceeded { .. }
        )
    }

    /// Collapse a list of errors: one error stays as is, more become
    /// [`AsmError::Multiple`].
    pub fn from_errors(mut errors: Vec<AsmError>) -> Option<AsmError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(AsmError::Multiple { errors }),
        }
    }
}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AsmError::Syntax { msg, span } => {
                write!(f, "{}: {}", span, msg)
            }
            AsmError::OperandEvaluation { detail, span } => {
                write!(f, "{}: invalid operand: {}", span, detail)
            }
            AsmError::UnknownMnemonic { mnemonic, span } => {
                write!(f, "{}: unknown mnemonic '{}'", span, mnemonic)
            }
            AsmError::NoMatchingEncoding { mnemonic, span } => {
                write!(
                    f,
                    "{}: invalid operand combination for instruction '{}'",
                    span, mnemonic
                )
            }
            AsmError::Encoding { error, span } => {
                write!(f, "{}: {}", span, error)
            }
            AsmError::ImmediateOverflow {
                value,
                min,
                max,
                span,
            } => {
                write!(
                    f,
                    "{}: immediate value {} out of range [{}..{}]",
                    span, value, min, max
                )
            }
            AsmError::UndefinedLabel { label, span } => {
                write!(f, "{}: undefined label '{}'", span, label)
            }
            AsmError::DuplicateLabel {
                label,
                span,
                first_span,
            } => {
                write!(
                    f,
                    "{}: duplicate label '{}' (first defined at {})",
                    span, label, first_span
                )
            }
            AsmError::BranchOutOfRange {
                label,
                disp,
                max,
                span,
            } => {
                write!(
                    f,
                    "{}: branch target '{}' out of range (displacement={}, max=±{})",
                    span, label, disp, max
                )
            }
            AsmError::ResourceLimitExceeded { resource, limit } => {
                write!(
                    f,
                    "resource limit exceeded: {} (limit: {})",
                    resource, limit
                )
            }
            AsmError::AllocationFailure { requested } => {
                write!(f, "allocation failure ({} more elements requested)", requested)
            }
            AsmError::Multiple { errors } => {
                for (i, e) in errors.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}", e)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AsmError {}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::{format, vec};

    #[test]
    fn span_display() {
        let span = Span::new(3, 12, 45, 5);
        assert_eq!(format!("{}", span), "3:12");
    }

    #[test]
    fn span_dummy() {
        let span = Span::dummy();
        assert_eq!(span.line, 0);
        assert_eq!(span.col, 0);
    }

    #[test]
    fn span_to_covers_both() {
        let a = Span::new(1, 5, 4, 3);
        let b = Span::new(1, 12, 11, 2);
        let joined = a.to(b);
        assert_eq!(joined.offset, 4);
        assert_eq!(joined.len, 9);
        assert_eq!(joined.col, 5);
    }

    #[test]
    fn error_unknown_mnemonic_display() {
        let err = AsmError::UnknownMnemonic {
            mnemonic: "foobar".into(),
            span: Span::new(3, 12, 0, 6),
        };
        assert_eq!(format!("{}", err), "3:12: unknown mnemonic 'foobar'");
    }

    #[test]
    fn error_no_matching_encoding_display() {
        let err = AsmError::NoMatchingEncoding {
            mnemonic: "mov".into(),
            span: Span::new(2, 1, 10, 3),
        };
        assert_eq!(
            format!("{}", err),
            "2:1: invalid operand combination for instruction 'mov'"
        );
    }

    #[test]
    fn error_syntax_display() {
        let err = AsmError::Syntax {
            msg: "unexpected token '!'".into(),
            span: Span::new(1, 5, 4, 1),
        };
        assert_eq!(format!("{}", err), "1:5: unexpected token '!'");
    }

    #[test]
    fn error_operand_evaluation_display() {
        let err = AsmError::OperandEvaluation {
            detail: "invalid operand size".into(),
            span: Span::new(4, 9, 30, 8),
        };
        assert_eq!(format!("{}", err), "4:9: invalid operand: invalid operand size");
    }

    #[test]
    fn error_encoding_display() {
        let err = AsmError::Encoding {
            error: EncodingError::RexConflict,
            span: Span::new(7, 1, 0, 3),
        };
        assert_eq!(
            format!("{}", err),
            "7:1: high-byte register cannot be encoded with a REX prefix"
        );
        let err = AsmError::Encoding {
            error: EncodingError::OperandSize {
                bits: 64,
                mode_bits: 32,
            },
            span: Span::new(1, 1, 0, 3),
        };
        assert_eq!(
            format!("{}", err),
            "1:1: 64-bit operand size is not available in 32-bit mode"
        );
    }

    #[test]
    fn error_undefined_label_display() {
        let err = AsmError::UndefinedLabel {
            label: "my_label".into(),
            span: Span::new(10, 1, 100, 8),
        };
        assert_eq!(format!("{}", err), "10:1: undefined label 'my_label'");
    }

    #[test]
    fn error_immediate_overflow_display() {
        let err = AsmError::ImmediateOverflow {
            value: 256,
            min: -128,
            max: 127,
            span: Span::new(5, 10, 50, 3),
        };
        assert_eq!(
            format!("{}", err),
            "5:10: immediate value 256 out of range [-128..127]"
        );
    }

    #[test]
    fn error_duplicate_label_display() {
        let err = AsmError::DuplicateLabel {
            label: "loop".into(),
            span: Span::new(20, 1, 200, 4),
            first_span: Span::new(5, 1, 50, 4),
        };
        assert_eq!(
            format!("{}", err),
            "20:1: duplicate label 'loop' (first defined at 5:1)"
        );
    }

    #[test]
    fn error_branch_out_of_range_display() {
        let err = AsmError::BranchOutOfRange {
            label: "far_away".into(),
            disp: 500000,
            max: 127,
            span: Span::new(1, 1, 0, 10),
        };
        assert_eq!(
            format!("{}", err),
            "1:1: branch target 'far_away' out of range (displacement=500000, max=±127)"
        );
    }

    #[test]
    fn error_multiple_display() {
        let err = AsmError::Multiple {
            errors: vec![
                AsmError::Syntax {
                    msg: "err1".into(),
                    span: Span::new(1, 1, 0, 1),
                },
                AsmError::Syntax {
                    msg: "err2".into(),
                    span: Span::new(2, 1, 5, 1),
                },
            ],
        };
        let s = format!("{}", err);
        assert!(s.contains("err1"));
        assert!(s.contains("err2"));
    }

    #[test]
    fn error_resource_limit_exceeded_display() {
        let err = AsmError::ResourceLimitExceeded {
            resource: "statements".into(),
            limit: 1_000_000,
        };
        assert_eq!(
            format!("{}", err),
            "resource limit exceeded: statements (limit: 1000000)"
        );
        assert!(err.is_fatal());
    }

    #[test]
    fn from_errors_collapses() {
        assert_eq!(AsmError::from_errors(Vec::new()), None);
        let one = AsmError::UndefinedLabel {
            label: "x".into(),
            span: Span::dummy(),
        };
        assert_eq!(AsmError::from_errors(vec![one.clone()]), Some(one.clone()));
        let many = AsmError::from_errors(vec![one.clone(), one]).unwrap();
        assert!(matches!(many, AsmError::Multiple { ref errors } if errors.len() == 2));
    }
}
