//! Public assembler API: builder pattern and one-shot assembly.
//!
//! This module ties together the lexer, parser, dispatcher and linker. Source
//! text is collected with [`Assembler::emit`]; [`Assembler::encode`] runs the
//! label pre-pass and encodes every statement, and [`Assembler::finish`]
//! lays the result out and patches deferred fields.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use log::debug;

use crate::builder::{build_instruction, Instruction};
use crate::checked;
use crate::encoder::MAX_INSTRUCTION_LEN;
use crate::error::{AsmError, Span};
use crate::eval::LabelTable;
use crate::ir::{Statement, TargetMode};
use crate::lexer;
use crate::linker::{Item, Linker};
use crate::operand::Bounds;
use crate::parser;

/// The result of a successful assembly operation.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[must_use]
pub struct AssemblyResult {
    /// The assembled machine code.
    bytes: Vec<u8>,
    /// Label addresses (name → absolute address), in definition order.
    labels: Vec<(String, u64)>,
    /// Every instruction with its address.
    instructions: Vec<(u64, Instruction)>,
    /// Base address used during assembly.
    base_address: u64,
    /// Source text annotations: `(address, source_text)` for listing.
    source_annotations: Vec<(u64, String)>,
}

impl AssemblyResult {
    /// Get the assembled bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// use x86_asm::{Assembler, TargetMode};
    ///
    /// let mut asm = Assembler::new(TargetMode::O64);
    /// asm.emit("nop")?;
    /// let result = asm.finish()?;
    /// assert_eq!(result.bytes(), &[0x90]);
    /// # Ok::<(), x86_asm::AsmError>(())
    /// ```
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume and return the bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Number of output bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True when nothing was emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Every label with its absolute address.
    #[must_use]
    pub fn labels(&self) -> &[(String, u64)] {
        &self.labels
    }

    /// Address of one label.
    ///
    /// # Examples
    ///
    /// ```
    /// use x86_asm::{Assembler, TargetMode};
    ///
    /// let mut asm = Assembler::new(TargetMode::O64);
    /// asm.base_address(0x1000);
    /// asm.emit("nop\nentry: ret")?;
    /// let result = asm.finish()?;
    /// assert_eq!(result.label_address("entry"), Some(0x1001));
    /// # Ok::<(), x86_asm::AsmError>(())
    /// ```
    #[must_use]
    pub fn label_address(&self, name: &str) -> Option<u64> {
        self.labels
            .iter()
            .find(|(n, _)| n == name)
            .map(|&(_, addr)| addr)
    }

    /// Every encoded instruction with its address, deferred fields patched.
    #[must_use]
    pub fn instructions(&self) -> &[(u64, Instruction)] {
        &self.instructions
    }

    /// The base address used for assembly.
    #[must_use]
    pub fn base_address(&self) -> u64 {
        self.base_address
    }

    /// Human-readable listing: address, bytes and source of each
    /// instruction, with label lines in between.
    ///
    /// Source text is only present when [`Assembler::enable_listing`] was
    /// called before emitting.
    ///
    /// ```text
    /// 00000000                  entry:
    /// 00000000  55                push rbp
    /// 00000001  4889E5            mov rbp, rsp
    /// ```
    #[must_use]
    pub fn listing(&self) -> String {
        use core::fmt::Write;

        let mut out = String::new();
        let source_at: BTreeMap<u64, &str> = self
            .source_annotations
            .iter()
            .map(|(addr, text)| (*addr, text.as_str()))
            .collect();

        let mut labels = self.labels.iter().peekable();
        for (addr, instr) in &self.instructions {
            while let Some((name, at)) = labels.next_if(|(_, at)| at <= addr) {
                let _ = writeln!(out, "{:08X}                  {}:", at, name);
            }
            let hex = instr.to_string();
            match source_at.get(addr) {
                Some(text) => {
                    let _ = writeln!(out, "{:08X}  {:<16}  {}", addr, hex, text);
                }
                None => {
                    let _ = writeln!(out, "{:08X}  {}", addr, hex);
                }
            }
        }
        // Labels after the last instruction.
        for (name, addr) in labels {
            let _ = writeln!(out, "{:08X}                  {}:", addr, name);
        }
        out
    }
}

/// Configurable resource limits for defense against denial-of-service.
///
/// When processing untrusted assembly input, these limits prevent pathological
/// inputs from consuming unbounded memory or CPU time.
///
/// # Examples
///
/// ```rust
/// use x86_asm::{Assembler, TargetMode};
/// use x86_asm::assembler::ResourceLimits;
///
/// let mut asm = Assembler::new(TargetMode::O64);
/// asm.limits(ResourceLimits {
///     max_statements: 1_000,
///     max_labels: 100,
///     max_output_bytes: 4096,
///     max_errors: 16,
///     max_source_bytes: 64 * 1024,
/// });
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResourceLimits {
    /// Maximum number of parsed statements (instructions + labels + mode
    /// switches). Default: 1,000,000.
    pub max_statements: usize,
    /// Maximum number of labels that can be defined. Default: 100,000.
    pub max_labels: usize,
    /// Maximum output size in bytes. Default: 16 MiB.
    pub max_output_bytes: usize,
    /// Maximum accumulated errors before bailing. Default: 64.
    pub max_errors: usize,
    /// Maximum input source bytes per `emit()` call. Default: 64 MiB.
    pub max_source_bytes: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_statements: 1_000_000,
            max_labels: 100_000,
            max_output_bytes: 16 * 1024 * 1024,
            max_errors: 64,
            max_source_bytes: 64 * 1024 * 1024,
        }
    }
}

/// One encoded statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Index of the statement in emission order.
    pub statement: usize,
    /// The label or instruction it produced.
    pub item: Item,
}

/// Output of [`Assembler::encode`]: records of every statement that encoded
/// and the errors of every statement that did not.
#[derive(Debug, Clone)]
pub struct Encoded {
    /// Successful statements in source order.
    pub records: Vec<Record>,
    /// Contained per-statement errors.
    pub errors: Vec<AsmError>,
    /// Label table the statements were encoded against.
    pub symbols: LabelTable,
}

/// Builder-pattern assembler.
///
/// # Examples
///
/// ```rust
/// use x86_asm::{Assembler, TargetMode};
///
/// let mut asm = Assembler::new(TargetMode::O64);
/// asm.emit("push rbp").unwrap();
/// asm.emit("mov rbp, rsp").unwrap();
/// asm.emit("pop rbp").unwrap();
/// asm.emit("ret").unwrap();
/// let result = asm.finish().unwrap();
/// assert_eq!(result.bytes(), &[0x55, 0x48, 0x89, 0xE5, 0x5D, 0xC3]);
/// ```
#[derive(Debug)]
pub struct Assembler {
    /// Mode at the start of the source; `.codeNN` switches from there.
    mode: TargetMode,
    base_address: u64,
    externals: BTreeMap<String, u64>,
    statements: Vec<Statement>,
    /// Errors found while lexing and parsing.
    errors: Vec<AsmError>,
    /// Statement index → source text, for listing.
    annotations: BTreeMap<usize, String>,
    /// Whether to collect source annotations for listing output.
    /// Off by default to avoid per-statement String allocations.
    listing_enabled: bool,
    resource_limits: ResourceLimits,
    label_count: usize,
}

impl Assembler {
    /// Create a new assembler starting in `mode`.
    pub fn new(mode: TargetMode) -> Self {
        Self {
            mode,
            base_address: 0,
            externals: BTreeMap::new(),
            statements: Vec::new(),
            errors: Vec::new(),
            annotations: BTreeMap::new(),
            listing_enabled: false,
            resource_limits: ResourceLimits::default(),
            label_count: 0,
        }
    }

    /// Set resource limits for defense against pathological inputs.
    pub fn limits(&mut self, limits: ResourceLimits) -> &mut Self {
        self.resource_limits = limits;
        self
    }

    /// Collect source text for [`AssemblyResult::listing`].
    pub fn enable_listing(&mut self) -> &mut Self {
        self.listing_enabled = true;
        self
    }

    /// Set the address of the first output byte.
    pub fn base_address(&mut self, addr: u64) -> &mut Self {
        self.base_address = addr;
        self
    }

    /// Define a label that lives outside the assembled code.
    ///
    /// # Examples
    ///
    /// ```
    /// use x86_asm::{Assembler, TargetMode};
    ///
    /// let mut asm = Assembler::new(TargetMode::O64);
    /// asm.define_external("exit", 0x4000);
    /// asm.emit("mov eax, exit")?;
    /// let result = asm.finish()?;
    /// assert_eq!(result.bytes(), &[0xB8, 0x00, 0x40, 0x00, 0x00]);
    /// # Ok::<(), x86_asm::AsmError>(())
    /// ```
    pub fn define_external(&mut self, name: &str, addr: u64) -> &mut Self {
        self.externals.insert(String::from(name), addr);
        self
    }

    /// Emit assembly source text. Can be called multiple times.
    ///
    /// Syntax errors are collected and reported by [`Assembler::finish`];
    /// well-formed statements around them are kept.
    ///
    /// # Errors
    ///
    /// Returns [`AsmError::ResourceLimitExceeded`] if a resource limit is
    /// exceeded, or [`AsmError::AllocationFailure`].
    pub fn emit(&mut self, source: &str) -> Result<&mut Self, AsmError> {
        if source.len() > self.resource_limits.max_source_bytes {
            return Err(limit("source bytes", self.resource_limits.max_source_bytes));
        }

        let tokens = match lexer::tokenize(source) {
            Ok(tokens) => tokens,
            Err(e) => {
                self.record_error(e)?;
                return Ok(self);
            }
        };
        let (statements, errors) = parser::parse_recovering(&tokens);
        for e in errors {
            self.record_error(e)?;
        }

        if self.statements.len() + statements.len() > self.resource_limits.max_statements {
            return Err(limit("statements", self.resource_limits.max_statements));
        }
        checked::try_reserve(&mut self.statements, statements.len())?;
        for stmt in statements {
            match &stmt {
                Statement::Label(..) => self.count_label()?,
                Statement::Instruction(instr) if self.listing_enabled => {
                    let text = extract_source_line(source, instr.span);
                    self.annotations
                        .insert(self.statements.len(), String::from(text));
                }
                _ => {}
            }
            self.statements.push(stmt);
        }
        Ok(self)
    }

    /// Add a label at the current position (builder API).
    ///
    /// # Examples
    ///
    /// ```
    /// use x86_asm::{Assembler, TargetMode};
    ///
    /// let mut asm = Assembler::new(TargetMode::O64);
    /// asm.label("entry")?;
    /// asm.emit("nop")?;
    /// let result = asm.finish()?;
    /// assert_eq!(result.label_address("entry"), Some(0));
    /// # Ok::<(), x86_asm::AsmError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`AsmError::ResourceLimitExceeded`] if the label or statement
    /// limit is reached.
    pub fn label(&mut self, name: &str) -> Result<&mut Self, AsmError> {
        if self.statements.len() >= self.resource_limits.max_statements {
            return Err(limit("statements", self.resource_limits.max_statements));
        }
        self.count_label()?;
        checked::try_push(
            &mut self.statements,
            Statement::Label(String::from(name), Span::dummy()),
        )?;
        Ok(self)
    }

    /// Number of statements collected so far.
    pub fn statement_count(&self) -> usize {
        self.statements.len()
    }

    /// Reset the assembler to its initial state, keeping configuration
    /// (mode, base address, externals, limits, listing) intact.
    pub fn reset(&mut self) -> &mut Self {
        self.statements.clear();
        self.errors.clear();
        self.annotations.clear();
        self.label_count = 0;
        self
    }

    /// Read-only label table for the encoding pass.
    ///
    /// Externals get their exact address. The label following `n`
    /// instructions gets `[base + n, base + 15·n]`, since every instruction
    /// is between 1 and 15 bytes long.
    pub fn label_table(&self) -> LabelTable {
        let mut table = LabelTable::new();
        for (name, &addr) in &self.externals {
            table.define(name.clone(), Bounds::exact(clamp(addr)));
        }

        let base = self.base_address;
        let mut n: u64 = 0;
        for stmt in &self.statements {
            match stmt {
                Statement::Instruction(_) => n += 1,
                Statement::Label(name, _) => {
                    let bounds = Bounds {
                        min: clamp(base.saturating_add(n)),
                        max: clamp(base.saturating_add(n.saturating_mul(MAX_INSTRUCTION_LEN as u64))),
                    };
                    // A redefinition is reported by the linker; keep the
                    // union so encoding stays conservative until then.
                    if let Some(prev) = table.define(name.clone(), bounds) {
                        table.define(
                            name.clone(),
                            Bounds {
                                min: prev.min.min(bounds.min),
                                max: prev.max.max(bounds.max),
                            },
                        );
                    }
                }
                Statement::CodeMode(..) => {}
            }
        }
        table
    }

    /// Encode every collected statement.
    ///
    /// Errors of individual statements are contained in
    /// [`Encoded::errors`]; the other statements still encode.
    ///
    /// # Errors
    ///
    /// Only fatal errors are returned: [`AsmError::AllocationFailure`] and
    /// [`AsmError::ResourceLimitExceeded`] (output size or error count).
    pub fn encode(&self) -> Result<Encoded, AsmError> {
        let symbols = self.label_table();
        let limits = &self.resource_limits;

        let mut records = Vec::new();
        checked::try_reserve(&mut records, self.statements.len())?;
        let mut errors = self.errors.clone();
        let mut mode = self.mode;
        let mut scratch = Vec::new();
        let mut output_bytes = 0usize;

        for (index, stmt) in self.statements.iter().enumerate() {
            match stmt {
                Statement::Label(name, span) => records.push(Record {
                    statement: index,
                    item: Item::Label {
                        name: name.clone(),
                        span: *span,
                    },
                }),
                Statement::CodeMode(m, _) => {
                    debug!("switching to {}-bit mode", m.bits());
                    mode = *m;
                }
                Statement::Instruction(instr) => {
                    match build_instruction(instr, mode, &symbols, &mut scratch) {
                        Ok(()) => {
                            for encoded in scratch.drain(..) {
                                output_bytes += encoded.len();
                                if output_bytes > limits.max_output_bytes {
                                    return Err(limit("output bytes", limits.max_output_bytes));
                                }
                                records.push(Record {
                                    statement: index,
                                    item: Item::Instruction(encoded),
                                });
                            }
                        }
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => {
                            checked::try_push(&mut errors, e)?;
                            if errors.len() > limits.max_errors {
                                return Err(limit("errors", limits.max_errors));
                            }
                        }
                    }
                }
            }
        }

        debug!(
            "encoded {} statements: {} records, {} errors",
            self.statements.len(),
            records.len(),
            errors.len()
        );
        Ok(Encoded {
            records,
            errors,
            symbols,
        })
    }

    /// Finalize assembly: encode, resolve labels, patch deferred fields.
    ///
    /// # Errors
    ///
    /// Returns the collected statement errors (one error as is, several as
    /// [`AsmError::Multiple`]), linker errors, or fatal errors.
    pub fn finish(self) -> Result<AssemblyResult, AsmError> {
        let encoded = self.encode()?;
        if let Some(err) = AsmError::from_errors(encoded.errors) {
            return Err(err);
        }

        let mut linker = Linker::new();
        linker.set_base_address(self.base_address);
        for (name, &addr) in &self.externals {
            linker.define_external(name, addr);
        }
        let mut origins = Vec::new();
        for record in encoded.records {
            match record.item {
                Item::Label { name, span } => linker.add_label(&name, span)?,
                Item::Instruction(instr) => {
                    checked::try_push(&mut origins, record.statement)?;
                    linker.add_instruction(instr)?;
                }
            }
        }

        let linked = linker.resolve()?;
        if linked.bytes.len() > self.resource_limits.max_output_bytes {
            return Err(limit("output bytes", self.resource_limits.max_output_bytes));
        }

        let mut source_annotations = Vec::new();
        for ((addr, _), statement) in linked.instructions.iter().zip(&origins) {
            if let Some(text) = self.annotations.get(statement) {
                checked::try_push(&mut source_annotations, (*addr, text.clone()))?;
            }
        }

        Ok(AssemblyResult {
            bytes: linked.bytes,
            labels: linked.labels,
            instructions: linked.instructions,
            base_address: self.base_address,
            source_annotations,
        })
    }

    fn count_label(&mut self) -> Result<(), AsmError> {
        self.label_count += 1;
        if self.label_count > self.resource_limits.max_labels {
            return Err(limit("labels", self.resource_limits.max_labels));
        }
        Ok(())
    }

    fn record_error(&mut self, e: AsmError) -> Result<(), AsmError> {
        if e.is_fatal() {
            return Err(e);
        }
        checked::try_push(&mut self.errors, e)?;
        if self.errors.len() > self.resource_limits.max_errors {
            return Err(limit("errors", self.resource_limits.max_errors));
        }
        Ok(())
    }
}

fn limit(resource: &str, limit: usize) -> AsmError {
    AsmError::ResourceLimitExceeded {
        resource: String::from(resource),
        limit,
    }
}

fn clamp(addr: u64) -> i64 {
    i64::try_from(addr).unwrap_or(i64::MAX)
}

/// Extract the source text for a span from the original source string.
///
/// Returns the trimmed text of the line containing the span, or an empty
/// string if the span is out of range.
fn extract_source_line(source: &str, span: Span) -> &str {
    let offset = span.offset;
    if offset >= source.len() || !source.is_char_boundary(offset) {
        return "";
    }
    let line_start = source[..offset].rfind('\n').map_or(0, |p| p + 1);
    let line_end = source[offset..]
        .find('\n')
        .map_or(source.len(), |p| offset + p);
    source[line_start..line_end].trim()
}
