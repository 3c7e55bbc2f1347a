//! Compile-time assembly proc-macros for [`x86-asm`](https://crates.io/crates/x86-asm).
//!
//! Provides the [`x86_bytes!`] macro that assembles source text at compile
//! time, producing a `&'static [u8]` constant with zero runtime overhead, and
//! [`x86_array!`] for a fixed-size `[u8; N]`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use x86_asm_macros::x86_bytes;
//!
//! // Long mode
//! const EXIT: &[u8] = x86_bytes!(o64, "mov eax, 60\nxor edi, edi\nsyscall");
//!
//! // Protected mode at a fixed load address
//! const STUB: &[u8] = x86_bytes!(o32, 0x1000, "push ebp\nmov ebp, esp");
//!
//! // Real mode
//! const BOOT: &[u8] = x86_bytes!(o16, 0x7c00, "cli\nhlt");
//! ```

use proc_macro::TokenStream;
use x86_asm::{AsmError, TargetMode};

/// Assemble source text at compile time, producing a `&'static [u8]` byte slice.
///
/// # Syntax
///
/// ```rust,ignore
/// x86_bytes!(MODE, "assembly source")
/// x86_bytes!(MODE, BASE_ADDRESS, "assembly source")
/// ```
///
/// where `MODE` is one of `o16`, `o32`, `o64`.
///
/// # Examples
///
/// ```rust,ignore
/// use x86_asm_macros::x86_bytes;
///
/// const NOP: &[u8] = x86_bytes!(o64, "nop");
/// assert_eq!(NOP, &[0x90]);
///
/// const CODE: &[u8] = x86_bytes!(o64, "
///     start:
///         dec ecx
///         jnz short start
///         ret
/// ");
///
/// const BASED: &[u8] = x86_bytes!(o64, 0x400000, "call 0x401000");
/// ```
///
/// # Compile-time errors
///
/// If the assembly source contains errors, the macro emits one compile-time
/// error per diagnostic.
#[proc_macro]
pub fn x86_bytes(input: TokenStream) -> TokenStream {
    match x86_bytes_impl(input) {
        Ok(ts) => ts,
        Err(err) => err.into_compile_error(),
    }
}

/// Assemble source text at compile time, producing a fixed-size array `[u8; N]`.
///
/// Same syntax as [`x86_bytes!`].
///
/// # Examples
///
/// ```rust,ignore
/// use x86_asm_macros::x86_array;
///
/// const NOP: [u8; 1] = x86_array!(o64, "nop");
/// const PROLOGUE: [u8; 4] = x86_array!(o64, "push rbp\nmov rbp, rsp");
/// ```
#[proc_macro]
pub fn x86_array(input: TokenStream) -> TokenStream {
    match x86_array_impl(input) {
        Ok(ts) => ts,
        Err(err) => err.into_compile_error(),
    }
}

// ─── Implementation ─────────────────────────────────────────────────────────

type Tokens = std::iter::Peekable<proc_macro::token_stream::IntoIter>;

struct MacroInput {
    mode: TargetMode,
    base_addr: u64,
    source: String,
    /// Span of the source literal for error reporting.
    source_span: proc_macro::Span,
}

fn parse_input(input: TokenStream) -> Result<MacroInput, syn_free::Error> {
    let mut tokens = input.into_iter().peekable();

    let mode_tt = tokens
        .next()
        .ok_or_else(|| syn_free::Error::new("expected target mode (o16, o32, o64)"))?;
    let mode = parse_mode(&mode_tt)?;

    expect_comma(&mut tokens)?;

    // Optional base address (integer literal followed by comma).
    let base_addr = match tokens.peek() {
        Some(tt) if is_integer_literal(tt) => {
            let addr = parse_integer_literal(tt)?;
            tokens.next();
            expect_comma(&mut tokens)?;
            addr
        }
        Some(_) => 0,
        None => return Err(syn_free::Error::new("expected assembly source string")),
    };
    let (source, source_span) = parse_string_literal(&mut tokens)?;

    // A single trailing comma is fine.
    if matches!(tokens.peek(), Some(proc_macro::TokenTree::Punct(p)) if p.as_char() == ',') {
        tokens.next();
    }
    if let Some(extra) = tokens.next() {
        return Err(syn_free::Error::with_span(
            extra.span(),
            "unexpected extra tokens after source string",
        ));
    }

    Ok(MacroInput {
        mode,
        base_addr,
        source,
        source_span,
    })
}

fn x86_bytes_impl(input: TokenStream) -> Result<TokenStream, syn_free::Error> {
    let mi = parse_input(input)?;
    let bytes = do_assemble(&mi)?;
    bytes_to_slice_expr(&bytes)
}

fn x86_array_impl(input: TokenStream) -> Result<TokenStream, syn_free::Error> {
    let mi = parse_input(input)?;
    let bytes = do_assemble(&mi)?;
    bytes_to_array_expr(&bytes)
}

fn do_assemble(mi: &MacroInput) -> Result<Vec<u8>, syn_free::Error> {
    x86_asm::assemble_at(&mi.source, mi.mode, mi.base_addr).map_err(|e| {
        let messages = match e {
            AsmError::Multiple { errors } => errors
                .iter()
                .map(|e| format!("assembly error: {e}"))
                .collect(),
            e => vec![format!("assembly error: {e}")],
        };
        syn_free::Error::many(mi.source_span, messages)
    })
}

fn parse_mode(tt: &proc_macro::TokenTree) -> Result<TargetMode, syn_free::Error> {
    let proc_macro::TokenTree::Ident(id) = tt else {
        return Err(syn_free::Error::with_span(
            tt.span(),
            "expected target mode (o16, o32, o64)",
        ));
    };
    let ident = id.to_string();
    match ident.as_str() {
        "o16" => Ok(TargetMode::O16),
        "o32" => Ok(TargetMode::O32),
        "o64" => Ok(TargetMode::O64),
        _ => Err(syn_free::Error::with_span(
            tt.span(),
            &format!("unknown target mode `{ident}`, expected: o16, o32, o64"),
        )),
    }
}

fn expect_comma(tokens: &mut Tokens) -> Result<(), syn_free::Error> {
    match tokens.next() {
        Some(proc_macro::TokenTree::Punct(p)) if p.as_char() == ',' => Ok(()),
        Some(other) => Err(syn_free::Error::with_span(other.span(), "expected `,`")),
        None => Err(syn_free::Error::new("expected `,`")),
    }
}

fn is_integer_literal(tt: &proc_macro::TokenTree) -> bool {
    matches!(tt, proc_macro::TokenTree::Literal(lit)
        if lit.to_string().starts_with(|c: char| c.is_ascii_digit()))
}

fn parse_integer_literal(tt: &proc_macro::TokenTree) -> Result<u64, syn_free::Error> {
    let proc_macro::TokenTree::Literal(lit) = tt else {
        return Err(syn_free::Error::with_span(tt.span(), "expected integer literal"));
    };
    let text: String = lit.to_string().chars().filter(|&c| c != '_').collect();
    let (digits, radix) = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => (hex, 16),
        None => (text.as_str(), 10),
    };
    // Accept an integer type suffix such as `u64`.
    let digits = match digits.find(['u', 'i']) {
        Some(at) => &digits[..at],
        None => digits,
    };
    u64::from_str_radix(digits, radix)
        .map_err(|_| syn_free::Error::with_span(tt.span(), "invalid integer literal"))
}

fn parse_string_literal(tokens: &mut Tokens) -> Result<(String, proc_macro::Span), syn_free::Error> {
    let tt = tokens
        .next()
        .ok_or_else(|| syn_free::Error::new("expected string literal"))?;
    let proc_macro::TokenTree::Literal(lit) = &tt else {
        return Err(syn_free::Error::with_span(tt.span(), "expected string literal"));
    };
    let raw = lit.to_string();
    let malformed = || syn_free::Error::with_span(tt.span(), "malformed string literal");

    if let Some(rest) = raw.strip_prefix('r') {
        // Raw string: r"..." or r#"..."#, any number of hashes.
        let hashes = rest.len() - rest.trim_start_matches('#').len();
        let fence = "#".repeat(hashes);
        let inner = rest
            .strip_prefix(&format!("{fence}\""))
            .and_then(|s| s.strip_suffix(&format!("\"{fence}")))
            .ok_or_else(malformed)?;
        return Ok((inner.to_string(), tt.span()));
    }
    if raw.starts_with('"') {
        let inner = raw
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .ok_or_else(malformed)?;
        return Ok((unescape_string(inner), tt.span()));
    }
    Err(syn_free::Error::with_span(tt.span(), "expected string literal"))
}

fn unescape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('0') => out.push('\0'),
            // Line continuation: skip the newline and leading whitespace.
            Some('\n') => {
                while chars.peek().is_some_and(|c| c.is_whitespace()) {
                    chars.next();
                }
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn byte_list(bytes: &[u8]) -> String {
    let byte_strs: Vec<String> = bytes.iter().map(|b| format!("{b:#04X}u8")).collect();
    byte_strs.join(", ")
}

fn bytes_to_slice_expr(bytes: &[u8]) -> Result<TokenStream, syn_free::Error> {
    let inner = byte_list(bytes);
    syn_free::parse(&format!("{{ const BYTES: &[u8] = &[{inner}]; BYTES }}"))
}

fn bytes_to_array_expr(bytes: &[u8]) -> Result<TokenStream, syn_free::Error> {
    let len = bytes.len();
    let inner = byte_list(bytes);
    syn_free::parse(&format!("{{ const BYTES: [u8; {len}] = [{inner}]; BYTES }}"))
}

// ─── Minimal syn-free error type ─────────────────────────────────────────────
// The macro input is simple enough to parse straight from
// `proc_macro::TokenStream`, so there is no `syn` dependency.

mod syn_free {
    use proc_macro::{Delimiter, Group, Span, TokenStream, TokenTree};

    pub struct Error {
        messages: Vec<String>,
        span: Option<Span>,
    }

    impl Error {
        pub fn new(msg: &str) -> Self {
            Self {
                messages: vec![msg.to_string()],
                span: None,
            }
        }

        pub fn with_span(span: Span, msg: &str) -> Self {
            Self {
                messages: vec![msg.to_string()],
                span: Some(span),
            }
        }

        pub fn many(span: Span, messages: Vec<String>) -> Self {
            Self {
                messages,
                span: Some(span),
            }
        }

        /// One `compile_error!` per message, wrapped in a block so the
        /// expansion is valid in expression position.
        pub fn into_compile_error(self) -> TokenStream {
            let mut inner = TokenStream::new();
            for message in &self.messages {
                let Ok(ts) = format!("compile_error!({message:?});").parse::<TokenStream>() else {
                    continue;
                };
                inner.extend(ts.into_iter().map(|mut tt| {
                    if let Some(span) = self.span {
                        tt.set_span(span);
                    }
                    tt
                }));
            }
            TokenStream::from(TokenTree::Group(Group::new(Delimiter::Brace, inner)))
        }
    }

    pub fn parse(code: &str) -> Result<TokenStream, Error> {
        code.parse()
            .map_err(|_| Error::new("internal error: generated code does not parse"))
    }
}
