//! Lexer for assembly source text.
//!
//! The lexer tokenizes assembly source into a stream of [`Token`]s, each
//! carrying its [`Span`] so that error messages can point back to the exact
//! location in the original input.
//!
//! Characters that start no token become [`TokenKind::Unknown`] rather than
//! aborting the scan: the parser reports them as a syntax error of the one
//! statement they appear in and keeps going.

use alloc::borrow::Cow;
use alloc::string::String;
#[allow(unused_imports)]
use alloc::vec;
use alloc::vec::Vec;

use crate::error::{AsmError, Span};

/// A token produced by the lexer.
///
/// Token text is borrowed from the source string in the common case; only
/// character literals own their text.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'src> {
    /// Token classification.
    pub kind: TokenKind,
    /// Source text of the token.
    pub text: Cow<'src, str>,
    /// Source location.
    pub span: Span,
}

impl<'src> Token<'src> {
    /// Returns the token text as a `&str`.
    #[inline]
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// The type of a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// An identifier: mnemonic, register name, keyword or symbol.
    Ident,
    /// A numeric or character literal.
    Number(i128),
    /// A directive (starts with `.`).
    Directive,
    /// Label definition (`name:`).
    LabelDef,
    /// Comma separator.
    Comma,
    /// Open bracket `[`.
    OpenBracket,
    /// Close bracket `]`.
    CloseBracket,
    /// Open parenthesis `(`.
    OpenParen,
    /// Close parenthesis `)`.
    CloseParen,
    /// Plus `+`.
    Plus,
    /// Minus `-`.
    Minus,
    /// Asterisk `*`.
    Star,
    /// Forward slash `/`.
    Slash,
    /// Tilde `~`.
    Tilde,
    /// Colon `:` (segment override: `fs:`).
    Colon,
    /// A character that starts no token.
    Unknown,
    /// A newline or `;` (statement separator).
    Newline,
    /// End of input.
    Eof,
}

const SEGMENT_NAMES: &[&str] = &["cs", "ds", "es", "fs", "gs", "ss"];

struct Scanner<'s> {
    src: &'s str,
    bytes: &'s [u8],
    pos: usize,
    line: u32,
    line_start: usize,
    tokens: Vec<Token<'s>>,
}

impl<'s> Scanner<'s> {
    fn col(&self, at: usize) -> u32 {
        (at - self.line_start) as u32 + 1
    }

    fn span(&self, start: usize) -> Span {
        Span::new(self.line, self.col(start), start, self.pos - start)
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        let span = self.span(start);
        self.tokens.push(Token {
            kind,
            text: Cow::Borrowed(&self.src[start..self.pos]),
            span,
        });
    }

    fn single(&mut self, kind: TokenKind) {
        let start = self.pos;
        self.pos += 1;
        self.push(kind, start);
    }

    fn skip_line_comment(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
            self.pos += 1;
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), AsmError> {
        let start = self.pos;
        let start_line = self.line;
        let start_col = self.col(start);
        self.pos += 2;
        loop {
            match (self.peek_at(0), self.peek_at(1)) {
                (Some(b'*'), Some(b'/')) => {
                    self.pos += 2;
                    return Ok(());
                }
                (Some(b'\n'), _) => {
                    self.pos += 1;
                    self.line += 1;
                    self.line_start = self.pos;
                }
                (Some(_), _) => self.pos += 1,
                (None, _) => {
                    return Err(AsmError::Syntax {
                        msg: String::from("unterminated block comment"),
                        span: Span::new(start_line, start_col, start, 2),
                    })
                }
            }
        }
    }

    fn number(&mut self) -> Result<(), AsmError> {
        let start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_alphanumeric() {
            self.pos += 1;
        }
        let word = &self.src[start..self.pos];
        let value = parse_number(word).ok_or_else(|| AsmError::Syntax {
            msg: alloc::format!("invalid number '{}'", word),
            span: self.span(start),
        })?;
        self.push(TokenKind::Number(value), start);
        Ok(())
    }

    fn char_literal(&mut self) -> Result<(), AsmError> {
        let start = self.pos;
        self.pos += 1;
        let value = match (self.peek_at(0), self.peek_at(1)) {
            (Some(b'\\'), Some(esc)) => {
                self.pos += 2;
                match esc {
                    b'n' => b'\n',
                    b't' => b'\t',
                    b'r' => b'\r',
                    b'0' => 0,
                    b'\\' => b'\\',
                    b'\'' => b'\'',
                    _ => {
                        return Err(AsmError::Syntax {
                            msg: String::from("unknown escape in character literal"),
                            span: self.span(start),
                        })
                    }
                }
            }
            (Some(b'\n') | None, _) => {
                return Err(AsmError::Syntax {
                    msg: String::from("unterminated character literal"),
                    span: self.span(start),
                })
            }
            (Some(c), _) => {
                self.pos += 1;
                c
            }
        };
        if self.peek_at(0) != Some(b'\'') {
            return Err(AsmError::Syntax {
                msg: String::from("unterminated character literal"),
                span: self.span(start),
            });
        }
        self.pos += 1;
        let span = self.span(start);
        self.tokens.push(Token {
            kind: TokenKind::Number(value as i128),
            text: Cow::Owned(alloc::format!("'{}'", value as char)),
            span,
        });
        Ok(())
    }

    fn word(&mut self, kind: TokenKind) {
        let start = self.pos;
        self.pos += 1;
        while self.pos < self.bytes.len()
            && (self.bytes[self.pos].is_ascii_alphanumeric()
                || matches!(self.bytes[self.pos], b'_' | b'.' | b'$' | b'@'))
        {
            self.pos += 1;
        }
        if kind == TokenKind::Ident && self.peek_at(0) == Some(b':') {
            let src = self.src;
            let text = &src[start..self.pos];
            // `fs:[rax]` is a segment override, not a label definition.
            if !SEGMENT_NAMES.iter().any(|s| text.eq_ignore_ascii_case(s)) {
                let span = self.span(start);
                self.pos += 1;
                self.tokens.push(Token {
                    kind: TokenKind::LabelDef,
                    text: Cow::Borrowed(text),
                    span,
                });
                return;
            }
        }
        self.push(kind, start);
    }
}

/// Tokenize assembly source text into a vector of tokens.
///
/// The lexer recognizes:
/// - Identifiers (mnemonics, registers, size keywords, symbols)
/// - Numeric literals (decimal, hex `0x`/`h`-suffix, binary `0b`, octal `0o`)
///   and character literals (`'A'`)
/// - Directives (`.code64`)
/// - Label definitions (`name:`)
/// - Punctuation: `,` `[` `]` `(` `)` `+` `-` `*` `/` `~` `:`
/// - Comments: `#` and `//` to end of line, `/* ... */` blocks
/// - Newlines and semicolons as statement separators
///
/// # Errors
///
/// Returns `Err(AsmError::Syntax)` for malformed numbers, character literals
/// and unterminated block comments.
pub fn tokenize(source: &str) -> Result<Vec<Token<'_>>, AsmError> {
    let mut s = Scanner {
        src: source,
        bytes: source.as_bytes(),
        pos: 0,
        line: 1,
        line_start: 0,
        // Heuristic: ~4 chars per token on average.
        tokens: Vec::with_capacity(source.len() / 4 + 1),
    };

    while let Some(ch) = s.peek_at(0) {
        match ch {
            b' ' | b'\t' | b'\r' => s.pos += 1,
            b'\n' => {
                s.single(TokenKind::Newline);
                s.line += 1;
                s.line_start = s.pos;
            }
            b';' => s.single(TokenKind::Newline),
            b'#' => s.skip_line_comment(),
            b'/' if s.peek_at(1) == Some(b'/') => s.skip_line_comment(),
            b'/' if s.peek_at(1) == Some(b'*') => s.skip_block_comment()?,
            b'/' => s.single(TokenKind::Slash),
            b',' => s.single(TokenKind::Comma),
            b'[' => s.single(TokenKind::OpenBracket),
            b']' => s.single(TokenKind::CloseBracket),
            b'(' => s.single(TokenKind::OpenParen),
            b')' => s.single(TokenKind::CloseParen),
            b'+' => s.single(TokenKind::Plus),
            b'-' => s.single(TokenKind::Minus),
            b'*' => s.single(TokenKind::Star),
            b'~' => s.single(TokenKind::Tilde),
            b':' => s.single(TokenKind::Colon),
            b'\'' => s.char_literal()?,
            b'.' => s.word(TokenKind::Directive),
            b'0'..=b'9' => s.number()?,
            c if c.is_ascii_alphabetic() || c == b'_' => s.word(TokenKind::Ident),
            _ => {
                // Consume a whole UTF-8 character so the text stays valid.
                let start = s.pos;
                let width = source[start..].chars().next().map_or(1, char::len_utf8);
                s.pos += width;
                s.push(TokenKind::Unknown, start);
            }
        }
    }

    let span = Span::new(s.line, s.col(s.pos), s.pos, 0);
    s.tokens.push(Token {
        kind: TokenKind::Eof,
        text: Cow::Borrowed(""),
        span,
    });
    Ok(s.tokens)
}

/// Interpret one alphanumeric word starting with a digit.
fn parse_number(word: &str) -> Option<i128> {
    let lower = word.as_bytes();
    let (digits, radix) = if lower.len() > 2 && lower[0] == b'0' {
        match lower[1] {
            b'x' | b'X' => (&word[2..], 16),
            b'b' | b'B' => (&word[2..], 2),
            b'o' | b'O' => (&word[2..], 8),
            _ => suffixed(word),
        }
    } else {
        suffixed(word)
    };
    if digits.is_empty() {
        return None;
    }
    i128::from_str_radix(digits, radix).ok()
}

/// `0FFh` style hex suffix, otherwise decimal.
fn suffixed(word: &str) -> (&str, u32) {
    match word.strip_suffix(|c| c == 'h' || c == 'H') {
        Some(hex) => (hex, 16),
        None => (word, 10),
    }
}
