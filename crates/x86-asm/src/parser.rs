//! Intel-syntax parser producing IR statements.
//!
//! The parser is line oriented: a syntax error is recorded and the parser
//! resumes after the next statement separator, so one malformed line never
//! hides the statements around it.

use alloc::string::{String, ToString};
#[allow(unused_imports)]
use alloc::vec;
use alloc::vec::Vec;

use crate::error::{AsmError, Span};
use crate::ir::{
    Expr, InfixOp, InstrStmt, OperandSyntax, Prefix, PrefixOp, Statement, TargetMode, Width,
};
use crate::lexer::{Token, TokenKind};
use crate::register::{Register, RegisterClass};

/// Parse a token stream, failing on the first syntax error.
///
/// # Errors
///
/// Returns every syntax error found, collapsed through
/// [`AsmError::from_errors`].
pub fn parse(tokens: &[Token<'_>]) -> Result<Vec<Statement>, AsmError> {
    let (stmts, errors) = parse_recovering(tokens);
    match AsmError::from_errors(errors) {
        Some(err) => Err(err),
        None => Ok(stmts),
    }
}

/// Parse a token stream, collecting syntax errors instead of stopping.
///
/// Returns every well-formed statement together with one error per
/// malformed statement.
pub fn parse_recovering(tokens: &[Token<'_>]) -> (Vec<Statement>, Vec<AsmError>) {
    let mut parser = Parser::new(tokens);
    parser.parse_program();
    (parser.stmts, parser.errors)
}

/// Tokenize and parse in one step.
///
/// # Errors
///
/// Returns lexer errors or the collected syntax errors.
pub fn parse_str(source: &str) -> Result<Vec<Statement>, AsmError> {
    let tokens = crate::lexer::tokenize(source)?;
    parse(&tokens)
}

struct Parser<'a> {
    tokens: &'a [Token<'a>],
    pos: usize,
    stmts: Vec<Statement>,
    errors: Vec<AsmError>,
}

fn syntax(msg: impl Into<String>, span: Span) -> AsmError {
    AsmError::Syntax {
        msg: msg.into(),
        span,
    }
}

fn size_keyword(word: &str) -> Option<Width> {
    let w = if word.eq_ignore_ascii_case("byte") || word.eq_ignore_ascii_case("short") {
        Width::Byte
    } else if word.eq_ignore_ascii_case("word") {
        Width::Word
    } else if word.eq_ignore_ascii_case("dword") || word.eq_ignore_ascii_case("near") {
        Width::Dword
    } else if word.eq_ignore_ascii_case("qword") {
        Width::Qword
    } else {
        return None;
    };
    Some(w)
}

/// `short` and `near` size a branch displacement, not the target value.
fn is_distance_keyword(word: &str) -> bool {
    word.eq_ignore_ascii_case("short") || word.eq_ignore_ascii_case("near")
}

fn is_statement_end(kind: &TokenKind) -> bool {
    matches!(kind, TokenKind::Newline | TokenKind::Eof)
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token<'a>]) -> Self {
        Self {
            tokens,
            pos: 0,
            // Heuristic: ~4 tokens per statement on average.
            stmts: Vec::with_capacity(tokens.len() / 4 + 1),
            errors: Vec::new(),
        }
    }

    #[inline]
    fn peek(&self) -> &'a Token<'a> {
        self.peek_nth(0)
    }

    #[inline]
    fn peek_nth(&self, n: usize) -> &'a Token<'a> {
        let tokens: &'a [Token<'a>] = self.tokens;
        // The lexer always terminates the stream with `Eof`.
        &tokens[(self.pos + n).min(tokens.len().saturating_sub(1))]
    }

    #[inline]
    fn advance(&mut self) -> &'a Token<'a> {
        let tok = self.peek();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    #[inline]
    fn at_end(&self) -> bool {
        self.tokens.is_empty() || self.peek().kind == TokenKind::Eof
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<&'a Token<'a>, AsmError> {
        let tok = self.peek();
        if tok.kind == kind {
            Ok(self.advance())
        } else {
            Err(syntax(
                alloc::format!("expected {}, found '{}'", what, display_text(tok)),
                tok.span,
            ))
        }
    }

    fn skip_to_statement_end(&mut self) {
        while !self.at_end() && !is_statement_end(&self.peek().kind) {
            self.advance();
        }
    }

    fn parse_program(&mut self) {
        if self.tokens.is_empty() {
            return;
        }
        while !self.at_end() {
            if self.peek().kind == TokenKind::Newline {
                self.advance();
                continue;
            }
            if let Err(err) = self.parse_line() {
                self.errors.push(err);
                self.skip_to_statement_end();
            }
        }
    }

    fn parse_line(&mut self) -> Result<(), AsmError> {
        let tok = self.peek();
        if tok.kind == TokenKind::LabelDef {
            self.advance();
            self.stmts.push(Statement::Label(tok.text.to_string(), tok.span));
            if is_statement_end(&self.peek().kind) {
                return Ok(());
            }
        }

        let tok = self.peek();
        match tok.kind {
            TokenKind::Directive => self.parse_directive()?,
            TokenKind::Ident => {
                let stmt = self.parse_instruction()?;
                self.stmts.push(Statement::Instruction(stmt));
            }
            _ => {
                return Err(syntax(
                    alloc::format!("unexpected token '{}'", display_text(tok)),
                    tok.span,
                ))
            }
        }

        let end = self.peek();
        if is_statement_end(&end.kind) {
            Ok(())
        } else {
            Err(syntax(
                alloc::format!("unexpected token '{}' after statement", display_text(end)),
                end.span,
            ))
        }
    }

    fn parse_directive(&mut self) -> Result<(), AsmError> {
        let tok = self.advance();
        let dir = tok.text.to_ascii_lowercase();
        let mode = match dir.as_str() {
            ".code16" => Some(TargetMode::O16),
            ".code32" => Some(TargetMode::O32),
            ".code64" => Some(TargetMode::O64),
            // Accepted for compatibility, no effect on encoding.
            ".text" | ".intel_syntax" | ".global" | ".globl" => {
                self.skip_to_statement_end();
                None
            }
            _ => {
                return Err(syntax(
                    alloc::format!("unknown directive '{}'", tok.text),
                    tok.span,
                ))
            }
        };
        if let Some(mode) = mode {
            self.stmts.push(Statement::CodeMode(mode, tok.span));
        }
        Ok(())
    }

    fn parse_instruction(&mut self) -> Result<InstrStmt, AsmError> {
        let mut prefixes = Vec::new();
        let mut tok = self.advance();
        let start = tok.span;
        while let Some(prefix) = Prefix::from_keyword(&tok.text) {
            if self.peek().kind != TokenKind::Ident {
                break;
            }
            prefixes.push(prefix);
            tok = self.advance();
        }
        let mnemonic = tok.text.to_ascii_lowercase();
        let mut span = start.to(tok.span);

        let mut operands = Vec::new();
        if !is_statement_end(&self.peek().kind) {
            loop {
                let op = self.parse_operand()?;
                span = span.to(op.span);
                operands.push(op);
                if self.peek().kind == TokenKind::Comma {
                    self.advance();
                } else {
                    break;
                }
            }
        }

        Ok(InstrStmt {
            mnemonic,
            prefixes,
            operands,
            span,
        })
    }

    /// Size keyword in operand position, optionally followed by `ptr`.
    fn parse_size(&mut self) -> Option<Width> {
        let tok = self.peek();
        if tok.kind != TokenKind::Ident {
            return None;
        }
        let width = size_keyword(&tok.text)?;
        // A bare `byte` with nothing after it is a symbol reference.
        let next = &self.peek_nth(1).kind;
        if is_statement_end(next) || matches!(next, TokenKind::Comma | TokenKind::CloseBracket) {
            return None;
        }
        self.advance();
        if self.peek().kind == TokenKind::Ident && self.peek().text.eq_ignore_ascii_case("ptr") {
            self.advance();
        }
        Some(width)
    }

    /// `seg:` in front of a memory operand.
    fn parse_segment(&mut self) -> Option<Register> {
        let tok = self.peek();
        if tok.kind != TokenKind::Ident || self.peek_nth(1).kind != TokenKind::Colon {
            return None;
        }
        let reg = Register::from_name(&tok.text)?;
        if reg.class() != RegisterClass::Segment {
            return None;
        }
        self.advance();
        self.advance();
        Some(reg)
    }

    fn parse_operand(&mut self) -> Result<OperandSyntax, AsmError> {
        let start = self.peek().span;
        let hint = self.peek().kind == TokenKind::Ident && is_distance_keyword(&self.peek().text);
        let size = self.parse_size();
        let distance = hint && size.is_some();
        let mut segment = self.parse_segment();

        if self.peek().kind == TokenKind::OpenBracket {
            self.advance();
            let address_size = self.parse_size();
            if segment.is_none() {
                segment = self.parse_segment();
            }
            let expr = self.parse_expr()?;
            let close = self.expect(TokenKind::CloseBracket, "']'")?;
            return Ok(OperandSyntax {
                size,
                distance,
                address: true,
                address_size,
                segment,
                expr,
                span: start.to(close.span),
            });
        }

        if segment.is_some() {
            let tok = self.peek();
            return Err(syntax(
                "segment override requires a memory operand",
                tok.span,
            ));
        }
        let expr = self.parse_expr()?;
        let end = self.tokens[self.pos.saturating_sub(1)].span;
        Ok(OperandSyntax {
            size,
            distance,
            ..OperandSyntax::plain(expr, start.to(end))
        })
    }

    // ─── Expressions ────────────────────────────────────────────────────

    fn parse_expr(&mut self) -> Result<Expr, AsmError> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => InfixOp::Add,
                TokenKind::Minus => InfixOp::Sub,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_term()?;
            lhs = Expr::infix(op, lhs, rhs);
        }
    }

    fn parse_term(&mut self) -> Result<Expr, AsmError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => InfixOp::Mul,
                TokenKind::Slash => InfixOp::Div,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::infix(op, lhs, rhs);
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, AsmError> {
        let tok = self.peek();
        let op = match tok.kind {
            TokenKind::Plus => PrefixOp::Plus,
            TokenKind::Minus => PrefixOp::Neg,
            TokenKind::Tilde => PrefixOp::Not,
            _ => return self.parse_atom(),
        };
        self.advance();
        // Fold `-123` directly so that i64::MIN is representable.
        if op == PrefixOp::Neg {
            if let TokenKind::Number(n) = self.peek().kind {
                let num = self.advance();
                return literal(-n, tok.span.to(num.span)).map(Expr::Int);
            }
        }
        Ok(Expr::prefix(op, self.parse_unary()?))
    }

    fn parse_atom(&mut self) -> Result<Expr, AsmError> {
        let tok = self.advance();
        match tok.kind {
            TokenKind::Number(n) => literal(n, tok.span).map(Expr::Int),
            TokenKind::Ident => Ok(Expr::Var(tok.text.to_string())),
            TokenKind::OpenParen => {
                let inner = self.parse_expr()?;
                self.expect(TokenKind::CloseParen, "')'")?;
                Ok(inner)
            }
            TokenKind::Unknown => Err(syntax(
                alloc::format!("unexpected character '{}'", tok.text),
                tok.span,
            )),
            _ => Err(syntax(
                alloc::format!("expected expression, found '{}'", display_text(tok)),
                tok.span,
            )),
        }
    }
}

/// Narrow a lexer literal to 64 bits; values above `i64::MAX` keep their
/// two's-complement bit pattern.
fn literal(n: i128, span: Span) -> Result<i64, AsmError> {
    if n >= i64::MIN as i128 && n <= u64::MAX as i128 {
        Ok(n as u64 as i64)
    } else {
        Err(syntax(
            alloc::format!("number {} does not fit in 64 bits", n),
            span,
        ))
    }
}

fn display_text<'t>(tok: &'t Token<'_>) -> &'t str {
    match tok.kind {
        TokenKind::Newline => "end of line",
        TokenKind::Eof => "end of input",
        _ => tok.text(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instr(src: &str) -> InstrStmt {
        let stmts = parse_str(src).unwrap();
        match stmts.into_iter().next() {
            Some(Statement::Instruction(i)) => i,
            other => panic!("expected instruction, got {:?}", other),
        }
    }

    #[test]
    fn parses_mnemonic_and_operands() {
        let i = instr("MOV eax, ebx");
        assert_eq!(i.mnemonic, "mov");
        assert_eq!(i.operands.len(), 2);
        assert_eq!(i.operands[0].expr, Expr::var("eax"));
        assert!(!i.operands[0].address);
    }

    #[test]
    fn parses_memory_with_size() {
        let i = instr("add dword ptr [rbx + rsi*4 - 8], 1");
        let mem = &i.operands[0];
        assert!(mem.address);
        assert_eq!(mem.size, Some(Width::Dword));
        assert_eq!(
            mem.expr,
            Expr::infix(
                InfixOp::Sub,
                Expr::infix(
                    InfixOp::Add,
                    Expr::var("rbx"),
                    Expr::infix(InfixOp::Mul, Expr::var("rsi"), Expr::Int(4)),
                ),
                Expr::Int(8),
            )
        );
        assert_eq!(i.operands[1].expr, Expr::Int(1));
    }

    #[test]
    fn parses_segment_overrides() {
        let i = instr("mov rax, fs:[0x28]");
        assert_eq!(i.operands[1].segment, Some(Register::Fs));
        let i = instr("mov rax, qword [gs:rbx]");
        assert_eq!(i.operands[1].segment, Some(Register::Gs));
        assert_eq!(i.operands[1].size, Some(Width::Qword));
    }

    #[test]
    fn parses_address_size_inside_brackets() {
        let i = instr("mov eax, [dword label]");
        assert_eq!(i.operands[1].address_size, Some(Width::Dword));
        assert_eq!(i.operands[1].size, None);
    }

    #[test]
    fn parses_prefixes() {
        let i = instr("lock add [rax], ecx");
        assert_eq!(i.prefixes, vec![Prefix::Lock]);
        assert_eq!(i.mnemonic, "add");
        let i = instr("rep movsb");
        assert_eq!(i.prefixes, vec![Prefix::Rep]);
        assert_eq!(i.mnemonic, "movsb");
    }

    #[test]
    fn negative_literals_fold() {
        let i = instr("mov rax, -9223372036854775808");
        assert_eq!(i.operands[1].expr, Expr::Int(i64::MIN));
        let i = instr("mov rax, 0xFFFFFFFFFFFFFFFF");
        assert_eq!(i.operands[1].expr, Expr::Int(-1));
        let i = instr("mov eax, -x");
        assert_eq!(
            i.operands[1].expr,
            Expr::prefix(PrefixOp::Neg, Expr::var("x"))
        );
    }

    #[test]
    fn precedence_and_parentheses() {
        let i = instr("mov eax, 2 + 3 * 4");
        assert_eq!(
            i.operands[1].expr,
            Expr::infix(
                InfixOp::Add,
                Expr::Int(2),
                Expr::infix(InfixOp::Mul, Expr::Int(3), Expr::Int(4))
            )
        );
        let i = instr("mov eax, (2 + 3) * 4");
        assert_eq!(
            i.operands[1].expr,
            Expr::infix(
                InfixOp::Mul,
                Expr::infix(InfixOp::Add, Expr::Int(2), Expr::Int(3)),
                Expr::Int(4)
            )
        );
    }

    #[test]
    fn labels_and_code_mode() {
        let stmts = parse_str(".code32\nstart: nop\nend:").unwrap();
        assert_eq!(stmts.len(), 4);
        assert!(matches!(stmts[0], Statement::CodeMode(TargetMode::O32, _)));
        assert!(matches!(stmts[1], Statement::Label(ref n, _) if n == "start"));
        assert!(matches!(stmts[2], Statement::Instruction(_)));
        assert!(matches!(stmts[3], Statement::Label(ref n, _) if n == "end"));
    }

    #[test]
    fn short_and_near_are_sizes() {
        let i = instr("jmp short target");
        assert_eq!(i.operands[0].size, Some(Width::Byte));
        let i = instr("jmp near target");
        assert_eq!(i.operands[0].size, Some(Width::Dword));
    }

    #[test]
    fn bare_size_keyword_is_a_symbol() {
        let i = instr("push byte");
        assert_eq!(i.operands[0].expr, Expr::var("byte"));
        assert_eq!(i.operands[0].size, None);
    }

    #[test]
    fn errors_are_contained_per_statement() {
        let tokens = crate::lexer::tokenize("nop\nmov eax, , ebx\nret\nmov $\nhlt").unwrap();
        let (stmts, errors) = parse_recovering(&tokens);
        assert_eq!(errors.len(), 2);
        let names: Vec<&str> = stmts
            .iter()
            .filter_map(|s| match s {
                Statement::Instruction(i) => Some(i.mnemonic.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["nop", "ret", "hlt"]);
    }

    #[test]
    fn unknown_directive_is_an_error() {
        assert!(parse_str(".bogus").is_err());
        assert!(parse_str(".text\nnop").is_ok());
    }

    #[test]
    fn trailing_garbage_is_an_error() {
        let err = parse_str("mov eax, ebx ecx").unwrap_err();
        assert!(matches!(err, AsmError::Syntax { .. }));
    }

    #[test]
    fn unclosed_bracket() {
        let err = parse_str("mov eax, [rbx").unwrap_err();
        assert!(matches!(err, AsmError::Syntax { ref msg, .. } if msg.contains("']'")));
    }

    #[test]
    fn operand_spans_cover_text() {
        let i = instr("mov eax, [rbx + 4]");
        let span = i.operands[1].span;
        assert_eq!(span.offset, 9);
        assert_eq!(span.len, 9);
    }
}
