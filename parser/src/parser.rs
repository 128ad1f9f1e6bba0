//! FILENAME: parser/src/parser.rs
//! PURPOSE: Recursive descent parser (C3) converting lexer tokens into a
//! flat, validated `Vec<Token>` — not an AST. Grammar order is preserved
//! token-for-token from the source; the interpreter later walks the exact
//! same grammar over the result.
//! CONTEXT: This is the second stage of the pipeline. Names are classified
//! by a `FormulaNameResolver`; everything else (balancing, precedence,
//! argument counts) is validated here and never rechecked downstream.
//!
//! GRAMMAR (standard precedence `+ -` < `* /` < unary < primary):
//!   expression  := term (('+'|'-') term)*
//!   term        := unary (('*'|'/') unary)*
//!   unary       := '-' unary | factor
//!   factor      := '(' expression ')' | function | reference | NUMBER | STRING
//!   function    := NAME '(' [ expression (',' expression)* ] ')'
//!   reference   := NAME                 -- resolved by the name-resolver

use crate::address::AbsAddress;
use crate::functions::FnId;
use crate::lexer::{Lexer, TokenizeError};
use crate::lexer_token::{LexOp, LexerToken};
use crate::model::ModelAccess;
use crate::resolver::{FormulaNameResolver, ResolvedName};
use crate::token::{TableSpec, Token};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error(transparent)]
    Tokenize(#[from] TokenizeError),
    #[error("empty expression")]
    EmptyExpression,
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("expected {expected}, found {found:?}")]
    Expected { expected: &'static str, found: LexerToken },
    #[error("name does not resolve to a reference: {0:?}")]
    UnresolvedName(String),
    #[error("unexpected trailing token: {0:?}")]
    TrailingToken(LexerToken),
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Parses `bytes` (interpreted as UTF-8 formula source) into a flat token
/// sequence, resolving names through `resolver` and `model`.
pub fn parse_formula_string(
    model: &dyn ModelAccess,
    origin: AbsAddress,
    resolver: &dyn FormulaNameResolver,
    bytes: &[u8],
) -> ParseResult<Vec<Token>> {
    let source = String::from_utf8_lossy(bytes);
    let config = model.config();
    let lexer_config = crate::lexer::LexerConfig {
        arg_separator: config.arg_separator,
        decimal_separator: config.decimal_separator,
    };
    let lexer_tokens = Lexer::with_config(&source, lexer_config).tokenize()?;
    let mut parser = Parser::new(lexer_tokens, origin, resolver, model);
    parser.parse()
}

/// Renders a token sequence back to source text, the inverse of
/// `parse_formula_string`. Since the parser never restructures the token
/// order, this is a direct per-token render rather than an AST unparse.
pub fn print_formula_tokens(model: &dyn ModelAccess, origin: AbsAddress, resolver: &dyn FormulaNameResolver, tokens: &[Token]) -> String {
    let config = model.config();
    let mut out = String::new();
    for tok in tokens {
        match tok {
            Token::Value(v) => out.push_str(&format_number(*v, config.decimal_separator)),
            Token::Str(id) => {
                out.push('"');
                out.push_str(&model.string_value(*id));
                out.push('"');
            }
            Token::SingleRef(addr) => out.push_str(&resolver.print_cell_ref(*addr, origin)),
            Token::RangeRef(range) => out.push_str(&resolver.print_range_ref(*range, origin)),
            Token::TableRef(spec) => {
                out.push_str(&spec.table);
                out.push('[');
                out.push_str(&spec.specifier);
                out.push(']');
            }
            Token::NamedExp(name) => out.push_str(name),
            Token::Function(id) => out.push_str(id.name()),
            Token::Plus => out.push('+'),
            Token::Minus => out.push('-'),
            Token::Multiply => out.push('*'),
            Token::Divide => out.push('/'),
            Token::Open => out.push('('),
            Token::Close => out.push(')'),
            Token::Sep => out.push(config.arg_separator),
            Token::Equal => out.push('='),
            Token::NotEqual => out.push_str("<>"),
            Token::Less => out.push('<'),
            Token::LessEqual => out.push_str("<="),
            Token::Greater => out.push('>'),
            Token::GreaterEqual => out.push_str(">="),
            Token::ErrNoRef => out.push_str("#REF!"),
        }
    }
    out
}

fn format_number(v: f64, decimal_separator: char) -> String {
    let s = format!("{}", v);
    if decimal_separator == '.' {
        s
    } else {
        s.replace('.', &decimal_separator.to_string())
    }
}

struct Parser<'a> {
    tokens: Vec<LexerToken>,
    pos: usize,
    origin: AbsAddress,
    resolver: &'a dyn FormulaNameResolver,
    model: &'a dyn ModelAccess,
}

impl<'a> Parser<'a> {
    fn new(tokens: Vec<LexerToken>, origin: AbsAddress, resolver: &'a dyn FormulaNameResolver, model: &'a dyn ModelAccess) -> Self {
        Parser { tokens, pos: 0, origin, resolver, model }
    }

    fn peek(&self) -> Option<&LexerToken> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<LexerToken> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect_op(&mut self, op: LexOp, name: &'static str) -> ParseResult<()> {
        match self.peek() {
            Some(LexerToken::Op(found)) if *found == op => {
                self.advance();
                Ok(())
            }
            Some(found) => Err(ParseError::Expected { expected: name, found: found.clone() }),
            None => Err(ParseError::UnexpectedEnd),
        }
    }

    fn is_op(&self, op: LexOp) -> bool {
        matches!(self.peek(), Some(LexerToken::Op(found)) if *found == op)
    }

    /// Entry point. Strips a single leading `=` (formula indicator) if
    /// present, then parses one expression and requires it to consume every
    /// remaining token.
    fn parse(&mut self) -> ParseResult<Vec<Token>> {
        if self.is_op(LexOp::Equal) {
            self.advance();
        }

        if self.peek().is_none() {
            return Err(ParseError::EmptyExpression);
        }

        let mut out = Vec::new();
        self.parse_expression(&mut out)?;

        if let Some(tok) = self.peek().cloned() {
            return Err(ParseError::TrailingToken(tok));
        }

        Ok(out)
    }

    fn parse_expression(&mut self, out: &mut Vec<Token>) -> ParseResult<()> {
        self.parse_term(out)?;
        loop {
            let op = match self.peek() {
                Some(LexerToken::Op(LexOp::Plus)) => Token::Plus,
                Some(LexerToken::Op(LexOp::Minus)) => Token::Minus,
                _ => break,
            };
            self.advance();
            out.push(op);
            self.parse_term(out)?;
        }
        Ok(())
    }

    fn parse_term(&mut self, out: &mut Vec<Token>) -> ParseResult<()> {
        self.parse_unary(out)?;
        loop {
            let op = match self.peek() {
                Some(LexerToken::Op(LexOp::Multiply)) => Token::Multiply,
                Some(LexerToken::Op(LexOp::Divide)) => Token::Divide,
                _ => break,
            };
            self.advance();
            out.push(op);
            self.parse_unary(out)?;
        }
        Ok(())
    }

    fn parse_unary(&mut self, out: &mut Vec<Token>) -> ParseResult<()> {
        if self.is_op(LexOp::Minus) {
            self.advance();
            out.push(Token::Minus);
            return self.parse_unary(out);
        }
        self.parse_factor(out)
    }

    fn parse_factor(&mut self, out: &mut Vec<Token>) -> ParseResult<()> {
        match self.advance() {
            Some(LexerToken::Op(LexOp::Open)) => {
                out.push(Token::Open);
                self.parse_expression(out)?;
                self.expect_op(LexOp::Close, "')'")?;
                out.push(Token::Close);
                Ok(())
            }
            Some(LexerToken::Value(v)) => {
                out.push(Token::Value(v));
                Ok(())
            }
            Some(LexerToken::Str(s)) => {
                let id = self.model.string_id_for_bytes(s.as_bytes());
                out.push(Token::Str(id));
                Ok(())
            }
            Some(LexerToken::Name(name)) => self.parse_name(name, out),
            Some(found) => Err(ParseError::Expected { expected: "an expression", found }),
            None => Err(ParseError::UnexpectedEnd),
        }
    }

    fn parse_name(&mut self, name: String, out: &mut Vec<Token>) -> ParseResult<()> {
        if self.is_op(LexOp::Open) {
            return self.parse_function_call(name, out);
        }

        if let Some(spec) = parse_table_spec(&name) {
            out.push(Token::TableRef(spec));
            return Ok(());
        }

        match self.resolver.resolve(&name, self.origin, self.model) {
            ResolvedName::CellReference(addr) => out.push(Token::SingleRef(addr)),
            ResolvedName::RangeReference(range) => out.push(Token::RangeRef(range)),
            ResolvedName::TableReference(spec) => out.push(Token::TableRef(spec)),
            ResolvedName::NamedExpression(n) => out.push(Token::NamedExp(n)),
            ResolvedName::Function(id) => out.push(Token::Function(id)),
            ResolvedName::Invalid => out.push(Token::ErrNoRef),
        }
        Ok(())
    }

    fn parse_function_call(&mut self, name: String, out: &mut Vec<Token>) -> ParseResult<()> {
        let fn_id = FnId::from_name(&name);
        out.push(Token::Function(fn_id));

        self.expect_op(LexOp::Open, "'('")?;
        out.push(Token::Open);

        if self.is_op(LexOp::Close) {
            self.advance();
            out.push(Token::Close);
            return Ok(());
        }

        self.parse_expression(out)?;
        while self.is_op(LexOp::Sep) {
            self.advance();
            out.push(Token::Sep);
            self.parse_expression(out)?;
        }

        self.expect_op(LexOp::Close, "')'")?;
        out.push(Token::Close);
        Ok(())
    }
}

/// A table-shaped name always lexes with its brackets attached (the lexer's
/// name-scope rule swallows them). Splits `Table1[Revenue]` into its table
/// and specifier parts; `[@Column]` (no table name) is the implied-current-
/// table form.
fn parse_table_spec(name: &str) -> Option<TableSpec> {
    let bracket_idx = name.find('[')?;
    if !name.ends_with(']') {
        return None;
    }
    let table = name[..bracket_idx].to_string();
    let specifier = name[bracket_idx + 1..name.len() - 1].to_string();
    Some(TableSpec { table, specifier })
}
