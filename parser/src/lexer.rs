//! FILENAME: parser/src/lexer.rs
//! PURPOSE: Scans a formula source string into a flat `LexerToken` sequence.
//! CONTEXT: First stage of the parsing pipeline. Scanning rules follow the
//! original tokenizer's state machine: a numeral that hits `:` restarts as a
//! name (so `3:3` lexes as one name, not `Value(3)`, `Op(Sep)`, `Value(3)`),
//! and `[...]` opens a nestable "name scope" in which operator characters are
//! swallowed into the name (so `Table1[[#Headers],[Category]]` lexes as a
//! single `Name`).

use crate::lexer_token::{LexOp, LexerToken};
use std::iter::Peekable;
use std::str::Chars;
use thiserror::Error;

/// Lex-time failure. The only two ways a formula source string can fail to
/// tokenize at all (anything else becomes an `Illegal`-shaped name/value
/// that the parser rejects later).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenizeError {
    #[error("more than one decimal separator in numeral: {0:?}")]
    MultipleDecimalSeparators(String),
    #[error("unterminated name scope (missing ']')")]
    UnterminatedNameScope,
}

/// Configurable separators; see `ModelAccess::config()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexerConfig {
    pub arg_separator: char,
    pub decimal_separator: char,
}

impl Default for LexerConfig {
    fn default() -> Self {
        LexerConfig {
            arg_separator: ',',
            decimal_separator: '.',
        }
    }
}

pub struct Lexer<'a> {
    input: Peekable<Chars<'a>>,
    config: LexerConfig,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer::with_config(input, LexerConfig::default())
    }

    pub fn with_config(input: &'a str, config: LexerConfig) -> Self {
        Lexer {
            input: input.chars().peekable(),
            config,
        }
    }

    /// Tokenizes the whole input in one pass.
    pub fn tokenize(mut self) -> Result<Vec<LexerToken>, TokenizeError> {
        let mut tokens = Vec::new();
        while let Some(tok) = self.next_token()? {
            tokens.push(tok);
        }
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Option<LexerToken>, TokenizeError> {
        self.skip_whitespace();

        let ch = match self.input.peek().copied() {
            Some(c) => c,
            None => return Ok(None),
        };

        if ch.is_ascii_digit() || ch == self.config.decimal_separator {
            return self.read_numeral().map(Some);
        }

        if ch == '"' {
            self.input.next();
            return Ok(Some(self.read_string()));
        }

        if ch == self.config.arg_separator {
            self.input.next();
            return Ok(Some(LexerToken::Op(LexOp::Sep)));
        }

        match ch {
            '+' => {
                self.input.next();
                Ok(Some(LexerToken::Op(LexOp::Plus)))
            }
            '-' => {
                self.input.next();
                Ok(Some(LexerToken::Op(LexOp::Minus)))
            }
            '*' => {
                self.input.next();
                Ok(Some(LexerToken::Op(LexOp::Multiply)))
            }
            '/' => {
                self.input.next();
                Ok(Some(LexerToken::Op(LexOp::Divide)))
            }
            '(' => {
                self.input.next();
                Ok(Some(LexerToken::Op(LexOp::Open)))
            }
            ')' => {
                self.input.next();
                Ok(Some(LexerToken::Op(LexOp::Close)))
            }
            '=' => {
                self.input.next();
                Ok(Some(LexerToken::Op(LexOp::Equal)))
            }
            '<' => {
                self.input.next();
                Ok(Some(self.read_less_than()))
            }
            '>' => {
                self.input.next();
                Ok(Some(self.read_greater_than()))
            }
            _ => self.read_name().map(Some),
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(&c) = self.input.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.input.next();
        }
    }

    fn read_less_than(&mut self) -> LexerToken {
        match self.input.peek() {
            Some('=') => {
                self.input.next();
                LexerToken::Op(LexOp::LessEqual)
            }
            Some('>') => {
                self.input.next();
                LexerToken::Op(LexOp::NotEqual)
            }
            _ => LexerToken::Op(LexOp::Less),
        }
    }

    fn read_greater_than(&mut self) -> LexerToken {
        match self.input.peek() {
            Some('=') => {
                self.input.next();
                LexerToken::Op(LexOp::GreaterEqual)
            }
            _ => LexerToken::Op(LexOp::Greater),
        }
    }

    fn read_string(&mut self) -> LexerToken {
        let mut s = String::new();
        while let Some(&c) = self.input.peek() {
            if c == '"' {
                self.input.next();
                break;
            }
            s.push(c);
            self.input.next();
        }
        LexerToken::Str(s)
    }

    /// Consumes digits and at most one decimal separator. Only a `:` hands
    /// the run collected so far to `read_name_continuing`, restarting the
    /// whole token as a name — matching the original's "numeral that sees a
    /// colon becomes a name" rule for whole-row references like `3:3`. Any
    /// other non-digit character simply ends the numeral scan and is left
    /// for the next `next_token` call, so `3a` lexes as `Value(3)` followed
    /// by `Name("a")`, not a single merged name.
    fn read_numeral(&mut self) -> Result<LexerToken, TokenizeError> {
        let mut buf = String::new();
        let mut sep_count = 0usize;

        loop {
            match self.input.peek().copied() {
                Some(':') => {
                    return self.read_name_continuing(buf);
                }
                Some(c) if c.is_ascii_digit() => {
                    buf.push(c);
                    self.input.next();
                }
                Some(c) if c == self.config.decimal_separator => {
                    sep_count += 1;
                    buf.push('.');
                    self.input.next();
                }
                _ => break,
            }
        }

        if sep_count > 1 {
            return Err(TokenizeError::MultipleDecimalSeparators(buf));
        }

        let value: f64 = buf.parse().unwrap_or(0.0);
        Ok(LexerToken::Value(value))
    }

    /// Continues scanning a name whose first characters were already
    /// consumed as part of a numeral attempt.
    fn read_name_continuing(&mut self, prefix: String) -> Result<LexerToken, TokenizeError> {
        let mut name = prefix;
        let mut scope = 0usize;
        loop {
            match self.input.peek().copied() {
                Some('[') => {
                    scope += 1;
                    name.push('[');
                    self.input.next();
                }
                Some(']') if scope > 0 => {
                    scope -= 1;
                    name.push(']');
                    self.input.next();
                }
                Some(c) if scope > 0 => {
                    name.push(c);
                    self.input.next();
                }
                Some(c) if is_name_continuation(c) => {
                    name.push(c);
                    self.input.next();
                }
                _ => break,
            }
        }
        if scope > 0 {
            return Err(TokenizeError::UnterminatedNameScope);
        }
        Ok(LexerToken::Name(name))
    }

    fn read_name(&mut self) -> Result<LexerToken, TokenizeError> {
        let mut name = String::new();
        let mut scope = 0usize;

        if self.input.peek() == Some(&'[') {
            scope += 1;
            name.push('[');
            self.input.next();
        }

        loop {
            match self.input.peek().copied() {
                Some('[') => {
                    scope += 1;
                    name.push('[');
                    self.input.next();
                }
                Some(']') if scope > 0 => {
                    scope -= 1;
                    name.push(']');
                    self.input.next();
                    if scope == 0 {
                        if self.input.peek().map(|c| is_name_continuation(*c) || *c == '[').unwrap_or(false) {
                            continue;
                        }
                        break;
                    }
                }
                Some(c) if scope > 0 => {
                    name.push(c);
                    self.input.next();
                }
                Some(c) if is_name_continuation(c) => {
                    name.push(c);
                    self.input.next();
                }
                _ => break,
            }
        }

        if scope > 0 {
            return Err(TokenizeError::UnterminatedNameScope);
        }

        Ok(LexerToken::Name(name))
    }
}

fn is_name_continuation(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '!' | '$' | ':' | '#' | '@' | '\'')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(s: &str) -> Vec<LexerToken> {
        Lexer::new(s).tokenize().unwrap()
    }

    #[test]
    fn tokenizes_simple_arithmetic() {
        let toks = lex("1+2*3");
        assert_eq!(
            toks,
            vec![
                LexerToken::Value(1.0),
                LexerToken::Op(LexOp::Plus),
                LexerToken::Value(2.0),
                LexerToken::Op(LexOp::Multiply),
                LexerToken::Value(3.0),
            ]
        );
    }

    #[test]
    fn skips_whitespace() {
        let toks = lex("  1 + 2 ");
        assert_eq!(toks, vec![LexerToken::Value(1.0), LexerToken::Op(LexOp::Plus), LexerToken::Value(2.0)]);
    }

    #[test]
    fn reads_decimal_numerals() {
        let toks = lex("1.4");
        assert_eq!(toks, vec![LexerToken::Value(1.4)]);
    }

    #[test]
    fn multiple_decimal_points_is_error() {
        let err = Lexer::new("1.2.3").tokenize().unwrap_err();
        assert!(matches!(err, TokenizeError::MultipleDecimalSeparators(_)));
    }

    #[test]
    fn colon_restarts_numeral_as_name() {
        let toks = lex("3:3");
        assert_eq!(toks, vec![LexerToken::Name("3:3".into())]);
    }

    #[test]
    fn numeral_followed_by_a_name_character_is_two_tokens() {
        let toks = lex("3a");
        assert_eq!(toks, vec![LexerToken::Value(3.0), LexerToken::Name("a".into())]);
    }

    #[test]
    fn relational_operators() {
        let toks = lex("A1<=B1<>C1>=D1");
        assert!(toks.contains(&LexerToken::Op(LexOp::LessEqual)));
        assert!(toks.contains(&LexerToken::Op(LexOp::NotEqual)));
        assert!(toks.contains(&LexerToken::Op(LexOp::GreaterEqual)));
    }

    #[test]
    fn string_literal_no_escapes() {
        let toks = lex("\"hello world\"");
        assert_eq!(toks, vec![LexerToken::Str("hello world".into())]);
    }

    #[test]
    fn bracketed_table_reference_lexes_as_one_name() {
        let toks = lex("Table1[[#Headers],[Category]]");
        assert_eq!(toks.len(), 1);
        match &toks[0] {
            LexerToken::Name(n) => assert_eq!(n, "Table1[[#Headers],[Category]]"),
            other => panic!("expected Name, got {:?}", other),
        }
    }

    #[test]
    fn function_call_tokens() {
        let toks = lex("SUM(1,2,3)");
        assert_eq!(
            toks,
            vec![
                LexerToken::Name("SUM".into()),
                LexerToken::Op(LexOp::Open),
                LexerToken::Value(1.0),
                LexerToken::Op(LexOp::Sep),
                LexerToken::Value(2.0),
                LexerToken::Op(LexOp::Sep),
                LexerToken::Value(3.0),
                LexerToken::Op(LexOp::Close),
            ]
        );
    }
}
