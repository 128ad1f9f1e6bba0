//! FILENAME: parser/src/token.rs
//! PURPOSE: The formula token model (C1): the immutable, tagged-variant
//! value objects a parsed formula body is made of.
//! CONTEXT: Unlike the lexer's `LexerToken`, these tokens carry resolved
//! semantic information — a bare `Name` has become a `SingleRef`,
//! `RangeRef`, `NamedExp`, or `Function` by the time the parser is done.
//! A formula's body is an ordered sequence of these tokens in *infix*
//! order; the interpreter (`engine::interpreter`) walks it with the same
//! recursive-descent grammar the parser used to build it, it does not
//! convert to RPN.

use crate::address::{Address, Range};
use crate::functions::FnId;
use crate::model::StringId;

/// A structured table reference, e.g. `Table1[Revenue]` or
/// `Table1[[#Headers],[Category]]`. `specifier` keeps the raw bracketed
/// text; resolving it to concrete columns is a host (`TableHandler`)
/// concern, not this crate's.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSpec {
    pub table: String,
    pub specifier: String,
}

/// One atom of a parsed formula. Immutable after construction.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Value(f64),
    Str(StringId),
    SingleRef(Address),
    RangeRef(Range),
    TableRef(TableSpec),
    NamedExp(String),
    Function(FnId),

    Plus,
    Minus,
    Multiply,
    Divide,
    Open,
    Close,
    Sep,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,

    /// Encountered when a name fails to resolve to anything the resolver
    /// recognizes. Evaluating this token always yields
    /// `FormulaError::RefResultNotAvailable` (§4.5).
    ErrNoRef,
}

impl Token {
    pub fn is_operator(&self) -> bool {
        matches!(
            self,
            Token::Plus
                | Token::Minus
                | Token::Multiply
                | Token::Divide
                | Token::Equal
                | Token::NotEqual
                | Token::Less
                | Token::LessEqual
                | Token::Greater
                | Token::GreaterEqual
        )
    }
}
