//! FILENAME: parser/src/lib.rs
//! PURPOSE: Library root for the formula core's parsing half (C1-C3).
//! CONTEXT: Lexer and parser stay host-agnostic; they only ever touch a
//! document through `ModelAccess` and a `FormulaNameResolver`.
//!
//! PIPELINE: formula bytes --> Lexer --> LexerToken --> Parser --> Token
//!
//! The parser does not build a tree. It validates the grammar and attaches
//! semantic tags to a flat sequence that stays in source order; the
//! interpreter (in the `engine` crate) walks the same grammar over it.

pub mod address;
pub mod functions;
pub mod lexer;
pub mod lexer_token;
pub mod model;
pub mod parser;
pub mod resolver;
pub mod token;

pub use address::{AbsAddress, AbsRange, Address, Range};
pub use functions::FnId;
pub use lexer::{Lexer, LexerConfig, TokenizeError};
pub use lexer_token::{LexOp, LexerToken};
pub use model::{CellType, CellTypeMask, FormulaCellHandle, FormulaConfig, FormulaError, ModelAccess, SessionHandler, StringId, TableHandler};
pub use parser::{parse_formula_string, print_formula_tokens, ParseError, ParseResult};
pub use resolver::{A1Resolver, FormulaNameResolver, ResolvedName};
pub use token::{TableSpec, Token};
