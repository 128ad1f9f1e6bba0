//! FILENAME: parser/src/lexer_token.rs
//! PURPOSE: Token definitions produced by the lexer, consumed by the parser.
//! CONTEXT: Lexer tokens are deliberately "dumb" — they carry no semantic
//! information about what a name refers to. That resolution is the parser's
//! job (see `parser.rs` / `resolver.rs`).

/// The operator family recognized by the lexer. Kept separate from the
/// parser-level `Token` opcode set in `token.rs` because the lexer never
/// knows whether, say, `Open`/`Close` end up bracketing a function call or a
/// grouping expression — that's decided one layer up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexOp {
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
}

/// A single token as produced by `Lexer::tokenize`.
#[derive(Debug, Clone, PartialEq)]
pub enum LexerToken {
    Value(f64),
    Name(String),
    Str(String),
    Op(LexOp),
}

impl std::fmt::Display for LexerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LexerToken::Value(v) => write!(f, "{}", v),
            LexerToken::Name(n) => write!(f, "{}", n),
            LexerToken::Str(s) => write!(f, "\"{}\"", s),
            LexerToken::Op(LexOp::Plus) => write!(f, "+"),
            LexerToken::Op(LexOp::Minus) => write!(f, "-"),
            LexerToken::Op(LexOp::Multiply) => write!(f, "*"),
            LexerToken::Op(LexOp::Divide) => write!(f, "/"),
            LexerToken::Op(LexOp::Open) => write!(f, "("),
            LexerToken::Op(LexOp::Close) => write!(f, ")"),
            LexerToken::Op(LexOp::Sep) => write!(f, ","),
            LexerToken::Op(LexOp::Equal) => write!(f, "="),
            LexerToken::Op(LexOp::NotEqual) => write!(f, "<>"),
            LexerToken::Op(LexOp::Less) => write!(f, "<"),
            LexerToken::Op(LexOp::LessEqual) => write!(f, "<="),
            LexerToken::Op(LexOp::Greater) => write!(f, ">"),
            LexerToken::Op(LexOp::GreaterEqual) => write!(f, ">="),
        }
    }
}
