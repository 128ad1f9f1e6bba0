//! FILENAME: core/engine/src/interpreter.rs
//! PURPOSE: The interpreter (C6, §4.5): a recursive-descent evaluator that
//! walks the exact grammar `parser::parser` used to build the token
//! sequence, consuming `Token`s directly rather than converting to RPN.
//! CONTEXT: Contract per rule: entered with the cursor at its first
//! unprocessed token, leaves it one past its last consumed token — mirrors
//! `parser::parser::Parser`'s own contract so the two stay symmetric.

use std::sync::Arc;

use parser::address::AbsAddress;
use parser::model::{CellType, FormulaError, Matrix, ModelAccess};
use parser::token::Token;

use crate::cell::FormulaResult;
use crate::functions;

/// One element of the evaluator's value stack. Unlike the token stream,
/// this already carries resolved data: a `SingleRef`/`RangeRef` token never
/// survives evaluation as itself — it is immediately turned into a
/// `Number`, `Text`, or `Range` per the rules below.
#[derive(Debug, Clone, PartialEq)]
pub enum StackValue {
    Number(f64),
    Text(u32),
    Range(Matrix),
}

impl StackValue {
    /// `pop_value`'s scalar view: flattens a range by summing its cells (the
    /// only aggregation the spec specifies elsewhere, via `SUM`'s "non-
    /// numeric cells contribute zero" rule applied uniformly here too).
    fn scalar(&self) -> f64 {
        match self {
            StackValue::Number(n) => *n,
            StackValue::Text(_) => 0.0,
            StackValue::Range(m) => m.iter().sum(),
        }
    }
}

/// Evaluates a parsed token sequence belonging to the formula cell at
/// `origin`, returning the memoisable `FormulaResult`. Never panics on
/// malformed input — the parser already validated the grammar, so any
/// internal inconsistency here is a bug, not user error (propagated as
/// `FormulaError::InvalidExpression`, matching the General/invalid-
/// expression taxonomy of §7).
pub fn evaluate(model: &dyn ModelAccess, origin: AbsAddress, tokens: &Arc<[Token]>) -> FormulaResult {
    let mut interp = Interpreter { tokens, pos: 0, origin, model };
    match interp.expression() {
        Ok(StackValue::Number(n)) => FormulaResult::Value(n),
        Ok(StackValue::Text(id)) => FormulaResult::StringId(id),
        // A formula that evaluates to a bare range ("=A1:A3") has no scalar
        // cell value to publish.
        Ok(StackValue::Range(_)) => FormulaResult::Error(FormulaError::InvalidExpression),
        Err(e) => FormulaResult::Error(e),
    }
}

struct Interpreter<'a> {
    tokens: &'a [Token],
    pos: usize,
    origin: AbsAddress,
    model: &'a dyn ModelAccess,
}

type EvalResult = Result<StackValue, FormulaError>;

impl<'a> Interpreter<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expression(&mut self) -> EvalResult {
        let mut acc = self.term()?.scalar();
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.advance();
                    acc += self.term()?.scalar();
                }
                Some(Token::Minus) => {
                    self.advance();
                    acc -= self.term()?.scalar();
                }
                _ => break,
            }
        }
        Ok(StackValue::Number(acc))
    }

    fn term(&mut self) -> EvalResult {
        let mut acc = self.unary()?.scalar();
        loop {
            match self.peek() {
                Some(Token::Multiply) => {
                    self.advance();
                    acc *= self.unary()?.scalar();
                }
                Some(Token::Divide) => {
                    self.advance();
                    let rhs = self.unary()?.scalar();
                    if rhs == 0.0 {
                        return Err(FormulaError::DivisionByZero);
                    }
                    acc /= rhs;
                }
                _ => break,
            }
        }
        Ok(StackValue::Number(acc))
    }

    fn unary(&mut self) -> EvalResult {
        if matches!(self.peek(), Some(Token::Minus)) {
            self.advance();
            let v = self.unary()?.scalar();
            return Ok(StackValue::Number(-v));
        }
        self.factor()
    }

    fn factor(&mut self) -> EvalResult {
        match self.advance() {
            Some(Token::Open) => {
                let inner = self.expression()?;
                match self.advance() {
                    Some(Token::Close) => Ok(inner),
                    _ => Err(FormulaError::InvalidExpression),
                }
            }
            Some(Token::Value(v)) => Ok(StackValue::Number(*v)),
            Some(Token::Str(id)) => Ok(StackValue::Text(*id)),
            Some(Token::SingleRef(addr)) => self.eval_single_ref(addr.to_abs(self.origin)),
            Some(Token::RangeRef(range)) => self.eval_range(range.to_abs(self.origin)),
            Some(Token::TableRef(_)) => Err(FormulaError::InvalidExpression),
            Some(Token::NamedExp(name)) => match self.model.named_expression(name) {
                Some(range) => self.eval_range(range),
                None => Err(FormulaError::RefResultNotAvailable),
            },
            Some(Token::Function(id)) => {
                let id = id.clone();
                self.function_call(&id)
            }
            Some(Token::ErrNoRef) => Err(FormulaError::RefResultNotAvailable),
            Some(_) => Err(FormulaError::InvalidExpression),
            None => Err(FormulaError::InvalidExpression),
        }
    }

    fn eval_single_ref(&self, abs: AbsAddress) -> EvalResult {
        if self.model.is_empty(abs) {
            return Ok(StackValue::Number(0.0));
        }
        match self.model.cell_type(abs) {
            CellType::Formula => {
                let handle = self.model.formula_cell(abs).ok_or(FormulaError::RefResultNotAvailable)?;
                Ok(StackValue::Number(handle.numeric_value()?))
            }
            CellType::String => match self.model.string_id_for_addr(abs) {
                Some(id) => Ok(StackValue::Text(id)),
                None => Ok(StackValue::Number(0.0)),
            },
            CellType::Numeric => Ok(StackValue::Number(self.model.numeric_value(abs)?)),
            CellType::Empty | CellType::Unknown => Ok(StackValue::Number(0.0)),
        }
    }

    fn eval_range(&self, range: parser::address::AbsRange) -> EvalResult {
        if range.multi_sheet() {
            return Err(FormulaError::InvalidExpression);
        }
        Ok(StackValue::Range(self.model.range_value(range)?))
    }

    fn function_call(&mut self, id: &parser::functions::FnId) -> EvalResult {
        match self.advance() {
            Some(Token::Open) => {}
            _ => return Err(FormulaError::InvalidExpression),
        }

        let mut args = Vec::new();
        if !matches!(self.peek(), Some(Token::Close)) {
            args.push(self.expression()?);
            while matches!(self.peek(), Some(Token::Sep)) {
                self.advance();
                args.push(self.expression()?);
            }
        }

        match self.advance() {
            Some(Token::Close) => {}
            _ => return Err(FormulaError::InvalidExpression),
        }

        functions::call(id, args)
    }
}
