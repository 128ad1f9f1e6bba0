//! FILENAME: core/engine/src/cell.rs
//! PURPOSE: The formula cell (§3 "Formula cell"): the per-cell memoised
//! result cache workers publish to and block on.
//! CONTEXT: `tokens` is the parsed body (shared across a shared-formula
//! column, see `shared_formula.rs`); `result` is the only piece of this
//! struct workers mutate during a recalculation pass, and it is guarded by
//! its own mutex/condvar so that blocking on one cell never holds up
//! another (§5).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use parser::model::{FormulaError, StringId};
use parser::token::Token;

/// The memoised outcome of evaluating a formula cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FormulaResult {
    Value(f64),
    StringId(StringId),
    Error(FormulaError),
}

impl FormulaResult {
    /// The numeric view `FormulaCellHandle::numeric_value` and `SUM`-family
    /// functions need: non-numeric results contribute `0.0`.
    pub fn numeric_value(&self) -> Result<f64, FormulaError> {
        match self {
            FormulaResult::Value(v) => Ok(*v),
            FormulaResult::StringId(_) => Ok(0.0),
            FormulaResult::Error(e) => Err(*e),
        }
    }
}

/// A formula cell's mutable state: one mutex/condvar pair guarding the
/// cached result, per §4.5's "Result publication protocol".
struct ResultCache {
    mutex: Mutex<Option<FormulaResult>>,
    condvar: Condvar,
}

impl ResultCache {
    fn new() -> Self {
        ResultCache {
            mutex: Mutex::new(None),
            condvar: Condvar::new(),
        }
    }
}

/// A cell whose value is computed from tokens rather than stored.
///
/// `circular_safe` is set by the scheduler's pre-pass (§4.4 step 3) before
/// any worker touches the cell's cache; it is an `AtomicBool` rather than a
/// plain `bool` only because the pre-pass itself may run concurrently with
/// readers that inspect it (the pass never writes it after dispatch, so a
/// relaxed load/store is enough).
pub struct FormulaCell {
    pub tokens: Arc<[Token]>,
    pub identifier: usize,
    pub shared: bool,
    circular_safe: AtomicBool,
    cache: ResultCache,
}

impl FormulaCell {
    pub fn new(tokens: Arc<[Token]>, identifier: usize, shared: bool) -> Self {
        FormulaCell {
            tokens,
            identifier,
            shared,
            circular_safe: AtomicBool::new(false),
            cache: ResultCache::new(),
        }
    }

    pub fn circular_safe(&self) -> bool {
        self.circular_safe.load(Ordering::Relaxed)
    }

    pub fn set_circular_safe(&self, safe: bool) {
        self.circular_safe.store(safe, Ordering::Relaxed);
    }

    /// Drops the cached result and the `circular_safe` flag, as the
    /// scheduler does for every cell in the recompute set before dispatch
    /// (§4.4 step 2).
    pub fn reset(&self) {
        self.set_circular_safe(false);
        *self.cache.mutex.lock().unwrap() = None;
    }

    /// Publishes `result`, if the cache is still empty, and wakes any
    /// readers parked in `get_value`. A cache that already holds a value
    /// means either another worker raced us to it or the circular-check
    /// pre-pass already populated an error; either way we do not overwrite.
    pub fn publish(&self, result: FormulaResult) {
        let mut guard = self.cache.mutex.lock().unwrap();
        if guard.is_none() {
            *guard = Some(result);
        }
        drop(guard);
        self.cache.condvar.notify_all();
    }

    /// Pre-populates an error directly, bypassing the "already set" guard.
    /// Used by the circular-check pre-pass to short-circuit cells reachable
    /// from themselves before any worker is dispatched (§4.4 step 3).
    pub fn force_error(&self, error: FormulaError) {
        let mut guard = self.cache.mutex.lock().unwrap();
        *guard = Some(FormulaResult::Error(error));
        drop(guard);
        self.cache.condvar.notify_all();
    }

    pub fn has_result(&self) -> bool {
        self.cache.mutex.lock().unwrap().is_some()
    }

    /// Blocks until a result is cached, then returns it. The cache mutex is
    /// held only while waiting or copying the result out, never across the
    /// actual computation (§5's only suspension point).
    pub fn get_value(&self) -> FormulaResult {
        let guard = self.cache.mutex.lock().unwrap();
        let guard = self
            .cache
            .condvar
            .wait_while(guard, |result| result.is_none())
            .unwrap();
        guard.expect("condvar only wakes once a result is set")
    }

    pub fn numeric_value(&self) -> Result<f64, FormulaError> {
        self.get_value().numeric_value()
    }
}

impl parser::model::FormulaCellHandle for FormulaCell {
    fn numeric_value(&self) -> Result<f64, FormulaError> {
        FormulaCell::numeric_value(self)
    }
}
