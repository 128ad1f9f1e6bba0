//! FILENAME: core/engine/src/functions.rs
//! PURPOSE: Runtime evaluation of the builtin function table (§4.5):
//! `SUM, MIN, MAX, AVERAGE, WAIT, NOW`. Dispatch is by the `FnId` opcode
//! the parser already resolved; no name lookup happens at this layer.
//! CONTEXT: Operates on `StackValue`, the interpreter's value-stack element
//! type (`interpreter.rs`), not directly on tokens.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parser::functions::FnId;
use parser::model::FormulaError;

use crate::interpreter::StackValue;

/// Every numeric cell an argument contributes. Ranges already carry the
/// "non-numeric cells are zero" convention on `Matrix` itself (§6), so this
/// is a flat extraction, not a filter.
fn numbers_from(value: &StackValue) -> Vec<f64> {
    match value {
        StackValue::Number(n) => vec![*n],
        StackValue::Text(_) => vec![0.0],
        StackValue::Range(m) => m.iter().collect(),
    }
}

/// Dispatches a builtin call given its already-evaluated arguments.
/// `FnId::Custom` names a function this core doesn't implement itself;
/// evaluating one is an `InvalidExpression`, matching a host asking for a
/// function neither the core nor (by construction, since `Custom` only
/// arises when no builtin matched) any known id provides.
pub fn call(id: &FnId, args: Vec<StackValue>) -> Result<StackValue, FormulaError> {
    match id {
        FnId::Sum => {
            let total: f64 = args.iter().flat_map(numbers_from).sum();
            Ok(StackValue::Number(total))
        }
        FnId::Min => {
            let nums: Vec<f64> = args.iter().flat_map(numbers_from).collect();
            Ok(StackValue::Number(nums.into_iter().fold(f64::INFINITY, f64::min)))
        }
        FnId::Max => {
            let nums: Vec<f64> = args.iter().flat_map(numbers_from).collect();
            Ok(StackValue::Number(nums.into_iter().fold(f64::NEG_INFINITY, f64::max)))
        }
        FnId::Average => {
            let nums: Vec<f64> = args.iter().flat_map(numbers_from).collect();
            if nums.is_empty() {
                Err(FormulaError::InvalidExpression)
            } else {
                Ok(StackValue::Number(nums.iter().sum::<f64>() / nums.len() as f64))
            }
        }
        FnId::Wait => {
            // Test hook: every call blocks its worker thread for one second,
            // used to exercise the scheduler's "independent branches make
            // progress concurrently" guarantee (§5).
            std::thread::sleep(Duration::from_secs(1));
            Ok(args.into_iter().next().unwrap_or(StackValue::Number(0.0)))
        }
        FnId::Now => Ok(StackValue::Number(now_as_fractional_day())),
        FnId::Custom(_) => Err(FormulaError::InvalidExpression),
    }
}

/// Current wall time as a fractional day count, the spreadsheet-native
/// representation of "now" (§4.5). `NOW()` never appears in a formula
/// without the cell also being registered as volatile — that registration
/// happens in `register_formula_cell`, not here.
fn now_as_fractional_day() -> f64 {
    let since_epoch = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    since_epoch.as_secs_f64() / 86_400.0
}
