//! FILENAME: core/engine/src/error.rs
//! PURPOSE: The crate-level error a host sees from `register_formula_cell`
//! and `calculate_cells`, as opposed to `FormulaError`, which lives inside a
//! cell's own result cache and is never propagated as a `Result::Err` (§7).

use parser::address::AbsAddress;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IxionError {
    #[error("no formula is registered at {0:?}")]
    NoSuchFormula(AbsAddress),

    #[error("formula at {0:?} references a sheet that does not exist")]
    UnknownSheet(AbsAddress),

    #[error("a range listener spans more than one sheet, which is never valid")]
    MultiSheetRange,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_the_offending_address() {
        let err = IxionError::NoSuchFormula(AbsAddress::new(0, 1, 1));
        assert!(err.to_string().contains("1"));
    }
}
