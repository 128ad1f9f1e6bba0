//! FILENAME: core/engine/src/lib.rs
//! PURPOSE: Library root for the formula core's runtime half (C4-C6): the
//! dependency tracker, scheduler, and interpreter that turn parsed tokens
//! into cached cell results.
//! CONTEXT: Builds directly on the `parser` crate's token model and
//! `ModelAccess` trait; never reaches into a host document beyond that
//! trait.

pub mod cell;
pub mod dependency_graph;
pub mod error;
pub mod functions;
pub mod interpreter;
pub mod scheduler;
pub mod shared_formula;

pub use cell::{FormulaCell, FormulaResult};
pub use dependency_graph::DependencyTracker;
pub use error::IxionError;
pub use interpreter::{evaluate, StackValue};
pub use scheduler::{calculate_cells, get_all_dirty_cells, FormulaCellDirectory};
pub use shared_formula::{Neighbour, Placement, SharedEntry, SharedFormulaStore};

use std::sync::Arc;

use parser::address::AbsAddress;
use parser::functions::FnId;
use parser::model::ModelAccess;
use parser::token::Token;

/// Wires the dependency edges implied by the formula cell at `addr`'s
/// tokens: a cell-listener edge from every `SingleRef` it reads, a
/// range-listener edge from every `RangeRef`, and a volatile registration
/// if it calls `NOW()` (§4.3, §6's `register_formula_cell`). Fails if `addr`
/// names no formula cell the model knows about.
pub fn register_formula_cell(model: &dyn ModelAccess, tracker: &mut DependencyTracker, addr: AbsAddress) -> Result<(), IxionError> {
    let tokens = model.formula_tokens(addr).ok_or(IxionError::NoSuchFormula(addr))?;
    wire_dependencies(tracker, addr, &tokens)
}

fn wire_dependencies(tracker: &mut DependencyTracker, addr: AbsAddress, tokens: &Arc<[Token]>) -> Result<(), IxionError> {
    for token in tokens.iter() {
        match token {
            Token::SingleRef(reference) => {
                let target = reference.to_abs(addr);
                if !target.valid() {
                    return Err(IxionError::UnknownSheet(addr));
                }
                tracker.add_cell_listener(target, addr);
            }
            Token::RangeRef(range) => {
                let target = range.to_abs(addr);
                if target.multi_sheet() {
                    return Err(IxionError::MultiSheetRange);
                }
                tracker.add_range_listener(target, addr);
            }
            Token::Function(FnId::Now) => tracker.add_volatile(addr),
            _ => {}
        }
    }
    Ok(())
}

/// Undoes `register_formula_cell`: removes every listener edge naming
/// `addr`, whether as the observed key or as a dependent. After this call,
/// no change to any other cell dirties `addr`'s former dependents through a
/// stale edge.
pub fn unregister_formula_cell(tracker: &mut DependencyTracker, addr: AbsAddress) {
    tracker.remove_all_edges(addr);
}
