//! FILENAME: core/engine/src/scheduler.rs
//! PURPOSE: The scheduler (C5, §4.4): dirty-set expansion, the pre-pass
//! cycle check, and dispatch onto a fixed-size worker pool.
//! CONTEXT: Uses `std::thread` directly rather than `rayon` — see
//! DESIGN.md's "Concurrency crate choice" entry. The only suspension point
//! anywhere in a recalculation pass is `FormulaCell::get_value` (§5); this
//! module never blocks a worker on anything else.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Condvar, Mutex};

use parser::address::AbsAddress;
use parser::model::{FormulaError, ModelAccess};
use parser::token::Token;
use tracing::{debug, warn};

use crate::cell::FormulaCell;
use crate::dependency_graph::DependencyTracker;
use crate::interpreter;

/// Read access to the formula cells a recalculation pass operates over.
/// Kept separate from `ModelAccess` (which the interpreter uses to read
/// plain cell values) because the scheduler needs to mutate a cell's
/// result cache and `circular_safe` flag directly, not just read a
/// blocking numeric view of it.
pub trait FormulaCellDirectory: Send + Sync {
    fn get(&self, addr: AbsAddress) -> Option<&FormulaCell>;
}

/// §4.4 step 1: the union of every input address's cell- and
/// range-listeners, plus the volatile set.
pub fn get_all_dirty_cells(tracker: &DependencyTracker, modified: &[AbsAddress]) -> HashSet<AbsAddress> {
    let mut dirty = HashSet::new();
    for &addr in modified {
        dirty.extend(tracker.get_all_cell_listeners(addr));
        dirty.extend(tracker.get_all_range_listeners(addr));
    }
    dirty.extend(tracker.volatile_cells().iter().copied());
    dirty
}

fn single_ref_dependencies(tokens: &[Token], origin: AbsAddress) -> Vec<AbsAddress> {
    tokens
        .iter()
        .filter_map(|tok| match tok {
            Token::SingleRef(addr) => Some(addr.to_abs(origin)),
            _ => None,
        })
        .collect()
}

#[derive(Clone, Copy, PartialEq)]
enum Color {
    Gray,
    Black,
}

/// §4.4 step 3. Depth-first visits each dirty cell's single-reference
/// dependencies (range references are not followed — Open Question (c)).
/// When the walk revisits a cell still on the stack, every cell from that
/// point to the top of the stack is part of the cycle and has
/// `Error(RefResultNotAvailable)` forced into its cache; every other
/// visited cell becomes `circular_safe`.
fn run_circular_check(directory: &dyn FormulaCellDirectory, dirty: &HashSet<AbsAddress>) {
    let mut color: HashMap<AbsAddress, Color> = HashMap::new();
    let mut stack: Vec<AbsAddress> = Vec::new();

    fn visit(
        directory: &dyn FormulaCellDirectory,
        dirty: &HashSet<AbsAddress>,
        addr: AbsAddress,
        color: &mut HashMap<AbsAddress, Color>,
        stack: &mut Vec<AbsAddress>,
    ) {
        match color.get(&addr) {
            Some(Color::Black) => return,
            Some(Color::Gray) => {
                if let Some(pos) = stack.iter().position(|a| *a == addr) {
                    warn!(cycle_len = stack.len() - pos, "circular reference detected");
                    for &cyclic_addr in &stack[pos..] {
                        if let Some(cell) = directory.get(cyclic_addr) {
                            cell.force_error(FormulaError::RefResultNotAvailable);
                        }
                    }
                }
                return;
            }
            None => {}
        }

        let Some(cell) = directory.get(addr) else { return };
        if !dirty.contains(&addr) {
            return;
        }

        color.insert(addr, Color::Gray);
        stack.push(addr);
        for dep in single_ref_dependencies(&cell.tokens, addr) {
            visit(directory, dirty, dep, color, stack);
        }
        stack.pop();
        color.insert(addr, Color::Black);

        if !cell.has_result() {
            cell.set_circular_safe(true);
        }
    }

    for &addr in dirty {
        visit(directory, dirty, addr, &mut color, &mut stack);
    }
}

/// A fixed-size pool of OS threads draining a shared work queue. No
/// cooperative suspension: a worker that blocks (inside `get_value`) does
/// so with an OS condvar, holding no lock that would stall another worker.
struct WorkerPool {
    queue: Arc<Mutex<VecDeque<AbsAddress>>>,
    condvar: Arc<Condvar>,
}

impl WorkerPool {
    fn run(thread_count: usize, dirty: Vec<AbsAddress>, model: &dyn ModelAccess, directory: &dyn FormulaCellDirectory) {
        let pool = WorkerPool {
            queue: Arc::new(Mutex::new(dirty.into_iter().collect())),
            condvar: Arc::new(Condvar::new()),
        };

        std::thread::scope(|scope| {
            for _ in 0..thread_count.max(1) {
                scope.spawn(|| pool.worker_loop(model, directory));
            }
        });
    }

    fn worker_loop(&self, model: &dyn ModelAccess, directory: &dyn FormulaCellDirectory) {
        loop {
            let addr = {
                let mut queue = self.queue.lock().unwrap();
                match queue.pop_front() {
                    Some(addr) => addr,
                    None => return,
                }
            };

            let Some(cell) = directory.get(addr) else { continue };
            if cell.has_result() {
                continue;
            }

            let result = interpreter::evaluate(model, addr, &cell.tokens);
            cell.publish(result);
            self.condvar.notify_all();
        }
    }
}

/// §4.4 steps 2-4: reset caches, run the circular check, and dispatch every
/// still-unresolved dirty cell onto a pool of `thread_count` workers.
/// Returns once the pool is idle and every cell in `dirty` has a cached
/// result or error.
pub fn calculate_cells(model: &dyn ModelAccess, directory: &dyn FormulaCellDirectory, dirty: &HashSet<AbsAddress>, thread_count: usize) {
    let span = tracing::info_span!("calculate_cells", recompute_set_size = dirty.len(), thread_count);
    let _guard = span.enter();

    for &addr in dirty {
        if let Some(cell) = directory.get(addr) {
            cell.reset();
        }
    }

    run_circular_check(directory, dirty);

    let pending: Vec<AbsAddress> = dirty
        .iter()
        .copied()
        .filter(|addr| directory.get(*addr).map(|c| !c.has_result()).unwrap_or(false))
        .collect();

    debug!(pending = pending.len(), "dispatching recalculation pass");
    WorkerPool::run(thread_count, pending, model, directory);
}

#[cfg(test)]
mod tests {
    use super::*;
    use parser::address::{AbsRange, Address, Range, ROW_UNSET};
    use parser::model::{CellType, CellTypeMask, FormulaCellHandle, FormulaConfig, Matrix, StringId};

    struct NullModel;
    impl ModelAccess for NullModel {
        fn config(&self) -> FormulaConfig {
            FormulaConfig::default()
        }
        fn is_empty(&self, _addr: AbsAddress) -> bool {
            true
        }
        fn cell_type(&self, _addr: AbsAddress) -> CellType {
            CellType::Empty
        }
        fn numeric_value(&self, _addr: AbsAddress) -> Result<f64, FormulaError> {
            Ok(0.0)
        }
        fn string_id_for_bytes(&self, _bytes: &[u8]) -> StringId {
            0
        }
        fn string_id_for_addr(&self, _addr: AbsAddress) -> Option<StringId> {
            None
        }
        fn string_value(&self, _id: StringId) -> String {
            String::new()
        }
        fn formula_cell(&self, _addr: AbsAddress) -> Option<&dyn FormulaCellHandle> {
            None
        }
        fn range_value(&self, _range: AbsRange) -> Result<Matrix, FormulaError> {
            Ok(Matrix::new(0, 0))
        }
        fn count_range(&self, _range: AbsRange, _kinds: CellTypeMask) -> usize {
            0
        }
        fn named_expression(&self, _name: &str) -> Option<AbsRange> {
            None
        }
        fn named_expression_name(&self, _cell: AbsAddress) -> Option<String> {
            None
        }
        fn append_string(&self, _bytes: &[u8]) -> StringId {
            0
        }
        fn add_string(&self, _bytes: &[u8]) -> StringId {
            0
        }
        fn sheet_index(&self, _name: &str) -> i32 {
            parser::address::INVALID_SHEET
        }
        fn sheet_name(&self, _index: i32) -> Option<String> {
            None
        }
        fn formula_tokens(&self, _addr: AbsAddress) -> Option<Arc<[Token]>> {
            None
        }
        fn shared_formula_tokens(&self, _sheet: i32, _identifier: usize) -> Option<Arc<[Token]>> {
            None
        }
        fn shared_formula_range(&self, _sheet: i32, _identifier: usize) -> Option<AbsRange> {
            None
        }
    }

    /// All inserts happen before `calculate_cells` runs any worker, so the
    /// map itself never needs synchronization — only each `FormulaCell`'s
    /// own mutex/condvar does, for the concurrent reads/writes during a
    /// pass.
    struct MapDirectory {
        cells: HashMap<AbsAddress, FormulaCell>,
    }

    impl MapDirectory {
        fn new() -> Self {
            MapDirectory { cells: HashMap::new() }
        }

        fn insert(&mut self, addr: AbsAddress, tokens: Vec<Token>) {
            self.cells.insert(addr, FormulaCell::new(Arc::from(tokens), 0, false));
        }
    }

    impl FormulaCellDirectory for MapDirectory {
        fn get(&self, addr: AbsAddress) -> Option<&FormulaCell> {
            self.cells.get(&addr)
        }
    }

    fn addr(row: i32, col: i32) -> AbsAddress {
        AbsAddress::new(0, row, col)
    }

    #[test]
    fn dirty_expansion_includes_listeners_and_volatile_cells() {
        let mut tracker = DependencyTracker::new();
        tracker.add_cell_listener(addr(0, 0), addr(0, 1));
        tracker.add_volatile(addr(9, 9));

        let dirty = get_all_dirty_cells(&tracker, &[addr(0, 0)]);
        assert!(dirty.contains(&addr(0, 1)));
        assert!(dirty.contains(&addr(9, 9)));
    }

    #[test]
    fn two_cell_cycle_resolves_to_ref_result_not_available() {
        let mut directory = MapDirectory::new();
        let a = addr(0, 0);
        let b = addr(0, 1);
        directory.insert(a, vec![Token::SingleRef(Address::new(0, 0, 1, false, false, false))]);
        directory.insert(b, vec![Token::SingleRef(Address::new(0, 0, -1, false, false, false))]);

        let mut dirty = HashSet::new();
        dirty.insert(a);
        dirty.insert(b);

        let model = NullModel;
        calculate_cells(&model, &directory, &dirty, 2);

        assert_eq!(directory.get(a).unwrap().get_value(), crate::cell::FormulaResult::Error(FormulaError::RefResultNotAvailable));
        assert_eq!(directory.get(b).unwrap().get_value(), crate::cell::FormulaResult::Error(FormulaError::RefResultNotAvailable));
    }

    #[test]
    fn independent_cells_all_resolve() {
        let mut directory = MapDirectory::new();
        let a = addr(0, 0);
        let b = addr(0, 1);
        directory.insert(a, vec![Token::Value(1.0), Token::Plus, Token::Value(2.0)]);
        directory.insert(b, vec![Token::Value(10.0)]);

        let mut dirty = HashSet::new();
        dirty.insert(a);
        dirty.insert(b);

        let model = NullModel;
        calculate_cells(&model, &directory, &dirty, 4);

        assert_eq!(directory.get(a).unwrap().get_value(), crate::cell::FormulaResult::Value(3.0));
        assert_eq!(directory.get(b).unwrap().get_value(), crate::cell::FormulaResult::Value(10.0));
    }

    #[test]
    fn whole_column_listener_is_not_followed_by_the_single_reference_cycle_check() {
        // Documents Open Question (c): range-closed cycles are not detected
        // here. `ROW_UNSET`/`Range`/`AbsRange` stay otherwise unused by this
        // test beyond existing as part of the type signatures they appear in.
        let _ = ROW_UNSET;
        let _ = Range::new(Address::absolute(addr(0, 0)), Address::absolute(addr(0, 0)));
    }
}
