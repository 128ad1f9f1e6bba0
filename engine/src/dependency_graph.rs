//! FILENAME: core/engine/src/dependency_graph.rs
//! PURPOSE: The dependency tracker (C4, spec §4.3): two adjacency maps from
//! an observed cell/range to the formula cells that must be recomputed when
//! it changes, plus the volatile set.
//! CONTEXT: Mutated only on the main thread, between recalculation passes
//! (§5); the scheduler reads it during dirty-set expansion but never writes
//! it mid-pass. Keyed by `AbsAddress`/`AbsRange` rather than raw pointers —
//! an arena-of-cells pattern, per the "cyclic references" design note.

use std::collections::{HashMap, HashSet, VecDeque};

use parser::address::{AbsAddress, AbsRange};

/// Tracks which formula cells observe which cells/ranges, so a modified
/// address can be expanded into its full recompute set (§4.3, §4.4 step 1).
#[derive(Debug, Default)]
pub struct DependencyTracker {
    cell_listeners: HashMap<AbsAddress, HashSet<AbsAddress>>,
    range_listeners: HashMap<AbsRange, HashSet<AbsAddress>>,
    volatile_cells: HashSet<AbsAddress>,
}

impl DependencyTracker {
    pub fn new() -> Self {
        DependencyTracker::default()
    }

    /// `dest` must be recomputed whenever `src` changes. Idempotent.
    pub fn add_cell_listener(&mut self, src: AbsAddress, dest: AbsAddress) {
        self.cell_listeners.entry(src).or_default().insert(dest);
    }

    pub fn remove_cell_listener(&mut self, src: AbsAddress, dest: AbsAddress) {
        if let Some(listeners) = self.cell_listeners.get_mut(&src) {
            listeners.remove(&dest);
            if listeners.is_empty() {
                self.cell_listeners.remove(&src);
            }
        }
    }

    /// `dest` must be recomputed whenever any cell within `range` changes.
    /// Duplicate edges are silently ignored (the backing set already does
    /// that; this method exists for symmetry with `add_cell_listener`).
    pub fn add_range_listener(&mut self, range: AbsRange, dest: AbsAddress) {
        self.range_listeners.entry(range).or_default().insert(dest);
    }

    pub fn remove_range_listener(&mut self, range: AbsRange, dest: AbsAddress) {
        if let Some(listeners) = self.range_listeners.get_mut(&range) {
            listeners.remove(&dest);
            if listeners.is_empty() {
                self.range_listeners.remove(&range);
            }
        }
    }

    pub fn add_volatile(&mut self, pos: AbsAddress) {
        self.volatile_cells.insert(pos);
    }

    pub fn remove_volatile(&mut self, pos: AbsAddress) {
        self.volatile_cells.remove(&pos);
    }

    pub fn volatile_cells(&self) -> &HashSet<AbsAddress> {
        &self.volatile_cells
    }

    /// Removes every listener edge that names `addr`, either as the
    /// observed key or as a listener in the value set. Used by
    /// `erase_cell` (§8 invariant: after erasing a cell no listener edge
    /// referencing it remains).
    pub fn remove_all_edges(&mut self, addr: AbsAddress) {
        self.cell_listeners.remove(&addr);
        for listeners in self.cell_listeners.values_mut() {
            listeners.remove(&addr);
        }
        self.cell_listeners.retain(|_, listeners| !listeners.is_empty());

        for listeners in self.range_listeners.values_mut() {
            listeners.remove(&addr);
        }
        self.range_listeners.retain(|_, listeners| !listeners.is_empty());

        self.volatile_cells.remove(&addr);
    }

    /// Transitive closure over `cell_listeners`, breadth-first from
    /// `target`. A visited-set guards against infinite recursion on a
    /// cycle; `target` itself is not included unless it is its own
    /// listener.
    pub fn get_all_cell_listeners(&self, target: AbsAddress) -> HashSet<AbsAddress> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(target);

        while let Some(addr) = queue.pop_front() {
            if let Some(listeners) = self.cell_listeners.get(&addr) {
                for &next in listeners {
                    if visited.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
        }
        visited
    }

    /// Every listener of a range containing `target`, honouring
    /// whole-row/whole-column sentinels via `AbsRange::contains`. Does not
    /// recurse through the listeners found this way — range-to-range
    /// transitivity is handled by the scheduler calling this alongside
    /// `get_all_cell_listeners` once per dirty address.
    pub fn get_all_range_listeners(&self, target: AbsAddress) -> HashSet<AbsAddress> {
        let mut result = HashSet::new();
        for (range, listeners) in &self.range_listeners {
            if range.contains(target) {
                result.extend(listeners.iter().copied());
            }
        }
        result
    }

    pub fn cell_listener_count(&self) -> usize {
        self.cell_listeners.values().map(HashSet::len).sum()
    }

    pub fn range_listener_count(&self) -> usize {
        self.range_listeners.values().map(HashSet::len).sum()
    }
}
