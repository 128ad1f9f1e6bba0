//! FILENAME: parser/src/resolver.rs
//! PURPOSE: Pluggable name classification (§4.2/§4.3). The concrete A1,
//! R1C1, and ODFF syntaxes are explicitly out of scope for this core (they
//! are "pure syntactic concerns already adequately described by their
//! grammars" per spec §1) — `A1Resolver` below exists only as a reference
//! implementation so the parser/printer round-trip property (§8) is
//! testable without a host document model.
//! CONTEXT: `FormulaNameResolver` is the seam a host plugs its chosen
//! reference syntax into; the parser never hard-codes A1 semantics itself.

use crate::address::{Address, Range, AbsAddress, COLUMN_UNSET, ROW_UNSET};
use crate::functions::FnId;
use crate::model::ModelAccess;
use crate::token::TableSpec;

/// What a bare `Name` token turned out to mean.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedName {
    CellReference(Address),
    RangeReference(Range),
    TableReference(TableSpec),
    NamedExpression(String),
    Function(FnId),
    Invalid,
}

/// Strategy object mapping source-text names to `ResolvedName`. Implemented
/// once per reference syntax (A1, R1C1, ODFF, ...); the parser is agnostic
/// to which one is plugged in.
pub trait FormulaNameResolver: Send + Sync {
    fn resolve(&self, name: &str, origin: AbsAddress, model: &dyn ModelAccess) -> ResolvedName;

    /// Renders a resolved reference back to source text, the inverse of
    /// `resolve`. Used by `print_formula_tokens`.
    fn print_cell_ref(&self, addr: Address, origin: AbsAddress) -> String;
    fn print_range_ref(&self, range: Range, origin: AbsAddress) -> String;
}

/// Reference A1-style resolver: `A1`, `$A$1`, `Sheet1!A1`, `B2:B4`, `A:A`,
/// `3:3`. Column letters are case-insensitive; `$` marks an absolute
/// component.
pub struct A1Resolver;

impl A1Resolver {
    pub fn new() -> Self {
        A1Resolver
    }

    fn col_to_index(s: &str) -> Option<i32> {
        if s.is_empty() || !s.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }
        let mut result: i64 = 0;
        for c in s.chars() {
            let digit = (c.to_ascii_uppercase() as i64) - ('A' as i64) + 1;
            result = result * 26 + digit;
        }
        Some((result - 1) as i32)
    }

    fn index_to_col(mut index: i32) -> String {
        let mut result = String::new();
        loop {
            let remainder = index % 26;
            result.insert(0, (b'A' + remainder as u8) as char);
            if index < 26 {
                break;
            }
            index = index / 26 - 1;
        }
        result
    }

    /// Splits `Sheet1!A1` into `("Sheet1", "A1")`, or returns `(None, name)`.
    fn split_sheet<'a>(name: &'a str) -> (Option<&'a str>, &'a str) {
        match name.rfind('!') {
            Some(idx) => (Some(&name[..idx]), &name[idx + 1..]),
            None => (None, name),
        }
    }

    /// Parses a single cell reference like `A1`, `$A$1`, `A$1`.
    fn parse_cell(text: &str) -> Option<(i32, i32, bool, bool)> {
        let mut chars = text.chars().peekable();
        let col_abs = chars.peek() == Some(&'$');
        if col_abs {
            chars.next();
        }
        let mut col_str = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_ascii_alphabetic() {
                col_str.push(c);
                chars.next();
            } else {
                break;
            }
        }
        if col_str.is_empty() {
            return None;
        }
        let row_abs = chars.peek() == Some(&'$');
        if row_abs {
            chars.next();
        }
        let mut row_str = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_ascii_digit() {
                row_str.push(c);
                chars.next();
            } else {
                return None;
            }
        }
        if row_str.is_empty() || chars.next().is_some() {
            return None;
        }
        let col = Self::col_to_index(&col_str)?;
        let row: i32 = row_str.parse().ok()?;
        Some((row - 1, col, row_abs, col_abs))
    }

    /// Returns the `Address.sheet` component and its `abs_sheet` flag. An
    /// explicit `Sheet1!` prefix is always absolute; an implicit sheet is a
    /// zero offset from the origin (`Address::to_abs` adds it back).
    fn sheet_for(model: &dyn ModelAccess, sheet_name: Option<&str>) -> (i32, bool) {
        match sheet_name {
            Some(s) => (model.sheet_index(s), true),
            None => (0, false),
        }
    }

    /// Converts an absolute component and its `$`-ness into the value stored
    /// on `Address`: the absolute index itself if marked absolute, otherwise
    /// the offset from `origin_component` that `to_abs` will add back.
    fn relative_component(abs_value: i32, is_absolute: bool, origin_component: i32) -> i32 {
        if is_absolute {
            abs_value
        } else {
            abs_value - origin_component
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn build_address(sheet: i32, abs_sheet: bool, abs_row: i32, row_abs: bool, abs_col: i32, col_abs: bool, origin: AbsAddress) -> Address {
        let row = Self::relative_component(abs_row, row_abs, origin.row);
        let col = Self::relative_component(abs_col, col_abs, origin.column);
        Address::new(sheet, row, col, abs_sheet, row_abs, col_abs)
    }
}

impl Default for A1Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl FormulaNameResolver for A1Resolver {
    fn resolve(&self, name: &str, origin: AbsAddress, model: &dyn ModelAccess) -> ResolvedName {
        let (sheet_name, rest) = Self::split_sheet(name);
        let (sheet, abs_sheet) = Self::sheet_for(model, sheet_name);

        if let Some(colon) = rest.find(':') {
            let (first, second) = (&rest[..colon], &rest[colon + 1..]);

            // Whole row: "3:3"
            if let (Ok(r1), Ok(r2)) = (first.trim_start_matches('$').parse::<i32>(), second.trim_start_matches('$').parse::<i32>()) {
                let a1 = first.starts_with('$');
                let a2 = second.starts_with('$');
                let row1 = Self::relative_component(r1 - 1, a1, origin.row);
                let row2 = Self::relative_component(r2 - 1, a2, origin.row);
                let first_addr = Address::new(sheet, row1, COLUMN_UNSET, abs_sheet, a1, true);
                let last_addr = Address::new(sheet, row2, COLUMN_UNSET, abs_sheet, a2, true);
                return ResolvedName::RangeReference(Range::new(first_addr, last_addr));
            }

            // Whole column: "A:A"
            if first.trim_start_matches('$').chars().all(|c| c.is_ascii_alphabetic())
                && second.trim_start_matches('$').chars().all(|c| c.is_ascii_alphabetic())
                && !first.is_empty()
                && !second.is_empty()
            {
                let a1 = first.starts_with('$');
                let a2 = second.starts_with('$');
                let c1 = match Self::col_to_index(first.trim_start_matches('$')) {
                    Some(c) => c,
                    None => return ResolvedName::Invalid,
                };
                let c2 = match Self::col_to_index(second.trim_start_matches('$')) {
                    Some(c) => c,
                    None => return ResolvedName::Invalid,
                };
                let col1 = Self::relative_component(c1, a1, origin.column);
                let col2 = Self::relative_component(c2, a2, origin.column);
                let first_addr = Address::new(sheet, ROW_UNSET, col1, abs_sheet, true, a1);
                let last_addr = Address::new(sheet, ROW_UNSET, col2, abs_sheet, true, a2);
                return ResolvedName::RangeReference(Range::new(first_addr, last_addr));
            }

            // Regular cell:cell range
            if let (Some((r1, c1, ra1, ca1)), Some((r2, c2, ra2, ca2))) = (Self::parse_cell(first), Self::parse_cell(second)) {
                let first_addr = Self::build_address(sheet, abs_sheet, r1, ra1, c1, ca1, origin);
                let last_addr = Self::build_address(sheet, abs_sheet, r2, ra2, c2, ca2, origin);
                return ResolvedName::RangeReference(Range::new(first_addr, last_addr));
            }

            return ResolvedName::Invalid;
        }

        if let Some((row, col, row_abs, col_abs)) = Self::parse_cell(rest) {
            return ResolvedName::CellReference(Self::build_address(sheet, abs_sheet, row, row_abs, col, col_abs, origin));
        }

        if let Some(range) = model.named_expression(rest) {
            let _ = range;
            return ResolvedName::NamedExpression(rest.to_string());
        }

        ResolvedName::Invalid
    }

    fn print_cell_ref(&self, addr: Address, origin: AbsAddress) -> String {
        let abs = addr.to_abs(origin);
        let mut out = String::new();
        if addr.column != COLUMN_UNSET {
            if addr.abs_column {
                out.push('$');
            }
            out.push_str(&Self::index_to_col(abs.column));
        }
        if addr.row != ROW_UNSET {
            if addr.abs_row {
                out.push('$');
            }
            out.push_str(&(abs.row + 1).to_string());
        }
        out
    }

    fn print_range_ref(&self, range: Range, origin: AbsAddress) -> String {
        format!("{}:{}", self.print_cell_ref(range.first, origin), self.print_cell_ref(range.last, origin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CellType, CellTypeMask, FormulaConfig, FormulaError, Matrix, StringId};

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
        fn formula_cell(&self, _addr: AbsAddress) -> Option<&dyn crate::model::FormulaCellHandle> {
            None
        }
        fn range_value(&self, _range: crate::address::AbsRange) -> Result<Matrix, FormulaError> {
            Ok(Matrix::new(0, 0))
        }
        fn count_range(&self, _range: crate::address::AbsRange, _kinds: CellTypeMask) -> usize {
            0
        }
        fn named_expression(&self, _name: &str) -> Option<crate::address::AbsRange> {
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
            crate::address::INVALID_SHEET
        }
        fn sheet_name(&self, _index: i32) -> Option<String> {
            None
        }
        fn formula_tokens(&self, _addr: AbsAddress) -> Option<std::sync::Arc<[crate::token::Token]>> {
            None
        }
        fn shared_formula_tokens(&self, _sheet: i32, _identifier: usize) -> Option<std::sync::Arc<[crate::token::Token]>> {
            None
        }
        fn shared_formula_range(&self, _sheet: i32, _identifier: usize) -> Option<crate::address::AbsRange> {
            None
        }
    }

    #[test]
    fn resolves_simple_cell_reference() {
        let resolver = A1Resolver::new();
        let model = NullModel;
        let origin = AbsAddress::new(0, 1, 1); // B2
        match resolver.resolve("B1", origin, &model) {
            ResolvedName::CellReference(addr) => {
                assert_eq!(addr.row, -1);
                assert_eq!(addr.column, 0);
            }
            other => panic!("expected CellReference, got {:?}", other),
        }
    }

    #[test]
    fn resolves_range_reference() {
        let resolver = A1Resolver::new();
        let model = NullModel;
        let origin = AbsAddress::new(0, 0, 3); // D1
        match resolver.resolve("B2:B4", origin, &model) {
            ResolvedName::RangeReference(range) => {
                assert_eq!(range.first.row, 1);
                assert_eq!(range.last.row, 3);
                assert_eq!(range.first.column, -2);
            }
            other => panic!("expected RangeReference, got {:?}", other),
        }
    }

    #[test]
    fn resolves_whole_column() {
        let resolver = A1Resolver::new();
        let model = NullModel;
        let origin = AbsAddress::default();
        match resolver.resolve("A:A", origin, &model) {
            ResolvedName::RangeReference(range) => {
                assert!(range.whole_column());
            }
            other => panic!("expected RangeReference, got {:?}", other),
        }
    }
}
