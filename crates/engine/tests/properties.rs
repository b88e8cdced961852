// Property-based tests for structural edits, history and merges.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use proptest::prelude::*;
use sheetgrid_core::{CellRange, CellRef};
use sheetgrid_engine::cell::CopyMode;
use sheetgrid_engine::style::StyleAttr;
use sheetgrid_engine::{Axis, CellAttr, DataProxy, EditState};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

fn arb_ref() -> impl Strategy<Value = String> {
    (0usize..6, 0usize..12).prop_map(|(col, row)| CellRef::new(col, row).to_string())
}

fn arb_text() -> impl Strategy<Value = String> {
    prop_oneof![
        (0i32..1000).prop_map(|n| n.to_string()),
        (arb_ref(), arb_ref()).prop_map(|(a, b)| format!("={a}+{b}")),
        (arb_ref(), arb_ref()).prop_map(|(a, b)| format!("=SUM({a}:{b})")),
    ]
}

fn arb_cells() -> impl Strategy<Value = Vec<(usize, usize, String)>> {
    prop::collection::vec((0usize..12, 0usize..6, arb_text()), 1..20)
}

fn arb_range() -> impl Strategy<Value = CellRange> {
    (0usize..10, 0usize..6, 0usize..10, 0usize..6)
        .prop_map(|(a, b, c, d)| CellRange::new(a, b, c, d))
}

#[derive(Debug, Clone)]
enum Op {
    Text(usize, usize, String),
    Bold(CellRange),
    Merge(CellRange),
    InsertRows(usize, usize),
    DeleteCols(usize, usize),
    Width(usize, u16),
    Paste(CellRange, CellRange),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..12, 0usize..6, arb_text()).prop_map(|(r, c, t)| Op::Text(r, c, t)),
        arb_range().prop_map(Op::Bold),
        arb_range().prop_map(Op::Merge),
        (0usize..12, 1usize..3).prop_map(|(i, n)| Op::InsertRows(i, n)),
        (0usize..6, 0usize..6).prop_map(|(a, b)| Op::DeleteCols(a, b)),
        (0usize..6, 60u16..200).prop_map(|(c, w)| Op::Width(c, w)),
        (arb_range(), arb_range()).prop_map(|(a, b)| Op::Paste(a, b)),
    ]
}

fn sheet_with(cells: &[(usize, usize, String)]) -> DataProxy {
    let mut d = DataProxy::default();
    for (ri, ci, text) in cells {
        d.set_cell_text(*ri, *ci, text, EditState::Finished);
    }
    d
}

/// Apply one operation. Rejected operations return false.
fn apply(d: &mut DataProxy, op: &Op) -> bool {
    match op {
        Op::Text(ri, ci, text) => d.set_cell_text(*ri, *ci, text, EditState::Finished),
        Op::Bold(range) => {
            d.select(*range);
            d.set_selected_cell_attr(CellAttr::Style(StyleAttr::Bold(true)))
        }
        Op::Merge(range) => {
            d.select(*range);
            range.is_multiple() && d.merge(|_| {})
        }
        Op::InsertRows(index, n) => d.insert_at(Axis::Row, *index, *n),
        Op::DeleteCols(a, b) => d.delete_at(Axis::Column, *a, *b),
        Op::Width(ci, w) => d.set_col_width(*ci, f64::from(*w)),
        Op::Paste(src, dst) => {
            d.select(*src);
            d.copy();
            d.select(*dst);
            d.paste(CopyMode::All, |_| {})
        }
    }
}

fn texts(d: &DataProxy) -> Vec<(usize, usize, String)> {
    d.rows()
        .cells()
        .map(|(ri, ci, cell)| (ri, ci, cell.text().to_string()))
        .collect()
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn insert_then_delete_rows_restores_formulas(
        cells in arb_cells(),
        index in 0usize..14,
        n in 1usize..4,
    ) {
        let mut d = sheet_with(&cells);
        let before = texts(&d);
        prop_assert!(d.insert_at(Axis::Row, index, n));
        prop_assert!(d.delete_at(Axis::Row, index, index + n - 1));
        prop_assert_eq!(texts(&d), before);
    }

    #[test]
    fn insert_then_delete_cols_restores_formulas(
        cells in arb_cells(),
        index in 0usize..8,
        n in 1usize..3,
    ) {
        let mut d = sheet_with(&cells);
        let before = texts(&d);
        d.insert_at(Axis::Column, index, n);
        d.delete_at(Axis::Column, index, index + n - 1);
        prop_assert_eq!(texts(&d), before);
    }

    #[test]
    fn undo_all_then_redo_all(ops in prop::collection::vec(arb_op(), 1..12)) {
        let mut d = DataProxy::default();
        let initial = d.get_data();
        let mut applied = 0;
        for op in &ops {
            if apply(&mut d, op) {
                applied += 1;
            }
        }
        let last = d.get_data();

        for _ in 0..applied {
            prop_assert!(d.undo());
        }
        prop_assert!(!d.can_undo());
        prop_assert_eq!(d.get_data(), initial);

        for _ in 0..applied {
            prop_assert!(d.redo());
        }
        prop_assert!(!d.can_redo());
        prop_assert_eq!(d.get_data(), last);
    }

    #[test]
    fn merges_never_overlap(ops in prop::collection::vec(arb_op(), 1..16)) {
        let mut d = DataProxy::default();
        for op in &ops {
            apply(&mut d, op);
        }
        let merges: Vec<CellRange> = d.merges().iter().copied().collect();
        for (i, a) in merges.iter().enumerate() {
            prop_assert!(a.is_multiple());
            for b in &merges[i + 1..] {
                prop_assert!(!a.intersects(b), "{} overlaps {}", a, b);
            }
        }
    }

    #[test]
    fn snapshot_json_round_trip(ops in prop::collection::vec(arb_op(), 1..10)) {
        let mut d = DataProxy::default();
        for op in &ops {
            apply(&mut d, op);
        }
        let json = d.to_json().unwrap();
        let mut other = DataProxy::default();
        other.load_json(&json).unwrap();
        prop_assert_eq!(other.get_data(), d.get_data());
    }
}
