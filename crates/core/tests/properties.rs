// Property-based tests for the reference codec and range algebra.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use proptest::prelude::*;
use sheetgrid_core::cell_ref::{format_ref, parse_ref};
use sheetgrid_core::{col_to_letters, letters_to_col, CellRange};

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

fn arb_range() -> impl Strategy<Value = CellRange> {
    (0usize..40, 0usize..40, 0usize..40, 0usize..40)
        .prop_map(|(a, b, c, d)| CellRange::new(a, b, c, d))
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn ref_round_trip(col in 0usize..100_000, row in 0usize..1_000_000) {
        prop_assert_eq!(parse_ref(&format_ref(col, row)), Ok((col, row)));
    }

    #[test]
    fn letters_round_trip(col in 0usize..1_000_000) {
        prop_assert_eq!(letters_to_col(&col_to_letters(col)), Some(col));
    }

    #[test]
    fn range_text_round_trip(range in arb_range()) {
        let back: CellRange = range.to_string().parse().unwrap();
        prop_assert_eq!(back, range);
    }

    #[test]
    fn union_contains_both(a in arb_range(), b in arb_range()) {
        let u = a.union(&b);
        prop_assert!(a.within(&u));
        prop_assert!(b.within(&u));
    }

    #[test]
    fn difference_of_disjoint_is_identity(a in arb_range(), b in arb_range()) {
        prop_assume!(!a.intersects(&b));
        prop_assert_eq!(a.difference(&b), vec![a]);
    }

    #[test]
    fn difference_partitions_uncovered_cells(a in arb_range(), b in arb_range()) {
        let parts = a.difference(&b);
        prop_assert!(parts.len() <= 4);
        for (i, p) in parts.iter().enumerate() {
            prop_assert!(p.within(&a));
            prop_assert!(!p.intersects(&b));
            for q in &parts[i + 1..] {
                prop_assert!(!p.intersects(q));
            }
        }
        let mut uncovered = 0;
        a.each(|ri, ci| if !b.includes(ri, ci) { uncovered += 1 });
        let covered: usize = parts.iter().map(|p| p.cell_count()).sum();
        prop_assert_eq!(covered, uncovered);
    }
}
