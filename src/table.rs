use tracing::{debug, trace};

use crate::domain::ViewerError;
use crate::parser::Record;

// Zero-based index of the column the row sort keys on.
pub const SORT_KEY_COLUMN: usize = 4;

/// Interaction state of a single rendered row.
///
/// Primary activation walks Normal -> Marked -> Hidden. There is no
/// primary path out of Hidden; only secondary activation or a global
/// reset brings a row back. Hidden is a presentation flag, the row is
/// never removed from its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowState {
    #[default]
    Normal,
    Marked,
    Hidden,
}

impl RowState {
    pub fn primary_activation(self) -> Self {
        match self {
            RowState::Normal => RowState::Marked,
            RowState::Marked => RowState::Hidden,
            RowState::Hidden => RowState::Hidden,
        }
    }

    // The escape hatch: forces Normal from any state.
    pub fn secondary_activation(self) -> Self {
        RowState::Normal
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedRow {
    pub cells: Vec<String>,
    pub state: RowState,
}

/// A record set rendered against its resolved column set, ready for
/// display. `id` is the first two characters of the source file name;
/// two tables with the same id stay distinct instances.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedTable {
    pub id: String,
    pub columns: Vec<String>,
    pub rows: Vec<RenderedRow>,
}

/// Ordered, de-duplicated union of the keys of every record: records are
/// scanned in sequence, keys within a record in their insertion order,
/// and each key is appended the first time it is seen. Later records may
/// introduce keys earlier records lack, which is the whole point.
pub fn resolve_columns(records: &[Record]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
    }
    trace!("Resolved {} columns: {:?}", columns.len(), columns);
    columns
}

/// Build the rendered table: one row per record in record order, one cell
/// per column in column order. A record lacking a key renders an empty
/// cell at that position, never a shift. Placement into a group is not
/// this function's job.
pub fn render(records: &[Record], columns: Vec<String>, table_id: &str) -> RenderedTable {
    let rows = records
        .iter()
        .map(|record| RenderedRow {
            cells: columns
                .iter()
                .map(|c| record.get(c).cloned().unwrap_or_default())
                .collect(),
            state: RowState::default(),
        })
        .collect();

    debug!("Rendered table \"{}\" with {} rows", table_id, records.len());
    RenderedTable {
        id: table_id.to_string(),
        columns,
        rows,
    }
}

impl RenderedTable {
    /// Reorder rows by the case-insensitive value of the 5th column,
    /// using repeated adjacent-exchange passes until a pass swaps
    /// nothing. Deliberately a bubble sort: equal keys never change
    /// relative order and row counts are small. The header is not a row
    /// here and never participates.
    pub fn sort_rows(&mut self) -> Result<(), ViewerError> {
        if self.columns.len() <= SORT_KEY_COLUMN {
            return Err(ViewerError::ColumnBounds {
                columns: self.columns.len(),
                required: SORT_KEY_COLUMN + 1,
            });
        }

        let key = |row: &RenderedRow| row.cells[SORT_KEY_COLUMN].to_lowercase();
        loop {
            let mut switched = false;
            for i in 0..self.rows.len().saturating_sub(1) {
                if key(&self.rows[i]) > key(&self.rows[i + 1]) {
                    self.rows.swap(i, i + 1);
                    switched = true;
                }
            }
            if !switched {
                break;
            }
        }
        Ok(())
    }

    /// Every Hidden row back to Normal in one pass; Marked rows keep
    /// their mark.
    pub fn reset_hidden(&mut self) -> usize {
        let mut reset = 0;
        for row in &mut self.rows {
            if row.state == RowState::Hidden {
                row.state = RowState::Normal;
                reset += 1;
            }
        }
        reset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    fn record(pairs: &[(&str, &str)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn row(cells: &[&str]) -> RenderedRow {
        RenderedRow {
            cells: cells.iter().map(|c| c.to_string()).collect(),
            state: RowState::default(),
        }
    }

    #[test]
    fn column_union_keeps_first_seen_order() {
        let records = vec![
            record(&[("a", "1"), ("b", "2")]),
            record(&[("b", "3"), ("c", "4")]),
            record(&[("d", "5"), ("a", "6")]),
        ];
        let columns = resolve_columns(&records);
        assert_eq!(columns, ["a", "b", "c", "d"]);
        // Idempotent: a second resolution yields the same order.
        assert_eq!(resolve_columns(&records), columns);
    }

    #[test]
    fn empty_record_set_resolves_to_no_columns() {
        assert!(resolve_columns(&[]).is_empty());
    }

    #[test]
    fn rendered_rows_align_with_columns() {
        let records = vec![
            record(&[("a", "1"), ("b", "2")]),
            record(&[("b", "3"), ("c", "4")]),
        ];
        let columns = resolve_columns(&records);
        let table = render(&records, columns.clone(), "t1");

        assert_eq!(table.id, "t1");
        for r in &table.rows {
            assert_eq!(r.cells.len(), columns.len());
        }
        // Missing keys render as empty cells, never a shift.
        assert_eq!(table.rows[0].cells, ["1", "2", ""]);
        assert_eq!(table.rows[1].cells, ["", "3", "4"]);
    }

    #[test]
    fn sort_orders_by_fifth_column_case_insensitively() {
        let records = parse("a,b,c,d,e\r\nv1,v2,v3,v4,b\r\nw1,w2,w3,w4,a\r\n").unwrap();
        let columns = resolve_columns(&records);
        let mut table = render(&records, columns, "po");
        table.sort_rows().unwrap();

        assert_eq!(table.rows[0].cells[4], "a");
        assert_eq!(table.rows[1].cells[4], "b");
        for pair in table.rows.windows(2) {
            assert!(pair[0].cells[4].to_lowercase() <= pair[1].cells[4].to_lowercase());
        }
    }

    #[test]
    fn sort_is_stable_for_equal_keys() {
        let mut table = RenderedTable {
            id: "st".to_string(),
            columns: vec!["a".into(), "b".into(), "c".into(), "d".into(), "e".into()],
            rows: vec![
                row(&["r0", "x", "x", "x", "B"]),
                row(&["r1", "x", "x", "x", "a"]),
                row(&["r2", "x", "x", "x", "b"]),
                row(&["r3", "x", "x", "x", "A"]),
            ],
        };
        table.sort_rows().unwrap();
        let order: Vec<&str> = table.rows.iter().map(|r| r.cells[0].as_str()).collect();
        // "a"/"A" tie and keep arrival order, as do "B"/"b".
        assert_eq!(order, ["r1", "r3", "r0", "r2"]);
    }

    #[test]
    fn absent_sort_key_sorts_empty_string_low() {
        let mut table = RenderedTable {
            id: "ab".to_string(),
            columns: vec!["a".into(), "b".into(), "c".into(), "d".into(), "e".into()],
            rows: vec![row(&["r0", "", "", "", "z"]), row(&["r1", "", "", "", ""])],
        };
        table.sort_rows().unwrap();
        assert_eq!(table.rows[0].cells[0], "r1");
    }

    #[test]
    fn sort_with_too_few_columns_is_a_bounds_error() {
        let mut table = RenderedTable {
            id: "xx".to_string(),
            columns: vec!["a".into(), "b".into()],
            rows: vec![row(&["1", "2"])],
        };
        match table.sort_rows() {
            Err(ViewerError::ColumnBounds { columns: 2, required: 5 }) => {}
            other => panic!("expected ColumnBounds, got {other:?}"),
        }
    }

    #[test]
    fn primary_activation_walks_the_state_chain() {
        let mut state = RowState::default();
        assert_eq!(state, RowState::Normal);
        state = state.primary_activation();
        assert_eq!(state, RowState::Marked);
        state = state.primary_activation();
        assert_eq!(state, RowState::Hidden);
        // No primary path out of Hidden.
        assert_eq!(state.primary_activation(), RowState::Hidden);
    }

    #[test]
    fn secondary_activation_forces_normal_from_any_state() {
        for state in [RowState::Normal, RowState::Marked, RowState::Hidden] {
            assert_eq!(state.secondary_activation(), RowState::Normal);
        }
    }

    #[test]
    fn reset_hidden_leaves_marked_rows_alone() {
        let mut table = RenderedTable {
            id: "rs".to_string(),
            columns: vec!["a".into()],
            rows: vec![row(&["1"]), row(&["2"]), row(&["3"])],
        };
        table.rows[0].state = RowState::Hidden;
        table.rows[1].state = RowState::Marked;

        assert_eq!(table.reset_hidden(), 1);
        assert_eq!(table.rows[0].state, RowState::Normal);
        assert_eq!(table.rows[1].state, RowState::Marked);
        assert_eq!(table.rows[2].state, RowState::Normal);
        // Rows are flagged, never removed.
        assert_eq!(table.rows.len(), 3);
    }
}
