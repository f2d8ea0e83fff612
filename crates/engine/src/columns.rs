//! Column resolution over multi-row, colspan-merged table headers

use serde::{Deserialize, Serialize};
use tracing::debug;

/// One header cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderCell {
    /// Semantic column identifier
    pub column_id: String,
    /// Number of positional columns this cell covers in the row beneath
    #[serde(default = "default_span")]
    pub span: usize,
}

fn default_span() -> usize {
    1
}

impl HeaderCell {
    pub fn new(column_id: impl Into<String>) -> Self {
        Self {
            column_id: column_id.into(),
            span: 1,
        }
    }

    pub fn spanning(column_id: impl Into<String>, span: usize) -> Self {
        Self {
            column_id: column_id.into(),
            span: span.max(1),
        }
    }
}

/// One header row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderRow {
    /// Row identifier, used to recognise search and footer rows
    #[serde(default)]
    pub row_id: Option<String>,
    pub cells: Vec<HeaderCell>,
}

impl HeaderRow {
    pub fn new(cells: Vec<HeaderCell>) -> Self {
        Self { row_id: None, cells }
    }

    pub fn with_id(mut self, row_id: impl Into<String>) -> Self {
        self.row_id = Some(row_id.into());
        self
    }

    /// Whether the row id contains one of the non-structural markers
    pub fn is_structural(&self, markers: &[String]) -> bool {
        match &self.row_id {
            Some(id) => {
                let id = id.to_lowercase();
                !markers.iter().any(|m| id.contains(&m.to_lowercase()))
            }
            None => true,
        }
    }
}

/// Markers excluded when no configuration is at hand
pub fn default_markers() -> Vec<String> {
    vec!["search".to_string(), "footer".to_string()]
}

/// Expand the header into its finest row of column ids
///
/// Rows are merged bottom-up. A cell spanning `s` columns is replaced by
/// the next `s` entries of the row merged so far; a single-column cell is
/// kept as it is.
pub fn merged_columns(rows: &[HeaderRow], markers: &[String]) -> Vec<String> {
    let structural: Vec<&HeaderRow> = rows.iter().filter(|r| r.is_structural(markers)).collect();

    let Some((last, earlier)) = structural.split_last() else {
        return Vec::new();
    };

    let mut merged: Vec<String> = last.cells.iter().map(|c| c.column_id.clone()).collect();

    for row in earlier.iter().rev() {
        let mut expanded = Vec::with_capacity(merged.len() + row.cells.len());
        let mut cursor = 0;

        for cell in &row.cells {
            if cell.span > 1 {
                let end = (cursor + cell.span).min(merged.len());
                expanded.extend_from_slice(&merged[cursor.min(end)..end]);
                cursor = end;
            } else {
                expanded.push(cell.column_id.clone());
            }
        }

        merged = expanded;
    }

    merged
}

/// Position of `target` in the finest header row, if present
pub fn resolve_column(rows: &[HeaderRow], target: &str) -> Option<usize> {
    resolve_column_with(rows, target, &default_markers())
}

/// Same as [`resolve_column`] with explicit non-structural markers
pub fn resolve_column_with(rows: &[HeaderRow], target: &str, markers: &[String]) -> Option<usize> {
    let structural: Vec<&HeaderRow> = rows.iter().filter(|r| r.is_structural(markers)).collect();

    let position = match structural.as_slice() {
        [] => None,
        [only] => only.cells.iter().position(|c| c.column_id == target),
        _ => merged_columns(rows, markers)
            .iter()
            .position(|id| id == target),
    };

    if position.is_none() {
        debug!("Column '{}' not found in header", target);
    }
    position
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[(&str, usize)]) -> HeaderRow {
        HeaderRow::new(
            cells
                .iter()
                .map(|(id, span)| HeaderCell::spanning(*id, *span))
                .collect(),
        )
    }

    #[test]
    fn test_spanning_parent_is_replaced_by_children() {
        let header = vec![row(&[("A", 2)]), row(&[("B", 1), ("C", 1)])];

        assert_eq!(resolve_column(&header, "C"), Some(1));
        assert_eq!(resolve_column(&header, "B"), Some(0));
        assert_eq!(resolve_column(&header, "A"), None);
    }

    #[test]
    fn test_single_row_linear_search() {
        let header = vec![row(&[("X", 1), ("Y", 1), ("Z", 1)])];

        assert_eq!(resolve_column(&header, "Y"), Some(1));
        assert_eq!(resolve_column(&header, "W"), None);
    }

    #[test]
    fn test_single_span_cells_keep_their_position() {
        let header = vec![
            row(&[("pos", 1), ("item", 3), ("quantity", 1)]),
            row(&[("designation", 1), ("name", 1), ("unit", 1)]),
        ];

        assert_eq!(
            merged_columns(&header, &default_markers()),
            vec!["pos", "designation", "name", "unit", "quantity"]
        );
        assert_eq!(resolve_column(&header, "quantity"), Some(4));
        assert_eq!(resolve_column(&header, "name"), Some(2));
    }

    #[test]
    fn test_three_level_header() {
        let header = vec![
            row(&[("id", 1), ("part", 3)]),
            row(&[("label", 2), ("qty", 1)]),
            row(&[("designation", 1), ("name", 1)]),
        ];

        assert_eq!(resolve_column(&header, "id"), Some(0));
        assert_eq!(resolve_column(&header, "name"), Some(2));
        assert_eq!(resolve_column(&header, "qty"), Some(3));
    }

    #[test]
    fn test_search_and_footer_rows_are_ignored() {
        let header = vec![
            row(&[("A", 2)]),
            row(&[("B", 1), ("C", 1)]),
            row(&[("filter-b", 1), ("filter-c", 1)]).with_id("table-search-row"),
            row(&[("total", 2)]).with_id("Footer"),
        ];

        assert_eq!(resolve_column(&header, "C"), Some(1));
        assert_eq!(resolve_column(&header, "filter-c"), None);
    }

    #[test]
    fn test_only_non_structural_rows_resolves_nothing() {
        let header = vec![row(&[("X", 1)]).with_id("search")];
        assert_eq!(resolve_column(&header, "X"), None);
        assert_eq!(resolve_column(&[], "X"), None);
    }

    #[test]
    fn test_span_beyond_children_is_truncated() {
        let header = vec![row(&[("A", 4)]), row(&[("B", 1), ("C", 1)])];
        assert_eq!(merged_columns(&header, &default_markers()), vec!["B", "C"]);
    }

    #[test]
    fn test_custom_markers() {
        let header = vec![
            row(&[("X", 1)]),
            row(&[("Y", 1)]).with_id("aggregate"),
        ];
        let markers = vec!["aggregate".to_string()];
        assert_eq!(resolve_column_with(&header, "X", &markers), Some(0));
    }
}
