//! Two-level group table parsing
//!
//! A group table alternates group-header rows with data rows; each data
//! row holds a nested sub-table whose rows belong to the current group.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// A classified row of a group table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TableRow {
    /// Starts a new group
    GroupHeader { name: String },
    /// Carries the cell texts of each nested sub-table row
    Data { items: Vec<Vec<String>> },
    /// Anything else (spacers, totals)
    Other,
}

/// A named group and the raw item rows collected under it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    pub items: Vec<Vec<String>>,
}

/// Groups in document order
pub type GroupedTable = Vec<Group>;

/// What to do with a data row seen before any group header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParseMode {
    /// Drop it silently
    #[default]
    Lenient,
    /// Fail with [`Error::OrphanRow`]
    Strict,
}

/// Parse a group table, dropping orphan data rows
pub fn parse_grouped_table(table: &str, rows: &[TableRow]) -> Result<GroupedTable> {
    parse_grouped_table_with(table, rows, ParseMode::Lenient)
}

/// Parse a group table under an explicit mode
///
/// Fails only for a table with no rows at all (and, in strict mode, for an
/// orphan data row).
pub fn parse_grouped_table_with(
    table: &str,
    rows: &[TableRow],
    mode: ParseMode,
) -> Result<GroupedTable> {
    if rows.is_empty() {
        return Err(Error::EmptyTable {
            table: table.to_string(),
        });
    }

    let mut groups: GroupedTable = Vec::new();

    for (index, row) in rows.iter().enumerate() {
        match row {
            TableRow::GroupHeader { name } => {
                groups.push(Group {
                    name: name.trim().to_string(),
                    items: Vec::new(),
                });
            }
            TableRow::Data { items } => {
                let Some(current) = groups.last_mut() else {
                    if mode == ParseMode::Strict {
                        return Err(Error::OrphanRow { index });
                    }
                    debug!("Dropping data row {} of {}: no group header yet", index, table);
                    continue;
                };

                current.items.extend(
                    items
                        .iter()
                        .filter(|cells| cells.iter().any(|c| !c.trim().is_empty()))
                        .cloned(),
                );
            }
            TableRow::Other => {}
        }
    }

    Ok(groups)
}

/// Render groups back into rows: one header and one data row per group
pub fn to_rows(groups: &GroupedTable) -> Vec<TableRow> {
    groups
        .iter()
        .flat_map(|g| {
            [
                TableRow::GroupHeader {
                    name: g.name.clone(),
                },
                TableRow::Data {
                    items: g.items.clone(),
                },
            ]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn header(name: &str) -> TableRow {
        TableRow::GroupHeader {
            name: name.to_string(),
        }
    }

    fn data(items: &[&[&str]]) -> TableRow {
        TableRow::Data {
            items: items.iter().map(|i| cells(i)).collect(),
        }
    }

    #[test]
    fn test_two_groups() {
        let rows = vec![
            header("G1"),
            data(&[&["r1"], &["r2"]]),
            header("G2"),
            data(&[&["r3"]]),
        ];

        let groups = parse_grouped_table("spec", &rows).unwrap();
        assert_eq!(
            groups,
            vec![
                Group {
                    name: "G1".to_string(),
                    items: vec![cells(&["r1"]), cells(&["r2"])],
                },
                Group {
                    name: "G2".to_string(),
                    items: vec![cells(&["r3"])],
                },
            ]
        );
    }

    #[test]
    fn test_reparse_is_stable() {
        let rows = vec![
            header("G1"),
            data(&[&["r1"]]),
            data(&[&["r2"]]),
            TableRow::Other,
            header("G2"),
            data(&[&["r3"]]),
        ];

        let first = parse_grouped_table("spec", &rows).unwrap();
        let second = parse_grouped_table("spec", &to_rows(&first)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_orphan_data_row_dropped() {
        let rows = vec![data(&[&["lost"]]), header("G1"), data(&[&["kept"]])];

        let groups = parse_grouped_table("spec", &rows).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].items, vec![cells(&["kept"])]);
    }

    #[test]
    fn test_orphan_data_row_strict() {
        let rows = vec![data(&[&["lost"]]), header("G1")];

        let err = parse_grouped_table_with("spec", &rows, ParseMode::Strict).unwrap_err();
        assert!(matches!(err, Error::OrphanRow { index: 0 }));
    }

    #[test]
    fn test_empty_nested_rows_skipped() {
        let rows = vec![header("G1"), data(&[&["", " "], &["a", "b"]])];

        let groups = parse_grouped_table("spec", &rows).unwrap();
        assert_eq!(groups[0].items, vec![cells(&["a", "b"])]);
    }

    #[test]
    fn test_empty_table_fails() {
        let err = parse_grouped_table("spec", &[]).unwrap_err();
        assert!(matches!(err, Error::EmptyTable { .. }));
    }

    #[test]
    fn test_headers_only() {
        let groups = parse_grouped_table("spec", &[header("G1"), header("G2")]).unwrap();
        assert_eq!(groups.len(), 2);
        assert!(groups.iter().all(|g| g.items.is_empty()));
    }
}
