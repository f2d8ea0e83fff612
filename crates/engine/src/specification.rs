//! Read-back of the main specification page
//!
//! The page renders one group table: a header row per category, each
//! followed by a data row holding the category's lines in a nested table.

use tracing::debug;

use crate::columns::resolve_column_with;
use crate::config::EngineConfig;
use crate::dom::{read_header, row_texts, wait_for_selector, DomSurface, ElementHandle};
use crate::error::{Error, Result};
use crate::grouped::{parse_grouped_table, GroupedTable, TableRow};
use crate::model::{parse_quantity, DesiredItem, TargetSpecification};

/// Groups of the specification table as rendered
pub async fn read_groups<S: DomSurface + ?Sized>(
    dom: &S,
    config: &EngineConfig,
) -> Result<GroupedTable> {
    let selectors = &config.table;
    let timeouts = &config.timeouts;
    let table = wait_for_selector(
        dom,
        &config.specification.table,
        timeouts.visible(),
        timeouts.poll(),
    )
    .await?;

    let mut rows = Vec::new();
    for row in dom.find_within(&table, &selectors.body_row).await? {
        rows.push(classify_row(dom, config, &row).await?);
    }

    parse_grouped_table(&config.specification.table, &rows)
}

async fn classify_row<S: DomSurface + ?Sized>(
    dom: &S,
    config: &EngineConfig,
    row: &ElementHandle,
) -> Result<TableRow> {
    let selectors = &config.table;
    let kind = dom.attribute(row, &selectors.row_kind_attribute).await?;

    match kind.as_deref() {
        Some(k) if k == selectors.group_kind => {
            let cells = row_texts(dom, row, &selectors.cell).await?;
            let name = match cells.into_iter().next() {
                Some(first) => first,
                None => dom.text(row).await?.trim().to_string(),
            };
            Ok(TableRow::GroupHeader { name })
        }
        Some(k) if k == selectors.data_kind => {
            let mut items = Vec::new();
            for nested in dom.find_within(row, &selectors.nested_table).await? {
                for line in dom.find_within(&nested, &selectors.nested_row).await? {
                    items.push(row_texts(dom, &line, &selectors.cell).await?);
                }
            }
            Ok(TableRow::Data { items })
        }
        _ => Ok(TableRow::Other),
    }
}

/// Current content of the specification, per editable category
///
/// Lines keep their page order and are not merged, so a name listed twice
/// shows up twice. Groups that map to no editable category are ignored.
pub async fn read_specification<S: DomSurface + ?Sized>(
    dom: &S,
    config: &EngineConfig,
) -> Result<TargetSpecification> {
    let selectors = &config.table;
    let table = wait_for_selector(
        dom,
        &config.specification.table,
        config.timeouts.visible(),
        config.timeouts.poll(),
    )
    .await?;

    let header = read_header(dom, &table, selectors).await?;
    let markers = &selectors.non_structural_markers;
    let name_column = resolve_column_with(&header, &config.columns.name, markers)
        .ok_or_else(|| {
            Error::not_found(format!(
                "column '{}' in {}",
                config.columns.name, config.specification.table
            ))
        })?;
    let quantity_column = resolve_column_with(&header, &config.columns.quantity, markers);

    let groups = read_groups(dom, config).await?;
    let mut spec = TargetSpecification::default();

    for group in groups {
        let category = config.groups.classify(&group.name);
        let Some(list) = category.and_then(|c| spec.items_mut(c)) else {
            debug!("Ignoring specification group '{}'", group.name);
            continue;
        };

        for cells in group.items {
            let Some(name) = cells.get(name_column).filter(|n| !n.is_empty()) else {
                continue;
            };
            list.push(DesiredItem {
                name: name.clone(),
                quantity: quantity_column
                    .and_then(|i| cells.get(i))
                    .and_then(|q| parse_quantity(q)),
            });
        }
    }

    debug!(
        "Specification read: {}",
        TargetSpecification::EDITABLE
            .iter()
            .map(|c| format!("{}={}", c, spec.items(*c).len()))
            .collect::<Vec<_>>()
            .join(" ")
    );
    Ok(spec)
}

