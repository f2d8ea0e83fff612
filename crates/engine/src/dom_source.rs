//! BOM source and material catalog backed by the rendered screen
//!
//! The root specification is a table on the page; every assembly row opens
//! a modal one depth deeper holding the next table, and every detail row
//! opens a characteristics modal naming its material.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::columns::resolve_column_with;
use crate::config::EngineConfig;
use crate::dom::{
    find_first, find_first_within, read_header, row_texts, settle, wait_for_absent,
    wait_for_selector, DomSurface, ElementHandle,
};
use crate::error::{Error, Result};
use crate::model::Category;
use crate::walker::{BomSource, Level, MaterialCatalog, RawRow, SourceRow};

/// Column positions of one specification table
#[derive(Debug, Clone, Copy, Default)]
struct Columns {
    designation: Option<usize>,
    name: usize,
    unit: Option<usize>,
    quantity: Option<usize>,
}

/// [`BomSource`] reading the nested BOM screen through a [`DomSurface`]
pub struct DomBomSource<'a, S: ?Sized> {
    dom: &'a S,
    config: &'a EngineConfig,
}

impl<'a, S: DomSurface + ?Sized> DomBomSource<'a, S> {
    pub fn new(dom: &'a S, config: &'a EngineConfig) -> Self {
        Self { dom, config }
    }

    /// Level of the product shown in the root table
    pub fn root_level(&self, designation: impl Into<String>) -> Level {
        Level::root(self.config.bom.root_table.clone(), designation)
    }

    async fn table(&self, level: &Level) -> Result<ElementHandle> {
        let timeouts = &self.config.timeouts;

        if level.depth == 0 {
            return wait_for_selector(
                self.dom,
                &self.config.bom.root_table,
                timeouts.visible(),
                timeouts.poll(),
            )
            .await;
        }

        let modal = wait_for_selector(
            self.dom,
            &self.config.bom.modal_at(level.depth),
            timeouts.visible(),
            timeouts.poll(),
        )
        .await?;
        find_first_within(self.dom, &modal, &self.config.bom.modal_table).await
    }

    async fn columns(&self, table: &ElementHandle, level: &Level) -> Result<Columns> {
        let header = read_header(self.dom, table, &self.config.table).await?;
        let markers = &self.config.table.non_structural_markers;
        let ids = &self.config.columns;
        let resolve = |id: &str| resolve_column_with(&header, id, markers);

        let name = resolve(&ids.name).ok_or_else(|| {
            Error::not_found(format!("column '{}' in {}", ids.name, level.id))
        })?;

        let columns = Columns {
            designation: resolve(&ids.designation),
            name,
            unit: resolve(&ids.unit),
            quantity: resolve(&ids.quantity),
        };
        debug!("Columns of {}: {:?}", level.id, columns);
        Ok(columns)
    }

    /// Body row at `position` of the table shown for `level`
    async fn row_at(&self, level: &Level, position: usize) -> Result<ElementHandle> {
        let table = self.table(level).await?;
        self.dom
            .find_within(&table, &self.config.table.body_row)
            .await?
            .into_iter()
            .nth(position)
            .ok_or_else(|| Error::not_found(format!("{} row {}", level.id, position)))
    }

    /// Child level shown in the modal at `modal_selector`
    async fn revealed_level(&self, parent: &Level, modal_selector: &str) -> Result<Level> {
        let timeouts = &self.config.timeouts;
        let modal =
            wait_for_selector(self.dom, modal_selector, timeouts.visible(), timeouts.poll())
                .await?;

        let label =
            find_first_within(self.dom, &modal, &self.config.bom.modal_designation).await?;
        let designation = self.dom.text(&label).await?.trim().to_string();
        if designation.is_empty() {
            return Err(Error::Dom(format!(
                "modal {} shows no designation",
                modal_selector
            )));
        }

        Ok(parent.child(
            format!("{} {}", modal_selector, self.config.bom.modal_table),
            designation,
        ))
    }

    /// Close the modal matching `modal_selector`, if one is shown
    ///
    /// The close button is looked up inside the modal first, then on the
    /// whole page.
    async fn dismiss(&self, modal_selector: &str, close_selector: &str) -> Result<()> {
        let timeouts = &self.config.timeouts;
        let Some(modal) = self.dom.find_all(modal_selector).await?.into_iter().next() else {
            return Ok(());
        };

        let close = match self
            .dom
            .find_within(&modal, close_selector)
            .await?
            .into_iter()
            .next()
        {
            Some(close) => close,
            None => find_first(self.dom, close_selector).await?,
        };
        self.dom.click(&close).await?;

        wait_for_absent(self.dom, modal_selector, timeouts.hidden(), timeouts.poll()).await
    }

    async fn read_material(&self, modal: &ElementHandle) -> Result<Option<String>> {
        let found = self
            .dom
            .find_within(modal, &self.config.bom.detail_material)
            .await?;

        match found.first() {
            Some(element) => {
                let text = self.dom.text(element).await?;
                let text = text.trim();
                Ok((!text.is_empty()).then(|| text.to_string()))
            }
            None => Ok(None),
        }
    }
}

fn cell(cells: &[String], index: Option<usize>) -> String {
    index
        .and_then(|i| cells.get(i))
        .cloned()
        .unwrap_or_default()
}

#[async_trait]
impl<'a, S: DomSurface + ?Sized> BomSource for DomBomSource<'a, S> {
    async fn rows(&mut self, level: &Level) -> Result<Vec<SourceRow>> {
        let table = self.table(level).await?;
        let columns = self.columns(&table, level).await?;
        let selectors = &self.config.table;

        let mut rows = Vec::new();
        for (position, row) in self
            .dom
            .find_within(&table, &selectors.body_row)
            .await?
            .into_iter()
            .enumerate()
        {
            let kind = self.dom.attribute(&row, &selectors.row_kind_attribute).await?;

            if kind.as_deref() == Some(selectors.group_kind.as_str()) {
                let label = match self
                    .dom
                    .attribute(&row, &self.config.bom.group_attribute)
                    .await?
                {
                    Some(label) => label,
                    None => self.dom.text(&row).await?,
                };
                let label = label.trim().to_string();
                let category = self.config.groups.classify(&label);
                rows.push(SourceRow::GroupHeader { label, category });
                continue;
            }

            let cells = row_texts(self.dom, &row, &selectors.cell).await?;
            if cells.iter().all(|c| c.is_empty()) {
                rows.push(SourceRow::Other);
                continue;
            }

            rows.push(SourceRow::Item(RawRow {
                position,
                designation: cell(&cells, columns.designation),
                name: cell(&cells, Some(columns.name)),
                unit: cell(&cells, columns.unit),
                quantity: cell(&cells, columns.quantity),
            }));
        }

        Ok(rows)
    }

    async fn open_assembly(&mut self, parent: &Level, position: usize) -> Result<Level> {
        let row = self.row_at(parent, position).await?;
        self.dom.click(&row).await?;

        let modal_selector = self.config.bom.modal_at(parent.depth + 1);
        match self.revealed_level(parent, &modal_selector).await {
            Ok(level) => Ok(level),
            Err(e) => {
                if let Err(close_err) = self
                    .dismiss(&modal_selector, &self.config.bom.modal_close)
                    .await
                {
                    warn!("Failed to dismiss {}: {}", modal_selector, close_err);
                }
                Err(e)
            }
        }
    }

    async fn close(&mut self, level: &Level) -> Result<()> {
        if level.depth == 0 {
            return Ok(());
        }

        let timeouts = &self.config.timeouts;
        let modal_selector = self.config.bom.modal_at(level.depth);
        let modal = find_first(self.dom, &modal_selector).await?;
        let close = find_first_within(self.dom, &modal, &self.config.bom.modal_close).await?;
        self.dom.click(&close).await?;

        wait_for_absent(self.dom, &modal_selector, timeouts.hidden(), timeouts.poll()).await
    }

    async fn detail_material(&mut self, level: &Level, position: usize) -> Result<Option<String>> {
        let timeouts = &self.config.timeouts;
        let bom = &self.config.bom;

        let row = self.row_at(level, position).await?;
        self.dom.click(&row).await?;

        let shown =
            wait_for_selector(self.dom, &bom.detail_modal, timeouts.visible(), timeouts.poll())
                .await;
        let material = match shown {
            Ok(modal) => self.read_material(&modal).await,
            Err(e) => Err(e),
        };

        // the modal goes away whether or not the material could be read
        let closed = self.dismiss(&bom.detail_modal, &bom.detail_close).await;
        let material = material?;
        closed?;
        Ok(material)
    }
}

/// [`MaterialCatalog`] searching the catalog panel tab by tab
pub struct DomCatalog<'a, S: ?Sized> {
    dom: &'a S,
    config: &'a EngineConfig,
}

impl<'a, S: DomSurface + ?Sized> DomCatalog<'a, S> {
    pub fn new(dom: &'a S, config: &'a EngineConfig) -> Self {
        Self { dom, config }
    }

    async fn open(&self) -> Result<()> {
        let catalog = &self.config.catalog;
        if !self.dom.find_all(&catalog.panel).await?.is_empty() {
            return Ok(());
        }

        let button = find_first(self.dom, &catalog.open_button).await?;
        self.dom.click(&button).await?;
        wait_for_selector(
            self.dom,
            &catalog.panel,
            self.config.timeouts.visible(),
            self.config.timeouts.poll(),
        )
        .await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let catalog = &self.config.catalog;
        let button = find_first(self.dom, &catalog.close_button).await?;
        self.dom.click(&button).await?;
        wait_for_absent(
            self.dom,
            &catalog.panel,
            self.config.timeouts.hidden(),
            self.config.timeouts.poll(),
        )
        .await
    }

    /// Search every tab in order for an exact name match
    async fn search(&self, material: &str) -> Result<Option<Category>> {
        let catalog = &self.config.catalog;
        let settle_delay = self.config.timeouts.settle();

        for tab in &catalog.tabs {
            let button = find_first(self.dom, &tab.selector).await?;
            self.dom.click(&button).await?;
            settle(settle_delay).await;

            let input = find_first(self.dom, &catalog.search_input).await?;
            self.dom.set_value(&input, material).await?;
            self.dom.press(&input, "Enter").await?;
            settle(settle_delay).await;

            let table = find_first(self.dom, &catalog.table).await?;
            if self.has_exact_match(&table, material).await? {
                debug!("Material '{}' found under {}", material, tab.category);
                return Ok(Some(tab.category));
            }
        }

        Ok(None)
    }

    async fn has_exact_match(&self, table: &ElementHandle, material: &str) -> Result<bool> {
        let selectors = &self.config.table;
        let header = read_header(self.dom, table, selectors).await?;
        let name_column = resolve_column_with(
            &header,
            &self.config.columns.name,
            &selectors.non_structural_markers,
        );

        for row in self.dom.find_within(table, &selectors.body_row).await? {
            let cells = row_texts(self.dom, &row, &selectors.cell).await?;
            let hit = match name_column {
                Some(index) => cells.get(index).is_some_and(|c| c == material),
                None => cells.iter().any(|c| c == material),
            };
            if hit {
                return Ok(true);
            }
        }

        Ok(false)
    }
}

#[async_trait]
impl<'a, S: DomSurface + ?Sized> MaterialCatalog for DomCatalog<'a, S> {
    async fn classify(&self, material: &str) -> Result<Option<Category>> {
        self.open().await?;
        let found = self.search(material).await;

        if let Err(e) = self.close().await {
            warn!("Failed to close material catalog: {}", e);
        }

        found
    }
}
