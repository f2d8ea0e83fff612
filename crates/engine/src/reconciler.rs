//! Specification reconciler
//!
//! Drives the per-category edit dialog until the staged list equals the
//! desired one: everything staged is removed back to front, then each
//! desired item is searched in the dialog's catalog, staged and given its
//! quantity. Per-item failures are logged and skipped; the run continues.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::columns::resolve_column_with;
use crate::config::EngineConfig;
use crate::dom::{
    find_first, find_first_within, read_header, row_texts, settle, wait_for_absent,
    wait_for_selector, DomSurface, ElementHandle,
};
use crate::error::{Error, Result};
use crate::model::{format_quantity, Category, DesiredItem, TargetSpecification};

/// How a reconcile run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// Dialog committed with `staged` rows
    ///
    /// `skipped` items were never staged; `unquantified` items were staged
    /// but kept the dialog's default quantity.
    Committed {
        staged: usize,
        skipped: Vec<String>,
        #[serde(default)]
        unquantified: Vec<String>,
    },
    /// Target was empty; the dialog was dismissed after clearing
    Cancelled,
    /// Commit was not available; the dialog is still open
    LeftOpen {
        staged: usize,
        skipped: Vec<String>,
        #[serde(default)]
        unquantified: Vec<String>,
    },
}

impl ReconcileOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, ReconcileOutcome::Committed { .. })
    }

    pub fn skipped(&self) -> &[String] {
        match self {
            ReconcileOutcome::Committed { skipped, .. }
            | ReconcileOutcome::LeftOpen { skipped, .. } => skipped,
            ReconcileOutcome::Cancelled => &[],
        }
    }

    /// Items staged whose quantity could not be entered
    pub fn unquantified(&self) -> &[String] {
        match self {
            ReconcileOutcome::Committed { unquantified, .. }
            | ReconcileOutcome::LeftOpen { unquantified, .. } => unquantified,
            ReconcileOutcome::Cancelled => &[],
        }
    }
}

/// Reconciler bound to one rendered page
pub struct SpecReconciler<'a, S: ?Sized> {
    dom: &'a S,
    config: &'a EngineConfig,
}

impl<'a, S: DomSurface + ?Sized> SpecReconciler<'a, S> {
    pub fn new(dom: &'a S, config: &'a EngineConfig) -> Self {
        Self { dom, config }
    }

    /// Make the staged list of `category` equal `desired`
    pub async fn reconcile(
        &self,
        category: Category,
        desired: &[DesiredItem],
    ) -> Result<ReconcileOutcome> {
        if category == Category::RawMaterial {
            return Err(Error::InvalidConfig(
                "raw materials have no specification dialog".to_string(),
            ));
        }

        info!("Reconciling {} with {} item(s)", category, desired.len());
        self.open(category).await?;

        let removed = self.clear_staged().await?;
        debug!("Removed {} staged row(s) from {}", removed, category);

        if desired.is_empty() {
            self.cancel().await?;
            info!("Target for {} is empty, dialog cancelled", category);
            return Ok(ReconcileOutcome::Cancelled);
        }

        let mut skipped = Vec::new();
        let mut unquantified = Vec::new();
        for item in desired {
            match self.stage_item(item).await {
                Ok(Some(row)) => {
                    if let Err(e) = self.set_quantity(&row, item).await {
                        warn!(
                            "Staged '{}' in {} but could not set its quantity: {}",
                            item.name, category, e
                        );
                        unquantified.push(item.name.clone());
                    }
                }
                Ok(None) => skipped.push(item.name.clone()),
                Err(e) => {
                    warn!("Failed to stage '{}' in {}: {}", item.name, category, e);
                    skipped.push(item.name.clone());
                }
            }
        }

        let staged = self.staged_rows().await?.len();
        if staged == 0 {
            warn!(
                "Nothing staged for {} after {} addition(s)",
                category,
                desired.len()
            );
        }

        let commit = find_first(self.dom, &self.config.dialog.commit_button).await?;
        if !self.dom.is_enabled(&commit).await? {
            warn!("Commit unavailable for {}, leaving dialog open", category);
            return Ok(ReconcileOutcome::LeftOpen {
                staged,
                skipped,
                unquantified,
            });
        }

        self.dom.click(&commit).await?;
        self.wait_closed().await?;
        info!(
            "Committed {} with {} row(s), {} skipped, {} without quantity",
            category,
            staged,
            skipped.len(),
            unquantified.len()
        );
        Ok(ReconcileOutcome::Committed {
            staged,
            skipped,
            unquantified,
        })
    }

    /// Reconcile every editable category of `target` in turn
    pub async fn apply(&self, target: &TargetSpecification) -> Vec<(Category, Result<ReconcileOutcome>)> {
        let mut results = Vec::new();
        for category in TargetSpecification::EDITABLE {
            let outcome = self.reconcile(category, target.items(category)).await;
            if let Err(e) = &outcome {
                warn!("Reconcile of {} failed: {}", category, e);
            }
            results.push((category, outcome));
        }
        results
    }

    async fn open(&self, category: Category) -> Result<ElementHandle> {
        let dialog = &self.config.dialog;
        let timeouts = &self.config.timeouts;

        if !self.dom.find_all(&dialog.dialog).await?.is_empty() {
            warn!("A specification dialog is still open, cancelling it before {}", category);
            self.cancel().await?;
        }

        let button = find_first(self.dom, &dialog.open_button_for(category)).await?;
        self.dom.click(&button).await?;
        wait_for_selector(self.dom, &dialog.dialog, timeouts.visible(), timeouts.poll()).await
    }

    async fn cancel(&self) -> Result<()> {
        let button = find_first(self.dom, &self.config.dialog.cancel_button).await?;
        self.dom.click(&button).await?;
        self.wait_closed().await
    }

    async fn wait_closed(&self) -> Result<()> {
        let timeouts = &self.config.timeouts;
        wait_for_absent(
            self.dom,
            &self.config.dialog.dialog,
            timeouts.hidden(),
            timeouts.poll(),
        )
        .await
    }

    async fn staged_table(&self) -> Result<ElementHandle> {
        find_first(self.dom, &self.config.dialog.staged_table)
            .await
            .map_err(|_| Error::DialogNotOpen(self.config.dialog.dialog.clone()))
    }

    async fn staged_rows(&self) -> Result<Vec<ElementHandle>> {
        let table = self.staged_table().await?;
        self.dom
            .find_within(&table, &self.config.table.body_row)
            .await
    }

    /// Remove staged rows from the last one up; returns the number removed
    ///
    /// Stops after `max_clear_attempts` consecutive removals that leave the
    /// row count unchanged.
    async fn clear_staged(&self) -> Result<usize> {
        let dialog = &self.config.dialog;
        let mut removed = 0;
        let mut stalled = 0;

        loop {
            let rows = self.staged_rows().await?;
            let Some(last) = rows.last() else {
                break;
            };
            let before = rows.len();

            self.dom.click(last).await?;
            let remove = find_first(self.dom, &dialog.remove_button).await?;
            self.dom.click(&remove).await?;
            settle(self.config.timeouts.settle()).await;

            let after = self.staged_rows().await?.len();
            if after < before {
                removed += before - after;
                stalled = 0;
            } else {
                stalled += 1;
                if stalled >= dialog.max_clear_attempts {
                    warn!(
                        "Staged list stuck at {} row(s) after {} removal attempt(s)",
                        after, stalled
                    );
                    break;
                }
            }
        }

        Ok(removed)
    }

    /// Search and stage one item, returning its staged row
    ///
    /// `Ok(None)` when the catalog has no exact match.
    async fn stage_item(&self, item: &DesiredItem) -> Result<Option<ElementHandle>> {
        let dialog = &self.config.dialog;
        let settle_delay = self.config.timeouts.settle();

        let input = find_first(self.dom, &dialog.search_input).await?;
        self.dom.set_value(&input, "").await?;
        self.dom.set_value(&input, &item.name).await?;
        self.dom.press(&input, "Enter").await?;
        settle(settle_delay).await;

        let Some(row) = self.catalog_match(&item.name).await? else {
            info!("No catalog match for '{}', skipping", item.name);
            return Ok(None);
        };

        self.dom.click(&row).await?;
        let stage = find_first(self.dom, &dialog.stage_button).await?;
        self.dom.click(&stage).await?;
        settle(settle_delay).await;

        let last = self
            .staged_rows()
            .await?
            .pop()
            .ok_or_else(|| Error::Dom(format!("'{}' did not appear in staged list", item.name)))?;

        debug!("Staged '{}' x{}", item.name, item.quantity_or_default());
        Ok(Some(last))
    }

    /// First catalog row whose name column equals `name`
    async fn catalog_match(&self, name: &str) -> Result<Option<ElementHandle>> {
        let selectors = &self.config.table;
        let table = find_first(self.dom, &self.config.dialog.catalog_table).await?;
        let header = read_header(self.dom, &table, selectors).await?;
        let name_column = resolve_column_with(
            &header,
            &self.config.columns.name,
            &selectors.non_structural_markers,
        );

        for row in self.dom.find_within(&table, &selectors.body_row).await? {
            let cells = row_texts(self.dom, &row, &selectors.cell).await?;
            let hit = match name_column {
                Some(index) => cells.get(index).is_some_and(|c| c == name),
                None => cells.iter().any(|c| c == name),
            };
            if hit {
                return Ok(Some(row));
            }
        }

        Ok(None)
    }

    async fn set_quantity(&self, row: &ElementHandle, item: &DesiredItem) -> Result<()> {
        let selectors = &self.config.table;
        let table = self.staged_table().await?;
        let header = read_header(self.dom, &table, selectors).await?;

        let Some(index) = resolve_column_with(
            &header,
            &self.config.columns.quantity,
            &selectors.non_structural_markers,
        ) else {
            warn!(
                "Staged table has no quantity column, '{}' keeps its default",
                item.name
            );
            return Ok(());
        };

        let cell = self
            .dom
            .find_within(row, &selectors.cell)
            .await?
            .into_iter()
            .nth(index)
            .ok_or_else(|| Error::not_found(format!("{} cell {}", row, index)))?;

        self.dom.double_click(&cell).await?;
        let input = find_first_within(self.dom, &cell, &self.config.dialog.quantity_input).await?;
        self.dom
            .wait_visible(&input, self.config.timeouts.visible())
            .await?;

        self.dom.set_value(&input, "").await?;
        self.dom
            .set_value(&input, &format_quantity(item.quantity_or_default()))
            .await?;
        self.dom.press(&input, "Enter").await?;
        settle(self.config.timeouts.settle()).await;
        Ok(())
    }
}
