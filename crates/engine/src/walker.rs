//! Recursive BOM walker
//!
//! Folds a lazily revealed specification tree into a flat [`BomState`].
//! Each level is a table of group headers and item rows. Assembly rows open
//! a child level whose quantities are scaled by the assembly's own
//! effective quantity; detail rows contribute the raw material named in
//! their characteristics.
//!
//! ```text
//! walk(root, ×1)
//!   ├── Assembly A  qty 2      → walk(A, ×2)
//!   │     ├── Assembly B qty 3 →   walk(B, ×6)
//!   │     │     └── Detail P qty 1  → P = 6
//!   │     └── Detail Q qty 1   →   Q = 2
//!   └── Standard part S qty 4  → S = 4 (never scaled)
//! ```
//!
//! A branch that fails to open or read is logged and skipped; the walk
//! itself never fails.

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::model::{parse_quantity, BomState, Category, LineItem, NO_DESIGNATION};

/// One level of the tree: a specification table and its owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    /// Identifier of the table shown at this level
    pub id: String,
    /// Designation of the composite owning this table
    pub designation: String,
    /// Nesting depth, 0 for the root product
    pub depth: usize,
}

impl Level {
    pub fn root(id: impl Into<String>, designation: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            designation: designation.into(),
            depth: 0,
        }
    }

    /// Level owned by a composite one step below this one
    pub fn child(&self, id: impl Into<String>, designation: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            designation: designation.into(),
            depth: self.depth + 1,
        }
    }
}

/// Cell texts of an item row, before any interpretation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    /// Row index within its level, used to reveal the row's children
    pub position: usize,
    #[serde(default)]
    pub designation: String,
    pub name: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub quantity: String,
}

/// A row as exposed by a [`BomSource`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceRow {
    /// Switches the current category; `None` for an unrecognised header
    GroupHeader {
        label: String,
        category: Option<Category>,
    },
    Item(RawRow),
    Other,
}

/// A specification tree whose children are revealed on demand
#[async_trait]
pub trait BomSource: Send {
    /// Rows of the table at `level`, in document order
    async fn rows(&mut self, level: &Level) -> Result<Vec<SourceRow>>;

    /// Reveal the sub-specification of the assembly row at `position`
    async fn open_assembly(&mut self, parent: &Level, position: usize) -> Result<Level>;

    /// Dismiss a level previously returned by [`BomSource::open_assembly`]
    async fn close(&mut self, level: &Level) -> Result<()>;

    /// Material named in the characteristics of the detail row at `position`
    async fn detail_material(&mut self, level: &Level, position: usize) -> Result<Option<String>>;
}

/// Lookup of the catalog sub-category a material belongs to
#[async_trait]
pub trait MaterialCatalog: Send + Sync {
    async fn classify(&self, material: &str) -> Result<Option<Category>>;
}

/// Counters collected during one walk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkStats {
    pub levels: usize,
    pub rows: usize,
    pub materials: usize,
    pub skipped: usize,
    pub max_depth: usize,
}

/// Depth-first walker owning the state of one traversal
pub struct BomWalker<'a, S: ?Sized, C: ?Sized> {
    source: &'a mut S,
    catalog: &'a C,
    state: BomState,
    stats: WalkStats,
}

impl<'a, S, C> BomWalker<'a, S, C>
where
    S: BomSource + ?Sized,
    C: MaterialCatalog + ?Sized,
{
    pub fn new(source: &'a mut S, catalog: &'a C) -> Self {
        Self {
            source,
            catalog,
            state: BomState::new(),
            stats: WalkStats::default(),
        }
    }

    /// Walk from `root` and return the sorted result
    pub async fn run(mut self, root: Level) -> (BomState, WalkStats) {
        info!("Extracting BOM of {} from {}", root.designation, root.id);

        self.walk(root, 1.0).await;
        self.state.sort();

        info!(
            "BOM extracted: {} line(s) from {} level(s), {} branch(es) skipped",
            self.state.len(),
            self.stats.levels,
            self.stats.skipped
        );
        (self.state, self.stats)
    }

    /// Fold one level into the state, recursing into assemblies
    pub fn walk(&mut self, level: Level, multiplier: f64) -> BoxFuture<'_, ()> {
        async move {
            let rows = match self.source.rows(&level).await {
                Ok(rows) => rows,
                Err(e) => {
                    warn!("Skipping level {} ({}): {}", level.designation, level.id, e);
                    self.stats.skipped += 1;
                    return;
                }
            };

            self.stats.levels += 1;
            self.stats.max_depth = self.stats.max_depth.max(level.depth);
            debug!(
                "Level {} depth {} x{}: {} row(s)",
                level.designation,
                level.depth,
                multiplier,
                rows.len()
            );

            let mut current: Option<Category> = None;

            for row in rows {
                let raw = match row {
                    SourceRow::GroupHeader { label, category } => {
                        if category.is_none() {
                            debug!("Unrecognised group header '{}' in {}", label, level.id);
                        }
                        current = category;
                        continue;
                    }
                    SourceRow::Other => continue,
                    SourceRow::Item(raw) => raw,
                };

                let Some(category) = current else {
                    debug!(
                        "Row {} of {} is outside any known group",
                        raw.position, level.id
                    );
                    continue;
                };

                let item = line_item(&raw, category, &level, multiplier);
                let quantity = item.quantity;
                self.stats.rows += 1;
                self.state.insert(item);

                match category {
                    Category::Assembly => {
                        match self.source.open_assembly(&level, raw.position).await {
                            Ok(child) => {
                                self.walk(child.clone(), quantity).await;
                                if let Err(e) = self.source.close(&child).await {
                                    warn!("Failed to close {}: {}", child.designation, e);
                                }
                            }
                            Err(e) => {
                                warn!(
                                    "Skipping assembly '{}' in {}: {}",
                                    raw.name, level.designation, e
                                );
                                self.stats.skipped += 1;
                            }
                        }
                    }
                    Category::Detail => {
                        self.fold_material(&level, &raw, quantity).await;
                    }
                    _ => {}
                }
            }
        }
        .boxed()
    }

    /// Add the material of a detail under its catalog category
    async fn fold_material(&mut self, level: &Level, raw: &RawRow, quantity: f64) {
        let material = match self.source.detail_material(level, raw.position).await {
            Ok(Some(material)) if !material.trim().is_empty() => material,
            Ok(_) => {
                debug!("Detail '{}' has no material characteristic", raw.name);
                return;
            }
            Err(e) => {
                warn!("Skipping material of detail '{}': {}", raw.name, e);
                self.stats.skipped += 1;
                return;
            }
        };

        match self.catalog.classify(material.trim()).await {
            Ok(Some(category)) => {
                self.stats.materials += 1;
                self.state.insert_characteristic(LineItem::new(
                    NO_DESIGNATION,
                    material.trim(),
                    NO_DESIGNATION,
                    quantity,
                    category,
                ));
            }
            Ok(None) => {
                warn!(
                    "Material '{}' of detail '{}' not found in catalog",
                    material, raw.name
                );
            }
            Err(e) => {
                warn!("Catalog lookup for '{}' failed: {}", material, e);
                self.stats.skipped += 1;
            }
        }
    }
}

/// Interpret a raw row under the rules of its category
fn line_item(raw: &RawRow, category: Category, level: &Level, multiplier: f64) -> LineItem {
    let parsed = parse_quantity(&raw.quantity);

    let quantity = match category {
        Category::StandardPart => parsed.unwrap_or(1.0),
        _ => match parsed {
            Some(value) => value * multiplier,
            None => {
                warn!(
                    "Unreadable quantity '{}' for {} '{}', using 0",
                    raw.quantity, category, raw.name
                );
                0.0
            }
        },
    };

    let unit = if category.is_composite() {
        level.designation.as_str()
    } else {
        raw.unit.as_str()
    };

    LineItem::new(raw.designation.as_str(), raw.name.as_str(), unit, quantity, category)
}

/// Walk the whole tree below `root` and return the sorted state
pub async fn extract_bom<S, C>(source: &mut S, catalog: &C, root: Level) -> BomState
where
    S: BomSource + ?Sized,
    C: MaterialCatalog + ?Sized,
{
    BomWalker::new(source, catalog).run(root).await.0
}
