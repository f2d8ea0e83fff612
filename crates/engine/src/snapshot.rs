//! In-memory BOM trees and material catalogs
//!
//! A [`TreeSnapshot`] is a recorded specification tree that can be walked
//! offline exactly like the live screen; [`StaticCatalog`] is a fixed
//! material-to-category table. Both load from JSON.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::Category;
use crate::walker::{BomSource, Level, MaterialCatalog, SourceRow};

/// Rows of one level plus what their rows reveal
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotLevel {
    pub rows: Vec<SourceRow>,
    /// Row position -> designation of the assembly it opens
    #[serde(default)]
    pub children: BTreeMap<usize, String>,
    /// Row position -> material characteristic of the detail
    #[serde(default)]
    pub materials: BTreeMap<usize, String>,
}

/// A recorded specification tree keyed by owner designation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreeSnapshot {
    pub root: String,
    #[serde(default)]
    pub levels: BTreeMap<String, SnapshotLevel>,
}

impl TreeSnapshot {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            levels: BTreeMap::new(),
        }
    }

    /// Load a snapshot from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Level the walk starts from
    pub fn root_level(&self) -> Level {
        Level::root(Self::level_id(&self.root), self.root.clone())
    }

    /// Set the rows shown for `designation`, replacing earlier ones
    pub fn add_level(&mut self, designation: impl Into<String>, rows: Vec<SourceRow>) {
        self.levels.entry(designation.into()).or_default().rows = rows;
    }

    /// Make the row at `position` of `parent` open `child`
    pub fn link(&mut self, parent: &str, position: usize, child: impl Into<String>) {
        self.levels
            .entry(parent.to_string())
            .or_default()
            .children
            .insert(position, child.into());
    }

    /// Give the detail row at `position` of `owner` a material
    pub fn set_material(&mut self, owner: &str, position: usize, material: impl Into<String>) {
        self.levels
            .entry(owner.to_string())
            .or_default()
            .materials
            .insert(position, material.into());
    }

    fn level_id(designation: &str) -> String {
        format!("snapshot:{}", designation)
    }

    fn level(&self, designation: &str) -> Result<&SnapshotLevel> {
        self.levels
            .get(designation)
            .ok_or_else(|| Error::not_found(Self::level_id(designation)))
    }
}

#[async_trait]
impl BomSource for TreeSnapshot {
    async fn rows(&mut self, level: &Level) -> Result<Vec<SourceRow>> {
        Ok(self.level(&level.designation)?.rows.clone())
    }

    async fn open_assembly(&mut self, parent: &Level, position: usize) -> Result<Level> {
        let child = self
            .level(&parent.designation)?
            .children
            .get(&position)
            .ok_or_else(|| {
                Error::not_found(format!("{} row {}", Self::level_id(&parent.designation), position))
            })?;

        Ok(parent.child(Self::level_id(child), child.clone()))
    }

    async fn close(&mut self, _level: &Level) -> Result<()> {
        Ok(())
    }

    async fn detail_material(&mut self, level: &Level, position: usize) -> Result<Option<String>> {
        Ok(self.level(&level.designation)?.materials.get(&position).cloned())
    }
}

/// Fixed material catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticCatalog {
    entries: HashMap<String, Category>,
}

impl StaticCatalog {
    pub fn new<I, N>(entries: I) -> Self
    where
        I: IntoIterator<Item = (N, Category)>,
        N: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(|(n, c)| (n.into(), c)).collect(),
        }
    }

    pub fn insert(&mut self, material: impl Into<String>, category: Category) {
        self.entries.insert(material.into(), category);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl MaterialCatalog for StaticCatalog {
    async fn classify(&self, material: &str) -> Result<Option<Category>> {
        Ok(self.entries.get(material).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::walker::{extract_bom, RawRow};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_snapshot_from_json_file() {
        let json = r#"{
            "root": "P-1",
            "levels": {
                "P-1": {
                    "rows": [
                        {"GroupHeader": {"label": "Assemblies", "category": "assembly"}},
                        {"Item": {"position": 1, "designation": "A-1", "name": "Frame", "quantity": "2"}}
                    ],
                    "children": {"1": "A-1"}
                },
                "A-1": {
                    "rows": [
                        {"GroupHeader": {"label": "Details", "category": "detail"}},
                        {"Item": {"position": 1, "designation": "D-1", "name": "Plate", "quantity": "5"}}
                    ],
                    "materials": {"1": "Sheet 3mm"}
                }
            }
        }"#;

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tree.json");
        std::fs::write(&path, json).unwrap();

        let mut tree = TreeSnapshot::from_file(&path).unwrap();
        let catalog = StaticCatalog::new([("Sheet 3mm", Category::RawMaterial)]);
        let root = tree.root_level();
        let state = extract_bom(&mut tree, &catalog, root).await;

        assert_eq!(state.find(Category::Detail, "Plate").unwrap().quantity, 10.0);
        assert_eq!(state.find(Category::RawMaterial, "Sheet 3mm").unwrap().quantity, 10.0);
    }

    #[tokio::test]
    async fn test_open_unknown_child_fails() {
        let mut tree = TreeSnapshot::new("P-1");
        tree.add_level(
            "P-1",
            vec![SourceRow::Item(RawRow {
                position: 0,
                name: "Frame".to_string(),
                ..Default::default()
            })],
        );

        let root = tree.root_level();
        assert!(tree.open_assembly(&root, 0).await.is_err());
        assert_eq!(tree.rows(&root).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_static_catalog() {
        let mut catalog = StaticCatalog::default();
        catalog.insert("Primer", Category::Consumable);

        assert_eq!(catalog.classify("Primer").await.unwrap(), Some(Category::Consumable));
        assert_eq!(catalog.classify("primer").await.unwrap(), None);
        assert_eq!(catalog.len(), 1);
    }
}
