//! Engine configuration
//!
//! Selectors, column ids and group markers for the screens the engine
//! reads, plus wait timings. Loaded from TOML; every field has a default.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::model::Category;

/// Engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub timeouts: TimeoutConfig,
    pub table: TableSelectors,
    pub columns: ColumnIds,
    pub groups: GroupMarkers,
    pub bom: BomSelectors,
    pub catalog: CatalogSelectors,
    pub dialog: DialogSelectors,
    pub specification: SpecificationSelectors,
}

impl EngineConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if !self.bom.modal.contains("{depth}") {
            return Err(Error::InvalidConfig(
                "bom.modal must contain a {depth} placeholder".to_string(),
            ));
        }
        if !self.dialog.open_button.contains("{category}") {
            return Err(Error::InvalidConfig(
                "dialog.open_button must contain a {category} placeholder".to_string(),
            ));
        }
        if self.dialog.max_clear_attempts == 0 {
            return Err(Error::InvalidConfig(
                "dialog.max_clear_attempts must be at least 1".to_string(),
            ));
        }
        if self.catalog.tabs.is_empty() {
            return Err(Error::InvalidConfig(
                "catalog.tabs must name at least one sub-category".to_string(),
            ));
        }
        Ok(())
    }
}

/// Wait timings in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub visible_ms: u64,
    pub hidden_ms: u64,
    pub settle_ms: u64,
    pub poll_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            visible_ms: 10_000,
            hidden_ms: 10_000,
            settle_ms: 150,
            poll_ms: 50,
        }
    }
}

impl TimeoutConfig {
    pub fn visible(&self) -> Duration {
        Duration::from_millis(self.visible_ms)
    }

    pub fn hidden(&self) -> Duration {
        Duration::from_millis(self.hidden_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms.max(1))
    }

    /// Timings for in-memory surfaces: no settling, tight polling
    pub fn immediate() -> Self {
        Self {
            visible_ms: 500,
            hidden_ms: 500,
            settle_ms: 0,
            poll_ms: 1,
        }
    }
}

/// Generic table structure shared by every screen
///
/// Row and cell selectors are evaluated relative to their table or row,
/// hence the `:scope` anchors that keep nested tables out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TableSelectors {
    pub header_row: String,
    pub header_cell: String,
    pub column_attribute: String,
    pub span_attribute: String,
    pub row_id_attribute: String,
    pub non_structural_markers: Vec<String>,
    pub body_row: String,
    pub cell: String,
    pub row_kind_attribute: String,
    pub group_kind: String,
    pub data_kind: String,
    pub nested_table: String,
    pub nested_row: String,
}

impl Default for TableSelectors {
    fn default() -> Self {
        Self {
            header_row: ":scope > thead > tr".to_string(),
            header_cell: ":scope > th".to_string(),
            column_attribute: "data-column-id".to_string(),
            span_attribute: "colspan".to_string(),
            row_id_attribute: "data-row-id".to_string(),
            non_structural_markers: vec!["search".to_string(), "footer".to_string()],
            body_row: ":scope > tbody > tr".to_string(),
            cell: ":scope > td".to_string(),
            row_kind_attribute: "data-row-kind".to_string(),
            group_kind: "group".to_string(),
            data_kind: "data".to_string(),
            nested_table: "table".to_string(),
            nested_row: ":scope > tbody > tr".to_string(),
        }
    }
}

/// Semantic column ids looked up through the column resolver
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnIds {
    pub designation: String,
    pub name: String,
    pub unit: String,
    pub quantity: String,
}

impl Default for ColumnIds {
    fn default() -> Self {
        Self {
            designation: "designation".to_string(),
            name: "name".to_string(),
            unit: "unit".to_string(),
            quantity: "quantity".to_string(),
        }
    }
}

/// Marker substrings identifying each category's group header
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupMarkers {
    pub assembly: String,
    pub detail: String,
    pub standard_part: String,
    pub raw_material: String,
    pub consumable: String,
}

impl Default for GroupMarkers {
    fn default() -> Self {
        Self {
            assembly: "assembl".to_string(),
            detail: "detail".to_string(),
            standard_part: "standard".to_string(),
            raw_material: "material".to_string(),
            consumable: "consumable".to_string(),
        }
    }
}

impl GroupMarkers {
    pub fn marker(&self, category: Category) -> &str {
        match category {
            Category::Assembly => &self.assembly,
            Category::Detail => &self.detail,
            Category::StandardPart => &self.standard_part,
            Category::RawMaterial => &self.raw_material,
            Category::Consumable => &self.consumable,
        }
    }

    /// First category, in priority order, whose marker occurs in `text`
    pub fn classify(&self, text: &str) -> Option<Category> {
        let text = text.to_lowercase();
        Category::ALL.into_iter().find(|c| {
            let marker = self.marker(*c).to_lowercase();
            !marker.is_empty() && text.contains(&marker)
        })
    }
}

/// The nested BOM screen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BomSelectors {
    pub root_table: String,
    /// Modal showing the sub-specification at a nesting depth (`{depth}`)
    pub modal: String,
    pub modal_table: String,
    pub modal_designation: String,
    pub modal_close: String,
    pub group_attribute: String,
    pub detail_modal: String,
    pub detail_material: String,
    pub detail_close: String,
}

impl Default for BomSelectors {
    fn default() -> Self {
        Self {
            root_table: "[data-testid='bom-root'] table.specification".to_string(),
            modal: "[data-testid='bom-modal'][data-depth='{depth}']".to_string(),
            modal_table: "table.specification".to_string(),
            modal_designation: "[data-field='designation']".to_string(),
            modal_close: "[data-action='close']".to_string(),
            group_attribute: "data-group".to_string(),
            detail_modal: "[data-testid='detail-modal']".to_string(),
            detail_material: "[data-characteristic='material']".to_string(),
            detail_close: "[data-testid='detail-modal'] [data-action='close']".to_string(),
        }
    }
}

impl BomSelectors {
    pub fn modal_at(&self, depth: usize) -> String {
        self.modal.replace("{depth}", &depth.to_string())
    }
}

/// One material catalog sub-category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogTab {
    pub selector: String,
    pub category: Category,
}

/// The material catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSelectors {
    pub open_button: String,
    pub panel: String,
    pub close_button: String,
    pub search_input: String,
    pub table: String,
    pub tabs: Vec<CatalogTab>,
}

impl Default for CatalogSelectors {
    fn default() -> Self {
        Self {
            open_button: "[data-testid='material-catalog-open']".to_string(),
            panel: "[data-testid='material-catalog']".to_string(),
            close_button: "[data-testid='material-catalog'] [data-action='close']".to_string(),
            search_input: "[data-testid='material-catalog'] input[type='search']".to_string(),
            table: "[data-testid='material-catalog'] table".to_string(),
            tabs: vec![
                CatalogTab {
                    selector: "[data-testid='catalog-tab-raw']".to_string(),
                    category: Category::RawMaterial,
                },
                CatalogTab {
                    selector: "[data-testid='catalog-tab-standard']".to_string(),
                    category: Category::StandardPart,
                },
                CatalogTab {
                    selector: "[data-testid='catalog-tab-consumable']".to_string(),
                    category: Category::Consumable,
                },
            ],
        }
    }
}

/// The per-category specification edit dialog
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogSelectors {
    /// Button opening the dialog of a category (`{category}`)
    pub open_button: String,
    pub dialog: String,
    pub staged_table: String,
    pub catalog_table: String,
    pub search_input: String,
    pub stage_button: String,
    pub remove_button: String,
    pub commit_button: String,
    pub cancel_button: String,
    pub quantity_input: String,
    pub max_clear_attempts: usize,
}

impl Default for DialogSelectors {
    fn default() -> Self {
        Self {
            open_button: "[data-testid='edit-{category}']".to_string(),
            dialog: "[data-testid='spec-dialog']".to_string(),
            staged_table: "[data-testid='spec-dialog'] [data-testid='staged'] table".to_string(),
            catalog_table: "[data-testid='spec-dialog'] [data-testid='catalog'] table".to_string(),
            search_input: "[data-testid='spec-dialog'] input[type='search']".to_string(),
            stage_button: "[data-testid='spec-dialog'] [data-action='stage']".to_string(),
            remove_button: "[data-testid='spec-dialog'] [data-action='remove']".to_string(),
            commit_button: "[data-testid='spec-dialog'] [data-action='commit']".to_string(),
            cancel_button: "[data-testid='spec-dialog'] [data-action='cancel']".to_string(),
            quantity_input: "input".to_string(),
            max_clear_attempts: 3,
        }
    }
}

impl DialogSelectors {
    pub fn open_button_for(&self, category: Category) -> String {
        self.open_button.replace("{category}", category.as_str())
    }
}

/// The main specification page
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecificationSelectors {
    pub table: String,
}

impl Default for SpecificationSelectors {
    fn default() -> Self {
        Self {
            table: "[data-testid='specification'] table.groups".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = EngineConfig::load(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.timeouts.visible_ms, 10_000);
        assert_eq!(config.catalog.tabs.len(), 3);
    }

    #[test]
    fn test_save_then_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("engine.toml");

        let mut config = EngineConfig::default();
        config.timeouts.settle_ms = 0;
        config.columns.quantity = "qty".to_string();
        config.save(&path).unwrap();

        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded.timeouts.settle_ms, 0);
        assert_eq!(loaded.columns.quantity, "qty");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("engine.toml");
        std::fs::write(&path, "[columns]\nname = \"title\"\n").unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.columns.name, "title");
        assert_eq!(config.columns.quantity, "quantity");
    }

    #[test]
    fn test_invalid_modal_template_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("engine.toml");
        std::fs::write(&path, "[bom]\nmodal = \".modal\"\n").unwrap();

        assert!(matches!(
            EngineConfig::load(&path),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_group_marker_priority() {
        let markers = GroupMarkers::default();
        assert_eq!(markers.classify("Assemblies"), Some(Category::Assembly));
        assert_eq!(markers.classify("Standard parts"), Some(Category::StandardPart));
        // "Detail materials" matches both; detail comes first
        assert_eq!(markers.classify("Detail materials"), Some(Category::Detail));
        assert_eq!(markers.classify("Other"), None);
    }

    #[test]
    fn test_templates() {
        let config = EngineConfig::default();
        assert_eq!(
            config.bom.modal_at(2),
            "[data-testid='bom-modal'][data-depth='2']"
        );
        assert_eq!(
            config.dialog.open_button_for(Category::StandardPart),
            "[data-testid='edit-standard_part']"
        );
    }
}
