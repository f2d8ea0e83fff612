//! Data behind the fake ERP screens

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use bomwalk_engine::{Category, TargetSpecification};

/// Everything the fake ERP renders
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    /// Designation of the product on the BOM screen
    pub product: String,

    /// Specification table of each composite, keyed by designation
    #[serde(default)]
    pub levels: BTreeMap<String, Vec<FixtureGroup>>,

    /// Material catalog content per sub-category tab
    #[serde(default)]
    pub materials: BTreeMap<Category, Vec<String>>,

    /// Items the edit dialog of each category can find
    #[serde(default)]
    pub catalog: BTreeMap<Category, Vec<String>>,

    /// Initial content of the main specification
    #[serde(default)]
    pub specification: TargetSpecification,
}

/// A group header and the rows listed under it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureGroup {
    /// Category the rows behave as; `None` renders an inert group
    #[serde(default)]
    pub category: Option<Category>,

    /// Header text, defaulting to the category's usual label
    #[serde(default)]
    pub label: Option<String>,

    #[serde(default)]
    pub items: Vec<FixtureItem>,
}

impl FixtureGroup {
    pub fn new(category: Category, items: Vec<FixtureItem>) -> Self {
        Self {
            category: Some(category),
            label: None,
            items,
        }
    }

    pub fn label(&self) -> String {
        match (&self.label, self.category) {
            (Some(label), _) => label.clone(),
            (None, Some(category)) => default_label(category).to_string(),
            (None, None) => "Other".to_string(),
        }
    }
}

/// Header text the fake ERP shows for a category
pub fn default_label(category: Category) -> &'static str {
    match category {
        Category::Assembly => "Assemblies",
        Category::Detail => "Details",
        Category::StandardPart => "Standard parts",
        Category::RawMaterial => "Materials",
        Category::Consumable => "Consumables",
    }
}

/// One row of a BOM table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureItem {
    #[serde(default)]
    pub designation: String,
    pub name: String,
    #[serde(default = "default_unit")]
    pub unit: String,
    /// Quantity exactly as displayed
    #[serde(default)]
    pub quantity: String,
    /// Material characteristic of a detail
    #[serde(default)]
    pub material: Option<String>,
}

fn default_unit() -> String {
    "pcs".to_string()
}

impl FixtureItem {
    pub fn new(designation: &str, name: &str, quantity: &str) -> Self {
        Self {
            designation: designation.to_string(),
            name: name.to_string(),
            unit: default_unit(),
            quantity: quantity.to_string(),
            material: None,
        }
    }

    pub fn with_material(mut self, material: &str) -> Self {
        self.material = Some(material.to_string());
        self
    }
}
