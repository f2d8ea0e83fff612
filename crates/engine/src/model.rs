//! Core BOM types

use serde::{Deserialize, Serialize};

use crate::aggregator;

/// Designation used when a row carries none
pub const NO_DESIGNATION: &str = "-";

/// Kind of specification line
///
/// Declaration order is the fixed priority order used when classifying
/// group header rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Assembly,
    Detail,
    StandardPart,
    RawMaterial,
    Consumable,
}

impl Category {
    /// All categories in classification priority order
    pub const ALL: [Category; 5] = [
        Category::Assembly,
        Category::Detail,
        Category::StandardPart,
        Category::RawMaterial,
        Category::Consumable,
    ];

    /// Whether a line of this category is measured per parent designation
    pub fn is_composite(&self) -> bool {
        matches!(self, Category::Assembly | Category::Detail)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Assembly => "assembly",
            Category::Detail => "detail",
            Category::StandardPart => "standard_part",
            Category::RawMaterial => "raw_material",
            Category::Consumable => "consumable",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown category: {}", s))
    }
}

/// One parsed specification line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub designation: String,
    pub name: String,
    pub unit: String,
    pub quantity: f64,
    pub category: Category,
}

impl LineItem {
    pub fn new(
        designation: impl Into<String>,
        name: impl Into<String>,
        unit: impl Into<String>,
        quantity: f64,
        category: Category,
    ) -> Self {
        let designation = designation.into();
        let designation = if designation.trim().is_empty() {
            NO_DESIGNATION.to_string()
        } else {
            designation.trim().to_string()
        };

        Self {
            designation,
            name: name.into().trim().to_string(),
            unit: unit.into().trim().to_string(),
            quantity: round_quantity(quantity.max(0.0)),
            category,
        }
    }

    /// Copy of this item carrying another quantity
    pub fn with_quantity(&self, quantity: f64) -> Self {
        Self {
            quantity: round_quantity(quantity.max(0.0)),
            ..self.clone()
        }
    }
}

/// Round a quantity to three decimals
pub fn round_quantity(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Parse an on-screen quantity
///
/// Accepts surrounding and inner whitespace (including non-breaking
/// spaces) and a decimal comma. Negative or non-numeric text yields `None`.
pub fn parse_quantity(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Some(value),
        _ => None,
    }
}

/// Render a quantity the way the ERP input fields expect it
pub fn format_quantity(value: f64) -> String {
    let value = round_quantity(value);
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Flattened result of one BOM traversal, one list per category
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BomState {
    #[serde(default)]
    pub assemblies: Vec<LineItem>,
    #[serde(default)]
    pub details: Vec<LineItem>,
    #[serde(default)]
    pub standard_parts: Vec<LineItem>,
    #[serde(default)]
    pub raw_materials: Vec<LineItem>,
    #[serde(default)]
    pub consumables: Vec<LineItem>,
}

impl BomState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self, category: Category) -> &[LineItem] {
        match category {
            Category::Assembly => &self.assemblies,
            Category::Detail => &self.details,
            Category::StandardPart => &self.standard_parts,
            Category::RawMaterial => &self.raw_materials,
            Category::Consumable => &self.consumables,
        }
    }

    pub fn items_mut(&mut self, category: Category) -> &mut Vec<LineItem> {
        match category {
            Category::Assembly => &mut self.assemblies,
            Category::Detail => &mut self.details,
            Category::StandardPart => &mut self.standard_parts,
            Category::RawMaterial => &mut self.raw_materials,
            Category::Consumable => &mut self.consumables,
        }
    }

    /// Merge a table line into the list of its own category
    pub fn insert(&mut self, item: LineItem) {
        let list = self.items_mut(item.category);
        aggregator::merge(list, item);
    }

    /// Merge a material found in a detail's characteristics
    pub fn insert_characteristic(&mut self, item: LineItem) {
        let list = self.items_mut(item.category);
        aggregator::merge_characteristic(list, item);
    }

    /// Find an item by name within a category
    pub fn find(&self, category: Category, name: &str) -> Option<&LineItem> {
        self.items(category).iter().find(|i| i.name == name)
    }

    /// Total number of lines across all categories
    pub fn len(&self) -> usize {
        Category::ALL.iter().map(|c| self.items(*c).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sort every category by name
    pub fn sort(&mut self) {
        for category in Category::ALL {
            self.items_mut(category)
                .sort_by(|a, b| a.name.cmp(&b.name));
        }
    }

    /// Project onto the shape of a target specification
    ///
    /// Raw materials have no counterpart in a target specification and are
    /// left out.
    pub fn to_specification(&self) -> TargetSpecification {
        let project = |items: &[LineItem]| {
            items
                .iter()
                .map(|i| DesiredItem::new(i.name.clone(), i.quantity))
                .collect()
        };

        TargetSpecification {
            assemblies: project(&self.assemblies),
            details: project(&self.details),
            standard_parts: project(&self.standard_parts),
            consumables: project(&self.consumables),
        }
    }
}

/// One wanted line of a specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredItem {
    pub name: String,
    #[serde(default)]
    pub quantity: Option<f64>,
}

impl DesiredItem {
    pub fn new(name: impl Into<String>, quantity: f64) -> Self {
        Self {
            name: name.into(),
            quantity: Some(quantity),
        }
    }

    /// Quantity to enter, defaulting to one
    pub fn quantity_or_default(&self) -> f64 {
        self.quantity.unwrap_or(1.0)
    }
}

/// Desired state of a product specification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetSpecification {
    #[serde(default)]
    pub assemblies: Vec<DesiredItem>,
    #[serde(default)]
    pub details: Vec<DesiredItem>,
    #[serde(default)]
    pub standard_parts: Vec<DesiredItem>,
    #[serde(default)]
    pub consumables: Vec<DesiredItem>,
}

impl TargetSpecification {
    /// Categories a specification can be edited in
    pub const EDITABLE: [Category; 4] = [
        Category::Assembly,
        Category::Detail,
        Category::StandardPart,
        Category::Consumable,
    ];

    /// Desired items of a category; raw materials are never targeted
    pub fn items(&self, category: Category) -> &[DesiredItem] {
        match category {
            Category::Assembly => &self.assemblies,
            Category::Detail => &self.details,
            Category::StandardPart => &self.standard_parts,
            Category::Consumable => &self.consumables,
            Category::RawMaterial => &[],
        }
    }

    pub fn items_mut(&mut self, category: Category) -> Option<&mut Vec<DesiredItem>> {
        match category {
            Category::Assembly => Some(&mut self.assemblies),
            Category::Detail => Some(&mut self.details),
            Category::StandardPart => Some(&mut self.standard_parts),
            Category::Consumable => Some(&mut self.consumables),
            Category::RawMaterial => None,
        }
    }
}
