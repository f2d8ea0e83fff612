//! Declarative YAML scenarios

use serde::{Deserialize, Serialize};
use std::path::Path;

use bomwalk_engine::{Category, DesiredItem};

use crate::error::{E2eError, E2eResult};
use crate::fixture::Fixture;

/// A complete scenario parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Unique name for this scenario
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering scenarios
    #[serde(default)]
    pub tags: Vec<String>,

    /// Screens the scenario runs against
    pub fixture: Fixture,

    /// Steps to execute in order
    pub steps: Vec<Step>,
}

/// A single step in a scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Record a value for `${key}` expansion in later steps
    Remember { key: String, value: String },

    /// Walk a product's BOM and keep the result
    ExtractBom {
        /// Defaults to the fixture's product
        #[serde(default)]
        product: Option<String>,
        save_as: String,
    },

    /// Check lines of a kept BOM
    ExpectBom {
        from: String,
        lines: Vec<ExpectedLine>,
        /// Fail when the BOM holds lines not listed here
        #[serde(default)]
        exact: bool,
    },

    /// Reconcile one category of the specification
    Reconcile {
        category: Category,
        #[serde(default)]
        items: Vec<DesiredItem>,
        #[serde(default)]
        expect: Option<OutcomeKind>,
    },

    /// Reconcile every editable category from a kept BOM
    ApplyBom { from: String },

    /// Read the main specification and keep it
    ReadSpecification { save_as: String },

    /// Check one category of the main specification, in order
    ExpectSpecification {
        category: Category,
        #[serde(default)]
        items: Vec<DesiredItem>,
    },

    /// Check the main specification against a kept BOM
    ExpectNoDrift { from: String },

    /// Check the main specification against one kept by `read_specification`
    ExpectSameSpecification { from: String },

    /// Log a message (for debugging)
    Log { message: String },
}

/// Expected line of an extracted BOM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedLine {
    pub category: Category,
    pub name: String,
    pub quantity: f64,
    #[serde(default)]
    pub unit: Option<String>,
}

/// Expected end state of a reconcile step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Committed,
    Cancelled,
    LeftOpen,
}

impl Step {
    /// Short name used in results and logs
    pub fn name(&self) -> String {
        match self {
            Step::Remember { key, .. } => format!("remember:{}", key),
            Step::ExtractBom { save_as, .. } => format!("extract_bom:{}", save_as),
            Step::ExpectBom { from, .. } => format!("expect_bom:{}", from),
            Step::Reconcile { category, .. } => format!("reconcile:{}", category),
            Step::ApplyBom { from } => format!("apply_bom:{}", from),
            Step::ReadSpecification { save_as } => format!("read_specification:{}", save_as),
            Step::ExpectSpecification { category, .. } => {
                format!("expect_specification:{}", category)
            }
            Step::ExpectNoDrift { from } => format!("expect_no_drift:{}", from),
            Step::ExpectSameSpecification { from } => {
                format!("expect_same_specification:{}", from)
            }
            Step::Log { .. } => "log".to_string(),
        }
    }
}

impl Scenario {
    /// Parse a scenario from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        serde_yaml::from_str(yaml).map_err(E2eError::from)
    }

    /// Parse a scenario from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| E2eError::ScenarioParse(format!("{}: {}", path.display(), e)))
    }

    /// Load all scenarios from a directory, sorted by name
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut scenarios = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            scenarios.push(Self::from_file(entry.path())?);
        }

        scenarios.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(scenarios)
    }

    /// Filter scenarios by tag
    pub fn filter_by_tag<'a>(scenarios: &'a [Self], tag: &str) -> Vec<&'a Self> {
        scenarios
            .iter()
            .filter(|s| s.tags.iter().any(|t| t == tag))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const YAML: &str = r#"
name: frame-bom
description: Extract the frame BOM
tags:
  - smoke
fixture:
  product: P-1
  levels:
    P-1:
      - category: standard_part
        items:
          - name: Bolt M8
            quantity: "4"
  catalog:
    standard_part: [Bolt M8]
steps:
  - action: extract_bom
    save_as: before
  - action: expect_bom
    from: before
    lines:
      - {category: standard_part, name: Bolt M8, quantity: 4}
  - action: reconcile
    category: standard_part
    items:
      - name: Bolt M8
    expect: committed
"#;

    #[test]
    fn test_parse_scenario() {
        let scenario = Scenario::from_yaml(YAML).unwrap();
        assert_eq!(scenario.name, "frame-bom");
        assert_eq!(scenario.steps.len(), 3);
        assert_eq!(scenario.fixture.levels["P-1"][0].items[0].unit, "pcs");

        match &scenario.steps[2] {
            Step::Reconcile { items, expect, .. } => {
                assert_eq!(items[0].quantity, None);
                assert_eq!(*expect, Some(OutcomeKind::Committed));
            }
            other => panic!("unexpected step {:?}", other),
        }
    }

    #[test]
    fn test_unknown_action_rejected() {
        let yaml = "name: x\nfixture: {product: P}\nsteps:\n  - action: screenshot\n";
        assert!(Scenario::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_load_all_sorted() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("b.yaml"), YAML).unwrap();
        std::fs::write(
            tmp.path().join("a.yml"),
            "name: aaa\nfixture: {product: P}\nsteps: []\n",
        )
        .unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

        let scenarios = Scenario::load_all(tmp.path()).unwrap();
        let names: Vec<_> = scenarios.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["aaa", "frame-bom"]);
        assert_eq!(Scenario::filter_by_tag(&scenarios, "smoke").len(), 1);
    }
}
