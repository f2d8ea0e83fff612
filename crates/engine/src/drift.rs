//! Drift between a desired and an actual specification

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::{round_quantity, Category, DesiredItem, TargetSpecification};

/// One difference found in a category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    pub category: Category,
    pub name: String,
    pub drift_type: DriftType,
    pub message: String,
}

/// Types of drift
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DriftType {
    /// Desired but not listed
    Missing,
    /// Listed but not desired
    Unexpected,
    /// Listed more than once
    Duplicate { count: usize },
    QuantityMismatch { expected: f64, actual: f64 },
}

/// Compare `actual` against `desired` over every editable category
///
/// Missing quantities count as one on both sides. An empty result means
/// the two specifications agree.
pub fn detect_drift(actual: &TargetSpecification, desired: &TargetSpecification) -> Vec<DriftReport> {
    let mut reports = Vec::new();

    for category in TargetSpecification::EDITABLE {
        let wanted = totals(desired.items(category));
        let listed = totals(actual.items(category));

        for (name, (_, expected)) in &wanted {
            let report = |drift_type, message| DriftReport {
                category,
                name: name.clone(),
                drift_type,
                message,
            };

            match listed.get(name) {
                None => reports.push(report(
                    DriftType::Missing,
                    format!("{} '{}' is not in the specification", category, name),
                )),
                Some((count, _)) if *count > 1 => reports.push(report(
                    DriftType::Duplicate { count: *count },
                    format!("{} '{}' is listed {} times", category, name, count),
                )),
                Some((_, actual)) if (actual - expected).abs() > 1e-6 => reports.push(report(
                    DriftType::QuantityMismatch {
                        expected: *expected,
                        actual: *actual,
                    },
                    format!(
                        "{} '{}' has quantity {} but should have {}",
                        category, name, actual, expected
                    ),
                )),
                Some(_) => {}
            }
        }

        for name in listed.keys().filter(|n| !wanted.contains_key(*n)) {
            reports.push(DriftReport {
                category,
                name: name.clone(),
                drift_type: DriftType::Unexpected,
                message: format!("{} '{}' is not desired", category, name),
            });
        }
    }

    reports
}

/// Line count and summed quantity per name
fn totals(items: &[DesiredItem]) -> BTreeMap<String, (usize, f64)> {
    let mut totals = BTreeMap::new();
    for item in items {
        let entry = totals.entry(item.name.clone()).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 = round_quantity(entry.1 + item.quantity_or_default());
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(standard_parts: &[(&str, f64)]) -> TargetSpecification {
        TargetSpecification {
            standard_parts: standard_parts
                .iter()
                .map(|(n, q)| DesiredItem::new(*n, *q))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_identical_specifications_have_no_drift() {
        let desired = spec(&[("Bolt M8", 4.0), ("Nut M8", 4.0)]);
        assert!(detect_drift(&desired.clone(), &desired).is_empty());
    }

    #[test]
    fn test_missing_and_unexpected() {
        let desired = spec(&[("Bolt M8", 4.0)]);
        let actual = spec(&[("Washer", 1.0)]);

        let reports = detect_drift(&actual, &desired);
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].name, "Bolt M8");
        assert_eq!(reports[0].drift_type, DriftType::Missing);
        assert_eq!(reports[1].name, "Washer");
        assert_eq!(reports[1].drift_type, DriftType::Unexpected);
    }

    #[test]
    fn test_quantity_mismatch() {
        let reports = detect_drift(&spec(&[("Bolt M8", 3.0)]), &spec(&[("Bolt M8", 4.0)]));
        assert_eq!(
            reports[0].drift_type,
            DriftType::QuantityMismatch {
                expected: 4.0,
                actual: 3.0
            }
        );
    }

    #[test]
    fn test_duplicate_line() {
        let reports = detect_drift(
            &spec(&[("Bolt M8", 2.0), ("Bolt M8", 2.0)]),
            &spec(&[("Bolt M8", 4.0)]),
        );
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].drift_type, DriftType::Duplicate { count: 2 });
    }

    #[test]
    fn test_missing_quantity_counts_as_one() {
        let mut actual = TargetSpecification::default();
        actual.consumables.push(DesiredItem {
            name: "Primer".to_string(),
            quantity: None,
        });
        let mut desired = TargetSpecification::default();
        desired.consumables.push(DesiredItem::new("Primer", 1.0));

        assert!(detect_drift(&actual, &desired).is_empty());
    }
}
