//! Specification reconciliation against the fake ERP

use bomwalk_e2e::{FakeErp, Fixture};
use bomwalk_engine::config::TimeoutConfig;
use bomwalk_engine::{
    read_specification, Category, DesiredItem, EngineConfig, ReconcileOutcome, SpecReconciler,
    TargetSpecification,
};

fn config() -> EngineConfig {
    EngineConfig {
        timeouts: TimeoutConfig::immediate(),
        ..Default::default()
    }
}

fn erp(initial: &[(&str, f64)]) -> FakeErp {
    let mut fixture = Fixture {
        product: "P-1".to_string(),
        ..Default::default()
    };
    fixture.catalog.insert(
        Category::StandardPart,
        vec!["A".to_string(), "AB".to_string(), "Nut M8".to_string()],
    );
    fixture.specification = TargetSpecification {
        standard_parts: initial.iter().map(|(n, q)| DesiredItem::new(*n, *q)).collect(),
        ..Default::default()
    };
    FakeErp::new(fixture)
}

fn lines(spec: &TargetSpecification) -> Vec<(String, f64)> {
    spec.standard_parts
        .iter()
        .map(|i| (i.name.clone(), i.quantity_or_default()))
        .collect()
}

#[tokio::test]
async fn test_reconcile_twice_leaves_one_entry() {
    let erp = erp(&[]);
    let config = config();
    let reconciler = SpecReconciler::new(&erp, &config);
    let desired = vec![DesiredItem::new("A", 4.0)];

    for _ in 0..2 {
        let outcome = reconciler
            .reconcile(Category::StandardPart, &desired)
            .await
            .unwrap();
        assert!(outcome.is_committed());
    }

    assert_eq!(lines(&erp.specification()), vec![("A".to_string(), 4.0)]);
    assert!(!erp.dialog_open());

    let journal = erp.journal();
    assert_eq!(journal.iter().filter(|e| *e == "Commit").count(), 2);
    assert!(!journal.iter().any(|e| e == "Cancel"));
}

#[tokio::test]
async fn test_empty_target_clears_category() {
    let erp = erp(&[("A", 1.0), ("Nut M8", 2.0)]);
    let config = config();

    let outcome = SpecReconciler::new(&erp, &config)
        .reconcile(Category::StandardPart, &[])
        .await
        .unwrap();

    assert_eq!(outcome, ReconcileOutcome::Cancelled);
    assert!(erp.specification().standard_parts.is_empty());
    assert!(!erp.dialog_open());

    let journal = erp.journal();
    assert!(journal.iter().any(|e| e == "Cancel"));
    assert!(!journal.iter().any(|e| e == "Commit"));
}

#[tokio::test]
async fn test_unmatched_search_adds_nothing() {
    let erp = erp(&[]);
    let config = config();

    let outcome = SpecReconciler::new(&erp, &config)
        .reconcile(
            Category::StandardPart,
            &[DesiredItem {
                name: "Nonexistent".to_string(),
                quantity: None,
            }],
        )
        .await
        .unwrap();

    assert_eq!(
        outcome,
        ReconcileOutcome::LeftOpen {
            staged: 0,
            skipped: vec!["Nonexistent".to_string()],
            unquantified: vec![],
        }
    );
    assert!(erp.specification().standard_parts.is_empty());
    assert!(erp.dialog_open());
}

#[tokio::test]
async fn test_exact_match_only() {
    let erp = erp(&[]);
    let config = config();

    SpecReconciler::new(&erp, &config)
        .reconcile(Category::StandardPart, &[DesiredItem::new("AB", 2.0)])
        .await
        .unwrap();

    assert_eq!(lines(&erp.specification()), vec![("AB".to_string(), 2.0)]);
}

#[tokio::test]
async fn test_clear_removes_last_row_first() {
    let erp = erp(&[("A", 1.0), ("AB", 1.0), ("Nut M8", 1.0)]);
    let config = config();

    SpecReconciler::new(&erp, &config)
        .reconcile(Category::StandardPart, &[])
        .await
        .unwrap();

    let selected: Vec<String> = erp
        .journal()
        .into_iter()
        .filter(|entry| entry.starts_with("SelectStaged"))
        .collect();
    assert_eq!(
        selected,
        vec!["SelectStaged(2)", "SelectStaged(1)", "SelectStaged(0)"]
    );
}

#[tokio::test]
async fn test_stuck_clear_gives_up() {
    let erp = erp(&[("A", 1.0)]);
    erp.jam_removal(true);
    let mut config = config();
    config.dialog.max_clear_attempts = 2;

    let outcome = SpecReconciler::new(&erp, &config)
        .reconcile(Category::StandardPart, &[DesiredItem::new("Nut M8", 3.0)])
        .await
        .unwrap();

    let removes = erp.journal().iter().filter(|e| *e == "Remove").count();
    assert_eq!(removes, 2);
    assert!(outcome.is_committed());
    assert_eq!(
        lines(&erp.specification()),
        vec![("A".to_string(), 1.0), ("Nut M8".to_string(), 3.0)]
    );
}

#[tokio::test]
async fn test_quantity_failure_is_not_a_skip() {
    let erp = erp(&[]);
    erp.jam_quantity_edit(true);
    let config = config();

    let outcome = SpecReconciler::new(&erp, &config)
        .reconcile(Category::StandardPart, &[DesiredItem::new("A", 4.0)])
        .await
        .unwrap();

    assert_eq!(
        outcome,
        ReconcileOutcome::Committed {
            staged: 1,
            skipped: vec![],
            unquantified: vec!["A".to_string()],
        }
    );
    assert!(outcome.skipped().is_empty());
    // the row stays with the dialog's default quantity
    assert_eq!(lines(&erp.specification()), vec![("A".to_string(), 1.0)]);
}

#[tokio::test]
async fn test_raw_materials_have_no_dialog() {
    let erp = erp(&[]);
    let config = config();

    let result = SpecReconciler::new(&erp, &config)
        .reconcile(Category::RawMaterial, &[DesiredItem::new("Steel", 1.0)])
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_apply_then_read_back() {
    let erp = erp(&[("Nut M8", 9.0)]);
    let config = config();
    let target = TargetSpecification {
        standard_parts: vec![DesiredItem::new("A", 2.5), DesiredItem::new("Nut M8", 1.0)],
        ..Default::default()
    };

    let results = SpecReconciler::new(&erp, &config).apply(&target).await;
    assert_eq!(results.len(), TargetSpecification::EDITABLE.len());

    let read = read_specification(&erp, &config).await.unwrap();
    assert_eq!(read.standard_parts, target.standard_parts);
    assert!(read.assemblies.is_empty());
    assert!(bomwalk_engine::detect_drift(&read, &target).is_empty());
}
