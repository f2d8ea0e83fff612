//! BOM extraction through the DOM adapters

use std::collections::BTreeMap;
use std::path::PathBuf;

use bomwalk_e2e::{FakeErp, Fixture, FixtureGroup, FixtureItem, RunnerConfig, ScenarioRunner};
use bomwalk_engine::config::TimeoutConfig;
use bomwalk_engine::{
    read_specification, BomWalker, Category, DesiredItem, DomBomSource, DomCatalog, EngineConfig,
    MaterialCatalog, TargetSpecification,
};

fn config() -> EngineConfig {
    EngineConfig {
        timeouts: TimeoutConfig::immediate(),
        ..Default::default()
    }
}

fn consumable(name: &str, quantity: &str, unit: &str) -> FixtureItem {
    FixtureItem {
        unit: unit.to_string(),
        ..FixtureItem::new("", name, quantity)
    }
}

fn fixture() -> Fixture {
    let mut levels = BTreeMap::new();
    levels.insert(
        "P-1".to_string(),
        vec![
            FixtureGroup::new(
                Category::Assembly,
                vec![
                    FixtureItem::new("A-1", "Hinge", "3"),
                    FixtureItem::new("A-9", "Ghost", "2"),
                ],
            ),
            FixtureGroup::new(
                Category::Detail,
                vec![FixtureItem::new("D-1", "Plate", "2").with_material("Steel")],
            ),
            FixtureGroup::new(
                Category::StandardPart,
                vec![FixtureItem::new("", "Bolt", "2,5")],
            ),
            FixtureGroup::new(Category::Consumable, vec![consumable("Grease", "0.5", "kg")]),
        ],
    );
    levels.insert(
        "A-1".to_string(),
        vec![
            FixtureGroup::new(
                Category::Detail,
                vec![FixtureItem::new("D-1", "Plate", "1").with_material("Steel")],
            ),
            FixtureGroup::new(
                Category::StandardPart,
                vec![FixtureItem::new("", "Bolt", "4")],
            ),
            FixtureGroup::new(Category::Consumable, vec![consumable("Grease", "1", "kg")]),
        ],
    );

    let mut materials = BTreeMap::new();
    materials.insert(Category::RawMaterial, vec!["Steel".to_string()]);
    materials.insert(Category::Consumable, vec!["Primer".to_string()]);

    Fixture {
        product: "P-1".to_string(),
        levels,
        materials,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_extract_through_modals() {
    let erp = FakeErp::new(fixture());
    let config = config();
    let mut source = DomBomSource::new(&erp, &config);
    let catalog = DomCatalog::new(&erp, &config);
    let root = source.root_level("P-1");

    let (bom, stats) = BomWalker::new(&mut source, &catalog).run(root).await;

    let hinge = bom.find(Category::Assembly, "Hinge").unwrap();
    assert_eq!(hinge.quantity, 3.0);
    assert_eq!(hinge.unit, "P-1");

    // child quantities are scaled by the parent row
    assert_eq!(bom.find(Category::Detail, "Plate").unwrap().quantity, 5.0);
    assert_eq!(bom.find(Category::StandardPart, "Bolt").unwrap().quantity, 2.5);

    let grease = bom.find(Category::Consumable, "Grease").unwrap();
    assert_eq!(grease.quantity, 3.5);
    assert_eq!(grease.unit, "kg");

    let steel = bom.find(Category::RawMaterial, "Steel").unwrap();
    assert_eq!(steel.quantity, 1.0);
    assert_eq!(steel.unit, "-");
    assert_eq!(steel.designation, "-");

    assert_eq!(stats.max_depth, 1);
    assert!(stats.skipped >= 1);
    assert_eq!(erp.open_levels(), 0);
}

#[tokio::test]
async fn test_missing_level_keeps_its_row() {
    let erp = FakeErp::new(fixture());
    let config = config();
    let mut source = DomBomSource::new(&erp, &config);
    let catalog = DomCatalog::new(&erp, &config);
    let root = source.root_level("P-1");

    let bom = bomwalk_engine::extract_bom(&mut source, &catalog, root).await;

    let ghost = bom.find(Category::Assembly, "Ghost").unwrap();
    assert_eq!(ghost.quantity, 2.0);
    assert_eq!(bom.assemblies.len(), 2);
}

#[tokio::test]
async fn test_unreadable_level_does_not_block_siblings() {
    let mut levels = BTreeMap::new();
    levels.insert(
        "P-1".to_string(),
        vec![FixtureGroup::new(
            Category::Assembly,
            vec![
                FixtureItem::new("", "Blank", "1"),
                FixtureItem::new("A-2", "Good", "2"),
            ],
        )],
    );
    // the blank row opens a modal that shows no designation
    levels.insert(String::new(), Vec::new());
    levels.insert(
        "A-2".to_string(),
        vec![FixtureGroup::new(
            Category::Detail,
            vec![FixtureItem::new("D-1", "Plate", "1")],
        )],
    );
    let erp = FakeErp::new(Fixture {
        product: "P-1".to_string(),
        levels,
        ..Default::default()
    });
    let config = config();
    let mut source = DomBomSource::new(&erp, &config);
    let catalog = DomCatalog::new(&erp, &config);
    let root = source.root_level("P-1");

    let (bom, stats) = BomWalker::new(&mut source, &catalog).run(root).await;

    assert_eq!(bom.find(Category::Detail, "Plate").unwrap().quantity, 2.0);
    assert_eq!(bom.find(Category::Detail, "Plate").unwrap().unit, "A-2");
    assert!(bom.find(Category::Assembly, "Blank").is_some());
    assert_eq!(stats.skipped, 1);
    assert_eq!(erp.open_levels(), 0);
}

#[tokio::test]
async fn test_catalog_tabs() {
    let erp = FakeErp::new(fixture());
    let config = config();
    let catalog = DomCatalog::new(&erp, &config);

    assert_eq!(
        catalog.classify("Steel").await.unwrap(),
        Some(Category::RawMaterial)
    );
    assert_eq!(
        catalog.classify("Primer").await.unwrap(),
        Some(Category::Consumable)
    );
    assert_eq!(catalog.classify("Stee").await.unwrap(), None);
}

#[tokio::test]
async fn test_read_specification_page() {
    let specification = TargetSpecification {
        assemblies: vec![DesiredItem::new("Hinge", 3.0)],
        consumables: vec![DesiredItem::new("Grease", 0.25)],
        ..Default::default()
    };
    let erp = FakeErp::new(Fixture {
        product: "P-1".to_string(),
        specification: specification.clone(),
        ..Default::default()
    });

    let read = read_specification(&erp, &config()).await.unwrap();
    assert_eq!(read, specification);
}

#[tokio::test]
async fn test_sample_scenarios_pass() {
    let output = tempfile::tempdir().unwrap();
    let runner = ScenarioRunner::with_config(RunnerConfig {
        engine: config(),
        scenarios_dir: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/scenarios")),
        output_dir: output.path().to_path_buf(),
    });

    let results = runner.run_all().await.unwrap();
    assert!(results.total >= 3);
    for result in &results.results {
        assert!(result.success, "{} failed: {:?}", result.name, result.error);
    }

    let written = runner.write_results(&results).unwrap();
    assert!(written.exists());
}
