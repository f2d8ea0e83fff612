//! BomWalk Scenario Test Framework
//!
//! This crate runs declarative YAML scenarios against the BOM engine:
//! - Parses scenarios (fixture plus steps)
//! - Renders the fixture as an in-memory ERP behind a `DomSurface`
//! - Drives extraction, reconciliation and read-back through the engine
//! - Writes JSON results
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ScenarioRunner                         │
//! │    ├── run_scenario(scenario) -> ScenarioResult             │
//! │    └── run_on(dom, scenario)  -> ScenarioResult             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Scenario (YAML)                                            │
//! │    ├── name, description, tags                              │
//! │    ├── fixture: levels, materials, catalog, specification   │
//! │    └── steps: [Step]                                        │
//! │          ├── extract_bom { product?, save_as }              │
//! │          ├── expect_bom { from, lines, exact? }             │
//! │          ├── reconcile { category, items, expect? }         │
//! │          ├── apply_bom { from }                             │
//! │          ├── expect_specification { category, items }       │
//! │          ├── expect_no_drift { from }                       │
//! │          └── expect_same_specification { from }             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  FakeErp: DomSurface                                        │
//! │    └── page::Node tree re-rendered per query                │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod fake;
pub mod fixture;
pub mod page;
pub mod runner;
pub mod scenario;

pub use error::{E2eError, E2eResult};
pub use fake::FakeErp;
pub use fixture::{Fixture, FixtureGroup, FixtureItem};
pub use runner::{RunnerConfig, ScenarioResult, ScenarioRunner, SuiteResult};
pub use scenario::{Scenario, Step};
