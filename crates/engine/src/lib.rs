//! BomWalk Engine
//!
//! Hierarchical BOM extraction and specification reconciliation for ERP
//! UI regression tests. The engine reads a product's nested specification
//! tree off the rendered screen, flattens it into per-category totals, and
//! drives the specification edit dialogs until they hold a target state.
//!
//! All screen access goes through [`dom::DomSurface`]; the tree itself is
//! consumed through [`walker::BomSource`], so the same walk runs against
//! the live page or a recorded [`snapshot::TreeSnapshot`].

pub mod aggregator;
pub mod columns;
pub mod config;
pub mod context;
pub mod dom;
pub mod dom_source;
pub mod drift;
pub mod error;
pub mod grouped;
pub mod model;
pub mod reconciler;
pub mod snapshot;
pub mod specification;
pub mod walker;

// Re-export commonly used types
pub use columns::{resolve_column, resolve_column_with, HeaderCell, HeaderRow};
pub use config::EngineConfig;
pub use context::TestContext;
pub use dom::{DomSurface, ElementHandle};
pub use dom_source::{DomBomSource, DomCatalog};
pub use drift::{detect_drift, DriftReport, DriftType};
pub use error::{Error, Result};
pub use grouped::{parse_grouped_table, Group, GroupedTable, TableRow};
pub use model::{BomState, Category, DesiredItem, LineItem, TargetSpecification};
pub use reconciler::{ReconcileOutcome, SpecReconciler};
pub use snapshot::{StaticCatalog, TreeSnapshot};
pub use specification::read_specification;
pub use walker::{extract_bom, BomSource, BomWalker, Level, MaterialCatalog, WalkStats};

/// BomWalk version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
