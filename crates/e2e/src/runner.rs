//! Scenario runner driving the engine against a DOM surface

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info};

use bomwalk_engine::{
    detect_drift, read_specification, BomState, DomBomSource, DomCatalog, DomSurface,
    EngineConfig, ReconcileOutcome, SpecReconciler, TargetSpecification, TestContext,
};

use crate::error::{E2eError, E2eResult};
use crate::fake::FakeErp;
use crate::scenario::{ExpectedLine, OutcomeKind, Scenario, Step};

/// Result of a single step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub success: bool,
    pub step_name: String,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub success: bool,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    pub error: Option<String>,
}

/// Result of running all scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioResult>,
}

impl SuiteResult {
    fn from_results(started_at: DateTime<Utc>, duration_ms: u64, results: Vec<ScenarioResult>) -> Self {
        let passed = results.iter().filter(|r| r.success).count();
        Self {
            started_at,
            total: results.len(),
            passed,
            failed: results.len() - passed,
            duration_ms,
            results,
        }
    }
}

/// Configuration for the scenario runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub engine: EngineConfig,
    pub scenarios_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            scenarios_dir: PathBuf::from("tests/scenarios"),
            output_dir: PathBuf::from("test-results"),
        }
    }
}

/// Runs scenarios, each against a fresh fake ERP built from its fixture
pub struct ScenarioRunner {
    config: RunnerConfig,
}

impl ScenarioRunner {
    pub fn new() -> Self {
        Self::with_config(RunnerConfig::default())
    }

    pub fn with_config(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Run all scenarios in the scenarios directory
    pub async fn run_all(&self) -> E2eResult<SuiteResult> {
        let scenarios = Scenario::load_all(&self.config.scenarios_dir)?;
        Ok(self.run_scenarios(&scenarios).await)
    }

    /// Run scenarios matching a tag
    pub async fn run_tagged(&self, tag: &str) -> E2eResult<SuiteResult> {
        let scenarios = Scenario::load_all(&self.config.scenarios_dir)?;
        let filtered: Vec<Scenario> = Scenario::filter_by_tag(&scenarios, tag)
            .into_iter()
            .cloned()
            .collect();
        Ok(self.run_scenarios(&filtered).await)
    }

    /// Run a specific scenario by name
    pub async fn run_named(&self, name: &str) -> E2eResult<SuiteResult> {
        let scenarios = Scenario::load_all(&self.config.scenarios_dir)?;
        let scenario = scenarios
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| E2eError::ScenarioParse(format!("Scenario not found: {}", name)))?;

        Ok(self.run_scenarios(std::slice::from_ref(&scenario)).await)
    }

    /// Run a list of scenarios
    pub async fn run_scenarios(&self, scenarios: &[Scenario]) -> SuiteResult {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut results = Vec::new();

        info!("Running {} scenario(s)...", scenarios.len());

        for scenario in scenarios {
            let result = self.run_scenario(scenario).await;
            if result.success {
                info!("✓ {} ({} ms)", result.name, result.duration_ms);
            } else {
                error!(
                    "✗ {} - {}",
                    result.name,
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
            results.push(result);
        }

        let suite = SuiteResult::from_results(started_at, start.elapsed().as_millis() as u64, results);
        info!(
            "Scenario results: {} passed, {} failed ({} ms)",
            suite.passed, suite.failed, suite.duration_ms
        );
        suite
    }

    /// Run one scenario against a fake ERP built from its fixture
    pub async fn run_scenario(&self, scenario: &Scenario) -> ScenarioResult {
        let erp = FakeErp::new(scenario.fixture.clone());
        self.run_on(&erp, scenario).await
    }

    /// Run the steps of `scenario` against any surface
    ///
    /// Steps run in order and the scenario stops at the first failure.
    pub async fn run_on<S: DomSurface + ?Sized>(&self, dom: &S, scenario: &Scenario) -> ScenarioResult {
        let start = Instant::now();
        debug!("Running scenario: {}", scenario.name);

        let mut ctx = TestContext::new();
        ctx.set("product", scenario.fixture.product.clone());

        let mut steps = Vec::new();
        let mut failure = None;

        for step in &scenario.steps {
            let step_start = Instant::now();
            let outcome = self.execute_step(dom, &mut ctx, step).await;
            let error = outcome.err().map(|e| e.to_string());

            steps.push(StepResult {
                success: error.is_none(),
                step_name: step.name(),
                duration_ms: step_start.elapsed().as_millis() as u64,
                error: error.clone(),
            });

            if let Some(error) = error {
                failure = Some(format!("{}: {}", step.name(), error));
                break;
            }
        }

        ScenarioResult {
            name: scenario.name.clone(),
            success: failure.is_none(),
            duration_ms: start.elapsed().as_millis() as u64,
            steps,
            error: failure,
        }
    }

    async fn execute_step<S: DomSurface + ?Sized>(
        &self,
        dom: &S,
        ctx: &mut TestContext,
        step: &Step,
    ) -> E2eResult<()> {
        let engine = &self.config.engine;
        debug!("Executing step: {}", step.name());

        match step {
            Step::Remember { key, value } => {
                let value = ctx.expand(value);
                ctx.set(key.clone(), value);
            }
            Step::ExtractBom { product, save_as } => {
                let designation = ctx.expand(product.as_deref().unwrap_or("${product}"));
                let mut source = DomBomSource::new(dom, engine);
                let catalog = DomCatalog::new(dom, engine);
                let root = source.root_level(designation);
                let state = bomwalk_engine::extract_bom(&mut source, &catalog, root).await;
                ctx.save_bom(save_as.clone(), state);
            }
            Step::ExpectBom { from, lines, exact } => {
                let state = saved_bom(ctx, from)?;
                check_bom(state, lines, *exact)?;
            }
            Step::Reconcile {
                category,
                items,
                expect,
            } => {
                let outcome = SpecReconciler::new(dom, engine)
                    .reconcile(*category, items)
                    .await?;
                if let Some(expected) = expect {
                    check_outcome(&outcome, *expected)?;
                }
            }
            Step::ApplyBom { from } => {
                let target = saved_bom(ctx, from)?.to_specification();
                for (category, outcome) in SpecReconciler::new(dom, engine).apply(&target).await {
                    let outcome = outcome?;
                    if !outcome.skipped().is_empty() {
                        return Err(E2eError::StepFailed {
                            step: step.name(),
                            reason: format!(
                                "{} items not found in catalog: {}",
                                category,
                                outcome.skipped().join(", ")
                            ),
                        });
                    }
                    if !outcome.unquantified().is_empty() {
                        return Err(E2eError::StepFailed {
                            step: step.name(),
                            reason: format!(
                                "{} items staged but quantity not set: {}",
                                category,
                                outcome.unquantified().join(", ")
                            ),
                        });
                    }
                }
            }
            Step::ReadSpecification { save_as } => {
                let spec = read_specification(dom, engine).await?;
                ctx.save_specification(save_as.clone(), spec);
            }
            Step::ExpectSpecification { category, items } => {
                let spec = read_specification(dom, engine).await?;
                let actual: Vec<(String, f64)> = spec
                    .items(*category)
                    .iter()
                    .map(|i| (i.name.clone(), i.quantity_or_default()))
                    .collect();
                let expected: Vec<(String, f64)> = items
                    .iter()
                    .map(|i| (i.name.clone(), i.quantity_or_default()))
                    .collect();
                if actual != expected {
                    return Err(E2eError::AssertionFailed(format!(
                        "{} lines are {:?}, expected {:?}",
                        category, actual, expected
                    )));
                }
            }
            Step::ExpectNoDrift { from } => {
                let desired = saved_bom(ctx, from)?.to_specification();
                let actual = read_specification(dom, engine).await?;
                check_drift(&actual, &desired)?;
            }
            Step::ExpectSameSpecification { from } => {
                let saved = saved_specification(ctx, from)?;
                let actual = read_specification(dom, engine).await?;
                check_drift(&actual, saved)?;
            }
            Step::Log { message } => {
                info!("[scenario] {}", ctx.expand(message));
            }
        }

        Ok(())
    }

    /// Write suite results to a JSON file
    pub fn write_results(&self, results: &SuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join("scenario-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

impl Default for ScenarioRunner {
    fn default() -> Self {
        Self::new()
    }
}

fn saved_bom<'a>(ctx: &'a TestContext, name: &str) -> E2eResult<&'a BomState> {
    ctx.bom(name)
        .ok_or_else(|| E2eError::MissingContext(name.to_string()))
}

fn saved_specification<'a>(ctx: &'a TestContext, name: &str) -> E2eResult<&'a TargetSpecification> {
    ctx.specification(name)
        .ok_or_else(|| E2eError::MissingContext(name.to_string()))
}

fn check_drift(actual: &TargetSpecification, desired: &TargetSpecification) -> E2eResult<()> {
    let drift = detect_drift(actual, desired);
    if drift.is_empty() {
        return Ok(());
    }
    let messages: Vec<String> = drift.into_iter().map(|d| d.message).collect();
    Err(E2eError::AssertionFailed(messages.join("; ")))
}

fn check_bom(state: &BomState, lines: &[ExpectedLine], exact: bool) -> E2eResult<()> {
    for line in lines {
        let item = state.find(line.category, &line.name).ok_or_else(|| {
            E2eError::AssertionFailed(format!("{} '{}' not in BOM", line.category, line.name))
        })?;

        if (item.quantity - line.quantity).abs() > 1e-6 {
            return Err(E2eError::AssertionFailed(format!(
                "{} '{}' has quantity {}, expected {}",
                line.category, line.name, item.quantity, line.quantity
            )));
        }
        if let Some(unit) = &line.unit {
            if &item.unit != unit {
                return Err(E2eError::AssertionFailed(format!(
                    "{} '{}' has unit '{}', expected '{}'",
                    line.category, line.name, item.unit, unit
                )));
            }
        }
    }

    if exact && state.len() != lines.len() {
        return Err(E2eError::AssertionFailed(format!(
            "BOM has {} line(s), expected {}",
            state.len(),
            lines.len()
        )));
    }
    Ok(())
}

fn check_outcome(outcome: &ReconcileOutcome, expected: OutcomeKind) -> E2eResult<()> {
    let actual = match outcome {
        ReconcileOutcome::Committed { .. } => OutcomeKind::Committed,
        ReconcileOutcome::Cancelled => OutcomeKind::Cancelled,
        ReconcileOutcome::LeftOpen { .. } => OutcomeKind::LeftOpen,
    };

    if actual != expected {
        return Err(E2eError::AssertionFailed(format!(
            "reconcile ended {:?}, expected {:?}",
            actual, expected
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bomwalk_engine::{Category, LineItem};
    use tempfile::TempDir;

    #[test]
    fn test_check_bom_reports_quantity() {
        let mut state = BomState::new();
        state.insert(LineItem::new("D-1", "Plate", "A-1", 6.0, Category::Detail));

        let ok = ExpectedLine {
            category: Category::Detail,
            name: "Plate".to_string(),
            quantity: 6.0,
            unit: Some("A-1".to_string()),
        };
        assert!(check_bom(&state, std::slice::from_ref(&ok), true).is_ok());

        let wrong = ExpectedLine { quantity: 5.0, ..ok };
        assert!(matches!(
            check_bom(&state, &[wrong], false),
            Err(E2eError::AssertionFailed(_))
        ));
    }

    const SAME_SPECIFICATION: &str = r#"
name: same-specification
fixture:
  product: P-1
  catalog:
    standard_part: [Nut M8]
  specification:
    standard_parts:
      - {name: Nut M8, quantity: 2}
steps:
  - action: read_specification
    save_as: before
  - action: expect_same_specification
    from: before
  - action: reconcile
    category: standard_part
    items:
      - {name: Nut M8, quantity: 5}
    expect: committed
  - action: expect_same_specification
    from: before
"#;

    fn immediate_runner() -> ScenarioRunner {
        ScenarioRunner::with_config(RunnerConfig {
            engine: EngineConfig {
                timeouts: bomwalk_engine::config::TimeoutConfig::immediate(),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_expect_same_specification_catches_change() {
        let scenario = Scenario::from_yaml(SAME_SPECIFICATION).unwrap();
        let result = immediate_runner().run_scenario(&scenario).await;

        assert!(!result.success);
        assert_eq!(result.steps.len(), 4);
        assert!(result.steps[1].success);
        assert!(result.steps[2].success);
        assert_eq!(result.steps[3].step_name, "expect_same_specification:before");
        assert!(!result.steps[3].success);
    }

    #[tokio::test]
    async fn test_expect_same_specification_needs_saved_entry() {
        let mut scenario = Scenario::from_yaml(SAME_SPECIFICATION).unwrap();
        scenario.steps = vec![Step::ExpectSameSpecification {
            from: "never-read".to_string(),
        }];
        let result = immediate_runner().run_scenario(&scenario).await;

        assert!(!result.success);
        let error = result.error.unwrap();
        assert!(error.contains("never-read"), "{}", error);
    }

    #[test]
    fn test_write_results() {
        let tmp = TempDir::new().unwrap();
        let runner = ScenarioRunner::with_config(RunnerConfig {
            output_dir: tmp.path().join("out"),
            ..Default::default()
        });

        let suite = SuiteResult::from_results(Utc::now(), 3, Vec::new());
        let path = runner.write_results(&suite).unwrap();

        let written: SuiteResult =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(written.total, 0);
        assert_eq!(written.duration_ms, 3);
    }
}
